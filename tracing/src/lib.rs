//! Logging setup shared by the nodemarshal binaries.

use tracing::Level;
use tracing_subscriber::{
    filter::FromEnvError, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid RUST_LOG: {0}")]
    Filter(#[from] FromEnvError),

    #[error(transparent)]
    Init(#[from] tracing_subscriber::util::TryInitError),
}

pub struct TracingBuilder {
    level: Level,
    ansi: bool,
}

impl Default for TracingBuilder {
    fn default() -> Self {
        TracingBuilder {
            level: Level::INFO,
            ansi: true,
        }
    }
}

impl TracingBuilder {
    /// Set the log level. RUST_LOG still has a higher priority over this
    /// value.
    pub fn level(mut self, level: Level) -> TracingBuilder {
        self.level = level;
        self
    }

    /// Whether to colour the output, enabled by default.
    pub fn ansi(mut self, ansi: bool) -> TracingBuilder {
        self.ansi = ansi;
        self
    }

    fn filter(&self) -> Result<EnvFilter, Error> {
        Ok(EnvFilter::builder()
            .with_default_directive(self.level.into())
            .from_env()?)
    }

    /// Install a global subscriber writing compact lines to stderr,
    /// filtered by the configured level and RUST_LOG.
    pub fn build(self) -> Result<(), Error> {
        tracing_subscriber::registry()
            .with(self.filter()?)
            .with(
                tracing_subscriber::fmt::Layer::new()
                    .with_writer(std::io::stderr)
                    .with_ansi(self.ansi)
                    .compact(),
            )
            .try_init()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tracing::Level;

    use super::TracingBuilder;

    #[test]
    fn defaults_to_info() {
        let builder = TracingBuilder::default();
        assert_eq!(Level::INFO, builder.level);
        assert_eq!(Level::DEBUG, builder.level(Level::DEBUG).level);
    }
}
