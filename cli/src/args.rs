use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::Level;

/// Compiles Ruby programs into the nodemarshal binary format, and runs
/// or inspects such binaries.
///
/// Inputs are read from the given file, or from stdin if none is
/// given.
#[derive(Parser, Clone, Debug)]
#[command(name = "nodemarshal", version)]
pub struct Args {
    /// A global log level to use when printing logs.
    /// It's also possible to set `RUST_LOG` according to
    /// `tracing_subscriber::filter::EnvFilter`, which will always have
    /// priority.
    #[arg(long, default_value_t = Level::INFO, global = true)]
    pub log_level: Level,

    /// Largest node count accepted when decoding.
    #[arg(long, env = "NODEMARSHAL_MAX_NODES", default_value_t = 1 << 24, global = true)]
    pub max_nodes: u64,

    /// Largest string, symbol or pattern length accepted when decoding.
    #[arg(long, env = "NODEMARSHAL_MAX_BYTES_LEN", default_value_t = 1 << 28, global = true)]
    pub max_bytes_len: u64,

    #[command(subcommand)]
    pub command: Command,
}

/// Where Ruby source comes from.
#[derive(clap::Args, Clone, Debug)]
pub struct Source {
    /// Path to a script
    pub script: Option<PathBuf>,

    /// Source given on the command line instead of a script
    #[arg(long, short = 'E', conflicts_with = "script")]
    pub expr: Option<String>,
}

/// Where an encoded graph comes from.
#[derive(clap::Args, Clone, Debug)]
pub struct Encoded {
    /// Path to the encoded graph
    pub input: Option<PathBuf>,

    /// The input is radix-85 text rather than binary
    #[arg(long)]
    pub text: bool,
}

#[derive(Subcommand, Clone, Debug)]
pub enum Command {
    /// Parse Ruby source and write the encoded graph
    Compile {
        #[command(flatten)]
        source: Source,

        /// Write radix-85 text rather than binary
        #[arg(long)]
        text: bool,

        /// Output file, stdout if not given
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Evaluate an encoded graph and print the result
    Run {
        #[command(flatten)]
        input: Encoded,
    },

    /// Parse Ruby source, encode and decode it, then evaluate the
    /// decoded graph
    Eval {
        #[command(flatten)]
        source: Source,

        /// Dump the decoded graph as JSON to stderr before evaluating
        #[arg(long, env = "NODEMARSHAL_DISPLAY_AST")]
        display_ast: bool,
    },

    /// Print an encoded graph as JSON
    Dump {
        #[command(flatten)]
        input: Encoded,
    },

    /// Raw radix-85 conversion
    Base85 {
        #[command(subcommand)]
        direction: Direction,
    },

    /// Evaluate lines interactively
    Repl,
}

#[derive(Subcommand, Clone, Debug, PartialEq, Eq)]
pub enum Direction {
    /// Bytes to radix-85 text
    Encode { input: Option<PathBuf> },
    /// Radix-85 text to bytes
    Decode { input: Option<PathBuf> },
}

impl Args {
    pub fn decode_options(&self) -> nodemarshal::DecodeOptions {
        nodemarshal::DecodeOptions::default()
            .max_nodes(self.max_nodes)
            .max_bytes_len(self.max_bytes_len)
    }
}
