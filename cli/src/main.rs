use std::io;

use clap::Parser;
use nodemarshal_cli::Args;
use tracing::error;

fn main() {
    let args = Args::parse();

    if let Err(e) = nodemarshal_tracing::TracingBuilder::default()
        .level(args.log_level)
        .build()
    {
        eprintln!("failed to set up logging: {e}");
        std::process::exit(1);
    }

    let stdin = io::stdin();
    let stdout = io::stdout();
    if let Err(e) = nodemarshal_cli::run(&args, &mut stdin.lock(), &mut stdout.lock()) {
        error!("{e}");
        std::process::exit(1);
    }
}
