mod catalog;
mod cli;
mod command;
mod engine;
mod error;
mod model;
mod orchestrator;
mod resolver;
mod storage;
mod text_summary;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "freqtrade_batch=debug"
    } else {
        "freqtrade_batch=warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();
    init_tracing(args.verbose);

    // Per-task failures are reported inside the run; only setup errors surface here.
    cli::run(args).await?;
    // Exit explicitly so runtime shutdown does not wait on processes left
    // behind by a soft timeout or on a blocked stdin reader.
    std::process::exit(0)
}
