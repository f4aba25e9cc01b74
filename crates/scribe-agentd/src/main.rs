mod cli;
mod modes;

use clap::Parser;
use scribe_observe::logger_init;

use crate::cli::{Cli, Mode};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logger_init(&cli.logger())?;

    match cli.mode {
        Mode::Gateway(args) => modes::gateway(args).await,
        Mode::Worker(args) => modes::worker(args).await,
        Mode::Standalone(args) => modes::standalone(args).await,
    }
}
