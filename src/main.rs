mod auth;
mod changes;
mod cli;
mod config;
mod error;
mod logging;
mod metrics;
mod output;
mod parser;
mod projects;
mod providers;
mod report;
mod snapshot;

use anyhow::Result;
use clap::Parser;
use cli::Cli;
use log::info;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose(), cli.quiet(), cli.logfile(), cli.trace())?;

    if !cli.quiet() {
        output::print_banner();
    }

    info!("Starting zing-stats {}", env!("CARGO_PKG_VERSION"));
    cli.execute().await?;

    Ok(())
}
