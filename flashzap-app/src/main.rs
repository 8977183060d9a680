mod api;
mod cli;
mod config;
mod logging;

use anyhow::Result;
use clap::Parser; // needed for Cli::parse()
use tokio::runtime::Runtime;

use cli::commands::run_cli;
use cli::opts::Cli;
use config::Settings;

fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let args = Cli::parse();
    let settings = Settings::load(args.config.as_deref())?;
    logging::init_tracing(&settings.log_level);

    let rt = Runtime::new()?;
    rt.block_on(run_cli(args, settings))
}
