use clap::Parser;

use crate::cli::{App, Commands};
use crate::config::{AppConfig, LogFormat};

mod cli;
mod config;
mod logging;
mod run;
mod tracker;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app = App::parse();

    let mut config = AppConfig::load(app.config.as_deref())?;
    if app.json {
        config.log.format = LogFormat::Json;
    }
    logging::init_logging(&config.log)?;

    match app.cmd {
        Commands::Get(arg) => run::get(&config, arg).await,
        Commands::Put(arg) => run::put(&config, arg).await,
    }
}
