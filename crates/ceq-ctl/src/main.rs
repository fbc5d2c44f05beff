//! `ceqctl`: experiment orchestration CLI.

mod cli;

use anyhow::Context;
use ceq_core::Settings;
use ceq_observe::{LoggerConfig, LoggerFormat, logger_init};
use clap::Parser;

use crate::cli::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    if let Some(path) = &cli.env_file {
        dotenvy::from_path(path).with_context(|| format!("reading {}", path.display()))?;
    }

    let format: LoggerFormat = cli.log_format.parse()?;
    logger_init(&LoggerConfig::new(format, cli.log_level.clone()))?;

    let settings = Settings::from_env()?;
    cli.run(settings).await
}
