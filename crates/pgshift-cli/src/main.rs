mod commands;
mod logging;

use anyhow::Context;
use clap::Parser;
use std::process::ExitCode;
use tracing::error;

use commands::{Cli, Command};
use logging::LoggingConfig;
use pgshift_core::{MigrateError, Migrator, MigratorConfig};

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    if let Err(e) = logging::init_logging(LoggingConfig::from_env()) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    let cli = Cli::parse();

    match run(&cli).await {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            let usage = e
                .downcast_ref::<MigrateError>()
                .is_some_and(MigrateError::is_usage_error);
            if usage {
                error!("Usage: pgshift create <name> | pgshift up | pgshift down");
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli) -> anyhow::Result<ExitCode> {
    let command = Command::try_from(cli)?;
    let config = MigratorConfig::from_env().context("Invalid migration configuration")?;
    let migrator = Migrator::new(config);

    commands::execute(&migrator, command).await
}
