//! Command parsing and dispatch

use clap::Parser;
use std::process::ExitCode;
use tracing::{error, info};

use pgshift_core::{MigrateError, MigrateResult, MigrationOutcome, Migrator};

pub const COMMANDS: &[&str] = &["create", "up", "down"];

#[derive(Parser, Debug)]
#[command(name = "pgshift")]
#[command(about = "Create, apply and revert ledger-tracked SQL migrations")]
#[command(version)]
pub struct Cli {
    /// create, up or down
    pub command: String,

    /// Migration name, required by create
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Create a new migration group
    Create { name: String },
    /// Apply pending migrations
    Up,
    /// Revert applied migrations
    Down,
}

impl Command {
    pub fn parse(command: &str, name: Option<&str>) -> MigrateResult<Self> {
        match command {
            "create" => match name {
                Some(name) => Ok(Command::Create {
                    name: name.to_string(),
                }),
                None => Err(MigrateError::MissingArgument {
                    command: command.to_string(),
                    argument: "name".to_string(),
                }),
            },
            "up" => Ok(Command::Up),
            "down" => Ok(Command::Down),
            other => Err(MigrateError::unrecognized_command(other, COMMANDS)),
        }
    }
}

impl TryFrom<&Cli> for Command {
    type Error = MigrateError;

    fn try_from(cli: &Cli) -> Result<Self, Self::Error> {
        Command::parse(&cli.command, cli.name.as_deref())
    }
}

/// Run one command, returning the process exit code
pub async fn execute(migrator: &Migrator, command: Command) -> anyhow::Result<ExitCode> {
    match command {
        Command::Create { name } => {
            let migration = migrator.create(&name).await?;
            let directory = migrator.config().path.join(migration.encode());
            info!("Edit the scripts in {}", directory.display());
            Ok(ExitCode::SUCCESS)
        }
        Command::Up => Ok(exit_code(report(migrator.up().await?))),
        Command::Down => Ok(exit_code(report(migrator.down().await?))),
    }
}

/// Log the outcome; a rolled back batch counts as a failure
fn report(outcome: MigrationOutcome) -> bool {
    match outcome {
        MigrationOutcome::UpToDate => true,
        MigrationOutcome::Applied(migrations) => {
            info!("Applied {} migration(s)", migrations.len());
            true
        }
        MigrationOutcome::Reverted(records) => {
            info!("Reverted {} migration(s)", records.len());
            true
        }
        MigrationOutcome::RolledBack { cause } => {
            error!("No changes were made: {}", cause);
            false
        }
    }
}

fn exit_code(success: bool) -> ExitCode {
    if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
