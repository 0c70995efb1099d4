//! Error types for the migration system
//!
//! `create` surfaces every error to its caller. `up` and `down` only surface
//! errors raised outside of their migration transaction; failures inside the
//! transaction are reported through [`crate::MigrationOutcome::RolledBack`].

use thiserror::Error;

use crate::config::ConfigError;

/// Result type alias for migration operations
pub type MigrateResult<T> = Result<T, MigrateError>;

/// SQLSTATE reported by PostgreSQL when a relation does not exist
pub const UNDEFINED_TABLE: &str = "42P01";

/// Error types for migration operations
#[derive(Debug, Error)]
pub enum MigrateError {
    #[error("Migration with name {name} already exists")]
    NameAlreadyExists { name: String },

    #[error("Command {command} is not recognized. Use one of [{allowed}] instead")]
    UnrecognizedCommand { command: String, allowed: String },

    #[error("Command {command} requires a {argument} argument")]
    MissingArgument { command: String, argument: String },

    #[error("Invalid migration name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    #[error("Invalid migration filename '{filename}': {reason}")]
    InvalidFilename { filename: String, reason: String },

    #[error("Migration {directory} has no {direction} script")]
    MissingScript { directory: String, direction: String },

    #[error("No local migration found for applied migration {name}")]
    MissingGroup { name: String },

    #[error("Failed to decode column '{column}': {reason}")]
    Decode { column: String, reason: String },

    #[error("Database error: {message}")]
    Database { message: String, code: Option<String> },

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl MigrateError {
    /// Create an unrecognized command error listing the allowed commands
    pub fn unrecognized_command(command: impl Into<String>, allowed: &[&str]) -> Self {
        Self::UnrecognizedCommand {
            command: command.into(),
            allowed: allowed.join(" | "),
        }
    }

    /// Create an invalid filename error
    pub fn invalid_filename(filename: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidFilename {
            filename: filename.into(),
            reason: reason.into(),
        }
    }

    /// Create a decode error for a row column
    pub fn decode(column: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Decode {
            column: column.into(),
            reason: reason.into(),
        }
    }

    /// Create a database error without a SQLSTATE code
    pub fn database(message: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
            code: None,
        }
    }

    /// SQLSTATE code reported by the database, if any
    pub fn sqlstate(&self) -> Option<&str> {
        match self {
            MigrateError::Database { code, .. } => code.as_deref(),
            _ => None,
        }
    }

    /// Whether the database reported that the queried relation does not exist
    pub fn is_undefined_table(&self) -> bool {
        self.sqlstate() == Some(UNDEFINED_TABLE)
    }

    /// Whether the error stems from invalid user input rather than the environment
    pub fn is_usage_error(&self) -> bool {
        matches!(
            self,
            MigrateError::NameAlreadyExists { .. }
                | MigrateError::UnrecognizedCommand { .. }
                | MigrateError::MissingArgument { .. }
                | MigrateError::InvalidName { .. }
        )
    }
}
