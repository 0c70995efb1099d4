//! Migrator configuration
//!
//! Configuration is read from environment variables with documented defaults.
//! Loading a `.env` file is left to the binary.

use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

pub const MIGRATION_PATH: &str = "MIGRATION_PATH";
pub const MIGRATION_TABLE: &str = "MIGRATION_TABLE";
pub const PGHOST: &str = "PGHOST";
pub const PGPORT: &str = "PGPORT";
pub const PGUSER: &str = "PGUSER";
pub const PGPASSWORD: &str = "PGPASSWORD";
pub const PGDATABASE: &str = "PGDATABASE";
pub const PGSSL: &str = "PGSSL";

const DEFAULT_PATH: &str = "migrations";
const DEFAULT_TABLE: &str = "migrations";

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for field '{field}': '{value}'. Expected: {expected}")]
    InvalidValue {
        field: String,
        value: String,
        expected: String,
    },

    #[error("Configuration validation failed: {message}")]
    ValidationFailed { message: String },
}

impl ConfigError {
    /// Create an invalid value error
    pub fn invalid_value(
        field: impl Into<String>,
        value: impl Into<String>,
        expected: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            field: field.into(),
            value: value.into(),
            expected: expected.into(),
        }
    }

    /// Create a validation failed error
    pub fn validation_failed(message: impl Into<String>) -> Self {
        Self::ValidationFailed {
            message: message.into(),
        }
    }
}

/// PostgreSQL connection parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    pub ssl: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            user: "postgres".to_string(),
            password: "postgres".to_string(),
            database: "postgres".to_string(),
            ssl: false,
        }
    }
}

/// Configuration for the migration system
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigratorConfig {
    /// Directory holding one subdirectory per migration
    pub path: PathBuf,
    /// Table recording applied migrations
    pub table: String,
    pub database: DatabaseConfig,
}

impl Default for MigratorConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_PATH),
            table: DEFAULT_TABLE.to_string(),
            database: DatabaseConfig::default(),
        }
    }
}

impl MigratorConfig {
    /// Create a configuration rooted at `path` with default table and database
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    pub fn with_database(mut self, database: DatabaseConfig) -> Self {
        self.database = database;
        self
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup, falling back to defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = DatabaseConfig::default();

        let port = match lookup(PGPORT) {
            Some(raw) => u16::from_str(raw.trim())
                .map_err(|_| ConfigError::invalid_value(PGPORT, raw, "a port number"))?,
            None => defaults.port,
        };

        let ssl = match lookup(PGSSL) {
            Some(raw) => parse_flag(PGSSL, &raw)?,
            None => defaults.ssl,
        };

        let config = Self {
            path: lookup(MIGRATION_PATH)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_PATH)),
            table: lookup(MIGRATION_TABLE).unwrap_or_else(|| DEFAULT_TABLE.to_string()),
            database: DatabaseConfig {
                host: lookup(PGHOST).unwrap_or(defaults.host),
                port,
                user: lookup(PGUSER).unwrap_or(defaults.user),
                password: lookup(PGPASSWORD).unwrap_or(defaults.password),
                database: lookup(PGDATABASE).unwrap_or(defaults.database),
                ssl,
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.path.as_os_str().is_empty() {
            return Err(ConfigError::validation_failed("migration path must not be empty"));
        }

        if !is_identifier(&self.table) {
            return Err(ConfigError::invalid_value(
                "table",
                &self.table,
                "a SQL identifier, optionally schema-qualified (letters, digits, underscores)",
            ));
        }

        if self.database.port == 0 {
            return Err(ConfigError::invalid_value("port", "0", "a port between 1 and 65535"));
        }

        Ok(())
    }
}

fn parse_flag(field: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "" | "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::invalid_value(field, raw, "true or false")),
    }
}

/// The ledger table name is spliced into SQL, so only plain identifiers pass
fn is_identifier(name: &str) -> bool {
    let parts: Vec<&str> = name.split('.').collect();
    parts.len() <= 2
        && parts.iter().all(|part| {
            let mut chars = part.chars();
            matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_nothing_is_set() {
        let config = MigratorConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config, MigratorConfig::default());
        assert_eq!(config.path, PathBuf::from("migrations"));
        assert_eq!(config.table, "migrations");
        assert_eq!(config.database.port, 5432);
        assert!(!config.database.ssl);
    }

    #[test]
    fn test_values_are_read_from_lookup() {
        let config = MigratorConfig::from_lookup(lookup_from(&[
            (MIGRATION_PATH, "/srv/db/migrations"),
            (MIGRATION_TABLE, "public.schema_ledger"),
            (PGHOST, "db.internal"),
            (PGPORT, "6543"),
            (PGUSER, "deploy"),
            (PGPASSWORD, "hunter2"),
            (PGDATABASE, "app"),
            (PGSSL, "true"),
        ]))
        .unwrap();

        assert_eq!(config.path, PathBuf::from("/srv/db/migrations"));
        assert_eq!(config.table, "public.schema_ledger");
        assert_eq!(
            config.database,
            DatabaseConfig {
                host: "db.internal".to_string(),
                port: 6543,
                user: "deploy".to_string(),
                password: "hunter2".to_string(),
                database: "app".to_string(),
                ssl: true,
            }
        );
    }

    #[test]
    fn test_invalid_port_is_rejected() {
        let err = MigratorConfig::from_lookup(lookup_from(&[(PGPORT, "postgres")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref field, .. } if field == PGPORT));
    }

    #[test]
    fn test_ssl_flag_parsing() {
        for (raw, expected) in [("1", true), ("yes", true), ("0", false), ("off", false), ("", false)] {
            let config = MigratorConfig::from_lookup(lookup_from(&[(PGSSL, raw)])).unwrap();
            assert_eq!(config.database.ssl, expected, "PGSSL={raw:?}");
        }

        assert!(MigratorConfig::from_lookup(lookup_from(&[(PGSSL, "maybe")])).is_err());
    }

    #[test]
    fn test_table_must_be_an_identifier() {
        for table in ["migrations; DROP TABLE users", "1migrations", "a.b.c", "", "my-table"] {
            let config = MigratorConfig::default().with_table(table);
            assert!(config.validate().is_err(), "table {table:?} should be rejected");
        }

        for table in ["migrations", "_ledger", "public.migrations", "Schema_1.Ledger_2"] {
            let config = MigratorConfig::default().with_table(table);
            assert!(config.validate().is_ok(), "table {table:?} should be accepted");
        }
    }
}
