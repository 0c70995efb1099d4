//! # pgshift-core: ledger-tracked SQL migrations
//!
//! Migrations are plain SQL scripts kept in timestamped directories on disk.
//! A ledger table in the target database records which of them have been
//! applied. This crate provides:
//!
//! - the naming protocol for migration directories and scripts
//! - a file store that lists, finds, reads and writes migration groups
//! - a small database layer with a PostgreSQL backend and transactions
//! - the [`Migrator`] running `create`, `up` and `down`

pub mod config;
pub mod database;
pub mod error;
pub mod ledger;
pub mod migrator;
pub mod naming;
pub mod script;
pub mod store;

pub use config::{ConfigError, DatabaseConfig, MigratorConfig};
pub use database::{Connection, Connector, Executor, ExecutorState, PgConnector, Row, SqlValue};
pub use error::{MigrateError, MigrateResult};
pub use ledger::{LedgerQueries, LedgerRecord};
pub use migrator::{MigrationOutcome, Migrator};
pub use naming::{Direction, Migration};
pub use store::{MigrationStore, ScriptFile, TraversalResult};
