//! # pgshift-testing - Testing utilities for pgshift
//!
//! - **In-memory database**: a [`Connector`](pgshift_core::Connector) that
//!   understands ledger statements, records script statements and honors
//!   transactions, so migrator behavior can be tested without PostgreSQL
//! - **Fixtures**: temporary migration directories with hand written scripts
//! - **PostgreSQL helpers**: ledger and table inspection for end-to-end tests
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pgshift_testing::prelude::*;
//!
//! # async fn run() -> TestResult<()> {
//! let fixture = MigrationFixture::new()?;
//! fixture.add(1_700_000_000_000, "create_users", "CREATE TABLE users (id INT)", "DROP TABLE users")?;
//!
//! let db = MemoryDatabase::new("migrations");
//! let migrator = Migrator::with_connector(fixture.config("migrations"), db.connector());
//! migrator.up().await?;
//!
//! assert_eq!(db.ledger().len(), 1);
//! # Ok(())
//! # }
//! ```

pub mod database;
pub mod fixtures;
pub mod memory;

pub use database::TestDatabase;
pub use fixtures::MigrationFixture;
pub use memory::MemoryDatabase;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{MemoryDatabase, MigrationFixture, TestDatabase, TestError, TestResult};

    pub use chrono::{DateTime, TimeZone, Utc};
    pub use pgshift_core::{
        Direction, LedgerRecord, MigrateError, Migration, MigrationOutcome, Migrator,
        MigratorConfig,
    };
}

#[derive(thiserror::Error, Debug)]
pub enum TestError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migrate(#[from] pgshift_core::MigrateError),

    #[error("Configuration error: {0}")]
    Config(#[from] pgshift_core::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Test setup error: {0}")]
    Setup(String),
}

pub type TestResult<T> = Result<T, TestError>;
