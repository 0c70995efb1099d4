//! PostgreSQL testing utilities
//!
//! Connects with the standard `PG*` environment variables. Unset variables
//! fall back to a local `test` database owned by user `test`.

use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::path::Path;

use pgshift_core::config::{PGDATABASE, PGPASSWORD, PGUSER};
use pgshift_core::database::connect_options;
use pgshift_core::{DatabaseConfig, LedgerRecord, MigratorConfig};

use crate::TestResult;

/// Test database handle for end-to-end migration tests
#[derive(Clone)]
pub struct TestDatabase {
    config: DatabaseConfig,
    pool: PgPool,
}

impl TestDatabase {
    /// Connect to the test database
    pub async fn new() -> TestResult<Self> {
        let config = Self::database_config()?;
        let pool = PgPoolOptions::new()
            .max_connections(2)
            .connect_with(connect_options(&config))
            .await?;

        Ok(Self { config, pool })
    }

    /// Connection settings from the environment with test defaults
    pub fn database_config() -> TestResult<DatabaseConfig> {
        let config = MigratorConfig::from_lookup(|key| {
            std::env::var(key).ok().or_else(|| match key {
                PGUSER | PGPASSWORD | PGDATABASE => Some("test".to_string()),
                _ => None,
            })
        })?;
        Ok(config.database)
    }

    /// Migrator configuration for `path` and `table` on this database
    pub fn migrator_config(&self, path: &Path, table: &str) -> MigratorConfig {
        MigratorConfig::new(path)
            .with_table(table)
            .with_database(self.config.clone())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Execute a raw SQL statement (for test setup)
    pub async fn execute(&self, sql: &str) -> TestResult<()> {
        sqlx::query(sql).execute(&self.pool).await?;
        Ok(())
    }

    /// Whether a table is visible on the search path
    pub async fn table_exists(&self, table: &str) -> TestResult<bool> {
        let exists: bool = sqlx::query_scalar("SELECT to_regclass($1) IS NOT NULL")
            .bind(table)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    /// Ledger records of `table`, oldest first
    pub async fn ledger(&self, table: &str) -> TestResult<Vec<LedgerRecord>> {
        let sql = format!("SELECT name, created_at FROM {} ORDER BY created_at", table);
        let rows: Vec<(String, DateTime<Utc>)> = sqlx::query_as(&sql).fetch_all(&self.pool).await?;

        Ok(rows
            .into_iter()
            .map(|(name, created_at)| LedgerRecord::new(name, created_at))
            .collect())
    }

    /// Drop the given tables if they exist
    pub async fn drop_tables(&self, tables: &[&str]) -> TestResult<()> {
        for table in tables {
            self.execute(&format!("DROP TABLE IF EXISTS {} CASCADE", table))
                .await?;
        }
        Ok(())
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}
