//! Core database traits
//!
//! A [`Connection`] is one physical connection; a [`Connector`] hands out a
//! fresh, unopened connection for every migrator operation.

use async_trait::async_trait;

use super::value::{Row, SqlValue};
use crate::error::MigrateResult;

/// Abstract database connection
#[async_trait]
pub trait Connection: Send {
    /// Open the connection
    async fn open(&mut self) -> MigrateResult<()>;

    /// Close the connection
    async fn close(&mut self) -> MigrateResult<()>;

    /// Execute a statement and return the affected rows count
    async fn execute(&mut self, sql: &str, params: &[SqlValue]) -> MigrateResult<u64>;

    /// Execute a statement and return the result rows
    async fn fetch_all(&mut self, sql: &str, params: &[SqlValue]) -> MigrateResult<Vec<Row>>;
}

/// Factory for unopened connections
pub trait Connector: Send + Sync {
    fn connection(&self) -> Box<dyn Connection>;
}
