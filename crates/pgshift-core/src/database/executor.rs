//! Executor - connection lifecycle, row mapping and transactions
//!
//! An [`Executor`] owns exactly one connection and tracks whether it is open.
//! Every database touching method connects first when needed, so callers may
//! skip [`Executor::connect`] entirely.

use futures::future::BoxFuture;
use tracing::{debug, warn};

use super::connection::Connection;
use super::value::{Row, SqlValue};
use crate::error::MigrateResult;

/// Decodes one result row into the executor's record type
pub type RowDecoder<T> = fn(&Row) -> MigrateResult<T>;

/// Connection state of an executor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutorState {
    Disconnected,
    Connected,
}

/// Runs statements on a single connection, mapping rows through a decoder
pub struct Executor<T> {
    connection: Box<dyn Connection>,
    decode: RowDecoder<T>,
    state: ExecutorState,
}

impl<T> Executor<T> {
    /// Create a disconnected executor
    pub fn new(connection: Box<dyn Connection>, decode: RowDecoder<T>) -> Self {
        Self {
            connection,
            decode,
            state: ExecutorState::Disconnected,
        }
    }

    pub fn state(&self) -> ExecutorState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ExecutorState::Connected
    }

    /// Open the connection unless it is already open
    pub async fn connect(&mut self) -> MigrateResult<()> {
        if self.state == ExecutorState::Connected {
            return Ok(());
        }

        self.connection.open().await?;
        self.state = ExecutorState::Connected;
        debug!("Executor connected");
        Ok(())
    }

    /// Close the connection unless it is already closed
    pub async fn disconnect(&mut self) -> MigrateResult<()> {
        if self.state == ExecutorState::Disconnected {
            return Ok(());
        }

        // The connection is unusable after a failed close as well
        self.state = ExecutorState::Disconnected;
        self.connection.close().await?;
        debug!("Executor disconnected");
        Ok(())
    }

    /// Run a statement and decode every returned row
    pub async fn execute(&mut self, sql: &str, params: &[SqlValue]) -> MigrateResult<Vec<T>> {
        self.connect().await?;

        let rows = self.connection.fetch_all(sql, params).await?;
        rows.iter().map(|row| (self.decode)(row)).collect()
    }

    /// Run a statement whose rows, if any, are not needed
    pub async fn run(&mut self, sql: &str, params: &[SqlValue]) -> MigrateResult<u64> {
        self.connect().await?;

        self.connection.execute(sql, params).await
    }

    /// Run `f` inside BEGIN / COMMIT, rolling back if `f` or COMMIT fails
    ///
    /// The error returned is always the one that caused the rollback. Nesting
    /// calls to `transaction` is not supported.
    pub async fn transaction<U, F>(&mut self, f: F) -> MigrateResult<U>
    where
        F: for<'e> FnOnce(&'e mut Executor<T>) -> BoxFuture<'e, MigrateResult<U>>,
    {
        self.run("BEGIN", &[]).await?;
        debug!("Transaction started");

        let result = match f(self).await {
            Ok(value) => self.run("COMMIT", &[]).await.map(|_| value),
            Err(e) => Err(e),
        };

        match &result {
            Ok(_) => debug!("Transaction committed"),
            Err(e) => {
                debug!("Rolling back transaction: {}", e);
                if let Err(rollback_error) = self.run("ROLLBACK", &[]).await {
                    warn!("Failed to roll back transaction: {}", rollback_error);
                }
            }
        }

        result
    }
}
