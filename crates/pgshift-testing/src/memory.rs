//! In-memory database
//!
//! [`MemoryDatabase`] recognizes the statements the migrator issues against
//! its ledger table and treats everything else as a script statement. BEGIN
//! snapshots the ledger and the executed statements, ROLLBACK restores them,
//! so a rolled back batch leaves no trace just like in PostgreSQL.
//!
//! Statements run outside a transaction take effect immediately.

use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

use pgshift_core::error::UNDEFINED_TABLE;
use pgshift_core::{
    Connection, Connector, LedgerQueries, LedgerRecord, MigrateError, MigrateResult, Row,
    SqlValue,
};

/// SQLSTATE used for injected script failures (syntax error)
pub const SYNTAX_ERROR: &str = "42601";

#[derive(Debug, Default)]
struct State {
    /// `None` until the ledger table is created
    ledger: Option<Vec<LedgerRecord>>,
    executed: Vec<String>,
    statements: Vec<String>,
    snapshot: Option<Snapshot>,
    opened: usize,
    closed: usize,
    failing: Vec<String>,
    ledger_read_error: Option<String>,
    unreachable: bool,
}

#[derive(Debug)]
struct Snapshot {
    ledger: Option<Vec<LedgerRecord>>,
    executed: Vec<String>,
}

/// Shared in-memory database; clones observe the same state
#[derive(Debug, Clone)]
pub struct MemoryDatabase {
    queries: LedgerQueries,
    state: Arc<Mutex<State>>,
}

impl MemoryDatabase {
    /// Create an empty database whose ledger lives in `table`
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            queries: LedgerQueries::new(table),
            state: Arc::new(Mutex::new(State::default())),
        }
    }

    /// Connector handing out connections to this database
    pub fn connector(&self) -> Arc<dyn Connector> {
        Arc::new(self.clone())
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current ledger contents in insertion order; empty without a ledger table
    pub fn ledger(&self) -> Vec<LedgerRecord> {
        self.state().ledger.clone().unwrap_or_default()
    }

    pub fn has_ledger_table(&self) -> bool {
        self.state().ledger.is_some()
    }

    /// Names of ledger records, in insertion order
    pub fn ledger_names(&self) -> Vec<String> {
        self.ledger().into_iter().map(|record| record.name).collect()
    }

    /// Script statements that took effect, trimmed
    pub fn executed(&self) -> Vec<String> {
        self.state().executed.clone()
    }

    /// Every statement received, including rolled back and failed ones
    pub fn statements(&self) -> Vec<String> {
        self.state().statements.clone()
    }

    pub fn connections_opened(&self) -> usize {
        self.state().opened
    }

    /// Connections opened and not closed yet
    pub fn open_connections(&self) -> usize {
        let state = self.state();
        state.opened - state.closed
    }

    /// Whether a transaction is currently open
    pub fn in_transaction(&self) -> bool {
        self.state().snapshot.is_some()
    }

    /// Fail every script statement containing `marker`
    pub fn fail_on(&self, marker: impl Into<String>) {
        self.state().failing.push(marker.into());
    }

    /// Fail ledger reads with the given SQLSTATE
    pub fn fail_ledger_reads(&self, code: impl Into<String>) {
        self.state().ledger_read_error = Some(code.into());
    }

    /// Refuse new connections
    pub fn set_unreachable(&self, unreachable: bool) {
        self.state().unreachable = unreachable;
    }

    /// Create the ledger table holding `records`
    pub fn seed_ledger(&self, records: impl IntoIterator<Item = LedgerRecord>) {
        self.state().ledger = Some(records.into_iter().collect());
    }

    fn dispatch(&self, sql: &str, params: &[SqlValue]) -> MigrateResult<(u64, Vec<Row>)> {
        let sql = sql.trim();
        let table = self.queries.table();
        let mut state = self.state();
        state.statements.push(sql.to_string());

        if sql.eq_ignore_ascii_case("BEGIN") {
            if state.snapshot.is_some() {
                return Err(MigrateError::database("there is already a transaction in progress"));
            }
            let snapshot = Snapshot {
                ledger: state.ledger.clone(),
                executed: state.executed.clone(),
            };
            state.snapshot = Some(snapshot);
            return Ok((0, Vec::new()));
        }

        if sql.eq_ignore_ascii_case("COMMIT") {
            state.snapshot = None;
            return Ok((0, Vec::new()));
        }

        if sql.eq_ignore_ascii_case("ROLLBACK") {
            if let Some(snapshot) = state.snapshot.take() {
                state.ledger = snapshot.ledger;
                state.executed = snapshot.executed;
            }
            return Ok((0, Vec::new()));
        }

        if sql.starts_with(&format!("CREATE TABLE IF NOT EXISTS {} ", table)) {
            state.ledger.get_or_insert_with(Vec::new);
            return Ok((0, Vec::new()));
        }

        if sql.starts_with(&self.queries.select_sql()) {
            if let Some(code) = &state.ledger_read_error {
                return Err(MigrateError::Database {
                    message: "ledger read failed".to_string(),
                    code: Some(code.clone()),
                });
            }
            let mut records = state.ledger.clone().ok_or_else(|| undefined_table(table))?;
            if sql.contains("ORDER BY created_at DESC") {
                records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            }
            let rows = records
                .into_iter()
                .map(|record| {
                    Row::new()
                        .with("name", record.name)
                        .with("created_at", record.created_at)
                })
                .collect();
            return Ok((0, rows));
        }

        if sql.starts_with(&format!("INSERT INTO {} ", table)) {
            let record = match params {
                [SqlValue::Text(name), SqlValue::Timestamp(created_at)] => {
                    LedgerRecord::new(name.clone(), *created_at)
                }
                other => {
                    return Err(MigrateError::database(format!(
                        "unexpected ledger insert parameters {:?}",
                        other
                    )))
                }
            };
            let ledger = state.ledger.as_mut().ok_or_else(|| undefined_table(table))?;
            ledger.push(record);
            return Ok((1, Vec::new()));
        }

        if sql.starts_with(&format!("DELETE FROM {} ", table)) {
            let name = match params {
                [SqlValue::Text(name)] => name.clone(),
                other => {
                    return Err(MigrateError::database(format!(
                        "unexpected ledger delete parameters {:?}",
                        other
                    )))
                }
            };
            let ledger = state.ledger.as_mut().ok_or_else(|| undefined_table(table))?;
            let before = ledger.len();
            ledger.retain(|record| record.name != name);
            return Ok(((before - ledger.len()) as u64, Vec::new()));
        }

        if state.failing.iter().any(|marker| sql.contains(marker.as_str())) {
            return Err(MigrateError::Database {
                message: format!("syntax error in statement: {}", sql),
                code: Some(SYNTAX_ERROR.to_string()),
            });
        }

        state.executed.push(sql.to_string());
        Ok((0, Vec::new()))
    }
}

fn undefined_table(table: &str) -> MigrateError {
    MigrateError::Database {
        message: format!("relation \"{}\" does not exist", table),
        code: Some(UNDEFINED_TABLE.to_string()),
    }
}

impl Connector for MemoryDatabase {
    fn connection(&self) -> Box<dyn Connection> {
        Box::new(MemoryConnection {
            db: self.clone(),
            open: false,
        })
    }
}

/// One connection to a [`MemoryDatabase`]
pub struct MemoryConnection {
    db: MemoryDatabase,
    open: bool,
}

impl MemoryConnection {
    fn ensure_open(&self) -> MigrateResult<()> {
        if self.open {
            Ok(())
        } else {
            Err(MigrateError::Connection("connection is not open".to_string()))
        }
    }
}

#[async_trait]
impl Connection for MemoryConnection {
    async fn open(&mut self) -> MigrateResult<()> {
        let mut state = self.db.state();
        if state.unreachable {
            return Err(MigrateError::Connection("connection refused".to_string()));
        }
        state.opened += 1;
        self.open = true;
        debug!("Memory connection opened");
        Ok(())
    }

    async fn close(&mut self) -> MigrateResult<()> {
        if self.open {
            self.open = false;
            let mut state = self.db.state();
            state.closed += 1;
            // Closing mid-transaction discards it
            if let Some(snapshot) = state.snapshot.take() {
                state.ledger = snapshot.ledger;
                state.executed = snapshot.executed;
            }
        }
        Ok(())
    }

    async fn execute(&mut self, sql: &str, params: &[SqlValue]) -> MigrateResult<u64> {
        self.ensure_open()?;
        self.db.dispatch(sql, params).map(|(affected, _)| affected)
    }

    async fn fetch_all(&mut self, sql: &str, params: &[SqlValue]) -> MigrateResult<Vec<Row>> {
        self.ensure_open()?;
        self.db.dispatch(sql, params).map(|(_, rows)| rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn record(name: &str, millis: i64) -> LedgerRecord {
        LedgerRecord::new(name, Utc.timestamp_millis_opt(millis).unwrap())
    }

    #[tokio::test]
    async fn test_select_without_table_reports_undefined_table() {
        let db = MemoryDatabase::new("migrations");
        let mut conn = db.connection();
        conn.open().await.unwrap();

        let err = conn
            .fetch_all("SELECT name, created_at FROM migrations", &[])
            .await
            .unwrap_err();
        assert!(err.is_undefined_table());
    }

    #[tokio::test]
    async fn test_rollback_restores_ledger_and_statements() {
        let db = MemoryDatabase::new("migrations");
        db.seed_ledger([record("first", 1)]);
        let mut conn = db.connection();
        conn.open().await.unwrap();

        conn.execute("BEGIN", &[]).await.unwrap();
        conn.execute("CREATE TABLE a (id INT)", &[]).await.unwrap();
        conn.execute(
            "INSERT INTO migrations (name, created_at) VALUES ($1, $2)",
            &record("second", 2).params(),
        )
        .await
        .unwrap();
        assert_eq!(db.ledger().len(), 2);
        conn.execute("ROLLBACK", &[]).await.unwrap();

        assert_eq!(db.ledger(), vec![record("first", 1)]);
        assert!(db.executed().is_empty());
        assert_eq!(db.statements().len(), 4);
    }

    #[tokio::test]
    async fn test_failing_marker_and_unreachable() {
        let db = MemoryDatabase::new("migrations");
        db.fail_on("BROKEN");
        let mut conn = db.connection();
        conn.open().await.unwrap();

        let err = conn.execute("SELECT BROKEN", &[]).await.unwrap_err();
        assert_eq!(err.sqlstate(), Some(SYNTAX_ERROR));

        db.set_unreachable(true);
        assert!(db.connection().open().await.is_err());
        assert_eq!(db.connections_opened(), 1);
    }

    #[tokio::test]
    async fn test_statements_require_open_connection() {
        let db = MemoryDatabase::new("migrations");
        let mut conn = db.connection();
        assert!(matches!(
            conn.execute("SELECT 1", &[]).await,
            Err(MigrateError::Connection(_))
        ));
    }
}
