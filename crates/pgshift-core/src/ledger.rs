//! Ledger - the table recording which migrations have been applied
//!
//! The table has no uniqueness constraint; the migrator keeps names unique.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::database::{Row, SqlValue};
use crate::error::MigrateResult;
use crate::naming::Migration;

/// One applied migration group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerRecord {
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl LedgerRecord {
    pub fn new(name: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            created_at,
        }
    }

    /// Row decoder for ledger queries
    pub fn from_row(row: &Row) -> MigrateResult<Self> {
        Ok(Self {
            name: row.text("name")?.to_string(),
            created_at: row.timestamp("created_at")?,
        })
    }

    /// The migration group this record marks as applied
    pub fn migration(&self) -> Migration {
        Migration::new(self.name.clone(), self.created_at)
    }

    /// Insert parameters, in the order of [`LedgerQueries::insert_sql`]
    pub fn params(&self) -> Vec<SqlValue> {
        vec![
            SqlValue::Text(self.name.clone()),
            SqlValue::Timestamp(self.created_at),
        ]
    }
}

impl From<&Migration> for LedgerRecord {
    fn from(migration: &Migration) -> Self {
        Self::new(migration.name.clone(), migration.created_at)
    }
}

/// SQL for one ledger table
#[derive(Debug, Clone)]
pub struct LedgerQueries {
    table: String,
}

impl LedgerQueries {
    /// `table` must already be validated as an identifier
    pub fn new(table: impl Into<String>) -> Self {
        Self { table: table.into() }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn create_table_sql(&self) -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    \
                name TEXT NOT NULL,\n    \
                created_at TIMESTAMPTZ NOT NULL\n\
            )",
            self.table
        )
    }

    pub fn select_sql(&self) -> String {
        format!("SELECT name, created_at FROM {}", self.table)
    }

    /// Most recently created migration first
    pub fn select_latest_first_sql(&self) -> String {
        format!("{} ORDER BY created_at DESC", self.select_sql())
    }

    pub fn insert_sql(&self) -> String {
        format!("INSERT INTO {} (name, created_at) VALUES ($1, $2)", self.table)
    }

    pub fn delete_sql(&self) -> String {
        format!("DELETE FROM {} WHERE name = $1", self.table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_queries_target_configured_table() {
        let queries = LedgerQueries::new("public.schema_ledger");

        assert_eq!(
            queries.create_table_sql(),
            "CREATE TABLE IF NOT EXISTS public.schema_ledger (\n    name TEXT NOT NULL,\n    created_at TIMESTAMPTZ NOT NULL\n)"
        );
        assert_eq!(queries.select_sql(), "SELECT name, created_at FROM public.schema_ledger");
        assert_eq!(
            queries.select_latest_first_sql(),
            "SELECT name, created_at FROM public.schema_ledger ORDER BY created_at DESC"
        );
        assert_eq!(
            queries.insert_sql(),
            "INSERT INTO public.schema_ledger (name, created_at) VALUES ($1, $2)"
        );
        assert_eq!(queries.delete_sql(), "DELETE FROM public.schema_ledger WHERE name = $1");
    }

    #[test]
    fn test_record_from_row() {
        let created_at = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();
        let row = Row::new()
            .with("name", "create_users")
            .with("created_at", created_at);

        let record = LedgerRecord::from_row(&row).unwrap();
        assert_eq!(record, LedgerRecord::new("create_users", created_at));
        assert_eq!(record.migration().encode(), "1700000000123-create_users");
        assert_eq!(
            record.params(),
            vec![SqlValue::from("create_users"), SqlValue::from(created_at)]
        );
    }

    #[test]
    fn test_record_from_row_requires_both_columns() {
        let row = Row::new().with("name", "create_users");
        assert!(LedgerRecord::from_row(&row).is_err());
    }
}
