//! PostgreSQL Backend Implementation
//!
//! Single-connection backend built on sqlx. Migrations never need a pool: one
//! operation owns one connection from start to finish.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::postgres::{PgArguments, PgConnectOptions, PgRow, PgSslMode};
use sqlx::query::Query;
use sqlx::{Column, Connection as _, PgConnection, Postgres, Row as _, TypeInfo, ValueRef};

use super::connection::{Connection, Connector};
use super::value::{Row, SqlValue};
use crate::config::DatabaseConfig;
use crate::error::{MigrateError, MigrateResult};

impl From<sqlx::Error> for MigrateError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) => MigrateError::Database {
                message: db.message().to_string(),
                code: db.code().map(|code| code.into_owned()),
            },
            sqlx::Error::Io(_) | sqlx::Error::Tls(_) | sqlx::Error::PoolTimedOut => {
                MigrateError::Connection(err.to_string())
            }
            _ => MigrateError::database(err.to_string()),
        }
    }
}

/// Hands out PostgreSQL connections for one configured database
#[derive(Debug, Clone)]
pub struct PgConnector {
    options: PgConnectOptions,
}

/// sqlx connect options for a database configuration
pub fn connect_options(config: &DatabaseConfig) -> PgConnectOptions {
    let ssl_mode = if config.ssl {
        PgSslMode::Require
    } else {
        PgSslMode::Disable
    };

    PgConnectOptions::new()
        .host(&config.host)
        .port(config.port)
        .username(&config.user)
        .password(&config.password)
        .database(&config.database)
        .ssl_mode(ssl_mode)
}

impl PgConnector {
    pub fn new(config: &DatabaseConfig) -> Self {
        Self {
            options: connect_options(config),
        }
    }

    pub fn from_options(options: PgConnectOptions) -> Self {
        Self { options }
    }
}

impl Connector for PgConnector {
    fn connection(&self) -> Box<dyn Connection> {
        Box::new(PostgresConnection::new(self.options.clone()))
    }
}

/// A single PostgreSQL connection, opened lazily
pub struct PostgresConnection {
    options: PgConnectOptions,
    conn: Option<PgConnection>,
}

impl PostgresConnection {
    pub fn new(options: PgConnectOptions) -> Self {
        Self { options, conn: None }
    }

    fn conn(&mut self) -> MigrateResult<&mut PgConnection> {
        self.conn
            .as_mut()
            .ok_or_else(|| MigrateError::Connection("connection is not open".to_string()))
    }
}

#[async_trait]
impl Connection for PostgresConnection {
    async fn open(&mut self) -> MigrateResult<()> {
        let conn = PgConnection::connect_with(&self.options)
            .await
            .map_err(|e| MigrateError::Connection(format!("Failed to connect to database: {}", e)))?;
        self.conn = Some(conn);
        Ok(())
    }

    async fn close(&mut self) -> MigrateResult<()> {
        if let Some(conn) = self.conn.take() {
            conn.close().await?;
        }
        Ok(())
    }

    async fn execute(&mut self, sql: &str, params: &[SqlValue]) -> MigrateResult<u64> {
        // A bare &str carries no arguments, so sqlx sends it over the simple
        // query protocol; a chunk may then hold several statements
        if params.is_empty() {
            let result = sqlx::Executor::execute(self.conn()?, sql).await?;
            return Ok(result.rows_affected());
        }

        let query = bind_all(sqlx::query(sql), params)?;
        let result = query.execute(self.conn()?).await?;
        Ok(result.rows_affected())
    }

    async fn fetch_all(&mut self, sql: &str, params: &[SqlValue]) -> MigrateResult<Vec<Row>> {
        let query = bind_all(sqlx::query(sql), params)?;
        let rows = query.fetch_all(self.conn()?).await?;
        rows.iter().map(decode_row).collect()
    }
}

fn bind_all<'q>(
    mut query: Query<'q, Postgres, PgArguments>,
    params: &[SqlValue],
) -> MigrateResult<Query<'q, Postgres, PgArguments>> {
    for param in params {
        query = match param {
            SqlValue::Null => query.bind(Option::<String>::None),
            SqlValue::Bool(b) => query.bind(*b),
            SqlValue::Integer(i) => query.bind(*i),
            SqlValue::Text(s) => query.bind(s.clone()),
            SqlValue::Timestamp(ts) => query.bind(*ts),
            SqlValue::Unsupported(type_name) => {
                return Err(MigrateError::database(format!(
                    "Cannot bind a value of unsupported type {}",
                    type_name
                )))
            }
        };
    }
    Ok(query)
}

/// Convert a PostgreSQL row into a backend neutral row
fn decode_row(row: &PgRow) -> MigrateResult<Row> {
    let mut decoded = Row::new();

    for (index, column) in row.columns().iter().enumerate() {
        let is_null = row.try_get_raw(index)?.is_null();
        let value = if is_null {
            SqlValue::Null
        } else {
            match column.type_info().name() {
                "BOOL" => SqlValue::Bool(row.try_get(index)?),
                "INT2" => SqlValue::Integer(row.try_get::<i16, _>(index)?.into()),
                "INT4" => SqlValue::Integer(row.try_get::<i32, _>(index)?.into()),
                "INT8" => SqlValue::Integer(row.try_get(index)?),
                "TEXT" | "VARCHAR" | "NAME" | "BPCHAR" => SqlValue::Text(row.try_get(index)?),
                "TIMESTAMPTZ" => SqlValue::Timestamp(row.try_get(index)?),
                "TIMESTAMP" => {
                    let naive: NaiveDateTime = row.try_get(index)?;
                    SqlValue::Timestamp(DateTime::from_naive_utc_and_offset(naive, Utc))
                }
                other => SqlValue::Unsupported(other.to_string()),
            }
        };
        decoded.push(column.name(), value);
    }

    Ok(decoded)
}
