//! Database access for the migrator
//!
//! The migrator talks to the database through [`Executor`], which wraps a
//! single [`Connection`]. PostgreSQL is the only shipped backend.

pub mod connection;
pub mod executor;
pub mod postgres;
pub mod value;

pub use connection::{Connection, Connector};
pub use executor::{Executor, ExecutorState, RowDecoder};
pub use postgres::{connect_options, PgConnector, PostgresConnection};
pub use value::{Row, SqlValue};
