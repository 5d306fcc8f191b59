//! Database backend abstraction
//!
//! Uniform traits over heterogeneous drivers plus the concrete backends:
//! PostgreSQL and SQLite over sqlx, the auxiliary document store, and a
//! scripted in-memory backend used as a test double.

pub mod core;
pub mod document;
pub mod postgres;
pub mod scripted;
pub mod sqlite;

pub use core::{
    DatabaseConnection, DatabasePool, DatabasePoolConfig, DatabasePoolStats, DatabaseValue,
    QueryOutput, SqlDialect, SqlRow,
};
pub use document::{CollectionHandle, DocumentConnection, DocumentStore};
pub use postgres::PostgresPool;
pub use scripted::ScriptedPool;
pub use sqlite::SqlitePool;
