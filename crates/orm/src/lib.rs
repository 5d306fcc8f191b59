//! opal-orm - Fluent query builder and active-record model layer
//!
//! The crate is organized in layers:
//! - `backends`: driver traits, values, rows, and the concrete
//!   PostgreSQL / SQLite / document-store backends
//! - `connection`: named handles with read/write routing, the query
//!   log, and the transaction pin
//! - `query`: the fluent SQL builder, compilation, and execution
//! - `model`: definitions, instances, casts, observers, serialization
//! - `relations`: the relation engine, from has-one to morph-to
//! - `transactions`: depth-counted nesting over savepoints
//! - `cache`: query result caching with derived keys

pub mod backends;
pub mod cache;
pub mod connection;
pub mod error;
pub mod model;
pub mod query;
pub mod query_log;
pub mod relations;
pub mod transactions;

pub use backends::{
    DatabaseConnection, DatabasePool, DatabasePoolConfig, DatabasePoolStats, DatabaseValue,
    PostgresPool, QueryOutput, ScriptedPool, SqlDialect, SqlRow, SqlitePool,
};
pub use cache::{CacheStore, MemoryCacheStore};
pub use connection::Connection;
pub use error::{ModelError, ModelResult, OrmError, OrmResult};
pub use model::{
    CastType, Model, ModelDefinition, ModelObserver, ModelQuery, ModelRegistry, RelationDef,
};
pub use query::{CursorPage, OrderDirection, Paginator, QueryBuilder, SimplePage};
pub use query_log::{QueryLog, QueryLogEntry};
pub use relations::{Relation, RelationValue, SyncResult};
