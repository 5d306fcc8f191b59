//! Fluent SQL query builder
//!
//! Split across focused files: state (`builder`), clause methods
//! (`where_clause`, `select`, `ordering`), compilation
//! (`sql_generation`), and execution (`execution`, `dml`, `pagination`).

pub mod builder;
pub mod dml;
pub mod execution;
pub mod ordering;
pub mod pagination;
pub mod select;
pub mod sql_generation;
pub mod types;
pub mod where_clause;

pub use builder::QueryBuilder;
pub use pagination::{CursorPage, Paginator, SimplePage};
pub use types::{BoolOp, CompiledQuery, JoinClause, OrderDirection, WhereClause, WhereKind};
