//! Query builder - core state

use super::types::*;
use crate::backends::DatabaseValue;
use crate::cache::CacheDirective;

/// Fluent query builder. Clause order is preserved and directly determines
/// both generated SQL clause order and parameter-binding order. Methods
/// consume and return the builder; clone explicitly when independent
/// copies are needed (chunking does this per page).
#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    pub(crate) table: Option<String>,
    pub(crate) columns: Vec<String>,
    pub(crate) raw_selects: Vec<(String, Vec<DatabaseValue>)>,
    pub(crate) joins: Vec<JoinClause>,
    pub(crate) wheres: Vec<WhereClause>,
    pub(crate) orders: Vec<(String, OrderDirection)>,
    pub(crate) limit: Option<u64>,
    pub(crate) offset: Option<u64>,
    pub(crate) cache: Option<CacheDirective>,
}

impl QueryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a query against the given table
    pub fn table(name: &str) -> Self {
        Self::new().from(name)
    }

    /// Set the table
    pub fn from(mut self, table: &str) -> Self {
        self.table = Some(table.to_string());
        self
    }

    pub fn table_name(&self) -> Option<&str> {
        self.table.as_deref()
    }

    /// INNER JOIN on a single column equality (pivot and through tables)
    pub fn inner_join(mut self, table: &str, left: &str, right: &str) -> Self {
        self.joins.push(JoinClause {
            table: table.to_string(),
            left: left.to_string(),
            right: right.to_string(),
        });
        self
    }

    pub(crate) fn push_where(mut self, boolean: BoolOp, kind: WhereKind) -> Self {
        self.wheres.push(WhereClause { boolean, kind });
        self
    }
}
