//! Query builder projection and cache directives

use std::time::Duration;

use super::builder::QueryBuilder;
use crate::backends::DatabaseValue;
use crate::cache::CacheDirective;

impl QueryBuilder {
    /// Replace the projection with the given columns
    pub fn select(mut self, columns: &[&str]) -> Self {
        self.columns = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    /// Append one named column to the projection
    pub fn add_select(mut self, column: &str) -> Self {
        self.columns.push(column.to_string());
        self
    }

    /// Append a raw select expression with its bindings. Raw expressions
    /// are emitted after named columns, and their bindings precede all
    /// where-bindings in the compiled statement.
    pub fn select_raw(mut self, sql: &str, bindings: Vec<DatabaseValue>) -> Self {
        self.raw_selects.push((sql.to_string(), bindings));
        self
    }

    /// Cache this query's results for `ttl`, keyed by a digest of the
    /// compiled SQL and bindings
    pub fn cached(mut self, ttl: Duration) -> Self {
        self.cache = Some(CacheDirective { ttl, key: None });
        self
    }

    /// Cache with an explicit key
    pub fn cached_with_key(mut self, ttl: Duration, key: &str) -> Self {
        self.cache = Some(CacheDirective {
            ttl,
            key: Some(key.to_string()),
        });
        self
    }
}
