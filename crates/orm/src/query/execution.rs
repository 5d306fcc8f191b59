//! Query builder execution
//!
//! Terminal operations that hand the compiled statement to a
//! `Connection`. A cache directive on the builder reroutes `get()`
//! through the connection's cache store when one is attached.

use serde_json::Value as JsonValue;

use super::builder::QueryBuilder;
use crate::backends::SqlRow;
use crate::cache::{derive_cache_key, remember};
use crate::connection::Connection;
use crate::error::{ModelError, ModelResult};

impl QueryBuilder {
    /// Execute the query and return all matching rows
    pub async fn get(self, conn: &Connection) -> ModelResult<Vec<SqlRow>> {
        let directive = self.cache.clone();
        let compiled = self.compile_select()?;

        if let (Some(directive), Some(store)) = (directive, conn.cache_store()) {
            let key = directive
                .key
                .unwrap_or_else(|| derive_cache_key(&compiled.sql, &compiled.bindings));
            let cached = remember(store.as_ref(), &key, directive.ttl, || async {
                let output = conn.run(&compiled.sql, &compiled.bindings).await?;
                Ok(JsonValue::Array(
                    output.rows.iter().map(SqlRow::to_json).collect(),
                ))
            })
            .await?;
            let rows = cached
                .as_array()
                .ok_or_else(|| {
                    ModelError::Cache("cached query result is not a row array".to_string())
                })?
                .iter()
                .map(SqlRow::from_json)
                .collect::<ModelResult<Vec<_>>>()?;
            return Ok(rows);
        }

        let output = conn.run(&compiled.sql, &compiled.bindings).await?;
        Ok(output.rows)
    }

    /// Execute with `LIMIT 1` and return the row, if any
    pub async fn first(self, conn: &Connection) -> ModelResult<Option<SqlRow>> {
        let mut rows = self.limit(1).get(conn).await?;
        Ok(rows.pop())
    }

    /// Like `first`, but a missing row is an error
    pub async fn first_or_fail(self, conn: &Connection) -> ModelResult<SqlRow> {
        let table = self.table_name().unwrap_or("<unknown>").to_string();
        self.first(conn)
            .await?
            .ok_or_else(|| ModelError::NotFound(format!("no rows found in {}", table)))
    }

    /// `SELECT COUNT(*)` over the current WHERE state
    pub async fn count(self, conn: &Connection) -> ModelResult<i64> {
        self.count_column("*", conn).await
    }

    /// Count a specific column expression
    pub async fn count_column(self, column: &str, conn: &Connection) -> ModelResult<i64> {
        let compiled = self.compile_count(column)?;
        let output = conn.run(&compiled.sql, &compiled.bindings).await?;
        let value = output
            .rows
            .first()
            .and_then(|row| row.iter().next().map(|(_, v)| v.clone()))
            .ok_or_else(|| ModelError::Query("count query returned no rows".to_string()))?;
        value
            .as_i64()
            .ok_or_else(|| ModelError::Query("count query returned a non-numeric value".to_string()))
    }
}
