//! Core database backend traits
//!
//! These traits abstract away driver-specific implementations and give the
//! rest of the ORM one uniform surface: `query(sql, bindings)` returning
//! rows plus affected-row info, and transaction primitives. The query
//! builder compiles to positional `?` placeholders; each dialect decides
//! how those are rewritten for the wire.

use std::collections::HashMap;
use async_trait::async_trait;
use serde_json::Value as JsonValue;

use crate::error::{OrmError, OrmResult};

/// Database value enumeration for type-safe parameter binding
#[derive(Debug, Clone, PartialEq)]
pub enum DatabaseValue {
    Null,
    Bool(bool),
    Int32(i32),
    Int64(i64),
    Float64(f64),
    String(String),
    Bytes(Vec<u8>),
    Uuid(uuid::Uuid),
    DateTime(chrono::DateTime<chrono::Utc>),
    Date(chrono::NaiveDate),
    Json(JsonValue),
}

impl DatabaseValue {
    pub fn is_null(&self) -> bool {
        matches!(self, DatabaseValue::Null)
    }

    /// Convert to JSON value (used by the query log, cache, and `to_json`)
    pub fn to_json(&self) -> JsonValue {
        match self {
            DatabaseValue::Null => JsonValue::Null,
            DatabaseValue::Bool(b) => JsonValue::Bool(*b),
            DatabaseValue::Int32(i) => JsonValue::Number(serde_json::Number::from(*i)),
            DatabaseValue::Int64(i) => JsonValue::Number(serde_json::Number::from(*i)),
            DatabaseValue::Float64(f) => serde_json::Number::from_f64(*f)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            DatabaseValue::String(s) => JsonValue::String(s.clone()),
            DatabaseValue::Bytes(b) => JsonValue::Array(
                b.iter()
                    .map(|&x| JsonValue::Number(serde_json::Number::from(x)))
                    .collect(),
            ),
            DatabaseValue::Uuid(u) => JsonValue::String(u.to_string()),
            DatabaseValue::DateTime(dt) => JsonValue::String(dt.to_rfc3339()),
            DatabaseValue::Date(d) => JsonValue::String(d.to_string()),
            DatabaseValue::Json(j) => j.clone(),
        }
    }

    /// Create a DatabaseValue from a JSON value
    pub fn from_json(json: JsonValue) -> Self {
        match json {
            JsonValue::Null => DatabaseValue::Null,
            JsonValue::Bool(b) => DatabaseValue::Bool(b),
            JsonValue::Number(n) => {
                if let Some(i) = n.as_i64() {
                    DatabaseValue::Int64(i)
                } else if let Some(f) = n.as_f64() {
                    DatabaseValue::Float64(f)
                } else {
                    DatabaseValue::Null
                }
            }
            JsonValue::String(s) => DatabaseValue::String(s),
            JsonValue::Array(_) | JsonValue::Object(_) => DatabaseValue::Json(json),
        }
    }

    /// Interpret the value as an i64 where possible (aggregate results)
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            DatabaseValue::Int32(i) => Some(*i as i64),
            DatabaseValue::Int64(i) => Some(*i),
            DatabaseValue::Float64(f) => Some(*f as i64),
            DatabaseValue::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// Interpret the value as a string where possible (morph type tags)
    pub fn as_str(&self) -> Option<&str> {
        match self {
            DatabaseValue::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<bool> for DatabaseValue {
    fn from(value: bool) -> Self {
        DatabaseValue::Bool(value)
    }
}

impl From<i32> for DatabaseValue {
    fn from(value: i32) -> Self {
        DatabaseValue::Int32(value)
    }
}

impl From<i64> for DatabaseValue {
    fn from(value: i64) -> Self {
        DatabaseValue::Int64(value)
    }
}

impl From<f64> for DatabaseValue {
    fn from(value: f64) -> Self {
        DatabaseValue::Float64(value)
    }
}

impl From<String> for DatabaseValue {
    fn from(value: String) -> Self {
        DatabaseValue::String(value)
    }
}

impl From<&str> for DatabaseValue {
    fn from(value: &str) -> Self {
        DatabaseValue::String(value.to_string())
    }
}

impl From<Vec<u8>> for DatabaseValue {
    fn from(value: Vec<u8>) -> Self {
        DatabaseValue::Bytes(value)
    }
}

impl From<uuid::Uuid> for DatabaseValue {
    fn from(value: uuid::Uuid) -> Self {
        DatabaseValue::Uuid(value)
    }
}

impl From<chrono::DateTime<chrono::Utc>> for DatabaseValue {
    fn from(value: chrono::DateTime<chrono::Utc>) -> Self {
        DatabaseValue::DateTime(value)
    }
}

impl From<chrono::NaiveDate> for DatabaseValue {
    fn from(value: chrono::NaiveDate) -> Self {
        DatabaseValue::Date(value)
    }
}

impl From<JsonValue> for DatabaseValue {
    fn from(value: JsonValue) -> Self {
        DatabaseValue::Json(value)
    }
}

impl<T> From<Option<T>> for DatabaseValue
where
    T: Into<DatabaseValue>,
{
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => v.into(),
            None => DatabaseValue::Null,
        }
    }
}

/// A single result row: column order plus values by name
#[derive(Debug, Clone, Default)]
pub struct SqlRow {
    columns: Vec<String>,
    values: HashMap<String, DatabaseValue>,
}

impl SqlRow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a row from (column, value) pairs, preserving column order
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (String, DatabaseValue)>,
    {
        let mut row = Self::new();
        for (column, value) in pairs {
            row.insert(column, value);
        }
        row
    }

    pub fn insert(&mut self, column: impl Into<String>, value: DatabaseValue) {
        let column = column.into();
        if !self.values.contains_key(&column) {
            self.columns.push(column.clone());
        }
        self.values.insert(column, value);
    }

    pub fn get(&self, column: &str) -> Option<&DatabaseValue> {
        self.values.get(column)
    }

    pub fn take(&mut self, column: &str) -> Option<DatabaseValue> {
        if let Some(pos) = self.columns.iter().position(|c| c == column) {
            self.columns.remove(pos);
        }
        self.values.remove(column)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Iterate (column, value) in column order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &DatabaseValue)> {
        self.columns
            .iter()
            .filter_map(move |c| self.values.get(c).map(|v| (c, v)))
    }

    pub fn to_json(&self) -> JsonValue {
        let mut map = serde_json::Map::new();
        for (column, value) in self.iter() {
            map.insert(column.clone(), value.to_json());
        }
        JsonValue::Object(map)
    }

    pub fn from_json(json: &JsonValue) -> OrmResult<Self> {
        let obj = json
            .as_object()
            .ok_or_else(|| OrmError::Serialization("expected a JSON object row".to_string()))?;
        let mut row = Self::new();
        for (column, value) in obj {
            row.insert(column.clone(), DatabaseValue::from_json(value.clone()));
        }
        Ok(row)
    }
}

/// Result of executing one statement against a backend
#[derive(Debug, Clone, Default)]
pub struct QueryOutput {
    pub rows: Vec<SqlRow>,
    pub affected_rows: u64,
    pub last_insert_id: Option<i64>,
}

impl QueryOutput {
    pub fn rows(rows: Vec<SqlRow>) -> Self {
        Self {
            rows,
            affected_rows: 0,
            last_insert_id: None,
        }
    }

    pub fn affected(count: u64) -> Self {
        Self {
            rows: Vec::new(),
            affected_rows: count,
            last_insert_id: None,
        }
    }
}

/// Abstract database connection trait, the driver boundary. `Send` only:
/// SQLite's raw handle is not `Sync`, and pinned connections are always
/// used behind `&mut` inside the connection's transaction slot.
#[async_trait]
pub trait DatabaseConnection: Send {
    /// Execute a statement and return rows / affected-row info
    async fn query(&mut self, sql: &str, bindings: &[DatabaseValue]) -> OrmResult<QueryOutput>;

    /// Begin a transaction on this connection
    async fn begin_transaction(&mut self) -> OrmResult<()> {
        self.query("BEGIN", &[]).await.map(|_| ())
    }

    /// Commit the active transaction
    async fn commit(&mut self) -> OrmResult<()> {
        self.query("COMMIT", &[]).await.map(|_| ())
    }

    /// Roll back the active transaction
    async fn rollback(&mut self) -> OrmResult<()> {
        self.query("ROLLBACK", &[]).await.map(|_| ())
    }

    /// Close the connection
    async fn close(&mut self) -> OrmResult<()>;
}

/// Abstract database connection pool trait
#[async_trait]
pub trait DatabasePool: Send + Sync {
    /// Acquire a dedicated connection from the pool
    async fn acquire(&self) -> OrmResult<Box<dyn DatabaseConnection>>;

    /// Execute a statement directly on the pool
    async fn query(&self, sql: &str, bindings: &[DatabaseValue]) -> OrmResult<QueryOutput>;

    /// Close the pool
    async fn close(&self) -> OrmResult<()>;

    /// The SQL dialect spoken by this pool
    fn dialect(&self) -> SqlDialect;

    /// Pool statistics
    fn stats(&self) -> DatabasePoolStats {
        DatabasePoolStats::default()
    }

    /// Round-trip health check
    async fn health_check(&self) -> OrmResult<std::time::Duration> {
        let start = std::time::Instant::now();
        self.query("SELECT 1", &[]).await?;
        Ok(start.elapsed())
    }
}

/// Database pool statistics
#[derive(Debug, Clone, Default)]
pub struct DatabasePoolStats {
    pub total_connections: u32,
    pub idle_connections: u32,
    pub active_connections: u32,
}

/// Database pool configuration
#[derive(Debug, Clone)]
pub struct DatabasePoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_seconds: u64,
    pub idle_timeout_seconds: Option<u64>,
    pub max_lifetime_seconds: Option<u64>,
    pub test_before_acquire: bool,
}

impl Default for DatabasePoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 1,
            acquire_timeout_seconds: 30,
            idle_timeout_seconds: Some(600),
            max_lifetime_seconds: Some(1800),
            test_before_acquire: true,
        }
    }
}

/// SQL dialect enumeration for generating database-specific SQL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlDialect {
    PostgreSQL,
    MySQL,
    SQLite,
}

impl SqlDialect {
    /// Rewrite the builder's positional `?` placeholders into the wire
    /// format this dialect expects. Question marks inside single-quoted
    /// string literals are left alone.
    pub fn rewrite_placeholders(&self, sql: &str) -> String {
        match self {
            SqlDialect::MySQL | SqlDialect::SQLite => sql.to_string(),
            SqlDialect::PostgreSQL => {
                let mut out = String::with_capacity(sql.len() + 8);
                let mut index = 0usize;
                let mut in_string = false;
                for ch in sql.chars() {
                    match ch {
                        '\'' => {
                            in_string = !in_string;
                            out.push(ch);
                        }
                        '?' if !in_string => {
                            index += 1;
                            out.push('$');
                            out.push_str(&index.to_string());
                        }
                        _ => out.push(ch),
                    }
                }
                out
            }
        }
    }

    /// Quote character for identifiers in this dialect
    pub fn identifier_quote(&self) -> char {
        match self {
            SqlDialect::PostgreSQL | SqlDialect::SQLite => '"',
            SqlDialect::MySQL => '`',
        }
    }

    /// Current-timestamp function for this dialect
    pub fn current_timestamp(&self) -> &'static str {
        match self {
            SqlDialect::PostgreSQL => "NOW()",
            SqlDialect::MySQL => "CURRENT_TIMESTAMP",
            SqlDialect::SQLite => "datetime('now')",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_rewrite_numbers_left_to_right() {
        let sql = "SELECT * FROM users WHERE a = ? AND b IN (?, ?)";
        assert_eq!(
            SqlDialect::PostgreSQL.rewrite_placeholders(sql),
            "SELECT * FROM users WHERE a = $1 AND b IN ($2, $3)"
        );
        assert_eq!(SqlDialect::SQLite.rewrite_placeholders(sql), sql);
    }

    #[test]
    fn placeholder_rewrite_skips_string_literals() {
        let sql = "SELECT * FROM notes WHERE body = '?' AND id = ?";
        assert_eq!(
            SqlDialect::PostgreSQL.rewrite_placeholders(sql),
            "SELECT * FROM notes WHERE body = '?' AND id = $1"
        );
    }

    #[test]
    fn sql_row_preserves_column_order() {
        let mut row = SqlRow::new();
        row.insert("b", DatabaseValue::Int64(2));
        row.insert("a", DatabaseValue::Int64(1));
        assert_eq!(row.columns(), &["b".to_string(), "a".to_string()]);
        assert_eq!(row.get("a"), Some(&DatabaseValue::Int64(1)));
    }

    #[test]
    fn database_value_json_round_trip() {
        let value = DatabaseValue::Int64(42);
        assert_eq!(DatabaseValue::from_json(value.to_json()), value);
        let s = DatabaseValue::String("hello".into());
        assert_eq!(DatabaseValue::from_json(s.to_json()), s);
    }
}
