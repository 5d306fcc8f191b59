//! PostgreSQL backend
//!
//! Implements the backend traits over sqlx. The builder's `?` placeholders
//! are rewritten to `$n` before dispatch since PostgreSQL only understands
//! numbered parameters.

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use sqlx::{postgres::PgPoolOptions, Column, Pool, Postgres, Row, TypeInfo};
use std::sync::Arc;

use super::core::{
    DatabaseConnection, DatabasePool, DatabasePoolConfig, DatabasePoolStats, DatabaseValue,
    QueryOutput, SqlDialect, SqlRow,
};
use crate::error::{OrmError, OrmResult};

/// PostgreSQL connection pool implementation
pub struct PostgresPool {
    pool: Arc<Pool<Postgres>>,
}

impl PostgresPool {
    pub fn new(pool: Arc<Pool<Postgres>>) -> Self {
        Self { pool }
    }

    /// Connect with the given pool configuration
    pub async fn connect(database_url: &str, config: DatabasePoolConfig) -> OrmResult<Self> {
        let mut options = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(std::time::Duration::from_secs(config.acquire_timeout_seconds))
            .test_before_acquire(config.test_before_acquire);

        if let Some(idle_timeout) = config.idle_timeout_seconds {
            options = options.idle_timeout(std::time::Duration::from_secs(idle_timeout));
        }

        if let Some(max_lifetime) = config.max_lifetime_seconds {
            options = options.max_lifetime(std::time::Duration::from_secs(max_lifetime));
        }

        let pool = options
            .connect(database_url)
            .await
            .map_err(|e| OrmError::Connection(format!("Failed to create PostgreSQL pool: {}", e)))?;

        Ok(Self::new(Arc::new(pool)))
    }
}

#[async_trait]
impl DatabasePool for PostgresPool {
    async fn acquire(&self) -> OrmResult<Box<dyn DatabaseConnection>> {
        let conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| OrmError::Connection(format!("Failed to acquire connection: {}", e)))?;
        Ok(Box::new(PostgresConnection { conn }))
    }

    async fn query(&self, sql: &str, bindings: &[DatabaseValue]) -> OrmResult<QueryOutput> {
        let sql = SqlDialect::PostgreSQL.rewrite_placeholders(sql);
        let mut query = sqlx::query(&sql);
        for binding in bindings {
            query = bind_value(query, binding);
        }

        if returns_rows(&sql) {
            let rows = query.fetch_all(&*self.pool).await?;
            let mut converted = Vec::with_capacity(rows.len());
            for row in &rows {
                converted.push(convert_row(row)?);
            }
            Ok(QueryOutput::rows(converted))
        } else {
            let result = query.execute(&*self.pool).await?;
            Ok(QueryOutput::affected(result.rows_affected()))
        }
    }

    async fn close(&self) -> OrmResult<()> {
        self.pool.close().await;
        Ok(())
    }

    fn dialect(&self) -> SqlDialect {
        SqlDialect::PostgreSQL
    }

    fn stats(&self) -> DatabasePoolStats {
        let total = self.pool.size();
        let idle = self.pool.num_idle() as u32;
        DatabasePoolStats {
            total_connections: total,
            idle_connections: idle,
            active_connections: total.saturating_sub(idle),
        }
    }
}

/// Dedicated PostgreSQL connection, used to pin transactions
pub struct PostgresConnection {
    conn: sqlx::pool::PoolConnection<Postgres>,
}

#[async_trait]
impl DatabaseConnection for PostgresConnection {
    async fn query(&mut self, sql: &str, bindings: &[DatabaseValue]) -> OrmResult<QueryOutput> {
        let sql = SqlDialect::PostgreSQL.rewrite_placeholders(sql);
        let mut query = sqlx::query(&sql);
        for binding in bindings {
            query = bind_value(query, binding);
        }

        if returns_rows(&sql) {
            let rows = query.fetch_all(&mut *self.conn).await?;
            let mut converted = Vec::with_capacity(rows.len());
            for row in &rows {
                converted.push(convert_row(row)?);
            }
            Ok(QueryOutput::rows(converted))
        } else {
            let result = query.execute(&mut *self.conn).await?;
            Ok(QueryOutput::affected(result.rows_affected()))
        }
    }

    async fn close(&mut self) -> OrmResult<()> {
        // Returned to the pool on drop
        Ok(())
    }
}

/// Statements that produce a row set. RETURNING makes writes produce rows
/// too, which matters for insert-and-get-id.
fn returns_rows(sql: &str) -> bool {
    let trimmed = sql.trim_start();
    let upper = trimmed.get(..6).map(str::to_ascii_uppercase);
    matches!(upper.as_deref(), Some("SELECT"))
        || sql.to_ascii_uppercase().contains(" RETURNING ")
}

fn bind_value<'a>(
    query: sqlx::query::Query<'a, Postgres, sqlx::postgres::PgArguments>,
    value: &DatabaseValue,
) -> sqlx::query::Query<'a, Postgres, sqlx::postgres::PgArguments> {
    match value {
        DatabaseValue::Null => query.bind(Option::<String>::None),
        DatabaseValue::Bool(b) => query.bind(*b),
        DatabaseValue::Int32(i) => query.bind(*i),
        DatabaseValue::Int64(i) => query.bind(*i),
        DatabaseValue::Float64(f) => query.bind(*f),
        DatabaseValue::String(s) => query.bind(s.clone()),
        DatabaseValue::Bytes(b) => query.bind(b.clone()),
        DatabaseValue::Uuid(u) => query.bind(*u),
        DatabaseValue::DateTime(dt) => query.bind(*dt),
        DatabaseValue::Date(d) => query.bind(*d),
        DatabaseValue::Json(j) => query.bind(j.clone()),
    }
}

fn convert_row(row: &sqlx::postgres::PgRow) -> OrmResult<SqlRow> {
    let mut out = SqlRow::new();
    for (index, column) in row.columns().iter().enumerate() {
        out.insert(column.name(), convert_value(row, index)?);
    }
    Ok(out)
}

fn convert_value(row: &sqlx::postgres::PgRow, index: usize) -> OrmResult<DatabaseValue> {
    let column = &row.columns()[index];
    let type_name = column.type_info().name();

    let value = match type_name {
        "BOOL" => row
            .try_get::<Option<bool>, _>(index)?
            .map(DatabaseValue::Bool),
        "INT2" => row
            .try_get::<Option<i16>, _>(index)?
            .map(|v| DatabaseValue::Int32(v as i32)),
        "INT4" => row
            .try_get::<Option<i32>, _>(index)?
            .map(DatabaseValue::Int32),
        "INT8" => row
            .try_get::<Option<i64>, _>(index)?
            .map(DatabaseValue::Int64),
        "FLOAT4" => row
            .try_get::<Option<f32>, _>(index)?
            .map(|v| DatabaseValue::Float64(v as f64)),
        "FLOAT8" => row
            .try_get::<Option<f64>, _>(index)?
            .map(DatabaseValue::Float64),
        "BYTEA" => row
            .try_get::<Option<Vec<u8>>, _>(index)?
            .map(DatabaseValue::Bytes),
        "UUID" => row
            .try_get::<Option<uuid::Uuid>, _>(index)?
            .map(DatabaseValue::Uuid),
        "TIMESTAMPTZ" | "TIMESTAMP" => row
            .try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(index)?
            .map(DatabaseValue::DateTime),
        "DATE" => row
            .try_get::<Option<chrono::NaiveDate>, _>(index)?
            .map(DatabaseValue::Date),
        "JSON" | "JSONB" => row
            .try_get::<Option<JsonValue>, _>(index)?
            .map(DatabaseValue::Json),
        _ => row
            .try_get::<Option<String>, _>(index)?
            .map(DatabaseValue::String),
    };

    Ok(value.unwrap_or(DatabaseValue::Null))
}
