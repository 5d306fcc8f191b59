//! SQLite backend
//!
//! Same shape as the PostgreSQL backend, with two differences: `?`
//! placeholders pass through untouched, and every driver error is wrapped
//! with a uniform "SQLite error:" prefix.

use async_trait::async_trait;
use sqlx::{sqlite::SqlitePoolOptions, Column, Pool, Row, Sqlite, TypeInfo};
use std::sync::Arc;

use super::core::{
    DatabaseConnection, DatabasePool, DatabasePoolConfig, DatabasePoolStats, DatabaseValue,
    QueryOutput, SqlDialect, SqlRow,
};
use crate::error::{OrmError, OrmResult};

/// SQLite connection pool implementation
pub struct SqlitePool {
    pool: Arc<Pool<Sqlite>>,
}

impl SqlitePool {
    pub fn new(pool: Arc<Pool<Sqlite>>) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str, config: DatabasePoolConfig) -> OrmResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(std::time::Duration::from_secs(config.acquire_timeout_seconds))
            .connect(database_url)
            .await
            .map_err(wrap)?;
        Ok(Self::new(Arc::new(pool)))
    }
}

/// Uniform wrapping for SQLite driver failures
fn wrap(err: sqlx::Error) -> OrmError {
    OrmError::Database(format!("SQLite error: {}", err))
}

#[async_trait]
impl DatabasePool for SqlitePool {
    async fn acquire(&self) -> OrmResult<Box<dyn DatabaseConnection>> {
        let conn = self.pool.acquire().await.map_err(wrap)?;
        Ok(Box::new(SqliteConnection { conn }))
    }

    async fn query(&self, sql: &str, bindings: &[DatabaseValue]) -> OrmResult<QueryOutput> {
        let mut query = sqlx::query(sql);
        for binding in bindings {
            query = bind_value(query, binding);
        }

        if sql.trim_start().get(..6).map(str::to_ascii_uppercase).as_deref() == Some("SELECT") {
            let rows = query.fetch_all(&*self.pool).await.map_err(wrap)?;
            let mut converted = Vec::with_capacity(rows.len());
            for row in &rows {
                converted.push(convert_row(row)?);
            }
            Ok(QueryOutput::rows(converted))
        } else {
            let result = query.execute(&*self.pool).await.map_err(wrap)?;
            let mut output = QueryOutput::affected(result.rows_affected());
            output.last_insert_id = Some(result.last_insert_rowid());
            Ok(output)
        }
    }

    async fn close(&self) -> OrmResult<()> {
        self.pool.close().await;
        Ok(())
    }

    fn dialect(&self) -> SqlDialect {
        SqlDialect::SQLite
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

/// Dedicated SQLite connection, used to pin transactions
pub struct SqliteConnection {
    conn: sqlx::pool::PoolConnection<Sqlite>,
}

#[async_trait]
impl DatabaseConnection for SqliteConnection {
    async fn query(&mut self, sql: &str, bindings: &[DatabaseValue]) -> OrmResult<QueryOutput> {
        let mut query = sqlx::query(sql);
        for binding in bindings {
            query = bind_value(query, binding);
        }

        if sql.trim_start().get(..6).map(str::to_ascii_uppercase).as_deref() == Some("SELECT") {
            let rows = query.fetch_all(&mut *self.conn).await.map_err(wrap)?;
            let mut converted = Vec::with_capacity(rows.len());
            for row in &rows {
                converted.push(convert_row(row)?);
            }
            Ok(QueryOutput::rows(converted))
        } else {
            let result = query.execute(&mut *self.conn).await.map_err(wrap)?;
            let mut output = QueryOutput::affected(result.rows_affected());
            output.last_insert_id = Some(result.last_insert_rowid());
            Ok(output)
        }
    }

    async fn close(&mut self) -> OrmResult<()> {
        Ok(())
    }
}

fn bind_value<'a>(
    query: sqlx::query::Query<'a, Sqlite, sqlx::sqlite::SqliteArguments<'a>>,
    value: &DatabaseValue,
) -> sqlx::query::Query<'a, Sqlite, sqlx::sqlite::SqliteArguments<'a>> {
    match value {
        DatabaseValue::Null => query.bind(Option::<String>::None),
        DatabaseValue::Bool(b) => query.bind(*b),
        DatabaseValue::Int32(i) => query.bind(*i),
        DatabaseValue::Int64(i) => query.bind(*i),
        DatabaseValue::Float64(f) => query.bind(*f),
        DatabaseValue::String(s) => query.bind(s.clone()),
        DatabaseValue::Bytes(b) => query.bind(b.clone()),
        DatabaseValue::Uuid(u) => query.bind(u.to_string()),
        DatabaseValue::DateTime(dt) => query.bind(dt.to_rfc3339()),
        DatabaseValue::Date(d) => query.bind(d.to_string()),
        DatabaseValue::Json(j) => query.bind(j.to_string()),
    }
}

fn convert_row(row: &sqlx::sqlite::SqliteRow) -> OrmResult<SqlRow> {
    let mut out = SqlRow::new();
    for (index, column) in row.columns().iter().enumerate() {
        let type_name = column.type_info().name();
        let value = match type_name {
            "BOOLEAN" => row
                .try_get::<Option<bool>, _>(index)
                .map_err(wrap)?
                .map(DatabaseValue::Bool),
            "INTEGER" => row
                .try_get::<Option<i64>, _>(index)
                .map_err(wrap)?
                .map(DatabaseValue::Int64),
            "REAL" => row
                .try_get::<Option<f64>, _>(index)
                .map_err(wrap)?
                .map(DatabaseValue::Float64),
            "BLOB" => row
                .try_get::<Option<Vec<u8>>, _>(index)
                .map_err(wrap)?
                .map(DatabaseValue::Bytes),
            _ => row
                .try_get::<Option<String>, _>(index)
                .map_err(wrap)?
                .map(DatabaseValue::String),
        };
        out.insert(column.name(), value.unwrap_or(DatabaseValue::Null));
    }
    Ok(out)
}
