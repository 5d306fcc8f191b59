//! Query builder INSERT / UPDATE / DELETE execution

use super::builder::QueryBuilder;
use crate::backends::{DatabaseValue, QueryOutput, SqlDialect, SqlRow};
use crate::connection::Connection;
use crate::error::ModelResult;

impl QueryBuilder {
    /// Insert one or more rows
    pub async fn insert(self, rows: &[SqlRow], conn: &Connection) -> ModelResult<QueryOutput> {
        let compiled = self.compile_insert(rows)?;
        conn.run(&compiled.sql, &compiled.bindings).await
    }

    /// Insert one row and return its generated primary key. Postgres
    /// reports the key via RETURNING; the other dialects report the
    /// driver's last-insert id.
    pub async fn insert_get_id(
        self,
        row: &SqlRow,
        primary_key: &str,
        conn: &Connection,
    ) -> ModelResult<Option<DatabaseValue>> {
        let mut compiled = self.compile_insert(std::slice::from_ref(row))?;
        if conn.dialect() == SqlDialect::PostgreSQL {
            compiled.sql.push_str(&format!(" RETURNING {}", primary_key));
            let output = conn.run(&compiled.sql, &compiled.bindings).await?;
            return Ok(output
                .rows
                .first()
                .and_then(|r| r.get(primary_key).cloned()));
        }
        let output = conn.run(&compiled.sql, &compiled.bindings).await?;
        Ok(output.last_insert_id.map(DatabaseValue::Int64))
    }

    /// Update rows matching the current WHERE state; returns the
    /// affected-row count
    pub async fn update(self, data: &SqlRow, conn: &Connection) -> ModelResult<u64> {
        let compiled = self.compile_update(data)?;
        let output = conn.run(&compiled.sql, &compiled.bindings).await?;
        Ok(output.affected_rows)
    }

    /// Delete rows matching the current WHERE state; returns the
    /// affected-row count
    pub async fn delete(self, conn: &Connection) -> ModelResult<u64> {
        let compiled = self.compile_delete()?;
        let output = conn.run(&compiled.sql, &compiled.bindings).await?;
        Ok(output.affected_rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::ScriptedPool;
    use std::sync::Arc;

    fn user_row(name: &str) -> SqlRow {
        let mut row = SqlRow::new();
        row.insert("name", DatabaseValue::String(name.to_string()));
        row
    }

    #[tokio::test]
    async fn insert_get_id_uses_last_insert_id_without_returning() {
        let pool = ScriptedPool::new();
        pool.push_insert_id(7);
        let conn = Connection::new("default", Arc::new(pool.clone()));

        let id = QueryBuilder::table("users")
            .insert_get_id(&user_row("alice"), "id", &conn)
            .await
            .unwrap();
        assert_eq!(id, Some(DatabaseValue::Int64(7)));
        assert_eq!(
            pool.sql(),
            vec!["INSERT INTO users (name) VALUES (?)".to_string()]
        );
    }

    #[tokio::test]
    async fn update_routes_through_write_path_and_reports_affected() {
        let read = ScriptedPool::new();
        let write = ScriptedPool::new();
        write.push_affected(3);
        let conn = Connection::with_read_write(
            "default",
            Arc::new(read.clone()),
            Arc::new(write.clone()),
        );

        let mut data = SqlRow::new();
        data.insert("active", DatabaseValue::Bool(false));
        let affected = QueryBuilder::table("users")
            .where_lt("last_seen", "2020-01-01")
            .update(&data, &conn)
            .await
            .unwrap();

        assert_eq!(affected, 3);
        assert!(read.sql().is_empty());
        assert_eq!(
            write.sql(),
            vec!["UPDATE users SET active = ? WHERE last_seen < ?".to_string()]
        );
    }

    #[tokio::test]
    async fn delete_reports_affected_rows() {
        let pool = ScriptedPool::new();
        pool.push_affected(2);
        let conn = Connection::new("default", Arc::new(pool.clone()));

        let affected = QueryBuilder::table("users")
            .where_in("id", vec![1i64, 2])
            .delete(&conn)
            .await
            .unwrap();
        assert_eq!(affected, 2);
    }
}
