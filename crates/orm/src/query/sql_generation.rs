//! Query builder SQL compilation
//!
//! Compiles accumulated clause state into parameterized SQL with `?`
//! placeholders. Binding order is the correctness-critical part: raw
//! select bindings come first (select fragments appear before WHERE in
//! the statement), then where-bindings in clause-append order.

use super::builder::QueryBuilder;
use super::types::*;
use crate::backends::{DatabaseValue, SqlRow};
use crate::error::{ModelError, ModelResult};

impl QueryBuilder {
    /// Compile a SELECT statement
    pub fn compile_select(&self) -> ModelResult<CompiledQuery> {
        let table = self.table.as_ref().ok_or(ModelError::MissingTable)?;
        let mut bindings = Vec::new();

        let mut projection: Vec<String> = self.columns.clone();
        for (fragment, raw_bindings) in &self.raw_selects {
            projection.push(fragment.clone());
            bindings.extend(raw_bindings.iter().cloned());
        }
        let projection = if projection.is_empty() {
            "*".to_string()
        } else {
            projection.join(", ")
        };

        let mut sql = format!("SELECT {} FROM {}", projection, table);
        self.compile_joins(&mut sql);
        self.compile_wheres(&mut sql, &mut bindings)?;
        self.compile_order_limit(&mut sql);

        Ok(CompiledQuery { sql, bindings })
    }

    /// Compile `SELECT COUNT(col)` over the current WHERE state
    pub fn compile_count(&self, column: &str) -> ModelResult<CompiledQuery> {
        let table = self.table.as_ref().ok_or(ModelError::MissingTable)?;
        let mut bindings = Vec::new();
        let mut sql = format!("SELECT COUNT({}) FROM {}", column, table);
        self.compile_joins(&mut sql);
        self.compile_wheres(&mut sql, &mut bindings)?;
        Ok(CompiledQuery { sql, bindings })
    }

    /// Compile a multi-row INSERT. The column set comes from the first
    /// row; rows missing one of those keys bind NULL for that position.
    pub fn compile_insert(&self, rows: &[SqlRow]) -> ModelResult<CompiledQuery> {
        let table = self.table.as_ref().ok_or(ModelError::MissingTable)?;
        if rows.is_empty() {
            return Err(ModelError::Query("insert requires at least one row".to_string()));
        }

        let columns: Vec<String> = rows[0].columns().to_vec();
        if columns.is_empty() {
            return Err(ModelError::Query("insert requires at least one column".to_string()));
        }

        let mut bindings = Vec::with_capacity(columns.len() * rows.len());
        let placeholder_row = format!(
            "({})",
            columns.iter().map(|_| "?").collect::<Vec<_>>().join(", ")
        );
        let mut value_rows = Vec::with_capacity(rows.len());
        for row in rows {
            for column in &columns {
                bindings.push(row.get(column).cloned().unwrap_or(DatabaseValue::Null));
            }
            value_rows.push(placeholder_row.clone());
        }

        let sql = format!(
            "INSERT INTO {} ({}) VALUES {}",
            table,
            columns.join(", "),
            value_rows.join(", ")
        );
        Ok(CompiledQuery { sql, bindings })
    }

    /// Compile an UPDATE with the builder's WHERE state. SET bindings
    /// precede where-bindings.
    pub fn compile_update(&self, data: &SqlRow) -> ModelResult<CompiledQuery> {
        let table = self.table.as_ref().ok_or(ModelError::MissingTable)?;
        if data.is_empty() {
            return Err(ModelError::Query("update requires at least one column".to_string()));
        }

        let mut bindings = Vec::new();
        let mut assignments = Vec::with_capacity(data.len());
        for (column, value) in data.iter() {
            assignments.push(format!("{} = ?", column));
            bindings.push(value.clone());
        }

        let mut sql = format!("UPDATE {} SET {}", table, assignments.join(", "));
        self.compile_wheres(&mut sql, &mut bindings)?;
        Ok(CompiledQuery { sql, bindings })
    }

    /// Compile a DELETE with the builder's WHERE state
    pub fn compile_delete(&self) -> ModelResult<CompiledQuery> {
        let table = self.table.as_ref().ok_or(ModelError::MissingTable)?;
        let mut bindings = Vec::new();
        let mut sql = format!("DELETE FROM {}", table);
        self.compile_wheres(&mut sql, &mut bindings)?;
        Ok(CompiledQuery { sql, bindings })
    }

    fn compile_joins(&self, sql: &mut String) {
        for join in &self.joins {
            sql.push_str(&format!(
                " INNER JOIN {} ON {} = {}",
                join.table, join.left, join.right
            ));
        }
    }

    fn compile_wheres(
        &self,
        sql: &mut String,
        bindings: &mut Vec<DatabaseValue>,
    ) -> ModelResult<()> {
        if self.wheres.is_empty() {
            return Ok(());
        }
        sql.push_str(" WHERE ");
        for (index, clause) in self.wheres.iter().enumerate() {
            if index > 0 {
                // Each clause carries its own connector
                sql.push(' ');
                sql.push_str(&clause.boolean.to_string());
                sql.push(' ');
            }
            match &clause.kind {
                WhereKind::Basic {
                    column,
                    operator,
                    value,
                } => {
                    sql.push_str(&format!("{} {} ?", column, operator));
                    bindings.push(value.clone());
                }
                WhereKind::In { column, values } => {
                    let placeholders =
                        values.iter().map(|_| "?").collect::<Vec<_>>().join(", ");
                    sql.push_str(&format!("{} IN ({})", column, placeholders));
                    bindings.extend(values.iter().cloned());
                }
                WhereKind::NotIn { column, values } => {
                    let placeholders =
                        values.iter().map(|_| "?").collect::<Vec<_>>().join(", ");
                    sql.push_str(&format!("{} NOT IN ({})", column, placeholders));
                    bindings.extend(values.iter().cloned());
                }
                WhereKind::Null { column } => {
                    sql.push_str(&format!("{} IS NULL", column));
                }
                WhereKind::NotNull { column } => {
                    sql.push_str(&format!("{} IS NOT NULL", column));
                }
                WhereKind::Raw {
                    sql: fragment,
                    bindings: raw_bindings,
                } => {
                    sql.push_str(fragment);
                    bindings.extend(raw_bindings.iter().cloned());
                }
                WhereKind::Exists { query } => {
                    let sub = query.compile_select()?;
                    sql.push_str(&format!("EXISTS ({})", sub.sql));
                    bindings.extend(sub.bindings);
                }
                WhereKind::NotExists { query } => {
                    let sub = query.compile_select()?;
                    sql.push_str(&format!("NOT EXISTS ({})", sub.sql));
                    bindings.extend(sub.bindings);
                }
            }
        }
        Ok(())
    }

    fn compile_order_limit(&self, sql: &mut String) {
        if !self.orders.is_empty() {
            let clauses: Vec<String> = self
                .orders
                .iter()
                .map(|(column, direction)| format!("{} {}", column, direction))
                .collect();
            sql.push_str(&format!(" ORDER BY {}", clauses.join(", ")));
        }
        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }
        if let Some(offset) = self.offset {
            sql.push_str(&format!(" OFFSET {}", offset));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn placeholder_count(sql: &str) -> usize {
        sql.matches('?').count()
    }

    #[test]
    fn missing_table_is_a_precondition_error() {
        let err = QueryBuilder::new().where_eq("id", 1).compile_select();
        assert!(matches!(err, Err(ModelError::MissingTable)));
    }

    #[test]
    fn default_projection_is_wildcard() {
        let compiled = QueryBuilder::table("users").compile_select().unwrap();
        assert_eq!(compiled.sql, "SELECT * FROM users");
        assert!(compiled.bindings.is_empty());
    }

    #[test]
    fn two_and_three_argument_where_compile_identically() {
        let a = QueryBuilder::table("users")
            .where_eq("email", "a@b.c")
            .compile_select()
            .unwrap();
        let b = QueryBuilder::table("users")
            .where_op("email", "=", "a@b.c")
            .compile_select()
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn connector_comes_from_each_clause_itself() {
        let compiled = QueryBuilder::table("users")
            .where_eq("active", true)
            .or_where_op("age", ">", 65)
            .where_not_null("email")
            .compile_select()
            .unwrap();
        assert_eq!(
            compiled.sql,
            "SELECT * FROM users WHERE active = ? OR age > ? AND email IS NOT NULL"
        );
        assert_eq!(
            compiled.bindings,
            vec![DatabaseValue::Bool(true), DatabaseValue::Int32(65)]
        );
    }

    #[test]
    fn placeholder_count_matches_binding_count() {
        let compiled = QueryBuilder::table("users")
            .select_raw("(SELECT COUNT(*) FROM posts WHERE score > ?) AS hot", vec![DatabaseValue::Int32(10)])
            .where_eq("active", true)
            .where_in("role", vec!["admin", "editor"])
            .where_null("deleted_at")
            .where_raw("lower(email) = ?", vec![DatabaseValue::String("x@y.z".into())])
            .compile_select()
            .unwrap();
        assert_eq!(placeholder_count(&compiled.sql), compiled.bindings.len());
    }

    #[test]
    fn select_raw_bindings_precede_where_bindings() {
        let compiled = QueryBuilder::table("users")
            .where_eq("active", true)
            .select_raw("? AS marker", vec![DatabaseValue::Int64(99)])
            .compile_select()
            .unwrap();
        // Raw select binding first even though the where was appended first
        assert_eq!(
            compiled.bindings,
            vec![DatabaseValue::Int64(99), DatabaseValue::Bool(true)]
        );
    }

    #[test]
    fn in_clause_expands_placeholders() {
        let compiled = QueryBuilder::table("users")
            .where_in("id", vec![1i64, 2, 3])
            .compile_select()
            .unwrap();
        assert_eq!(compiled.sql, "SELECT * FROM users WHERE id IN (?, ?, ?)");
        assert_eq!(compiled.bindings.len(), 3);
    }

    #[test]
    fn exists_compiles_nested_query_inline() {
        let sub = QueryBuilder::table("posts").where_raw(
            "posts.user_id = users.id",
            vec![],
        );
        let compiled = QueryBuilder::table("users")
            .where_exists(sub.select(&["1"]))
            .compile_select()
            .unwrap();
        assert_eq!(
            compiled.sql,
            "SELECT * FROM users WHERE EXISTS (SELECT 1 FROM posts WHERE posts.user_id = users.id)"
        );
    }

    #[test]
    fn order_limit_offset_render_in_sequence() {
        let compiled = QueryBuilder::table("users")
            .order_by_asc("name")
            .order_by_desc("id")
            .limit(10)
            .offset(20)
            .compile_select()
            .unwrap();
        assert_eq!(
            compiled.sql,
            "SELECT * FROM users ORDER BY name ASC, id DESC LIMIT 10 OFFSET 20"
        );
    }

    #[test]
    fn inner_join_renders_between_from_and_where() {
        let compiled = QueryBuilder::table("roles")
            .inner_join("role_user", "role_user.role_id", "roles.id")
            .where_eq("role_user.user_id", 5i64)
            .compile_select()
            .unwrap();
        assert_eq!(
            compiled.sql,
            "SELECT * FROM roles INNER JOIN role_user ON role_user.role_id = roles.id WHERE role_user.user_id = ?"
        );
    }

    #[test]
    fn insert_takes_columns_from_first_row_and_nulls_missing_keys() {
        let mut first = SqlRow::new();
        first.insert("name", DatabaseValue::String("alice".into()));
        first.insert("age", DatabaseValue::Int32(30));
        let mut second = SqlRow::new();
        second.insert("name", DatabaseValue::String("bob".into()));

        let compiled = QueryBuilder::table("users")
            .compile_insert(&[first, second])
            .unwrap();
        assert_eq!(
            compiled.sql,
            "INSERT INTO users (name, age) VALUES (?, ?), (?, ?)"
        );
        assert_eq!(compiled.bindings[3], DatabaseValue::Null);
    }

    #[test]
    fn update_bindings_are_set_then_where() {
        let mut data = SqlRow::new();
        data.insert("name", DatabaseValue::String("carol".into()));
        let compiled = QueryBuilder::table("users")
            .where_eq("id", 7i64)
            .compile_update(&data)
            .unwrap();
        assert_eq!(compiled.sql, "UPDATE users SET name = ? WHERE id = ?");
        assert_eq!(
            compiled.bindings,
            vec![
                DatabaseValue::String("carol".into()),
                DatabaseValue::Int64(7)
            ]
        );
    }

    #[test]
    fn count_ignores_ordering_but_keeps_wheres() {
        let compiled = QueryBuilder::table("users")
            .where_eq("active", true)
            .order_by_asc("name")
            .limit(5)
            .compile_count("*")
            .unwrap();
        assert_eq!(compiled.sql, "SELECT COUNT(*) FROM users WHERE active = ?");
    }

    #[test]
    fn delete_compiles_with_where_state() {
        let compiled = QueryBuilder::table("users")
            .where_in("id", vec![1i64, 2])
            .compile_delete()
            .unwrap();
        assert_eq!(compiled.sql, "DELETE FROM users WHERE id IN (?, ?)");
    }
}
