//! Query builder WHERE clause operations

use super::builder::QueryBuilder;
use super::types::*;
use crate::backends::DatabaseValue;

impl QueryBuilder {
    /// Two-argument form: operator defaults to `=`. Equivalent to
    /// `where_op(column, "=", value)`.
    pub fn where_eq<T: Into<DatabaseValue>>(self, column: &str, value: T) -> Self {
        self.where_op(column, "=", value)
    }

    /// Three-argument form with an explicit operator
    pub fn where_op<T: Into<DatabaseValue>>(self, column: &str, operator: &str, value: T) -> Self {
        self.push_where(
            BoolOp::And,
            WhereKind::Basic {
                column: column.to_string(),
                operator: operator.to_string(),
                value: value.into(),
            },
        )
    }

    pub fn or_where_eq<T: Into<DatabaseValue>>(self, column: &str, value: T) -> Self {
        self.or_where_op(column, "=", value)
    }

    pub fn or_where_op<T: Into<DatabaseValue>>(
        self,
        column: &str,
        operator: &str,
        value: T,
    ) -> Self {
        self.push_where(
            BoolOp::Or,
            WhereKind::Basic {
                column: column.to_string(),
                operator: operator.to_string(),
                value: value.into(),
            },
        )
    }

    pub fn where_gt<T: Into<DatabaseValue>>(self, column: &str, value: T) -> Self {
        self.where_op(column, ">", value)
    }

    pub fn where_gte<T: Into<DatabaseValue>>(self, column: &str, value: T) -> Self {
        self.where_op(column, ">=", value)
    }

    pub fn where_lt<T: Into<DatabaseValue>>(self, column: &str, value: T) -> Self {
        self.where_op(column, "<", value)
    }

    pub fn where_lte<T: Into<DatabaseValue>>(self, column: &str, value: T) -> Self {
        self.where_op(column, "<=", value)
    }

    pub fn where_in<T: Into<DatabaseValue>>(self, column: &str, values: Vec<T>) -> Self {
        self.push_where(
            BoolOp::And,
            WhereKind::In {
                column: column.to_string(),
                values: values.into_iter().map(Into::into).collect(),
            },
        )
    }

    pub fn where_not_in<T: Into<DatabaseValue>>(self, column: &str, values: Vec<T>) -> Self {
        self.push_where(
            BoolOp::And,
            WhereKind::NotIn {
                column: column.to_string(),
                values: values.into_iter().map(Into::into).collect(),
            },
        )
    }

    pub fn where_null(self, column: &str) -> Self {
        self.push_where(
            BoolOp::And,
            WhereKind::Null {
                column: column.to_string(),
            },
        )
    }

    pub fn where_not_null(self, column: &str) -> Self {
        self.push_where(
            BoolOp::And,
            WhereKind::NotNull {
                column: column.to_string(),
            },
        )
    }

    pub fn or_where_null(self, column: &str) -> Self {
        self.push_where(
            BoolOp::Or,
            WhereKind::Null {
                column: column.to_string(),
            },
        )
    }

    /// Raw WHERE fragment emitted verbatim, with its own bindings
    pub fn where_raw(self, sql: &str, bindings: Vec<DatabaseValue>) -> Self {
        self.push_where(
            BoolOp::And,
            WhereKind::Raw {
                sql: sql.to_string(),
                bindings,
            },
        )
    }

    pub fn or_where_raw(self, sql: &str, bindings: Vec<DatabaseValue>) -> Self {
        self.push_where(
            BoolOp::Or,
            WhereKind::Raw {
                sql: sql.to_string(),
                bindings,
            },
        )
    }

    /// EXISTS with a correlated subquery
    pub fn where_exists(self, query: QueryBuilder) -> Self {
        self.push_where(
            BoolOp::And,
            WhereKind::Exists {
                query: Box::new(query),
            },
        )
    }

    pub fn where_not_exists(self, query: QueryBuilder) -> Self {
        self.push_where(
            BoolOp::And,
            WhereKind::NotExists {
                query: Box::new(query),
            },
        )
    }
}
