//! Query builder types

use std::fmt;

use crate::backends::DatabaseValue;

/// Boolean connector between WHERE clauses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolOp {
    And,
    Or,
}

impl fmt::Display for BoolOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoolOp::And => write!(f, "AND"),
            BoolOp::Or => write!(f, "OR"),
        }
    }
}

/// Order by direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderDirection {
    Asc,
    Desc,
}

impl fmt::Display for OrderDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderDirection::Asc => write!(f, "ASC"),
            OrderDirection::Desc => write!(f, "DESC"),
        }
    }
}

/// INNER JOIN on one column equality
#[derive(Debug, Clone)]
pub struct JoinClause {
    pub table: String,
    pub left: String,
    pub right: String,
}

/// One WHERE clause: a variant payload plus its own connector. The
/// connector belongs to the clause itself, not to the previous one.
#[derive(Debug, Clone)]
pub struct WhereClause {
    pub boolean: BoolOp,
    pub kind: WhereKind,
}

/// WHERE clause variants
#[derive(Debug, Clone)]
pub enum WhereKind {
    Basic {
        column: String,
        operator: String,
        value: DatabaseValue,
    },
    In {
        column: String,
        values: Vec<DatabaseValue>,
    },
    NotIn {
        column: String,
        values: Vec<DatabaseValue>,
    },
    Null {
        column: String,
    },
    NotNull {
        column: String,
    },
    Raw {
        sql: String,
        bindings: Vec<DatabaseValue>,
    },
    Exists {
        query: Box<super::builder::QueryBuilder>,
    },
    NotExists {
        query: Box<super::builder::QueryBuilder>,
    },
}

/// A compiled statement: SQL with positional `?` placeholders plus the
/// bindings in placeholder order.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    pub sql: String,
    pub bindings: Vec<DatabaseValue>,
}
