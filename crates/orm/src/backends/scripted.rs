//! Scripted in-memory backend
//!
//! A deterministic stand-in for a live database: results are queued ahead
//! of time and every executed statement is recorded with its bindings.
//! Used throughout the test suite to verify compiled SQL, binding order,
//! routing, and transaction statement sequences without a server.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use super::core::{
    DatabaseConnection, DatabasePool, DatabaseValue, QueryOutput, SqlDialect, SqlRow,
};
use crate::error::{OrmError, OrmResult};

#[derive(Default)]
struct ScriptState {
    responses: VecDeque<OrmResult<QueryOutput>>,
    statements: Vec<(String, Vec<DatabaseValue>)>,
}

/// Scripted pool; clones share the same queue and statement record.
#[derive(Clone, Default)]
pub struct ScriptedPool {
    state: Arc<Mutex<ScriptState>>,
}

impl ScriptedPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a row-set response for the next row-producing statement
    pub fn push_rows(&self, rows: Vec<SqlRow>) {
        self.state
            .lock()
            .unwrap()
            .responses
            .push_back(Ok(QueryOutput::rows(rows)));
    }

    /// Queue an affected-rows response
    pub fn push_affected(&self, count: u64) {
        self.state
            .lock()
            .unwrap()
            .responses
            .push_back(Ok(QueryOutput::affected(count)));
    }

    /// Queue an insert response with a generated id
    pub fn push_insert_id(&self, id: i64) {
        let mut output = QueryOutput::affected(1);
        output.last_insert_id = Some(id);
        self.state.lock().unwrap().responses.push_back(Ok(output));
    }

    /// Queue an error response
    pub fn push_error(&self, err: OrmError) {
        self.state.lock().unwrap().responses.push_back(Err(err));
    }

    /// Every statement executed so far, in order
    pub fn statements(&self) -> Vec<(String, Vec<DatabaseValue>)> {
        self.state.lock().unwrap().statements.clone()
    }

    /// Just the SQL strings, in order
    pub fn sql(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .statements
            .iter()
            .map(|(sql, _)| sql.clone())
            .collect()
    }

    fn run(&self, sql: &str, bindings: &[DatabaseValue]) -> OrmResult<QueryOutput> {
        let mut state = self.state.lock().unwrap();
        state
            .statements
            .push((sql.to_string(), bindings.to_vec()));
        // Transaction control statements succeed without being scripted
        let control = {
            let upper = sql.trim_start().to_ascii_uppercase();
            upper == "BEGIN"
                || upper == "COMMIT"
                || upper == "ROLLBACK"
                || upper.starts_with("SAVEPOINT")
                || upper.starts_with("RELEASE SAVEPOINT")
                || upper.starts_with("ROLLBACK TO SAVEPOINT")
        };
        if control {
            return Ok(QueryOutput::affected(0));
        }
        state
            .responses
            .pop_front()
            .unwrap_or_else(|| Ok(QueryOutput::default()))
    }
}

#[async_trait]
impl DatabasePool for ScriptedPool {
    async fn acquire(&self) -> OrmResult<Box<dyn DatabaseConnection>> {
        Ok(Box::new(ScriptedConnection {
            pool: self.clone(),
        }))
    }

    async fn query(&self, sql: &str, bindings: &[DatabaseValue]) -> OrmResult<QueryOutput> {
        self.run(sql, bindings)
    }

    async fn close(&self) -> OrmResult<()> {
        Ok(())
    }

    fn dialect(&self) -> SqlDialect {
        SqlDialect::SQLite
    }
}

/// Connection view over the shared scripted state
pub struct ScriptedConnection {
    pool: ScriptedPool,
}

#[async_trait]
impl DatabaseConnection for ScriptedConnection {
    async fn query(&mut self, sql: &str, bindings: &[DatabaseValue]) -> OrmResult<QueryOutput> {
        self.pool.run(sql, bindings)
    }

    async fn close(&mut self) -> OrmResult<()> {
        Ok(())
    }
}

/// Build a row from (column, value) literals; test helper
pub fn row(pairs: &[(&str, DatabaseValue)]) -> SqlRow {
    SqlRow::from_pairs(
        pairs
            .iter()
            .map(|(c, v)| (c.to_string(), v.clone())),
    )
}
