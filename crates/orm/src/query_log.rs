//! Query log
//!
//! Append-only in-memory log of executed statements, gated by an enabled
//! flag. Listeners fire synchronously as each entry is recorded.

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::backends::DatabaseValue;

/// One recorded statement
#[derive(Debug, Clone)]
pub struct QueryLogEntry {
    pub sql: String,
    pub bindings: Vec<JsonValue>,
    pub elapsed_ms: f64,
    pub connection: String,
    pub timestamp: DateTime<Utc>,
}

type Listener = Box<dyn Fn(&QueryLogEntry) + Send + Sync>;

/// In-memory query log with live listeners
#[derive(Default)]
pub struct QueryLog {
    enabled: AtomicBool,
    entries: Mutex<Vec<QueryLogEntry>>,
    listeners: Mutex<Vec<Listener>>,
}

impl QueryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enable(&self) {
        self.enabled.store(true, Ordering::Relaxed);
    }

    pub fn disable(&self) {
        self.enabled.store(false, Ordering::Relaxed);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Record an executed statement. No-op while the log is disabled,
    /// but listeners still see every entry that is recorded.
    pub fn record(
        &self,
        connection: &str,
        sql: &str,
        bindings: &[DatabaseValue],
        elapsed_ms: f64,
    ) {
        if !self.is_enabled() {
            return;
        }
        let entry = QueryLogEntry {
            sql: sql.to_string(),
            bindings: bindings.iter().map(DatabaseValue::to_json).collect(),
            elapsed_ms,
            connection: connection.to_string(),
            timestamp: Utc::now(),
        };
        for listener in self.listeners.lock().unwrap().iter() {
            listener(&entry);
        }
        self.entries.lock().unwrap().push(entry);
    }

    /// Register a listener fired synchronously on each entry
    pub fn listen<F>(&self, listener: F)
    where
        F: Fn(&QueryLogEntry) + Send + Sync + 'static,
    {
        self.listeners.lock().unwrap().push(Box::new(listener));
    }

    pub fn entries(&self) -> Vec<QueryLogEntry> {
        self.entries.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.entries.lock().unwrap().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    #[test]
    fn disabled_log_records_nothing() {
        let log = QueryLog::new();
        log.record("default", "SELECT 1", &[], 0.1);
        assert!(log.entries().is_empty());
    }

    #[test]
    fn listeners_fire_per_entry() {
        let log = QueryLog::new();
        log.enable();
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        log.listen(move |entry| {
            assert_eq!(entry.connection, "default");
            counter.fetch_add(1, Ordering::SeqCst);
        });
        log.record("default", "SELECT 1", &[], 0.1);
        log.record("default", "SELECT 2", &[DatabaseValue::Int64(2)], 0.2);
        assert_eq!(seen.load(Ordering::SeqCst), 2);
        assert_eq!(log.entries().len(), 2);
        assert_eq!(log.entries()[1].bindings, vec![serde_json::json!(2)]);
    }
}
