//! Connection abstraction
//!
//! A `Connection` is a named handle over a read pool and a write pool.
//! Statements are routed by a static SQL-prefix sniff; an active
//! transaction pins everything to one exclusive write-pool connection
//! until commit or rollback.

use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

use crate::backends::{DatabaseConnection, DatabasePool, DatabaseValue, QueryOutput, SqlDialect};
use crate::cache::CacheStore;
use crate::error::ModelResult;
use crate::query_log::QueryLog;

/// Statements routed to the write pool. This is a prefix sniff, not a
/// parse: a write hidden inside a CTE beginning with WITH/SELECT will be
/// misrouted to the read pool. Documented, known behavior.
static WRITE_STATEMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(insert|update|delete|create|alter|drop|truncate|replace)\b").unwrap()
});

/// Classify a statement for read/write routing
pub fn is_write_statement(sql: &str) -> bool {
    WRITE_STATEMENT.is_match(sql)
}

pub(crate) struct TxSlot {
    pub(crate) depth: u32,
    pub(crate) pinned: Option<Box<dyn DatabaseConnection>>,
}

/// Named connection handle owning pools, query log, and transaction state
pub struct Connection {
    name: String,
    read_pool: Arc<dyn DatabasePool>,
    write_pool: Arc<dyn DatabasePool>,
    log: Arc<QueryLog>,
    cache: Option<Arc<dyn CacheStore>>,
    pub(crate) tx: tokio::sync::Mutex<TxSlot>,
}

impl Connection {
    /// Single-pool connection: reads and writes share one pool
    pub fn new(name: impl Into<String>, pool: Arc<dyn DatabasePool>) -> Self {
        Self::with_read_write(name, pool.clone(), pool)
    }

    /// Split-pool connection with read/write routing
    pub fn with_read_write(
        name: impl Into<String>,
        read_pool: Arc<dyn DatabasePool>,
        write_pool: Arc<dyn DatabasePool>,
    ) -> Self {
        Self {
            name: name.into(),
            read_pool,
            write_pool,
            log: Arc::new(QueryLog::new()),
            cache: None,
            tx: tokio::sync::Mutex::new(TxSlot {
                depth: 0,
                pinned: None,
            }),
        }
    }

    /// Attach a cache store consulted by cached queries
    pub fn with_cache(mut self, cache: Arc<dyn CacheStore>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn query_log(&self) -> &Arc<QueryLog> {
        &self.log
    }

    pub fn cache_store(&self) -> Option<&Arc<dyn CacheStore>> {
        self.cache.as_ref()
    }

    pub fn dialect(&self) -> SqlDialect {
        self.write_pool.dialect()
    }

    pub fn read_pool(&self) -> &Arc<dyn DatabasePool> {
        &self.read_pool
    }

    pub fn write_pool(&self) -> &Arc<dyn DatabasePool> {
        &self.write_pool
    }

    /// Execute one statement. Routing: a pinned transaction connection
    /// takes everything; otherwise the prefix sniff picks the pool. The
    /// lock is released before pool dispatch so statements outside a
    /// transaction run concurrently across tasks.
    pub async fn run(
        &self,
        sql: &str,
        bindings: &[DatabaseValue],
    ) -> ModelResult<QueryOutput> {
        let start = Instant::now();
        let mut slot = self.tx.lock().await;
        let result = match slot.pinned.take() {
            Some(mut conn) => {
                // Held for the duration: the pinned connection is exclusive
                let result = conn.query(sql, bindings).await;
                slot.pinned = Some(conn);
                drop(slot);
                result
            }
            None => {
                let pool = if is_write_statement(sql) {
                    self.write_pool.clone()
                } else {
                    self.read_pool.clone()
                };
                drop(slot);
                pool.query(sql, bindings).await
            }
        };
        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
        debug!(connection = %self.name, elapsed_ms, sql, "executed statement");
        self.log.record(&self.name, sql, bindings, elapsed_ms);
        result
    }

    /// True while a transaction is active on this connection
    pub async fn in_transaction(&self) -> bool {
        self.tx.lock().await.depth > 0
    }
}
