//! Transaction management
//!
//! Closure-scoped transactions with nested savepoints. Depth 0 issues
//! BEGIN; any deeper level issues a SAVEPOINT named from the depth at
//! entry. The unwind path regenerates the same name from the depth after
//! decrement, so release/rollback always targets the matching savepoint.
//! Callback failures are always rethrown after the unwind — a transaction
//! failure is never swallowed.

use tracing::{debug, warn};

use crate::connection::Connection;
use crate::error::{ModelError, ModelResult};

/// Deterministic savepoint name for a nesting depth
pub fn savepoint_name(depth: u32) -> String {
    format!("sp_level{}", depth)
}

impl Connection {
    /// Run a callback inside a transaction scope. Nested calls on the same
    /// connection become savepoints.
    pub async fn transaction<F, Fut, R>(&self, f: F) -> ModelResult<R>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = ModelResult<R>>,
    {
        {
            let mut slot = self.tx.lock().await;
            if slot.depth == 0 {
                if slot.pinned.is_some() {
                    return Err(ModelError::TransactionActive);
                }
                let mut conn = self.write_pool().acquire().await?;
                conn.query("BEGIN", &[]).await.map_err(|e| {
                    ModelError::Transaction(format!("Failed to begin transaction: {}", e))
                })?;
                slot.pinned = Some(conn);
                debug!(connection = %self.name(), "transaction begun");
            } else {
                let name = savepoint_name(slot.depth);
                let sql = format!("SAVEPOINT {}", name);
                let conn = slot
                    .pinned
                    .as_mut()
                    .ok_or(ModelError::NoActiveTransaction)?;
                conn.query(&sql, &[]).await.map_err(|e| {
                    ModelError::Transaction(format!("Failed to create savepoint: {}", e))
                })?;
                debug!(connection = %self.name(), savepoint = %name, "savepoint created");
            }
            slot.depth += 1;
        }

        let result = f().await;

        let mut slot = self.tx.lock().await;
        slot.depth -= 1;
        match result {
            Ok(value) => {
                if slot.depth == 0 {
                    let mut conn = slot.pinned.take().ok_or(ModelError::NoActiveTransaction)?;
                    conn.query("COMMIT", &[]).await.map_err(|e| {
                        ModelError::Transaction(format!("Failed to commit transaction: {}", e))
                    })?;
                    conn.close().await?;
                    debug!(connection = %self.name(), "transaction committed");
                } else {
                    let name = savepoint_name(slot.depth);
                    let sql = format!("RELEASE SAVEPOINT {}", name);
                    let conn = slot
                        .pinned
                        .as_mut()
                        .ok_or(ModelError::NoActiveTransaction)?;
                    conn.query(&sql, &[]).await.map_err(|e| {
                        ModelError::Transaction(format!("Failed to release savepoint: {}", e))
                    })?;
                }
                Ok(value)
            }
            Err(err) => {
                if slot.depth == 0 {
                    if let Some(mut conn) = slot.pinned.take() {
                        if let Err(rollback_err) = conn.query("ROLLBACK", &[]).await {
                            warn!(connection = %self.name(), error = %rollback_err, "rollback failed");
                        }
                        let _ = conn.close().await;
                    }
                } else {
                    let name = savepoint_name(slot.depth);
                    let sql = format!("ROLLBACK TO SAVEPOINT {}", name);
                    if let Some(conn) = slot.pinned.as_mut() {
                        if let Err(rollback_err) = conn.query(&sql, &[]).await {
                            warn!(connection = %self.name(), error = %rollback_err, "savepoint rollback failed");
                        }
                    }
                }
                Err(err)
            }
        }
    }

    /// Manually begin a transaction, bypassing nesting bookkeeping
    pub async fn begin(&self) -> ModelResult<()> {
        let mut slot = self.tx.lock().await;
        if slot.pinned.is_some() {
            return Err(ModelError::TransactionActive);
        }
        let mut conn = self.write_pool().acquire().await?;
        conn.query("BEGIN", &[]).await.map_err(|e| {
            ModelError::Transaction(format!("Failed to begin transaction: {}", e))
        })?;
        slot.pinned = Some(conn);
        Ok(())
    }

    /// Manually commit the active transaction
    pub async fn commit(&self) -> ModelResult<()> {
        let mut slot = self.tx.lock().await;
        let mut conn = slot.pinned.take().ok_or(ModelError::NoActiveTransaction)?;
        slot.depth = 0;
        conn.query("COMMIT", &[]).await.map_err(|e| {
            ModelError::Transaction(format!("Failed to commit transaction: {}", e))
        })?;
        conn.close().await
    }

    /// Manually roll back the active transaction
    pub async fn rollback(&self) -> ModelResult<()> {
        let mut slot = self.tx.lock().await;
        let mut conn = slot.pinned.take().ok_or(ModelError::NoActiveTransaction)?;
        slot.depth = 0;
        conn.query("ROLLBACK", &[]).await.map_err(|e| {
            ModelError::Transaction(format!("Failed to rollback transaction: {}", e))
        })?;
        conn.close().await
    }
}
