//! Document-store backend
//!
//! Auxiliary backend for document databases. Raw SQL has no meaning here,
//! so every `query` call is rejected with an unsupported-operation error.
//! Callers work through collection handles instead, and transactions go
//! through sessions which require a replica-set-capable deployment.

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::sync::Arc;

use super::core::{DatabaseConnection, DatabaseValue, QueryOutput};
use crate::error::{OrmError, OrmResult};

/// Driver boundary for document stores: CRUD by collection, no SQL.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn insert(&self, collection: &str, document: JsonValue) -> OrmResult<JsonValue>;
    async fn find(&self, collection: &str, filter: JsonValue) -> OrmResult<Vec<JsonValue>>;
    async fn update(&self, collection: &str, filter: JsonValue, update: JsonValue)
        -> OrmResult<u64>;
    async fn delete(&self, collection: &str, filter: JsonValue) -> OrmResult<u64>;

    /// Whether the deployment supports multi-document sessions
    fn supports_sessions(&self) -> bool {
        false
    }

    async fn start_session(&self) -> OrmResult<()> {
        Err(OrmError::UnsupportedOperation(
            "sessions require a replica-set-capable deployment".to_string(),
        ))
    }
}

/// Connection wrapper exposing collection handles
pub struct DocumentConnection {
    store: Arc<dyn DocumentStore>,
}

impl DocumentConnection {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Handle for one named collection
    pub fn collection(&self, name: &str) -> CollectionHandle {
        CollectionHandle {
            store: self.store.clone(),
            name: name.to_string(),
        }
    }

    /// Session-based transaction; errors unless the deployment is a
    /// replica set.
    pub async fn with_session<F, Fut, R>(&self, f: F) -> OrmResult<R>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = OrmResult<R>>,
    {
        if !self.store.supports_sessions() {
            return Err(OrmError::UnsupportedOperation(
                "transactions on the document backend require a replica-set-capable deployment"
                    .to_string(),
            ));
        }
        self.store.start_session().await?;
        f().await
    }
}

#[async_trait]
impl DatabaseConnection for DocumentConnection {
    async fn query(&mut self, _sql: &str, _bindings: &[DatabaseValue]) -> OrmResult<QueryOutput> {
        Err(OrmError::UnsupportedOperation(
            "raw SQL is not supported by the document backend".to_string(),
        ))
    }

    async fn begin_transaction(&mut self) -> OrmResult<()> {
        Err(OrmError::UnsupportedOperation(
            "use with_session for document-store transactions".to_string(),
        ))
    }

    async fn close(&mut self) -> OrmResult<()> {
        Ok(())
    }
}

/// Handle for operations on one collection
pub struct CollectionHandle {
    store: Arc<dyn DocumentStore>,
    name: String,
}

impl CollectionHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn insert(&self, document: JsonValue) -> OrmResult<JsonValue> {
        self.store.insert(&self.name, document).await
    }

    pub async fn find(&self, filter: JsonValue) -> OrmResult<Vec<JsonValue>> {
        self.store.find(&self.name, filter).await
    }

    pub async fn update(&self, filter: JsonValue, update: JsonValue) -> OrmResult<u64> {
        self.store.update(&self.name, filter, update).await
    }

    pub async fn delete(&self, filter: JsonValue) -> OrmResult<u64> {
        self.store.delete(&self.name, filter).await
    }
}
