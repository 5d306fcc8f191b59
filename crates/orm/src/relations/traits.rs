//! Relation contract
//!
//! Every relation kind answers three questions: what query fetches the
//! related rows for one parent, what correlated query expresses the link
//! for EXISTS and COUNT subqueries, and whether the result is a single
//! instance or a collection.

use async_trait::async_trait;
use std::sync::Arc;

use crate::backends::SqlRow;
use crate::connection::Connection;
use crate::error::ModelResult;
use crate::model::{Model, ModelDefinition};
use crate::query::QueryBuilder;

/// A loaded relation value on a model instance
#[derive(Debug, Clone)]
pub enum RelationValue {
    One(Option<Model>),
    Many(Vec<Model>),
}

/// Caller-supplied constraint applied to a relation query before it runs
pub type QueryModifier = dyn Fn(QueryBuilder) -> QueryBuilder + Send + Sync;

#[async_trait]
pub trait Relation: Send + Sync {
    /// Single instance or collection
    fn is_singular(&self) -> bool;

    /// The related model's definition
    fn related(&self) -> ModelResult<Arc<ModelDefinition>>;

    /// Query selecting this relation's rows for one parent instance.
    /// `None` when the parent's key is null: no statement should run.
    fn fetch_query(&self, parent: &Model) -> ModelResult<Option<QueryBuilder>>;

    /// Query over the related table correlated to the outer table by a
    /// raw column-equality predicate. Used inside EXISTS and COUNT
    /// subqueries; fails for relations whose target is dynamic.
    fn correlated_query(&self) -> ModelResult<QueryBuilder>;

    /// Fetch and hydrate the relation for one parent
    async fn fetch(
        &self,
        parent: &Model,
        conn: &Connection,
        modifier: Option<&QueryModifier>,
    ) -> ModelResult<RelationValue> {
        let query = match self.fetch_query(parent)? {
            Some(query) => query,
            None => return Ok(self.empty_value()),
        };
        let query = match modifier {
            Some(modifier) => modifier(query),
            None => query,
        };
        let rows = query.get(conn).await?;
        Ok(self.hydrate_rows(self.related()?, rows))
    }

    fn empty_value(&self) -> RelationValue {
        if self.is_singular() {
            RelationValue::One(None)
        } else {
            RelationValue::Many(Vec::new())
        }
    }

    fn hydrate_rows(&self, related: Arc<ModelDefinition>, rows: Vec<SqlRow>) -> RelationValue {
        let mut models: Vec<Model> = rows
            .into_iter()
            .map(|row| Model::hydrate(related.clone(), row))
            .collect();
        if self.is_singular() {
            RelationValue::One(if models.is_empty() {
                None
            } else {
                Some(models.remove(0))
            })
        } else {
            RelationValue::Many(models)
        }
    }
}
