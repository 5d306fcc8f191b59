//! Has-one-through and has-many-through relations
//!
//! Two-hop relations: the far table joins the intermediate table, which
//! carries the key back to the parent. `first_key` is the intermediate's
//! column referencing the parent; `second_key` is the far table's column
//! referencing the intermediate.

use async_trait::async_trait;
use std::sync::Arc;

use super::traits::Relation;
use crate::error::ModelResult;
use crate::model::{Model, ModelDefinition, ModelRegistry};
use crate::query::QueryBuilder;

pub(crate) struct ThroughKeys {
    pub(crate) parent: Arc<ModelDefinition>,
    pub(crate) registry: Arc<ModelRegistry>,
    pub(crate) related: String,
    pub(crate) through: String,
    pub(crate) first_key: String,
    pub(crate) second_key: String,
    pub(crate) local_key: String,
    pub(crate) second_local_key: String,
}

impl ThroughKeys {
    fn joined(&self) -> ModelResult<QueryBuilder> {
        let related = self.registry.resolve(&self.related)?;
        let star = format!("{}.*", related.table);
        Ok(QueryBuilder::table(&related.table)
            .select(&[star.as_str()])
            .inner_join(
                &self.through,
                &format!("{}.{}", self.through, self.second_local_key),
                &format!("{}.{}", related.table, self.second_key),
            ))
    }

    fn fetch_query(&self, parent: &Model) -> ModelResult<Option<QueryBuilder>> {
        let key = match parent.attribute(&self.local_key) {
            Some(key) if !key.is_null() => key.clone(),
            _ => return Ok(None),
        };
        let related = self.registry.resolve(&self.related)?;
        let query = self.joined()?.where_eq(
            &format!("{}.{}", self.through, self.first_key),
            key,
        );
        Ok(Some(super::scoped_qualified(query, &related)))
    }

    fn correlated_query(&self) -> ModelResult<QueryBuilder> {
        let related = self.registry.resolve(&self.related)?;
        let query = self.joined()?.where_raw(
            &format!(
                "{}.{} = {}.{}",
                self.through, self.first_key, self.parent.table, self.local_key
            ),
            vec![],
        );
        Ok(super::scoped_qualified(query, &related))
    }
}

pub struct HasOneThrough(pub(crate) ThroughKeys);

pub struct HasManyThrough(pub(crate) ThroughKeys);

#[async_trait]
impl Relation for HasOneThrough {
    fn is_singular(&self) -> bool {
        true
    }

    fn related(&self) -> ModelResult<Arc<ModelDefinition>> {
        self.0.registry.resolve(&self.0.related)
    }

    fn fetch_query(&self, parent: &Model) -> ModelResult<Option<QueryBuilder>> {
        self.0.fetch_query(parent)
    }

    fn correlated_query(&self) -> ModelResult<QueryBuilder> {
        self.0.correlated_query()
    }
}

#[async_trait]
impl Relation for HasManyThrough {
    fn is_singular(&self) -> bool {
        false
    }

    fn related(&self) -> ModelResult<Arc<ModelDefinition>> {
        self.0.registry.resolve(&self.0.related)
    }

    fn fetch_query(&self, parent: &Model) -> ModelResult<Option<QueryBuilder>> {
        self.0.fetch_query(parent)
    }

    fn correlated_query(&self) -> ModelResult<QueryBuilder> {
        self.0.correlated_query()
    }
}
