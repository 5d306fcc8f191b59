//! Has-one and has-many relations

use async_trait::async_trait;
use std::sync::Arc;

use super::traits::Relation;
use crate::error::ModelResult;
use crate::model::{Model, ModelDefinition, ModelRegistry};
use crate::query::QueryBuilder;

pub struct HasOne {
    pub(crate) parent: Arc<ModelDefinition>,
    pub(crate) registry: Arc<ModelRegistry>,
    pub(crate) related: String,
    pub(crate) foreign_key: String,
    pub(crate) local_key: String,
}

pub struct HasMany {
    pub(crate) parent: Arc<ModelDefinition>,
    pub(crate) registry: Arc<ModelRegistry>,
    pub(crate) related: String,
    pub(crate) foreign_key: String,
    pub(crate) local_key: String,
}

fn has_fetch_query(
    registry: &ModelRegistry,
    related: &str,
    foreign_key: &str,
    local_key: &str,
    parent: &Model,
) -> ModelResult<Option<QueryBuilder>> {
    let key = match parent.attribute(local_key) {
        Some(key) if !key.is_null() => key.clone(),
        _ => return Ok(None),
    };
    let related = registry.resolve(related)?;
    Ok(Some(super::scoped(
        related.builder().where_eq(foreign_key, key),
        &related,
    )))
}

fn has_correlated_query(
    registry: &ModelRegistry,
    parent: &ModelDefinition,
    related: &str,
    foreign_key: &str,
    local_key: &str,
) -> ModelResult<QueryBuilder> {
    let related = registry.resolve(related)?;
    Ok(super::scoped(
        QueryBuilder::table(&related.table).where_raw(
            &format!(
                "{}.{} = {}.{}",
                related.table, foreign_key, parent.table, local_key
            ),
            vec![],
        ),
        &related,
    ))
}

#[async_trait]
impl Relation for HasOne {
    fn is_singular(&self) -> bool {
        true
    }

    fn related(&self) -> ModelResult<Arc<ModelDefinition>> {
        self.registry.resolve(&self.related)
    }

    fn fetch_query(&self, parent: &Model) -> ModelResult<Option<QueryBuilder>> {
        has_fetch_query(
            &self.registry,
            &self.related,
            &self.foreign_key,
            &self.local_key,
            parent,
        )
    }

    fn correlated_query(&self) -> ModelResult<QueryBuilder> {
        has_correlated_query(
            &self.registry,
            &self.parent,
            &self.related,
            &self.foreign_key,
            &self.local_key,
        )
    }
}

#[async_trait]
impl Relation for HasMany {
    fn is_singular(&self) -> bool {
        false
    }

    fn related(&self) -> ModelResult<Arc<ModelDefinition>> {
        self.registry.resolve(&self.related)
    }

    fn fetch_query(&self, parent: &Model) -> ModelResult<Option<QueryBuilder>> {
        has_fetch_query(
            &self.registry,
            &self.related,
            &self.foreign_key,
            &self.local_key,
            parent,
        )
    }

    fn correlated_query(&self) -> ModelResult<QueryBuilder> {
        has_correlated_query(
            &self.registry,
            &self.parent,
            &self.related,
            &self.foreign_key,
            &self.local_key,
        )
    }
}
