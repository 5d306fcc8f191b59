//! Polymorphic relations
//!
//! Morph-one and morph-many write the parent's morph class into the
//! type column. Morph-to resolves the other direction at fetch time:
//! the stored type tag is looked up in the registry's morph map, so its
//! target is unknown until a row is in hand.

use async_trait::async_trait;
use std::sync::Arc;

use super::traits::{QueryModifier, Relation, RelationValue};
use crate::connection::Connection;
use crate::error::{ModelError, ModelResult};
use crate::model::{Model, ModelDefinition, ModelRegistry};
use crate::query::QueryBuilder;

pub(crate) struct MorphKeys {
    pub(crate) parent: Arc<ModelDefinition>,
    pub(crate) registry: Arc<ModelRegistry>,
    pub(crate) related: String,
    pub(crate) type_column: String,
    pub(crate) id_column: String,
    pub(crate) local_key: String,
}

impl MorphKeys {
    fn fetch_query(&self, parent: &Model) -> ModelResult<Option<QueryBuilder>> {
        let key = match parent.attribute(&self.local_key) {
            Some(key) if !key.is_null() => key.clone(),
            _ => return Ok(None),
        };
        let related = self.registry.resolve(&self.related)?;
        Ok(Some(super::scoped(
            related
                .builder()
                .where_eq(&self.type_column, self.parent.morph_class.as_str())
                .where_eq(&self.id_column, key),
            &related,
        )))
    }

    fn correlated_query(&self) -> ModelResult<QueryBuilder> {
        let related = self.registry.resolve(&self.related)?;
        let query = QueryBuilder::table(&related.table)
            .where_eq(&self.type_column, self.parent.morph_class.as_str())
            .where_raw(
                &format!(
                    "{}.{} = {}.{}",
                    related.table, self.id_column, self.parent.table, self.local_key
                ),
                vec![],
            );
        Ok(super::scoped(query, &related))
    }
}

pub struct MorphOne(pub(crate) MorphKeys);

pub struct MorphMany(pub(crate) MorphKeys);

#[async_trait]
impl Relation for MorphOne {
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
impl Relation for MorphMany {
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

/// Morph-to: the child-side polymorphic relation. The target model comes
/// from the type column's tag through the registry's morph map.
pub struct MorphTo {
    pub(crate) registry: Arc<ModelRegistry>,
    pub(crate) type_column: String,
    pub(crate) id_column: String,
}

#[async_trait]
impl Relation for MorphTo {
    fn is_singular(&self) -> bool {
        true
    }

    fn related(&self) -> ModelResult<Arc<ModelDefinition>> {
        Err(ModelError::Relationship(
            "morph-to target is resolved per instance".to_string(),
        ))
    }

    fn fetch_query(&self, _parent: &Model) -> ModelResult<Option<QueryBuilder>> {
        Err(ModelError::UnsupportedOperation(
            "morph-to relations cannot be expressed as a static query".to_string(),
        ))
    }

    fn correlated_query(&self) -> ModelResult<QueryBuilder> {
        Err(ModelError::UnsupportedOperation(
            "morph-to relations cannot be counted or filtered with a subquery".to_string(),
        ))
    }

    async fn fetch(
        &self,
        parent: &Model,
        conn: &Connection,
        modifier: Option<&QueryModifier>,
    ) -> ModelResult<RelationValue> {
        let tag = match parent.attribute(&self.type_column) {
            Some(value) if !value.is_null() => value
                .as_str()
                .map(str::to_string)
                .ok_or_else(|| {
                    ModelError::Relationship(format!(
                        "morph type column '{}' is not a string",
                        self.type_column
                    ))
                })?,
            _ => return Ok(RelationValue::One(None)),
        };
        let id = match parent.attribute(&self.id_column) {
            Some(id) if !id.is_null() => id.clone(),
            _ => return Ok(RelationValue::One(None)),
        };

        let related = self.registry.resolve_morph(&tag)?;
        let primary_key = related.primary_key.clone();
        let query = super::scoped(related.builder().where_eq(&primary_key, id), &related);
        let query = match modifier {
            Some(modifier) => modifier(query),
            None => query,
        };
        let row = query.first(conn).await?;
        Ok(RelationValue::One(
            row.map(|row| Model::hydrate(related, row)),
        ))
    }
}
