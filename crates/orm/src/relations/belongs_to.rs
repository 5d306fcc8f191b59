//! Belongs-to relation: the inverse side, keyed by a foreign key on the
//! parent instance itself

use async_trait::async_trait;
use std::sync::Arc;

use super::traits::Relation;
use crate::error::ModelResult;
use crate::model::{Model, ModelDefinition, ModelRegistry};
use crate::query::QueryBuilder;

pub struct BelongsTo {
    pub(crate) parent: Arc<ModelDefinition>,
    pub(crate) registry: Arc<ModelRegistry>,
    pub(crate) related: String,
    pub(crate) foreign_key: String,
    pub(crate) owner_key: String,
}

#[async_trait]
impl Relation for BelongsTo {
    fn is_singular(&self) -> bool {
        true
    }

    fn related(&self) -> ModelResult<Arc<ModelDefinition>> {
        self.registry.resolve(&self.related)
    }

    fn fetch_query(&self, parent: &Model) -> ModelResult<Option<QueryBuilder>> {
        let key = match parent.attribute(&self.foreign_key) {
            Some(key) if !key.is_null() => key.clone(),
            _ => return Ok(None),
        };
        let related = self.related()?;
        Ok(Some(super::scoped(
            related.builder().where_eq(&self.owner_key, key),
            &related,
        )))
    }

    fn correlated_query(&self) -> ModelResult<QueryBuilder> {
        let related = self.related()?;
        Ok(super::scoped(
            QueryBuilder::table(&related.table).where_raw(
                &format!(
                    "{}.{} = {}.{}",
                    related.table, self.owner_key, self.parent.table, self.foreign_key
                ),
                vec![],
            ),
            &related,
        ))
    }
}
