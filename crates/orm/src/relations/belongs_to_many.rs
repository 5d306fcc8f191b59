//! Belongs-to-many relation over a pivot table
//!
//! Fetches join the pivot and alias its columns with a reserved prefix
//! so hydration can split them into the model's pivot bag. The pivot
//! itself is managed with attach / detach / sync / toggle.

use async_trait::async_trait;
use std::sync::Arc;

use super::traits::Relation;
use crate::backends::{DatabaseValue, SqlRow};
use crate::connection::Connection;
use crate::error::{ModelError, ModelResult};
use crate::model::{Model, ModelDefinition, ModelRegistry, PIVOT_PREFIX};
use crate::query::QueryBuilder;

pub struct BelongsToMany {
    pub(crate) parent: Arc<ModelDefinition>,
    pub(crate) registry: Arc<ModelRegistry>,
    pub(crate) related: String,
    pub(crate) pivot_table: String,
    pub(crate) foreign_pivot_key: String,
    pub(crate) related_pivot_key: String,
    pub(crate) pivot_columns: Vec<String>,
}

/// Outcome of a sync or toggle: which related keys were added and removed
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncResult {
    pub attached: Vec<DatabaseValue>,
    pub detached: Vec<DatabaseValue>,
}

impl BelongsToMany {
    fn parent_key(&self, parent: &Model) -> ModelResult<DatabaseValue> {
        parent
            .primary_key_value()
            .cloned()
            .ok_or_else(|| {
                ModelError::Relationship(format!(
                    "cannot use pivot operations on an unsaved {}",
                    self.parent.name
                ))
            })
    }

    fn pivot_query(&self, parent: &Model) -> ModelResult<QueryBuilder> {
        Ok(QueryBuilder::table(&self.pivot_table)
            .where_eq(&self.foreign_pivot_key, self.parent_key(parent)?))
    }

    /// Insert pivot rows linking the parent to each id
    pub async fn attach(
        &self,
        parent: &Model,
        ids: &[DatabaseValue],
        conn: &Connection,
    ) -> ModelResult<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let key = self.parent_key(parent)?;
        let rows: Vec<SqlRow> = ids
            .iter()
            .map(|id| {
                let mut row = SqlRow::new();
                row.insert(self.foreign_pivot_key.clone(), key.clone());
                row.insert(self.related_pivot_key.clone(), id.clone());
                row
            })
            .collect();
        QueryBuilder::table(&self.pivot_table)
            .insert(&rows, conn)
            .await?;
        Ok(())
    }

    /// Remove pivot rows; `None` detaches everything
    pub async fn detach(
        &self,
        parent: &Model,
        ids: Option<&[DatabaseValue]>,
        conn: &Connection,
    ) -> ModelResult<u64> {
        let mut query = self.pivot_query(parent)?;
        if let Some(ids) = ids {
            if ids.is_empty() {
                return Ok(0);
            }
            query = query.where_in(&self.related_pivot_key, ids.to_vec());
        }
        query.delete(conn).await
    }

    /// Related keys currently present on the pivot for this parent
    pub async fn current_ids(
        &self,
        parent: &Model,
        conn: &Connection,
    ) -> ModelResult<Vec<DatabaseValue>> {
        let rows = self
            .pivot_query(parent)?
            .select(&[self.related_pivot_key.as_str()])
            .get(conn)
            .await?;
        Ok(rows
            .iter()
            .filter_map(|row| row.get(&self.related_pivot_key).cloned())
            .collect())
    }

    /// Make the pivot match `ids` exactly: detach what is absent from
    /// the list, attach what is missing from the pivot
    pub async fn sync(
        &self,
        parent: &Model,
        ids: &[DatabaseValue],
        conn: &Connection,
    ) -> ModelResult<SyncResult> {
        let current = self.current_ids(parent, conn).await?;
        let detached: Vec<DatabaseValue> = current
            .iter()
            .filter(|id| !ids.contains(id))
            .cloned()
            .collect();
        let attached: Vec<DatabaseValue> = ids
            .iter()
            .filter(|id| !current.contains(id))
            .cloned()
            .collect();

        if !detached.is_empty() {
            self.detach(parent, Some(&detached), conn).await?;
        }
        self.attach(parent, &attached, conn).await?;
        Ok(SyncResult { attached, detached })
    }

    /// Flip membership: attached ids are detached and vice versa
    pub async fn toggle(
        &self,
        parent: &Model,
        ids: &[DatabaseValue],
        conn: &Connection,
    ) -> ModelResult<SyncResult> {
        let current = self.current_ids(parent, conn).await?;
        let detached: Vec<DatabaseValue> = ids
            .iter()
            .filter(|id| current.contains(id))
            .cloned()
            .collect();
        let attached: Vec<DatabaseValue> = ids
            .iter()
            .filter(|id| !current.contains(id))
            .cloned()
            .collect();

        if !detached.is_empty() {
            self.detach(parent, Some(&detached), conn).await?;
        }
        self.attach(parent, &attached, conn).await?;
        Ok(SyncResult { attached, detached })
    }
}

#[async_trait]
impl Relation for BelongsToMany {
    fn is_singular(&self) -> bool {
        false
    }

    fn related(&self) -> ModelResult<Arc<ModelDefinition>> {
        self.registry.resolve(&self.related)
    }

    fn fetch_query(&self, parent: &Model) -> ModelResult<Option<QueryBuilder>> {
        let key = match parent.primary_key_value() {
            Some(key) => key.clone(),
            None => return Ok(None),
        };
        let related = self.related()?;

        let star = format!("{}.*", related.table);
        let mut query = QueryBuilder::table(&related.table)
            .select(&[star.as_str()])
            .inner_join(
                &self.pivot_table,
                &format!("{}.{}", self.pivot_table, self.related_pivot_key),
                &format!("{}.{}", related.table, related.primary_key),
            )
            .where_eq(
                &format!("{}.{}", self.pivot_table, self.foreign_pivot_key),
                key,
            );

        let mut carried = vec![
            self.foreign_pivot_key.clone(),
            self.related_pivot_key.clone(),
        ];
        carried.extend(self.pivot_columns.iter().cloned());
        for column in carried {
            query = query.add_select(&format!(
                "{}.{} AS {}{}",
                self.pivot_table, column, PIVOT_PREFIX, column
            ));
        }
        Ok(Some(super::scoped_qualified(query, &related)))
    }

    fn correlated_query(&self) -> ModelResult<QueryBuilder> {
        let related = self.related()?;
        let query = QueryBuilder::table(&related.table)
            .inner_join(
                &self.pivot_table,
                &format!("{}.{}", self.pivot_table, self.related_pivot_key),
                &format!("{}.{}", related.table, related.primary_key),
            )
            .where_raw(
                &format!(
                    "{}.{} = {}.{}",
                    self.pivot_table,
                    self.foreign_pivot_key,
                    self.parent.table,
                    self.parent.primary_key
                ),
                vec![],
            );
        Ok(super::scoped_qualified(query, &related))
    }
}
