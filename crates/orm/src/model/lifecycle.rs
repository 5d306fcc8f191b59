//! Model persistence lifecycle
//!
//! `save` decides between insert and update from the `exists` flag;
//! updates touch only dirty columns. Observer `-ing` hooks run first and
//! may veto, in which case no statement is issued and the call returns
//! `Ok(false)`.

use chrono::Utc;
use std::sync::Arc;

use super::casting::cast_for_save;
use super::{Model, ModelDefinition};
use crate::backends::{DatabaseValue, SqlRow};
use crate::connection::Connection;
use crate::error::{ModelError, ModelResult};

impl Model {
    /// Persist the instance: INSERT when new, UPDATE of dirty columns
    /// when it exists. Returns `Ok(false)` when an observer vetoed.
    pub async fn save(&mut self, conn: &Connection) -> ModelResult<bool> {
        let observers = self.definition.observers();
        for observer in &observers {
            if !observer.saving(self).await? {
                return Ok(false);
            }
        }

        if !self.exists {
            for observer in &observers {
                if !observer.creating(self).await? {
                    return Ok(false);
                }
            }

            if self.definition.timestamps {
                let now = Utc::now();
                if self.attribute("created_at").map_or(true, |v| v.is_null()) {
                    self.set("created_at", now);
                }
                self.set("updated_at", now);
            }

            let row = self.attributes_for_save();
            let primary_key = self.definition.primary_key.clone();
            let id = self
                .definition
                .builder()
                .insert_get_id(&row, &primary_key, conn)
                .await?;
            if self.primary_key_value().is_none() {
                if let Some(id) = id {
                    self.attributes.insert(primary_key, id);
                }
            }
            self.exists = true;
            self.sync_original();

            for observer in &observers {
                observer.created(self).await?;
            }
        } else {
            for observer in &observers {
                if !observer.updating(self).await? {
                    return Ok(false);
                }
            }

            if self.definition.timestamps && self.is_dirty() {
                self.set("updated_at", Utc::now());
            }
            let dirty = self.dirty();
            if !dirty.is_empty() {
                let key = self.require_primary_key()?;
                self.definition
                    .builder()
                    .where_eq(&self.definition.primary_key.clone(), key)
                    .update(&dirty, conn)
                    .await?;
                self.sync_original();

                for observer in &observers {
                    observer.updated(self).await?;
                }
            }
        }

        for observer in &observers {
            observer.saved(self).await?;
        }
        Ok(true)
    }

    /// Delete the row. Soft-deleting models get a `deleted_at` stamp and
    /// keep their `exists` flag; others are removed outright.
    pub async fn delete(&mut self, conn: &Connection) -> ModelResult<bool> {
        let observers = self.definition.observers();
        for observer in &observers {
            if !observer.deleting(self).await? {
                return Ok(false);
            }
        }

        let key = self.require_primary_key()?;
        let primary_key = self.definition.primary_key.clone();
        if self.definition.soft_deletes {
            let now = Utc::now();
            let mut data = SqlRow::new();
            data.insert("deleted_at", cast_for_save(&now.into()));
            self.definition
                .builder()
                .where_eq(&primary_key, key)
                .update(&data, conn)
                .await?;
            self.set("deleted_at", now);
            self.sync_original();
        } else {
            self.definition
                .builder()
                .where_eq(&primary_key, key)
                .delete(conn)
                .await?;
            self.exists = false;
        }

        for observer in &observers {
            observer.deleted(self).await?;
        }
        Ok(true)
    }

    /// Clear the soft-delete stamp
    pub async fn restore(&mut self, conn: &Connection) -> ModelResult<bool> {
        if !self.definition.soft_deletes {
            return Err(ModelError::UnsupportedOperation(format!(
                "{} does not use soft deletes",
                self.definition.name
            )));
        }
        let observers = self.definition.observers();
        for observer in &observers {
            if !observer.restoring(self).await? {
                return Ok(false);
            }
        }

        let key = self.require_primary_key()?;
        let primary_key = self.definition.primary_key.clone();
        let mut data = SqlRow::new();
        data.insert("deleted_at", DatabaseValue::Null);
        self.definition
            .builder()
            .where_eq(&primary_key, key)
            .update(&data, conn)
            .await?;
        self.set("deleted_at", DatabaseValue::Null);
        self.sync_original();

        for observer in &observers {
            observer.restored(self).await?;
        }
        Ok(true)
    }

    /// True when the soft-delete stamp is set
    pub fn trashed(&self) -> bool {
        self.attribute("deleted_at").map_or(false, |v| !v.is_null())
    }

    /// Reload attributes from the database, discarding local changes and
    /// loaded relations
    pub async fn refresh(&mut self, conn: &Connection) -> ModelResult<()> {
        let key = self.require_primary_key()?;
        let row = self
            .definition
            .builder()
            .where_eq(&self.definition.primary_key.clone(), key)
            .first(conn)
            .await?
            .ok_or_else(|| {
                ModelError::NotFound(format!("{} no longer exists", self.definition.name))
            })?;
        *self = Model::hydrate(self.definition.clone(), row);
        Ok(())
    }

    /// A freshly loaded copy, leaving this instance untouched
    pub async fn fresh(&self, conn: &Connection) -> ModelResult<Option<Model>> {
        let key = self.require_primary_key()?;
        let row = self
            .definition
            .builder()
            .where_eq(&self.definition.primary_key.clone(), key)
            .first(conn)
            .await?;
        Ok(row.map(|row| Model::hydrate(self.definition.clone(), row)))
    }

    /// Build, fill, and save in one step
    pub async fn create<I, T>(
        definition: Arc<ModelDefinition>,
        values: I,
        conn: &Connection,
    ) -> ModelResult<Model>
    where
        I: IntoIterator<Item = (&'static str, T)>,
        T: Into<DatabaseValue>,
    {
        let mut model = Model::new(definition);
        model.fill(values);
        model.save(conn).await?;
        Ok(model)
    }

    fn require_primary_key(&self) -> ModelResult<DatabaseValue> {
        self.primary_key_value()
            .cloned()
            .ok_or(ModelError::MissingPrimaryKey)
    }
}
