//! Model definitions and the registry
//!
//! A `ModelDefinition` is the runtime description of one model: table,
//! keys, casts, serialization visibility, accessors and mutators, and a
//! declarative relation map. Definitions are registered by name in a
//! `ModelRegistry`, which also maintains the morph map used to resolve
//! polymorphic type tags back to definitions.

use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use super::casting::CastType;
use super::observers::ModelObserver;
use super::Model;
use crate::backends::DatabaseValue;
use crate::error::{ModelError, ModelResult};
use crate::query::QueryBuilder;

/// Transform applied by an accessor (on read) or mutator (on write)
pub type AttributeTransform = Arc<dyn Fn(DatabaseValue) -> DatabaseValue + Send + Sync>;

/// Declarative relation metadata. Related models are named by their
/// registry key, so definitions never hold references to each other.
#[derive(Clone)]
pub enum RelationDef {
    HasOne {
        related: String,
        foreign_key: String,
        local_key: String,
    },
    HasMany {
        related: String,
        foreign_key: String,
        local_key: String,
    },
    BelongsTo {
        related: String,
        foreign_key: String,
        owner_key: String,
    },
    BelongsToMany {
        related: String,
        pivot_table: String,
        foreign_pivot_key: String,
        related_pivot_key: String,
        pivot_columns: Vec<String>,
    },
    HasOneThrough {
        related: String,
        through: String,
        first_key: String,
        second_key: String,
        local_key: String,
        second_local_key: String,
    },
    HasManyThrough {
        related: String,
        through: String,
        first_key: String,
        second_key: String,
        local_key: String,
        second_local_key: String,
    },
    MorphOne {
        related: String,
        type_column: String,
        id_column: String,
        local_key: String,
    },
    MorphMany {
        related: String,
        type_column: String,
        id_column: String,
        local_key: String,
    },
    MorphTo {
        type_column: String,
        id_column: String,
    },
}

/// Runtime description of one model
pub struct ModelDefinition {
    pub name: String,
    pub table: String,
    pub primary_key: String,
    pub timestamps: bool,
    pub soft_deletes: bool,
    pub morph_class: String,
    pub casts: HashMap<String, CastType>,
    pub hidden: Vec<String>,
    pub visible: Vec<String>,
    pub relations: HashMap<String, RelationDef>,
    pub(crate) accessors: HashMap<String, AttributeTransform>,
    pub(crate) mutators: HashMap<String, AttributeTransform>,
    pub(crate) observers: RwLock<Vec<Arc<dyn ModelObserver>>>,
}

impl ModelDefinition {
    pub fn new(name: impl Into<String>, table: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            morph_class: name.clone(),
            name,
            table: table.into(),
            primary_key: "id".to_string(),
            timestamps: true,
            soft_deletes: false,
            casts: HashMap::new(),
            hidden: Vec::new(),
            visible: Vec::new(),
            relations: HashMap::new(),
            accessors: HashMap::new(),
            mutators: HashMap::new(),
            observers: RwLock::new(Vec::new()),
        }
    }

    pub fn primary_key(mut self, key: &str) -> Self {
        self.primary_key = key.to_string();
        self
    }

    pub fn without_timestamps(mut self) -> Self {
        self.timestamps = false;
        self
    }

    pub fn soft_deletes(mut self) -> Self {
        self.soft_deletes = true;
        self
    }

    /// Override the tag written to morph type columns (defaults to the
    /// model name)
    pub fn morph_class(mut self, class: &str) -> Self {
        self.morph_class = class.to_string();
        self
    }

    pub fn cast(mut self, column: &str, cast: CastType) -> Self {
        self.casts.insert(column.to_string(), cast);
        self
    }

    /// Columns omitted from `to_json`
    pub fn hidden(mut self, columns: &[&str]) -> Self {
        self.hidden = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    /// Allow-list for `to_json`; non-empty visible overrides hidden
    pub fn visible(mut self, columns: &[&str]) -> Self {
        self.visible = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn accessor<F>(mut self, attribute: &str, transform: F) -> Self
    where
        F: Fn(DatabaseValue) -> DatabaseValue + Send + Sync + 'static,
    {
        self.accessors
            .insert(attribute.to_string(), Arc::new(transform));
        self
    }

    pub fn mutator<F>(mut self, attribute: &str, transform: F) -> Self
    where
        F: Fn(DatabaseValue) -> DatabaseValue + Send + Sync + 'static,
    {
        self.mutators
            .insert(attribute.to_string(), Arc::new(transform));
        self
    }

    pub fn relation(mut self, name: &str, def: RelationDef) -> Self {
        self.relations.insert(name.to_string(), def);
        self
    }

    pub fn has_one(self, name: &str, related: &str, foreign_key: &str) -> Self {
        let local_key = self.primary_key.clone();
        self.relation(
            name,
            RelationDef::HasOne {
                related: related.to_string(),
                foreign_key: foreign_key.to_string(),
                local_key,
            },
        )
    }

    pub fn has_many(self, name: &str, related: &str, foreign_key: &str) -> Self {
        let local_key = self.primary_key.clone();
        self.relation(
            name,
            RelationDef::HasMany {
                related: related.to_string(),
                foreign_key: foreign_key.to_string(),
                local_key,
            },
        )
    }

    pub fn belongs_to(self, name: &str, related: &str, foreign_key: &str) -> Self {
        self.relation(
            name,
            RelationDef::BelongsTo {
                related: related.to_string(),
                foreign_key: foreign_key.to_string(),
                owner_key: "id".to_string(),
            },
        )
    }

    pub fn belongs_to_many(
        self,
        name: &str,
        related: &str,
        pivot_table: &str,
        foreign_pivot_key: &str,
        related_pivot_key: &str,
    ) -> Self {
        self.relation(
            name,
            RelationDef::BelongsToMany {
                related: related.to_string(),
                pivot_table: pivot_table.to_string(),
                foreign_pivot_key: foreign_pivot_key.to_string(),
                related_pivot_key: related_pivot_key.to_string(),
                pivot_columns: Vec::new(),
            },
        )
    }

    /// Extra pivot columns carried alongside a belongs-to-many relation
    pub fn pivot_columns(mut self, relation: &str, columns: &[&str]) -> Self {
        if let Some(RelationDef::BelongsToMany { pivot_columns, .. }) =
            self.relations.get_mut(relation)
        {
            *pivot_columns = columns.iter().map(|c| c.to_string()).collect();
        }
        self
    }

    pub fn has_many_through(
        self,
        name: &str,
        related: &str,
        through: &str,
        first_key: &str,
        second_key: &str,
    ) -> Self {
        let local_key = self.primary_key.clone();
        self.relation(
            name,
            RelationDef::HasManyThrough {
                related: related.to_string(),
                through: through.to_string(),
                first_key: first_key.to_string(),
                second_key: second_key.to_string(),
                local_key,
                second_local_key: "id".to_string(),
            },
        )
    }

    pub fn has_one_through(
        self,
        name: &str,
        related: &str,
        through: &str,
        first_key: &str,
        second_key: &str,
    ) -> Self {
        let local_key = self.primary_key.clone();
        self.relation(
            name,
            RelationDef::HasOneThrough {
                related: related.to_string(),
                through: through.to_string(),
                first_key: first_key.to_string(),
                second_key: second_key.to_string(),
                local_key,
                second_local_key: "id".to_string(),
            },
        )
    }

    /// Morph columns derive from the morph name: `{name}_type` and
    /// `{name}_id`
    pub fn morph_many(self, name: &str, related: &str, morph_name: &str) -> Self {
        let local_key = self.primary_key.clone();
        self.relation(
            name,
            RelationDef::MorphMany {
                related: related.to_string(),
                type_column: format!("{}_type", morph_name),
                id_column: format!("{}_id", morph_name),
                local_key,
            },
        )
    }

    pub fn morph_one(self, name: &str, related: &str, morph_name: &str) -> Self {
        let local_key = self.primary_key.clone();
        self.relation(
            name,
            RelationDef::MorphOne {
                related: related.to_string(),
                type_column: format!("{}_type", morph_name),
                id_column: format!("{}_id", morph_name),
                local_key,
            },
        )
    }

    pub fn morph_to(self, name: &str, morph_name: &str) -> Self {
        self.relation(
            name,
            RelationDef::MorphTo {
                type_column: format!("{}_type", morph_name),
                id_column: format!("{}_id", morph_name),
            },
        )
    }

    /// Attach an observer; usable after the definition is registered
    pub fn observe(&self, observer: Arc<dyn ModelObserver>) {
        if let Ok(mut observers) = self.observers.write() {
            observers.push(observer);
        }
    }

    pub fn clear_observers(&self) {
        if let Ok(mut observers) = self.observers.write() {
            observers.clear();
        }
    }

    pub(crate) fn observers(&self) -> Vec<Arc<dyn ModelObserver>> {
        self.observers
            .read()
            .map(|observers| observers.clone())
            .unwrap_or_default()
    }

    pub fn relation_def(&self, name: &str) -> ModelResult<&RelationDef> {
        self.relations.get(name).ok_or_else(|| {
            ModelError::Relationship(format!(
                "relation '{}' is not defined on {}",
                name, self.name
            ))
        })
    }

    /// A query builder scoped to this model's table
    pub fn builder(&self) -> QueryBuilder {
        QueryBuilder::table(&self.table)
    }
}

impl std::fmt::Debug for ModelDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelDefinition")
            .field("name", &self.name)
            .field("table", &self.table)
            .field("primary_key", &self.primary_key)
            .field("timestamps", &self.timestamps)
            .field("soft_deletes", &self.soft_deletes)
            .finish()
    }
}

/// Registry of model definitions plus the morph map
#[derive(Default)]
pub struct ModelRegistry {
    definitions: DashMap<String, Arc<ModelDefinition>>,
    morph_map: DashMap<String, String>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a definition under its name and morph class
    pub fn register(&self, definition: ModelDefinition) -> Arc<ModelDefinition> {
        let definition = Arc::new(definition);
        self.morph_map
            .insert(definition.morph_class.clone(), definition.name.clone());
        self.definitions
            .insert(definition.name.clone(), definition.clone());
        definition
    }

    pub fn resolve(&self, name: &str) -> ModelResult<Arc<ModelDefinition>> {
        self.definitions
            .get(name)
            .map(|entry| entry.clone())
            .ok_or_else(|| {
                ModelError::Configuration(format!("model '{}' is not registered", name))
            })
    }

    /// Resolve a morph type tag to its definition
    pub fn resolve_morph(&self, tag: &str) -> ModelResult<Arc<ModelDefinition>> {
        let name = self.morph_map.get(tag).map(|entry| entry.clone());
        match name {
            Some(name) => self.resolve(&name),
            None => Err(ModelError::Relationship(format!(
                "no morph map entry for type '{}'",
                tag
            ))),
        }
    }

    /// A blank instance of the named model
    pub fn make(&self, name: &str) -> ModelResult<Model> {
        Ok(Model::new(self.resolve(name)?))
    }

    pub fn clear(&self) {
        self.definitions.clear();
        self.morph_map.clear();
    }
}
