//! Active-record model layer
//!
//! A `Model` is an attribute bag bound to a `ModelDefinition`. Reads go
//! through casts and accessors, writes through mutators; the original
//! attribute snapshot drives dirty tracking so updates touch only
//! changed columns.

pub mod casting;
pub mod definition;
pub mod lifecycle;
pub mod observers;
pub mod query;
pub mod serialize;

pub use casting::CastType;
pub use definition::{ModelDefinition, ModelRegistry, RelationDef};
pub use observers::ModelObserver;
pub use query::ModelQuery;

use std::collections::HashMap;
use std::sync::Arc;

use crate::backends::{DatabaseValue, SqlRow};
use crate::relations::RelationValue;

use casting::{cast_for_save, cast_on_read};

/// One model instance: attributes plus loaded relations
#[derive(Clone)]
pub struct Model {
    pub(crate) definition: Arc<ModelDefinition>,
    pub(crate) attributes: HashMap<String, DatabaseValue>,
    pub(crate) original: HashMap<String, DatabaseValue>,
    pub(crate) relations: HashMap<String, RelationValue>,
    pub(crate) pivot: Option<SqlRow>,
    pub(crate) exists: bool,
}

/// Prefix used to smuggle pivot columns through a joined select
pub(crate) const PIVOT_PREFIX: &str = "__pivot_";

impl Model {
    /// A blank, not-yet-persisted instance
    pub fn new(definition: Arc<ModelDefinition>) -> Self {
        Self {
            definition,
            attributes: HashMap::new(),
            original: HashMap::new(),
            relations: HashMap::new(),
            pivot: None,
            exists: false,
        }
    }

    /// Build an instance from a result row. Pivot-prefixed columns are
    /// split off into the pivot bag.
    pub fn hydrate(definition: Arc<ModelDefinition>, row: SqlRow) -> Self {
        let mut attributes = HashMap::new();
        let mut pivot = SqlRow::new();
        for (column, value) in row.iter() {
            if let Some(pivot_column) = column.strip_prefix(PIVOT_PREFIX) {
                pivot.insert(pivot_column.to_string(), value.clone());
            } else {
                attributes.insert(column.clone(), value.clone());
            }
        }
        Self {
            definition,
            original: attributes.clone(),
            attributes,
            relations: HashMap::new(),
            pivot: (!pivot.is_empty()).then_some(pivot),
            exists: true,
        }
    }

    pub fn definition(&self) -> &Arc<ModelDefinition> {
        &self.definition
    }

    pub fn exists(&self) -> bool {
        self.exists
    }

    /// Pivot columns carried by a belongs-to-many fetch
    pub fn pivot(&self) -> Option<&SqlRow> {
        self.pivot.as_ref()
    }

    /// Raw attribute, no cast or accessor applied
    pub fn attribute(&self, name: &str) -> Option<&DatabaseValue> {
        self.attributes.get(name)
    }

    /// Read an attribute through its cast and accessor
    pub fn get(&self, name: &str) -> DatabaseValue {
        let mut value = self
            .attributes
            .get(name)
            .cloned()
            .unwrap_or(DatabaseValue::Null);
        if let Some(cast) = self.definition.casts.get(name) {
            value = cast_on_read(value, *cast);
        }
        if let Some(accessor) = self.definition.accessors.get(name) {
            value = accessor(value);
        }
        value
    }

    /// Write an attribute through its mutator
    pub fn set<T: Into<DatabaseValue>>(&mut self, name: &str, value: T) {
        let mut value = value.into();
        if let Some(mutator) = self.definition.mutators.get(name) {
            value = mutator(value);
        }
        self.attributes.insert(name.to_string(), value);
    }

    /// Set several attributes at once
    pub fn fill<I, T>(&mut self, values: I)
    where
        I: IntoIterator<Item = (&'static str, T)>,
        T: Into<DatabaseValue>,
    {
        for (name, value) in values {
            self.set(name, value);
        }
    }

    /// The primary key value, if set
    pub fn primary_key_value(&self) -> Option<&DatabaseValue> {
        self.attributes
            .get(&self.definition.primary_key)
            .filter(|v| !v.is_null())
    }

    /// Attributes changed since the last sync, serialized for storage.
    /// Columns come out in name order so generated SQL is stable.
    pub fn dirty(&self) -> SqlRow {
        let mut changed: Vec<_> = self
            .attributes
            .iter()
            .filter(|(name, value)| self.original.get(name.as_str()) != Some(*value))
            .collect();
        changed.sort_by(|a, b| a.0.cmp(b.0));
        let mut row = SqlRow::new();
        for (name, value) in changed {
            row.insert(name.clone(), cast_for_save(value));
        }
        row
    }

    pub fn is_dirty(&self) -> bool {
        self.attributes
            .iter()
            .any(|(name, value)| self.original.get(name) != Some(value))
    }

    /// All attributes serialized for storage (insert path), in name order
    pub(crate) fn attributes_for_save(&self) -> SqlRow {
        let mut all: Vec<_> = self.attributes.iter().collect();
        all.sort_by(|a, b| a.0.cmp(b.0));
        let mut row = SqlRow::new();
        for (name, value) in all {
            row.insert(name.clone(), cast_for_save(value));
        }
        row
    }

    /// Snapshot current attributes as the clean state
    pub fn sync_original(&mut self) {
        self.original = self.attributes.clone();
    }

    /// A loaded relation, if eager-loaded or set manually
    pub fn relation(&self, name: &str) -> Option<&RelationValue> {
        self.relations.get(name)
    }

    pub fn set_relation(&mut self, name: impl Into<String>, value: RelationValue) {
        self.relations.insert(name.into(), value);
    }

    pub fn relation_loaded(&self, name: &str) -> bool {
        self.relations.contains_key(name)
    }
}

impl std::fmt::Debug for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Model")
            .field("model", &self.definition.name)
            .field("exists", &self.exists)
            .field("attributes", &self.attributes)
            .finish()
    }
}
