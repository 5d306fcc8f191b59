//! Model JSON serialization
//!
//! `to_json` runs every attribute through its cast and accessor, applies
//! the visibility rules, and serializes loaded relations recursively. A
//! non-empty visible list is an allow-list and overrides hidden.

use serde_json::{Map, Value as JsonValue};

use super::Model;
use crate::relations::RelationValue;

impl Model {
    pub fn to_json(&self) -> JsonValue {
        let mut map = Map::new();

        let mut names: Vec<&String> = self.attributes.keys().collect();
        names.sort();
        for name in names {
            if !self.attribute_visible(name) {
                continue;
            }
            map.insert(name.clone(), self.get(name).to_json());
        }

        if let Some(pivot) = &self.pivot {
            map.insert("pivot".to_string(), pivot.to_json());
        }

        let mut relation_names: Vec<&String> = self.relations.keys().collect();
        relation_names.sort();
        for name in relation_names {
            let value = match &self.relations[name] {
                RelationValue::One(Some(model)) => model.to_json(),
                RelationValue::One(None) => JsonValue::Null,
                RelationValue::Many(models) => {
                    JsonValue::Array(models.iter().map(Model::to_json).collect())
                }
            };
            map.insert(name.clone(), value);
        }

        JsonValue::Object(map)
    }

    fn attribute_visible(&self, name: &str) -> bool {
        if !self.definition.visible.is_empty() {
            return self.definition.visible.iter().any(|v| v == name);
        }
        !self.definition.hidden.iter().any(|h| h == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::{scripted::row, DatabaseValue};
    use crate::model::{CastType, ModelDefinition};
    use std::sync::Arc;

    #[test]
    fn hidden_columns_are_omitted() {
        let def = Arc::new(ModelDefinition::new("User", "users").hidden(&["password"]));
        let user = Model::hydrate(
            def,
            row(&[
                ("id", DatabaseValue::Int64(1)),
                ("password", DatabaseValue::String("secret".into())),
            ]),
        );
        let json = user.to_json();
        assert_eq!(json["id"], serde_json::json!(1));
        assert!(json.get("password").is_none());
    }

    #[test]
    fn visible_overrides_hidden() {
        let def = Arc::new(
            ModelDefinition::new("User", "users")
                .hidden(&["email"])
                .visible(&["email"]),
        );
        let user = Model::hydrate(
            def,
            row(&[
                ("id", DatabaseValue::Int64(1)),
                ("email", DatabaseValue::String("a@b.c".into())),
            ]),
        );
        let json = user.to_json();
        assert!(json.get("id").is_none());
        assert_eq!(json["email"], serde_json::json!("a@b.c"));
    }

    #[test]
    fn casts_and_accessors_shape_the_output() {
        let def = Arc::new(
            ModelDefinition::new("User", "users")
                .cast("active", CastType::Bool)
                .accessor("name", |v| match v {
                    DatabaseValue::String(s) => DatabaseValue::String(s.to_uppercase()),
                    other => other,
                }),
        );
        let user = Model::hydrate(
            def,
            row(&[
                ("name", DatabaseValue::String("alice".into())),
                ("active", DatabaseValue::Int64(1)),
            ]),
        );
        let json = user.to_json();
        assert_eq!(json["name"], serde_json::json!("ALICE"));
        assert_eq!(json["active"], serde_json::json!(true));
    }

    #[test]
    fn loaded_relations_serialize_recursively() {
        let user_def = Arc::new(ModelDefinition::new("User", "users"));
        let post_def = Arc::new(ModelDefinition::new("Post", "posts"));

        let mut user = Model::hydrate(user_def, row(&[("id", DatabaseValue::Int64(1))]));
        let post = Model::hydrate(
            post_def,
            row(&[("title", DatabaseValue::String("hi".into()))]),
        );
        user.set_relation("posts", RelationValue::Many(vec![post]));
        user.set_relation("profile", RelationValue::One(None));

        let json = user.to_json();
        assert_eq!(json["posts"][0]["title"], serde_json::json!("hi"));
        assert_eq!(json["profile"], JsonValue::Null);
    }
}
