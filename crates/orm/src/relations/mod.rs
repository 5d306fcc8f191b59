//! Relation engine
//!
//! Declarative `RelationDef` metadata on a model definition is
//! materialized here into concrete relation objects. Eager loading runs
//! one fetch per parent instance per relation; batching is left to
//! callers who need it.

pub mod belongs_to;
pub mod belongs_to_many;
pub mod has;
pub mod morph;
pub mod through;
pub mod traits;

pub use belongs_to::BelongsTo;
pub use belongs_to_many::{BelongsToMany, SyncResult};
pub use has::{HasMany, HasOne};
pub use morph::{MorphMany, MorphOne, MorphTo};
pub use through::{HasManyThrough, HasOneThrough};
pub use traits::{QueryModifier, Relation, RelationValue};

use std::sync::Arc;

use crate::error::{ModelError, ModelResult};
use crate::model::{ModelDefinition, ModelRegistry, RelationDef};
use crate::query::QueryBuilder;

/// Relation queries carry the related model's soft-delete scope
pub(crate) fn scoped(builder: QueryBuilder, related: &ModelDefinition) -> QueryBuilder {
    if related.soft_deletes {
        builder.where_null("deleted_at")
    } else {
        builder
    }
}

/// Same scope with a table-qualified column, for joined relation queries
pub(crate) fn scoped_qualified(builder: QueryBuilder, related: &ModelDefinition) -> QueryBuilder {
    if related.soft_deletes {
        builder.where_null(&format!("{}.deleted_at", related.table))
    } else {
        builder
    }
}

/// Build the concrete relation for a named relation on a definition
pub fn materialize(
    parent: &Arc<ModelDefinition>,
    name: &str,
    registry: &Arc<ModelRegistry>,
) -> ModelResult<Box<dyn Relation>> {
    let def = parent.relation_def(name)?;
    Ok(match def {
        RelationDef::HasOne {
            related,
            foreign_key,
            local_key,
        } => Box::new(HasOne {
            parent: parent.clone(),
            registry: registry.clone(),
            related: related.clone(),
            foreign_key: foreign_key.clone(),
            local_key: local_key.clone(),
        }),
        RelationDef::HasMany {
            related,
            foreign_key,
            local_key,
        } => Box::new(HasMany {
            parent: parent.clone(),
            registry: registry.clone(),
            related: related.clone(),
            foreign_key: foreign_key.clone(),
            local_key: local_key.clone(),
        }),
        RelationDef::BelongsTo {
            related,
            foreign_key,
            owner_key,
        } => Box::new(BelongsTo {
            parent: parent.clone(),
            registry: registry.clone(),
            related: related.clone(),
            foreign_key: foreign_key.clone(),
            owner_key: owner_key.clone(),
        }),
        RelationDef::BelongsToMany { .. } => Box::new(pivot_relation(parent, name, registry)?),
        RelationDef::HasOneThrough {
            related,
            through,
            first_key,
            second_key,
            local_key,
            second_local_key,
        } => Box::new(HasOneThrough(through::ThroughKeys {
            parent: parent.clone(),
            registry: registry.clone(),
            related: related.clone(),
            through: through.clone(),
            first_key: first_key.clone(),
            second_key: second_key.clone(),
            local_key: local_key.clone(),
            second_local_key: second_local_key.clone(),
        })),
        RelationDef::HasManyThrough {
            related,
            through,
            first_key,
            second_key,
            local_key,
            second_local_key,
        } => Box::new(HasManyThrough(through::ThroughKeys {
            parent: parent.clone(),
            registry: registry.clone(),
            related: related.clone(),
            through: through.clone(),
            first_key: first_key.clone(),
            second_key: second_key.clone(),
            local_key: local_key.clone(),
            second_local_key: second_local_key.clone(),
        })),
        RelationDef::MorphOne {
            related,
            type_column,
            id_column,
            local_key,
        } => Box::new(MorphOne(morph::MorphKeys {
            parent: parent.clone(),
            registry: registry.clone(),
            related: related.clone(),
            type_column: type_column.clone(),
            id_column: id_column.clone(),
            local_key: local_key.clone(),
        })),
        RelationDef::MorphMany {
            related,
            type_column,
            id_column,
            local_key,
        } => Box::new(MorphMany(morph::MorphKeys {
            parent: parent.clone(),
            registry: registry.clone(),
            related: related.clone(),
            type_column: type_column.clone(),
            id_column: id_column.clone(),
            local_key: local_key.clone(),
        })),
        RelationDef::MorphTo {
            type_column,
            id_column,
        } => Box::new(MorphTo {
            registry: registry.clone(),
            type_column: type_column.clone(),
            id_column: id_column.clone(),
        }),
    })
}

/// The concrete belongs-to-many relation, for pivot operations
pub fn pivot_relation(
    parent: &Arc<ModelDefinition>,
    name: &str,
    registry: &Arc<ModelRegistry>,
) -> ModelResult<BelongsToMany> {
    match parent.relation_def(name)? {
        RelationDef::BelongsToMany {
            related,
            pivot_table,
            foreign_pivot_key,
            related_pivot_key,
            pivot_columns,
        } => Ok(BelongsToMany {
            parent: parent.clone(),
            registry: registry.clone(),
            related: related.clone(),
            pivot_table: pivot_table.clone(),
            foreign_pivot_key: foreign_pivot_key.clone(),
            related_pivot_key: related_pivot_key.clone(),
            pivot_columns: pivot_columns.clone(),
        }),
        _ => Err(ModelError::Relationship(format!(
            "relation '{}' on {} is not a belongs-to-many",
            name, parent.name
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::{scripted::row, DatabaseValue, ScriptedPool};
    use crate::connection::Connection;
    use crate::model::Model;

    fn registry() -> Arc<ModelRegistry> {
        let registry = Arc::new(ModelRegistry::new());
        registry.register(
            ModelDefinition::new("User", "users")
                .has_many("posts", "Post", "user_id")
                .has_one("profile", "Profile", "user_id")
                .belongs_to_many("roles", "Role", "role_user", "user_id", "role_id")
                .has_many_through("comments", "Comment", "posts", "user_id", "post_id")
                .morph_many("images", "Image", "imageable"),
        );
        registry.register(
            ModelDefinition::new("Post", "posts").belongs_to("author", "User", "user_id"),
        );
        registry.register(ModelDefinition::new("Profile", "profiles"));
        registry.register(ModelDefinition::new("Role", "roles"));
        registry.register(ModelDefinition::new("Comment", "comments"));
        registry.register(
            ModelDefinition::new("Image", "images").morph_to("imageable", "imageable"),
        );
        registry
    }

    fn user(registry: &Arc<ModelRegistry>, id: i64) -> Model {
        Model::hydrate(
            registry.resolve("User").unwrap(),
            row(&[("id", DatabaseValue::Int64(id))]),
        )
    }

    #[test]
    fn has_many_fetch_query_filters_on_the_foreign_key() {
        let registry = registry();
        let parent_def = registry.resolve("User").unwrap();
        let relation = materialize(&parent_def, "posts", &registry).unwrap();

        let query = relation.fetch_query(&user(&registry, 7)).unwrap().unwrap();
        let compiled = query.compile_select().unwrap();
        assert_eq!(compiled.sql, "SELECT * FROM posts WHERE user_id = ?");
        assert_eq!(compiled.bindings, vec![DatabaseValue::Int64(7)]);
    }

    #[test]
    fn null_parent_key_yields_no_query() {
        let registry = registry();
        let parent_def = registry.resolve("User").unwrap();
        let relation = materialize(&parent_def, "posts", &registry).unwrap();

        let unsaved = Model::new(parent_def.clone());
        assert!(relation.fetch_query(&unsaved).unwrap().is_none());
    }

    #[test]
    fn belongs_to_uses_the_owner_key() {
        let registry = registry();
        let post_def = registry.resolve("Post").unwrap();
        let relation = materialize(&post_def, "author", &registry).unwrap();

        let post = Model::hydrate(
            post_def.clone(),
            row(&[("user_id", DatabaseValue::Int64(3))]),
        );
        let compiled = relation
            .fetch_query(&post)
            .unwrap()
            .unwrap()
            .compile_select()
            .unwrap();
        assert_eq!(compiled.sql, "SELECT * FROM users WHERE id = ?");
    }

    #[test]
    fn belongs_to_many_joins_and_aliases_pivot_columns() {
        let registry = registry();
        let parent_def = registry.resolve("User").unwrap();
        let relation = materialize(&parent_def, "roles", &registry).unwrap();

        let compiled = relation
            .fetch_query(&user(&registry, 2))
            .unwrap()
            .unwrap()
            .compile_select()
            .unwrap();
        assert_eq!(
            compiled.sql,
            "SELECT roles.*, role_user.user_id AS __pivot_user_id, \
             role_user.role_id AS __pivot_role_id \
             FROM roles \
             INNER JOIN role_user ON role_user.role_id = roles.id \
             WHERE role_user.user_id = ?"
        );
    }

    #[test]
    fn through_relation_joins_the_intermediate_table() {
        let registry = registry();
        let parent_def = registry.resolve("User").unwrap();
        let relation = materialize(&parent_def, "comments", &registry).unwrap();

        let compiled = relation
            .fetch_query(&user(&registry, 4))
            .unwrap()
            .unwrap()
            .compile_select()
            .unwrap();
        assert_eq!(
            compiled.sql,
            "SELECT comments.* FROM comments \
             INNER JOIN posts ON posts.id = comments.post_id \
             WHERE posts.user_id = ?"
        );
    }

    #[test]
    fn morph_many_binds_the_morph_class() {
        let registry = registry();
        let parent_def = registry.resolve("User").unwrap();
        let relation = materialize(&parent_def, "images", &registry).unwrap();

        let compiled = relation
            .fetch_query(&user(&registry, 9))
            .unwrap()
            .unwrap()
            .compile_select()
            .unwrap();
        assert_eq!(
            compiled.sql,
            "SELECT * FROM images WHERE imageable_type = ? AND imageable_id = ?"
        );
        assert_eq!(
            compiled.bindings,
            vec![
                DatabaseValue::String("User".into()),
                DatabaseValue::Int64(9)
            ]
        );
    }

    #[tokio::test]
    async fn morph_to_resolves_through_the_morph_map() {
        let registry = registry();
        let image_def = registry.resolve("Image").unwrap();
        let relation = materialize(&image_def, "imageable", &registry).unwrap();

        let pool = ScriptedPool::new();
        pool.push_rows(vec![row(&[("id", DatabaseValue::Int64(1))])]);
        let conn = Connection::new("default", Arc::new(pool.clone()));

        let image = Model::hydrate(
            image_def.clone(),
            row(&[
                ("imageable_type", DatabaseValue::String("User".into())),
                ("imageable_id", DatabaseValue::Int64(1)),
            ]),
        );
        let value = relation.fetch(&image, &conn, None).await.unwrap();
        match value {
            RelationValue::One(Some(model)) => assert_eq!(model.definition().name, "User"),
            other => panic!("expected a loaded parent, got {:?}", other),
        }
        assert_eq!(
            pool.sql(),
            vec!["SELECT * FROM users WHERE id = ? LIMIT 1".to_string()]
        );
    }

    #[tokio::test]
    async fn morph_to_with_unmapped_tag_is_an_error() {
        let registry = registry();
        let image_def = registry.resolve("Image").unwrap();
        let relation = materialize(&image_def, "imageable", &registry).unwrap();

        let pool = ScriptedPool::new();
        let conn = Connection::new("default", Arc::new(pool));

        let image = Model::hydrate(
            image_def.clone(),
            row(&[
                ("imageable_type", DatabaseValue::String("Ghost".into())),
                ("imageable_id", DatabaseValue::Int64(1)),
            ]),
        );
        let err = relation.fetch(&image, &conn, None).await.unwrap_err();
        assert!(matches!(err, ModelError::Relationship(msg) if msg.contains("Ghost")));
    }

    #[tokio::test]
    async fn sync_diffs_against_current_pivot_rows() {
        let registry = registry();
        let parent_def = registry.resolve("User").unwrap();
        let relation = pivot_relation(&parent_def, "roles", &registry).unwrap();

        let pool = ScriptedPool::new();
        // Current pivot holds roles 1 and 2
        pool.push_rows(vec![
            row(&[("role_id", DatabaseValue::Int64(1))]),
            row(&[("role_id", DatabaseValue::Int64(2))]),
        ]);
        pool.push_affected(1);
        pool.push_affected(1);
        let conn = Connection::new("default", Arc::new(pool.clone()));

        let parent = user(&registry, 5);
        let result = relation
            .sync(
                &parent,
                &[DatabaseValue::Int64(2), DatabaseValue::Int64(3)],
                &conn,
            )
            .await
            .unwrap();

        assert_eq!(result.detached, vec![DatabaseValue::Int64(1)]);
        assert_eq!(result.attached, vec![DatabaseValue::Int64(3)]);
        assert_eq!(
            pool.sql(),
            vec![
                "SELECT role_id FROM role_user WHERE user_id = ?".to_string(),
                "DELETE FROM role_user WHERE user_id = ? AND role_id IN (?)".to_string(),
                "INSERT INTO role_user (user_id, role_id) VALUES (?, ?)".to_string(),
            ]
        );
    }
}
