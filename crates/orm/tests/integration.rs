//! Cross-layer integration tests over the scripted backend

use std::sync::Arc;

use opal_orm::backends::scripted::row;
use opal_orm::relations::pivot_relation;
use opal_orm::{
    Connection, DatabaseValue, Model, ModelDefinition, ModelQuery, ModelRegistry, ModelResult,
    RelationValue, ScriptedPool,
};

fn registry() -> Arc<ModelRegistry> {
    let registry = Arc::new(ModelRegistry::new());
    registry.register(
        ModelDefinition::new("User", "users")
            .without_timestamps()
            .hidden(&["password"])
            .has_many("posts", "Post", "user_id")
            .belongs_to_many("roles", "Role", "role_user", "user_id", "role_id"),
    );
    registry.register(ModelDefinition::new("Post", "posts").without_timestamps());
    registry.register(ModelDefinition::new("Role", "roles").without_timestamps());
    registry
}

#[tokio::test]
async fn model_saves_participate_in_transactions() {
    let registry = registry();
    let pool = ScriptedPool::new();
    pool.push_insert_id(1);
    pool.push_insert_id(2);
    let conn = Connection::new("default", Arc::new(pool.clone()));

    let registry_ref = &registry;
    let conn_ref = &conn;
    conn.transaction(|| async move {
        let mut alice = registry_ref.make("User")?;
        alice.set("name", "alice");
        alice.save(conn_ref).await?;

        let mut bob = registry_ref.make("User")?;
        bob.set("name", "bob");
        bob.save(conn_ref).await?;
        Ok(())
    })
    .await
    .unwrap();

    assert_eq!(
        pool.sql(),
        vec![
            "BEGIN".to_string(),
            "INSERT INTO users (name) VALUES (?)".to_string(),
            "INSERT INTO users (name) VALUES (?)".to_string(),
            "COMMIT".to_string(),
        ]
    );
}

#[tokio::test]
async fn failed_transaction_rolls_back_and_rethrows() {
    let registry = registry();
    let pool = ScriptedPool::new();
    pool.push_insert_id(1);
    let conn = Connection::new("default", Arc::new(pool.clone()));

    let registry_ref = &registry;
    let conn_ref = &conn;
    let result: ModelResult<()> = conn
        .transaction(|| async move {
            let mut alice = registry_ref.make("User")?;
            alice.set("name", "alice");
            alice.save(conn_ref).await?;
            Err(opal_orm::ModelError::Database("constraint violated".into()))
        })
        .await;

    assert!(result.is_err());
    let sql = pool.sql();
    assert_eq!(sql.first().map(String::as_str), Some("BEGIN"));
    assert_eq!(sql.last().map(String::as_str), Some("ROLLBACK"));
}

#[tokio::test]
async fn eager_loaded_tree_serializes_with_visibility() {
    let registry = registry();
    let pool = ScriptedPool::new();
    pool.push_rows(vec![row(&[
        ("id", DatabaseValue::Int64(1)),
        ("name", DatabaseValue::String("alice".into())),
        ("password", DatabaseValue::String("secret".into())),
    ])]);
    pool.push_rows(vec![row(&[
        ("id", DatabaseValue::Int64(10)),
        ("title", DatabaseValue::String("hello".into())),
    ])]);
    let conn = Connection::new("default", Arc::new(pool));

    let users = ModelQuery::for_model(&registry, "User")
        .unwrap()
        .with("posts")
        .get(&conn)
        .await
        .unwrap();

    let json = users[0].to_json();
    assert_eq!(json["name"], serde_json::json!("alice"));
    assert!(json.get("password").is_none());
    assert_eq!(json["posts"][0]["title"], serde_json::json!("hello"));
}

#[tokio::test]
async fn toggle_flips_pivot_membership() {
    let registry = registry();
    let user_def = registry.resolve("User").unwrap();
    let roles = pivot_relation(&user_def, "roles", &registry).unwrap();

    let pool = ScriptedPool::new();
    pool.push_rows(vec![row(&[("role_id", DatabaseValue::Int64(1))])]);
    pool.push_affected(1);
    pool.push_affected(1);
    let conn = Connection::new("default", Arc::new(pool.clone()));

    let user = Model::hydrate(user_def.clone(), row(&[("id", DatabaseValue::Int64(5))]));
    let result = roles
        .toggle(
            &user,
            &[DatabaseValue::Int64(1), DatabaseValue::Int64(2)],
            &conn,
        )
        .await
        .unwrap();

    assert_eq!(result.detached, vec![DatabaseValue::Int64(1)]);
    assert_eq!(result.attached, vec![DatabaseValue::Int64(2)]);
}

#[tokio::test]
async fn relation_fetch_inside_transaction_uses_the_pinned_connection() {
    let registry = registry();
    let read = ScriptedPool::new();
    let write = ScriptedPool::new();
    write.push_rows(vec![row(&[("id", DatabaseValue::Int64(1))])]);
    let conn = Connection::with_read_write("default", Arc::new(read.clone()), Arc::new(write));

    let registry_ref = &registry;
    let conn_ref = &conn;
    let users = conn
        .transaction(|| async move {
            ModelQuery::for_model(registry_ref, "User")?
                .get(conn_ref)
                .await
        })
        .await
        .unwrap();

    assert_eq!(users.len(), 1);
    assert!(read.sql().is_empty());
}

#[tokio::test]
async fn find_returns_loaded_relation_counts() {
    let registry = registry();
    let pool = ScriptedPool::new();
    pool.push_rows(vec![row(&[
        ("id", DatabaseValue::Int64(1)),
        ("posts_count", DatabaseValue::Int64(4)),
    ])]);
    let conn = Connection::new("default", Arc::new(pool));

    let user = ModelQuery::for_model(&registry, "User")
        .unwrap()
        .with_count("posts")
        .unwrap()
        .find_or_fail(1i64, &conn)
        .await
        .unwrap();
    assert_eq!(user.get("posts_count"), DatabaseValue::Int64(4));
}

#[tokio::test]
async fn unsaved_parents_load_empty_relations_without_querying() {
    let registry = registry();
    let pool = ScriptedPool::new();
    let conn = Connection::new("default", Arc::new(pool.clone()));

    let user_def = registry.resolve("User").unwrap();
    let relation = opal_orm::relations::materialize(&user_def, "posts", &registry).unwrap();
    let unsaved = Model::new(user_def);

    let value = relation.fetch(&unsaved, &conn, None).await.unwrap();
    match value {
        RelationValue::Many(posts) => assert!(posts.is_empty()),
        other => panic!("expected an empty collection, got {:?}", other),
    }
    assert!(pool.sql().is_empty());
}
