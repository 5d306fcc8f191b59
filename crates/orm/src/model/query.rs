//! Model-aware query builder
//!
//! Wraps the SQL builder with hydration, the soft-delete default scope,
//! eager loading, and relation subquery filters. Eager loading issues
//! one relation query per parent instance; callers with large result
//! sets should batch by key themselves.

use std::sync::Arc;

use crate::backends::DatabaseValue;
use crate::connection::Connection;
use crate::error::{ModelError, ModelResult};
use crate::query::{OrderDirection, Paginator, QueryBuilder};
use crate::relations::{self, QueryModifier};

use super::{Model, ModelDefinition, ModelRegistry};

struct EagerLoad {
    name: String,
    constraint: Option<Arc<QueryModifier>>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum TrashedMode {
    Exclude,
    Include,
    Only,
}

pub struct ModelQuery {
    definition: Arc<ModelDefinition>,
    registry: Arc<ModelRegistry>,
    builder: QueryBuilder,
    eager: Vec<EagerLoad>,
    trashed: TrashedMode,
}

impl ModelQuery {
    pub fn new(definition: Arc<ModelDefinition>, registry: Arc<ModelRegistry>) -> Self {
        let builder = definition.builder();
        Self {
            definition,
            registry,
            builder,
            eager: Vec::new(),
            trashed: TrashedMode::Exclude,
        }
    }

    /// Query a registered model by name
    pub fn for_model(registry: &Arc<ModelRegistry>, name: &str) -> ModelResult<Self> {
        Ok(Self::new(registry.resolve(name)?, registry.clone()))
    }

    pub fn where_eq<T: Into<DatabaseValue>>(mut self, column: &str, value: T) -> Self {
        self.builder = self.builder.where_eq(column, value);
        self
    }

    pub fn where_op<T: Into<DatabaseValue>>(
        mut self,
        column: &str,
        operator: &str,
        value: T,
    ) -> Self {
        self.builder = self.builder.where_op(column, operator, value);
        self
    }

    pub fn where_in<T: Into<DatabaseValue>>(mut self, column: &str, values: Vec<T>) -> Self {
        self.builder = self.builder.where_in(column, values);
        self
    }

    pub fn where_null(mut self, column: &str) -> Self {
        self.builder = self.builder.where_null(column);
        self
    }

    pub fn where_not_null(mut self, column: &str) -> Self {
        self.builder = self.builder.where_not_null(column);
        self
    }

    pub fn where_raw(mut self, sql: &str, bindings: Vec<DatabaseValue>) -> Self {
        self.builder = self.builder.where_raw(sql, bindings);
        self
    }

    pub fn order_by(mut self, column: &str, direction: OrderDirection) -> Self {
        self.builder = self.builder.order_by(column, direction);
        self
    }

    pub fn order_by_asc(mut self, column: &str) -> Self {
        self.builder = self.builder.order_by_asc(column);
        self
    }

    pub fn order_by_desc(mut self, column: &str) -> Self {
        self.builder = self.builder.order_by_desc(column);
        self
    }

    pub fn limit(mut self, count: u64) -> Self {
        self.builder = self.builder.limit(count);
        self
    }

    pub fn offset(mut self, count: u64) -> Self {
        self.builder = self.builder.offset(count);
        self
    }

    /// Include soft-deleted rows
    pub fn with_trashed(mut self) -> Self {
        self.trashed = TrashedMode::Include;
        self
    }

    /// Only soft-deleted rows
    pub fn only_trashed(mut self) -> Self {
        self.trashed = TrashedMode::Only;
        self
    }

    /// Eager-load a relation after the main query
    pub fn with(mut self, name: &str) -> Self {
        self.eager.push(EagerLoad {
            name: name.to_string(),
            constraint: None,
        });
        self
    }

    /// Eager-load with a constraint applied to each relation query
    pub fn with_constrained<F>(mut self, name: &str, constraint: F) -> Self
    where
        F: Fn(QueryBuilder) -> QueryBuilder + Send + Sync + 'static,
    {
        self.eager.push(EagerLoad {
            name: name.to_string(),
            constraint: Some(Arc::new(constraint)),
        });
        self
    }

    /// Select a correlated COUNT subquery as `{name}_count`
    pub fn with_count(mut self, name: &str) -> ModelResult<Self> {
        let relation = relations::materialize(&self.definition, name, &self.registry)?;
        let compiled = relation.correlated_query()?.compile_count("*")?;
        if self.builder.columns.is_empty() && self.builder.raw_selects.is_empty() {
            let star = format!("{}.*", self.definition.table);
            self.builder = self.builder.select(&[star.as_str()]);
        }
        self.builder = self.builder.select_raw(
            &format!("({}) AS {}_count", compiled.sql, name),
            compiled.bindings,
        );
        Ok(self)
    }

    /// Filter to parents having at least one related row
    pub fn has(mut self, name: &str) -> ModelResult<Self> {
        let sub = self.correlated(name)?;
        self.builder = self.builder.where_exists(sub);
        Ok(self)
    }

    /// `has` with extra constraints on the related rows
    pub fn where_has<F>(mut self, name: &str, constraint: F) -> ModelResult<Self>
    where
        F: FnOnce(QueryBuilder) -> QueryBuilder,
    {
        let sub = constraint(self.correlated(name)?);
        self.builder = self.builder.where_exists(sub);
        Ok(self)
    }

    /// Filter to parents with no related rows
    pub fn where_doesnt_have(mut self, name: &str) -> ModelResult<Self> {
        let sub = self.correlated(name)?;
        self.builder = self.builder.where_not_exists(sub);
        Ok(self)
    }

    fn correlated(&self, name: &str) -> ModelResult<QueryBuilder> {
        let relation = relations::materialize(&self.definition, name, &self.registry)?;
        Ok(relation.correlated_query()?.select(&["1"]))
    }

    fn apply_scope(
        builder: QueryBuilder,
        definition: &ModelDefinition,
        trashed: TrashedMode,
    ) -> QueryBuilder {
        if !definition.soft_deletes {
            return builder;
        }
        match trashed {
            TrashedMode::Exclude => builder.where_null("deleted_at"),
            TrashedMode::Include => builder,
            TrashedMode::Only => builder.where_not_null("deleted_at"),
        }
    }

    async fn load_relations(
        definition: &Arc<ModelDefinition>,
        registry: &Arc<ModelRegistry>,
        eager: &[EagerLoad],
        models: &mut [Model],
        conn: &Connection,
    ) -> ModelResult<()> {
        for load in eager {
            let relation = relations::materialize(definition, &load.name, registry)?;
            for model in models.iter_mut() {
                let value = relation
                    .fetch(model, conn, load.constraint.as_deref())
                    .await?;
                model.set_relation(load.name.clone(), value);
            }
        }
        Ok(())
    }

    /// Execute, hydrate, and run the eager loads
    pub async fn get(self, conn: &Connection) -> ModelResult<Vec<Model>> {
        let Self {
            definition,
            registry,
            builder,
            eager,
            trashed,
        } = self;
        let builder = Self::apply_scope(builder, &definition, trashed);
        let rows = builder.get(conn).await?;
        let mut models: Vec<Model> = rows
            .into_iter()
            .map(|row| Model::hydrate(definition.clone(), row))
            .collect();

        Self::load_relations(&definition, &registry, &eager, &mut models, conn).await?;
        Ok(models)
    }

    pub async fn first(self, conn: &Connection) -> ModelResult<Option<Model>> {
        let mut models = self.limit(1).get(conn).await?;
        Ok(if models.is_empty() {
            None
        } else {
            Some(models.remove(0))
        })
    }

    pub async fn first_or_fail(self, conn: &Connection) -> ModelResult<Model> {
        let name = self.definition.name.clone();
        self.first(conn)
            .await?
            .ok_or_else(|| ModelError::NotFound(format!("no {} matched the query", name)))
    }

    /// Look up by primary key
    pub async fn find<T: Into<DatabaseValue>>(
        self,
        id: T,
        conn: &Connection,
    ) -> ModelResult<Option<Model>> {
        let key = self.definition.primary_key.clone();
        self.where_eq(&key, id).first(conn).await
    }

    pub async fn find_or_fail<T: Into<DatabaseValue>>(
        self,
        id: T,
        conn: &Connection,
    ) -> ModelResult<Model> {
        let id = id.into();
        let name = self.definition.name.clone();
        let key = self.definition.primary_key.clone();
        self.find(id.clone(), conn).await?.ok_or_else(|| {
            ModelError::NotFound(format!(
                "{} not found for {} = {}",
                name,
                key,
                id.to_json()
            ))
        })
    }

    pub async fn count(self, conn: &Connection) -> ModelResult<i64> {
        let builder = Self::apply_scope(self.builder, &self.definition, self.trashed);
        builder.count(conn).await
    }

    /// Offset pagination with hydrated models and eager loads
    pub async fn paginate(
        self,
        page: u64,
        per_page: u64,
        path: &str,
        conn: &Connection,
    ) -> ModelResult<Paginator<Model>> {
        let Self {
            definition,
            registry,
            builder,
            eager,
            trashed,
        } = self;
        let builder = Self::apply_scope(builder, &definition, trashed);
        let rows = builder.paginate(page, per_page, path, conn).await?;
        let mut paged = rows.map(|row| Model::hydrate(definition.clone(), row));

        Self::load_relations(&definition, &registry, &eager, &mut paged.data, conn).await?;
        Ok(paged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::{scripted::row, ScriptedPool};
    use crate::relations::RelationValue;

    fn registry() -> Arc<ModelRegistry> {
        let registry = Arc::new(ModelRegistry::new());
        registry.register(
            ModelDefinition::new("User", "users").has_many("posts", "Post", "user_id"),
        );
        registry.register(
            ModelDefinition::new("Post", "posts")
                .soft_deletes()
                .belongs_to("author", "User", "user_id"),
        );
        registry
    }

    #[tokio::test]
    async fn soft_delete_scope_applies_by_default() {
        let registry = registry();
        let pool = ScriptedPool::new();
        pool.push_rows(vec![]);
        let conn = Connection::new("default", Arc::new(pool.clone()));

        ModelQuery::for_model(&registry, "Post")
            .unwrap()
            .where_eq("user_id", 1i64)
            .get(&conn)
            .await
            .unwrap();
        assert_eq!(
            pool.sql(),
            vec!["SELECT * FROM posts WHERE user_id = ? AND deleted_at IS NULL".to_string()]
        );
    }

    #[tokio::test]
    async fn only_trashed_inverts_the_scope() {
        let registry = registry();
        let pool = ScriptedPool::new();
        pool.push_rows(vec![]);
        let conn = Connection::new("default", Arc::new(pool.clone()));

        ModelQuery::for_model(&registry, "Post")
            .unwrap()
            .only_trashed()
            .get(&conn)
            .await
            .unwrap();
        assert_eq!(
            pool.sql(),
            vec!["SELECT * FROM posts WHERE deleted_at IS NOT NULL".to_string()]
        );
    }

    #[tokio::test]
    async fn eager_loading_runs_one_query_per_parent() {
        let registry = registry();
        let pool = ScriptedPool::new();
        pool.push_rows(vec![
            row(&[("id", DatabaseValue::Int64(1))]),
            row(&[("id", DatabaseValue::Int64(2))]),
        ]);
        pool.push_rows(vec![row(&[("user_id", DatabaseValue::Int64(1))])]);
        pool.push_rows(vec![]);
        let conn = Connection::new("default", Arc::new(pool.clone()));

        let users = ModelQuery::for_model(&registry, "User")
            .unwrap()
            .with("posts")
            .get(&conn)
            .await
            .unwrap();

        assert_eq!(users.len(), 2);
        match users[0].relation("posts") {
            Some(RelationValue::Many(posts)) => assert_eq!(posts.len(), 1),
            other => panic!("expected loaded posts, got {:?}", other),
        }
        // One query for users, then one per user
        assert_eq!(
            pool.sql(),
            vec![
                "SELECT * FROM users".to_string(),
                "SELECT * FROM posts WHERE user_id = ? AND deleted_at IS NULL".to_string(),
                "SELECT * FROM posts WHERE user_id = ? AND deleted_at IS NULL".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn paginate_runs_eager_loads_over_the_page() {
        let registry = registry();
        let pool = ScriptedPool::new();
        pool.push_rows(vec![row(&[("count", DatabaseValue::Int64(2))])]);
        pool.push_rows(vec![
            row(&[("id", DatabaseValue::Int64(1))]),
            row(&[("id", DatabaseValue::Int64(2))]),
        ]);
        pool.push_rows(vec![row(&[("user_id", DatabaseValue::Int64(1))])]);
        pool.push_rows(vec![]);
        let conn = Connection::new("default", Arc::new(pool.clone()));

        let page = ModelQuery::for_model(&registry, "User")
            .unwrap()
            .with("posts")
            .paginate(1, 10, "/users", &conn)
            .await
            .unwrap();

        assert_eq!(page.total, 2);
        match page.data[0].relation("posts") {
            Some(RelationValue::Many(posts)) => assert_eq!(posts.len(), 1),
            other => panic!("expected loaded posts, got {:?}", other),
        }
        assert_eq!(
            pool.sql(),
            vec![
                "SELECT COUNT(*) FROM users".to_string(),
                "SELECT * FROM users LIMIT 10".to_string(),
                "SELECT * FROM posts WHERE user_id = ? AND deleted_at IS NULL".to_string(),
                "SELECT * FROM posts WHERE user_id = ? AND deleted_at IS NULL".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn with_count_selects_a_correlated_subquery() {
        let registry = registry();
        let pool = ScriptedPool::new();
        pool.push_rows(vec![row(&[
            ("id", DatabaseValue::Int64(1)),
            ("posts_count", DatabaseValue::Int64(3)),
        ])]);
        let conn = Connection::new("default", Arc::new(pool.clone()));

        let users = ModelQuery::for_model(&registry, "User")
            .unwrap()
            .with_count("posts")
            .unwrap()
            .get(&conn)
            .await
            .unwrap();

        assert_eq!(users[0].get("posts_count"), DatabaseValue::Int64(3));
        assert_eq!(
            pool.sql(),
            vec![
                "SELECT users.*, (SELECT COUNT(*) FROM posts WHERE posts.user_id = users.id \
                 AND deleted_at IS NULL) AS posts_count FROM users"
                    .to_string()
            ]
        );
    }

    #[tokio::test]
    async fn where_has_wraps_the_relation_in_exists() {
        let registry = registry();
        let pool = ScriptedPool::new();
        pool.push_rows(vec![]);
        let conn = Connection::new("default", Arc::new(pool.clone()));

        ModelQuery::for_model(&registry, "User")
            .unwrap()
            .where_has("posts", |q| q.where_eq("published", true))
            .unwrap()
            .get(&conn)
            .await
            .unwrap();

        assert_eq!(
            pool.sql(),
            vec![
                "SELECT * FROM users WHERE EXISTS (SELECT 1 FROM posts \
                 WHERE posts.user_id = users.id AND deleted_at IS NULL AND published = ?)"
                    .to_string()
            ]
        );
        assert_eq!(pool.statements()[0].1, vec![DatabaseValue::Bool(true)]);
    }

    #[tokio::test]
    async fn find_or_fail_names_model_and_key() {
        let registry = registry();
        let pool = ScriptedPool::new();
        pool.push_rows(vec![]);
        let conn = Connection::new("default", Arc::new(pool));

        let err = ModelQuery::for_model(&registry, "User")
            .unwrap()
            .find_or_fail(99i64, &conn)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ModelError::NotFound(msg) if msg.contains("User") && msg.contains("99")
        ));
    }
}
