use std::collections::BTreeMap;
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use tablesmith_core::{Error, Field, FieldType, ForeignKeyDef, Index, Relation, Schema};
use tablesmith_materialize::{PendingSet, ProcessError, process_pending_schemas};
use tablesmith_store::{MemoryStore, Store};

#[derive(Debug, Clone, Copy)]
enum Failure {
    Rejected,
    Unavailable,
    /// Another writer creates the object just before this one does.
    Raced,
}

impl Failure {
    fn error(self, object: &str) -> Error {
        match self {
            Failure::Rejected => Error::ExecutionFailed("disk full".to_string()),
            Failure::Unavailable => Error::StoreUnavailable("connection reset".to_string()),
            Failure::Raced => Error::AlreadyExists(format!("relation \"{object}\" already exists")),
        }
    }
}

/// Memory store that fails chosen statements, keyed by the created object.
struct FaultyStore {
    inner: MemoryStore,
    failures: Mutex<BTreeMap<String, Failure>>,
    listing_fails: bool,
}

impl FaultyStore {
    fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            failures: Mutex::new(BTreeMap::new()),
            listing_fails: false,
        }
    }

    fn fail(self, object: &str, failure: Failure) -> Self {
        self.failures
            .lock()
            .expect("failures lock")
            .insert(object.to_string(), failure);
        self
    }

    fn heal(&self) {
        self.failures.lock().expect("failures lock").clear();
    }

    fn failure_for(&self, sql: &str) -> Option<(String, Failure)> {
        let failures = self.failures.lock().expect("failures lock");
        failures.iter().find_map(|(object, failure)| {
            let table = format!("CREATE TABLE IF NOT EXISTS \"{object}\"");
            let index = format!("INDEX IF NOT EXISTS \"{object}\"");
            (sql.starts_with(&table) || sql.contains(&index)).then(|| (object.clone(), *failure))
        })
    }
}

#[async_trait]
impl Store for FaultyStore {
    fn engine(&self) -> &'static str {
        "faulty"
    }

    async fn list_existing_tables(&self) -> tablesmith_core::Result<Vec<String>> {
        if self.listing_fails {
            return Err(Error::StoreUnavailable("catalog unreachable".to_string()));
        }
        self.inner.list_existing_tables().await
    }

    fn generate_create_table_sql(
        &self,
        schema: &Schema,
        foreign_keys: &[ForeignKeyDef],
    ) -> tablesmith_core::Result<String> {
        self.inner.generate_create_table_sql(schema, foreign_keys)
    }

    async fn apply_ddl(&self, sql: &str) -> tablesmith_core::Result<()> {
        match self.failure_for(sql) {
            Some((object, Failure::Raced)) => {
                self.inner.apply_ddl(sql).await?;
                Err(Failure::Raced.error(&object))
            }
            Some((object, failure)) => Err(failure.error(&object)),
            None => self.inner.apply_ddl(sql).await,
        }
    }

    fn generate_create_index_sql(
        &self,
        table: &str,
        index_name: &str,
        columns: &[String],
        unique: bool,
    ) -> String {
        self.inner
            .generate_create_index_sql(table, index_name, columns, unique)
    }

    fn supports_foreign_key_enforcement(&self) -> bool {
        self.inner.supports_foreign_key_enforcement()
    }
}

fn user() -> Schema {
    Schema::new("User").with_field(Field::id("id"))
}

fn tag() -> Schema {
    Schema::new("Tag")
        .with_field(Field::id("id"))
        .with_field(Field::new("label", FieldType::String))
}

fn post() -> Schema {
    Schema::new("Post")
        .with_field(Field::id("id"))
        .with_field(Field::new("authorId", FieldType::Int))
        .with_relation("author", Relation::many_to_one("User", "authorId"))
        .with_index(Index::new("idx_posts_author", &["authorId"], false))
}

fn names(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

#[tokio::test]
async fn failed_model_does_not_block_unrelated_models() -> Result<()> {
    let store = FaultyStore::new(MemoryStore::new()).fail("tags", Failure::Rejected);
    let pending = PendingSet::new();
    pending.add_schemas([post(), tag(), user()]);

    let result = process_pending_schemas(&pending, &store).await?;

    assert_eq!(result.tables_created, names(&["users", "posts"]));
    assert_eq!(result.pending_schemas, names(&["Tag"]));
    assert_eq!(
        result.errors,
        vec!["failed to create table tags for model Tag: ddl execution failed: disk full".to_string()]
    );
    assert_eq!(pending.pending_names(), names(&["Tag"]));

    store.heal();
    let retry = process_pending_schemas(&pending, &store).await?;
    assert_eq!(retry.tables_created, names(&["tags"]));
    assert!(retry.is_settled());
    Ok(())
}

#[tokio::test]
async fn dependents_of_a_failed_model_wait_silently() -> Result<()> {
    let store = FaultyStore::new(MemoryStore::new()).fail("users", Failure::Rejected);
    let pending = PendingSet::new();
    pending.add_schemas([post(), user()]);

    let result = process_pending_schemas(&pending, &store).await?;

    assert!(result.tables_created.is_empty());
    assert_eq!(result.pending_schemas, names(&["User", "Post"]));
    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].contains("for model User"));
    Ok(())
}

#[tokio::test]
async fn unavailable_store_aborts_pass_and_keeps_progress() -> Result<()> {
    let store = FaultyStore::new(MemoryStore::new()).fail("posts", Failure::Unavailable);
    let pending = PendingSet::new();
    pending.add_schemas([post(), tag(), user()]);

    let err = process_pending_schemas(&pending, &store)
        .await
        .expect_err("store outage aborts the pass");

    match err {
        ProcessError::Store { model, source } => {
            assert_eq!(model, "Post");
            assert!(matches!(source, Error::StoreUnavailable(_)));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(store.inner.tables(), names(&["tags", "users"]));
    assert_eq!(pending.pending_names(), names(&["Post"]));
    Ok(())
}

#[tokio::test]
async fn listing_failure_is_fatal() -> Result<()> {
    let mut store = FaultyStore::new(MemoryStore::new());
    store.listing_fails = true;
    let pending = PendingSet::new();
    pending.add_schema(user());

    let err = process_pending_schemas(&pending, &store)
        .await
        .expect_err("catalog outage");

    assert!(matches!(err, ProcessError::ListTables(Error::StoreUnavailable(_))));
    assert!(store.inner.statements().is_empty());
    assert!(pending.contains("User"));
    Ok(())
}

#[tokio::test]
async fn concurrent_create_counts_as_materialized() -> Result<()> {
    let store = FaultyStore::new(MemoryStore::new()).fail("users", Failure::Raced);
    let pending = PendingSet::new();
    pending.add_schemas([post(), user()]);

    let result = process_pending_schemas(&pending, &store).await?;

    assert_eq!(result.tables_created, names(&["posts"]));
    assert!(result.is_settled());
    assert!(pending.is_empty());
    Ok(())
}

#[tokio::test]
async fn index_failure_leaves_model_pending_until_table_is_seen() -> Result<()> {
    let store = FaultyStore::new(MemoryStore::new()).fail("idx_posts_author", Failure::Rejected);
    let pending = PendingSet::new();
    pending.add_schemas([post(), user()]);

    let result = process_pending_schemas(&pending, &store).await?;

    assert_eq!(result.tables_created, names(&["users"]));
    assert_eq!(result.pending_schemas, names(&["Post"]));
    assert_eq!(
        result.errors,
        vec![
            "failed to create index idx_posts_author on table posts for model Post: \
             ddl execution failed: disk full"
                .to_string()
        ]
    );

    store.heal();
    let retry = process_pending_schemas(&pending, &store).await?;
    assert!(retry.tables_created.is_empty());
    assert!(retry.is_settled());
    assert!(pending.is_empty());
    Ok(())
}
