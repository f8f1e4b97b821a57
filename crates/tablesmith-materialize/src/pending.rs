use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::debug;

use tablesmith_core::{Schema, SchemaSet};
use tablesmith_store::Store;

use crate::errors::ProcessError;
use crate::materializer::process_pending_schemas;
use crate::result::MaterializationResult;

/// Schemas registered but not yet confirmed to exist as tables.
///
/// One instance is owned per server and shared by reference. Writers take the
/// write lock; readers get a copy of the map and never see a half-applied
/// update. The lock is never held across a store round-trip.
#[derive(Debug, Default)]
pub struct PendingSet {
    state: RwLock<PendingState>,
}

#[derive(Debug, Default)]
struct PendingState {
    pending: SchemaSet,
    /// Definitions whose tables were created or found, by model name.
    materialized: BTreeMap<String, Arc<Schema>>,
}

impl PendingSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the pending definition for `schema.name`.
    pub fn add_schema(&self, schema: Schema) {
        let name = schema.name.clone();
        self.write().pending.insert(name.clone(), Arc::new(schema));
        debug!(model = %name, "added schema to pending set");
    }

    pub fn add_schemas<I>(&self, schemas: I)
    where
        I: IntoIterator<Item = Schema>,
    {
        for schema in schemas {
            self.add_schema(schema);
        }
    }

    /// Withdraw a model. Returns whether it was pending.
    ///
    /// This is also how callers evict models whose dependencies will never
    /// be registered.
    pub fn remove_schema(&self, name: &str) -> bool {
        let removed = self.write().pending.remove(name).is_some();
        if removed {
            debug!(model = %name, "removed schema from pending set");
        }
        removed
    }

    /// Snapshot of the pending definitions.
    pub fn list_pending(&self) -> SchemaSet {
        self.read().pending.clone()
    }

    pub fn pending_names(&self) -> Vec<String> {
        self.read().pending.keys().cloned().collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.read().pending.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.read().pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().pending.is_empty()
    }

    /// Record that `schema`'s table exists and drop it from the pending set.
    pub fn mark_materialized(&self, schema: Arc<Schema>) {
        let mut state = self.write();
        state.pending.remove(&schema.name);
        state.materialized.insert(schema.name.clone(), schema);
    }

    /// Definition of a model materialized by an earlier pass.
    pub fn materialized_schema(&self, model: &str) -> Option<Arc<Schema>> {
        self.read().materialized.get(model).cloned()
    }

    /// Table of a model materialized by an earlier pass.
    pub fn table_for(&self, model: &str) -> Option<String> {
        self.read()
            .materialized
            .get(model)
            .map(|schema| schema.table_name.clone())
    }

    /// Run one processing pass against `store`.
    pub async fn process<S>(&self, store: &S) -> Result<MaterializationResult, ProcessError>
    where
        S: Store + ?Sized,
    {
        process_pending_schemas(self, store).await
    }

    fn read(&self) -> RwLockReadGuard<'_, PendingState> {
        self.state
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, PendingState> {
        self.state
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    use tablesmith_core::Field;

    fn schema(name: &str) -> Schema {
        Schema::new(name).with_field(Field::id("id"))
    }

    #[test]
    fn add_is_an_upsert() {
        let pending = PendingSet::new();
        pending.add_schema(schema("User"));
        pending.add_schema(schema("User").with_table_name("people"));

        assert_eq!(pending.len(), 1);
        assert_eq!(pending.list_pending()["User"].table_name, "people");
    }

    #[test]
    fn remove_is_idempotent() {
        let pending = PendingSet::new();
        pending.add_schema(schema("User"));
        assert!(pending.remove_schema("User"));
        assert!(!pending.remove_schema("User"));
        assert!(pending.is_empty());
    }

    #[test]
    fn snapshot_is_detached_from_later_writes() {
        let pending = PendingSet::new();
        pending.add_schema(schema("User"));
        let snapshot = pending.list_pending();
        pending.add_schema(schema("Post"));
        pending.remove_schema("User");

        assert_eq!(snapshot.keys().collect::<Vec<_>>(), vec!["User"]);
        assert_eq!(pending.pending_names(), vec!["Post"]);
    }

    #[test]
    fn mark_materialized_remembers_table() {
        let pending = PendingSet::new();
        let user = Arc::new(schema("User").with_table_name("people"));
        pending.add_schema((*user).clone());
        pending.mark_materialized(Arc::clone(&user));

        assert!(!pending.contains("User"));
        assert_eq!(pending.table_for("User").as_deref(), Some("people"));
        assert_eq!(pending.materialized_schema("User"), Some(user));
        assert_eq!(pending.table_for("Post"), None);
    }

    #[test]
    fn concurrent_writers_and_readers() {
        let pending = Arc::new(PendingSet::new());
        let writers: Vec<_> = (0..8)
            .map(|worker| {
                let pending = Arc::clone(&pending);
                thread::spawn(move || {
                    for item in 0..50 {
                        pending.add_schema(schema(&format!("Model{worker}x{item}")));
                        let snapshot = pending.list_pending();
                        assert!(snapshot.values().all(|schema| !schema.fields.is_empty()));
                    }
                })
            })
            .collect();

        for writer in writers {
            writer.join().expect("writer thread");
        }
        assert_eq!(pending.len(), 400);
    }
}
