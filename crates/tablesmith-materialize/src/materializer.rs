use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use tablesmith_core::{
    Error, Schema, SchemaSet, dependencies, dependency_map, model_name_to_table_name,
    resolve_order,
};
use tablesmith_store::Store;

use crate::circular::handle_cycle;
use crate::errors::{ProcessError, SchemaDdlError};
use crate::pending::PendingSet;
use crate::result::MaterializationResult;

/// Run one processing pass: create every pending table whose dependencies
/// exist, in dependency order, and report what is still waiting.
///
/// Per-model DDL failures are recorded in the result and the pass moves on.
/// Only a failing store aborts the pass; tables created before that stay
/// created.
pub async fn process_pending_schemas<S>(
    pending: &PendingSet,
    store: &S,
) -> Result<MaterializationResult, ProcessError>
where
    S: Store + ?Sized,
{
    let snapshot = pending.list_pending();
    if snapshot.is_empty() {
        return Ok(MaterializationResult::default());
    }

    let start = Instant::now();
    info!(
        pending = snapshot.len(),
        engine = store.engine(),
        "processing pending schemas"
    );

    let existing = store
        .list_existing_tables()
        .await
        .map_err(ProcessError::ListTables)?;

    let mut pass = Pass {
        pending,
        store,
        known_tables: existing.into_iter().collect(),
        result: MaterializationResult {
            dependency_info: dependency_map(&snapshot),
            ..MaterializationResult::default()
        },
        snapshot,
    };

    match resolve_order(&pass.snapshot) {
        Ok(order) => {
            for name in order {
                pass.materialize(&name, true).await?;
            }
        }
        Err(signal) => handle_cycle(&mut pass, signal).await?,
    }

    let result = pass.result;
    info!(
        created = result.tables_created.len(),
        pending = result.pending_schemas.len(),
        errors = result.errors.len(),
        circular = result.has_circular_dependencies,
        duration_ms = start.elapsed().as_millis() as u64,
        "pass completed"
    );
    Ok(result)
}

/// State of a single pass over a snapshot of the pending set.
pub(crate) struct Pass<'a, S: ?Sized> {
    pub(crate) pending: &'a PendingSet,
    pub(crate) store: &'a S,
    pub(crate) snapshot: SchemaSet,
    known_tables: BTreeSet<String>,
    pub(crate) result: MaterializationResult,
}

enum Created {
    New,
    Raced,
}

impl<S> Pass<'_, S>
where
    S: Store + ?Sized,
{
    /// Physical table for a model: the pending definition first, then tables
    /// materialized by earlier passes, then the naming convention.
    fn table_of(&self, model: &str) -> Option<String> {
        if let Some(schema) = self.snapshot.get(model) {
            return (!schema.table_name.is_empty()).then(|| schema.table_name.clone());
        }
        Some(
            self.pending
                .table_for(model)
                .unwrap_or_else(|| model_name_to_table_name(model)),
        )
    }

    /// Definition of a referenced model: pending in this pass or materialized
    /// by an earlier one.
    fn definition_of(&self, model: &str) -> Option<Arc<Schema>> {
        self.snapshot
            .get(model)
            .cloned()
            .or_else(|| self.pending.materialized_schema(model))
    }

    fn missing_dependency(&self, schema: &Schema) -> Option<String> {
        dependencies(schema).into_iter().find(|dep| {
            self.table_of(dep)
                .is_none_or(|table| !self.known_tables.contains(&table))
        })
    }

    pub(crate) fn defer(&mut self, model: &str) {
        self.result.pending_schemas.push(model.to_string());
    }

    /// Bring one model to its table, or leave it pending.
    pub(crate) async fn materialize(
        &mut self,
        model: &str,
        check_dependencies: bool,
    ) -> Result<(), ProcessError> {
        let Some(schema) = self.snapshot.get(model).cloned() else {
            return Ok(());
        };

        if schema.table_name.is_empty() {
            debug!(model = %model, "model has no table name; leaving pending");
            self.defer(model);
            return Ok(());
        }

        if check_dependencies {
            if let Some(dependency) = self.missing_dependency(&schema) {
                debug!(
                    model = %model,
                    dependency = %dependency,
                    "deferring model until dependency table exists"
                );
                self.defer(model);
                return Ok(());
            }
        }

        let table = schema.table_name.clone();
        if self.known_tables.contains(&table) {
            debug!(model = %model, table = %table, "table already exists");
            self.pending.mark_materialized(schema);
            return Ok(());
        }

        match self.create_table(&schema).await {
            Ok(created) => {
                self.known_tables.insert(table.clone());
                self.pending.mark_materialized(Arc::clone(&schema));
                match created {
                    Created::New => {
                        info!(model = %model, table = %table, "table created");
                        self.result.tables_created.push(table);
                    }
                    Created::Raced => {
                        debug!(model = %model, table = %table, "table appeared concurrently");
                    }
                }
                Ok(())
            }
            Err(err) if err.source_error().is_infrastructure() => {
                warn!(model = %model, table = %table, error = %err, "store failed; aborting pass");
                Err(ProcessError::Store {
                    model: model.to_string(),
                    source: err.into_source(),
                })
            }
            Err(err) => {
                warn!(model = %model, table = %table, error = %err, "ddl failed");
                self.result.errors.push(err.to_string());
                self.defer(model);
                Ok(())
            }
        }
    }

    async fn create_table(&self, schema: &Schema) -> Result<Created, SchemaDdlError> {
        let table = &schema.table_name;
        let table_error = |source| SchemaDdlError::CreateTable {
            model: schema.name.clone(),
            table: table.clone(),
            source,
        };

        let foreign_keys = schema.foreign_key_defs(|model| self.definition_of(model));
        let sql = self
            .store
            .generate_create_table_sql(schema, &foreign_keys)
            .map_err(table_error)?;

        match self.store.apply_ddl(&sql).await {
            Ok(()) => {}
            Err(Error::AlreadyExists(_)) => return Ok(Created::Raced),
            Err(err) => return Err(table_error(err)),
        }

        for index in &schema.indexes {
            let columns = schema.column_names_for(&index.fields);
            let sql =
                self.store
                    .generate_create_index_sql(table, &index.name, &columns, index.unique);
            match self.store.apply_ddl(&sql).await {
                Ok(()) | Err(Error::AlreadyExists(_)) => {}
                Err(source) => {
                    return Err(SchemaDdlError::CreateIndex {
                        model: schema.name.clone(),
                        table: table.clone(),
                        index: index.name.clone(),
                        source,
                    });
                }
            }
        }

        Ok(Created::New)
    }
}
