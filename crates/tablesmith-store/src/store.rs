use async_trait::async_trait;

use tablesmith_core::{ForeignKeyDef, Result, Schema};

/// Relational store that tables get materialized into.
///
/// Catalog reads and DDL execution are async round-trips; SQL generation is
/// pure. Capabilities are queried explicitly instead of inferring them from
/// the engine name.
#[async_trait]
pub trait Store: Send + Sync {
    /// Returns the engine identifier (e.g. `postgres`).
    fn engine(&self) -> &'static str;

    /// Names of the tables that currently exist.
    ///
    /// Fails with `Error::StoreUnavailable` when the catalog cannot be read.
    async fn list_existing_tables(&self) -> Result<Vec<String>>;

    /// `CREATE TABLE` for `schema`, including the given inline foreign keys.
    ///
    /// Fails with `Error::InvalidSchema` for definitions that cannot be rendered.
    fn generate_create_table_sql(
        &self,
        schema: &Schema,
        foreign_keys: &[ForeignKeyDef],
    ) -> Result<String>;

    /// Execute one DDL statement.
    async fn apply_ddl(&self, sql: &str) -> Result<()>;

    fn generate_create_index_sql(
        &self,
        table: &str,
        index_name: &str,
        columns: &[String],
        unique: bool,
    ) -> String;

    /// Whether the store rejects tables whose foreign keys point at missing tables.
    fn supports_foreign_key_enforcement(&self) -> bool;
}

/// Failures of the connection or pool rather than of a statement.
pub(crate) fn is_connection_failure(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed
    )
}
