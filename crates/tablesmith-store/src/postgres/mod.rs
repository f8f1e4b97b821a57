use sqlx::postgres::PgPoolOptions;
use sqlx::{Executor, PgPool};
use tracing::debug;

use tablesmith_core::{Error, Field, FieldType, ForeignKeyDef, Result, Schema};

use crate::ddl::{Dialect, render_create_index, render_create_table};
use crate::options::PostgresOptions;
use crate::store::Store;

mod mapper;
mod queries;

/// PostgreSQL type mapping and literals.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDialect;

impl Dialect for PostgresDialect {
    fn map_field_type(&self, field: &Field) -> String {
        let mapped = match field.field_type {
            FieldType::String => "VARCHAR(255)",
            FieldType::Int if field.auto_increment => "SERIAL",
            FieldType::Int => "INTEGER",
            FieldType::Int64 if field.auto_increment => "BIGSERIAL",
            FieldType::Int64 => "BIGINT",
            FieldType::Float => "DOUBLE PRECISION",
            FieldType::Bool => "BOOLEAN",
            FieldType::DateTime => "TIMESTAMP",
            FieldType::Json => "JSONB",
            FieldType::Decimal => "DECIMAL(10,2)",
            _ if field.field_type.is_array() => "JSONB",
            _ => "VARCHAR(255)",
        };
        mapped.to_string()
    }

    fn bool_literal(&self, value: bool) -> &'static str {
        if value { "TRUE" } else { "FALSE" }
    }
}

/// Store backed by a PostgreSQL pool.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
    options: PostgresOptions,
}

impl PostgresStore {
    /// Create a new store using a pre-configured pool.
    pub fn new(pool: PgPool, options: PostgresOptions) -> Self {
        Self { pool, options }
    }

    /// Connect a pool for `url` with the given options.
    ///
    /// Every pooled connection resolves unqualified names in `options.schema`,
    /// so created tables land where `list_existing_tables` looks for them.
    pub async fn connect(url: &str, options: PostgresOptions) -> Result<Self> {
        let search_path = search_path_sql(&options.schema);
        let pool = PgPoolOptions::new()
            .max_connections(options.max_connections)
            .acquire_timeout(options.acquire_timeout)
            .after_connect(move |conn, _meta| {
                let sql = search_path.clone();
                Box::pin(async move {
                    conn.execute(sql.as_str()).await?;
                    Ok(())
                })
            })
            .connect(url)
            .await
            .map_err(|err| Error::StoreUnavailable(err.to_string()))?;
        debug!(schema = %options.schema, "connected to postgres");
        Ok(Self::new(pool, options))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn search_path_sql(schema: &str) -> String {
    format!("SET search_path TO {}", PostgresDialect.quote_identifier(schema))
}

#[async_trait::async_trait]
impl Store for PostgresStore {
    fn engine(&self) -> &'static str {
        "postgres"
    }

    async fn list_existing_tables(&self) -> Result<Vec<String>> {
        queries::list_tables(&self.pool, &self.options.schema).await
    }

    fn generate_create_table_sql(
        &self,
        schema: &Schema,
        foreign_keys: &[ForeignKeyDef],
    ) -> Result<String> {
        render_create_table(&PostgresDialect, schema, foreign_keys)
    }

    async fn apply_ddl(&self, sql: &str) -> Result<()> {
        queries::execute(&self.pool, sql).await
    }

    fn generate_create_index_sql(
        &self,
        table: &str,
        index_name: &str,
        columns: &[String],
        unique: bool,
    ) -> String {
        render_create_index(&PostgresDialect, table, index_name, columns, unique)
    }

    fn supports_foreign_key_enforcement(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_path_targets_configured_schema() {
        assert_eq!(search_path_sql("app"), "SET search_path TO \"app\"");
        assert_eq!(
            search_path_sql(&PostgresOptions::default().schema),
            "SET search_path TO \"public\""
        );
    }

    #[test]
    fn search_path_quotes_schema_names() {
        assert_eq!(
            search_path_sql("tenant\"a"),
            "SET search_path TO \"tenant\"\"a\""
        );
    }
}
