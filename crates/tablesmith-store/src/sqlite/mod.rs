use std::str::FromStr;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tracing::debug;

use tablesmith_core::{Error, Field, FieldType, ForeignKeyDef, Result, Schema};

use crate::ddl::{Dialect, render_create_index, render_create_table};
use crate::options::SqliteOptions;
use crate::store::Store;

mod mapper;
mod queries;

/// SQLite type mapping and literals.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDialect;

impl Dialect for SqliteDialect {
    fn map_field_type(&self, field: &Field) -> String {
        let mapped = match field.field_type {
            FieldType::String => "TEXT",
            FieldType::Int | FieldType::Int64 | FieldType::Bool => "INTEGER",
            FieldType::Float => "REAL",
            FieldType::DateTime => "DATETIME",
            FieldType::Decimal => "DECIMAL",
            // json and every array type are stored as JSON text
            _ => "TEXT",
        };
        mapped.to_string()
    }

    fn bool_literal(&self, value: bool) -> &'static str {
        if value { "1" } else { "0" }
    }

    fn primary_key_clause(&self, field: &Field) -> &'static str {
        if field.auto_increment {
            "PRIMARY KEY AUTOINCREMENT"
        } else {
            "PRIMARY KEY"
        }
    }

    fn column_type(&self, field: &Field) -> String {
        // AUTOINCREMENT is only accepted on an INTEGER PRIMARY KEY.
        if field.primary_key && field.auto_increment {
            return "INTEGER".to_string();
        }
        match field.db_type.as_deref() {
            Some(db_type) if !db_type.is_empty() => {
                db_type.trim_start_matches("@db.").to_string()
            }
            _ => self.map_field_type(field),
        }
    }
}

/// Store backed by an SQLite pool.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
    options: SqliteOptions,
}

impl SqliteStore {
    /// Create a new store using a pre-configured pool.
    ///
    /// `options.foreign_keys` should match how the pool's connections were opened.
    pub fn new(pool: SqlitePool, options: SqliteOptions) -> Self {
        Self { pool, options }
    }

    /// Open `url`, creating the database file when missing.
    ///
    /// In-memory databases live on a single connection that is never recycled.
    pub async fn connect(url: &str, options: SqliteOptions) -> Result<Self> {
        let connect_options = SqliteConnectOptions::from_str(url)
            .map_err(|err| Error::StoreUnavailable(err.to_string()))?
            .create_if_missing(true)
            .foreign_keys(options.foreign_keys);

        let in_memory = url.contains(":memory:") || url.contains("mode=memory");
        let mut pool_options = SqlitePoolOptions::new();
        pool_options = if in_memory {
            pool_options
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            pool_options.max_connections(options.max_connections)
        };

        let pool = pool_options
            .connect_with(connect_options)
            .await
            .map_err(|err| Error::StoreUnavailable(err.to_string()))?;
        debug!(in_memory, foreign_keys = options.foreign_keys, "connected to sqlite");
        Ok(Self::new(pool, options))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait::async_trait]
impl Store for SqliteStore {
    fn engine(&self) -> &'static str {
        "sqlite"
    }

    async fn list_existing_tables(&self) -> Result<Vec<String>> {
        queries::list_tables(&self.pool).await
    }

    fn generate_create_table_sql(
        &self,
        schema: &Schema,
        foreign_keys: &[ForeignKeyDef],
    ) -> Result<String> {
        render_create_table(&SqliteDialect, schema, foreign_keys)
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
        render_create_index(&SqliteDialect, table, index_name, columns, unique)
    }

    fn supports_foreign_key_enforcement(&self) -> bool {
        self.options.foreign_keys
    }
}
