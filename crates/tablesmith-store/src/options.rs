use std::time::Duration;

/// Options for PostgreSQL stores.
#[derive(Debug, Clone)]
pub struct PostgresOptions {
    /// Namespace whose tables count as existing.
    pub schema: String,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

impl Default for PostgresOptions {
    fn default() -> Self {
        Self {
            schema: "public".to_string(),
            max_connections: 5,
            acquire_timeout: Duration::from_secs(10),
        }
    }
}

/// Options for SQLite stores.
#[derive(Debug, Clone)]
pub struct SqliteOptions {
    /// Turns on `PRAGMA foreign_keys`; also decides whether the store reports
    /// foreign key enforcement.
    pub foreign_keys: bool,
    pub max_connections: u32,
}

impl Default for SqliteOptions {
    fn default() -> Self {
        Self {
            foreign_keys: true,
            max_connections: 5,
        }
    }
}
