use tablesmith_core::Result;
use tablesmith_store::{
    MemoryStore, PostgresDialect, PostgresStore, SqliteDialect, SqliteStore, Store,
};

use crate::config::Settings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Engine {
    Postgres,
    Sqlite,
}

impl Engine {
    pub fn detect(conn: &str) -> Option<Self> {
        if conn.starts_with("postgres://") || conn.starts_with("postgresql://") {
            Some(Engine::Postgres)
        } else if conn.starts_with("sqlite:") {
            Some(Engine::Sqlite)
        } else {
            None
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Engine::Postgres => "postgres",
            Engine::Sqlite => "sqlite",
        }
    }
}

pub async fn connect(engine: Engine, conn: &str, settings: &Settings) -> Result<Box<dyn Store>> {
    let store: Box<dyn Store> = match engine {
        Engine::Postgres => Box::new(PostgresStore::connect(conn, settings.postgres.options()).await?),
        Engine::Sqlite => Box::new(SqliteStore::connect(conn, settings.sqlite.options()).await?),
    };
    Ok(store)
}

/// Dry-run store mirroring a live catalog and its enforcement behavior.
pub fn preview_store(engine: Engine, tables: Vec<String>, enforce_foreign_keys: bool) -> MemoryStore {
    let store = MemoryStore::new()
        .with_tables(tables)
        .with_foreign_key_enforcement(enforce_foreign_keys);
    match engine {
        Engine::Postgres => store.with_dialect(PostgresDialect),
        Engine::Sqlite => store.with_dialect(SqliteDialect),
    }
}
