use thiserror::Error;

use tablesmith_core::Error;

/// Failures that abort a whole processing pass.
///
/// Tables created before the failure stay created and leave the pending set.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("failed to list existing tables: {0}")]
    ListTables(#[source] Error),
    #[error("store failed while materializing model {model}: {source}")]
    Store {
        model: String,
        #[source]
        source: Error,
    },
}

/// DDL failure isolated to one model; recorded in the pass result.
#[derive(Debug, Error)]
pub enum SchemaDdlError {
    #[error("failed to create table {table} for model {model}: {source}")]
    CreateTable {
        model: String,
        table: String,
        #[source]
        source: Error,
    },
    #[error("failed to create index {index} on table {table} for model {model}: {source}")]
    CreateIndex {
        model: String,
        table: String,
        index: String,
        #[source]
        source: Error,
    },
}

impl SchemaDdlError {
    pub fn source_error(&self) -> &Error {
        match self {
            SchemaDdlError::CreateTable { source, .. } => source,
            SchemaDdlError::CreateIndex { source, .. } => source,
        }
    }

    pub fn into_source(self) -> Error {
        match self {
            SchemaDdlError::CreateTable { source, .. } => source,
            SchemaDdlError::CreateIndex { source, .. } => source,
        }
    }
}
