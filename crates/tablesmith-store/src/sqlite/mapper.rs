use tablesmith_core::Error;

use crate::store::is_connection_failure;

pub fn map_catalog_error(err: sqlx::Error) -> Error {
    Error::StoreUnavailable(err.to_string())
}

/// SQLite reports duplicates only through the message text.
pub fn map_ddl_error(err: sqlx::Error) -> Error {
    if is_connection_failure(&err) {
        return Error::StoreUnavailable(err.to_string());
    }

    match &err {
        sqlx::Error::Database(db) if db.message().contains("already exists") => {
            Error::AlreadyExists(db.message().to_string())
        }
        sqlx::Error::Database(db) => Error::ExecutionFailed(db.message().to_string()),
        _ => Error::ExecutionFailed(err.to_string()),
    }
}
