use thiserror::Error;

/// Core error type shared across tablesmith crates.
#[derive(Debug, Error)]
pub enum Error {
    /// The store cannot be reached or could not answer a catalog query.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
    /// The schema definition violates internal invariants.
    #[error("invalid schema: {0}")]
    InvalidSchema(String),
    /// A DDL statement was rejected by the store.
    #[error("ddl execution failed: {0}")]
    ExecutionFailed(String),
    /// The object a DDL statement tried to create is already there.
    #[error("already exists: {0}")]
    AlreadyExists(String),
    /// A requested feature is not yet supported.
    #[error("unsupported: {0}")]
    Unsupported(String),
}

impl Error {
    /// Returns true for failures of the store itself rather than of one statement.
    pub fn is_infrastructure(&self) -> bool {
        matches!(self, Error::StoreUnavailable(_))
    }
}

/// Convenience alias for results returned by tablesmith crates.
pub type Result<T> = std::result::Result<T, Error>;
