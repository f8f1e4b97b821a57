//! Stores that schemas are materialized into.
//!
//! Every store implements [`Store`]; DDL layout is shared through
//! [`ddl::Dialect`].

pub mod ddl;
pub mod memory;
pub mod options;
pub mod postgres;
pub mod sqlite;
pub mod store;

pub use ddl::Dialect;
pub use memory::MemoryStore;
pub use options::{PostgresOptions, SqliteOptions};
pub use postgres::{PostgresDialect, PostgresStore};
pub use sqlite::{SqliteDialect, SqliteStore};
pub use store::Store;
