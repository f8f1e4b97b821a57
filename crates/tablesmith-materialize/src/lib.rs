//! Incremental table materialization for tablesmith.
//!
//! Callers register schemas in a [`PendingSet`] and run passes with
//! [`process_pending_schemas`]. Each pass creates the tables whose
//! dependencies exist, in dependency order, and leaves the rest pending.

mod circular;
pub mod errors;
mod materializer;
pub mod pending;
pub mod result;

pub use errors::{ProcessError, SchemaDdlError};
pub use materializer::process_pending_schemas;
pub use pending::PendingSet;
pub use result::MaterializationResult;
