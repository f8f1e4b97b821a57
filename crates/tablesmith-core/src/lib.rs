//! Core contracts and helpers for tablesmith.
//!
//! This crate defines the logical schema types, validation, and the
//! dependency graph used to order table creation. It performs no I/O.

pub mod constraints;
pub mod error;
pub mod graph;
pub mod naming;
pub mod redaction;
pub mod schema;
pub mod types;
pub mod validation;

pub use constraints::{FkAction, ForeignKeyDef, Index};
pub use error::{Error, Result};
pub use graph::{
    CycleSignal, DependencyGraphReport, DependencyGraphSummary, SchemaSet,
    build_dependency_report, dependencies, dependency_map, find_cycle, resolve_order,
};
pub use naming::{camel_to_snake_case, model_name_to_table_name, pluralize};
pub use redaction::{RedactedConnection, redact_connection_string};
pub use schema::{DEFAULT_REFERENCED_FIELD, Field, Relation, RelationType, Schema};
pub use types::{DefaultValue, FieldType};
pub use validation::validate_schema;

/// Current contract version for definition documents.
pub const DEFINITION_VERSION: &str = "0.1";
