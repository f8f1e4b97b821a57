use std::collections::BTreeSet;

use crate::error::{Error, Result};
use crate::schema::Schema;

/// Validate internal consistency of a schema definition.
///
/// This checks:
/// - model and table names are set and the model has fields
/// - field names are unique
/// - exactly one primary key form (single field or composite) is declared
/// - index and composite key fields exist
/// - relations name a target and their foreign key fields exist
pub fn validate_schema(schema: &Schema) -> Result<()> {
    if schema.name.trim().is_empty() {
        return Err(Error::InvalidSchema("schema name cannot be empty".to_string()));
    }
    if schema.table_name.trim().is_empty() {
        return Err(Error::InvalidSchema(format!(
            "table name cannot be empty: {}",
            schema.name
        )));
    }
    if schema.fields.is_empty() {
        return Err(Error::InvalidSchema(format!(
            "schema must have at least one field: {}",
            schema.name
        )));
    }

    let mut fields = BTreeSet::new();
    for field in &schema.fields {
        if !fields.insert(field.name.as_str()) {
            return Err(Error::InvalidSchema(format!(
                "duplicate field name: {}.{}",
                schema.name, field.name
            )));
        }
    }

    let single_keys = schema.fields.iter().filter(|field| field.primary_key).count();
    if single_keys > 1 {
        return Err(Error::InvalidSchema(format!(
            "schema can only have one single-field primary key: {}",
            schema.name
        )));
    }
    if single_keys == 1 && !schema.composite_key.is_empty() {
        return Err(Error::InvalidSchema(format!(
            "schema cannot have both single and composite primary keys: {}",
            schema.name
        )));
    }
    if single_keys == 0 && schema.composite_key.is_empty() {
        return Err(Error::InvalidSchema(format!(
            "schema must have a primary key: {}",
            schema.name
        )));
    }
    for key_field in &schema.composite_key {
        if !fields.contains(key_field.as_str()) {
            return Err(Error::InvalidSchema(format!(
                "composite key field not found: {}.{}",
                schema.name, key_field
            )));
        }
    }

    for index in &schema.indexes {
        if index.fields.is_empty() {
            return Err(Error::InvalidSchema(format!(
                "index has no fields: {}.{}",
                schema.name, index.name
            )));
        }
        for field in &index.fields {
            if !fields.contains(field.as_str()) {
                return Err(Error::InvalidSchema(format!(
                    "index field not found: {}.{}.{}",
                    schema.name, index.name, field
                )));
            }
        }
    }

    for (name, relation) in &schema.relations {
        if relation.model.trim().is_empty() {
            return Err(Error::InvalidSchema(format!(
                "relation has no target model: {}.{}",
                schema.name, name
            )));
        }
        if !relation.owns_foreign_key() {
            continue;
        }
        if let Some(fk_field) = relation.foreign_key_field() {
            if !fields.contains(fk_field) {
                return Err(Error::InvalidSchema(format!(
                    "foreign key field not found: {}.{}.{}",
                    schema.name, name, fk_field
                )));
            }
        }
    }

    Ok(())
}
