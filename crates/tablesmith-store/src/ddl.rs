//! DDL rendering shared by every store.
//!
//! Each store supplies a [`Dialect`]; statement layout is common.

use tablesmith_core::{DefaultValue, Field, ForeignKeyDef, Result, Schema, validate_schema};

/// Store-specific pieces of DDL syntax.
pub trait Dialect: Send + Sync {
    /// Physical type for a field when no `db_type` override is present.
    fn map_field_type(&self, field: &Field) -> String;

    /// Literal for boolean defaults.
    fn bool_literal(&self, value: bool) -> &'static str;

    /// Constraint text following the type of a single-column primary key.
    fn primary_key_clause(&self, _field: &Field) -> &'static str {
        "PRIMARY KEY"
    }

    fn quote_identifier(&self, name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    fn column_type(&self, field: &Field) -> String {
        match field.db_type.as_deref() {
            Some(db_type) if !db_type.is_empty() => {
                db_type.trim_start_matches("@db.").to_string()
            }
            _ => self.map_field_type(field),
        }
    }

    fn format_default(&self, value: &DefaultValue) -> String {
        match value {
            DefaultValue::Bool(value) => self.bool_literal(*value).to_string(),
            DefaultValue::Int(value) => value.to_string(),
            DefaultValue::Float(value) => value.to_string(),
            DefaultValue::Text(text) => {
                let lowered = text.to_ascii_lowercase();
                if lowered == "now()" || lowered == "current_timestamp" {
                    "CURRENT_TIMESTAMP".to_string()
                } else if value.is_expression() {
                    text.clone()
                } else {
                    format!("'{}'", text.replace('\'', "''"))
                }
            }
        }
    }
}

/// Render `CREATE TABLE IF NOT EXISTS` for a schema, with inline foreign keys.
pub fn render_create_table(
    dialect: &dyn Dialect,
    schema: &Schema,
    foreign_keys: &[ForeignKeyDef],
) -> Result<String> {
    validate_schema(schema)?;

    let composite = !schema.composite_key.is_empty();
    let mut items: Vec<String> = schema
        .fields
        .iter()
        .map(|field| render_column(dialect, field, composite))
        .collect();

    if composite {
        let columns = schema.column_names_for(&schema.composite_key);
        items.push(format!("PRIMARY KEY ({})", quote_list(dialect, &columns)));
    }

    for fk in foreign_keys {
        let mut clause = format!(
            "FOREIGN KEY ({}) REFERENCES {} ({})",
            quote_list(dialect, &fk.columns),
            dialect.quote_identifier(&fk.referenced_table),
            quote_list(dialect, &fk.referenced_columns),
        );
        if let Some(action) = fk.on_delete {
            clause.push_str(" ON DELETE ");
            clause.push_str(action.as_sql());
        }
        if let Some(action) = fk.on_update {
            clause.push_str(" ON UPDATE ");
            clause.push_str(action.as_sql());
        }
        items.push(clause);
    }

    Ok(format!(
        "CREATE TABLE IF NOT EXISTS {} (\n  {}\n)",
        dialect.quote_identifier(&schema.table_name),
        items.join(",\n  ")
    ))
}

/// Render `CREATE [UNIQUE] INDEX IF NOT EXISTS` over physical columns.
pub fn render_create_index(
    dialect: &dyn Dialect,
    table: &str,
    index_name: &str,
    columns: &[String],
    unique: bool,
) -> String {
    let kind = if unique { "UNIQUE " } else { "" };
    format!(
        "CREATE {kind}INDEX IF NOT EXISTS {} ON {} ({})",
        dialect.quote_identifier(index_name),
        dialect.quote_identifier(table),
        quote_list(dialect, columns)
    )
}

fn render_column(dialect: &dyn Dialect, field: &Field, composite: bool) -> String {
    let mut parts = vec![
        dialect.quote_identifier(field.column_name()),
        dialect.column_type(field),
    ];

    let inline_pk = field.primary_key && !composite;
    if inline_pk {
        parts.push(dialect.primary_key_clause(field).to_string());
    }
    if !field.nullable && !inline_pk {
        parts.push("NOT NULL".to_string());
    }
    if field.unique && !inline_pk {
        parts.push("UNIQUE".to_string());
    }
    if let Some(default) = field.default.as_ref().filter(|_| !field.auto_increment) {
        parts.push(format!("DEFAULT {}", dialect.format_default(default)));
    }

    parts.join(" ")
}

fn quote_list(dialect: &dyn Dialect, names: &[String]) -> String {
    names
        .iter()
        .map(|name| dialect.quote_identifier(name))
        .collect::<Vec<_>>()
        .join(", ")
}
