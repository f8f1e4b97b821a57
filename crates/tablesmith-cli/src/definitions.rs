//! Loading schema definitions from a directory of JSON or TOML documents.
//!
//! Every document is checked against the definition JSON Schema before it is
//! deserialized, then against the structural rules in `validate_schema`.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use jsonschema::JSONSchema;
use schemars::schema_for;
use serde_json::Value;
use tablesmith_core::{Schema, dependencies, model_name_to_table_name, validate_schema};
use thiserror::Error;

/// Severity level for validation issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueSeverity {
    Error,
    Warning,
}

/// Structured validation issue with location and hint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    pub severity: IssueSeverity,
    pub code: String,
    pub path: String,
    pub message: String,
    pub hint: Option<String>,
}

impl ValidationIssue {
    pub fn error(code: &str, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: IssueSeverity::Error,
            code: code.to_string(),
            path: path.into(),
            message: message.into(),
            hint: None,
        }
    }

    pub fn warning(
        code: &str,
        path: impl Into<String>,
        message: impl Into<String>,
        hint: Option<String>,
    ) -> Self {
        Self {
            severity: IssueSeverity::Warning,
            code: code.to_string(),
            path: path.into(),
            message: message.into(),
            hint,
        }
    }
}

/// Aggregated validation report with errors and warnings.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationReport {
    /// Returns true when there are no errors.
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn push(&mut self, issue: ValidationIssue) {
        match issue.severity {
            IssueSeverity::Error => self.errors.push(issue),
            IssueSeverity::Warning => self.warnings.push(issue),
        }
    }
}

#[derive(Debug, Error)]
pub enum DefinitionError {
    #[error("io error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("definition schema error: {0}")]
    Schema(String),
    #[error("{} invalid definition(s)", .0.errors.len())]
    Invalid(ValidationReport),
}

/// Definitions that passed validation, with any warnings raised on the way.
#[derive(Debug)]
pub struct LoadedDefinitions {
    pub schemas: Vec<Schema>,
    pub warnings: Vec<ValidationIssue>,
}

/// JSON Schema that definition documents must satisfy.
pub fn definition_json_schema() -> Result<Value, DefinitionError> {
    serde_json::to_value(schema_for!(Schema)).map_err(|err| DefinitionError::Schema(err.to_string()))
}

/// Load every `*.json` and `*.toml` file directly inside `dir`, in file name order.
///
/// A JSON document holds one definition or an array of them; a TOML document
/// holds one definition. Empty table names get the conventional name.
pub fn load_definitions(dir: &Path) -> Result<LoadedDefinitions, DefinitionError> {
    let schema_json = definition_json_schema()?;
    let compiled =
        JSONSchema::compile(&schema_json).map_err(|err| DefinitionError::Schema(err.to_string()))?;

    let mut report = ValidationReport::default();
    let mut schemas: BTreeMap<String, Schema> = BTreeMap::new();

    for path in definition_files(dir)? {
        let origin = path.display().to_string();
        let documents = match read_documents(&path) {
            Ok(documents) => documents,
            Err(message) => {
                report.push(ValidationIssue::error("parse_error", origin, message));
                continue;
            }
        };

        for (position, document) in documents.into_iter().enumerate() {
            let location = format!("{origin}#{position}");
            if let Err(errors) = compiled.validate(&document) {
                for error in errors {
                    report.push(ValidationIssue::error(
                        "schema_violation",
                        format!("{location}{}", error.instance_path),
                        error.to_string(),
                    ));
                }
                continue;
            }

            let mut schema: Schema = match serde_json::from_value(document) {
                Ok(schema) => schema,
                Err(err) => {
                    report.push(ValidationIssue::error("parse_error", location, err.to_string()));
                    continue;
                }
            };
            if schema.table_name.is_empty() {
                schema.table_name = model_name_to_table_name(&schema.name);
            }
            if let Err(err) = validate_schema(&schema) {
                report.push(ValidationIssue::error("invalid_schema", location, err.to_string()));
                continue;
            }
            if schemas.contains_key(&schema.name) {
                report.push(ValidationIssue::error(
                    "duplicate_model",
                    location,
                    format!("model {} is defined more than once", schema.name),
                ));
                continue;
            }
            schemas.insert(schema.name.clone(), schema);
        }
    }

    check_references(&schemas, &mut report);

    if !report.is_ok() {
        return Err(DefinitionError::Invalid(report));
    }
    Ok(LoadedDefinitions {
        schemas: schemas.into_values().collect(),
        warnings: report.warnings,
    })
}

fn definition_files(dir: &Path) -> Result<Vec<PathBuf>, DefinitionError> {
    let io_error = |source| DefinitionError::Io {
        path: dir.to_path_buf(),
        source,
    };

    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(io_error)? {
        let path = entry.map_err(io_error)?.path();
        let supported = matches!(
            path.extension().and_then(|ext| ext.to_str()),
            Some("json" | "toml")
        );
        if supported && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn read_documents(path: &Path) -> Result<Vec<Value>, String> {
    let content = std::fs::read_to_string(path).map_err(|err| err.to_string())?;
    let is_toml = path.extension().and_then(|ext| ext.to_str()) == Some("toml");

    let value = if is_toml {
        let table: toml::Table = toml::from_str(&content).map_err(|err| err.to_string())?;
        serde_json::to_value(table).map_err(|err| err.to_string())?
    } else {
        serde_json::from_str(&content).map_err(|err| err.to_string())?
    };

    Ok(match value {
        Value::Array(items) => items,
        other => vec![other],
    })
}

/// Relations to models that no document defines keep their model pending.
fn check_references(schemas: &BTreeMap<String, Schema>, report: &mut ValidationReport) {
    let defined: BTreeSet<&str> = schemas.keys().map(String::as_str).collect();
    for schema in schemas.values() {
        for dependency in dependencies(schema) {
            if defined.contains(dependency.as_str()) {
                continue;
            }
            report.push(ValidationIssue::warning(
                "unknown_model",
                schema.name.clone(),
                format!("{} depends on {dependency}, which is not defined", schema.name),
                Some(format!(
                    "{} stays pending until table {} exists",
                    schema.name,
                    model_name_to_table_name(&dependency)
                )),
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, name: &str, content: &str) {
        std::fs::write(dir.join(name), content).expect("write definition");
    }

    #[test]
    fn loads_json_and_toml_definitions() {
        let dir = tempfile::tempdir().expect("tempdir");
        write(
            dir.path(),
            "01_user.json",
            r#"{
                "name": "User",
                "fields": [{ "name": "id", "type": "int", "primary_key": true, "auto_increment": true }]
            }"#,
        );
        write(
            dir.path(),
            "02_post.toml",
            r#"
            name = "Post"
            table_name = "articles"

            [[fields]]
            name = "id"
            type = "int"
            primary_key = true

            [[fields]]
            name = "authorId"
            type = "int"

            [relations.author]
            type = "manyToOne"
            model = "User"
            foreign_key = "authorId"
            "#,
        );
        write(dir.path(), "notes.txt", "ignored");

        let loaded = load_definitions(dir.path()).expect("load");
        let names: Vec<_> = loaded.schemas.iter().map(|s| s.table_name.as_str()).collect();
        assert_eq!(names, vec!["articles", "users"]);
        assert!(loaded.warnings.is_empty());
    }

    #[test]
    fn reports_schema_violations_with_location() {
        let dir = tempfile::tempdir().expect("tempdir");
        write(
            dir.path(),
            "bad.json",
            r#"[{ "name": "Bad", "fields": [{ "name": "id", "type": "uuid4" }] }]"#,
        );

        let err = load_definitions(dir.path()).expect_err("invalid type");
        let DefinitionError::Invalid(report) = err else {
            panic!("expected validation report");
        };
        assert_eq!(report.errors[0].code, "schema_violation");
        assert!(report.errors[0].path.contains("bad.json#0/fields/0/type"));
    }

    #[test]
    fn rejects_duplicates_and_structural_errors() {
        let dir = tempfile::tempdir().expect("tempdir");
        let user = r#"{ "name": "User", "fields": [{ "name": "id", "type": "int", "primary_key": true }] }"#;
        write(dir.path(), "a.json", user);
        write(dir.path(), "b.json", user);
        write(
            dir.path(),
            "c.json",
            r#"{ "name": "Keyless", "fields": [{ "name": "label", "type": "string" }] }"#,
        );

        let Err(DefinitionError::Invalid(report)) = load_definitions(dir.path()) else {
            panic!("expected validation report");
        };
        let codes: Vec<_> = report.errors.iter().map(|issue| issue.code.as_str()).collect();
        assert_eq!(codes, vec!["duplicate_model", "invalid_schema"]);
    }

    #[test]
    fn warns_about_undefined_dependencies() {
        let dir = tempfile::tempdir().expect("tempdir");
        write(
            dir.path(),
            "review.json",
            r#"{
                "name": "Review",
                "fields": [
                    { "name": "id", "type": "int", "primary_key": true },
                    { "name": "documentId", "type": "int" }
                ],
                "relations": {
                    "document": { "type": "manyToOne", "model": "Document", "foreign_key": "documentId" }
                }
            }"#,
        );

        let loaded = load_definitions(dir.path()).expect("load");
        assert_eq!(loaded.schemas.len(), 1);
        assert_eq!(loaded.warnings[0].code, "unknown_model");
        assert_eq!(
            loaded.warnings[0].hint.as_deref(),
            Some("Review stays pending until table documents exists")
        );
    }
}
