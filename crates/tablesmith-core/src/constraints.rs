use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Foreign key action semantics.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FkAction {
    NoAction,
    Restrict,
    Cascade,
    SetNull,
    SetDefault,
}

impl FkAction {
    /// SQL keyword form used in `ON DELETE` / `ON UPDATE` clauses.
    pub fn as_sql(&self) -> &'static str {
        match self {
            FkAction::NoAction => "NO ACTION",
            FkAction::Restrict => "RESTRICT",
            FkAction::Cascade => "CASCADE",
            FkAction::SetNull => "SET NULL",
            FkAction::SetDefault => "SET DEFAULT",
        }
    }
}

/// Foreign key to be rendered inline in a `CREATE TABLE` statement.
///
/// Column names are physical; the referenced table is already resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeyDef {
    pub columns: Vec<String>,
    pub referenced_table: String,
    pub referenced_columns: Vec<String>,
    pub on_delete: Option<FkAction>,
    pub on_update: Option<FkAction>,
}

/// Index definition expressed in logical field names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Index {
    pub name: String,
    pub fields: Vec<String>,
    #[serde(default)]
    pub unique: bool,
}

impl Index {
    pub fn new(name: impl Into<String>, fields: &[&str], unique: bool) -> Self {
        Self {
            name: name.into(),
            fields: fields.iter().map(|field| field.to_string()).collect(),
            unique,
        }
    }
}
