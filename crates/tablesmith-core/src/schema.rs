use std::collections::BTreeMap;
use std::sync::Arc;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::constraints::{FkAction, ForeignKeyDef, Index};
use crate::graph::SchemaSet;
use crate::naming::model_name_to_table_name;
use crate::types::{DefaultValue, FieldType};

/// Referenced column used when a relation does not name one.
pub const DEFAULT_REFERENCED_FIELD: &str = "id";

/// Logical definition of a model and the table that realizes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Schema {
    /// Unique, stable model name (e.g. `User`).
    pub name: String,
    /// Physical table name. Empty means the model is not backed by a table yet.
    #[serde(default)]
    pub table_name: String,
    /// Fields in declaration order.
    pub fields: Vec<Field>,
    /// Relations keyed by relation name.
    #[serde(default)]
    pub relations: BTreeMap<String, Relation>,
    /// Secondary indexes.
    #[serde(default)]
    pub indexes: Vec<Index>,
    /// Fields forming a composite primary key, in key order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub composite_key: Vec<String>,
}

/// A single typed field of a model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Field {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub nullable: bool,
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub primary_key: bool,
    #[serde(default)]
    pub auto_increment: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<DefaultValue>,
    /// Store-specific type override such as `@db.VarChar(64)`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_type: Option<String>,
    /// Physical column name when it differs from the field name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
}

/// Kind of relation between two models.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum RelationType {
    OneToOne,
    OneToMany,
    ManyToOne,
    ManyToMany,
}

/// Named reference from one model to another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Relation {
    #[serde(rename = "type")]
    pub relation_type: RelationType,
    /// Target model name.
    pub model: String,
    /// Field on this side holding the key, when this side owns the constraint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foreign_key: Option<String>,
    /// Field on the target side being referenced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub references: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_delete: Option<FkAction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_update: Option<FkAction>,
}

impl Schema {
    /// Create an empty schema with the conventional table name for `name`.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let table_name = model_name_to_table_name(&name);
        Self {
            name,
            table_name,
            fields: Vec::new(),
            relations: BTreeMap::new(),
            indexes: Vec::new(),
            composite_key: Vec::new(),
        }
    }

    pub fn with_table_name(mut self, table_name: impl Into<String>) -> Self {
        self.table_name = table_name.into();
        self
    }

    pub fn with_field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    pub fn with_relation(mut self, name: impl Into<String>, relation: Relation) -> Self {
        self.relations.insert(name.into(), relation);
        self
    }

    pub fn with_index(mut self, index: Index) -> Self {
        self.indexes.push(index);
        self
    }

    pub fn with_composite_key(mut self, fields: &[&str]) -> Self {
        self.composite_key = fields.iter().map(|field| field.to_string()).collect();
        self
    }

    /// Look up a field by its logical name.
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// The single-field primary key, if any.
    pub fn primary_key(&self) -> Option<&Field> {
        self.fields.iter().find(|field| field.primary_key)
    }

    /// Physical column for a logical field name, falling back to the name itself.
    pub fn column_name_for(&self, field_name: &str) -> String {
        self.field(field_name)
            .map(|field| field.column_name().to_string())
            .unwrap_or_else(|| field_name.to_string())
    }

    pub fn column_names_for(&self, field_names: &[String]) -> Vec<String> {
        field_names
            .iter()
            .map(|field_name| self.column_name_for(field_name))
            .collect()
    }

    /// Relations that put a foreign key on this model's table.
    pub fn owned_foreign_keys(&self) -> impl Iterator<Item = (&String, &Relation)> {
        self.relations
            .iter()
            .filter(|(_, relation)| relation.owns_foreign_key())
    }

    /// Inline foreign keys for this table.
    ///
    /// `target_for` returns the definition of a referenced model when one is
    /// known; its table and column mapping then decide the `REFERENCES`
    /// clause. Unknown targets fall back to the naming convention and the
    /// logical field name. Self references always resolve against this schema.
    pub fn foreign_key_defs<F>(&self, mut target_for: F) -> Vec<ForeignKeyDef>
    where
        F: FnMut(&str) -> Option<Arc<Schema>>,
    {
        self.owned_foreign_keys()
            .filter_map(|(_, relation)| {
                let fk_field = relation.foreign_key_field()?;
                let referenced = relation
                    .references
                    .as_deref()
                    .filter(|value| !value.is_empty())
                    .unwrap_or(DEFAULT_REFERENCED_FIELD);
                let (referenced_table, referenced_column) = if relation.model == self.name {
                    (self.table_name.clone(), self.column_name_for(referenced))
                } else {
                    match target_for(&relation.model) {
                        Some(target) if !target.table_name.is_empty() => {
                            (target.table_name.clone(), target.column_name_for(referenced))
                        }
                        Some(target) => (
                            model_name_to_table_name(&relation.model),
                            target.column_name_for(referenced),
                        ),
                        None => (
                            model_name_to_table_name(&relation.model),
                            referenced.to_string(),
                        ),
                    }
                };
                Some(ForeignKeyDef {
                    columns: vec![self.column_name_for(fk_field)],
                    referenced_table,
                    referenced_columns: vec![referenced_column],
                    on_delete: relation.on_delete,
                    on_update: relation.on_update,
                })
            })
            .collect()
    }

    /// Inline foreign keys resolved against a set of known definitions.
    pub fn foreign_key_defs_within(&self, schemas: &SchemaSet) -> Vec<ForeignKeyDef> {
        self.foreign_key_defs(|model| schemas.get(model).cloned())
    }
}

impl Field {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            nullable: false,
            unique: false,
            primary_key: false,
            auto_increment: false,
            default: None,
            db_type: None,
            column: None,
        }
    }

    /// Auto-incrementing primary key field.
    pub fn id(name: impl Into<String>) -> Self {
        let mut field = Self::new(name, FieldType::Int);
        field.primary_key = true;
        field.auto_increment = true;
        field
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub fn with_default(mut self, value: DefaultValue) -> Self {
        self.default = Some(value);
        self
    }

    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    pub fn with_db_type(mut self, db_type: impl Into<String>) -> Self {
        self.db_type = Some(db_type.into());
        self
    }

    pub fn column_name(&self) -> &str {
        match self.column.as_deref() {
            Some(column) if !column.is_empty() => column,
            _ => &self.name,
        }
    }
}

impl Relation {
    pub fn new(relation_type: RelationType, model: impl Into<String>) -> Self {
        Self {
            relation_type,
            model: model.into(),
            foreign_key: None,
            references: None,
            on_delete: None,
            on_update: None,
        }
    }

    /// `manyToOne` relation keyed by `foreign_key` on this side.
    pub fn many_to_one(model: impl Into<String>, foreign_key: impl Into<String>) -> Self {
        Self::new(RelationType::ManyToOne, model).with_foreign_key(foreign_key)
    }

    pub fn with_foreign_key(mut self, foreign_key: impl Into<String>) -> Self {
        self.foreign_key = Some(foreign_key.into());
        self
    }

    pub fn with_references(mut self, references: impl Into<String>) -> Self {
        self.references = Some(references.into());
        self
    }

    pub fn with_on_delete(mut self, action: FkAction) -> Self {
        self.on_delete = Some(action);
        self
    }

    /// Non-empty foreign key field name.
    pub fn foreign_key_field(&self) -> Option<&str> {
        self.foreign_key.as_deref().filter(|value| !value.is_empty())
    }

    /// True when this side of the relation carries the constraint, which makes
    /// the target a creation-order dependency.
    pub fn owns_foreign_key(&self) -> bool {
        match self.relation_type {
            RelationType::ManyToOne => true,
            RelationType::OneToOne => self.foreign_key_field().is_some(),
            RelationType::OneToMany | RelationType::ManyToMany => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post() -> Schema {
        Schema::new("Post")
            .with_field(Field::id("id"))
            .with_field(Field::new("authorId", FieldType::Int).with_column("author_id"))
            .with_relation("author", Relation::many_to_one("User", "authorId"))
            .with_relation(
                "comments",
                Relation::new(RelationType::OneToMany, "Comment").with_foreign_key("postId"),
            )
    }

    #[test]
    fn new_uses_conventional_table_name() {
        assert_eq!(Schema::new("BlogPost").table_name, "blog_posts");
    }

    #[test]
    fn maps_fields_to_columns_with_fallback() {
        let schema = post();
        assert_eq!(schema.column_name_for("authorId"), "author_id");
        assert_eq!(schema.column_name_for("id"), "id");
        assert_eq!(schema.column_name_for("missing"), "missing");
    }

    #[test]
    fn one_to_one_owns_key_only_with_foreign_key() {
        let owning = Relation::new(RelationType::OneToOne, "User").with_foreign_key("userId");
        let inverse = Relation::new(RelationType::OneToOne, "User");
        let blank = Relation::new(RelationType::OneToOne, "User").with_foreign_key("");
        assert!(owning.owns_foreign_key());
        assert!(!inverse.owns_foreign_key());
        assert!(!blank.owns_foreign_key());
    }

    #[test]
    fn builds_foreign_key_defs_from_owning_relations() {
        let schema = post();
        let fks = schema.foreign_key_defs(|_| None);
        assert_eq!(
            fks,
            vec![ForeignKeyDef {
                columns: vec!["author_id".to_string()],
                referenced_table: "users".to_string(),
                referenced_columns: vec!["id".to_string()],
                on_delete: None,
                on_update: None,
            }]
        );
    }

    #[test]
    fn self_reference_points_at_own_table() {
        let schema = Schema::new("Employee")
            .with_table_name("staff")
            .with_field(Field::id("id"))
            .with_field(Field::new("managerId", FieldType::Int).nullable())
            .with_relation("manager", Relation::many_to_one("Employee", "managerId"));
        let fks = schema.foreign_key_defs(|_| None);
        assert_eq!(fks[0].referenced_table, "staff");
    }

    #[test]
    fn referenced_column_follows_target_mapping() {
        let user = Schema::new("User")
            .with_table_name("accounts")
            .with_field(Field::id("id").with_column("user_id"))
            .with_field(Field::new("handle", FieldType::String).with_column("user_handle"));
        let mut known = SchemaSet::new();
        known.insert("User".to_string(), Arc::new(user));

        let fks = post().foreign_key_defs_within(&known);
        assert_eq!(fks[0].referenced_table, "accounts");
        assert_eq!(fks[0].referenced_columns, vec!["user_id"]);

        let by_handle = Schema::new("Post")
            .with_field(Field::id("id"))
            .with_field(Field::new("authorHandle", FieldType::String))
            .with_relation(
                "author",
                Relation::many_to_one("User", "authorHandle").with_references("handle"),
            );
        let fks = by_handle.foreign_key_defs_within(&known);
        assert_eq!(fks[0].referenced_columns, vec!["user_handle"]);
    }

    #[test]
    fn self_reference_maps_own_key_column() {
        let schema = Schema::new("Employee")
            .with_field(Field::id("id").with_column("employee_id"))
            .with_field(Field::new("managerId", FieldType::Int).nullable())
            .with_relation("manager", Relation::many_to_one("Employee", "managerId"));
        let fks = schema.foreign_key_defs(|_| None);
        assert_eq!(fks[0].referenced_columns, vec!["employee_id"]);
    }

    #[test]
    fn deserializes_definition_document() {
        let json = r#"{
            "name": "Post",
            "table_name": "posts",
            "fields": [
                {"name": "id", "type": "int", "primary_key": true, "auto_increment": true},
                {"name": "title", "type": "string", "default": "untitled"},
                {"name": "tags", "type": "string[]", "nullable": true}
            ],
            "relations": {
                "author": {"type": "manyToOne", "model": "User", "foreign_key": "authorId", "on_delete": "cascade"}
            }
        }"#;
        let schema: Schema = serde_json::from_str(json).expect("parse schema");
        assert_eq!(schema.fields.len(), 3);
        assert_eq!(schema.fields[2].field_type, FieldType::StringArray);
        assert_eq!(
            schema.fields[1].default,
            Some(DefaultValue::Text("untitled".to_string()))
        );
        let author = &schema.relations["author"];
        assert_eq!(author.relation_type, RelationType::ManyToOne);
        assert_eq!(author.on_delete, Some(FkAction::Cascade));
    }
}
