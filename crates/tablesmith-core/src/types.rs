use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Logical field type, independent of any store dialect.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, JsonSchema)]
pub enum FieldType {
    #[serde(rename = "string")]
    String,
    #[serde(rename = "int")]
    Int,
    #[serde(rename = "int64")]
    Int64,
    #[serde(rename = "float")]
    Float,
    #[serde(rename = "bool")]
    Bool,
    #[serde(rename = "datetime")]
    DateTime,
    #[serde(rename = "json")]
    Json,
    #[serde(rename = "decimal")]
    Decimal,
    #[serde(rename = "string[]")]
    StringArray,
    #[serde(rename = "int[]")]
    IntArray,
    #[serde(rename = "int64[]")]
    Int64Array,
    #[serde(rename = "float[]")]
    FloatArray,
    #[serde(rename = "bool[]")]
    BoolArray,
    #[serde(rename = "decimal[]")]
    DecimalArray,
    #[serde(rename = "datetime[]")]
    DateTimeArray,
}

impl FieldType {
    pub fn is_array(&self) -> bool {
        matches!(
            self,
            FieldType::StringArray
                | FieldType::IntArray
                | FieldType::Int64Array
                | FieldType::FloatArray
                | FieldType::BoolArray
                | FieldType::DecimalArray
                | FieldType::DateTimeArray
        )
    }
}

/// Column default as declared in a definition document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(untagged)]
pub enum DefaultValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl DefaultValue {
    /// Text defaults that name a store function rather than a literal.
    pub fn is_expression(&self) -> bool {
        match self {
            DefaultValue::Text(text) => {
                let lowered = text.to_ascii_lowercase();
                lowered == "now()"
                    || lowered == "current_timestamp"
                    || (text.contains('(') && text.ends_with(')'))
            }
            _ => false,
        }
    }
}
