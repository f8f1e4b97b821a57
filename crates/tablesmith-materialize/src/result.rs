use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Outcome of one processing pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterializationResult {
    /// Tables created in this pass, in creation order.
    pub tables_created: Vec<String>,
    /// Models still waiting after this pass.
    pub pending_schemas: Vec<String>,
    /// Dependencies of every pending model that has any.
    pub dependency_info: BTreeMap<String, Vec<String>>,
    /// One message per failed model, plus cycle remediation hints.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
    pub has_circular_dependencies: bool,
}

impl MaterializationResult {
    /// Nothing left pending and nothing failed.
    pub fn is_settled(&self) -> bool {
        self.pending_schemas.is_empty() && self.errors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_wire_names() {
        let result = MaterializationResult {
            tables_created: vec!["users".to_string()],
            pending_schemas: vec!["Post".to_string()],
            dependency_info: BTreeMap::from([("Post".to_string(), vec!["Author".to_string()])]),
            errors: Vec::new(),
            has_circular_dependencies: false,
        };

        let json = serde_json::to_string_pretty(&result).expect("serialize result");
        let expected = r#"{
  "tables_created": [
    "users"
  ],
  "pending_schemas": [
    "Post"
  ],
  "dependency_info": {
    "Post": [
      "Author"
    ]
  },
  "has_circular_dependencies": false
}"#;
        assert_eq!(json, expected);
        assert!(!result.is_settled());
    }
}
