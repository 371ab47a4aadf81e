//! Field sensitivity metadata supplied by an external schema

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Per-call map from field name to its declared sensitivity
pub type SensitivityMap = HashMap<String, FieldSensitivity>;

/// Flags a schema attaches to a field.
///
/// Only the first four decide redaction; the rest are carried so callers
/// can pass schema annotations through without losing information.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSensitivity {
    #[serde(default)]
    pub pii: bool,
    #[serde(default)]
    pub encrypted: bool,
    #[serde(default)]
    pub redactable: bool,
    #[serde(default)]
    pub sensitive: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub immutable: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub output_only: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub input_only: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub required: bool,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl FieldSensitivity {
    /// Declared as not sensitive. Present in a map, this still counts as
    /// schema metadata and suppresses heuristic detection for the field.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn pii() -> Self {
        Self {
            pii: true,
            ..Self::default()
        }
    }

    pub fn encrypted() -> Self {
        Self {
            encrypted: true,
            ..Self::default()
        }
    }

    pub fn redactable() -> Self {
        Self {
            redactable: true,
            ..Self::default()
        }
    }

    pub fn sensitive() -> Self {
        Self {
            sensitive: true,
            ..Self::default()
        }
    }

    pub fn should_redact(&self) -> bool {
        self.pii || self.encrypted || self.redactable || self.sensitive
    }

    /// Read flags from a loose JSON object. Missing or non-boolean flags
    /// are false; anything other than an object yields `None`.
    pub fn from_flags(flags: &Value) -> Option<Self> {
        let flags = flags.as_object()?;
        let flag = |name: &str| flags.get(name).and_then(Value::as_bool).unwrap_or(false);

        Some(Self {
            pii: flag("pii"),
            encrypted: flag("encrypted"),
            redactable: flag("redactable"),
            sensitive: flag("sensitive"),
            immutable: flag("immutable"),
            output_only: flag("output_only"),
            input_only: flag("input_only"),
            required: flag("required"),
        })
    }
}

/// Convert a schema's `{field: {flag: bool}}` object into a [`SensitivityMap`].
/// Entries whose flags are not an object are skipped.
pub fn from_schema_flags(schema_flags: &Value) -> SensitivityMap {
    schema_flags
        .as_object()
        .map(|fields| {
            fields
                .iter()
                .filter_map(|(name, flags)| {
                    FieldSensitivity::from_flags(flags).map(|s| (name.clone(), s))
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Names of every field the map marks for redaction, sorted
pub fn sensitive_fields(map: &SensitivityMap) -> Vec<String> {
    let mut fields: Vec<String> = map
        .iter()
        .filter(|(_, sensitivity)| sensitivity.should_redact())
        .map(|(name, _)| name.clone())
        .collect();
    fields.sort();
    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_any_flag_triggers_redaction() {
        assert!(FieldSensitivity::pii().should_redact());
        assert!(FieldSensitivity::encrypted().should_redact());
        assert!(FieldSensitivity::redactable().should_redact());
        assert!(FieldSensitivity::sensitive().should_redact());
        assert!(!FieldSensitivity::none().should_redact());

        let informational = FieldSensitivity {
            immutable: true,
            required: true,
            ..FieldSensitivity::default()
        };
        assert!(!informational.should_redact());
    }

    #[test]
    fn test_from_schema_flags() {
        let map = from_schema_flags(&json!({
            "email": {"pii": true, "required": true},
            "ssn": {"encrypted": true, "sensitive": "yes"},
            "id": {"immutable": true},
            "broken": "pii"
        }));

        assert_eq!(map.len(), 3);
        assert!(map["email"].pii && map["email"].required);
        assert!(map["ssn"].encrypted);
        assert!(!map["ssn"].sensitive);
        assert!(map["id"].immutable);
        assert!(!map.contains_key("broken"));
    }

    #[test]
    fn test_from_schema_flags_non_object() {
        assert!(from_schema_flags(&json!(null)).is_empty());
        assert!(from_schema_flags(&json!([1, 2])).is_empty());
    }

    #[test]
    fn test_sensitive_fields_sorted() {
        let mut map = SensitivityMap::new();
        map.insert("zip".to_string(), FieldSensitivity::redactable());
        map.insert("email".to_string(), FieldSensitivity::pii());
        map.insert("id".to_string(), FieldSensitivity::none());

        assert_eq!(sensitive_fields(&map), vec!["email", "zip"]);
    }

    #[test]
    fn test_deserialize_partial_flags() {
        let sensitivity: FieldSensitivity = serde_json::from_str(r#"{"pii": true}"#).unwrap();
        assert_eq!(sensitivity, FieldSensitivity::pii());
    }
}
