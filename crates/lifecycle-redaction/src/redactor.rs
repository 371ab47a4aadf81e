//! Full redaction of nested payloads

use crate::{detector::PiiDetector, sensitivity::SensitivityMap};
use serde_json::{Map, Value};

/// Marker that replaces redacted values unless overridden
pub const DEFAULT_MARKER: &str = "[REDACTED]";

/// Replaces sensitive fields and values with a fixed marker.
///
/// Per field, schema metadata wins: if the field has an entry, it is
/// redacted exactly when that entry says so and the heuristics are not
/// consulted. Without an entry, the field is redacted when its name or its
/// value looks like PII. Redaction never fails and is idempotent.
#[derive(Debug, Clone)]
pub struct Redactor {
    detector: PiiDetector,
    marker: String,
}

impl Default for Redactor {
    fn default() -> Self {
        Self::new()
    }
}

impl Redactor {
    pub fn new() -> Self {
        Self {
            detector: PiiDetector::new(),
            marker: DEFAULT_MARKER.to_string(),
        }
    }

    pub fn with_marker(mut self, marker: impl Into<String>) -> Self {
        self.marker = marker.into();
        self
    }

    pub fn with_detector(mut self, detector: PiiDetector) -> Self {
        self.detector = detector;
        self
    }

    pub fn marker(&self) -> &str {
        &self.marker
    }

    pub fn detector(&self) -> &PiiDetector {
        &self.detector
    }

    /// Redacted copy of `data`
    pub fn redact_map(
        &self,
        data: &Map<String, Value>,
        sensitivity: Option<&SensitivityMap>,
    ) -> Map<String, Value> {
        let mut redacted = data.clone();
        self.redact_map_in_place(&mut redacted, sensitivity);
        redacted
    }

    /// Redact `data` in place, returning how many values were replaced
    pub fn redact_map_in_place(
        &self,
        data: &mut Map<String, Value>,
        sensitivity: Option<&SensitivityMap>,
    ) -> usize {
        let mut replaced = 0;

        for (key, value) in data.iter_mut() {
            if self.should_redact_field(key, value, sensitivity) {
                *value = Value::String(self.marker.clone());
                replaced += 1;
                continue;
            }

            replaced += match value {
                Value::Object(nested) => self.redact_map_in_place(nested, sensitivity),
                Value::Array(items) => self.redact_sequence_in_place(items, sensitivity),
                _ => 0,
            };
        }

        replaced
    }

    /// Redact a sequence in place. Elements have no field names, so a
    /// scalar element is only checked against the value detector; map
    /// elements are redacted field by field.
    pub fn redact_sequence_in_place(
        &self,
        items: &mut [Value],
        sensitivity: Option<&SensitivityMap>,
    ) -> usize {
        let mut replaced = 0;

        for item in items.iter_mut() {
            replaced += match item {
                Value::Object(nested) => self.redact_map_in_place(nested, sensitivity),
                Value::Array(nested) => self.redact_sequence_in_place(nested, sensitivity),
                scalar if self.detector.is_pii_value(scalar) => {
                    *scalar = Value::String(self.marker.clone());
                    1
                }
                _ => 0,
            };
        }

        replaced
    }

    /// Redact a standalone value using only the value detector
    pub fn redact_value(&self, value: &Value) -> Value {
        if self.detector.is_pii_value(value) {
            Value::String(self.marker.clone())
        } else {
            value.clone()
        }
    }

    /// Redacted copy of positional query parameters
    pub fn redact_params(&self, params: &[Value]) -> Vec<Value> {
        let mut redacted = params.to_vec();
        self.redact_sequence_in_place(&mut redacted, None);
        redacted
    }

    pub fn redact_string(&self, value: &str) -> String {
        if self.detector.is_pii_str(value) {
            self.marker.clone()
        } else {
            value.to_string()
        }
    }

    /// `field=value` for display, with the value redacted when the field
    /// name or the value looks like PII
    pub fn format_redacted(&self, field_name: &str, value: &Value) -> String {
        if self.detector.is_pii_field(field_name) || self.detector.is_pii_value(value) {
            return format!("{}={}", field_name, self.marker);
        }

        match value {
            Value::String(s) => format!("{}={}", field_name, s),
            other => format!("{}={}", field_name, other),
        }
    }

    fn should_redact_field(
        &self,
        key: &str,
        value: &Value,
        sensitivity: Option<&SensitivityMap>,
    ) -> bool {
        match sensitivity.and_then(|map| map.get(key)) {
            Some(declared) => declared.should_redact(),
            None => self.detector.is_pii_field(key) || self.detector.is_pii_value(value),
        }
    }
}
