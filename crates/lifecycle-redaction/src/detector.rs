//! Heuristic PII detection by field name and by value shape

use crate::{RedactionError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

/// Field-name fragments that indicate PII. Matched case-insensitively
/// anywhere in the name, so `user_email` and `billingAddress` both hit.
static FIELD_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)(email|e-mail)",
        r"(?i)(phone|telephone|mobile)",
        r"(?i)(ssn|social.security)",
        r"(?i)(credit.card|card.number)",
        r"(?i)(password|passwd|pwd)",
        r"(?i)(secret|token|key)",
        r"(?i)(address|street|city|zip|postal)",
        r"(?i)(name|firstname|lastname|fullname)",
        r"(?i)(dob|date.of.birth|birthdate)",
        r"(?i)(ip.address|ip_addr)",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).unwrap())
    .collect()
});

/// Whole-value shapes that indicate PII regardless of the field name
static VALUE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        // Email
        r"^[a-zA-Z0-9._%+\-]+@[a-zA-Z0-9.\-]+\.[a-zA-Z]{2,}$",
        // E.164 phone, at least 7 digits
        r"^\+?[1-9]\d{6,14}$",
        // North American formatted phone
        r"^\(?\d{3}\)?[-.\s]?\d{3}[-.\s]?\d{4}$",
        // Credit card in 4-digit groups
        r"^\d{4}[\s\-]?\d{4}[\s\-]?\d{4}[\s\-]?\d{4}$",
        // SSN
        r"^\d{3}-?\d{2}-?\d{4}$",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).unwrap())
    .collect()
});

/// Combines a field-name detector and a value-shape detector
#[derive(Debug, Clone)]
pub struct PiiDetector {
    field_patterns: Vec<Regex>,
    value_patterns: Vec<Regex>,
}

impl Default for PiiDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl PiiDetector {
    /// Detector with the built-in field and value patterns
    pub fn new() -> Self {
        Self {
            field_patterns: FIELD_PATTERNS.clone(),
            value_patterns: VALUE_PATTERNS.clone(),
        }
    }

    /// Add a field-name pattern on top of the built-in ones
    pub fn with_field_pattern(mut self, pattern: &str) -> Result<Self> {
        self.field_patterns.push(compile(pattern)?);
        Ok(self)
    }

    /// Add a value-shape pattern on top of the built-in ones
    pub fn with_value_pattern(mut self, pattern: &str) -> Result<Self> {
        self.value_patterns.push(compile(pattern)?);
        Ok(self)
    }

    pub fn is_pii_field(&self, field_name: &str) -> bool {
        self.field_patterns
            .iter()
            .any(|pattern| pattern.is_match(field_name))
    }

    /// Only strings are inspected; numbers, booleans, maps and sequences
    /// never match
    pub fn is_pii_value(&self, value: &Value) -> bool {
        match value {
            Value::String(s) => self.is_pii_str(s),
            _ => false,
        }
    }

    pub fn is_pii_str(&self, value: &str) -> bool {
        self.value_patterns
            .iter()
            .any(|pattern| pattern.is_match(value))
    }
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| RedactionError::InvalidPattern {
        pattern: pattern.to_string(),
        message: e.to_string(),
    })
}
