//! # Lifecycle Redaction
//!
//! PII redaction for event payloads.
//!
//! A field is redacted when schema metadata marks it sensitive. Fields with
//! no metadata fall back to heuristics on the field name and the value
//! shape. Redacted values are replaced with a marker, `[REDACTED]` by
//! default; [`Masker`] offers partial masking for display instead.
//!
//! ```
//! use lifecycle_redaction::Redactor;
//! use serde_json::json;
//!
//! let data = json!({"user": {"email": "ada@example.com", "plan": "pro"}});
//! let redacted = Redactor::new().redact_map(data.as_object().unwrap(), None);
//! assert_eq!(redacted["user"]["email"], "[REDACTED]");
//! assert_eq!(redacted["user"]["plan"], "pro");
//! ```

pub mod detector;
pub mod mask;
pub mod redactor;
pub mod sensitivity;

pub use detector::PiiDetector;
pub use mask::Masker;
pub use redactor::{Redactor, DEFAULT_MARKER};
pub use sensitivity::{from_schema_flags, sensitive_fields, FieldSensitivity, SensitivityMap};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RedactionError {
    #[error("Invalid detection pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },
}

pub type Result<T> = std::result::Result<T, RedactionError>;
