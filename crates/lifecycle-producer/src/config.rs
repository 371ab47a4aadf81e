//! Producer configuration

use directories::ProjectDirs;
use lifecycle_core::{ColorDefinitions, LifecycleError, Result};
use lifecycle_redaction::{PiiDetector, Redactor, DEFAULT_MARKER};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LifecycleConfig {
    #[serde(default)]
    pub producer: ProducerConfig,

    #[serde(default)]
    pub redaction: RedactionConfig,

    #[serde(default)]
    pub output: OutputConfig,

    /// Colors registered when the producer is built
    #[serde(default)]
    pub colors: ColorDefinitions,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProducerConfig {
    pub service: String,

    /// Instance identifier stamped on every event
    #[serde(default = "default_host")]
    pub host: String,

    /// Default API. Empty means fall back to the resource type.
    #[serde(default)]
    pub api: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedactionConfig {
    #[serde(default = "default_marker")]
    pub marker: String,

    /// Extra field-name patterns, checked case-insensitively
    #[serde(default)]
    pub field_patterns: Vec<String>,

    /// Extra whole-value patterns
    #[serde(default)]
    pub value_patterns: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    #[default]
    Json,
    Styled,
}

impl FromStr for OutputMode {
    type Err = LifecycleError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "json" => Ok(OutputMode::Json),
            "styled" => Ok(OutputMode::Styled),
            other => Err(LifecycleError::Config {
                message: format!("unknown output mode '{}'", other),
            }),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub mode: OutputMode,

    /// JSONL file. In json mode it replaces stdout; in styled mode it is
    /// the secondary writer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json_path: Option<PathBuf>,

    /// Styled mode only: write the JSON copy and skip the styled line
    #[serde(default)]
    pub json_only: bool,
}

/// Service name used when none is configured
pub const DEFAULT_SERVICE: &str = "lifecycle";

fn default_host() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "localhost".to_string())
}

fn default_marker() -> String {
    DEFAULT_MARKER.to_string()
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            service: DEFAULT_SERVICE.to_string(),
            host: default_host(),
            api: String::new(),
        }
    }
}

impl Default for RedactionConfig {
    fn default() -> Self {
        Self {
            marker: default_marker(),
            field_patterns: Vec::new(),
            value_patterns: Vec::new(),
        }
    }
}

impl RedactionConfig {
    /// Build the redactor described by this section
    pub fn build_redactor(&self) -> Result<Redactor> {
        let mut detector = PiiDetector::new();
        for pattern in &self.field_patterns {
            detector = detector.with_field_pattern(pattern).map_err(config_error)?;
        }
        for pattern in &self.value_patterns {
            detector = detector.with_value_pattern(pattern).map_err(config_error)?;
        }

        Ok(Redactor::new()
            .with_marker(self.marker.as_str())
            .with_detector(detector))
    }
}

fn config_error(err: lifecycle_redaction::RedactionError) -> LifecycleError {
    LifecycleError::Config {
        message: err.to_string(),
    }
}

impl LifecycleConfig {
    /// Load configuration from file or create default. Environment
    /// overrides apply in both cases.
    pub async fn load(config_path: Option<&Path>) -> Result<Self> {
        let config_file = match config_path {
            Some(path) => path.to_path_buf(),
            None => Self::default_config_path()?,
        };

        let mut config = if config_file.exists() {
            let content = tokio::fs::read_to_string(&config_file).await?;
            toml::from_str(&content).map_err(|e| LifecycleError::Config {
                message: format!("Failed to parse config: {}", e),
            })?
        } else {
            Self::default()
        };

        config.load_env_overrides()?;
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save(&self, config_path: Option<&Path>) -> Result<()> {
        let config_file = match config_path {
            Some(path) => path.to_path_buf(),
            None => Self::default_config_path()?,
        };

        if let Some(parent) = config_file.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let content = toml::to_string_pretty(self).map_err(|e| LifecycleError::Config {
            message: format!("Failed to serialize config: {}", e),
        })?;

        tokio::fs::write(&config_file, content).await?;
        Ok(())
    }

    /// Apply `LIFECYCLE_*` environment overrides
    pub fn load_env_overrides(&mut self) -> Result<()> {
        if let Ok(service) = std::env::var("LIFECYCLE_SERVICE") {
            self.producer.service = service;
        }

        if let Ok(host) = std::env::var("LIFECYCLE_HOST") {
            self.producer.host = host;
        }

        if let Ok(api) = std::env::var("LIFECYCLE_API") {
            self.producer.api = api;
        }

        if let Ok(mode) = std::env::var("LIFECYCLE_OUTPUT") {
            self.output.mode = mode.parse()?;
        }

        if let Ok(json_only) = std::env::var("LIFECYCLE_JSON_ONLY") {
            self.output.json_only = json_only.parse().unwrap_or(self.output.json_only);
        }

        if let Ok(marker) = std::env::var("LIFECYCLE_REDACTION_MARKER") {
            self.redaction.marker = marker;
        }

        Ok(())
    }

    fn default_config_path() -> Result<PathBuf> {
        let project_dirs = ProjectDirs::from("dev", "lifecycle", "lifecycle").ok_or_else(|| {
            LifecycleError::Config {
                message: "Could not determine config directory".to_string(),
            }
        })?;

        Ok(project_dirs.config_dir().join("config.toml"))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.producer.service.trim().is_empty() {
            return Err(LifecycleError::Config {
                message: "producer.service must not be empty".to_string(),
            });
        }

        if self.redaction.marker.is_empty() {
            return Err(LifecycleError::Config {
                message: "redaction.marker must not be empty".to_string(),
            });
        }

        if self.output.json_only
            && self.output.mode == OutputMode::Styled
            && self.output.json_path.is_none()
        {
            return Err(LifecycleError::Config {
                message: "output.json_only requires output.json_path".to_string(),
            });
        }

        let redactor = self.redaction.build_redactor()?;
        if redactor.detector().is_pii_str(&self.redaction.marker) {
            return Err(LifecycleError::Config {
                message: format!(
                    "redaction.marker {:?} is itself detected as PII",
                    self.redaction.marker
                ),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_config_serialization() {
        let config = LifecycleConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let deserialized: LifecycleConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(config.producer.service, deserialized.producer.service);
        assert_eq!(config.redaction.marker, deserialized.redaction.marker);
        assert_eq!(config.output.mode, deserialized.output.mode);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: LifecycleConfig = toml::from_str(
            r##"
            [producer]
            service = "orders"

            [output]
            mode = "styled"

            [colors.services]
            orders = "#3B82F6"
            "##,
        )
        .unwrap();

        assert_eq!(config.producer.service, "orders");
        assert!(config.producer.api.is_empty());
        assert_eq!(config.redaction.marker, DEFAULT_MARKER);
        assert_eq!(config.output.mode, OutputMode::Styled);
        assert_eq!(config.colors.services["orders"], "#3B82F6");
    }

    #[test]
    fn test_output_mode_parse() {
        assert_eq!("JSON".parse::<OutputMode>().unwrap(), OutputMode::Json);
        assert_eq!("styled".parse::<OutputMode>().unwrap(), OutputMode::Styled);
        assert!("xml".parse::<OutputMode>().is_err());
    }

    #[test]
    fn test_validation() {
        let mut config = LifecycleConfig::default();
        assert!(config.validate().is_ok());

        config.producer.service = " ".to_string();
        assert!(config.validate().is_err());
        config.producer.service = "orders".to_string();

        config.redaction.marker.clear();
        assert!(config.validate().is_err());
        config.redaction.marker = "***".to_string();

        config.output.mode = OutputMode::Styled;
        config.output.json_only = true;
        assert!(config.validate().is_err());
        config.output.json_path = Some(PathBuf::from("events.jsonl"));
        assert!(config.validate().is_ok());

        config.redaction.field_patterns.push("(unclosed".to_string());
        assert!(matches!(
            config.validate(),
            Err(LifecycleError::Config { .. })
        ));
    }

    #[test]
    fn test_default_service_is_neutral() {
        let config = LifecycleConfig::default();
        assert_eq!(config.producer.service, "lifecycle");
        assert_eq!(config.producer.service, DEFAULT_SERVICE);
    }

    #[test]
    fn test_marker_must_not_look_like_pii() {
        let mut config = LifecycleConfig::default();

        config.redaction.marker = "admin@example.com".to_string();
        assert!(matches!(
            config.validate(),
            Err(LifecycleError::Config { .. })
        ));

        config.redaction.marker = "+14155550123".to_string();
        assert!(config.validate().is_err());

        config.redaction.marker = "REDACTED".to_string();
        config.redaction.value_patterns = vec!["^REDACTED$".to_string()];
        assert!(config.validate().is_err());

        config.redaction.value_patterns.clear();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_build_redactor_uses_marker_and_patterns() {
        let redaction = RedactionConfig {
            marker: "***".to_string(),
            field_patterns: vec!["tenant".to_string()],
            value_patterns: Vec::new(),
        };
        let redactor = redaction.build_redactor().unwrap();

        let data = json!({"tenant_id": "acme", "plan": "pro"});
        let redacted = redactor.redact_map(data.as_object().unwrap(), None);
        assert_eq!(redacted["tenant_id"], "***");
        assert_eq!(redacted["plan"], "pro");
    }

    #[tokio::test]
    async fn test_config_save_load() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");

        let mut config = LifecycleConfig::default();
        config.producer.service = "billing".to_string();
        config.producer.api = "Invoice".to_string();
        config.output.json_path = Some(temp_dir.path().join("events.jsonl"));
        config
            .colors
            .apis
            .insert("Invoice".to_string(), "#10B981".to_string());

        config.save(Some(&config_path)).await.unwrap();
        assert!(config_path.exists());

        let loaded = LifecycleConfig::load(Some(&config_path)).await.unwrap();
        assert_eq!(loaded.producer.api, "Invoice");
        assert_eq!(loaded.output.json_path, config.output.json_path);
        assert_eq!(loaded.colors, config.colors);
    }
}
