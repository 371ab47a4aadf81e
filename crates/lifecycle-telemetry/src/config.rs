//! Diagnostics logging and metrics configuration

use crate::{Error, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::Level;

/// Main telemetry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Global enable/disable toggle
    pub enabled: bool,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Metrics configuration
    pub metrics: MetricsConfig,
}

/// Logging-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: LogLevel,

    /// Output format (json, pretty, compact)
    pub format: LogFormat,

    /// Log to stderr. Stdout is left to the event stream.
    pub console_enabled: bool,

    /// Enable daily-rolled file logging
    pub file_enabled: bool,

    /// Directory for log files
    pub log_dir: PathBuf,

    /// Base filename for logs
    pub log_file_name: String,

    /// Include source location in logs
    pub include_location: bool,

    /// Include thread names/IDs
    pub include_thread_info: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Install the in-memory recorder as the global `metrics` recorder
    pub enabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

impl FromStr for LogLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_uppercase().as_str() {
            "TRACE" => Ok(LogLevel::Trace),
            "DEBUG" => Ok(LogLevel::Debug),
            "INFO" => Ok(LogLevel::Info),
            "WARN" => Ok(LogLevel::Warn),
            "ERROR" => Ok(LogLevel::Error),
            _ => Err(Error::Config {
                message: format!("Unknown log level '{}'", s),
            }),
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Structured JSON format
    Json,
    /// Human-readable pretty format
    Pretty,
    /// Compact single-line format
    Compact,
}

impl FromStr for LogFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "pretty" => Ok(LogFormat::Pretty),
            "compact" => Ok(LogFormat::Compact),
            _ => Err(Error::Config {
                message: format!("Unknown log format '{}'", s),
            }),
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        let default_log_dir = Self::default_log_dir().unwrap_or_else(|_| PathBuf::from("./logs"));

        Self {
            enabled: true,
            logging: LoggingConfig {
                level: LogLevel::Info,
                format: LogFormat::Compact,
                console_enabled: true,
                file_enabled: false,
                log_dir: default_log_dir,
                log_file_name: "lifecycle".to_string(),
                include_location: false,
                include_thread_info: false,
            },
            metrics: MetricsConfig { enabled: true },
        }
    }
}

impl TelemetryConfig {
    /// Load configuration from file or create default. Environment
    /// overrides apply in both cases.
    pub async fn load(config_path: Option<&Path>) -> Result<Self> {
        let config_file = match config_path {
            Some(path) => path.to_path_buf(),
            None => Self::default_config_path()?,
        };

        let mut config = if config_file.exists() {
            let content = tokio::fs::read_to_string(&config_file).await?;
            toml::from_str(&content).map_err(|e| Error::Config {
                message: format!("Failed to parse telemetry config: {}", e),
            })?
        } else {
            Self::default()
        };

        config.load_env_overrides();
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

        let content = toml::to_string_pretty(self).map_err(|e| Error::Config {
            message: format!("Failed to serialize telemetry config: {}", e),
        })?;

        tokio::fs::write(&config_file, content).await?;
        Ok(())
    }

    /// Load environment variable overrides. Unparseable values are ignored.
    pub fn load_env_overrides(&mut self) {
        if let Ok(enabled) = std::env::var("LIFECYCLE_TELEMETRY_ENABLED") {
            self.enabled = enabled.parse().unwrap_or(self.enabled);
        }

        if let Ok(level) = std::env::var("LIFECYCLE_LOG_LEVEL") {
            self.logging.level = level.parse().unwrap_or(self.logging.level);
        }

        if let Ok(format) = std::env::var("LIFECYCLE_LOG_FORMAT") {
            self.logging.format = format.parse().unwrap_or(self.logging.format);
        }

        if let Ok(enabled) = std::env::var("LIFECYCLE_FILE_LOGGING") {
            self.logging.file_enabled = enabled.parse().unwrap_or(self.logging.file_enabled);
        }

        if let Ok(dir) = std::env::var("LIFECYCLE_LOG_DIR") {
            self.logging.log_dir = PathBuf::from(dir);
        }

        if let Ok(enabled) = std::env::var("LIFECYCLE_METRICS_ENABLED") {
            self.metrics.enabled = enabled.parse().unwrap_or(self.metrics.enabled);
        }
    }

    fn default_config_path() -> Result<PathBuf> {
        let project_dirs =
            ProjectDirs::from("dev", "lifecycle", "lifecycle").ok_or_else(|| Error::Config {
                message: "Could not determine config directory".to_string(),
            })?;

        Ok(project_dirs.config_dir().join("telemetry.toml"))
    }

    fn default_log_dir() -> Result<PathBuf> {
        let project_dirs =
            ProjectDirs::from("dev", "lifecycle", "lifecycle").ok_or_else(|| Error::Config {
                message: "Could not determine log directory".to_string(),
            })?;

        Ok(project_dirs.data_dir().join("logs"))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.logging.log_file_name.trim().is_empty() {
            return Err(Error::Config {
                message: "log_file_name must not be empty".to_string(),
            });
        }

        if self.enabled && self.logging.file_enabled {
            if !self.logging.log_dir.exists() {
                std::fs::create_dir_all(&self.logging.log_dir)?;
            }

            // Test write permissions
            let test_file = self.logging.log_dir.join(".lifecycle_test");
            std::fs::write(&test_file, "test")?;
            std::fs::remove_file(&test_file)?;
        }

        Ok(())
    }
}
