//! Color registry for services, APIs, event kinds and statuses
//!
//! Colors originate in type/event annotations outside this crate; the
//! registry only stores and looks them up. Every lookup is an exact match.
//! Each of the four maps is guarded by its own lock so registration and
//! lookup on one map form a single critical section.

use crate::{LifecycleError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{PoisonError, RwLock};

/// Color returned for statuses with no registered or built-in color
pub const DEFAULT_STATUS_COLOR: &str = "#808080";

const DEFAULT_STATUS_COLORS: [(&str, &str); 12] = [
    ("success", "#00FF00"),
    ("error", "#FF0000"),
    ("warning", "#FFA500"),
    ("info", "#00BFFF"),
    ("pending", "#FFFF00"),
    ("in_progress", "#9370DB"),
    ("completed", "#00FF00"),
    ("failed", "#FF0000"),
    ("cancelled", "#808080"),
    ("created", "#00BFFF"),
    ("updated", "#FFA500"),
    ("deleted", "#FF0000"),
];

#[derive(Debug, Default)]
struct ColorMap(RwLock<HashMap<String, String>>);

impl ColorMap {
    fn with_entries(entries: &[(&str, &str)]) -> Self {
        let map = entries
            .iter()
            .map(|(key, color)| (key.to_string(), color.to_string()))
            .collect();
        Self(RwLock::new(map))
    }

    fn insert(&self, key: impl Into<String>, color: impl Into<String>) {
        // A panic while holding the lock cannot leave a half-written entry
        let mut map = self.0.write().unwrap_or_else(PoisonError::into_inner);
        map.insert(key.into(), color.into());
    }

    fn get(&self, key: &str) -> Option<String> {
        let map = self.0.read().unwrap_or_else(PoisonError::into_inner);
        map.get(key).cloned()
    }

    fn len(&self) -> usize {
        self.0.read().unwrap_or_else(PoisonError::into_inner).len()
    }
}

/// Exact-match lookup from service, API, event kind or status to a color
#[derive(Debug)]
pub struct ColorRegistry {
    services: ColorMap,
    apis: ColorMap,
    events: ColorMap,
    statuses: ColorMap,
}

impl Default for ColorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ColorRegistry {
    /// Registry with empty service/API/event maps and the built-in status colors
    pub fn new() -> Self {
        Self {
            services: ColorMap::default(),
            apis: ColorMap::default(),
            events: ColorMap::default(),
            statuses: ColorMap::with_entries(&DEFAULT_STATUS_COLORS),
        }
    }

    pub fn register_service_color(&self, service: impl Into<String>, color: impl Into<String>) {
        self.services.insert(service, color);
    }

    pub fn register_api_color(&self, api: impl Into<String>, color: impl Into<String>) {
        self.apis.insert(api, color);
    }

    pub fn register_event_color(&self, event_type: impl Into<String>, color: impl Into<String>) {
        self.events.insert(event_type, color);
    }

    pub fn register_status_color(&self, status: impl Into<String>, color: impl Into<String>) {
        self.statuses.insert(status, color);
    }

    /// `None` means "no styling", not an error
    pub fn service_color(&self, service: &str) -> Option<String> {
        self.services.get(service)
    }

    pub fn api_color(&self, api: &str) -> Option<String> {
        self.apis.get(api)
    }

    pub fn event_color(&self, event_type: &str) -> Option<String> {
        self.events.get(event_type)
    }

    /// Always yields a color: a registered override, a built-in default,
    /// or gray for anything unrecognized
    pub fn status_color(&self, status: &str) -> String {
        self.statuses
            .get(status)
            .unwrap_or_else(|| DEFAULT_STATUS_COLOR.to_string())
    }

    /// Color for an HTTP status code, derived from the status colors:
    /// 2xx success, 3xx info, 4xx warning, 5xx error. Anything else has no color.
    pub fn status_code_color(&self, status_code: u16) -> Option<String> {
        let status = match status_code {
            200..=299 => "success",
            300..=399 => "info",
            400..=499 => "warning",
            500..=599 => "error",
            _ => return None,
        };
        Some(self.status_color(status))
    }

    /// Register every color in `definitions`
    pub fn apply(&self, definitions: &ColorDefinitions) {
        for (service, color) in &definitions.services {
            self.register_service_color(service.as_str(), color.as_str());
        }
        for (api, color) in &definitions.apis {
            self.register_api_color(api.as_str(), color.as_str());
        }
        for (event_type, color) in &definitions.events {
            self.register_event_color(event_type.as_str(), color.as_str());
        }
        for (status, color) in &definitions.statuses {
            self.register_status_color(status.as_str(), color.as_str());
        }
    }

    /// Number of registered entries per map: (services, apis, events, statuses)
    pub fn counts(&self) -> (usize, usize, usize, usize) {
        (
            self.services.len(),
            self.apis.len(),
            self.events.len(),
            self.statuses.len(),
        )
    }
}

/// Colors extracted from type and event annotations, ready to be applied
/// to a [`ColorRegistry`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ColorDefinitions {
    #[serde(default)]
    pub services: HashMap<String, String>,
    #[serde(default)]
    pub apis: HashMap<String, String>,
    #[serde(default)]
    pub events: HashMap<String, String>,
    #[serde(default)]
    pub statuses: HashMap<String, String>,
}

impl ColorDefinitions {
    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
            && self.apis.is_empty()
            && self.events.is_empty()
            && self.statuses.is_empty()
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| LifecycleError::Config {
            message: format!("Failed to parse color definitions: {}", e),
        })
    }

    /// Load definitions from a TOML file with `[services]`, `[apis]`,
    /// `[events]` and `[statuses]` tables
    pub async fn load(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        let definitions = Self::from_toml_str(&content)?;

        tracing::debug!(
            telemetry.event = "colors_loaded",
            path = %path.display(),
            services = definitions.services.len(),
            apis = definitions.apis.len(),
            events = definitions.events.len(),
            "Loaded color definitions"
        );

        Ok(definitions)
    }
}
