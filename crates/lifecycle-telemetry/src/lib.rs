//! # Lifecycle Telemetry
//!
//! The telemetry side of lifecycle event emission.
//!
//! - [`Telemetry`]: the collaborator the producer reports spans, counters and
//!   histograms to, with a `tracing`/`metrics` backed implementation
//!   ([`TracingTelemetry`]) and an in-memory one ([`MemoryTelemetry`])
//! - [`LifecycleMetricsRecorder`]: an in-memory `metrics` recorder with a
//!   summary and Prometheus-style text export
//! - [`TelemetrySystem`]: diagnostics logging setup for the host process
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use lifecycle_telemetry::{TelemetryConfig, TelemetrySystem};
//!
//! #[tokio::main]
//! async fn main() -> lifecycle_telemetry::Result<()> {
//!     let config = TelemetryConfig::default();
//!     let _guard = TelemetrySystem::init(config).await?;
//!
//!     tracing::info!("Application started");
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod config;
pub mod memory;
pub mod metrics;
pub mod system;
pub mod tracing_backend;

pub use backend::{
    counter_name, event_attributes, histogram_name, span_name, Attribute, SpanGuard, SpanHandle,
    Telemetry,
};
pub use config::{LogFormat, LogLevel, TelemetryConfig};
pub use memory::{MemoryTelemetry, RecordedSpan, RecordedValue};
pub use crate::metrics::{LifecycleMetricsRecorder, MetricsSummary};
pub use system::{TelemetryGuard, TelemetrySystem};
pub use tracing_backend::TracingTelemetry;

/// Result type for telemetry operations
pub type Result<T> = std::result::Result<T, Error>;

/// Telemetry-specific errors
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Telemetry system error: {message}")]
    System { message: String },
}

impl From<Error> for lifecycle_core::LifecycleError {
    fn from(err: Error) -> Self {
        match err {
            Error::Io(e) => lifecycle_core::LifecycleError::Io(e),
            Error::Serialization(e) => lifecycle_core::LifecycleError::Serialization(e),
            Error::Config { message } => lifecycle_core::LifecycleError::Config { message },
            Error::System { message } => lifecycle_core::LifecycleError::Telemetry { message },
        }
    }
}
