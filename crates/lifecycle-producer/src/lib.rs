//! # Lifecycle Producer
//!
//! Emits typed lifecycle events for a service instance. Payloads are
//! redacted before anything is serialized, every event is reported to a
//! [`lifecycle_telemetry::Telemetry`] backend, and the result is written
//! either as JSON lines or as styled terminal lines with an optional JSON
//! copy.
//!
//! ```no_run
//! use lifecycle_core::{Actor, EventContext, Resource};
//! use lifecycle_producer::{EmitOptions, Producer, ResourceChange};
//! use serde_json::json;
//!
//! # fn main() -> lifecycle_core::Result<()> {
//! let producer = Producer::builder("orders").host("pod-1").build()?;
//! let ctx = EventContext::correlated();
//!
//! let data = json!({"email": "ada@example.com", "total": 42});
//! producer.emit_resource_created(
//!     &ctx,
//!     ResourceChange::new(Resource::new("Order", "o-1")).by(Actor::human("u-1")),
//!     data.as_object().cloned(),
//!     EmitOptions::new(),
//! )?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod producer;
pub mod sink;
pub mod styled;

pub use config::{
    LifecycleConfig, OutputConfig, OutputMode, ProducerConfig, RedactionConfig, DEFAULT_SERVICE,
};
pub use producer::{
    EmitOptions, Output, Producer, ProducerBuilder, RequestOutcome, ResourceChange,
};
pub use sink::JsonSink;
pub use styled::{parse_color, render_line, Level, ResolvedColors, StyledOutput};
