//! The telemetry collaborator contract

use lifecycle_core::{Event, EventContext};
use std::fmt;

/// A string-valued span or metric attribute
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Attribute {
    pub key: String,
    pub value: String,
}

impl Attribute {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.key, self.value)
    }
}

/// An open span. Closing consumes the handle so a span closes at most once.
pub trait SpanHandle {
    fn close(self: Box<Self>);
}

/// Receives the spans and metrics derived from each emitted event.
///
/// Implementations must tolerate concurrent calls from several emitting
/// threads. Recording never fails from the caller's point of view.
pub trait Telemetry: Send + Sync {
    /// Open a span; the returned context names the span it was opened under
    fn start_span(
        &self,
        ctx: &EventContext,
        name: &str,
        attributes: &[Attribute],
    ) -> (EventContext, Box<dyn SpanHandle>);

    fn record_counter(&self, ctx: &EventContext, name: &str, delta: u64, attributes: &[Attribute]);

    /// `value` is in seconds for `.duration` histograms
    fn record_histogram(&self, ctx: &EventContext, name: &str, value: f64, attributes: &[Attribute]);
}

/// Closes its span when dropped, on every exit path
pub struct SpanGuard {
    handle: Option<Box<dyn SpanHandle>>,
}

impl SpanGuard {
    pub fn new(handle: Box<dyn SpanHandle>) -> Self {
        Self {
            handle: Some(handle),
        }
    }
}

impl Drop for SpanGuard {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.close();
        }
    }
}

/// Span name for an event kind: its first two dot segments, so
/// `api.request.received` and `api.request.handled` share `api.request`
pub fn span_name(event_type: &str) -> String {
    let mut segments = event_type.splitn(3, '.');
    match (segments.next(), segments.next()) {
        (Some(first), Some(second)) => format!("{}.{}", first, second),
        _ => event_type.to_string(),
    }
}

pub fn counter_name(event_type: &str) -> String {
    format!("{}.count", event_type)
}

pub fn histogram_name(event_type: &str) -> String {
    format!("{}.duration", event_type)
}

/// Attributes attached to every span and metric of an event
pub fn event_attributes(event: &Event) -> Vec<Attribute> {
    let mut attributes = vec![
        Attribute::new("event.type", event.event_type()),
        Attribute::new("service.name", event.service()),
        Attribute::new("service.instance.id", event.host()),
    ];

    if let Some(correlation_id) = event.correlation_id() {
        attributes.push(Attribute::new("correlation.id", correlation_id));
    }

    attributes
}
