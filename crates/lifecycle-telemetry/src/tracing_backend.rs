//! [`Telemetry`] backed by `tracing` spans and the `metrics` facade

use crate::backend::{Attribute, SpanHandle, Telemetry};
use lifecycle_core::EventContext;
use metrics::Label;
use std::time::Instant;
use tracing::field::Empty;

/// Reports spans to the current `tracing` subscriber and metrics to the
/// installed `metrics` recorder. Both are no-ops when nothing is installed.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingTelemetry;

impl TracingTelemetry {
    pub fn new() -> Self {
        Self
    }
}

struct TracingSpan {
    span: tracing::Span,
    name: String,
    opened: Instant,
}

impl SpanHandle for TracingSpan {
    fn close(self: Box<Self>) {
        tracing::trace!(
            parent: &self.span,
            telemetry.event = "span_closed",
            span.name = %self.name,
            elapsed_us = self.opened.elapsed().as_micros() as u64,
            "Closed lifecycle span"
        );
    }
}

fn labels(attributes: &[Attribute]) -> Vec<Label> {
    attributes
        .iter()
        .map(|attr| Label::new(attr.key.clone(), attr.value.clone()))
        .collect()
}

impl Telemetry for TracingTelemetry {
    fn start_span(
        &self,
        ctx: &EventContext,
        name: &str,
        attributes: &[Attribute],
    ) -> (EventContext, Box<dyn SpanHandle>) {
        let span = tracing::info_span!(
            "lifecycle.event",
            otel.name = %name,
            parent.name = Empty,
            event.type = Empty,
            service.name = Empty,
            service.instance.id = Empty,
            correlation.id = Empty,
            deadline.remaining_ms = Empty,
        );

        for attr in attributes {
            span.record(attr.key.as_str(), attr.value.as_str());
        }
        if let Some(parent) = &ctx.span {
            span.record("parent.name", parent.as_str());
        }
        if let Some(remaining) = ctx.remaining() {
            span.record("deadline.remaining_ms", remaining.as_millis() as u64);
        }

        let handle = TracingSpan {
            span,
            name: name.to_string(),
            opened: Instant::now(),
        };

        (ctx.clone().with_span(name), Box::new(handle))
    }

    fn record_counter(&self, _ctx: &EventContext, name: &str, delta: u64, attributes: &[Attribute]) {
        metrics::counter!(name.to_string(), labels(attributes)).increment(delta);
    }

    fn record_histogram(
        &self,
        _ctx: &EventContext,
        name: &str,
        value: f64,
        attributes: &[Attribute],
    ) {
        metrics::histogram!(name.to_string(), labels(attributes)).record(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::LifecycleMetricsRecorder;
    use std::time::Duration;

    #[test]
    fn test_metrics_reach_installed_recorder() {
        let recorder = LifecycleMetricsRecorder::new();
        let telemetry = TracingTelemetry::new();
        let ctx = EventContext::new();
        let attrs = vec![Attribute::new("service.name", "orders")];

        metrics::with_local_recorder(&recorder, || {
            telemetry.record_counter(&ctx, "api.request.handled.count", 1, &attrs);
            telemetry.record_counter(&ctx, "api.request.handled.count", 1, &attrs);
            telemetry.record_histogram(&ctx, "api.request.handled.duration", 0.045, &attrs);
        });

        assert_eq!(recorder.counter_total("api.request.handled.count"), 2);
        assert_eq!(recorder.histogram_samples("api.request.handled.duration"), vec![0.045]);

        let labelled = recorder
            .get_counters()
            .into_keys()
            .flat_map(|key| key.labels().map(|l| l.value().to_string()).collect::<Vec<_>>())
            .collect::<Vec<_>>();
        assert_eq!(labelled, vec!["orders"]);
    }

    #[test]
    fn test_span_context_carries_span_name() {
        let telemetry = TracingTelemetry::new();
        let ctx = EventContext::correlated().with_timeout(Duration::from_secs(5));

        let (span_ctx, handle) = telemetry.start_span(&ctx, "api.request", &[]);
        assert_eq!(span_ctx.span.as_deref(), Some("api.request"));
        assert_eq!(span_ctx.correlation_id, ctx.correlation_id);
        assert_eq!(span_ctx.deadline, ctx.deadline);
        handle.close();
    }
}
