//! [`Telemetry`] that keeps everything it is given in memory

use crate::backend::{Attribute, SpanHandle, Telemetry};
use lifecycle_core::EventContext;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedSpan {
    pub name: String,
    pub attributes: Vec<Attribute>,
    /// Span name of the context the span was opened under
    pub parent: Option<String>,
    /// Time left before the caller's deadline when the span opened
    pub deadline: Option<Duration>,
    pub closed: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedValue {
    pub name: String,
    pub value: f64,
    pub attributes: Vec<Attribute>,
}

#[derive(Debug, Default)]
struct Recorded {
    spans: Vec<RecordedSpan>,
    counters: Vec<RecordedValue>,
    histograms: Vec<RecordedValue>,
}

/// Records spans, counters and histograms in call order. Clones share the
/// same record, so a clone can be handed to a producer and inspected after.
#[derive(Debug, Clone, Default)]
pub struct MemoryTelemetry {
    recorded: Arc<Mutex<Recorded>>,
}

impl MemoryTelemetry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Recorded> {
        self.recorded.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn spans(&self) -> Vec<RecordedSpan> {
        self.lock().spans.clone()
    }

    pub fn counters(&self) -> Vec<RecordedValue> {
        self.lock().counters.clone()
    }

    pub fn histograms(&self) -> Vec<RecordedValue> {
        self.lock().histograms.clone()
    }

    pub fn open_spans(&self) -> usize {
        self.lock().spans.iter().filter(|span| !span.closed).count()
    }

    /// Sum of every delta recorded for `name`
    pub fn counter_total(&self, name: &str) -> u64 {
        self.lock()
            .counters
            .iter()
            .filter(|counter| counter.name == name)
            .map(|counter| counter.value as u64)
            .sum()
    }

    pub fn clear(&self) {
        *self.lock() = Recorded::default();
    }
}

struct MemorySpan {
    recorded: Arc<Mutex<Recorded>>,
    index: usize,
}

impl SpanHandle for MemorySpan {
    fn close(self: Box<Self>) {
        let mut recorded = self.recorded.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(span) = recorded.spans.get_mut(self.index) {
            span.closed = true;
        }
    }
}

impl Telemetry for MemoryTelemetry {
    fn start_span(
        &self,
        ctx: &EventContext,
        name: &str,
        attributes: &[Attribute],
    ) -> (EventContext, Box<dyn SpanHandle>) {
        let index = {
            let mut recorded = self.lock();
            recorded.spans.push(RecordedSpan {
                name: name.to_string(),
                attributes: attributes.to_vec(),
                parent: ctx.span.clone(),
                deadline: ctx.remaining(),
                closed: false,
            });
            recorded.spans.len() - 1
        };

        let handle = MemorySpan {
            recorded: Arc::clone(&self.recorded),
            index,
        };

        (ctx.clone().with_span(name), Box::new(handle))
    }

    fn record_counter(&self, _ctx: &EventContext, name: &str, delta: u64, attributes: &[Attribute]) {
        self.lock().counters.push(RecordedValue {
            name: name.to_string(),
            value: delta as f64,
            attributes: attributes.to_vec(),
        });
    }

    fn record_histogram(
        &self,
        _ctx: &EventContext,
        name: &str,
        value: f64,
        attributes: &[Attribute],
    ) {
        self.lock().histograms.push(RecordedValue {
            name: name.to_string(),
            value,
            attributes: attributes.to_vec(),
        });
    }
}
