//! In-memory `metrics` recorder

use crate::{Error, Result};
use metrics::{
    Counter, Gauge, Histogram, HistogramFn, Key, KeyName, Label, Metadata, Recorder,
    SharedString, Unit,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use tracing::info;

type Registry<T> = Arc<Mutex<HashMap<Key, Arc<T>>>>;

/// Recorder keeping every counter, gauge and histogram sample in memory.
///
/// Cloning shares the underlying storage, so a clone installed as the
/// global recorder can still be read through the original.
#[derive(Clone)]
pub struct LifecycleMetricsRecorder {
    counters: Registry<AtomicU64>,
    gauges: Registry<AtomicU64>,
    histograms: Registry<Samples>,
    start_time: Instant,
}

#[derive(Default)]
struct Samples(Mutex<Vec<f64>>);

impl HistogramFn for Samples {
    fn record(&self, value: f64) {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(value);
    }
}

fn entry<T: Default>(registry: &Registry<T>, key: &Key) -> Arc<T> {
    let mut map = registry.lock().unwrap_or_else(PoisonError::into_inner);
    Arc::clone(map.entry(key.clone()).or_default())
}

impl Default for LifecycleMetricsRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl LifecycleMetricsRecorder {
    pub fn new() -> Self {
        Self {
            counters: Arc::default(),
            gauges: Arc::default(),
            histograms: Arc::default(),
            start_time: Instant::now(),
        }
    }

    /// Install a clone of this recorder as the process-wide recorder
    pub fn install(&self) -> Result<()> {
        metrics::set_global_recorder(self.clone()).map_err(|e| Error::System {
            message: format!("Failed to install metrics recorder: {}", e),
        })
    }

    pub fn get_counters(&self) -> HashMap<Key, u64> {
        let counters = self.counters.lock().unwrap_or_else(PoisonError::into_inner);
        counters
            .iter()
            .map(|(key, value)| (key.clone(), value.load(Ordering::Relaxed)))
            .collect()
    }

    pub fn get_gauges(&self) -> HashMap<Key, f64> {
        let gauges = self.gauges.lock().unwrap_or_else(PoisonError::into_inner);
        gauges
            .iter()
            .map(|(key, bits)| (key.clone(), f64::from_bits(bits.load(Ordering::Relaxed))))
            .collect()
    }

    pub fn get_histograms(&self) -> HashMap<Key, Vec<f64>> {
        let histograms = self.histograms.lock().unwrap_or_else(PoisonError::into_inner);
        histograms
            .iter()
            .map(|(key, samples)| {
                let samples = samples.0.lock().unwrap_or_else(PoisonError::into_inner);
                (key.clone(), samples.clone())
            })
            .collect()
    }

    /// Sum of a counter across all label sets
    pub fn counter_total(&self, name: &str) -> u64 {
        self.get_counters()
            .iter()
            .filter(|(key, _)| key.name() == name)
            .map(|(_, value)| *value)
            .sum()
    }

    /// Every sample of a histogram across all label sets
    pub fn histogram_samples(&self, name: &str) -> Vec<f64> {
        self.get_histograms()
            .into_iter()
            .filter(|(key, _)| key.name() == name)
            .flat_map(|(_, samples)| samples)
            .collect()
    }

    pub fn get_summary(&self) -> MetricsSummary {
        let counters = self.get_counters();

        let events_recorded = counters
            .iter()
            .filter(|(key, _)| key.name().ends_with(".count"))
            .map(|(_, value)| *value)
            .sum();

        MetricsSummary {
            uptime_seconds: self.start_time.elapsed().as_secs(),
            events_recorded,
            counter_count: counters.len(),
            gauge_count: self.gauges.lock().unwrap_or_else(PoisonError::into_inner).len(),
            histogram_count: self
                .histograms
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .len(),
            timestamp: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs(),
        }
    }

    pub fn reset(&self) {
        self.counters.lock().unwrap_or_else(PoisonError::into_inner).clear();
        self.gauges.lock().unwrap_or_else(PoisonError::into_inner).clear();
        self.histograms.lock().unwrap_or_else(PoisonError::into_inner).clear();

        info!(telemetry.event = "metrics_reset", "All metrics have been reset");
    }

    /// Export in the Prometheus text format. Dots in metric names become
    /// underscores; histograms are reduced to `_count` and `_sum`.
    pub fn export_prometheus(&self) -> String {
        let mut lines = Vec::new();

        for (key, value) in sorted(self.get_counters()) {
            let name = prometheus_name(key.name());
            lines.push(format!("# TYPE {} counter", name));
            lines.push(format!("{}{} {}", name, format_labels(key.labels()), value));
        }

        for (key, value) in sorted(self.get_gauges()) {
            let name = prometheus_name(key.name());
            lines.push(format!("# TYPE {} gauge", name));
            lines.push(format!("{}{} {}", name, format_labels(key.labels()), value));
        }

        for (key, samples) in sorted(self.get_histograms()) {
            let name = prometheus_name(key.name());
            let labels = format_labels(key.labels());
            let sum: f64 = samples.iter().sum();
            lines.push(format!("# TYPE {} histogram", name));
            lines.push(format!("{}_count{} {}", name, labels, samples.len()));
            lines.push(format!("{}_sum{} {}", name, labels, sum));
        }

        let mut output = lines.join("\n");
        if !output.is_empty() {
            output.push('\n');
        }
        output
    }
}

impl Recorder for LifecycleMetricsRecorder {
    fn describe_counter(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}

    fn describe_gauge(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}

    fn describe_histogram(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}

    fn register_counter(&self, key: &Key, _metadata: &Metadata<'_>) -> Counter {
        Counter::from_arc(entry(&self.counters, key))
    }

    fn register_gauge(&self, key: &Key, _metadata: &Metadata<'_>) -> Gauge {
        // Gauges store f64 bits
        Gauge::from_arc(entry(&self.gauges, key))
    }

    fn register_histogram(&self, key: &Key, _metadata: &Metadata<'_>) -> Histogram {
        Histogram::from_arc(entry(&self.histograms, key))
    }
}

/// Summary of current metrics
#[derive(Debug, Clone)]
pub struct MetricsSummary {
    pub uptime_seconds: u64,
    /// Sum of every `<kind>.count` counter
    pub events_recorded: u64,
    pub counter_count: usize,
    pub gauge_count: usize,
    pub histogram_count: usize,
    pub timestamp: u64,
}

fn sorted<V>(map: HashMap<Key, V>) -> Vec<(Key, V)> {
    let mut entries: Vec<_> = map.into_iter().collect();
    entries.sort_by(|(a, _), (b, _)| {
        a.name()
            .cmp(b.name())
            .then_with(|| format_labels(a.labels()).cmp(&format_labels(b.labels())))
    });
    entries
}

fn prometheus_name(name: &str) -> String {
    name.replace(['.', '-'], "_")
}

fn format_labels<'a>(labels: impl Iterator<Item = &'a Label>) -> String {
    let label_pairs: Vec<String> = labels
        .map(|label| format!("{}=\"{}\"", prometheus_name(label.key()), label.value()))
        .collect();
    if label_pairs.is_empty() {
        String::new()
    } else {
        format!("{{{}}}", label_pairs.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let recorder = LifecycleMetricsRecorder::new();

        metrics::with_local_recorder(&recorder, || {
            metrics::counter!("service.started.count").increment(1);
            metrics::counter!("service.started.count").increment(2);
            metrics::counter!("service.started.count", "service.name" => "billing").increment(4);
        });

        assert_eq!(recorder.counter_total("service.started.count"), 7);
        assert_eq!(recorder.get_counters().len(), 2);
    }

    #[test]
    fn test_gauges_and_histograms() {
        let recorder = LifecycleMetricsRecorder::new();

        metrics::with_local_recorder(&recorder, || {
            metrics::gauge!("queue.depth").set(42.0);
            metrics::histogram!("db.query.completed.duration").record(0.25);
            metrics::histogram!("db.query.completed.duration").record(0.5);
        });

        let gauges = recorder.get_gauges();
        assert_eq!(gauges.values().copied().collect::<Vec<_>>(), vec![42.0]);
        assert_eq!(
            recorder.histogram_samples("db.query.completed.duration"),
            vec![0.25, 0.5]
        );
    }

    #[test]
    fn test_clones_share_storage() {
        let recorder = LifecycleMetricsRecorder::new();
        let installed = recorder.clone();

        metrics::with_local_recorder(&installed, || {
            metrics::counter!("resource.created.count").increment(1);
        });

        assert_eq!(recorder.counter_total("resource.created.count"), 1);
    }

    #[test]
    fn test_metrics_summary() {
        let recorder = LifecycleMetricsRecorder::new();

        metrics::with_local_recorder(&recorder, || {
            metrics::counter!("api.request.handled.count").increment(3);
            metrics::counter!("lifecycle.sink.errors").increment(1);
            metrics::histogram!("api.request.handled.duration").record(0.1);
        });

        let summary = recorder.get_summary();
        assert_eq!(summary.events_recorded, 3);
        assert_eq!(summary.counter_count, 2);
        assert_eq!(summary.gauge_count, 0);
        assert_eq!(summary.histogram_count, 1);

        recorder.reset();
        assert_eq!(recorder.get_summary().counter_count, 0);
    }

    #[test]
    fn test_prometheus_export() {
        let recorder = LifecycleMetricsRecorder::new();

        metrics::with_local_recorder(&recorder, || {
            metrics::counter!("api.request.handled.count", "service.name" => "orders").increment(5);
            metrics::histogram!("api.request.handled.duration").record(0.5);
            metrics::histogram!("api.request.handled.duration").record(1.5);
        });

        let output = recorder.export_prometheus();
        assert!(output.contains("# TYPE api_request_handled_count counter"));
        assert!(output.contains("api_request_handled_count{service_name=\"orders\"} 5"));
        assert!(output.contains("api_request_handled_duration_count 2"));
        assert!(output.contains("api_request_handled_duration_sum 2"));
    }

    #[test]
    fn test_empty_export() {
        assert_eq!(LifecycleMetricsRecorder::new().export_prometheus(), "");
    }
}
