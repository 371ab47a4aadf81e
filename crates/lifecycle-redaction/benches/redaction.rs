//! Redaction throughput on representative payloads

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use lifecycle_redaction::{FieldSensitivity, Redactor, SensitivityMap};
use serde_json::{json, Map, Value};

fn payload(width: usize) -> Map<String, Value> {
    let mut data = Map::new();
    for i in 0..width {
        data.insert(
            format!("field_{}", i),
            json!({
                "email": format!("user{}@example.com", i),
                "plan": "pro",
                "tags": ["a", "b", "415-555-2671"],
                "count": i,
            }),
        );
    }
    data
}

fn bench_heuristic_redaction(c: &mut Criterion) {
    let redactor = Redactor::new();
    let mut group = c.benchmark_group("heuristic_redaction");

    for width in [1, 10, 100] {
        let data = payload(width);
        group.bench_with_input(BenchmarkId::from_parameter(width), &data, |b, data| {
            b.iter(|| redactor.redact_map(black_box(data), None))
        });
    }

    group.finish();
}

fn bench_schema_redaction(c: &mut Criterion) {
    let redactor = Redactor::new();
    let data = payload(10);
    let mut sensitivity = SensitivityMap::new();
    sensitivity.insert("email".to_string(), FieldSensitivity::pii());
    sensitivity.insert("plan".to_string(), FieldSensitivity::none());
    sensitivity.insert("count".to_string(), FieldSensitivity::none());

    c.bench_function("schema_redaction", |b| {
        b.iter(|| redactor.redact_map(black_box(&data), Some(&sensitivity)))
    });
}

criterion_group!(benches, bench_heuristic_redaction, bench_schema_redaction);
criterion_main!(benches);
