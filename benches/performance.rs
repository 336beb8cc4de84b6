use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::json;
use std::time::Duration;

use request_correlation::middleware::LatencyTimer;
use request_correlation::observability::{LogFormatter, LogRecord, SensitiveDataFilter, Severity};
use request_correlation::{CorrelationContext, CorrelationId};

fn benchmark_redaction(c: &mut Criterion) {
    let mut group = c.benchmark_group("redaction");
    let filter = SensitiveDataFilter::new();

    group.bench_function("clean_text", |b| {
        b.iter(|| {
            let out = filter.redact_text(black_box("Request GET /orders completed in 12.40 ms"));
            black_box(out)
        });
    });

    group.bench_function("sensitive_text", |b| {
        b.iter(|| {
            let out = filter.redact_text(black_box(
                "login password=hunter2 for bob@example.com, Authorization: Bearer abc.def",
            ));
            black_box(out)
        });
    });

    for size in [10, 100, 1000].iter() {
        group.bench_with_input(BenchmarkId::new("structured", size), size, |b, &size| {
            let items: Vec<_> = (0..size)
                .map(|i| json!({"id": i, "password": "secret", "note": "ok"}))
                .collect();
            let payload = json!({ "items": items, "token": "abc" });

            b.iter(|| {
                let mut value = payload.clone();
                filter.redact_value(&mut value);
                black_box(value)
            });
        });
    }

    group.finish();
}

fn benchmark_formatting(c: &mut Criterion) {
    let mut group = c.benchmark_group("formatting");
    let plain = LogFormatter::default();
    let colored = LogFormatter::default().with_color(true);
    let record = LogRecord::new(Severity::Info, "service", "Processing root endpoint")
        .with_field("user", "bob")
        .with_location("src/api/handlers.rs", 17, "request_correlation::api")
        .with_request_id("abc-123");

    group.bench_function("plain", |b| {
        b.iter(|| black_box(plain.format(black_box(&record))));
    });

    group.bench_function("colored", |b| {
        b.iter(|| black_box(colored.format(black_box(&record))));
    });

    group.finish();
}

fn benchmark_context(c: &mut Criterion) {
    let mut group = c.benchmark_group("context");
    group.measurement_time(Duration::from_secs(5));

    group.bench_function("generate_id", |b| {
        b.iter(|| black_box(CorrelationId::generate()));
    });

    group.bench_function("sync_scope_get", |b| {
        let id = CorrelationId::parse("abc-123").unwrap();
        b.iter(|| {
            let seen = CorrelationContext::sync_scope(id.clone(), CorrelationContext::get);
            black_box(seen)
        });
    });

    group.finish();
}

fn benchmark_latency_timer(c: &mut Criterion) {
    let mut group = c.benchmark_group("latency_timer");

    group.bench_function("create_and_elapsed", |b| {
        b.iter(|| {
            let timer = LatencyTimer::new();
            let elapsed = timer.elapsed_ms();
            black_box(elapsed)
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    benchmark_redaction,
    benchmark_formatting,
    benchmark_context,
    benchmark_latency_timer,
);

criterion_main!(benches);
