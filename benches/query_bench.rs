//! Benchmarks for meter query building and rendering
//!
//! Run with: cargo bench

use chrono::{DateTime, Duration, Utc};
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use meterscope::filter::parse_filter;
use meterscope::meter::{Meter, MeterAggregation, MeterQueryRow, WindowSize};
use meterscope::query::{build_query, RawQueryParams};
use meterscope::render::{render, QueryMeterResponse, ResponseFormat};

fn bench_meter() -> Meter {
    Meter::new("tokens", MeterAggregation::Sum, "prompt")
        .window_size(WindowSize::Hour)
        .value_property("$.tokens")
        .group_by("model", "$.model")
        .group_by("region", "$.region")
}

fn start() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

fn create_test_rows(count: usize) -> Vec<MeterQueryRow> {
    (0..count)
        .map(|i| {
            let window_start = start() + Duration::hours(i as i64);
            MeterQueryRow::new(window_start, window_start + Duration::hours(1), i as f64 * 1.5)
                .subject(format!("customer-{}", i % 50))
                .group("model", if i % 2 == 0 { "gpt-4" } else { "claude" })
                .group("region", "eu")
        })
        .collect()
}

fn bench_build_query(c: &mut Criterion) {
    let mut group = c.benchmark_group("build_query");
    let meter = bench_meter();

    let simple = RawQueryParams::new().group_by("model");
    group.bench_function("simple", |b| {
        b.iter(|| build_query(black_box(&meter), black_box(&simple)).unwrap())
    });

    let full = RawQueryParams::new()
        .from(start())
        .to(start() + Duration::days(7))
        .window_size(WindowSize::Day)
        .window_time_zone("UTC")
        .group_by("model")
        .group_by("region")
        .subject("customer-1")
        .subject("customer-2")
        .filter("region", r#"{"$in": ["eu", "us"]}"#)
        .filter(
            "model",
            r#"{"$and": [{"$like": "gpt%"}, {"$not": {"$eq": "gpt-3"}}]}"#,
        );
    group.bench_function("filtered_windowed", |b| {
        b.iter(|| build_query(black_box(&meter), black_box(&full)).unwrap())
    });

    group.finish();
}

fn bench_parse_filter(c: &mut Criterion) {
    let text = r#"{"$or": [{"$in": ["a", "b", "c"]}, {"$and": [{"$gte": "m"}, {"$lt": "n"}]}]}"#;

    c.bench_function("parse_filter", |b| {
        b.iter(|| parse_filter(black_box(text)).unwrap())
    });
}

fn bench_render(c: &mut Criterion) {
    let mut group = c.benchmark_group("render");
    let group_by = vec!["model".to_string(), "region".to_string(), "subject".to_string()];
    let request = RawQueryParams::new().from(start()).to(start() + Duration::days(30));

    for size in [100, 1000, 10000] {
        let response = QueryMeterResponse::new(&request, create_test_rows(size));

        group.throughput(Throughput::Elements(size as u64));

        group.bench_function(format!("json_{}", size), |b| {
            b.iter(|| render(ResponseFormat::Json, black_box(&response), &group_by, "tokens").unwrap())
        });

        group.bench_function(format!("csv_{}", size), |b| {
            b.iter(|| render(ResponseFormat::Csv, black_box(&response), &group_by, "tokens").unwrap())
        });
    }

    group.finish();
}

criterion_group!(benches, bench_build_query, bench_parse_filter, bench_render);
criterion_main!(benches);
