use criterion::{black_box, criterion_group, criterion_main, Criterion};
use phantom_client::{Outcome, ResultAggregator};
use serde_json::json;

fn page_outcomes(pages: usize, page_size: usize) -> Vec<Outcome> {
    (0..pages)
        .map(|p| {
            let data: Vec<_> = (0..page_size)
                .map(|i| json!({"id": p * page_size + i, "name": format!("record {i}")}))
                .collect();
            Outcome::success(format!("page-{p}"), json!({"count": pages * page_size, "data": data}))
        })
        .collect()
}

fn benchmark_aggregate_and_unwrap(c: &mut Criterion) {
    let outcomes = page_outcomes(50, 200);
    c.bench_function("aggregate_unwrap_50x200", |b| {
        b.iter(|| {
            let mut results = ResultAggregator::aggregate(black_box(outcomes.clone()));
            results.unwrap_data_key("data");
            results
        })
    });
}

fn benchmark_dedup(c: &mut Criterion) {
    let mut results = ResultAggregator::aggregate(page_outcomes(10, 500));
    results.unwrap_data_key("data");
    c.bench_function("dedup_success_by_id_5000", |b| {
        b.iter(|| {
            let mut copy = black_box(results.clone());
            copy.dedup_success_by("id")
        })
    });
}

criterion_group!(benches, benchmark_aggregate_and_unwrap, benchmark_dedup);
criterion_main!(benches);
