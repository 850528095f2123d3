//! Benchmarks for chunked meal sorting

use chrono::{Duration, TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use platecache::meals::{Meal, MealSortingEngine, Nutrition, SortMethod};

fn meals(count: usize) -> Vec<Meal> {
    let start = Utc.with_ymd_and_hms(2026, 10, 1, 6, 0, 0).unwrap();
    (0..count)
        .map(|i| {
            Meal::new(
                start + Duration::minutes((i * 97 % 20_000) as i64),
                Nutrition {
                    calories: 100.0 + (i * 37 % 800) as f64,
                    protein: (i * 13 % 60) as f64,
                    fat: (i * 7 % 40) as f64,
                    fiber: (i % 12) as f64,
                    ..Default::default()
                },
            )
        })
        .collect()
}

fn bench_sort_methods(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let engine = MealSortingEngine::default();
    let now = Utc.with_ymd_and_hms(2026, 10, 16, 20, 0, 0).unwrap();
    let mut group = c.benchmark_group("sort_meals");

    for size in [50usize, 500, 5_000] {
        let input = meals(size);
        for method in [SortMethod::DateDesc, SortMethod::CaloriesDesc, SortMethod::HealthScoreDesc] {
            group.bench_with_input(BenchmarkId::new(method.id(), size), &input, |b, input| {
                b.to_async(&rt)
                    .iter(|| async { black_box(engine.sort_at(input, method, now).await) });
            });
        }
    }

    group.finish();
}

criterion_group!(benches, bench_sort_methods);
criterion_main!(benches);
