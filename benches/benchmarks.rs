use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::hint::black_box;

use provision::{deep_equal, shallow_equal, use_data, Element, Runtime, Store, StoreOptions};

#[derive(Clone, Serialize, Deserialize)]
struct State {
    counter: usize,
    name: String,
}

fn state(counter: usize) -> State {
    State {
        counter,
        name: "test".to_string(),
    }
}

fn compare_benchmark(c: &mut Criterion) {
    let a = json!({ "user": { "name": "x", "tags": [1, 2, 3] }, "count": 1, "_meta": 0 });
    let b = json!({ "user": { "name": "x", "tags": [1, 2, 3] }, "count": 1, "_meta": 1 });

    c.bench_function("deep_equal", |bench| {
        bench.iter(|| black_box(deep_equal(black_box(&a), black_box(&b))));
    });
    c.bench_function("shallow_equal", |bench| {
        bench.iter(|| black_box(shallow_equal(black_box(&a), black_box(&b))));
    });
}

fn store_set_benchmark(c: &mut Criterion) {
    let runtime = Runtime::new();
    let store = Store::new_in(&runtime, "bench", state(0), StoreOptions::new());

    c.bench_function("store_set_unbound", |b| {
        let mut i = 0;
        b.iter(|| {
            store.set(state(black_box(i)));
            i += 1;
        });
    });

    c.bench_function("store_set_rejected", |b| {
        b.iter(|| black_box(store.set(store.data())));
    });
}

fn store_render_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("store_render");

    for reader_count in [1, 10, 100].iter() {
        let runtime = Runtime::new();
        let store = Store::new_in(&runtime, "bench", state(0), StoreOptions::new());
        let readers = (0..*reader_count).map(|_| {
            Element::component(|cx| {
                let counter = use_data::<State>(cx, "bench").map_or(0, |s| s.counter);
                Element::text(counter.to_string())
            })
        });
        runtime.render(store.provider(Element::list(readers)));

        group.bench_with_input(
            BenchmarkId::from_parameter(reader_count),
            reader_count,
            |b, _| {
                let mut i = 0;
                b.iter(|| {
                    store.update(|s| s.counter = black_box(i));
                    runtime.frame();
                    i += 1;
                });
            },
        );
    }
    group.finish();
}

criterion_group!(
    benches,
    compare_benchmark,
    store_set_benchmark,
    store_render_benchmark,
);
criterion_main!(benches);
