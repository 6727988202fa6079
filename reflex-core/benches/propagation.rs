//! Benchmark: Trigger propagation (fan-out, untracked writes, sequence push)

use std::cell::Cell;
use std::rc::Rc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use reflex_core::reactive::{effect, observe, Runner};
use reflex_core::value::RawValue;

fn benchmark_fan_out(c: &mut Criterion) {
    let mut group = c.benchmark_group("fan_out");

    for subscribers in [1usize, 10, 100] {
        let state = observe(&RawValue::record_from([("n", 0)]));
        let sink = Rc::new(Cell::new(0.0));
        let runners: Vec<Runner<()>> = (0..subscribers)
            .map(|_| {
                let (view, sink) = (state.clone(), sink.clone());
                effect(move || sink.set(view.get("n").as_f64().unwrap_or_default()))
            })
            .collect();

        let mut next = 0.0;
        group.bench_with_input(BenchmarkId::from_parameter(subscribers), &subscribers, |b, _| {
            b.iter(|| {
                next += 1.0;
                state.set("n", black_box(next)).unwrap();
            });
        });
        drop(runners);
    }

    group.finish();
}

fn benchmark_untracked_write(c: &mut Criterion) {
    let state = observe(&RawValue::record_from([("n", 0)]));
    let mut next = 0.0;

    // Nobody reads `n`: measures the non-allocating trigger path.
    c.bench_function("untracked_write", |b| {
        b.iter(|| {
            next += 1.0;
            state.set("n", black_box(next)).unwrap();
        });
    });
}

fn benchmark_sequence_push(c: &mut Criterion) {
    c.bench_function("sequence_push_with_reader", |b| {
        b.iter(|| {
            let list = observe(&RawValue::sequence(Vec::<f64>::new()));
            let view = list.clone();
            let _reader = effect(move || black_box(view.len()));
            for value in 0..32 {
                list.push([f64::from(value)]).unwrap();
            }
        });
    });
}

criterion_group!(
    benches,
    benchmark_fan_out,
    benchmark_untracked_write,
    benchmark_sequence_push
);
criterion_main!(benches);
