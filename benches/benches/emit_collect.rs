// Copyright 2025 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use std::cell::Cell;
use std::rc::Rc;

use criterion::{BatchSize, Criterion, Throughput, black_box, criterion_group, criterion_main};
use serde_json::{Value, json};
use trellis_app::{App, Blueprint};

/// An app with `n` root-level components, each listening for `ping` and
/// providing `val`.
fn build_app(n: usize) -> App {
    let app = App::new();
    let hits = Rc::new(Cell::new(0_u64));
    for i in 0..n {
        let hits = Rc::clone(&hits);
        let blueprint = Blueprint::new("widget")
            .expect("valid kind")
            .app_event(
                "ping",
                Rc::new(move |_, _| hits.set(hits.get() + 1)),
            )
            .provide("val", Rc::new(move |_, _| Some(json!(i))));
        app.add_component(&blueprint);
    }
    app
}

fn bench_emit_fanout(c: &mut Criterion) {
    let mut group = c.benchmark_group("emit_fanout");
    for n in [10_usize, 100, 1000] {
        let app = build_app(n);
        group.throughput(Throughput::Elements(n as u64));
        group.bench_function(format!("listeners_{n}"), |b| {
            b.iter(|| app.emit(black_box("ping"), Value::Null));
        });
    }
    group.finish();
}

fn bench_collect(c: &mut Criterion) {
    let mut group = c.benchmark_group("collect");
    for n in [10_usize, 100, 1000] {
        let app = build_app(n);
        group.throughput(Throughput::Elements(n as u64));
        group.bench_function(format!("providers_{n}"), |b| {
            b.iter(|| black_box(app.collect(black_box("val"), Value::Null)));
        });
    }
    group.finish();
}

fn bench_add_dispose(c: &mut Criterion) {
    let mut group = c.benchmark_group("lifecycle");
    let blueprint = Blueprint::new("widget")
        .expect("valid kind")
        .provide("val", Rc::new(|_, _| Some(json!(1))));
    group.bench_function("add_then_dispose", |b| {
        let app = App::new();
        b.iter_batched(
            || app.add_component(&blueprint),
            |component| component.dispose(),
            BatchSize::SmallInput,
        );
    });
    group.finish();
}

criterion_group!(benches, bench_emit_fanout, bench_collect, bench_add_dispose);
criterion_main!(benches);
