use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ndarray::Array1;

use efyj::model::{Attribute, Evaluator, Model, Scale};
use efyj::search::{Positions, Walker};
use efyj::stats::Kappa;

/// Three-leaf model wide enough to give the walker benchmarks a non-trivial
/// position count without the setup cost of a parsed fixture file.
fn bench_model() -> Model {
    let a = Attribute::leaf("a", Scale::new(true, ["lo", "mid", "hi"]).unwrap());
    let b = Attribute::leaf("b", Scale::new(true, ["lo", "mid", "hi"]).unwrap());
    let c = Attribute::leaf("c", Scale::new(true, ["lo", "hi"]).unwrap());

    let y_scale = Scale::new(true, ["lo", "mid", "hi"]).unwrap();
    let y_table = Array1::from((0..9u16).map(|i| (i % 3) as u8).collect::<Vec<_>>());
    let y = Attribute::inner("y", y_scale, vec![2, 3], vec![3, 3], y_table).unwrap();

    let root_scale = Scale::new(true, ["bad", "fair", "good"]).unwrap();
    let root_table = Array1::from((0..6u16).map(|i| (i % 3) as u8).collect::<Vec<_>>());
    let root = Attribute::inner("root", root_scale, vec![1, 4], vec![3, 2], root_table).unwrap();

    Model::new(vec![root, y, a, b, c]).unwrap()
}

fn stack_evaluator(c: &mut Criterion) {
    let model = bench_model();
    let evaluator = Evaluator::compile(&model);
    let tables = model.tables();

    c.bench_function("evaluator::evaluate", |b| {
        b.iter(|| {
            evaluator
                .evaluate(black_box(&model), black_box(&tables), black_box(&[1u8, 2, 0]))
                .unwrap()
        })
    });
}

fn walker_enumeration(c: &mut Criterion) {
    let model = bench_model();
    let positions = Positions::full(&model);

    let mut group = c.benchmark_group("walker::enumerate");
    for k in [1usize, 2] {
        group.bench_with_input(BenchmarkId::from_parameter(k), &k, |b, &k| {
            b.iter(|| {
                let mut walker = Walker::new(Arc::new(model.clone()), positions.clone(), true);
                walker.init_walkers(k).unwrap();
                let mut visited = 0usize;
                loop {
                    if walker.has_value() {
                        loop {
                            visited += 1;
                            if !walker.next_value() {
                                break;
                            }
                        }
                    }
                    if !walker.next_line() {
                        break;
                    }
                }
                black_box(visited)
            })
        });
    }
    group.finish();
}

fn kappa_scoring(c: &mut Criterion) {
    let classes = 5usize;
    let obs: Vec<u8> = (0..2000).map(|i| (i % classes) as u8).collect();
    let sim: Vec<u8> = (0..2000).map(|i| ((i + 1) % classes) as u8).collect();

    let mut group = c.benchmark_group("stats::kappa");
    group.bench_function("linear", |b| {
        b.iter(|| Kappa::linear(black_box(classes), black_box(&obs), black_box(&sim)).unwrap())
    });
    group.bench_function("squared", |b| {
        b.iter(|| Kappa::squared(black_box(classes), black_box(&obs), black_box(&sim)).unwrap())
    });
    group.finish();
}

criterion_group!(benches, stack_evaluator, walker_enumeration, kappa_scoring);
criterion_main!(benches);
