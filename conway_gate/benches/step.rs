// step.rs - Benchmarks for the per-stripe Life transition

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use conway_gate::boundary::{HaloStripe, SharedHalo, Side, halo_columns};
use conway_gate::grid::Buffer;
use conway_gate::partition::partition;
use conway_gate::patterns;
use conway_gate::step::step_stripe;

const SIZE: usize = 256;

fn bench_shared_stripe(c: &mut Criterion) {
    let grid = patterns::random(SIZE, SIZE, 42).unwrap();
    let mut group = c.benchmark_group("step/shared");

    for workers in [1, 4, 16] {
        let stripes = partition(SIZE, workers).unwrap();
        let stripe = &stripes[0];
        group.throughput(Throughput::Elements((stripe.width() * SIZE) as u64));
        group.bench_with_input(BenchmarkId::from_parameter(workers), stripe, |b, stripe| {
            let halo = SharedHalo::new(&grid);
            b.iter(|| {
                step_stripe(&halo, stripe, |x, y, alive| {
                    grid.set(Buffer::Next, x as isize, y as isize, black_box(alive))
                })
            });
        });
    }

    group.finish();
}

fn bench_halo_stripe(c: &mut Criterion) {
    let grid = patterns::random(SIZE, SIZE, 42).unwrap();
    let mut group = c.benchmark_group("step/halo");

    for workers in [1, 4, 16] {
        let stripes = partition(SIZE, workers).unwrap();
        let stripe = stripes[0];
        let body = grid.stripe_cells(Buffer::Current, &stripe);
        let (left, right) = halo_columns(&grid, &stripe);
        group.throughput(Throughput::Elements((stripe.width() * SIZE) as u64));

        group.bench_function(BenchmarkId::from_parameter(workers), |b| {
            let mut halo = HaloStripe::new(stripe, SIZE, body.clone()).unwrap();
            let mut generation = 0;
            b.iter(|| {
                generation += 1;
                halo.open(generation);
                halo.accept(generation, Side::Left, left.clone()).unwrap();
                halo.accept(generation, Side::Right, right.clone()).unwrap();
                black_box(halo.advance().len())
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_shared_stripe, bench_halo_stripe);
criterion_main!(benches);
