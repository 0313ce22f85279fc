use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use truth_proto::{encode_truth, EntityId, Pose, Truth};
use xs_core::{Dispatcher, NullRenderer, TruthQueue, TruthStore};

fn populated_queue(entities: i32, rng: &mut SmallRng) -> TruthQueue {
    let queue = TruthQueue::unbounded();
    for id in 0..entities {
        let truth = Truth {
            stage_id: EntityId(id),
            pose: Pose::new(rng.gen_range(0.0..40.0), rng.gen_range(0.0..40.0), 0.0),
            ..Truth::default()
        };
        queue
            .push(encode_truth(&truth))
            .expect("bench queue is never closed");
    }
    queue
}

fn bench_nearest(c: &mut Criterion) {
    let mut group = c.benchmark_group("store");

    for size in [16i32, 128, 1024] {
        let mut rng = SmallRng::seed_from_u64(7);
        let queue = populated_queue(size, &mut rng);
        let mut store = TruthStore::new();
        Dispatcher::default().tick(&mut store, &queue, &mut NullRenderer);

        group.bench_with_input(BenchmarkId::new("nearest", size), &store, |b, store| {
            b.iter(|| store.nearest(black_box(20.0), black_box(20.0)))
        });
    }

    for size in [16i32, 128, 1024] {
        group.bench_with_input(BenchmarkId::new("dispatch", size), &size, |b, &size| {
            b.iter_batched(
                || {
                    let mut rng = SmallRng::seed_from_u64(11);
                    (populated_queue(size, &mut rng), TruthStore::new())
                },
                |(queue, mut store)| {
                    Dispatcher::default().tick(&mut store, &queue, &mut NullRenderer);
                },
                BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

criterion_group!(store_benches, bench_nearest);
criterion_main!(store_benches);
