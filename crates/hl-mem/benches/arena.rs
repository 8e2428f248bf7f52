// Arena allocator benchmarks: fast-path bump allocation, chunk growth,
// reset and savepoint rollback.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use hl_mem::Arena;

fn bench_sequential_allocations(c: &mut Criterion) {
    let mut group = c.benchmark_group("arena_sequential_alloc");

    for size in [8usize, 64, 256, 1024] {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            let mut arena = Arena::new(1 << 20).unwrap();
            let mut n = 0usize;
            b.iter(|| {
                black_box(arena.alloc_bytes(black_box(size)).unwrap());
                n += 1;
                if n % 1024 == 0 {
                    arena.reset();
                }
            });
        });
    }

    group.finish();
}

fn bench_chunk_growth(c: &mut Criterion) {
    c.bench_function("arena_chunk_growth", |b| {
        b.iter(|| {
            let arena = Arena::new(4096).unwrap();
            for _ in 0..1000 {
                black_box(arena.alloc_bytes(black_box(256)).unwrap());
            }
            arena
        });
    });
}

fn bench_reset(c: &mut Criterion) {
    c.bench_function("arena_fill_and_reset", |b| {
        let mut arena = Arena::new(4096).unwrap();
        b.iter(|| {
            for _ in 0..256 {
                black_box(arena.alloc_bytes(128).unwrap());
            }
            arena.reset();
        });
    });
}

fn bench_speculate(c: &mut Criterion) {
    c.bench_function("arena_speculate_rollback", |b| {
        let arena = Arena::new(64 * 1024).unwrap();
        b.iter(|| {
            let r: Option<()> = arena.speculate(|a| {
                for _ in 0..10 {
                    a.alloc(black_box(0u64)).ok()?;
                }
                None
            });
            black_box(r)
        });
    });
}

criterion_group!(
    benches,
    bench_sequential_allocations,
    bench_chunk_growth,
    bench_reset,
    bench_speculate
);
criterion_main!(benches);
