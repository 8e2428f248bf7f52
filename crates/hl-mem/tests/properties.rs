//! Property-based tests for the collector and the arena.
//!
//! Random allocation, marking and collection sequences are replayed against
//! a simple model of which objects are live.

#![cfg(all(feature = "gc", feature = "arena"))]

use hl_mem::gc::HEADER_SIZE;
use hl_mem::{Arena, Gc, GcConfig, GcPtr, Generation};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Alloc(usize),
    /// Mark the live object at this index (modulo the live count).
    Mark(usize),
    Sweep,
    UnmarkAll,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        6 => (0usize..200).prop_map(Op::Alloc),
        3 => any::<usize>().prop_map(Op::Mark),
        1 => Just(Op::Sweep),
        1 => Just(Op::UnmarkAll),
    ]
}

fn rounded(size: usize) -> usize {
    (size.max(1) + 7) & !7
}

/// A tracked object: its current handle and whether the model expects it
/// to be marked.
#[derive(Debug, Clone, Copy)]
struct Tracked {
    ptr: GcPtr,
    size: usize,
    marked: bool,
}

/// Rewrites the tracked set after a minor collection. Young survivors are
/// forwarded; old objects stay where they are; everything else is gone.
fn follow(gc: &Gc, live: &mut Vec<Tracked>) {
    live.retain_mut(|t| match gc.forward(t.ptr) {
        Some(moved) => {
            t.ptr = moved;
            true
        }
        None => gc.generation_of(t.ptr) == Some(Generation::Old),
    });
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Young usage is exactly the sum of young object sizes and never
    /// exceeds the buffer.
    #[test]
    fn young_buffer_is_tiled(sizes in prop::collection::vec(0usize..300, 1..200)) {
        let mut gc = Gc::new(GcConfig::default().young_size(2048)).unwrap();
        let mut young = Vec::new();

        for size in sizes {
            let before = gc.stats().minor_collections;
            let p = gc.alloc(size).unwrap();
            if gc.stats().minor_collections != before {
                young.clear();
            }
            if gc.generation_of(p) == Some(Generation::Young) {
                young.push(HEADER_SIZE + rounded(size));
            }

            let stats = gc.stats();
            prop_assert!(stats.young_bytes <= stats.young_capacity);
            prop_assert_eq!(stats.young_bytes, young.iter().sum::<usize>());
        }
    }

    /// Every marked object is found after a sweep in exactly one
    /// generation, with its contents intact.
    #[test]
    fn no_lost_survivors(ops in prop::collection::vec(op(), 1..120), age in 1u8..5) {
        let mut gc = Gc::new(GcConfig::default().young_size(4096).tenuring_age(age)).unwrap();
        let mut live: Vec<Tracked> = Vec::new();

        for op in ops {
            match op {
                Op::Alloc(size) => {
                    let before = gc.stats().minor_collections;
                    let ptr = gc.alloc(size).unwrap();
                    if gc.stats().minor_collections != before {
                        follow(&gc, &mut live);
                    }
                    unsafe { ptr.as_ptr().write(size as u8) };
                    live.push(Tracked { ptr, size, marked: false });
                }
                Op::Mark(i) if !live.is_empty() => {
                    let n = live.len();
                    let t = &mut live[i % n];
                    unsafe { gc.mark(t.ptr) };
                    t.marked = true;
                }
                Op::Mark(_) => {}
                Op::Sweep => {
                    let majors = gc.stats().major_collections;
                    let before: Vec<Tracked> = live.clone();
                    gc.sweep();
                    prop_assert_eq!(gc.stats().major_collections, majors);
                    follow(&gc, &mut live);

                    let survivors = before.iter().filter(|t| t.marked).count();
                    prop_assert_eq!(live.iter().filter(|t| t.marked).count(), survivors);
                }
                Op::UnmarkAll => {
                    gc.unmark_all();
                    for t in &mut live {
                        t.marked = false;
                    }
                }
            }

            for t in &live {
                let info = gc.object_info(t.ptr);
                prop_assert!(info.is_some(), "tracked object missing");
                let info = info.unwrap();
                prop_assert_eq!(info.size, rounded(t.size));
                prop_assert_eq!(info.marked, t.marked);
                prop_assert_eq!(unsafe { t.ptr.as_ptr().read() }, t.size as u8);
            }
        }
    }

    /// A continuously marked object stays young for `age - 1` sweeps with
    /// its age counting up, and is old after sweep number `age`.
    #[test]
    fn promotion_threshold(age in 1u8..8) {
        let mut gc = Gc::new(GcConfig::default().tenuring_age(age)).unwrap();
        let mut p = gc.alloc(32).unwrap();
        unsafe { gc.mark(p) };

        for sweep in 1..age {
            gc.sweep();
            p = gc.forward(p).unwrap();
            prop_assert_eq!(gc.generation_of(p), Some(Generation::Young));
            prop_assert_eq!(gc.object_info(p).unwrap().age, sweep);
        }

        gc.sweep();
        p = gc.forward(p).unwrap();
        prop_assert_eq!(gc.generation_of(p), Some(Generation::Old));
        prop_assert_eq!(gc.stats().promoted, 1);
    }

    /// With no marks, a full collection leaves the old generation empty.
    #[test]
    fn sweep_completeness(sizes in prop::collection::vec(1usize..500, 0..60)) {
        let mut gc = Gc::new(GcConfig::default().young_size(1024).tenuring_age(1)).unwrap();
        for (i, &size) in sizes.iter().enumerate() {
            let p = if i % 2 == 0 { gc.alloc(size) } else { gc.alloc_old(size) }.unwrap();
            unsafe { gc.mark(p) };
        }
        gc.sweep();

        gc.unmark_all();
        gc.collect_full();

        let stats = gc.stats();
        prop_assert_eq!(stats.old_objects, 0);
        prop_assert_eq!(stats.old_bytes, 0);
        prop_assert_eq!(stats.young_bytes, 0);
    }

    /// Resetting twice is the same as resetting once.
    #[test]
    fn arena_reset_idempotent(sizes in prop::collection::vec(0usize..10_000, 0..100)) {
        let mut arena = Arena::new(4096).unwrap();
        for size in sizes {
            arena.alloc_bytes(size).unwrap();
        }

        arena.reset();
        let once = arena.stats();
        arena.reset();
        let twice = arena.stats();

        prop_assert_eq!(once, twice);
        prop_assert_eq!(twice.chunk_count, 1);
        prop_assert_eq!(twice.used_bytes, 0);
    }

    /// Save immediately followed by restore changes nothing, and a restore
    /// after arbitrary allocations brings used bytes and chunks back.
    #[test]
    fn savepoint_round_trip(
        prefix in prop::collection::vec(0usize..5000, 0..20),
        body in prop::collection::vec(0usize..5000, 0..50),
    ) {
        let arena = Arena::new(4096).unwrap();
        for size in prefix {
            arena.alloc_bytes(size).unwrap();
        }

        let before = arena.stats();
        let sp = arena.save();
        arena.restore(sp).unwrap();
        prop_assert_eq!(arena.stats(), before);

        let sp = arena.save();
        for size in body {
            arena.alloc_bytes(size).unwrap();
        }
        arena.restore(sp).unwrap();

        let after = arena.stats();
        prop_assert_eq!(after.used_bytes, before.used_bytes);
        prop_assert_eq!(after.chunk_count, before.chunk_count);
        prop_assert_eq!(after.total_capacity, before.total_capacity);
    }

    /// Allocations never overlap and stay 8-byte aligned.
    #[test]
    fn arena_allocations_disjoint(sizes in prop::collection::vec(0usize..3000, 1..100)) {
        let arena = Arena::new(4096).unwrap();
        let mut spans: Vec<(usize, usize)> = sizes
            .iter()
            .map(|&size| {
                let p = arena.alloc_bytes(size).unwrap().as_ptr().addr();
                (p, p + rounded(size))
            })
            .collect();

        for &(start, _) in &spans {
            prop_assert_eq!(start % 8, 0);
        }
        spans.sort_unstable();
        for pair in spans.windows(2) {
            prop_assert!(pair[0].1 <= pair[1].0);
        }
    }
}
