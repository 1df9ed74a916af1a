//! Combat tick benchmarks for skirmish_core.
//!
//! Run with: `cargo bench -p skirmish_core`

// Benchmark binaries don't need docs on macro-generated functions
#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use skirmish_core::prelude::*;
use skirmish_test_utils::determinism::skirmish_scenario;
use skirmish_test_utils::fixtures::{point, MockWorld};

/// Two lines of units trading blows until one side is gone.
pub fn battle_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("battle");
    for per_side in [8u32, 32, 128] {
        group.bench_with_input(
            BenchmarkId::from_parameter(per_side),
            &per_side,
            |b, &per_side| {
                b.iter_batched(
                    || skirmish_scenario(per_side),
                    |mut scenario| {
                        for _ in 0..20 {
                            scenario.step();
                        }
                        black_box(scenario.combat.state_hash())
                    },
                    criterion::BatchSize::SmallInput,
                );
            },
        );
    }
    group.finish();
}

/// Idle units spread over a field with no enemy in reach.
pub fn idle_scan_benchmark(c: &mut Criterion) {
    let mut world = MockWorld::new();
    world.declare_war(1, 2);
    let mut combat = CombatSystem::default();
    for id in 1..=256u64 {
        let faction = if id % 2 == 0 { 1 } else { 2 };
        let (Ok(column), Ok(row)) = (i32::try_from(id % 16), i32::try_from(id / 16)) else {
            return;
        };
        let (x, y) = (column * 120, row * 120);
        world.spawn(id, faction, point(x, y));
        if combat.add_entity(&world, id, Stance::Aggressive).is_err() {
            return;
        }
    }

    c.bench_function("idle_scan_256", |b| {
        b.iter(|| {
            let report = combat.tick(&mut world);
            black_box(report.is_ok())
        });
    });
}

criterion_group!(benches, battle_benchmark, idle_scan_benchmark);
criterion_main!(benches);
