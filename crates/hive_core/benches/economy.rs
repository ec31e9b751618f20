//! Economy benchmarks for hive_core.
//!
//! Run with: `cargo bench -p hive_core`

// Benchmark binaries don't need docs on macro-generated functions
#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use hive_core::prelude::*;

fn at(x: i32, z: i32) -> Vec2Fixed {
    Vec2Fixed::new(Fixed::from_num(x), Fixed::from_num(z))
}

/// A Swarm world with a saturated mineral line and an active queue.
fn busy_world() -> SimulationWorld {
    let mut world = SimulationWorld::new(FactionId::Swarm, 4242);
    world
        .spawn_starting_base(Vec2Fixed::ZERO)
        .expect("catalog has base entries");
    world.grant_resources(ResourceKind::Minerals, Fixed::from_num(5000));
    for i in 0..8 {
        world
            .nodes_mut()
            .add_mineral_patch(at(4 + i, 0), Fixed::from_num(1500));
    }
    for id in world.entities().sorted_unit_ids() {
        if world.entities().unit(id).is_some_and(Unit::is_worker) {
            world
                .assign_worker_to_minerals(id, None)
                .expect("patches available");
        }
    }
    let larva = world
        .entities()
        .sorted_unit_ids()
        .into_iter()
        .find(|&id| world.entities().unit(id).is_some_and(Unit::is_free_larva))
        .expect("swarm base spawns larvae");
    world
        .evolve_larva(larva, UnitRole::Worker)
        .expect("drone evolution affordable");
    world
}

pub fn economy_benchmark(c: &mut Criterion) {
    let step = Fixed::from_num(0.1);

    c.bench_function("tick_busy_swarm_world", |b| {
        let mut world = busy_world();
        let mut sink = NullSink;
        b.iter(|| {
            world.tick(black_box(step), &mut sink);
        });
    });

    c.bench_function("state_hash", |b| {
        let world = busy_world();
        b.iter(|| black_box(world.state_hash()));
    });

    c.bench_function("snapshot_roundtrip", |b| {
        let world = busy_world();
        b.iter(|| {
            let bytes = SaveGame::capture(&world)
                .to_bytes()
                .expect("serializes");
            let restored = SaveGame::from_bytes(&bytes)
                .and_then(|s| s.restore())
                .expect("restores");
            black_box(restored.state_hash())
        });
    });
}

criterion_group!(benches, economy_benchmark);
criterion_main!(benches);
