//! Test fixtures and helpers.
//!
//! Pre-built worlds and conversion helpers for consistent testing.

use fixed::types::I32F32;

use hive_core::prelude::*;

/// Create a fixed-point number from an integer.
#[must_use]
pub fn fixed(n: i32) -> I32F32 {
    I32F32::from_num(n)
}

/// Create a fixed-point number from a float (for tests only).
///
/// Note: In real simulation code, never use floats.
/// This is only for convenient test setup.
#[must_use]
pub fn fixed_f(n: f64) -> I32F32 {
    I32F32::from_num(n)
}

/// Create a position from integer coordinates.
#[must_use]
pub fn at(x: i32, z: i32) -> Vec2Fixed {
    Vec2Fixed::new(fixed(x), fixed(z))
}

/// A world with a completed starting base at the origin, the standard
/// worker complement, and one rich mineral patch at (4, 0).
///
/// # Panics
///
/// Panics if the faction catalog lacks a headquarters or worker entry,
/// which only happens if the built-in catalogs are broken.
#[must_use]
pub fn base_world(faction: FactionId, seed: u64) -> SimulationWorld {
    let mut world = SimulationWorld::new(faction, seed);
    world
        .spawn_starting_base(Vec2Fixed::ZERO)
        .expect("built-in catalog has base and worker entries");
    world.nodes_mut().add_mineral_patch(at(4, 0), fixed(1500));
    world
}

/// Like [`base_world`], with a geyser at (-4, 0) as well.
#[must_use]
pub fn base_world_with_gas(faction: FactionId, seed: u64) -> SimulationWorld {
    let mut world = base_world(faction, seed);
    world.nodes_mut().add_gas_geyser(at(-4, 0), fixed(800));
    world
}

/// First worker id in a world, by sorted id order.
///
/// # Panics
///
/// Panics if the world has no workers.
#[must_use]
pub fn first_worker(world: &SimulationWorld) -> EntityId {
    world
        .entities()
        .sorted_unit_ids()
        .into_iter()
        .find(|&id| world.entities().unit(id).is_some_and(Unit::is_worker))
        .expect("fixture world has workers")
}

/// First free larva id in a world, by sorted id order.
///
/// # Panics
///
/// Panics if the world has no free larvae.
#[must_use]
pub fn first_larva(world: &SimulationWorld) -> EntityId {
    world
        .entities()
        .sorted_unit_ids()
        .into_iter()
        .find(|&id| {
            world
                .entities()
                .unit(id)
                .is_some_and(Unit::is_free_larva)
        })
        .expect("fixture world has larvae")
}

/// Run a world for `seconds` of simulated time at a 100 ms step,
/// discarding events.
pub fn run_seconds(world: &mut SimulationWorld, seconds: i32) {
    let mut sink = NullSink;
    let step = fixed_f(0.1);
    for _ in 0..(seconds * 10) {
        world.tick(step, &mut sink);
    }
}
