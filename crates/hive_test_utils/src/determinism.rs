//! Determinism testing utilities.
//!
//! Provides a harness for verifying that the simulation produces
//! identical results given identical inputs.
//!
//! # Testing Strategy
//!
//! Lockstep multiplayer needs a 100% deterministic simulation. Sources
//! of non-determinism include:
//!
//! - **Floating-point math**: Different CPUs can produce different
//!   results. We use fixed-point arithmetic via `hive_core::math::Fixed`
//!   throughout.
//!
//! - **HashMap iteration order**: Rust's default hasher is randomized.
//!   We always iterate in sorted id order.
//!
//! - **System randomness**: No calls to `rand()` without explicit
//!   seeds. All "random" behavior uses a seeded PRNG owned by the world.

use std::thread;

use hive_core::prelude::*;

/// Result of a determinism test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminismResult {
    /// Whether all runs produced identical results.
    pub is_deterministic: bool,
    /// Hashes from each run.
    pub hashes: Vec<u64>,
    /// Number of ticks simulated.
    pub ticks: u64,
}

impl DeterminismResult {
    /// Get all unique hashes (should be 1 for a deterministic simulation).
    #[must_use]
    pub fn unique_hashes(&self) -> Vec<u64> {
        let mut unique: Vec<u64> = self.hashes.clone();
        unique.sort_unstable();
        unique.dedup();
        unique
    }

    /// Assert that the simulation was deterministic, with a detailed
    /// error message.
    ///
    /// # Panics
    ///
    /// Panics if the simulation produced different hashes across runs.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic {
            let unique = self.unique_hashes();
            panic!(
                "Simulation is non-deterministic!\n\
                 Runs: {}\n\
                 Ticks: {}\n\
                 Unique hashes: {} (expected 1)\n\
                 All hashes: {:?}",
                self.hashes.len(),
                self.ticks,
                unique.len(),
                self.hashes
            );
        }
    }
}

/// Run the same scenario several times and compare final hashes.
pub fn verify_determinism<S, Setup, Step, HashFn>(
    runs: usize,
    ticks: u64,
    setup: Setup,
    step: Step,
    hash: HashFn,
) -> DeterminismResult
where
    Setup: Fn() -> S,
    Step: Fn(&mut S),
    HashFn: Fn(&S) -> u64,
{
    let mut hashes = Vec::with_capacity(runs);

    for _ in 0..runs {
        let mut state = setup();

        for _ in 0..ticks {
            step(&mut state);
        }

        hashes.push(hash(&state));
    }

    let is_deterministic = hashes.windows(2).all(|w| w[0] == w[1]);

    DeterminismResult {
        is_deterministic,
        hashes,
        ticks,
    }
}

/// Simplified determinism verification for [`SimulationWorld`].
///
/// Runs the world twice with identical setup at a fixed 100 ms step
/// and verifies the final state hashes match exactly.
pub fn verify_world_determinism<F>(setup_fn: F, num_ticks: u64) -> bool
where
    F: Fn() -> SimulationWorld,
{
    let step = Fixed::from_num(0.1);
    let result = verify_determinism(
        2,
        num_ticks,
        &setup_fn,
        |world| {
            let mut sink = NullSink;
            world.tick(step, &mut sink);
        },
        SimulationWorld::state_hash,
    );
    result.is_deterministic
}

/// Run N worlds in parallel threads and verify their final hashes match.
///
/// Catches non-determinism that only shows up under thread scheduling
/// variations or memory layout differences.
///
/// # Panics
///
/// Panics if a worker thread panics.
#[must_use]
pub fn run_parallel_worlds<F>(setup_fn: F, num_worlds: usize, num_ticks: u64) -> DeterminismResult
where
    F: Fn() -> SimulationWorld + Send + Sync,
{
    let step = Fixed::from_num(0.1);
    let setup_ref = &setup_fn;
    let hashes: Vec<u64> = thread::scope(|scope| {
        let handles: Vec<_> = (0..num_worlds)
            .map(|_| {
                scope.spawn(move || {
                    let mut world = setup_ref();
                    let mut sink = NullSink;
                    for _ in 0..num_ticks {
                        world.tick(step, &mut sink);
                    }
                    world.state_hash()
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("world thread panicked"))
            .collect()
    });

    let is_deterministic = hashes.windows(2).all(|w| w[0] == w[1]);
    DeterminismResult {
        is_deterministic,
        hashes,
        ticks: num_ticks,
    }
}
