//! Property tests for the resource ledger and gather conservation.

use hive_core::prelude::*;
use hive_test_utils::fixtures::{at, base_world, first_worker};
use hive_test_utils::proptest::prelude::*;

proptest! {
    /// Spend-then-refund is always a no-op, and spend never drives the
    /// stockpile negative.
    #[test]
    fn prop_spend_refund_roundtrips(
        start_m in 0..100_000i32,
        start_g in 0..100_000i32,
        cost_m in 0..5_000i32,
        cost_g in 0..5_000i32,
    ) {
        let mut ledger = ResourceLedger::new(start_m, start_g, 200);
        let before = ledger;
        let cost = ResourceCost::new(cost_m, cost_g);
        if ledger.spend(cost) {
            prop_assert!(ledger.minerals >= Fixed::ZERO);
            prop_assert!(ledger.gas >= Fixed::ZERO);
            ledger.refund(cost);
        }
        prop_assert_eq!(ledger, before);
    }

    /// Spend is atomic: a cost covered on one axis only mutates nothing.
    #[test]
    fn prop_spend_is_atomic(
        start_m in 0..1_000i32,
        cost_m in 0..2_000i32,
        cost_g in 1..2_000i32,
    ) {
        // No gas at all, so any cost with gas must fail whole.
        let mut ledger = ResourceLedger::new(start_m, 0, 200);
        let before = ledger;
        let accepted = ledger.spend(ResourceCost::new(cost_m, cost_g));
        prop_assert!(!accepted);
        prop_assert_eq!(ledger, before);
    }

    /// The population cap is a hard wall at 200 no matter how much
    /// supply is stacked.
    #[test]
    fn prop_population_max_never_exceeds_hard_cap(raises in prop::collection::vec(0..50u32, 0..50)) {
        let mut ledger = ResourceLedger::new(0, 0, 10);
        for n in raises {
            ledger.raise_population_max(n);
            prop_assert!(ledger.population_max <= POPULATION_HARD_CAP);
        }
    }

    /// Reserve/release pairs always return to the starting population
    /// and never breach the cap in between.
    #[test]
    fn prop_population_reservations_balance(reserves in prop::collection::vec(1..8u32, 0..40)) {
        let mut ledger = ResourceLedger::new(0, 0, 200);
        let mut accepted = Vec::new();
        for n in &reserves {
            if ledger.add_population(*n) {
                accepted.push(*n);
            }
            prop_assert!(ledger.population <= ledger.population_max);
        }
        for n in accepted {
            ledger.release_population(n);
        }
        prop_assert_eq!(ledger.population, 0);
    }

    /// Whatever a worker extracts, node drain equals cargo gain.
    #[test]
    fn prop_gathering_conserves_minerals(ticks in 1..120u32, seed in 0..1_000u64) {
        let mut world = base_world(FactionId::Vanguard, seed);
        let worker = first_worker(&world);
        // Out of deposit range of the base, so nothing leaves the loop.
        world.entities_mut().unit_mut(worker).unwrap().position = at(4, 0);
        let node = world.nodes().sorted_ids()[0];
        let initial = world.nodes().get(node).unwrap().amount;
        world.assign_worker_to_minerals(worker, Some(node)).unwrap();

        let mut sink = NullSink;
        for _ in 0..ticks {
            world.tick(Fixed::from_num(0.1), &mut sink);
        }

        let carried = world.entities().unit(worker).unwrap().cargo_minerals;
        let remaining = world.nodes().get(node).unwrap().amount;
        prop_assert_eq!(carried + remaining, initial);
    }
}
