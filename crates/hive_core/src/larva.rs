//! Swarm larva lifecycle: periodic spawning and evolution into units.
//!
//! Hatcheries keep a small pool of free larvae topped up over time.
//! Evolution flips a free larva into an egg and hands the hatch to the
//! production scheduler; the larva registry only ever tracks free
//! larvae, eggs live solely in the queue until they hatch.

use std::collections::HashMap;

use rand::Rng;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use crate::catalog::{FactionCatalog, UnitRole};
use crate::entities::{EntityId, EntityStore, LarvaPhase, Unit, UnitKind};
use crate::error::{Result, SimError};
use crate::events::SimEvent;
use crate::math::{compass_direction, fixed_serde, Fixed};
use crate::production::{ProducerKey, ProductionScheduler, Progress, QueueItem, UnitOrder};
use crate::resources::ResourceLedger;

/// Tuning knobs for larva spawning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LarvaConfig {
    /// Free larvae a hatchery keeps alive at most.
    pub larva_max: u32,
    /// Seconds between spawns while below `larva_max`.
    #[serde(with = "fixed_serde")]
    pub spawn_interval: Fixed,
    /// Inner radius of the ring larvae spawn on.
    #[serde(with = "fixed_serde")]
    pub spawn_radius_min: Fixed,
    /// Outer radius of the ring larvae spawn on.
    #[serde(with = "fixed_serde")]
    pub spawn_radius_max: Fixed,
    /// Health of a fresh larva.
    pub larva_health: u32,
}

impl Default for LarvaConfig {
    fn default() -> Self {
        Self {
            larva_max: 3,
            spawn_interval: Fixed::from_num(30),
            spawn_radius_min: Fixed::from_num(6),
            spawn_radius_max: Fixed::from_num(8),
            larva_health: 25,
        }
    }
}

/// Free larvae and spawn timing for one hatchery.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct HatcheryState {
    larvae: Vec<EntityId>,
    #[serde(with = "fixed_serde")]
    last_spawn: Fixed,
}

/// Larva spawning plus the evolution entry point.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LarvaSystem {
    /// Larva tuning, fixed for the lifetime of a match.
    pub config: LarvaConfig,
    registry: HashMap<EntityId, HatcheryState>,
}

impl LarvaSystem {
    /// Create a larva system with the given tuning.
    #[must_use]
    pub fn new(config: LarvaConfig) -> Self {
        Self {
            config,
            registry: HashMap::new(),
        }
    }

    /// Overwrite a hatchery's registry entry (snapshot restore only).
    pub(crate) fn restore_hatchery(
        &mut self,
        hatchery: EntityId,
        larvae: Vec<EntityId>,
        last_spawn: Fixed,
    ) {
        self.registry
            .insert(hatchery, HatcheryState { larvae, last_spawn });
    }

    /// All hatcheries with registry entries, and their state, in id order.
    pub(crate) fn registry_entries(&self) -> Vec<(EntityId, &[EntityId], Fixed)> {
        let mut entries: Vec<_> = self
            .registry
            .iter()
            .map(|(&h, s)| (h, s.larvae.as_slice(), s.last_spawn))
            .collect();
        entries.sort_unstable_by_key(|(h, _, _)| *h);
        entries
    }

    /// Free larvae currently registered to a hatchery, in spawn order.
    #[must_use]
    pub fn larvae_of(&self, hatchery: EntityId) -> &[EntityId] {
        self.registry
            .get(&hatchery)
            .map_or(&[], |s| s.larvae.as_slice())
    }

    /// Drop a unit from every hatchery's free list. Idempotent.
    pub fn purge_unit(&mut self, unit: EntityId) {
        for state in self.registry.values_mut() {
            state.larvae.retain(|&id| id != unit);
        }
    }

    /// Drop a hatchery's registry entry entirely.
    pub fn purge_hatchery(&mut self, hatchery: EntityId) {
        self.registry.remove(&hatchery);
    }

    /// Spawn the starting pool of larvae around a fresh hatchery.
    pub fn spawn_initial_larvae(
        &mut self,
        hatchery: EntityId,
        now: Fixed,
        entities: &mut EntityStore,
        rng: &mut Pcg32,
        events: &mut Vec<SimEvent>,
    ) {
        for _ in 0..self.config.larva_max {
            self.spawn_one(hatchery, now, entities, rng, events);
        }
    }

    /// Periodic spawning step, run once per tick with the elapsed time.
    pub fn update_spawning(
        &mut self,
        now: Fixed,
        entities: &mut EntityStore,
        rng: &mut Pcg32,
        events: &mut Vec<SimEvent>,
    ) {
        let hatcheries =
            entities.complete_buildings(crate::catalog::BuildingKind::Headquarters);
        for hatchery in hatcheries {
            // Prune larvae that died or were removed since last tick.
            if let Some(state) = self.registry.get_mut(&hatchery) {
                state
                    .larvae
                    .retain(|&id| entities.unit(id).is_some_and(Unit::is_free_larva));
            } else {
                // First time we see this hatchery: it just finished
                // construction, so seed its starting pool.
                self.spawn_initial_larvae(hatchery, now, entities, rng, events);
                continue;
            }

            let (count, last_spawn) = {
                let state = &self.registry[&hatchery];
                (state.larvae.len() as u32, state.last_spawn)
            };
            if count < self.config.larva_max && now - last_spawn >= self.config.spawn_interval {
                self.spawn_one(hatchery, now, entities, rng, events);
            }
        }
    }

    fn spawn_one(
        &mut self,
        hatchery: EntityId,
        now: Fixed,
        entities: &mut EntityStore,
        rng: &mut Pcg32,
        events: &mut Vec<SimEvent>,
    ) {
        let Some(anchor) = entities.building(hatchery).map(|b| b.position) else {
            return;
        };
        let span = self.config.spawn_radius_max - self.config.spawn_radius_min;
        let dir = compass_direction(rng.gen_range(0..8u64));
        let dist = self.config.spawn_radius_min
            + span * Fixed::from_num(rng.gen_range(0..256u32)) / 256;
        let position = anchor + dir.scaled(dist);

        let larva =
            entities.insert_unit(Unit::larva(position, self.config.larva_health, hatchery));
        let state = self.registry.entry(hatchery).or_default();
        state.larvae.push(larva);
        state.last_spawn = now;

        events.push(SimEvent::LarvaSpawned { hatchery, larva });
        tracing::trace!(hatchery, larva, "Larva spawned");
    }

    /// Turn a free larva into an egg and queue its hatch.
    ///
    /// Checks run in a fixed order and the first failure wins; on any
    /// failure the ledger, the larva, and the queue are untouched.
    #[allow(clippy::too_many_arguments)]
    pub fn evolve_larva(
        &mut self,
        larva: EntityId,
        target: UnitRole,
        catalog: &FactionCatalog,
        entities: &mut EntityStore,
        ledger: &mut ResourceLedger,
        scheduler: &mut ProductionScheduler,
        events: &mut Vec<SimEvent>,
    ) -> Result<()> {
        let unit = entities.unit(larva).ok_or(SimError::LarvaNotFound(larva))?;
        let UnitKind::Larva(phase) = unit.kind else {
            return Err(SimError::LarvaNotFound(larva));
        };
        if phase != LarvaPhase::Free || !catalog.can_evolve_into(target) {
            return Err(SimError::InvalidEvolution(target));
        }
        let spec = catalog
            .unit(target)
            .ok_or(SimError::UnknownUnitType(target))?;
        if let Some(required) = spec.requires {
            if !entities.has_complete(required) {
                return Err(SimError::TechRequired(required));
            }
        }
        if !ledger.can_afford(spec.cost) {
            return Err(SimError::InsufficientResources {
                minerals: spec.cost.minerals,
                gas: spec.cost.gas,
            });
        }
        // Supply-granting targets are exempt from the cap check.
        if spec.supply_provided == 0 && !ledger.can_add_population(spec.population) {
            return Err(SimError::PopulationCapped {
                population: ledger.population,
                population_max: ledger.population_max,
            });
        }

        // All checks passed; from here every mutation must land.
        let hatchery = unit.parent_hatchery;
        ledger.spend(spec.cost);
        if spec.population > 0 {
            ledger.add_population(spec.population);
        }
        if let Some(u) = entities.unit_mut(larva) {
            u.kind = UnitKind::Larva(LarvaPhase::Evolving { target });
        }
        self.purge_unit(larva);

        let key = hatchery.map_or(ProducerKey::Global, ProducerKey::Entity);
        scheduler.enqueue(
            key,
            QueueItem::Unit(UnitOrder {
                role: target,
                name: spec.name.clone(),
                cost: spec.cost,
                population: spec.population,
                supply_provided: spec.supply_provided,
                health: spec.health,
                evolving_egg: Some(larva),
                progress: Progress::new(spec.build_time),
            }),
        );

        events.push(SimEvent::LarvaEvolutionStarted { larva, target });
        events.push(SimEvent::ProductionStarted {
            producer: hatchery.unwrap_or(0),
            name: spec.name.clone(),
        });
        tracing::debug!(larva, target = ?target, "Larva evolution started");
        Ok(())
    }

    /// Undo a cancelled evolution: the egg becomes a free larva again
    /// and rejoins its hatchery's pool.
    pub fn revert_egg(&mut self, egg: EntityId, entities: &mut EntityStore) {
        let Some(unit) = entities.unit_mut(egg) else {
            return;
        };
        if !unit.is_egg() {
            return;
        }
        unit.kind = UnitKind::Larva(LarvaPhase::Free);
        if let Some(hatchery) = unit.parent_hatchery {
            let state = self.registry.entry(hatchery).or_default();
            if !state.larvae.contains(&egg) {
                state.larvae.push(egg);
            }
        }
    }
}
