//! Production scheduler: unit training, building construction, hatching.
//!
//! Every order lives in a per-producer queue. Only the head of each
//! queue advances each tick, so two orders on one producer serialize
//! while orders on different producers run in parallel.

use std::collections::HashMap;

use rand::Rng;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use crate::catalog::{BuildingKind, FactionCatalog, ResourceCost, UnitRole};
use crate::entities::{EntityId, EntityStore, Unit, UnitState};
use crate::events::SimEvent;
use crate::factions::FactionId;
use crate::math::{compass_direction, fixed_serde, Fixed, Vec2Fixed};
use crate::nodes::ResourceNodeStore;
use crate::resources::ResourceLedger;

/// Completion tolerance for fixed-point progress comparisons.
const PROGRESS_EPSILON: Fixed = Fixed::from_bits(1 << 16);

/// Tuning knobs for production and spawn placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductionConfig {
    /// How close a constructing worker must stand to count as a builder.
    #[serde(with = "fixed_serde")]
    pub assist_range: Fixed,
    /// Inner radius of the ring new units spawn on.
    #[serde(with = "fixed_serde")]
    pub spawn_ring_min: Fixed,
    /// Outer radius of the ring new units spawn on.
    #[serde(with = "fixed_serde")]
    pub spawn_ring_max: Fixed,
    /// Minimum spacing from existing units before a spawn point is taken.
    #[serde(with = "fixed_serde")]
    pub min_spacing: Fixed,
    /// Placement attempts before accepting an overlapping point.
    pub spawn_retries: u32,
}

impl Default for ProductionConfig {
    fn default() -> Self {
        Self {
            assist_range: Fixed::from_num(6),
            spawn_ring_min: Fixed::from_num(2),
            spawn_ring_max: Fixed::from_num(4),
            min_spacing: Fixed::ONE,
            spawn_retries: 8,
        }
    }
}

/// Which queue an order belongs to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum ProducerKey {
    /// Orders bound to a specific building (or hatchery, for evolutions).
    Entity(EntityId),
    /// Orders with no producer, e.g. scripted spawns.
    Global,
}

/// Shared progress state for any queued order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Progress {
    /// Seconds of work done so far.
    #[serde(with = "fixed_serde")]
    pub progress: Fixed,
    /// Seconds of work required.
    #[serde(with = "fixed_serde")]
    pub build_time: Fixed,
    /// Work applied per second of wall time.
    #[serde(with = "fixed_serde")]
    pub speed_multiplier: Fixed,
    /// A paused order does not advance.
    pub paused: bool,
}

impl Progress {
    /// Fresh progress for an order of the given duration.
    #[must_use]
    pub fn new(build_time: Fixed) -> Self {
        Self {
            progress: Fixed::ZERO,
            build_time,
            speed_multiplier: Fixed::ONE,
            paused: false,
        }
    }

    /// Completion fraction in `[0, 1]`.
    #[must_use]
    pub fn ratio(&self) -> Fixed {
        if self.build_time <= Fixed::ZERO {
            return Fixed::ONE;
        }
        (self.progress / self.build_time).min(Fixed::ONE)
    }

    /// Advance by `dt` seconds. Returns `true` once complete.
    pub fn advance(&mut self, dt: Fixed) -> bool {
        if !self.paused {
            self.progress += dt * self.speed_multiplier;
        }
        self.progress + PROGRESS_EPSILON >= self.build_time
    }
}

/// A queued unit (or evolution) order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitOrder {
    /// Role to produce.
    pub role: UnitRole,
    /// Display name, for events.
    pub name: String,
    /// Cost paid up front; refunded on cancel.
    pub cost: ResourceCost,
    /// Population reserved at accept time; released on cancel.
    pub population: u32,
    /// Cap granted when the unit finishes.
    pub supply_provided: u32,
    /// Health of the finished unit.
    pub health: u32,
    /// The egg this order hatches, for evolutions.
    pub evolving_egg: Option<EntityId>,
    /// Progress state.
    pub progress: Progress,
}

/// A queued building order, bound to an already-placed site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildingOrder {
    /// The placed construction site.
    pub site: EntityId,
    /// Kind under construction.
    pub kind: BuildingKind,
    /// Display name, for events.
    pub name: String,
    /// Cost paid up front; refunded on cancel.
    pub cost: ResourceCost,
    /// Progress state.
    pub progress: Progress,
}

/// One entry in a production queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum QueueItem {
    /// Train or hatch a unit.
    Unit(UnitOrder),
    /// Finish a placed building.
    Building(BuildingOrder),
}

impl QueueItem {
    /// Display name of the ordered thing.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Unit(o) => &o.name,
            Self::Building(o) => &o.name,
        }
    }

    /// Cost refunded if this order is cancelled.
    #[must_use]
    pub const fn cost(&self) -> ResourceCost {
        match self {
            Self::Unit(o) => o.cost,
            Self::Building(o) => o.cost,
        }
    }

    /// Shared progress state.
    #[must_use]
    pub const fn progress(&self) -> &Progress {
        match self {
            Self::Unit(o) => &o.progress,
            Self::Building(o) => &o.progress,
        }
    }

    fn progress_mut(&mut self) -> &mut Progress {
        match self {
            Self::Unit(o) => &mut o.progress,
            Self::Building(o) => &mut o.progress,
        }
    }
}

/// Per-producer order queues plus the per-tick advancement step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductionScheduler {
    /// Production tuning, fixed for the lifetime of a match.
    pub config: ProductionConfig,
    queues: HashMap<ProducerKey, Vec<QueueItem>>,
}

impl ProductionScheduler {
    /// Create a scheduler with the given tuning.
    #[must_use]
    pub fn new(config: ProductionConfig) -> Self {
        Self {
            config,
            queues: HashMap::new(),
        }
    }

    /// Append an order to a producer's queue with zero progress.
    pub fn enqueue(&mut self, key: ProducerKey, mut item: QueueItem) {
        let progress = item.progress_mut();
        progress.progress = Fixed::ZERO;
        progress.paused = false;
        self.queues.entry(key).or_default().push(item);
    }

    /// Overwrite a producer's queue wholesale (snapshot restore only).
    pub(crate) fn restore_queue(&mut self, key: ProducerKey, items: Vec<QueueItem>) {
        if items.is_empty() {
            self.queues.remove(&key);
        } else {
            self.queues.insert(key, items);
        }
    }

    /// The queue for a producer, head first.
    #[must_use]
    pub fn queue(&self, key: ProducerKey) -> &[QueueItem] {
        self.queues.get(&key).map_or(&[], Vec::as_slice)
    }

    /// Remove an order by position without refunding anything.
    ///
    /// Refunds, population release, and egg reversal are the caller's
    /// job; the world-level cancel does all three.
    pub fn remove_at(&mut self, key: ProducerKey, index: usize) -> Option<QueueItem> {
        let queue = self.queues.get_mut(&key)?;
        if index >= queue.len() {
            return None;
        }
        let item = queue.remove(index);
        if queue.is_empty() {
            self.queues.remove(&key);
        }
        Some(item)
    }

    /// Drop every queue owned by a producer, returning the orders.
    pub fn remove_producer(&mut self, key: ProducerKey) -> Vec<QueueItem> {
        self.queues.remove(&key).unwrap_or_default()
    }

    /// Remove the evolution order bound to `egg`, wherever it sits.
    ///
    /// Refunds and population release are the caller's job, as with
    /// [`Self::remove_at`].
    pub fn remove_evolution(&mut self, egg: EntityId) -> Option<(ProducerKey, UnitOrder)> {
        for key in self.sorted_keys() {
            let Some(queue) = self.queues.get_mut(&key) else {
                continue;
            };
            let Some(index) = queue.iter().position(
                |item| matches!(item, QueueItem::Unit(o) if o.evolving_egg == Some(egg)),
            ) else {
                continue;
            };
            let item = queue.remove(index);
            if queue.is_empty() {
                self.queues.remove(&key);
            }
            if let QueueItem::Unit(order) = item {
                return Some((key, order));
            }
        }
        None
    }

    /// Total queued orders across all producers.
    #[must_use]
    pub fn total_queued(&self) -> usize {
        self.queues.values().map(Vec::len).sum()
    }

    /// Producer keys in deterministic order.
    #[must_use]
    pub fn sorted_keys(&self) -> Vec<ProducerKey> {
        let mut keys: Vec<_> = self.queues.keys().copied().collect();
        keys.sort_unstable();
        keys
    }

    /// Advance the head order of every queue by `dt` seconds.
    #[allow(clippy::too_many_arguments)]
    pub fn tick(
        &mut self,
        dt: Fixed,
        faction: FactionId,
        catalog: &FactionCatalog,
        entities: &mut EntityStore,
        nodes: &mut ResourceNodeStore,
        ledger: &mut ResourceLedger,
        rng: &mut Pcg32,
        events: &mut Vec<SimEvent>,
    ) {
        for key in self.sorted_keys() {
            let Some(queue) = self.queues.get_mut(&key) else {
                continue;
            };
            let Some(head) = queue.first_mut() else {
                continue;
            };

            if let QueueItem::Building(order) = head {
                if faction.builders_assist() {
                    Self::retune_build_speed(&self.config, order, entities);
                }
            }

            if !head.progress_mut().advance(dt) {
                continue;
            }

            let Some(done) = self.remove_at(key, 0) else {
                continue;
            };
            match done {
                QueueItem::Unit(order) => {
                    Self::complete_unit(
                        &self.config,
                        key,
                        &order,
                        catalog,
                        entities,
                        ledger,
                        rng,
                        events,
                    );
                }
                QueueItem::Building(order) => {
                    Self::complete_building(key, &order, faction, entities, nodes, ledger, events);
                }
            }
        }
    }

    /// Recompute pause/speed for a Vanguard building order from the
    /// workers actually standing at the site.
    fn retune_build_speed(
        config: &ProductionConfig,
        order: &mut BuildingOrder,
        entities: &EntityStore,
    ) {
        let Some(site) = entities.building(order.site) else {
            order.progress.paused = true;
            return;
        };
        let builders = entities
            .constructing_workers(order.site)
            .into_iter()
            .filter_map(|id| entities.unit(id))
            .filter(|u| u.position.within_range(site.position, config.assist_range))
            .count() as u32;
        if builders == 0 {
            order.progress.paused = true;
            order.progress.speed_multiplier = Fixed::ZERO;
        } else {
            order.progress.paused = false;
            // 1 + 0.5 per extra builder.
            order.progress.speed_multiplier =
                Fixed::ONE + Fixed::from_num(builders - 1) * Fixed::from_num(0.5);
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn complete_unit(
        config: &ProductionConfig,
        key: ProducerKey,
        order: &UnitOrder,
        catalog: &FactionCatalog,
        entities: &mut EntityStore,
        ledger: &mut ResourceLedger,
        rng: &mut Pcg32,
        events: &mut Vec<SimEvent>,
    ) {
        let producer = match key {
            ProducerKey::Entity(id) => id,
            ProducerKey::Global => 0,
        };

        let position = match order.evolving_egg {
            Some(egg) => {
                // Hatch exactly where the egg sat. If the egg died
                // mid-evolution the order dies with it: nothing hatches,
                // the spent cost stays lost, the reservation comes back.
                let Some(pos) = entities.unit(egg).map(|u| u.position) else {
                    ledger.release_population(order.population);
                    return;
                };
                entities.remove_unit(egg);
                pos
            }
            None => {
                let anchor = entities
                    .building(producer)
                    .map(|b| b.position)
                    .or_else(|| entities.nearest_base(Vec2Fixed::ZERO).map(|b| b.position))
                    .unwrap_or(Vec2Fixed::ZERO);
                Self::spawn_point(config, anchor, entities, rng)
            }
        };

        let Some(spec) = catalog.unit(order.role) else {
            // Catalog drift between enqueue and completion; drop the
            // order but give the reservation back.
            ledger.refund(order.cost);
            ledger.release_population(order.population);
            return;
        };
        let unit = entities.insert_unit(Unit::from_spec(spec, position));

        if order.supply_provided > 0 {
            ledger.raise_population_max(order.supply_provided);
            events.push(SimEvent::PopulationChanged {
                population: ledger.population,
                population_max: ledger.population_max,
            });
        }

        if let Some(egg) = order.evolving_egg {
            events.push(SimEvent::EggHatched {
                egg,
                unit,
                role: order.role,
            });
        }
        events.push(SimEvent::ProductionCompleted {
            producer,
            name: order.name.clone(),
        });
        events.push(SimEvent::UnitAdded {
            unit,
            role: order.role,
        });
        tracing::debug!(unit, role = ?order.role, "Unit production complete");
    }

    fn complete_building(
        key: ProducerKey,
        order: &BuildingOrder,
        faction: FactionId,
        entities: &mut EntityStore,
        nodes: &mut ResourceNodeStore,
        ledger: &mut ResourceLedger,
        events: &mut Vec<SimEvent>,
    ) {
        let producer = match key {
            ProducerKey::Entity(id) => id,
            ProducerKey::Global => 0,
        };

        let Some(site) = entities.building_mut(order.site) else {
            ledger.refund(order.cost);
            return;
        };
        site.is_complete = true;
        let site_pos = site.position;
        let supply = site.supply_provided;

        if supply > 0 {
            ledger.raise_population_max(supply);
            events.push(SimEvent::PopulationChanged {
                population: ledger.population,
                population_max: ledger.population_max,
            });
        }

        if order.kind == BuildingKind::Extractor {
            if let Some(geyser) = nodes.geyser_at(site_pos, Fixed::from_num(2)) {
                nodes.set_extractor(geyser, true);
            }
        }

        if faction.builders_assist() {
            for id in entities.constructing_workers(order.site) {
                if let Some(worker) = entities.unit_mut(id) {
                    worker.state = UnitState::Idle;
                }
            }
        }

        events.push(SimEvent::BuildingCompleted {
            building: order.site,
            kind: order.kind,
        });
        events.push(SimEvent::ProductionCompleted {
            producer,
            name: order.name.clone(),
        });
        tracing::debug!(building = order.site, kind = ?order.kind, "Construction complete");
    }

    /// Ring-sample a spawn point around `anchor`, retrying a bounded
    /// number of times to avoid stacking on existing units.
    fn spawn_point(
        config: &ProductionConfig,
        anchor: Vec2Fixed,
        entities: &EntityStore,
        rng: &mut Pcg32,
    ) -> Vec2Fixed {
        let span = config.spawn_ring_max - config.spawn_ring_min;
        let mut candidate = anchor;
        for _ in 0..config.spawn_retries.max(1) {
            let dir = compass_direction(rng.gen_range(0..8u64));
            let dist =
                config.spawn_ring_min + span * Fixed::from_num(rng.gen_range(0..256u32)) / 256;
            candidate = anchor + dir.scaled(dist);
            let clear = entities
                .units()
                .all(|u| !u.position.within_range(candidate, config.min_spacing));
            if clear {
                return candidate;
            }
        }
        candidate
    }
}

/// Build a unit order from its catalog entry.
#[must_use]
pub fn unit_order(catalog: &FactionCatalog, role: UnitRole) -> Option<UnitOrder> {
    let spec = catalog.unit(role)?;
    Some(UnitOrder {
        role,
        name: spec.name.clone(),
        cost: spec.cost,
        population: spec.population,
        supply_provided: spec.supply_provided,
        health: spec.health,
        evolving_egg: None,
        progress: Progress::new(spec.build_time),
    })
}

/// Build a building order from its catalog entry and a placed site.
#[must_use]
pub fn building_order(
    catalog: &FactionCatalog,
    kind: BuildingKind,
    site: EntityId,
) -> Option<BuildingOrder> {
    let spec = catalog.building(kind)?;
    Some(BuildingOrder {
        site,
        kind,
        name: spec.name.clone(),
        cost: spec.cost,
        progress: Progress::new(spec.build_time),
    })
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;

    use super::*;
    use crate::entities::Building;

    fn pos(x: i32, z: i32) -> Vec2Fixed {
        Vec2Fixed::new(Fixed::from_num(x), Fixed::from_num(z))
    }

    struct Fixture {
        scheduler: ProductionScheduler,
        catalog: FactionCatalog,
        entities: EntityStore,
        nodes: ResourceNodeStore,
        ledger: ResourceLedger,
        rng: Pcg32,
        events: Vec<SimEvent>,
    }

    fn fixture(faction: FactionId) -> Fixture {
        Fixture {
            scheduler: ProductionScheduler::default(),
            catalog: FactionCatalog::for_faction(faction),
            entities: EntityStore::new(),
            nodes: ResourceNodeStore::new(),
            ledger: ResourceLedger::new(1000, 500, 20),
            rng: Pcg32::seed_from_u64(11),
            events: Vec::new(),
        }
    }

    fn run(fx: &mut Fixture, faction: FactionId, seconds: i32, step: Fixed) {
        let mut elapsed = Fixed::ZERO;
        let total = Fixed::from_num(seconds);
        while elapsed < total {
            fx.scheduler.tick(
                step,
                faction,
                &fx.catalog,
                &mut fx.entities,
                &mut fx.nodes,
                &mut fx.ledger,
                &mut fx.rng,
                &mut fx.events,
            );
            elapsed += step;
        }
    }

    #[test]
    fn test_ratio_tracks_progress_and_caps_at_one() {
        let mut p = Progress::new(Fixed::from_num(10));
        assert_eq!(p.ratio(), Fixed::ZERO);
        p.advance(Fixed::from_num(5));
        assert_eq!(p.ratio(), Fixed::from_num(0.5));
        p.advance(Fixed::from_num(20));
        assert_eq!(p.ratio(), Fixed::ONE);
        // Instant orders read as done.
        assert_eq!(Progress::new(Fixed::ZERO).ratio(), Fixed::ONE);
    }

    #[test]
    fn test_remove_evolution_pulls_the_bound_order() {
        let mut fx = fixture(FactionId::Swarm);
        let hatchery = fx.entities.insert_building(Building::completed(
            BuildingKind::Headquarters,
            pos(0, 0),
            1500,
            10,
        ));
        let key = ProducerKey::Entity(hatchery);
        let mut order = unit_order(&fx.catalog, UnitRole::Worker).unwrap();
        order.evolving_egg = Some(777);
        fx.scheduler.enqueue(key, QueueItem::Unit(order));
        let plain = unit_order(&fx.catalog, UnitRole::Worker).unwrap();
        fx.scheduler.enqueue(key, QueueItem::Unit(plain));

        let (found_key, found) = fx.scheduler.remove_evolution(777).unwrap();
        assert_eq!(found_key, key);
        assert_eq!(found.evolving_egg, Some(777));
        assert_eq!(fx.scheduler.queue(key).len(), 1);
        assert!(fx.scheduler.remove_evolution(777).is_none());
    }

    #[test]
    fn test_only_head_order_advances() {
        let mut fx = fixture(FactionId::Vanguard);
        let barracks = fx.entities.insert_building(Building::completed(
            BuildingKind::Barracks,
            pos(0, 0),
            1000,
            0,
        ));
        let key = ProducerKey::Entity(barracks);
        let order = unit_order(&fx.catalog, UnitRole::Melee).unwrap();
        fx.scheduler.enqueue(key, QueueItem::Unit(order.clone()));
        fx.scheduler.enqueue(key, QueueItem::Unit(order));

        fx.scheduler.tick(
            Fixed::ONE,
            FactionId::Vanguard,
            &fx.catalog,
            &mut fx.entities,
            &mut fx.nodes,
            &mut fx.ledger,
            &mut fx.rng,
            &mut fx.events,
        );

        let queue = fx.scheduler.queue(key);
        assert_eq!(queue[0].progress().progress, Fixed::ONE);
        assert_eq!(queue[1].progress().progress, Fixed::ZERO);
    }

    #[test]
    fn test_unit_completes_after_build_time() {
        let mut fx = fixture(FactionId::Vanguard);
        let barracks = fx.entities.insert_building(Building::completed(
            BuildingKind::Barracks,
            pos(0, 0),
            1000,
            0,
        ));
        let key = ProducerKey::Entity(barracks);
        let order = unit_order(&fx.catalog, UnitRole::Melee).unwrap();
        let build_time = order.progress.build_time;
        fx.scheduler.enqueue(key, QueueItem::Unit(order));

        run(
            &mut fx,
            FactionId::Vanguard,
            build_time.to_num::<i32>() + 1,
            Fixed::from_num(0.25),
        );

        assert_eq!(fx.scheduler.total_queued(), 0);
        assert_eq!(fx.entities.unit_count(), 1);
        assert!(fx
            .events
            .iter()
            .any(|e| matches!(e, SimEvent::UnitAdded { .. })));
    }

    #[test]
    fn test_building_paused_without_builders() {
        let mut fx = fixture(FactionId::Vanguard);
        let site = fx.entities.insert_building(Building::under_construction(
            BuildingKind::Barracks,
            pos(10, 0),
            1000,
            0,
        ));
        let order = building_order(&fx.catalog, BuildingKind::Barracks, site).unwrap();
        fx.scheduler
            .enqueue(ProducerKey::Entity(site), QueueItem::Building(order));

        run(&mut fx, FactionId::Vanguard, 10, Fixed::ONE);

        let queue = fx.scheduler.queue(ProducerKey::Entity(site));
        assert_eq!(queue.len(), 1);
        assert_eq!(queue[0].progress().progress, Fixed::ZERO);
        assert!(!fx.entities.building(site).unwrap().is_complete);
    }

    #[test]
    fn test_two_builders_give_one_and_a_half_speed() {
        let mut fx = fixture(FactionId::Vanguard);
        let site = fx.entities.insert_building(Building::under_construction(
            BuildingKind::Barracks,
            pos(10, 0),
            1000,
            0,
        ));
        let worker_spec = fx.catalog.unit(UnitRole::Worker).unwrap().clone();
        for _ in 0..2 {
            let w = fx
                .entities
                .insert_unit(Unit::from_spec(&worker_spec, pos(10, 1)));
            fx.entities.unit_mut(w).unwrap().state =
                UnitState::Constructing { building: site };
        }
        let order = building_order(&fx.catalog, BuildingKind::Barracks, site).unwrap();
        let build_time = order.progress.build_time;
        assert_eq!(build_time, Fixed::from_num(65));
        fx.scheduler
            .enqueue(ProducerKey::Entity(site), QueueItem::Building(order));

        // At x1.5 the 65s build finishes near 43.3s: not yet done at 43,
        // done by 44.
        run(&mut fx, FactionId::Vanguard, 43, Fixed::from_num(0.1));
        assert!(!fx.entities.building(site).unwrap().is_complete);
        run(&mut fx, FactionId::Vanguard, 1, Fixed::from_num(0.1));
        assert!(fx.entities.building(site).unwrap().is_complete);

        // Completion releases the builders.
        assert!(fx
            .entities
            .units()
            .all(|u| u.state == UnitState::Idle));
    }

    #[test]
    fn test_extractor_completion_covers_geyser() {
        let mut fx = fixture(FactionId::Vanguard);
        let geyser = fx.nodes.add_gas_geyser(pos(20, 0), Fixed::from_num(500));
        let site = fx.entities.insert_building(Building::under_construction(
            BuildingKind::Extractor,
            pos(20, 0),
            500,
            0,
        ));
        let worker_spec = fx.catalog.unit(UnitRole::Worker).unwrap().clone();
        let w = fx
            .entities
            .insert_unit(Unit::from_spec(&worker_spec, pos(20, 1)));
        fx.entities.unit_mut(w).unwrap().state = UnitState::Constructing { building: site };
        let order = building_order(&fx.catalog, BuildingKind::Extractor, site).unwrap();
        fx.scheduler
            .enqueue(ProducerKey::Entity(site), QueueItem::Building(order));

        run(&mut fx, FactionId::Vanguard, 40, Fixed::from_num(0.5));

        assert!(fx.entities.building(site).unwrap().is_complete);
        assert!(fx.nodes.get(geyser).unwrap().is_harvestable());
    }

    #[test]
    fn test_supply_unit_raises_population_max() {
        let mut fx = fixture(FactionId::Swarm);
        let hatchery = fx.entities.insert_building(Building::completed(
            BuildingKind::Headquarters,
            pos(0, 0),
            1250,
            10,
        ));
        let before = fx.ledger.population_max;
        let order = unit_order(&fx.catalog, UnitRole::Supply).unwrap();
        assert!(order.supply_provided > 0);
        let supply = order.supply_provided;
        fx.scheduler
            .enqueue(ProducerKey::Entity(hatchery), QueueItem::Unit(order));

        run(&mut fx, FactionId::Swarm, 30, Fixed::ONE);

        assert_eq!(fx.ledger.population_max, before + supply);
    }

    #[test]
    fn test_remove_at_returns_order_untouched() {
        let mut fx = fixture(FactionId::Vanguard);
        let key = ProducerKey::Global;
        let order = unit_order(&fx.catalog, UnitRole::Worker).unwrap();
        let cost = order.cost;
        fx.scheduler.enqueue(key, QueueItem::Unit(order));

        let removed = fx.scheduler.remove_at(key, 0).unwrap();
        assert_eq!(removed.cost(), cost);
        assert_eq!(fx.scheduler.total_queued(), 0);
        assert!(fx.scheduler.remove_at(key, 0).is_none());
    }
}
