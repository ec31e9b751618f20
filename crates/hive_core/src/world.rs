//! The simulation world: owned state, the command API, and the tick.
//!
//! All commands validate first and mutate only after every check has
//! passed, so a failed command leaves the world exactly as it was.
//! Tick order is fixed: gather, then production, then larva spawning.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use rand::SeedableRng;
use rand_pcg::Pcg32;

use crate::catalog::{BuildingKind, FactionCatalog, UnitRole};
use crate::entities::{Building, EntityId, EntityStore, Unit, UnitState};
use crate::error::{Result, SimError};
use crate::events::{EventSink, SimEvent};
use crate::factions::FactionId;
use crate::gather::GatherSystem;
use crate::larva::LarvaSystem;
use crate::math::{Fixed, Vec2Fixed};
use crate::nodes::{NodeId, ResourceNodeStore};
use crate::production::{
    building_order, unit_order, ProducerKey, ProductionScheduler, QueueItem,
};
use crate::resources::ResourceLedger;

/// Starting mineral stockpile for a fresh match.
pub const STARTING_MINERALS: i32 = 50;
/// Workers seeded around the starting base.
pub const STARTING_WORKERS: u32 = 4;

/// The complete simulation state for one side of a match.
#[derive(Debug, Clone)]
pub struct SimulationWorld {
    pub(crate) faction: FactionId,
    pub(crate) elapsed: Fixed,
    pub(crate) tick_count: u64,
    pub(crate) ledger: ResourceLedger,
    pub(crate) catalog: FactionCatalog,
    pub(crate) entities: EntityStore,
    pub(crate) nodes: ResourceNodeStore,
    pub(crate) gather: GatherSystem,
    pub(crate) scheduler: ProductionScheduler,
    pub(crate) larva: LarvaSystem,
    pub(crate) rng: Pcg32,
    pub(crate) pending_events: Vec<SimEvent>,
}

impl SimulationWorld {
    /// Create an empty world for a faction with a deterministic seed.
    #[must_use]
    pub fn new(faction: FactionId, seed: u64) -> Self {
        Self {
            faction,
            elapsed: Fixed::ZERO,
            tick_count: 0,
            ledger: ResourceLedger::new(STARTING_MINERALS, 0, 0),
            catalog: FactionCatalog::for_faction(faction),
            entities: EntityStore::new(),
            nodes: ResourceNodeStore::new(),
            gather: GatherSystem::default(),
            scheduler: ProductionScheduler::default(),
            larva: LarvaSystem::default(),
            rng: Pcg32::seed_from_u64(seed),
            pending_events: Vec::new(),
        }
    }

    /// Faction this world simulates.
    #[must_use]
    pub const fn faction(&self) -> FactionId {
        self.faction
    }

    /// Seconds of simulated time so far.
    #[must_use]
    pub const fn elapsed(&self) -> Fixed {
        self.elapsed
    }

    /// Ticks processed so far.
    #[must_use]
    pub const fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Resource and population state.
    #[must_use]
    pub const fn ledger(&self) -> &ResourceLedger {
        &self.ledger
    }

    /// Static faction definitions.
    #[must_use]
    pub const fn catalog(&self) -> &FactionCatalog {
        &self.catalog
    }

    /// All units and buildings.
    #[must_use]
    pub const fn entities(&self) -> &EntityStore {
        &self.entities
    }

    /// Mutable entity access, for the external locomotion stepper.
    pub fn entities_mut(&mut self) -> &mut EntityStore {
        &mut self.entities
    }

    /// All resource nodes.
    #[must_use]
    pub const fn nodes(&self) -> &ResourceNodeStore {
        &self.nodes
    }

    /// Mutable node access, for map setup.
    pub fn nodes_mut(&mut self) -> &mut ResourceNodeStore {
        &mut self.nodes
    }

    /// The gather system (assignment lists, destinations).
    #[must_use]
    pub const fn gather(&self) -> &GatherSystem {
        &self.gather
    }

    /// The production scheduler (queues).
    #[must_use]
    pub const fn scheduler(&self) -> &ProductionScheduler {
        &self.scheduler
    }

    /// The larva subsystem (Swarm only).
    #[must_use]
    pub const fn larva(&self) -> &LarvaSystem {
        &self.larva
    }

    /// Seed a completed base with starting workers (and, for the
    /// Swarm, the initial larva pool) at `position`.
    pub fn spawn_starting_base(&mut self, position: Vec2Fixed) -> Result<EntityId> {
        let hq = self
            .catalog
            .building(BuildingKind::Headquarters)
            .ok_or(SimError::TechRequired(BuildingKind::Headquarters))?
            .clone();
        let base = self.entities.insert_building(Building::completed(
            BuildingKind::Headquarters,
            position,
            hq.health,
            hq.supply_provided,
        ));
        self.ledger.raise_population_max(hq.supply_provided);
        self.pending_events.push(SimEvent::BuildingAdded {
            building: base,
            kind: BuildingKind::Headquarters,
        });

        let worker = self
            .catalog
            .unit(UnitRole::Worker)
            .ok_or(SimError::UnknownUnitType(UnitRole::Worker))?
            .clone();
        for i in 0..STARTING_WORKERS {
            let offset = crate::math::compass_direction(u64::from(i))
                .scaled(Fixed::from_num(3));
            let id = self
                .entities
                .insert_unit(Unit::from_spec(&worker, position + offset));
            self.ledger.add_population(worker.population);
            self.pending_events.push(SimEvent::UnitAdded {
                unit: id,
                role: UnitRole::Worker,
            });
        }

        if self.faction.uses_larvae() {
            self.larva.spawn_initial_larvae(
                base,
                self.elapsed,
                &mut self.entities,
                &mut self.rng,
                &mut self.pending_events,
            );
        }
        Ok(base)
    }

    /// Place a construction site and queue its build.
    ///
    /// Pays the cost up front. For Vanguard the site sits paused until
    /// a worker is ordered onto it; passing `builder` does that
    /// immediately.
    pub fn build_structure(
        &mut self,
        kind: BuildingKind,
        position: Vec2Fixed,
        builder: Option<EntityId>,
    ) -> Result<EntityId> {
        let spec = self
            .catalog
            .building(kind)
            .ok_or_else(|| SimError::InvalidTarget(format!("no such building {kind:?}")))?
            .clone();
        if kind == BuildingKind::Extractor {
            let geyser = self
                .nodes
                .geyser_at(position, Fixed::from_num(2))
                .ok_or_else(|| {
                    SimError::InvalidTarget("extractor must sit on a geyser".into())
                })?;
            let covered = matches!(
                self.nodes.get(geyser).map(|n| n.kind),
                Some(crate::nodes::NodeKind::GasGeyser { has_extractor: true })
            );
            if covered {
                return Err(SimError::InvalidTarget(
                    "geyser already has an extractor".into(),
                ));
            }
        }
        if let Some(id) = builder {
            let unit = self.entities.unit(id).ok_or(SimError::EntityNotFound(id))?;
            if !unit.is_worker() {
                return Err(SimError::InvalidTarget(format!("unit {id} cannot build")));
            }
        }
        if !self.ledger.can_afford(spec.cost) {
            return Err(SimError::InsufficientResources {
                minerals: spec.cost.minerals,
                gas: spec.cost.gas,
            });
        }

        self.ledger.spend(spec.cost);
        let site = self.entities.insert_building(Building::under_construction(
            kind,
            position,
            spec.health,
            spec.supply_provided,
        ));
        let order = building_order(&self.catalog, kind, site)
            .ok_or_else(|| SimError::InvalidTarget(format!("no such building {kind:?}")))?;
        self.scheduler
            .enqueue(ProducerKey::Entity(site), QueueItem::Building(order));

        if let Some(id) = builder {
            self.gather.unassign(id);
            if let Some(unit) = self.entities.unit_mut(id) {
                unit.state = UnitState::Constructing { building: site };
            }
        }

        self.pending_events.push(SimEvent::BuildingAdded {
            building: site,
            kind,
        });
        self.pending_events.push(SimEvent::ProductionStarted {
            producer: site,
            name: spec.name.clone(),
        });
        self.push_ledger_events();
        Ok(site)
    }

    /// Queue a unit at a completed producer building.
    pub fn produce_unit(&mut self, producer: EntityId, role: UnitRole) -> Result<()> {
        let building = self
            .entities
            .building(producer)
            .ok_or(SimError::EntityNotFound(producer))?;
        if !building.is_complete {
            return Err(SimError::InvalidState(format!(
                "building {producer} is still under construction"
            )));
        }
        let building_spec = self
            .catalog
            .building(building.kind)
            .ok_or_else(|| SimError::InvalidTarget(format!("no such building {:?}", building.kind)))?;
        if !building_spec.can_produce(role) {
            return Err(SimError::InvalidTarget(format!(
                "{} cannot produce {role:?}",
                building_spec.name
            )));
        }
        let spec = self
            .catalog
            .unit(role)
            .ok_or(SimError::UnknownUnitType(role))?;
        if let Some(required) = spec.requires {
            if !self.entities.has_complete(required) {
                return Err(SimError::TechRequired(required));
            }
        }
        if !self.ledger.can_afford(spec.cost) {
            return Err(SimError::InsufficientResources {
                minerals: spec.cost.minerals,
                gas: spec.cost.gas,
            });
        }
        if spec.supply_provided == 0 && !self.ledger.can_add_population(spec.population) {
            return Err(SimError::PopulationCapped {
                population: self.ledger.population,
                population_max: self.ledger.population_max,
            });
        }

        let name = spec.name.clone();
        let population = spec.population;
        let order = unit_order(&self.catalog, role)
            .ok_or(SimError::UnknownUnitType(role))?;
        self.ledger.spend(order.cost);
        if population > 0 {
            self.ledger.add_population(population);
        }
        self.scheduler
            .enqueue(ProducerKey::Entity(producer), QueueItem::Unit(order));

        self.pending_events.push(SimEvent::ProductionStarted { producer, name });
        self.push_ledger_events();
        Ok(())
    }

    /// Bind a worker to a mineral patch (auto-picked when `node` is
    /// `None`).
    pub fn assign_worker_to_minerals(
        &mut self,
        worker: EntityId,
        node: Option<NodeId>,
    ) -> Result<NodeId> {
        self.gather.assign_to_minerals(
            &mut self.entities,
            &self.nodes,
            &mut self.rng,
            worker,
            node,
            &mut self.pending_events,
        )
    }

    /// Bind a worker to a covered gas geyser.
    pub fn assign_worker_to_gas(
        &mut self,
        worker: EntityId,
        node: Option<NodeId>,
    ) -> Result<NodeId> {
        self.gather.assign_to_gas(
            &mut self.entities,
            &self.nodes,
            &mut self.rng,
            worker,
            node,
            &mut self.pending_events,
        )
    }

    /// Start evolving a free larva into `target`.
    pub fn evolve_larva(&mut self, larva: EntityId, target: UnitRole) -> Result<()> {
        if !self.faction.uses_larvae() {
            return Err(SimError::InvalidState(
                "this faction does not evolve larvae".into(),
            ));
        }
        self.larva.evolve_larva(
            larva,
            target,
            &self.catalog,
            &mut self.entities,
            &mut self.ledger,
            &mut self.scheduler,
            &mut self.pending_events,
        )
    }

    /// Cancel a queued order, refunding its cost and releasing its
    /// population reservation. Cancelled evolutions revert the egg to a
    /// free larva; cancelled constructions remove the site.
    pub fn cancel_queue_item(&mut self, key: ProducerKey, index: usize) -> Result<()> {
        let item = self
            .scheduler
            .remove_at(key, index)
            .ok_or_else(|| SimError::InvalidTarget("no queued order at that position".into()))?;
        self.ledger.refund(item.cost());
        let name = item.name().to_owned();
        match item {
            QueueItem::Unit(order) => {
                self.ledger.release_population(order.population);
                if let Some(egg) = order.evolving_egg {
                    self.larva.revert_egg(egg, &mut self.entities);
                }
            }
            QueueItem::Building(order) => {
                if self.entities.remove_building(order.site).is_some() {
                    // Free any Vanguard builders still standing there.
                    for id in self.entities.sorted_unit_ids() {
                        if let Some(unit) = self.entities.unit_mut(id) {
                            if unit.state == (UnitState::Constructing { building: order.site }) {
                                unit.state = UnitState::Idle;
                            }
                        }
                    }
                    self.pending_events.push(SimEvent::BuildingRemoved {
                        building: order.site,
                    });
                }
            }
        }
        self.pending_events.push(SimEvent::ProductionCancelled {
            producer: match key {
                ProducerKey::Entity(id) => id,
                ProducerKey::Global => 0,
            },
            name,
        });
        self.push_ledger_events();
        Ok(())
    }

    /// Send a unit to a point, overriding any gather assignment.
    pub fn command_move(&mut self, unit: EntityId, target: Vec2Fixed) -> Result<()> {
        let u = self.entities.unit(unit).ok_or(SimError::EntityNotFound(unit))?;
        if u.is_egg() {
            return Err(SimError::InvalidState(format!("unit {unit} is an egg")));
        }
        self.gather.unassign(unit);
        if let Some(u) = self.entities.unit_mut(unit) {
            u.state = UnitState::Moving { target };
        }
        Ok(())
    }

    /// Send a worker to a construction site, overriding any gather
    /// assignment.
    pub fn command_construct(&mut self, worker: EntityId, site: EntityId) -> Result<()> {
        let unit = self
            .entities
            .unit(worker)
            .ok_or(SimError::EntityNotFound(worker))?;
        if !unit.is_worker() {
            return Err(SimError::InvalidTarget(format!("unit {worker} cannot build")));
        }
        let building = self
            .entities
            .building(site)
            .ok_or(SimError::EntityNotFound(site))?;
        if building.is_complete {
            return Err(SimError::InvalidState(format!(
                "building {site} is already complete"
            )));
        }
        self.gather.unassign(worker);
        if let Some(u) = self.entities.unit_mut(worker) {
            u.state = UnitState::Constructing { building: site };
        }
        Ok(())
    }

    /// Remove a unit, purging every reference to it.
    pub fn remove_unit(&mut self, id: EntityId) -> Result<()> {
        let unit = self
            .entities
            .remove_unit(id)
            .ok_or(SimError::EntityNotFound(id))?;
        self.gather.unassign(id);
        self.larva.purge_unit(id);
        if unit.is_egg() {
            // The evolution dies with the egg. The spent cost stays
            // lost, but the population reservation comes back.
            if let Some((key, order)) = self.scheduler.remove_evolution(id) {
                self.ledger.release_population(order.population);
                self.pending_events.push(SimEvent::ProductionCancelled {
                    producer: match key {
                        ProducerKey::Entity(p) => p,
                        ProducerKey::Global => 0,
                    },
                    name: order.name,
                });
            }
        }
        if unit.counts_population() {
            if let crate::entities::UnitKind::Standard(role) = unit.kind {
                let population = self
                    .catalog
                    .unit(role)
                    .map_or(0, |spec| spec.population);
                self.ledger.release_population(population);
            }
        }
        self.pending_events.push(SimEvent::UnitRemoved { unit: id });
        self.push_ledger_events();
        Ok(())
    }

    /// Remove a building, cancelling every order it owned.
    pub fn remove_building(&mut self, id: EntityId) -> Result<()> {
        self.entities
            .remove_building(id)
            .ok_or(SimError::EntityNotFound(id))?;
        for item in self.scheduler.remove_producer(ProducerKey::Entity(id)) {
            self.ledger.refund(item.cost());
            if let QueueItem::Unit(order) = item {
                self.ledger.release_population(order.population);
                if let Some(egg) = order.evolving_egg {
                    self.larva.revert_egg(egg, &mut self.entities);
                }
            }
        }
        self.larva.purge_hatchery(id);
        // Orphan anything still pointing at the dead building.
        for uid in self.entities.sorted_unit_ids() {
            if let Some(unit) = self.entities.unit_mut(uid) {
                if unit.parent_hatchery == Some(id) {
                    unit.parent_hatchery = None;
                }
                if unit.state == (UnitState::Constructing { building: id }) {
                    unit.state = UnitState::Idle;
                }
            }
        }
        self.pending_events
            .push(SimEvent::BuildingRemoved { building: id });
        self.push_ledger_events();
        Ok(())
    }

    /// Where the locomotion stepper should take a unit, if anywhere.
    #[must_use]
    pub fn desired_destination(&self, unit: EntityId) -> Option<Vec2Fixed> {
        self.gather.desired_destination(&self.entities, &self.nodes, unit)
    }

    /// Advance the whole simulation by `dt` seconds.
    pub fn tick(&mut self, dt: Fixed, sink: &mut dyn EventSink) {
        self.elapsed += dt;
        self.tick_count += 1;

        let mut events = std::mem::take(&mut self.pending_events);

        // 1. Gather loop.
        self.gather.tick(
            dt,
            &mut self.entities,
            &mut self.nodes,
            &mut self.ledger,
            &mut events,
        );

        // 2. Production queues.
        self.scheduler.tick(
            dt,
            self.faction,
            &self.catalog,
            &mut self.entities,
            &mut self.nodes,
            &mut self.ledger,
            &mut self.rng,
            &mut events,
        );

        // 3. Larva spawning.
        if self.faction.uses_larvae() {
            self.larva.update_spawning(
                self.elapsed,
                &mut self.entities,
                &mut self.rng,
                &mut events,
            );
        }

        for event in events.drain(..) {
            sink.emit(event);
        }

        #[cfg(debug_assertions)]
        {
            if self.tick_count % 64 == 0 {
                let hash = self.state_hash();
                tracing::debug!(tick = self.tick_count, state_hash = hash, "World state hash");
            }
        }
    }

    /// Order-independent digest of the observable state.
    ///
    /// Two worlds fed the same seed and the same commands produce
    /// identical hashes; used for desync detection and snapshot tests.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.tick_count.hash(&mut hasher);
        self.elapsed.to_bits().hash(&mut hasher);
        self.ledger.hash(&mut hasher);

        let unit_ids = self.entities.sorted_unit_ids();
        unit_ids.len().hash(&mut hasher);
        for id in unit_ids {
            if let Some(unit) = self.entities.unit(id) {
                unit.hash(&mut hasher);
            }
        }
        let building_ids = self.entities.sorted_building_ids();
        building_ids.len().hash(&mut hasher);
        for id in building_ids {
            if let Some(building) = self.entities.building(id) {
                building.hash(&mut hasher);
            }
        }
        let node_ids = self.nodes.sorted_ids();
        node_ids.len().hash(&mut hasher);
        for id in node_ids {
            if let Some(node) = self.nodes.get(id) {
                node.hash(&mut hasher);
            }
        }
        hasher.finish()
    }

    /// Grant resources directly, for scenario scripting and debug
    /// commands.
    pub fn grant_resources(&mut self, kind: crate::resources::ResourceKind, amount: Fixed) {
        self.ledger.deposit(kind, amount);
        self.push_ledger_events();
    }

    fn push_ledger_events(&mut self) {
        self.pending_events.push(SimEvent::ResourceChanged {
            minerals: self.ledger.minerals,
            gas: self.ledger.gas,
        });
        self.pending_events.push(SimEvent::PopulationChanged {
            population: self.ledger.population,
            population_max: self.ledger.population_max,
        });
    }
}
