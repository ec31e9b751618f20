//! Worker gather loop: assignment, extraction, hauling, deposit.
//!
//! The system owns the two assignment lists and drives every bound
//! worker each tick. It never moves units; it only reads positions and
//! exposes [`GatherSystem::desired_destination`] for an external
//! locomotion stepper to chase.

use rand::Rng;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use crate::entities::{EntityId, EntityStore, UnitState};
use crate::error::{Result, SimError};
use crate::events::SimEvent;
use crate::math::{compass_direction, fixed_serde, Fixed, Vec2Fixed};
use crate::nodes::{NodeId, NodeKind, ResourceNodeStore};
use crate::resources::{ResourceKind, ResourceLedger};

/// Tuning knobs for the gather loop. Rates are per second.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatherConfig {
    /// Minerals extracted per second while in range of a patch.
    #[serde(with = "fixed_serde")]
    pub mining_rate: Fixed,
    /// Gas extracted per second while in range of a covered geyser.
    #[serde(with = "fixed_serde")]
    pub gas_rate: Fixed,
    /// Maximum distance at which extraction happens.
    #[serde(with = "fixed_serde")]
    pub gather_range: Fixed,
    /// Cargo a worker carries before turning back.
    #[serde(with = "fixed_serde")]
    pub cargo_capacity: Fixed,
    /// Maximum distance from a base at which cargo is deposited.
    #[serde(with = "fixed_serde")]
    pub deposit_range: Fixed,
    /// How far from the node center workers are asked to stand.
    #[serde(with = "fixed_serde")]
    pub stand_off: Fixed,
}

impl Default for GatherConfig {
    fn default() -> Self {
        Self {
            mining_rate: Fixed::from_num(25),
            gas_rate: Fixed::from_num(20),
            gather_range: Fixed::from_num(2.5),
            cargo_capacity: Fixed::from_num(50),
            deposit_range: Fixed::from_num(3),
            stand_off: Fixed::from_num(1.5),
        }
    }
}

/// Worker assignment bookkeeping plus the per-tick gather step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GatherSystem {
    /// Gather tuning, fixed for the lifetime of a match.
    pub config: GatherConfig,
    mineral_workers: Vec<EntityId>,
    gas_workers: Vec<EntityId>,
}

impl GatherSystem {
    /// Create a gather system with the given tuning.
    #[must_use]
    pub fn new(config: GatherConfig) -> Self {
        Self {
            config,
            mineral_workers: Vec::new(),
            gas_workers: Vec::new(),
        }
    }

    /// Overwrite both assignment lists (snapshot restore only).
    pub(crate) fn restore_assignments(
        &mut self,
        mineral_workers: Vec<EntityId>,
        gas_workers: Vec<EntityId>,
    ) {
        self.mineral_workers = mineral_workers;
        self.gas_workers = gas_workers;
    }

    /// Workers currently bound to mineral patches, in assignment order.
    #[must_use]
    pub fn mineral_workers(&self) -> &[EntityId] {
        &self.mineral_workers
    }

    /// Workers currently bound to gas geysers, in assignment order.
    #[must_use]
    pub fn gas_workers(&self) -> &[EntityId] {
        &self.gas_workers
    }

    /// Whether the worker is in either assignment list.
    #[must_use]
    pub fn is_assigned(&self, worker: EntityId) -> bool {
        self.mineral_workers.contains(&worker) || self.gas_workers.contains(&worker)
    }

    /// Drop the worker from both assignment lists.
    ///
    /// Called on removal and whenever a move/construct command overrides
    /// gathering. Idempotent.
    pub fn unassign(&mut self, worker: EntityId) {
        self.mineral_workers.retain(|&w| w != worker);
        self.gas_workers.retain(|&w| w != worker);
    }

    /// Number of assigned workers whose state is bound to `node`.
    #[must_use]
    pub fn workers_on_node(&self, entities: &EntityStore, node: NodeId) -> usize {
        self.mineral_workers
            .iter()
            .chain(&self.gas_workers)
            .filter_map(|&id| entities.unit(id))
            .filter(|u| u.state.bound_node() == Some(node))
            .count()
    }

    /// Bind a worker to a mineral patch.
    ///
    /// With `node = None`, picks the least-loaded non-empty patch,
    /// breaking ties uniformly at random so workers spread out.
    pub fn assign_to_minerals(
        &mut self,
        entities: &mut EntityStore,
        nodes: &ResourceNodeStore,
        rng: &mut Pcg32,
        worker: EntityId,
        node: Option<NodeId>,
        events: &mut Vec<SimEvent>,
    ) -> Result<NodeId> {
        let unit = entities
            .unit(worker)
            .ok_or(SimError::EntityNotFound(worker))?;
        if !unit.is_worker() {
            return Err(SimError::InvalidTarget(format!(
                "unit {worker} cannot gather"
            )));
        }

        let target = match node {
            Some(id) => {
                let n = nodes
                    .get(id)
                    .ok_or_else(|| SimError::InvalidTarget(format!("no such node {id}")))?;
                if n.kind != NodeKind::MineralPatch {
                    return Err(SimError::InvalidTarget(format!(
                        "node {id} is not a mineral patch"
                    )));
                }
                if n.is_depleted() {
                    return Err(SimError::NoEligibleNode);
                }
                id
            }
            None => self.pick_least_loaded(entities, nodes, rng, |n| {
                n.kind == NodeKind::MineralPatch && !n.is_depleted()
            })?,
        };

        self.bind(entities, worker, target, ResourceKind::Minerals, events);
        Ok(target)
    }

    /// Bind a worker to a gas geyser. Requires a completed extractor.
    pub fn assign_to_gas(
        &mut self,
        entities: &mut EntityStore,
        nodes: &ResourceNodeStore,
        rng: &mut Pcg32,
        worker: EntityId,
        node: Option<NodeId>,
        events: &mut Vec<SimEvent>,
    ) -> Result<NodeId> {
        let unit = entities
            .unit(worker)
            .ok_or(SimError::EntityNotFound(worker))?;
        if !unit.is_worker() {
            return Err(SimError::InvalidTarget(format!(
                "unit {worker} cannot gather"
            )));
        }

        let target = match node {
            Some(id) => {
                let n = nodes
                    .get(id)
                    .ok_or_else(|| SimError::InvalidTarget(format!("no such node {id}")))?;
                match n.kind {
                    NodeKind::GasGeyser { has_extractor: true } if !n.is_depleted() => id,
                    NodeKind::GasGeyser { .. } => return Err(SimError::NoEligibleNode),
                    NodeKind::MineralPatch => {
                        return Err(SimError::InvalidTarget(format!(
                            "node {id} is not a geyser"
                        )));
                    }
                }
            }
            None => self.pick_least_loaded(entities, nodes, rng, |n| {
                n.is_harvestable() && n.kind != NodeKind::MineralPatch
            })?,
        };

        self.bind(entities, worker, target, ResourceKind::Gas, events);
        Ok(target)
    }

    fn bind(
        &mut self,
        entities: &mut EntityStore,
        worker: EntityId,
        node: NodeId,
        kind: ResourceKind,
        events: &mut Vec<SimEvent>,
    ) {
        self.unassign(worker);
        let list = match kind {
            ResourceKind::Minerals => &mut self.mineral_workers,
            ResourceKind::Gas => &mut self.gas_workers,
        };
        list.push(worker);
        if let Some(unit) = entities.unit_mut(worker) {
            unit.state = match kind {
                ResourceKind::Minerals => UnitState::Mining { node },
                ResourceKind::Gas => UnitState::HarvestingGas { node },
            };
        }
        events.push(SimEvent::WorkerAssigned { worker, node, kind });
    }

    fn pick_least_loaded(
        &self,
        entities: &EntityStore,
        nodes: &ResourceNodeStore,
        rng: &mut Pcg32,
        eligible: impl Fn(&crate::nodes::ResourceNode) -> bool,
    ) -> Result<NodeId> {
        let mut best: Vec<NodeId> = Vec::new();
        let mut best_load = usize::MAX;
        for id in nodes.sorted_ids() {
            let Some(node) = nodes.get(id) else { continue };
            if !eligible(node) {
                continue;
            }
            let load = self.workers_on_node(entities, id);
            if load < best_load {
                best_load = load;
                best.clear();
                best.push(id);
            } else if load == best_load {
                best.push(id);
            }
        }
        if best.is_empty() {
            return Err(SimError::NoEligibleNode);
        }
        let choice = rng.gen_range(0..best.len());
        Ok(best[choice])
    }

    /// Where the locomotion stepper should take this unit, if anywhere.
    ///
    /// Gathering workers fan out around the node on a per-id compass
    /// offset so they do not stack on one point.
    #[must_use]
    pub fn desired_destination(
        &self,
        entities: &EntityStore,
        nodes: &ResourceNodeStore,
        unit: EntityId,
    ) -> Option<Vec2Fixed> {
        let u = entities.unit(unit)?;
        match u.state {
            UnitState::Idle => None,
            UnitState::Moving { target } => Some(target),
            UnitState::Mining { node } | UnitState::HarvestingGas { node } => {
                let n = nodes.get(node)?;
                let offset = compass_direction(unit).scaled(self.config.stand_off);
                Some(n.position + offset)
            }
            UnitState::ReturningMinerals { .. } | UnitState::ReturningGas { .. } => {
                entities.nearest_base(u.position).map(|b| b.position)
            }
            UnitState::Constructing { building } => {
                entities.building(building).map(|b| b.position)
            }
        }
    }

    /// Advance every assigned worker by `dt` seconds.
    pub fn tick(
        &mut self,
        dt: Fixed,
        entities: &mut EntityStore,
        nodes: &mut ResourceNodeStore,
        ledger: &mut ResourceLedger,
        events: &mut Vec<SimEvent>,
    ) {
        let assigned: Vec<EntityId> = self
            .mineral_workers
            .iter()
            .chain(&self.gas_workers)
            .copied()
            .collect();
        for worker in assigned {
            if entities.unit(worker).is_none() {
                self.unassign(worker);
                continue;
            }
            self.step_worker(dt, worker, entities, nodes, ledger, events);
        }
    }

    fn step_worker(
        &mut self,
        dt: Fixed,
        worker: EntityId,
        entities: &mut EntityStore,
        nodes: &mut ResourceNodeStore,
        ledger: &mut ResourceLedger,
        events: &mut Vec<SimEvent>,
    ) {
        let Some(state) = entities.unit(worker).map(|u| u.state) else {
            return;
        };
        match state {
            UnitState::Mining { node } => {
                self.step_extract(dt, worker, node, ResourceKind::Minerals, entities, nodes, events);
            }
            UnitState::HarvestingGas { node } => {
                self.step_extract(dt, worker, node, ResourceKind::Gas, entities, nodes, events);
            }
            UnitState::ReturningMinerals { node } => {
                self.step_deposit(worker, node, ResourceKind::Minerals, entities, nodes, ledger, events);
            }
            UnitState::ReturningGas { node } => {
                self.step_deposit(worker, node, ResourceKind::Gas, entities, nodes, ledger, events);
            }
            // A move or construct command already cleared the assignment;
            // tick only ever sees these transiently.
            UnitState::Idle | UnitState::Moving { .. } | UnitState::Constructing { .. } => {
                self.unassign(worker);
            }
        }
    }

    fn step_extract(
        &mut self,
        dt: Fixed,
        worker: EntityId,
        node: NodeId,
        kind: ResourceKind,
        entities: &mut EntityStore,
        nodes: &mut ResourceNodeStore,
        events: &mut Vec<SimEvent>,
    ) {
        let node_ok = nodes.get(node).is_some_and(|n| n.is_harvestable());
        if !node_ok {
            self.drop_dead_node(worker, node, kind, entities);
            return;
        }

        let Some((position, carried)) = entities
            .unit(worker)
            .map(|u| (u.position, u.total_cargo()))
        else {
            return;
        };
        let Some(node_pos) = nodes.get(node).map(|n| n.position) else {
            return;
        };
        if !position.within_range(node_pos, self.config.gather_range) {
            return;
        }

        let rate = match kind {
            ResourceKind::Minerals => self.config.mining_rate,
            ResourceKind::Gas => self.config.gas_rate,
        };
        let room = self.config.cargo_capacity - carried;
        let wanted = (rate * dt).min(room);
        let taken = nodes
            .get_mut(node)
            .map_or(Fixed::ZERO, |n| n.extract(wanted));

        if let Some(unit) = entities.unit_mut(worker) {
            match kind {
                ResourceKind::Minerals => unit.cargo_minerals += taken,
                ResourceKind::Gas => unit.cargo_gas += taken,
            }
            if unit.total_cargo() >= self.config.cargo_capacity {
                unit.state = match kind {
                    ResourceKind::Minerals => UnitState::ReturningMinerals { node },
                    ResourceKind::Gas => UnitState::ReturningGas { node },
                };
                events.push(SimEvent::WorkerCargoFull {
                    worker,
                    cargo: unit.total_cargo(),
                });
                tracing::trace!(worker, %node, "Cargo full, returning to base");
            }
        }

        if nodes.get(node).is_some_and(crate::nodes::ResourceNode::is_depleted) {
            events.push(SimEvent::NodeDepleted { node });
            tracing::debug!(%node, "Resource node depleted");
        }
    }

    /// The bound node vanished or ran dry mid-gather. Haul home whatever
    /// is carried, otherwise go idle.
    fn drop_dead_node(
        &mut self,
        worker: EntityId,
        node: NodeId,
        kind: ResourceKind,
        entities: &mut EntityStore,
    ) {
        let Some(unit) = entities.unit_mut(worker) else {
            return;
        };
        if unit.total_cargo() > Fixed::ZERO {
            unit.state = match kind {
                ResourceKind::Minerals => UnitState::ReturningMinerals { node },
                ResourceKind::Gas => UnitState::ReturningGas { node },
            };
        } else {
            unit.state = UnitState::Idle;
            self.unassign(worker);
        }
    }

    fn step_deposit(
        &mut self,
        worker: EntityId,
        node: NodeId,
        kind: ResourceKind,
        entities: &mut EntityStore,
        nodes: &mut ResourceNodeStore,
        ledger: &mut ResourceLedger,
        events: &mut Vec<SimEvent>,
    ) {
        let position = match entities.unit(worker) {
            Some(u) => u.position,
            None => return,
        };
        let Some(base_pos) = entities.nearest_base(position).map(|b| b.position) else {
            // No completed base to deposit at; hold cargo and wait.
            return;
        };
        if !position.within_range(base_pos, self.config.deposit_range) {
            return;
        }

        let mut deposited = Fixed::ZERO;
        if let Some(unit) = entities.unit_mut(worker) {
            deposited = match kind {
                ResourceKind::Minerals => std::mem::take(&mut unit.cargo_minerals),
                ResourceKind::Gas => std::mem::take(&mut unit.cargo_gas),
            };
        }
        if deposited > Fixed::ZERO {
            ledger.deposit(kind, deposited);
            events.push(SimEvent::WorkerDeposited {
                worker,
                kind,
                amount: deposited,
            });
            events.push(SimEvent::ResourceChanged {
                minerals: ledger.minerals,
                gas: ledger.gas,
            });
        }

        // Resume gathering from the same node, or stand down if it died
        // while we were hauling.
        let resume = nodes.get(node).is_some_and(|n| n.is_harvestable());
        if let Some(unit) = entities.unit_mut(worker) {
            if resume {
                unit.state = match kind {
                    ResourceKind::Minerals => UnitState::Mining { node },
                    ResourceKind::Gas => UnitState::HarvestingGas { node },
                };
            } else {
                unit.state = UnitState::Idle;
                self.unassign(worker);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;

    use super::*;
    use crate::catalog::{BuildingKind, FactionCatalog, UnitRole};
    use crate::entities::{Building, Unit};
    use crate::factions::FactionId;

    struct Fixture {
        entities: EntityStore,
        nodes: ResourceNodeStore,
        ledger: ResourceLedger,
        gather: GatherSystem,
        rng: Pcg32,
        events: Vec<SimEvent>,
    }

    fn pos(x: i32, z: i32) -> Vec2Fixed {
        Vec2Fixed::new(Fixed::from_num(x), Fixed::from_num(z))
    }

    fn fixture() -> Fixture {
        Fixture {
            entities: EntityStore::new(),
            nodes: ResourceNodeStore::new(),
            ledger: ResourceLedger::new(0, 0, 20),
            gather: GatherSystem::default(),
            rng: Pcg32::seed_from_u64(7),
            events: Vec::new(),
        }
    }

    fn spawn_worker(fx: &mut Fixture, x: i32, z: i32) -> EntityId {
        let catalog = FactionCatalog::for_faction(FactionId::Vanguard);
        let spec = catalog.unit(UnitRole::Worker).unwrap();
        fx.entities.insert_unit(Unit::from_spec(spec, pos(x, z)))
    }

    #[test]
    fn test_full_cargo_after_two_seconds_at_default_rate() {
        let mut fx = fixture();
        let worker = spawn_worker(&mut fx, 0, 0);
        let node = fx.nodes.add_mineral_patch(pos(1, 0), Fixed::from_num(1000));
        fx.gather
            .assign_to_minerals(
                &mut fx.entities,
                &fx.nodes,
                &mut fx.rng,
                worker,
                Some(node),
                &mut fx.events,
            )
            .unwrap();

        // 25/s for 2s fills the 50 cargo exactly.
        for _ in 0..20 {
            fx.gather.tick(
                Fixed::from_num(0.1),
                &mut fx.entities,
                &mut fx.nodes,
                &mut fx.ledger,
                &mut fx.events,
            );
        }

        let unit = fx.entities.unit(worker).unwrap();
        assert_eq!(unit.cargo_minerals, Fixed::from_num(50));
        assert_eq!(unit.state, UnitState::ReturningMinerals { node });
        assert!(fx
            .events
            .iter()
            .any(|e| matches!(e, SimEvent::WorkerCargoFull { .. })));
    }

    #[test]
    fn test_extraction_conserves_total() {
        let mut fx = fixture();
        let worker = spawn_worker(&mut fx, 0, 0);
        let node = fx.nodes.add_mineral_patch(pos(1, 0), Fixed::from_num(1000));
        fx.gather
            .assign_to_minerals(
                &mut fx.entities,
                &fx.nodes,
                &mut fx.rng,
                worker,
                Some(node),
                &mut fx.events,
            )
            .unwrap();

        fx.gather.tick(
            Fixed::from_num(0.7),
            &mut fx.entities,
            &mut fx.nodes,
            &mut fx.ledger,
            &mut fx.events,
        );

        let carried = fx.entities.unit(worker).unwrap().cargo_minerals;
        let remaining = fx.nodes.get(node).unwrap().amount;
        assert_eq!(carried + remaining, Fixed::from_num(1000));
        assert!(carried > Fixed::ZERO);
    }

    #[test]
    fn test_gas_assignment_requires_extractor() {
        let mut fx = fixture();
        let worker = spawn_worker(&mut fx, 0, 0);
        let geyser = fx.nodes.add_gas_geyser(pos(2, 0), Fixed::from_num(500));

        let err = fx
            .gather
            .assign_to_gas(
                &mut fx.entities,
                &fx.nodes,
                &mut fx.rng,
                worker,
                Some(geyser),
                &mut fx.events,
            )
            .unwrap_err();
        assert!(matches!(err, SimError::NoEligibleNode));
        assert_eq!(fx.entities.unit(worker).unwrap().state, UnitState::Idle);
        assert!(!fx.gather.is_assigned(worker));

        fx.nodes.set_extractor(geyser, true);
        fx.gather
            .assign_to_gas(
                &mut fx.entities,
                &fx.nodes,
                &mut fx.rng,
                worker,
                Some(geyser),
                &mut fx.events,
            )
            .unwrap();
        assert_eq!(
            fx.entities.unit(worker).unwrap().state,
            UnitState::HarvestingGas { node: geyser }
        );
    }

    #[test]
    fn test_auto_assignment_prefers_least_loaded_patch() {
        let mut fx = fixture();
        let busy = fx.nodes.add_mineral_patch(pos(1, 0), Fixed::from_num(1000));
        let quiet = fx.nodes.add_mineral_patch(pos(-1, 0), Fixed::from_num(1000));

        for _ in 0..3 {
            let w = spawn_worker(&mut fx, 0, 0);
            fx.gather
                .assign_to_minerals(
                    &mut fx.entities,
                    &fx.nodes,
                    &mut fx.rng,
                    w,
                    Some(busy),
                    &mut fx.events,
                )
                .unwrap();
        }

        let fresh = spawn_worker(&mut fx, 0, 0);
        let chosen = fx
            .gather
            .assign_to_minerals(
                &mut fx.entities,
                &fx.nodes,
                &mut fx.rng,
                fresh,
                None,
                &mut fx.events,
            )
            .unwrap();
        assert_eq!(chosen, quiet);
    }

    #[test]
    fn test_deposit_fills_ledger_and_resumes_mining() {
        let mut fx = fixture();
        fx.entities.insert_building(Building::completed(
            BuildingKind::Headquarters,
            pos(0, 0),
            1500,
            10,
        ));
        let worker = spawn_worker(&mut fx, 0, 1);
        let node = fx.nodes.add_mineral_patch(pos(1, 0), Fixed::from_num(1000));
        fx.gather
            .assign_to_minerals(
                &mut fx.entities,
                &fx.nodes,
                &mut fx.rng,
                worker,
                Some(node),
                &mut fx.events,
            )
            .unwrap();
        {
            let unit = fx.entities.unit_mut(worker).unwrap();
            unit.cargo_minerals = Fixed::from_num(50);
            unit.state = UnitState::ReturningMinerals { node };
        }

        fx.gather.tick(
            Fixed::from_num(0.1),
            &mut fx.entities,
            &mut fx.nodes,
            &mut fx.ledger,
            &mut fx.events,
        );

        assert_eq!(fx.ledger.minerals, Fixed::from_num(50));
        let unit = fx.entities.unit(worker).unwrap();
        assert_eq!(unit.cargo_minerals, Fixed::ZERO);
        assert_eq!(unit.state, UnitState::Mining { node });
    }

    #[test]
    fn test_depleted_node_drops_assignment() {
        let mut fx = fixture();
        let worker = spawn_worker(&mut fx, 0, 0);
        let node = fx.nodes.add_mineral_patch(pos(1, 0), Fixed::from_num(5));
        fx.gather
            .assign_to_minerals(
                &mut fx.entities,
                &fx.nodes,
                &mut fx.rng,
                worker,
                Some(node),
                &mut fx.events,
            )
            .unwrap();

        // First tick drains the 5 remaining, second tick sees a dead node
        // and (with cargo aboard) turns for home.
        fx.gather.tick(
            Fixed::ONE,
            &mut fx.entities,
            &mut fx.nodes,
            &mut fx.ledger,
            &mut fx.events,
        );
        fx.gather.tick(
            Fixed::ONE,
            &mut fx.entities,
            &mut fx.nodes,
            &mut fx.ledger,
            &mut fx.events,
        );

        let unit = fx.entities.unit(worker).unwrap();
        assert_eq!(unit.state, UnitState::ReturningMinerals { node });
        assert!(fx
            .events
            .iter()
            .any(|e| matches!(e, SimEvent::NodeDepleted { .. })));
    }

    #[test]
    fn test_unassign_purges_both_lists() {
        let mut fx = fixture();
        let worker = spawn_worker(&mut fx, 0, 0);
        let node = fx.nodes.add_mineral_patch(pos(1, 0), Fixed::from_num(100));
        fx.gather
            .assign_to_minerals(
                &mut fx.entities,
                &fx.nodes,
                &mut fx.rng,
                worker,
                Some(node),
                &mut fx.events,
            )
            .unwrap();
        assert!(fx.gather.is_assigned(worker));

        fx.gather.unassign(worker);
        assert!(!fx.gather.is_assigned(worker));
        assert!(fx.gather.mineral_workers().is_empty());
    }

    #[test]
    fn test_non_worker_cannot_be_assigned() {
        let mut fx = fixture();
        let catalog = FactionCatalog::for_faction(FactionId::Vanguard);
        let spec = catalog.unit(UnitRole::Melee).unwrap();
        let soldier = fx.entities.insert_unit(Unit::from_spec(spec, pos(0, 0)));
        fx.nodes.add_mineral_patch(pos(1, 0), Fixed::from_num(100));

        let err = fx
            .gather
            .assign_to_minerals(
                &mut fx.entities,
                &fx.nodes,
                &mut fx.rng,
                soldier,
                None,
                &mut fx.events,
            )
            .unwrap_err();
        assert!(matches!(err, SimError::InvalidTarget(_)));
    }
}
