//! Entity store: the single owner of all unit and building records.
//!
//! Every other component holds only [`EntityId`] handles and resolves
//! them through the store each tick, so a removal can never leave a
//! dangling pointer. String ids exist only at the snapshot boundary.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::catalog::{BuildingKind, UnitRole, UnitSpec};
use crate::math::{fixed_serde, Fixed, Vec2Fixed};
use crate::nodes::NodeId;

/// Unique identifier for units and buildings.
pub type EntityId = u64;

/// Health component for damageable entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Health {
    /// Current health points.
    pub current: u32,
    /// Maximum health points.
    pub max: u32,
}

impl Health {
    /// Create new health at full.
    #[must_use]
    pub const fn new(max: u32) -> Self {
        Self { current: max, max }
    }

    /// Check if the entity is dead.
    #[must_use]
    pub const fn is_dead(&self) -> bool {
        self.current == 0
    }

    /// Apply damage, returning actual damage dealt.
    pub fn apply_damage(&mut self, amount: u32) -> u32 {
        let actual = amount.min(self.current);
        self.current -= actual;
        actual
    }
}

/// Lifecycle of a larva.
///
/// A larva in `Evolving` is what players see as an "egg". The phase is a
/// one-way street: `Free -> Evolving -> consumed on hatch`; an egg never
/// re-enters the evolution checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LarvaPhase {
    /// Idle larva, available for evolution.
    Free,
    /// Mid-evolution egg, bound to a queued production order.
    Evolving {
        /// Role the egg will hatch into.
        target: UnitRole,
    },
}

/// What a unit fundamentally is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnitKind {
    /// A finished unit of a catalog role.
    Standard(UnitRole),
    /// A Swarm larva (or, mid-evolution, an egg).
    Larva(LarvaPhase),
}

/// Behavioral state of a unit.
///
/// Gather states carry their node binding so that state and target can
/// only change together; a worker can never be "mining" without a node
/// or bound to a node while idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnitState {
    /// No current task.
    Idle,
    /// Moving to an explicit point; clears any gather assignment.
    Moving {
        /// Destination the locomotion stepper walks toward.
        target: Vec2Fixed,
    },
    /// Gathering minerals from the bound patch.
    Mining {
        /// The patch being mined.
        node: NodeId,
    },
    /// Carrying minerals back to the nearest completed base.
    ReturningMinerals {
        /// Patch to resume once the cargo is deposited.
        node: NodeId,
    },
    /// Harvesting gas from the bound geyser.
    HarvestingGas {
        /// The geyser being harvested.
        node: NodeId,
    },
    /// Carrying gas back to the nearest completed base.
    ReturningGas {
        /// Geyser to resume once the cargo is deposited.
        node: NodeId,
    },
    /// Standing at a construction site; clears any gather assignment.
    Constructing {
        /// The building under construction.
        building: EntityId,
    },
}

impl UnitState {
    /// The node this state is bound to, if any.
    #[must_use]
    pub const fn bound_node(&self) -> Option<NodeId> {
        match self {
            Self::Mining { node }
            | Self::ReturningMinerals { node }
            | Self::HarvestingGas { node }
            | Self::ReturningGas { node } => Some(*node),
            Self::Idle | Self::Moving { .. } | Self::Constructing { .. } => None,
        }
    }

    /// Whether this state participates in the gather loop.
    #[must_use]
    pub const fn is_gathering(&self) -> bool {
        self.bound_node().is_some()
    }
}

/// A mobile entity: worker, combat unit, supply unit, larva, or egg.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Unit {
    /// Handle of this unit.
    pub id: EntityId,
    /// What the unit is.
    pub kind: UnitKind,
    /// Position in world space; written by the external locomotion stepper.
    pub position: Vec2Fixed,
    /// Health points.
    pub health: Health,
    /// Behavioral state.
    pub state: UnitState,
    /// Carried minerals (workers only).
    #[serde(with = "fixed_serde")]
    pub cargo_minerals: Fixed,
    /// Carried gas (workers only).
    #[serde(with = "fixed_serde")]
    pub cargo_gas: Fixed,
    /// Hatchery that spawned this larva/egg.
    pub parent_hatchery: Option<EntityId>,
}

impl Unit {
    /// Create a standard unit from its catalog entry.
    #[must_use]
    pub fn from_spec(spec: &UnitSpec, position: Vec2Fixed) -> Self {
        Self {
            id: 0,
            kind: UnitKind::Standard(spec.role),
            position,
            health: Health::new(spec.health),
            state: UnitState::Idle,
            cargo_minerals: Fixed::ZERO,
            cargo_gas: Fixed::ZERO,
            parent_hatchery: None,
        }
    }

    /// Create a free larva bound to its hatchery.
    #[must_use]
    pub fn larva(position: Vec2Fixed, health: u32, hatchery: EntityId) -> Self {
        Self {
            id: 0,
            kind: UnitKind::Larva(LarvaPhase::Free),
            position,
            health: Health::new(health),
            state: UnitState::Idle,
            cargo_minerals: Fixed::ZERO,
            cargo_gas: Fixed::ZERO,
            parent_hatchery: Some(hatchery),
        }
    }

    /// Check for a finished unit of a specific role.
    #[must_use]
    pub fn is_role(&self, role: UnitRole) -> bool {
        self.kind == UnitKind::Standard(role)
    }

    /// Check for a worker.
    #[must_use]
    pub fn is_worker(&self) -> bool {
        self.kind == UnitKind::Standard(UnitRole::Worker)
    }

    /// Check for a larva still available for evolution.
    #[must_use]
    pub fn is_free_larva(&self) -> bool {
        self.kind == UnitKind::Larva(LarvaPhase::Free)
    }

    /// Check for an egg (larva mid-evolution).
    #[must_use]
    pub const fn is_egg(&self) -> bool {
        matches!(self.kind, UnitKind::Larva(LarvaPhase::Evolving { .. }))
    }

    /// Larvae and eggs never count against population.
    #[must_use]
    pub const fn counts_population(&self) -> bool {
        matches!(self.kind, UnitKind::Standard(_))
    }

    /// Carried amount of the resource the worker is currently hauling.
    #[must_use]
    pub fn total_cargo(&self) -> Fixed {
        self.cargo_minerals + self.cargo_gas
    }
}

/// A placed structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Building {
    /// Handle of this building.
    pub id: EntityId,
    /// What the building is.
    pub kind: BuildingKind,
    /// Position in world space.
    pub position: Vec2Fixed,
    /// Health points.
    pub health: Health,
    /// Whether construction has finished.
    pub is_complete: bool,
    /// Population cap granted once complete.
    pub supply_provided: u32,
}

impl Building {
    /// Create a building under construction.
    #[must_use]
    pub const fn under_construction(
        kind: BuildingKind,
        position: Vec2Fixed,
        health: u32,
        supply_provided: u32,
    ) -> Self {
        Self {
            id: 0,
            kind,
            position,
            health: Health::new(health),
            is_complete: false,
            supply_provided,
        }
    }

    /// Create a finished building.
    #[must_use]
    pub const fn completed(
        kind: BuildingKind,
        position: Vec2Fixed,
        health: u32,
        supply_provided: u32,
    ) -> Self {
        Self {
            id: 0,
            kind,
            position,
            health: Health::new(health),
            is_complete: true,
            supply_provided,
        }
    }
}

/// Exclusive owner of all unit and building records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityStore {
    units: HashMap<EntityId, Unit>,
    buildings: HashMap<EntityId, Building>,
    next_id: EntityId,
}

impl EntityStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            units: HashMap::new(),
            buildings: HashMap::new(),
            next_id: 1,
        }
    }

    /// Insert a unit, assigning its id.
    pub fn insert_unit(&mut self, mut unit: Unit) -> EntityId {
        let id = self.next_id;
        self.next_id += 1;
        unit.id = id;
        self.units.insert(id, unit);
        id
    }

    /// Insert a building, assigning its id.
    pub fn insert_building(&mut self, mut building: Building) -> EntityId {
        let id = self.next_id;
        self.next_id += 1;
        building.id = id;
        self.buildings.insert(id, building);
        id
    }

    /// Re-insert a unit with an explicit id (snapshot restore only).
    pub(crate) fn restore_unit(&mut self, unit: Unit) {
        self.next_id = self.next_id.max(unit.id + 1);
        self.units.insert(unit.id, unit);
    }

    /// Re-insert a building with an explicit id (snapshot restore only).
    pub(crate) fn restore_building(&mut self, building: Building) {
        self.next_id = self.next_id.max(building.id + 1);
        self.buildings.insert(building.id, building);
    }

    /// Remove a unit record. Callers must also purge assignment lists;
    /// the world-level remove does both.
    pub fn remove_unit(&mut self, id: EntityId) -> Option<Unit> {
        self.units.remove(&id)
    }

    /// Remove a building record.
    pub fn remove_building(&mut self, id: EntityId) -> Option<Building> {
        self.buildings.remove(&id)
    }

    /// Get a unit by handle.
    #[must_use]
    pub fn unit(&self, id: EntityId) -> Option<&Unit> {
        self.units.get(&id)
    }

    /// Get a unit mutably.
    pub fn unit_mut(&mut self, id: EntityId) -> Option<&mut Unit> {
        self.units.get_mut(&id)
    }

    /// Get a building by handle.
    #[must_use]
    pub fn building(&self, id: EntityId) -> Option<&Building> {
        self.buildings.get(&id)
    }

    /// Get a building mutably.
    pub fn building_mut(&mut self, id: EntityId) -> Option<&mut Building> {
        self.buildings.get_mut(&id)
    }

    /// Number of units.
    #[must_use]
    pub fn unit_count(&self) -> usize {
        self.units.len()
    }

    /// Number of buildings.
    #[must_use]
    pub fn building_count(&self) -> usize {
        self.buildings.len()
    }

    /// Sorted unit handles for deterministic iteration.
    #[must_use]
    pub fn sorted_unit_ids(&self) -> Vec<EntityId> {
        let mut ids: Vec<_> = self.units.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Sorted building handles for deterministic iteration.
    #[must_use]
    pub fn sorted_building_ids(&self) -> Vec<EntityId> {
        let mut ids: Vec<_> = self.buildings.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Iterate over all units (not in deterministic order).
    pub fn units(&self) -> impl Iterator<Item = &Unit> {
        self.units.values()
    }

    /// Iterate over all buildings (not in deterministic order).
    pub fn buildings(&self) -> impl Iterator<Item = &Building> {
        self.buildings.values()
    }

    /// Sorted handles of all free larvae.
    #[must_use]
    pub fn free_larvae(&self) -> Vec<EntityId> {
        let mut ids: Vec<_> = self
            .units
            .values()
            .filter(|u| u.is_free_larva())
            .map(|u| u.id)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Sorted handles of completed buildings of a kind.
    #[must_use]
    pub fn complete_buildings(&self, kind: BuildingKind) -> Vec<EntityId> {
        let mut ids: Vec<_> = self
            .buildings
            .values()
            .filter(|b| b.is_complete && b.kind == kind)
            .map(|b| b.id)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Whether any completed building of `kind` exists.
    #[must_use]
    pub fn has_complete(&self, kind: BuildingKind) -> bool {
        self.buildings
            .values()
            .any(|b| b.is_complete && b.kind == kind)
    }

    /// Position of the completed base nearest to `from`, if any.
    #[must_use]
    pub fn nearest_base(&self, from: Vec2Fixed) -> Option<&Building> {
        self.complete_buildings(BuildingKind::Headquarters)
            .into_iter()
            .filter_map(|id| self.buildings.get(&id))
            .min_by_key(|b| b.position.distance_squared(from).to_bits())
    }

    /// Sorted handles of workers standing in `Constructing` on `building`.
    #[must_use]
    pub fn constructing_workers(&self, building: EntityId) -> Vec<EntityId> {
        let mut ids: Vec<_> = self
            .units
            .values()
            .filter(|u| {
                u.is_worker() && u.state == UnitState::Constructing { building }
            })
            .map(|u| u.id)
            .collect();
        ids.sort_unstable();
        ids
    }
}
