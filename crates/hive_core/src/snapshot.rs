//! Save-game capture and restore.
//!
//! The on-disk shape uses string ids (`unit-N`, `building-N`, `node-N`)
//! so saves stay greppable and hand-editable; numeric handles exist
//! only inside the live world. Restore validates every reference and
//! every invariant before building a world, and fails closed on the
//! first problem.

use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use crate::catalog::{BuildingKind, FactionCatalog, ResourceCost, UnitRole};
use crate::entities::{
    Building, EntityId, EntityStore, Health, Unit, UnitKind, UnitState,
};
use crate::error::{Result, SimError};
use crate::factions::FactionId;
use crate::gather::{GatherConfig, GatherSystem};
use crate::larva::{LarvaConfig, LarvaSystem};
use crate::math::{fixed_serde, Fixed, Vec2Fixed};
use crate::nodes::{NodeId, NodeKind, ResourceNode, ResourceNodeStore};
use crate::production::{
    BuildingOrder, ProducerKey, ProductionConfig, ProductionScheduler, Progress,
    QueueItem, UnitOrder,
};
use crate::resources::{ResourceLedger, POPULATION_HARD_CAP};
use crate::world::SimulationWorld;

/// Format version; bumped on any incompatible shape change.
pub const SAVE_VERSION: u32 = 1;

fn unit_id(id: EntityId) -> String {
    format!("unit-{id}")
}

fn building_id(id: EntityId) -> String {
    format!("building-{id}")
}

fn node_id(id: NodeId) -> String {
    format!("node-{}", id.0)
}

fn parse_id(prefix: &str, s: &str) -> Result<u64> {
    s.strip_prefix(prefix)
        .and_then(|rest| rest.strip_prefix('-'))
        .and_then(|digits| digits.parse().ok())
        .ok_or_else(|| SimError::Persistence(format!("malformed {prefix} id {s:?}")))
}

/// [`UnitState`] with string references, as persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SavedUnitState {
    /// No current task.
    Idle,
    /// Moving to a point.
    Moving {
        /// Destination.
        target: Vec2Fixed,
    },
    /// Mining a patch.
    Mining {
        /// Bound patch.
        node: String,
    },
    /// Hauling minerals home.
    ReturningMinerals {
        /// Patch to resume.
        node: String,
    },
    /// Harvesting a geyser.
    HarvestingGas {
        /// Bound geyser.
        node: String,
    },
    /// Hauling gas home.
    ReturningGas {
        /// Geyser to resume.
        node: String,
    },
    /// Standing at a construction site.
    Constructing {
        /// The site.
        building: String,
    },
}

impl SavedUnitState {
    fn capture(state: UnitState) -> Self {
        match state {
            UnitState::Idle => Self::Idle,
            UnitState::Moving { target } => Self::Moving { target },
            UnitState::Mining { node } => Self::Mining { node: node_id(node) },
            UnitState::ReturningMinerals { node } => Self::ReturningMinerals {
                node: node_id(node),
            },
            UnitState::HarvestingGas { node } => Self::HarvestingGas {
                node: node_id(node),
            },
            UnitState::ReturningGas { node } => Self::ReturningGas {
                node: node_id(node),
            },
            UnitState::Constructing { building } => Self::Constructing {
                building: building_id(building),
            },
        }
    }

    fn restore(&self) -> Result<UnitState> {
        Ok(match self {
            Self::Idle => UnitState::Idle,
            Self::Moving { target } => UnitState::Moving { target: *target },
            Self::Mining { node } => UnitState::Mining {
                node: NodeId(parse_id("node", node)?),
            },
            Self::ReturningMinerals { node } => UnitState::ReturningMinerals {
                node: NodeId(parse_id("node", node)?),
            },
            Self::HarvestingGas { node } => UnitState::HarvestingGas {
                node: NodeId(parse_id("node", node)?),
            },
            Self::ReturningGas { node } => UnitState::ReturningGas {
                node: NodeId(parse_id("node", node)?),
            },
            Self::Constructing { building } => UnitState::Constructing {
                building: parse_id("building", building)?,
            },
        })
    }
}

/// One persisted unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedUnit {
    /// String id, `unit-N`.
    pub id: String,
    /// What the unit is.
    pub kind: UnitKind,
    /// Position.
    pub position: Vec2Fixed,
    /// Current health.
    pub health: u32,
    /// Maximum health.
    pub health_max: u32,
    /// Behavioral state with string references.
    pub state: SavedUnitState,
    /// Carried minerals.
    #[serde(with = "fixed_serde")]
    pub cargo_minerals: Fixed,
    /// Carried gas.
    #[serde(with = "fixed_serde")]
    pub cargo_gas: Fixed,
    /// Hatchery that spawned this larva, `building-N`.
    pub parent_hatchery: Option<String>,
}

/// One persisted building.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedBuilding {
    /// String id, `building-N`.
    pub id: String,
    /// What the building is.
    pub kind: BuildingKind,
    /// Position.
    pub position: Vec2Fixed,
    /// Current health.
    pub health: u32,
    /// Maximum health.
    pub health_max: u32,
    /// Whether construction finished.
    pub is_complete: bool,
    /// Cap granted once complete.
    pub supply_provided: u32,
}

/// One persisted resource node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedNode {
    /// String id, `node-N`.
    pub id: String,
    /// Position.
    pub position: Vec2Fixed,
    /// Remaining amount.
    #[serde(with = "fixed_serde")]
    pub amount: Fixed,
    /// Starting amount.
    #[serde(with = "fixed_serde")]
    pub max_amount: Fixed,
    /// Patch or geyser.
    pub kind: NodeKind,
}

/// One persisted production order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SavedOrder {
    /// A unit (or evolution) order.
    Unit {
        /// Role being produced.
        role: UnitRole,
        /// Display name.
        name: String,
        /// Refundable cost.
        cost: ResourceCost,
        /// Reserved population.
        population: u32,
        /// Cap granted on completion.
        supply_provided: u32,
        /// Health of the finished unit.
        health: u32,
        /// Egg this order hatches, `unit-N`.
        evolving_egg: Option<String>,
        /// Progress state.
        progress: Progress,
    },
    /// A building order.
    Building {
        /// The placed site, `building-N`.
        site: String,
        /// Kind under construction.
        kind: BuildingKind,
        /// Display name.
        name: String,
        /// Refundable cost.
        cost: ResourceCost,
        /// Progress state.
        progress: Progress,
    },
}

/// One persisted production queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedQueue {
    /// `building-N`, or `global` for the producer-less queue.
    pub producer: String,
    /// Orders, head first.
    pub items: Vec<SavedOrder>,
}

/// One persisted hatchery registry entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedHatchery {
    /// The hatchery, `building-N`.
    pub hatchery: String,
    /// Free larvae, `unit-N`, in spawn order.
    pub larvae: Vec<String>,
    /// Elapsed time of the last spawn.
    #[serde(with = "fixed_serde")]
    pub last_spawn: Fixed,
}

/// Everything needed to rebuild a [`SimulationWorld`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveGame {
    /// Format version.
    pub version: u32,
    /// Simulated faction.
    pub faction: FactionId,
    /// Seconds of simulated time.
    #[serde(with = "fixed_serde")]
    pub elapsed: Fixed,
    /// Ticks processed.
    pub tick_count: u64,
    /// Resource and population state.
    pub ledger: ResourceLedger,
    /// All units.
    pub units: Vec<SavedUnit>,
    /// All buildings.
    pub buildings: Vec<SavedBuilding>,
    /// All resource nodes.
    pub nodes: Vec<SavedNode>,
    /// Mineral assignment list, `unit-N`, in assignment order.
    pub mineral_workers: Vec<String>,
    /// Gas assignment list, `unit-N`, in assignment order.
    pub gas_workers: Vec<String>,
    /// All production queues.
    pub queues: Vec<SavedQueue>,
    /// All hatchery registry entries.
    pub hatcheries: Vec<SavedHatchery>,
    /// Gather tuning.
    pub gather_config: GatherConfig,
    /// Production tuning.
    pub production_config: ProductionConfig,
    /// Larva tuning.
    pub larva_config: LarvaConfig,
    /// PRNG state, bit exact.
    pub rng: Pcg32,
}

impl SaveGame {
    /// Capture the whole world into a persistable value.
    #[must_use]
    pub fn capture(world: &SimulationWorld) -> Self {
        let units = world
            .entities
            .sorted_unit_ids()
            .into_iter()
            .filter_map(|id| world.entities.unit(id))
            .map(|u| SavedUnit {
                id: unit_id(u.id),
                kind: u.kind,
                position: u.position,
                health: u.health.current,
                health_max: u.health.max,
                state: SavedUnitState::capture(u.state),
                cargo_minerals: u.cargo_minerals,
                cargo_gas: u.cargo_gas,
                parent_hatchery: u.parent_hatchery.map(building_id),
            })
            .collect();
        let buildings = world
            .entities
            .sorted_building_ids()
            .into_iter()
            .filter_map(|id| world.entities.building(id))
            .map(|b| SavedBuilding {
                id: building_id(b.id),
                kind: b.kind,
                position: b.position,
                health: b.health.current,
                health_max: b.health.max,
                is_complete: b.is_complete,
                supply_provided: b.supply_provided,
            })
            .collect();
        let nodes = world
            .nodes
            .sorted_ids()
            .into_iter()
            .filter_map(|id| world.nodes.get(id))
            .map(|n| SavedNode {
                id: node_id(n.id),
                position: n.position,
                amount: n.amount,
                max_amount: n.max_amount,
                kind: n.kind,
            })
            .collect();
        let queues = world
            .scheduler
            .sorted_keys()
            .into_iter()
            .map(|key| SavedQueue {
                producer: match key {
                    ProducerKey::Entity(id) => building_id(id),
                    ProducerKey::Global => "global".to_string(),
                },
                items: world
                    .scheduler
                    .queue(key)
                    .iter()
                    .map(|item| match item {
                        QueueItem::Unit(o) => SavedOrder::Unit {
                            role: o.role,
                            name: o.name.clone(),
                            cost: o.cost,
                            population: o.population,
                            supply_provided: o.supply_provided,
                            health: o.health,
                            evolving_egg: o.evolving_egg.map(unit_id),
                            progress: o.progress,
                        },
                        QueueItem::Building(o) => SavedOrder::Building {
                            site: building_id(o.site),
                            kind: o.kind,
                            name: o.name.clone(),
                            cost: o.cost,
                            progress: o.progress,
                        },
                    })
                    .collect(),
            })
            .collect();
        let hatcheries = world
            .larva
            .registry_entries()
            .into_iter()
            .map(|(hatchery, larvae, last_spawn)| SavedHatchery {
                hatchery: building_id(hatchery),
                larvae: larvae.iter().copied().map(unit_id).collect(),
                last_spawn,
            })
            .collect();

        Self {
            version: SAVE_VERSION,
            faction: world.faction,
            elapsed: world.elapsed,
            tick_count: world.tick_count,
            ledger: world.ledger,
            units,
            buildings,
            nodes,
            mineral_workers: world
                .gather
                .mineral_workers()
                .iter()
                .copied()
                .map(unit_id)
                .collect(),
            gas_workers: world
                .gather
                .gas_workers()
                .iter()
                .copied()
                .map(unit_id)
                .collect(),
            queues,
            hatcheries,
            gather_config: world.gather.config,
            production_config: world.scheduler.config,
            larva_config: world.larva.config,
            rng: world.rng.clone(),
        }
    }

    /// Serialize to bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| SimError::Persistence(e.to_string()))
    }

    /// Deserialize from bytes. Shape errors fail here; reference and
    /// invariant errors fail in [`SaveGame::restore`].
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        bincode::deserialize(data).map_err(|e| SimError::Persistence(e.to_string()))
    }

    /// Rebuild a live world, validating every reference and invariant.
    pub fn restore(&self) -> Result<SimulationWorld> {
        if self.version != SAVE_VERSION {
            return Err(SimError::Persistence(format!(
                "unsupported save version {}",
                self.version
            )));
        }
        self.validate_ledger()?;

        let mut nodes = ResourceNodeStore::new();
        for saved in &self.nodes {
            let id = NodeId(parse_id("node", &saved.id)?);
            if nodes.get(id).is_some() {
                return Err(SimError::Persistence(format!("duplicate node {}", saved.id)));
            }
            if saved.amount < Fixed::ZERO || saved.amount > saved.max_amount {
                return Err(SimError::Persistence(format!(
                    "node {} amount out of range",
                    saved.id
                )));
            }
            nodes.restore(ResourceNode {
                id,
                position: saved.position,
                amount: saved.amount,
                max_amount: saved.max_amount,
                kind: saved.kind,
            });
        }

        let mut entities = EntityStore::new();
        for saved in &self.buildings {
            let id = parse_id("building", &saved.id)?;
            if entities.building(id).is_some() {
                return Err(SimError::Persistence(format!(
                    "duplicate building {}",
                    saved.id
                )));
            }
            if saved.health > saved.health_max {
                return Err(SimError::Persistence(format!(
                    "building {} health out of range",
                    saved.id
                )));
            }
            entities.restore_building(Building {
                id,
                kind: saved.kind,
                position: saved.position,
                health: Health {
                    current: saved.health,
                    max: saved.health_max,
                },
                is_complete: saved.is_complete,
                supply_provided: saved.supply_provided,
            });
        }
        for saved in &self.units {
            let id = parse_id("unit", &saved.id)?;
            if entities.unit(id).is_some() {
                return Err(SimError::Persistence(format!("duplicate unit {}", saved.id)));
            }
            if saved.health > saved.health_max {
                return Err(SimError::Persistence(format!(
                    "unit {} health out of range",
                    saved.id
                )));
            }
            if saved.cargo_minerals < Fixed::ZERO || saved.cargo_gas < Fixed::ZERO {
                return Err(SimError::Persistence(format!(
                    "unit {} carries negative cargo",
                    saved.id
                )));
            }
            let state = saved.state.restore()?;
            let parent_hatchery = saved
                .parent_hatchery
                .as_deref()
                .map(|s| parse_id("building", s))
                .transpose()?;
            entities.restore_unit(Unit {
                id,
                kind: saved.kind,
                position: saved.position,
                health: Health {
                    current: saved.health,
                    max: saved.health_max,
                },
                state,
                cargo_minerals: saved.cargo_minerals,
                cargo_gas: saved.cargo_gas,
                parent_hatchery,
            });
        }

        Self::validate_references(&entities, &nodes)?;

        let mut gather = GatherSystem::new(self.gather_config);
        let mineral_workers = self.parse_worker_list(&self.mineral_workers, &entities)?;
        let gas_workers = self.parse_worker_list(&self.gas_workers, &entities)?;
        gather.restore_assignments(mineral_workers, gas_workers);
        Self::validate_gather_states(&entities, &gather)?;

        let mut scheduler = ProductionScheduler::new(self.production_config);
        for queue in &self.queues {
            let key = if queue.producer == "global" {
                ProducerKey::Global
            } else {
                let id = parse_id("building", &queue.producer)?;
                if entities.building(id).is_none() {
                    return Err(SimError::Persistence(format!(
                        "queue references missing producer {}",
                        queue.producer
                    )));
                }
                ProducerKey::Entity(id)
            };
            let mut items = Vec::with_capacity(queue.items.len());
            for order in &queue.items {
                items.push(Self::restore_order(order, &entities)?);
            }
            scheduler.restore_queue(key, items);
        }

        let mut larva = LarvaSystem::new(self.larva_config);
        for saved in &self.hatcheries {
            let hatchery = parse_id("building", &saved.hatchery)?;
            if entities.building(hatchery).is_none() {
                return Err(SimError::Persistence(format!(
                    "registry references missing hatchery {}",
                    saved.hatchery
                )));
            }
            let mut larvae = Vec::with_capacity(saved.larvae.len());
            for s in &saved.larvae {
                let id = parse_id("unit", s)?;
                if !entities.unit(id).is_some_and(Unit::is_free_larva) {
                    return Err(SimError::Persistence(format!(
                        "registry references {s} which is not a free larva"
                    )));
                }
                larvae.push(id);
            }
            larva.restore_hatchery(hatchery, larvae, saved.last_spawn);
        }

        let mut world = SimulationWorld::new(self.faction, 0);
        world.elapsed = self.elapsed;
        world.tick_count = self.tick_count;
        world.ledger = self.ledger;
        world.catalog = FactionCatalog::for_faction(self.faction);
        world.entities = entities;
        world.nodes = nodes;
        world.gather = gather;
        world.scheduler = scheduler;
        world.larva = larva;
        world.rng = self.rng.clone();
        world.pending_events.clear();
        Ok(world)
    }

    fn validate_ledger(&self) -> Result<()> {
        if self.ledger.minerals < Fixed::ZERO || self.ledger.gas < Fixed::ZERO {
            return Err(SimError::Persistence("negative stockpile".into()));
        }
        if self.ledger.population_max > POPULATION_HARD_CAP
            || self.ledger.population > self.ledger.population_max
        {
            return Err(SimError::Persistence("population out of range".into()));
        }
        Ok(())
    }

    /// Every handle embedded in a unit must resolve.
    fn validate_references(entities: &EntityStore, nodes: &ResourceNodeStore) -> Result<()> {
        for id in entities.sorted_unit_ids() {
            let Some(unit) = entities.unit(id) else { continue };
            if let Some(node) = unit.state.bound_node() {
                if nodes.get(node).is_none() {
                    return Err(SimError::Persistence(format!(
                        "unit-{id} bound to missing node-{}",
                        node.0
                    )));
                }
            }
            if let UnitState::Constructing { building } = unit.state {
                if entities.building(building).is_none() {
                    return Err(SimError::Persistence(format!(
                        "unit-{id} constructing missing building-{building}"
                    )));
                }
            }
            if let Some(hatchery) = unit.parent_hatchery {
                if entities.building(hatchery).is_none() {
                    return Err(SimError::Persistence(format!(
                        "unit-{id} references missing building-{hatchery}"
                    )));
                }
            }
        }
        Ok(())
    }

    /// A unit saved in a gathering state must appear in the matching
    /// assignment list, or the gather loop would never step it.
    fn validate_gather_states(entities: &EntityStore, gather: &GatherSystem) -> Result<()> {
        for id in entities.sorted_unit_ids() {
            let Some(unit) = entities.unit(id) else { continue };
            let listed = match unit.state {
                UnitState::Mining { .. } | UnitState::ReturningMinerals { .. } => {
                    gather.mineral_workers().contains(&id)
                }
                UnitState::HarvestingGas { .. } | UnitState::ReturningGas { .. } => {
                    gather.gas_workers().contains(&id)
                }
                _ => continue,
            };
            if !listed {
                return Err(SimError::Persistence(format!(
                    "unit-{id} is gathering but absent from the assignment lists"
                )));
            }
        }
        Ok(())
    }

    fn parse_worker_list(
        &self,
        list: &[String],
        entities: &EntityStore,
    ) -> Result<Vec<EntityId>> {
        let mut out = Vec::with_capacity(list.len());
        for s in list {
            let id = parse_id("unit", s)?;
            if !entities.unit(id).is_some_and(Unit::is_worker) {
                return Err(SimError::Persistence(format!(
                    "assignment list references {s} which is not a worker"
                )));
            }
            out.push(id);
        }
        Ok(out)
    }

    fn restore_order(order: &SavedOrder, entities: &EntityStore) -> Result<QueueItem> {
        Ok(match order {
            SavedOrder::Unit {
                role,
                name,
                cost,
                population,
                supply_provided,
                health,
                evolving_egg,
                progress,
            } => {
                let evolving_egg = match evolving_egg {
                    Some(s) => {
                        let id = parse_id("unit", s)?;
                        if !entities.unit(id).is_some_and(Unit::is_egg) {
                            return Err(SimError::Persistence(format!(
                                "order references {s} which is not an egg"
                            )));
                        }
                        Some(id)
                    }
                    None => None,
                };
                QueueItem::Unit(UnitOrder {
                    role: *role,
                    name: name.clone(),
                    cost: *cost,
                    population: *population,
                    supply_provided: *supply_provided,
                    health: *health,
                    evolving_egg,
                    progress: *progress,
                })
            }
            SavedOrder::Building {
                site,
                kind,
                name,
                cost,
                progress,
            } => {
                let site = parse_id("building", site)?;
                if entities.building(site).is_none() {
                    return Err(SimError::Persistence(format!(
                        "order references missing building-{site}"
                    )));
                }
                QueueItem::Building(BuildingOrder {
                    site,
                    kind: *kind,
                    name: name.clone(),
                    cost: *cost,
                    progress: *progress,
                })
            }
        })
    }
}
