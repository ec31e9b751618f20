//! Simulation events and the observer seam.
//!
//! Systems append events to a buffer during a tick; the world drains the
//! buffer into whatever [`EventSink`] the caller passed. The core never
//! renders or logs on its own behalf beyond `tracing`.

use serde::{Deserialize, Serialize};

use crate::catalog::{BuildingKind, UnitRole};
use crate::entities::EntityId;
use crate::math::{fixed_serde, Fixed};
use crate::nodes::NodeId;
use crate::resources::ResourceKind;

/// Something observable that happened inside the simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SimEvent {
    /// Stockpile totals changed.
    ResourceChanged {
        /// Current mineral stockpile.
        #[serde(with = "fixed_serde")]
        minerals: Fixed,
        /// Current gas stockpile.
        #[serde(with = "fixed_serde")]
        gas: Fixed,
    },
    /// Population or population cap changed.
    PopulationChanged {
        /// Units alive plus reservations in the queue.
        population: u32,
        /// Current cap.
        population_max: u32,
    },
    /// A worker was bound to a resource node.
    WorkerAssigned {
        /// The worker.
        worker: EntityId,
        /// The node it will gather from.
        node: NodeId,
        /// What the node yields.
        kind: ResourceKind,
    },
    /// A worker filled its cargo and turned back to base.
    WorkerCargoFull {
        /// The worker.
        worker: EntityId,
        /// Amount carried.
        #[serde(with = "fixed_serde")]
        cargo: Fixed,
    },
    /// A worker dropped its cargo into the stockpile.
    WorkerDeposited {
        /// The worker.
        worker: EntityId,
        /// What was deposited.
        kind: ResourceKind,
        /// Amount deposited.
        #[serde(with = "fixed_serde")]
        amount: Fixed,
    },
    /// A resource node ran dry.
    NodeDepleted {
        /// The node.
        node: NodeId,
    },
    /// An order entered the production queue.
    ProductionStarted {
        /// Producer the order is bound to.
        producer: EntityId,
        /// Human-readable name of the ordered unit or building.
        name: String,
    },
    /// An order finished.
    ProductionCompleted {
        /// Producer the order was bound to.
        producer: EntityId,
        /// Human-readable name of the finished unit or building.
        name: String,
    },
    /// An order was cancelled and refunded.
    ProductionCancelled {
        /// Producer the order was bound to.
        producer: EntityId,
        /// Human-readable name of the cancelled unit or building.
        name: String,
    },
    /// A unit entered the world.
    UnitAdded {
        /// The new unit.
        unit: EntityId,
        /// Its catalog role.
        role: UnitRole,
    },
    /// A unit left the world.
    UnitRemoved {
        /// The removed unit.
        unit: EntityId,
    },
    /// A construction site was placed.
    BuildingAdded {
        /// The new building.
        building: EntityId,
        /// Its catalog kind.
        kind: BuildingKind,
    },
    /// A building left the world.
    BuildingRemoved {
        /// The removed building.
        building: EntityId,
    },
    /// A building finished construction.
    BuildingCompleted {
        /// The building.
        building: EntityId,
        /// Its catalog kind.
        kind: BuildingKind,
    },
    /// A hatchery produced a larva.
    LarvaSpawned {
        /// The spawning hatchery.
        hatchery: EntityId,
        /// The new larva.
        larva: EntityId,
    },
    /// A larva turned into an egg.
    LarvaEvolutionStarted {
        /// The larva (now egg).
        larva: EntityId,
        /// Role it will hatch into.
        target: UnitRole,
    },
    /// An egg hatched into a finished unit.
    EggHatched {
        /// The consumed egg.
        egg: EntityId,
        /// The hatched unit.
        unit: EntityId,
        /// Its catalog role.
        role: UnitRole,
    },
}

/// Observer for simulation events.
pub trait EventSink {
    /// Receive one event.
    fn emit(&mut self, event: SimEvent);
}

/// Sink that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&mut self, _event: SimEvent) {}
}

/// Sink that keeps every event, for tests and replay tooling.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Vec<SimEvent>,
}

impl EventLog {
    /// Create an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All events received so far, in order.
    #[must_use]
    pub fn events(&self) -> &[SimEvent] {
        &self.events
    }

    /// Drop all recorded events.
    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// Whether any recorded event satisfies `pred`.
    pub fn any(&self, pred: impl FnMut(&SimEvent) -> bool) -> bool {
        self.events.iter().any(pred)
    }

    /// Count of recorded events satisfying `pred`.
    pub fn count(&self, pred: impl FnMut(&&SimEvent) -> bool) -> usize {
        self.events.iter().filter(pred).count()
    }
}

impl EventSink for EventLog {
    fn emit(&mut self, event: SimEvent) {
        self.events.push(event);
    }
}

impl EventSink for Vec<SimEvent> {
    fn emit(&mut self, event: SimEvent) {
        self.push(event);
    }
}
