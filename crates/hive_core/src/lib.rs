//! # Hive Core
//!
//! Deterministic economy and production simulation for Hive RTS.
//!
//! This crate contains **only** deterministic logic:
//! - No rendering
//! - No IO beyond the save-game data shapes
//! - No system randomness (seeded PRNG only)
//! - No floating-point math (uses fixed-point)
//!
//! This separation enables:
//! - Lockstep multiplayer (identical simulation across clients)
//! - Headless server builds
//! - Replay systems
//! - Determinism testing
//!
//! ## Crate Structure
//!
//! - [`catalog`] - Static per-faction unit and building definitions
//! - [`resources`] - Stockpile and population ledger
//! - [`nodes`] - Mineral patches and gas geysers
//! - [`entities`] - Units, buildings, and their store
//! - [`gather`] - Worker gather state machine
//! - [`production`] - Per-producer build queues
//! - [`larva`] - Swarm larva spawning and evolution
//! - [`world`] - The owned world value, command API, and tick
//! - [`snapshot`] - Save-game capture and restore
//! - [`math`] - Fixed-point math utilities

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod catalog;
pub mod entities;
pub mod error;
pub mod events;
pub mod factions;
pub mod gather;
pub mod larva;
pub mod math;
pub mod nodes;
pub mod production;
pub mod resources;
pub mod snapshot;
pub mod world;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::catalog::{
        BuildingKind, BuildingSpec, FactionCatalog, ResourceCost, UnitRole, UnitSpec,
    };
    pub use crate::entities::{
        Building, EntityId, EntityStore, Health, LarvaPhase, Unit, UnitKind, UnitState,
    };
    pub use crate::error::{Result, SimError};
    pub use crate::events::{EventLog, EventSink, NullSink, SimEvent};
    pub use crate::factions::FactionId;
    pub use crate::gather::{GatherConfig, GatherSystem};
    pub use crate::larva::{LarvaConfig, LarvaSystem};
    pub use crate::math::{Fixed, Vec2Fixed};
    pub use crate::nodes::{NodeId, NodeKind, ResourceNode, ResourceNodeStore};
    pub use crate::production::{
        ProducerKey, ProductionConfig, ProductionScheduler, Progress, QueueItem,
    };
    pub use crate::resources::{ResourceKind, ResourceLedger, POPULATION_HARD_CAP};
    pub use crate::snapshot::SaveGame;
    pub use crate::world::SimulationWorld;
}
