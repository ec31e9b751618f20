//! Error types for the simulation core.
//!
//! Every expected failure of the command API maps to a [`SimError`]
//! variant; commands return `Result` and never panic. Persistence
//! problems are reported, not propagated as panics.

use thiserror::Error;

use crate::catalog::{BuildingKind, UnitRole};
use crate::entities::EntityId;

/// Result type alias using [`SimError`].
pub type Result<T> = std::result::Result<T, SimError>;

/// Top-level error type for all simulation command failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SimError {
    /// A building or unit key did not resolve against the catalog.
    #[error("invalid target: {0}")]
    InvalidTarget(String),

    /// Not enough minerals and/or gas for the requested order.
    #[error("insufficient resources: need {minerals} minerals, {gas} gas")]
    InsufficientResources {
        /// Mineral cost of the rejected order.
        minerals: i32,
        /// Gas cost of the rejected order.
        gas: i32,
    },

    /// The order needs population headroom that does not exist.
    #[error("population capped: {population}/{population_max}")]
    PopulationCapped {
        /// Current population.
        population: u32,
        /// Current population ceiling.
        population_max: u32,
    },

    /// No resource node is eligible for the requested assignment.
    #[error("no eligible resource node")]
    NoEligibleNode,

    /// The id does not resolve to a free larva.
    #[error("larva not found: {0}")]
    LarvaNotFound(EntityId),

    /// The larva's permitted evolution set does not contain the target.
    #[error("larva cannot evolve into {0:?}")]
    InvalidEvolution(UnitRole),

    /// The faction catalog has no entry for the requested unit role.
    #[error("unknown unit type: {0:?}")]
    UnknownUnitType(UnitRole),

    /// A prerequisite building is missing or incomplete.
    #[error("requires a completed {0:?}")]
    TechRequired(BuildingKind),

    /// Invalid entity reference.
    #[error("entity not found: {0}")]
    EntityNotFound(EntityId),

    /// The entity exists but is in a state the operation does not accept.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Save/load failure. Malformed saves fail closed with this variant.
    #[error("persistence failure: {0}")]
    Persistence(String),
}
