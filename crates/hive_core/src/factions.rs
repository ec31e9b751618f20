//! Faction definitions and identifiers.

use serde::{Deserialize, Serialize};

/// Unique identifier for factions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FactionId {
    /// The Vanguard - industrial colonists whose workers construct
    /// buildings by hand; extra builders speed construction up.
    Vanguard,
    /// The Swarm - a hive organism that grows units from larvae
    /// spawned at its hatchery-style bases.
    Swarm,
}

impl FactionId {
    /// Get the display name for this faction.
    #[must_use]
    pub const fn display_name(&self) -> &'static str {
        match self {
            Self::Vanguard => "The Vanguard",
            Self::Swarm => "The Swarm",
        }
    }

    /// Whether this faction grows units from larvae.
    #[must_use]
    pub const fn uses_larvae(&self) -> bool {
        matches!(self, Self::Swarm)
    }

    /// Whether workers must stand at a construction site for it to
    /// advance, with each extra builder adding throughput.
    #[must_use]
    pub const fn builders_assist(&self) -> bool {
        matches!(self, Self::Vanguard)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_faction_mechanics_are_exclusive() {
        assert!(FactionId::Vanguard.builders_assist());
        assert!(!FactionId::Vanguard.uses_larvae());
        assert!(FactionId::Swarm.uses_larvae());
        assert!(!FactionId::Swarm.builders_assist());
    }
}
