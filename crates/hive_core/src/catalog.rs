//! Static faction catalogs: unit and building definitions.
//!
//! A [`FactionCatalog`] is resolved once at faction load time and is
//! read-only afterwards. Lookups are keyed by the closed [`UnitRole`] and
//! [`BuildingKind`] enums, so there is no string-keyed branching at
//! runtime and a `match` over either key is compiler-checked.
//!
//! Catalogs can also be loaded from RON for data-driven balancing.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::factions::FactionId;
use crate::math::{fixed_serde, Fixed};

/// Closed set of unit roles a faction can field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnitRole {
    /// Resource gatherer and (for the Vanguard) builder.
    Worker,
    /// Mobile supply provider (Swarm only); raises the population cap.
    Supply,
    /// Basic melee combat unit.
    Melee,
    /// Ranged combat unit; gated behind a production structure.
    Ranged,
}

/// Closed set of building kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BuildingKind {
    /// Main base: resource deposit point and (for the Swarm) larva source.
    Headquarters,
    /// Gas-extraction structure built over a geyser.
    Extractor,
    /// Combat unit production structure; also the Swarm's evolution
    /// prerequisite for combat strains.
    Barracks,
    /// Static supply structure (Vanguard only); raises the population cap.
    SupplyCache,
}

/// Mineral/gas price of a unit or building.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResourceCost {
    /// Mineral component.
    pub minerals: i32,
    /// Gas component.
    pub gas: i32,
}

impl ResourceCost {
    /// Create a new cost.
    #[must_use]
    pub const fn new(minerals: i32, gas: i32) -> Self {
        Self { minerals, gas }
    }
}

/// Catalog entry for a unit role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitSpec {
    /// The role this entry defines.
    pub role: UnitRole,
    /// Display name.
    pub name: String,
    /// Mineral/gas price.
    pub cost: ResourceCost,
    /// Build time in seconds.
    #[serde(with = "fixed_serde")]
    pub build_time: Fixed,
    /// Maximum health points.
    pub health: u32,
    /// Population consumed while the unit is alive.
    pub population: u32,
    /// Population cap raised on completion (supply units only).
    pub supply_provided: u32,
    /// Building that must exist complete before this unit can be ordered.
    pub requires: Option<BuildingKind>,
}

/// Catalog entry for a building kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildingSpec {
    /// The kind this entry defines.
    pub kind: BuildingKind,
    /// Display name.
    pub name: String,
    /// Mineral/gas price.
    pub cost: ResourceCost,
    /// Construction time in seconds.
    #[serde(with = "fixed_serde")]
    pub build_time: Fixed,
    /// Maximum health points.
    pub health: u32,
    /// Population cap raised on completion.
    pub supply_provided: u32,
    /// Unit roles this building produces directly.
    pub produces: Vec<UnitRole>,
}

impl BuildingSpec {
    /// Check if this building can produce a given role.
    #[must_use]
    pub fn can_produce(&self, role: UnitRole) -> bool {
        self.produces.contains(&role)
    }
}

/// Complete, read-only definition set for one faction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactionCatalog {
    /// The faction these definitions belong to.
    pub faction: FactionId,
    /// Unit entries keyed by role.
    units: HashMap<UnitRole, UnitSpec>,
    /// Building entries keyed by kind.
    buildings: HashMap<BuildingKind, BuildingSpec>,
    /// Roles a free larva is permitted to evolve into.
    evolvable: Vec<UnitRole>,
}

impl FactionCatalog {
    /// Build the default catalog for a faction.
    #[must_use]
    pub fn for_faction(faction: FactionId) -> Self {
        match faction {
            FactionId::Vanguard => Self::vanguard(),
            FactionId::Swarm => Self::swarm(),
        }
    }

    /// Load a catalog from a RON string.
    ///
    /// # Errors
    ///
    /// Returns the RON parse error if the string is malformed.
    pub fn from_ron_str(source: &str) -> std::result::Result<Self, ron::error::SpannedError> {
        ron::from_str(source)
    }

    /// Look up a unit entry. `None` means this faction cannot field the role.
    #[must_use]
    pub fn unit(&self, role: UnitRole) -> Option<&UnitSpec> {
        self.units.get(&role)
    }

    /// Look up a building entry.
    #[must_use]
    pub fn building(&self, kind: BuildingKind) -> Option<&BuildingSpec> {
        self.buildings.get(&kind)
    }

    /// Whether a free larva may evolve into the given role.
    #[must_use]
    pub fn can_evolve_into(&self, role: UnitRole) -> bool {
        self.evolvable.contains(&role)
    }

    fn vanguard() -> Self {
        let units = [
            UnitSpec {
                role: UnitRole::Worker,
                name: "Fabricator".to_string(),
                cost: ResourceCost::new(50, 0),
                build_time: Fixed::from_num(17),
                health: 40,
                population: 1,
                supply_provided: 0,
                requires: None,
            },
            UnitSpec {
                role: UnitRole::Melee,
                name: "Breacher".to_string(),
                cost: ResourceCost::new(50, 0),
                build_time: Fixed::from_num(25),
                health: 60,
                population: 1,
                supply_provided: 0,
                requires: Some(BuildingKind::Barracks),
            },
            UnitSpec {
                role: UnitRole::Ranged,
                name: "Lancer".to_string(),
                cost: ResourceCost::new(75, 25),
                build_time: Fixed::from_num(30),
                health: 50,
                population: 2,
                supply_provided: 0,
                requires: Some(BuildingKind::Barracks),
            },
        ];
        let buildings = [
            BuildingSpec {
                kind: BuildingKind::Headquarters,
                name: "Command Post".to_string(),
                cost: ResourceCost::new(400, 0),
                build_time: Fixed::from_num(100),
                health: 1500,
                supply_provided: 10,
                produces: vec![UnitRole::Worker],
            },
            BuildingSpec {
                kind: BuildingKind::Extractor,
                name: "Gas Rig".to_string(),
                cost: ResourceCost::new(75, 0),
                build_time: Fixed::from_num(30),
                health: 500,
                supply_provided: 0,
                produces: Vec::new(),
            },
            BuildingSpec {
                kind: BuildingKind::Barracks,
                name: "Muster Hall".to_string(),
                cost: ResourceCost::new(150, 0),
                build_time: Fixed::from_num(65),
                health: 1000,
                supply_provided: 0,
                produces: vec![UnitRole::Melee, UnitRole::Ranged],
            },
            BuildingSpec {
                kind: BuildingKind::SupplyCache,
                name: "Supply Cache".to_string(),
                cost: ResourceCost::new(100, 0),
                build_time: Fixed::from_num(40),
                health: 400,
                supply_provided: 8,
                produces: Vec::new(),
            },
        ];
        Self {
            faction: FactionId::Vanguard,
            units: units.into_iter().map(|u| (u.role, u)).collect(),
            buildings: buildings.into_iter().map(|b| (b.kind, b)).collect(),
            evolvable: Vec::new(),
        }
    }

    fn swarm() -> Self {
        let units = [
            UnitSpec {
                role: UnitRole::Worker,
                name: "Drone".to_string(),
                cost: ResourceCost::new(50, 0),
                build_time: Fixed::from_num(17),
                health: 40,
                population: 1,
                supply_provided: 0,
                requires: None,
            },
            UnitSpec {
                role: UnitRole::Supply,
                name: "Windcarrier".to_string(),
                cost: ResourceCost::new(100, 0),
                build_time: Fixed::from_num(25),
                health: 200,
                population: 0,
                supply_provided: 8,
                requires: None,
            },
            UnitSpec {
                role: UnitRole::Melee,
                name: "Render".to_string(),
                cost: ResourceCost::new(50, 0),
                build_time: Fixed::from_num(24),
                health: 35,
                population: 1,
                supply_provided: 0,
                requires: Some(BuildingKind::Barracks),
            },
            UnitSpec {
                role: UnitRole::Ranged,
                name: "Spitter".to_string(),
                cost: ResourceCost::new(75, 25),
                build_time: Fixed::from_num(28),
                health: 45,
                population: 1,
                supply_provided: 0,
                requires: Some(BuildingKind::Barracks),
            },
        ];
        let buildings = [
            BuildingSpec {
                kind: BuildingKind::Headquarters,
                name: "Hive Mound".to_string(),
                cost: ResourceCost::new(350, 0),
                build_time: Fixed::from_num(100),
                health: 1250,
                supply_provided: 10,
                produces: Vec::new(),
            },
            BuildingSpec {
                kind: BuildingKind::Extractor,
                name: "Sap Well".to_string(),
                cost: ResourceCost::new(50, 0),
                build_time: Fixed::from_num(30),
                health: 450,
                supply_provided: 0,
                produces: Vec::new(),
            },
            BuildingSpec {
                kind: BuildingKind::Barracks,
                name: "Birthing Den".to_string(),
                cost: ResourceCost::new(150, 0),
                build_time: Fixed::from_num(65),
                health: 900,
                supply_provided: 0,
                produces: Vec::new(),
            },
        ];
        Self {
            faction: FactionId::Swarm,
            units: units.into_iter().map(|u| (u.role, u)).collect(),
            buildings: buildings.into_iter().map(|b| (b.kind, b)).collect(),
            evolvable: vec![
                UnitRole::Worker,
                UnitRole::Supply,
                UnitRole::Melee,
                UnitRole::Ranged,
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vanguard_has_no_supply_unit() {
        let catalog = FactionCatalog::for_faction(FactionId::Vanguard);
        assert!(catalog.unit(UnitRole::Worker).is_some());
        assert!(catalog.unit(UnitRole::Supply).is_none());
        assert!(!catalog.can_evolve_into(UnitRole::Worker));
    }

    #[test]
    fn test_swarm_evolution_set() {
        let catalog = FactionCatalog::for_faction(FactionId::Swarm);
        assert!(catalog.can_evolve_into(UnitRole::Worker));
        assert!(catalog.can_evolve_into(UnitRole::Supply));
        assert!(catalog.can_evolve_into(UnitRole::Ranged));
        // Combat strains are gated behind the den
        assert_eq!(
            catalog.unit(UnitRole::Melee).unwrap().requires,
            Some(BuildingKind::Barracks)
        );
    }

    #[test]
    fn test_supply_unit_is_population_free() {
        let catalog = FactionCatalog::for_faction(FactionId::Swarm);
        let supply = catalog.unit(UnitRole::Supply).unwrap();
        assert_eq!(supply.population, 0);
        assert!(supply.supply_provided > 0);
    }

    #[test]
    fn test_barracks_produces_combat_roles() {
        let catalog = FactionCatalog::for_faction(FactionId::Vanguard);
        let barracks = catalog.building(BuildingKind::Barracks).unwrap();
        assert!(barracks.can_produce(UnitRole::Melee));
        assert!(barracks.can_produce(UnitRole::Ranged));
        assert!(!barracks.can_produce(UnitRole::Worker));
    }

    #[test]
    fn test_catalog_ron_roundtrip() {
        let catalog = FactionCatalog::for_faction(FactionId::Swarm);
        let text = ron::to_string(&catalog).unwrap();
        let reloaded = FactionCatalog::from_ron_str(&text).unwrap();
        assert_eq!(catalog, reloaded);
    }
}
