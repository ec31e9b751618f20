//! Resource ledger: minerals, gas, and the population count/cap.
//!
//! Invariants maintained by every operation:
//! - `minerals >= 0` and `gas >= 0`
//! - `population <= population_max <= 200`
//!
//! All amounts are fixed-point because gathering accrues fractional
//! quantities per tick; costs remain whole numbers.

use serde::{Deserialize, Serialize};

use crate::catalog::ResourceCost;
use crate::math::{fixed_serde, Fixed};

/// Hard ceiling on the population cap.
pub const POPULATION_HARD_CAP: u32 = 200;

/// The two resource currencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    /// Mined from mineral patches.
    Minerals,
    /// Harvested from geysers through an extractor.
    Gas,
}

/// Faction-wide resource and population state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceLedger {
    /// Current mineral stockpile.
    #[serde(with = "fixed_serde")]
    pub minerals: Fixed,
    /// Current gas stockpile.
    #[serde(with = "fixed_serde")]
    pub gas: Fixed,
    /// Population currently alive or reserved by accepted orders.
    pub population: u32,
    /// Current population ceiling.
    pub population_max: u32,
}

impl ResourceLedger {
    /// Create a ledger with a starting stockpile and population cap.
    ///
    /// The cap is clamped to [`POPULATION_HARD_CAP`].
    #[must_use]
    pub fn new(minerals: i32, gas: i32, population_max: u32) -> Self {
        Self {
            minerals: Fixed::from_num(minerals.max(0)),
            gas: Fixed::from_num(gas.max(0)),
            population: 0,
            population_max: population_max.min(POPULATION_HARD_CAP),
        }
    }

    /// Check if the stockpile covers a cost.
    #[must_use]
    pub fn can_afford(&self, cost: ResourceCost) -> bool {
        self.minerals >= Fixed::from_num(cost.minerals) && self.gas >= Fixed::from_num(cost.gas)
    }

    /// Check if `n` more population fits under the cap.
    #[must_use]
    pub const fn can_add_population(&self, n: u32) -> bool {
        self.population + n <= self.population_max && self.population + n <= POPULATION_HARD_CAP
    }

    /// Spend a cost atomically: both currencies are decremented or neither is.
    ///
    /// Returns `true` if the transaction succeeded.
    pub fn spend(&mut self, cost: ResourceCost) -> bool {
        if !self.can_afford(cost) {
            return false;
        }
        self.minerals -= Fixed::from_num(cost.minerals);
        self.gas -= Fixed::from_num(cost.gas);
        true
    }

    /// Return a previously spent cost to the stockpile.
    pub fn refund(&mut self, cost: ResourceCost) {
        self.minerals += Fixed::from_num(cost.minerals);
        self.gas += Fixed::from_num(cost.gas);
    }

    /// Deposit a gathered amount of one resource.
    pub fn deposit(&mut self, kind: ResourceKind, amount: Fixed) {
        if amount <= Fixed::ZERO {
            return;
        }
        match kind {
            ResourceKind::Minerals => self.minerals += amount,
            ResourceKind::Gas => self.gas += amount,
        }
    }

    /// Reserve population for an accepted order.
    ///
    /// Returns `false` (and changes nothing) if the cap would be exceeded.
    pub fn add_population(&mut self, n: u32) -> bool {
        if !self.can_add_population(n) {
            return false;
        }
        self.population += n;
        true
    }

    /// Release population held by a removed unit or cancelled order.
    pub fn release_population(&mut self, n: u32) {
        self.population = self.population.saturating_sub(n);
    }

    /// Raise the population cap, saturating at [`POPULATION_HARD_CAP`].
    pub fn raise_population_max(&mut self, n: u32) {
        self.population_max = (self.population_max + n).min(POPULATION_HARD_CAP);
    }
}

impl Default for ResourceLedger {
    fn default() -> Self {
        Self::new(0, 0, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spend_is_atomic() {
        let mut ledger = ResourceLedger::new(100, 10, 10);

        // Affordable in minerals but not gas: nothing changes
        assert!(!ledger.spend(ResourceCost::new(50, 25)));
        assert_eq!(ledger.minerals, Fixed::from_num(100));
        assert_eq!(ledger.gas, Fixed::from_num(10));

        assert!(ledger.spend(ResourceCost::new(50, 10)));
        assert_eq!(ledger.minerals, Fixed::from_num(50));
        assert_eq!(ledger.gas, Fixed::from_num(0));
    }

    #[test]
    fn test_refund_restores_spent_cost() {
        let mut ledger = ResourceLedger::new(100, 50, 10);
        let cost = ResourceCost::new(75, 25);
        assert!(ledger.spend(cost));
        ledger.refund(cost);
        assert_eq!(ledger.minerals, Fixed::from_num(100));
        assert_eq!(ledger.gas, Fixed::from_num(50));
    }

    #[test]
    fn test_population_respects_cap() {
        let mut ledger = ResourceLedger::new(0, 0, 10);
        assert!(ledger.add_population(10));
        assert!(!ledger.add_population(1));
        assert_eq!(ledger.population, 10);

        ledger.raise_population_max(5);
        assert!(ledger.add_population(1));
    }

    #[test]
    fn test_population_max_saturates_at_hard_cap() {
        let mut ledger = ResourceLedger::new(0, 0, 190);
        ledger.raise_population_max(50);
        assert_eq!(ledger.population_max, POPULATION_HARD_CAP);

        let capped = ResourceLedger::new(0, 0, 500);
        assert_eq!(capped.population_max, POPULATION_HARD_CAP);
    }

    #[test]
    fn test_release_population_saturates() {
        let mut ledger = ResourceLedger::new(0, 0, 10);
        ledger.add_population(3);
        ledger.release_population(5);
        assert_eq!(ledger.population, 0);
    }

    #[test]
    fn test_deposit_ignores_non_positive() {
        let mut ledger = ResourceLedger::new(0, 0, 0);
        ledger.deposit(ResourceKind::Minerals, Fixed::from_num(-5));
        assert_eq!(ledger.minerals, Fixed::ZERO);
        ledger.deposit(ResourceKind::Gas, Fixed::from_num(12.5));
        assert_eq!(ledger.gas, Fixed::from_num(12.5));
    }
}
