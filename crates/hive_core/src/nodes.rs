//! Resource node store: mineral patches and gas geysers.
//!
//! Node amounts only ever decrease under gathering and never go
//! negative; [`ResourceNode::extract`] returns the amount actually taken.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::math::{fixed_serde, Fixed, Vec2Fixed};
use crate::resources::ResourceKind;

/// Handle for a resource node.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct NodeId(pub u64);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What a node yields, plus gas-specific extractor state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    /// A mineral patch, mineable as-is.
    MineralPatch,
    /// A gas geyser; harvestable only through a completed extractor.
    GasGeyser {
        /// Whether a completed extraction structure covers this geyser.
        has_extractor: bool,
    },
}

/// A gatherable resource node in the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceNode {
    /// Handle of this node.
    pub id: NodeId,
    /// Position in world space.
    pub position: Vec2Fixed,
    /// Remaining amount.
    #[serde(with = "fixed_serde")]
    pub amount: Fixed,
    /// Amount the node started with.
    #[serde(with = "fixed_serde")]
    pub max_amount: Fixed,
    /// Patch or geyser.
    pub kind: NodeKind,
}

impl ResourceNode {
    /// Which currency this node yields.
    #[must_use]
    pub const fn resource_kind(&self) -> ResourceKind {
        match self.kind {
            NodeKind::MineralPatch => ResourceKind::Minerals,
            NodeKind::GasGeyser { .. } => ResourceKind::Gas,
        }
    }

    /// Check if this node is exhausted.
    #[must_use]
    pub fn is_depleted(&self) -> bool {
        self.amount <= Fixed::ZERO
    }

    /// Whether a worker could gather here right now (depletion and,
    /// for geysers, extractor coverage).
    #[must_use]
    pub fn is_harvestable(&self) -> bool {
        if self.is_depleted() {
            return false;
        }
        match self.kind {
            NodeKind::MineralPatch => true,
            NodeKind::GasGeyser { has_extractor } => has_extractor,
        }
    }

    /// Extract up to `requested`, clamped to what remains.
    ///
    /// Returns the actual amount extracted.
    pub fn extract(&mut self, requested: Fixed) -> Fixed {
        if requested <= Fixed::ZERO {
            return Fixed::ZERO;
        }
        let extracted = requested.min(self.amount);
        self.amount -= extracted;
        extracted
    }
}

/// Owner of all resource nodes, addressed by [`NodeId`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceNodeStore {
    nodes: HashMap<NodeId, ResourceNode>,
    next_id: u64,
}

impl ResourceNodeStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
            next_id: 1,
        }
    }

    /// Add a mineral patch and return its handle.
    pub fn add_mineral_patch(&mut self, position: Vec2Fixed, amount: Fixed) -> NodeId {
        self.insert(position, amount, NodeKind::MineralPatch)
    }

    /// Add a gas geyser (without extractor) and return its handle.
    pub fn add_gas_geyser(&mut self, position: Vec2Fixed, amount: Fixed) -> NodeId {
        self.insert(position, amount, NodeKind::GasGeyser { has_extractor: false })
    }

    fn insert(&mut self, position: Vec2Fixed, amount: Fixed, kind: NodeKind) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        self.nodes.insert(
            id,
            ResourceNode {
                id,
                position,
                amount,
                max_amount: amount,
                kind,
            },
        );
        id
    }

    /// Re-insert a node with an explicit id (snapshot restore only).
    pub(crate) fn restore(&mut self, node: ResourceNode) {
        self.next_id = self.next_id.max(node.id.0 + 1);
        self.nodes.insert(node.id, node);
    }

    /// Get a node by handle.
    #[must_use]
    pub fn get(&self, id: NodeId) -> Option<&ResourceNode> {
        self.nodes.get(&id)
    }

    /// Get a node mutably.
    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut ResourceNode> {
        self.nodes.get_mut(&id)
    }

    /// Remove a node.
    pub fn remove(&mut self, id: NodeId) -> Option<ResourceNode> {
        self.nodes.remove(&id)
    }

    /// Number of nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Sorted handles for deterministic iteration.
    #[must_use]
    pub fn sorted_ids(&self) -> Vec<NodeId> {
        let mut ids: Vec<_> = self.nodes.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Iterate over all nodes (not in deterministic order).
    pub fn iter(&self) -> impl Iterator<Item = &ResourceNode> {
        self.nodes.values()
    }

    /// Mark the geyser covering `id` as having (or losing) an extractor.
    ///
    /// No-op for mineral patches.
    pub fn set_extractor(&mut self, id: NodeId, present: bool) {
        if let Some(node) = self.nodes.get_mut(&id) {
            if let NodeKind::GasGeyser { ref mut has_extractor } = node.kind {
                *has_extractor = present;
            }
        }
    }

    /// Find the geyser whose position matches `position` within `radius`.
    #[must_use]
    pub fn geyser_at(&self, position: Vec2Fixed, radius: Fixed) -> Option<NodeId> {
        self.sorted_ids().into_iter().find(|id| {
            self.nodes.get(id).is_some_and(|node| {
                matches!(node.kind, NodeKind::GasGeyser { .. })
                    && node.position.within_range(position, radius)
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(x: i32, z: i32) -> Vec2Fixed {
        Vec2Fixed::new(Fixed::from_num(x), Fixed::from_num(z))
    }

    #[test]
    fn test_extract_clamps_to_remaining() {
        let mut store = ResourceNodeStore::new();
        let id = store.add_mineral_patch(pos(0, 0), Fixed::from_num(100));

        let node = store.get_mut(id).unwrap();
        assert_eq!(node.extract(Fixed::from_num(30)), Fixed::from_num(30));
        assert_eq!(node.amount, Fixed::from_num(70));

        // More than remaining: take what's left, never go negative
        assert_eq!(node.extract(Fixed::from_num(100)), Fixed::from_num(70));
        assert_eq!(node.amount, Fixed::ZERO);
        assert!(node.is_depleted());
    }

    #[test]
    fn test_geyser_needs_extractor_to_harvest() {
        let mut store = ResourceNodeStore::new();
        let id = store.add_gas_geyser(pos(5, 5), Fixed::from_num(500));

        assert!(!store.get(id).unwrap().is_harvestable());
        store.set_extractor(id, true);
        assert!(store.get(id).unwrap().is_harvestable());
    }

    #[test]
    fn test_set_extractor_ignores_mineral_patch() {
        let mut store = ResourceNodeStore::new();
        let id = store.add_mineral_patch(pos(0, 0), Fixed::from_num(100));
        store.set_extractor(id, true);
        assert_eq!(store.get(id).unwrap().kind, NodeKind::MineralPatch);
    }

    #[test]
    fn test_geyser_at_matches_position() {
        let mut store = ResourceNodeStore::new();
        let _patch = store.add_mineral_patch(pos(10, 10), Fixed::from_num(100));
        let geyser = store.add_gas_geyser(pos(20, 20), Fixed::from_num(500));

        assert_eq!(store.geyser_at(pos(20, 20), Fixed::from_num(1)), Some(geyser));
        // A patch at the probe point is not a geyser
        assert_eq!(store.geyser_at(pos(10, 10), Fixed::from_num(1)), None);
    }

    #[test]
    fn test_sorted_ids_are_stable() {
        let mut store = ResourceNodeStore::new();
        let a = store.add_mineral_patch(pos(0, 0), Fixed::from_num(1));
        let b = store.add_mineral_patch(pos(1, 0), Fixed::from_num(1));
        let c = store.add_gas_geyser(pos(2, 0), Fixed::from_num(1));
        assert_eq!(store.sorted_ids(), vec![a, b, c]);
    }
}
