//! Exclusive tile ownership.
//!
//! The registry wraps a [`SpatialGraph`] and is the only code path that flips
//! a node's occupied flag. Each occupied node also records its holder so
//! releases can be checked and tiles can report who stands on them.

use crate::graph::SpatialGraph;
use crate::id::{AgentId, NodeIndex, Team};

/// Errors from reservation and release. Both indicate a caller bug.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OccupancyError {
    #[error("node out of bounds: {0:?}")]
    NodeOutOfBounds(NodeIndex),
    #[error("node {node:?} is already held by {holder:?}")]
    AlreadyOccupied { node: NodeIndex, holder: AgentId },
    #[error("{agent:?} does not hold node {node:?} (holder: {holder:?})")]
    NotHolder {
        node: NodeIndex,
        agent: AgentId,
        holder: Option<AgentId>,
    },
}

#[derive(Debug, Clone)]
pub struct OccupancyRegistry {
    graph: SpatialGraph,
    holders: Vec<Option<AgentId>>,
}

impl OccupancyRegistry {
    /// Take ownership of `graph`. Any occupied flags it carries are cleared.
    pub fn new(mut graph: SpatialGraph) -> Self {
        let count = graph.node_count();
        for i in 0..count {
            graph.set_occupied(NodeIndex(i as u32), false);
        }
        Self {
            graph,
            holders: vec![None; count],
        }
    }

    pub fn graph(&self) -> &SpatialGraph {
        &self.graph
    }

    pub fn is_free(&self, node: NodeIndex) -> bool {
        matches!(self.holders.get(node.as_usize()), Some(None))
    }

    pub fn holder(&self, node: NodeIndex) -> Option<AgentId> {
        self.holders.get(node.as_usize()).copied().flatten()
    }

    /// Claim `node` for `agent`. Fails instead of overwriting an existing
    /// claim.
    pub fn reserve(&mut self, node: NodeIndex, agent: AgentId) -> Result<(), OccupancyError> {
        let slot = self
            .holders
            .get_mut(node.as_usize())
            .ok_or(OccupancyError::NodeOutOfBounds(node))?;
        if let Some(holder) = *slot {
            return Err(OccupancyError::AlreadyOccupied { node, holder });
        }
        *slot = Some(agent);
        self.graph.set_occupied(node, true);
        Ok(())
    }

    /// Give `node` back. Only its current holder may do this.
    pub fn release(&mut self, node: NodeIndex, agent: AgentId) -> Result<(), OccupancyError> {
        let slot = self
            .holders
            .get_mut(node.as_usize())
            .ok_or(OccupancyError::NodeOutOfBounds(node))?;
        if *slot != Some(agent) {
            return Err(OccupancyError::NotHolder {
                node,
                agent,
                holder: *slot,
            });
        }
        *slot = None;
        self.graph.set_occupied(node, false);
        Ok(())
    }

    /// First free node scanning from the team's anchor: index 0 upward for
    /// the player, the last index downward for the enemy.
    pub fn free_node_for(&self, team: Team) -> Option<NodeIndex> {
        let free = |i: &usize| self.holders[*i].is_none();
        let found = match team {
            Team::Player => (0..self.holders.len()).find(free),
            Team::Enemy => (0..self.holders.len()).rev().find(free),
        };
        found.map(|i| NodeIndex(i as u32))
    }

    pub fn has_free_node(&self) -> bool {
        self.holders.iter().any(Option::is_none)
    }

    pub fn occupied_count(&self) -> usize {
        self.holders.iter().filter(|h| h.is_some()).count()
    }

    /// `(node, holder)` for every held node, in index order.
    pub fn occupied_nodes(&self) -> impl Iterator<Item = (NodeIndex, AgentId)> + '_ {
        self.holders
            .iter()
            .enumerate()
            .filter_map(|(i, h)| h.map(|agent| (NodeIndex(i as u32), agent)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;
    use slotmap::SlotMap;

    fn make_agent_ids(count: usize) -> (SlotMap<AgentId, ()>, Vec<AgentId>) {
        let mut sm: SlotMap<AgentId, ()> = SlotMap::with_key();
        let ids = (0..count).map(|_| sm.insert(())).collect();
        (sm, ids)
    }

    fn line(len: u32) -> OccupancyRegistry {
        OccupancyRegistry::new(SpatialGraph::rect(len, 1, 1.0, Vec3::ZERO))
    }

    // -----------------------------------------------------------------------
    // Test 1: Reserve and release
    // -----------------------------------------------------------------------
    #[test]
    fn reserve_and_release() {
        let (_sm, ids) = make_agent_ids(1);
        let mut reg = line(3);
        assert!(reg.is_free(NodeIndex(1)));

        reg.reserve(NodeIndex(1), ids[0]).unwrap();
        assert!(!reg.is_free(NodeIndex(1)));
        assert!(reg.graph().is_occupied(NodeIndex(1)));
        assert_eq!(reg.holder(NodeIndex(1)), Some(ids[0]));

        reg.release(NodeIndex(1), ids[0]).unwrap();
        assert!(reg.is_free(NodeIndex(1)));
        assert!(!reg.graph().is_occupied(NodeIndex(1)));
        assert_eq!(reg.holder(NodeIndex(1)), None);
    }

    // -----------------------------------------------------------------------
    // Test 2: Double reserve fails loudly
    // -----------------------------------------------------------------------
    #[test]
    fn double_reserve_fails_loudly() {
        let (_sm, ids) = make_agent_ids(2);
        let mut reg = line(3);
        reg.reserve(NodeIndex(0), ids[0]).unwrap();

        let err = reg.reserve(NodeIndex(0), ids[1]).unwrap_err();
        assert_eq!(
            err,
            OccupancyError::AlreadyOccupied {
                node: NodeIndex(0),
                holder: ids[0]
            }
        );
        // The first claim survives.
        assert_eq!(reg.holder(NodeIndex(0)), Some(ids[0]));
    }

    // -----------------------------------------------------------------------
    // Test 3: Release by a non-holder fails
    // -----------------------------------------------------------------------
    #[test]
    fn release_by_non_holder_fails() {
        let (_sm, ids) = make_agent_ids(2);
        let mut reg = line(3);
        reg.reserve(NodeIndex(2), ids[0]).unwrap();

        assert!(matches!(
            reg.release(NodeIndex(2), ids[1]),
            Err(OccupancyError::NotHolder { holder: Some(h), .. }) if h == ids[0]
        ));
        assert!(matches!(
            reg.release(NodeIndex(1), ids[0]),
            Err(OccupancyError::NotHolder { holder: None, .. })
        ));
        assert!(!reg.is_free(NodeIndex(2)));
    }

    // -----------------------------------------------------------------------
    // Test 4: Out of bounds is an error
    // -----------------------------------------------------------------------
    #[test]
    fn out_of_bounds_is_an_error() {
        let (_sm, ids) = make_agent_ids(1);
        let mut reg = line(2);
        assert!(!reg.is_free(NodeIndex(5)));
        assert_eq!(
            reg.reserve(NodeIndex(5), ids[0]),
            Err(OccupancyError::NodeOutOfBounds(NodeIndex(5)))
        );
        assert_eq!(
            reg.release(NodeIndex(5), ids[0]),
            Err(OccupancyError::NodeOutOfBounds(NodeIndex(5)))
        );
    }

    // -----------------------------------------------------------------------
    // Test 5: Free node scans from team anchor
    // -----------------------------------------------------------------------
    #[test]
    fn free_node_scans_from_team_anchor() {
        let (_sm, ids) = make_agent_ids(2);
        let mut reg = line(4);
        assert_eq!(reg.free_node_for(Team::Player), Some(NodeIndex(0)));
        assert_eq!(reg.free_node_for(Team::Enemy), Some(NodeIndex(3)));

        reg.reserve(NodeIndex(0), ids[0]).unwrap();
        reg.reserve(NodeIndex(3), ids[1]).unwrap();
        assert_eq!(reg.free_node_for(Team::Player), Some(NodeIndex(1)));
        assert_eq!(reg.free_node_for(Team::Enemy), Some(NodeIndex(2)));
    }

    // -----------------------------------------------------------------------
    // Test 6: Full graph has no free node
    // -----------------------------------------------------------------------
    #[test]
    fn full_graph_has_no_free_node() {
        let (_sm, ids) = make_agent_ids(2);
        let mut reg = line(2);
        reg.reserve(NodeIndex(0), ids[0]).unwrap();
        reg.reserve(NodeIndex(1), ids[1]).unwrap();
        assert!(!reg.has_free_node());
        assert_eq!(reg.free_node_for(Team::Player), None);
        assert_eq!(reg.free_node_for(Team::Enemy), None);
        assert_eq!(reg.occupied_count(), 2);
    }

    // -----------------------------------------------------------------------
    // Test 7: Occupied nodes in index order
    // -----------------------------------------------------------------------
    #[test]
    fn occupied_nodes_in_index_order() {
        let (_sm, ids) = make_agent_ids(2);
        let mut reg = line(4);
        reg.reserve(NodeIndex(3), ids[0]).unwrap();
        reg.reserve(NodeIndex(1), ids[1]).unwrap();
        let held: Vec<_> = reg.occupied_nodes().collect();
        assert_eq!(held, vec![(NodeIndex(1), ids[1]), (NodeIndex(3), ids[0])]);
    }

    // -----------------------------------------------------------------------
    // Test 8: Reserved nodes block paths
    // -----------------------------------------------------------------------
    #[test]
    fn reserved_nodes_block_paths() {
        let (_sm, ids) = make_agent_ids(1);
        let mut reg = line(3);
        reg.reserve(NodeIndex(1), ids[0]).unwrap();
        assert!(reg.graph().shortest_path(NodeIndex(0), NodeIndex(2)).is_empty());
        reg.release(NodeIndex(1), ids[0]).unwrap();
        assert_eq!(reg.graph().shortest_path(NodeIndex(0), NodeIndex(2)).len(), 3);
    }
}
