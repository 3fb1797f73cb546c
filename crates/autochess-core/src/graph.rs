use std::cmp::Reverse;
use std::collections::BinaryHeap;

use glam::Vec3;
use ordered_float::OrderedFloat;

use crate::id::NodeIndex;

/// Nodes closer than this (in tile units) are connected when a graph is
/// built from positions.
pub const DEFAULT_ADJACENCY_THRESHOLD: f32 = 1.0;

/// Slack on the squared threshold so grid positions produced by float
/// arithmetic still connect at exactly one spacing.
const ADJACENCY_SLACK: f32 = 1e-4;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can occur while building a graph.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GraphError {
    #[error("node out of bounds: {0:?}")]
    NodeOutOfBounds(NodeIndex),
    #[error("self-edge on node {0:?}")]
    SelfEdge(NodeIndex),
    #[error("edge {from:?} -> {to:?} already exists")]
    DuplicateEdge { from: NodeIndex, to: NodeIndex },
}

// ---------------------------------------------------------------------------
// Core data structures
// ---------------------------------------------------------------------------

/// A tile of the board. Position and facing are fixed at construction; only
/// the occupied flag changes, and only through the occupancy registry.
#[derive(Debug, Clone)]
pub struct Node {
    index: NodeIndex,
    position: Vec3,
    facing: f32,
    occupied: bool,
}

impl Node {
    pub fn index(&self) -> NodeIndex {
        self.index
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    /// Facing angle in radians. Purely presentational.
    pub fn facing(&self) -> f32 {
        self.facing
    }

    pub fn is_occupied(&self) -> bool {
        self.occupied
    }
}

/// A directed connection between two nodes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Edge {
    pub from: NodeIndex,
    pub to: NodeIndex,
    pub base_weight: f32,
}

// ---------------------------------------------------------------------------
// SpatialGraph
// ---------------------------------------------------------------------------

/// Tile topology with occupancy-aware edge costs.
///
/// The edge set is fixed once construction is done. Occupancy only changes
/// the *effective* weight of an edge: entering an occupied node costs `+inf`.
#[derive(Debug, Clone, Default)]
pub struct SpatialGraph {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    /// Outgoing edge indices per node, in insertion order.
    outgoing: Vec<Vec<usize>>,
}

impl SpatialGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph with one node per position and a pair of directed edges
    /// between every two nodes within `threshold` of each other.
    pub fn from_positions(positions: impl IntoIterator<Item = Vec3>, threshold: f32) -> Self {
        let mut graph = Self::new();
        for position in positions {
            graph.add_node(position, 0.0);
        }
        graph.connect_within(threshold);
        graph
    }

    /// A `columns x rows` grid in the XZ plane, row-major, with 4-neighbour
    /// connectivity. Rows in the far half face back toward the near half.
    pub fn rect(columns: u32, rows: u32, spacing: f32, origin: Vec3) -> Self {
        let mut graph = Self::new();
        for (i, position) in rect_positions(columns, rows, spacing, origin)
            .into_iter()
            .enumerate()
        {
            let row = i as u32 / columns.max(1);
            let facing = if row * 2 >= rows { std::f32::consts::PI } else { 0.0 };
            graph.add_node(position, facing);
        }
        graph.connect_within(spacing * DEFAULT_ADJACENCY_THRESHOLD);
        graph
    }

    /// A row of bench slots along X. Bench graphs have no edges: units are
    /// only ever placed there, never walked.
    pub fn bench(slots: u32, spacing: f32, origin: Vec3) -> Self {
        let mut graph = Self::new();
        for i in 0..slots {
            graph.add_node(origin + Vec3::new(i as f32 * spacing, 0.0, 0.0), 0.0);
        }
        graph
    }

    /// Append a node. Its index is its position in the node list.
    pub fn add_node(&mut self, position: Vec3, facing: f32) -> NodeIndex {
        let index = NodeIndex(self.nodes.len() as u32);
        self.nodes.push(Node {
            index,
            position,
            facing,
            occupied: false,
        });
        self.outgoing.push(Vec::new());
        index
    }

    /// Append a directed edge of weight 1. The caller adds the reverse edge.
    pub fn add_edge(&mut self, from: NodeIndex, to: NodeIndex) -> Result<(), GraphError> {
        self.check_bounds(from)?;
        self.check_bounds(to)?;
        if from == to {
            return Err(GraphError::SelfEdge(from));
        }
        if self.is_adjacent(from, to) {
            return Err(GraphError::DuplicateEdge { from, to });
        }

        self.outgoing[from.as_usize()].push(self.edges.len());
        self.edges.push(Edge {
            from,
            to,
            base_weight: 1.0,
        });
        Ok(())
    }

    fn connect_within(&mut self, threshold: f32) {
        let limit = threshold * threshold + ADJACENCY_SLACK;
        for i in 0..self.nodes.len() {
            for j in 0..self.nodes.len() {
                if i == j {
                    continue;
                }
                let d = self.nodes[i]
                    .position
                    .distance_squared(self.nodes[j].position);
                if d <= limit {
                    self.outgoing[i].push(self.edges.len());
                    self.edges.push(Edge {
                        from: NodeIndex(i as u32),
                        to: NodeIndex(j as u32),
                        base_weight: 1.0,
                    });
                }
            }
        }
    }

    fn check_bounds(&self, node: NodeIndex) -> Result<(), GraphError> {
        if node.as_usize() < self.nodes.len() {
            Ok(())
        } else {
            Err(GraphError::NodeOutOfBounds(node))
        }
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn node(&self, index: NodeIndex) -> Option<&Node> {
        self.nodes.get(index.as_usize())
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn contains(&self, index: NodeIndex) -> bool {
        index.as_usize() < self.nodes.len()
    }

    pub fn position(&self, index: NodeIndex) -> Option<Vec3> {
        self.node(index).map(Node::position)
    }

    pub fn is_occupied(&self, index: NodeIndex) -> bool {
        self.node(index).is_some_and(Node::is_occupied)
    }

    /// Nodes reachable over one outgoing edge of `node`, in edge order.
    pub fn neighbors(&self, node: NodeIndex) -> impl Iterator<Item = &Node> + '_ {
        self.outgoing
            .get(node.as_usize())
            .into_iter()
            .flatten()
            .map(|&e| &self.nodes[self.edges[e].to.as_usize()])
    }

    pub fn is_adjacent(&self, from: NodeIndex, to: NodeIndex) -> bool {
        self.outgoing
            .get(from.as_usize())
            .is_some_and(|out| out.iter().any(|&e| self.edges[e].to == to))
    }

    /// Effective weight of the edge `from -> to`, or `+inf` when there is
    /// no such edge or `to` is occupied.
    pub fn distance(&self, from: NodeIndex, to: NodeIndex) -> f32 {
        self.outgoing
            .get(from.as_usize())
            .and_then(|out| out.iter().find(|&&e| self.edges[e].to == to))
            .map_or(f32::INFINITY, |&e| self.effective_weight(&self.edges[e]))
    }

    pub fn effective_weight(&self, edge: &Edge) -> f32 {
        if self.is_occupied(edge.to) {
            f32::INFINITY
        } else {
            edge.base_weight
        }
    }

    /// The node closest to `point`. The lowest index wins a tie.
    pub fn nearest_node(&self, point: Vec3) -> Option<NodeIndex> {
        let mut best: Option<(f32, NodeIndex)> = None;
        for node in &self.nodes {
            let d = node.position.distance_squared(point);
            if best.is_none_or(|(best_d, _)| d < best_d) {
                best = Some((d, node.index));
            }
        }
        best.map(|(_, index)| index)
    }

    pub(crate) fn set_occupied(&mut self, index: NodeIndex, occupied: bool) {
        if let Some(node) = self.nodes.get_mut(index.as_usize()) {
            node.occupied = occupied;
        }
    }

    // -----------------------------------------------------------------------
    // Shortest path
    // -----------------------------------------------------------------------

    /// Dijkstra over effective edge weights.
    ///
    /// Returns the node sequence from `start` to `end` inclusive, `[start]`
    /// when they are equal, and an empty `Vec` when `end` cannot be reached
    /// (including when `end` itself is occupied). The frontier pops the
    /// smallest tentative distance first and the lowest node index on ties.
    pub fn shortest_path(&self, start: NodeIndex, end: NodeIndex) -> Vec<NodeIndex> {
        if !self.contains(start) || !self.contains(end) {
            return Vec::new();
        }
        if start == end {
            return vec![start];
        }

        let n = self.nodes.len();
        let mut dist = vec![f32::INFINITY; n];
        let mut prev: Vec<Option<NodeIndex>> = vec![None; n];
        let mut done = vec![false; n];
        let mut frontier = BinaryHeap::new();

        dist[start.as_usize()] = 0.0;
        frontier.push(Reverse((OrderedFloat(0.0f32), start)));

        while let Some(Reverse((OrderedFloat(d), node))) = frontier.pop() {
            let i = node.as_usize();
            if done[i] {
                continue;
            }
            done[i] = true;
            if node == end {
                break;
            }

            for &e in &self.outgoing[i] {
                let edge = &self.edges[e];
                let weight = self.effective_weight(edge);
                if !weight.is_finite() {
                    continue;
                }
                let j = edge.to.as_usize();
                if done[j] {
                    continue;
                }
                let candidate = d + weight;
                if candidate < dist[j] {
                    dist[j] = candidate;
                    prev[j] = Some(node);
                    frontier.push(Reverse((OrderedFloat(candidate), edge.to)));
                }
            }
        }

        if !done[end.as_usize()] {
            return Vec::new();
        }

        let mut path = vec![end];
        let mut cursor = end;
        while let Some(p) = prev[cursor.as_usize()] {
            path.push(p);
            cursor = p;
        }
        path.reverse();
        path
    }
}

/// Row-major grid positions in the XZ plane.
pub fn rect_positions(columns: u32, rows: u32, spacing: f32, origin: Vec3) -> Vec<Vec3> {
    let mut positions = Vec::with_capacity((columns * rows) as usize);
    for row in 0..rows {
        for col in 0..columns {
            positions.push(origin + Vec3::new(col as f32 * spacing, 0.0, row as f32 * spacing));
        }
    }
    positions
}
