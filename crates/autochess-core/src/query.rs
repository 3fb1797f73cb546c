//! Read-only query API for inspecting simulation state.
//!
//! Snapshot types aggregate engine state into views for rendering and UI
//! (health bars, tile highlights). All types are owned copies, never
//! references into engine storage.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::agent::AgentState;
use crate::combat::DamageReport;
use crate::engine::Engine;
use crate::id::{AgentId, GridId, NodeIndex, Team, TileRef};

// ---------------------------------------------------------------------------
// Agent snapshot
// ---------------------------------------------------------------------------

/// A read-only view of one agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSnapshot {
    pub id: AgentId,
    pub name: String,
    pub team: Team,
    pub state: AgentState,
    pub alive: bool,
    /// The tile the agent holds.
    pub tile: TileRef,
    /// Battle node reserved for the step in progress.
    pub destination: Option<NodeIndex>,
    /// World position; between tiles while moving.
    pub position: Vec3,
    pub health: f32,
    pub max_health: f32,
    /// Health as a 0..1 fraction, for health bars.
    pub health_fraction: f32,
    pub mana: f32,
    pub mana_fraction: f32,
    pub target: Option<AgentId>,
    pub last_damage: Option<DamageReport>,
}

// ---------------------------------------------------------------------------
// Tile snapshot
// ---------------------------------------------------------------------------

/// A read-only view of one tile of a grid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TileSnapshot {
    pub tile: TileRef,
    pub position: Vec3,
    pub occupied: bool,
    pub holder: Option<AgentId>,
}

impl Engine {
    pub fn snapshot_agent(&self, id: AgentId) -> Option<AgentSnapshot> {
        let agent = self.agents.get(id)?;
        let stats = &agent.stats;
        Some(AgentSnapshot {
            id,
            name: agent.name.clone(),
            team: agent.team,
            state: agent.state,
            alive: agent.is_alive(),
            tile: agent.tile,
            destination: agent.destination,
            position: agent.position,
            health: stats.health.value(),
            max_health: stats.health.max_value().unwrap_or_else(|| stats.health.value()),
            health_fraction: stats.health.fraction(),
            mana: stats.mana.value(),
            mana_fraction: stats.mana.fraction(),
            target: agent.target,
            last_damage: agent.last_damage,
        })
    }

    /// Every agent, dead ones included, in tick order.
    pub fn snapshot_agents(&self) -> Vec<AgentSnapshot> {
        self.order
            .iter()
            .filter_map(|&id| self.snapshot_agent(id))
            .collect()
    }

    pub fn snapshot_tiles(&self, grid: GridId) -> Vec<TileSnapshot> {
        let registry = self.board.grid(grid);
        registry
            .graph()
            .nodes()
            .iter()
            .map(|node| TileSnapshot {
                tile: TileRef::new(grid, node.index()),
                position: node.position(),
                occupied: !registry.is_free(node.index()),
                holder: registry.holder(node.index()),
            })
            .collect()
    }
}
