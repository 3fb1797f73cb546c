use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::graph::{rect_positions, SpatialGraph};
use crate::id::{GridId, Team};
use crate::occupancy::OccupancyRegistry;

/// Shape of the board: the shared battle grid plus one bench per team.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardLayout {
    pub battle_columns: u32,
    pub battle_rows: u32,
    /// World distance between neighbouring tiles.
    pub spacing: f32,
    pub bench_slots: u32,
}

impl Default for BoardLayout {
    fn default() -> Self {
        Self {
            battle_columns: 7,
            battle_rows: 8,
            spacing: 1.0,
            bench_slots: 9,
        }
    }
}

impl BoardLayout {
    /// Build the three registries. `adjacency_threshold` is in tile units and
    /// is scaled by `spacing`.
    pub fn build(&self, adjacency_threshold: f32) -> Board {
        let battle = SpatialGraph::from_positions(
            rect_positions(self.battle_columns, self.battle_rows, self.spacing, Vec3::ZERO),
            adjacency_threshold * self.spacing,
        );

        let bench_gap = 2.0 * self.spacing;
        let player_bench = SpatialGraph::bench(
            self.bench_slots,
            self.spacing,
            Vec3::new(0.0, 0.0, -bench_gap),
        );
        let far_edge = self.battle_rows.saturating_sub(1) as f32 * self.spacing;
        let enemy_bench = SpatialGraph::bench(
            self.bench_slots,
            self.spacing,
            Vec3::new(0.0, 0.0, far_edge + bench_gap),
        );

        Board {
            battle: OccupancyRegistry::new(battle),
            player_bench: OccupancyRegistry::new(player_bench),
            enemy_bench: OccupancyRegistry::new(enemy_bench),
        }
    }
}

/// All tiles in play.
#[derive(Debug, Clone)]
pub struct Board {
    pub battle: OccupancyRegistry,
    pub player_bench: OccupancyRegistry,
    pub enemy_bench: OccupancyRegistry,
}

impl Board {
    pub fn new(
        battle: SpatialGraph,
        player_bench: SpatialGraph,
        enemy_bench: SpatialGraph,
    ) -> Self {
        Self {
            battle: OccupancyRegistry::new(battle),
            player_bench: OccupancyRegistry::new(player_bench),
            enemy_bench: OccupancyRegistry::new(enemy_bench),
        }
    }

    pub fn grid(&self, grid: GridId) -> &OccupancyRegistry {
        match grid {
            GridId::Battle => &self.battle,
            GridId::Bench(Team::Player) => &self.player_bench,
            GridId::Bench(Team::Enemy) => &self.enemy_bench,
        }
    }

    pub fn grid_mut(&mut self, grid: GridId) -> &mut OccupancyRegistry {
        match grid {
            GridId::Battle => &mut self.battle,
            GridId::Bench(Team::Player) => &mut self.player_bench,
            GridId::Bench(Team::Enemy) => &mut self.enemy_bench,
        }
    }

    pub const GRIDS: [GridId; 3] = [
        GridId::Battle,
        GridId::Bench(Team::Player),
        GridId::Bench(Team::Enemy),
    ];
}

impl Default for Board {
    fn default() -> Self {
        BoardLayout::default().build(crate::graph::DEFAULT_ADJACENCY_THRESHOLD)
    }
}
