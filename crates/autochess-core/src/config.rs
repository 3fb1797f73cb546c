use serde::{Deserialize, Serialize};

use crate::graph::DEFAULT_ADJACENCY_THRESHOLD;
use crate::sim::SimulationStrategy;

/// Tunable constants of the simulation. Every field has a default, so a
/// config file only needs to name what it overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Max distance, in tiles, between two connected battle nodes.
    pub adjacency_threshold: f32,
    /// Squared distance at which a moving agent snaps onto its destination.
    pub arrival_epsilon_sq: f32,
    /// Mana the attacker gains per basic attack.
    pub basic_attack_mana: f32,
    /// Defender mana per point of pre-mitigation damage taken.
    pub mana_per_pre_mitigation: f32,
    /// Defender mana per point of post-mitigation damage taken.
    pub mana_per_post_mitigation: f32,
    /// Ring buffer capacity per event kind.
    pub event_capacity: usize,
    pub seed: u64,
    pub strategy: SimulationStrategy,
    /// Seconds of fighting before a round ends without a winner. `None`
    /// fights until one team is wiped out.
    pub round_duration: Option<f32>,
    /// Most living agents a team may field on the battle grid.
    pub max_fielded: Option<usize>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            adjacency_threshold: DEFAULT_ADJACENCY_THRESHOLD,
            arrival_epsilon_sq: 1e-5,
            basic_attack_mana: 10.0,
            mana_per_pre_mitigation: 0.01,
            mana_per_post_mitigation: 0.07,
            event_capacity: 1024,
            seed: 0x5EED,
            strategy: SimulationStrategy::default(),
            round_duration: None,
            max_fielded: None,
        }
    }
}
