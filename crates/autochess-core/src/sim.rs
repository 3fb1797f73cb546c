//! Simulation strategy and state types.
//!
//! [`SimulationStrategy`] decides how [`Engine::advance`](crate::engine::Engine::advance)
//! turns wall-clock time into ticks. Every strategy runs the same tick body.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Simulation strategy
// ---------------------------------------------------------------------------

/// How the engine advances time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimulationStrategy {
    /// One tick per `advance(dt)` call, using `dt` as the step.
    Variable,

    /// Accumulate elapsed time and run as many ticks of `timestep` seconds
    /// as fit, carrying the remainder forward.
    Fixed {
        /// Seconds per tick.
        timestep: f32,
    },
}

impl Default for SimulationStrategy {
    fn default() -> Self {
        SimulationStrategy::Fixed {
            timestep: 1.0 / 30.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Simulation state
// ---------------------------------------------------------------------------

/// Mutable clock state tracked by the engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimState {
    /// Ticks run since the engine was created.
    pub tick: u64,

    /// Simulated seconds since the engine was created.
    pub elapsed: f64,

    /// Unspent time in fixed-step mode. Unused in variable mode.
    pub accumulator: f32,
}

impl SimState {
    pub fn new() -> Self {
        Self::default()
    }
}

// ---------------------------------------------------------------------------
// Advance result
// ---------------------------------------------------------------------------

/// Result of an `Engine::advance()` call.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct AdvanceResult {
    /// Number of ticks actually executed.
    pub steps_run: u64,
}

// ---------------------------------------------------------------------------
// State hash
// ---------------------------------------------------------------------------

/// A simple deterministic hash of simulation state for determinism checks.
///
/// Uses FNV-1a (64-bit). Not cryptographic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateHash(pub u64);

impl StateHash {
    const FNV_OFFSET: u64 = 0xcbf29ce484222325;
    const FNV_PRIME: u64 = 0x100000001b3;

    pub fn new() -> Self {
        Self(Self::FNV_OFFSET)
    }

    /// Feed bytes into the hash.
    pub fn write(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.0 ^= b as u64;
            self.0 = self.0.wrapping_mul(Self::FNV_PRIME);
        }
    }

    pub fn write_u64(&mut self, v: u64) {
        self.write(&v.to_le_bytes());
    }

    pub fn write_u32(&mut self, v: u32) {
        self.write(&v.to_le_bytes());
    }

    /// Feed an f32 by its bit pattern.
    pub fn write_f32(&mut self, v: f32) {
        self.write(&v.to_bits().to_le_bytes());
    }

    pub fn finish(self) -> u64 {
        self.0
    }
}

impl Default for StateHash {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sim_state_starts_at_zero() {
        let state = SimState::new();
        assert_eq!(state.tick, 0);
        assert_eq!(state.elapsed, 0.0);
        assert_eq!(state.accumulator, 0.0);
    }

    #[test]
    fn state_hash_deterministic() {
        let mut h1 = StateHash::new();
        h1.write_u64(42);
        h1.write_f32(0.5);

        let mut h2 = StateHash::new();
        h2.write_u64(42);
        h2.write_f32(0.5);

        assert_eq!(h1.finish(), h2.finish());
    }

    #[test]
    fn state_hash_order_matters() {
        let mut h1 = StateHash::new();
        h1.write_u32(1);
        h1.write_u32(2);

        let mut h2 = StateHash::new();
        h2.write_u32(2);
        h2.write_u32(1);

        assert_ne!(h1.finish(), h2.finish());
    }

    #[test]
    fn float_sign_changes_hash() {
        let mut h1 = StateHash::new();
        h1.write_f32(0.0);
        let mut h2 = StateHash::new();
        h2.write_f32(-0.0);
        assert_ne!(h1.finish(), h2.finish());
    }

    #[test]
    fn strategy_deserializes_from_tagged_form() {
        let s: SimulationStrategy = serde_json::from_str(r#"{"fixed":{"timestep":0.1}}"#).unwrap();
        assert_eq!(s, SimulationStrategy::Fixed { timestep: 0.1 });
        let v: SimulationStrategy = serde_json::from_str(r#""variable""#).unwrap();
        assert_eq!(v, SimulationStrategy::Variable);
    }
}
