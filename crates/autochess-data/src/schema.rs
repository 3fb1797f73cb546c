//! Serde data file structs for unit definitions.
//!
//! Engine config and board layout files deserialize straight into
//! [`EngineConfig`](autochess_core::config::EngineConfig) and
//! [`BoardLayout`](autochess_core::board::BoardLayout). Units go through the
//! structs here first so a unit can extend another one and only override
//! the stats it changes.

use autochess_core::agent::StatBlock;
use autochess_core::combat::Archetype;
use serde::Deserialize;

// ===========================================================================
// Units
// ===========================================================================

/// A unit definition in a data file.
#[derive(Debug, Clone, Deserialize)]
pub struct UnitData {
    pub name: String,
    /// Name of an earlier unit in the same file to inherit from.
    #[serde(default)]
    pub extends: Option<String>,
    #[serde(default)]
    pub archetype: Option<Archetype>,
    #[serde(default)]
    pub stats: StatOverrides,
}

/// Stats named by a unit. Anything left out comes from the unit it extends,
/// or from [`StatBlock::default`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StatOverrides {
    pub health: Option<f32>,
    pub mana: Option<f32>,
    pub max_mana: Option<f32>,
    pub armor: Option<f32>,
    pub magic_resist: Option<f32>,
    pub damage: Option<f32>,
    pub attack_speed: Option<f32>,
    pub max_attack_speed: Option<f32>,
    pub crit_rate: Option<f32>,
    pub crit_damage: Option<f32>,
    pub range: Option<f32>,
    pub max_range: Option<f32>,
    pub move_speed: Option<f32>,
}

impl StatOverrides {
    pub fn apply(&self, base: &StatBlock) -> StatBlock {
        StatBlock {
            health: self.health.unwrap_or(base.health),
            mana: self.mana.unwrap_or(base.mana),
            max_mana: self.max_mana.unwrap_or(base.max_mana),
            armor: self.armor.unwrap_or(base.armor),
            magic_resist: self.magic_resist.unwrap_or(base.magic_resist),
            damage: self.damage.unwrap_or(base.damage),
            attack_speed: self.attack_speed.unwrap_or(base.attack_speed),
            max_attack_speed: self.max_attack_speed.unwrap_or(base.max_attack_speed),
            crit_rate: self.crit_rate.unwrap_or(base.crit_rate),
            crit_damage: self.crit_damage.unwrap_or(base.crit_damage),
            range: self.range.unwrap_or(base.range),
            max_range: self.max_range.unwrap_or(base.max_range),
            move_speed: self.move_speed.unwrap_or(base.move_speed),
        }
    }
}
