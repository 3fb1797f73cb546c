//! Targeting, range and cooldown gating, and the damage pipeline.
//!
//! Damage flows one way: an [`Attacker`] turns the attacker's stats into a
//! [`Strike`], and [`apply_damage`] runs that strike through the defender's
//! mitigation, health and mana.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::agent::{Agent, AgentState, TemplateError};
use crate::attribute::{Attribute, AttributeSet};
use crate::config::EngineConfig;
use crate::id::AgentId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DamageType {
    Physical,
    Magic,
    /// Ignores armor and magic resist.
    True,
}

/// One hit, as produced by the attacker.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Strike {
    pub amount: f32,
    pub damage_type: DamageType,
    pub is_critical: bool,
    /// Attacker's bonus multiplier on critical hits.
    pub crit_damage: f32,
}

/// What a strike did to its defender.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DamageReport {
    pub amount: f32,
    pub damage_type: DamageType,
    pub is_critical: bool,
    pub pre_mitigation: f32,
    pub post_mitigation: f32,
    pub mana_gained: f32,
    /// `true` only for the strike that took the defender from alive to dead.
    pub killed: bool,
}

// ---------------------------------------------------------------------------
// Attackers
// ---------------------------------------------------------------------------

/// Per-archetype attack behaviour.
pub trait Attacker {
    fn basic_attack(&self, stats: &AttributeSet, is_critical: bool) -> Strike;

    /// Cast when mana is full. Returning `None` still spends the mana.
    fn ability(&self, _stats: &AttributeSet) -> Option<Strike> {
        None
    }
}

/// Physical auto-attacks of `damage`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Striker;

impl Attacker for Striker {
    fn basic_attack(&self, stats: &AttributeSet, is_critical: bool) -> Strike {
        Strike {
            amount: stats.damage.value(),
            damage_type: DamageType::Physical,
            is_critical,
            crit_damage: stats.crit_damage.value(),
        }
    }
}

/// Magic auto-attacks of `damage`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Caster;

impl Attacker for Caster {
    fn basic_attack(&self, stats: &AttributeSet, is_critical: bool) -> Strike {
        Strike {
            amount: stats.damage.value(),
            damage_type: DamageType::Magic,
            is_critical,
            crit_damage: stats.crit_damage.value(),
        }
    }
}

/// Archetype named by a template. Maps to an [`Attacker`] implementation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Archetype {
    #[default]
    Striker,
    Caster,
}

impl Archetype {
    pub fn attacker(self) -> &'static dyn Attacker {
        match self {
            Archetype::Striker => &Striker,
            Archetype::Caster => &Caster,
        }
    }
}

// ---------------------------------------------------------------------------
// Targeting
// ---------------------------------------------------------------------------

/// Nearest candidate to `origin`. A later candidate only replaces the
/// current best when strictly closer, so the first one wins exact ties.
pub fn find_target<I>(origin: Vec3, candidates: I) -> Option<AgentId>
where
    I: IntoIterator<Item = (AgentId, Vec3)>,
{
    let mut best = None;
    let mut min_distance = f32::INFINITY;
    for (id, position) in candidates {
        let d = origin.distance(position);
        if best.is_none() || d < min_distance {
            best = Some(id);
            min_distance = d;
        }
    }
    best
}

pub fn in_range(origin: Vec3, target: Vec3, range: f32) -> bool {
    origin.distance(target) <= range
}

// ---------------------------------------------------------------------------
// Cooldown
// ---------------------------------------------------------------------------

/// Time left before the next attack. Counts down in `tick`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Cooldown {
    remaining: f32,
}

impl Cooldown {
    /// Start a window of `1 / attack_speed` seconds.
    pub fn arm(&mut self, attack_speed: f32) -> Result<f32, TemplateError> {
        if !attack_speed.is_finite() || attack_speed <= 0.0 {
            return Err(TemplateError::ZeroAttackSpeed(attack_speed));
        }
        self.remaining = 1.0 / attack_speed;
        Ok(self.remaining)
    }

    pub fn tick(&mut self, dt: f32) {
        self.remaining = (self.remaining - dt).max(0.0);
    }

    pub fn is_ready(&self) -> bool {
        self.remaining <= 0.0
    }

    pub fn remaining(&self) -> f32 {
        self.remaining
    }
}

// ---------------------------------------------------------------------------
// Damage pipeline
// ---------------------------------------------------------------------------

/// Damage multiplier for a resistance value. Positive resistance has
/// diminishing returns; negative resistance amplifies.
pub fn mitigation_multiplier(resistance: f32) -> f32 {
    if resistance >= 0.0 {
        100.0 / (100.0 + resistance)
    } else {
        2.0 - 100.0 / (100.0 - resistance)
    }
}

pub fn post_mitigation(pre_mitigation: f32, damage_type: DamageType, stats: &AttributeSet) -> f32 {
    match damage_type {
        DamageType::Physical => pre_mitigation * mitigation_multiplier(stats.armor.value()),
        DamageType::Magic => pre_mitigation * mitigation_multiplier(stats.magic_resist.value()),
        DamageType::True => pre_mitigation,
    }
}

/// Raise `mana` by `amount`, not past its max. Returns the amount added.
pub fn gain_mana(mana: &mut Attribute, amount: f32) -> f32 {
    let before = mana.base_value();
    let next = before + amount;
    let capped = mana.max_value().map_or(next, |max| next.min(max.max(before)));
    mana.set_base_value(capped);
    capped - before
}

/// Run `strike` against `defender`.
///
/// Returns `None` for a defender that is already dead. The strike that
/// brings health to zero or below moves the defender to `Dead` and reports
/// `killed`; releasing its tiles is left to the caller.
pub fn apply_damage(
    defender: &mut Agent,
    strike: &Strike,
    config: &EngineConfig,
) -> Option<DamageReport> {
    if !defender.is_alive() {
        return None;
    }

    let pre = if strike.is_critical {
        strike.amount * (1.0 + strike.crit_damage)
    } else {
        strike.amount
    };
    let post = post_mitigation(pre, strike.damage_type, &defender.stats);

    defender.stats.health.add_base_value(-post);

    let mana_gained = gain_mana(
        &mut defender.stats.mana,
        config.mana_per_pre_mitigation * pre + config.mana_per_post_mitigation * post,
    );

    let killed = defender.stats.health.value() <= 0.0;
    if killed {
        defender.state = AgentState::Dead;
    }

    let report = DamageReport {
        amount: strike.amount,
        damage_type: strike.damage_type,
        is_critical: strike.is_critical,
        pre_mitigation: pre,
        post_mitigation: post,
        mana_gained,
        killed,
    };
    defender.last_damage = Some(report);
    Some(report)
}
