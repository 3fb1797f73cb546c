use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::attribute::{Attribute, AttributeSet};
use crate::combat::{Archetype, Cooldown, DamageReport};
use crate::id::{AgentId, NodeIndex, TemplateId, Team, TileRef};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// A unit template that cannot be simulated.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TemplateError {
    #[error("template name is empty")]
    EmptyName,
    #[error("stat `{stat}` is not finite")]
    NonFinite { stat: &'static str },
    #[error("attack speed must be positive, got {0}")]
    ZeroAttackSpeed(f32),
    #[error("stat `{stat}` must be positive, got {value}")]
    NonPositive { stat: &'static str, value: f32 },
    #[error("stat `{stat}` must not be negative, got {value}")]
    Negative { stat: &'static str, value: f32 },
    #[error("stat `{stat}` is {value} but its cap `{cap}` is {max}")]
    ExceedsCap {
        stat: &'static str,
        value: f32,
        cap: &'static str,
        max: f32,
    },
}

// ---------------------------------------------------------------------------
// Templates
// ---------------------------------------------------------------------------

/// Starting stats of a unit. Units spawn at full health.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatBlock {
    pub health: f32,
    pub mana: f32,
    pub max_mana: f32,
    pub armor: f32,
    pub magic_resist: f32,
    pub damage: f32,
    pub attack_speed: f32,
    pub max_attack_speed: f32,
    pub crit_rate: f32,
    pub crit_damage: f32,
    pub range: f32,
    pub max_range: f32,
    pub move_speed: f32,
}

impl Default for StatBlock {
    fn default() -> Self {
        Self {
            health: 500.0,
            mana: 15.0,
            max_mana: 60.0,
            armor: 40.0,
            magic_resist: 40.0,
            damage: 50.0,
            attack_speed: 0.7,
            max_attack_speed: 5.0,
            crit_rate: 0.25,
            crit_damage: 0.3,
            range: 1.0,
            max_range: 7.0,
            move_speed: 2.0,
        }
    }
}

impl StatBlock {
    fn entries(&self) -> [(&'static str, f32); 13] {
        [
            ("health", self.health),
            ("mana", self.mana),
            ("max_mana", self.max_mana),
            ("armor", self.armor),
            ("magic_resist", self.magic_resist),
            ("damage", self.damage),
            ("attack_speed", self.attack_speed),
            ("max_attack_speed", self.max_attack_speed),
            ("crit_rate", self.crit_rate),
            ("crit_damage", self.crit_damage),
            ("range", self.range),
            ("max_range", self.max_range),
            ("move_speed", self.move_speed),
        ]
    }

    pub fn to_attributes(&self) -> AttributeSet {
        AttributeSet {
            health: Attribute::with_max(self.health, self.health),
            mana: Attribute::with_max(self.mana, self.max_mana),
            armor: Attribute::new(self.armor),
            magic_resist: Attribute::new(self.magic_resist),
            damage: Attribute::new(self.damage),
            attack_speed: Attribute::with_max(self.attack_speed, self.max_attack_speed),
            crit_rate: Attribute::with_max(self.crit_rate, 1.0),
            crit_damage: Attribute::new(self.crit_damage),
            range: Attribute::with_max(self.range, self.max_range),
            move_speed: Attribute::new(self.move_speed),
        }
    }
}

/// Data describing a kind of unit. Registered with the engine and
/// instantiated by `place_agent`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentTemplate {
    pub name: String,
    #[serde(default)]
    pub archetype: Archetype,
    #[serde(default)]
    pub stats: StatBlock,
}

impl AgentTemplate {
    pub fn new(name: impl Into<String>, archetype: Archetype, stats: StatBlock) -> Self {
        Self {
            name: name.into(),
            archetype,
            stats,
        }
    }

    /// Reject templates that would break the tick loop: a zero attack speed
    /// has no cooldown, a zero move speed never arrives and a zero mana pool
    /// is always full.
    ///
    /// The controller reads attack speed and range through their caps, so a
    /// cap below its stat is rejected here rather than clamped at attack time.
    pub fn validate(&self) -> Result<(), TemplateError> {
        if self.name.trim().is_empty() {
            return Err(TemplateError::EmptyName);
        }
        for (stat, value) in self.stats.entries() {
            if !value.is_finite() {
                return Err(TemplateError::NonFinite { stat });
            }
        }

        let stats = &self.stats;
        if stats.attack_speed <= 0.0 {
            return Err(TemplateError::ZeroAttackSpeed(stats.attack_speed));
        }
        for (stat, value) in [
            ("health", stats.health),
            ("max_mana", stats.max_mana),
            ("max_attack_speed", stats.max_attack_speed),
            ("move_speed", stats.move_speed),
        ] {
            if value <= 0.0 {
                return Err(TemplateError::NonPositive { stat, value });
            }
        }
        for (stat, value) in [
            ("mana", stats.mana),
            ("crit_rate", stats.crit_rate),
            ("range", stats.range),
            ("max_range", stats.max_range),
        ] {
            if value < 0.0 {
                return Err(TemplateError::Negative { stat, value });
            }
        }
        for (stat, value, cap, max) in [
            ("attack_speed", stats.attack_speed, "max_attack_speed", stats.max_attack_speed),
            ("range", stats.range, "max_range", stats.max_range),
        ] {
            if value > max {
                return Err(TemplateError::ExceedsCap {
                    stat,
                    value,
                    cap,
                    max,
                });
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Agent
// ---------------------------------------------------------------------------

/// Controller state of an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentState {
    /// Placed, not fighting.
    Idle,
    /// Fighting, but no living enemy was found.
    Seeking,
    /// Walking toward the target.
    Approaching,
    /// In range of the target.
    Attacking,
    Dead,
}

/// A combat unit. Owned by the engine; tile fields are only changed
/// together with the matching occupancy registry.
#[derive(Debug, Clone)]
pub struct Agent {
    pub(crate) template: TemplateId,
    pub(crate) name: String,
    pub(crate) team: Team,
    pub(crate) archetype: Archetype,
    pub(crate) stats: AttributeSet,
    pub(crate) tile: TileRef,
    /// Battle node reserved as the next step, while mid-move.
    pub(crate) destination: Option<NodeIndex>,
    pub(crate) position: Vec3,
    pub(crate) target: Option<AgentId>,
    pub(crate) state: AgentState,
    pub(crate) cooldown: Cooldown,
    pub(crate) last_damage: Option<DamageReport>,
}

impl Agent {
    pub(crate) fn spawn(
        template_id: TemplateId,
        template: &AgentTemplate,
        team: Team,
        tile: TileRef,
        position: Vec3,
    ) -> Self {
        Self {
            template: template_id,
            name: template.name.clone(),
            team,
            archetype: template.archetype,
            stats: template.stats.to_attributes(),
            tile,
            destination: None,
            position,
            target: None,
            state: AgentState::Idle,
            cooldown: Cooldown::default(),
            last_damage: None,
        }
    }

    pub fn template(&self) -> TemplateId {
        self.template
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn team(&self) -> Team {
        self.team
    }

    pub fn archetype(&self) -> Archetype {
        self.archetype
    }

    pub fn stats(&self) -> &AttributeSet {
        &self.stats
    }

    pub fn tile(&self) -> TileRef {
        self.tile
    }

    pub fn destination(&self) -> Option<NodeIndex> {
        self.destination
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn target(&self) -> Option<AgentId> {
        self.target
    }

    pub fn state(&self) -> AgentState {
        self.state
    }

    pub fn is_alive(&self) -> bool {
        self.state != AgentState::Dead
    }

    pub fn is_moving(&self) -> bool {
        self.destination.is_some()
    }

    pub fn cooldown(&self) -> &Cooldown {
        &self.cooldown
    }

    pub fn last_damage(&self) -> Option<&DamageReport> {
        self.last_damage.as_ref()
    }
}
