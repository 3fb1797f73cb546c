//! Numeric stats with stacked modifiers.
//!
//! An [`Attribute`] holds a base value and an ordered list of [`Modifier`]s.
//! Its derived value is computed lazily and cached until the base value or
//! the modifier list changes.
//!
//! # Stacking order
//!
//! Modifiers are kept sorted by `order` (stable on ties). Walking that list:
//!
//! - `Flat` adds its value.
//! - Consecutive `PercentAdd` modifiers are summed into one bucket that is
//!   applied as `* (1 + sum)` when the run ends.
//! - `PercentMultiply` multiplies by `(1 + value)` immediately.
//!
//! The result is rounded to four decimal places, half away from zero.

use std::cell::Cell;

use serde::{Deserialize, Serialize};

use crate::id::ModifierSource;

/// Decimal places kept by [`Attribute::value`].
const ROUNDING_SCALE: f64 = 10_000.0;

// ---------------------------------------------------------------------------
// Modifiers
// ---------------------------------------------------------------------------

/// How a modifier combines with the running value. The discriminant is the
/// default application order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModifierKind {
    Flat = 100,
    PercentAdd = 200,
    PercentMultiply = 300,
}

impl ModifierKind {
    /// The order a modifier of this kind gets when none is given.
    pub fn default_order(self) -> i32 {
        self as i32
    }
}

/// A single adjustment to an [`Attribute`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Modifier {
    pub value: f32,
    pub kind: ModifierKind,
    pub order: i32,
    pub source: Option<ModifierSource>,
}

impl Modifier {
    /// A modifier with the kind's default order and no source.
    pub fn new(value: f32, kind: ModifierKind) -> Self {
        Self {
            value,
            kind,
            order: kind.default_order(),
            source: None,
        }
    }

    pub fn flat(value: f32) -> Self {
        Self::new(value, ModifierKind::Flat)
    }

    pub fn percent_add(value: f32) -> Self {
        Self::new(value, ModifierKind::PercentAdd)
    }

    pub fn percent_multiply(value: f32) -> Self {
        Self::new(value, ModifierKind::PercentMultiply)
    }

    /// Override the application order.
    pub fn with_order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    /// Attribute this modifier to a buff/debuff instance.
    pub fn with_source(mut self, source: ModifierSource) -> Self {
        self.source = Some(source);
        self
    }
}

// ---------------------------------------------------------------------------
// Attribute
// ---------------------------------------------------------------------------

/// A base value plus ordered modifiers, with a cached derived value.
///
/// The cache lives in `Cell`s so reading [`value`](Self::value) only needs
/// `&self`. Every write path marks the cache dirty.
#[derive(Debug, Clone)]
pub struct Attribute {
    base_value: f32,
    max_value: Option<f32>,
    modifiers: Vec<Modifier>,
    cached_value: Cell<f32>,
    dirty: Cell<bool>,
}

impl Default for Attribute {
    fn default() -> Self {
        Self::new(0.0)
    }
}

impl Attribute {
    pub fn new(base_value: f32) -> Self {
        Self {
            base_value,
            max_value: None,
            modifiers: Vec::new(),
            cached_value: Cell::new(base_value),
            dirty: Cell::new(true),
        }
    }

    /// An attribute with an upper bound (health, mana, crit rate, ...).
    pub fn with_max(base_value: f32, max_value: f32) -> Self {
        Self {
            max_value: Some(max_value),
            ..Self::new(base_value)
        }
    }

    pub fn base_value(&self) -> f32 {
        self.base_value
    }

    pub fn set_base_value(&mut self, base_value: f32) {
        self.base_value = base_value;
        self.dirty.set(true);
    }

    /// Shift the base value by `delta` (damage, mana gain, ...).
    pub fn add_base_value(&mut self, delta: f32) {
        self.set_base_value(self.base_value + delta);
    }

    pub fn max_value(&self) -> Option<f32> {
        self.max_value
    }

    pub fn set_max_value(&mut self, max_value: Option<f32>) {
        self.max_value = max_value;
    }

    /// `true` when a max is set and the derived value has reached it.
    pub fn is_full(&self) -> bool {
        self.max_value.is_some_and(|max| self.value() >= max)
    }

    /// `value / max`, clamped to `[0, 1]`. Attributes without a positive
    /// max report `1.0`.
    pub fn fraction(&self) -> f32 {
        match self.max_value {
            Some(max) if max > 0.0 => (self.value() / max).clamp(0.0, 1.0),
            _ => 1.0,
        }
    }

    /// Modifiers in application order.
    pub fn modifiers(&self) -> &[Modifier] {
        &self.modifiers
    }

    /// Whether the next [`value`](Self::value) call will recompute.
    pub fn is_dirty(&self) -> bool {
        self.dirty.get()
    }

    /// The derived value. Recomputed only when dirty.
    pub fn value(&self) -> f32 {
        if !self.dirty.get() {
            return self.cached_value.get();
        }

        let value = self.compute();
        self.cached_value.set(value);
        self.dirty.set(false);
        value
    }

    /// The derived value limited to `max_value`, if one is set.
    pub fn capped_value(&self) -> f32 {
        match self.max_value {
            Some(max) => self.value().min(max),
            None => self.value(),
        }
    }

    /// Insert a modifier and re-sort. `sort_by_key` is stable, so modifiers
    /// sharing an order keep insertion order.
    pub fn add_modifier(&mut self, modifier: Modifier) {
        self.modifiers.push(modifier);
        self.modifiers.sort_by_key(|m| m.order);
        self.dirty.set(true);
    }

    /// Remove the first modifier equal to `modifier`. Returns `false` when
    /// none matched.
    pub fn remove_modifier(&mut self, modifier: &Modifier) -> bool {
        let Some(pos) = self.modifiers.iter().position(|m| m == modifier) else {
            return false;
        };
        self.modifiers.remove(pos);
        self.dirty.set(true);
        true
    }

    /// Remove every modifier attributed to `source`. Returns `true` if any
    /// were removed.
    pub fn remove_all_from_source(&mut self, source: ModifierSource) -> bool {
        let before = self.modifiers.len();
        self.modifiers.retain(|m| m.source != Some(source));
        let removed = self.modifiers.len() != before;
        if removed {
            self.dirty.set(true);
        }
        removed
    }

    fn compute(&self) -> f32 {
        let mut result = self.base_value;
        let mut percent_add_sum = 0.0f32;

        for (i, modifier) in self.modifiers.iter().enumerate() {
            match modifier.kind {
                ModifierKind::Flat => result += modifier.value,
                ModifierKind::PercentAdd => {
                    percent_add_sum += modifier.value;
                    let run_continues = self
                        .modifiers
                        .get(i + 1)
                        .is_some_and(|next| next.kind == ModifierKind::PercentAdd);
                    if !run_continues {
                        result *= 1.0 + percent_add_sum;
                        percent_add_sum = 0.0;
                    }
                }
                ModifierKind::PercentMultiply => result *= 1.0 + modifier.value,
            }
        }

        round_fixed(result)
    }
}

fn round_fixed(value: f32) -> f32 {
    (round_scaled(value as f64 * ROUNDING_SCALE) / ROUNDING_SCALE) as f32
}

/// Half away from zero.
fn round_scaled(scaled: f64) -> f64 {
    scaled.round()
}

// ---------------------------------------------------------------------------
// Named stat set
// ---------------------------------------------------------------------------

/// Names of the per-agent stats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatKind {
    Health,
    Mana,
    Armor,
    MagicResist,
    Damage,
    AttackSpeed,
    CritRate,
    CritDamage,
    Range,
    MoveSpeed,
}

impl StatKind {
    pub const ALL: [StatKind; 10] = [
        StatKind::Health,
        StatKind::Mana,
        StatKind::Armor,
        StatKind::MagicResist,
        StatKind::Damage,
        StatKind::AttackSpeed,
        StatKind::CritRate,
        StatKind::CritDamage,
        StatKind::Range,
        StatKind::MoveSpeed,
    ];
}

/// The ten stats every agent carries.
#[derive(Debug, Clone, Default)]
pub struct AttributeSet {
    pub health: Attribute,
    pub mana: Attribute,
    pub armor: Attribute,
    pub magic_resist: Attribute,
    pub damage: Attribute,
    pub attack_speed: Attribute,
    pub crit_rate: Attribute,
    pub crit_damage: Attribute,
    pub range: Attribute,
    pub move_speed: Attribute,
}

impl AttributeSet {
    pub fn get(&self, stat: StatKind) -> &Attribute {
        match stat {
            StatKind::Health => &self.health,
            StatKind::Mana => &self.mana,
            StatKind::Armor => &self.armor,
            StatKind::MagicResist => &self.magic_resist,
            StatKind::Damage => &self.damage,
            StatKind::AttackSpeed => &self.attack_speed,
            StatKind::CritRate => &self.crit_rate,
            StatKind::CritDamage => &self.crit_damage,
            StatKind::Range => &self.range,
            StatKind::MoveSpeed => &self.move_speed,
        }
    }

    pub fn get_mut(&mut self, stat: StatKind) -> &mut Attribute {
        match stat {
            StatKind::Health => &mut self.health,
            StatKind::Mana => &mut self.mana,
            StatKind::Armor => &mut self.armor,
            StatKind::MagicResist => &mut self.magic_resist,
            StatKind::Damage => &mut self.damage,
            StatKind::AttackSpeed => &mut self.attack_speed,
            StatKind::CritRate => &mut self.crit_rate,
            StatKind::CritDamage => &mut self.crit_damage,
            StatKind::Range => &mut self.range,
            StatKind::MoveSpeed => &mut self.move_speed,
        }
    }

    /// Strip a buff/debuff from every stat. Returns `true` if anything was
    /// removed.
    pub fn remove_all_from_source(&mut self, source: ModifierSource) -> bool {
        let mut removed = false;
        for stat in StatKind::ALL {
            removed |= self.get_mut(stat).remove_all_from_source(source);
        }
        removed
    }
}
