//! Per-entity combat data.
//!
//! These are plain records. Behaviour lives in the state machine and
//! resolution modules; the store owns every [`CombatState`].

use serde::{Deserialize, Serialize};

use crate::math::{fixed_serde, Fixed, Vec2Fixed};

/// Stable identifier of an entity, owned by the entity registry.
pub type EntityId = u64;

/// Faction an entity fights for. Relations come from diplomacy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FactionId(pub u8);

/// Policy governing when an entity starts a fight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Stance {
    /// Never acquires targets on its own.
    NoEngagement,
    /// Chases any enemy inside the acquisition radius.
    #[default]
    Aggressive,
    /// Fights enemies that come into melee range but never chases.
    HoldPosition,
}

impl Stance {
    /// All stances in save-tag order.
    pub const ALL: [Self; 3] = [Self::NoEngagement, Self::Aggressive, Self::HoldPosition];

    /// Numeric tag written to save streams.
    #[must_use]
    pub const fn tag(self) -> i64 {
        match self {
            Self::NoEngagement => 0,
            Self::Aggressive => 1,
            Self::HoldPosition => 2,
        }
    }

    /// Inverse of [`Stance::tag`].
    #[must_use]
    pub const fn from_tag(tag: i64) -> Option<Self> {
        match tag {
            0 => Some(Self::NoEngagement),
            1 => Some(Self::Aggressive),
            2 => Some(Self::HoldPosition),
            _ => None,
        }
    }
}

/// Position of an entity in the combat state machine.
///
/// ```text
///                 Start
///                   |
///                   v
///  (melee range)+--[Idle]<-----------------------------+
///               |    | (acquired, out of melee range)  |
///               |    v                                 | (no target left)
///               |  [Pursuing]                          |
///               |    | (reached melee range)           |
///               |    v                                 |
///               +->[Ready]-----------------------------+
///                    |  ^
///                    v  | (attack cycle finished)
///                  [Striking]
///
///  Any phase --(fatal hit)--> [Dying] --(death cycle finished)--> reaped
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CombatPhase {
    /// Not fighting.
    #[default]
    Idle,
    /// Moving toward an out-of-reach enemy.
    Pursuing,
    /// Target in melee range, next tick starts a swing.
    Ready,
    /// Attack animation playing; resolves on cycle completion.
    Striking,
    /// Death animation playing; reaped on cycle completion.
    Dying,
}

impl CombatPhase {
    /// All phases in save-tag order.
    pub const ALL: [Self; 5] = [
        Self::Idle,
        Self::Pursuing,
        Self::Ready,
        Self::Striking,
        Self::Dying,
    ];

    /// Numeric tag written to save streams.
    #[must_use]
    pub const fn tag(self) -> i64 {
        match self {
            Self::Idle => 0,
            Self::Pursuing => 1,
            Self::Ready => 2,
            Self::Striking => 3,
            Self::Dying => 4,
        }
    }

    /// Inverse of [`CombatPhase::tag`].
    #[must_use]
    pub const fn from_tag(tag: i64) -> Option<Self> {
        match tag {
            0 => Some(Self::Idle),
            1 => Some(Self::Pursuing),
            2 => Some(Self::Ready),
            3 => Some(Self::Striking),
            4 => Some(Self::Dying),
            _ => None,
        }
    }

    /// Whether a target is meaningful in this phase.
    #[must_use]
    pub const fn has_target(self) -> bool {
        matches!(self, Self::Pursuing | Self::Ready | Self::Striking)
    }

    /// Whether the entity is trading blows (attack-start was announced).
    #[must_use]
    pub const fn is_engaged(self) -> bool {
        matches!(self, Self::Ready | Self::Striking)
    }
}

/// Damage and armour profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CombatStats {
    /// Damage per landed blow before armour.
    pub base_damage: u32,
    /// Fraction of incoming damage blocked, in `[0, 1]`.
    #[serde(with = "fixed_serde")]
    pub base_armor: Fixed,
}

/// A movement order that combat took over and owes back.
///
/// Produced by [`crate::world::MovementControl::suspend`] and consumed by
/// [`crate::world::MovementControl::resume`]. Combat never inspects it beyond
/// persisting it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SuspendedMove {
    destination: Vec2Fixed,
}

impl SuspendedMove {
    /// Wrap an interrupted destination.
    #[must_use]
    pub const fn new(destination: Vec2Fixed) -> Self {
        Self { destination }
    }

    /// Where the entity was heading before combat interrupted it.
    #[must_use]
    pub const fn destination(&self) -> Vec2Fixed {
        self.destination
    }
}

/// Everything combat tracks about one entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombatState {
    /// Damage and armour.
    pub stats: CombatStats,
    /// Remaining hit points, never above the registry's `max_hp`.
    pub current_hp: u32,
    /// Engagement policy.
    pub stance: Stance,
    /// Current state-machine phase.
    pub phase: CombatPhase,
    /// Entity being fought. Re-validated every tick; may be stale.
    pub target: Option<EntityId>,
    /// Movement order to hand back when the episode ends.
    pub saved_move: Option<SuspendedMove>,
}

impl CombatState {
    /// Fresh idle record at full health.
    #[must_use]
    pub fn new(max_hp: u32, stance: Stance) -> Self {
        Self {
            stats: CombatStats::default(),
            current_hp: max_hp,
            stance,
            phase: CombatPhase::Idle,
            target: None,
            saved_move: None,
        }
    }
}
