//! Damage exchange and death, paced by animation cycles.
//!
//! A swing resolves when the attacker's attack animation completes, not when
//! the swing starts, so a target that walks away or dies mid-swing is missed.
//!
//! Hit points are whole numbers. Damage is fixed-point, and the remaining hit
//! points are truncated toward zero, so any fractional damage costs a whole
//! hit point: 2.5 damage against 10 HP leaves 7.

use crate::acquisition::in_melee_range;
use crate::error::Result;
use crate::events::{AnimationHook, CombatEvent};
use crate::math::Fixed;
use crate::state::{CombatPhase, EntityId};
use crate::system::CombatSystem;
use crate::world::CombatWorld;

/// What an animation-cycle event did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// No hook was registered for the entity.
    Ignored,
    /// Attack cycle ended but the target was gone or already a corpse.
    TargetLost,
    /// Attack cycle ended on a target that was already dying.
    TargetAlreadyDying,
    /// Attack cycle ended with the target out of reach.
    OutOfRange,
    /// Damage landed.
    Hit {
        /// Entity struck.
        target: EntityId,
        /// Hit points removed.
        hp_lost: u32,
        /// Hit points left.
        remaining: u32,
    },
    /// Damage landed and killed the target.
    Killed {
        /// Entity killed.
        target: EntityId,
    },
    /// Death animation finished; the corpse was handed off.
    Reaped,
}

/// Fractional bits kept in a damage value. Armour fractions such as 0.2
/// are not exact in binary; rounding to 1/1024 drops that error before
/// hit points are truncated.
const DAMAGE_FRAC_BITS: u32 = 10;

/// Raw damage of one blow: `base × (1 − armor)`, saturating, rounded to the
/// nearest 1/1024.
///
/// `armor` is clamped to `[0, 1]`.
#[must_use]
pub fn compute_damage(base_damage: u32, armor: Fixed) -> Fixed {
    let armor = armor.clamp(Fixed::ZERO, Fixed::ONE);
    let raw = Fixed::saturating_from_num(base_damage).saturating_mul(Fixed::ONE - armor);
    let shift = Fixed::FRAC_NBITS - DAMAGE_FRAC_BITS;
    let half = 1i64 << (shift - 1);
    Fixed::from_bits((raw.to_bits().saturating_add(half) >> shift) << shift)
}

/// Hit points left after taking `damage`.
#[must_use]
pub fn apply_damage(current_hp: u32, damage: Fixed) -> u32 {
    let loss = damage.max(Fixed::ZERO).saturating_ceil();
    current_hp.saturating_sub(loss.saturating_to_num::<u32>())
}

impl CombatSystem {
    /// Report that `id`'s current animation finished a cycle.
    ///
    /// Delivers the entity's pending hook, if any, exactly once.
    pub fn on_animation_cycle_finished<W>(&mut self, world: &mut W, id: EntityId) -> CycleOutcome
    where
        W: CombatWorld + ?Sized,
    {
        match self.animations.take(id) {
            Some(AnimationHook::AttackCycle) => self.resolve_attack(world, id),
            Some(AnimationHook::DeathCycle) => {
                tracing::debug!(entity = id, "Death animation finished; reaping");
                world.zombify(id);
                CycleOutcome::Reaped
            }
            None => CycleOutcome::Ignored,
        }
    }

    /// Kill `id` immediately, whatever it was doing.
    ///
    /// Returns `false` if it was already dying.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::CombatError::NotRegistered`] if `id` has no
    /// record.
    pub fn apply_fatal_hit<W>(&mut self, world: &mut W, id: EntityId) -> Result<bool>
    where
        W: CombatWorld + ?Sized,
    {
        self.store.require(id)?;
        Ok(self.begin_dying(world, id))
    }

    fn resolve_attack<W>(&mut self, world: &mut W, attacker: EntityId) -> CycleOutcome
    where
        W: CombatWorld + ?Sized,
    {
        let Some(state) = self.store.get_mut(attacker) else {
            return CycleOutcome::Ignored;
        };
        if state.phase == CombatPhase::Striking {
            state.phase = CombatPhase::Ready;
        } else {
            tracing::warn!(entity = attacker, phase = ?state.phase, "Attack cycle outside Striking");
        }
        let base_damage = state.stats.base_damage;
        let Some(target) = state.target else {
            return CycleOutcome::TargetLost;
        };

        match world.flags(target) {
            Some(flags) if !flags.zombie => {}
            _ => return CycleOutcome::TargetLost,
        }
        let armor = match self.store.get(target) {
            Some(target_state) if target_state.phase == CombatPhase::Dying => {
                return CycleOutcome::TargetAlreadyDying;
            }
            Some(target_state) => target_state.stats.base_armor,
            None => return CycleOutcome::TargetLost,
        };
        if !in_melee_range(&*world, &self.config, attacker, target) {
            return CycleOutcome::OutOfRange;
        }

        let damage = compute_damage(base_damage, armor);
        let Some(target_state) = self.store.get_mut(target) else {
            return CycleOutcome::TargetLost;
        };
        let before = target_state.current_hp;
        target_state.current_hp = apply_damage(before, damage);
        let remaining = target_state.current_hp;
        tracing::debug!(attacker, target, damage = %damage, remaining, "Blow landed");

        let mortal = world.max_hp(target).is_some_and(|max_hp| max_hp > 0);
        if remaining == 0 && mortal {
            self.begin_dying(world, target);
            return CycleOutcome::Killed { target };
        }

        CycleOutcome::Hit {
            target,
            hp_lost: before - remaining,
            remaining,
        }
    }

    /// Enter `Dying`: stop, become unselectable, announce the death and wait
    /// for the death animation.
    fn begin_dying<W>(&mut self, world: &mut W, id: EntityId) -> bool
    where
        W: CombatWorld + ?Sized,
    {
        let Some(state) = self.store.get_mut(id) else {
            return false;
        };
        if state.phase == CombatPhase::Dying {
            return false;
        }
        let from = state.phase;
        state.phase = CombatPhase::Dying;
        state.current_hp = 0;
        state.target = None;
        state.saved_move = None;

        world.stop(id);
        if world.flags(id).is_some_and(|flags| flags.selectable) {
            world.deselect(id);
            world.clear_selectable(id);
        }
        self.animations
            .unsubscribe_hook(id, AnimationHook::AttackCycle);
        world.notify(CombatEvent::died(id));
        self.animations.subscribe(id, AnimationHook::DeathCycle);
        self.pending_deaths.insert(id);

        tracing::debug!(entity = id, ?from, "Entity dying");
        true
    }
}
