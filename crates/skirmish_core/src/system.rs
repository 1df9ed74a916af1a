//! The combat subsystem instance.
//!
//! [`CombatSystem`] owns every combat record, the pending-death set and the
//! animation subscriptions. There is no global state: the engine creates one
//! with [`CombatSystem::init`], drives it with
//! [`CombatSystem::tick`](crate::system::CombatSystem::tick) and
//! [`CombatSystem::on_animation_cycle_finished`], and tears it down with
//! [`CombatSystem::shutdown`].
//!
//! # Example
//!
//! ```
//! use skirmish_core::config::CombatConfig;
//! use skirmish_core::system::CombatSystem;
//!
//! let mut combat = CombatSystem::init(CombatConfig::default()).unwrap();
//! assert!(combat.is_empty());
//! assert_eq!(combat.shutdown(), 0);
//! ```

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::config::CombatConfig;
use crate::error::{CombatError, Result};
use crate::events::{AnimationHook, AnimationSubscriptions, CombatEvent};
use crate::math::Fixed;
use crate::state::{CombatPhase, CombatState, EntityId, Stance, SuspendedMove};
use crate::store::{CombatStore, PendingDeaths};
use crate::world::{CombatWorld, EntityRegistry, EventSink, MovementControl};

/// Explicitly owned combat subsystem.
#[derive(Debug, Clone)]
pub struct CombatSystem {
    pub(crate) config: CombatConfig,
    pub(crate) store: CombatStore,
    pub(crate) pending_deaths: PendingDeaths,
    pub(crate) animations: AnimationSubscriptions,
}

impl CombatSystem {
    /// Create an empty subsystem.
    ///
    /// # Errors
    ///
    /// Returns [`CombatError::InvalidConfig`] if `config` does not validate.
    pub fn init(config: CombatConfig) -> Result<Self> {
        config.validate()?;
        tracing::debug!(?config, "Combat subsystem initialised");
        Ok(Self {
            config,
            store: CombatStore::new(),
            pending_deaths: PendingDeaths::new(),
            animations: AnimationSubscriptions::new(),
        })
    }

    /// Release all state. Returns how many combat records were dropped.
    pub fn shutdown(&mut self) -> usize {
        self.animations.clear();
        self.pending_deaths.clear();
        let released = self.store.clear();
        tracing::debug!(released, "Combat subsystem shut down");
        released
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &CombatConfig {
        &self.config
    }

    /// Grant combat capability: creates an idle record at full health.
    ///
    /// # Errors
    ///
    /// - [`CombatError::UnknownEntity`] if the registry does not know `id`.
    /// - [`CombatError::NotCombatCapable`] if it is not flagged for combat.
    /// - [`CombatError::AlreadyRegistered`] if it already has a record.
    pub fn add_entity<W>(&mut self, world: &W, id: EntityId, stance: Stance) -> Result<()>
    where
        W: EntityRegistry + ?Sized,
    {
        let flags = world.flags(id).ok_or(CombatError::UnknownEntity(id))?;
        if !flags.combat_capable {
            return Err(CombatError::NotCombatCapable(id));
        }
        let max_hp = world.max_hp(id).ok_or(CombatError::UnknownEntity(id))?;
        self.store.insert(id, CombatState::new(max_hp, stance))?;
        tracing::debug!(entity = id, ?stance, max_hp, "Combat record added");
        Ok(())
    }

    /// Revoke combat capability and forget the entity.
    ///
    /// Cancels any pending animation hook, announces the end of an active
    /// attack and drops the entity from the pending-death set.
    ///
    /// # Errors
    ///
    /// Returns [`CombatError::NotRegistered`] if `id` has no record.
    pub fn remove_entity<W>(&mut self, world: &mut W, id: EntityId) -> Result<()>
    where
        W: EventSink + ?Sized,
    {
        let phase = self.store.require(id)?.phase;
        self.animations.unsubscribe(id);
        if phase.is_engaged() {
            world.notify(CombatEvent::attack_ended(id));
        }
        self.pending_deaths.remove(id);
        self.store.remove(id);
        tracing::debug!(entity = id, ?phase, "Combat record removed");
        Ok(())
    }

    /// Change engagement policy.
    ///
    /// Switching to [`Stance::NoEngagement`] stops any attack. Switching to
    /// [`Stance::HoldPosition`] while pursuing abandons the chase and hands
    /// back the interrupted move order, or releases movement if none is held.
    ///
    /// # Errors
    ///
    /// Returns [`CombatError::NotRegistered`] if `id` has no record.
    pub fn set_stance<W>(&mut self, world: &mut W, id: EntityId, stance: Stance) -> Result<()>
    where
        W: CombatWorld + ?Sized,
    {
        let current = self.store.require(id)?;
        if current.stance == stance {
            return Ok(());
        }
        let phase = current.phase;

        if stance == Stance::NoEngagement {
            self.stop_attack(world, id);
        }

        let state = self.store.require_mut(id)?;
        if stance == Stance::HoldPosition && state.phase == CombatPhase::Pursuing {
            end_episode(world, id, state, Handback::Release);
        }
        state.stance = stance;
        tracing::debug!(entity = id, ?stance, ?phase, "Stance changed");
        Ok(())
    }

    /// Engagement policy.
    ///
    /// # Errors
    ///
    /// Returns [`CombatError::NotRegistered`] if `id` has no record.
    pub fn stance(&self, id: EntityId) -> Result<Stance> {
        Ok(self.store.require(id)?.stance)
    }

    /// Set damage per blow.
    ///
    /// # Errors
    ///
    /// Returns [`CombatError::NotRegistered`] if `id` has no record.
    pub fn set_base_damage(&mut self, id: EntityId, damage: u32) -> Result<()> {
        self.store.require_mut(id)?.stats.base_damage = damage;
        Ok(())
    }

    /// Damage per blow.
    ///
    /// # Errors
    ///
    /// Returns [`CombatError::NotRegistered`] if `id` has no record.
    pub fn base_damage(&self, id: EntityId) -> Result<u32> {
        Ok(self.store.require(id)?.stats.base_damage)
    }

    /// Set the fraction of incoming damage blocked.
    ///
    /// # Errors
    ///
    /// - [`CombatError::ArmorOutOfRange`] unless `0 <= armor <= 1`.
    /// - [`CombatError::NotRegistered`] if `id` has no record.
    pub fn set_base_armor(&mut self, id: EntityId, armor: Fixed) -> Result<()> {
        if armor < Fixed::ZERO || armor > Fixed::ONE {
            return Err(CombatError::ArmorOutOfRange(armor.to_num::<f64>()));
        }
        self.store.require_mut(id)?.stats.base_armor = armor;
        Ok(())
    }

    /// Fraction of incoming damage blocked.
    ///
    /// # Errors
    ///
    /// Returns [`CombatError::NotRegistered`] if `id` has no record.
    pub fn base_armor(&self, id: EntityId) -> Result<Fixed> {
        Ok(self.store.require(id)?.stats.base_armor)
    }

    /// Set hit points, clamped to the entity's `max_hp`.
    ///
    /// # Errors
    ///
    /// - [`CombatError::NotRegistered`] if `id` has no record.
    /// - [`CombatError::UnknownEntity`] if the registry lost the entity.
    pub fn set_hp<W>(&mut self, world: &W, id: EntityId, hp: u32) -> Result<()>
    where
        W: EntityRegistry + ?Sized,
    {
        let state = self.store.require_mut(id)?;
        let max_hp = world.max_hp(id).ok_or(CombatError::UnknownEntity(id))?;
        state.current_hp = hp.min(max_hp);
        Ok(())
    }

    /// Remaining hit points.
    ///
    /// # Errors
    ///
    /// Returns [`CombatError::NotRegistered`] if `id` has no record.
    pub fn current_hp(&self, id: EntityId) -> Result<u32> {
        Ok(self.store.require(id)?.current_hp)
    }

    /// State-machine phase.
    ///
    /// # Errors
    ///
    /// Returns [`CombatError::NotRegistered`] if `id` has no record.
    pub fn phase(&self, id: EntityId) -> Result<CombatPhase> {
        Ok(self.store.require(id)?.phase)
    }

    /// Current target, if the phase carries one.
    ///
    /// # Errors
    ///
    /// Returns [`CombatError::NotRegistered`] if `id` has no record.
    pub fn target(&self, id: EntityId) -> Result<Option<EntityId>> {
        Ok(self.store.require(id)?.target)
    }

    /// Move order combat is holding for the entity.
    ///
    /// # Errors
    ///
    /// Returns [`CombatError::NotRegistered`] if `id` has no record.
    pub fn saved_move(&self, id: EntityId) -> Result<Option<SuspendedMove>> {
        Ok(self.store.require(id)?.saved_move)
    }

    /// Full record, if any.
    #[must_use]
    pub fn state(&self, id: EntityId) -> Option<&CombatState> {
        self.store.get(id)
    }

    /// Break off any fight and hand back the interrupted move order.
    ///
    /// No-op for unknown or dying entities.
    pub fn stop_attack<W>(&mut self, world: &mut W, id: EntityId)
    where
        W: MovementControl + EventSink + ?Sized,
    {
        let Some(state) = self.store.get_mut(id) else {
            return;
        };
        if state.phase == CombatPhase::Dying {
            return;
        }
        self.animations
            .unsubscribe_hook(id, AnimationHook::AttackCycle);
        if state.phase.is_engaged() {
            world.notify(CombatEvent::attack_ended(id));
        }
        end_episode(world, id, state, Handback::Leave);
    }

    /// Forget the held move order without handing it back.
    pub fn clear_saved_move(&mut self, id: EntityId) {
        if let Some(state) = self.store.get_mut(id) {
            state.saved_move = None;
        }
    }

    /// Whether the entity is mid death animation.
    #[must_use]
    pub fn is_pending_death(&self, id: EntityId) -> bool {
        self.pending_deaths.contains(id)
    }

    /// Entities mid death animation, ascending.
    #[must_use]
    pub fn pending_deaths(&self) -> Vec<EntityId> {
        self.pending_deaths.iter().collect()
    }

    /// Animation hook currently registered for the entity.
    #[must_use]
    pub fn animation_hook(&self, id: EntityId) -> Option<AnimationHook> {
        self.animations.hook_for(id)
    }

    /// Number of combat records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// Whether there are no combat records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Hash of all combat state, for desync detection.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();

        let ids = self.store.sorted_ids();
        ids.len().hash(&mut hasher);
        for id in ids {
            let Some(state) = self.store.get(id) else {
                continue;
            };
            id.hash(&mut hasher);
            state.stance.tag().hash(&mut hasher);
            state.phase.tag().hash(&mut hasher);
            state.target.hash(&mut hasher);
            state.current_hp.hash(&mut hasher);
            state.stats.base_damage.hash(&mut hasher);
            state.stats.base_armor.to_bits().hash(&mut hasher);
            if let Some(saved) = state.saved_move {
                let dest = saved.destination();
                dest.x.to_bits().hash(&mut hasher);
                dest.y.to_bits().hash(&mut hasher);
            }
        }

        self.pending_deaths.len().hash(&mut hasher);
        for id in self.pending_deaths.iter() {
            id.hash(&mut hasher);
        }

        hasher.finish()
    }
}

impl CombatSystem {
    /// Panic if a record's phase and the pending-death set disagree.
    #[cfg(feature = "debug-validation")]
    pub(crate) fn debug_validate(&self) {
        for (id, state) in self.store.iter() {
            assert_eq!(
                state.phase == CombatPhase::Dying,
                self.pending_deaths.contains(*id),
                "entity {id} in phase {:?} disagrees with the pending-death set",
                state.phase
            );
        }
        for id in self.pending_deaths.iter() {
            assert!(self.store.contains(id), "pending death {id} has no record");
        }
    }
}

/// What [`end_episode`] does to movement when no move order is held.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Handback {
    /// Leave movement alone.
    Leave,
    /// Halt in place.
    Stop,
    /// Drop all movement state.
    Release,
}

/// Return to idle and hand movement back.
///
/// The held move order is resumed if there is one; otherwise `fallback`
/// applies.
pub(crate) fn end_episode<W>(
    world: &mut W,
    id: EntityId,
    state: &mut CombatState,
    fallback: Handback,
) where
    W: MovementControl + ?Sized,
{
    state.phase = CombatPhase::Idle;
    state.target = None;
    match (state.saved_move.take(), fallback) {
        (Some(saved), _) => world.resume(id, saved),
        (None, Handback::Leave) => {}
        (None, Handback::Stop) => world.stop(id),
        (None, Handback::Release) => world.release(id),
    }
}

/// Turn `id` toward `target`. Coincident entities keep their facing.
pub(crate) fn face_target<W>(world: &mut W, id: EntityId, target: EntityId)
where
    W: EntityRegistry + ?Sized,
{
    let (Some(from), Some(to)) = (world.position(id), world.position(target)) else {
        return;
    };
    if let Some(direction) = (to - from).try_normalize() {
        world.set_facing(id, direction);
    }
}

impl Default for CombatSystem {
    fn default() -> Self {
        Self {
            config: CombatConfig::default(),
            store: CombatStore::new(),
            pending_deaths: PendingDeaths::new(),
            animations: AnimationSubscriptions::new(),
        }
    }
}
