//! Per-tick advancement of the combat state machine.
//!
//! Every tick each combat-capable dynamic entity takes at most one step.
//! Perception is never cached: idle, pursuing and ready entities re-run
//! acquisition each tick, and a ready entity re-validates its target
//! before swinging.
//!
//! | Phase    | Condition                                    | Next     |
//! |----------|----------------------------------------------|----------|
//! | Idle     | stance is `NoEngagement`                     | Idle     |
//! | Idle     | enemy in melee range                         | Ready    |
//! | Idle     | enemy beyond melee range, stance aggressive  | Pursuing |
//! | Pursuing | no enemy                                     | Idle     |
//! | Pursuing | enemy reached melee range                    | Ready    |
//! | Ready    | target invalid, another enemy in melee range | Ready    |
//! | Ready    | target invalid, nobody else in reach         | Idle     |
//! | Ready    | target valid                                 | Striking |
//!
//! `Striking` and `Dying` wait for animation cycles and are not stepped here.

use crate::acquisition::{closest_enemy_in_range, in_melee_range};
use crate::error::Result;
use crate::events::{AnimationHook, CombatEvent};
use crate::state::{CombatPhase, EntityId, Stance};
use crate::system::{end_episode, face_target, CombatSystem, Handback};
use crate::world::CombatWorld;

/// One phase change observed during a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseTransition {
    /// Entity that changed phase.
    pub entity: EntityId,
    /// Phase before the step.
    pub from: CombatPhase,
    /// Phase after the step.
    pub to: CombatPhase,
    /// Target after the step.
    pub target: Option<EntityId>,
}

/// Summary of a tick, for logging and tests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Combat-capable entities stepped.
    pub stepped: usize,
    /// Phase changes in processing order.
    pub transitions: Vec<PhaseTransition>,
}

impl TickReport {
    /// Transition recorded for `entity`, if it changed phase.
    #[must_use]
    pub fn transition_for(&self, entity: EntityId) -> Option<&PhaseTransition> {
        self.transitions.iter().find(|t| t.entity == entity)
    }
}

impl CombatSystem {
    /// Advance every combat-capable dynamic entity by one step.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::CombatError::NotRegistered`] if the registry
    /// reports a combat-capable entity that was never added. That is a caller
    /// contract breach; entities already stepped this tick keep their step.
    pub fn tick<W>(&mut self, world: &mut W) -> Result<TickReport>
    where
        W: CombatWorld + ?Sized,
    {
        let mut report = TickReport::default();

        for id in world.dynamic_entities() {
            let Some(flags) = world.flags(id) else {
                continue;
            };
            if !flags.combat_capable {
                continue;
            }

            let from = self.store.require(id)?.phase;
            let to = match from {
                CombatPhase::Idle => self.step_idle(world, id),
                CombatPhase::Pursuing => self.step_pursuing(world, id),
                CombatPhase::Ready => self.step_ready(world, id),
                CombatPhase::Striking | CombatPhase::Dying => from,
            };
            report.stepped += 1;

            if to != from {
                let target = self.store.get(id).and_then(|state| state.target);
                tracing::debug!(entity = id, ?from, ?to, ?target, "Combat phase transition");
                report.transitions.push(PhaseTransition {
                    entity: id,
                    from,
                    to,
                    target,
                });
            }
        }

        #[cfg(feature = "debug-validation")]
        self.debug_validate();

        Ok(report)
    }

    fn step_idle<W>(&mut self, world: &mut W, id: EntityId) -> CombatPhase
    where
        W: CombatWorld + ?Sized,
    {
        let stance = match self.store.get(id) {
            Some(state) => state.stance,
            None => return CombatPhase::Idle,
        };
        if stance == Stance::NoEngagement {
            return CombatPhase::Idle;
        }

        let Some(enemy) = closest_enemy_in_range(&*world, &self.store, &self.config, id) else {
            return CombatPhase::Idle;
        };
        let in_reach = in_melee_range(&*world, &self.config, id, enemy);

        let Some(state) = self.store.get_mut(id) else {
            return CombatPhase::Idle;
        };

        if in_reach {
            state.target = Some(enemy);
            state.phase = CombatPhase::Ready;
            face_target(world, id, enemy);
            world.notify(CombatEvent::attack_started(id));
        } else if stance == Stance::Aggressive {
            state.target = Some(enemy);
            state.phase = CombatPhase::Pursuing;
            if state.saved_move.is_none() {
                state.saved_move = world.suspend(id);
            }
            world.seek_enemies(id);
        }

        state.phase
    }

    fn step_pursuing<W>(&mut self, world: &mut W, id: EntityId) -> CombatPhase
    where
        W: CombatWorld + ?Sized,
    {
        let enemy = closest_enemy_in_range(&*world, &self.store, &self.config, id);
        let in_reach = match enemy {
            Some(enemy) => in_melee_range(&*world, &self.config, id, enemy),
            None => false,
        };

        let Some(state) = self.store.get_mut(id) else {
            return CombatPhase::Idle;
        };

        let Some(enemy) = enemy else {
            end_episode(world, id, state, Handback::Stop);
            return CombatPhase::Idle;
        };

        if state.target != Some(enemy) {
            tracing::trace!(entity = id, previous = ?state.target, enemy, "Pursuit retargeted");
            state.target = Some(enemy);
        }

        if in_reach {
            state.phase = CombatPhase::Ready;
            world.stop(id);
            face_target(world, id, enemy);
            world.notify(CombatEvent::attack_started(id));
        }

        state.phase
    }

    fn step_ready<W>(&mut self, world: &mut W, id: EntityId) -> CombatPhase
    where
        W: CombatWorld + ?Sized,
    {
        let target = self.store.get(id).and_then(|state| state.target);
        let target_ok = match target {
            Some(target) => self.can_strike(&*world, id, target),
            None => false,
        };

        if target_ok {
            if let Some(state) = self.store.get_mut(id) {
                state.phase = CombatPhase::Striking;
                self.animations.subscribe(id, AnimationHook::AttackCycle);
            }
            return CombatPhase::Striking;
        }

        let alternate = closest_enemy_in_range(&*world, &self.store, &self.config, id)
            .filter(|&enemy| in_melee_range(&*world, &self.config, id, enemy));

        let Some(state) = self.store.get_mut(id) else {
            return CombatPhase::Idle;
        };

        if let Some(enemy) = alternate {
            tracing::trace!(entity = id, previous = ?target, enemy, "Melee retargeted");
            state.target = Some(enemy);
            face_target(world, id, enemy);
            return CombatPhase::Ready;
        }

        world.notify(CombatEvent::attack_ended(id));
        end_episode(world, id, state, Handback::Leave);
        CombatPhase::Idle
    }

    /// Whether `target` is still alive, not dying, and within reach.
    fn can_strike<W>(&self, world: &W, id: EntityId, target: EntityId) -> bool
    where
        W: CombatWorld + ?Sized,
    {
        let Some(flags) = world.flags(target) else {
            return false;
        };
        if flags.zombie {
            return false;
        }
        let dying = self
            .store
            .get(target)
            .map_or(true, |state| state.phase == CombatPhase::Dying);
        !dying && in_melee_range(world, &self.config, id, target)
    }
}
