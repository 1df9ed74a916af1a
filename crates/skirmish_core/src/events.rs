//! Combat notifications and animation subscriptions.
//!
//! Outbound: [`CombatEvent`]s pushed to the engine's event bus through
//! [`crate::world::EventSink`].
//!
//! Inbound: the engine reports every finished animation cycle to
//! [`crate::system::CombatSystem::on_animation_cycle_finished`]. Only entities
//! with a live [`AnimationHook`] react. Hooks are one-shot: delivery removes
//! them, so a cycle is handled at most once, and removing an entity drops its
//! hook even if the engine keeps sending events for a destroyed ID.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::state::EntityId;

/// Delivery priority for bus notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum EventPriority {
    /// Engine-internal notification, dispatched before script handlers.
    #[default]
    Engine,
    /// Script-level notification.
    Script,
}

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CombatEventKind {
    /// The entity started trading blows.
    AttackStarted,
    /// The entity stopped trading blows.
    AttackEnded,
    /// The entity took a fatal hit.
    EntityDied,
}

/// Notification emitted by the combat subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CombatEvent {
    /// Event kind.
    pub kind: CombatEventKind,
    /// Subject entity.
    pub entity: EntityId,
    /// Dispatch priority.
    pub priority: EventPriority,
}

impl CombatEvent {
    /// Engine-priority `AttackStarted`.
    #[must_use]
    pub const fn attack_started(entity: EntityId) -> Self {
        Self::engine(CombatEventKind::AttackStarted, entity)
    }

    /// Engine-priority `AttackEnded`.
    #[must_use]
    pub const fn attack_ended(entity: EntityId) -> Self {
        Self::engine(CombatEventKind::AttackEnded, entity)
    }

    /// Engine-priority `EntityDied`.
    #[must_use]
    pub const fn died(entity: EntityId) -> Self {
        Self::engine(CombatEventKind::EntityDied, entity)
    }

    const fn engine(kind: CombatEventKind, entity: EntityId) -> Self {
        Self {
            kind,
            entity,
            priority: EventPriority::Engine,
        }
    }
}

/// Handler waiting on an entity's next animation cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnimationHook {
    /// Resolve a swing when the attack animation completes.
    AttackCycle,
    /// Reap the entity when the death animation completes.
    DeathCycle,
}

/// At most one pending [`AnimationHook`] per entity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnimationSubscriptions {
    hooks: HashMap<EntityId, AnimationHook>,
}

impl AnimationSubscriptions {
    /// Create an empty subscription table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `hook` for `entity`, replacing any earlier one.
    ///
    /// Returns the replaced hook, if any.
    pub fn subscribe(&mut self, entity: EntityId, hook: AnimationHook) -> Option<AnimationHook> {
        let previous = self.hooks.insert(entity, hook);
        if let Some(previous) = previous {
            if previous != hook {
                tracing::trace!(entity, ?previous, ?hook, "Animation hook replaced");
            }
        }
        previous
    }

    /// Drop whatever hook `entity` has.
    pub fn unsubscribe(&mut self, entity: EntityId) -> Option<AnimationHook> {
        self.hooks.remove(&entity)
    }

    /// Drop `entity`'s hook only if it is `hook`. Returns whether it was.
    pub fn unsubscribe_hook(&mut self, entity: EntityId, hook: AnimationHook) -> bool {
        if self.hooks.get(&entity) == Some(&hook) {
            self.hooks.remove(&entity);
            true
        } else {
            false
        }
    }

    /// Deliver: remove and return the hook for `entity`.
    pub fn take(&mut self, entity: EntityId) -> Option<AnimationHook> {
        self.hooks.remove(&entity)
    }

    /// Peek at the hook for `entity`.
    #[must_use]
    pub fn hook_for(&self, entity: EntityId) -> Option<AnimationHook> {
        self.hooks.get(&entity).copied()
    }

    /// Number of live hooks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    /// Whether no hooks are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Drop every hook.
    pub fn clear(&mut self) {
        self.hooks.clear();
    }
}
