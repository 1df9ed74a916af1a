//! Interfaces to the systems combat depends on but does not own.
//!
//! The engine implements these over its real registry, spatial index,
//! movement planner and event bus. Every call is keyed by [`EntityId`];
//! combat never holds references into another subsystem across a tick.

use crate::events::CombatEvent;
use crate::math::{Fixed, Vec2Fixed};
use crate::state::{EntityId, FactionId, SuspendedMove};

/// Registry flags combat cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct EntityFlags {
    /// May participate in combat.
    pub combat_capable: bool,
    /// Dead but not yet removed; ignored by everything.
    pub zombie: bool,
    /// Can be picked by the player.
    pub selectable: bool,
}

/// Live entity lookup.
pub trait EntityRegistry {
    /// Flags, or `None` if the entity no longer exists.
    fn flags(&self, id: EntityId) -> Option<EntityFlags>;

    /// Maximum hit points. Zero marks an invulnerable entity.
    fn max_hp(&self, id: EntityId) -> Option<u32>;

    /// Owning faction.
    fn faction(&self, id: EntityId) -> Option<FactionId>;

    /// Ground-plane position.
    fn position(&self, id: EntityId) -> Option<Vec2Fixed>;

    /// Collision radius used for surface-to-surface distances.
    fn collision_radius(&self, id: EntityId) -> Option<Fixed>;

    /// Turn the entity to face along a unit `direction`.
    fn set_facing(&mut self, id: EntityId, direction: Vec2Fixed);

    /// Remove the selectable flag.
    fn clear_selectable(&mut self, id: EntityId);

    /// Hand a finished corpse to the engine's removal path.
    fn zombify(&mut self, id: EntityId);

    /// Entities the engine currently simulates, in the order they are ticked.
    fn dynamic_entities(&self) -> Vec<EntityId>;

    /// Whether the entity still exists.
    fn contains(&self, id: EntityId) -> bool {
        self.flags(id).is_some()
    }
}

/// Bounded proximity queries.
pub trait SpatialQuery {
    /// Up to `max_results` entities whose position lies within `radius` of
    /// `center`, in the index's iteration order.
    fn entities_in_circle(&self, center: Vec2Fixed, radius: Fixed, max_results: usize)
        -> Vec<EntityId>;
}

/// Faction relations.
pub trait Diplomacy {
    /// Whether two distinct factions are at war.
    fn at_war(&self, a: FactionId, b: FactionId) -> bool;
}

/// Movement planner.
pub trait MovementControl {
    /// Current move order destination, if the entity has one.
    fn destination(&self, id: EntityId) -> Option<Vec2Fixed>;

    /// Issue a move order.
    fn set_destination(&mut self, id: EntityId, destination: Vec2Fixed);

    /// Halt in place.
    fn stop(&mut self, id: EntityId);

    /// Switch to closing in on nearby enemies.
    fn seek_enemies(&mut self, id: EntityId);

    /// Drop all movement state for the entity.
    fn release(&mut self, id: EntityId);

    /// Take over the entity's current move order so it can be handed back.
    fn suspend(&mut self, id: EntityId) -> Option<SuspendedMove> {
        self.destination(id).map(SuspendedMove::new)
    }

    /// Hand back a suspended move order.
    fn resume(&mut self, id: EntityId, suspended: SuspendedMove) {
        self.set_destination(id, suspended.destination());
    }
}

/// Player selection.
pub trait Selection {
    /// Remove the entity from the active selection.
    fn deselect(&mut self, id: EntityId);
}

/// Outbound notifications.
pub trait EventSink {
    /// Deliver synchronously.
    fn notify(&mut self, event: CombatEvent);
}

/// Everything the combat subsystem talks to.
pub trait CombatWorld:
    EntityRegistry + SpatialQuery + Diplomacy + MovementControl + Selection + EventSink
{
}

impl<T> CombatWorld for T where
    T: EntityRegistry + SpatialQuery + Diplomacy + MovementControl + Selection + EventSink
{
}
