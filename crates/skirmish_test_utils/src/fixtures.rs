//! Test fixtures and helpers.
//!
//! [`MockWorld`] stands in for the engine: a registry, spatial index,
//! diplomacy table, movement planner, selection and event bus all in one
//! deterministic struct. Every call combat makes is observable afterwards.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Once;

use fixed::types::I32F32;
use skirmish_core::events::{CombatEvent, CombatEventKind};
use skirmish_core::math::{Fixed, Vec2Fixed};
use skirmish_core::state::{EntityId, FactionId};
use skirmish_core::world::{
    Diplomacy, EntityFlags, EntityRegistry, EventSink, MovementControl, Selection, SpatialQuery,
};

/// Create a fixed-point number from an integer.
#[must_use]
pub fn fixed(n: i32) -> I32F32 {
    I32F32::from_num(n)
}

/// Create a fixed-point number from a float (for tests only).
///
/// Note: In real simulation code, never use floats.
/// This is only for convenient test setup.
#[must_use]
pub fn fixed_f(n: f64) -> I32F32 {
    I32F32::from_num(n)
}

/// Create a fixed-point vector from integer coordinates.
#[must_use]
pub fn point(x: i32, y: i32) -> Vec2Fixed {
    Vec2Fixed::from_ints(x, y)
}

static TRACING: Once = Once::new();

/// Install a test subscriber honouring `RUST_LOG`. Safe to call repeatedly.
pub fn init_test_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// What the movement planner is doing with an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MovementMode {
    /// No orders.
    #[default]
    Idle,
    /// Following a move order to `MockEntity::destination`.
    Moving,
    /// Explicitly halted.
    Stopped,
    /// Closing in on nearby enemies.
    SeekingEnemies,
    /// All movement state dropped.
    Released,
}

/// One scripted entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockEntity {
    /// Ground position.
    pub position: Vec2Fixed,
    /// Collision radius.
    pub radius: Fixed,
    /// Owning faction.
    pub faction: FactionId,
    /// Registry flags.
    pub flags: EntityFlags,
    /// Maximum hit points.
    pub max_hp: u32,
    /// Last facing set by combat.
    pub facing: Option<Vec2Fixed>,
    /// Current move order.
    pub destination: Option<Vec2Fixed>,
    /// Planner mode.
    pub movement: MovementMode,
}

impl MockEntity {
    /// Combat-capable, selectable unit with radius 1 and 100 HP.
    #[must_use]
    pub fn unit(faction: FactionId, position: Vec2Fixed) -> Self {
        Self {
            position,
            radius: Fixed::ONE,
            faction,
            flags: EntityFlags {
                combat_capable: true,
                zombie: false,
                selectable: true,
            },
            max_hp: 100,
            facing: None,
            destination: None,
            movement: MovementMode::Idle,
        }
    }
}

/// Scripted engine world.
///
/// Entities are ticked and returned from spatial queries in spawn order.
#[derive(Debug, Clone, Default)]
pub struct MockWorld {
    entities: BTreeMap<EntityId, MockEntity>,
    order: Vec<EntityId>,
    wars: BTreeSet<(FactionId, FactionId)>,
    /// Currently selected entities.
    pub selection: BTreeSet<EntityId>,
    /// Every notification received, in order.
    pub events: Vec<CombatEvent>,
    /// Corpses handed to the removal path, in order.
    pub zombified: Vec<EntityId>,
}

impl MockWorld {
    /// Empty world; no faction is at war.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a default unit and return it for further tweaking.
    pub fn spawn(&mut self, id: EntityId, faction: u8, position: Vec2Fixed) -> &mut MockEntity {
        self.insert(id, MockEntity::unit(FactionId(faction), position))
    }

    /// Add a fully specified entity.
    pub fn insert(&mut self, id: EntityId, entity: MockEntity) -> &mut MockEntity {
        if !self.entities.contains_key(&id) {
            self.order.push(id);
        }
        self.entities.entry(id).or_insert(entity)
    }

    /// Remove an entity from the registry entirely.
    pub fn despawn(&mut self, id: EntityId) {
        self.entities.remove(&id);
        self.order.retain(|&other| other != id);
        self.selection.remove(&id);
    }

    /// Put two factions at war with each other.
    pub fn declare_war(&mut self, a: u8, b: u8) {
        self.wars.insert((FactionId(a), FactionId(b)));
        self.wars.insert((FactionId(b), FactionId(a)));
    }

    /// Scripted entity.
    #[must_use]
    pub fn entity(&self, id: EntityId) -> Option<&MockEntity> {
        self.entities.get(&id)
    }

    /// Scripted entity, mutably.
    ///
    /// # Panics
    ///
    /// Panics if the entity was never spawned.
    pub fn entity_mut(&mut self, id: EntityId) -> &mut MockEntity {
        self.entities
            .get_mut(&id)
            .unwrap_or_else(|| panic!("entity {id} not spawned"))
    }

    /// Teleport an entity.
    pub fn place(&mut self, id: EntityId, position: Vec2Fixed) {
        self.entity_mut(id).position = position;
    }

    /// Issue a move order as a player would.
    pub fn order_move(&mut self, id: EntityId, destination: Vec2Fixed) {
        let entity = self.entity_mut(id);
        entity.destination = Some(destination);
        entity.movement = MovementMode::Moving;
    }

    /// Planner mode for an entity.
    ///
    /// # Panics
    ///
    /// Panics if the entity was never spawned.
    #[must_use]
    pub fn movement(&self, id: EntityId) -> MovementMode {
        self.entities
            .get(&id)
            .map(|entity| entity.movement)
            .unwrap_or_else(|| panic!("entity {id} not spawned"))
    }

    /// Events of one kind, in order of arrival.
    #[must_use]
    pub fn events_of(&self, kind: CombatEventKind) -> Vec<EntityId> {
        self.events
            .iter()
            .filter(|event| event.kind == kind)
            .map(|event| event.entity)
            .collect()
    }

    /// Drain the event log.
    pub fn take_events(&mut self) -> Vec<CombatEvent> {
        std::mem::take(&mut self.events)
    }
}

impl EntityRegistry for MockWorld {
    fn flags(&self, id: EntityId) -> Option<EntityFlags> {
        self.entities.get(&id).map(|entity| entity.flags)
    }

    fn max_hp(&self, id: EntityId) -> Option<u32> {
        self.entities.get(&id).map(|entity| entity.max_hp)
    }

    fn faction(&self, id: EntityId) -> Option<FactionId> {
        self.entities.get(&id).map(|entity| entity.faction)
    }

    fn position(&self, id: EntityId) -> Option<Vec2Fixed> {
        self.entities.get(&id).map(|entity| entity.position)
    }

    fn collision_radius(&self, id: EntityId) -> Option<Fixed> {
        self.entities.get(&id).map(|entity| entity.radius)
    }

    fn set_facing(&mut self, id: EntityId, direction: Vec2Fixed) {
        if let Some(entity) = self.entities.get_mut(&id) {
            entity.facing = Some(direction);
        }
    }

    fn clear_selectable(&mut self, id: EntityId) {
        if let Some(entity) = self.entities.get_mut(&id) {
            entity.flags.selectable = false;
        }
    }

    fn zombify(&mut self, id: EntityId) {
        if let Some(entity) = self.entities.get_mut(&id) {
            entity.flags.zombie = true;
        }
        self.zombified.push(id);
    }

    fn dynamic_entities(&self) -> Vec<EntityId> {
        self.order.clone()
    }
}

impl SpatialQuery for MockWorld {
    fn entities_in_circle(
        &self,
        center: Vec2Fixed,
        radius: Fixed,
        max_results: usize,
    ) -> Vec<EntityId> {
        self.order
            .iter()
            .copied()
            .filter(|id| {
                self.entities
                    .get(id)
                    .is_some_and(|entity| entity.position.distance(center) <= radius)
            })
            .take(max_results)
            .collect()
    }
}

impl Diplomacy for MockWorld {
    fn at_war(&self, a: FactionId, b: FactionId) -> bool {
        self.wars.contains(&(a, b))
    }
}

impl MovementControl for MockWorld {
    fn destination(&self, id: EntityId) -> Option<Vec2Fixed> {
        self.entities
            .get(&id)
            .filter(|entity| entity.movement == MovementMode::Moving)
            .and_then(|entity| entity.destination)
    }

    fn set_destination(&mut self, id: EntityId, destination: Vec2Fixed) {
        if let Some(entity) = self.entities.get_mut(&id) {
            entity.destination = Some(destination);
            entity.movement = MovementMode::Moving;
        }
    }

    fn stop(&mut self, id: EntityId) {
        if let Some(entity) = self.entities.get_mut(&id) {
            entity.destination = None;
            entity.movement = MovementMode::Stopped;
        }
    }

    fn seek_enemies(&mut self, id: EntityId) {
        if let Some(entity) = self.entities.get_mut(&id) {
            entity.destination = None;
            entity.movement = MovementMode::SeekingEnemies;
        }
    }

    fn release(&mut self, id: EntityId) {
        if let Some(entity) = self.entities.get_mut(&id) {
            entity.destination = None;
            entity.movement = MovementMode::Released;
        }
    }
}

impl Selection for MockWorld {
    fn deselect(&mut self, id: EntityId) {
        self.selection.remove(&id);
    }
}

impl EventSink for MockWorld {
    fn notify(&mut self, event: CombatEvent) {
        self.events.push(event);
    }
}

/// Two hostile units, ids 1 (faction 1) and 2 (faction 2), `gap` apart
/// surface to surface on the X axis.
#[must_use]
pub fn duel(gap: i32) -> MockWorld {
    let mut world = MockWorld::new();
    world.declare_war(1, 2);
    world.spawn(1, 1, point(0, 0));
    world.spawn(2, 2, point(gap + 2, 0));
    world
}
