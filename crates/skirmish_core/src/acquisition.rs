//! Enemy detection.
//!
//! Cost per query is bounded by [`CombatConfig::max_candidates`], not by the
//! number of entities in the world.

use crate::config::CombatConfig;
use crate::math::Fixed;
use crate::state::{CombatPhase, EntityId};
use crate::store::CombatStore;
use crate::world::{Diplomacy, EntityRegistry, SpatialQuery};

/// Distance between the two entities' collision circles.
///
/// Negative when they overlap. `None` if either entity is gone.
pub fn surface_distance<W>(world: &W, a: EntityId, b: EntityId) -> Option<Fixed>
where
    W: EntityRegistry + ?Sized,
{
    let center = world.position(a)?.distance(world.position(b)?);
    let radii = world.collision_radius(a)?.saturating_add(world.collision_radius(b)?);
    Some(center.saturating_sub(radii))
}

/// Whether `a` and `b` are hostile. Members of one faction never are.
pub fn are_enemies<W>(world: &W, a: EntityId, b: EntityId) -> bool
where
    W: EntityRegistry + Diplomacy + ?Sized,
{
    match (world.faction(a), world.faction(b)) {
        (Some(fa), Some(fb)) if fa != fb => world.at_war(fa, fb),
        _ => false,
    }
}

/// Whether `candidate` can be fought at all right now, from `seeker`'s view.
///
/// Excludes the seeker itself, missing or non-combat entities, zombies,
/// non-enemies and anything already dying.
pub fn is_valid_enemy<W>(world: &W, store: &CombatStore, seeker: EntityId, candidate: EntityId) -> bool
where
    W: EntityRegistry + Diplomacy + ?Sized,
{
    if candidate == seeker {
        return false;
    }
    let Some(flags) = world.flags(candidate) else {
        return false;
    };
    if !flags.combat_capable || flags.zombie {
        return false;
    }
    if !are_enemies(world, seeker, candidate) {
        return false;
    }
    match store.get(candidate) {
        Some(state) => state.phase != CombatPhase::Dying,
        None => {
            tracing::warn!(
                entity = candidate,
                "Combat-capable entity has no combat record; ignoring as target"
            );
            false
        }
    }
}

/// Nearest valid enemy within the acquisition radius, by surface distance.
///
/// Ties go to whichever candidate the spatial index listed first.
pub fn closest_enemy_in_range<W>(
    world: &W,
    store: &CombatStore,
    config: &CombatConfig,
    seeker: EntityId,
) -> Option<EntityId>
where
    W: EntityRegistry + SpatialQuery + Diplomacy + ?Sized,
{
    let origin = world.position(seeker)?;
    let candidates = world.entities_in_circle(
        origin,
        config.acquisition_radius_fixed(),
        config.max_candidates,
    );

    let mut best: Option<(EntityId, Fixed)> = None;
    for candidate in candidates.into_iter().take(config.max_candidates) {
        if !is_valid_enemy(world, store, seeker, candidate) {
            continue;
        }
        let Some(dist) = surface_distance(world, seeker, candidate) else {
            continue;
        };
        if best.map_or(true, |(_, best_dist)| dist < best_dist) {
            best = Some((candidate, dist));
        }
    }

    if let Some((enemy, dist)) = best {
        tracing::trace!(seeker, enemy, distance = %dist, "Closest enemy acquired");
    }
    best.map(|(enemy, _)| enemy)
}

/// Whether `target` is within melee range of `attacker`.
pub fn in_melee_range<W>(world: &W, config: &CombatConfig, attacker: EntityId, target: EntityId) -> bool
where
    W: EntityRegistry + ?Sized,
{
    surface_distance(world, attacker, target)
        .is_some_and(|dist| dist <= config.melee_range_fixed())
}
