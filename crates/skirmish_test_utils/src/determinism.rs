//! Replay checks for combat.
//!
//! A [`Scenario`] is stepped several times from the same setup and the final
//! [`Scenario::hash`] values compared. Peers run combat in lockstep, so any
//! mismatch is a desync. Combat has no randomness and no floats; the hazards
//! left are container iteration order (records hash and save in ascending
//! entity ID) and state lost across a save/load.

use std::thread;

use skirmish_core::events::CombatEventKind;
use skirmish_core::math::Fixed;
use skirmish_core::state::{EntityId, Stance};
use skirmish_core::system::CombatSystem;
use skirmish_core::world::EntityRegistry;

use crate::fixtures::{point, MockWorld};

/// A combat subsystem together with the world it runs against.
#[derive(Debug, Clone)]
pub struct Scenario {
    /// Subsystem under test.
    pub combat: CombatSystem,
    /// Scripted world.
    pub world: MockWorld,
}

impl Scenario {
    /// Advance one tick, then finish every attack and death animation
    /// that is in flight, in ascending entity order.
    ///
    /// # Panics
    ///
    /// Panics if the tick reports a contract breach.
    pub fn step(&mut self) {
        if let Err(e) = self.combat.tick(&mut self.world) {
            panic!("tick failed: {e}");
        }
        let mut animating: Vec<_> = self
            .world
            .dynamic_entities()
            .into_iter()
            .filter(|&id| self.combat.animation_hook(id).is_some())
            .collect();
        animating.sort_unstable();
        for id in animating {
            self.combat.on_animation_cycle_finished(&mut self.world, id);
        }
    }

    /// Hash of combat state plus the world-visible outcome.
    #[must_use]
    pub fn hash(&self) -> u64 {
        let deaths = self.world.events_of(CombatEventKind::EntityDied);
        compute_hash(&(self.combat.state_hash(), deaths, &self.world.zombified))
    }
}

/// Two aggressive lines of `per_side` units facing each other 6 units
/// apart, already inside melee range. Faction 1 holds IDs `1..=per_side`,
/// faction 2 the rest.
///
/// # Panics
///
/// Panics if registration fails, which would be a fixture bug.
#[must_use]
pub fn skirmish_scenario(per_side: u32) -> Scenario {
    let mut world = MockWorld::new();
    world.declare_war(1, 2);
    let mut combat = CombatSystem::default();

    let lines = [(1u8, 0i32), (2u8, 6i32)];
    let mut next_id: EntityId = 1;
    for (faction, x) in lines {
        for row in 0..per_side {
            let y = i32::try_from(row).unwrap_or(i32::MAX / 3) * 3;
            world.spawn(next_id, faction, point(x, y)).max_hp = 60;
            combat
                .add_entity(&world, next_id, Stance::Aggressive)
                .expect("fixture entity registers");
            combat
                .set_base_damage(next_id, 15)
                .expect("fixture entity registered");
            combat
                .set_base_armor(next_id, Fixed::from_num(0.25))
                .expect("armor in range");
            next_id += 1;
        }
    }

    Scenario { combat, world }
}

/// Final [`Scenario::hash`] of every run of one setup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminismResult {
    /// One hash per run, in run order.
    pub hashes: Vec<u64>,
    /// Steps each run took.
    pub ticks: u64,
}

impl DeterminismResult {
    /// Index of the first run whose hash differs from run 0.
    #[must_use]
    pub fn first_mismatch(&self) -> Option<usize> {
        let first = self.hashes.first()?;
        self.hashes.iter().position(|hash| hash != first)
    }

    /// Whether every run ended on the same hash.
    #[must_use]
    pub fn is_deterministic(&self) -> bool {
        self.first_mismatch().is_none()
    }

    /// # Panics
    ///
    /// Panics naming the first run that disagreed with run 0.
    pub fn assert_deterministic(&self) {
        if let Some(run) = self.first_mismatch() {
            panic!(
                "battle diverged after {} steps: run {run} hashed {:#x}, run 0 hashed {:#x}",
                self.ticks, self.hashes[run], self.hashes[0]
            );
        }
    }
}

/// Run a scenario multiple times and verify determinism.
///
/// # Arguments
///
/// * `runs` - Number of times to run the scenario
/// * `ticks` - Number of ticks to simulate per run
/// * `setup` - Function to create the initial scenario
///
/// # Example
///
/// ```ignore
/// use skirmish_test_utils::determinism::verify_determinism;
///
/// let result = verify_determinism(3, 200, || skirmish_scenario(8));
/// result.assert_deterministic();
/// ```
pub fn verify_determinism<F>(runs: usize, ticks: u64, setup: F) -> DeterminismResult
where
    F: Fn() -> Scenario,
{
    let mut hashes = Vec::with_capacity(runs);

    for _ in 0..runs {
        let mut scenario = setup();
        for _ in 0..ticks {
            scenario.step();
        }
        hashes.push(scenario.hash());
    }

    DeterminismResult { hashes, ticks }
}

/// Run N scenarios on scoped threads and collect final hashes.
///
/// Catches non-determinism that only shows up under thread scheduling or
/// memory layout differences.
///
/// # Panics
///
/// Panics if a worker thread panics.
pub fn run_parallel_scenarios<F>(setup: F, runs: usize, ticks: u64) -> DeterminismResult
where
    F: Fn() -> Scenario + Sync,
{
    let hashes: Vec<u64> = thread::scope(|s| {
        let handles: Vec<_> = (0..runs)
            .map(|_| {
                s.spawn(|| {
                    let mut scenario = setup();
                    for _ in 0..ticks {
                        scenario.step();
                    }
                    scenario.hash()
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|h| h.join().expect("scenario thread panicked"))
            .collect()
    });

    DeterminismResult { hashes, ticks }
}

/// Run two copies tick-by-tick, finding the first divergence.
///
/// # Returns
///
/// `None` if the runs agree throughout, `Some(tick)` where they first differ.
pub fn find_first_divergence<F>(setup: F, ticks: u64) -> Option<u64>
where
    F: Fn() -> Scenario,
{
    let mut a = setup();
    let mut b = setup();

    if a.hash() != b.hash() {
        return Some(0);
    }

    for tick in 1..=ticks {
        a.step();
        b.step();
        if a.hash() != b.hash() {
            return Some(tick);
        }
    }

    None
}

/// Verify that a save/load round-trip into a fresh subsystem preserves the
/// persisted state and that both copies keep agreeing afterwards.
///
/// Hit points and stats are not part of the save stream, so the restored
/// copy gets them re-applied the way an entity load path would.
pub fn verify_save_load_determinism<F>(setup: F, ticks_before: u64, ticks_after: u64) -> bool
where
    F: Fn() -> Scenario,
{
    let mut original = setup();
    for _ in 0..ticks_before {
        original.step();
    }

    let mut bytes = Vec::new();
    if original.combat.save(&mut bytes).is_err() {
        return false;
    }

    let mut restored = Scenario {
        combat: CombatSystem::default(),
        world: original.world.clone(),
    };
    if restored
        .combat
        .load(&restored.world, &mut bytes.as_slice())
        .is_err()
    {
        return false;
    }
    for id in original.world.dynamic_entities() {
        let Some(state) = original.combat.state(id) else {
            continue;
        };
        let stats = state.stats;
        let hp = state.current_hp;
        let applied = restored
            .combat
            .set_base_damage(id, stats.base_damage)
            .and_then(|()| restored.combat.set_base_armor(id, stats.base_armor))
            .and_then(|()| restored.combat.set_hp(&restored.world, id, hp));
        if applied.is_err() {
            return false;
        }
    }

    if original.combat.state_hash() != restored.combat.state_hash() {
        return false;
    }

    for _ in 0..ticks_after {
        original.step();
        restored.step();
    }
    original.combat.state_hash() == restored.combat.state_hash()
}

/// Compute a simple hash for any hashable value.
pub fn compute_hash<T: std::hash::Hash>(value: &T) -> u64 {
    use std::hash::Hasher;
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Proptest strategies for combat testing.
///
/// These strategies generate random but reproducible inputs for
/// property-based testing.
pub mod strategies {
    use proptest::prelude::*;
    use skirmish_core::math::{Fixed, Vec2Fixed};
    use skirmish_core::state::{CombatPhase, Stance};

    /// Any stance.
    pub fn arb_stance() -> impl Strategy<Value = Stance> {
        prop::sample::select(Stance::ALL.to_vec())
    }

    /// Any phase.
    pub fn arb_phase() -> impl Strategy<Value = CombatPhase> {
        prop::sample::select(CombatPhase::ALL.to_vec())
    }

    /// Armour fraction in `[0, 1]` at 1/100 resolution.
    pub fn arb_armor() -> impl Strategy<Value = Fixed> {
        (0i32..=100).prop_map(|pct| Fixed::from_num(pct) / Fixed::from_num(100))
    }

    /// Position on a small battlefield.
    ///
    /// Range: -60 to 60, so units land both inside and outside acquisition
    /// and melee range of one another.
    pub fn arb_position() -> impl Strategy<Value = Vec2Fixed> {
        (-60i32..60, -60i32..60).prop_map(|(x, y)| Vec2Fixed::from_ints(x, y))
    }

    /// A small army: `(faction, position, stance)` per unit.
    pub fn arb_army(max_units: usize) -> impl Strategy<Value = Vec<(u8, Vec2Fixed, Stance)>> {
        prop::collection::vec((1u8..=3, arb_position(), arb_stance()), 1..=max_units)
    }
}
