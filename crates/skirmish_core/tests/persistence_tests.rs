//! Save/load tests for skirmish_core.

use proptest::prelude::*;
use skirmish_core::error::CombatError;
use skirmish_core::events::AnimationHook;
use skirmish_core::persistence::{Attr, AttrValue, LoadSummary, SAVE_VERSION};
use skirmish_core::resolution::CycleOutcome;
use skirmish_core::state::{CombatPhase, EntityId, Stance, SuspendedMove};
use skirmish_core::system::CombatSystem;
use skirmish_test_utils::determinism::strategies::arb_army;
use skirmish_test_utils::determinism::Scenario;
use skirmish_test_utils::fixtures::{init_test_tracing, point, MockWorld};

/// One unit in each interesting phase:
/// 1 striking at 2, 2 idle, 3 pursuing 2 with a held order, 4 dying.
fn battle_in_progress() -> (MockWorld, CombatSystem) {
    init_test_tracing();
    let mut world = MockWorld::new();
    world.declare_war(1, 2);
    world.spawn(1, 1, point(0, 0));
    world.spawn(2, 2, point(5, 0));
    world.spawn(3, 1, point(-30, 0));
    world.spawn(4, 2, point(200, 200));
    world.order_move(3, point(5, 5));

    let mut combat = CombatSystem::default();
    combat.add_entity(&world, 1, Stance::Aggressive).unwrap();
    combat.add_entity(&world, 2, Stance::NoEngagement).unwrap();
    combat.add_entity(&world, 3, Stance::Aggressive).unwrap();
    combat.add_entity(&world, 4, Stance::HoldPosition).unwrap();
    combat.tick(&mut world).unwrap();
    combat.tick(&mut world).unwrap();
    combat.apply_fatal_hit(&mut world, 4).unwrap();

    assert_eq!(combat.phase(1).unwrap(), CombatPhase::Striking);
    assert_eq!(combat.phase(3).unwrap(), CombatPhase::Pursuing);
    (world, combat)
}

fn save(combat: &CombatSystem) -> Vec<u8> {
    let mut bytes = Vec::new();
    combat.save(&mut bytes).unwrap();
    bytes
}

fn encode(attrs: &[(&str, AttrValue)]) -> Vec<u8> {
    let mut bytes = Vec::new();
    for (key, value) in attrs {
        let attr = Attr {
            key: (*key).to_string(),
            value: *value,
        };
        bincode::serialize_into(&mut bytes, &attr).unwrap();
    }
    bytes
}

fn decode(bytes: &[u8]) -> Vec<Attr> {
    let mut input = bytes;
    let mut attrs = Vec::new();
    while !input.is_empty() {
        attrs.push(bincode::deserialize_from(&mut input).unwrap());
    }
    attrs
}

fn assert_same_records(a: &CombatSystem, b: &CombatSystem, ids: &[EntityId]) {
    for &id in ids {
        assert_eq!(a.stance(id).unwrap(), b.stance(id).unwrap(), "stance of {id}");
        assert_eq!(a.phase(id).unwrap(), b.phase(id).unwrap(), "phase of {id}");
        assert_eq!(a.target(id).unwrap(), b.target(id).unwrap(), "target of {id}");
        assert_eq!(
            a.saved_move(id).unwrap(),
            b.saved_move(id).unwrap(),
            "saved move of {id}"
        );
    }
    assert_eq!(a.pending_deaths(), b.pending_deaths());
}

// =============================================================================
// Round trips
// =============================================================================

#[test]
fn test_round_trip_into_fresh_subsystem() {
    let (world, combat) = battle_in_progress();
    let bytes = save(&combat);

    let mut restored = CombatSystem::default();
    let summary = restored.load(&world, &mut bytes.as_slice()).unwrap();

    assert_eq!(
        summary,
        LoadSummary {
            records: 4,
            created: 4,
            dying: 1,
            reset: 0,
        }
    );
    assert_same_records(&combat, &restored, &[1, 2, 3, 4]);
    assert_eq!(
        restored.saved_move(3).unwrap(),
        Some(SuspendedMove::new(point(5, 5)))
    );
    assert_eq!(restored.animation_hook(1), Some(AnimationHook::AttackCycle));
    assert_eq!(restored.animation_hook(3), None);
    assert_eq!(restored.animation_hook(4), Some(AnimationHook::DeathCycle));
    assert_eq!(restored.current_hp(2).unwrap(), 100);
}

#[test]
fn test_restored_swing_lands() {
    let (mut world, combat) = battle_in_progress();
    let bytes = save(&combat);
    let mut restored = CombatSystem::default();
    restored.load(&world, &mut bytes.as_slice()).unwrap();
    restored.set_base_damage(1, 10).unwrap();

    let outcome = restored.on_animation_cycle_finished(&mut world, 1);

    assert_eq!(
        outcome,
        CycleOutcome::Hit {
            target: 2,
            hp_lost: 10,
            remaining: 90
        }
    );
    assert_eq!(
        restored.on_animation_cycle_finished(&mut world, 4),
        CycleOutcome::Reaped
    );
}

#[test]
fn test_load_over_existing_records() {
    let (world, mut combat) = battle_in_progress();
    combat.set_base_damage(2, 33).unwrap();
    let bytes = save(&combat);

    let summary = combat.load(&world, &mut bytes.as_slice()).unwrap();

    assert_eq!(summary.created, 0);
    assert_eq!(combat.base_damage(2).unwrap(), 33);
    assert_eq!(combat.pending_deaths(), vec![4]);
}

#[test]
fn test_load_resets_records_missing_from_stream() {
    let (mut world, mut combat) = battle_in_progress();
    let bytes = save(&combat);
    world.spawn(5, 2, point(2, 0));
    combat.add_entity(&world, 5, Stance::Aggressive).unwrap();
    combat.apply_fatal_hit(&mut world, 5).unwrap();
    assert_eq!(combat.animation_hook(5), Some(AnimationHook::DeathCycle));

    let summary = combat.load(&world, &mut bytes.as_slice()).unwrap();

    assert_eq!(summary.reset, 1);
    assert_eq!(combat.phase(5).unwrap(), CombatPhase::Idle);
    assert_eq!(combat.current_hp(5).unwrap(), 100);
    assert_eq!(combat.animation_hook(5), None);
    assert!(!combat.is_pending_death(5));
    assert_eq!(combat.pending_deaths(), vec![4]);

    // The restored state saves and loads cleanly again.
    let again = save(&combat);
    let mut restored = CombatSystem::default();
    restored.load(&world, &mut again.as_slice()).unwrap();
    assert_same_records(&combat, &restored, &[1, 2, 3, 4, 5]);
}

#[test]
fn test_empty_round_trip() {
    let world = MockWorld::new();
    let bytes = save(&CombatSystem::default());

    let mut restored = CombatSystem::default();
    let summary = restored.load(&world, &mut bytes.as_slice()).unwrap();

    assert_eq!(summary, LoadSummary::default());
    assert!(restored.is_empty());
}

// =============================================================================
// Wire layout
// =============================================================================

#[test]
fn test_stream_layout() {
    let (_world, combat) = battle_in_progress();
    let attrs = decode(&save(&combat));

    let keys: Vec<&str> = attrs.iter().map(|attr| attr.key.as_str()).collect();
    let record = ["uid", "stance", "phase", "target_uid", "move_suspended"];
    let mut expected = vec!["version", "num_records"];
    expected.extend(record);
    expected.extend(record);
    expected.extend(record);
    expected.push("move_dest");
    expected.extend(record);
    expected.extend(["num_dying", "dying_uid"]);
    assert_eq!(keys, expected);

    assert_eq!(attrs[0].value, AttrValue::Int(SAVE_VERSION));
    assert_eq!(attrs[1].value, AttrValue::Int(4));
    let uids: Vec<AttrValue> = attrs
        .iter()
        .filter(|attr| attr.key == "uid")
        .map(|attr| attr.value)
        .collect();
    assert_eq!(
        uids,
        vec![
            AttrValue::Id(Some(1)),
            AttrValue::Id(Some(2)),
            AttrValue::Id(Some(3)),
            AttrValue::Id(Some(4)),
        ]
    );
    let dest = attrs.iter().find(|attr| attr.key == "move_dest").unwrap();
    assert_eq!(dest.value, AttrValue::Vec2(point(5, 5)));
    assert_eq!(attrs.last().unwrap().value, AttrValue::Id(Some(4)));
}

// =============================================================================
// Rejected streams
// =============================================================================

#[test]
fn test_missing_entity_aborts_without_changes() {
    let (world, mut combat) = battle_in_progress();
    let bytes = save(&combat);
    // Diverge from the stream so any partial apply would show.
    combat.stop_attack(&mut world.clone(), 1);
    let mut pruned = world.clone();
    pruned.despawn(3);

    let err = combat.load(&pruned, &mut bytes.as_slice()).unwrap_err();

    assert!(matches!(err, CombatError::MissingEntity(3)));
    assert!(!err.is_contract_violation());
    assert_eq!(combat.phase(1).unwrap(), CombatPhase::Idle);
    assert_eq!(combat.animation_hook(1), None);
    assert_eq!(combat.pending_deaths(), vec![4]);
}

#[test]
fn test_truncated_stream_aborts_without_changes() {
    let (world, combat) = battle_in_progress();
    let bytes = save(&combat);

    let mut restored = CombatSystem::default();
    let err = restored
        .load(&world, &mut &bytes[..bytes.len() - 3])
        .unwrap_err();

    assert!(matches!(err, CombatError::CorruptSave { .. }));
    assert!(restored.is_empty());
    assert!(restored.pending_deaths().is_empty());
}

#[test]
fn test_unknown_version_rejected() {
    let world = MockWorld::new();
    let bytes = encode(&[("version", AttrValue::Int(SAVE_VERSION + 1))]);

    let err = CombatSystem::default()
        .load(&world, &mut bytes.as_slice())
        .unwrap_err();

    assert!(matches!(
        err,
        CombatError::UnsupportedSaveVersion {
            expected: 1,
            found: 2
        }
    ));
}

#[test]
fn test_bad_phase_tag_rejected() {
    let (world, _) = battle_in_progress();
    let bytes = encode(&[
        ("version", AttrValue::Int(SAVE_VERSION)),
        ("num_records", AttrValue::Int(1)),
        ("uid", AttrValue::Id(Some(1))),
        ("stance", AttrValue::Int(Stance::Aggressive.tag())),
        ("phase", AttrValue::Int(9)),
    ]);

    let err = CombatSystem::default()
        .load(&world, &mut bytes.as_slice())
        .unwrap_err();

    assert!(err.to_string().contains("bad phase 9"));
}

#[test]
fn test_wrong_field_type_rejected() {
    let (world, _) = battle_in_progress();
    let bytes = encode(&[
        ("version", AttrValue::Int(SAVE_VERSION)),
        ("num_records", AttrValue::Bool(true)),
    ]);

    let err = CombatSystem::default()
        .load(&world, &mut bytes.as_slice())
        .unwrap_err();

    assert!(matches!(err, CombatError::CorruptSave { .. }));
}

#[test]
fn test_dying_record_must_be_pending() {
    let (world, _) = battle_in_progress();
    let bytes = encode(&[
        ("version", AttrValue::Int(SAVE_VERSION)),
        ("num_records", AttrValue::Int(1)),
        ("uid", AttrValue::Id(Some(4))),
        ("stance", AttrValue::Int(Stance::HoldPosition.tag())),
        ("phase", AttrValue::Int(CombatPhase::Dying.tag())),
        ("target_uid", AttrValue::Id(None)),
        ("move_suspended", AttrValue::Bool(false)),
        ("num_dying", AttrValue::Int(0)),
    ]);

    let err = CombatSystem::default()
        .load(&world, &mut bytes.as_slice())
        .unwrap_err();

    assert!(matches!(err, CombatError::CorruptSave { .. }));
}

#[test]
fn test_pending_death_needs_record() {
    let (world, _) = battle_in_progress();
    let bytes = encode(&[
        ("version", AttrValue::Int(SAVE_VERSION)),
        ("num_records", AttrValue::Int(0)),
        ("num_dying", AttrValue::Int(1)),
        ("dying_uid", AttrValue::Id(Some(2))),
    ]);

    let err = CombatSystem::default()
        .load(&world, &mut bytes.as_slice())
        .unwrap_err();

    assert!(err.to_string().contains("no combat record"));
}

#[test]
fn test_non_combat_entity_rejected() {
    let (mut world, combat) = battle_in_progress();
    let bytes = save(&combat);
    world.entity_mut(2).flags.combat_capable = false;

    let err = CombatSystem::default()
        .load(&world, &mut bytes.as_slice())
        .unwrap_err();

    assert!(matches!(err, CombatError::CorruptSave { .. }));
}

// =============================================================================
// Properties
// =============================================================================

proptest! {
    /// Save then load reproduces every persisted field for any reachable state.
    #[test]
    fn prop_save_load_reconstructs_records(
        army in arb_army(8),
        ticks in 0u32..12,
    ) {
        let mut world = MockWorld::new();
        world.declare_war(1, 2);
        world.declare_war(1, 3);
        let mut combat = CombatSystem::default();
        let mut ids = Vec::new();
        for (index, (faction, position, stance)) in army.iter().enumerate() {
            let id = index as EntityId + 1;
            world.spawn(id, *faction, *position);
            if index % 2 == 0 {
                world.order_move(id, point(0, 0));
            }
            combat.add_entity(&world, id, *stance).unwrap();
            combat.set_base_damage(id, 35).unwrap();
            ids.push(id);
        }
        let mut scenario = Scenario { combat, world };
        for _ in 0..ticks {
            scenario.step();
        }
        // Leave some swings in flight.
        scenario.combat.tick(&mut scenario.world).unwrap();

        let mut bytes = Vec::new();
        scenario.combat.save(&mut bytes).unwrap();
        let mut restored = CombatSystem::default();
        restored.load(&scenario.world, &mut bytes.as_slice()).unwrap();

        assert_same_records(&scenario.combat, &restored, &ids);
        for &id in &ids {
            prop_assert_eq!(
                scenario.combat.animation_hook(id).is_some()
                    && scenario.combat.phase(id).unwrap() == CombatPhase::Striking,
                restored.animation_hook(id) == Some(AnimationHook::AttackCycle)
            );
        }
    }
}
