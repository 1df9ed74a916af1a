//! Save and restore of combat state.
//!
//! The stream is a sequence of self-describing attributes, each a
//! bincode-encoded [`Attr`]:
//!
//! ```text
//! version      Int
//! num_records  Int
//!   uid            Id
//!   stance         Int    (Stance tag)
//!   phase          Int    (CombatPhase tag)
//!   target_uid     Id     (optional)
//!   move_suspended Bool
//!   move_dest      Vec2   (only when move_suspended)
//! num_dying    Int
//!   dying_uid      Id
//! ```
//!
//! Hit points and stats are not written; the entity's own save restores
//! them. Loading reads and checks the entire stream before touching any
//! state, so a corrupt save leaves the subsystem as it was.

use std::collections::BTreeSet;
use std::io::{Read, Write};

use bincode::Options;
use serde::{Deserialize, Serialize};

use crate::error::{CombatError, Result};
use crate::events::AnimationHook;
use crate::math::Vec2Fixed;
use crate::state::{CombatPhase, CombatState, EntityId, Stance, SuspendedMove};
use crate::system::CombatSystem;
use crate::world::EntityRegistry;

/// Save format version.
pub const SAVE_VERSION: i64 = 1;

/// Upper bound on one encoded attribute; keys are short.
const MAX_ATTR_BYTES: u64 = 1024;

fn codec() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_limit(MAX_ATTR_BYTES)
}

/// Typed attribute payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttrValue {
    /// Signed integer (counts, tags).
    Int(i64),
    /// Flag.
    Bool(bool),
    /// Entity reference, possibly empty.
    Id(Option<EntityId>),
    /// Ground-plane point.
    Vec2(Vec2Fixed),
}

impl AttrValue {
    const fn type_name(&self) -> &'static str {
        match self {
            Self::Int(_) => "int",
            Self::Bool(_) => "bool",
            Self::Id(_) => "id",
            Self::Vec2(_) => "vec2",
        }
    }
}

/// One named attribute in a save stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attr {
    /// Field name; checked on load.
    pub key: String,
    /// Field value.
    pub value: AttrValue,
}

struct AttrWriter<'w, W: Write> {
    out: &'w mut W,
}

impl<'w, W: Write> AttrWriter<'w, W> {
    fn write(&mut self, key: &str, value: AttrValue) -> Result<()> {
        let attr = Attr {
            key: key.to_string(),
            value,
        };
        codec().serialize_into(&mut *self.out, &attr).map_err(|e| match *e {
            bincode::ErrorKind::Io(io) => CombatError::Io(io),
            other => CombatError::corrupt(format!("Failed to encode '{key}': {other}")),
        })
    }

    fn write_count(&mut self, key: &str, count: usize) -> Result<()> {
        let count = i64::try_from(count)
            .map_err(|_| CombatError::corrupt(format!("'{key}' count {count} overflows")))?;
        self.write(key, AttrValue::Int(count))
    }
}

struct AttrReader<'r, R: Read> {
    input: &'r mut R,
}

impl<'r, R: Read> AttrReader<'r, R> {
    fn next(&mut self, key: &str) -> Result<AttrValue> {
        let attr: Attr = codec()
            .deserialize_from(&mut *self.input)
            .map_err(|e| CombatError::corrupt(format!("Failed to decode '{key}': {e}")))?;
        if attr.key != key {
            return Err(CombatError::corrupt(format!(
                "Expected attribute '{key}', found '{}'",
                attr.key
            )));
        }
        Ok(attr.value)
    }

    fn mismatch(key: &str, expected: &str, found: &AttrValue) -> CombatError {
        CombatError::corrupt(format!(
            "Attribute '{key}' should be {expected}, found {}",
            found.type_name()
        ))
    }

    fn int(&mut self, key: &str) -> Result<i64> {
        match self.next(key)? {
            AttrValue::Int(v) => Ok(v),
            other => Err(Self::mismatch(key, "int", &other)),
        }
    }

    fn count(&mut self, key: &str) -> Result<usize> {
        let raw = self.int(key)?;
        usize::try_from(raw)
            .map_err(|_| CombatError::corrupt(format!("Attribute '{key}' has bad count {raw}")))
    }

    fn boolean(&mut self, key: &str) -> Result<bool> {
        match self.next(key)? {
            AttrValue::Bool(v) => Ok(v),
            other => Err(Self::mismatch(key, "bool", &other)),
        }
    }

    fn id(&mut self, key: &str) -> Result<Option<EntityId>> {
        match self.next(key)? {
            AttrValue::Id(v) => Ok(v),
            other => Err(Self::mismatch(key, "id", &other)),
        }
    }

    fn required_id(&mut self, key: &str) -> Result<EntityId> {
        self.id(key)?
            .ok_or_else(|| CombatError::corrupt(format!("Attribute '{key}' is empty")))
    }

    fn vec2(&mut self, key: &str) -> Result<Vec2Fixed> {
        match self.next(key)? {
            AttrValue::Vec2(v) => Ok(v),
            other => Err(Self::mismatch(key, "vec2", &other)),
        }
    }
}

/// A record as read from a stream, not yet applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SavedRecord {
    uid: EntityId,
    stance: Stance,
    phase: CombatPhase,
    target: Option<EntityId>,
    saved_move: Option<SuspendedMove>,
}

/// What a successful load restored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoadSummary {
    /// Combat records restored.
    pub records: usize,
    /// Records created because the store had none for that entity.
    pub created: usize,
    /// Pending deaths restored.
    pub dying: usize,
    /// Records the stream did not mention, returned to idle at full health.
    pub reset: usize,
}

impl CombatSystem {
    /// Write all combat records and pending deaths to `out`.
    ///
    /// Records are written in ascending entity ID order.
    ///
    /// # Errors
    ///
    /// Returns [`CombatError::Io`] if the stream rejects a write.
    pub fn save<W: Write>(&self, out: &mut W) -> Result<()> {
        let mut writer = AttrWriter { out };
        writer.write("version", AttrValue::Int(SAVE_VERSION))?;

        let ids = self.store.sorted_ids();
        writer.write_count("num_records", ids.len())?;
        for id in &ids {
            let state = self.store.require(*id)?;
            writer.write("uid", AttrValue::Id(Some(*id)))?;
            writer.write("stance", AttrValue::Int(state.stance.tag()))?;
            writer.write("phase", AttrValue::Int(state.phase.tag()))?;
            writer.write("target_uid", AttrValue::Id(state.target))?;
            writer.write("move_suspended", AttrValue::Bool(state.saved_move.is_some()))?;
            if let Some(saved) = state.saved_move {
                writer.write("move_dest", AttrValue::Vec2(saved.destination()))?;
            }
        }

        writer.write_count("num_dying", self.pending_deaths.len())?;
        for id in self.pending_deaths.iter() {
            writer.write("dying_uid", AttrValue::Id(Some(id)))?;
        }

        tracing::debug!(
            records = ids.len(),
            dying = self.pending_deaths.len(),
            "Combat state saved"
        );
        Ok(())
    }

    /// Restore combat records and pending deaths from `input`.
    ///
    /// Every referenced entity must already be back in the registry. Records
    /// the store lacks are created at full health; the entity load path sets
    /// the real hit points with [`CombatSystem::set_hp`]. Records the stream
    /// does not mention are returned to idle at full health. Striking
    /// entities get their attack hook back and dying entities their death
    /// hook.
    ///
    /// # Errors
    ///
    /// - [`CombatError::UnsupportedSaveVersion`] for a foreign format.
    /// - [`CombatError::MissingEntity`] if an ID is not in the registry.
    /// - [`CombatError::CorruptSave`] for any malformed or inconsistent data.
    pub fn load<R, W>(&mut self, world: &W, input: &mut R) -> Result<LoadSummary>
    where
        R: Read,
        W: EntityRegistry + ?Sized,
    {
        let (records, dying) = read_stream(world, input)?;

        let mut summary = LoadSummary {
            records: records.len(),
            dying: dying.len(),
            ..LoadSummary::default()
        };

        self.pending_deaths.clear();
        let listed: BTreeSet<EntityId> = records.iter().map(|record| record.uid).collect();
        for id in self.store.sorted_ids() {
            if listed.contains(&id) {
                continue;
            }
            let max_hp = world.max_hp(id).unwrap_or(0);
            let state = self.store.require_mut(id)?;
            state.phase = CombatPhase::Idle;
            state.target = None;
            state.saved_move = None;
            state.current_hp = max_hp;
            self.animations.unsubscribe(id);
            summary.reset += 1;
        }
        for record in &records {
            if !self.store.contains(record.uid) {
                let max_hp = world.max_hp(record.uid).unwrap_or(0);
                self.store
                    .insert(record.uid, CombatState::new(max_hp, record.stance))?;
                summary.created += 1;
            }
            let state = self.store.require_mut(record.uid)?;
            state.stance = record.stance;
            state.phase = record.phase;
            state.target = record.target;
            state.saved_move = record.saved_move;

            self.animations.unsubscribe(record.uid);
            if record.phase == CombatPhase::Striking {
                self.animations
                    .subscribe(record.uid, AnimationHook::AttackCycle);
            }
        }
        for id in dying {
            self.pending_deaths.insert(id);
            self.animations.subscribe(id, AnimationHook::DeathCycle);
        }

        tracing::debug!(
            records = summary.records,
            created = summary.created,
            dying = summary.dying,
            reset = summary.reset,
            "Combat state loaded"
        );
        Ok(summary)
    }
}

/// Parse and validate a whole stream without side effects.
fn read_stream<R, W>(world: &W, input: &mut R) -> Result<(Vec<SavedRecord>, Vec<EntityId>)>
where
    R: Read,
    W: EntityRegistry + ?Sized,
{
    let mut reader = AttrReader { input };

    let version = reader.int("version")?;
    if version != SAVE_VERSION {
        return Err(CombatError::UnsupportedSaveVersion {
            expected: SAVE_VERSION,
            found: version,
        });
    }

    let num_records = reader.count("num_records")?;
    let mut records = Vec::new();
    let mut seen = BTreeSet::new();
    for _ in 0..num_records {
        let uid = reader.required_id("uid")?;
        let stance_tag = reader.int("stance")?;
        let stance = Stance::from_tag(stance_tag)
            .ok_or_else(|| CombatError::corrupt(format!("Entity {uid}: bad stance {stance_tag}")))?;
        let phase_tag = reader.int("phase")?;
        let phase = CombatPhase::from_tag(phase_tag)
            .ok_or_else(|| CombatError::corrupt(format!("Entity {uid}: bad phase {phase_tag}")))?;
        let target = reader.id("target_uid")?;
        let saved_move = if reader.boolean("move_suspended")? {
            Some(SuspendedMove::new(reader.vec2("move_dest")?))
        } else {
            None
        };

        let flags = world.flags(uid).ok_or(CombatError::MissingEntity(uid))?;
        if !flags.combat_capable {
            return Err(CombatError::corrupt(format!(
                "Entity {uid} is not combat-capable"
            )));
        }
        if !seen.insert(uid) {
            return Err(CombatError::corrupt(format!("Entity {uid} saved twice")));
        }

        records.push(SavedRecord {
            uid,
            stance,
            phase,
            target,
            saved_move,
        });
    }

    let num_dying = reader.count("num_dying")?;
    let mut dying = BTreeSet::new();
    for _ in 0..num_dying {
        let uid = reader.required_id("dying_uid")?;
        if !world.contains(uid) {
            return Err(CombatError::MissingEntity(uid));
        }
        if !dying.insert(uid) {
            return Err(CombatError::corrupt(format!("Dying entity {uid} listed twice")));
        }
    }

    for record in &records {
        let is_dying = record.phase == CombatPhase::Dying;
        if is_dying != dying.contains(&record.uid) {
            return Err(CombatError::corrupt(format!(
                "Entity {} phase {:?} disagrees with the pending-death list",
                record.uid, record.phase
            )));
        }
    }
    if let Some(orphan) = dying.iter().find(|id| !seen.contains(*id)) {
        return Err(CombatError::corrupt(format!(
            "Dying entity {orphan} has no combat record"
        )));
    }

    Ok((records, dying.into_iter().collect()))
}
