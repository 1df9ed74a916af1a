//! Error types for the combat subsystem.
//!
//! Two families live here. Contract violations mean the caller broke an API
//! precondition (double registration, unknown entity, bad armour value).
//! Persistence errors mean a save stream could not be trusted. Gameplay
//! inconsistencies such as a target dying between ticks are never errors.

use thiserror::Error;

use crate::state::EntityId;

/// Result type alias using [`CombatError`].
pub type Result<T> = std::result::Result<T, CombatError>;

/// Top-level error type for the combat subsystem.
#[derive(Debug, Error)]
pub enum CombatError {
    /// The entity is not flagged combat-capable in the registry.
    #[error("Entity {0} is not combat-capable")]
    NotCombatCapable(EntityId),

    /// The entity already has a combat record.
    #[error("Entity {0} already has a combat record")]
    AlreadyRegistered(EntityId),

    /// The entity has no combat record.
    #[error("Entity {0} has no combat record")]
    NotRegistered(EntityId),

    /// The entity does not exist in the registry.
    #[error("Entity not found in registry: {0}")]
    UnknownEntity(EntityId),

    /// Armour fraction outside `[0, 1]`.
    #[error("Armor fraction {0} is outside [0, 1]")]
    ArmorOutOfRange(f64),

    /// Combat configuration failed validation.
    #[error("Invalid combat configuration: {0}")]
    InvalidConfig(String),

    /// The save stream is malformed.
    #[error("Corrupt combat save: {reason}")]
    CorruptSave {
        /// What was wrong with the stream.
        reason: String,
    },

    /// A save references an entity the registry does not know about.
    #[error("Combat save references missing entity {0}")]
    MissingEntity(EntityId),

    /// The save was written by an incompatible format version.
    #[error("Unsupported combat save version: expected {expected}, got {found}")]
    UnsupportedSaveVersion {
        /// Version this build understands.
        expected: i64,
        /// Version found in the stream.
        found: i64,
    },

    /// Underlying stream failure.
    #[error("Combat save I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CombatError {
    /// Build a [`CombatError::CorruptSave`] from anything displayable.
    pub(crate) fn corrupt(reason: impl Into<String>) -> Self {
        Self::CorruptSave {
            reason: reason.into(),
        }
    }

    /// Whether this error is a caller contract breach rather than bad data.
    #[must_use]
    pub const fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            Self::NotCombatCapable(_)
                | Self::AlreadyRegistered(_)
                | Self::NotRegistered(_)
                | Self::UnknownEntity(_)
                | Self::ArmorOutOfRange(_)
                | Self::InvalidConfig(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contract_violations_are_classified() {
        assert!(CombatError::AlreadyRegistered(3).is_contract_violation());
        assert!(CombatError::ArmorOutOfRange(1.5).is_contract_violation());
        assert!(!CombatError::MissingEntity(3).is_contract_violation());
        assert!(!CombatError::corrupt("bad tag").is_contract_violation());
    }

    #[test]
    fn test_error_messages() {
        let err = CombatError::UnsupportedSaveVersion {
            expected: 1,
            found: 7,
        };
        assert_eq!(
            err.to_string(),
            "Unsupported combat save version: expected 1, got 7"
        );
    }
}
