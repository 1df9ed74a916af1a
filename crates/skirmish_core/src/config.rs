//! Tunable combat constants.
//!
//! Defaults match the shipped game. A RON document can override any subset:
//!
//! ```
//! use skirmish_core::config::CombatConfig;
//!
//! let config = CombatConfig::from_ron_str("(melee_range: 8.0)").unwrap();
//! assert_eq!(config.max_candidates, 128);
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{CombatError, Result};
use crate::math::Fixed;

/// Radius around an entity searched for enemies.
pub const ACQUISITION_RADIUS: i32 = 50;

/// Surface-to-surface distance at which a melee blow can land.
pub const MELEE_RANGE: i32 = 5;

/// Upper bound on spatial query results examined per acquisition.
pub const MAX_CANDIDATES: usize = 128;

/// Rate the surrounding engine drives [`crate::system::CombatSystem::tick`] at.
pub const TICK_RATE_HZ: u32 = 30;

/// Combat tuning loaded from data files.
///
/// Distances are written as decimals in RON and converted to fixed-point
/// once, when the config is read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CombatConfig {
    /// Enemy acquisition radius (world units).
    pub acquisition_radius: f64,
    /// Melee range, surface to surface (world units).
    pub melee_range: f64,
    /// Spatial query result cap.
    pub max_candidates: usize,
    /// Informational tick rate.
    pub tick_rate_hz: u32,
}

impl Default for CombatConfig {
    fn default() -> Self {
        Self {
            acquisition_radius: f64::from(ACQUISITION_RADIUS),
            melee_range: f64::from(MELEE_RANGE),
            max_candidates: MAX_CANDIDATES,
            tick_rate_hz: TICK_RATE_HZ,
        }
    }
}

impl CombatConfig {
    /// Parse and validate a RON config document.
    ///
    /// # Errors
    ///
    /// Returns [`CombatError::InvalidConfig`] on parse or validation failure.
    pub fn from_ron_str(source: &str) -> Result<Self> {
        let config: Self = ron::from_str(source)
            .map_err(|e| CombatError::InvalidConfig(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Check internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`CombatError::InvalidConfig`] describing the first problem.
    pub fn validate(&self) -> Result<()> {
        if !(self.acquisition_radius.is_finite() && self.acquisition_radius > 0.0) {
            return Err(CombatError::InvalidConfig(format!(
                "acquisition_radius must be positive, got {}",
                self.acquisition_radius
            )));
        }
        if !(self.melee_range.is_finite() && self.melee_range >= 0.0) {
            return Err(CombatError::InvalidConfig(format!(
                "melee_range must be non-negative, got {}",
                self.melee_range
            )));
        }
        if self.melee_range > self.acquisition_radius {
            return Err(CombatError::InvalidConfig(format!(
                "melee_range {} exceeds acquisition_radius {}",
                self.melee_range, self.acquisition_radius
            )));
        }
        if self.acquisition_radius > f64::from(i32::MAX / 2) {
            return Err(CombatError::InvalidConfig(
                "acquisition_radius is too large for fixed-point distances".to_string(),
            ));
        }
        if self.max_candidates == 0 {
            return Err(CombatError::InvalidConfig(
                "max_candidates must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Acquisition radius in simulation units.
    #[must_use]
    pub fn acquisition_radius_fixed(&self) -> Fixed {
        Fixed::from_num(self.acquisition_radius)
    }

    /// Melee range in simulation units.
    #[must_use]
    pub fn melee_range_fixed(&self) -> Fixed {
        Fixed::from_num(self.melee_range)
    }
}
