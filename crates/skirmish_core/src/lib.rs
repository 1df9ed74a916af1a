//! # Skirmish Core
//!
//! Per-entity melee combat for a real-time strategy simulation.
//!
//! Every tick the subsystem decides whether each combat-capable unit is idle,
//! chasing an enemy or fighting. Blows land and units die when the engine
//! reports that the matching animation cycle finished. The whole state can be
//! saved to and restored from a byte stream.
//!
//! This crate contains **only** deterministic logic:
//! - No rendering
//! - No path planning or spatial indexing (consumed through [`world`] traits)
//! - No system randomness
//! - No floating-point math (uses fixed-point)
//!
//! ## Crate Structure
//!
//! - [`system`] - The owned subsystem instance and its public API
//! - [`fsm`] - Per-tick state machine
//! - [`resolution`] - Damage and death on animation completion
//! - [`acquisition`] - Nearest-enemy search
//! - [`persistence`] - Save/load stream
//! - [`store`] - Combat record storage and the pending-death set
//! - [`events`] - Outbound notifications and animation subscriptions
//! - [`world`] - Collaborator interfaces
//! - [`state`] - Per-entity combat data
//! - [`config`] - Tunable constants
//! - [`math`] - Fixed-point math utilities

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod acquisition;
pub mod config;
pub mod error;
pub mod events;
pub mod fsm;
pub mod math;
pub mod persistence;
pub mod resolution;
pub mod state;
pub mod store;
pub mod system;
pub mod world;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::CombatConfig;
    pub use crate::error::{CombatError, Result};
    pub use crate::events::{AnimationHook, CombatEvent, CombatEventKind, EventPriority};
    pub use crate::fsm::{PhaseTransition, TickReport};
    pub use crate::math::{Fixed, Vec2Fixed};
    pub use crate::persistence::LoadSummary;
    pub use crate::resolution::CycleOutcome;
    pub use crate::state::{
        CombatPhase, CombatState, CombatStats, EntityId, FactionId, Stance, SuspendedMove,
    };
    pub use crate::system::CombatSystem;
    pub use crate::world::{
        CombatWorld, Diplomacy, EntityFlags, EntityRegistry, EventSink, MovementControl,
        Selection, SpatialQuery,
    };
}
