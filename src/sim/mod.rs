//! Simulation core.
//!
//! The deterministic per-tick machinery: tuning, input, character
//! state, the movement integrator, the tile interaction engine, the
//! switch table, the dead-reckoning tracker, the snapshot builder and
//! the world loop that sequences them.

pub mod events;
pub mod input;
pub mod interact;
pub mod movement;
pub mod reckoning;
pub mod snapshot;
pub mod state;
pub mod switches;
pub mod tuning;
pub mod world;

/// Illegal derived state the simulation refuses to carry.
///
/// Per-character anomalies never abort the tick for other characters;
/// these surface as the explanatory message attached to the forced
/// terminal transition of the affected character.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SimError {
    /// A time penalty drove a character's race clock negative.
    #[error("character {character}: race clock went negative ({ticks} ticks), forcing death")]
    NegativeRaceTime {
        /// Arena id of the affected character.
        character: u32,
        /// The negative elapsed tick count that triggered the transition.
        ticks: i64,
    },
}

pub use events::{CoreEvent, CoreEventData, DeathCause};
pub use input::CharacterInput;
pub use reckoning::{ReckoningTracker, SendCore};
pub use snapshot::{CharacterSnap, SnapBudget};
pub use state::{CharacterId, CharacterState, Team};
pub use switches::SwitchTable;
pub use tuning::{TuningSet, TuningZones};
pub use world::World;
