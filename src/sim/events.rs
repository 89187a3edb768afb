//! Simulation Events
//!
//! Events the core emits for external collaborators: projectile/laser
//! spawning, game-controller notifications, force application that must
//! wait for the end of the integrator phase.

use serde::{Deserialize, Serialize};

use crate::core::fixed::Fixed;
use crate::core::vec2::FixedVec2;
use crate::sim::state::{CharacterId, Team, WeaponKind};

/// Character abilities flipped by toggle tiles.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ToggleKind {
    /// Hook never auto-releases.
    EndlessHook,
    /// Unlimited air jumps.
    EndlessJump,
    /// Hitting other characters.
    HitOthers,
    /// Body collision with other characters.
    Collision,
    /// Hooking other characters.
    HookOthers,
    /// Gun thruster.
    Jetpack,
    /// Gun projectiles teleport their owner.
    Telegun,
}

/// Why a character died.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeathCause {
    /// Touched a death tile.
    DeathTile,
    /// Left the playable area.
    OutOfMap,
    /// A time penalty drove the race clock negative.
    NegativeRaceTime,
    /// Killed by an external collaborator (weapons, game mode).
    External,
}

/// Event payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CoreEventData {
    /// A weapon discharged; projectile/laser/pickup spawning is the
    /// collaborator's job.
    WeaponFired {
        weapon: WeaponKind,
        pos: FixedVec2,
        direction: FixedVec2,
    },

    /// Hammer connected with a target in reach.
    HammerHit { target: CharacterId },

    /// Deferred force on another character, applied by the world after
    /// every character has integrated. `limit` caps the saturated add
    /// per axis.
    ForceOnOther {
        target: CharacterId,
        accel: FixedVec2,
        limit: Fixed,
    },

    /// The character must die this tick.
    Died { victim: CharacterId, cause: DeathCause },

    /// A switch changed state.
    SwitchToggled {
        number: u8,
        team: Team,
        active: bool,
    },

    /// The character was teleported.
    Teleported { from: FixedVec2, to: FixedVec2 },

    /// The race clock was adjusted; positive = penalty.
    TimeAdjusted { ticks: i32 },

    /// A toggle tile actually changed an ability. Re-walking an
    /// already-active toggle emits nothing.
    StatusToggled { toggle: ToggleKind, active: bool },
}

/// A simulation event with its tick of origin.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoreEvent {
    /// Tick when the event occurred.
    pub tick: u32,
    /// Character whose phase produced the event.
    pub source: CharacterId,
    /// Event payload.
    pub data: CoreEventData,
}

impl CoreEvent {
    /// Create a new event.
    pub fn new(tick: u32, source: CharacterId, data: CoreEventData) -> Self {
        Self { tick, source, data }
    }

    /// Shorthand for a weapon discharge.
    pub fn weapon_fired(
        tick: u32,
        source: CharacterId,
        weapon: WeaponKind,
        pos: FixedVec2,
        direction: FixedVec2,
    ) -> Self {
        Self::new(
            tick,
            source,
            CoreEventData::WeaponFired { weapon, pos, direction },
        )
    }

    /// Shorthand for a deferred force.
    pub fn force_on_other(
        tick: u32,
        source: CharacterId,
        target: CharacterId,
        accel: FixedVec2,
        limit: Fixed,
    ) -> Self {
        Self::new(
            tick,
            source,
            CoreEventData::ForceOnOther { target, accel, limit },
        )
    }

    /// Shorthand for a death.
    pub fn died(tick: u32, victim: CharacterId, cause: DeathCause) -> Self {
        Self::new(tick, victim, CoreEventData::Died { victim, cause })
    }
}
