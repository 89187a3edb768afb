//! Physics Tuning
//!
//! Gameplay tuning for character movement, immutable during a tick.
//! Keep this separate from runtime/server configuration (tick rates,
//! buffer sizes, etc.). Maps may override the whole set per tuning
//! zone; zone 0 is always the map default.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::fixed::{to_fixed, Fixed};

/// Physics constants consumed by the movement integrator.
///
/// All speed-like values are pixels per tick, accelerations are pixels
/// per tick squared, frictions are per-tick multiplicative factors.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TuningSet {
    /// Downward acceleration applied every tick.
    pub gravity: Fixed,

    /// Horizontal control speed while grounded.
    pub ground_control_speed: Fixed,
    /// Horizontal acceleration while grounded.
    pub ground_control_accel: Fixed,
    /// Per-tick horizontal velocity multiplier while grounded.
    pub ground_friction: Fixed,
    /// Upward impulse of a ground jump.
    pub ground_jump_impulse: Fixed,

    /// Horizontal control speed while airborne.
    pub air_control_speed: Fixed,
    /// Horizontal acceleration while airborne.
    pub air_control_accel: Fixed,
    /// Per-tick horizontal velocity multiplier while airborne.
    pub air_friction: Fixed,
    /// Upward impulse of an air jump.
    pub air_jump_impulse: Fixed,

    /// Maximum rope length before the hook retracts.
    pub hook_length: Fixed,
    /// Hook head travel per tick while flying.
    pub hook_fire_speed: Fixed,
    /// Acceleration toward the hook anchor while dragging.
    pub hook_drag_accel: Fixed,
    /// Drag acceleration never pushes a velocity component past this.
    pub hook_drag_speed: Fixed,
    /// Ticks a player-hook holds before auto-release.
    pub hook_duration_ticks: u32,

    /// Scale on the hammer's push force.
    pub hammer_strength: Fixed,
    /// Reverse thrust per tick while the jetpack fires.
    pub jetpack_strength: Fixed,

    /// Characters push each other apart on contact.
    pub player_collision: bool,
    /// Hooks may attach to other characters.
    pub player_hooking: bool,
}

impl Default for TuningSet {
    fn default() -> Self {
        Self {
            gravity: to_fixed(0.5),

            ground_control_speed: to_fixed(10.0),
            ground_control_accel: to_fixed(2.0),
            ground_friction: to_fixed(0.5),
            ground_jump_impulse: to_fixed(13.2),

            air_control_speed: to_fixed(5.0),
            air_control_accel: to_fixed(1.5),
            air_friction: to_fixed(0.95),
            air_jump_impulse: to_fixed(12.0),

            hook_length: to_fixed(380.0),
            hook_fire_speed: to_fixed(80.0),
            hook_drag_accel: to_fixed(3.0),
            hook_drag_speed: to_fixed(15.0),
            hook_duration_ticks: 60,

            hammer_strength: to_fixed(1.0),
            jetpack_strength: to_fixed(1.0),

            player_collision: true,
            player_hooking: true,
        }
    }
}

/// Tuning sets per map zone.
///
/// Zone 0 is the map default. Characters carry their current zone id;
/// the integrator resolves it here each tick, so crossing a tune tile
/// changes physics on the very next tick.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TuningZones {
    default: TuningSet,
    overrides: BTreeMap<u8, TuningSet>,
}

impl TuningZones {
    /// Zones with a plain default everywhere.
    pub fn new(default: TuningSet) -> Self {
        Self {
            default,
            overrides: BTreeMap::new(),
        }
    }

    /// Install an override for a zone id. Zone 0 replaces the default.
    pub fn set_zone(&mut self, zone: u8, tuning: TuningSet) {
        if zone == 0 {
            self.default = tuning;
        } else {
            self.overrides.insert(zone, tuning);
        }
    }

    /// Tuning for a zone id; unknown zones fall back to the default.
    pub fn resolve(&self, zone: u8) -> &TuningSet {
        if zone == 0 {
            return &self.default;
        }
        self.overrides.get(&zone).unwrap_or(&self.default)
    }
}
