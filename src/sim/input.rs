//! Character Input
//!
//! The per-tick input a character acts on, plus the short raw-input
//! history ring kept for the anti-cheat export.

use serde::{Deserialize, Serialize};

use crate::core::fixed::{fixed_atan2, from_int, Fixed};
use crate::core::vec2::FixedVec2;

/// Raw input state for a single tick.
///
/// The aim target is an integer pixel offset relative to the character,
/// exactly as the client sent it; the simulation derives fixed-point
/// directions from it so every host computes the same aim.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterInput {
    /// Requested horizontal movement: -1 (left), 0, +1 (right).
    /// Out-of-range values are clamped by the integrator.
    pub direction: i8,

    /// Aim target X in pixels, relative to the character.
    pub target_x: i32,

    /// Aim target Y in pixels, relative to the character.
    pub target_y: i32,

    /// Action flags (packed bits):
    /// - Bit 0: Jump held
    /// - Bit 1: Fire held
    /// - Bit 2: Hook held
    pub flags: u8,

    /// Requested weapon slot + 1; 0 = keep the current weapon.
    pub wanted_weapon: u8,
}

impl CharacterInput {
    /// Jump flag bit
    pub const FLAG_JUMP: u8 = 0x01;

    /// Fire flag bit
    pub const FLAG_FIRE: u8 = 0x02;

    /// Hook flag bit
    pub const FLAG_HOOK: u8 = 0x04;

    /// Create an empty input (no movement, aiming right).
    ///
    /// This is also what the dead-reckoning shadow simulation feeds in:
    /// pure extrapolation means "the player stopped doing anything".
    pub const fn empty() -> Self {
        Self {
            direction: 0,
            target_x: 1,
            target_y: 0,
            flags: 0,
            wanted_weapon: 0,
        }
    }

    /// Movement direction clamped to {-1, 0, +1}.
    #[inline]
    pub fn clamped_direction(&self) -> i32 {
        (self.direction as i32).clamp(-1, 1)
    }

    /// Normalized aim direction.
    ///
    /// A zero target aims right, so the aim is always a unit vector.
    #[inline]
    pub fn aim_direction(&self) -> FixedVec2 {
        if self.target_x == 0 && self.target_y == 0 {
            return FixedVec2::RIGHT;
        }
        FixedVec2::new(from_int(self.target_x), from_int(self.target_y)).normalize()
    }

    /// Aim angle in fixed-point radians.
    #[inline]
    pub fn aim_angle(&self) -> Fixed {
        fixed_atan2(from_int(self.target_y), from_int(self.target_x))
    }

    /// Check if jump is held.
    #[inline]
    pub fn jump(&self) -> bool {
        self.flags & Self::FLAG_JUMP != 0
    }

    /// Check if fire is held.
    #[inline]
    pub fn fire(&self) -> bool {
        self.flags & Self::FLAG_FIRE != 0
    }

    /// Check if hook is held.
    #[inline]
    pub fn hook(&self) -> bool {
        self.flags & Self::FLAG_HOOK != 0
    }

    /// Set the jump flag.
    #[inline]
    pub fn set_jump(&mut self, held: bool) {
        if held {
            self.flags |= Self::FLAG_JUMP;
        } else {
            self.flags &= !Self::FLAG_JUMP;
        }
    }

    /// Set the fire flag.
    #[inline]
    pub fn set_fire(&mut self, held: bool) {
        if held {
            self.flags |= Self::FLAG_FIRE;
        } else {
            self.flags &= !Self::FLAG_FIRE;
        }
    }

    /// Set the hook flag.
    #[inline]
    pub fn set_hook(&mut self, held: bool) {
        if held {
            self.flags |= Self::FLAG_HOOK;
        } else {
            self.flags &= !Self::FLAG_HOOK;
        }
    }
}

/// Ring buffer of the most recent raw inputs.
///
/// The anti-cheat export ships this verbatim so the backend can replay
/// the last moments leading up to a flagged state.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InputHistory {
    entries: Vec<(u32, CharacterInput)>,
    capacity: usize,
    next: usize,
}

impl InputHistory {
    /// Default number of retained inputs (~0.6s at 50 Hz).
    pub const DEFAULT_CAPACITY: usize = 32;

    /// Create an empty history with the default capacity.
    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }

    /// Create an empty history with an explicit capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity.max(1)),
            capacity: capacity.max(1),
            next: 0,
        }
    }

    /// Record an input for a tick, evicting the oldest when full.
    pub fn push(&mut self, tick: u32, input: CharacterInput) {
        if self.entries.len() < self.capacity {
            self.entries.push((tick, input));
        } else {
            self.entries[self.next] = (tick, input);
        }
        self.next = (self.next + 1) % self.capacity;
    }

    /// Retained inputs in chronological order.
    pub fn chronological(&self) -> Vec<(u32, CharacterInput)> {
        let mut out = Vec::with_capacity(self.entries.len());
        if self.entries.len() < self.capacity {
            out.extend_from_slice(&self.entries);
        } else {
            out.extend_from_slice(&self.entries[self.next..]);
            out.extend_from_slice(&self.entries[..self.next]);
        }
        out
    }

    /// Number of retained inputs.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing has been recorded yet.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for InputHistory {
    fn default() -> Self {
        Self::new()
    }
}
