//! Map Tile Vocabulary
//!
//! Raw tile ids and per-layer cell payloads. The grid stores these
//! verbatim; classification into gameplay effects happens in the
//! interaction engine, which consumes them cell by cell.

use serde::{Deserialize, Serialize};

// =============================================================================
// GAME / FRONT LAYER TILE IDS
// =============================================================================

/// Empty cell.
pub const TILE_AIR: u8 = 0;
/// Solid, hookable.
pub const TILE_SOLID: u8 = 1;
/// Solid, hook slides off.
pub const TILE_NOHOOK: u8 = 2;
/// Kills on touch.
pub const TILE_DEATH: u8 = 3;

/// Freeze on touch (default duration).
pub const TILE_FREEZE: u8 = 4;
/// Clears an active freeze.
pub const TILE_UNFREEZE: u8 = 5;
/// Freeze that only a deep-unfreeze clears.
pub const TILE_DEEP_FREEZE: u8 = 6;
/// Clears deep freeze.
pub const TILE_DEEP_UNFREEZE: u8 = 7;
/// Blocks self-induced movement, external forces still apply.
pub const TILE_LIVE_FREEZE: u8 = 8;
/// Clears live freeze.
pub const TILE_LIVE_UNFREEZE: u8 = 9;

/// Hook never auto-releases while active.
pub const TILE_ENDLESS_HOOK_ON: u8 = 10;
/// Restore normal hook duration.
pub const TILE_ENDLESS_HOOK_OFF: u8 = 11;
/// Allow hitting other characters (hammer etc.).
pub const TILE_HIT_ON: u8 = 12;
/// Forbid hitting other characters.
pub const TILE_HIT_OFF: u8 = 13;
/// Enable body collision with other characters.
pub const TILE_COLLISION_ON: u8 = 14;
/// Disable body collision with other characters.
pub const TILE_COLLISION_OFF: u8 = 15;
/// Allow hooking other characters.
pub const TILE_HOOK_OTHERS_ON: u8 = 16;
/// Forbid hooking other characters.
pub const TILE_HOOK_OTHERS_OFF: u8 = 17;
/// Unlimited air jumps while active.
pub const TILE_ENDLESS_JUMP_ON: u8 = 18;
/// Restore the normal jump budget.
pub const TILE_ENDLESS_JUMP_OFF: u8 = 19;
/// Refills jumps while falling along a wall.
pub const TILE_WALLJUMP: u8 = 20;
/// Equip the jetpack.
pub const TILE_JETPACK_ON: u8 = 21;
/// Remove the jetpack.
pub const TILE_JETPACK_OFF: u8 = 22;
/// Refill the jump budget once per run of this tile.
pub const TILE_REFILL_JUMPS: u8 = 23;
/// Gun projectiles teleport their owner on impact.
pub const TILE_TELEGUN_ON: u8 = 24;
/// Disable the gun-teleport behavior.
pub const TILE_TELEGUN_OFF: u8 = 25;

/// One-way stopper, orientation from tile flags.
pub const TILE_STOP: u8 = 26;
/// Stopper blocking both directions along its axis.
pub const TILE_STOP_TWO: u8 = 27;
/// Stopper blocking all four directions.
pub const TILE_STOP_ALL: u8 = 28;

// =============================================================================
// SWITCH LAYER TILE IDS (cells carry a switch number and a delay byte)
// =============================================================================

/// Open the switch permanently.
pub const TILE_SWITCH_OPEN: u8 = 40;
/// Open the switch for `delay` seconds.
pub const TILE_SWITCH_TIMED_OPEN: u8 = 41;
/// Close the switch after `delay` seconds.
pub const TILE_SWITCH_TIMED_CLOSE: u8 = 42;
/// Close the switch permanently.
pub const TILE_SWITCH_CLOSE: u8 = 43;
/// Override the jump budget; `delay` = new jump count.
pub const TILE_JUMP_OVERRIDE: u8 = 44;
/// Subtract `delay` seconds from the race clock.
pub const TILE_TIME_BONUS: u8 = 45;
/// Add `delay` seconds to the race clock.
pub const TILE_TIME_PENALTY: u8 = 46;
/// Freeze with a custom duration; `delay` = seconds.
pub const TILE_SWITCH_FREEZE: u8 = 47;

// =============================================================================
// TELE LAYER TILE IDS (cells carry a destination-group number)
// =============================================================================

/// Teleport preserving velocity and hook.
pub const TILE_TELE_IN: u8 = 60;
/// Teleport that resets velocity and force-releases the hook.
pub const TILE_TELE_IN_EVIL: u8 = 61;
/// Destination marker for its group.
pub const TILE_TELE_OUT: u8 = 62;
/// Records the character's checkpoint index.
pub const TILE_TELE_CHECKPOINT: u8 = 63;
/// Teleport back to the last recorded checkpoint group.
pub const TILE_TELE_CHECK_IN: u8 = 64;
/// Checkpoint destination marker for its group.
pub const TILE_TELE_CHECK_OUT: u8 = 65;

// =============================================================================
// TILE FLAGS (rotation for stoppers and other oriented tiles)
// =============================================================================

/// Quarter-turn rotation stored in the low two flag bits.
/// 0 = facing up, 1 = facing right, 2 = facing down, 3 = facing left.
pub const TILEFLAG_ROTATION_MASK: u8 = 0b0000_0011;

// =============================================================================
// PER-LAYER CELL PAYLOADS
// =============================================================================

/// One cell of the game or front layer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tile {
    /// Raw tile id.
    pub id: u8,
    /// Orientation flags.
    pub flags: u8,
}

impl Tile {
    /// Air cell.
    pub const AIR: Self = Self { id: TILE_AIR, flags: 0 };

    /// Create a tile with default flags.
    pub const fn new(id: u8) -> Self {
        Self { id, flags: 0 }
    }

    /// Create a tile with a quarter-turn rotation (0..=3).
    pub const fn rotated(id: u8, rotation: u8) -> Self {
        Self {
            id,
            flags: rotation & TILEFLAG_ROTATION_MASK,
        }
    }

    /// Quarter-turn rotation (0..=3).
    #[inline]
    pub fn rotation(self) -> u8 {
        self.flags & TILEFLAG_ROTATION_MASK
    }

    /// Character and hook cannot pass through.
    #[inline]
    pub fn is_solid(self) -> bool {
        self.id == TILE_SOLID || self.id == TILE_NOHOOK
    }

    /// Solid that the hook slides off without attaching.
    #[inline]
    pub fn is_hook_blocker(self) -> bool {
        self.id == TILE_NOHOOK
    }
}

/// One cell of the switch layer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwitchTile {
    /// Raw tile id (`TILE_SWITCH_*`, `TILE_JUMP_OVERRIDE`, ...).
    pub id: u8,
    /// Switch number this cell is keyed to; 0 = ungated.
    pub number: u8,
    /// Parameter byte: seconds for timed kinds, jump count for
    /// the jump override.
    pub delay: u8,
}

/// One cell of the teleport layer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeleTile {
    /// Raw tile id (`TILE_TELE_*`).
    pub id: u8,
    /// Destination-group (or checkpoint) number.
    pub number: u8,
}

/// One cell of the speedup layer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeedupTile {
    /// Added speed in pixels per tick.
    pub force: u8,
    /// Cap on the boosted speed along the tile direction; 0 = uncapped.
    pub max_speed: u8,
    /// Direction in whole degrees, 0 = right, clockwise.
    pub angle: i16,
}

impl SpeedupTile {
    /// A speedup cell is live when it applies any force.
    #[inline]
    pub fn is_active(self) -> bool {
        self.force > 0
    }
}

// =============================================================================
// MOVE RESTRICTIONS
// =============================================================================

/// Bitmask of directions a character is currently forbidden to move in.
/// Computed from stopper tiles around the character's box.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveRestrictions(pub u8);

impl MoveRestrictions {
    /// Cannot move left (negative x).
    pub const LEFT: u8 = 1 << 0;
    /// Cannot move right (positive x).
    pub const RIGHT: u8 = 1 << 1;
    /// Cannot move up (negative y).
    pub const UP: u8 = 1 << 2;
    /// Cannot move down (positive y).
    pub const DOWN: u8 = 1 << 3;

    /// No restrictions.
    pub const NONE: Self = Self(0);

    /// True when no direction is blocked.
    #[inline]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub fn blocks_left(self) -> bool {
        self.0 & Self::LEFT != 0
    }

    #[inline]
    pub fn blocks_right(self) -> bool {
        self.0 & Self::RIGHT != 0
    }

    #[inline]
    pub fn blocks_up(self) -> bool {
        self.0 & Self::UP != 0
    }

    #[inline]
    pub fn blocks_down(self) -> bool {
        self.0 & Self::DOWN != 0
    }

    /// Merge another restriction set into this one.
    #[inline]
    pub fn merge(&mut self, other: MoveRestrictions) {
        self.0 |= other.0;
    }
}

/// Restrictions contributed by a single stopper tile.
///
/// Rotation 0 faces up: it stops a character from moving down through
/// it, the classic floor stopper. Each quarter turn rotates the
/// blocked direction with the tile.
pub fn stopper_restrictions(tile: Tile) -> MoveRestrictions {
    const BY_ROTATION: [u8; 4] = [
        MoveRestrictions::DOWN,
        MoveRestrictions::LEFT,
        MoveRestrictions::UP,
        MoveRestrictions::RIGHT,
    ];

    match tile.id {
        TILE_STOP => MoveRestrictions(BY_ROTATION[tile.rotation() as usize]),
        TILE_STOP_TWO => {
            let r = tile.rotation() as usize;
            MoveRestrictions(BY_ROTATION[r] | BY_ROTATION[(r + 2) % 4])
        }
        TILE_STOP_ALL => MoveRestrictions(
            MoveRestrictions::LEFT
                | MoveRestrictions::RIGHT
                | MoveRestrictions::UP
                | MoveRestrictions::DOWN,
        ),
        _ => MoveRestrictions::NONE,
    }
}
