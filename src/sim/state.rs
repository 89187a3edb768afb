//! Character State Definitions
//!
//! The authoritative per-character simulation state, owned exclusively
//! by the character and mutated only during its own tick phases.

use serde::{Deserialize, Serialize};

use crate::core::fixed::{Fixed, CHARACTER_SIZE};
use crate::core::vec2::FixedVec2;
use crate::map::tiles::MoveRestrictions;
use crate::TICK_RATE;

// =============================================================================
// IDS AND TEAMS
// =============================================================================

/// Stable arena id of a character.
///
/// Implements Ord for deterministic iteration wherever characters are
/// keyed by id.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct CharacterId(pub u32);

/// Team a character plays in.
///
/// `Team::SUPER` is the administrative team that bypasses all switch
/// gating.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct Team(pub u8);

impl Team {
    /// The administrative super team.
    pub const SUPER: Team = Team(u8::MAX);

    /// True for the administrative super team.
    #[inline]
    pub fn is_super(self) -> bool {
        self == Self::SUPER
    }
}

// =============================================================================
// WEAPONS
// =============================================================================

/// Weapon slots a character can hold.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
#[derive(Default)]
pub enum WeaponKind {
    /// Melee, pushes targets in reach.
    #[default]
    Hammer = 0,
    /// Hitscan pistol; doubles as the jetpack thruster.
    Gun = 1,
    /// Spread shot.
    Shotgun = 2,
    /// Arcing explosive.
    Grenade = 3,
    /// Bouncing beam.
    Laser = 4,
    /// Melee dash granted by a pickup; overrides movement.
    Ninja = 5,
}

impl WeaponKind {
    /// Number of weapon slots.
    pub const COUNT: usize = 6;

    /// Ticks between shots.
    pub fn fire_delay_ticks(self) -> u32 {
        match self {
            WeaponKind::Hammer => 6,
            WeaponKind::Gun => 6,
            WeaponKind::Shotgun => 25,
            WeaponKind::Grenade => 25,
            WeaponKind::Laser => 40,
            WeaponKind::Ninja => 40,
        }
    }

    /// Weapons that keep firing while the button is held.
    ///
    /// The gun only turns full-auto while a jetpack is equipped; that
    /// check lives in the integrator because it needs character state.
    pub fn is_full_auto(self) -> bool {
        matches!(
            self,
            WeaponKind::Shotgun | WeaponKind::Grenade | WeaponKind::Laser
        )
    }

    /// Slot index from a raw id.
    pub fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(WeaponKind::Hammer),
            1 => Some(WeaponKind::Gun),
            2 => Some(WeaponKind::Shotgun),
            3 => Some(WeaponKind::Grenade),
            4 => Some(WeaponKind::Laser),
            5 => Some(WeaponKind::Ninja),
            _ => None,
        }
    }
}

/// Ownership and ammo of one weapon slot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeaponSlot {
    /// Character owns this weapon.
    pub got: bool,
    /// Remaining ammo; `None` = unlimited.
    pub ammo: Option<u32>,
}

/// Transient ninja sub-state while the ninja weapon is held.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NinjaState {
    /// Tick the ninja was picked up; it expires after
    /// [`NINJA_DURATION_TICKS`].
    pub activation_tick: u32,
    /// Weapon to return to when the ninja expires.
    pub previous_weapon: WeaponKind,
    /// Direction of the current dash.
    pub direction: FixedVec2,
    /// Ticks left in the current dash; 0 = not dashing.
    pub dash_ticks_left: u32,
    /// Speed the character had before the dash, restored afterward.
    pub old_vel_amount: Fixed,
}

/// How long a ninja pickup lasts (15 seconds).
pub const NINJA_DURATION_TICKS: u32 = 15 * TICK_RATE;

/// Length of a single ninja dash in ticks.
pub const NINJA_DASH_TICKS: u32 = 10;

/// Dash velocity in pixels per tick.
pub const NINJA_DASH_VELOCITY: Fixed = crate::core::fixed::to_fixed(50.0);

// =============================================================================
// HOOK
// =============================================================================

/// Hook state machine.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum HookState {
    /// Stowed.
    #[default]
    Idle,
    /// Pulling back in after a miss; releases next tick.
    Retracting,
    /// Head travelling outward.
    Flying,
    /// Anchored to ground or to another character.
    Attached,
}

// =============================================================================
// TRIGGERED EVENTS (bitflags, cleared each tick)
// =============================================================================

/// One-tick event bits the snapshot layer forwards to clients for
/// effects and sounds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggeredEvents(pub u32);

impl TriggeredEvents {
    /// Jumped off the ground.
    pub const GROUND_JUMP: u32 = 1 << 0;
    /// Used an air jump.
    pub const AIR_JUMP: u32 = 1 << 1;
    /// Fired the hook.
    pub const HOOK_LAUNCH: u32 = 1 << 2;
    /// Hook anchored to ground.
    pub const HOOK_ATTACH_GROUND: u32 = 1 << 3;
    /// Hook anchored to a character.
    pub const HOOK_ATTACH_PLAYER: u32 = 1 << 4;
    /// Hook hit an unhookable solid.
    pub const HOOK_HIT_NOHOOK: u32 = 1 << 5;
    /// Hook pulled back in without anchoring.
    pub const HOOK_RETRACT: u32 = 1 << 6;

    /// Set a bit.
    #[inline]
    pub fn trigger(&mut self, bit: u32) {
        self.0 |= bit;
    }

    /// Test a bit.
    #[inline]
    pub fn has(self, bit: u32) -> bool {
        self.0 & bit != 0
    }

    /// Clear everything; called at the start of each tick.
    #[inline]
    pub fn clear(&mut self) {
        self.0 = 0;
    }
}

// =============================================================================
// JUMP BOOKKEEPING
// =============================================================================

/// Bit 0 of `jumped`: jump input already consumed (still held).
pub const JUMPED_PRESSED: u8 = 1 << 0;
/// Bit 1 of `jumped`: feet are "dark", no air jump available.
pub const JUMPED_DARK_FEET: u8 = 1 << 1;

// =============================================================================
// CHARACTER STATE
// =============================================================================

/// Full health in hearts.
pub const MAX_HEALTH: i32 = 10;
/// Full armor in shields; restored on unfreeze.
pub const MAX_ARMOR: i32 = 10;

/// Default freeze duration applied by freeze tiles (3 seconds).
pub const DEFAULT_FREEZE_TICKS: u32 = 3 * TICK_RATE;

/// Hard per-component velocity cap in pixels per tick.
pub const VELOCITY_CAP: Fixed = crate::core::fixed::from_int(6000);

/// Authoritative state of one character.
///
/// Everything the integrator, tile engine and snapshot projection
/// read or write lives here. One character owns exactly one of these
/// at a time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterState {
    /// World position of the box center.
    pub pos: FixedVec2,
    /// Velocity in pixels per tick.
    pub vel: FixedVec2,
    /// Collision box side length.
    pub size: Fixed,
    /// Aim angle in fixed-point radians, from the last input.
    pub angle: Fixed,
    /// Retained movement direction (-1, 0, +1). Kept across ticks so
    /// input-less extrapolation keeps walking the way the player was.
    pub direction: i8,

    /// Currently wielded weapon.
    pub active_weapon: WeaponKind,
    /// Ownership/ammo per weapon slot, indexed by `WeaponKind`.
    pub weapons: [WeaponSlot; WeaponKind::COUNT],
    /// Ticks until the active weapon may fire again.
    pub reload_ticks: u32,
    /// Fire was held last tick, for semi-auto edge detection.
    pub fire_was_held: bool,
    /// Ninja sub-state while the ninja slot is active.
    pub ninja: Option<NinjaState>,

    /// Jump budget: -1 unlimited-but-dark, 0 none, n total airborne jumps.
    pub jumps: i32,
    /// `JUMPED_PRESSED` | `JUMPED_DARK_FEET` bits.
    pub jumped: u8,
    /// Jumps consumed since last standing on ground.
    pub jumped_total: i32,

    /// Hook machine state.
    pub hook_state: HookState,
    /// World position of the hook head.
    pub hook_pos: FixedVec2,
    /// Flight direction of the hook head.
    pub hook_dir: FixedVec2,
    /// Ticks the current player-hook has been held.
    pub hook_tick: u32,
    /// Weak reference to the hooked character, cleared defensively
    /// when the target disappears.
    pub hooked_player: Option<CharacterId>,

    /// Ticks of freeze left; 0 = not frozen.
    pub freeze_ticks_left: u32,
    /// Tick the current freeze started, for derived time-remaining.
    pub freeze_start: Option<u32>,
    /// Frozen until an explicit deep-unfreeze.
    pub deep_frozen: bool,
    /// Own movement disabled, external forces still apply.
    pub live_frozen: bool,

    /// Administrative super mode.
    pub super_mode: bool,
    /// Immune to damage and freeze.
    pub invincible: bool,
    /// Invisible to non-teammates and non-colliding.
    pub solo: bool,

    /// Hook never auto-releases.
    pub endless_hook: bool,
    /// Unlimited air jumps.
    pub endless_jump: bool,
    /// Gun doubles as a thruster.
    pub jetpack: bool,
    /// Gun projectiles teleport their owner.
    pub telegun: bool,
    /// Body collision with other characters enabled.
    pub can_collide: bool,
    /// Hooking other characters enabled.
    pub can_hook_others: bool,
    /// Hitting other characters (hammer etc.) enabled.
    pub can_hit_others: bool,

    /// Stopper restrictions computed this tick.
    pub move_restrictions: MoveRestrictions,
    /// Current tuning zone; 0 = map default.
    pub tune_zone: u8,
    /// Highest checkpoint group recorded so far.
    pub last_checkpoint: u8,

    /// Current health in hearts.
    pub health: i32,
    /// Current armor in shields.
    pub armor: i32,

    /// Tick the race clock started, if it has.
    pub race_start_tick: Option<u32>,
    /// Accumulated bonus/penalty in ticks; positive = penalty.
    pub time_adjust_ticks: i64,

    /// One-tick event bits for the snapshot layer.
    pub triggered_events: TriggeredEvents,
    /// Set by discontinuous changes (teleports, spawns); forces a
    /// reckoning resync this tick. Cleared by the tracker.
    pub reset_flag: bool,
    /// Tile id of the once-per-run tile currently being stood in, so a
    /// contiguous run applies exactly once.
    pub last_run_tile: Option<u8>,
}

impl CharacterState {
    /// Create a freshly spawned character at a position.
    pub fn spawn(pos: FixedVec2) -> Self {
        let mut weapons = [WeaponSlot::default(); WeaponKind::COUNT];
        weapons[WeaponKind::Hammer as usize] = WeaponSlot { got: true, ammo: None };
        weapons[WeaponKind::Gun as usize] = WeaponSlot { got: true, ammo: Some(10) };

        Self {
            pos,
            vel: FixedVec2::ZERO,
            size: CHARACTER_SIZE,
            angle: 0,
            direction: 0,

            active_weapon: WeaponKind::Gun,
            weapons,
            reload_ticks: 0,
            fire_was_held: false,
            ninja: None,

            jumps: 2,
            jumped: 0,
            jumped_total: 0,

            hook_state: HookState::Idle,
            hook_pos: pos,
            hook_dir: FixedVec2::ZERO,
            hook_tick: 0,
            hooked_player: None,

            freeze_ticks_left: 0,
            freeze_start: None,
            deep_frozen: false,
            live_frozen: false,

            super_mode: false,
            invincible: false,
            solo: false,

            endless_hook: false,
            endless_jump: false,
            jetpack: false,
            telegun: false,
            can_collide: true,
            can_hook_others: true,
            can_hit_others: true,

            move_restrictions: MoveRestrictions::NONE,
            tune_zone: 0,
            last_checkpoint: 0,

            health: MAX_HEALTH,
            armor: 0,

            race_start_tick: None,
            time_adjust_ticks: 0,

            triggered_events: TriggeredEvents::default(),
            reset_flag: true,
            last_run_tile: None,
        }
    }

    /// Half the collision box.
    #[inline]
    pub fn half_size(&self) -> Fixed {
        self.size / 2
    }

    /// Any freeze state that suppresses the character's own input.
    #[inline]
    pub fn is_frozen(&self) -> bool {
        self.freeze_ticks_left > 0 || self.deep_frozen
    }

    /// Feet display state: true = dark, no air jump available.
    #[inline]
    pub fn has_dark_feet(&self) -> bool {
        self.jumped & JUMPED_DARK_FEET != 0
    }

    /// Slot of the active weapon.
    #[inline]
    pub fn active_slot(&self) -> &WeaponSlot {
        &self.weapons[self.active_weapon as usize]
    }

    /// Give a weapon, setting its ammo.
    pub fn give_weapon(&mut self, weapon: WeaponKind, ammo: Option<u32>) {
        self.weapons[weapon as usize] = WeaponSlot { got: true, ammo };
    }

    /// Pick up a ninja: switches to the ninja slot and remembers the
    /// weapon to restore on expiry.
    pub fn activate_ninja(&mut self, now: u32) {
        let previous = match self.active_weapon {
            WeaponKind::Ninja => WeaponKind::Gun,
            other => other,
        };
        self.weapons[WeaponKind::Ninja as usize] = WeaponSlot { got: true, ammo: None };
        self.active_weapon = WeaponKind::Ninja;
        self.ninja = Some(NinjaState {
            activation_tick: now,
            previous_weapon: previous,
            direction: FixedVec2::RIGHT,
            dash_ticks_left: 0,
            old_vel_amount: 0,
        });
    }

    // =========================================================================
    // FREEZE
    // =========================================================================

    /// Freeze for a number of ticks.
    ///
    /// No-op (returns false) when the duration is zero, the character
    /// is super or invincible, or an at-least-as-long freeze is already
    /// running. Freezing drops armor to zero.
    pub fn freeze_for(&mut self, ticks: u32, now: u32) -> bool {
        if ticks == 0 || self.super_mode || self.invincible {
            return false;
        }
        if self.freeze_ticks_left >= ticks {
            return false;
        }

        self.freeze_ticks_left = ticks;
        self.freeze_start = Some(now);
        self.armor = 0;
        true
    }

    /// Clear a running (non-deep) freeze and restore full armor.
    pub fn unfreeze(&mut self) {
        self.freeze_ticks_left = 0;
        self.freeze_start = None;
        self.armor = MAX_ARMOR;
    }

    // =========================================================================
    // VELOCITY
    // =========================================================================

    /// Set velocity, clamped against the current move restrictions.
    pub fn set_velocity(&mut self, vel: FixedVec2) {
        self.vel = clamp_velocity(self.move_restrictions, vel);
    }

    /// Set velocity WITHOUT the move-restriction clamp.
    ///
    /// Compatibility path: existing maps and replays depend on forces
    /// applying inside stoppers exactly like this, so the bypass must
    /// stay. Use [`CharacterState::set_velocity`] everywhere else.
    pub fn set_velocity_unclamped(&mut self, vel: FixedVec2) {
        self.vel = vel;
    }

    /// Release the hook entirely.
    pub fn release_hook(&mut self) {
        self.hook_state = HookState::Idle;
        self.hooked_player = None;
        self.hook_pos = self.pos;
        self.hook_tick = 0;
    }
}

/// Clamp a velocity against a restriction mask, zeroing components that
/// point into a blocked direction.
pub fn clamp_velocity(restrictions: MoveRestrictions, vel: FixedVec2) -> FixedVec2 {
    let mut vel = vel;
    if restrictions.blocks_left() && vel.x < 0 {
        vel.x = 0;
    }
    if restrictions.blocks_right() && vel.x > 0 {
        vel.x = 0;
    }
    if restrictions.blocks_up() && vel.y < 0 {
        vel.y = 0;
    }
    if restrictions.blocks_down() && vel.y > 0 {
        vel.y = 0;
    }
    vel
}

// =============================================================================
// TESTS
// =============================================================================
