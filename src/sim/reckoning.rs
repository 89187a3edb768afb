//! Dead-Reckoning Tracker
//!
//! Runs a second, input-less copy of the character through the same
//! integrator and decides when the authoritative state must be
//! re-broadcast. Clients predict from the last broadcast; as long as
//! pure extrapolation matches what the server computes, nothing has to
//! be sent, and drift is hard-bounded by a forced resync every three
//! simulated seconds.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::fixed::{fixed_round_to_int, ANGLE_SCALE};
use crate::sim::events::CoreEvent;
use crate::sim::input::CharacterInput;
use crate::sim::movement::{advance, AdvanceCtx};
use crate::sim::state::{CharacterState, HookState};
use crate::TICK_RATE;

/// A resync is forced at the latest after this many ticks (3 seconds).
pub const MAX_RECKONING_TICKS: u32 = 3 * TICK_RATE;

/// The core projection shared by network snapshots and the reckoning
/// comparison.
///
/// This is the serialization edge: options become sentinels (-1 = no
/// hooked player), positions become whole pixels, velocities and
/// angles are quantized to 1/256 steps. Two states that agree here are
/// indistinguishable to every client.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendCore {
    /// Position in whole pixels.
    pub x: i32,
    /// Position in whole pixels.
    pub y: i32,
    /// Velocity in 1/256 pixel-per-tick steps.
    pub vel_x: i32,
    /// Velocity in 1/256 pixel-per-tick steps.
    pub vel_y: i32,
    /// Aim angle in 1/256 radian steps.
    pub angle: i32,
    /// Movement direction: -1, 0, +1.
    pub direction: i32,
    /// Jump bookkeeping bits.
    pub jumped: i32,
    /// Hooked character id, -1 when none.
    pub hooked_player: i32,
    /// Hook machine state as a small integer.
    pub hook_state: i32,
    /// Ticks the current player-hook has been held.
    pub hook_tick: i32,
    /// Hook head position in whole pixels.
    pub hook_x: i32,
    /// Hook head position in whole pixels.
    pub hook_y: i32,
    /// Hook flight direction in 1/256 steps.
    pub hook_dx: i32,
    /// Hook flight direction in 1/256 steps.
    pub hook_dy: i32,
}

impl SendCore {
    /// Project a character state onto the wire core.
    pub fn project(state: &CharacterState) -> Self {
        // 1/256-step quantization in i64, so even capped velocities
        // cannot overflow
        let quantize =
            |v: i32| ((v as i64 * ANGLE_SCALE as i64) >> crate::core::fixed::FIXED_SCALE) as i32;

        Self {
            x: fixed_round_to_int(state.pos.x),
            y: fixed_round_to_int(state.pos.y),
            vel_x: quantize(state.vel.x),
            vel_y: quantize(state.vel.y),
            angle: quantize(state.angle),
            direction: state.direction as i32,
            jumped: state.jumped as i32,
            hooked_player: state.hooked_player.map(|id| id.0 as i32).unwrap_or(-1),
            hook_state: match state.hook_state {
                HookState::Idle => 0,
                HookState::Retracting => 1,
                HookState::Flying => 2,
                HookState::Attached => 3,
            },
            hook_tick: state.hook_tick as i32,
            hook_x: fixed_round_to_int(state.hook_pos.x),
            hook_y: fixed_round_to_int(state.hook_pos.y),
            hook_dx: quantize(state.hook_dir.x),
            hook_dy: quantize(state.hook_dir.y),
        }
    }
}

/// What the snapshot layer should reference for one character this tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReckoningOutput {
    /// 0 = `core` is the fresh authoritative state (cheap extrapolation
    /// reference); otherwise the tick of the forced resync.
    pub reference_tick: u32,
    /// The projection to broadcast.
    pub core: SendCore,
}

/// Shadow simulation plus resync bookkeeping for one character.
#[derive(Clone, Debug)]
pub struct ReckoningTracker {
    /// The input-less shadow copy.
    shadow: CharacterState,
    /// Tick of the last forced resync.
    reckoning_tick: u32,
    /// The authoritative projection broadcast at that resync.
    send_core: SendCore,
}

impl ReckoningTracker {
    /// Start tracking a character; the first tick always resyncs
    /// because spawning sets the reset flag.
    pub fn new(state: &CharacterState, tick: u32) -> Self {
        Self {
            shadow: state.clone(),
            reckoning_tick: tick,
            send_core: SendCore::project(state),
        }
    }

    /// Tick of the last forced resync.
    pub fn reckoning_tick(&self) -> u32 {
        self.reckoning_tick
    }

    /// Advance the shadow and decide whether to resync.
    ///
    /// Must run after the authoritative character finished its phases
    /// for this tick. Clears the character's reset flag.
    pub fn tick(
        &mut self,
        authoritative: &mut CharacterState,
        ctx: &AdvanceCtx<'_>,
    ) -> ReckoningOutput {
        // Extrapolate: same integrator, no fresh input. Events from the
        // shadow are fiction and must never reach the world.
        let mut shadow_events: Vec<CoreEvent> = Vec::new();
        advance(
            &mut self.shadow,
            &CharacterInput::empty(),
            ctx,
            false,
            &mut shadow_events,
        );

        let auth_core = SendCore::project(authoritative);
        let shadow_core = SendCore::project(&self.shadow);

        // Byte-exact comparison through the same serialization the
        // snapshot layer uses; trouble serializing forces a resync
        let differs = match (
            bincode::serialize(&auth_core),
            bincode::serialize(&shadow_core),
        ) {
            (Ok(a), Ok(b)) => a != b,
            _ => true,
        };

        let expired = ctx.tick.saturating_sub(self.reckoning_tick) >= MAX_RECKONING_TICKS;
        let reset = authoritative.reset_flag;

        if reset || expired || differs {
            debug!(
                character = ctx.self_id.0,
                tick = ctx.tick,
                reset,
                expired,
                differs,
                "forcing reckoning resync"
            );

            authoritative.reset_flag = false;
            self.shadow = authoritative.clone();
            self.shadow.reset_flag = false;
            self.reckoning_tick = ctx.tick;
            self.send_core = auth_core;

            return ReckoningOutput {
                reference_tick: self.reckoning_tick,
                core: self.send_core,
            };
        }

        // Prediction holds: clients extrapolate, reference the fresh
        // state with tick 0
        ReckoningOutput {
            reference_tick: 0,
            core: auth_core,
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
