//! Tile Interaction Engine
//!
//! Classifies and applies map-cell side effects along the path a
//! character covered this tick. The world runs it twice per character:
//! a pre-phase on the current cell before the integrator, and a
//! post-phase on every cell crossed during the move, so fast movement
//! cannot skip a trigger.
//!
//! Per-cell precedence short-circuits on terminal outcomes: death
//! first, then velocity shaping, freezes, ability toggles, stoppers,
//! switches, parameterized overrides, and teleports last.

use tracing::{debug, warn};

use crate::core::fixed::from_int;
use crate::core::rng::DeterministicRng;
use crate::core::vec2::{direction_deg, FixedVec2};
use crate::map::collision::MapGrid;
use crate::map::tiles::{
    stopper_restrictions, Tile, TILE_COLLISION_OFF, TILE_COLLISION_ON, TILE_DEATH,
    TILE_DEEP_FREEZE, TILE_DEEP_UNFREEZE, TILE_ENDLESS_HOOK_OFF, TILE_ENDLESS_HOOK_ON,
    TILE_ENDLESS_JUMP_OFF, TILE_ENDLESS_JUMP_ON, TILE_FREEZE, TILE_HIT_OFF, TILE_HIT_ON,
    TILE_HOOK_OTHERS_OFF, TILE_HOOK_OTHERS_ON, TILE_JETPACK_OFF, TILE_JETPACK_ON,
    TILE_JUMP_OVERRIDE, TILE_LIVE_FREEZE, TILE_LIVE_UNFREEZE, TILE_REFILL_JUMPS, TILE_STOP,
    TILE_STOP_ALL, TILE_STOP_TWO, TILE_SWITCH_CLOSE, TILE_SWITCH_FREEZE, TILE_SWITCH_OPEN,
    TILE_SWITCH_TIMED_CLOSE, TILE_SWITCH_TIMED_OPEN, TILE_TELEGUN_OFF, TILE_TELEGUN_ON,
    TILE_TELE_CHECKPOINT, TILE_TELE_CHECK_IN, TILE_TELE_IN, TILE_TELE_IN_EVIL, TILE_TIME_BONUS,
    TILE_TIME_PENALTY, TILE_UNFREEZE, TILE_WALLJUMP,
};
use crate::sim::events::{CoreEvent, CoreEventData, DeathCause, ToggleKind};
use crate::sim::state::{
    clamp_velocity, CharacterId, CharacterState, Team, DEFAULT_FREEZE_TICKS, JUMPED_DARK_FEET,
};
use crate::sim::switches::SwitchTable;
use crate::TICK_RATE;

/// Result of running the engine over a cell sequence.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TileOutcome {
    /// Nothing terminal happened.
    Alive,
    /// The character must die this tick.
    Dead(DeathCause),
}

/// Everything `apply` needs besides the character and the switch table.
pub struct InteractCtx<'a> {
    /// Id of the character walking the cells.
    pub self_id: CharacterId,
    /// Current tick.
    pub tick: u32,
    /// Team of the character, for switch gating.
    pub team: Team,
    /// Map/collision collaborator.
    pub map: &'a MapGrid,
    /// The character's team already finished; death tiles spare it.
    pub finished_exempt: bool,
}

/// Apply the side effects of an ordered cell sequence.
///
/// `crossed_cells` must contain every cell touched between the
/// previous and the current position, in path order. The return value
/// is terminal: once dead, remaining cells are not evaluated.
pub fn apply(
    state: &mut CharacterState,
    switches: &mut SwitchTable,
    rng: &mut DeterministicRng,
    crossed_cells: &[usize],
    ctx: &InteractCtx<'_>,
    events: &mut Vec<CoreEvent>,
) -> TileOutcome {
    // (1) out-of-map is terminal before any cell logic
    if ctx.map.is_outside(state.pos) && !is_death_exempt(state, ctx) {
        return TileOutcome::Dead(DeathCause::OutOfMap);
    }

    for &cell in crossed_cells {
        state.tune_zone = ctx.map.tune_zone(cell);

        let game = ctx.map.game_tile(cell);
        let front = ctx.map.front_tile(cell);

        // (1) death tiles
        if (game.id == TILE_DEATH || front.id == TILE_DEATH) && !is_death_exempt(state, ctx) {
            return TileOutcome::Dead(DeathCause::DeathTile);
        }

        // (2) speedup layer
        let speedup = ctx.map.speedup_tile(cell);
        if speedup.is_active() {
            apply_speedup(state, speedup.angle as i32, speedup.force, speedup.max_speed);
        }

        // (3)-(7) gameplay tiles on both layers
        for tile in [game, front] {
            apply_gameplay_tile(state, tile, ctx, events);
        }

        // (8)-(9) switch layer
        apply_switch_cell(state, switches, cell, ctx, events);
        if let TileOutcome::Dead(cause) = check_race_clock(state, ctx) {
            return TileOutcome::Dead(cause);
        }

        // (10) teleports, last so earlier effects of the cell land
        apply_tele_cell(state, rng, cell, ctx, events);

        track_run(state, cell, ctx);
    }

    TileOutcome::Alive
}

fn is_death_exempt(state: &CharacterState, ctx: &InteractCtx<'_>) -> bool {
    state.super_mode || state.invincible || ctx.finished_exempt
}

/// Blend velocity toward the speedup direction, capped along it.
fn apply_speedup(state: &mut CharacterState, angle: i32, force: u8, max_speed: u8) {
    let dir = direction_deg(angle);
    state.vel = state.vel.add(dir.scale(from_int(force as i32)));

    if max_speed > 0 {
        let cap = from_int(max_speed as i32);
        let along = state.vel.dot(dir);
        if along > cap {
            state.vel = state.vel.sub(dir.scale(along - cap));
        }
    }
}

/// Freeze family, ability toggles, wall jump, stoppers.
///
/// Every toggle is idempotent: an already-active toggle is a no-op and
/// emits nothing.
fn apply_gameplay_tile(
    state: &mut CharacterState,
    tile: Tile,
    ctx: &InteractCtx<'_>,
    events: &mut Vec<CoreEvent>,
) {
    match tile.id {
        // (3) freeze family, guarded by super/invincible
        TILE_FREEZE => {
            state.freeze_for(DEFAULT_FREEZE_TICKS, ctx.tick);
        }
        TILE_UNFREEZE => {
            if state.freeze_ticks_left > 0 {
                state.unfreeze();
            }
        }
        TILE_DEEP_FREEZE => {
            if !state.super_mode && !state.invincible && !state.deep_frozen {
                state.deep_frozen = true;
                state.armor = 0;
            }
        }
        TILE_DEEP_UNFREEZE => {
            if state.deep_frozen {
                state.deep_frozen = false;
                state.unfreeze();
            }
        }
        TILE_LIVE_FREEZE => {
            if !state.super_mode && !state.invincible {
                state.live_frozen = true;
            }
        }
        TILE_LIVE_UNFREEZE => {
            state.live_frozen = false;
        }

        // (4) ability toggles
        TILE_ENDLESS_HOOK_ON => toggle(state, ctx, events, ToggleKind::EndlessHook, true),
        TILE_ENDLESS_HOOK_OFF => toggle(state, ctx, events, ToggleKind::EndlessHook, false),
        TILE_HIT_ON => toggle(state, ctx, events, ToggleKind::HitOthers, true),
        TILE_HIT_OFF => toggle(state, ctx, events, ToggleKind::HitOthers, false),
        TILE_COLLISION_ON => toggle(state, ctx, events, ToggleKind::Collision, true),
        TILE_COLLISION_OFF => toggle(state, ctx, events, ToggleKind::Collision, false),
        TILE_HOOK_OTHERS_ON => toggle(state, ctx, events, ToggleKind::HookOthers, true),
        TILE_HOOK_OTHERS_OFF => toggle(state, ctx, events, ToggleKind::HookOthers, false),
        TILE_ENDLESS_JUMP_ON => toggle(state, ctx, events, ToggleKind::EndlessJump, true),
        TILE_ENDLESS_JUMP_OFF => toggle(state, ctx, events, ToggleKind::EndlessJump, false),

        // (5) wall jump while falling along a wall
        TILE_WALLJUMP => {
            if state.vel.y > 0 && touches_wall(state, ctx.map) {
                state.jumped_total = (state.jumps - 1).max(0);
                state.jumped &= !JUMPED_DARK_FEET;
            }
        }

        // (6) jetpack, jump refill, telegun
        TILE_JETPACK_ON => toggle(state, ctx, events, ToggleKind::Jetpack, true),
        TILE_JETPACK_OFF => toggle(state, ctx, events, ToggleKind::Jetpack, false),
        TILE_REFILL_JUMPS => {
            if state.last_run_tile != Some(TILE_REFILL_JUMPS) {
                state.jumped_total = 0;
                state.jumped = 0;
            }
        }
        TILE_TELEGUN_ON => toggle(state, ctx, events, ToggleKind::Telegun, true),
        TILE_TELEGUN_OFF => toggle(state, ctx, events, ToggleKind::Telegun, false),

        // (7) stoppers zero the matching velocity components
        TILE_STOP | TILE_STOP_TWO | TILE_STOP_ALL => {
            let restrictions = stopper_restrictions(tile);
            state.vel = clamp_velocity(restrictions, state.vel);
            state.move_restrictions.merge(restrictions);
        }

        _ => {}
    }
}

/// One ability toggle with change detection.
fn toggle(
    state: &mut CharacterState,
    ctx: &InteractCtx<'_>,
    events: &mut Vec<CoreEvent>,
    kind: ToggleKind,
    active: bool,
) {
    let flag = match kind {
        ToggleKind::EndlessHook => &mut state.endless_hook,
        ToggleKind::EndlessJump => &mut state.endless_jump,
        ToggleKind::HitOthers => &mut state.can_hit_others,
        ToggleKind::Collision => &mut state.can_collide,
        ToggleKind::HookOthers => &mut state.can_hook_others,
        ToggleKind::Jetpack => &mut state.jetpack,
        ToggleKind::Telegun => &mut state.telegun,
    };

    if *flag == active {
        return;
    }
    *flag = active;

    events.push(CoreEvent::new(
        ctx.tick,
        ctx.self_id,
        CoreEventData::StatusToggled { toggle: kind, active },
    ));
}

/// Solid immediately left or right of the character box.
fn touches_wall(state: &CharacterState, map: &MapGrid) -> bool {
    let probe = state.half_size() + from_int(2);
    map.check_point(FixedVec2::new(state.pos.x - probe, state.pos.y))
        || map.check_point(FixedVec2::new(state.pos.x + probe, state.pos.y))
}

/// Switch kinds, gated freezes, jump overrides and time adjustments.
fn apply_switch_cell(
    state: &mut CharacterState,
    switches: &mut SwitchTable,
    cell: usize,
    ctx: &InteractCtx<'_>,
    events: &mut Vec<CoreEvent>,
) {
    let tile = ctx.map.switch_tile(cell);
    if tile.id == 0 {
        return;
    }

    match tile.id {
        // (8) the four switch kinds
        TILE_SWITCH_OPEN => {
            if switches.set_open(tile.number, ctx.team, ctx.tick, None) {
                notify_switch(ctx, events, tile.number, true);
            }
        }
        TILE_SWITCH_TIMED_OPEN => {
            let until = ctx.tick + tile.delay as u32 * TICK_RATE;
            if switches.set_open(tile.number, ctx.team, ctx.tick, Some(until)) {
                notify_switch(ctx, events, tile.number, true);
            }
        }
        TILE_SWITCH_TIMED_CLOSE => {
            let until = ctx.tick + tile.delay as u32 * TICK_RATE;
            if switches.set_closed(tile.number, ctx.team, ctx.tick, Some(until)) {
                notify_switch(ctx, events, tile.number, false);
            }
        }
        TILE_SWITCH_CLOSE => {
            if switches.set_closed(tile.number, ctx.team, ctx.tick, None) {
                notify_switch(ctx, events, tile.number, false);
            }
        }

        // Custom-duration freeze, gated by its switch number
        TILE_SWITCH_FREEZE => {
            if switches.is_active(tile.number, ctx.team) {
                state.freeze_for(tile.delay as u32 * TICK_RATE, ctx.tick);
            }
        }

        // (9) jump-count override, once per contiguous run
        TILE_JUMP_OVERRIDE => {
            if state.last_run_tile != Some(TILE_JUMP_OVERRIDE) {
                state.jumps = tile.delay as i32;
            }
        }

        // (9) time bonus/penalty, once per contiguous run
        TILE_TIME_BONUS => {
            if state.last_run_tile != Some(TILE_TIME_BONUS) {
                let ticks = tile.delay as i64 * TICK_RATE as i64;
                state.time_adjust_ticks -= ticks;
                events.push(CoreEvent::new(
                    ctx.tick,
                    ctx.self_id,
                    CoreEventData::TimeAdjusted { ticks: -(ticks as i32) },
                ));
            }
        }
        TILE_TIME_PENALTY => {
            if state.last_run_tile != Some(TILE_TIME_PENALTY) {
                let ticks = tile.delay as i64 * TICK_RATE as i64;
                state.time_adjust_ticks += ticks;
                events.push(CoreEvent::new(
                    ctx.tick,
                    ctx.self_id,
                    CoreEventData::TimeAdjusted { ticks: ticks as i32 },
                ));
            }
        }

        _ => {}
    }
}

fn notify_switch(
    ctx: &InteractCtx<'_>,
    events: &mut Vec<CoreEvent>,
    number: u8,
    active: bool,
) {
    events.push(CoreEvent::new(
        ctx.tick,
        ctx.self_id,
        CoreEventData::SwitchToggled { number, team: ctx.team, active },
    ));
}

/// A penalty that drives the race clock negative is state corruption;
/// force the terminal transition instead of carrying it.
fn check_race_clock(state: &CharacterState, ctx: &InteractCtx<'_>) -> TileOutcome {
    let Some(start) = state.race_start_tick else {
        return TileOutcome::Alive;
    };

    let elapsed = ctx.tick.saturating_sub(start) as i64 + state.time_adjust_ticks;
    if elapsed < 0 {
        let err = crate::sim::SimError::NegativeRaceTime {
            character: ctx.self_id.0,
            ticks: elapsed,
        };
        warn!(%err, "forcing terminal transition");
        return TileOutcome::Dead(DeathCause::NegativeRaceTime);
    }
    TileOutcome::Alive
}

/// Plain, evil and checkpoint teleports.
fn apply_tele_cell(
    state: &mut CharacterState,
    rng: &mut DeterministicRng,
    cell: usize,
    ctx: &InteractCtx<'_>,
    events: &mut Vec<CoreEvent>,
) {
    let tile = ctx.map.tele_tile(cell);
    match tile.id {
        TILE_TELE_IN => {
            // Preserves velocity and hook
            if let Some(dest) = ctx.map.teleport_destination(tile.number, rng) {
                teleport_to(state, dest, false, ctx, events);
            }
        }

        TILE_TELE_IN_EVIL => {
            if let Some(dest) = ctx.map.teleport_destination(tile.number, rng) {
                teleport_to(state, dest, true, ctx, events);
            }
        }

        TILE_TELE_CHECKPOINT => {
            if tile.number > state.last_checkpoint {
                state.last_checkpoint = tile.number;
            }
        }

        TILE_TELE_CHECK_IN => {
            // Walk the recorded checkpoint groups backward; first
            // non-empty group wins
            let mut dest = None;
            for group in (1..=state.last_checkpoint).rev() {
                let outs = ctx.map.checkpoint_destinations(group);
                if let Some(point) = rng.choose(outs) {
                    dest = Some(*point);
                    break;
                }
            }

            // Fall back to the map spawn; if that fails too the
            // teleport is a no-op
            let dest = dest.or_else(|| ctx.map.spawn_point());
            match dest {
                Some(dest) => teleport_to(state, dest, false, ctx, events),
                None => debug!(
                    character = ctx.self_id.0,
                    "checkpoint teleport found no destination, skipping"
                ),
            }
        }

        _ => {}
    }
}

fn teleport_to(
    state: &mut CharacterState,
    dest: FixedVec2,
    evil: bool,
    ctx: &InteractCtx<'_>,
    events: &mut Vec<CoreEvent>,
) {
    let from = state.pos;
    state.pos = dest;
    state.reset_flag = true;

    if evil {
        state.vel = FixedVec2::ZERO;
        state.release_hook();
    } else {
        // Keep the hook, but carry its head along with the jump so the
        // rope length stays what it was
        let offset = dest.sub(from);
        state.hook_pos = state.hook_pos.add(offset);
    }

    events.push(CoreEvent::new(
        ctx.tick,
        ctx.self_id,
        CoreEventData::Teleported { from, to: dest },
    ));
}

/// Remember which once-per-run tile this cell carries, so the next
/// cell of the same run skips it.
fn track_run(state: &mut CharacterState, cell: usize, ctx: &InteractCtx<'_>) {
    let game = ctx.map.game_tile(cell).id;
    let switch = ctx.map.switch_tile(cell).id;

    state.last_run_tile = if game == TILE_REFILL_JUMPS {
        Some(TILE_REFILL_JUMPS)
    } else if matches!(
        switch,
        TILE_JUMP_OVERRIDE | TILE_TIME_BONUS | TILE_TIME_PENALTY
    ) {
        Some(switch)
    } else {
        None
    };
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fixed::to_fixed;
    use crate::map::tiles::{SpeedupTile, SwitchTile, TeleTile};
    use crate::sim::state::MAX_ARMOR;

    fn test_map() -> MapGrid {
        MapGrid::from_ascii(&[
            "############",
            "#          #",
            "#          #",
            "#          #",
            "# o        #",
            "############",
        ])
    }

    fn ctx<'a>(map: &'a MapGrid, tick: u32) -> InteractCtx<'a> {
        InteractCtx {
            self_id: CharacterId(0),
            tick,
            team: Team(0),
            map,
            finished_exempt: false,
        }
    }

    fn character_at(map: &MapGrid, tx: i32, ty: i32) -> CharacterState {
        CharacterState::spawn(map.cell_center(map.index_of(tx, ty)))
    }

    #[test]
    fn test_freeze_tile_scenario() {
        // Unfrozen, non-super character crosses a freeze tile
        let mut map = test_map();
        map.set_game_tile(5, 2, Tile::new(TILE_FREEZE));

        let mut state = character_at(&map, 5, 2);
        state.armor = 7;
        let mut switches = SwitchTable::new();
        let mut rng = DeterministicRng::new(1);
        let mut events = Vec::new();

        let cell = map.index_of(5, 2);
        let outcome = apply(
            &mut state, &mut switches, &mut rng, &[cell], &ctx(&map, 100), &mut events,
        );

        assert_eq!(outcome, TileOutcome::Alive);
        assert_eq!(state.freeze_ticks_left, DEFAULT_FREEZE_TICKS);
        assert_eq!(state.freeze_start, Some(100));
        assert_eq!(state.armor, 0);

        // Unfreeze restores full armor
        state.unfreeze();
        assert_eq!(state.armor, MAX_ARMOR);
    }

    #[test]
    fn test_freeze_guarded_by_super() {
        let mut map = test_map();
        map.set_game_tile(5, 2, Tile::new(TILE_FREEZE));

        let mut state = character_at(&map, 5, 2);
        state.super_mode = true;
        let mut switches = SwitchTable::new();
        let mut rng = DeterministicRng::new(1);
        let mut events = Vec::new();

        let cell = map.index_of(5, 2);
        apply(&mut state, &mut switches, &mut rng, &[cell], &ctx(&map, 0), &mut events);
        assert!(!state.is_frozen());
    }

    #[test]
    fn test_death_tile_and_exemptions() {
        let mut map = test_map();
        map.set_game_tile(4, 2, Tile::new(TILE_DEATH));
        let cell = map.index_of(4, 2);
        let mut switches = SwitchTable::new();
        let mut rng = DeterministicRng::new(1);
        let mut events = Vec::new();

        let mut state = character_at(&map, 4, 2);
        let outcome = apply(
            &mut state, &mut switches, &mut rng, &[cell], &ctx(&map, 0), &mut events,
        );
        assert_eq!(outcome, TileOutcome::Dead(DeathCause::DeathTile));

        // Super walks over it
        let mut state = character_at(&map, 4, 2);
        state.super_mode = true;
        let outcome = apply(
            &mut state, &mut switches, &mut rng, &[cell], &ctx(&map, 0), &mut events,
        );
        assert_eq!(outcome, TileOutcome::Alive);

        // A finished team is exempt too
        let mut state = character_at(&map, 4, 2);
        let mut exempt_ctx = ctx(&map, 0);
        exempt_ctx.finished_exempt = true;
        let outcome = apply(
            &mut state, &mut switches, &mut rng, &[cell], &exempt_ctx, &mut events,
        );
        assert_eq!(outcome, TileOutcome::Alive);
    }

    #[test]
    fn test_out_of_map_is_terminal() {
        let map = test_map();
        let mut state = character_at(&map, 2, 2);
        state.pos = FixedVec2::from_ints(-500, -500);
        let mut switches = SwitchTable::new();
        let mut rng = DeterministicRng::new(1);
        let mut events = Vec::new();

        let outcome = apply(&mut state, &mut switches, &mut rng, &[], &ctx(&map, 0), &mut events);
        assert_eq!(outcome, TileOutcome::Dead(DeathCause::OutOfMap));
    }

    #[test]
    fn test_toggle_idempotent_within_tick() {
        let mut map = test_map();
        map.set_game_tile(3, 2, Tile::new(TILE_ENDLESS_HOOK_ON));
        let cell = map.index_of(3, 2);

        let mut state = character_at(&map, 3, 2);
        let mut switches = SwitchTable::new();
        let mut rng = DeterministicRng::new(1);
        let mut events = Vec::new();

        // Crossing the toggle twice in one tick
        apply(
            &mut state, &mut switches, &mut rng, &[cell, cell], &ctx(&map, 0), &mut events,
        );

        assert!(state.endless_hook);
        let notifications = events
            .iter()
            .filter(|e| matches!(e.data, CoreEventData::StatusToggled { .. }))
            .count();
        assert_eq!(notifications, 1, "second application must not re-notify");

        // Applying again later is a complete no-op
        events.clear();
        apply(&mut state, &mut switches, &mut rng, &[cell], &ctx(&map, 1), &mut events);
        assert!(state.endless_hook);
        assert!(events.is_empty());
    }

    #[test]
    fn test_stopper_zeroes_velocity() {
        let mut map = test_map();
        // Stopper facing up: blocks downward movement
        map.set_game_tile(6, 3, Tile::rotated(TILE_STOP, 0));
        let cell = map.index_of(6, 3);

        let mut state = character_at(&map, 6, 3);
        state.vel = FixedVec2::new(to_fixed(4.0), to_fixed(9.0));
        let mut switches = SwitchTable::new();
        let mut rng = DeterministicRng::new(1);
        let mut events = Vec::new();

        apply(&mut state, &mut switches, &mut rng, &[cell], &ctx(&map, 0), &mut events);
        assert_eq!(state.vel.x, to_fixed(4.0), "unrelated component untouched");
        assert_eq!(state.vel.y, 0, "component into the stopper zeroed");
    }

    #[test]
    fn test_speedup_blends_velocity() {
        let mut map = test_map();
        map.set_speedup_tile(7, 2, SpeedupTile { force: 8, max_speed: 12, angle: 0 });
        let cell = map.index_of(7, 2);

        let mut state = character_at(&map, 7, 2);
        let mut switches = SwitchTable::new();
        let mut rng = DeterministicRng::new(1);
        let mut events = Vec::new();

        apply(&mut state, &mut switches, &mut rng, &[cell], &ctx(&map, 0), &mut events);
        assert_eq!(state.vel.x, to_fixed(8.0));

        // A second pass caps along the direction instead of stacking
        apply(&mut state, &mut switches, &mut rng, &[cell], &ctx(&map, 1), &mut events);
        assert_eq!(state.vel.x, to_fixed(12.0));
    }

    #[test]
    fn test_switch_kinds_and_timed_revert() {
        let mut map = test_map();
        map.set_switch_tile(2, 2, SwitchTile { id: TILE_SWITCH_TIMED_OPEN, number: 4, delay: 2 });
        let cell = map.index_of(2, 2);

        let mut state = character_at(&map, 2, 2);
        let mut switches = SwitchTable::new();
        switches.register_team(Team(0));
        let mut rng = DeterministicRng::new(1);
        let mut events = Vec::new();

        assert!(!switches.is_active(4, Team(0)));
        apply(&mut state, &mut switches, &mut rng, &[cell], &ctx(&map, 10), &mut events);
        assert!(switches.is_active(4, Team(0)));

        // Timed open reverts after delay seconds
        switches.tick(10 + 2 * TICK_RATE + 1);
        assert!(!switches.is_active(4, Team(0)));
    }

    #[test]
    fn test_switch_gated_freeze() {
        let mut map = test_map();
        map.set_switch_tile(3, 3, SwitchTile { id: TILE_SWITCH_FREEZE, number: 2, delay: 4 });
        let cell = map.index_of(3, 3);

        let mut state = character_at(&map, 3, 3);
        let mut switches = SwitchTable::new();
        switches.register_team(Team(0));
        let mut rng = DeterministicRng::new(1);
        let mut events = Vec::new();

        // Switch 2 inactive: nothing happens
        apply(&mut state, &mut switches, &mut rng, &[cell], &ctx(&map, 0), &mut events);
        assert!(!state.is_frozen());

        // Activate and cross again
        switches.set_open(2, Team(0), 1, None);
        apply(&mut state, &mut switches, &mut rng, &[cell], &ctx(&map, 2), &mut events);
        assert_eq!(state.freeze_ticks_left, 4 * TICK_RATE);
    }

    #[test]
    fn test_jump_override_once_per_run() {
        let mut map = test_map();
        map.set_switch_tile(8, 2, SwitchTile { id: TILE_JUMP_OVERRIDE, number: 0, delay: 5 });
        let cell = map.index_of(8, 2);

        let mut state = character_at(&map, 8, 2);
        let mut switches = SwitchTable::new();
        let mut rng = DeterministicRng::new(1);
        let mut events = Vec::new();

        apply(&mut state, &mut switches, &mut rng, &[cell], &ctx(&map, 0), &mut events);
        assert_eq!(state.jumps, 5);

        // Still standing in the run: a later manual change sticks
        state.jumps = 3;
        apply(&mut state, &mut switches, &mut rng, &[cell], &ctx(&map, 1), &mut events);
        assert_eq!(state.jumps, 3, "same contiguous run applies once");
    }

    #[test]
    fn test_time_penalty_can_kill() {
        let mut map = test_map();
        map.set_switch_tile(9, 2, SwitchTile { id: TILE_TIME_PENALTY, number: 0, delay: 10 });
        let cell = map.index_of(9, 2);

        let mut state = character_at(&map, 9, 2);
        state.race_start_tick = Some(90);
        let mut switches = SwitchTable::new();
        let mut rng = DeterministicRng::new(1);
        let mut events = Vec::new();

        // 10s penalty at tick 100 with the race started at 90:
        // elapsed would be 10 - 500 ticks < 0
        let outcome = apply(
            &mut state, &mut switches, &mut rng, &[cell], &ctx(&map, 100), &mut events,
        );
        assert_eq!(outcome, TileOutcome::Dead(DeathCause::NegativeRaceTime));
    }

    #[test]
    fn test_plain_teleport_preserves_velocity() {
        let mut map = test_map();
        map.set_tele_tile(2, 1, TeleTile { id: TILE_TELE_IN, number: 7 });
        map.set_tele_tile(9, 3, TeleTile { id: crate::map::tiles::TILE_TELE_OUT, number: 7 });
        let cell = map.index_of(2, 1);

        let mut state = character_at(&map, 2, 1);
        state.vel = FixedVec2::new(to_fixed(6.0), to_fixed(-2.0));
        state.reset_flag = false;
        let mut switches = SwitchTable::new();
        let mut rng = DeterministicRng::new(1);
        let mut events = Vec::new();

        apply(&mut state, &mut switches, &mut rng, &[cell], &ctx(&map, 0), &mut events);

        assert_eq!(state.pos, map.cell_center(map.index_of(9, 3)));
        assert_eq!(state.vel, FixedVec2::new(to_fixed(6.0), to_fixed(-2.0)));
        assert!(state.reset_flag, "teleport is a discontinuous reset");
        assert!(events.iter().any(|e| matches!(e.data, CoreEventData::Teleported { .. })));
    }

    #[test]
    fn test_evil_teleport_resets_velocity_and_hook() {
        let mut map = test_map();
        map.set_tele_tile(2, 1, TeleTile { id: TILE_TELE_IN_EVIL, number: 7 });
        map.set_tele_tile(9, 3, TeleTile { id: crate::map::tiles::TILE_TELE_OUT, number: 7 });
        let cell = map.index_of(2, 1);

        let mut state = character_at(&map, 2, 1);
        state.vel = FixedVec2::new(to_fixed(6.0), to_fixed(-2.0));
        state.hook_state = crate::sim::state::HookState::Attached;
        state.hooked_player = Some(CharacterId(2));
        let mut switches = SwitchTable::new();
        let mut rng = DeterministicRng::new(1);
        let mut events = Vec::new();

        apply(&mut state, &mut switches, &mut rng, &[cell], &ctx(&map, 0), &mut events);

        assert_eq!(state.pos, map.cell_center(map.index_of(9, 3)));
        assert_eq!(state.vel, FixedVec2::ZERO);
        assert_eq!(state.hook_state, crate::sim::state::HookState::Idle);
        assert_eq!(state.hooked_player, None);
    }

    #[test]
    fn test_empty_teleport_group_is_noop() {
        let mut map = test_map();
        map.set_tele_tile(2, 1, TeleTile { id: TILE_TELE_IN, number: 9 }); // no outs
        let cell = map.index_of(2, 1);

        let mut state = character_at(&map, 2, 1);
        state.vel = FixedVec2::new(to_fixed(3.0), 0);
        let pos = state.pos;
        let mut switches = SwitchTable::new();
        let mut rng = DeterministicRng::new(1);
        let mut events = Vec::new();

        let outcome = apply(
            &mut state, &mut switches, &mut rng, &[cell], &ctx(&map, 0), &mut events,
        );
        assert_eq!(outcome, TileOutcome::Alive);
        assert_eq!(state.pos, pos, "position unchanged");
        assert_eq!(state.vel.x, to_fixed(3.0), "velocity unchanged");
    }

    #[test]
    fn test_checkpoint_teleport_walks_backward() {
        let mut map = test_map();
        map.set_tele_tile(2, 1, TeleTile { id: TILE_TELE_CHECK_IN, number: 0 });
        map.set_tele_tile(8, 1, TeleTile {
            id: crate::map::tiles::TILE_TELE_CHECK_OUT,
            number: 2,
        });
        let cell = map.index_of(2, 1);

        // Checkpoint 4 recorded, groups 4 and 3 empty, group 2 has an out
        let mut state = character_at(&map, 2, 1);
        state.last_checkpoint = 4;
        let mut switches = SwitchTable::new();
        let mut rng = DeterministicRng::new(1);
        let mut events = Vec::new();

        apply(&mut state, &mut switches, &mut rng, &[cell], &ctx(&map, 0), &mut events);
        assert_eq!(state.pos, map.cell_center(map.index_of(8, 1)));
    }

    #[test]
    fn test_checkpoint_teleport_falls_back_to_spawn() {
        let mut map = test_map(); // has a spawn at (2, 4)
        map.set_tele_tile(5, 1, TeleTile { id: TILE_TELE_CHECK_IN, number: 0 });
        let cell = map.index_of(5, 1);

        let mut state = character_at(&map, 5, 1);
        state.last_checkpoint = 3; // all groups empty
        let mut switches = SwitchTable::new();
        let mut rng = DeterministicRng::new(1);
        let mut events = Vec::new();

        apply(&mut state, &mut switches, &mut rng, &[cell], &ctx(&map, 0), &mut events);
        assert_eq!(state.pos, map.cell_center(map.index_of(2, 4)));
    }

    #[test]
    fn test_checkpoint_recording_is_monotonic() {
        let mut map = test_map();
        map.set_tele_tile(3, 1, TeleTile { id: TILE_TELE_CHECKPOINT, number: 5 });
        map.set_tele_tile(4, 1, TeleTile { id: TILE_TELE_CHECKPOINT, number: 2 });

        let mut state = character_at(&map, 3, 1);
        let mut switches = SwitchTable::new();
        let mut rng = DeterministicRng::new(1);
        let mut events = Vec::new();

        let cells = [map.index_of(3, 1), map.index_of(4, 1)];
        apply(&mut state, &mut switches, &mut rng, &cells, &ctx(&map, 0), &mut events);
        assert_eq!(state.last_checkpoint, 5, "lower checkpoint never regresses");
    }

    #[test]
    fn test_walljump_refills_when_falling_on_wall() {
        let mut map = test_map();
        // Wall-jump tile right next to the left wall
        map.set_game_tile(1, 2, Tile::new(TILE_WALLJUMP));
        let cell = map.index_of(1, 2);

        let mut state = character_at(&map, 1, 2);
        state.pos = FixedVec2::from_ints(32 + 15, 80); // box touching the wall
        state.vel = FixedVec2::new(0, to_fixed(5.0)); // falling
        state.jumps = 2;
        state.jumped_total = 2;
        state.jumped = JUMPED_DARK_FEET;
        let mut switches = SwitchTable::new();
        let mut rng = DeterministicRng::new(1);
        let mut events = Vec::new();

        apply(&mut state, &mut switches, &mut rng, &[cell], &ctx(&map, 0), &mut events);
        assert_eq!(state.jumped_total, 1, "exactly one jump handed back");
        assert!(!state.has_dark_feet());
    }

    #[test]
    fn test_tune_zone_tracks_cells() {
        let mut map = test_map();
        map.set_tune_zone(6, 2, 3);
        let cell = map.index_of(6, 2);

        let mut state = character_at(&map, 6, 2);
        let mut switches = SwitchTable::new();
        let mut rng = DeterministicRng::new(1);
        let mut events = Vec::new();

        apply(&mut state, &mut switches, &mut rng, &[cell], &ctx(&map, 0), &mut events);
        assert_eq!(state.tune_zone, 3);
    }
}
