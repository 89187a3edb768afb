//! Movement Integrator
//!
//! Advances one character's position, velocity, hook and weapon
//! sub-state by exactly one tick. Deterministic: identical arguments
//! produce bit-identical state and events, which is what the
//! dead-reckoning tracker and replay verification rely on.
//!
//! Other characters are only ever read through a [`WorldView`] built
//! from previous-tick state, and forces on them are emitted as
//! deferred [`CoreEventData::ForceOnOther`] events, so character
//! update order within a tick cannot change the outcome.

use tracing::debug;

use crate::core::fixed::{
    fixed_div, fixed_min, fixed_mul, saturated_add, to_fixed, Fixed, FIXED_ONE,
};
use crate::core::vec2::{closest_point_on_segment, FixedVec2};
use crate::map::collision::MapGrid;
use crate::sim::events::{CoreEvent, CoreEventData};
use crate::sim::input::CharacterInput;
use crate::sim::state::{
    clamp_velocity, CharacterId, CharacterState, HookState, WeaponKind, JUMPED_DARK_FEET,
    JUMPED_PRESSED, NINJA_DASH_TICKS, NINJA_DASH_VELOCITY, NINJA_DURATION_TICKS, TriggeredEvents,
    VELOCITY_CAP,
};
use crate::sim::tuning::{TuningSet, TuningZones};

/// Hook head must end up this close to a character to catch it.
const HOOK_CATCH_RADIUS: Fixed = to_fixed(30.0);

/// Ground hooks only drag beyond this rope length.
const HOOK_MIN_DRAG_DIST: Fixed = to_fixed(46.0);

/// Hammer blow center sits this far along the aim, in character sizes.
const HAMMER_REACH: Fixed = to_fixed(0.75);

/// Previous-tick view of one other character, with pairwise policies
/// (team, solo, toggles) already resolved by the world.
#[derive(Clone, Copy, Debug)]
pub struct OtherCharacter {
    /// Arena id.
    pub id: CharacterId,
    /// Position at the end of the previous tick.
    pub pos: FixedVec2,
    /// This character's hook may catch them.
    pub hookable: bool,
    /// Body collision applies between the two.
    pub collidable: bool,
    /// Hammer blows connect between the two.
    pub hittable: bool,
}

/// Read-only view of every *other* character, as of the previous tick.
#[derive(Clone, Copy, Debug, Default)]
pub struct WorldView<'a> {
    /// All other characters, in arena-id order.
    pub others: &'a [OtherCharacter],
}

impl<'a> WorldView<'a> {
    /// Look up a character by id.
    pub fn find(&self, id: CharacterId) -> Option<&OtherCharacter> {
        self.others.iter().find(|c| c.id == id)
    }
}

/// Everything `advance` reads besides the character itself.
pub struct AdvanceCtx<'a> {
    /// Id of the character being advanced.
    pub self_id: CharacterId,
    /// Current tick.
    pub tick: u32,
    /// Map/collision collaborator.
    pub map: &'a MapGrid,
    /// Per-zone physics constants.
    pub zones: &'a TuningZones,
    /// Previous-tick view of the other characters.
    pub view: WorldView<'a>,
}

/// Advance one character by one tick.
///
/// With `use_input == false` the input block (direction, aim, jump,
/// hook launch/release, weapons) is skipped entirely and the retained
/// state extrapolates - exactly what the reckoning shadow runs.
pub fn advance(
    state: &mut CharacterState,
    input: &CharacterInput,
    ctx: &AdvanceCtx<'_>,
    use_input: bool,
    events: &mut Vec<CoreEvent>,
) {
    let tuning = *ctx.zones.resolve(state.tune_zone);

    state.triggered_events.clear();

    // Freeze timer with auto-unfreeze
    if state.freeze_ticks_left > 0 {
        state.freeze_ticks_left -= 1;
        if state.freeze_ticks_left == 0 {
            state.unfreeze();
        }
    }

    state.move_restrictions = ctx.map.move_restrictions(state.pos);
    let grounded = is_grounded(ctx.map, state);

    state.vel.y = state.vel.y.wrapping_add(tuning.gravity);

    // Ground contact resets the airborne jump budget
    if grounded {
        state.jumped &= !JUMPED_DARK_FEET;
        state.jumped_total = 0;
    }
    refresh_feet(state);

    if use_input {
        handle_input(state, input, ctx, &tuning, grounded, events);
    }

    // Horizontal control from the retained direction; any freeze
    // blocks self-induced movement but not external forces
    let direction = if state.is_frozen() || state.live_frozen {
        0
    } else {
        (state.direction as i32).clamp(-1, 1)
    };

    let (control_speed, control_accel, friction) = if grounded {
        (
            tuning.ground_control_speed,
            tuning.ground_control_accel,
            tuning.ground_friction,
        )
    } else {
        (
            tuning.air_control_speed,
            tuning.air_control_accel,
            tuning.air_friction,
        )
    };

    match direction {
        d if d < 0 => {
            state.vel.x = saturated_add(-control_speed, control_speed, state.vel.x, -control_accel);
        }
        d if d > 0 => {
            state.vel.x = saturated_add(-control_speed, control_speed, state.vel.x, control_accel);
        }
        _ => state.vel.x = fixed_mul(state.vel.x, friction),
    }

    tick_ninja(state, ctx.tick);
    tick_hook(state, ctx, &tuning, events);
    tick_repulsion(state, ctx, &tuning);

    // Hard cap, then the stopper clamp, then the swept move
    state.vel.x = state.vel.x.clamp(-VELOCITY_CAP, VELOCITY_CAP);
    state.vel.y = state.vel.y.clamp(-VELOCITY_CAP, VELOCITY_CAP);
    state.vel = clamp_velocity(state.move_restrictions, state.vel);

    let (pos, vel) = ctx
        .map
        .move_box(state.pos, state.vel, state.half_size(), 0);
    state.pos = pos;
    state.vel = vel;

    // Geometric overlap after integration is a diagnostic, never fatal
    if ctx.map.test_box(state.pos, state.half_size()) {
        debug!(
            character = ctx.self_id.0,
            tick = ctx.tick,
            pos = %state.pos,
            "character overlaps solid geometry after move"
        );
    }
}

/// Feet probe: solid directly under either bottom corner.
pub fn is_grounded(map: &MapGrid, state: &CharacterState) -> bool {
    let half = state.half_size();
    let below = state.pos.y + half + to_fixed(5.0);
    map.check_point(FixedVec2::new(state.pos.x - half, below))
        || map.check_point(FixedVec2::new(state.pos.x + half, below))
}

/// Refresh the dark-feet bit from the jump budget.
fn refresh_feet(state: &mut CharacterState) {
    if state.super_mode || state.endless_jump {
        state.jumped &= !JUMPED_DARK_FEET;
        return;
    }

    let dark = match state.jumps {
        n if n <= 0 => true,
        1 => state.jumped_total > 0,
        n => state.jumped_total >= n,
    };

    if dark {
        state.jumped |= JUMPED_DARK_FEET;
    } else {
        state.jumped &= !JUMPED_DARK_FEET;
    }
}

/// The input block: direction, aim, jump, hook launch/release, weapons.
fn handle_input(
    state: &mut CharacterState,
    input: &CharacterInput,
    ctx: &AdvanceCtx<'_>,
    tuning: &TuningSet,
    grounded: bool,
    events: &mut Vec<CoreEvent>,
) {
    let frozen = state.is_frozen();

    let direction = if frozen || state.live_frozen {
        0
    } else {
        input.clamped_direction()
    };
    let jump_held = !frozen && !state.live_frozen && input.jump();
    let hook_held = !frozen && input.hook();
    let fire_held = !frozen && input.fire();

    state.direction = direction as i8;
    if !frozen {
        state.angle = input.aim_angle();
    }

    // Jump
    if jump_held {
        if state.jumped & JUMPED_PRESSED == 0 {
            if grounded && state.jumps != 0 {
                state.triggered_events.trigger(TriggeredEvents::GROUND_JUMP);
                state.vel.y = -tuning.ground_jump_impulse;
                state.jumped |= JUMPED_PRESSED;
                state.jumped_total += 1;
            } else if air_jump_available(state) {
                state.triggered_events.trigger(TriggeredEvents::AIR_JUMP);
                state.vel.y = -tuning.air_jump_impulse;
                state.jumped |= JUMPED_PRESSED | JUMPED_DARK_FEET;
                state.jumped_total += 1;
            }
        }
    } else {
        state.jumped &= !JUMPED_PRESSED;
    }

    // Hook launch / release
    if hook_held {
        if state.hook_state == HookState::Idle {
            let aim = input.aim_direction();
            state.hook_state = HookState::Flying;
            state.hook_pos = state
                .pos
                .add(aim.scale(fixed_mul(state.size, to_fixed(1.5))));
            state.hook_dir = aim;
            state.triggered_events.trigger(TriggeredEvents::HOOK_LAUNCH);
        }
    } else if state.hook_state != HookState::Idle {
        state.release_hook();
    }

    handle_weapons(state, input, ctx, tuning, fire_held, events);
    state.fire_was_held = fire_held;
}

/// Air jump gate: unlimited budget always passes, otherwise light feet
/// are required.
fn air_jump_available(state: &CharacterState) -> bool {
    state.jumps == -1 || state.jumped & JUMPED_DARK_FEET == 0
}

/// Weapon switching, firing, reload countdown, jetpack thrust.
fn handle_weapons(
    state: &mut CharacterState,
    input: &CharacterInput,
    ctx: &AdvanceCtx<'_>,
    tuning: &TuningSet,
    fire_held: bool,
    events: &mut Vec<CoreEvent>,
) {
    if state.reload_ticks > 0 {
        state.reload_ticks -= 1;
    }

    // Weapon switch; the ninja locks its slot and frozen hands can't
    if state.ninja.is_none() && !state.is_frozen() && input.wanted_weapon != 0 {
        if let Some(wanted) = WeaponKind::from_index(input.wanted_weapon - 1) {
            if state.weapons[wanted as usize].got {
                state.active_weapon = wanted;
            }
        }
    }

    let weapon = state.active_weapon;
    let aim = input.aim_direction();

    // Jetpack: reverse thrust every tick while firing the gun with ammo
    if state.jetpack
        && weapon == WeaponKind::Gun
        && fire_held
        && state.active_slot().ammo != Some(0)
    {
        let thrust = aim.scale(tuning.jetpack_strength).negate();
        state.vel = state.vel.add(thrust);
    }

    let full_auto = weapon.is_full_auto() || (weapon == WeaponKind::Gun && state.jetpack);
    let fire_pressed = fire_held && !state.fire_was_held;
    let wants_fire = fire_pressed || (full_auto && fire_held);

    if !wants_fire || state.reload_ticks > 0 {
        return;
    }
    if state.active_slot().ammo == Some(0) {
        return;
    }

    match weapon {
        WeaponKind::Hammer => {
            if state.can_hit_others {
                fire_hammer(state, ctx, tuning, aim, events);
            }
            events.push(CoreEvent::weapon_fired(
                ctx.tick, ctx.self_id, weapon, state.pos, aim,
            ));
        }
        WeaponKind::Ninja => {
            if let Some(ninja) = &mut state.ninja {
                ninja.direction = aim;
                ninja.old_vel_amount = state.vel.length();
                ninja.dash_ticks_left = NINJA_DASH_TICKS;
            }
            events.push(CoreEvent::weapon_fired(
                ctx.tick, ctx.self_id, weapon, state.pos, aim,
            ));
        }
        _ => {
            // Projectile and beam weapons: spawning is delegated
            events.push(CoreEvent::weapon_fired(
                ctx.tick, ctx.self_id, weapon, state.pos, aim,
            ));
        }
    }

    if let Some(ammo) = &mut state.weapons[weapon as usize].ammo {
        *ammo = ammo.saturating_sub(1);
    }
    state.reload_ticks = weapon.fire_delay_ticks();
}

/// Hammer blow: hit every target in reach, pushing them up and away.
fn fire_hammer(
    state: &CharacterState,
    ctx: &AdvanceCtx<'_>,
    tuning: &TuningSet,
    aim: FixedVec2,
    events: &mut Vec<CoreEvent>,
) {
    let blow_center = state
        .pos
        .add(aim.scale(fixed_mul(state.size, HAMMER_REACH)));

    for other in ctx.view.others {
        if !other.hittable {
            continue;
        }
        // Exact distance: targets can be anywhere on the map
        if other.pos.distance(blow_center) > state.size {
            continue;
        }

        // Push up and away from the blow
        let delta = other.pos.sub(blow_center);
        let away = if delta.length_squared() > 0 {
            delta.normalize()
        } else {
            aim
        };
        let lift = away.add(FixedVec2::new(0, to_fixed(-1.1))).normalize();
        let force = FixedVec2::new(0, -FIXED_ONE)
            .add(lift.scale(to_fixed(10.0)))
            .scale(tuning.hammer_strength);

        events.push(CoreEvent::new(
            ctx.tick,
            ctx.self_id,
            CoreEventData::HammerHit { target: other.id },
        ));
        events.push(CoreEvent::force_on_other(
            ctx.tick,
            ctx.self_id,
            other.id,
            force,
            VELOCITY_CAP,
        ));
    }
}

/// Ninja expiry and dash continuation, input-independent.
fn tick_ninja(state: &mut CharacterState, tick: u32) {
    let Some(ninja) = &mut state.ninja else {
        return;
    };

    if tick.saturating_sub(ninja.activation_tick) > NINJA_DURATION_TICKS {
        state.active_weapon = ninja.previous_weapon;
        state.weapons[WeaponKind::Ninja as usize].got = false;
        state.ninja = None;
        return;
    }

    if ninja.dash_ticks_left > 0 {
        ninja.dash_ticks_left -= 1;
        if ninja.dash_ticks_left == 0 {
            // Dash over: keep moving in the dash direction at the
            // speed the character had before it
            state.vel = ninja.direction.scale(ninja.old_vel_amount);
        } else {
            state.vel = ninja.direction.scale(NINJA_DASH_VELOCITY);
        }
    }
}

/// Hook physics: flight, attachment, retraction, drag.
fn tick_hook(
    state: &mut CharacterState,
    ctx: &AdvanceCtx<'_>,
    tuning: &TuningSet,
    events: &mut Vec<CoreEvent>,
) {
    match state.hook_state {
        HookState::Idle => {
            state.hook_pos = state.pos;
        }

        HookState::Retracting => {
            state.triggered_events.trigger(TriggeredEvents::HOOK_RETRACT);
            state.release_hook();
        }

        HookState::Flying => {
            let mut new_pos = state
                .hook_pos
                .add(state.hook_dir.scale(tuning.hook_fire_speed));
            let mut going_to_retract = false;
            let mut going_to_hit_ground = false;

            // Rope length limit
            if state.pos.distance(new_pos) > tuning.hook_length {
                going_to_retract = true;
                let dir = new_pos.sub(state.pos).normalize();
                new_pos = state.pos.add(dir.scale(tuning.hook_length));
            }

            // Ground contact along the flight path
            if let Some(hit) = ctx.map.intersect_line(state.hook_pos, new_pos) {
                if hit.tile.is_hook_blocker() {
                    going_to_retract = true;
                    state
                        .triggered_events
                        .trigger(TriggeredEvents::HOOK_HIT_NOHOOK);
                } else {
                    going_to_hit_ground = true;
                }
                new_pos = hit.before_pos;
            }

            // Character contact along the flight path; closest target
            // to the owner wins
            let mut caught: Option<(CharacterId, FixedVec2, Fixed)> = None;
            if tuning.player_hooking && state.can_hook_others {
                for other in ctx.view.others {
                    if !other.hookable {
                        continue;
                    }
                    let closest =
                        closest_point_on_segment(state.hook_pos, new_pos, other.pos);
                    if other.pos.distance(closest) >= HOOK_CATCH_RADIUS {
                        continue;
                    }
                    let owner_dist = state.pos.distance(other.pos);
                    if caught.is_none_or(|(_, _, best)| owner_dist < best) {
                        caught = Some((other.id, other.pos, owner_dist));
                    }
                }
            }

            if let Some((id, pos, _)) = caught {
                state
                    .triggered_events
                    .trigger(TriggeredEvents::HOOK_ATTACH_PLAYER);
                state.hook_state = HookState::Attached;
                state.hooked_player = Some(id);
                state.hook_pos = pos;
                state.hook_tick = 0;
            } else if going_to_hit_ground {
                state
                    .triggered_events
                    .trigger(TriggeredEvents::HOOK_ATTACH_GROUND);
                state.hook_state = HookState::Attached;
                state.hook_pos = new_pos;
            } else if going_to_retract {
                state.hook_state = HookState::Retracting;
                state.hook_pos = new_pos;
            } else {
                state.hook_pos = new_pos;
            }
        }

        HookState::Attached => {
            if let Some(target) = state.hooked_player {
                match ctx.view.find(target) {
                    Some(other) => state.hook_pos = other.pos,
                    None => {
                        // Stale weak reference: target disconnected,
                        // clear defensively and carry on
                        state.release_hook();
                        return;
                    }
                }

                // Player hooks auto-release after their hold time
                state.hook_tick += 1;
                if !state.endless_hook && state.hook_tick > tuning.hook_duration_ticks {
                    state.release_hook();
                    return;
                }

                drag_hooked_player(state, ctx, tuning, events);
            } else {
                drag_toward_anchor(state, tuning);
            }
        }
    }
}

/// Ground anchor drag: pull the owner toward the hook position.
fn drag_toward_anchor(state: &mut CharacterState, tuning: &TuningSet) {
    if state.pos.distance(state.hook_pos) <= HOOK_MIN_DRAG_DIST {
        return;
    }

    let mut hook_vel = state
        .hook_pos
        .sub(state.pos)
        .normalize()
        .scale(tuning.hook_drag_accel);

    // More power upward than downward, so climbing onto ledges works
    if hook_vel.y > 0 {
        hook_vel.y = fixed_mul(hook_vel.y, to_fixed(0.3));
    }

    // Boost when pulling the way the player steers, dampen otherwise
    let steering_with = (hook_vel.x < 0 && state.direction < 0)
        || (hook_vel.x > 0 && state.direction > 0);
    hook_vel.x = fixed_mul(
        hook_vel.x,
        if steering_with { to_fixed(0.95) } else { to_fixed(0.75) },
    );

    let new_vel = state.vel.add(hook_vel);

    // Only accept the pull while under the drag speed limit, or when
    // it slows us down
    if new_vel.length() < tuning.hook_drag_speed || new_vel.length() < state.vel.length() {
        state.vel = new_vel;
    }
}

/// Player hook drag: strong pull on the hooked character (deferred),
/// gentle counter-pull on the owner (immediate).
fn drag_hooked_player(
    state: &mut CharacterState,
    ctx: &AdvanceCtx<'_>,
    tuning: &TuningSet,
    events: &mut Vec<CoreEvent>,
) {
    let Some(target) = state.hooked_player else {
        return;
    };

    let dist = state.pos.distance(state.hook_pos);
    if dist <= fixed_mul(state.size, to_fixed(1.5)) {
        return;
    }

    let toward_owner = state.pos.sub(state.hook_pos).normalize();
    let accel = fixed_mul(
        tuning.hook_drag_accel,
        fixed_min(fixed_div(dist, tuning.hook_length), FIXED_ONE),
    );

    // The hooked character takes the strong pull, applied by the world
    // after every integration
    events.push(CoreEvent::force_on_other(
        ctx.tick,
        ctx.self_id,
        target,
        toward_owner.scale(fixed_mul(accel, to_fixed(1.5))),
        tuning.hook_drag_speed,
    ));

    // The owner gets a quarter of it, toward the target
    let self_pull = toward_owner.scale(fixed_mul(accel, to_fixed(0.25)));
    state.vel.x = saturated_add(
        -tuning.hook_drag_speed,
        tuning.hook_drag_speed,
        state.vel.x,
        -self_pull.x,
    );
    state.vel.y = saturated_add(
        -tuning.hook_drag_speed,
        tuning.hook_drag_speed,
        state.vel.y,
        -self_pull.y,
    );
}

/// Body contact with other characters pushes this one away.
fn tick_repulsion(state: &mut CharacterState, ctx: &AdvanceCtx<'_>, tuning: &TuningSet) {
    if !tuning.player_collision || !state.can_collide {
        return;
    }

    let contact_dist = fixed_mul(state.size, to_fixed(1.25));
    for other in ctx.view.others {
        if !other.collidable {
            continue;
        }

        let dist = state.pos.distance(other.pos);
        if dist == 0 || dist >= contact_dist {
            continue;
        }

        let away = state.pos.sub(other.pos).normalize();
        let overlap = fixed_mul(state.size, to_fixed(1.45)).wrapping_sub(dist);

        // Push harder the more we are moving into the contact
        let speed = state.vel.length();
        let factor = if speed > 0 {
            let toward = state.vel.div_scalar(speed).dot(away);
            FIXED_ONE - ((toward + FIXED_ONE) >> 1)
        } else {
            to_fixed(0.5)
        };

        state.vel = state
            .vel
            .add(away.scale(fixed_mul(overlap, fixed_mul(factor, to_fixed(0.75)))));
        state.vel = state.vel.scale(to_fixed(0.85));
    }
}

// =============================================================================
// TESTS
// =============================================================================
