//! Snapshot Builder
//!
//! Converts authoritative/reckoned state into the per-viewer visible
//! projection. Decides *values* and *visibility* only; wire bit-widths
//! and field ordering belong to the serialization layer.

use serde::{Deserialize, Serialize};

use crate::core::fixed::{from_int, Fixed};
use crate::core::hash::{StateHasher, StateHash};
use crate::core::vec2::FixedVec2;
use crate::sim::input::InputHistory;
use crate::sim::reckoning::{ReckoningOutput, SendCore};
use crate::sim::state::{CharacterId, CharacterState, WeaponKind};
use crate::TICK_RATE;

/// Horizontal half-extent of a viewer's field of view.
const SHOW_DISTANCE_X: Fixed = from_int(1000);
/// Vertical half-extent of a viewer's field of view.
const SHOW_DISTANCE_Y: Fixed = from_int(800);

/// Idle characters blink every five seconds.
const IDLE_BLINK_PERIOD: u32 = 5 * TICK_RATE;
/// Length of one idle blink.
const IDLE_BLINK_TICKS: u32 = 7;

/// Wire protocol revisions that change value representation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ProtocolVersion {
    /// Pre-placeholder clients: 16-bit coordinates, no frozen-weapon
    /// substitution.
    Legacy,
    /// Current clients.
    Current,
}

/// Per-viewer policy for showing characters outside the own team.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShowOthers {
    /// Only the viewer's own character and collision-exempt characters.
    Off,
    /// Teammates and collision-exempt characters.
    OnlyTeam,
    /// Everyone.
    All,
}

/// Emote shown on a character's face.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Emote {
    /// Regular face.
    Normal,
    /// Eyes closed; the AFK/paused/frozen/idle placeholder.
    Blink,
}

/// Everything the world knows about the snapped character that is not
/// in `CharacterState`.
#[derive(Clone, Copy, Debug, Default)]
pub struct SnapMeta {
    /// Player has not sent input for a while.
    pub afk: bool,
    /// Character is paused (out of the spatial index).
    pub paused: bool,
    /// Administratively hidden.
    pub concealed: bool,
}

/// The character being snapped, bundled for the builder.
pub struct SnapInput<'a> {
    /// Arena id of the character.
    pub id: CharacterId,
    /// Authoritative state.
    pub state: &'a CharacterState,
    /// What the reckoning tracker chose to reference this tick.
    pub reckoning: ReckoningOutput,
    /// World-side metadata.
    pub meta: SnapMeta,
    /// Hook heads of characters attached to this one; they can pull
    /// the character into view.
    pub attached_hooks: &'a [FixedVec2],
}

/// The viewer the projection is built for.
#[derive(Clone, Copy, Debug)]
pub struct ViewerContext {
    /// Viewer's own character id.
    pub viewer: CharacterId,
    /// Center of the viewer's camera.
    pub view_pos: FixedVec2,
    /// Wire protocol the viewer speaks.
    pub protocol: ProtocolVersion,
    /// Team visibility policy.
    pub show_others: ShowOthers,
    /// Viewer and snapped character share a team.
    pub same_team: bool,
    /// Pairwise collision exemption from the team collaborator.
    pub can_collide: bool,
    /// Viewer is an authorized spectator of the snapped character.
    pub spectates_owner: bool,
}

/// Remaining wire slots for one viewer this tick.
///
/// When the budget is out, characters are silently skipped; a partial
/// or retried snapshot is never produced.
#[derive(Clone, Copy, Debug)]
pub struct SnapBudget {
    remaining: usize,
}

impl SnapBudget {
    /// Budget with a fixed number of slots.
    pub fn new(slots: usize) -> Self {
        Self { remaining: slots }
    }

    /// Take one slot; `false` = exhausted.
    pub fn try_take(&mut self) -> bool {
        if self.remaining == 0 {
            return false;
        }
        self.remaining -= 1;
        true
    }
}

/// One character as one viewer sees it this tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterSnap {
    /// Arena id.
    pub id: CharacterId,
    /// 0 = extrapolate from `core`; else the tick of the forced resync.
    pub reference_tick: u32,
    /// Quantized movement core.
    pub core: SendCore,
    /// Hearts; zeroed for strangers.
    pub health: i32,
    /// Shields; zeroed for strangers.
    pub armor: i32,
    /// Active-weapon ammo; zeroed for strangers, -1 = unlimited.
    pub ammo: i32,
    /// Displayed weapon.
    pub weapon: WeaponKind,
    /// Displayed emote.
    pub emote: Emote,
    /// Ticks of freeze left, derived at build time, never stored.
    pub freeze_ticks_remaining: u32,
}

/// Build the visible projection of a character for one viewer.
///
/// Returns `None` when the viewer cannot see the character or when the
/// slot budget is exhausted.
pub fn build(
    snapped: &SnapInput<'_>,
    viewer: &ViewerContext,
    tick: u32,
    budget: &mut SnapBudget,
) -> Option<CharacterSnap> {
    let state = snapped.state;
    let is_owner = viewer.viewer == snapped.id;

    // Visibility gating
    if !is_owner {
        if snapped.meta.concealed {
            return None;
        }
        if !in_field_of_view(snapped, viewer) {
            return None;
        }
        let policy_allows = match viewer.show_others {
            ShowOthers::All => true,
            ShowOthers::OnlyTeam => viewer.same_team || viewer.can_collide,
            ShowOthers::Off => viewer.can_collide,
        };
        if !policy_allows {
            return None;
        }
    }

    // Slot exhaustion skips the character, silently
    if !budget.try_take() {
        return None;
    }

    let mut core = snapped.reckoning.core;
    let privileged = is_owner || viewer.spectates_owner;

    // Privacy transform: strangers learn nothing about resources
    let (health, armor, ammo) = if privileged {
        let ammo = match state.active_slot().ammo {
            Some(n) => n as i32,
            None => -1,
        };
        (state.health, state.armor, ammo)
    } else {
        (0, 0, 0)
    };

    // Frozen characters display the ninja placeholder on new clients
    let weapon = if state.is_frozen() && viewer.protocol >= ProtocolVersion::Current {
        WeaponKind::Ninja
    } else {
        state.active_weapon
    };

    let emote = derive_emote(state, &snapped.meta, tick);

    // Per-protocol clamping of the quantized core
    if viewer.protocol == ProtocolVersion::Legacy {
        core.x = core.x.clamp(i16::MIN as i32, i16::MAX as i32);
        core.y = core.y.clamp(i16::MIN as i32, i16::MAX as i32);
    }
    let ammo = ammo.clamp(-1, 10);

    Some(CharacterSnap {
        id: snapped.id,
        reference_tick: snapped.reckoning.reference_tick,
        core,
        health,
        armor,
        ammo,
        weapon,
        emote,
        freeze_ticks_remaining: state.freeze_ticks_left,
    })
}

/// A character is in view when its body is inside the viewer's show
/// distance, or when its own hook or any hook attached to it reaches
/// inside.
fn in_field_of_view(snapped: &SnapInput<'_>, viewer: &ViewerContext) -> bool {
    if point_in_view(snapped.state.pos, viewer.view_pos) {
        return true;
    }
    if point_in_view(snapped.state.hook_pos, viewer.view_pos) {
        return true;
    }
    snapped
        .attached_hooks
        .iter()
        .any(|hook| point_in_view(*hook, viewer.view_pos))
}

fn point_in_view(point: FixedVec2, view_pos: FixedVec2) -> bool {
    let dx = point.x.wrapping_sub(view_pos.x);
    let dy = point.y.wrapping_sub(view_pos.y);
    dx.abs() <= SHOW_DISTANCE_X && dy.abs() <= SHOW_DISTANCE_Y
}

/// Emote override ladder: any suppressed state blinks, and idle
/// characters blink periodically.
fn derive_emote(state: &CharacterState, meta: &SnapMeta, tick: u32) -> Emote {
    if meta.afk || meta.paused || state.is_frozen() || state.live_frozen {
        return Emote::Blink;
    }
    if tick % IDLE_BLINK_PERIOD < IDLE_BLINK_TICKS {
        return Emote::Blink;
    }
    Emote::Normal
}

// =============================================================================
// ANTI-CHEAT TELEMETRY
// =============================================================================

/// The anti-cheat export for one character: raw kinematics plus the
/// recent input history, checksummed so the backend can detect
/// tampering in transit.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TelemetrySample {
    /// Tick the sample was taken.
    pub tick: u32,
    /// Character the sample describes.
    pub id: CharacterId,
    /// Position in whole pixels.
    pub x: i32,
    /// Position in whole pixels.
    pub y: i32,
    /// Velocity in 1/256 steps.
    pub vel_x: i32,
    /// Velocity in 1/256 steps.
    pub vel_y: i32,
    /// Aim angle in 1/256 radian steps.
    pub angle: i32,
    /// Hooked character id, -1 when none.
    pub hooked_target: i32,
    /// Recent raw inputs, oldest first: (tick, direction, target_x,
    /// target_y, flags).
    pub inputs: Vec<(u32, i8, i32, i32, u8)>,
    /// Integrity checksum over every field above.
    pub checksum: StateHash,
}

/// Export the anti-cheat sample for one character.
pub fn telemetry(
    id: CharacterId,
    state: &CharacterState,
    history: &InputHistory,
    tick: u32,
) -> TelemetrySample {
    let core = SendCore::project(state);
    let inputs: Vec<(u32, i8, i32, i32, u8)> = history
        .chronological()
        .into_iter()
        .map(|(t, input)| (t, input.direction, input.target_x, input.target_y, input.flags))
        .collect();

    let mut hasher = StateHasher::for_telemetry();
    hasher.update_u32(tick);
    hasher.update_u32(id.0);
    hasher.update_i32(core.x);
    hasher.update_i32(core.y);
    hasher.update_i32(core.vel_x);
    hasher.update_i32(core.vel_y);
    hasher.update_i32(core.angle);
    hasher.update_i32(core.hooked_player);
    for (t, direction, tx, ty, flags) in &inputs {
        hasher.update_u32(*t);
        hasher.update_i32(*direction as i32);
        hasher.update_i32(*tx);
        hasher.update_i32(*ty);
        hasher.update_u8(*flags);
    }

    TelemetrySample {
        tick,
        id,
        x: core.x,
        y: core.y,
        vel_x: core.vel_x,
        vel_y: core.vel_y,
        angle: core.angle,
        hooked_target: core.hooked_player,
        inputs,
        checksum: hasher.finalize(),
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::input::CharacterInput;
    use crate::sim::state::MAX_HEALTH;

    fn snapped_state(pos: FixedVec2) -> CharacterState {
        let mut state = CharacterState::spawn(pos);
        state.health = 8;
        state.armor = 3;
        state
    }

    fn reckoning_for(state: &CharacterState) -> ReckoningOutput {
        ReckoningOutput {
            reference_tick: 0,
            core: SendCore::project(state),
        }
    }

    fn viewer(id: u32, view_pos: FixedVec2) -> ViewerContext {
        ViewerContext {
            viewer: CharacterId(id),
            view_pos,
            protocol: ProtocolVersion::Current,
            show_others: ShowOthers::All,
            same_team: true,
            can_collide: true,
            spectates_owner: false,
        }
    }

    #[test]
    fn test_owner_sees_own_resources() {
        let pos = FixedVec2::from_ints(100, 100);
        let state = snapped_state(pos);
        let input = SnapInput {
            id: CharacterId(1),
            state: &state,
            reckoning: reckoning_for(&state),
            meta: SnapMeta::default(),
            attached_hooks: &[],
        };
        let mut budget = SnapBudget::new(16);

        let snap = build(&input, &viewer(1, pos), 100, &mut budget).unwrap();
        assert_eq!(snap.health, 8);
        assert_eq!(snap.armor, 3);
        assert_eq!(snap.ammo, 10, "gun starts with 10 rounds");
    }

    #[test]
    fn test_stranger_resources_zeroed() {
        let pos = FixedVec2::from_ints(100, 100);
        let state = snapped_state(pos);
        let input = SnapInput {
            id: CharacterId(1),
            state: &state,
            reckoning: reckoning_for(&state),
            meta: SnapMeta::default(),
            attached_hooks: &[],
        };
        let mut budget = SnapBudget::new(16);

        let snap = build(&input, &viewer(2, pos), 100, &mut budget).unwrap();
        assert_eq!(snap.health, 0);
        assert_eq!(snap.armor, 0);
        assert_eq!(snap.ammo, 0);
    }

    #[test]
    fn test_authorized_spectator_sees_resources() {
        let pos = FixedVec2::from_ints(100, 100);
        let state = snapped_state(pos);
        let input = SnapInput {
            id: CharacterId(1),
            state: &state,
            reckoning: reckoning_for(&state),
            meta: SnapMeta::default(),
            attached_hooks: &[],
        };
        let mut budget = SnapBudget::new(16);

        let mut spectator = viewer(2, pos);
        spectator.spectates_owner = true;
        let snap = build(&input, &spectator, 100, &mut budget).unwrap();
        assert_eq!(snap.health, 8);
    }

    #[test]
    fn test_show_others_off_hides_without_exemption() {
        // Scenario: different team, show-others off, no collision
        // exemption -> invisible
        let pos = FixedVec2::from_ints(100, 100);
        let state = snapped_state(pos);
        let input = SnapInput {
            id: CharacterId(1),
            state: &state,
            reckoning: reckoning_for(&state),
            meta: SnapMeta::default(),
            attached_hooks: &[],
        };
        let mut budget = SnapBudget::new(16);

        let mut hostile = viewer(2, pos);
        hostile.show_others = ShowOthers::Off;
        hostile.same_team = false;
        hostile.can_collide = false;
        assert!(build(&input, &hostile, 100, &mut budget).is_none());

        // The collision exemption reveals the character again
        hostile.can_collide = true;
        assert!(build(&input, &hostile, 100, &mut budget).is_some());
    }

    #[test]
    fn test_only_team_policy() {
        let pos = FixedVec2::from_ints(100, 100);
        let state = snapped_state(pos);
        let input = SnapInput {
            id: CharacterId(1),
            state: &state,
            reckoning: reckoning_for(&state),
            meta: SnapMeta::default(),
            attached_hooks: &[],
        };
        let mut budget = SnapBudget::new(16);

        let mut v = viewer(2, pos);
        v.show_others = ShowOthers::OnlyTeam;
        v.same_team = false;
        v.can_collide = false;
        assert!(build(&input, &v, 100, &mut budget).is_none());

        v.same_team = true;
        assert!(build(&input, &v, 100, &mut budget).is_some());
    }

    #[test]
    fn test_concealed_hidden_from_others_not_owner() {
        let pos = FixedVec2::from_ints(100, 100);
        let state = snapped_state(pos);
        let meta = SnapMeta { concealed: true, ..Default::default() };
        let input = SnapInput {
            id: CharacterId(1),
            state: &state,
            reckoning: reckoning_for(&state),
            meta,
            attached_hooks: &[],
        };
        let mut budget = SnapBudget::new(16);

        assert!(build(&input, &viewer(2, pos), 100, &mut budget).is_none());
        assert!(build(&input, &viewer(1, pos), 100, &mut budget).is_some());
    }

    #[test]
    fn test_field_of_view_clipping() {
        let pos = FixedVec2::from_ints(100, 100);
        let state = snapped_state(pos);
        let input = SnapInput {
            id: CharacterId(1),
            state: &state,
            reckoning: reckoning_for(&state),
            meta: SnapMeta::default(),
            attached_hooks: &[],
        };
        let mut budget = SnapBudget::new(16);

        // Far away viewer: clipped
        let far = viewer(2, FixedVec2::from_ints(5000, 100));
        assert!(build(&input, &far, 100, &mut budget).is_none());

        // Near viewer: visible
        let near = viewer(2, FixedVec2::from_ints(600, 100));
        assert!(build(&input, &near, 100, &mut budget).is_some());
    }

    #[test]
    fn test_attached_hook_pulls_into_view() {
        let pos = FixedVec2::from_ints(100, 100);
        let state = snapped_state(pos);
        // A hook attached to this character reaches into the viewer's
        // screen even though the body is far away
        let hooks = [FixedVec2::from_ints(4500, 100)];
        let input = SnapInput {
            id: CharacterId(1),
            state: &state,
            reckoning: reckoning_for(&state),
            meta: SnapMeta::default(),
            attached_hooks: &hooks,
        };
        let mut budget = SnapBudget::new(16);

        let far = viewer(2, FixedVec2::from_ints(5000, 100));
        assert!(build(&input, &far, 100, &mut budget).is_some());
    }

    #[test]
    fn test_budget_exhaustion_skips_silently() {
        let pos = FixedVec2::from_ints(100, 100);
        let state = snapped_state(pos);
        let input = SnapInput {
            id: CharacterId(1),
            state: &state,
            reckoning: reckoning_for(&state),
            meta: SnapMeta::default(),
            attached_hooks: &[],
        };

        let mut budget = SnapBudget::new(1);
        assert!(build(&input, &viewer(2, pos), 100, &mut budget).is_some());
        assert!(
            build(&input, &viewer(2, pos), 100, &mut budget).is_none(),
            "no slots left: character skipped"
        );
    }

    #[test]
    fn test_frozen_weapon_placeholder_gated_by_protocol() {
        let pos = FixedVec2::from_ints(100, 100);
        let mut state = snapped_state(pos);
        state.freeze_for(150, 90);
        let input = SnapInput {
            id: CharacterId(1),
            state: &state,
            reckoning: reckoning_for(&state),
            meta: SnapMeta::default(),
            attached_hooks: &[],
        };
        let mut budget = SnapBudget::new(16);

        let current = viewer(2, pos);
        let snap = build(&input, &current, 100, &mut budget).unwrap();
        assert_eq!(snap.weapon, WeaponKind::Ninja, "placeholder while frozen");
        assert_eq!(snap.freeze_ticks_remaining, 150);
        assert_eq!(snap.emote, Emote::Blink, "frozen face blinks");

        let mut legacy = viewer(2, pos);
        legacy.protocol = ProtocolVersion::Legacy;
        let snap = build(&input, &legacy, 100, &mut budget).unwrap();
        assert_eq!(snap.weapon, WeaponKind::Gun, "legacy clients keep the real weapon");
    }

    #[test]
    fn test_legacy_coordinate_clamp() {
        let pos = FixedVec2::from_ints(100, 100);
        let state = snapped_state(pos);

        // A reference core past the 16-bit range (e.g. after an
        // extreme teleport) must be clamped for legacy clients
        let mut reckoning = reckoning_for(&state);
        reckoning.core.x = 100_000;
        reckoning.core.y = -100_000;

        let input = SnapInput {
            id: CharacterId(1),
            state: &state,
            reckoning,
            meta: SnapMeta::default(),
            attached_hooks: &[],
        };
        let mut budget = SnapBudget::new(16);

        let mut legacy = viewer(1, pos);
        legacy.protocol = ProtocolVersion::Legacy;
        let snap = build(&input, &legacy, 100, &mut budget).unwrap();
        assert_eq!(snap.core.x, i16::MAX as i32);
        assert_eq!(snap.core.y, i16::MIN as i32);

        // Current clients get the raw value
        let current = viewer(1, pos);
        let snap = build(&input, &current, 100, &mut budget).unwrap();
        assert_eq!(snap.core.x, 100_000);
    }

    #[test]
    fn test_idle_blink_period() {
        let pos = FixedVec2::from_ints(100, 100);
        let state = snapped_state(pos);
        let meta = SnapMeta::default();

        // Inside the blink window
        assert_eq!(derive_emote(&state, &meta, 0), Emote::Blink);
        assert_eq!(derive_emote(&state, &meta, IDLE_BLINK_PERIOD), Emote::Blink);
        // Outside it
        assert_eq!(derive_emote(&state, &meta, 100), Emote::Normal);

        // AFK blinks regardless of phase
        let afk = SnapMeta { afk: true, ..Default::default() };
        assert_eq!(derive_emote(&state, &afk, 100), Emote::Blink);
    }

    #[test]
    fn test_telemetry_checksum_detects_tampering() {
        let pos = FixedVec2::from_ints(100, 100);
        let mut state = snapped_state(pos);
        state.health = MAX_HEALTH;

        let mut history = InputHistory::new();
        let mut input = CharacterInput::empty();
        input.direction = 1;
        input.target_x = 40;
        history.push(10, input);

        let sample = telemetry(CharacterId(3), &state, &history, 11);
        assert_eq!(sample.x, 100);
        assert_eq!(sample.hooked_target, -1);
        assert_eq!(sample.inputs.len(), 1);

        // Identical export yields the identical checksum
        let again = telemetry(CharacterId(3), &state, &history, 11);
        assert_eq!(sample.checksum, again.checksum);

        // Any field change breaks the checksum
        let mut tampered = sample.clone();
        tampered.x += 1;
        let recompute = telemetry(
            CharacterId(3),
            &{
                let mut s = state.clone();
                s.pos.x += crate::core::fixed::FIXED_ONE;
                s
            },
            &history,
            11,
        );
        assert_ne!(tampered.checksum, recompute.checksum);
    }
}
