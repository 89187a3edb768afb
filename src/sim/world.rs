//! World Orchestration
//!
//! Owns the character arena, the switch table and the spatial index,
//! and runs the fixed tick order: tile pre-phase, movement integrator,
//! tile post-phase over the crossed cells, reckoning. Single-threaded
//! and cooperative; every character finishes a phase before any
//! character enters the next one, and all cross-character reads go
//! through previous-tick views.

use std::collections::BTreeMap;

use tracing::debug;

use crate::core::fixed::{saturated_add, Fixed};
use crate::core::rng::DeterministicRng;
use crate::core::vec2::FixedVec2;
use crate::map::collision::MapGrid;
use crate::sim::events::{CoreEvent, CoreEventData, DeathCause};
use crate::sim::input::{CharacterInput, InputHistory};
use crate::sim::interact::{self, InteractCtx, TileOutcome};
use crate::sim::movement::{advance, AdvanceCtx, OtherCharacter, WorldView};
use crate::sim::reckoning::{ReckoningOutput, ReckoningTracker, SendCore};
use crate::sim::snapshot::{
    self, CharacterSnap, ProtocolVersion, ShowOthers, SnapBudget, SnapInput, SnapMeta,
    TelemetrySample, ViewerContext,
};
use crate::sim::state::{CharacterId, CharacterState, Team, WeaponKind};
use crate::sim::switches::SwitchTable;
use crate::sim::tuning::TuningZones;

// =============================================================================
// COLLABORATOR TRAITS
// =============================================================================

/// Team collaborator: team membership and pairwise exemptions.
pub trait TeamView {
    /// Team of a character.
    fn team_of(&self, id: CharacterId) -> Team;

    /// Pairwise collision/solo exemption: may these two interact
    /// physically at all?
    fn can_collide(&self, a: CharacterId, b: CharacterId) -> bool;

    /// Bitmask of team ids visible to a viewer.
    fn visibility_mask(&self, viewer: CharacterId) -> u64;
}

/// Everyone on one team, everyone interacts. The default for tests and
/// modes without teams.
#[derive(Clone, Copy, Debug, Default)]
pub struct SingleTeam;

impl TeamView for SingleTeam {
    fn team_of(&self, _id: CharacterId) -> Team {
        Team(0)
    }

    fn can_collide(&self, _a: CharacterId, _b: CharacterId) -> bool {
        true
    }

    fn visibility_mask(&self, _viewer: CharacterId) -> u64 {
        u64::MAX
    }
}

/// Game-controller collaborator: tick hooks, lifecycle notifications
/// and override points.
pub trait GameHooks {
    /// Before any character phase of a tick.
    fn pre_tick(&mut self, _tick: u32) {}

    /// After reckoning, before snapshots are built.
    fn post_core_tick(&mut self, _tick: u32) {}

    /// A character entered the world.
    fn on_spawn(&mut self, _id: CharacterId) {}

    /// A character left the world.
    fn on_death(&mut self, _id: CharacterId, _cause: DeathCause) {}

    /// Override the spawn jump budget.
    fn jump_count(&self, _id: CharacterId) -> Option<i32> {
        None
    }

    /// Extra weapons granted at spawn.
    fn weapon_grants(&self, _id: CharacterId) -> Vec<(WeaponKind, Option<u32>)> {
        Vec::new()
    }

    /// Adjust a character's armor after its core phases each tick;
    /// game modes use this to display progress (e.g. freeze countdown).
    fn armor_progress(&self, _id: CharacterId, armor: i32) -> i32 {
        armor
    }
}

/// No-op controller.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoHooks;

impl GameHooks for NoHooks {}

// =============================================================================
// SPATIAL INDEX
// =============================================================================

/// Position index over live characters.
///
/// Paused and dead characters are absent. Shared mutable within a
/// tick under the single-writer discipline of the world loop.
#[derive(Clone, Debug, Default)]
pub struct SpatialIndex {
    positions: BTreeMap<CharacterId, FixedVec2>,
}

impl SpatialIndex {
    /// Insert or move a character.
    pub fn update(&mut self, id: CharacterId, pos: FixedVec2) {
        self.positions.insert(id, pos);
    }

    /// Remove a character.
    pub fn remove(&mut self, id: CharacterId) {
        self.positions.remove(&id);
    }

    /// Is the character indexed?
    pub fn contains(&self, id: CharacterId) -> bool {
        self.positions.contains_key(&id)
    }

    /// Characters within a radius, in id order.
    pub fn query_radius(&self, center: FixedVec2, radius: Fixed) -> Vec<CharacterId> {
        self.positions
            .iter()
            .filter(|(_, pos)| pos.distance(center) <= radius)
            .map(|(id, _)| *id)
            .collect()
    }
}

// =============================================================================
// WORLD
// =============================================================================

/// One character slot in the arena.
struct CharacterEntry {
    state: CharacterState,
    tracker: ReckoningTracker,
    input: CharacterInput,
    history: InputHistory,
    team: Team,
    paused: bool,
    paused_since: Option<u32>,
    afk: bool,
    concealed: bool,
    finished_exempt: bool,
    last_reckoning: ReckoningOutput,
}

/// The simulation world: arena with stable ids plus the shared tables.
pub struct World {
    map: MapGrid,
    zones: TuningZones,
    switches: SwitchTable,
    rng: DeterministicRng,
    spatial: SpatialIndex,
    characters: BTreeMap<CharacterId, CharacterEntry>,
    next_id: u32,
    tick: u32,
    teams: Box<dyn TeamView>,
    hooks: Box<dyn GameHooks>,
    events: Vec<CoreEvent>,
}

impl World {
    /// Create a world over a map with default tuning and no teams.
    pub fn new(map: MapGrid, zones: TuningZones, rng_seed: u64) -> Self {
        Self {
            map,
            zones,
            switches: SwitchTable::new(),
            rng: DeterministicRng::new(rng_seed),
            spatial: SpatialIndex::default(),
            characters: BTreeMap::new(),
            next_id: 0,
            tick: 0,
            teams: Box::new(SingleTeam),
            hooks: Box::new(NoHooks),
            events: Vec::new(),
        }
    }

    /// Install a team collaborator.
    pub fn set_teams(&mut self, teams: Box<dyn TeamView>) {
        self.teams = teams;
    }

    /// Install a game-controller collaborator.
    pub fn set_hooks(&mut self, hooks: Box<dyn GameHooks>) {
        self.hooks = hooks;
    }

    /// Current tick.
    pub fn current_tick(&self) -> u32 {
        self.tick
    }

    /// The map.
    pub fn map(&self) -> &MapGrid {
        &self.map
    }

    /// The switch table.
    pub fn switches(&self) -> &SwitchTable {
        &self.switches
    }

    /// The spatial index.
    pub fn spatial(&self) -> &SpatialIndex {
        &self.spatial
    }

    /// Read a character's state.
    pub fn character(&self, id: CharacterId) -> Option<&CharacterState> {
        self.characters.get(&id).map(|e| &e.state)
    }

    /// Mutable access for game-mode collaborators (weapon grants,
    /// super flags and the like).
    pub fn character_mut(&mut self, id: CharacterId) -> Option<&mut CharacterState> {
        self.characters.get_mut(&id).map(|e| &mut e.state)
    }

    /// Live character ids in id order.
    pub fn character_ids(&self) -> Vec<CharacterId> {
        self.characters.keys().copied().collect()
    }

    // =========================================================================
    // LIFECYCLE
    // =========================================================================

    /// Spawn a character at a position (or the map spawn).
    pub fn spawn(&mut self, pos: Option<FixedVec2>) -> CharacterId {
        let pos = pos
            .or_else(|| self.map.spawn_point())
            .unwrap_or(FixedVec2::from_ints(64, 64));

        let id = CharacterId(self.next_id);
        self.next_id += 1;

        let mut state = CharacterState::spawn(pos);

        // Controller override points
        if let Some(jumps) = self.hooks.jump_count(id) {
            state.jumps = jumps;
        }
        for (weapon, ammo) in self.hooks.weapon_grants(id) {
            state.give_weapon(weapon, ammo);
        }

        let team = self.teams.team_of(id);
        self.switches.register_team(team);
        self.spatial.update(id, state.pos);

        let tracker = ReckoningTracker::new(&state, self.tick);
        let core = SendCore::project(&state);
        self.characters.insert(
            id,
            CharacterEntry {
                state,
                tracker,
                input: CharacterInput::empty(),
                history: InputHistory::new(),
                team,
                paused: false,
                paused_since: None,
                afk: false,
                concealed: false,
                finished_exempt: false,
                last_reckoning: ReckoningOutput { reference_tick: self.tick, core },
            },
        );

        self.hooks.on_spawn(id);
        id
    }

    /// Kill and remove a character. Hook references to it release
    /// cleanly.
    pub fn kill(&mut self, id: CharacterId, cause: DeathCause) {
        if self.characters.remove(&id).is_none() {
            return;
        }
        self.spatial.remove(id);

        // Release every hook pointing at the dead character
        for entry in self.characters.values_mut() {
            if entry.state.hooked_player == Some(id) {
                entry.state.release_hook();
            }
        }

        self.events.push(CoreEvent::died(self.tick, id, cause));
        self.hooks.on_death(id, cause);
    }

    /// Pause a character: out of the spatial index, no tick advances.
    pub fn pause(&mut self, id: CharacterId) {
        let Some(entry) = self.characters.get_mut(&id) else {
            return;
        };
        if entry.paused {
            return;
        }
        entry.paused = true;
        entry.paused_since = Some(self.tick);
        self.spatial.remove(id);
    }

    /// Resume a paused character: velocity zeroed, freeze bookkeeping
    /// shifted by the paused duration.
    pub fn resume(&mut self, id: CharacterId) {
        let now = self.tick;
        let Some(entry) = self.characters.get_mut(&id) else {
            return;
        };
        if !entry.paused {
            return;
        }

        let paused_ticks = entry.paused_since.map(|t| now - t).unwrap_or(0);
        entry.paused = false;
        entry.paused_since = None;

        entry.state.vel = FixedVec2::ZERO;
        if let Some(start) = entry.state.freeze_start {
            entry.state.freeze_start = Some(start + paused_ticks);
        }
        entry.state.reset_flag = true;
        self.spatial.update(id, entry.state.pos);
    }

    /// Store the input a character acts on next tick.
    pub fn set_input(&mut self, id: CharacterId, input: CharacterInput) {
        if let Some(entry) = self.characters.get_mut(&id) {
            entry.input = input;
            entry.afk = false;
        }
    }

    /// Mark a character AFK (emote placeholder in snapshots).
    pub fn set_afk(&mut self, id: CharacterId, afk: bool) {
        if let Some(entry) = self.characters.get_mut(&id) {
            entry.afk = afk;
        }
    }

    /// Administratively hide a character.
    pub fn set_concealed(&mut self, id: CharacterId, concealed: bool) {
        if let Some(entry) = self.characters.get_mut(&id) {
            entry.concealed = concealed;
        }
    }

    /// Exempt a finished team's character from death tiles.
    pub fn set_finished_exempt(&mut self, id: CharacterId, exempt: bool) {
        if let Some(entry) = self.characters.get_mut(&id) {
            entry.finished_exempt = exempt;
        }
    }

    // =========================================================================
    // TICK
    // =========================================================================

    /// Run one full tick and drain the events it produced.
    pub fn tick(&mut self) -> Vec<CoreEvent> {
        self.tick += 1;
        let now = self.tick;

        self.hooks.pre_tick(now);
        self.switches.tick(now);

        // Previous-tick view of everyone, captured before any update
        let prev: Vec<(CharacterId, FixedVec2, bool, bool)> = self
            .characters
            .iter()
            .filter(|(_, e)| !e.paused)
            .map(|(id, e)| (*id, e.state.pos, e.state.solo, e.state.can_collide))
            .collect();

        let ids: Vec<CharacterId> = self
            .characters
            .iter()
            .filter(|(_, e)| !e.paused)
            .map(|(id, _)| *id)
            .collect();

        let mut deaths: Vec<(CharacterId, DeathCause)> = Vec::new();

        // Phase 1-3 per character: tiles pre, integrate, tiles post
        for &id in &ids {
            let view = build_view(id, &prev, self.characters.get(&id), &*self.teams);

            let Some(entry) = self.characters.get_mut(&id) else {
                continue;
            };
            let input = entry.input;
            entry.history.push(now, input);

            let interact_ctx = InteractCtx {
                self_id: id,
                tick: now,
                team: entry.team,
                map: &self.map,
                finished_exempt: entry.finished_exempt,
            };

            // Tile pre-phase on the standing cell
            let standing = self.map.tile_index(entry.state.pos);
            if let TileOutcome::Dead(cause) = interact::apply(
                &mut entry.state,
                &mut self.switches,
                &mut self.rng,
                &[standing],
                &interact_ctx,
                &mut self.events,
            ) {
                deaths.push((id, cause));
                continue;
            }

            // Movement integration against the previous-tick view
            let prev_pos = entry.state.pos;
            let advance_ctx = AdvanceCtx {
                self_id: id,
                tick: now,
                map: &self.map,
                zones: &self.zones,
                view: WorldView { others: &view },
            };
            advance(&mut entry.state, &input, &advance_ctx, true, &mut self.events);

            // Tile post-phase over every cell crossed during the move
            let crossed = self.map.crossed_cells(prev_pos, entry.state.pos);
            if let TileOutcome::Dead(cause) = interact::apply(
                &mut entry.state,
                &mut self.switches,
                &mut self.rng,
                &crossed,
                &interact_ctx,
                &mut self.events,
            ) {
                deaths.push((id, cause));
                continue;
            }

            entry.state.armor = self.hooks.armor_progress(id, entry.state.armor);
            self.spatial.update(id, entry.state.pos);
        }

        // Deferred forces land after every integration
        let forces: Vec<(CharacterId, FixedVec2, Fixed)> = self
            .events
            .iter()
            .filter_map(|e| match e.data {
                CoreEventData::ForceOnOther { target, accel, limit } => {
                    Some((target, accel, limit))
                }
                _ => None,
            })
            .collect();
        for (target, accel, limit) in forces {
            if let Some(entry) = self.characters.get_mut(&target) {
                if entry.paused {
                    continue;
                }
                let vel = FixedVec2::new(
                    saturated_add(-limit, limit, entry.state.vel.x, accel.x),
                    saturated_add(-limit, limit, entry.state.vel.y, accel.y),
                );
                entry.state.set_velocity(vel);
            }
        }

        // Phase 4: reckoning, after every character finished moving
        for &id in &ids {
            if deaths.iter().any(|(d, _)| *d == id) {
                continue;
            }
            let view = build_view(id, &prev, self.characters.get(&id), &*self.teams);
            let Some(entry) = self.characters.get_mut(&id) else {
                continue;
            };

            let ctx = AdvanceCtx {
                self_id: id,
                tick: now,
                map: &self.map,
                zones: &self.zones,
                view: WorldView { others: &view },
            };
            entry.last_reckoning = entry.tracker.tick(&mut entry.state, &ctx);
        }

        for (id, cause) in deaths {
            debug!(character = id.0, ?cause, "character died during tick");
            self.kill(id, cause);
        }

        self.hooks.post_core_tick(now);
        std::mem::take(&mut self.events)
    }

    // =========================================================================
    // SNAPSHOTS & TELEMETRY
    // =========================================================================

    /// Build the visible projection of one character for one viewer.
    pub fn snap(
        &self,
        id: CharacterId,
        viewer: CharacterId,
        view_pos: FixedVec2,
        protocol: ProtocolVersion,
        show_others: ShowOthers,
        spectates_owner: bool,
        budget: &mut SnapBudget,
    ) -> Option<CharacterSnap> {
        let entry = self.characters.get(&id)?;

        // Hooks of other characters attached to this one can pull it
        // into view
        let attached_hooks: Vec<FixedVec2> = self
            .characters
            .iter()
            .filter(|(_, e)| e.state.hooked_player == Some(id))
            .map(|(_, e)| e.state.hook_pos)
            .collect();

        let input = SnapInput {
            id,
            state: &entry.state,
            reckoning: entry.last_reckoning,
            meta: SnapMeta {
                afk: entry.afk,
                paused: entry.paused,
                concealed: entry.concealed,
            },
            attached_hooks: &attached_hooks,
        };

        let viewer_ctx = ViewerContext {
            viewer,
            view_pos,
            protocol,
            show_others,
            same_team: self.teams.team_of(viewer) == self.teams.team_of(id),
            can_collide: self.teams.can_collide(viewer, id),
            spectates_owner,
        };

        snapshot::build(&input, &viewer_ctx, self.tick, budget)
    }

    /// Anti-cheat telemetry export for one character.
    pub fn telemetry(&self, id: CharacterId) -> Option<TelemetrySample> {
        let entry = self.characters.get(&id)?;
        Some(snapshot::telemetry(id, &entry.state, &entry.history, self.tick))
    }
}

/// Previous-tick view of everyone but `id`, with pairwise policies
/// resolved.
fn build_view(
    id: CharacterId,
    prev: &[(CharacterId, FixedVec2, bool, bool)],
    entry: Option<&CharacterEntry>,
    teams: &dyn TeamView,
) -> Vec<OtherCharacter> {
    let self_super = entry.map(|e| e.state.super_mode).unwrap_or(false);
    let self_solo = entry.map(|e| e.state.solo).unwrap_or(false);

    prev.iter()
        .filter(|(other_id, ..)| *other_id != id)
        .map(|&(other_id, pos, other_solo, other_can_collide)| {
            // Solo characters interact with nobody; super bypasses
            let pair = teams.can_collide(id, other_id)
                && (self_super || (!self_solo && !other_solo));
            OtherCharacter {
                id: other_id,
                pos,
                hookable: pair,
                collidable: pair && other_can_collide,
                hittable: pair,
            }
        })
        .collect()
}

// =============================================================================
// TESTS
// =============================================================================
