//! Charcore Replay Harness
//!
//! Headless demo binary: builds a small map, runs a deterministic
//! simulation with scripted inputs, prints snapshots, and verifies
//! that a second run reproduces the exact same state checksum.

use anyhow::Result;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use charcore::core::fixed::to_fixed;
use charcore::core::hash::{short_hex, StateHasher};
use charcore::core::vec2::FixedVec2;
use charcore::map::collision::MapGrid;
use charcore::map::tiles::{SpeedupTile, TeleTile, Tile};
use charcore::map::tiles::{TILE_FREEZE, TILE_TELE_IN, TILE_TELE_OUT};
use charcore::sim::input::CharacterInput;
use charcore::sim::reckoning::SendCore;
use charcore::sim::snapshot::{ProtocolVersion, ShowOthers, SnapBudget};
use charcore::sim::state::CharacterId;
use charcore::sim::tuning::TuningZones;
use charcore::sim::world::World;
use charcore::{TICK_RATE, VERSION};

/// Ticks the demo simulates (30 seconds).
const DEMO_TICKS: u32 = 30 * TICK_RATE;

fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Charcore Replay Harness v{}", VERSION);
    info!("Tick Rate: {} Hz", TICK_RATE);

    let first = run_simulation()?;
    info!("First run checksum:  {}", short_hex(&first));

    let second = run_simulation()?;
    info!("Second run checksum: {}", short_hex(&second));

    if first == second {
        info!("DETERMINISM VERIFIED: checksums match");
        Ok(())
    } else {
        anyhow::bail!("determinism failure: checksums differ");
    }
}

/// A small demo map: a room with a freeze pit, a speedup strip and a
/// teleporter pair.
fn demo_map() -> MapGrid {
    let mut map = MapGrid::from_ascii(&[
        "##############################",
        "#                            #",
        "#                            #",
        "#          o                 #",
        "#                            #",
        "#        FFFF                #",
        "##############################",
    ]);

    for tx in 15..19 {
        map.set_speedup_tile(tx, 5, SpeedupTile { force: 6, max_speed: 20, angle: 0 });
    }
    map.set_tele_tile(25, 5, TeleTile { id: TILE_TELE_IN, number: 1 });
    map.set_tele_tile(3, 2, TeleTile { id: TILE_TELE_OUT, number: 1 });
    map.set_game_tile(22, 4, Tile::new(TILE_FREEZE));
    map
}

/// Run the scripted demo and checksum the final world state.
fn run_simulation() -> Result<[u8; 32]> {
    let mut world = World::new(demo_map(), TuningZones::default(), 1234);

    let runner = world.spawn(None);
    let chaser = world.spawn(Some(FixedVec2::from_ints(700, 100)));

    let mut total_events = 0usize;
    for tick in 0..DEMO_TICKS {
        world.set_input(runner, scripted_input(tick, 0));
        world.set_input(chaser, scripted_input(tick, 1));

        let events = world.tick();
        total_events += events.len();

        if tick % (10 * TICK_RATE) == 0 {
            report(&world, runner, tick)?;
        }
    }

    info!("{} events over {} ticks", total_events, DEMO_TICKS);

    // Checksum every surviving character's projection
    let mut hasher = StateHasher::for_character_state();
    for id in world.character_ids() {
        if let Some(state) = world.character(id) {
            let core = SendCore::project(state);
            hasher.update_u32(id.0);
            hasher.update_i32(core.x);
            hasher.update_i32(core.y);
            hasher.update_i32(core.vel_x);
            hasher.update_i32(core.vel_y);
            hasher.update_i32(core.jumped);
        }
    }
    Ok(hasher.finalize())
}

/// Scripted pseudo-player input, fully determined by the tick.
fn scripted_input(tick: u32, flavor: u32) -> CharacterInput {
    let mut input = CharacterInput::empty();
    let phase = (tick / 40 + flavor) % 4;
    input.direction = match phase {
        0 | 1 => 1,
        2 => -1,
        _ => 0,
    };
    input.set_jump(tick % 35 == 0);
    input.target_x = 60;
    input.target_y = if phase == 1 { -40 } else { 20 };
    input.set_hook(phase == 3);
    input
}

/// Log the runner's own snapshot as JSON, the way a network layer
/// would consume it.
fn report(world: &World, id: CharacterId, tick: u32) -> Result<()> {
    let Some(state) = world.character(id) else {
        info!(tick, "runner is gone");
        return Ok(());
    };

    let mut budget = SnapBudget::new(64);
    if let Some(snap) = world.snap(
        id,
        id,
        state.pos,
        ProtocolVersion::Current,
        ShowOthers::All,
        false,
        &mut budget,
    ) {
        info!(tick, snapshot = %serde_json::to_string(&snap)?, "runner snapshot");
    }

    let speed = state.vel.length();
    info!(tick, speed = speed as f32 / to_fixed(1.0) as f32, "runner speed");
    Ok(())
}
