//! # Charcore Server
//!
//! Deterministic, server-authoritative character simulation: the
//! per-tick physics core of a tile-map multiplayer game, plus the
//! dead-reckoning machinery that lets thin clients predict it.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     CHARCORE SERVER                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Deterministic primitives                  │
//! │  ├── fixed.rs    - Q16.16 fixed-point arithmetic             │
//! │  ├── vec2.rs     - 2D vector with fixed-point                │
//! │  ├── rng.rs      - Deterministic Xorshift128+ PRNG           │
//! │  └── hash.rs     - State checksums for telemetry/replays     │
//! │                                                              │
//! │  map/            - Map/collision collaborator                │
//! │  ├── tiles.rs    - Tile vocabulary and layer payloads        │
//! │  └── collision.rs- Grid, swept boxes, crossed cells          │
//! │                                                              │
//! │  sim/            - Simulation core (deterministic)           │
//! │  ├── tuning.rs   - Physics constants, per-zone overrides     │
//! │  ├── input.rs    - Per-tick input + anti-cheat history       │
//! │  ├── state.rs    - Character state                           │
//! │  ├── movement.rs - Movement/hook/weapon integrator           │
//! │  ├── interact.rs - Tile interaction engine                   │
//! │  ├── switches.rs - (number, team) switch table               │
//! │  ├── reckoning.rs- Dead-reckoning tracker                    │
//! │  ├── snapshot.rs - Per-viewer visible projection             │
//! │  └── world.rs    - Arena, tick order, collaborator traits    │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Determinism Guarantee
//!
//! The whole crate is **100% deterministic**:
//! - No floating-point arithmetic in tick logic
//! - No HashMap (BTreeMap wherever order can leak)
//! - No system time dependencies
//! - All randomness from seeded Xorshift128+
//!
//! Given identical inputs and seed, the simulation produces
//! **identical results** on any platform (x86, ARM, WASM), which is
//! what the reckoning comparison and replay verification build on.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod map;
pub mod sim;

// Re-export commonly used types
pub use crate::core::fixed::{Fixed, FIXED_HALF, FIXED_ONE, FIXED_SCALE};
pub use crate::core::rng::DeterministicRng;
pub use crate::core::vec2::FixedVec2;
pub use crate::map::collision::MapGrid;
pub use crate::sim::input::CharacterInput;
pub use crate::sim::state::{CharacterId, CharacterState, Team};
pub use crate::sim::world::World;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Simulation tick rate (Hz)
pub const TICK_RATE: u32 = 50;
