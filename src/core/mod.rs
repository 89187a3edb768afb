//! Core deterministic primitives.
//!
//! All types in this module are designed for perfect cross-platform
//! determinism. They are the foundation the dead-reckoning comparison
//! and replay verification stand on.

pub mod fixed;
pub mod hash;
pub mod rng;
pub mod vec2;

// Re-export core types
pub use fixed::{Fixed, FIXED_HALF, FIXED_ONE, FIXED_SCALE};
pub use hash::StateHasher;
pub use rng::DeterministicRng;
pub use vec2::FixedVec2;
