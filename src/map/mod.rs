//! Map/collision collaborator.
//!
//! Tile storage plus every geometric query the simulation consumes:
//! solidity tests, swept-box movement, crossed-cell enumeration,
//! move restrictions and teleport destination groups.

pub mod collision;
pub mod tiles;

pub use collision::{LineHit, MapGrid};
pub use tiles::{MoveRestrictions, SpeedupTile, SwitchTile, TeleTile, Tile};
