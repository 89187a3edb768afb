//! Map Grid and Collision Queries
//!
//! The map/collision collaborator consumed by the simulation core:
//! point and box solidity tests, swept-box movement, hook line
//! intersection, per-layer tile lookups by map index, crossed-cell
//! enumeration between two positions, move-restriction masks, and
//! teleport destination groups.
//!
//! Everything here is deterministic: integer tile math plus the crate's
//! fixed-point primitives, no floats.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::fixed::{
    fixed_div, fixed_mul, fixed_round_to_int, from_int, Fixed, FIXED_ONE, TILE_SIZE,
};
use crate::core::rng::DeterministicRng;
use crate::core::vec2::FixedVec2;
use crate::map::tiles::{
    stopper_restrictions, MoveRestrictions, SpeedupTile, SwitchTile, TeleTile, Tile,
    TILE_DEATH, TILE_FREEZE, TILE_NOHOOK, TILE_SOLID, TILE_STOP_ALL,
    TILE_TELE_CHECK_OUT, TILE_TELE_OUT, TILE_UNFREEZE,
};

/// Spacing of the samples taken along a movement path when enumerating
/// crossed cells: a quarter tile. Fine enough that no cell on the path
/// is skipped at gameplay speeds, far cheaper than per-pixel stepping.
const CROSSING_STEP: Fixed = TILE_SIZE / 4;

/// How far outside the map bounds a character may travel before the
/// out-of-map death rule applies (two tiles of slack).
const OUT_OF_BOUNDS_MARGIN: Fixed = TILE_SIZE * 2;

/// Result of a line-of-movement intersection with solid geometry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LineHit {
    /// First sampled point inside the solid.
    pub hit_pos: FixedVec2,
    /// Last sampled point before the solid.
    pub before_pos: FixedVec2,
    /// The solid tile that was hit.
    pub tile: Tile,
}

/// Tile map with collision and gameplay layers.
///
/// Cells are addressed either by `(tx, ty)` tile coordinates or by the
/// flattened map index `ty * width + tx`. Positions outside the grid
/// clamp to the border cell, so walls extend infinitely outward.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MapGrid {
    width: i32,
    height: i32,
    game: Vec<Tile>,
    front: Vec<Tile>,
    switches: Vec<SwitchTile>,
    tele: Vec<TeleTile>,
    speedups: Vec<SpeedupTile>,
    tune: Vec<u8>,
    /// Plain teleport destinations by group number.
    tele_outs: BTreeMap<u8, Vec<FixedVec2>>,
    /// Checkpoint teleport destinations by group number.
    tele_check_outs: BTreeMap<u8, Vec<FixedVec2>>,
    spawns: Vec<FixedVec2>,
}

impl MapGrid {
    /// Create an empty (all-air) map of the given tile dimensions.
    pub fn new(width: i32, height: i32) -> Self {
        let cells = (width.max(1) * height.max(1)) as usize;
        Self {
            width: width.max(1),
            height: height.max(1),
            game: vec![Tile::AIR; cells],
            front: vec![Tile::AIR; cells],
            switches: vec![SwitchTile::default(); cells],
            tele: vec![TeleTile::default(); cells],
            speedups: vec![SpeedupTile::default(); cells],
            tune: vec![0; cells],
            tele_outs: BTreeMap::new(),
            tele_check_outs: BTreeMap::new(),
            spawns: Vec::new(),
        }
    }

    /// Build a map from ASCII art rows, one character per tile.
    ///
    /// `#` solid, `N` no-hook solid, `x` death, `F` freeze,
    /// `U` unfreeze, `S` all-way stopper, `o` spawn point, anything
    /// else air. Rows shorter than the longest row are padded with air.
    pub fn from_ascii(rows: &[&str]) -> Self {
        let height = rows.len() as i32;
        let width = rows.iter().map(|r| r.len()).max().unwrap_or(1) as i32;
        let mut map = Self::new(width, height);

        for (ty, row) in rows.iter().enumerate() {
            for (tx, ch) in row.chars().enumerate() {
                let (tx, ty) = (tx as i32, ty as i32);
                match ch {
                    '#' => map.set_game_tile(tx, ty, Tile::new(TILE_SOLID)),
                    'N' => map.set_game_tile(tx, ty, Tile::new(TILE_NOHOOK)),
                    'x' => map.set_game_tile(tx, ty, Tile::new(TILE_DEATH)),
                    'F' => map.set_game_tile(tx, ty, Tile::new(TILE_FREEZE)),
                    'U' => map.set_game_tile(tx, ty, Tile::new(TILE_UNFREEZE)),
                    'S' => map.set_game_tile(tx, ty, Tile::new(TILE_STOP_ALL)),
                    'o' => {
                        let spawn = map.cell_center(map.index_of(tx, ty));
                        map.spawns.push(spawn);
                    }
                    _ => {}
                }
            }
        }
        map
    }

    /// Map width in tiles.
    pub fn width(&self) -> i32 {
        self.width
    }

    /// Map height in tiles.
    pub fn height(&self) -> i32 {
        self.height
    }

    // =========================================================================
    // LAYER EDITING
    // =========================================================================

    /// Set a game-layer tile.
    pub fn set_game_tile(&mut self, tx: i32, ty: i32, tile: Tile) {
        let index = self.index_of(tx, ty);
        self.game[index] = tile;
    }

    /// Set a front-layer tile.
    pub fn set_front_tile(&mut self, tx: i32, ty: i32, tile: Tile) {
        let index = self.index_of(tx, ty);
        self.front[index] = tile;
    }

    /// Set a switch-layer cell.
    pub fn set_switch_tile(&mut self, tx: i32, ty: i32, tile: SwitchTile) {
        let index = self.index_of(tx, ty);
        self.switches[index] = tile;
    }

    /// Set a tele-layer cell. Destination markers (`TILE_TELE_OUT`,
    /// `TILE_TELE_CHECK_OUT`) also register the cell center in the
    /// matching destination group.
    pub fn set_tele_tile(&mut self, tx: i32, ty: i32, tile: TeleTile) {
        let index = self.index_of(tx, ty);
        self.tele[index] = tile;

        let center = self.cell_center(index);
        match tile.id {
            TILE_TELE_OUT => self.tele_outs.entry(tile.number).or_default().push(center),
            TILE_TELE_CHECK_OUT => self
                .tele_check_outs
                .entry(tile.number)
                .or_default()
                .push(center),
            _ => {}
        }
    }

    /// Set a speedup-layer cell.
    pub fn set_speedup_tile(&mut self, tx: i32, ty: i32, tile: SpeedupTile) {
        let index = self.index_of(tx, ty);
        self.speedups[index] = tile;
    }

    /// Set the tuning zone of a cell.
    pub fn set_tune_zone(&mut self, tx: i32, ty: i32, zone: u8) {
        let index = self.index_of(tx, ty);
        self.tune[index] = zone;
    }

    /// Register a spawn point.
    pub fn add_spawn(&mut self, pos: FixedVec2) {
        self.spawns.push(pos);
    }

    // =========================================================================
    // INDEXING
    // =========================================================================

    /// Flattened index of a tile coordinate, clamped to the grid.
    pub fn index_of(&self, tx: i32, ty: i32) -> usize {
        let tx = tx.clamp(0, self.width - 1);
        let ty = ty.clamp(0, self.height - 1);
        (ty * self.width + tx) as usize
    }

    /// Flattened index of the cell containing a world position.
    pub fn tile_index(&self, pos: FixedVec2) -> usize {
        let tx = fixed_round_to_int(pos.x) / 32;
        let ty = fixed_round_to_int(pos.y) / 32;
        self.index_of(tx, ty)
    }

    /// World-space center of a cell.
    pub fn cell_center(&self, index: usize) -> FixedVec2 {
        let tx = (index as i32) % self.width;
        let ty = (index as i32) / self.width;
        FixedVec2::new(
            from_int(tx * 32 + 16),
            from_int(ty * 32 + 16),
        )
    }

    // =========================================================================
    // LOOKUPS BY INDEX
    // =========================================================================

    /// Game-layer tile at a map index.
    pub fn game_tile(&self, index: usize) -> Tile {
        self.game.get(index).copied().unwrap_or(Tile::AIR)
    }

    /// Front-layer tile at a map index.
    pub fn front_tile(&self, index: usize) -> Tile {
        self.front.get(index).copied().unwrap_or(Tile::AIR)
    }

    /// Switch-layer cell at a map index.
    pub fn switch_tile(&self, index: usize) -> SwitchTile {
        self.switches.get(index).copied().unwrap_or_default()
    }

    /// Tele-layer cell at a map index.
    pub fn tele_tile(&self, index: usize) -> TeleTile {
        self.tele.get(index).copied().unwrap_or_default()
    }

    /// Speedup-layer cell at a map index.
    pub fn speedup_tile(&self, index: usize) -> SpeedupTile {
        self.speedups.get(index).copied().unwrap_or_default()
    }

    /// Tuning zone at a map index (0 = map default).
    pub fn tune_zone(&self, index: usize) -> u8 {
        self.tune.get(index).copied().unwrap_or(0)
    }

    // =========================================================================
    // SOLIDITY
    // =========================================================================

    /// Is the cell containing this point solid?
    pub fn check_point(&self, pos: FixedVec2) -> bool {
        self.game_tile(self.tile_index(pos)).is_solid()
    }

    /// Does a box of the given half-extent at `pos` overlap any solid?
    ///
    /// Probes the four corners; with 28px characters and 32px tiles a
    /// corner probe is exact.
    pub fn test_box(&self, pos: FixedVec2, half: Fixed) -> bool {
        self.check_point(FixedVec2::new(pos.x - half, pos.y - half))
            || self.check_point(FixedVec2::new(pos.x + half, pos.y - half))
            || self.check_point(FixedVec2::new(pos.x - half, pos.y + half))
            || self.check_point(FixedVec2::new(pos.x + half, pos.y + half))
    }

    /// True when the position has left the playable area entirely.
    pub fn is_outside(&self, pos: FixedVec2) -> bool {
        pos.x < -OUT_OF_BOUNDS_MARGIN
            || pos.y < -OUT_OF_BOUNDS_MARGIN
            || pos.x > from_int(self.width * 32) + OUT_OF_BOUNDS_MARGIN
            || pos.y > from_int(self.height * 32) + OUT_OF_BOUNDS_MARGIN
    }

    // =========================================================================
    // SWEPT MOVEMENT
    // =========================================================================

    /// Move a box through the map, sliding along solids.
    ///
    /// Splits the velocity into sub-steps no longer than one pixel's
    /// travel, and on contact zeroes (or reflects by `elasticity`) the
    /// offending velocity component per axis. Returns the final
    /// position and velocity.
    pub fn move_box(
        &self,
        pos: FixedVec2,
        vel: FixedVec2,
        half: Fixed,
        elasticity: Fixed,
    ) -> (FixedVec2, FixedVec2) {
        let dist = vel.length();
        if dist == 0 {
            return (pos, vel);
        }

        let mut pos = pos;
        let mut vel = vel;

        let max = fixed_round_to_int(dist).max(0);
        let fraction = fixed_div(FIXED_ONE, from_int(max + 1));

        for _ in 0..=max {
            let mut new_pos = pos.add(vel.scale(fraction));

            if self.test_box(new_pos, half) {
                let mut hits = 0;

                // Resolve y first: vertical contact is the common case
                if self.test_box(FixedVec2::new(pos.x, new_pos.y), half) {
                    new_pos.y = pos.y;
                    vel.y = -fixed_mul(vel.y, elasticity);
                    hits += 1;
                }

                if self.test_box(FixedVec2::new(new_pos.x, pos.y), half) {
                    new_pos.x = pos.x;
                    vel.x = -fixed_mul(vel.x, elasticity);
                    hits += 1;
                }

                // Perfect diagonal into a corner: neither axis alone
                // collides, kill the whole step
                if hits == 0 {
                    new_pos = pos;
                    vel = FixedVec2::new(
                        -fixed_mul(vel.x, elasticity),
                        -fixed_mul(vel.y, elasticity),
                    );
                }
            }

            pos = new_pos;
        }

        (pos, vel)
    }

    /// Intersect a line with solid geometry.
    ///
    /// Samples pixel by pixel from `from` to `to`; returns the first
    /// solid contact, or `None` if the path is clear. The hook uses
    /// this to find attachment points.
    pub fn intersect_line(&self, from: FixedVec2, to: FixedVec2) -> Option<LineHit> {
        let dist = from.distance(to);
        let steps = fixed_round_to_int(dist).max(0);

        let mut last_free = from;
        for i in 0..=steps {
            let t = fixed_div(from_int(i), from_int(steps.max(1)));
            let point = from.lerp(to, t);

            let tile = self.game_tile(self.tile_index(point));
            if tile.is_solid() {
                return Some(LineHit {
                    hit_pos: point,
                    before_pos: last_free,
                    tile,
                });
            }
            last_free = point;
        }
        None
    }

    // =========================================================================
    // CROSSED-CELL ENUMERATION
    // =========================================================================

    /// Every map index touched between two positions, in path order,
    /// consecutive duplicates removed.
    ///
    /// Samples at quarter-tile intervals (batched lookup) so fast
    /// movement cannot skip a trigger, without per-pixel cost.
    pub fn crossed_cells(&self, prev: FixedVec2, cur: FixedVec2) -> Vec<usize> {
        let dist = prev.distance(cur);
        if dist == 0 {
            return vec![self.tile_index(cur)];
        }

        let steps = (fixed_div(dist, CROSSING_STEP) >> 16).max(1) + 1;
        let mut cells = Vec::with_capacity(steps as usize + 1);

        for i in 0..=steps {
            let t = fixed_div(from_int(i), from_int(steps));
            let point = prev.lerp(cur, t);
            let index = self.tile_index(point);
            if cells.last() != Some(&index) {
                cells.push(index);
            }
        }
        cells
    }

    // =========================================================================
    // MOVE RESTRICTIONS
    // =========================================================================

    /// Restriction mask from stopper tiles around a character box.
    ///
    /// Probes the box center and four points 18px out, merging the
    /// stopper contributions of both game and front layers.
    pub fn move_restrictions(&self, pos: FixedVec2) -> MoveRestrictions {
        const PROBE: Fixed = from_int(18);
        let offsets = [
            FixedVec2::ZERO,
            FixedVec2::new(PROBE, 0),
            FixedVec2::new(-PROBE, 0),
            FixedVec2::new(0, PROBE),
            FixedVec2::new(0, -PROBE),
        ];

        let mut restrictions = MoveRestrictions::NONE;
        for offset in offsets {
            let index = self.tile_index(pos.add(offset));
            restrictions.merge(stopper_restrictions(self.game_tile(index)));
            restrictions.merge(stopper_restrictions(self.front_tile(index)));
        }
        restrictions
    }

    // =========================================================================
    // TELEPORT DESTINATIONS
    // =========================================================================

    /// Random destination for a plain/evil teleport group.
    ///
    /// An empty (or unknown) group returns `None`; the caller treats
    /// that as a no-op, never an error.
    pub fn teleport_destination(
        &self,
        group: u8,
        rng: &mut DeterministicRng,
    ) -> Option<FixedVec2> {
        let outs = self.tele_outs.get(&group)?;
        rng.choose(outs).copied()
    }

    /// All checkpoint destinations recorded for a group.
    pub fn checkpoint_destinations(&self, group: u8) -> &[FixedVec2] {
        self.tele_check_outs
            .get(&group)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// First registered spawn point, if the map has one.
    pub fn spawn_point(&self) -> Option<FixedVec2> {
        self.spawns.first().copied()
    }
}

// =============================================================================
// TESTS
// =============================================================================
