//! Coordinate fold between tile space and the collapsed shroud grid.
//!
//! An isometric tile rendered at height `z` occupies the same screen column
//! as a ground tile offset by `z / 2`, so elevation can be folded into the
//! 2-D index instead of storing one grid layer per height level. The fold is
//! deliberately lossy: several tile positions at different even elevations
//! share one shroud coordinate, and [`tiles_at_shroud_column`] walks the
//! candidates back out.

use shroud_core::{ShroudCoordinate, Tile, TileMap, TilePosition};

/// Grid margin that keeps the highest elevation from producing a negative index.
#[must_use]
pub fn padding(max_elevation: i32) -> i32 {
    let max_elevation = max_elevation.max(0);
    (max_elevation + 1) / 2
}

/// Rounds an elevation up to the even level the fold collapses it onto.
#[must_use]
pub const fn collapse_elevation(z: i32) -> i32 {
    z + (z & 1)
}

/// Folds a tile position into its shroud coordinate.
#[must_use]
pub fn tile_to_shroud(position: TilePosition, padding: i32) -> ShroudCoordinate {
    let offset = collapse_elevation(position.z()) / 2;
    ShroudCoordinate::new(
        position.rx() - offset + padding,
        position.ry() - offset + padding,
    )
}

/// Recovers the map coordinates behind a shroud coordinate at a chosen elevation.
#[must_use]
pub fn shroud_to_tile(coord: ShroudCoordinate, z: i32, padding: i32) -> (i32, i32) {
    let offset = (z + 1) / 2;
    (coord.sx() + offset - padding, coord.sy() + offset - padding)
}

/// Elevation-zero variant of [`shroud_to_tile`], for lookups without a known height.
#[must_use]
pub fn shroud_to_tile_ground(coord: ShroudCoordinate, padding: i32) -> (i32, i32) {
    shroud_to_tile(coord, 0, padding)
}

/// Enumerates every map tile that folds onto the provided shroud coordinate.
///
/// Walks the even elevation levels from ground up to `max_elevation` and keeps
/// a candidate only when the map holds a tile there whose collapsed elevation
/// is exactly that level. Tiles at odd elevations collapse upward, so they are
/// matched through the level above them rather than skipped.
#[must_use]
pub fn tiles_at_shroud_column(
    coord: ShroudCoordinate,
    max_elevation: i32,
    map: &impl TileMap,
    padding: i32,
) -> Vec<Tile> {
    let mut found = Vec::new();
    let top = collapse_elevation(max_elevation.max(0));

    let mut z = 0;
    while z <= top {
        let (rx, ry) = shroud_to_tile(coord, z, padding);
        if let Some(tile) = map.tile_at(rx, ry) {
            if collapse_elevation(tile.position.z()) == z {
                found.push(tile);
            }
        }
        z += 2;
    }

    found
}
