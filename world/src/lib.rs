#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative shroud state for one observer.
//!
//! The grid owns a dense, bit-packed array of per-cell visibility state plus
//! a parallel array of elevation ceilings, addressed through the collapsed
//! coordinate space defined in [`transform`]. Systems mutate it through
//! [`ShroudGrid::set_cells_in_radius`] and the bulk operations; read access
//! goes through the [`query`] module.

pub mod transform;

use shroud_core::{
    CellFlags, CellState, DimensionMismatch, GridSize, ShroudCoordinate, ShroudType, TileMap,
    TilePosition,
};

/// Outward bias added to the squared radius so edge tiles adjacent to the
/// center survive integer rounding. Carried over from the source behavior;
/// gameplay parity depends on the exact value.
pub const RADIUS_BIAS: f64 = 1.0;

/// Slack band added to a reveal's elevation ceiling before comparing against
/// the recorded terrain ceiling. Tolerates minor mismatches introduced by the
/// collapsed elevation axis; carried over from the source behavior.
pub const CEILING_SLACK: f64 = 4.0;

/// Set of shroud types an area fill is allowed to overwrite.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TypeSet(u8);

impl TypeSet {
    /// Every shroud type.
    pub const ALL: Self = Self(0b0000_0111);

    /// No shroud type; a fill restricted to this set writes nothing.
    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Returns the set with the provided type additionally allowed.
    #[must_use]
    pub const fn with(self, shroud_type: ShroudType) -> Self {
        Self(self.0 | 1u8 << shroud_type.as_u8())
    }

    /// Reports whether the provided type is in the set.
    #[must_use]
    pub const fn contains(self, shroud_type: ShroudType) -> bool {
        self.0 & (1u8 << shroud_type.as_u8()) != 0
    }
}

/// Flag mutation applied by an area fill.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlagOp {
    /// Sets the named flags on every touched cell.
    Set(CellFlags),
    /// Clears the named flags on every touched cell.
    Clear(CellFlags),
}

/// Bit-packed per-observer visibility grid with parallel elevation ceilings.
#[derive(Clone, Debug)]
pub struct ShroudGrid {
    size: GridSize,
    padding: i32,
    max_elevation: i32,
    cells: Vec<u8>,
    ceilings: Vec<i32>,
}

impl ShroudGrid {
    /// Builds a fully shrouded grid sized from the provided map.
    ///
    /// The grid holds no reference back to the map afterwards; it only needs
    /// it here to size itself and to precompute the elevation ceilings.
    #[must_use]
    pub fn from_tiles(map: &impl TileMap) -> Self {
        let map_size = map.size();
        let max_elevation = map.max_tile_height().max(0);
        let padding = transform::padding(max_elevation);
        let size = GridSize::new(
            map_size.width().saturating_add(padding as u32),
            map_size.height().saturating_add(padding as u32),
        );
        let capacity = size.width() as usize * size.height() as usize;

        let mut grid = Self {
            size,
            padding,
            max_elevation,
            cells: vec![0; capacity],
            ceilings: vec![0; capacity],
        };

        for tile in map.tiles() {
            let coord = transform::tile_to_shroud(tile.position, padding);
            if let Some(index) = grid.index(coord) {
                let contribution = tile.ceiling_contribution();
                if contribution > grid.ceilings[index] {
                    grid.ceilings[index] = contribution;
                }
            }
        }

        grid
    }

    /// Dimensions of the shroud grid, map size plus padding per axis.
    #[must_use]
    pub const fn size(&self) -> GridSize {
        self.size
    }

    /// Margin folded into every coordinate so elevation never underflows.
    #[must_use]
    pub const fn padding(&self) -> i32 {
        self.padding
    }

    /// Highest elevation the originating map declared.
    #[must_use]
    pub const fn max_elevation(&self) -> i32 {
        self.max_elevation
    }

    /// Folds a tile position into this grid's coordinate space.
    #[must_use]
    pub fn shroud_coordinate(&self, position: TilePosition) -> ShroudCoordinate {
        transform::tile_to_shroud(position, self.padding)
    }

    /// Decoded state of the cell at the provided coordinate.
    ///
    /// Coordinates outside the grid read as unexplored with no flags; the
    /// padded grid boundary is off the playable map by construction.
    #[must_use]
    pub fn cell_state(&self, coord: ShroudCoordinate) -> CellState {
        self.index(coord)
            .map_or_else(CellState::default, |index| {
                CellState::unpack(self.cells[index])
            })
    }

    /// Recorded terrain ceiling at the provided coordinate, if it is in range.
    #[must_use]
    pub fn ceiling_at(&self, coord: ShroudCoordinate) -> Option<i32> {
        self.index(coord).map(|index| self.ceilings[index])
    }

    /// Applies a type and flag mutation to every cell inside a biased circle.
    ///
    /// A cell participates when its squared distance to `center` is at most
    /// `radius² + RADIUS_BIAS`, its recorded ceiling is below
    /// `elevation_ceiling + CEILING_SLACK`, and its current type is in
    /// `allowed`. A non-finite radius covers the entire grid instead of
    /// iterating an unbounded circle. Coordinates whose stored byte actually
    /// changed are appended to `changed`.
    pub fn set_cells_in_radius(
        &mut self,
        center: ShroudCoordinate,
        radius: f64,
        elevation_ceiling: f64,
        new_type: Option<ShroudType>,
        allowed: TypeSet,
        flag_op: Option<FlagOp>,
        changed: &mut Vec<ShroudCoordinate>,
    ) {
        if !radius.is_finite() {
            for index in 0..self.cells.len() {
                self.apply_cell(index, elevation_ceiling, new_type, allowed, flag_op, changed);
            }
            return;
        }

        if radius < 0.0 {
            return;
        }

        let limit = radius * radius + RADIUS_BIAS;
        let reach = radius.ceil() as i32 + 1;
        let width = self.size.width() as i32;
        let height = self.size.height() as i32;

        let min_sx = (center.sx() - reach).max(0);
        let max_sx = (center.sx() + reach).min(width - 1);
        let min_sy = (center.sy() - reach).max(0);
        let max_sy = (center.sy() + reach).min(height - 1);

        for sy in min_sy..=max_sy {
            for sx in min_sx..=max_sx {
                let dx = i64::from(sx - center.sx());
                let dy = i64::from(sy - center.sy());
                if (dx * dx + dy * dy) as f64 > limit {
                    continue;
                }

                let index = (sy * width + sx) as usize;
                self.apply_cell(index, elevation_ceiling, new_type, allowed, flag_op, changed);
            }
        }
    }

    fn apply_cell(
        &mut self,
        index: usize,
        elevation_ceiling: f64,
        new_type: Option<ShroudType>,
        allowed: TypeSet,
        flag_op: Option<FlagOp>,
        changed: &mut Vec<ShroudCoordinate>,
    ) {
        if f64::from(self.ceilings[index]) >= elevation_ceiling + CEILING_SLACK {
            return;
        }

        let current = CellState::unpack(self.cells[index]);
        if !allowed.contains(current.shroud_type()) {
            return;
        }

        let mut next = current;
        if let Some(shroud_type) = new_type {
            next = next.with_type(shroud_type);
        }
        match flag_op {
            Some(FlagOp::Set(flags)) => next = next.with_flags(next.flags().with(flags)),
            Some(FlagOp::Clear(flags)) => next = next.with_flags(next.flags().without(flags)),
            None => {}
        }

        let packed = next.pack();
        if packed != self.cells[index] {
            self.cells[index] = packed;
            changed.push(self.coordinate_of(index));
        }
    }

    /// Overwrites the visibility type of a single cell, flags untouched.
    ///
    /// Returns whether the stored state actually changed; out-of-range
    /// coordinates are ignored and report `false`.
    pub fn set_cell_type(&mut self, coord: ShroudCoordinate, shroud_type: ShroudType) -> bool {
        let Some(index) = self.index(coord) else {
            return false;
        };

        let packed = CellState::unpack(self.cells[index])
            .with_type(shroud_type)
            .pack();
        if packed == self.cells[index] {
            return false;
        }

        self.cells[index] = packed;
        true
    }

    /// Enumerates the in-range coordinates inside the biased circle around
    /// `center`, in row-major order. A non-finite radius yields every cell.
    #[must_use]
    pub fn coordinates_in_radius(
        &self,
        center: ShroudCoordinate,
        radius: f64,
    ) -> Vec<ShroudCoordinate> {
        let mut coords = Vec::new();

        if !radius.is_finite() {
            for index in 0..self.cells.len() {
                coords.push(self.coordinate_of(index));
            }
            return coords;
        }

        if radius < 0.0 {
            return coords;
        }

        let limit = radius * radius + RADIUS_BIAS;
        let reach = radius.ceil() as i32 + 1;
        let width = self.size.width() as i32;
        let height = self.size.height() as i32;

        let min_sx = (center.sx() - reach).max(0);
        let max_sx = (center.sx() + reach).min(width - 1);
        let min_sy = (center.sy() - reach).max(0);
        let max_sy = (center.sy() + reach).min(height - 1);

        for sy in min_sy..=max_sy {
            for sx in min_sx..=max_sx {
                let dx = i64::from(sx - center.sx());
                let dy = i64::from(sy - center.sy());
                if (dx * dx + dy * dy) as f64 <= limit {
                    coords.push(ShroudCoordinate::new(sx, sy));
                }
            }
        }

        coords
    }

    /// Combines another observer's grid into this one.
    ///
    /// Per cell the type becomes the maximum of both sides and the flags the
    /// bitwise or; a tile is visible to the pair if either observer sees it.
    /// Ceilings keep the per-cell maximum so the merged grid gates reveals at
    /// least as strictly as either parent. Dimensions must match exactly;
    /// there is no partial merge.
    pub fn merge_from(&mut self, other: &Self) -> Result<(), DimensionMismatch> {
        self.check_dimensions(other)?;

        for index in 0..self.cells.len() {
            let ours = CellState::unpack(self.cells[index]);
            let theirs = CellState::unpack(other.cells[index]);
            let merged = CellState::new(
                ours.shroud_type().max(theirs.shroud_type()),
                ours.flags().union(theirs.flags()),
            );
            self.cells[index] = merged.pack();
            self.ceilings[index] = self.ceilings[index].max(other.ceilings[index]);
        }

        Ok(())
    }

    /// Overwrites this grid's cells and ceilings with another's.
    pub fn copy_from(&mut self, other: &Self) -> Result<(), DimensionMismatch> {
        self.check_dimensions(other)?;
        self.cells.copy_from_slice(&other.cells);
        self.ceilings.copy_from_slice(&other.ceilings);
        Ok(())
    }

    /// Marks every cell explored, clearing all flags.
    pub fn reveal_all(&mut self) {
        let packed = CellState::new(ShroudType::Explored, CellFlags::NONE).pack();
        self.cells.fill(packed);
    }

    /// Marks every cell unexplored, clearing all flags.
    pub fn reset_all(&mut self) {
        self.cells.fill(0);
    }

    fn check_dimensions(&self, other: &Self) -> Result<(), DimensionMismatch> {
        if self.size == other.size {
            Ok(())
        } else {
            Err(DimensionMismatch {
                left: self.size,
                right: other.size,
            })
        }
    }

    fn index(&self, coord: ShroudCoordinate) -> Option<usize> {
        let width = i64::from(self.size.width());
        let height = i64::from(self.size.height());
        let sx = i64::from(coord.sx());
        let sy = i64::from(coord.sy());
        if sx >= 0 && sx < width && sy >= 0 && sy < height {
            usize::try_from(sy * width + sx).ok()
        } else {
            None
        }
    }

    fn coordinate_of(&self, index: usize) -> ShroudCoordinate {
        let width = self.size.width() as usize;
        ShroudCoordinate::new((index % width) as i32, (index / width) as i32)
    }
}

/// Query functions that provide read-only access to shroud state.
pub mod query {
    use super::ShroudGrid;
    use shroud_core::{CellFlags, CellState, ShroudType, TilePosition};

    /// Decoded cell state for the provided tile.
    #[must_use]
    pub fn cell_state(grid: &ShroudGrid, tile: TilePosition) -> CellState {
        grid.cell_state(grid.shroud_coordinate(tile))
    }

    /// Visibility classification for the provided tile.
    #[must_use]
    pub fn shroud_type(grid: &ShroudGrid, tile: TilePosition) -> ShroudType {
        cell_state(grid, tile).shroud_type()
    }

    /// Visibility classification for raw map coordinates and elevation.
    #[must_use]
    pub fn shroud_type_by_tile_coords(grid: &ShroudGrid, rx: i32, ry: i32, z: i32) -> ShroudType {
        shroud_type(grid, TilePosition::new(rx, ry, z))
    }

    /// Reports whether the tile is unexplored at its elevation plus `z_offset`.
    #[must_use]
    pub fn is_shrouded(grid: &ShroudGrid, tile: TilePosition, z_offset: i32) -> bool {
        let probe = TilePosition::new(tile.rx(), tile.ry(), tile.z() + z_offset);
        shroud_type(grid, probe) == ShroudType::Unexplored
    }

    /// Reports whether every one of the provided flags is set on the tile.
    #[must_use]
    pub fn is_flagged(grid: &ShroudGrid, tile: TilePosition, flags: CellFlags) -> bool {
        cell_state(grid, tile).flags().contains(flags)
    }

    /// Cell counts per visibility type across the whole grid.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct Coverage {
        /// Cells never seen by this observer.
        pub unexplored: usize,
        /// Cells currently lit by a temporary reveal.
        pub temporary_reveal: usize,
        /// Cells permanently explored.
        pub explored: usize,
    }

    /// Tallies the grid's cells by visibility type.
    #[must_use]
    pub fn coverage(grid: &ShroudGrid) -> Coverage {
        let mut tally = Coverage::default();
        for &byte in &grid.cells {
            match CellState::unpack(byte).shroud_type() {
                ShroudType::Unexplored => tally.unexplored += 1,
                ShroudType::TemporaryReveal => tally.temporary_reveal += 1,
                ShroudType::Explored => tally.explored += 1,
            }
        }
        tally
    }
}
