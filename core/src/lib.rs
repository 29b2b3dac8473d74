#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the Shroud engine.
//!
//! This crate defines the data surface that connects the authoritative shroud
//! grid, the pure per-concern systems, and the observer facade. Hosts describe
//! their map through the [`TileMap`] trait and their revealing objects through
//! [`SightSource`] values; the engine answers with [`ShroudChange`] events
//! drained once per simulation tick.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Simulation ticks that elapse per second of game time.
pub const BASE_TICKS_PER_SECOND: u32 = 15;

/// Seconds a temporary reveal stays lit before reverting.
pub const TEMPORARY_REVEAL_DURATION_SECONDS: u32 = 10;

/// Tick count a freshly seeded temporary reveal starts from.
pub const TEMPORARY_REVEAL_TICKS: u32 = BASE_TICKS_PER_SECOND * TEMPORARY_REVEAL_DURATION_SECONDS;

/// Visibility classification held by a single shroud cell.
///
/// The ordering is the reveal direction: merging two grids keeps the
/// per-cell maximum, and batched reveals never lower a cell's type.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[repr(u8)]
pub enum ShroudType {
    /// Never seen, or explicitly covered again.
    #[default]
    Unexplored = 0,
    /// Lit for a bounded number of ticks, then reverts.
    TemporaryReveal = 1,
    /// Permanently explored for this observer.
    Explored = 2,
}

impl ShroudType {
    /// Numeric encoding stored in the low bits of a packed cell.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Decodes a stored value, treating anything unknown as [`ShroudType::Unexplored`].
    #[must_use]
    pub const fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::TemporaryReveal,
            2 => Self::Explored,
            _ => Self::Unexplored,
        }
    }
}

/// Flag bits stored alongside the visibility type in a packed cell.
///
/// Flags are independent of the type: setting or clearing them never changes
/// the cell's [`ShroudType`], and merging grids combines flags with bitwise or.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct CellFlags(u8);

impl CellFlags {
    /// No flags set.
    pub const NONE: Self = Self(0);

    /// Dims tiles that were seen before but are outside current vision.
    pub const DARKEN: Self = Self(0b0000_0001);

    const MASK: u8 = 0b0001_1111;

    /// Raw flag bits, already shifted into flag space.
    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Reconstructs flags from raw bits, discarding bits outside flag space.
    #[must_use]
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits & Self::MASK)
    }

    /// Reports whether every flag in `other` is set on `self`.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns `self` with every flag in `other` additionally set.
    #[must_use]
    pub const fn with(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Returns `self` with every flag in `other` cleared.
    #[must_use]
    pub const fn without(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }

    /// Bitwise union of both flag sets.
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Reports whether no flag is set.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

/// Decoded per-cell shroud state.
///
/// The grid stores cells as packed bytes; this is the value hosts see.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct CellState {
    shroud_type: ShroudType,
    flags: CellFlags,
}

impl CellState {
    /// Creates a cell state from its two components.
    #[must_use]
    pub const fn new(shroud_type: ShroudType, flags: CellFlags) -> Self {
        Self { shroud_type, flags }
    }

    /// Visibility classification of the cell.
    #[must_use]
    pub const fn shroud_type(self) -> ShroudType {
        self.shroud_type
    }

    /// Flag bits carried by the cell.
    #[must_use]
    pub const fn flags(self) -> CellFlags {
        self.flags
    }

    /// Returns the state with a replacement visibility type, flags untouched.
    #[must_use]
    pub const fn with_type(self, shroud_type: ShroudType) -> Self {
        Self {
            shroud_type,
            flags: self.flags,
        }
    }

    /// Returns the state with replacement flags, type untouched.
    #[must_use]
    pub const fn with_flags(self, flags: CellFlags) -> Self {
        Self {
            shroud_type: self.shroud_type,
            flags,
        }
    }

    /// Encodes the state into one byte: type in the low three bits, flags above.
    #[must_use]
    pub const fn pack(self) -> u8 {
        self.shroud_type.as_u8() | (self.flags.bits() << 3)
    }

    /// Decodes a packed byte produced by [`CellState::pack`].
    #[must_use]
    pub const fn unpack(byte: u8) -> Self {
        Self {
            shroud_type: ShroudType::from_u8(byte & 0b0000_0111),
            flags: CellFlags::from_bits(byte >> 3),
        }
    }
}

/// Position of a tile on the map: grid coordinates plus elevation.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct TilePosition {
    rx: i32,
    ry: i32,
    z: i32,
}

impl TilePosition {
    /// Creates a new tile position.
    #[must_use]
    pub const fn new(rx: i32, ry: i32, z: i32) -> Self {
        Self { rx, ry, z }
    }

    /// Map column of the tile.
    #[must_use]
    pub const fn rx(&self) -> i32 {
        self.rx
    }

    /// Map row of the tile.
    #[must_use]
    pub const fn ry(&self) -> i32 {
        self.ry
    }

    /// Terrain elevation of the tile.
    #[must_use]
    pub const fn z(&self) -> i32 {
        self.z
    }
}

/// Index into the shroud grid's collapsed 2-D address space.
///
/// Multiple tile positions at different elevations can map to the same
/// shroud coordinate; the transform in the world crate folds elevation into
/// the index instead of storing one layer per height level.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct ShroudCoordinate {
    sx: i32,
    sy: i32,
}

impl ShroudCoordinate {
    /// Creates a new shroud coordinate.
    #[must_use]
    pub const fn new(sx: i32, sy: i32) -> Self {
        Self { sx, sy }
    }

    /// Horizontal index into the shroud grid.
    #[must_use]
    pub const fn sx(&self) -> i32 {
        self.sx
    }

    /// Vertical index into the shroud grid.
    #[must_use]
    pub const fn sy(&self) -> i32 {
        self.sy
    }
}

/// Width and height of a grid measured in whole cells.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct GridSize {
    width: u32,
    height: u32,
}

impl GridSize {
    /// Creates a new size descriptor with explicit dimensions.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Width of the grid in cells.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Height of the grid in cells.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }
}

impl fmt::Display for GridSize {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}x{}", self.width, self.height)
    }
}

/// Terrain classification consumed when recording elevation ceilings.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum TerrainKind {
    /// Ordinary walkable ground.
    #[default]
    Level,
    /// Cliff face; contributes one level less than its elevation so reveals
    /// from directly below are not blocked by the face itself.
    Cliff,
}

/// One cell of the host's isometric map, as consumed by grid construction.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Tile {
    /// Map coordinates and elevation of the tile.
    pub position: TilePosition,
    /// Terrain classification of the tile.
    pub terrain: TerrainKind,
}

impl Tile {
    /// Creates a new tile descriptor.
    #[must_use]
    pub const fn new(position: TilePosition, terrain: TerrainKind) -> Self {
        Self { position, terrain }
    }

    /// Elevation this tile records into the grid's ceiling array.
    ///
    /// Cliff tiles above ground level contribute `z - 1`.
    #[must_use]
    pub const fn ceiling_contribution(&self) -> i32 {
        match self.terrain {
            TerrainKind::Cliff if self.position.z() > 0 => self.position.z() - 1,
            _ => self.position.z(),
        }
    }
}

/// Read-only query surface of the host's tile map.
///
/// The grid consumes this once during construction to size itself and
/// precompute elevation ceilings; it holds no reference back afterwards.
pub trait TileMap {
    /// Dimensions of the map measured in tiles.
    fn size(&self) -> GridSize;

    /// Highest elevation any tile on the map can reach.
    fn max_tile_height(&self) -> i32;

    /// Snapshot of every tile on the map.
    fn tiles(&self) -> Vec<Tile>;

    /// Tile at the provided map coordinates, if one exists.
    fn tile_at(&self, rx: i32, ry: i32) -> Option<Tile>;
}

/// Dense, vector-backed [`TileMap`] implementation.
///
/// One slot per map coordinate; absent tiles read as `None`. Suitable for
/// hosts that assemble maps procedurally, and for tests.
#[derive(Clone, Debug)]
pub struct StaticTileMap {
    size: GridSize,
    max_tile_height: i32,
    slots: Vec<Option<Tile>>,
}

impl StaticTileMap {
    /// Creates an empty map with the provided dimensions and height limit.
    #[must_use]
    pub fn new(size: GridSize, max_tile_height: i32) -> Self {
        let capacity = size.width() as usize * size.height() as usize;
        Self {
            size,
            max_tile_height,
            slots: vec![None; capacity],
        }
    }

    /// Creates a map fully populated with level ground tiles at elevation zero.
    #[must_use]
    pub fn flat(size: GridSize) -> Self {
        let mut map = Self::new(size, 0);
        for ry in 0..size.height() as i32 {
            for rx in 0..size.width() as i32 {
                map.insert(Tile::new(TilePosition::new(rx, ry, 0), TerrainKind::Level));
            }
        }
        map
    }

    /// Places a tile at its own map coordinates; out-of-range tiles are ignored.
    pub fn insert(&mut self, tile: Tile) {
        if let Some(index) = self.index(tile.position.rx(), tile.position.ry()) {
            self.slots[index] = Some(tile);
        }
    }

    fn index(&self, rx: i32, ry: i32) -> Option<usize> {
        let width = i64::from(self.size.width());
        let height = i64::from(self.size.height());
        let rx = i64::from(rx);
        let ry = i64::from(ry);
        if rx >= 0 && rx < width && ry >= 0 && ry < height {
            usize::try_from(ry * width + rx).ok()
        } else {
            None
        }
    }
}

impl TileMap for StaticTileMap {
    fn size(&self) -> GridSize {
        self.size
    }

    fn max_tile_height(&self) -> i32 {
        self.max_tile_height
    }

    fn tiles(&self) -> Vec<Tile> {
        self.slots.iter().copied().flatten().collect()
    }

    fn tile_at(&self, rx: i32, ry: i32) -> Option<Tile> {
        self.index(rx, ry).and_then(|index| self.slots[index])
    }
}

/// Structural classification of a revealing object.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum StructureKind {
    /// Mobile unit.
    #[default]
    Unit,
    /// Ordinary building.
    Building,
    /// Wall segment built as a building; never grants vision.
    WallBuilding,
}

/// Minimal shape of an object that can reveal shroud.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SightSource {
    /// Tile the object currently occupies.
    pub tile: TilePosition,
    /// Additional elevation of the object above its tile.
    pub tile_elevation: i32,
    /// Vision radius measured in shroud cells.
    pub sight_radius: f64,
    /// Structural classification used to gate reveal eligibility.
    pub structure: StructureKind,
}

impl SightSource {
    /// Creates a new sight source descriptor.
    #[must_use]
    pub const fn new(
        tile: TilePosition,
        tile_elevation: i32,
        sight_radius: f64,
        structure: StructureKind,
    ) -> Self {
        Self {
            tile,
            tile_elevation,
            sight_radius,
            structure,
        }
    }

    /// Reports whether the source is any kind of building.
    #[must_use]
    pub const fn is_building(&self) -> bool {
        matches!(
            self.structure,
            StructureKind::Building | StructureKind::WallBuilding
        )
    }

    /// Reports whether the source is a wall built as a building.
    #[must_use]
    pub const fn is_wall_building(&self) -> bool {
        matches!(self.structure, StructureKind::WallBuilding)
    }

    /// Elevation the source reveals from: tile elevation plus its own offset.
    #[must_use]
    pub const fn reveal_elevation(&self) -> i32 {
        self.tile.z() + self.tile_elevation
    }
}

/// Change notification emitted after shroud state mutates.
///
/// At most one [`ShroudChange::Full`] or [`ShroudChange::Incremental`] event
/// is emitted per `update()` call; the bulk events are emitted synchronously
/// by their originating operations.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShroudChange {
    /// The entire surface must be repainted.
    Full,
    /// Only the listed cells changed.
    Incremental {
        /// Shroud cells whose stored state differs from before the tick,
        /// sorted and free of duplicates.
        cells: Vec<ShroudCoordinate>,
    },
    /// Every cell became explored at once.
    Clear,
    /// Every cell became unexplored at once.
    Cover,
}

/// Error raised when two grids of different dimensions are combined.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
#[error("grid dimensions differ: {left} vs {right}")]
pub struct DimensionMismatch {
    /// Dimensions of the grid receiving the operation.
    pub left: GridSize,
    /// Dimensions of the grid supplying the operation.
    pub right: GridSize,
}
