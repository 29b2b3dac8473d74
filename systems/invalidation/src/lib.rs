#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Batched reveal scheduler.
//!
//! Reveal requests accumulated during a tick are keyed by their center cell
//! and coalesced, so N objects revealing overlapping areas cost one grid pass
//! per distinct center rather than N redundant area writes. The accumulated
//! requests resolve against the grid in one deterministic pass on
//! [`InvalidationScheduler::drain`].

use std::collections::HashMap;

use shroud_core::{ShroudCoordinate, ShroudType, SightSource, TilePosition};
use shroud_world::{ShroudGrid, TypeSet};

/// Radius used when revealing just the footprint of an object.
pub const OBJECT_REVEAL_RADIUS: f64 = 4.25;

/// Types a batched reveal is allowed to overwrite; explored cells stay put.
const REVEALABLE: TypeSet = TypeSet::empty()
    .with(ShroudType::Unexplored)
    .with(ShroudType::TemporaryReveal);

/// Reveal request accumulated for one center cell.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PendingReveal {
    /// Shroud cell the reveal spreads from.
    pub center: ShroudCoordinate,
    /// Elevation the reveal originates at; terrain above it stays covered.
    pub elevation_ceiling: f64,
    /// Reveal radius measured in shroud cells.
    pub radius: f64,
}

/// Accumulates reveal requests during a tick and resolves them in one pass.
#[derive(Debug, Default)]
pub struct InvalidationScheduler {
    pending: HashMap<ShroudCoordinate, PendingReveal>,
}

impl InvalidationScheduler {
    /// Creates a scheduler with no pending work.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueues a reveal spreading from `center`.
    ///
    /// Repeated requests for the same center widen rather than replace: the
    /// entry keeps the maximum radius and maximum elevation ceiling seen.
    pub fn invalidate(&mut self, center: ShroudCoordinate, elevation_ceiling: f64, radius: f64) {
        let entry = self.pending.entry(center).or_insert(PendingReveal {
            center,
            elevation_ceiling,
            radius,
        });
        if radius > entry.radius {
            entry.radius = radius;
        }
        if elevation_ceiling > entry.elevation_ceiling {
            entry.elevation_ceiling = elevation_ceiling;
        }
    }

    /// Enqueues vision for an object, if it grants any.
    ///
    /// Wall segments built as buildings never reveal, and neither does a
    /// source without a positive sight radius. The reveal elevation is the
    /// source's tile elevation plus its own offset.
    pub fn queue_source(&mut self, grid: &ShroudGrid, source: &SightSource) {
        if source.is_wall_building() {
            return;
        }
        if source.sight_radius <= 0.0 {
            return;
        }

        self.invalidate(
            grid.shroud_coordinate(source.tile),
            f64::from(source.reveal_elevation()),
            source.sight_radius,
        );
    }

    /// Enqueues an administrative area reveal with no elevation gating.
    pub fn queue_area(&mut self, grid: &ShroudGrid, tile: TilePosition, radius: f64) {
        self.invalidate(grid.shroud_coordinate(tile), f64::INFINITY, radius);
    }

    /// Enqueues a fixed-radius reveal covering the object's own footprint.
    pub fn queue_object(&mut self, grid: &ShroudGrid, source: &SightSource) {
        self.invalidate(
            grid.shroud_coordinate(source.tile),
            f64::INFINITY,
            OBJECT_REVEAL_RADIUS,
        );
    }

    /// Resolves every pending reveal against the grid, then clears the map.
    ///
    /// Requests resolve in sorted center order so identical request sets
    /// produce identical grids and change lists regardless of insertion
    /// order. Each touched cell transitions to explored at most once per
    /// drain, so `changed` receives no duplicate coordinates.
    pub fn drain(&mut self, grid: &mut ShroudGrid, changed: &mut Vec<ShroudCoordinate>) {
        if self.pending.is_empty() {
            return;
        }

        let mut requests: Vec<PendingReveal> =
            self.pending.drain().map(|(_, request)| request).collect();
        requests.sort_by_key(|request| request.center);

        for request in requests {
            grid.set_cells_in_radius(
                request.center,
                request.radius,
                request.elevation_ceiling,
                Some(ShroudType::Explored),
                REVEALABLE,
                None,
                changed,
            );
        }
    }

    /// Discards every pending reveal without resolving it.
    pub fn clear(&mut self) {
        self.pending.clear();
    }

    /// Number of distinct centers with pending work.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Reports whether no reveal is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::{InvalidationScheduler, OBJECT_REVEAL_RADIUS};
    use shroud_core::{
        GridSize, ShroudCoordinate, SightSource, StaticTileMap, StructureKind, TilePosition,
    };
    use shroud_world::ShroudGrid;

    fn flat_grid(side: u32) -> ShroudGrid {
        ShroudGrid::from_tiles(&StaticTileMap::flat(GridSize::new(side, side)))
    }

    #[test]
    fn overlapping_requests_keep_the_widest_reveal() {
        let mut scheduler = InvalidationScheduler::new();
        let center = ShroudCoordinate::new(5, 5);

        scheduler.invalidate(center, 2.0, 3.0);
        scheduler.invalidate(center, 6.0, 1.0);
        scheduler.invalidate(center, 0.0, 8.0);

        assert_eq!(scheduler.len(), 1);

        let mut grid = flat_grid(20);
        let mut changed = Vec::new();
        scheduler.drain(&mut grid, &mut changed);

        // Radius eight survived the coalescing: distance seven is revealed.
        assert!(changed.contains(&ShroudCoordinate::new(12, 5)));
        assert!(scheduler.is_empty());
    }

    #[test]
    fn wall_buildings_and_blind_sources_enqueue_nothing() {
        let grid = flat_grid(10);
        let mut scheduler = InvalidationScheduler::new();

        scheduler.queue_source(
            &grid,
            &SightSource::new(
                TilePosition::new(3, 3, 0),
                0,
                9.0,
                StructureKind::WallBuilding,
            ),
        );
        scheduler.queue_source(
            &grid,
            &SightSource::new(TilePosition::new(3, 3, 0), 0, 0.0, StructureKind::Unit),
        );

        assert!(scheduler.is_empty());
    }

    #[test]
    fn object_reveals_use_the_fixed_footprint_radius() {
        let grid = flat_grid(16);
        let mut scheduler = InvalidationScheduler::new();
        let source = SightSource::new(TilePosition::new(8, 8, 0), 0, 0.0, StructureKind::Building);

        scheduler.queue_object(&grid, &source);

        let mut grid = grid;
        let mut changed = Vec::new();
        scheduler.drain(&mut grid, &mut changed);

        // 4.25² + 1 ≈ 19.06: distance four is inside, distance five is not.
        assert!(changed.contains(&ShroudCoordinate::new(12, 8)));
        assert!(!changed.contains(&ShroudCoordinate::new(13, 8)));
    }

    #[test]
    fn footprint_radius_matches_the_carried_constant() {
        assert!((OBJECT_REVEAL_RADIUS - 4.25).abs() < f64::EPSILON);
    }
}
