#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Observer-facing shroud facade and per-tick update driver.
//!
//! One [`ObserverShroud`] tracks fog-of-war for one observer (a player or a
//! spectator view). Reveal calls made during a tick only enqueue work; the
//! host calls [`ObserverShroud::update`] exactly once per simulation tick,
//! which drains the batched reveals, applies queued flag toggles, advances
//! temporary-reveal countdowns, and emits at most one change event into the
//! caller's event buffer. Hosts drain that buffer once per tick.

use shroud_core::{
    CellFlags, DimensionMismatch, ShroudChange, ShroudCoordinate, ShroudType, SightSource,
    TileMap, TilePosition,
};
use shroud_system_invalidation::InvalidationScheduler;
use shroud_system_temporary_reveal::TemporaryRevealTracker;
use shroud_world::{query, FlagOp, ShroudGrid, TypeSet};

/// Types an unreveal is allowed to overwrite; covering never touches
/// unexplored or temporarily revealed cells.
const UNREVEALABLE: TypeSet = TypeSet::empty().with(ShroudType::Explored);

/// Per-observer fog-of-war state with a batched, tick-driven update cycle.
#[derive(Debug)]
pub struct ObserverShroud {
    grid: ShroudGrid,
    scheduler: InvalidationScheduler,
    tracker: TemporaryRevealTracker,
    pending_flags: Vec<FlagToggle>,
    full_invalidation: bool,
}

#[derive(Clone, Copy, Debug)]
struct FlagToggle {
    center: ShroudCoordinate,
    radius: f64,
    op: FlagOp,
}

impl ObserverShroud {
    /// Builds a fully shrouded observer state sized from the provided map.
    #[must_use]
    pub fn from_tiles(map: &impl TileMap) -> Self {
        Self {
            grid: ShroudGrid::from_tiles(map),
            scheduler: InvalidationScheduler::new(),
            tracker: TemporaryRevealTracker::new(),
            pending_flags: Vec::new(),
            full_invalidation: false,
        }
    }

    /// Read-only access to the underlying grid.
    #[must_use]
    pub fn grid(&self) -> &ShroudGrid {
        &self.grid
    }

    /// Reports whether the tile is unexplored at its elevation plus `z_offset`.
    #[must_use]
    pub fn is_shrouded(&self, tile: TilePosition, z_offset: i32) -> bool {
        query::is_shrouded(&self.grid, tile, z_offset)
    }

    /// Visibility classification for the provided tile.
    #[must_use]
    pub fn shroud_type(&self, tile: TilePosition) -> ShroudType {
        query::shroud_type(&self.grid, tile)
    }

    /// Visibility classification for raw map coordinates and elevation.
    #[must_use]
    pub fn shroud_type_by_tile_coords(&self, rx: i32, ry: i32, z: i32) -> ShroudType {
        query::shroud_type_by_tile_coords(&self.grid, rx, ry, z)
    }

    /// Reports whether every one of the provided flags is set on the tile.
    #[must_use]
    pub fn is_flagged(&self, tile: TilePosition, flags: CellFlags) -> bool {
        query::is_flagged(&self.grid, tile, flags)
    }

    /// Enqueues vision for an object; resolved on the next [`Self::update`].
    pub fn reveal_from(&mut self, source: &SightSource) {
        self.scheduler.queue_source(&self.grid, source);
    }

    /// Enqueues an administrative area reveal with no elevation gating.
    pub fn reveal_around(&mut self, tile: TilePosition, radius: f64) {
        self.scheduler.queue_area(&self.grid, tile, radius);
    }

    /// Enqueues a fixed-radius reveal covering the object's own footprint.
    pub fn reveal_object(&mut self, source: &SightSource) {
        self.scheduler.queue_object(&self.grid, source);
    }

    /// Queues a flag toggle over an area; applied on the next [`Self::update`].
    pub fn toggle_flags_around(
        &mut self,
        tile: TilePosition,
        radius: f64,
        flags: CellFlags,
        set: bool,
    ) {
        let op = if set {
            FlagOp::Set(flags)
        } else {
            FlagOp::Clear(flags)
        };
        self.pending_flags.push(FlagToggle {
            center: self.grid.shroud_coordinate(tile),
            radius,
            op,
        });
    }

    /// Seeds a temporary reveal; the type flip happens on the next
    /// [`Self::update`] and reverts automatically when the countdown expires.
    pub fn reveal_temporarily(&mut self, source: &SightSource) {
        self.tracker.seed_source(&self.grid, source);
    }

    /// Immediately covers previously explored cells around the tile.
    ///
    /// Runs outside the batched cycle: the grid mutates now and the resulting
    /// incremental event (if any cell actually changed) is pushed before this
    /// call returns.
    pub fn unreveal_around(
        &mut self,
        tile: TilePosition,
        radius: f64,
        out_changes: &mut Vec<ShroudChange>,
    ) {
        let center = self.grid.shroud_coordinate(tile);
        let mut changed = Vec::new();
        self.grid.set_cells_in_radius(
            center,
            radius,
            f64::INFINITY,
            Some(ShroudType::Unexplored),
            UNREVEALABLE,
            None,
            &mut changed,
        );

        changed.sort_unstable();
        changed.dedup();
        if let Some(event) = notifier::decide(false, changed) {
            out_changes.push(event);
        }
    }

    /// Marks the whole map explored and emits exactly one clear event.
    ///
    /// Pending batched work is discarded; the bulk write supersedes it.
    pub fn reveal_all(&mut self, out_changes: &mut Vec<ShroudChange>) {
        self.discard_pending();
        self.grid.reveal_all();
        out_changes.push(ShroudChange::Clear);
    }

    /// Covers the whole map again and emits exactly one cover event.
    ///
    /// Pending batched work is discarded; the bulk write supersedes it.
    pub fn reset(&mut self, out_changes: &mut Vec<ShroudChange>) {
        self.discard_pending();
        self.grid.reset_all();
        out_changes.push(ShroudChange::Cover);
    }

    /// Requests a full repaint from the next [`Self::update`].
    pub fn invalidate_all(&mut self) {
        self.full_invalidation = true;
    }

    /// Detached copy of the grid; mutating it never affects this observer.
    #[must_use]
    pub fn clone_grid(&self) -> ShroudGrid {
        self.grid.clone()
    }

    /// Overwrites this observer's grid with another observer's.
    ///
    /// The next [`Self::update`] emits a full repaint event.
    pub fn copy_grid_from(&mut self, other: &ShroudGrid) -> Result<(), DimensionMismatch> {
        self.grid.copy_from(other)?;
        self.full_invalidation = true;
        Ok(())
    }

    /// Folds another observer's vision into this one.
    ///
    /// Per cell the stronger type and the union of flags win. The next
    /// [`Self::update`] emits a full repaint event.
    pub fn merge_grid_from(&mut self, other: &ShroudGrid) -> Result<(), DimensionMismatch> {
        self.grid.merge_from(other)?;
        self.full_invalidation = true;
        Ok(())
    }

    /// Advances the shroud by one simulation tick.
    ///
    /// Drains the batched reveals first, then applies queued flag toggles,
    /// then advances temporary-reveal countdowns; the combined change list is
    /// sorted, deduplicated, and collapsed into at most one event. Must be
    /// called exactly once per tick.
    pub fn update(&mut self, out_changes: &mut Vec<ShroudChange>) {
        let mut changed = Vec::new();

        self.scheduler.drain(&mut self.grid, &mut changed);

        for toggle in std::mem::take(&mut self.pending_flags) {
            self.grid.set_cells_in_radius(
                toggle.center,
                toggle.radius,
                f64::INFINITY,
                None,
                TypeSet::ALL,
                Some(toggle.op),
                &mut changed,
            );
        }

        self.tracker.tick(&mut self.grid, &mut changed);

        changed.sort_unstable();
        changed.dedup();

        let full = std::mem::take(&mut self.full_invalidation);
        if let Some(event) = notifier::decide(full, changed) {
            out_changes.push(event);
        }
    }

    fn discard_pending(&mut self) {
        self.scheduler.clear();
        self.tracker.clear();
        self.pending_flags.clear();
        self.full_invalidation = false;
    }
}

/// Collapses one tick's observations into at most one change event.
pub mod notifier {
    use shroud_core::{ShroudChange, ShroudCoordinate};

    /// Per-tick decision table.
    ///
    /// A requested full repaint wins outright and the incremental list is
    /// dropped, so consumers never redraw twice for one tick. Otherwise a
    /// non-empty list is reported as-is and an empty tick emits nothing.
    #[must_use]
    pub fn decide(full: bool, cells: Vec<ShroudCoordinate>) -> Option<ShroudChange> {
        if full {
            return Some(ShroudChange::Full);
        }
        if cells.is_empty() {
            None
        } else {
            Some(ShroudChange::Incremental { cells })
        }
    }
}

/// Folds several observers' grids into `target`, failing fast on the first
/// dimension mismatch.
///
/// Shared vision for an alliance or a spectator is the union of the members'
/// grids; this is a thin fold over [`ShroudGrid::merge_from`] with no state
/// of its own.
pub fn merge_visibility(
    target: &mut ShroudGrid,
    sources: &[&ShroudGrid],
) -> Result<(), DimensionMismatch> {
    for source in sources {
        target.merge_from(source)?;
    }
    Ok(())
}
