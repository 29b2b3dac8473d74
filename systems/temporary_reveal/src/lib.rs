#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Decaying time-to-live map for temporarily revealed cells.
//!
//! Flares and scouting drops grant vision that reverts on its own: seeded
//! cells flip to [`ShroudType::TemporaryReveal`] on the tick after seeding,
//! count down once per tick, and flip back to unexplored when the countdown
//! runs out — unless something permanently explored them in the meantime.

use std::collections::HashMap;

use shroud_core::{ShroudCoordinate, ShroudType, SightSource, TEMPORARY_REVEAL_TICKS};
use shroud_world::ShroudGrid;

/// Tracks the remaining lifetime of every temporarily revealed cell.
#[derive(Debug, Default)]
pub struct TemporaryRevealTracker {
    remaining: HashMap<ShroudCoordinate, u32>,
}

impl TemporaryRevealTracker {
    /// Creates a tracker with no live entries.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds every cell within the source's sight radius at the full duration.
    ///
    /// Temporary vision has no elevation gating. Re-seeding a tracked cell
    /// refreshes it to the full duration. The actual type flip happens on the
    /// next [`TemporaryRevealTracker::tick`].
    pub fn seed_source(&mut self, grid: &ShroudGrid, source: &SightSource) {
        if source.sight_radius <= 0.0 {
            return;
        }

        let center = grid.shroud_coordinate(source.tile);
        for coord in grid.coordinates_in_radius(center, source.sight_radius) {
            let _ = self.remaining.insert(coord, TEMPORARY_REVEAL_TICKS);
        }
    }

    /// Advances every countdown by one tick, mutating the grid as entries
    /// start and expire.
    ///
    /// Entries are visited in sorted order so identical histories produce
    /// identical change lists. Fresh entries flip their cell from unexplored
    /// to temporarily revealed; cells that are already permanently explored
    /// are dropped untouched. Expiring entries flip back to unexplored only
    /// if the cell is still temporarily revealed. Every flip appends the
    /// coordinate to `changed`.
    pub fn tick(&mut self, grid: &mut ShroudGrid, changed: &mut Vec<ShroudCoordinate>) {
        if self.remaining.is_empty() {
            return;
        }

        let mut coords: Vec<ShroudCoordinate> = self.remaining.keys().copied().collect();
        coords.sort_unstable();

        for coord in coords {
            let Some(&ticks) = self.remaining.get(&coord) else {
                continue;
            };

            if ticks == TEMPORARY_REVEAL_TICKS {
                match grid.cell_state(coord).shroud_type() {
                    ShroudType::Unexplored => {
                        if grid.set_cell_type(coord, ShroudType::TemporaryReveal) {
                            changed.push(coord);
                        }
                    }
                    ShroudType::Explored => {
                        let _ = self.remaining.remove(&coord);
                        continue;
                    }
                    ShroudType::TemporaryReveal => {}
                }
            }

            if ticks <= 1 {
                if grid.cell_state(coord).shroud_type() == ShroudType::TemporaryReveal
                    && grid.set_cell_type(coord, ShroudType::Unexplored)
                {
                    changed.push(coord);
                }
                let _ = self.remaining.remove(&coord);
            } else {
                let _ = self.remaining.insert(coord, ticks - 1);
            }
        }
    }

    /// Drops every live entry without touching the grid.
    pub fn clear(&mut self) {
        self.remaining.clear();
    }

    /// Remaining ticks for a tracked cell, if it is still counting down.
    #[must_use]
    pub fn remaining_ticks(&self, coord: ShroudCoordinate) -> Option<u32> {
        self.remaining.get(&coord).copied()
    }

    /// Number of cells currently counting down.
    #[must_use]
    pub fn len(&self) -> usize {
        self.remaining.len()
    }

    /// Reports whether no cell is counting down.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.remaining.is_empty()
    }
}
