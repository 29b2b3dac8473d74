use shroud_core::{
    CellFlags, GridSize, ShroudChange, ShroudType, SightSource, StaticTileMap, StructureKind,
    TerrainKind, Tile, TilePosition, TEMPORARY_REVEAL_TICKS,
};
use shroud_engine::{merge_visibility, ObserverShroud};
use shroud_world::query;

fn flat_observer(side: u32) -> ObserverShroud {
    ObserverShroud::from_tiles(&StaticTileMap::flat(GridSize::new(side, side)))
}

fn tile(rx: i32, ry: i32) -> TilePosition {
    TilePosition::new(rx, ry, 0)
}

#[test]
fn reveal_radius_is_contained_and_tight() {
    let mut shroud = flat_observer(30);
    let mut events = Vec::new();

    shroud.reveal_around(tile(10, 10), 5.0);
    shroud.update(&mut events);

    for ry in 0..30 {
        for rx in 0..30 {
            let dx = i64::from(rx - 10);
            let dy = i64::from(ry - 10);
            if dx * dx + dy * dy <= 25 {
                assert!(
                    !shroud.is_shrouded(tile(rx, ry), 0),
                    "tile ({rx}, {ry}) inside the radius stayed shrouded"
                );
            }
        }
    }
    assert!(shroud.is_shrouded(tile(16, 10), 0), "distance six leaked");

    assert_eq!(events.len(), 1);
    assert!(matches!(events[0], ShroudChange::Incremental { .. }));
}

#[test]
fn batched_reveals_never_lower_a_cell() {
    let mut shroud = flat_observer(20);
    let mut events = Vec::new();

    shroud.reveal_around(tile(6, 6), 4.0);
    shroud.update(&mut events);

    let before: Vec<ShroudType> = (0..20)
        .flat_map(|ry| (0..20).map(move |rx| (rx, ry)))
        .map(|(rx, ry)| shroud.shroud_type(tile(rx, ry)))
        .collect();

    shroud.reveal_around(tile(8, 8), 3.0);
    shroud.reveal_around(tile(6, 6), 2.0);
    shroud.update(&mut events);

    let after: Vec<ShroudType> = (0..20)
        .flat_map(|ry| (0..20).map(move |rx| (rx, ry)))
        .map(|(rx, ry)| shroud.shroud_type(tile(rx, ry)))
        .collect();

    for (index, (old, new)) in before.iter().zip(after.iter()).enumerate() {
        assert!(new >= old, "cell {index} regressed from {old:?} to {new:?}");
    }
}

#[test]
fn temporary_reveal_expires_on_schedule() {
    let mut shroud = flat_observer(16);
    let mut events = Vec::new();
    let flare = SightSource::new(tile(5, 5), 0, 1.0, StructureKind::Unit);

    shroud.reveal_temporarily(&flare);
    assert!(shroud.is_shrouded(tile(5, 5), 0), "flip waits for update");

    for _ in 0..TEMPORARY_REVEAL_TICKS - 1 {
        shroud.update(&mut events);
    }
    assert_eq!(shroud.shroud_type(tile(5, 5)), ShroudType::TemporaryReveal);

    shroud.update(&mut events);
    assert_eq!(shroud.shroud_type(tile(5, 5)), ShroudType::Unexplored);
}

#[test]
fn permanent_exploration_outlives_a_temporary_reveal() {
    let mut shroud = flat_observer(16);
    let mut events = Vec::new();
    let flare = SightSource::new(tile(5, 5), 0, 1.0, StructureKind::Unit);

    shroud.reveal_temporarily(&flare);
    shroud.update(&mut events);
    assert_eq!(shroud.shroud_type(tile(5, 5)), ShroudType::TemporaryReveal);

    shroud.reveal_around(tile(5, 5), 1.0);
    for _ in 0..TEMPORARY_REVEAL_TICKS {
        shroud.update(&mut events);
    }

    assert_eq!(shroud.shroud_type(tile(5, 5)), ShroudType::Explored);
}

#[test]
fn each_update_emits_at_most_one_event() {
    let mut shroud = flat_observer(16);
    let mut events = Vec::new();

    // Many overlapping requests in one tick still collapse into one event.
    shroud.reveal_around(tile(4, 4), 3.0);
    shroud.reveal_around(tile(5, 5), 3.0);
    shroud.reveal_around(tile(6, 6), 3.0);
    shroud.update(&mut events);
    assert_eq!(events.len(), 1);

    // A quiet tick emits nothing.
    events.clear();
    shroud.update(&mut events);
    assert!(events.is_empty());
}

#[test]
fn incremental_lists_are_sorted_and_deduplicated() {
    let mut shroud = flat_observer(16);
    let mut events = Vec::new();

    shroud.reveal_around(tile(7, 7), 4.0);
    shroud.reveal_around(tile(8, 7), 4.0);
    shroud.update(&mut events);

    let ShroudChange::Incremental { cells } = &events[0] else {
        panic!("expected an incremental event, got {:?}", events[0]);
    };
    let mut sorted = cells.clone();
    sorted.sort_unstable();
    sorted.dedup();
    assert_eq!(&sorted, cells);
}

#[test]
fn full_invalidation_beats_the_incremental_list() {
    let mut shroud = flat_observer(12);
    let mut events = Vec::new();

    shroud.reveal_around(tile(5, 5), 3.0);
    shroud.invalidate_all();
    shroud.update(&mut events);

    assert_eq!(events, vec![ShroudChange::Full]);

    // The reveal itself still landed on the grid.
    assert!(!shroud.is_shrouded(tile(5, 5), 0));
}

#[test]
fn merging_another_grid_requests_a_full_repaint() {
    let mut left = flat_observer(12);
    let mut right = flat_observer(12);
    let mut events = Vec::new();

    right.reveal_around(tile(3, 3), 2.0);
    right.update(&mut events);

    events.clear();
    left.merge_grid_from(right.grid()).expect("equal dimensions");
    left.update(&mut events);

    assert_eq!(events, vec![ShroudChange::Full]);
    assert!(!left.is_shrouded(tile(3, 3), 0));
}

#[test]
fn unreveal_is_immediate_and_emits_its_own_event() {
    let mut shroud = flat_observer(16);
    let mut events = Vec::new();

    shroud.reveal_around(tile(8, 8), 4.0);
    shroud.update(&mut events);
    assert!(!shroud.is_shrouded(tile(8, 8), 0));

    events.clear();
    shroud.unreveal_around(tile(8, 8), 4.0, &mut events);

    // No update() needed: the grid and the event are already final.
    assert!(shroud.is_shrouded(tile(8, 8), 0));
    assert_eq!(events.len(), 1);
    assert!(matches!(events[0], ShroudChange::Incremental { .. }));

    // Covering an already-covered area reports nothing.
    events.clear();
    shroud.unreveal_around(tile(8, 8), 4.0, &mut events);
    assert!(events.is_empty());
}

#[test]
fn bulk_operations_emit_exactly_one_fixed_event() {
    let mut shroud = flat_observer(10);
    let mut events = Vec::new();

    shroud.reveal_all(&mut events);
    assert_eq!(events, vec![ShroudChange::Clear]);
    for ry in 0..10 {
        for rx in 0..10 {
            assert!(!shroud.is_shrouded(tile(rx, ry), 0));
        }
    }

    events.clear();
    shroud.reset(&mut events);
    assert_eq!(events, vec![ShroudChange::Cover]);
    for ry in 0..10 {
        for rx in 0..10 {
            assert!(shroud.is_shrouded(tile(rx, ry), 0));
        }
    }
}

#[test]
fn bulk_operations_discard_pending_batched_work() {
    let mut shroud = flat_observer(10);
    let mut events = Vec::new();

    shroud.reveal_around(tile(4, 4), 3.0);
    shroud.reset(&mut events);

    events.clear();
    shroud.update(&mut events);
    assert!(events.is_empty(), "discarded reveal still resolved");
    assert!(shroud.is_shrouded(tile(4, 4), 0));
}

#[test]
fn flag_toggles_batch_into_the_tick_event() {
    let mut shroud = flat_observer(12);
    let mut events = Vec::new();

    shroud.toggle_flags_around(tile(5, 5), 2.0, CellFlags::DARKEN, true);
    assert!(!shroud.is_flagged(tile(5, 5), CellFlags::DARKEN));

    shroud.update(&mut events);
    assert_eq!(events.len(), 1);
    assert!(shroud.is_flagged(tile(5, 5), CellFlags::DARKEN));
    assert_eq!(shroud.shroud_type(tile(5, 5)), ShroudType::Unexplored);

    events.clear();
    shroud.toggle_flags_around(tile(5, 5), 2.0, CellFlags::DARKEN, false);
    shroud.update(&mut events);
    assert_eq!(events.len(), 1);
    assert!(!shroud.is_flagged(tile(5, 5), CellFlags::DARKEN));
}

#[test]
fn wall_buildings_grant_no_vision() {
    let mut shroud = flat_observer(12);
    let mut events = Vec::new();

    let wall = SightSource::new(tile(6, 6), 0, 8.0, StructureKind::WallBuilding);
    shroud.reveal_from(&wall);
    shroud.update(&mut events);

    assert!(events.is_empty());
    assert!(shroud.is_shrouded(tile(6, 6), 0));

    let building = SightSource::new(tile(6, 6), 0, 8.0, StructureKind::Building);
    shroud.reveal_from(&building);
    shroud.update(&mut events);
    assert!(!shroud.is_shrouded(tile(6, 6), 0));
}

#[test]
fn tall_terrain_blocks_vision_from_far_below() {
    let mut map = StaticTileMap::new(GridSize::new(20, 20), 10);
    for ry in 0..20 {
        for rx in 0..20 {
            map.insert(Tile::new(TilePosition::new(rx, ry, 0), TerrainKind::Level));
        }
    }
    map.insert(Tile::new(TilePosition::new(3, 3, 10), TerrainKind::Level));
    let mut shroud = ObserverShroud::from_tiles(&map);
    let mut events = Vec::new();

    let observer = SightSource::new(tile(8, 8), 0, 20.0, StructureKind::Unit);
    shroud.reveal_from(&observer);
    shroud.update(&mut events);

    assert!(
        shroud.is_shrouded(TilePosition::new(3, 3, 10), 0),
        "terrain at ceiling ten must block a ground-level reveal"
    );
    assert!(!shroud.is_shrouded(tile(8, 8), 0));
}

#[test]
fn clones_match_the_original_and_stay_independent() {
    let mut shroud = flat_observer(12);
    let mut events = Vec::new();

    shroud.reveal_around(tile(4, 4), 3.0);
    shroud.update(&mut events);

    let snapshot = shroud.clone_grid();
    for ry in 0..12 {
        for rx in 0..12 {
            assert_eq!(
                query::shroud_type(&snapshot, tile(rx, ry)),
                shroud.shroud_type(tile(rx, ry))
            );
        }
    }

    // Later mutation of the observer leaves the snapshot behind.
    shroud.reveal_all(&mut events);
    assert_eq!(
        query::shroud_type(&snapshot, tile(0, 0)),
        ShroudType::Unexplored
    );
}

#[test]
fn merged_vision_is_the_union_and_merge_is_idempotent() {
    let mut events = Vec::new();

    let mut left = flat_observer(14);
    left.reveal_around(tile(3, 3), 2.0);
    left.update(&mut events);

    let mut right = flat_observer(14);
    right.reveal_around(tile(10, 10), 2.0);
    right.toggle_flags_around(tile(10, 10), 2.0, CellFlags::DARKEN, true);
    right.update(&mut events);

    let mut ab = left.clone_grid();
    merge_visibility(&mut ab, &[right.grid()]).expect("equal dimensions");

    let mut ba = right.clone_grid();
    merge_visibility(&mut ba, &[left.grid()]).expect("equal dimensions");

    for ry in 0..14 {
        for rx in 0..14 {
            let position = tile(rx, ry);
            let expected_type = query::shroud_type(left.grid(), position)
                .max(query::shroud_type(right.grid(), position));
            assert_eq!(query::shroud_type(&ab, position), expected_type);
            // Order of merging does not change the outcome.
            assert_eq!(
                query::cell_state(&ab, position),
                query::cell_state(&ba, position)
            );
        }
    }
    assert!(query::is_flagged(&ab, tile(10, 10), CellFlags::DARKEN));

    // Merging a constituent again changes nothing.
    let again = ab.clone();
    merge_visibility(&mut ab, &[left.grid()]).expect("equal dimensions");
    for ry in 0..14 {
        for rx in 0..14 {
            let position = tile(rx, ry);
            assert_eq!(
                query::cell_state(&ab, position),
                query::cell_state(&again, position)
            );
        }
    }
}

#[test]
fn merging_mismatched_observers_fails_fast() {
    let mut small = flat_observer(8);
    let large = flat_observer(10);

    let error = small
        .merge_grid_from(large.grid())
        .expect_err("dimensions differ");
    assert_eq!(error.left, GridSize::new(8, 8));
    assert_eq!(error.right, GridSize::new(10, 10));

    // A failed merge requests no repaint.
    let mut events = Vec::new();
    small.update(&mut events);
    assert!(events.is_empty());
}

#[test]
fn queries_answer_for_raw_tile_coordinates() {
    let mut shroud = flat_observer(12);
    let mut events = Vec::new();

    shroud.reveal_around(tile(6, 6), 1.0);
    shroud.update(&mut events);

    assert_eq!(
        shroud.shroud_type_by_tile_coords(6, 6, 0),
        ShroudType::Explored
    );
    assert_eq!(
        shroud.shroud_type_by_tile_coords(-5, -5, 0),
        ShroudType::Unexplored
    );
}
