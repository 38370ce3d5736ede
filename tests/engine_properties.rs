//! End to end behavior of the placement engine: single and group placement, moves between grids,
//! stack pick up, gravity and rotation, driven through the public API only.
//!
//! Run: cargo test --test engine_properties

use bevy::prelude::{Entity, IVec2, IVec3};

use stackgrid::catalog::{DOMINO, ELL, LINE, PILLAR, SINGLE, SQUARE, TEE};
use stackgrid::{
    all_valid, move_shapes, GridChange, GridSpace, HeavyTag, MoveError, PlaceError,
    PlacementFlags, ShapeCatalog, ShapeId, ShapeTag, StackSelection, ZoneRegion,
    DEFAULT_GRID_HEIGHT,
};

fn snapshot(grid: &GridSpace) -> Vec<(IVec3, Entity)> {
    let mut cells: Vec<_> = grid.occupancy().collect();
    cells.sort_by_key(|(c, _)| (c.x, c.y, c.z));
    cells
}

fn entity(n: u32) -> Entity {
    Entity::from_raw(n)
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[test]
fn test_single_column_stack_and_fall() {
    let catalog = ShapeCatalog::standard();
    let cell = catalog.instantiate(SINGLE).unwrap();
    let mut grid = GridSpace::new([IVec2::ZERO], 3);
    let (bottom, top, third) = (entity(1), entity(2), entity(3));

    grid.place_shape(bottom, &cell, IVec3::ZERO, false).unwrap();
    grid.place_shape(top, &cell, IVec3::new(0, 1, 0), false).unwrap();

    let before = snapshot(&grid);
    let err = grid.place_shape(third, &cell, IVec3::ZERO, false).unwrap_err();
    assert!(err.results()[0].contains(PlacementFlags::OVERLAP));
    assert_eq!(before, snapshot(&grid));

    grid.remove_shape(bottom).unwrap();
    assert_eq!(vec![(IVec3::ZERO, top)], snapshot(&grid));
    assert_eq!(IVec3::ZERO, grid.shape(top).unwrap().root());
}

#[test]
fn test_domino_off_the_edge() {
    let catalog = ShapeCatalog::standard();
    let domino = catalog.instantiate(DOMINO).unwrap();
    let mut grid = GridSpace::new([IVec2::ZERO, IVec2::new(0, 1)], 3);

    let result = grid.validate_placement(IVec3::ZERO, &domino, false);
    assert_eq!(PlacementFlags::OUT_OF_BOUNDS_XZ, result.flags());
    assert_eq!(IVec3::new(1, 0, 0), result.failed_cells()[0].0);
    assert!(matches!(
        grid.place_shape(entity(1), &domino, IVec3::ZERO, false),
        Err(PlaceError::Blocked(_))
    ));
    assert_eq!(0, grid.occupied_cells());
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

#[test]
fn test_validation_is_idempotent() {
    let catalog = ShapeCatalog::standard();
    let mut grid = GridSpace::rectangle(4, 4, DEFAULT_GRID_HEIGHT);
    grid.add_zone(ZoneRegion::new(IVec3::new(2, 0, 0), 2, 2, 4).with_permissions(false, true));
    grid.place_shape(entity(1), &catalog.instantiate(SQUARE).unwrap(), IVec3::ZERO, false)
        .unwrap();

    for id in [SINGLE, DOMINO, LINE, ELL, TEE, SQUARE, PILLAR] {
        let shape = catalog.instantiate(id).unwrap();
        for x in -1..4 {
            for y in 0..3 {
                let root = IVec3::new(x, y, 1);
                let first = grid.validate_placement(root, &shape, false);
                assert_eq!(first, grid.validate_placement(root, &shape, false));
                assert_eq!(first, grid.validate_placement(root, &shape, false));
            }
        }
    }
}

#[test]
fn test_failed_group_writes_nothing() {
    let catalog = ShapeCatalog::standard();
    let mut grid = GridSpace::rectangle(3, 3, 3);
    grid.place_shape(entity(1), &catalog.instantiate(LINE).unwrap(), IVec3::new(0, 0, 2), false)
        .unwrap();
    let before = snapshot(&grid);

    // The square fits, the single cell next to it lands on the line
    let group = vec![
        (entity(2), catalog.instantiate(SQUARE).unwrap()),
        (
            entity(3),
            catalog.instantiate(SINGLE).unwrap().with_root(IVec3::new(1, 0, 2)),
        ),
    ];
    let err = grid.place_shape_group(&group, IVec3::ZERO, false).unwrap_err();
    assert!(err.results()[0].is_valid());
    assert_eq!(PlacementFlags::OVERLAP, err.results()[1].flags());
    assert_eq!(before, snapshot(&grid));
    assert!(!grid.contains_shape(entity(2)));
}

#[test]
fn test_failed_move_keeps_source() {
    let catalog = ShapeCatalog::standard();
    let mut shelf = GridSpace::rectangle(2, 2, 4);
    let mut truck = GridSpace::rectangle(2, 2, 2);
    let pillar = catalog.instantiate(PILLAR).unwrap();
    let cell = catalog.instantiate(SINGLE).unwrap();
    shelf.place_shape(entity(1), &pillar, IVec3::ZERO, false).unwrap();
    shelf.place_shape(entity(2), &cell, IVec3::new(0, 2, 0), false).unwrap();
    let before = snapshot(&shelf);

    let StackSelection::Stack(stack) = shelf.select_stack(IVec3::ZERO) else {
        panic!("expected a stack");
    };
    assert_eq!(vec![entity(1), entity(2)], stack);

    // Three levels don't fit under a height limit of two
    let err = move_shapes(&mut shelf, &mut truck, &stack, IVec3::ZERO, false).unwrap_err();
    assert!(matches!(err, MoveError::Blocked(_)));
    assert_eq!(before, snapshot(&shelf));
    assert_eq!(0, truck.occupied_cells());

    // The bottom level alone fits once the top is taken off first
    move_shapes(&mut shelf, &mut truck, &[entity(2)], IVec3::new(1, 0, 1), false).unwrap();
    move_shapes(&mut shelf, &mut truck, &[entity(1)], IVec3::ZERO, false).unwrap();
    assert_eq!(0, shelf.occupied_cells());
    assert_eq!(3, truck.occupied_cells());
}

#[test]
fn test_stacks_stay_inside_the_base_footprint() {
    let catalog = ShapeCatalog::standard();
    let mut grid = GridSpace::rectangle(4, 4, 6);
    let square = catalog.instantiate(SQUARE).unwrap();
    let domino = catalog.instantiate(DOMINO).unwrap();
    let cell = catalog.instantiate(SINGLE).unwrap();

    grid.place_shape(entity(1), &square, IVec3::new(1, 0, 1), false).unwrap();
    grid.place_shape(entity(2), &domino, IVec3::new(1, 1, 1), false).unwrap();
    grid.place_shape(entity(3), &cell, IVec3::new(2, 1, 2), false).unwrap();
    grid.place_shape(entity(4), &domino, IVec3::new(1, 2, 1), false).unwrap();
    grid.place_shape(entity(5), &cell, IVec3::new(2, 3, 1), false).unwrap();

    let StackSelection::Stack(stack) = grid.select_stack(IVec3::new(2, 0, 2)) else {
        panic!("expected a stack");
    };
    assert_eq!(5, stack.len());
    let footprint = grid.shape(stack[0]).unwrap().footprint();
    for member in &stack {
        assert!(grid.shape(*member).unwrap().footprint().is_subset(&footprint));
    }

    // A domino sticking out past the square spoils the pick up
    let overhang = entity(6);
    let mut turned = domino.clone();
    turned.rotate(true);
    grid.place_shape(overhang, &turned, IVec3::new(2, 2, 3), false).unwrap();
    assert_eq!(
        StackSelection::Overhang(overhang),
        grid.select_stack(IVec3::new(1, 0, 1))
    );
}

#[test]
fn test_rotation_has_order_four() {
    let catalog = ShapeCatalog::standard();
    for template in catalog.templates() {
        let original = catalog
            .instantiate(template.id())
            .unwrap()
            .with_root(IVec3::new(2, 1, -3));
        for clockwise in [true, false] {
            let mut shape = original.clone();
            for _ in 0..4 {
                shape.rotate(clockwise);
            }
            assert_eq!(original, shape);
        }
    }
}

#[test]
fn test_gravity_conserves_cells() {
    let catalog = ShapeCatalog::standard();
    let mut grid = GridSpace::rectangle(3, 3, 8);
    let cell = catalog.instantiate(SINGLE).unwrap();
    let ell = catalog.instantiate(ELL).unwrap();
    let pillar = catalog.instantiate(PILLAR).unwrap();

    grid.place_shape(entity(1), &catalog.instantiate(SQUARE).unwrap(), IVec3::ZERO, false)
        .unwrap();
    grid.place_shape(entity(2), &ell, IVec3::new(0, 1, 0), false).unwrap();
    grid.place_shape(entity(3), &pillar, IVec3::new(1, 1, 1), false).unwrap();
    grid.place_shape(entity(4), &cell, IVec3::new(0, 2, 0), false).unwrap();
    grid.place_shape(entity(5), &cell, IVec3::new(1, 3, 1), false).unwrap();
    grid.place_shape(entity(6), &cell, IVec3::new(2, 0, 2), false).unwrap();
    grid.place_shape(entity(7), &cell, IVec3::new(2, 1, 2), false).unwrap();

    let total = grid.occupied_cells();
    let square_cells = 4;
    grid.remove_shape(entity(1)).unwrap();

    assert_eq!(total - square_cells, grid.occupied_cells());
    assert!(grid.find_inconsistencies().is_empty());
    // Nothing is left hanging in the air
    for (shape_entity, _) in grid.shapes() {
        assert!(!grid.is_unsupported(shape_entity), "{shape_entity:?} is hanging");
    }
    assert_eq!(IVec3::ZERO, grid.shape(entity(2)).unwrap().root());
    assert_eq!(IVec3::new(1, 0, 1), grid.shape(entity(3)).unwrap().root());
    assert_eq!(IVec3::new(0, 1, 0), grid.shape(entity(4)).unwrap().root());
    assert_eq!(IVec3::new(1, 2, 1), grid.shape(entity(5)).unwrap().root());
    assert_eq!(IVec3::new(2, 1, 2), grid.shape(entity(7)).unwrap().root());

    let falls = grid
        .drain_changes()
        .filter(|change| matches!(change, GridChange::Fell(_)))
        .count();
    assert_eq!(4, falls);
}

#[test]
fn test_move_from_locked_zone() {
    let catalog = ShapeCatalog::standard();
    let mut shelf = GridSpace::rectangle(2, 1, 2);
    let mut floor = GridSpace::rectangle(2, 1, 2);
    let zone = shelf.add_zone(ZoneRegion::new(IVec3::ZERO, 1, 2, 1).with_permissions(true, false));
    let cell = catalog.instantiate(SINGLE).unwrap();
    shelf.place_shape(entity(1), &cell, IVec3::ZERO, false).unwrap();

    assert_eq!(
        Err(MoveError::ZoneLocked(entity(1))),
        move_shapes(&mut shelf, &mut floor, &[entity(1)], IVec3::ZERO, false)
    );
    shelf.set_zone_permissions(zone, true, true);
    move_shapes(&mut shelf, &mut floor, &[entity(1)], IVec3::ZERO, false).unwrap();
    assert!(floor.contains_shape(entity(1)));
}

#[test]
fn test_heavy_catalog_shape() {
    let catalog = ShapeCatalog::from_json(
        r#"[{"id": 40, "name": "anvil", "offsets": [[0, 0, 0]], "tags": ["heavy"]}]"#,
    )
    .unwrap();
    let anvil = catalog.instantiate(ShapeId::Known(40)).unwrap();
    assert_eq!(&[ShapeTag::from(HeavyTag)], anvil.tags());

    let mut grid = GridSpace::rectangle(1, 2, 3);
    grid.place_shape(entity(1), &anvil, IVec3::ZERO, false).unwrap();
    let on_top = grid.validate_placement(IVec3::Y, &anvil, false);
    assert_eq!(PlacementFlags::TAG_RULE, on_top.flags());
    assert!(all_valid(&grid.validate_move(&[entity(1)], IVec3::new(0, 0, 1), false)));
    assert!(!all_valid(&grid.validate_move(&[entity(1)], IVec3::new(0, 1, 1), false)));
}

#[test]
fn test_rotated_shape_keeps_catalog_id() {
    let catalog = ShapeCatalog::standard();
    let mut grid = GridSpace::rectangle(4, 4, 2);
    let tee = catalog.instantiate(TEE).unwrap();
    grid.place_shape(entity(1), &tee, IVec3::new(0, 0, 2), false).unwrap();

    grid.rotate_shapes(&[entity(1)], true).unwrap();
    let rotated = grid.shape(entity(1)).unwrap();
    assert_eq!(TEE, catalog.determine_shape_id(rotated.offsets()));
    assert_eq!(TEE, rotated.id());
}
