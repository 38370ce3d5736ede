//! Moving and rotating shapes that are already placed in a grid.
//!
//! A move lifts every shape out of the source grid, then either places the whole group at the
//! target or writes every shape back where it was. Gravity only runs once the move went through.

use crate::{
    grid::{sort_by_height, GridChange},
    rules::ShapeRule,
    GridSpace, MoveError, PlaceError, ShapeDescriptor, ValidationResult, ZoneRule,
};

use bevy::{
    ecs::entity::Entity,
    log::{debug, warn},
    math::IVec3,
    utils::HashSet,
};

/// The result of a successful relocation, before gravity ran
pub(crate) struct Relocation {
    pub(crate) entities: Vec<Entity>,
    pub(crate) vacated: Vec<IVec3>,
}

/// Move shapes from one grid to another, keeping their relative layout with the lowest shape
/// rooted at `target_root`. When the shapes don't fit, both grids are left untouched.
///
/// Unless `ignore_zones` is set, every shape's current root has to be in a zone that allows
/// taking, or in no zone at all.
pub fn move_shapes(
    source: &mut GridSpace,
    target: &mut GridSpace,
    entities: &[Entity],
    target_root: IVec3,
    ignore_zones: bool,
) -> Result<(), MoveError> {
    let moved = relocate(source, Some(&mut *target), entities, target_root, ignore_zones)?;
    debug!(
        "Moved {} shapes to another grid at {target_root}",
        moved.entities.len()
    );
    source.record(GridChange::Removed(moved.entities.clone()));
    target.record(GridChange::Placed(moved.entities));
    source.settle(moved.vacated);
    Ok(())
}

impl GridSpace {
    /// The same as [move_shapes], with this grid as both source and target
    pub fn move_within(
        &mut self,
        entities: &[Entity],
        target_root: IVec3,
        ignore_zones: bool,
    ) -> Result<(), MoveError> {
        let moved = relocate(self, None, entities, target_root, ignore_zones)?;
        debug!("Moved {} shapes to {target_root}", moved.entities.len());
        self.record(GridChange::Moved(moved.entities));
        self.settle(moved.vacated);
        Ok(())
    }

    /// Rotate shapes a quarter turn around the vertical axis through the origin. Bounds, zones
    /// and tags are not validated, check [GridSpace::validate_rotation] first when the result has
    /// to be valid. When a rotated shape would land on a shape outside the group, nothing is
    /// rotated and [PlaceError::Overwrites] is returned
    pub fn rotate_shapes(&mut self, entities: &[Entity], clockwise: bool) -> Result<(), PlaceError> {
        let mut lifted: Vec<(Entity, ShapeDescriptor)> = Vec::with_capacity(entities.len());
        for entity in entities {
            if lifted.iter().any(|(e, _)| e == entity) {
                continue;
            }
            match self.lift(*entity) {
                Some(shape) => lifted.push((*entity, shape)),
                None => warn!("Tried to rotate shape {entity:?} which is not in this grid"),
            }
        }
        if lifted.is_empty() {
            return Ok(());
        }

        let clash = lifted.iter().find_map(|(entity, shape)| {
            self.foreign_occupant(*entity, &shape.rotated(clockwise))
        });
        if let Some(occupant) = clash {
            warn!("Rotating would overwrite shape {occupant:?}, leaving the shapes as they were");
            for (entity, shape) in lifted {
                self.write(entity, shape);
            }
            return Err(PlaceError::Overwrites(occupant));
        }

        let rotated = lifted.iter().map(|(entity, _)| *entity).collect();
        for (entity, mut shape) in lifted {
            shape.rotate(clockwise);
            self.write(entity, shape);
        }
        self.record(GridChange::Rotated(rotated));
        Ok(())
    }

    /// Validate the shapes as [GridSpace::rotate_shapes] would leave them. Results are in the
    /// order the shapes were passed in, unknown shapes are skipped
    pub fn validate_rotation(
        &self,
        entities: &[Entity],
        clockwise: bool,
        ignore_zones: bool,
    ) -> Vec<ValidationResult> {
        entities
            .iter()
            .filter_map(|entity| self.shape(*entity))
            .map(|shape| {
                let rotated = shape.rotated(clockwise);
                self.validate_with(
                    rotated.root(),
                    &rotated,
                    ignore_zones,
                    entities,
                    &HashSet::default(),
                )
            })
            .collect()
    }
}

/// Lift the shapes out of `source` and place them into `target`, or back into `source` when no
/// target is given. Restores `source` when placing fails
pub(crate) fn relocate(
    source: &mut GridSpace,
    target: Option<&mut GridSpace>,
    entities: &[Entity],
    target_root: IVec3,
    ignore_zones: bool,
) -> Result<Relocation, MoveError> {
    if entities.is_empty() {
        warn!("Tried to move an empty list of shapes");
        return Err(MoveError::Empty);
    }

    let mut unique: Vec<Entity> = Vec::with_capacity(entities.len());
    for entity in entities {
        if unique.contains(entity) {
            continue;
        }
        let Some(shape) = source.shape(*entity) else {
            warn!("Tried to move shape {entity:?} which is not in the source grid");
            return Err(MoveError::UnknownShape(*entity));
        };
        if !ignore_zones && !source.check_zones(shape.root(), &[ZoneRule::CanTake]) {
            debug!("Shape {entity:?} is in a zone that doesn't allow taking");
            return Err(MoveError::ZoneLocked(*entity));
        }
        if !shape.tags().iter().all(|tag| tag.check_move()) {
            debug!("Shape {entity:?} has a tag that forbids moving");
            return Err(MoveError::TagLocked(*entity));
        }
        unique.push(*entity);
    }

    let mut lifted: Vec<(Entity, ShapeDescriptor)> = unique
        .iter()
        .filter_map(|entity| source.lift(*entity).map(|shape| (*entity, shape)))
        .collect();
    sort_by_height(&mut lifted);
    let vacated: Vec<IVec3> = lifted.iter().flat_map(|(_, shape)| shape.cells()).collect();

    let placed = match target {
        Some(target) => target.commit_group(lifted, target_root, ignore_zones),
        None => source.commit_group(lifted, target_root, ignore_zones),
    };
    match placed {
        Ok(()) => Ok(Relocation {
            entities: unique,
            vacated,
        }),
        Err((lifted, results)) => {
            // Nothing was written at the target, the roots are still the original ones
            for (entity, shape) in lifted {
                source.write(entity, shape);
            }
            Err(MoveError::Blocked(results))
        }
    }
}

#[cfg(test)]
fn sorted_cells(grid: &GridSpace) -> Vec<(IVec3, Entity)> {
    let mut cells: Vec<_> = grid.occupancy().collect();
    cells.sort_by_key(|(c, _)| (c.x, c.y, c.z));
    cells
}

#[test]
fn test_move_between_grids() {
    let mut source = GridSpace::rectangle(2, 2, 3);
    let mut target = GridSpace::rectangle(3, 3, 3);
    let (a, b) = (Entity::from_raw(1), Entity::from_raw(2));
    let domino = ShapeDescriptor::custom([IVec3::ZERO, IVec3::new(1, 0, 0)]);
    source.place_shape(a, &domino, IVec3::ZERO, false).unwrap();
    source.place_shape(b, &domino, IVec3::Y, false).unwrap();
    source.drain_changes().for_each(drop);

    move_shapes(&mut source, &mut target, &[b, a], IVec3::new(1, 0, 2), false).unwrap();

    assert_eq!(0, source.occupied_cells());
    assert_eq!(0, source.shape_count());
    assert_eq!(IVec3::new(1, 0, 2), target.shape(a).unwrap().root());
    assert_eq!(IVec3::new(1, 1, 2), target.shape(b).unwrap().root());
    assert_eq!(4, target.occupied_cells());
    assert_eq!(
        vec![GridChange::Removed(vec![b, a])],
        source.drain_changes().collect::<Vec<_>>()
    );
    assert_eq!(
        vec![GridChange::Placed(vec![b, a])],
        target.drain_changes().collect::<Vec<_>>()
    );
}

#[test]
fn test_failed_move_rolls_back() {
    let mut source = GridSpace::rectangle(2, 2, 3);
    let mut target = GridSpace::rectangle(1, 1, 3);
    let (a, b) = (Entity::from_raw(1), Entity::from_raw(2));
    let cell = ShapeDescriptor::custom([IVec3::ZERO]);
    let domino = ShapeDescriptor::custom([IVec3::ZERO, IVec3::new(1, 0, 0)]);
    source.place_shape(a, &cell, IVec3::ZERO, false).unwrap();
    source.place_shape(b, &domino, IVec3::Y, false).unwrap();
    source.drain_changes().for_each(drop);
    let before = sorted_cells(&source);

    // The domino on top doesn't fit in a single column
    let err = move_shapes(&mut source, &mut target, &[a, b], IVec3::ZERO, false).unwrap_err();
    let MoveError::Blocked(results) = err else {
        panic!("expected a blocked move, got {err:?}");
    };
    assert!(results[0].is_valid());
    assert!(!results[1].is_valid());

    assert_eq!(before, sorted_cells(&source));
    assert_eq!(IVec3::Y, source.shape(b).unwrap().root());
    assert_eq!(0, target.occupied_cells());
    assert!(!source.has_pending_changes());
    assert!(!target.has_pending_changes());
}

#[test]
fn test_move_preconditions() {
    use crate::rules::AnchoredTag;
    use crate::ZoneRegion;

    let mut source = GridSpace::rectangle(3, 1, 2);
    let mut target = GridSpace::rectangle(3, 1, 2);
    source.add_zone(ZoneRegion::new(IVec3::ZERO, 1, 2, 1).with_permissions(true, false));
    let cell = ShapeDescriptor::custom([IVec3::ZERO]);
    let (locked, anchored, free) = (Entity::from_raw(1), Entity::from_raw(2), Entity::from_raw(3));
    source.place_shape(locked, &cell, IVec3::ZERO, false).unwrap();
    source
        .place_shape(
            anchored,
            &cell.clone().with_tags([AnchoredTag.into()]),
            IVec3::new(1, 0, 0),
            false,
        )
        .unwrap();
    source.place_shape(free, &cell, IVec3::new(2, 0, 0), false).unwrap();

    assert_eq!(
        Err(MoveError::Empty),
        move_shapes(&mut source, &mut target, &[], IVec3::ZERO, false)
    );
    assert_eq!(
        Err(MoveError::ZoneLocked(locked)),
        move_shapes(&mut source, &mut target, &[free, locked], IVec3::ZERO, false)
    );
    assert_eq!(
        Err(MoveError::TagLocked(anchored)),
        move_shapes(&mut source, &mut target, &[anchored], IVec3::ZERO, true)
    );
    assert_eq!(
        Err(MoveError::UnknownShape(Entity::from_raw(9))),
        move_shapes(&mut source, &mut target, &[Entity::from_raw(9)], IVec3::ZERO, false)
    );
    assert_eq!(3, source.shape_count());
    assert_eq!(0, target.occupied_cells());

    // Ignoring zones lets the locked shape go
    move_shapes(&mut source, &mut target, &[locked], IVec3::ZERO, true).unwrap();
    assert!(target.contains_shape(locked));
}

#[test]
fn test_move_within_same_grid() {
    let mut grid = GridSpace::rectangle(3, 1, 2);
    let entity = Entity::from_raw(1);
    let domino = ShapeDescriptor::custom([IVec3::ZERO, IVec3::new(1, 0, 0)]);
    grid.place_shape(entity, &domino, IVec3::ZERO, false).unwrap();

    // Overlaps its own current cells, which are lifted first
    grid.move_within(&[entity], IVec3::new(1, 0, 0), false).unwrap();
    assert_eq!(IVec3::new(1, 0, 0), grid.shape(entity).unwrap().root());
    assert!(grid.is_open(IVec3::ZERO));
    assert_eq!(2, grid.occupied_cells());

    assert!(grid.move_within(&[entity], IVec3::new(2, 0, 0), false).is_err());
    assert_eq!(IVec3::new(1, 0, 0), grid.shape(entity).unwrap().root());
    assert!(grid.find_inconsistencies().is_empty());
}

#[test]
fn test_validate_move_ignores_own_cells() {
    let mut grid = GridSpace::rectangle(3, 1, 2);
    let entity = Entity::from_raw(1);
    let domino = ShapeDescriptor::custom([IVec3::ZERO, IVec3::new(1, 0, 0)]);
    grid.place_shape(entity, &domino, IVec3::ZERO, false).unwrap();

    assert!(crate::all_valid(&grid.validate_move(&[entity], IVec3::new(1, 0, 0), false)));
    assert!(!grid
        .validate_placement(IVec3::new(1, 0, 0), &domino, false)
        .is_valid());
}

#[test]
fn test_rotate_shapes() {
    use crate::PlacementFlags;

    let mut grid = GridSpace::rectangle(3, 3, 1);
    let entity = Entity::from_raw(1);
    let ell = ShapeDescriptor::custom([IVec3::ZERO, IVec3::new(1, 0, 0), IVec3::new(0, 0, 1)]);
    grid.place_shape(entity, &ell, IVec3::new(0, 0, 2), false).unwrap();

    // Root (0, 0, 2) turns to (2, 0, 0), offset (1, 0, 0) to (0, 0, -1), (0, 0, 1) to (1, 0, 0)
    let results = grid.validate_rotation(&[entity], true, false);
    assert_eq!(1, results.len());
    assert!(results[0].contains(PlacementFlags::OUT_OF_BOUNDS_XZ));
    assert_eq!(2, results[0].failed_cells().len());

    grid.rotate_shapes(&[entity], true).unwrap();
    let shape = grid.shape(entity).unwrap();
    assert_eq!(IVec3::new(2, 0, 0), shape.root());
    let mut cells: Vec<IVec3> = grid.cells_of(entity).collect();
    cells.sort_by_key(|c| (c.x, c.y, c.z));
    assert_eq!(
        vec![IVec3::new(2, 0, -1), IVec3::new(2, 0, 0), IVec3::new(3, 0, 0)],
        cells
    );
    assert_eq!(3, grid.occupied_cells());

    // Turning back is valid again
    assert!(crate::all_valid(&grid.validate_rotation(&[entity], false, false)));

    for _ in 0..3 {
        grid.rotate_shapes(&[entity], true).unwrap();
    }
    assert_eq!(IVec3::new(0, 0, 2), grid.shape(entity).unwrap().root());
    assert!(grid.find_inconsistencies().is_empty());
}

#[test]
fn test_rotation_never_overwrites() {
    let mut grid = GridSpace::rectangle(3, 3, 1);
    let (turning, blocker) = (Entity::from_raw(1), Entity::from_raw(2));
    let domino = ShapeDescriptor::custom([IVec3::ZERO, IVec3::new(1, 0, 0)]);
    let cell = ShapeDescriptor::custom([IVec3::ZERO]);
    grid.place_shape(turning, &domino, IVec3::new(0, 0, 1), false).unwrap();
    grid.place_shape(blocker, &cell, IVec3::new(1, 0, 0), false).unwrap();

    // Root (0, 0, 1) turns to (1, 0, 0) clockwise, where the blocker sits
    assert_eq!(
        Err(PlaceError::Overwrites(blocker)),
        grid.rotate_shapes(&[turning], true)
    );
    assert_eq!(IVec3::new(0, 0, 1), grid.shape(turning).unwrap().root());
    assert_eq!(Some(blocker), grid.occupant(IVec3::new(1, 0, 0)));
    assert!(grid.find_inconsistencies().is_empty());
}

#[test]
fn test_move_away_drops_shapes_left_behind() {
    let mut source = GridSpace::new([bevy::math::IVec2::ZERO], 3);
    let mut target = GridSpace::rectangle(2, 2, 2);
    let cell = ShapeDescriptor::custom([IVec3::ZERO]);
    let (bottom, top) = (Entity::from_raw(1), Entity::from_raw(2));
    source.place_shape(bottom, &cell, IVec3::ZERO, false).unwrap();
    source.place_shape(top, &cell, IVec3::Y, false).unwrap();
    source.drain_changes();

    move_shapes(&mut source, &mut target, &[bottom], IVec3::new(1, 0, 1), false).unwrap();

    assert_eq!(IVec3::ZERO, source.shape(top).unwrap().root());
    assert_eq!(Some(top), source.occupant(IVec3::ZERO));
    assert!(source.is_open(IVec3::Y));
    assert_eq!(1, source.occupied_cells());
    assert!(!source.contains_shape(bottom));
    assert_eq!(Some(bottom), target.occupant(IVec3::new(1, 0, 1)));
    assert_eq!(
        vec![GridChange::Removed(vec![bottom]), GridChange::Fell(top)],
        source.drain_changes().collect::<Vec<_>>()
    );
    assert!(source.find_inconsistencies().is_empty());
}
