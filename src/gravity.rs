//! Shapes that lose all of their support drop down, one level at a time

use std::collections::VecDeque;

use crate::{grid::GridChange, movement::relocate, GridSpace};

use bevy::{
    ecs::entity::Entity,
    log::{debug, error},
    math::IVec3,
};

impl GridSpace {
    /// Let shapes above the vacated cells fall until everything is supported again. Returns how
    /// many single level falls happened
    pub(crate) fn settle(&mut self, vacated: impl IntoIterator<Item = IVec3>) -> usize {
        let mut queue: VecDeque<IVec3> = vacated.into_iter().collect();
        let mut falls = 0;
        while let Some(cell) = queue.pop_front() {
            let above = cell + IVec3::Y;
            if !self.in_bounds(above) {
                continue;
            }
            let Some(entity) = self.occupant(above) else {
                continue;
            };
            if !self.is_unsupported(entity) {
                continue;
            }
            let Some(root) = self.shape(entity).map(|shape| shape.root()) else {
                error!("Cell {above} is occupied by {entity:?}, which has no shape data");
                continue;
            };

            let Ok(moved) = relocate(self, None, &[entity], root - IVec3::Y, true) else {
                continue;
            };
            debug!("Shape {entity:?} fell to {}", root - IVec3::Y);
            falls += 1;
            self.record(GridChange::Fell(entity));
            queue.extend(moved.vacated);
            // The shape itself might still be hanging, probe below its new root
            queue.push_back(root - IVec3::Y * 2);
        }
        falls
    }

    /// A shape is unsupported when every one of its cells has nothing under it. Cells of the
    /// shape itself don't count as support, the floor does
    pub fn is_unsupported(&self, entity: Entity) -> bool {
        let Some(shape) = self.shape(entity) else {
            return false;
        };
        shape.cells().all(|cell| {
            let below = cell - IVec3::Y;
            below.y >= 0
                && match self.occupant(below) {
                    Some(occupant) => occupant == entity,
                    None => true,
                }
        })
    }
}

#[test]
fn test_fall_after_destroy() {
    let mut grid = GridSpace::new([bevy::math::IVec2::ZERO], 3);
    let cell = crate::ShapeDescriptor::custom([IVec3::ZERO]);
    let (bottom, top) = (Entity::from_raw(1), Entity::from_raw(2));
    grid.place_shape(bottom, &cell, IVec3::ZERO, false).unwrap();
    grid.place_shape(top, &cell, IVec3::Y, false).unwrap();
    grid.drain_changes().for_each(drop);

    assert!(grid.remove_shape(bottom).is_some());
    assert_eq!(IVec3::ZERO, grid.shape(top).unwrap().root());
    assert_eq!(vec![(IVec3::ZERO, top)], grid.occupancy().collect::<Vec<_>>());
    assert_eq!(
        vec![GridChange::Removed(vec![bottom]), GridChange::Fell(top)],
        grid.drain_changes().collect::<Vec<_>>()
    );
}

#[test]
fn test_partial_support_holds() {
    let mut grid = GridSpace::rectangle(2, 1, 3);
    let cell = crate::ShapeDescriptor::custom([IVec3::ZERO]);
    let domino = crate::ShapeDescriptor::custom([IVec3::ZERO, IVec3::new(1, 0, 0)]);
    let (left, right, bridge) = (Entity::from_raw(1), Entity::from_raw(2), Entity::from_raw(3));
    grid.place_shape(left, &cell, IVec3::ZERO, false).unwrap();
    grid.place_shape(right, &cell, IVec3::new(1, 0, 0), false).unwrap();
    grid.place_shape(bridge, &domino, IVec3::Y, false).unwrap();

    grid.remove_shape(left);
    assert_eq!(IVec3::Y, grid.shape(bridge).unwrap().root());
    assert!(!grid.is_unsupported(bridge));

    grid.remove_shape(right);
    assert_eq!(IVec3::ZERO, grid.shape(bridge).unwrap().root());
    assert_eq!(2, grid.occupied_cells());
}

#[test]
fn test_tall_stack_falls_level_by_level() {
    let mut grid = GridSpace::rectangle(1, 1, 6);
    let cell = crate::ShapeDescriptor::custom([IVec3::ZERO]);
    let pillar = crate::ShapeDescriptor::custom([IVec3::ZERO, IVec3::Y]);
    let base = Entity::from_raw(1);
    grid.place_shape(base, &pillar, IVec3::ZERO, false).unwrap();
    for (i, y) in [2, 3, 4].into_iter().enumerate() {
        grid.place_shape(Entity::from_raw(10 + i as u32), &cell, IVec3::new(0, y, 0), false)
            .unwrap();
    }
    let mass = grid.occupied_cells();

    grid.remove_shape(base);
    assert_eq!(mass - 2, grid.occupied_cells());
    for (i, y) in [0, 1, 2].into_iter().enumerate() {
        assert_eq!(
            IVec3::new(0, y, 0),
            grid.shape(Entity::from_raw(10 + i as u32)).unwrap().root()
        );
    }
    assert!(grid.find_inconsistencies().is_empty());
}

#[test]
fn test_multi_level_shape_is_its_own_support() {
    let mut grid = GridSpace::rectangle(2, 1, 4);
    let pillar = crate::ShapeDescriptor::custom([IVec3::ZERO, IVec3::Y]);
    // An L standing up: one cell at the bottom, two on the level above
    let ell = crate::ShapeDescriptor::custom([IVec3::ZERO, IVec3::Y, IVec3::new(1, 1, 0)]);
    let (support, ell_entity) = (Entity::from_raw(1), Entity::from_raw(2));
    grid.place_shape(support, &pillar, IVec3::new(1, 0, 0), false).unwrap();
    grid.place_shape(ell_entity, &ell, IVec3::new(0, 1, 0), false).unwrap();

    // Hangs off the support with its bottom cell in the air
    assert!(!grid.is_unsupported(ell_entity));
    grid.remove_shape(support);
    assert_eq!(IVec3::ZERO, grid.shape(ell_entity).unwrap().root());
}

#[test]
fn test_anchored_shapes_stay() {
    let mut grid = GridSpace::rectangle(1, 1, 3);
    let cell = crate::ShapeDescriptor::custom([IVec3::ZERO]);
    let anchored = cell.clone().with_tags([crate::rules::AnchoredTag.into()]);
    let (bottom, top) = (Entity::from_raw(1), Entity::from_raw(2));
    grid.place_shape(bottom, &cell, IVec3::ZERO, false).unwrap();
    grid.place_shape(top, &anchored, IVec3::Y, false).unwrap();

    grid.remove_shape(bottom);
    assert_eq!(IVec3::Y, grid.shape(top).unwrap().root());
}
