use std::collections::VecDeque;

use crate::GridSpace;

use bevy::{ecs::entity::Entity, math::IVec3, utils::HashSet};

/// The outcome of picking up the stack resting on a cell
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StackSelection {
    /// The cell is outside the grid or empty
    Empty,
    /// The base shape followed by everything stacked on it, in the order they were found
    Stack(Vec<Entity>),
    /// A shape on the stack hangs over the edge of the base's footprint, so the stack can't be
    /// lifted as one piece
    Overhang(Entity),
}

impl GridSpace {
    /// Select the shape at `base` and every shape stacked on top of it.
    ///
    /// Shapes are collected upward from the base's cells. Every collected shape has to stay
    /// within the (x, z) columns of the base shape, the first one that doesn't aborts the
    /// selection and is returned as [StackSelection::Overhang].
    pub fn select_stack(&self, base: IVec3) -> StackSelection {
        if !self.in_bounds(base) {
            return StackSelection::Empty;
        }
        let Some(base_entity) = self.occupant(base) else {
            return StackSelection::Empty;
        };
        let Some(base_shape) = self.shape(base_entity) else {
            return StackSelection::Empty;
        };
        let footprint = base_shape.footprint();

        let mut stack = vec![base_entity];
        let mut collected: HashSet<Entity> = HashSet::default();
        collected.insert(base_entity);
        let mut queue: VecDeque<IVec3> = base_shape.cells().collect();

        while let Some(cell) = queue.pop_front() {
            let above = cell + IVec3::Y;
            if !self.in_bounds(above) {
                continue;
            }
            let Some(entity) = self.occupant(above) else {
                continue;
            };
            if collected.contains(&entity) {
                continue;
            }
            let Some(shape) = self.shape(entity) else {
                continue;
            };
            if shape.cells().any(|c| !footprint.contains(&crate::shape::column(c))) {
                return StackSelection::Overhang(entity);
            }
            collected.insert(entity);
            stack.push(entity);
            queue.extend(shape.cells());
        }

        StackSelection::Stack(stack)
    }
}

#[test]
fn test_select_empty() {
    let grid = GridSpace::rectangle(2, 2, 2);
    assert_eq!(StackSelection::Empty, grid.select_stack(IVec3::ZERO));
    assert_eq!(StackSelection::Empty, grid.select_stack(IVec3::new(5, 0, 0)));
}

#[test]
fn test_select_tower() {
    use crate::ShapeDescriptor;

    let mut grid = GridSpace::rectangle(3, 3, 4);
    let square = ShapeDescriptor::custom([
        IVec3::ZERO,
        IVec3::new(1, 0, 0),
        IVec3::new(0, 0, 1),
        IVec3::new(1, 0, 1),
    ]);
    let cell = ShapeDescriptor::custom([IVec3::ZERO]);
    let domino = ShapeDescriptor::custom([IVec3::ZERO, IVec3::new(1, 0, 0)]);
    let (base, a, b, top, beside) = (
        Entity::from_raw(1),
        Entity::from_raw(2),
        Entity::from_raw(3),
        Entity::from_raw(4),
        Entity::from_raw(5),
    );
    grid.place_shape(base, &square, IVec3::ZERO, false).unwrap();
    grid.place_shape(a, &cell, IVec3::new(0, 1, 0), false).unwrap();
    grid.place_shape(b, &cell, IVec3::new(1, 1, 1), false).unwrap();
    grid.place_shape(top, &domino, IVec3::new(0, 2, 1), false).unwrap();
    grid.place_shape(beside, &cell, IVec3::new(2, 0, 0), false).unwrap();

    // Selecting from any cell of the base gives the same stack
    for coord in [IVec3::ZERO, IVec3::new(1, 0, 1)] {
        let StackSelection::Stack(stack) = grid.select_stack(coord) else {
            panic!("expected a stack");
        };
        assert_eq!(base, stack[0]);
        assert_eq!(4, stack.len());
        assert!(stack.contains(&top));
        assert!(!stack.contains(&beside));
    }

    // Selecting higher up only takes what rests on that shape, and the domino on top is wider
    // than the single cell below it
    assert_eq!(StackSelection::Stack(vec![a]), grid.select_stack(IVec3::new(0, 1, 0)));
    assert_eq!(
        StackSelection::Overhang(top),
        grid.select_stack(IVec3::new(1, 1, 1))
    );
}

#[test]
fn test_select_overhang() {
    use crate::ShapeDescriptor;

    let mut grid = GridSpace::rectangle(3, 1, 3);
    let cell = ShapeDescriptor::custom([IVec3::ZERO]);
    let domino = ShapeDescriptor::custom([IVec3::ZERO, IVec3::new(1, 0, 0)]);
    let (base, bridge) = (Entity::from_raw(1), Entity::from_raw(2));
    grid.place_shape(base, &cell, IVec3::ZERO, false).unwrap();
    grid.place_shape(bridge, &domino, IVec3::Y, false).unwrap();

    assert_eq!(StackSelection::Overhang(bridge), grid.select_stack(IVec3::ZERO));
    assert_eq!(
        StackSelection::Stack(vec![bridge]),
        grid.select_stack(IVec3::new(1, 1, 0))
    );
}
