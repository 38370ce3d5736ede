//! The occupancy grid shapes are placed into

use crate::{
    rules::{PlacementContext, ShapeRule},
    shape::column,
    PlaceError, PlacementFlags, ShapeDescriptor, ValidationResult, ZoneId, ZoneRegion, ZoneRule,
};

use bevy::{
    ecs::{component::Component, entity::Entity},
    log::error,
    math::{IVec2, IVec3},
    utils::{HashMap, HashSet},
};
use smallvec::SmallVec;

/// A committed change to a grid, for whoever animates or reacts to the shapes
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GridChange {
    /// Shapes were added to this grid
    Placed(Vec<Entity>),
    /// Shapes left this grid
    Removed(Vec<Entity>),
    /// Shapes moved to a new root within this grid
    Moved(Vec<Entity>),
    /// A shape dropped one level because it lost all support
    Fell(Entity),
    /// Shapes were rotated in place
    Rotated(Vec<Entity>),
}

/// A bounded 3D grid of cells that shapes occupy.
///
/// The horizontal footprint is an arbitrary set of (x, z) columns, every column reaches from y = 0
/// up to, but not including, `height`. Every occupied cell maps to the shape covering it, and the
/// grid owns the [ShapeDescriptor] of every shape placed in it.
#[derive(Component, Debug, Default)]
pub struct GridSpace {
    columns: HashSet<IVec2>,
    height: i32,
    occupancy: HashMap<IVec3, Entity>,
    shapes: HashMap<Entity, ShapeDescriptor>,
    zones: Vec<ZoneRegion>,
    zone_cells: HashMap<IVec3, SmallVec<[ZoneId; 2]>>,
    changes: Vec<GridChange>,
}

impl GridSpace {
    /// Construct a grid over the given (x, z) columns
    pub fn new(columns: impl IntoIterator<Item = IVec2>, height: i32) -> Self {
        Self {
            columns: columns.into_iter().collect(),
            height,
            ..Default::default()
        }
    }

    /// Construct a grid with `length` columns along x and `width` along z, starting at the origin
    pub fn rectangle(length: i32, width: i32, height: i32) -> Self {
        let columns = (0..length).flat_map(|x| (0..width).map(move |z| IVec2::new(x, z)));
        Self::new(columns, height)
    }

    /// The exclusive upper bound on y
    pub fn height(&self) -> i32 {
        self.height
    }

    /// The (x, z) columns that make up the floor
    pub fn columns(&self) -> impl Iterator<Item = IVec2> + '_ {
        self.columns.iter().copied()
    }

    /// Whether the (x, z) column is part of the floor
    pub fn has_column(&self, column: IVec2) -> bool {
        self.columns.contains(&column)
    }

    /// Whether the coordinate is on a column of the grid and below the height limit
    pub fn in_bounds(&self, coord: IVec3) -> bool {
        self.has_column(column(coord)) && coord.y >= 0 && coord.y < self.height
    }

    /// Whether nothing occupies the coordinate. Says nothing about bounds
    pub fn is_open(&self, coord: IVec3) -> bool {
        !self.occupancy.contains_key(&coord)
    }

    /// The shape occupying the coordinate
    pub fn occupant(&self, coord: IVec3) -> Option<Entity> {
        self.occupancy.get(&coord).copied()
    }

    /// The descriptor of a shape placed in this grid
    pub fn shape(&self, entity: Entity) -> Option<&ShapeDescriptor> {
        self.shapes.get(&entity)
    }

    /// Whether the shape is placed in this grid
    pub fn contains_shape(&self, entity: Entity) -> bool {
        self.shapes.contains_key(&entity)
    }

    /// Every shape in the grid, in no particular order
    pub fn shapes(&self) -> impl Iterator<Item = (Entity, &ShapeDescriptor)> + '_ {
        self.shapes.iter().map(|(entity, shape)| (*entity, shape))
    }

    /// Number of shapes placed
    pub fn shape_count(&self) -> usize {
        self.shapes.len()
    }

    /// Number of occupied cells
    pub fn occupied_cells(&self) -> usize {
        self.occupancy.len()
    }

    /// Every occupied cell with the shape occupying it
    pub fn occupancy(&self) -> impl Iterator<Item = (IVec3, Entity)> + '_ {
        self.occupancy.iter().map(|(coord, entity)| (*coord, *entity))
    }

    /// The cells occupied by a shape
    pub fn cells_of(&self, entity: Entity) -> impl Iterator<Item = IVec3> + '_ {
        self.shapes.get(&entity).into_iter().flat_map(ShapeDescriptor::cells)
    }

    /// Register a zone. Its coverage is fixed from here on, only its permissions can change
    pub fn add_zone(&mut self, zone: ZoneRegion) -> ZoneId {
        let id = ZoneId(self.zones.len() as u32);
        for cell in zone.cells() {
            self.zone_cells.entry(cell).or_default().push(id);
        }
        self.zones.push(zone);
        id
    }

    /// A registered zone
    pub fn zone(&self, id: ZoneId) -> Option<&ZoneRegion> {
        self.zones.get(id.0 as usize)
    }

    /// Every registered zone, indexed by [ZoneId]
    pub fn zones(&self) -> &[ZoneRegion] {
        &self.zones
    }

    /// Update the permissions of a registered zone, returns false for unknown zones
    pub fn set_zone_permissions(&mut self, id: ZoneId, can_place: bool, can_take: bool) -> bool {
        let Some(zone) = self.zones.get_mut(id.0 as usize) else {
            return false;
        };
        zone.can_place = can_place;
        zone.can_take = can_take;
        true
    }

    /// The zones covering the coordinate
    pub fn zones_at(&self, coord: IVec3) -> impl Iterator<Item = &ZoneRegion> + '_ {
        self.zone_cells
            .get(&coord)
            .into_iter()
            .flatten()
            .filter_map(|id| self.zone(*id))
    }

    /// Whether every zone covering `coord` satisfies every rule. Cells covered by no zone always
    /// pass, so checking for a forbidden permission can't be done by asking for its opposite
    pub fn check_zones(&self, coord: IVec3, rules: &[ZoneRule]) -> bool {
        self.zones_at(coord)
            .all(|zone| rules.iter().all(|rule| rule.holds(zone)))
    }

    /// Check whether `shape` could be placed with its root at `target_root`
    pub fn validate_placement(
        &self,
        target_root: IVec3,
        shape: &ShapeDescriptor,
        ignore_zones: bool,
    ) -> ValidationResult {
        self.validate_with(target_root, shape, ignore_zones, &[], &HashSet::default())
    }

    /// Check whether a group of shapes could be placed keeping their relative layout, with the
    /// lowest shape's root at `target_root`. Results are in the order the shapes were passed in
    pub fn validate_placement_group(
        &self,
        target_root: IVec3,
        shapes: &[&ShapeDescriptor],
        ignore_zones: bool,
    ) -> Vec<ValidationResult> {
        self.validate_group_with(target_root, shapes, ignore_zones, &[])
    }

    /// Check whether shapes already in this grid could be moved so the lowest one is rooted at
    /// `target_root`, treating their current cells as free. Unknown shapes are skipped
    pub fn validate_move(
        &self,
        entities: &[Entity],
        target_root: IVec3,
        ignore_zones: bool,
    ) -> Vec<ValidationResult> {
        let mut seen: HashSet<Entity> = HashSet::default();
        let shapes: Vec<&ShapeDescriptor> = entities
            .iter()
            .filter(|e| seen.insert(**e))
            .filter_map(|e| self.shapes.get(e))
            .collect();
        self.validate_group_with(target_root, &shapes, ignore_zones, entities)
    }

    pub(crate) fn validate_with(
        &self,
        target_root: IVec3,
        shape: &ShapeDescriptor,
        ignore_zones: bool,
        lifted: &[Entity],
        claimed: &HashSet<IVec3>,
    ) -> ValidationResult {
        let ctx = PlacementContext {
            grid: self,
            lifted,
            offsets: shape.offsets(),
        };
        let mut result = ValidationResult::valid();
        for offset in shape.offsets() {
            let coord = target_root + *offset;
            let mut reasons = PlacementFlags::empty();
            if !self.has_column(column(coord)) {
                reasons |= PlacementFlags::OUT_OF_BOUNDS_XZ;
            }
            if coord.y < 0 || coord.y >= self.height {
                reasons |= PlacementFlags::OUT_OF_BOUNDS_Y;
            }
            // The remaining rules only make sense for cells inside the grid
            if reasons.is_empty() {
                if !ctx.is_open(coord) || claimed.contains(&coord) {
                    reasons |= PlacementFlags::OVERLAP;
                }
                if !ignore_zones && !self.check_zones(coord, &[ZoneRule::CanPlace]) {
                    reasons |= PlacementFlags::ZONE_RULE;
                }
                if !shape
                    .tags()
                    .iter()
                    .all(|tag| tag.check_placement(&ctx, *offset, coord))
                {
                    reasons |= PlacementFlags::TAG_RULE;
                }
            }
            result.record(coord, reasons);
        }
        result
    }

    fn validate_group_with(
        &self,
        target_root: IVec3,
        shapes: &[&ShapeDescriptor],
        ignore_zones: bool,
        lifted: &[Entity],
    ) -> Vec<ValidationResult> {
        let mut order: Vec<usize> = (0..shapes.len()).collect();
        order.sort_by_key(|idx| shapes[*idx].root().y);

        let sorted: Vec<&ShapeDescriptor> = order.iter().map(|idx| shapes[*idx]).collect();
        let mut results = vec![ValidationResult::valid(); shapes.len()];
        for (idx, result) in order
            .into_iter()
            .zip(self.validate_sorted(&sorted, target_root, ignore_zones, lifted))
        {
            results[idx] = result;
        }
        results
    }

    /// Validate a group sorted bottom to top. Cells taken by earlier members count as occupied
    /// for the later ones
    fn validate_sorted(
        &self,
        shapes: &[&ShapeDescriptor],
        target_root: IVec3,
        ignore_zones: bool,
        lifted: &[Entity],
    ) -> Vec<ValidationResult> {
        let roots: Vec<IVec3> = shapes.iter().map(|shape| shape.root()).collect();
        let targets = group_targets(&roots, target_root);

        let mut claimed: HashSet<IVec3> = HashSet::default();
        shapes
            .iter()
            .zip(targets)
            .map(|(shape, target)| {
                let result = self.validate_with(target, shape, ignore_zones, lifted, &claimed);
                claimed.extend(shape.offsets().iter().map(|offset| target + *offset));
                result
            })
            .collect()
    }

    /// Validate and place a new shape with its root at `target_root`. The grid stores a copy of
    /// the descriptor, rooted at the target
    pub fn place_shape(
        &mut self,
        entity: Entity,
        shape: &ShapeDescriptor,
        target_root: IVec3,
        ignore_zones: bool,
    ) -> Result<(), PlaceError> {
        if self.contains_shape(entity) {
            return Err(PlaceError::AlreadyPlaced(entity));
        }
        let result = self.validate_placement(target_root, shape, ignore_zones);
        if !result.is_valid() {
            return Err(PlaceError::Blocked(vec![result]));
        }
        self.write(entity, shape.clone().with_root(target_root));
        self.record(GridChange::Placed(vec![entity]));
        Ok(())
    }

    /// Place a shape without validating bounds, zones or tags. A shape already in the grid is
    /// moved to the new root and may overlap its own old cells. Cells of any other shape are never
    /// overwritten, the write is skipped with [PlaceError::Overwrites] instead
    pub fn place_shape_unchecked(
        &mut self,
        entity: Entity,
        shape: &ShapeDescriptor,
        target_root: IVec3,
    ) -> Result<(), PlaceError> {
        let placed = shape.clone().with_root(target_root);
        if let Some(occupant) = self.foreign_occupant(entity, &placed) {
            error!(
                "Unchecked write of shape {entity:?} at {target_root} would overwrite {occupant:?}"
            );
            return Err(PlaceError::Overwrites(occupant));
        }
        let moved = self.lift(entity).is_some();
        self.write(entity, placed);
        self.record(if moved {
            GridChange::Moved(vec![entity])
        } else {
            GridChange::Placed(vec![entity])
        });
        Ok(())
    }

    /// The first shape other than `entity` occupying one of the cells of `shape`
    pub(crate) fn foreign_occupant(
        &self,
        entity: Entity,
        shape: &ShapeDescriptor,
    ) -> Option<Entity> {
        shape
            .cells()
            .find_map(|cell| self.occupant(cell).filter(|occupant| *occupant != entity))
    }

    /// Validate and place a group of new shapes, keeping their relative layout with the lowest
    /// shape rooted at `target_root`. Either every shape is placed or none is
    pub fn place_shape_group(
        &mut self,
        shapes: &[(Entity, ShapeDescriptor)],
        target_root: IVec3,
        ignore_zones: bool,
    ) -> Result<(), PlaceError> {
        let mut seen: HashSet<Entity> = HashSet::default();
        if let Some((entity, _)) = shapes
            .iter()
            .find(|(e, _)| self.contains_shape(*e) || !seen.insert(*e))
        {
            return Err(PlaceError::AlreadyPlaced(*entity));
        }
        let refs: Vec<&ShapeDescriptor> = shapes.iter().map(|(_, shape)| shape).collect();
        let results = self.validate_placement_group(target_root, &refs, ignore_zones);
        if !crate::all_valid(&results) {
            return Err(PlaceError::Blocked(results));
        }

        let mut sorted: Vec<(Entity, ShapeDescriptor)> = shapes.to_vec();
        sort_by_height(&mut sorted);
        self.write_group(sorted, target_root);
        self.record(GridChange::Placed(
            shapes.iter().map(|(entity, _)| *entity).collect(),
        ));
        Ok(())
    }

    /// Validate a group sorted bottom to top against this grid and write it in that order.
    /// Hands the shapes back untouched when validation fails
    #[allow(clippy::type_complexity)]
    pub(crate) fn commit_group(
        &mut self,
        shapes: Vec<(Entity, ShapeDescriptor)>,
        target_root: IVec3,
        ignore_zones: bool,
    ) -> Result<(), (Vec<(Entity, ShapeDescriptor)>, Vec<ValidationResult>)> {
        let refs: Vec<&ShapeDescriptor> = shapes.iter().map(|(_, shape)| shape).collect();
        let results = self.validate_sorted(&refs, target_root, ignore_zones, &[]);
        if !crate::all_valid(&results) {
            return Err((shapes, results));
        }
        self.write_group(shapes, target_root);
        Ok(())
    }

    /// Write a group sorted bottom to top, lower shapes first
    fn write_group(&mut self, shapes: Vec<(Entity, ShapeDescriptor)>, target_root: IVec3) {
        let roots: Vec<IVec3> = shapes.iter().map(|(_, shape)| shape.root()).collect();
        let targets = group_targets(&roots, target_root);
        for ((entity, mut shape), target) in shapes.into_iter().zip(targets) {
            shape.set_root(target);
            self.write(entity, shape);
        }
    }

    /// Destroy a shape. Shapes left without support fall afterwards
    pub fn remove_shape(&mut self, entity: Entity) -> Option<ShapeDescriptor> {
        let shape = self.lift(entity)?;
        self.record(GridChange::Removed(vec![entity]));
        self.settle(shape.cells().collect::<Vec<_>>());
        Some(shape)
    }

    /// Take a shape's cells out of the occupancy map and hand back its descriptor, without
    /// running gravity
    pub(crate) fn lift(&mut self, entity: Entity) -> Option<ShapeDescriptor> {
        let shape = self.shapes.remove(&entity)?;
        for cell in shape.cells() {
            match self.occupancy.get(&cell) {
                Some(occupant) if *occupant == entity => {
                    self.occupancy.remove(&cell);
                }
                Some(occupant) => error!(
                    "Cell {cell} of shape {entity:?} is occupied by {occupant:?}, leaving it be"
                ),
                None => error!("Cell {cell} of shape {entity:?} was not in the occupancy map"),
            }
        }
        Some(shape)
    }

    /// Write a shape's cells at its current root, without validation
    pub(crate) fn write(&mut self, entity: Entity, shape: ShapeDescriptor) {
        for cell in shape.cells() {
            self.occupancy.insert(cell, entity);
        }
        self.shapes.insert(entity, shape);
    }

    pub(crate) fn record(&mut self, change: GridChange) {
        self.changes.push(change);
    }

    /// Whether changes are waiting to be drained
    pub fn has_pending_changes(&self) -> bool {
        !self.changes.is_empty()
    }

    /// Take every change committed since the last drain, oldest first
    pub fn drain_changes(&mut self) -> std::vec::Drain<'_, GridChange> {
        self.changes.drain(..)
    }

    /// Check that every occupied cell is backed by the shape it maps to and the other way
    /// around. Returns the cells that break this
    pub fn find_inconsistencies(&self) -> Vec<IVec3> {
        let mut broken: Vec<IVec3> = self
            .occupancy
            .iter()
            .filter(|(cell, entity)| {
                self.shapes
                    .get(*entity)
                    .map_or(true, |shape| !shape.cells().any(|c| c == **cell))
            })
            .map(|(cell, _)| *cell)
            .collect();
        for (entity, shape) in &self.shapes {
            broken.extend(shape.cells().filter(|c| self.occupant(*c) != Some(*entity)));
        }
        broken
    }
}

/// Sort shapes bottom to top by root, keeping the given order between shapes on the same level
pub(crate) fn sort_by_height(shapes: &mut [(Entity, ShapeDescriptor)]) {
    shapes.sort_by_key(|(_, shape)| shape.root().y);
}

/// The target root of every shape in a group. The first shape goes to `target_root`, every
/// following one keeps its offset to the shape before it
pub(crate) fn group_targets(roots: &[IVec3], target_root: IVec3) -> Vec<IVec3> {
    let mut targets = Vec::with_capacity(roots.len());
    let mut target = target_root;
    for (idx, root) in roots.iter().enumerate() {
        if idx > 0 {
            target += *root - roots[idx - 1];
        }
        targets.push(target);
    }
    targets
}

#[cfg(test)]
fn single_column_grid() -> GridSpace {
    GridSpace::new([IVec2::ZERO], 3)
}

#[test]
fn test_place_and_overlap() {
    let mut grid = single_column_grid();
    let cell = ShapeDescriptor::custom([IVec3::ZERO]);
    let (a, b, c) = (Entity::from_raw(1), Entity::from_raw(2), Entity::from_raw(3));

    grid.place_shape(a, &cell, IVec3::ZERO, false).unwrap();
    grid.place_shape(b, &cell, IVec3::Y, false).unwrap();
    assert_eq!(IVec3::Y, grid.shape(b).unwrap().root());

    let err = grid.place_shape(c, &cell, IVec3::ZERO, false).unwrap_err();
    assert!(err.results()[0].contains(PlacementFlags::OVERLAP));
    assert_eq!(2, grid.occupied_cells());
    assert!(!grid.contains_shape(c));

    assert_eq!(
        Err(PlaceError::AlreadyPlaced(a)),
        grid.place_shape(a, &cell, IVec3::new(0, 2, 0), false)
    );
}

#[test]
fn test_out_of_bounds() {
    let grid = GridSpace::new([IVec2::ZERO], 3);
    let domino = ShapeDescriptor::custom([IVec3::ZERO, IVec3::new(1, 0, 0)]);

    let result = grid.validate_placement(IVec3::ZERO, &domino, false);
    assert_eq!(PlacementFlags::OUT_OF_BOUNDS_XZ, result.flags());
    assert_eq!(
        &[(IVec3::new(1, 0, 0), PlacementFlags::OUT_OF_BOUNDS_XZ)],
        result.failed_cells()
    );

    let cell = ShapeDescriptor::custom([IVec3::ZERO]);
    assert!(grid
        .validate_placement(IVec3::new(0, 3, 0), &cell, false)
        .contains(PlacementFlags::OUT_OF_BOUNDS_Y));
    assert!(grid
        .validate_placement(IVec3::new(0, -1, 0), &cell, false)
        .contains(PlacementFlags::OUT_OF_BOUNDS_Y));
}

#[test]
fn test_validation_is_idempotent() {
    let mut grid = GridSpace::rectangle(2, 2, 2);
    let cell = ShapeDescriptor::custom([IVec3::ZERO]);
    grid.place_shape_unchecked(Entity::from_raw(1), &cell, IVec3::ZERO).unwrap();
    let shape = ShapeDescriptor::custom([IVec3::ZERO, IVec3::new(1, 0, 0), IVec3::new(2, 0, 0)]);
    let first = grid.validate_placement(IVec3::ZERO, &shape, false);
    for _ in 0..3 {
        assert_eq!(first, grid.validate_placement(IVec3::ZERO, &shape, false));
    }
    assert!(first.contains(PlacementFlags::OVERLAP | PlacementFlags::OUT_OF_BOUNDS_XZ));
}

#[test]
fn test_zone_rules() {
    let mut grid = GridSpace::rectangle(4, 1, 2);
    let locked = grid.add_zone(ZoneRegion::new(IVec3::ZERO, 2, 2, 1).with_permissions(false, true));
    grid.add_zone(ZoneRegion::new(IVec3::new(1, 0, 0), 2, 2, 1));
    let cell = ShapeDescriptor::custom([IVec3::ZERO]);

    // Covered by the locked zone only, then by both, then by the open zone only
    for (x, allowed) in [(0, false), (1, false), (2, true), (3, true)] {
        let coord = IVec3::new(x, 0, 0);
        assert_eq!(allowed, grid.check_zones(coord, &[ZoneRule::CanPlace]), "x = {x}");
        assert_eq!(
            allowed,
            grid.validate_placement(coord, &cell, false).is_valid(),
            "x = {x}"
        );
        assert!(grid.validate_placement(coord, &cell, true).is_valid());
    }
    assert_eq!(2, grid.zones_at(IVec3::new(1, 1, 0)).count());
    assert!(grid.check_zones(IVec3::new(1, 0, 0), &[ZoneRule::CanTake]));

    assert!(grid.set_zone_permissions(locked, true, true));
    assert!(grid.validate_placement(IVec3::ZERO, &cell, false).is_valid());
    assert!(!grid.set_zone_permissions(ZoneId(7), true, true));
}

#[test]
fn test_heavy_and_fragile_tags() {
    use crate::rules::{FragileTag, HeavyTag};

    let mut grid = GridSpace::rectangle(1, 1, 3);
    let heavy = ShapeDescriptor::custom([IVec3::ZERO]).with_tags([HeavyTag.into()]);
    assert!(grid.validate_placement(IVec3::ZERO, &heavy, false).is_valid());
    assert_eq!(
        PlacementFlags::TAG_RULE,
        grid.validate_placement(IVec3::Y, &heavy, false).flags()
    );

    let top = Entity::from_raw(1);
    grid.place_shape_unchecked(top, &ShapeDescriptor::custom([IVec3::ZERO]), IVec3::Y)
        .unwrap();
    let fragile = ShapeDescriptor::custom([IVec3::ZERO]).with_tags([FragileTag.into()]);
    assert_eq!(
        PlacementFlags::TAG_RULE,
        grid.validate_placement(IVec3::ZERO, &fragile, false).flags()
    );
    // Nothing above once the top shape is lifted out of the way
    assert!(grid
        .validate_with(IVec3::ZERO, &fragile, false, &[top], &HashSet::default())
        .is_valid());
    // The top of the grid has nothing above it
    assert!(grid
        .validate_placement(IVec3::new(0, 2, 0), &fragile, false)
        .is_valid());
}

#[test]
fn test_group_placement_is_all_or_nothing() {
    let mut grid = GridSpace::rectangle(2, 1, 2);
    let cell = ShapeDescriptor::custom([IVec3::ZERO]);
    let (a, b, c) = (Entity::from_raw(1), Entity::from_raw(2), Entity::from_raw(3));

    // Upper shape listed first, the group is sorted by height before validation
    let group = vec![
        (b, cell.clone().with_root(IVec3::new(0, 1, 0))),
        (a, cell.clone().with_root(IVec3::ZERO)),
    ];
    grid.place_shape_group(&group, IVec3::new(1, 0, 0), false).unwrap();
    assert_eq!(IVec3::new(1, 0, 0), grid.shape(a).unwrap().root());
    assert_eq!(IVec3::new(1, 1, 0), grid.shape(b).unwrap().root());

    // Second member would stick out of the top
    let before: Vec<(IVec3, Entity)> = {
        let mut cells: Vec<_> = grid.occupancy().collect();
        cells.sort_by_key(|(c, _)| (c.x, c.y, c.z));
        cells
    };
    let tall = vec![
        (c, cell.clone().with_root(IVec3::ZERO)),
        (Entity::from_raw(4), cell.clone().with_root(IVec3::new(0, 2, 0))),
    ];
    let err = grid.place_shape_group(&tall, IVec3::ZERO, false).unwrap_err();
    assert!(err.results()[0].is_valid());
    assert!(err.results()[1].contains(PlacementFlags::OUT_OF_BOUNDS_Y));

    let mut after: Vec<_> = grid.occupancy().collect();
    after.sort_by_key(|(c, _)| (c.x, c.y, c.z));
    assert_eq!(before, after);
    assert!(!grid.contains_shape(c));
}

#[test]
fn test_group_targets_keep_layout() {
    let roots = [IVec3::ZERO, IVec3::new(1, 1, 0), IVec3::new(1, 2, 1)];
    assert_eq!(
        vec![
            IVec3::new(5, 0, 5),
            IVec3::new(6, 1, 5),
            IVec3::new(6, 2, 6)
        ],
        group_targets(&roots, IVec3::new(5, 0, 5))
    );
}

#[test]
fn test_unchecked_placement_moves_existing() {
    let mut grid = GridSpace::rectangle(3, 2, 2);
    let entity = Entity::from_raw(1);
    let domino = ShapeDescriptor::custom([IVec3::ZERO, IVec3::new(1, 0, 0)]);
    grid.place_shape_unchecked(entity, &domino, IVec3::ZERO).unwrap();
    grid.place_shape_unchecked(entity, &domino, IVec3::new(1, 0, 0)).unwrap();
    grid.place_shape_unchecked(entity, &domino, IVec3::new(0, 1, 1)).unwrap();

    assert_eq!(2, grid.occupied_cells());
    assert!(grid.is_open(IVec3::ZERO));
    assert_eq!(Some(entity), grid.occupant(IVec3::new(1, 1, 1)));
    assert!(grid.find_inconsistencies().is_empty());
    assert_eq!(
        vec![
            GridChange::Placed(vec![entity]),
            GridChange::Moved(vec![entity]),
            GridChange::Moved(vec![entity])
        ],
        grid.drain_changes().collect::<Vec<_>>()
    );
    assert!(!grid.has_pending_changes());
}

#[test]
fn test_unchecked_placement_keeps_other_shapes() {
    let mut grid = GridSpace::rectangle(3, 1, 2);
    let (a, b) = (Entity::from_raw(1), Entity::from_raw(2));
    let domino = ShapeDescriptor::custom([IVec3::ZERO, IVec3::new(1, 0, 0)]);
    grid.place_shape_unchecked(a, &domino, IVec3::ZERO).unwrap();

    assert_eq!(
        Err(PlaceError::Overwrites(a)),
        grid.place_shape_unchecked(b, &domino, IVec3::new(1, 0, 0))
    );
    assert!(!grid.contains_shape(b));
    assert_eq!(Some(a), grid.occupant(IVec3::new(1, 0, 0)));

    // Moving onto another shape leaves the moving one where it was
    grid.place_shape_unchecked(b, &domino, IVec3::Y).unwrap();
    assert_eq!(
        Err(PlaceError::Overwrites(a)),
        grid.place_shape_unchecked(b, &domino, IVec3::new(1, 0, 0))
    );
    assert_eq!(IVec3::Y, grid.shape(b).unwrap().root());
    assert!(grid.find_inconsistencies().is_empty());
}

#[test]
fn test_group_members_cant_share_cells() {
    let mut grid = GridSpace::rectangle(2, 2, 2);
    let cell = ShapeDescriptor::custom([IVec3::ZERO]);
    let (a, b) = (Entity::from_raw(1), Entity::from_raw(2));

    let stacked = vec![(a, cell.clone()), (b, cell.clone())];
    let err = grid.place_shape_group(&stacked, IVec3::ZERO, false).unwrap_err();
    assert!(err.results()[0].is_valid());
    assert_eq!(
        &[(IVec3::ZERO, PlacementFlags::OVERLAP)],
        err.results()[1].failed_cells()
    );
    assert_eq!(0, grid.occupied_cells());

    // The same handle twice, at different cells
    let twice = vec![(a, cell.clone()), (a, cell.clone().with_root(IVec3::Y))];
    assert_eq!(
        Err(PlaceError::AlreadyPlaced(a)),
        grid.place_shape_group(&twice, IVec3::ZERO, false)
    );
    assert_eq!(0, grid.shape_count());

    let validated = grid.validate_placement_group(IVec3::ZERO, &[&cell, &cell], false);
    assert!(validated[1].contains(PlacementFlags::OVERLAP));
    assert!(grid.find_inconsistencies().is_empty());
}
