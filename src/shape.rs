use bevy::{
    math::{IVec2, IVec3},
    utils::HashSet,
};
use smallvec::SmallVec;

use crate::rules::ShapeTag;

/// The cell offsets of a shape, relative to its root
pub type Offsets = SmallVec<[IVec3; 4]>;

/// The tags attached to a shape
pub type Tags = SmallVec<[ShapeTag; 2]>;

/// The catalog identity of a shape. Shapes whose cells match no catalog template under any of the
/// four rotations around the vertical axis are [ShapeId::Custom]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ShapeId {
    /// A shape matching the catalog template with this id
    Known(u32),
    /// A shape that matches no catalog template
    Custom,
}

/// A ShapeDescriptor describes one rigid piece: which catalog shape it is, where its root cell is
/// and which cells it covers relative to that root.
///
/// The zero offset is always one of the offsets, so the root cell is always part of the shape.
#[derive(Clone, Debug, PartialEq)]
pub struct ShapeDescriptor {
    id: ShapeId,
    root: IVec3,
    offsets: Offsets,
    tags: Tags,
}

impl ShapeDescriptor {
    /// Construct a ShapeDescriptor rooted at the origin
    pub fn new(id: ShapeId, offsets: impl IntoIterator<Item = IVec3>) -> Self {
        let offsets: Offsets = offsets.into_iter().collect();
        debug_assert!(!offsets.is_empty(), "a shape needs at least one cell");
        debug_assert!(
            offsets.contains(&IVec3::ZERO),
            "a shape must contain its root cell"
        );
        Self {
            id,
            root: IVec3::ZERO,
            offsets,
            tags: Tags::new(),
        }
    }

    /// Construct a [ShapeId::Custom] shape from the given offsets
    pub fn custom(offsets: impl IntoIterator<Item = IVec3>) -> Self {
        Self::new(ShapeId::Custom, offsets)
    }

    /// A single cell shape
    pub fn single(id: ShapeId) -> Self {
        Self::new(id, [IVec3::ZERO])
    }

    /// Add tags to the shape
    pub fn with_tags(mut self, tags: impl IntoIterator<Item = ShapeTag>) -> Self {
        self.tags.extend(tags);
        self
    }

    /// Move the root to the given coordinate
    pub fn with_root(mut self, root: IVec3) -> Self {
        self.root = root;
        self
    }

    /// The catalog shape this is, if any
    pub fn id(&self) -> ShapeId {
        self.id
    }

    /// Change which catalog shape this is
    pub fn set_id(&mut self, id: ShapeId) {
        self.id = id;
    }

    /// The absolute coordinate of the zero offset
    pub fn root(&self) -> IVec3 {
        self.root
    }

    /// Move the root without touching any grid
    pub fn set_root(&mut self, root: IVec3) {
        self.root = root;
    }

    /// Cell offsets relative to the root
    pub fn offsets(&self) -> &[IVec3] {
        &self.offsets
    }

    /// The rules attached to the shape
    pub fn tags(&self) -> &[ShapeTag] {
        &self.tags
    }

    /// The absolute coordinates covered by this shape at its current root
    pub fn cells(&self) -> impl Iterator<Item = IVec3> + '_ {
        self.cells_at(self.root)
    }

    /// The absolute coordinates this shape would cover if it was rooted at `root`
    pub fn cells_at(&self, root: IVec3) -> impl Iterator<Item = IVec3> + '_ {
        self.offsets.iter().map(move |offset| root + *offset)
    }

    /// The (x, z) columns covered by this shape at its current root
    pub fn footprint(&self) -> HashSet<IVec2> {
        self.cells().map(column).collect()
    }

    /// Number of cells in the shape
    pub fn cell_count(&self) -> usize {
        self.offsets.len()
    }

    /// Extent along the x axis
    pub fn length(&self) -> i32 {
        self.extent(|offset| offset.x)
    }

    /// Extent along the z axis
    pub fn width(&self) -> i32 {
        self.extent(|offset| offset.z)
    }

    /// Extent along the y axis
    pub fn height(&self) -> i32 {
        self.extent(|offset| offset.y)
    }

    /// Whether the shape covers more than one y level
    pub fn is_multi_level(&self) -> bool {
        self.height() > 1
    }

    fn extent(&self, axis: impl Fn(&IVec3) -> i32) -> i32 {
        let min = self.offsets.iter().map(&axis).min().unwrap_or(0);
        let max = self.offsets.iter().map(&axis).max().unwrap_or(0);
        max - min + 1
    }

    /// Rotate the shape a quarter turn around the vertical axis through the local origin.
    /// Both the root and every offset are rotated, so the absolute cells of a group of shapes
    /// rotated together stay consistent with each other
    pub fn rotate(&mut self, clockwise: bool) {
        self.root = rotate_offset(self.root, clockwise);
        for offset in self.offsets.iter_mut() {
            *offset = rotate_offset(*offset, clockwise);
        }
    }

    /// A rotated copy of this shape
    pub fn rotated(&self, clockwise: bool) -> Self {
        let mut shape = self.clone();
        shape.rotate(clockwise);
        shape
    }
}

/// Rotate a single coordinate a quarter turn around the y axis
#[inline]
pub fn rotate_offset(offset: IVec3, clockwise: bool) -> IVec3 {
    let cw = if clockwise { 1 } else { -1 };
    IVec3::new(offset.z * cw, offset.y, -offset.x * cw)
}

/// The (x, z) column of a coordinate
#[inline]
pub fn column(coord: IVec3) -> IVec2 {
    IVec2::new(coord.x, coord.z)
}

#[test]
fn test_rotation_has_order_four() {
    let original = ShapeDescriptor::custom([
        IVec3::ZERO,
        IVec3::new(1, 0, 0),
        IVec3::new(1, 1, 0),
        IVec3::new(0, 0, 2),
    ])
    .with_root(IVec3::new(3, 1, -2));

    let mut shape = original.clone();
    for _ in 0..4 {
        shape.rotate(true);
    }
    assert_eq!(original, shape);

    shape.rotate(true);
    shape.rotate(false);
    assert_eq!(original, shape);
}

#[test]
fn test_rotate_clockwise() {
    let shape = ShapeDescriptor::custom([IVec3::ZERO, IVec3::new(2, 0, 0), IVec3::new(0, 0, 1)])
        .with_root(IVec3::new(1, 0, 0))
        .rotated(true);

    assert_eq!(IVec3::new(0, 0, -1), shape.root());
    assert_eq!(
        &[IVec3::ZERO, IVec3::new(0, 0, -2), IVec3::new(1, 0, 0)],
        shape.offsets()
    );
}

#[test]
fn test_extents() {
    let shape = ShapeDescriptor::custom([
        IVec3::ZERO,
        IVec3::new(1, 0, 0),
        IVec3::new(2, 0, 0),
        IVec3::new(0, 1, 0),
        IVec3::new(0, 1, 1),
    ]);
    assert_eq!(3, shape.length());
    assert_eq!(2, shape.width());
    assert_eq!(2, shape.height());
    assert_eq!(5, shape.cell_count());
    assert!(shape.is_multi_level());
    assert!(!ShapeDescriptor::single(ShapeId::Custom).is_multi_level());
}

#[test]
fn test_footprint_ignores_height() {
    let shape = ShapeDescriptor::custom([IVec3::ZERO, IVec3::new(0, 1, 0), IVec3::new(1, 1, 0)])
        .with_root(IVec3::new(2, 0, 5));
    let footprint = shape.footprint();
    assert_eq!(2, footprint.len());
    assert!(footprint.contains(&IVec2::new(2, 5)));
    assert!(footprint.contains(&IVec2::new(3, 5)));
}
