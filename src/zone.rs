use bevy::{
    math::{IVec2, IVec3},
    utils::HashSet,
};

use crate::shape::column;

/// Identifies a zone registered in a [GridSpace](crate::GridSpace)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ZoneId(pub(crate) u32);

/// An axis aligned box that restricts placing into and taking from the cells it covers.
///
/// Cells covered by no zone are unrestricted. A cell covered by several zones has to satisfy all
/// of them.
#[derive(Clone, Debug)]
pub struct ZoneRegion {
    root: IVec3,
    length: i32,
    height: i32,
    width: i32,
    /// Whether shapes may be placed into the zone
    pub can_place: bool,
    /// Whether shapes rooted in the zone may be picked up
    pub can_take: bool,
    cells: HashSet<IVec3>,
    columns: HashSet<IVec2>,
}

impl ZoneRegion {
    /// A zone spanning `length` cells along x, `height` along y and `width` along z from `root`.
    /// New zones allow both placing and taking
    pub fn new(root: IVec3, length: i32, height: i32, width: i32) -> Self {
        let mut zone = Self {
            root,
            length,
            height,
            width,
            can_place: true,
            can_take: true,
            cells: HashSet::default(),
            columns: HashSet::default(),
        };
        zone.compute_coverage();
        zone
    }

    /// Set both permission flags
    pub fn with_permissions(mut self, can_place: bool, can_take: bool) -> Self {
        self.can_place = can_place;
        self.can_take = can_take;
        self
    }

    /// Move the zone. Only meaningful before the zone is registered into a grid, the grid keeps
    /// the coverage it was registered with
    pub fn set_root(&mut self, root: IVec3) {
        self.root = root;
        self.compute_coverage();
    }

    fn compute_coverage(&mut self) {
        self.cells.clear();
        self.columns.clear();
        for x in 0..self.length.max(0) {
            for y in 0..self.height.max(0) {
                for z in 0..self.width.max(0) {
                    let coord = self.root + IVec3::new(x, y, z);
                    self.cells.insert(coord);
                    self.columns.insert(column(coord));
                }
            }
        }
    }

    /// The lowest corner
    pub fn root(&self) -> IVec3 {
        self.root
    }

    /// (length, height, width)
    pub fn extents(&self) -> (i32, i32, i32) {
        (self.length, self.height, self.width)
    }

    /// Whether the zone covers the coordinate
    pub fn contains(&self, coord: IVec3) -> bool {
        self.cells.contains(&coord)
    }

    /// Whether the zone covers any cell of the (x, z) column
    pub fn covers_column(&self, column: IVec2) -> bool {
        self.columns.contains(&column)
    }

    /// Every covered cell
    pub fn cells(&self) -> impl Iterator<Item = IVec3> + '_ {
        self.cells.iter().copied()
    }

    /// Every covered (x, z) column
    pub fn columns(&self) -> impl Iterator<Item = IVec2> + '_ {
        self.columns.iter().copied()
    }
}

/// The zone permissions that can be checked for a coordinate
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ZoneRule {
    /// [ZoneRegion::can_place]
    CanPlace,
    /// [ZoneRegion::can_take]
    CanTake,
}

impl ZoneRule {
    /// Whether the zone grants this permission
    pub fn holds(self, zone: &ZoneRegion) -> bool {
        match self {
            ZoneRule::CanPlace => zone.can_place,
            ZoneRule::CanTake => zone.can_take,
        }
    }
}

#[test]
fn test_zone_coverage() {
    let zone = ZoneRegion::new(IVec3::new(1, 0, 2), 2, 3, 1);
    assert_eq!(6, zone.cells().count());
    assert_eq!(2, zone.columns().count());
    assert!(zone.contains(IVec3::new(2, 2, 2)));
    assert!(!zone.contains(IVec3::new(2, 3, 2)));
    assert!(zone.covers_column(IVec2::new(1, 2)));
    assert!(!zone.covers_column(IVec2::new(0, 2)));
}

#[test]
fn test_zone_set_root_recomputes() {
    let mut zone = ZoneRegion::new(IVec3::ZERO, 1, 1, 1);
    zone.set_root(IVec3::new(5, 0, 5));
    assert!(!zone.contains(IVec3::ZERO));
    assert!(zone.contains(IVec3::new(5, 0, 5)));
}

#[test]
fn test_empty_zone() {
    let zone = ZoneRegion::new(IVec3::ZERO, 0, 4, -1);
    assert_eq!(0, zone.cells().count());
}

#[test]
fn test_zone_rules() {
    let zone = ZoneRegion::new(IVec3::ZERO, 1, 1, 1).with_permissions(false, true);
    assert!(!ZoneRule::CanPlace.holds(&zone));
    assert!(ZoneRule::CanTake.holds(&zone));
}
