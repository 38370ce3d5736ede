//! Shape level placement and movement rules.
//!
//! Every rule is a small struct implementing [ShapeRule]; the closed [ShapeTag] enum dispatches to
//! them without boxing.

use crate::GridSpace;

use bevy::{ecs::entity::Entity, math::IVec3};
use enum_dispatch::enum_dispatch;
use serde::Deserialize;

/// The grid a shape is being validated against. Shapes listed in `lifted` are treated as if they
/// were not in the grid, since they are the ones being moved
pub struct PlacementContext<'a> {
    pub(crate) grid: &'a GridSpace,
    pub(crate) lifted: &'a [Entity],
    pub(crate) offsets: &'a [IVec3],
}

impl PlacementContext<'_> {
    /// The grid being placed into
    pub fn grid(&self) -> &GridSpace {
        self.grid
    }

    /// Whether the shape being validated covers the given offset itself
    pub fn covers_offset(&self, offset: IVec3) -> bool {
        self.offsets.contains(&offset)
    }

    /// Whether the coordinate is free, ignoring the shapes being moved
    pub fn is_open(&self, coord: IVec3) -> bool {
        match self.grid.occupant(coord) {
            Some(entity) => self.lifted.contains(&entity),
            None => true,
        }
    }
}

/// A rule attached to a shape that can veto placing or moving it
#[enum_dispatch]
pub trait ShapeRule {
    /// Whether the cell at `offset`, placed at the absolute coordinate `coord`, is allowed
    fn check_placement(&self, ctx: &PlacementContext<'_>, offset: IVec3, coord: IVec3) -> bool;
    /// Whether the shape may be picked up at all
    fn check_move(&self) -> bool;
}

/// An enum with the rule variants, used to store rules on a shape without Box or dynamic dispatch
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[enum_dispatch(ShapeRule)]
pub enum ShapeTag {
    /// The shape must stand on the floor
    Heavy(HeavyTag),
    /// The shape can't be placed underneath something already there
    Fragile(FragileTag),
    /// The shape can never be moved once placed
    Anchored(AnchoredTag),
}

/// The bottom level of a heavy shape has to be at y = 0
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HeavyTag;

impl ShapeRule for HeavyTag {
    fn check_placement(&self, _ctx: &PlacementContext<'_>, offset: IVec3, coord: IVec3) -> bool {
        offset.y != 0 || coord.y == 0
    }

    fn check_move(&self) -> bool {
        true
    }
}

/// A fragile shape can't be slid underneath something that is already there
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FragileTag;

impl ShapeRule for FragileTag {
    fn check_placement(&self, ctx: &PlacementContext<'_>, offset: IVec3, coord: IVec3) -> bool {
        let above = coord + IVec3::Y;
        ctx.covers_offset(offset + IVec3::Y) || !ctx.grid.in_bounds(above) || ctx.is_open(above)
    }

    fn check_move(&self) -> bool {
        true
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
/// An anchored shape stays where it was placed
pub struct AnchoredTag;

impl ShapeRule for AnchoredTag {
    fn check_placement(&self, _ctx: &PlacementContext<'_>, _offset: IVec3, _coord: IVec3) -> bool {
        true
    }

    fn check_move(&self) -> bool {
        false
    }
}

/// The names tags are written with in catalog files
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum TagName {
    Heavy,
    Fragile,
    Anchored,
}

impl From<TagName> for ShapeTag {
    fn from(name: TagName) -> Self {
        match name {
            TagName::Heavy => HeavyTag.into(),
            TagName::Fragile => FragileTag.into(),
            TagName::Anchored => AnchoredTag.into(),
        }
    }
}

#[test]
fn test_heavy_only_restricts_base_level() {
    let grid = GridSpace::rectangle(2, 2, 3);
    let ctx = PlacementContext {
        grid: &grid,
        lifted: &[],
        offsets: &[IVec3::ZERO, IVec3::Y],
    };
    let heavy = ShapeTag::from(HeavyTag);
    assert!(heavy.check_placement(&ctx, IVec3::ZERO, IVec3::new(1, 0, 1)));
    assert!(!heavy.check_placement(&ctx, IVec3::ZERO, IVec3::new(1, 1, 1)));
    assert!(heavy.check_placement(&ctx, IVec3::Y, IVec3::new(1, 1, 1)));
    assert!(heavy.check_move());
}

#[test]
fn test_anchored_never_moves() {
    let tag = ShapeTag::from(AnchoredTag);
    assert!(!tag.check_move());
}

#[test]
fn test_tag_names() {
    let names: Vec<TagName> = serde_json::from_str(r#"["heavy", "fragile", "anchored"]"#).unwrap();
    let tags: Vec<ShapeTag> = names.into_iter().map(ShapeTag::from).collect();
    assert_eq!(
        vec![
            ShapeTag::Heavy(HeavyTag),
            ShapeTag::Fragile(FragileTag),
            ShapeTag::Anchored(AnchoredTag)
        ],
        tags
    );
}
