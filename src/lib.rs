//! This crate holds the placement engine for a 3D stacking game.
//! Rigid multi-cell shapes are placed into grids, moved between them as whole stacks and fall
//! down when everything underneath them is taken away.
//!
//! A grid is a sparse map from cell to the shape occupying it:
//! - Placing validates every cell against the grid's bounds, other shapes, zones and the shape's
//!   own tags, and writes nothing unless every cell passes
//! - Moving lifts the shapes out of the source grid first, and puts them back if they don't fit
//!   at the target

#![warn(missing_docs)]

mod shape;
pub use shape::{column, rotate_offset, Offsets, ShapeDescriptor, ShapeId, Tags};

pub mod catalog;
pub use catalog::{ShapeCatalog, ShapeTemplate};

pub mod rules;
pub use rules::{AnchoredTag, FragileTag, HeavyTag, PlacementContext, ShapeRule, ShapeTag};

mod validation;
pub use validation::{all_valid, PlacementFlags, ValidationResult};

mod zone;
pub use zone::{ZoneId, ZoneRegion, ZoneRule};

mod error;
pub use error::{CatalogError, MoveError, PlaceError};

mod grid;
pub use grid::{GridChange, GridSpace};

mod gravity;

mod movement;
pub use movement::move_shapes;

mod stack;
pub use stack::StackSelection;

mod plugin;
pub use plugin::{forward_grid_changes, GridEvent, StackGridPlugin};

/// The number of levels a game grid usually has
pub const DEFAULT_GRID_HEIGHT: i32 = 8;
