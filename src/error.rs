use bevy::ecs::entity::Entity;
use thiserror::Error;

use crate::ValidationResult;

fn failed(results: &[ValidationResult]) -> usize {
    results.iter().filter(|r| !r.is_valid()).count()
}

/// Why placing new shapes into a grid failed. Nothing is written when this is returned
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlaceError {
    /// The shape handle is already placed in this grid, or listed twice in one group
    #[error("shape {0:?} is already placed in this grid")]
    AlreadyPlaced(Entity),
    /// An unchecked write would take cells that belong to this other shape
    #[error("writing the shape would overwrite shape {0:?}")]
    Overwrites(Entity),
    /// Validation failed, holds one result per shape in the order they were passed in
    #[error("{} of {} shapes failed validation", failed(.0), .0.len())]
    Blocked(Vec<ValidationResult>),
}

impl PlaceError {
    /// The validation results, empty unless the placement was [PlaceError::Blocked]
    pub fn results(&self) -> &[ValidationResult] {
        match self {
            PlaceError::Blocked(results) => results,
            PlaceError::AlreadyPlaced(_) | PlaceError::Overwrites(_) => &[],
        }
    }
}

/// Why moving shapes failed. Both grids are left exactly as they were
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MoveError {
    /// No shapes were given
    #[error("no shapes to move")]
    Empty,
    /// The shape is not placed in the source grid
    #[error("shape {0:?} is not in the source grid")]
    UnknownShape(Entity),
    /// The shape's root lies in a zone that doesn't allow taking
    #[error("shape {0:?} is in a zone that forbids taking")]
    ZoneLocked(Entity),
    /// One of the shape's tags forbids moving it
    #[error("shape {0:?} can't be moved")]
    TagLocked(Entity),
    /// The shapes don't fit at the target, holds one result per shape ordered bottom to top
    #[error("{} of {} shapes don't fit at the target", failed(.0), .0.len())]
    Blocked(Vec<ValidationResult>),
}

/// Errors raised while loading a shape catalog
#[derive(Error, Debug)]
pub enum CatalogError {
    /// The JSON doesn't describe a list of templates
    #[error("invalid catalog: {0}")]
    Parse(#[from] serde_json::Error),
    /// A template without cells
    #[error("shape {id} has no cells")]
    Empty {
        /// The template's id
        id: u32,
    },
    /// Offsets are authored relative to the lowest corner and can't be negative
    #[error("shape {id} has negative offset {offset:?}")]
    NegativeOffset {
        /// The template's id
        id: u32,
        /// The offending offset
        offset: [i32; 3],
    },
    /// A template without the zero offset
    #[error("shape {id} lacks the [0, 0, 0] offset")]
    MissingRoot {
        /// The template's id
        id: u32,
    },
    /// A template covering the same cell twice
    #[error("shape {id} lists offset {offset:?} twice")]
    DuplicateOffset {
        /// The template's id
        id: u32,
        /// The repeated offset
        offset: [i32; 3],
    },
    /// Two templates share an id
    #[error("shape id {0} is used twice")]
    DuplicateId(u32),
}

#[test]
fn test_parse_error_keeps_source() {
    use std::error::Error as _;

    let err = CatalogError::from(serde_json::from_str::<u32>("[").unwrap_err());
    assert!(err.to_string().starts_with("invalid catalog: "));
    assert!(err.source().is_some());
    assert!(CatalogError::DuplicateId(3).source().is_none());

    let blocked = MoveError::Blocked(vec![ValidationResult::valid(), ValidationResult::valid()]);
    assert_eq!("0 of 2 shapes don't fit at the target", blocked.to_string());
}
