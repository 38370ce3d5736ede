use bevy::math::IVec3;
use bitflags::bitflags;
use smallvec::SmallVec;

bitflags! {
    /// The independent reasons a cell can be rejected for
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct PlacementFlags: u8 {
        /// The (x, z) column is not part of the grid
        const OUT_OF_BOUNDS_XZ = 1 << 0;
        /// The cell is below the floor or at or above the height limit
        const OUT_OF_BOUNDS_Y = 1 << 1;
        /// The cell is already occupied
        const OVERLAP = 1 << 2;
        /// A zone covering the cell forbids placing
        const ZONE_RULE = 1 << 3;
        /// One of the shape's tags rejects the cell
        const TAG_RULE = 1 << 4;
    }
}

/// The outcome of validating one shape against a grid. Holds the union of every failure reason
/// and the failing cells with their own reasons, so callers can point at the exact cell
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ValidationResult {
    flags: PlacementFlags,
    failed: SmallVec<[(IVec3, PlacementFlags); 2]>,
}

impl ValidationResult {
    /// A result without any failure
    pub fn valid() -> Self {
        Self::default()
    }

    /// Record the reasons the given cell failed for. Empty reasons are ignored
    pub(crate) fn record(&mut self, coord: IVec3, reasons: PlacementFlags) {
        if reasons.is_empty() {
            return;
        }
        self.flags |= reasons;
        self.failed.push((coord, reasons));
    }

    /// True iff nothing failed
    pub fn is_valid(&self) -> bool {
        self.flags.is_empty()
    }

    /// Every reason any cell failed for
    pub fn flags(&self) -> PlacementFlags {
        self.flags
    }

    /// Whether every flag in `flags` is set
    pub fn contains(&self, flags: PlacementFlags) -> bool {
        self.flags.contains(flags)
    }

    /// Whether any flag in `flags` is set
    pub fn intersects(&self, flags: PlacementFlags) -> bool {
        self.flags.intersects(flags)
    }

    /// Merge the failures of another result into this one
    pub fn union(&mut self, other: &ValidationResult) {
        self.flags |= other.flags;
        self.failed.extend(other.failed.iter().copied());
    }

    /// Every failing cell together with the reasons it failed for
    pub fn failed_cells(&self) -> &[(IVec3, PlacementFlags)] {
        &self.failed
    }
}

/// Whether every result in a group validation passed
pub fn all_valid(results: &[ValidationResult]) -> bool {
    results.iter().all(ValidationResult::is_valid)
}

#[test]
fn test_record_and_union() {
    let mut a = ValidationResult::valid();
    a.record(IVec3::ZERO, PlacementFlags::empty());
    assert!(a.is_valid());
    assert!(a.failed_cells().is_empty());

    a.record(IVec3::new(1, 0, 0), PlacementFlags::OVERLAP);
    let mut b = ValidationResult::valid();
    b.record(
        IVec3::new(0, 4, 0),
        PlacementFlags::OUT_OF_BOUNDS_Y | PlacementFlags::TAG_RULE,
    );

    a.union(&b);
    assert!(!a.is_valid());
    assert!(a.contains(PlacementFlags::OVERLAP | PlacementFlags::OUT_OF_BOUNDS_Y));
    assert!(!a.contains(PlacementFlags::ZONE_RULE));
    assert!(a.intersects(PlacementFlags::ZONE_RULE | PlacementFlags::TAG_RULE));
    assert_eq!(2, a.failed_cells().len());
    assert!(!all_valid(&[ValidationResult::valid(), a]));
    assert!(all_valid(&[]));
}
