//! The library of known shapes.
//!
//! Templates are never handed out mutably: [ShapeCatalog::instantiate] always returns an owned
//! copy, so rotating or placing a shape can't change the table.

use bevy::{
    math::IVec3,
    utils::{HashMap, HashSet},
};
use serde::Deserialize;

use crate::{
    error::CatalogError,
    rules::TagName,
    shape::{rotate_offset, Offsets, ShapeDescriptor, ShapeId, Tags},
};

/// One cell
pub const SINGLE: ShapeId = ShapeId::Known(1);
/// Two cells side by side
pub const DOMINO: ShapeId = ShapeId::Known(2);
/// Three cells in a row
pub const LINE: ShapeId = ShapeId::Known(3);
/// Three cells in an L
pub const ELL: ShapeId = ShapeId::Known(4);
/// Four cells in a T
pub const TEE: ShapeId = ShapeId::Known(5);
/// A flat 2x2 square
pub const SQUARE: ShapeId = ShapeId::Known(6);
/// Two cells on top of each other
pub const PILLAR: ShapeId = ShapeId::Known(7);

/// A catalog entry
#[derive(Clone, Debug)]
pub struct ShapeTemplate {
    id: u32,
    name: String,
    offsets: Offsets,
    tags: Tags,
}

impl ShapeTemplate {
    /// The id shapes made from this template carry
    pub fn id(&self) -> ShapeId {
        ShapeId::Known(self.id)
    }

    /// The display name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Cell offsets relative to the root, as authored
    pub fn offsets(&self) -> &[IVec3] {
        &self.offsets
    }

    fn instantiate(&self) -> ShapeDescriptor {
        ShapeDescriptor::new(self.id(), self.offsets.iter().copied())
            .with_tags(self.tags.iter().copied())
    }
}

#[derive(Deserialize)]
struct TemplateSource {
    id: u32,
    #[serde(default)]
    name: String,
    offsets: Vec<[i32; 3]>,
    #[serde(default)]
    tags: Vec<TagName>,
}

/// An immutable table of shape templates
#[derive(Clone, Debug, Default)]
pub struct ShapeCatalog {
    templates: Vec<ShapeTemplate>,
    by_id: HashMap<u32, usize>,
}

impl ShapeCatalog {
    /// The built in shapes, see [SINGLE] through [PILLAR]
    pub fn standard() -> Self {
        let table: [(ShapeId, &str, &[[i32; 3]]); 7] = [
            (SINGLE, "single", &[[0, 0, 0]]),
            (DOMINO, "domino", &[[0, 0, 0], [1, 0, 0]]),
            (LINE, "line", &[[0, 0, 0], [1, 0, 0], [2, 0, 0]]),
            (ELL, "ell", &[[0, 0, 0], [1, 0, 0], [0, 0, 1]]),
            (TEE, "tee", &[[0, 0, 0], [1, 0, 0], [2, 0, 0], [1, 0, 1]]),
            (SQUARE, "square", &[[0, 0, 0], [1, 0, 0], [0, 0, 1], [1, 0, 1]]),
            (PILLAR, "pillar", &[[0, 0, 0], [0, 1, 0]]),
        ];

        let mut catalog = Self::default();
        for (id, name, offsets) in table {
            let ShapeId::Known(id) = id else { continue };
            catalog.by_id.insert(id, catalog.templates.len());
            catalog.templates.push(ShapeTemplate {
                id,
                name: name.to_owned(),
                offsets: offsets.iter().copied().map(IVec3::from_array).collect(),
                tags: Tags::new(),
            });
        }
        catalog
    }

    /// Load a catalog from a JSON list of templates, for example
    /// `[{"id": 1, "name": "crate", "offsets": [[0, 0, 0], [1, 0, 0]], "tags": ["heavy"]}]`
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let sources: Vec<TemplateSource> = serde_json::from_str(json)?;
        let mut catalog = Self::default();
        for source in sources {
            catalog.insert(source)?;
        }
        Ok(catalog)
    }

    fn insert(&mut self, source: TemplateSource) -> Result<(), CatalogError> {
        let id = source.id;
        if self.by_id.contains_key(&id) {
            return Err(CatalogError::DuplicateId(id));
        }
        if source.offsets.is_empty() {
            return Err(CatalogError::Empty { id });
        }

        let mut seen = HashSet::default();
        for offset in &source.offsets {
            if offset.iter().any(|v| *v < 0) {
                return Err(CatalogError::NegativeOffset {
                    id,
                    offset: *offset,
                });
            }
            if !seen.insert(*offset) {
                return Err(CatalogError::DuplicateOffset {
                    id,
                    offset: *offset,
                });
            }
        }
        if !seen.contains(&[0, 0, 0]) {
            return Err(CatalogError::MissingRoot { id });
        }

        self.by_id.insert(id, self.templates.len());
        self.templates.push(ShapeTemplate {
            id,
            name: source.name,
            offsets: source.offsets.into_iter().map(IVec3::from_array).collect(),
            tags: source.tags.into_iter().map(Into::into).collect(),
        });
        Ok(())
    }

    /// Number of templates
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    /// Whether the catalog has no templates
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Every template, in the order they were loaded
    pub fn templates(&self) -> &[ShapeTemplate] {
        &self.templates
    }

    /// Read only access to a template
    pub fn template(&self, id: ShapeId) -> Option<&ShapeTemplate> {
        let ShapeId::Known(id) = id else {
            return None;
        };
        self.by_id.get(&id).map(|idx| &self.templates[*idx])
    }

    /// A fresh copy of the template, rooted at the origin
    pub fn instantiate(&self, id: ShapeId) -> Option<ShapeDescriptor> {
        self.template(id).map(ShapeTemplate::instantiate)
    }

    /// Find the template the offsets match, in any of the four rotations around the y axis.
    /// The offsets don't need to share the template's anchor, only its cells
    pub fn determine_shape_id(&self, offsets: &[IVec3]) -> ShapeId {
        let candidate = normalized(offsets.iter().copied());
        for template in &self.templates {
            if template.offsets.len() != offsets.len() {
                continue;
            }
            let mut scratch = template.offsets.clone();
            for turn in 0..4 {
                if turn > 0 {
                    for offset in scratch.iter_mut() {
                        *offset = rotate_offset(*offset, true);
                    }
                }
                if normalized(scratch.iter().copied()) == candidate {
                    return template.id();
                }
            }
        }
        ShapeId::Custom
    }

    /// Update the shape's id to whatever template its current offsets match
    pub fn recognize(&self, shape: &mut ShapeDescriptor) -> ShapeId {
        let id = self.determine_shape_id(shape.offsets());
        shape.set_id(id);
        id
    }
}

/// Shift the cells so their minimum corner is the origin, and sort them
fn normalized(offsets: impl Iterator<Item = IVec3>) -> Vec<IVec3> {
    let mut cells: Vec<IVec3> = offsets.collect();
    let min = cells.iter().copied().fold(IVec3::MAX, IVec3::min);
    for cell in cells.iter_mut() {
        *cell -= min;
    }
    cells.sort_by_key(|c| (c.x, c.y, c.z));
    cells
}

#[test]
fn test_instantiate_is_a_copy() {
    let catalog = ShapeCatalog::standard();
    let mut shape = catalog.instantiate(ELL).unwrap();
    shape.rotate(true);
    shape.set_root(IVec3::new(4, 0, 4));

    let fresh = catalog.instantiate(ELL).unwrap();
    assert_eq!(IVec3::ZERO, fresh.root());
    assert_eq!(catalog.template(ELL).unwrap().offsets(), fresh.offsets());
    assert_ne!(shape.offsets(), fresh.offsets());
}

#[test]
fn test_unknown_id() {
    let catalog = ShapeCatalog::standard();
    assert!(catalog.instantiate(ShapeId::Known(999)).is_none());
    assert!(catalog.instantiate(ShapeId::Custom).is_none());
}

#[test]
fn test_determine_rotated_shapes() {
    let catalog = ShapeCatalog::standard();
    for template in catalog.templates() {
        let mut shape = catalog.instantiate(template.id()).unwrap();
        for _ in 0..4 {
            assert_eq!(template.id(), catalog.determine_shape_id(shape.offsets()));
            shape.rotate(true);
        }
    }
}

#[test]
fn test_determine_distinguishes_same_size() {
    let catalog = ShapeCatalog::standard();
    // Three cells in a row along z is a rotated line, not an ell
    let line = [IVec3::ZERO, IVec3::new(0, 0, 1), IVec3::new(0, 0, 2)];
    assert_eq!(LINE, catalog.determine_shape_id(&line));
    // A vertical domino is a pillar, rotations around y never stand a domino up
    assert_eq!(PILLAR, catalog.determine_shape_id(&[IVec3::ZERO, IVec3::Y]));
    assert_eq!(
        DOMINO,
        catalog.determine_shape_id(&[IVec3::ZERO, IVec3::new(0, 0, -1)])
    );
}

#[test]
fn test_determine_custom() {
    let catalog = ShapeCatalog::standard();
    let diagonal = [IVec3::ZERO, IVec3::new(1, 0, 1)];
    assert_eq!(ShapeId::Custom, catalog.determine_shape_id(&diagonal));

    let mut shape = ShapeDescriptor::custom([IVec3::ZERO, IVec3::new(1, 0, 0)]);
    assert_eq!(DOMINO, catalog.recognize(&mut shape));
    assert_eq!(DOMINO, shape.id());
}

#[test]
fn test_from_json() {
    let catalog = ShapeCatalog::from_json(
        r#"[
            {"id": 10, "name": "crate", "offsets": [[0, 0, 0], [1, 0, 0]], "tags": ["heavy"]},
            {"id": 11, "offsets": [[0, 0, 0]]}
        ]"#,
    )
    .unwrap();
    assert_eq!(2, catalog.len());

    let crate_shape = catalog.instantiate(ShapeId::Known(10)).unwrap();
    assert_eq!(1, crate_shape.tags().len());
    assert_eq!("crate", catalog.template(ShapeId::Known(10)).unwrap().name());
    assert_eq!("", catalog.template(ShapeId::Known(11)).unwrap().name());
}

#[test]
fn test_from_json_rejects_bad_templates() {
    let cases = [
        (r#"[{"id": 1, "offsets": []}]"#, "has no cells"),
        (r#"[{"id": 1, "offsets": [[0, 0, 0], [-1, 0, 0]]}]"#, "negative"),
        (r#"[{"id": 1, "offsets": [[1, 0, 0]]}]"#, "lacks"),
        (r#"[{"id": 1, "offsets": [[0, 0, 0], [0, 0, 0]]}]"#, "twice"),
        (
            r#"[{"id": 1, "offsets": [[0, 0, 0]]}, {"id": 1, "offsets": [[0, 0, 0]]}]"#,
            "used twice",
        ),
        (r#"[{"id": 1, "offsets": [[0, 0, 0]], "tags": ["sticky"]}]"#, "invalid"),
    ];
    for (json, message) in cases {
        let err = ShapeCatalog::from_json(json).unwrap_err();
        assert!(err.to_string().contains(message), "{err} for {json}");
    }
}
