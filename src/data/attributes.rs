//! Attribute payloads for vertices, faces and tetrahedra.

use core::fmt;

/// Set of axis-aligned bounding-box sides, one bit per side.
///
/// Side `2 * axis` is the low side of `axis`, `2 * axis + 1` the high side.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct BboxSides(u8);

impl BboxSides {
    pub const NONE: Self = Self(0);
    pub const SIDES: u8 = 6;

    /// Set holding the single side `side`.
    pub fn single(side: u8) -> Self {
        debug_assert!(side < Self::SIDES, "bbox side {side} out of range");
        Self(1 << side)
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn contains(self, side: u8) -> bool {
        side < Self::SIDES && self.0 & (1 << side) != 0
    }

    pub fn insert(&mut self, side: u8) {
        *self = self.union(Self::single(side));
    }

    pub fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub fn intersection(self, other: Self) -> Self {
        Self(self.0 & other.0)
    }

    pub fn is_subset_of(self, other: Self) -> bool {
        self.0 & !other.0 == 0
    }

    pub fn iter(self) -> impl Iterator<Item = u8> {
        (0..Self::SIDES).filter(move |&s| self.contains(s))
    }
}

impl fmt::Debug for BboxSides {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

/// Per-vertex payload.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct VertexAttributes {
    pub pos: [f64; 3],
    /// Position is exactly representable; only rounded vertices may collapse.
    pub is_rounded: bool,
    pub is_on_surface: bool,
    pub is_on_open_boundary: bool,
    pub on_bbox_faces: BboxSides,
    /// Local multiplier of the target edge length.
    pub sizing_scalar: f64,
    pub partition_id: usize,
}

impl Default for VertexAttributes {
    fn default() -> Self {
        Self {
            pos: [0.0; 3],
            is_rounded: true,
            is_on_surface: false,
            is_on_open_boundary: false,
            on_bbox_faces: BboxSides::NONE,
            sizing_scalar: 1.0,
            partition_id: 0,
        }
    }
}

impl VertexAttributes {
    pub fn at(pos: [f64; 3]) -> Self {
        Self {
            pos,
            ..Self::default()
        }
    }

    /// Attributes of the midpoint of the edge `(a, b)`.
    ///
    /// The caller decides the surface flag, which depends on the faces
    /// around the edge rather than on the endpoints.
    pub fn midpoint(a: &Self, b: &Self) -> Self {
        Self {
            pos: [
                0.5 * (a.pos[0] + b.pos[0]),
                0.5 * (a.pos[1] + b.pos[1]),
                0.5 * (a.pos[2] + b.pos[2]),
            ],
            is_rounded: true,
            is_on_surface: false,
            is_on_open_boundary: a.is_on_open_boundary && b.is_on_open_boundary,
            on_bbox_faces: a.on_bbox_faces.intersection(b.on_bbox_faces),
            sizing_scalar: 0.5 * (a.sizing_scalar + b.sizing_scalar),
            partition_id: a.partition_id,
        }
    }
}

/// Per-face payload, keyed by the face's sorted vertex triple.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FaceAttributes {
    pub tag: i32,
    pub is_surface: bool,
    pub bbox_side: Option<u8>,
}

impl FaceAttributes {
    /// Fold the attributes of a face that is merged into this one.
    pub fn merge(&mut self, other: &Self) {
        self.is_surface |= other.is_surface;
        if other.bbox_side.is_some() {
            self.bbox_side = other.bbox_side;
        }
    }

    /// Whether the face carries nothing worth storing.
    pub fn is_plain(&self) -> bool {
        *self == Self::default()
    }
}

/// Per-tetrahedron payload.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TetAttributes {
    /// Energy of the element; lower is better.
    pub quality: f64,
    pub tag: i32,
    pub part_id: usize,
}

impl Default for TetAttributes {
    fn default() -> Self {
        Self {
            quality: f64::INFINITY,
            tag: 0,
            part_id: 0,
        }
    }
}

impl TetAttributes {
    /// Attributes for a child of `parent`; quality is recomputed by the caller.
    pub fn child_of(parent: &Self) -> Self {
        Self {
            quality: f64::INFINITY,
            tag: parent.tag,
            part_id: parent.part_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bbox_side_sets() {
        let mut a = BboxSides::single(0);
        a.insert(3);
        let b = BboxSides::single(3);
        assert!(b.is_subset_of(a));
        assert!(!a.is_subset_of(b));
        assert!(BboxSides::NONE.is_subset_of(b));
        assert_eq!(a.intersection(b), b);
        assert_eq!(a.iter().collect::<Vec<_>>(), vec![0, 3]);
        assert_eq!(format!("{a:?}"), "{0, 3}");
    }

    #[test]
    fn face_merge_ors_surface_and_keeps_side() {
        let mut f = FaceAttributes {
            tag: 2,
            is_surface: false,
            bbox_side: Some(1),
        };
        f.merge(&FaceAttributes {
            is_surface: true,
            ..FaceAttributes::default()
        });
        assert!(f.is_surface);
        assert_eq!(f.bbox_side, Some(1));
        f.merge(&FaceAttributes {
            bbox_side: Some(4),
            ..FaceAttributes::default()
        });
        assert_eq!(f.bbox_side, Some(4));
        assert_eq!(f.tag, 2);
    }

    #[test]
    fn midpoint_intersects_bbox_sides() {
        let mut a = VertexAttributes::at([0.0, 0.0, 0.0]);
        let mut b = VertexAttributes::at([2.0, 0.0, 0.0]);
        a.on_bbox_faces = BboxSides::single(0).union(BboxSides::single(2));
        b.on_bbox_faces = BboxSides::single(2);
        a.sizing_scalar = 2.0;
        a.is_on_open_boundary = true;
        let m = VertexAttributes::midpoint(&a, &b);
        assert_eq!(m.pos, [1.0, 0.0, 0.0]);
        assert_eq!(m.on_bbox_faces, BboxSides::single(2));
        assert_eq!(m.sizing_scalar, 1.5);
        assert!(!m.is_on_open_boundary);
    }
}
