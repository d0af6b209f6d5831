//! Canonical keys for implicit simplices and slot kinds.
//!
//! Edges and faces have no slot of their own: they are identified by their
//! sorted global vertex ids. The keys are used by the face attribute store and
//! by the link-count bookkeeping.

use std::fmt;

/// The simplex dimensions of a tetrahedral complex.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum SimplexKind {
    Vertex,
    Edge,
    Face,
    Tetrahedron,
}

/// The simplex kinds that own a slot in the connectivity store.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum SlotKind {
    Vertex,
    Tetrahedron,
}

/// An undirected edge, stored with ascending vertex ids.
#[derive(
    Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
pub struct EdgeKey([usize; 2]);

impl EdgeKey {
    #[inline]
    pub fn new(a: usize, b: usize) -> Self {
        if a < b { Self([a, b]) } else { Self([b, a]) }
    }

    #[inline]
    pub fn vertices(self) -> [usize; 2] {
        self.0
    }

    #[inline]
    pub fn contains(self, v: usize) -> bool {
        self.0[0] == v || self.0[1] == v
    }

    /// The endpoint that is not `v`. Returns `None` if `v` is not an endpoint.
    pub fn other(self, v: usize) -> Option<usize> {
        match self.0 {
            [a, b] if a == v => Some(b),
            [a, b] if b == v => Some(a),
            _ => None,
        }
    }

    /// Relabel one endpoint. Returns `None` when the edge degenerates.
    pub fn relabel(self, from: usize, to: usize) -> Option<Self> {
        let [a, b] = self.0.map(|v| if v == from { to } else { v });
        (a != b).then(|| Self::new(a, b))
    }
}

/// An unoriented triangle, stored with ascending vertex ids.
#[derive(
    Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
pub struct FaceKey([usize; 3]);

impl FaceKey {
    #[inline]
    pub fn new(a: usize, b: usize, c: usize) -> Self {
        let mut v = [a, b, c];
        v.sort_unstable();
        Self(v)
    }

    #[inline]
    pub fn from_array(v: [usize; 3]) -> Self {
        Self::new(v[0], v[1], v[2])
    }

    #[inline]
    pub fn vertices(self) -> [usize; 3] {
        self.0
    }

    #[inline]
    pub fn contains(self, v: usize) -> bool {
        self.0.contains(&v)
    }

    #[inline]
    pub fn contains_edge(self, e: EdgeKey) -> bool {
        let [a, b] = e.vertices();
        self.contains(a) && self.contains(b)
    }

    /// The three edges of the face.
    pub fn edges(self) -> [EdgeKey; 3] {
        let [a, b, c] = self.0;
        [EdgeKey::new(a, b), EdgeKey::new(b, c), EdgeKey::new(a, c)]
    }

    /// Relabel one vertex. Returns `None` when the face degenerates.
    pub fn relabel(self, from: usize, to: usize) -> Option<Self> {
        let [a, b, c] = self.0.map(|v| if v == from { to } else { v });
        (a != b && b != c && a != c).then(|| Self::new(a, b, c))
    }
}

/// Sorted copy of a tetrahedron's vertex ids, used to detect duplicates.
#[inline]
pub fn sorted_tet(mut vids: [usize; 4]) -> [usize; 4] {
    vids.sort_unstable();
    vids
}

// -----------------------------------------------------------------------------
// Formatting traits
// -----------------------------------------------------------------------------

impl fmt::Debug for EdgeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Edge({}, {})", self.0[0], self.0[1])
    }
}

impl fmt::Debug for FaceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Face({}, {}, {})", self.0[0], self.0[1], self.0[2])
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_order_independent() {
        assert_eq!(EdgeKey::new(4, 2), EdgeKey::new(2, 4));
        assert_eq!(FaceKey::new(9, 1, 5), FaceKey::new(5, 9, 1));
        assert_eq!(FaceKey::new(9, 1, 5).vertices(), [1, 5, 9]);
    }

    #[test]
    fn relabel_detects_degeneration() {
        let e = EdgeKey::new(1, 2);
        assert_eq!(e.relabel(1, 2), None);
        assert_eq!(e.relabel(1, 7), Some(EdgeKey::new(2, 7)));
        let f = FaceKey::new(1, 2, 3);
        assert_eq!(f.relabel(1, 3), None);
        assert_eq!(f.relabel(1, 0), Some(FaceKey::new(0, 2, 3)));
    }

    #[test]
    fn face_edges_and_other_endpoint() {
        let f = FaceKey::new(3, 1, 2);
        assert!(f.edges().iter().all(|e| f.contains_edge(*e)));
        assert_eq!(EdgeKey::new(3, 8).other(8), Some(3));
        assert_eq!(EdgeKey::new(3, 8).other(4), None);
    }
}
