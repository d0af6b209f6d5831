//! Operation-local scratch state.
//!
//! One [`OperationCache`] lives for exactly one attempt. It is created by the
//! caller, passed by value into [`Operation::attempt`](crate::ops::Operation::attempt)
//! and dropped after commit or rollback. Invariants read the "before"
//! summaries stored here to judge the mutated state.

use crate::data::mesh::MeshTransaction;
use crate::ops::OperationKind;
use crate::topology::link::LinkCounts;
use crate::topology::{EdgeKey, FaceKey};

/// Scratch record of one operation attempt.
#[derive(Debug)]
pub struct OperationCache {
    pub kind: OperationKind,
    pub(crate) tx: MeshTransaction,
    /// Vertices the operand is made of, plus whatever the operation needs
    /// looked at on both sides of the edit.
    pub seeds: Vec<usize>,
    /// Oriented edge operand `(v1, v2)`. For a collapse, `v1` disappears.
    pub edge: Option<(usize, usize)>,
    /// Face operand of a face swap.
    pub face: Option<FaceKey>,
    /// Ring of vertices around a swapped edge, in cyclic order.
    pub ring: Vec<usize>,
    /// Tetrahedra removed or rewritten by the edit.
    pub old_tets: Vec<usize>,
    /// Vertex tuples of `old_tets`, captured before the edit.
    pub old_tet_vertices: Vec<[usize; 4]>,
    /// Highest energy among the pre-edit elements the acceptance rule compares against.
    pub old_max_energy: f64,
    /// Tetrahedra written by the edit.
    pub new_tets: Vec<usize>,
    /// Energies of `new_tets`, same order.
    pub new_energies: Vec<f64>,
    pub new_vertex: Option<usize>,
    /// Target position of a relocated vertex.
    pub new_position: Option<[f64; 3]>,
    /// Vertices whose position the edit changes without touching connectivity.
    pub moved: Vec<usize>,
    /// Vertex identities carried over by the edit: `(old, new)`.
    pub renamed: Vec<(usize, usize)>,
    /// Edges that legitimately stop existing.
    pub vanished_edges: Vec<EdgeKey>,
    /// Surface link counts recorded before the edit.
    pub link_counts: Option<LinkCounts>,
    /// Surface faces present around the operand before the edit.
    pub surface_faces_before: Vec<FaceKey>,
    /// Open-boundary edges present around the operand, already renamed.
    pub open_boundary_edges: Vec<EdgeKey>,
}

impl OperationCache {
    pub fn new(kind: OperationKind) -> Self {
        Self {
            kind,
            tx: MeshTransaction::default(),
            seeds: Vec::new(),
            edge: None,
            face: None,
            ring: Vec::new(),
            old_tets: Vec::new(),
            old_tet_vertices: Vec::new(),
            old_max_energy: f64::NEG_INFINITY,
            new_tets: Vec::new(),
            new_energies: Vec::new(),
            new_vertex: None,
            new_position: None,
            moved: Vec::new(),
            renamed: Vec::new(),
            vanished_edges: Vec::new(),
            link_counts: None,
            surface_faces_before: Vec::new(),
            open_boundary_edges: Vec::new(),
        }
    }

    /// Identity of `v` after the edit.
    pub fn rename(&self, v: usize) -> usize {
        self.renamed
            .iter()
            .find(|(old, _)| *old == v)
            .map_or(v, |&(_, new)| new)
    }

    /// Seeds after the edit: renamed, deduplicated, plus the new vertex.
    pub fn seeds_after(&self) -> Vec<usize> {
        let mut out: Vec<usize> = self.seeds.iter().map(|&v| self.rename(v)).collect();
        out.extend(self.new_vertex);
        out.sort_unstable();
        out.dedup();
        out
    }

    /// Highest energy among the new elements; `-inf` when there are none.
    pub fn new_max_energy(&self) -> f64 {
        self.new_energies
            .iter()
            .copied()
            .fold(f64::NEG_INFINITY, f64::max)
    }
}
