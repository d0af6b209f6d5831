//! `AttributedMesh`: connectivity plus the three attribute stores.
//!
//! Every creation and deletion of a simplex goes through this type, so the
//! vertex, face and tetrahedron stores stay in step with the connectivity.
//! Local edits are grouped in a [`MeshTransaction`], which is either
//! committed or rolled back as a whole.

use hashbrown::HashSet;

use crate::data::attributes::{BboxSides, FaceAttributes, TetAttributes, VertexAttributes};
use crate::data::storage::{AttributeCollection, AttributeJournal};
use crate::debug_invariants::DebugInvariants;
use crate::mesh_error::MeshOpsError;
use crate::topology::tet_mesh::{ConnectivityEdit, ConnectivitySnapshot};
use crate::topology::validation::{
    NonManifoldHandling, TopologyValidationOptions, validate_tet_topology,
};
use crate::topology::{Consolidation, EdgeKey, FaceKey, TetMesh};

/// Tolerance used to decide that a boundary vertex lies on a bbox plane.
const BBOX_TOL: f64 = 1e-10;

/// Undo log of one operation attempt: connectivity plus every attribute write.
#[derive(Debug, Default)]
pub struct MeshTransaction {
    pub(crate) edit: ConnectivityEdit,
    pub(crate) vertices: AttributeJournal<usize, VertexAttributes>,
    pub(crate) faces: AttributeJournal<FaceKey, FaceAttributes>,
    pub(crate) tets: AttributeJournal<usize, TetAttributes>,
}

impl MeshTransaction {
    /// Tetrahedra created so far.
    pub fn new_tets(&self) -> &[usize] {
        self.edit.new_tets()
    }

    /// Vertices created so far.
    pub fn new_vertices(&self) -> &[usize] {
        self.edit.new_vertices()
    }

    pub fn is_empty(&self) -> bool {
        self.edit.is_empty()
            && self.vertices.is_empty()
            && self.faces.is_empty()
            && self.tets.is_empty()
    }
}

/// Full copy of the mesh state, for equality checks in tests and diagnostics.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct MeshSnapshot {
    pub connectivity: ConnectivitySnapshot,
    pub vertices: Vec<(usize, VertexAttributes)>,
    pub faces: Vec<(FaceKey, FaceAttributes)>,
    pub tets: Vec<(usize, TetAttributes)>,
}

/// Compacted read-only view for external mesh writers.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize)]
pub struct MeshExport {
    pub positions: Vec<[f64; 3]>,
    pub tets: Vec<[usize; 4]>,
    pub tet_tags: Vec<i32>,
    pub tet_quality: Vec<f64>,
    pub surface_faces: Vec<[usize; 3]>,
}

/// Tetrahedral mesh with per-vertex, per-face and per-tetrahedron attributes.
#[derive(Clone, Debug)]
pub struct AttributedMesh {
    topology: TetMesh,
    vertex_attrs: AttributeCollection<usize, VertexAttributes>,
    face_attrs: AttributeCollection<FaceKey, FaceAttributes>,
    tet_attrs: AttributeCollection<usize, TetAttributes>,
}

impl AttributedMesh {
    /// Build a mesh from vertex positions and positively oriented tetrahedra.
    pub fn new(
        positions: &[[f64; 3]],
        tets: &[[usize; 4]],
        non_manifold: NonManifoldHandling,
    ) -> Result<Self, MeshOpsError> {
        let topology = TetMesh::from_tets(positions.len(), tets)?;
        validate_tet_topology(
            &topology,
            TopologyValidationOptions {
                check_incidence: false,
                non_manifold,
            },
        )?;
        let mesh = Self {
            topology,
            vertex_attrs: AttributeCollection::new("vertex", VertexAttributes::default()),
            face_attrs: AttributeCollection::new("face", FaceAttributes::default()),
            tet_attrs: AttributeCollection::new("tet", TetAttributes::default()),
        };
        for (v, &pos) in positions.iter().enumerate() {
            mesh.vertex_attrs.set(v, VertexAttributes::at(pos));
        }
        mesh.tet_attrs.grow_to(tets.len());
        Ok(mesh)
    }

    // -------------------------------------------------------------------------
    // Setup helpers
    // -------------------------------------------------------------------------

    /// Assign one domain tag per tetrahedron, in input order.
    pub fn set_tet_tags(&self, tags: &[i32]) {
        for (t, &tag) in tags.iter().enumerate() {
            self.tet_attrs.update(t, |a| a.tag = tag);
        }
    }

    /// Tag the given faces as surface, and their vertices as surface vertices.
    pub fn mark_surface_faces(&self, faces: &[[usize; 3]]) {
        for &f in faces {
            let key = FaceKey::from_array(f);
            self.face_attrs.update(key, |a| a.is_surface = true);
            for v in f {
                self.vertex_attrs.update(v, |a| a.is_on_surface = true);
            }
        }
    }

    /// Tag every boundary face as surface.
    pub fn mark_boundary_as_surface(&self) {
        let boundary: Vec<[usize; 3]> = self
            .topology
            .faces()
            .into_iter()
            .filter(|&f| self.topology.is_boundary_face(f))
            .map(FaceKey::vertices)
            .collect();
        self.mark_surface_faces(&boundary);
    }

    /// Detect boundary faces lying on a side of the axis-aligned bounding box.
    ///
    /// Such faces get `bbox_side`, and their vertices collect the side in
    /// `on_bbox_faces`.
    pub fn mark_bbox_faces(&self) {
        let Some((lo, hi)) = self.bounding_box() else { return };
        for face in self.topology.faces() {
            if !self.topology.is_boundary_face(face) {
                continue;
            }
            let pts = face.vertices().map(|v| self.position(v));
            let side = (0..3).find_map(|axis| {
                if pts.iter().all(|p| (p[axis] - lo[axis]).abs() <= BBOX_TOL) {
                    Some(2 * axis as u8)
                } else if pts.iter().all(|p| (p[axis] - hi[axis]).abs() <= BBOX_TOL) {
                    Some(2 * axis as u8 + 1)
                } else {
                    None
                }
            });
            let Some(side) = side else { continue };
            self.face_attrs.update(face, |a| a.bbox_side = Some(side));
            for v in face.vertices() {
                self.vertex_attrs.update(v, |a| a.on_bbox_faces.insert(side));
            }
        }
    }

    /// Axis-aligned bounds of the live vertices.
    pub fn bounding_box(&self) -> Option<([f64; 3], [f64; 3])> {
        let mut it = self
            .topology
            .live_vertex_ids()
            .into_iter()
            .map(|v| self.position(v));
        let first = it.next()?;
        Some(it.fold((first, first), |(mut lo, mut hi), p| {
            for k in 0..3 {
                lo[k] = lo[k].min(p[k]);
                hi[k] = hi[k].max(p[k]);
            }
            (lo, hi)
        }))
    }

    // -------------------------------------------------------------------------
    // Read access
    // -------------------------------------------------------------------------

    #[inline]
    pub fn topology(&self) -> &TetMesh {
        &self.topology
    }

    pub fn vertex_attrs(&self) -> &AttributeCollection<usize, VertexAttributes> {
        &self.vertex_attrs
    }

    pub fn face_attrs(&self) -> &AttributeCollection<FaceKey, FaceAttributes> {
        &self.face_attrs
    }

    pub fn tet_attrs(&self) -> &AttributeCollection<usize, TetAttributes> {
        &self.tet_attrs
    }

    // Reads through a dead id are caller bugs: the stores would hand back the
    // fallback, or the attributes of whatever reused the slot. The accessors
    // below check liveness whenever invariant checking is compiled in.

    fn ensure_live_vertex(&self, v: usize) -> Result<(), MeshOpsError> {
        if self.topology.is_vertex_live(v) {
            Ok(())
        } else {
            Err(MeshOpsError::StaleHandle(format!("vertex {v} is not live")))
        }
    }

    fn ensure_live_tet(&self, t: usize) -> Result<(), MeshOpsError> {
        if self.topology.is_tet_live(t) {
            Ok(())
        } else {
            Err(MeshOpsError::StaleHandle(format!("tetrahedron {t} is not live")))
        }
    }

    fn ensure_live_face(&self, face: FaceKey) -> Result<(), MeshOpsError> {
        let [a, b, c] = face.vertices();
        if self.topology.face_tets(a, b, c).is_empty() {
            Err(MeshOpsError::StaleHandle(format!("face {face:?} is not live")))
        } else {
            Ok(())
        }
    }

    #[inline]
    pub fn vertex(&self, v: usize) -> VertexAttributes {
        crate::debug_invariants!(self.ensure_live_vertex(v), "vertex read");
        self.vertex_attrs.get(&v)
    }

    /// Lock-free read for priorities; `None` once the vertex is gone.
    ///
    /// The value may be outdated by the time it is used and must never
    /// authorize an edit.
    #[inline]
    pub fn try_vertex(&self, v: usize) -> Option<VertexAttributes> {
        self.vertex_attrs.get_opt(&v)
    }

    #[inline]
    pub fn position(&self, v: usize) -> [f64; 3] {
        crate::debug_invariants!(self.ensure_live_vertex(v), "position read");
        self.vertex_attrs.get(&v).pos
    }

    pub fn face(&self, face: FaceKey) -> FaceAttributes {
        crate::debug_invariants!(self.ensure_live_face(face), "face read");
        self.face_attrs.get(&face)
    }

    pub fn tet(&self, t: usize) -> TetAttributes {
        crate::debug_invariants!(self.ensure_live_tet(t), "tet read");
        self.tet_attrs.get(&t)
    }

    /// Lock-free read for priorities; `None` once the tetrahedron is gone.
    #[inline]
    pub fn try_tet(&self, t: usize) -> Option<TetAttributes> {
        self.tet_attrs.get_opt(&t)
    }

    /// Corner positions of a tetrahedron given by vertex ids.
    pub fn corners(&self, vids: [usize; 4]) -> [[f64; 3]; 4] {
        vids.map(|v| self.position(v))
    }

    /// Corner positions of a live tetrahedron.
    pub fn tet_corners(&self, t: usize) -> Option<[[f64; 3]; 4]> {
        self.topology.tet_vertices(t).map(|vids| self.corners(vids))
    }

    pub fn edge_length2(&self, a: usize, b: usize) -> f64 {
        let (p, q) = (self.position(a), self.position(b));
        (0..3).map(|k| (p[k] - q[k]) * (p[k] - q[k])).sum()
    }

    /// Faces of the tetrahedra around `(a, b)` that contain the edge.
    pub fn faces_around_edge(&self, a: usize, b: usize) -> Vec<FaceKey> {
        let mut out: Vec<FaceKey> = self
            .topology
            .edge_tets(a, b)
            .into_iter()
            .filter_map(|t| self.topology.tet_vertices(t))
            .flatten()
            .filter(|&x| x != a && x != b)
            .map(|x| FaceKey::new(a, b, x))
            .collect();
        out.sort_unstable();
        out.dedup();
        out
    }

    pub fn is_surface_face(&self, face: FaceKey) -> bool {
        self.face_attrs.get_opt(&face).is_some_and(|a| a.is_surface)
    }

    /// An edge is a surface edge when one of its faces is a surface face.
    pub fn is_surface_edge(&self, a: usize, b: usize) -> bool {
        self.faces_around_edge(a, b)
            .into_iter()
            .any(|f| self.is_surface_face(f))
    }

    /// An edge is a bbox edge when one of its faces lies on a bbox side.
    pub fn is_bbox_edge(&self, a: usize, b: usize) -> bool {
        self.faces_around_edge(a, b)
            .into_iter()
            .any(|f| self.face_attrs.get_opt(&f).is_some_and(|x| x.bbox_side.is_some()))
    }

    /// Open-boundary edges: both endpoints on the open boundary and the edge
    /// not shared with a surface face on both sides.
    pub fn is_open_boundary_edge(&self, a: usize, b: usize) -> bool {
        self.vertex(a).is_on_open_boundary
            && self.vertex(b).is_on_open_boundary
            && self
                .faces_around_edge(a, b)
                .into_iter()
                .filter(|&f| self.is_surface_face(f))
                .count()
                == 1
    }

    /// Bbox sides shared by both endpoints of an edge.
    pub fn shared_bbox_sides(&self, a: usize, b: usize) -> BboxSides {
        self.vertex(a)
            .on_bbox_faces
            .intersection(self.vertex(b).on_bbox_faces)
    }

    // -------------------------------------------------------------------------
    // Transactional editing
    // -------------------------------------------------------------------------

    /// Create a vertex with the given attributes.
    pub fn add_vertex(&self, attrs: VertexAttributes, tx: &mut MeshTransaction) -> usize {
        let v = self.topology.add_vertex(&mut tx.edit);
        self.vertex_attrs.set_logged(v, attrs, &mut tx.vertices);
        v
    }

    /// Remove a vertex whose tetrahedra are already gone.
    pub fn remove_vertex(&self, v: usize, tx: &mut MeshTransaction) {
        self.topology.remove_vertex(v, &mut tx.edit);
        self.vertex_attrs.remove_logged(&v, &mut tx.vertices);
    }

    pub fn update_vertex<F: FnOnce(&mut VertexAttributes)>(
        &self,
        v: usize,
        f: F,
        tx: &mut MeshTransaction,
    ) {
        self.vertex_attrs.update_logged(v, f, &mut tx.vertices);
    }

    pub fn set_face(&self, face: FaceKey, attrs: FaceAttributes, tx: &mut MeshTransaction) {
        self.face_attrs.set_logged(face, attrs, &mut tx.faces);
    }

    pub fn update_face<F: FnOnce(&mut FaceAttributes)>(
        &self,
        face: FaceKey,
        f: F,
        tx: &mut MeshTransaction,
    ) {
        self.face_attrs.update_logged(face, f, &mut tx.faces);
    }

    pub fn remove_face(&self, face: FaceKey, tx: &mut MeshTransaction) -> Option<FaceAttributes> {
        self.face_attrs.remove_logged(&face, &mut tx.faces)
    }

    pub fn update_tet<F: FnOnce(&mut TetAttributes)>(
        &self,
        t: usize,
        f: F,
        tx: &mut MeshTransaction,
    ) {
        self.tet_attrs.update_logged(t, f, &mut tx.tets);
    }

    /// Replace tetrahedra, writing the attributes of each new one.
    ///
    /// Returns the new tetrahedron ids in input order.
    pub fn replace_tets(
        &self,
        removed: &[usize],
        new_tets: &[([usize; 4], TetAttributes)],
        tx: &mut MeshTransaction,
    ) -> Vec<usize> {
        let vids: Vec<[usize; 4]> = new_tets.iter().map(|(v, _)| *v).collect();
        let ids = self.topology.replace_tets(removed, &vids, &mut tx.edit);
        for (&t, (_, attrs)) in ids.iter().zip(new_tets) {
            self.tet_attrs.set_logged(t, attrs.clone(), &mut tx.tets);
        }
        for t in removed.iter().skip(new_tets.len()) {
            self.tet_attrs.remove_logged(t, &mut tx.tets);
        }
        ids
    }

    /// Drop the attributes of faces that no longer exist.
    pub fn drop_dead_faces(&self, candidates: &[FaceKey], tx: &mut MeshTransaction) {
        for &face in candidates {
            let [a, b, c] = face.vertices();
            if self.face_attrs.contains(&face) && self.topology.face_tets(a, b, c).is_empty() {
                self.face_attrs.remove_logged(&face, &mut tx.faces);
            }
        }
    }

    /// Undo a transaction exactly.
    pub fn rollback(&self, tx: MeshTransaction) {
        let MeshTransaction {
            edit,
            vertices,
            faces,
            tets,
        } = tx;
        self.topology.rollback(edit);
        self.vertex_attrs.restore(vertices);
        self.face_attrs.restore(faces);
        self.tet_attrs.restore(tets);
    }

    /// Keep a transaction; slots it emptied become reusable.
    pub fn commit(&self, tx: MeshTransaction) {
        self.topology.commit(tx.edit);
    }

    // -------------------------------------------------------------------------
    // Compaction and export
    // -------------------------------------------------------------------------

    /// Compact every store; all outstanding handles become invalid.
    pub fn consolidate(&mut self) -> Consolidation {
        let live_faces: HashSet<FaceKey> = self.topology.faces().into_iter().collect();
        let maps = self.topology.consolidate();
        let vmap = |v: usize| maps.vertex_map.get(v).copied().flatten();
        self.vertex_attrs.remap(vmap);
        self.tet_attrs
            .remap(|t| maps.tet_map.get(t).copied().flatten());
        self.face_attrs.remap(|f| {
            if !live_faces.contains(&f) {
                return None;
            }
            let [a, b, c] = f.vertices();
            Some(FaceKey::new(vmap(a)?, vmap(b)?, vmap(c)?))
        });
        maps
    }

    /// Compacted copy of positions, tetrahedra and surface faces.
    pub fn export(&self) -> MeshExport {
        let live_v = self.topology.live_vertex_ids();
        let mut index = vec![usize::MAX; self.topology.vertex_capacity()];
        for (new, &old) in live_v.iter().enumerate() {
            index[old] = new;
        }
        let mut out = MeshExport {
            positions: live_v.iter().map(|&v| self.position(v)).collect(),
            ..MeshExport::default()
        };
        for t in self.topology.live_tet_ids() {
            let Some(vids) = self.topology.tet_vertices(t) else { continue };
            let attrs = self.tet(t);
            out.tets.push(vids.map(|v| index[v]));
            out.tet_tags.push(attrs.tag);
            out.tet_quality.push(attrs.quality);
        }
        for face in self.topology.faces() {
            if self.is_surface_face(face) {
                out.surface_faces.push(face.vertices().map(|v| index[v]));
            }
        }
        out
    }

    /// Copy of all connectivity records and stored attributes.
    pub fn snapshot(&self) -> MeshSnapshot {
        MeshSnapshot {
            connectivity: self.topology.snapshot(),
            vertices: self.vertex_attrs.snapshot(),
            faces: self.face_attrs.snapshot(),
            tets: self.tet_attrs.snapshot(),
        }
    }
}

impl DebugInvariants for AttributedMesh {
    fn validate_invariants(&self) -> Result<(), MeshOpsError> {
        self.topology.validate_invariants()?;
        for v in self.topology.live_vertex_ids() {
            self.vertex_attrs.try_get(&v)?;
        }
        for t in self.topology.live_tet_ids() {
            self.tet_attrs.try_get(&t)?;
        }
        for (face, _) in self.face_attrs.snapshot() {
            let [a, b, c] = face.vertices();
            if self.topology.face_tets(a, b, c).is_empty() {
                return Err(MeshOpsError::InvariantViolation(format!(
                    "attributes stored for missing face {face:?}"
                )));
            }
        }
        Ok(())
    }

    fn debug_assert_invariants(&self) {
        crate::debug_invariants!(self.validate_invariants(), "AttributedMesh");
    }
}

/// Edge keys of the faces in `faces`, deduplicated.
pub(crate) fn edges_of_faces(faces: &[FaceKey]) -> Vec<EdgeKey> {
    let mut out: Vec<EdgeKey> = faces.iter().flat_map(|f| f.edges()).collect();
    out.sort_unstable();
    out.dedup();
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_tet() -> AttributedMesh {
        AttributedMesh::new(
            &[
                [0.0, 0.0, 0.0],
                [1.0, 0.0, 0.0],
                [0.0, 1.0, 0.0],
                [0.0, 0.0, 1.0],
            ],
            &[[0, 1, 2, 3]],
            NonManifoldHandling::Error,
        )
        .expect("valid mesh")
    }

    #[test]
    fn bbox_and_surface_marking() {
        let m = unit_tet();
        m.mark_bbox_faces();
        m.mark_boundary_as_surface();
        assert_eq!(m.face(FaceKey::new(0, 1, 2)).bbox_side, Some(4));
        assert_eq!(m.face(FaceKey::new(0, 1, 3)).bbox_side, Some(2));
        assert_eq!(m.face(FaceKey::new(1, 2, 3)).bbox_side, None);
        assert_eq!(m.vertex(0).on_bbox_faces.iter().collect::<Vec<_>>(), vec![0, 2, 4]);
        assert!(m.is_surface_edge(1, 2));
        assert!(m.is_bbox_edge(0, 1));
        m.validate_invariants().expect("consistent");
    }

    #[test]
    fn transaction_rollback_restores_everything() {
        let m = unit_tet();
        m.mark_boundary_as_surface();
        let before = m.snapshot();

        let mut tx = MeshTransaction::default();
        let mid = VertexAttributes::midpoint(&m.vertex(0), &m.vertex(1));
        let v = m.add_vertex(mid, &mut tx);
        let parent = m.tet(0);
        m.replace_tets(
            &[0],
            &[
                ([v, 1, 2, 3], TetAttributes::child_of(&parent)),
                ([0, v, 2, 3], TetAttributes::child_of(&parent)),
            ],
            &mut tx,
        );
        m.drop_dead_faces(&[FaceKey::new(0, 1, 2), FaceKey::new(0, 1, 3)], &mut tx);
        m.set_face(FaceKey::new(0, v, 2), FaceAttributes::default(), &mut tx);
        assert_eq!(m.topology().n_tets(), 2);
        assert!(!m.face_attrs().contains(&FaceKey::new(0, 1, 2)));

        m.rollback(tx);
        assert_eq!(m.snapshot(), before);
    }

    /// Two tetrahedra sharing face (1, 2, 3), with tetrahedron 0 and
    /// vertex 0 removed and committed.
    fn with_dead_corner() -> AttributedMesh {
        let m = AttributedMesh::new(
            &[
                [0.0, 0.0, 0.0],
                [1.0, 0.0, 0.0],
                [0.0, 1.0, 0.0],
                [0.0, 0.0, 1.0],
                [1.0, 1.0, 1.0],
            ],
            &[[0, 1, 2, 3], [4, 1, 3, 2]],
            NonManifoldHandling::Error,
        )
        .expect("valid mesh");
        let mut tx = MeshTransaction::default();
        m.replace_tets(&[0], &[], &mut tx);
        m.remove_vertex(0, &mut tx);
        m.commit(tx);
        m
    }

    #[test]
    fn lock_free_reads_see_removed_elements_as_gone() {
        let m = with_dead_corner();
        assert!(m.try_vertex(0).is_none());
        assert!(m.try_tet(0).is_none());
        assert_eq!(m.try_vertex(4).map(|a| a.pos), Some([1.0, 1.0, 1.0]));
        assert!(m.try_tet(1).is_some());
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "position read")]
    fn position_of_a_removed_vertex_is_caught() {
        let m = with_dead_corner();
        let _ = m.position(0);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "tet read")]
    fn attributes_of_a_removed_tet_are_caught() {
        let m = with_dead_corner();
        let _ = m.tet(0);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "face read")]
    fn attributes_of_a_dead_face_are_caught() {
        let m = with_dead_corner();
        let _ = m.face(FaceKey::new(0, 1, 2));
    }

    #[test]
    fn consolidate_remaps_all_stores() {
        let mut m = AttributedMesh::new(
            &[
                [0.0, 0.0, 0.0],
                [1.0, 0.0, 0.0],
                [0.0, 1.0, 0.0],
                [0.0, 0.0, 1.0],
                [1.0, 1.0, 1.0],
            ],
            &[[0, 1, 2, 3], [4, 1, 3, 2]],
            NonManifoldHandling::Error,
        )
        .expect("valid mesh");
        m.mark_boundary_as_surface();
        m.set_tet_tags(&[3, 7]);

        let mut tx = MeshTransaction::default();
        let faces: Vec<FaceKey> = [[0, 1, 2], [0, 1, 3], [0, 2, 3]]
            .map(FaceKey::from_array)
            .to_vec();
        m.replace_tets(&[0], &[], &mut tx);
        m.remove_vertex(0, &mut tx);
        m.drop_dead_faces(&faces, &mut tx);
        m.commit(tx);

        m.consolidate();
        assert_eq!(m.tet(0).tag, 7);
        assert_eq!(m.position(3), [1.0, 1.0, 1.0]);
        assert_eq!(m.topology().vertex_capacity(), 4);
        assert!(m.is_surface_face(FaceKey::new(0, 2, 3)));
        m.validate_invariants().expect("consistent after consolidation");

        let export = m.export();
        assert_eq!(export.positions.len(), 4);
        assert_eq!(export.tets, vec![[3, 0, 2, 1]]);
        assert_eq!(export.tet_tags, vec![7]);
        assert_eq!(export.surface_faces.len(), 3);
    }
}
