//! Tetrahedral connectivity store.
//!
//! Only vertices and tetrahedra own slots. Each vertex keeps the sorted list
//! of tetrahedra incident to it, and each tetrahedron keeps its four vertex
//! ids plus a `hash` generation counter. Edges and faces are implicit and are
//! recovered by intersecting vertex incidence lists.
//!
//! Records live in [`DashMap`] tables so that workers of a parallel pass can
//! read and rewrite disjoint regions through `&self`. Callers never hold a map
//! guard across another access: every accessor copies data out.
//!
//! # Editing
//! Topology changes go through a [`ConnectivityEdit`]:
//! - [`TetMesh::replace_tets`] removes a set of tetrahedra and inserts new
//!   ones, reusing the removed slots first;
//! - [`TetMesh::add_vertex`] / [`TetMesh::remove_vertex`] change the vertex set;
//! - [`TetMesh::rollback`] restores every touched record bit-for-bit;
//! - [`TetMesh::commit`] hands the slots that stayed removed to the free lists.

use dashmap::DashMap;
use hashbrown::{HashMap, HashSet};
use itertools::Itertools;

use crate::debug_invariants::DebugInvariants;
use crate::mesh_error::MeshOpsError;
use crate::topology::keys::{EdgeKey, FaceKey, SlotKind, sorted_tet};
use crate::topology::local::{LOCAL_EDGES, LOCAL_FACES, local_edge, local_face};
use crate::topology::slots::SlotAllocator;

/// Incidence record of one vertex.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct VertexConnectivity {
    /// Incident tetrahedra, sorted ascending.
    pub conn_tets: Vec<usize>,
    pub removed: bool,
}

/// Incidence record of one tetrahedron.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TetConnectivity {
    /// Vertex ids in positively oriented order.
    pub vids: [usize; 4],
    pub removed: bool,
    /// Bumped every time the slot is rewritten; handles carry a copy.
    pub hash: u64,
}

/// Tetrahedra around an interior edge, in cyclic order.
///
/// `tets[i]` contains the edge and the ring vertices `ring[i]`, `ring[(i + 1) % n]`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EdgeRing {
    pub tets: Vec<usize>,
    pub ring: Vec<usize>,
}

/// Undo record for a local topology change.
#[derive(Debug, Default)]
pub struct ConnectivityEdit {
    tet_records: Vec<(usize, TetConnectivity)>,
    fresh_tets: Vec<(usize, Option<TetConnectivity>)>,
    vertex_records: Vec<(usize, Option<VertexConnectivity>)>,
    fresh_vertices: Vec<usize>,
    freed_tets: Vec<usize>,
    removed_vertices: Vec<usize>,
    new_tets: Vec<usize>,
}

impl ConnectivityEdit {
    /// Tetrahedra created by this edit, in creation order.
    pub fn new_tets(&self) -> &[usize] {
        &self.new_tets
    }

    /// Vertices created by this edit.
    pub fn new_vertices(&self) -> &[usize] {
        &self.fresh_vertices
    }

    pub fn is_empty(&self) -> bool {
        self.tet_records.is_empty() && self.vertex_records.is_empty()
    }
}

/// Old-id to new-id maps produced by [`TetMesh::consolidate`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Consolidation {
    pub vertex_map: Vec<Option<usize>>,
    pub tet_map: Vec<Option<usize>>,
}

/// Point-in-time copy of all records, ordered by slot id.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct ConnectivitySnapshot {
    pub vertices: Vec<(usize, VertexConnectivity)>,
    pub tets: Vec<(usize, TetConnectivity)>,
}

/// Shared tetrahedral connectivity store.
#[derive(Clone, Debug, Default)]
pub struct TetMesh {
    vertices: DashMap<usize, VertexConnectivity>,
    tets: DashMap<usize, TetConnectivity>,
    vertex_slots: SlotAllocator,
    tet_slots: SlotAllocator,
}

impl TetMesh {
    /// Build a mesh from `n_vertices` vertices and a list of tetrahedra.
    ///
    /// Rejects out-of-range ids, tetrahedra with a repeated vertex and
    /// tetrahedra with identical vertex sets.
    pub fn from_tets(n_vertices: usize, tets: &[[usize; 4]]) -> Result<Self, MeshOpsError> {
        let mut seen: HashMap<[usize; 4], usize> = HashMap::with_capacity(tets.len());
        let mut conn = vec![Vec::new(); n_vertices];
        for (t, vids) in tets.iter().enumerate() {
            for &v in vids {
                if v >= n_vertices {
                    return Err(MeshOpsError::VertexOutOfRange {
                        tet: t,
                        vertex: v,
                        n_vertices,
                    });
                }
            }
            if !vids.iter().all_unique() {
                return Err(MeshOpsError::DegenerateTet(t));
            }
            if let Some(&first) = seen.get(&sorted_tet(*vids)) {
                return Err(MeshOpsError::DuplicateTet(first, t));
            }
            seen.insert(sorted_tet(*vids), t);
            for &v in vids {
                conn[v].push(t);
            }
        }

        let vertices = DashMap::with_capacity(n_vertices);
        for (v, conn_tets) in conn.into_iter().enumerate() {
            vertices.insert(
                v,
                VertexConnectivity {
                    conn_tets,
                    removed: false,
                },
            );
        }
        let records = DashMap::with_capacity(tets.len());
        for (t, vids) in tets.iter().enumerate() {
            records.insert(
                t,
                TetConnectivity {
                    vids: *vids,
                    removed: false,
                    hash: 0,
                },
            );
        }
        Ok(Self {
            vertices,
            tets: records,
            vertex_slots: SlotAllocator::with_used(n_vertices),
            tet_slots: SlotAllocator::with_used(tets.len()),
        })
    }

    // -------------------------------------------------------------------------
    // Slot management
    // -------------------------------------------------------------------------

    /// Number of vertex slots ever allocated; every vertex id is below this.
    pub fn vertex_capacity(&self) -> usize {
        self.vertex_slots.capacity()
    }

    /// Number of tetrahedron slots ever allocated; every tet id is below this.
    pub fn tet_capacity(&self) -> usize {
        self.tet_slots.capacity()
    }

    /// Take a fresh slot of the given kind and mark it live.
    ///
    /// A reused tetrahedron slot keeps its stale vertex ids until the caller
    /// writes them, but its `hash` is bumped immediately.
    pub fn allocate(&self, kind: SlotKind) -> usize {
        match kind {
            SlotKind::Vertex => {
                let v = self.vertex_slots.allocate();
                self.vertices.insert(v, VertexConnectivity::default());
                v
            }
            SlotKind::Tetrahedron => {
                let t = self.tet_slots.allocate();
                let mut entry = self.tets.entry(t).or_insert(TetConnectivity {
                    vids: [0; 4],
                    removed: true,
                    hash: 0,
                });
                if entry.removed {
                    entry.hash += 1;
                }
                entry.removed = false;
                t
            }
        }
    }

    /// Mark a slot removed and return it to the free list.
    ///
    /// Releasing an already-released slot is a caller bug; it trips a debug
    /// assertion and is otherwise ignored.
    pub fn release(&self, kind: SlotKind, id: usize) {
        let was_live = match kind {
            SlotKind::Vertex => self
                .vertices
                .get_mut(&id)
                .map(|mut r| !std::mem::replace(&mut r.removed, true)),
            SlotKind::Tetrahedron => self
                .tets
                .get_mut(&id)
                .map(|mut r| !std::mem::replace(&mut r.removed, true)),
        };
        debug_assert_eq!(was_live, Some(true), "{kind:?} slot {id} released twice");
        if was_live == Some(true) {
            match kind {
                SlotKind::Vertex => self.vertex_slots.release(id),
                SlotKind::Tetrahedron => self.tet_slots.release(id),
            }
        }
    }

    /// Live vertex ids, ascending.
    pub fn live_vertex_ids(&self) -> Vec<usize> {
        let mut ids: Vec<usize> = self
            .vertices
            .iter()
            .filter(|r| !r.value().removed)
            .map(|r| *r.key())
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Live tetrahedron ids, ascending.
    pub fn live_tet_ids(&self) -> Vec<usize> {
        let mut ids: Vec<usize> = self
            .tets
            .iter()
            .filter(|r| !r.value().removed)
            .map(|r| *r.key())
            .collect();
        ids.sort_unstable();
        ids
    }

    pub fn n_vertices(&self) -> usize {
        self.vertices.iter().filter(|r| !r.value().removed).count()
    }

    pub fn n_tets(&self) -> usize {
        self.tets.iter().filter(|r| !r.value().removed).count()
    }

    // -------------------------------------------------------------------------
    // Record access
    // -------------------------------------------------------------------------

    /// Copy of a tetrahedron record, live or removed.
    #[inline]
    pub fn tet_record(&self, t: usize) -> Option<TetConnectivity> {
        self.tets.get(&t).map(|r| *r)
    }

    /// Vertex ids of a live tetrahedron.
    #[inline]
    pub fn tet_vertices(&self, t: usize) -> Option<[usize; 4]> {
        self.tets.get(&t).filter(|r| !r.removed).map(|r| r.vids)
    }

    /// Generation counter of a tetrahedron slot.
    #[inline]
    pub fn tet_hash(&self, t: usize) -> Option<u64> {
        self.tets.get(&t).map(|r| r.hash)
    }

    #[inline]
    pub fn is_tet_live(&self, t: usize) -> bool {
        self.tets.get(&t).is_some_and(|r| !r.removed)
    }

    #[inline]
    pub fn is_vertex_live(&self, v: usize) -> bool {
        self.vertices.get(&v).is_some_and(|r| !r.removed)
    }

    /// Tetrahedra incident to `v`, ascending. Empty for dead vertices.
    pub fn vertex_tets(&self, v: usize) -> Vec<usize> {
        self.vertices
            .get(&v)
            .filter(|r| !r.removed)
            .map(|r| r.conn_tets.clone())
            .unwrap_or_default()
    }

    /// Tetrahedra containing both `a` and `b`, ascending.
    pub fn edge_tets(&self, a: usize, b: usize) -> Vec<usize> {
        intersect_sorted(&self.vertex_tets(a), &self.vertex_tets(b))
    }

    /// Tetrahedra containing the triangle `(a, b, c)`, ascending.
    pub fn face_tets(&self, a: usize, b: usize, c: usize) -> Vec<usize> {
        intersect_sorted(&self.edge_tets(a, b), &self.vertex_tets(c))
    }

    /// Whether `a` and `b` are joined by an edge.
    pub fn has_edge(&self, a: usize, b: usize) -> bool {
        !self.edge_tets(a, b).is_empty()
    }

    /// Whether a live tetrahedron with exactly these vertices exists.
    pub fn find_tet(&self, vids: [usize; 4]) -> Option<usize> {
        let target = sorted_tet(vids);
        self.vertex_tets(vids[0])
            .into_iter()
            .find(|&t| self.tet_vertices(t).is_some_and(|v| sorted_tet(v) == target))
    }

    /// Vertices sharing a tetrahedron with `v`, ascending, excluding `v`.
    pub fn one_ring_vertices(&self, v: usize) -> Vec<usize> {
        self.vertex_tets(v)
            .into_iter()
            .filter_map(|t| self.tet_vertices(t))
            .flatten()
            .filter(|&w| w != v)
            .sorted_unstable()
            .dedup()
            .collect()
    }

    /// Edges of the tetrahedra around `v` that contain `v`.
    pub fn one_ring_edges(&self, v: usize) -> Vec<EdgeKey> {
        self.one_ring_vertices(v)
            .into_iter()
            .map(|w| EdgeKey::new(v, w))
            .collect()
    }

    /// Vertices of every tetrahedron incident to any seed, seeds included.
    pub fn closed_star_vertices(&self, seeds: &[usize]) -> Vec<usize> {
        let mut out: Vec<usize> = seeds.to_vec();
        for &s in seeds {
            for t in self.vertex_tets(s) {
                if let Some(vids) = self.tet_vertices(t) {
                    out.extend(vids);
                }
            }
        }
        out.sort_unstable();
        out.dedup();
        out
    }

    /// Tetrahedra incident to any seed, ascending.
    pub fn star_tets(&self, seeds: &[usize]) -> Vec<usize> {
        seeds
            .iter()
            .flat_map(|&s| self.vertex_tets(s))
            .sorted_unstable()
            .dedup()
            .collect()
    }

    // -------------------------------------------------------------------------
    // Boundary classification
    // -------------------------------------------------------------------------

    pub fn is_boundary_face(&self, face: FaceKey) -> bool {
        let [a, b, c] = face.vertices();
        self.face_tets(a, b, c).len() == 1
    }

    /// An edge is on the boundary when one of its faces is.
    pub fn is_boundary_edge(&self, a: usize, b: usize) -> bool {
        self.edge_tets(a, b).into_iter().any(|t| {
            self.tet_vertices(t).is_some_and(|vids| {
                vids.iter()
                    .filter(|&&x| x != a && x != b)
                    .any(|&x| self.is_boundary_face(FaceKey::new(a, b, x)))
            })
        })
    }

    pub fn is_boundary_vertex(&self, v: usize) -> bool {
        self.vertex_tets(v).into_iter().any(|t| {
            self.tet_vertices(t).is_some_and(|vids| {
                LOCAL_FACES.iter().any(|lf| {
                    let f = lf.map(|j| vids[j]);
                    f.contains(&v) && self.is_boundary_face(FaceKey::from_array(f))
                })
            })
        })
    }

    /// Boundary faces incident to `v`.
    pub fn boundary_faces_of_vertex(&self, v: usize) -> Vec<FaceKey> {
        self.vertex_tets(v)
            .into_iter()
            .filter_map(|t| self.tet_vertices(t))
            .flat_map(|vids| LOCAL_FACES.map(|lf| FaceKey::from_array(lf.map(|j| vids[j]))))
            .filter(|f| f.contains(v))
            .sorted_unstable()
            .dedup()
            .filter(|&f| self.is_boundary_face(f))
            .collect()
    }

    /// Tetrahedra around an interior edge in cyclic order.
    ///
    /// Returns `None` for boundary edges and for edges whose incident
    /// tetrahedra do not form a single closed fan.
    pub fn edge_ring(&self, a: usize, b: usize) -> Option<EdgeRing> {
        let around = self.edge_tets(a, b);
        let &first = around.first()?;
        let others = |t: usize| -> Option<[usize; 2]> {
            let vids = self.tet_vertices(t)?;
            let mut it = vids.into_iter().filter(|&x| x != a && x != b);
            Some([it.next()?, it.next()?])
        };

        let [x, y] = others(first)?;
        let mut tets = vec![first];
        let mut ring = vec![x, y];
        let mut current = first;
        for _ in 0..around.len() {
            let pivot = *ring.last()?;
            let next = around
                .iter()
                .copied()
                .find(|&t| t != current && others(t).is_some_and(|o| o.contains(&pivot)))?;
            if next == first {
                break;
            }
            let o = others(next)?;
            let z = if o[0] == pivot { o[1] } else { o[0] };
            tets.push(next);
            ring.push(z);
            current = next;
        }
        if ring.len() != tets.len() + 1 || ring.first() != ring.last() {
            return None;
        }
        ring.pop();
        (tets.len() == around.len()).then_some(EdgeRing { tets, ring })
    }

    // -------------------------------------------------------------------------
    // Canonical ids for implicit simplices
    // -------------------------------------------------------------------------

    /// Canonical edge id: `6 * min incident tet + local edge in that tet`.
    pub fn edge_id(&self, a: usize, b: usize) -> Option<usize> {
        let t = *self.edge_tets(a, b).first()?;
        let vids = self.tet_vertices(t)?;
        Some(t * 6 + local_edge(&vids, a, b)?)
    }

    /// Canonical face id: `4 * min incident tet + local face in that tet`.
    pub fn face_id(&self, face: FaceKey) -> Option<usize> {
        let [a, b, c] = face.vertices();
        let t = *self.face_tets(a, b, c).first()?;
        let vids = self.tet_vertices(t)?;
        Some(t * 4 + local_face(&vids, face.vertices())?)
    }

    /// Every live edge once, ordered by canonical id.
    pub fn edges(&self) -> Vec<EdgeKey> {
        let mut out = Vec::new();
        for t in self.live_tet_ids() {
            let Some(vids) = self.tet_vertices(t) else { continue };
            for [i, j] in LOCAL_EDGES {
                let (a, b) = (vids[i], vids[j]);
                if self.edge_tets(a, b).first() == Some(&t) {
                    out.push(EdgeKey::new(a, b));
                }
            }
        }
        out
    }

    /// Every live face once, ordered by canonical id.
    pub fn faces(&self) -> Vec<FaceKey> {
        let mut out = Vec::new();
        for t in self.live_tet_ids() {
            let Some(vids) = self.tet_vertices(t) else { continue };
            for lf in LOCAL_FACES {
                let [a, b, c] = lf.map(|j| vids[j]);
                if self.face_tets(a, b, c).first() == Some(&t) {
                    out.push(FaceKey::new(a, b, c));
                }
            }
        }
        out
    }

    // -------------------------------------------------------------------------
    // Local editing
    // -------------------------------------------------------------------------

    fn snapshot_vertex(&self, v: usize, edit: &mut ConnectivityEdit) {
        if edit.vertex_records.iter().any(|(w, _)| *w == v) {
            return;
        }
        let prior = self.vertices.get(&v).map(|r| r.clone());
        edit.vertex_records.push((v, prior));
    }

    fn snapshot_tet(&self, t: usize, edit: &mut ConnectivityEdit) {
        if edit.tet_records.iter().any(|(s, _)| *s == t)
            || edit.fresh_tets.iter().any(|(s, _)| *s == t)
        {
            return;
        }
        if let Some(record) = self.tet_record(t) {
            edit.tet_records.push((t, record));
        }
    }

    /// Create a vertex with no incident tetrahedra.
    pub fn add_vertex(&self, edit: &mut ConnectivityEdit) -> usize {
        let v = self.vertex_slots.allocate();
        self.snapshot_vertex(v, edit);
        self.vertices.insert(v, VertexConnectivity::default());
        edit.fresh_vertices.push(v);
        v
    }

    /// Mark a vertex removed. Its incident tetrahedra must already be gone.
    pub fn remove_vertex(&self, v: usize, edit: &mut ConnectivityEdit) {
        self.snapshot_vertex(v, edit);
        if let Some(mut r) = self.vertices.get_mut(&v) {
            debug_assert!(r.conn_tets.is_empty(), "vertex {v} removed while in use");
            r.removed = true;
        }
        edit.removed_vertices.push(v);
    }

    /// Remove `removed` and insert `new_tets`, returning the new ids.
    ///
    /// Removed slots are reused first; extra tetrahedra take fresh slots.
    /// Every rewritten slot gets a new `hash`, so handles into the old
    /// tetrahedra become stale.
    pub fn replace_tets(
        &self,
        removed: &[usize],
        new_tets: &[[usize; 4]],
        edit: &mut ConnectivityEdit,
    ) -> Vec<usize> {
        for &t in removed {
            self.snapshot_tet(t, edit);
            if let Some(vids) = self.tet_vertices(t) {
                for v in vids {
                    self.snapshot_vertex(v, edit);
                    if let Some(mut r) = self.vertices.get_mut(&v) {
                        if let Ok(pos) = r.conn_tets.binary_search(&t) {
                            r.conn_tets.remove(pos);
                        }
                    }
                }
            }
            if let Some(mut r) = self.tets.get_mut(&t) {
                r.removed = true;
            }
        }

        let mut ids = Vec::with_capacity(new_tets.len());
        for (i, vids) in new_tets.iter().enumerate() {
            let t = match removed.get(i) {
                Some(&t) => t,
                None => {
                    let t = self.tet_slots.allocate();
                    edit.fresh_tets.push((t, self.tet_record(t)));
                    t
                }
            };
            let hash = self.tet_hash(t).map_or(0, |h| h + 1);
            self.tets.insert(
                t,
                TetConnectivity {
                    vids: *vids,
                    removed: false,
                    hash,
                },
            );
            for &v in vids {
                self.snapshot_vertex(v, edit);
                if let Some(mut r) = self.vertices.get_mut(&v) {
                    if let Err(pos) = r.conn_tets.binary_search(&t) {
                        r.conn_tets.insert(pos, t);
                    }
                }
            }
            ids.push(t);
        }
        edit.freed_tets
            .extend(removed.iter().skip(new_tets.len()).copied());
        edit.new_tets.extend_from_slice(&ids);
        ids
    }

    /// Undo an edit, restoring every touched record exactly.
    pub fn rollback(&self, edit: ConnectivityEdit) {
        for (t, record) in edit.tet_records {
            self.tets.insert(t, record);
        }
        for (t, prior) in edit.fresh_tets.into_iter().rev() {
            match prior {
                Some(record) => {
                    self.tets.insert(t, record);
                }
                None => {
                    self.tets.remove(&t);
                }
            }
            self.tet_slots.release(t);
        }
        for (v, prior) in edit.vertex_records {
            match prior {
                Some(record) => {
                    self.vertices.insert(v, record);
                }
                None => {
                    self.vertices.remove(&v);
                }
            }
        }
        for v in edit.fresh_vertices {
            self.vertex_slots.release(v);
        }
    }

    /// Finalize an edit: slots that stayed removed become reusable.
    pub fn commit(&self, edit: ConnectivityEdit) {
        for t in edit.freed_tets {
            if !self.is_tet_live(t) {
                self.tet_slots.release(t);
            }
        }
        for v in edit.removed_vertices {
            self.vertex_slots.release(v);
        }
    }

    // -------------------------------------------------------------------------
    // Compaction and inspection
    // -------------------------------------------------------------------------

    /// Compact vertex and tetrahedron slots to `0..n`.
    ///
    /// All handles become invalid. The returned maps are indexed by old id.
    pub fn consolidate(&mut self) -> Consolidation {
        let live_v = self.live_vertex_ids();
        let live_t = self.live_tet_ids();
        let mut vertex_map = vec![None; self.vertex_capacity()];
        for (new, &old) in live_v.iter().enumerate() {
            vertex_map[old] = Some(new);
        }
        let mut tet_map = vec![None; self.tet_capacity()];
        for (new, &old) in live_t.iter().enumerate() {
            tet_map[old] = Some(new);
        }

        let tets = DashMap::with_capacity(live_t.len());
        let mut conn = vec![Vec::new(); live_v.len()];
        for (new_t, &old_t) in live_t.iter().enumerate() {
            let Some(vids) = self.tet_vertices(old_t) else { continue };
            let vids = vids.map(|v| vertex_map[v].unwrap_or(usize::MAX));
            for &v in &vids {
                if let Some(list) = conn.get_mut(v) {
                    list.push(new_t);
                }
            }
            tets.insert(
                new_t,
                TetConnectivity {
                    vids,
                    removed: false,
                    hash: 0,
                },
            );
        }
        let vertices = DashMap::with_capacity(live_v.len());
        for (v, conn_tets) in conn.into_iter().enumerate() {
            vertices.insert(
                v,
                VertexConnectivity {
                    conn_tets,
                    removed: false,
                },
            );
        }
        self.vertices = vertices;
        self.tets = tets;
        self.vertex_slots.reset(live_v.len());
        self.tet_slots.reset(live_t.len());
        Consolidation {
            vertex_map,
            tet_map,
        }
    }

    /// Copy of every record, live or removed, ordered by slot id.
    pub fn snapshot(&self) -> ConnectivitySnapshot {
        let mut vertices: Vec<_> = self
            .vertices
            .iter()
            .map(|r| (*r.key(), r.value().clone()))
            .collect();
        vertices.sort_unstable_by_key(|(v, _)| *v);
        let mut tets: Vec<_> = self.tets.iter().map(|r| (*r.key(), *r.value())).collect();
        tets.sort_unstable_by_key(|(t, _)| *t);
        ConnectivitySnapshot { vertices, tets }
    }
}

impl DebugInvariants for TetMesh {
    fn validate_invariants(&self) -> Result<(), MeshOpsError> {
        let mut seen: HashSet<[usize; 4]> = HashSet::new();
        for t in self.live_tet_ids() {
            let Some(vids) = self.tet_vertices(t) else { continue };
            if !vids.iter().all_unique() {
                return Err(MeshOpsError::DegenerateTet(t));
            }
            if !seen.insert(sorted_tet(vids)) {
                return Err(MeshOpsError::InvariantViolation(format!(
                    "tetrahedron {t} duplicates another live tetrahedron"
                )));
            }
            for v in vids {
                if !self.is_vertex_live(v) {
                    return Err(MeshOpsError::InvariantViolation(format!(
                        "tetrahedron {t} references removed vertex {v}"
                    )));
                }
                if self.vertex_tets(v).binary_search(&t).is_err() {
                    return Err(MeshOpsError::InvariantViolation(format!(
                        "vertex {v} does not list incident tetrahedron {t}"
                    )));
                }
            }
        }
        for v in self.live_vertex_ids() {
            let conn = self.vertex_tets(v);
            if !conn.windows(2).all(|w| w[0] < w[1]) {
                return Err(MeshOpsError::InvariantViolation(format!(
                    "incidence list of vertex {v} is not sorted"
                )));
            }
            for t in conn {
                if !self.tet_vertices(t).is_some_and(|vids| vids.contains(&v)) {
                    return Err(MeshOpsError::InvariantViolation(format!(
                        "vertex {v} lists tetrahedron {t}, which does not contain it"
                    )));
                }
            }
        }
        Ok(())
    }

    fn debug_assert_invariants(&self) {
        crate::debug_invariants!(self.validate_invariants(), "TetMesh");
    }
}

/// Intersection of two ascending id lists.
pub fn intersect_sorted(a: &[usize], b: &[usize]) -> Vec<usize> {
    let (mut i, mut j) = (0, 0);
    let mut out = Vec::new();
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                out.push(a[i]);
                i += 1;
                j += 1;
            }
        }
    }
    out
}
