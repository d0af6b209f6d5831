//! `Tuple`: the simplex navigation handle.
//!
//! A tuple names one *oriented incidence* inside one tetrahedron: a vertex,
//! an edge through that vertex, a face through that edge and the tetrahedron
//! itself. It stores the global vertex id, the local edge and face indices,
//! the global tetrahedron id and the tetrahedron's `hash` at the time the
//! tuple was made. It owns nothing and holds no pointer, so it stays cheap to
//! copy and trivially survives compaction as an index remap.
//!
//! Navigation:
//! - [`TetMesh::switch_vertex`]: other endpoint of the edge;
//! - [`TetMesh::switch_edge`]: other edge of the face through the vertex;
//! - [`TetMesh::switch_face`]: other face of the tetrahedron through the edge;
//! - [`TetMesh::switch_tetrahedron`]: the tetrahedron across the face, or
//!   `None` on the boundary.
//!
//! Each switch is its own inverse.

use std::fmt;

use crate::topology::keys::{EdgeKey, FaceKey, SimplexKind};
use crate::topology::local::{
    EDGE_TO_FACE, FACE_EDGES, LOCAL_EDGES, LOCAL_FACES, VERTEX_TO_EDGE, local_edge, local_face,
    local_vertex,
};
use crate::topology::tet_mesh::TetMesh;

/// Copyable reference to one oriented incidence of a tetrahedron.
#[derive(
    Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
pub struct Tuple {
    vid: usize,
    local_eid: u8,
    local_fid: u8,
    tid: usize,
    hash: u64,
}

impl Tuple {
    /// Global id of the tuple's vertex.
    #[inline]
    pub fn vid(&self) -> usize {
        self.vid
    }

    /// Global id of the tuple's tetrahedron.
    #[inline]
    pub fn tid(&self) -> usize {
        self.tid
    }

    #[inline]
    pub fn local_eid(&self) -> usize {
        self.local_eid as usize
    }

    #[inline]
    pub fn local_fid(&self) -> usize {
        self.local_fid as usize
    }

    /// Generation of the tetrahedron slot this tuple was made from.
    #[inline]
    pub fn hash(&self) -> u64 {
        self.hash
    }
}

impl fmt::Debug for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Tuple(v{} e{} f{} t{} #{})",
            self.vid, self.local_eid, self.local_fid, self.tid, self.hash
        )
    }
}

impl TetMesh {
    // -------------------------------------------------------------------------
    // Construction
    // -------------------------------------------------------------------------

    /// Canonical tuple of a live tetrahedron: local vertex 0, edge 0, face 0.
    pub fn tuple_from_tet(&self, tid: usize) -> Option<Tuple> {
        let record = self.tet_record(tid).filter(|r| !r.removed)?;
        Some(Tuple {
            vid: record.vids[0],
            local_eid: 0,
            local_fid: 0,
            tid,
            hash: record.hash,
        })
    }

    /// Tuple of local edge `local_eid` of `tid`, pointing at its first endpoint.
    pub fn tuple_from_edge(&self, tid: usize, local_eid: usize) -> Option<Tuple> {
        let record = self.tet_record(tid).filter(|r| !r.removed)?;
        let lv = LOCAL_EDGES.get(local_eid)?[0];
        Some(Tuple {
            vid: record.vids[lv],
            local_eid: local_eid as u8,
            local_fid: EDGE_TO_FACE[local_eid] as u8,
            tid,
            hash: record.hash,
        })
    }

    /// Tuple of local face `local_fid` of `tid`.
    pub fn tuple_from_face(&self, tid: usize, local_fid: usize) -> Option<Tuple> {
        let record = self.tet_record(tid).filter(|r| !r.removed)?;
        let local_eid = FACE_EDGES.get(local_fid)?[0];
        Some(Tuple {
            vid: record.vids[LOCAL_EDGES[local_eid][0]],
            local_eid: local_eid as u8,
            local_fid: local_fid as u8,
            tid,
            hash: record.hash,
        })
    }

    /// Tuple of a live vertex, inside its lowest-numbered tetrahedron.
    pub fn tuple_from_vertex(&self, vid: usize) -> Option<Tuple> {
        let tid = *self.vertex_tets(vid).first()?;
        let record = self.tet_record(tid)?;
        let j = local_vertex(&record.vids, vid)?;
        let local_eid = VERTEX_TO_EDGE[j];
        Some(Tuple {
            vid,
            local_eid: local_eid as u8,
            local_fid: EDGE_TO_FACE[local_eid] as u8,
            tid,
            hash: record.hash,
        })
    }

    /// Tuple of the edge `(from, to)` with `vid == from`, if the edge exists.
    pub fn tuple_from_vertices(&self, from: usize, to: usize) -> Option<Tuple> {
        let tid = *self.edge_tets(from, to).first()?;
        let record = self.tet_record(tid)?;
        let local_eid = local_edge(&record.vids, from, to)?;
        Some(Tuple {
            vid: from,
            local_eid: local_eid as u8,
            local_fid: EDGE_TO_FACE[local_eid] as u8,
            tid,
            hash: record.hash,
        })
    }

    /// Tuple of the face `face`, with `vid == face[0]` and the edge `(face[0], face[1])`.
    pub fn tuple_from_face_vertices(&self, face: [usize; 3]) -> Option<Tuple> {
        let tid = *self.face_tets(face[0], face[1], face[2]).first()?;
        let record = self.tet_record(tid)?;
        Some(Tuple {
            vid: face[0],
            local_eid: local_edge(&record.vids, face[0], face[1])? as u8,
            local_fid: local_face(&record.vids, face)? as u8,
            tid,
            hash: record.hash,
        })
    }

    /// Visit one tuple per live simplex of `kind`, in canonical order.
    ///
    /// Isolated vertices (no incident tetrahedron) have no tuple and are skipped.
    pub fn for_each_live<F: FnMut(Tuple)>(&self, kind: SimplexKind, mut f: F) {
        match kind {
            SimplexKind::Vertex => self
                .live_vertex_ids()
                .into_iter()
                .filter_map(|v| self.tuple_from_vertex(v))
                .for_each(f),
            SimplexKind::Edge => self
                .edges()
                .into_iter()
                .filter_map(|e| {
                    let [a, b] = e.vertices();
                    self.tuple_from_vertices(a, b)
                })
                .for_each(f),
            SimplexKind::Face => self
                .faces()
                .into_iter()
                .filter_map(|face| self.tuple_from_face_vertices(face.vertices()))
                .for_each(f),
            SimplexKind::Tetrahedron => {
                for t in self.live_tet_ids() {
                    if let Some(tuple) = self.tuple_from_tet(t) {
                        f(tuple);
                    }
                }
            }
        }
    }

    // -------------------------------------------------------------------------
    // Validity and derived ids
    // -------------------------------------------------------------------------

    /// A tuple is valid while its tetrahedron is live, has not been rewritten
    /// since the tuple was made, and still contains the tuple's vertex.
    pub fn is_valid(&self, t: &Tuple) -> bool {
        self.tet_record(t.tid).is_some_and(|r| {
            !r.removed && r.hash == t.hash && r.vids.contains(&t.vid) && self.is_vertex_live(t.vid)
        })
    }

    /// Vertex ids of the tuple's tetrahedron.
    pub fn tuple_tet_vertices(&self, t: &Tuple) -> Option<[usize; 4]> {
        self.tet_record(t.tid).map(|r| r.vids)
    }

    /// The tuple's edge as a global key.
    pub fn tuple_edge(&self, t: &Tuple) -> Option<EdgeKey> {
        let vids = self.tuple_tet_vertices(t)?;
        let [a, b] = LOCAL_EDGES[t.local_eid()];
        Some(EdgeKey::new(vids[a], vids[b]))
    }

    /// The tuple's face as a global key.
    pub fn tuple_face(&self, t: &Tuple) -> Option<FaceKey> {
        let vids = self.tuple_tet_vertices(t)?;
        let [a, b, c] = LOCAL_FACES[t.local_fid()];
        Some(FaceKey::new(vids[a], vids[b], vids[c]))
    }

    /// Both endpoints of the tuple's edge, the tuple's vertex first.
    pub fn tuple_edge_vertices(&self, t: &Tuple) -> Option<[usize; 2]> {
        let other = self.switch_vertex(t)?.vid;
        Some([t.vid, other])
    }

    /// Canonical id of the tuple's edge.
    pub fn tuple_eid(&self, t: &Tuple) -> Option<usize> {
        let [a, b] = self.tuple_edge(t)?.vertices();
        self.edge_id(a, b)
    }

    /// Canonical id of the tuple's face.
    pub fn tuple_fid(&self, t: &Tuple) -> Option<usize> {
        self.face_id(self.tuple_face(t)?)
    }

    // -------------------------------------------------------------------------
    // Navigation
    // -------------------------------------------------------------------------

    /// Move to the other endpoint of the tuple's edge.
    pub fn switch_vertex(&self, t: &Tuple) -> Option<Tuple> {
        let vids = self.tuple_tet_vertices(t)?;
        let [a, b] = LOCAL_EDGES[t.local_eid()];
        let vid = if vids[a] == t.vid { vids[b] } else { vids[a] };
        Some(Tuple { vid, ..*t })
    }

    /// Move to the other edge of the tuple's face that contains its vertex.
    pub fn switch_edge(&self, t: &Tuple) -> Option<Tuple> {
        let vids = self.tuple_tet_vertices(t)?;
        let local_eid = FACE_EDGES[t.local_fid()]
            .into_iter()
            .filter(|&e| e != t.local_eid())
            .find(|&e| LOCAL_EDGES[e].iter().any(|&lv| vids[lv] == t.vid))?;
        Some(Tuple {
            local_eid: local_eid as u8,
            ..*t
        })
    }

    /// Move to the other face of the tetrahedron that contains the tuple's edge.
    pub fn switch_face(&self, t: &Tuple) -> Option<Tuple> {
        let local_fid = (0..4)
            .filter(|&f| f != t.local_fid())
            .find(|&f| FACE_EDGES[f].contains(&t.local_eid()))?;
        Some(Tuple {
            local_fid: local_fid as u8,
            ..*t
        })
    }

    /// Move to the tetrahedron across the tuple's face.
    ///
    /// Returns `None` when the face is on the boundary. The vertex, edge and
    /// face stay the same simplices; only their local indices change.
    pub fn switch_tetrahedron(&self, t: &Tuple) -> Option<Tuple> {
        let vids = self.tuple_tet_vertices(t)?;
        let face = LOCAL_FACES[t.local_fid()].map(|j| vids[j]);
        let [a, b] = LOCAL_EDGES[t.local_eid()].map(|j| vids[j]);
        let tid = self
            .face_tets(face[0], face[1], face[2])
            .into_iter()
            .find(|&other| other != t.tid)?;
        let record = self.tet_record(tid)?;
        Some(Tuple {
            vid: t.vid,
            local_eid: local_edge(&record.vids, a, b)? as u8,
            local_fid: local_face(&record.vids, face)? as u8,
            tid,
            hash: record.hash,
        })
    }

    /// All tuples of tetrahedra incident to the tuple's edge, one per tetrahedron.
    pub fn edge_incident_tuples(&self, t: &Tuple) -> Vec<Tuple> {
        let Some([a, b]) = self.tuple_edge_vertices(t) else {
            return Vec::new();
        };
        self.edge_tets(a, b)
            .into_iter()
            .filter_map(|tid| {
                let record = self.tet_record(tid)?;
                let local_eid = local_edge(&record.vids, a, b)?;
                Some(Tuple {
                    vid: a,
                    local_eid: local_eid as u8,
                    local_fid: EDGE_TO_FACE[local_eid] as u8,
                    tid,
                    hash: record.hash,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod layout_tests {
    use super::*;
    use static_assertions::assert_impl_all;

    assert_impl_all!(Tuple: Copy, Send, Sync, Eq, std::hash::Hash);
}
