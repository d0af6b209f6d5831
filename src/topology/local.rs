//! Local index tables of the reference tetrahedron.
//!
//! A tetrahedron stores its four vertex ids in a fixed order `[v0, v1, v2, v3]`
//! with positive orientation. Edges and faces are not stored; they are named by
//! their local index into the tables below.
//!
//! ```text
//! edges: 0:(0,1) 1:(1,2) 2:(0,2) 3:(0,3) 4:(1,3) 5:(2,3)
//! faces: 0:(0,1,2) 1:(0,2,3) 2:(0,1,3) 3:(1,2,3)
//! ```

/// Local vertex pairs of the six edges.
pub const LOCAL_EDGES: [[usize; 2]; 6] = [[0, 1], [1, 2], [0, 2], [0, 3], [1, 3], [2, 3]];

/// Local vertex triples of the four faces.
pub const LOCAL_FACES: [[usize; 3]; 4] = [[0, 1, 2], [0, 2, 3], [0, 1, 3], [1, 2, 3]];

/// Local edges bounding each face.
pub const FACE_EDGES: [[usize; 3]; 4] = [[0, 1, 2], [2, 5, 3], [3, 4, 0], [5, 1, 4]];

/// One edge incident to each local vertex.
pub const VERTEX_TO_EDGE: [usize; 4] = [0, 0, 1, 3];

/// The face opposite each local vertex.
pub const VERTEX_TO_OPPOSITE_FACE: [usize; 4] = [3, 1, 2, 0];

/// One face incident to each local edge.
pub const EDGE_TO_FACE: [usize; 6] = [0, 0, 0, 1, 2, 1];

/// The edge sharing no vertex with each local edge.
pub const OPPOSITE_EDGE: [usize; 6] = [5, 3, 4, 1, 2, 0];

/// Local index of `vid` inside `vids`.
#[inline]
pub fn local_vertex(vids: &[usize; 4], vid: usize) -> Option<usize> {
    vids.iter().position(|&v| v == vid)
}

/// Local edge index joining the global vertices `a` and `b`.
pub fn local_edge(vids: &[usize; 4], a: usize, b: usize) -> Option<usize> {
    let la = local_vertex(vids, a)?;
    let lb = local_vertex(vids, b)?;
    LOCAL_EDGES
        .iter()
        .position(|e| (e[0] == la && e[1] == lb) || (e[0] == lb && e[1] == la))
}

/// Local face index spanned by three global vertices, in any order.
pub fn local_face(vids: &[usize; 4], face: [usize; 3]) -> Option<usize> {
    let mut opposite = None;
    for (j, v) in vids.iter().enumerate() {
        if !face.contains(v) {
            if opposite.is_some() {
                return None;
            }
            opposite = Some(j);
        }
    }
    opposite.map(|j| VERTEX_TO_OPPOSITE_FACE[j])
}

/// Global vertex ids of a local edge.
#[inline]
pub fn edge_vertices(vids: &[usize; 4], local_eid: usize) -> [usize; 2] {
    let [a, b] = LOCAL_EDGES[local_eid];
    [vids[a], vids[b]]
}

/// Global vertex ids of a local face.
#[inline]
pub fn face_vertices(vids: &[usize; 4], local_fid: usize) -> [usize; 3] {
    let [a, b, c] = LOCAL_FACES[local_fid];
    [vids[a], vids[b], vids[c]]
}
