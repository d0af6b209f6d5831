//! Links of vertices and edges, and the counts used for topology preservation.
//!
//! Two related checks live here:
//! - the combinatorial **link condition** for an edge collapse,
//!   `Lk(a) ∩ Lk(b) = Lk(ab)`, evaluated on vertices, edges and faces with a
//!   virtual vertex ([`VIRTUAL_VERTEX`]) coned over the boundary;
//! - **link counts** restricted to a tracked surface: the number of connected
//!   components of a vertex's surface link, and the number of surface faces
//!   through an edge. A local edit preserves the surface topology when these
//!   counts survive unchanged.

use hashbrown::{HashMap, HashSet};
use std::collections::BTreeMap;

use crate::topology::keys::{EdgeKey, FaceKey};
use crate::topology::local::LOCAL_FACES;
use crate::topology::tet_mesh::TetMesh;

/// Stand-in vertex joined to every boundary face.
pub const VIRTUAL_VERTEX: usize = usize::MAX;

/// Vertices, edges and faces of a link, with sorted tuples.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Link {
    pub vertices: HashSet<usize>,
    pub edges: HashSet<[usize; 2]>,
    pub faces: HashSet<[usize; 3]>,
}

impl Link {
    fn add_edge(&mut self, a: usize, b: usize) {
        self.vertices.insert(a);
        self.vertices.insert(b);
        self.edges.insert(if a < b { [a, b] } else { [b, a] });
    }

    fn add_face(&mut self, a: usize, b: usize, c: usize) {
        let mut f = [a, b, c];
        f.sort_unstable();
        self.add_edge(f[0], f[1]);
        self.add_edge(f[1], f[2]);
        self.add_edge(f[0], f[2]);
        self.faces.insert(f);
    }
}

/// Link of a vertex, coned to [`VIRTUAL_VERTEX`] along the boundary.
pub fn vertex_link(mesh: &TetMesh, v: usize) -> Link {
    let mut link = Link::default();
    for t in mesh.vertex_tets(v) {
        let Some(vids) = mesh.tet_vertices(t) else { continue };
        let mut opposite = vids.into_iter().filter(|&x| x != v);
        if let (Some(a), Some(b), Some(c)) = (opposite.next(), opposite.next(), opposite.next()) {
            link.add_face(a, b, c);
        }
    }
    for face in mesh.boundary_faces_of_vertex(v) {
        let mut others = face.vertices().into_iter().filter(|&x| x != v);
        if let (Some(a), Some(b)) = (others.next(), others.next()) {
            link.add_face(a, b, VIRTUAL_VERTEX);
        }
    }
    link
}

/// Link of an edge, coned to [`VIRTUAL_VERTEX`] along the boundary.
pub fn edge_link(mesh: &TetMesh, a: usize, b: usize) -> Link {
    let mut link = Link::default();
    for t in mesh.edge_tets(a, b) {
        let Some(vids) = mesh.tet_vertices(t) else { continue };
        let mut opposite = vids.into_iter().filter(|&x| x != a && x != b);
        if let (Some(x), Some(y)) = (opposite.next(), opposite.next()) {
            link.add_edge(x, y);
            for z in [x, y] {
                if mesh.is_boundary_face(FaceKey::new(a, b, z)) {
                    link.add_edge(z, VIRTUAL_VERTEX);
                }
            }
        }
    }
    link
}

/// Whether collapsing the edge `(a, b)` keeps the complex a manifold.
pub fn link_condition(mesh: &TetMesh, a: usize, b: usize) -> bool {
    let la = vertex_link(mesh, a);
    let lb = vertex_link(mesh, b);
    let lab = edge_link(mesh, a, b);

    let shared_vertices: HashSet<usize> = la.vertices.intersection(&lb.vertices).copied().collect();
    if shared_vertices != lab.vertices {
        return false;
    }
    let shared_edges: HashSet<[usize; 2]> = la.edges.intersection(&lb.edges).copied().collect();
    if shared_edges != lab.edges {
        return false;
    }
    la.faces.is_disjoint(&lb.faces)
}

// -----------------------------------------------------------------------------
// Link counts on a tracked surface
// -----------------------------------------------------------------------------

/// Tracked faces of the tetrahedra incident to any seed.
pub fn tracked_faces_around<F>(mesh: &TetMesh, seeds: &[usize], is_tracked: &F) -> Vec<FaceKey>
where
    F: Fn(FaceKey) -> bool + ?Sized,
{
    let mut faces: Vec<FaceKey> = mesh
        .star_tets(seeds)
        .into_iter()
        .filter_map(|t| mesh.tet_vertices(t))
        .flat_map(|vids| LOCAL_FACES.map(|lf| FaceKey::from_array(lf.map(|j| vids[j]))))
        .collect();
    faces.sort_unstable();
    faces.dedup();
    faces.retain(|&f| is_tracked(f));
    faces
}

/// Number of connected components of the tracked link of `v`.
///
/// Zero when no tracked face touches `v`, one on a manifold surface patch,
/// more at a pinch point.
pub fn count_vertex_links<F>(mesh: &TetMesh, v: usize, is_tracked: &F) -> usize
where
    F: Fn(FaceKey) -> bool + ?Sized,
{
    let mut components = Components::default();
    for face in tracked_faces_around(mesh, &[v], is_tracked) {
        if !face.contains(v) {
            continue;
        }
        let mut others = face.vertices().into_iter().filter(|&x| x != v);
        if let (Some(x), Some(y)) = (others.next(), others.next()) {
            components.union(x, y);
        }
    }
    components.count()
}

/// Number of tracked faces containing the edge `(a, b)`.
pub fn count_edge_links<F>(mesh: &TetMesh, a: usize, b: usize, is_tracked: &F) -> usize
where
    F: Fn(FaceKey) -> bool + ?Sized,
{
    let mut faces: Vec<FaceKey> = mesh
        .edge_tets(a, b)
        .into_iter()
        .filter_map(|t| mesh.tet_vertices(t))
        .flat_map(|vids| vids.into_iter().filter(|&x| x != a && x != b).collect::<Vec<_>>())
        .map(|x| FaceKey::new(a, b, x))
        .collect();
    faces.sort_unstable();
    faces.dedup();
    faces.into_iter().filter(|&f| is_tracked(f)).count()
}

/// Link counts of every vertex and edge of the tracked faces near some seeds.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LinkCounts {
    pub vertices: BTreeMap<usize, usize>,
    pub edges: BTreeMap<EdgeKey, usize>,
}

impl LinkCounts {
    /// Record counts for the vertices and edges of tracked faces in the star of `seeds`.
    pub fn around<F>(mesh: &TetMesh, seeds: &[usize], is_tracked: &F) -> Self
    where
        F: Fn(FaceKey) -> bool + ?Sized,
    {
        let mut counts = Self::default();
        for face in tracked_faces_around(mesh, seeds, is_tracked) {
            for v in face.vertices() {
                counts
                    .vertices
                    .entry(v)
                    .or_insert_with(|| count_vertex_links(mesh, v, is_tracked));
            }
            for e in face.edges() {
                let [a, b] = e.vertices();
                counts
                    .edges
                    .entry(e)
                    .or_insert_with(|| count_edge_links(mesh, a, b, is_tracked));
            }
        }
        counts
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() && self.edges.is_empty()
    }

    /// Compare recorded counts against the live mesh.
    ///
    /// `rename` maps a pre-edit vertex id to the id that carries its identity
    /// afterwards. Edges that degenerate under the renaming and edges in
    /// `vanished` are skipped. Returns the first mismatch, if any.
    pub fn first_mismatch<F, R>(
        &self,
        mesh: &TetMesh,
        is_tracked: &F,
        rename: R,
        vanished: &[EdgeKey],
    ) -> Option<String>
    where
        F: Fn(FaceKey) -> bool + ?Sized,
        R: Fn(usize) -> usize,
    {
        for (&v, &before) in &self.vertices {
            let w = rename(v);
            let after = count_vertex_links(mesh, w, is_tracked);
            if after != before {
                return Some(format!("vertex {v} link count {before} -> {after} at {w}"));
            }
        }
        for (&e, &before) in &self.edges {
            if vanished.contains(&e) {
                continue;
            }
            let [a, b] = e.vertices();
            let (ra, rb) = (rename(a), rename(b));
            if ra == rb {
                continue;
            }
            let after = count_edge_links(mesh, ra, rb, is_tracked);
            if after != before {
                return Some(format!("{e:?} link count {before} -> {after}"));
            }
        }
        None
    }
}

/// Connected components over sparse vertex ids, with path compression.
#[derive(Debug, Default)]
struct Components {
    parent: HashMap<usize, usize>,
    rank: HashMap<usize, u32>,
}

impl Components {
    fn find(&mut self, v: usize) -> usize {
        let parent = *self.parent.entry(v).or_insert(v);
        if parent == v {
            return v;
        }
        let root = self.find(parent);
        self.parent.insert(v, root);
        root
    }

    fn union(&mut self, a: usize, b: usize) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra == rb {
            return;
        }
        let rank_a = self.rank.get(&ra).copied().unwrap_or(0);
        let rank_b = self.rank.get(&rb).copied().unwrap_or(0);
        if rank_a < rank_b {
            self.parent.insert(ra, rb);
        } else {
            self.parent.insert(rb, ra);
            if rank_a == rank_b {
                self.rank.insert(ra, rank_a + 1);
            }
        }
    }

    fn count(&mut self) -> usize {
        let keys: Vec<usize> = self.parent.keys().copied().collect();
        keys.into_iter().filter(|&v| self.find(v) == v).count()
    }
}
