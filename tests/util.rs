#![allow(dead_code)]
use mesh_localops::data::mesh::AttributedMesh;
use mesh_localops::topology::validation::NonManifoldHandling;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// Corners of the unit cube, bottom face counter-clockwise then top face.
pub const CUBE: [[f64; 3]; 8] = [
    [0.0, 0.0, 0.0],
    [1.0, 0.0, 0.0],
    [1.0, 1.0, 0.0],
    [0.0, 1.0, 0.0],
    [0.0, 0.0, 1.0],
    [1.0, 0.0, 1.0],
    [1.0, 1.0, 1.0],
    [0.0, 1.0, 1.0],
];

/// Six positively oriented tets around the diagonal 0-6.
pub const KUHN: [[usize; 4]; 6] = [
    [0, 1, 2, 6],
    [0, 2, 3, 6],
    [0, 3, 7, 6],
    [0, 7, 4, 6],
    [0, 4, 5, 6],
    [0, 5, 1, 6],
];

fn tagged(mesh: AttributedMesh) -> AttributedMesh {
    mesh.mark_boundary_as_surface();
    mesh.mark_bbox_faces();
    mesh
}

/// Unit cube, boundary marked as surface and bbox.
pub fn cube() -> AttributedMesh {
    tagged(AttributedMesh::new(&CUBE, &KUHN, NonManifoldHandling::Error).unwrap())
}

pub fn single_tet() -> AttributedMesh {
    tagged(
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
        .unwrap(),
    )
}

/// `n^3` Kuhn-subdivided cubes of size `1/n`, interior vertices moved by up
/// to `jitter / n` per axis. The triangulation stays positively oriented for
/// `jitter <= 0.1`.
pub fn jittered_grid(n: usize, jitter: f64, seed: u64) -> AttributedMesh {
    let mut rng = SmallRng::seed_from_u64(seed);
    let h = 1.0 / n as f64;
    let id = |i: usize, j: usize, k: usize| i + (n + 1) * (j + (n + 1) * k);
    let mut positions = Vec::with_capacity((n + 1).pow(3));
    for k in 0..=n {
        for j in 0..=n {
            for i in 0..=n {
                let interior = [i, j, k].iter().all(|&c| c > 0 && c < n);
                let mut p = [i as f64 * h, j as f64 * h, k as f64 * h];
                if interior && jitter > 0.0 {
                    for c in p.iter_mut() {
                        *c += rng.gen_range(-jitter..jitter) * h;
                    }
                }
                positions.push(p);
            }
        }
    }
    let mut tets = Vec::with_capacity(6 * n.pow(3));
    for k in 0..n {
        for j in 0..n {
            for i in 0..n {
                let corner = [
                    id(i, j, k),
                    id(i + 1, j, k),
                    id(i + 1, j + 1, k),
                    id(i, j + 1, k),
                    id(i, j, k + 1),
                    id(i + 1, j, k + 1),
                    id(i + 1, j + 1, k + 1),
                    id(i, j + 1, k + 1),
                ];
                for t in KUHN {
                    tets.push(t.map(|c| corner[c]));
                }
            }
        }
    }
    tagged(AttributedMesh::new(&positions, &tets, NonManifoldHandling::Error).unwrap())
}

/// Largest tet energy of the mesh under the default oracles.
pub fn max_energy(mesh: &AttributedMesh) -> f64 {
    let oracles = mesh_localops::geometry::oracles::Oracles::default();
    let topo = mesh.topology();
    topo.live_tet_ids()
        .into_iter()
        .filter_map(|t| topo.tet_vertices(t))
        .map(|vids| oracles.energy_of(mesh, vids))
        .fold(0.0, f64::max)
}

/// Whether any live tet is inverted under the default oracles.
pub fn any_inverted(mesh: &AttributedMesh) -> bool {
    let oracles = mesh_localops::geometry::oracles::Oracles::default();
    let topo = mesh.topology();
    topo.live_tet_ids()
        .into_iter()
        .filter_map(|t| topo.tet_vertices(t))
        .any(|vids| oracles.is_inverted(mesh, vids))
}
