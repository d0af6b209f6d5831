mod util;

use mesh_localops::adapt::config::RemeshConfig;
use mesh_localops::data::mesh::AttributedMesh;
use mesh_localops::geometry::oracles::Oracles;
use mesh_localops::invariants::InvariantContext;
use mesh_localops::ops::{Operation, OperationCache, OperationKind, Outcome};
use mesh_localops::topology::validation::NonManifoldHandling;

use util::{CUBE, KUHN};

/// Unit cube with an extra vertex near corner 0, coned into every Kuhn tet.
fn cube_with_inner_vertex() -> AttributedMesh {
    let mut positions = CUBE.to_vec();
    positions.push([0.1, 0.1, 0.1]);
    let mut tets = Vec::new();
    for [a, b, c, d] in KUHN {
        tets.push([a, b, c, 8]);
        tets.push([8, b, c, d]);
    }
    let mesh = AttributedMesh::new(&positions, &tets, NonManifoldHandling::Error).unwrap();
    mesh.mark_boundary_as_surface();
    mesh.mark_bbox_faces();
    mesh
}

fn collapse(mesh: &AttributedMesh, config: &RemeshConfig, from: usize, to: usize) -> Outcome {
    let oracles = Oracles::default();
    let ctx = InvariantContext::new(mesh, &oracles, config);
    let tuple = mesh.topology().tuple_from_vertices(from, to).unwrap();
    Operation::new(OperationKind::Collapse)
        .attempt(&ctx, tuple, OperationCache::new(OperationKind::Collapse))
        .unwrap()
}

#[test]
fn collapse_keeping_the_surface_is_accepted() {
    let mesh = cube_with_inner_vertex();
    let out = collapse(&mesh, &RemeshConfig::default(), 8, 0);
    assert!(out.is_committed(), "{out:?}");
    assert!(!mesh.topology().is_vertex_live(8));
    assert_eq!(mesh.topology().n_tets(), 6);
}

#[test]
fn collapse_merging_a_tracked_sheet_into_the_boundary_is_rejected() {
    let mesh = cube_with_inner_vertex();
    // An interior sheet hanging off boundary edge (1, 2). Collapsing 8 onto 0
    // would fold it onto the boundary face (0, 1, 2), dropping the number of
    // tracked faces around that edge from three to two.
    mesh.mark_surface_faces(&[[1, 2, 8]]);
    let before = mesh.snapshot();
    let out = collapse(&mesh, &RemeshConfig::default(), 8, 0);
    assert!(!out.is_committed(), "{out:?}");
    assert_eq!(mesh.snapshot(), before);
}

#[test]
fn link_checks_can_be_switched_off() {
    let mesh = cube_with_inner_vertex();
    mesh.mark_surface_faces(&[[1, 2, 8]]);
    let config = RemeshConfig {
        preserve_topology: false,
        ..RemeshConfig::default()
    };
    let out = collapse(&mesh, &config, 8, 0);
    assert!(out.is_committed(), "{out:?}");
}
