mod util;

use mesh_localops::topology::Tuple;
use proptest::prelude::*;

use util::jittered_grid;

fn handle(mesh: &mesh_localops::topology::TetMesh, tet: usize, eid: usize, flips: u8) -> Tuple {
    let tids = mesh.live_tet_ids();
    let tid = tids[tet % tids.len()];
    let mut t = mesh.tuple_from_edge(tid, eid).unwrap();
    if flips & 1 != 0 {
        t = mesh.switch_vertex(&t).unwrap();
    }
    if flips & 2 != 0 {
        t = mesh.switch_face(&t).unwrap();
    }
    t
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn switches_round_trip(seed in 0u64..16, tet in 0usize..48, eid in 0usize..6, flips in 0u8..4) {
        let mesh = jittered_grid(2, 0.08, seed);
        let topo = mesh.topology();
        let t = handle(topo, tet, eid, flips);
        prop_assert!(topo.is_valid(&t));

        let sv = topo.switch_vertex(&t).unwrap();
        prop_assert_eq!(topo.switch_vertex(&sv), Some(t));
        let se = topo.switch_edge(&t).unwrap();
        prop_assert_eq!(topo.switch_edge(&se), Some(t));
        let sf = topo.switch_face(&t).unwrap();
        prop_assert_eq!(topo.switch_face(&sf), Some(t));
        match topo.switch_tetrahedron(&t) {
            Some(st) => {
                prop_assert_ne!(st.tid(), t.tid());
                prop_assert_eq!(topo.tuple_face(&st), topo.tuple_face(&t));
                prop_assert_eq!(topo.switch_tetrahedron(&st), Some(t));
            }
            None => prop_assert!(topo.is_boundary_face(topo.tuple_face(&t).unwrap())),
        }
    }

    #[test]
    fn edge_handles_are_rebuilt_from_vertex_ids(seed in 0u64..16, tet in 0usize..48, eid in 0usize..6) {
        let mesh = jittered_grid(2, 0.08, seed);
        let topo = mesh.topology();
        let t = handle(topo, tet, eid, 0);
        let [a, b] = topo.tuple_edge_vertices(&t).unwrap();
        prop_assert_eq!(a, t.vid());
        let rebuilt = topo.tuple_from_vertices(a, b).unwrap();
        prop_assert_eq!(rebuilt.vid(), a);
        prop_assert_eq!(topo.tuple_edge(&rebuilt), topo.tuple_edge(&t));
        prop_assert_eq!(topo.tuple_eid(&rebuilt), topo.tuple_eid(&t));
        prop_assert_eq!(topo.edge_incident_tuples(&t).len(), topo.edge_tets(a, b).len());
    }
}

#[test]
fn grid_counts() {
    let mesh = jittered_grid(2, 0.0, 0);
    let topo = mesh.topology();
    assert_eq!(topo.n_vertices(), 27);
    assert_eq!(topo.n_tets(), 48);
    // Euler characteristic of a ball: V - E + F - T = 1.
    let (v, e, f, t) = (27i64, topo.edges().len() as i64, topo.faces().len() as i64, 48i64);
    assert_eq!(v - e + f - t, 1);
    assert!(!util::any_inverted(&mesh));
}
