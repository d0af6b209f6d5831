mod util;

use std::sync::Arc;

use mesh_localops::adapt::config::RemeshConfig;
use mesh_localops::geometry::oracles::Oracles;
use mesh_localops::invariants::InvariantContext;
use mesh_localops::invariants::builtin::Reject;
use mesh_localops::ops::{Operation, OperationCache, OperationKind, Outcome};
use mesh_localops::topology::SimplexKind;
use proptest::prelude::*;

use util::{cube, jittered_grid};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    /// Forcing a failure after mutation leaves no trace in any store.
    #[test]
    fn forced_failure_restores_the_mesh(
        seed in 0u64..8,
        kind in prop::sample::select(OperationKind::ALL.to_vec()),
        tet in 0usize..48,
        local in 0usize..6,
    ) {
        let mesh = jittered_grid(2, 0.08, seed);
        let (oracles, config) = (Oracles::default(), RemeshConfig::default());
        let ctx = InvariantContext::new(&mesh, &oracles, &config);
        let topo = mesh.topology();
        let tid = topo.live_tet_ids()[tet % topo.n_tets()];
        let tuple = match kind.operand() {
            SimplexKind::Face => topo.tuple_from_face(tid, local % 4),
            _ => topo.tuple_from_edge(tid, local),
        }
        .unwrap();

        let before = mesh.snapshot();
        let op = Operation::new(kind).with_extra(Arc::new(Reject));
        let outcome = op.attempt(&ctx, tuple, OperationCache::new(kind)).unwrap();
        prop_assert!(!outcome.is_committed());
        prop_assert_eq!(mesh.snapshot(), before);
        prop_assert!(topo.is_valid(&tuple));
    }
}

#[test]
fn committed_split_is_not_undone_by_a_later_rollback() {
    let mesh = cube();
    let (oracles, config) = (Oracles::default(), RemeshConfig::default());
    let ctx = InvariantContext::new(&mesh, &oracles, &config);
    let topo = mesh.topology();

    let diagonal = topo.tuple_from_vertices(0, 6).unwrap();
    let split = Operation::new(OperationKind::Split);
    let out = split
        .attempt(&ctx, diagonal, OperationCache::new(OperationKind::Split))
        .unwrap();
    let Outcome::Committed(report) = out else {
        panic!("split rejected: {out:?}");
    };
    assert_eq!(topo.n_tets(), 12);
    let mid = report.new_vertex.unwrap();
    assert_eq!(mesh.position(mid), [0.5, 0.5, 0.5]);

    let after_split = mesh.snapshot();
    let edge = topo.tuple_from_vertices(mid, 1).unwrap();
    let rejected = Operation::new(OperationKind::Split).with_extra(Arc::new(Reject));
    let out = rejected
        .attempt(&ctx, edge, OperationCache::new(OperationKind::Split))
        .unwrap();
    assert!(!out.is_committed());
    assert_eq!(mesh.snapshot(), after_split);
}
