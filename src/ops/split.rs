//! Edge split at the midpoint.

use crate::data::attributes::{TetAttributes, VertexAttributes};
use crate::invariants::InvariantContext;
use crate::ops::cache::OperationCache;
use crate::ops::{
    Abort, faces_of, max_energy_of, parent_attrs, record_old_tets, replace_vertex,
    write_new_tets,
};
use crate::topology::{EdgeKey, FaceKey, Tuple};

pub(crate) fn prepare(
    ctx: &InvariantContext<'_>,
    tuple: Tuple,
    cache: &mut OperationCache,
) -> Result<(), Abort> {
    let topo = ctx.mesh.topology();
    let [a, b] = topo
        .tuple_edge_vertices(&tuple)
        .ok_or(Abort::Reject("stale edge"))?;
    cache.edge = Some((a, b));
    cache.seeds = vec![a, b];
    let around = topo.edge_tets(a, b);
    if around.is_empty() {
        return Err(Abort::Reject("edge has no tetrahedra"));
    }
    cache.old_max_energy = max_energy_of(ctx, &around);
    record_old_tets(ctx, cache, around)?;
    cache.vanished_edges = vec![EdgeKey::new(a, b)];
    Ok(())
}

pub(crate) fn mutate(ctx: &InvariantContext<'_>, cache: &mut OperationCache) -> Result<(), Abort> {
    let mesh = ctx.mesh;
    let (a, b) = cache.edge.ok_or(Abort::Reject("missing operand"))?;

    let mut attrs = VertexAttributes::midpoint(&mesh.vertex(a), &mesh.vertex(b));
    attrs.is_on_surface = mesh.is_surface_edge(a, b);
    attrs.is_on_open_boundary = mesh.is_open_boundary_edge(a, b);
    let split_faces: Vec<_> = mesh
        .faces_around_edge(a, b)
        .into_iter()
        .map(|f| (f, mesh.face_attrs().get_opt(&f)))
        .collect();

    let m = mesh.add_vertex(attrs, &mut cache.tx);
    cache.new_vertex = Some(m);

    let mut new: Vec<([usize; 4], TetAttributes)> = Vec::with_capacity(2 * cache.old_tets.len());
    for (&t, &vids) in cache.old_tets.iter().zip(&cache.old_tet_vertices) {
        let child = TetAttributes::child_of(&parent_attrs(ctx, t)?);
        new.push((replace_vertex(vids, a, m), child.clone()));
        new.push((replace_vertex(vids, b, m), child));
    }
    write_new_tets(ctx, cache, new);

    for (face, attrs) in split_faces {
        mesh.remove_face(face, &mut cache.tx);
        let Some(attrs) = attrs else { continue };
        let Some(&x) = face.vertices().iter().find(|&&v| v != a && v != b) else {
            continue;
        };
        mesh.set_face(FaceKey::new(a, m, x), attrs.clone(), &mut cache.tx);
        mesh.set_face(FaceKey::new(m, b, x), attrs, &mut cache.tx);
    }
    let dead = faces_of(&cache.old_tet_vertices);
    mesh.drop_dead_faces(&dead, &mut cache.tx);
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::adapt::config::RemeshConfig;
    use crate::data::mesh::AttributedMesh;
    use crate::debug_invariants::DebugInvariants;
    use crate::geometry::oracles::Oracles;
    use crate::invariants::InvariantContext;
    use crate::ops::{Operation, OperationCache, OperationKind, Outcome};
    use crate::topology::FaceKey;
    use crate::topology::validation::NonManifoldHandling;

    #[test]
    fn split_single_tet_edge() {
        let m = AttributedMesh::new(
            &[
                [0.0, 0.0, 0.0],
                [2.0, 0.0, 0.0],
                [0.0, 1.0, 0.0],
                [0.0, 0.0, 1.0],
            ],
            &[[0, 1, 2, 3]],
            NonManifoldHandling::Error,
        )
        .unwrap();
        m.mark_boundary_as_surface();
        m.set_tet_tags(&[7]);
        let (oracles, config) = (Oracles::default(), RemeshConfig::default());
        let ctx = InvariantContext::new(&m, &oracles, &config);
        let tuple = m.topology().tuple_from_vertices(0, 1).unwrap();
        let out = Operation::new(OperationKind::Split)
            .attempt(&ctx, tuple, OperationCache::new(OperationKind::Split))
            .unwrap();
        let Outcome::Committed(report) = out else {
            panic!("split rejected: {out:?}");
        };
        let mid = report.new_vertex.expect("midpoint");
        assert_eq!(m.position(mid), [1.0, 0.0, 0.0]);
        assert!(m.vertex(mid).is_on_surface);
        assert_eq!(m.topology().n_tets(), 2);
        assert!(!m.topology().has_edge(0, 1));
        for t in report.new_tets {
            assert_eq!(m.tet(t).tag, 7);
            assert!(m.tet(t).quality.is_finite());
        }
        // Both halves of a split surface face stay on the surface; the new
        // interior face does not.
        assert!(m.is_surface_face(FaceKey::new(0, mid, 2)));
        assert!(m.is_surface_face(FaceKey::new(mid, 1, 2)));
        assert!(!m.is_surface_face(FaceKey::new(mid, 2, 3)));
        assert!(m.face_attrs().get_opt(&FaceKey::new(0, 1, 2)).is_none());
        m.validate_invariants().unwrap();
    }
}
