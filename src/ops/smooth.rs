//! Vertex smoothing.
//!
//! The vertex stays connected to the same tetrahedra and only its position
//! changes. Candidate positions lie on the segment from the current position
//! to the centroid of the vertex's anchors, at shrinking step sizes; the one
//! with the lowest worst energy over the star is applied. Anchors are the
//! one-ring for interior vertices and the neighbours along the tracked
//! feature for surface and open-boundary vertices.

use crate::invariants::{InvariantContext, MinSequence};
use crate::mesh_error::MeshOpsError;
use crate::ops::cache::OperationCache;
use crate::ops::{Abort, faces_of, max_energy_of, record_old_tets};
use crate::topology::Tuple;

/// Fractions of the way to the anchor centroid, tried largest first.
const STEPS: [f64; 5] = [1.0, 0.5, 0.25, 0.125, 0.0625];

pub(crate) fn prepare(
    ctx: &InvariantContext<'_>,
    tuple: Tuple,
    cache: &mut OperationCache,
) -> Result<(), Abort> {
    let mesh = ctx.mesh;
    let topo = mesh.topology();
    let v = tuple.vid();
    let attrs = mesh.try_vertex(v).ok_or(Abort::Reject("stale vertex"))?;
    cache.seeds = vec![v];

    if !attrs.on_bbox_faces.is_empty() {
        return Err(Abort::Reject("bbox vertex"));
    }
    if !attrs.is_rounded {
        return Err(Abort::Reject("unrounded vertex"));
    }
    if topo.is_boundary_vertex(v) && !attrs.is_on_surface && !attrs.is_on_open_boundary {
        return Err(Abort::Reject("untracked boundary vertex"));
    }
    let star = topo.vertex_tets(v);
    if star.is_empty() {
        return Err(Abort::Reject("isolated vertex"));
    }
    cache.old_max_energy = max_energy_of(ctx, &star);
    record_old_tets(ctx, cache, star)?;

    let anchors = anchors(ctx, v, attrs.is_on_surface, attrs.is_on_open_boundary, cache);
    if anchors.is_empty() {
        return Err(Abort::Reject("no anchors"));
    }
    let mut target = [0.0; 3];
    for &w in &anchors {
        let p = mesh.position(w);
        for k in 0..3 {
            target[k] += p[k] / anchors.len() as f64;
        }
    }

    let from = attrs.pos;
    let candidates = MinSequence::new(
        STEPS
            .iter()
            .map(|&t| [0, 1, 2].map(|k| from[k] + t * (target[k] - from[k])))
            .collect(),
    );
    let Some((pos, score)) =
        candidates.into_best(|p| score_position(ctx, v, &cache.old_tet_vertices, *p))
    else {
        return Err(Abort::Reject("every position inverts the star"));
    };
    if score >= cache.old_max_energy {
        return Err(Abort::Reject("no improving position"));
    }
    let envelope = if attrs.is_on_open_boundary {
        Some(&ctx.oracles.open_boundary_envelope)
    } else if attrs.is_on_surface {
        Some(&ctx.oracles.surface_envelope)
    } else {
        None
    };
    if envelope.is_some_and(|e| e.is_outside_point(pos)) {
        return Err(Abort::Reject("position leaves the envelope"));
    }
    log::trace!("[{}] vertex {v} scores {score:.4}", cache.kind);
    cache.new_position = Some(pos);
    Ok(())
}

/// Vertices whose centroid the smoothed vertex is pulled towards.
fn anchors(
    ctx: &InvariantContext<'_>,
    v: usize,
    on_surface: bool,
    on_open_boundary: bool,
    cache: &OperationCache,
) -> Vec<usize> {
    let mesh = ctx.mesh;
    let mut out: Vec<usize> = if on_open_boundary {
        mesh.topology()
            .one_ring_vertices(v)
            .into_iter()
            .filter(|&w| mesh.is_open_boundary_edge(v, w))
            .collect()
    } else if on_surface {
        faces_of(&cache.old_tet_vertices)
            .into_iter()
            .filter(|f| f.contains(v) && mesh.is_surface_face(*f))
            .flat_map(|f| f.vertices())
            .filter(|&w| w != v)
            .collect()
    } else {
        mesh.topology().one_ring_vertices(v)
    };
    out.sort_unstable();
    out.dedup();
    out
}

/// Worst energy over the star with `v` placed at `p`; `None` if any
/// tetrahedron inverts.
fn score_position(
    ctx: &InvariantContext<'_>,
    v: usize,
    star: &[[usize; 4]],
    p: [f64; 3],
) -> Option<f64> {
    let mut worst = f64::NEG_INFINITY;
    for &vids in star {
        let corners = vids.map(|w| if w == v { p } else { ctx.mesh.position(w) });
        if ctx.oracles.inversion.is_inverted(&corners) {
            return None;
        }
        worst = worst.max(ctx.oracles.energy_at(&corners));
    }
    Some(worst)
}

pub(crate) fn mutate(ctx: &InvariantContext<'_>, cache: &mut OperationCache) -> Result<(), Abort> {
    let mesh = ctx.mesh;
    let (Some(&v), Some(pos)) = (cache.seeds.first(), cache.new_position) else {
        return Err(Abort::Reject("missing operand"));
    };
    if !mesh.topology().is_vertex_live(v) {
        return Err(MeshOpsError::StaleHandle(format!("vertex {v} vanished")).into());
    }
    mesh.update_vertex(v, |a| a.pos = pos, &mut cache.tx);
    cache.moved = vec![v];

    let energies: Vec<f64> = cache
        .old_tet_vertices
        .iter()
        .map(|&vids| ctx.oracles.energy_of(mesh, vids))
        .collect();
    for (&t, &e) in cache.old_tets.iter().zip(&energies) {
        mesh.update_tet(t, |a| a.quality = e, &mut cache.tx);
    }
    cache.new_tets = cache.old_tets.clone();
    cache.new_energies = energies;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapt::config::RemeshConfig;
    use crate::data::mesh::AttributedMesh;
    use crate::debug_invariants::DebugInvariants;
    use crate::geometry::oracles::{BoxEnvelope, Oracles};
    use crate::ops::{Operation, OperationKind, Outcome, Rejection};
    use crate::topology::validation::NonManifoldHandling;

    /// Octahedron around vertex 6, which sits off-centre at `centre`.
    fn octahedron(centre: [f64; 3]) -> AttributedMesh {
        AttributedMesh::new(
            &[
                [1.0, 0.0, 0.0],
                [-1.0, 0.0, 0.0],
                [0.0, 1.0, 0.0],
                [0.0, -1.0, 0.0],
                [0.0, 0.0, 1.0],
                [0.0, 0.0, -1.0],
                centre,
            ],
            &[
                [6, 0, 2, 4],
                [6, 2, 1, 4],
                [6, 1, 3, 4],
                [6, 3, 0, 4],
                [6, 2, 0, 5],
                [6, 1, 2, 5],
                [6, 3, 1, 5],
                [6, 0, 3, 5],
            ],
            NonManifoldHandling::Error,
        )
        .unwrap()
    }

    fn smooth(m: &AttributedMesh, oracles: &Oracles, v: usize) -> Outcome {
        let config = RemeshConfig::default();
        let ctx = InvariantContext::new(m, oracles, &config);
        let tuple = m.topology().tuple_from_vertex(v).unwrap();
        Operation::new(OperationKind::Smooth)
            .attempt(&ctx, tuple, OperationCache::new(OperationKind::Smooth))
            .unwrap()
    }

    fn star_energy(m: &AttributedMesh, oracles: &Oracles, v: usize) -> f64 {
        m.topology()
            .vertex_tets(v)
            .into_iter()
            .filter_map(|t| m.topology().tet_vertices(t))
            .map(|vids| oracles.energy_of(m, vids))
            .fold(f64::NEG_INFINITY, f64::max)
    }

    #[test]
    fn interior_vertex_moves_towards_the_centre() {
        let m = octahedron([0.3, -0.2, 0.1]);
        let oracles = Oracles::default();
        let before = star_energy(&m, &oracles, 6);
        let out = smooth(&m, &oracles, 6);
        let Outcome::Committed(report) = out else {
            panic!("smooth rejected: {out:?}");
        };
        assert_eq!(report.vertices, vec![6]);
        assert_eq!(report.new_tets.len(), 8);
        assert_eq!(m.topology().n_tets(), 8);
        let after = star_energy(&m, &oracles, 6);
        assert!(after < before, "{after} >= {before}");
        let p = m.position(6);
        assert!(p.iter().all(|c| c.abs() < 1e-9), "{p:?}");
        m.validate_invariants().unwrap();
    }

    #[test]
    fn centred_vertex_is_left_alone() {
        let m = octahedron([0.0; 3]);
        let before = m.snapshot();
        let out = smooth(&m, &Oracles::default(), 6);
        assert_eq!(
            out,
            Outcome::Rejected(Rejection::Precondition("no improving position"))
        );
        assert_eq!(m.snapshot(), before);
    }

    #[test]
    fn untracked_boundary_vertex_is_not_moved() {
        let m = octahedron([0.3, -0.2, 0.1]);
        let out = smooth(&m, &Oracles::default(), 0);
        assert_eq!(
            out,
            Outcome::Rejected(Rejection::Precondition("untracked boundary vertex"))
        );
    }

    #[test]
    fn surface_vertex_outside_the_envelope_is_rejected() {
        let m = octahedron([0.0; 3]);
        m.mark_boundary_as_surface();
        // Every candidate for vertex 4 lies below z = 1.4, under the envelope slab.
        let mut tx = crate::data::mesh::MeshTransaction::default();
        m.update_vertex(4, |a| a.pos = [0.0, 0.0, 1.4], &mut tx);
        m.commit(tx);
        let oracles = Oracles::default()
            .with_surface_envelope(BoxEnvelope::new([-2.0, -2.0, 1.35], [2.0; 3], 0.0));
        let before = m.snapshot();
        let out = smooth(&m, &oracles, 4);
        assert!(!out.is_committed(), "{out:?}");
        assert_eq!(m.snapshot(), before);
    }
}
