//! Edge swaps (3-2, 4-4, 5-6) and the 2-3 face swap.
//!
//! An edge swap removes the `n` tetrahedra around an interior edge and
//! re-triangulates the polyhedron they form from one apex of the ring. Every
//! apex gives an equivalent candidate; the one with the lowest worst energy
//! is applied.

use crate::data::attributes::TetAttributes;
use crate::invariants::{InvariantContext, MinSequence};
use crate::ops::cache::OperationCache;
use crate::ops::{
    Abort, faces_of, max_energy_of, parent_attrs, record_old_tets, replace_vertex,
    write_new_tets,
};
use crate::topology::{EdgeKey, Tuple};

pub(crate) fn prepare_edge_swap(
    ctx: &InvariantContext<'_>,
    tuple: Tuple,
    cache: &mut OperationCache,
) -> Result<(), Abort> {
    let mesh = ctx.mesh;
    let topo = mesh.topology();
    let n = cache
        .kind
        .edge_valence()
        .ok_or(Abort::Reject("not an edge swap"))?;
    let [v1, v2] = topo
        .tuple_edge_vertices(&tuple)
        .ok_or(Abort::Reject("stale edge"))?;
    cache.edge = Some((v1, v2));
    cache.seeds = vec![v1, v2];
    cache.vanished_edges = vec![EdgeKey::new(v1, v2)];

    if topo.is_boundary_edge(v1, v2) {
        return Err(Abort::Reject("boundary edge"));
    }
    if mesh.is_surface_edge(v1, v2) || mesh.is_bbox_edge(v1, v2) {
        return Err(Abort::Reject("surface or bbox edge"));
    }
    let ring = topo
        .edge_ring(v1, v2)
        .ok_or(Abort::Reject("edge is not surrounded by one fan"))?;
    if ring.tets.len() != n {
        return Err(Abort::Reject("edge valence does not match"));
    }
    cache.old_max_energy = max_energy_of(ctx, &ring.tets);
    cache.ring = ring.ring;
    record_old_tets(ctx, cache, ring.tets)
}

/// Re-triangulation of an edge ring from apex `k`.
///
/// `old[i]` must contain the edge and the ring vertices `ring[i]` and
/// `ring[(i + 1) % n]`. Each old tetrahedron not touching the apex yields two
/// new ones: one with `v2` replaced by the apex, one with `v1` replaced.
pub(crate) fn edge_swap_tets(
    old: &[[usize; 4]],
    ring: &[usize],
    (v1, v2): (usize, usize),
    k: usize,
) -> Vec<[usize; 4]> {
    let n = ring.len();
    let apex = ring[k];
    (1..=n.saturating_sub(2))
        .flat_map(|j| {
            let vids = old[(k + j) % n];
            [replace_vertex(vids, v2, apex), replace_vertex(vids, v1, apex)]
        })
        .collect()
}

/// Score of one candidate, `None` if it cannot be applied.
fn score_candidate(
    ctx: &InvariantContext<'_>,
    ring: &[usize],
    k: usize,
    tets: &[[usize; 4]],
) -> Option<f64> {
    let mesh = ctx.mesh;
    let topo = mesh.topology();
    let n = ring.len();
    let apex = ring[k];
    for j in 2..n.saturating_sub(1) {
        if topo.has_edge(apex, ring[(k + j) % n]) {
            return None;
        }
    }
    if n == 3 && !topo.face_tets(ring[0], ring[1], ring[2]).is_empty() {
        return None;
    }
    let mut worst = f64::NEG_INFINITY;
    for &vids in tets {
        if ctx.oracles.is_inverted(mesh, vids) || topo.find_tet(vids).is_some() {
            return None;
        }
        worst = worst.max(ctx.oracles.energy_of(mesh, vids));
    }
    Some(worst)
}

pub(crate) fn mutate_edge_swap(
    ctx: &InvariantContext<'_>,
    cache: &mut OperationCache,
) -> Result<(), Abort> {
    let edge = cache.edge.ok_or(Abort::Reject("missing operand"))?;
    let ring = cache.ring.clone();
    let candidates = MinSequence::new(
        (0..ring.len())
            .map(|k| (k, edge_swap_tets(&cache.old_tet_vertices, &ring, edge, k)))
            .collect(),
    );
    let Some(((k, tets), score)) =
        candidates.into_best(|(k, tets)| score_candidate(ctx, &ring, *k, tets))
    else {
        return Err(Abort::Reject("no valid re-triangulation"));
    };
    log::trace!(
        "[{}] apex {} of {} scores {score:.4}",
        cache.kind,
        ring[k],
        ring.len()
    );

    let first = *cache
        .old_tets
        .first()
        .ok_or(Abort::Reject("missing operand"))?;
    let child = TetAttributes::child_of(&parent_attrs(ctx, first)?);
    let new = tets.into_iter().map(|vids| (vids, child.clone())).collect();
    write_new_tets(ctx, cache, new);
    let dead = faces_of(&cache.old_tet_vertices);
    ctx.mesh.drop_dead_faces(&dead, &mut cache.tx);
    Ok(())
}

pub(crate) fn prepare_face_swap(
    ctx: &InvariantContext<'_>,
    tuple: Tuple,
    cache: &mut OperationCache,
) -> Result<(), Abort> {
    let mesh = ctx.mesh;
    let topo = mesh.topology();
    let face = topo
        .tuple_face(&tuple)
        .ok_or(Abort::Reject("stale face"))?;
    let [f0, f1, f2] = face.vertices();
    cache.face = Some(face);

    let tets = topo.face_tets(f0, f1, f2);
    if tets.len() != 2 {
        return Err(Abort::Reject("boundary face"));
    }
    if mesh
        .face_attrs()
        .get_opt(&face)
        .is_some_and(|a| a.is_surface || a.bbox_side.is_some())
    {
        return Err(Abort::Reject("surface or bbox face"));
    }
    record_old_tets(ctx, cache, tets)?;
    let opposite = |vids: &[usize; 4]| vids.iter().copied().find(|&v| !face.contains(v));
    let (Some(u0), Some(u1)) = (
        opposite(&cache.old_tet_vertices[0]),
        opposite(&cache.old_tet_vertices[1]),
    ) else {
        return Err(Abort::Reject("degenerate face pair"));
    };
    if topo.has_edge(u0, u1) {
        return Err(Abort::Reject("opposite vertices already joined"));
    }
    cache.seeds = vec![f0, f1, f2, u0, u1];
    cache.old_max_energy = max_energy_of(ctx, &cache.old_tets);
    Ok(())
}

pub(crate) fn mutate_face_swap(
    ctx: &InvariantContext<'_>,
    cache: &mut OperationCache,
) -> Result<(), Abort> {
    let face = cache.face.ok_or(Abort::Reject("missing operand"))?;
    let (Some(&t0), Some(&first), Some(&u1)) = (
        cache.old_tet_vertices.first(),
        cache.old_tets.first(),
        cache.seeds.get(4),
    ) else {
        return Err(Abort::Reject("missing operand"));
    };
    let child = TetAttributes::child_of(&parent_attrs(ctx, first)?);
    let new = face
        .vertices()
        .into_iter()
        .map(|f| (replace_vertex(t0, f, u1), child.clone()))
        .collect();
    write_new_tets(ctx, cache, new);
    let dead = faces_of(&cache.old_tet_vertices);
    ctx.mesh.drop_dead_faces(&dead, &mut cache.tx);
    Ok(())
}
