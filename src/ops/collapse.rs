//! Edge collapse: `v1` moves onto `v2` and disappears.
//!
//! The tetrahedra around the edge vanish, the rest of `v1`'s star is
//! re-attached to `v2`. Vertex positions never move.

use crate::data::attributes::{FaceAttributes, TetAttributes};
use crate::invariants::InvariantContext;
use crate::ops::cache::OperationCache;
use crate::ops::{
    Abort, faces_of, max_energy_of, parent_attrs, record_old_tets, replace_vertex,
    write_new_tets,
};
use crate::topology::{EdgeKey, FaceKey, Tuple};

/// Read the edge `tuple.vid -> other endpoint` and check the cheap preconditions.
pub(crate) fn prepare(
    ctx: &InvariantContext<'_>,
    tuple: Tuple,
    cache: &mut OperationCache,
) -> Result<(), Abort> {
    let mesh = ctx.mesh;
    let topo = mesh.topology();
    let [a, b] = topo
        .tuple_edge_vertices(&tuple)
        .ok_or(Abort::Reject("stale edge"))?;
    let v1 = tuple.vid();
    let v2 = if a == v1 { b } else { a };
    cache.edge = Some((v1, v2));
    cache.seeds = vec![v1, v2];

    let (p1, p2) = (mesh.vertex(v1), mesh.vertex(v2));
    if !p1.is_rounded || !p2.is_rounded {
        return Err(Abort::Reject("unrounded endpoint"));
    }
    if !p1.on_bbox_faces.is_subset_of(p2.on_bbox_faces) {
        return Err(Abort::Reject("leaves bbox side"));
    }
    if p1.is_on_surface
        && !p2.is_on_surface
        && ctx.oracles.surface_envelope.is_outside_point(p2.pos)
    {
        return Err(Abort::Reject("target outside surface envelope"));
    }
    if p1.is_on_open_boundary
        && !p2.is_on_open_boundary
        && ctx.oracles.open_boundary_envelope.is_outside_point(p2.pos)
    {
        return Err(Abort::Reject("target outside open-boundary envelope"));
    }

    let star = topo.vertex_tets(v1);
    let edge_tets = topo.edge_tets(v1, v2);
    let changed: Vec<usize> = star
        .iter()
        .copied()
        .filter(|t| edge_tets.binary_search(t).is_err())
        .collect();
    for &t in &changed {
        let vids = topo
            .tet_vertices(t)
            .ok_or(Abort::Reject("stale tetrahedron"))?;
        if topo.find_tet(replace_vertex(vids, v1, v2)).is_some() {
            return Err(Abort::Reject("duplicate tetrahedron"));
        }
    }

    cache.old_max_energy = max_energy_of(ctx, &star);
    // Rewritten tetrahedra first so they keep their slots.
    let mut old = changed;
    old.extend(edge_tets);
    record_old_tets(ctx, cache, old)?;
    cache.renamed = vec![(v1, v2)];
    cache.vanished_edges = vec![EdgeKey::new(v1, v2)];
    Ok(())
}

pub(crate) fn mutate(ctx: &InvariantContext<'_>, cache: &mut OperationCache) -> Result<(), Abort> {
    let mesh = ctx.mesh;
    let topo = mesh.topology();
    let (v1, v2) = cache.edge.ok_or(Abort::Reject("missing operand"))?;

    // Face attributes follow v1 onto v2; read everything before rewriting.
    let mut transfers: Vec<(FaceKey, FaceKey, Option<FaceAttributes>)> = Vec::new();
    for face in faces_of(&cache.old_tet_vertices) {
        if !face.contains(v1) || face.contains(v2) {
            continue;
        }
        let Some(target) = face.relabel(v1, v2) else { continue };
        let moved = mesh.face_attrs().get_opt(&face);
        let [a, b, c] = target.vertices();
        let attrs = if topo.face_tets(a, b, c).is_empty() {
            moved
        } else {
            let existing = mesh.face_attrs().get_opt(&target);
            match (moved, existing) {
                (None, None) => None,
                (moved, existing) => {
                    let mut merged = moved.unwrap_or_default();
                    merged.merge(&existing.unwrap_or_default());
                    Some(merged)
                }
            }
        };
        transfers.push((face, target, attrs));
    }

    let mut new: Vec<([usize; 4], TetAttributes)> = Vec::new();
    for (&t, &vids) in cache.old_tets.iter().zip(&cache.old_tet_vertices) {
        if vids.contains(&v2) {
            continue;
        }
        let parent = parent_attrs(ctx, t)?;
        new.push((replace_vertex(vids, v1, v2), TetAttributes::child_of(&parent)));
    }
    write_new_tets(ctx, cache, new);

    for &(face, _, _) in &transfers {
        mesh.remove_face(face, &mut cache.tx);
    }
    for (_, target, attrs) in transfers {
        if let Some(attrs) = attrs.filter(|a| !a.is_plain()) {
            mesh.set_face(target, attrs, &mut cache.tx);
        }
    }
    let dead = faces_of(&cache.old_tet_vertices);
    mesh.drop_dead_faces(&dead, &mut cache.tx);

    let gone = mesh.vertex(v1);
    mesh.update_vertex(
        v2,
        |a| {
            a.is_on_surface |= gone.is_on_surface;
            a.is_on_open_boundary |= gone.is_on_open_boundary;
        },
        &mut cache.tx,
    );
    mesh.remove_vertex(v1, &mut cache.tx);
    Ok(())
}
