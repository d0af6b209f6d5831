//! Work policies: which operands are worth trying, and in which order.

use crate::invariants::InvariantContext;
use crate::ops::{OpReport, OperationKind};
use crate::scheduler::WorkItem;
use crate::topology::local::{LOCAL_EDGES, LOCAL_FACES};
use crate::topology::{EdgeKey, FaceKey, SimplexKind, Tuple};

/// What to do with a popped item whose priority may be outdated.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Freshness {
    Fresh,
    /// Push back with the recomputed priority.
    Requeue(f64),
    /// The operand is gone or no longer qualifies.
    Drop,
}

/// Priority, renewal and stopping rules of one kind of pass.
///
/// Priorities are read without holding any lock. They only order the work
/// and never authorize a commit.
pub trait WorkPolicy: Send + Sync {
    /// Candidates for the first pass.
    fn initial(&self, ctx: &InvariantContext<'_>) -> Vec<(OperationKind, Tuple)>;

    /// Priority of an operand; `None` when it does not qualify.
    fn priority(
        &self,
        ctx: &InvariantContext<'_>,
        kind: OperationKind,
        tuple: &Tuple,
    ) -> Option<f64>;

    fn freshness(&self, ctx: &InvariantContext<'_>, item: &WorkItem) -> Freshness {
        if !ctx.mesh.topology().is_valid(&item.tuple) {
            return Freshness::Drop;
        }
        match self.priority(ctx, item.kind, &item.tuple) {
            None => Freshness::Drop,
            Some(p) if p.total_cmp(&item.priority).is_eq() => Freshness::Fresh,
            Some(p) => Freshness::Requeue(p),
        }
    }

    /// New candidates around a committed edit.
    fn renew(&self, ctx: &InvariantContext<'_>, report: &OpReport) -> Vec<(OperationKind, Tuple)>;

    /// Checked every `stop_check_interval` successes.
    fn should_stop(&self, _ctx: &InvariantContext<'_>) -> bool {
        false
    }
}

/// Turn candidates into prioritized work items, dropping those that do not qualify.
pub fn prioritize<P: WorkPolicy + ?Sized>(
    policy: &P,
    ctx: &InvariantContext<'_>,
    candidates: Vec<(OperationKind, Tuple)>,
) -> Vec<WorkItem> {
    candidates
        .into_iter()
        .filter_map(|(kind, tuple)| {
            let priority = policy.priority(ctx, kind, &tuple)?;
            Some(WorkItem {
                kind,
                tuple,
                priority,
            })
        })
        .collect()
}

/// Edge keys of the given tetrahedra, deduplicated.
fn edges_of_tets(ctx: &InvariantContext<'_>, tets: &[usize]) -> Vec<EdgeKey> {
    let topo = ctx.mesh.topology();
    let mut out: Vec<EdgeKey> = tets
        .iter()
        .filter_map(|&t| topo.tet_vertices(t))
        .flat_map(|vids| LOCAL_EDGES.map(|[i, j]| EdgeKey::new(vids[i], vids[j])))
        .collect();
    out.sort_unstable();
    out.dedup();
    out
}

fn edge_tuples(ctx: &InvariantContext<'_>, edges: Vec<EdgeKey>) -> Vec<Tuple> {
    let topo = ctx.mesh.topology();
    edges
        .into_iter()
        .filter_map(|e| {
            let [a, b] = e.vertices();
            topo.tuple_from_vertices(a, b)
        })
        .collect()
}

fn edge_length2_and_sizing(ctx: &InvariantContext<'_>, tuple: &Tuple) -> Option<(f64, f64)> {
    let [a, b] = ctx.mesh.topology().tuple_edge_vertices(tuple)?;
    let (pa, pb) = (ctx.mesh.try_vertex(a)?, ctx.mesh.try_vertex(b)?);
    let len2: f64 = (0..3).map(|k| (pa.pos[k] - pb.pos[k]).powi(2)).sum();
    Some((len2, 0.5 * (pa.sizing_scalar + pb.sizing_scalar)))
}

/// Worst stored energy over `tets`; tetrahedra that vanished meanwhile are skipped.
fn worst_stored_energy(ctx: &InvariantContext<'_>, tets: &[usize]) -> f64 {
    tets.iter()
        .filter_map(|&t| ctx.mesh.try_tet(t))
        .map(|a| a.quality)
        .fold(f64::NEG_INFINITY, f64::max)
}

/// Shortest edges first; an edge qualifies while shorter than the collapse bound.
#[derive(Clone, Copy, Debug, Default)]
pub struct CollapsePolicy;

impl WorkPolicy for CollapsePolicy {
    fn initial(&self, ctx: &InvariantContext<'_>) -> Vec<(OperationKind, Tuple)> {
        let mut out = Vec::new();
        ctx.mesh
            .topology()
            .for_each_live(SimplexKind::Edge, |t| out.push((OperationKind::Collapse, t)));
        out
    }

    fn priority(
        &self,
        ctx: &InvariantContext<'_>,
        kind: OperationKind,
        tuple: &Tuple,
    ) -> Option<f64> {
        if kind != OperationKind::Collapse {
            return None;
        }
        let (len2, sizing) = edge_length2_and_sizing(ctx, tuple)?;
        (len2 < ctx.config.collapse_threshold2(sizing)).then_some(-len2)
    }

    fn renew(&self, ctx: &InvariantContext<'_>, report: &OpReport) -> Vec<(OperationKind, Tuple)> {
        edge_tuples(ctx, edges_of_tets(ctx, &report.new_tets))
            .into_iter()
            .map(|t| (OperationKind::Collapse, t))
            .collect()
    }
}

/// Longest edges first; an edge qualifies while longer than the split bound.
#[derive(Clone, Copy, Debug, Default)]
pub struct SplitPolicy;

impl WorkPolicy for SplitPolicy {
    fn initial(&self, ctx: &InvariantContext<'_>) -> Vec<(OperationKind, Tuple)> {
        let mut out = Vec::new();
        ctx.mesh
            .topology()
            .for_each_live(SimplexKind::Edge, |t| out.push((OperationKind::Split, t)));
        out
    }

    fn priority(
        &self,
        ctx: &InvariantContext<'_>,
        kind: OperationKind,
        tuple: &Tuple,
    ) -> Option<f64> {
        if kind != OperationKind::Split {
            return None;
        }
        let (len2, sizing) = edge_length2_and_sizing(ctx, tuple)?;
        (len2 > ctx.config.split_threshold2(sizing)).then_some(len2)
    }

    fn renew(&self, ctx: &InvariantContext<'_>, report: &OpReport) -> Vec<(OperationKind, Tuple)> {
        edge_tuples(ctx, edges_of_tets(ctx, &report.new_tets))
            .into_iter()
            .map(|t| (OperationKind::Split, t))
            .collect()
    }
}

/// Worst local energy first, over the enabled swap kinds.
///
/// Interior edges map to the edge swap matching their valence, interior faces
/// to the 2-3 swap. Operands whose worst energy is below `stop_energy` are
/// left alone.
#[derive(Clone, Debug)]
pub struct SwapPolicy {
    pub kinds: Vec<OperationKind>,
}

impl Default for SwapPolicy {
    fn default() -> Self {
        Self {
            kinds: vec![
                OperationKind::Swap32,
                OperationKind::Swap23,
                OperationKind::Swap44,
                OperationKind::Swap56,
            ],
        }
    }
}

impl SwapPolicy {
    pub fn only(kind: OperationKind) -> Self {
        Self { kinds: vec![kind] }
    }

    fn edge_kind(&self, ctx: &InvariantContext<'_>, e: EdgeKey) -> Option<OperationKind> {
        let [a, b] = e.vertices();
        let n = ctx.mesh.topology().edge_tets(a, b).len();
        self.kinds
            .iter()
            .copied()
            .find(|k| k.edge_valence() == Some(n))
    }

    fn candidates_in(
        &self,
        ctx: &InvariantContext<'_>,
        edges: Vec<EdgeKey>,
        faces: Vec<FaceKey>,
    ) -> Vec<(OperationKind, Tuple)> {
        let topo = ctx.mesh.topology();
        let mut out = Vec::new();
        for e in edges {
            let Some(kind) = self.edge_kind(ctx, e) else { continue };
            let [a, b] = e.vertices();
            if topo.is_boundary_edge(a, b) {
                continue;
            }
            out.extend(topo.tuple_from_vertices(a, b).map(|t| (kind, t)));
        }
        if self.kinds.contains(&OperationKind::Swap23) {
            for f in faces {
                if topo.is_boundary_face(f) {
                    continue;
                }
                out.extend(
                    topo.tuple_from_face_vertices(f.vertices())
                        .map(|t| (OperationKind::Swap23, t)),
                );
            }
        }
        out
    }
}

impl WorkPolicy for SwapPolicy {
    fn initial(&self, ctx: &InvariantContext<'_>) -> Vec<(OperationKind, Tuple)> {
        let topo = ctx.mesh.topology();
        self.candidates_in(ctx, topo.edges(), topo.faces())
    }

    fn priority(
        &self,
        ctx: &InvariantContext<'_>,
        kind: OperationKind,
        tuple: &Tuple,
    ) -> Option<f64> {
        if !self.kinds.contains(&kind) {
            return None;
        }
        let topo = ctx.mesh.topology();
        let tets = match kind.operand() {
            SimplexKind::Face => {
                let [a, b, c] = topo.tuple_face(tuple)?.vertices();
                topo.face_tets(a, b, c)
            }
            _ => {
                let [a, b] = topo.tuple_edge_vertices(tuple)?;
                let tets = topo.edge_tets(a, b);
                if Some(tets.len()) != kind.edge_valence() {
                    return None;
                }
                tets
            }
        };
        let worst = worst_stored_energy(ctx, &tets);
        (worst >= ctx.config.stop_energy).then_some(worst)
    }

    fn renew(&self, ctx: &InvariantContext<'_>, report: &OpReport) -> Vec<(OperationKind, Tuple)> {
        let topo = ctx.mesh.topology();
        let edges = edges_of_tets(ctx, &report.new_tets);
        let mut faces: Vec<FaceKey> = report
            .new_tets
            .iter()
            .filter_map(|&t| topo.tet_vertices(t))
            .flat_map(|vids| LOCAL_FACES.map(|lf| FaceKey::from_array(lf.map(|j| vids[j]))))
            .collect();
        faces.sort_unstable();
        faces.dedup();
        self.candidates_in(ctx, edges, faces)
    }
}

/// Vertices with the worst star energy first, each visited once per pass.
///
/// Bounding-box vertices never qualify. A committed move does not schedule
/// its neighbours again; vertices whose attempt was rejected are retried by
/// the next pass of the fixed-point loop.
#[derive(Clone, Copy, Debug, Default)]
pub struct SmoothPolicy;

impl WorkPolicy for SmoothPolicy {
    fn initial(&self, ctx: &InvariantContext<'_>) -> Vec<(OperationKind, Tuple)> {
        let mut out = Vec::new();
        ctx.mesh
            .topology()
            .for_each_live(SimplexKind::Vertex, |t| out.push((OperationKind::Smooth, t)));
        out
    }

    fn priority(
        &self,
        ctx: &InvariantContext<'_>,
        kind: OperationKind,
        tuple: &Tuple,
    ) -> Option<f64> {
        if kind != OperationKind::Smooth {
            return None;
        }
        let v = tuple.vid();
        let attrs = ctx.mesh.try_vertex(v)?;
        if !attrs.on_bbox_faces.is_empty() {
            return None;
        }
        let star = ctx.mesh.topology().vertex_tets(v);
        if star.is_empty() {
            return None;
        }
        Some(worst_stored_energy(ctx, &star))
    }

    fn renew(
        &self,
        _ctx: &InvariantContext<'_>,
        _report: &OpReport,
    ) -> Vec<(OperationKind, Tuple)> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapt::config::RemeshConfig;
    use crate::data::mesh::AttributedMesh;
    use crate::geometry::oracles::Oracles;
    use crate::topology::validation::NonManifoldHandling;

    fn long_and_short() -> AttributedMesh {
        AttributedMesh::new(
            &[
                [0.0, 0.0, 0.0],
                [3.0, 0.0, 0.0],
                [0.0, 0.5, 0.0],
                [0.0, 0.0, 0.5],
            ],
            &[[0, 1, 2, 3]],
            NonManifoldHandling::Error,
        )
        .unwrap()
    }

    #[test]
    fn collapse_and_split_thresholds() {
        let m = long_and_short();
        let (oracles, config) = (Oracles::default(), RemeshConfig::default());
        let ctx = InvariantContext::new(&m, &oracles, &config);
        let short = m.topology().tuple_from_vertices(0, 2).unwrap();
        let long = m.topology().tuple_from_vertices(0, 1).unwrap();
        assert_eq!(
            CollapsePolicy.priority(&ctx, OperationKind::Collapse, &short),
            Some(-0.25)
        );
        assert_eq!(CollapsePolicy.priority(&ctx, OperationKind::Collapse, &long), None);
        assert_eq!(SplitPolicy.priority(&ctx, OperationKind::Split, &long), Some(9.0));
        assert_eq!(SplitPolicy.priority(&ctx, OperationKind::Split, &short), None);
        let items = prioritize(&SplitPolicy, &ctx, SplitPolicy.initial(&ctx));
        assert!(items.iter().all(|i| i.priority > 1.0));
        assert!(!items.is_empty());
    }

    #[test]
    fn stale_items_are_dropped_and_outdated_ones_requeued() {
        let m = long_and_short();
        let (oracles, config) = (Oracles::default(), RemeshConfig::default());
        let ctx = InvariantContext::new(&m, &oracles, &config);
        let long = m.topology().tuple_from_vertices(0, 1).unwrap();
        let item = WorkItem {
            kind: OperationKind::Split,
            tuple: long,
            priority: 1.0,
        };
        assert_eq!(SplitPolicy.freshness(&ctx, &item), Freshness::Requeue(9.0));
        let fresh = WorkItem {
            priority: 9.0,
            ..item
        };
        assert_eq!(SplitPolicy.freshness(&ctx, &fresh), Freshness::Fresh);
        assert_eq!(CollapsePolicy.freshness(&ctx, &fresh), Freshness::Drop);
    }

    #[test]
    fn single_tet_has_no_swap_candidates() {
        let m = long_and_short();
        let (oracles, config) = (Oracles::default(), RemeshConfig::default());
        let ctx = InvariantContext::new(&m, &oracles, &config);
        assert!(SwapPolicy::default().initial(&ctx).is_empty());
    }

    #[test]
    fn smoothing_skips_bbox_vertices_and_ranks_by_star_energy() {
        let m = long_and_short();
        m.mark_bbox_faces();
        let mut tx = crate::data::mesh::MeshTransaction::default();
        m.update_tet(0, |a| a.quality = 7.5, &mut tx);
        m.update_vertex(3, |a| a.on_bbox_faces = Default::default(), &mut tx);
        m.commit(tx);
        let (oracles, config) = (Oracles::default(), RemeshConfig::default());
        let ctx = InvariantContext::new(&m, &oracles, &config);

        let items = prioritize(&SmoothPolicy, &ctx, SmoothPolicy.initial(&ctx));
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].kind, OperationKind::Smooth);
        assert_eq!(items[0].tuple.vid(), 3);
        assert_eq!(items[0].priority, 7.5);
        let report = OpReport {
            kind: OperationKind::Smooth,
            new_tets: vec![0],
            vertices: vec![3],
            new_vertex: None,
            removed_vertex: None,
        };
        assert!(SmoothPolicy.renew(&ctx, &report).is_empty());
        assert_eq!(SmoothPolicy.priority(&ctx, OperationKind::Split, &items[0].tuple), None);
    }
}
