//! Built-in invariants shared by the local operations.

use crate::invariants::{Check, Invariant, InvariantContext};
use crate::mesh_error::MeshOpsError;
use crate::ops::cache::OperationCache;
use crate::topology::link::{LinkCounts, link_condition, tracked_faces_around};
use crate::topology::local::LOCAL_FACES;
use crate::topology::{EdgeKey, FaceKey};

/// Combinatorial link condition of the collapsing edge.
#[derive(Clone, Copy, Debug, Default)]
pub struct LinkCondition;

impl Invariant for LinkCondition {
    fn name(&self) -> &'static str {
        "link_condition"
    }

    fn before(&self, ctx: &InvariantContext<'_>, cache: &mut OperationCache) -> Check {
        if !ctx.config.check_link_condition {
            return Ok(true);
        }
        let Some((v1, v2)) = cache.edge else {
            return Ok(true);
        };
        Ok(link_condition(ctx.mesh.topology(), v1, v2))
    }
}

/// Vertex and edge link counts on the tagged surface survive the edit.
#[derive(Clone, Copy, Debug, Default)]
pub struct TopologyPreservation;

impl Invariant for TopologyPreservation {
    fn name(&self) -> &'static str {
        "topology_preservation"
    }

    fn before(&self, ctx: &InvariantContext<'_>, cache: &mut OperationCache) -> Check {
        if ctx.config.preserve_topology {
            let mesh = ctx.mesh;
            let tracked = |f: FaceKey| mesh.is_surface_face(f);
            cache.link_counts = Some(LinkCounts::around(mesh.topology(), &cache.seeds, &tracked));
        }
        Ok(true)
    }

    fn after(&self, ctx: &InvariantContext<'_>, cache: &OperationCache) -> Check {
        let Some(counts) = &cache.link_counts else {
            return Ok(true);
        };
        let mesh = ctx.mesh;
        let tracked = |f: FaceKey| mesh.is_surface_face(f);
        match counts.first_mismatch(
            mesh.topology(),
            &tracked,
            |v| cache.rename(v),
            &cache.vanished_edges,
        ) {
            Some(reason) => {
                log::debug!("[{:?}] topology change: {reason}", cache.kind);
                Ok(false)
            }
            None => Ok(true),
        }
    }
}

/// No new element is inverted.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoInversion;

impl Invariant for NoInversion {
    fn name(&self) -> &'static str {
        "no_inversion"
    }

    fn after(&self, ctx: &InvariantContext<'_>, cache: &OperationCache) -> Check {
        let topo = ctx.mesh.topology();
        Ok(cache.new_tets.iter().all(|&t| {
            topo.tet_vertices(t)
                .is_some_and(|vids| !ctx.oracles.is_inverted(ctx.mesh, vids))
        }))
    }
}

/// The worst new energy does not exceed the worst old one.
///
/// `strict` demands a real improvement, which keeps swap passes from cycling.
#[derive(Clone, Copy, Debug, Default)]
pub struct EnergyNonIncrease {
    pub strict: bool,
}

impl Invariant for EnergyNonIncrease {
    fn name(&self) -> &'static str {
        if self.strict {
            "energy_decrease"
        } else {
            "energy_non_increase"
        }
    }

    fn after(&self, _ctx: &InvariantContext<'_>, cache: &OperationCache) -> Check {
        let new_max = cache.new_max_energy();
        if !new_max.is_finite() && !cache.new_energies.is_empty() {
            return Ok(false);
        }
        Ok(if self.strict {
            new_max < cache.old_max_energy
        } else {
            new_max <= cache.old_max_energy
        })
    }
}

/// Changed surface triangles stay in the surface envelope and open-boundary
/// edges stay in the open-boundary envelope.
#[derive(Clone, Copy, Debug, Default)]
pub struct EnvelopeContainment;

impl Invariant for EnvelopeContainment {
    fn name(&self) -> &'static str {
        "envelope_containment"
    }

    fn before(&self, ctx: &InvariantContext<'_>, cache: &mut OperationCache) -> Check {
        let mesh = ctx.mesh;
        let tracked = |f: FaceKey| mesh.is_surface_face(f);
        cache.surface_faces_before = tracked_faces_around(mesh.topology(), &cache.seeds, &tracked);

        let mut open: Vec<EdgeKey> = cache
            .surface_faces_before
            .iter()
            .flat_map(|f| f.edges())
            .filter(|e| {
                let [a, b] = e.vertices();
                mesh.is_open_boundary_edge(a, b)
            })
            .collect();
        open.sort_unstable();
        open.dedup();
        cache.open_boundary_edges = open;
        Ok(true)
    }

    fn after(&self, ctx: &InvariantContext<'_>, cache: &OperationCache) -> Check {
        let mesh = ctx.mesh;
        let tracked = |f: FaceKey| mesh.is_surface_face(f);
        let changed = tracked_faces_around(mesh.topology(), &cache.seeds_after(), &tracked)
            .into_iter()
            .filter(|f| {
                cache.surface_faces_before.binary_search(f).is_err()
                    || f.vertices().iter().any(|v| cache.moved.contains(v))
            });
        for face in changed {
            let tri = face.vertices().map(|v| mesh.position(v));
            if ctx.oracles.surface_envelope.is_outside_triangle(tri) {
                return Ok(false);
            }
        }

        for &edge in &cache.open_boundary_edges {
            if cache.vanished_edges.contains(&edge) {
                continue;
            }
            let [a, b] = edge.vertices();
            let (a, b) = (cache.rename(a), cache.rename(b));
            if a == b {
                continue;
            }
            if !mesh.is_open_boundary_edge(a, b) {
                return Ok(false);
            }
            let (pa, pb) = (mesh.position(a), mesh.position(b));
            if ctx.oracles.open_boundary_envelope.is_outside_triangle([pa, pb, pa]) {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

/// Every face of a new element is shared by at most two elements.
#[derive(Clone, Copy, Debug, Default)]
pub struct ManifoldFaces;

impl Invariant for ManifoldFaces {
    fn name(&self) -> &'static str {
        "manifold_faces"
    }

    fn after(&self, ctx: &InvariantContext<'_>, cache: &OperationCache) -> Check {
        let topo = ctx.mesh.topology();
        for &t in &cache.new_tets {
            let Some(vids) = topo.tet_vertices(t) else {
                return Ok(false);
            };
            for lf in LOCAL_FACES {
                let [a, b, c] = lf.map(|j| vids[j]);
                if topo.face_tets(a, b, c).len() > 2 {
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }
}

/// All elements touched by the edit carry one domain tag.
///
/// A mismatch means the caller handed a multi-domain region to an operation
/// that cannot preserve domain boundaries, so it is reported as an error.
#[derive(Clone, Copy, Debug, Default)]
pub struct UniformTag;

impl Invariant for UniformTag {
    fn name(&self) -> &'static str {
        "uniform_tag"
    }

    fn before(&self, ctx: &InvariantContext<'_>, cache: &mut OperationCache) -> Check {
        let mut tags = cache.old_tets.iter().map(|&t| (t, ctx.mesh.tet(t).tag));
        let Some((first, tag)) = tags.next() else {
            return Ok(true);
        };
        for (t, other) in tags {
            if other != tag {
                return Err(MeshOpsError::ContractViolation {
                    op: cache.kind.name(),
                    detail: format!(
                        "tetrahedra {first} and {t} carry different tags ({tag} vs {other})"
                    ),
                });
            }
        }
        Ok(true)
    }
}

/// Always fails after the edit. Forces a rollback.
#[derive(Clone, Copy, Debug, Default)]
pub struct Reject;

impl Invariant for Reject {
    fn name(&self) -> &'static str {
        "reject"
    }

    fn after(&self, _ctx: &InvariantContext<'_>, _cache: &OperationCache) -> Check {
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapt::config::RemeshConfig;
    use crate::data::mesh::AttributedMesh;
    use crate::geometry::oracles::Oracles;
    use crate::ops::OperationKind;
    use crate::topology::validation::NonManifoldHandling;

    fn two_tets() -> AttributedMesh {
        AttributedMesh::new(
            &[
                [0.0, 0.0, 0.0],
                [1.0, 0.0, 0.0],
                [0.0, 1.0, 0.0],
                [0.0, 0.0, 1.0],
                [1.0, 1.0, 1.0],
            ],
            &[[0, 1, 2, 3], [4, 1, 3, 2]],
            NonManifoldHandling::Error,
        )
        .expect("valid mesh")
    }

    #[test]
    fn energy_rule_strict_and_loose() {
        let m = two_tets();
        let (oracles, config) = (Oracles::default(), RemeshConfig::default());
        let ctx = InvariantContext::new(&m, &oracles, &config);
        let mut cache = OperationCache::new(OperationKind::Swap32);
        cache.old_max_energy = 2.0;
        cache.new_energies = vec![1.0, 2.0];
        assert!(EnergyNonIncrease { strict: false }.after(&ctx, &cache).unwrap());
        assert!(!EnergyNonIncrease { strict: true }.after(&ctx, &cache).unwrap());
        cache.new_energies.push(f64::INFINITY);
        cache.old_max_energy = f64::INFINITY;
        assert!(!EnergyNonIncrease { strict: false }.after(&ctx, &cache).unwrap());
    }

    #[test]
    fn mixed_tags_are_a_contract_violation() {
        let m = two_tets();
        m.set_tet_tags(&[1, 2]);
        let (oracles, config) = (Oracles::default(), RemeshConfig::default());
        let ctx = InvariantContext::new(&m, &oracles, &config);
        let mut cache = OperationCache::new(OperationKind::Swap23);
        cache.old_tets = vec![0, 1];
        let err = UniformTag.before(&ctx, &mut cache).unwrap_err();
        assert!(matches!(err, MeshOpsError::ContractViolation { op: "swap_2_3", .. }));
    }

    #[test]
    fn link_condition_respects_config_toggle() {
        let m = AttributedMesh::new(
            &[
                [0.0, 0.0, 0.0],
                [1.0, 0.0, 0.0],
                [0.0, 1.0, 0.0],
                [0.0, 0.0, 1.0],
            ],
            &[[0, 1, 2, 3]],
            NonManifoldHandling::Error,
        )
        .expect("valid mesh");
        let oracles = Oracles::default();
        let mut config = RemeshConfig::default();
        let mut cache = OperationCache::new(OperationKind::Collapse);
        cache.edge = Some((0, 1));
        {
            let ctx = InvariantContext::new(&m, &oracles, &config);
            assert!(!LinkCondition.before(&ctx, &mut cache).unwrap());
        }
        config.check_link_condition = false;
        let ctx = InvariantContext::new(&m, &oracles, &config);
        assert!(LinkCondition.before(&ctx, &mut cache).unwrap());
    }

    #[test]
    fn reject_always_fails_after() {
        let m = two_tets();
        let (oracles, config) = (Oracles::default(), RemeshConfig::default());
        let ctx = InvariantContext::new(&m, &oracles, &config);
        let mut cache = OperationCache::new(OperationKind::Split);
        assert!(Reject.before(&ctx, &mut cache).unwrap());
        assert!(!Reject.after(&ctx, &cache).unwrap());
    }
}
