//! Remeshing driver tying the mesh, the oracles and the scheduler together.
//!
//! [`Engine`] owns an [`AttributedMesh`] and exposes one entry point per
//! pass kind. Each pass builds its initial worklist from a [`WorkPolicy`],
//! runs it to a fixed point and reports the counters.

pub mod config;

use std::sync::Arc;

use crate::adapt::config::RemeshConfig;
use crate::data::mesh::{AttributedMesh, MeshExport};
use crate::debug_invariants::DebugInvariants;
use crate::geometry::oracles::Oracles;
use crate::geometry::quality::validate_tet_geometry;
use crate::invariants::Invariant;
use crate::mesh_error::MeshOpsError;
use crate::ops::{Operation, OperationKind};
use crate::partitioning::PartitionConfig;
use crate::scheduler::policy::{CollapsePolicy, SmoothPolicy, SplitPolicy, SwapPolicy, WorkPolicy};
use crate::scheduler::{ExecutePass, ExecutionPolicy, PassStats, WorkItem};
use crate::topology::validation::{TopologyValidationOptions, validate_tet_topology};

/// Counters of one [`Engine::adapt`] cycle.
#[derive(Clone, Copy, Debug, Default, serde::Serialize)]
pub struct AdaptReport {
    pub split: PassStats,
    pub collapse: PassStats,
    pub swap: PassStats,
    pub smooth: PassStats,
    /// Worst tet energy before the cycle.
    pub energy_before: f64,
    /// Worst tet energy after the cycle.
    pub energy_after: f64,
}

/// Local-operation remeshing engine.
pub struct Engine {
    mesh: AttributedMesh,
    config: RemeshConfig,
    oracles: Oracles,
    extra: Vec<(OperationKind, Arc<dyn Invariant>)>,
    execution: ExecutionPolicy,
    partition: PartitionConfig,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("n_tets", &self.mesh.topology().n_tets())
            .field("config", &self.config)
            .field("execution", &self.execution)
            .field(
                "extra",
                &self.extra.iter().map(|(k, i)| (*k, i.name())).collect::<Vec<_>>(),
            )
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Validate `config` and take ownership of `mesh`.
    pub fn new(mesh: AttributedMesh, config: RemeshConfig) -> Result<Self, MeshOpsError> {
        config.validate()?;
        let execution = ExecutionPolicy::from_threads(config.num_threads);
        Ok(Self {
            mesh,
            config,
            oracles: Oracles::default(),
            extra: Vec::new(),
            execution,
            partition: PartitionConfig::default(),
        })
    }

    pub fn with_oracles(mut self, oracles: Oracles) -> Self {
        self.oracles = oracles;
        self
    }

    /// Override the execution policy derived from `num_threads`.
    pub fn with_execution(mut self, execution: ExecutionPolicy) -> Self {
        self.execution = execution;
        self
    }

    pub fn with_partition(mut self, partition: PartitionConfig) -> Result<Self, MeshOpsError> {
        partition.validate()?;
        self.partition = partition;
        Ok(self)
    }

    /// Append an invariant to the default set of one operation kind.
    pub fn with_extra_invariant(mut self, kind: OperationKind, invariant: Arc<dyn Invariant>) -> Self {
        self.extra.push((kind, invariant));
        self
    }

    pub fn mesh(&self) -> &AttributedMesh {
        &self.mesh
    }

    pub fn into_mesh(self) -> AttributedMesh {
        self.mesh
    }

    pub fn config(&self) -> &RemeshConfig {
        &self.config
    }

    pub fn oracles(&self) -> &Oracles {
        &self.oracles
    }

    /// Operation of `kind` with the default invariants and the user's extras.
    pub fn operation(&self, kind: OperationKind) -> Operation {
        self.extra
            .iter()
            .filter(|(k, _)| *k == kind)
            .fold(Operation::new(kind), |op, (_, inv)| op.with_extra(Arc::clone(inv)))
    }

    fn pass<'a>(&'a self, policy: &'a dyn WorkPolicy) -> ExecutePass<'a> {
        OperationKind::ALL.into_iter().fold(
            ExecutePass::new(&self.mesh, &self.oracles, &self.config, policy)
                .with_execution(self.execution)
                .with_partition(self.partition),
            |pass, kind| pass.with_operation(self.operation(kind)),
        )
    }

    /// Run `policy` from its initial worklist to a fixed point.
    pub fn run_policy(&self, label: &str, policy: &dyn WorkPolicy) -> Result<PassStats, MeshOpsError> {
        let pass = self.pass(policy);
        let items = pass.initial_items();
        log::info!("{label}: {} initial candidates", items.len());
        let stats = pass.run_to_fixed_point(items)?;
        log::info!(
            "{label}: {} committed over {} passes, {} tets remain",
            stats.succeeded,
            stats.passes,
            self.mesh.topology().n_tets()
        );
        self.mesh.debug_assert_invariants();
        Ok(stats)
    }

    /// Collapse edges shorter than the collapse bound, shortest first.
    pub fn collapse_all_edges(&self) -> Result<PassStats, MeshOpsError> {
        self.run_policy("collapse", &CollapsePolicy)
    }

    /// Split edges longer than the split bound, longest first.
    pub fn split_all_edges(&self) -> Result<PassStats, MeshOpsError> {
        self.run_policy("split", &SplitPolicy)
    }

    /// Run every swap kind, worst element first.
    pub fn swap_all(&self) -> Result<PassStats, MeshOpsError> {
        self.recompute_qualities();
        self.run_policy("swap", &SwapPolicy::default())
    }

    /// Move every free vertex towards a better spot in its star, worst star first.
    pub fn smooth_all_vertices(&self) -> Result<PassStats, MeshOpsError> {
        self.recompute_qualities();
        self.run_policy("smooth", &SmoothPolicy)
    }

    /// Prioritized candidates `kind` would start from on the current mesh.
    pub fn edge_candidates(&self, kind: OperationKind) -> Vec<WorkItem> {
        match kind {
            OperationKind::Collapse => self.pass(&CollapsePolicy).initial_items(),
            OperationKind::Split => self.pass(&SplitPolicy).initial_items(),
            OperationKind::Smooth => self.pass(&SmoothPolicy).initial_items(),
            swap => self.pass(&SwapPolicy::only(swap)).initial_items(),
        }
    }

    /// Store the current energy of every live tet in its `quality` attribute.
    ///
    /// Not transactional; call between passes only.
    pub fn recompute_qualities(&self) {
        let topo = self.mesh.topology();
        for t in topo.live_tet_ids() {
            let Some(vids) = topo.tet_vertices(t) else { continue };
            let energy = self.oracles.energy_of(&self.mesh, vids);
            self.mesh.tet_attrs().update(t, |a| a.quality = energy);
        }
    }

    /// Largest energy over the live tets; `0.0` for an empty mesh.
    pub fn max_energy(&self) -> f64 {
        let topo = self.mesh.topology();
        topo.live_tet_ids()
            .into_iter()
            .filter_map(|t| topo.tet_vertices(t))
            .map(|vids| self.oracles.energy_of(&self.mesh, vids))
            .fold(0.0, f64::max)
    }

    /// Whole-mesh check: connectivity, attribute stores and tet orientation.
    pub fn validate(&self) -> Result<(), MeshOpsError> {
        validate_tet_topology(
            self.mesh.topology(),
            TopologyValidationOptions {
                check_incidence: true,
                non_manifold: self.config.non_manifold,
            },
        )?;
        self.mesh.validate_invariants()?;
        for t in self.mesh.topology().live_tet_ids() {
            let Some(corners) = self.mesh.tet_corners(t) else { continue };
            validate_tet_geometry(t, &corners)?;
        }
        Ok(())
    }

    /// One split, collapse, swap and smooth cycle, followed by compaction.
    pub fn adapt(&mut self) -> Result<AdaptReport, MeshOpsError> {
        let energy_before = self.max_energy();
        let split = self.split_all_edges()?;
        let collapse = self.collapse_all_edges()?;
        let swap = self.swap_all()?;
        let smooth = self.smooth_all_vertices()?;
        self.mesh.consolidate();
        let report = AdaptReport {
            split,
            collapse,
            swap,
            smooth,
            energy_before,
            energy_after: self.max_energy(),
        };
        log::info!(
            "adapt cycle: max energy {:.4} -> {:.4}",
            report.energy_before,
            report.energy_after
        );
        Ok(report)
    }

    /// Compacted copy of the mesh for external writers.
    pub fn export(&self) -> MeshExport {
        self.mesh.export()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invariants::builtin::Reject;
    use crate::topology::validation::NonManifoldHandling;

    fn long_tet() -> AttributedMesh {
        let m = AttributedMesh::new(
            &[
                [0.0, 0.0, 0.0],
                [2.0, 0.0, 0.0],
                [1.0, 0.8, 0.0],
                [1.0, 0.3, 0.75],
            ],
            &[[0, 1, 2, 3]],
            NonManifoldHandling::Error,
        )
        .unwrap();
        m.mark_boundary_as_surface();
        m
    }

    #[test]
    fn rejects_invalid_config() {
        let cfg = RemeshConfig {
            max_passes: 0,
            ..RemeshConfig::default()
        };
        assert!(matches!(
            Engine::new(long_tet(), cfg),
            Err(MeshOpsError::InvalidConfig(_))
        ));
    }

    #[test]
    fn split_pass_shortens_the_long_edge() {
        let engine = Engine::new(long_tet(), RemeshConfig::default()).unwrap();
        assert_eq!(engine.edge_candidates(OperationKind::Split).len(), 1);
        let stats = engine.split_all_edges().unwrap();
        assert_eq!(stats.succeeded, 1);
        assert_eq!(engine.mesh().topology().n_tets(), 2);
        assert!(engine.edge_candidates(OperationKind::Split).is_empty());
        engine.validate().unwrap();
    }

    #[test]
    fn extra_invariant_blocks_every_commit() {
        let engine = Engine::new(long_tet(), RemeshConfig::default())
            .unwrap()
            .with_extra_invariant(OperationKind::Split, Arc::new(Reject));
        let before = engine.mesh().snapshot();
        let stats = engine.split_all_edges().unwrap();
        assert_eq!(stats.succeeded, 0);
        assert_eq!(stats.rollbacks, 1);
        assert_eq!(engine.mesh().snapshot(), before);
    }

    #[test]
    fn qualities_follow_the_oracle() {
        let engine = Engine::new(long_tet(), RemeshConfig::default()).unwrap();
        engine.recompute_qualities();
        let t = engine.mesh().topology().live_tet_ids()[0];
        assert_eq!(engine.mesh().tet(t).quality, engine.max_energy());
        assert!(engine.max_energy() >= 1.0);
    }
}
