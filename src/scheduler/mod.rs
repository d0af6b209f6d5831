//! Worklist execution: serial and partitioned-parallel passes.
//!
//! A pass drains a priority queue of [`WorkItem`]s. Each popped item is
//! checked for freshness, attempted through its [`Operation`], and on success
//! the policy renews candidates around the edit. Failed items are collected
//! for the next pass; [`ExecutePass::run_to_fixed_point`] repeats passes
//! while the previous one committed anything.
//!
//! In partitioned mode every worker owns the items of one spatial partition
//! and must hold the two-ring locks of an operand before attempting it.

pub mod locks;
#[cfg(feature = "rayon")]
mod parallel;
pub mod policy;

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};

use itertools::Itertools;

use crate::adapt::config::RemeshConfig;
use crate::data::mesh::AttributedMesh;
use crate::geometry::oracles::Oracles;
use crate::invariants::InvariantContext;
use crate::mesh_error::MeshOpsError;
use crate::ops::{Operation, OperationCache, OperationKind, Outcome, Rejection};
use crate::partitioning::PartitionConfig;
use crate::scheduler::locks::RingLocks;
use crate::scheduler::policy::{Freshness, WorkPolicy, prioritize};
use crate::topology::Tuple;

pub use locks::RegionGuard;
pub use policy::{CollapsePolicy, SplitPolicy, SwapPolicy};

/// One queued operation attempt.
#[derive(Copy, Clone, Debug)]
pub struct WorkItem {
    pub kind: OperationKind,
    pub tuple: Tuple,
    pub priority: f64,
}

impl PartialEq for WorkItem {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for WorkItem {}

impl PartialOrd for WorkItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for WorkItem {
    /// Higher priority first; on ties the smaller tuple pops first.
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .total_cmp(&other.priority)
            .then_with(|| other.tuple.cmp(&self.tuple))
            .then_with(|| other.kind.cmp(&self.kind))
    }
}

/// How a pass is executed.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum ExecutionPolicy {
    #[default]
    Serial,
    /// One worker per spatial partition, with two-ring locking.
    Partitioned { threads: usize },
}

impl ExecutionPolicy {
    /// `0` threads means serial.
    pub fn from_threads(threads: usize) -> Self {
        match threads {
            0 => ExecutionPolicy::Serial,
            threads => ExecutionPolicy::Partitioned { threads },
        }
    }
}

/// Counters of one or more passes.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct PassStats {
    pub attempted: usize,
    pub succeeded: usize,
    pub precondition_rejections: usize,
    pub rollbacks: usize,
    pub stale: usize,
    pub requeued: usize,
    pub lock_contention: usize,
    pub passes: usize,
}

impl PassStats {
    /// Attempts that will be retried: rejections, rollbacks and contention.
    pub fn failures(&self) -> usize {
        self.precondition_rejections + self.rollbacks + self.lock_contention
    }
}

impl std::ops::AddAssign for PassStats {
    fn add_assign(&mut self, rhs: Self) {
        self.attempted += rhs.attempted;
        self.succeeded += rhs.succeeded;
        self.precondition_rejections += rhs.precondition_rejections;
        self.rollbacks += rhs.rollbacks;
        self.stale += rhs.stale;
        self.requeued += rhs.requeued;
        self.lock_contention += rhs.lock_contention;
        self.passes += rhs.passes;
    }
}

/// Result of draining one queue.
#[derive(Debug, Default)]
pub(crate) struct PassOutput {
    pub stats: PassStats,
    pub retry: Vec<WorkItem>,
    pub stopped: bool,
}

impl PassOutput {
    pub(crate) fn merge(mut self, other: PassOutput) -> Self {
        self.stats += other.stats;
        self.retry.extend(other.retry);
        self.stopped |= other.stopped;
        self
    }
}

/// Executes passes of one policy over a shared mesh.
pub struct ExecutePass<'a> {
    mesh: &'a AttributedMesh,
    oracles: &'a Oracles,
    config: &'a RemeshConfig,
    policy: &'a dyn WorkPolicy,
    operations: Vec<Operation>,
    execution: ExecutionPolicy,
    partition: PartitionConfig,
}

impl<'a> ExecutePass<'a> {
    pub fn new(
        mesh: &'a AttributedMesh,
        oracles: &'a Oracles,
        config: &'a RemeshConfig,
        policy: &'a dyn WorkPolicy,
    ) -> Self {
        Self {
            mesh,
            oracles,
            config,
            policy,
            operations: OperationKind::ALL.into_iter().map(Operation::new).collect(),
            execution: ExecutionPolicy::from_threads(config.num_threads),
            partition: PartitionConfig::default(),
        }
    }

    /// Replace the operation used for `operation.kind()`.
    pub fn with_operation(mut self, operation: Operation) -> Self {
        match self
            .operations
            .iter_mut()
            .find(|o| o.kind() == operation.kind())
        {
            Some(slot) => *slot = operation,
            None => self.operations.push(operation),
        }
        self
    }

    pub fn with_execution(mut self, execution: ExecutionPolicy) -> Self {
        self.execution = execution;
        self
    }

    pub fn with_partition(mut self, partition: PartitionConfig) -> Self {
        self.partition = partition;
        self
    }

    pub fn context(&self) -> InvariantContext<'a> {
        InvariantContext::new(self.mesh, self.oracles, self.config)
    }

    pub(crate) fn operation(&self, kind: OperationKind) -> Result<&Operation, MeshOpsError> {
        self.operations
            .iter()
            .find(|o| o.kind() == kind)
            .ok_or_else(|| MeshOpsError::InvalidConfig(format!("no operation registered for {kind}")))
    }

    /// Prioritized initial worklist of the policy.
    pub fn initial_items(&self) -> Vec<WorkItem> {
        let ctx = self.context();
        prioritize(self.policy, &ctx, self.policy.initial(&ctx))
    }

    /// Run a single pass over `items`.
    pub fn run(&self, items: Vec<WorkItem>) -> Result<PassStats, MeshOpsError> {
        Ok(self.pass(items)?.stats)
    }

    /// Repeat passes over the failed items while the previous pass committed
    /// something, at most `max_passes` times.
    pub fn run_to_fixed_point(&self, items: Vec<WorkItem>) -> Result<PassStats, MeshOpsError> {
        let mut total = PassStats::default();
        let mut pending = items;
        while total.passes < self.config.max_passes {
            let out = self.pass(pending)?;
            total += out.stats;
            if out.stopped || out.stats.succeeded == 0 || out.retry.is_empty() {
                break;
            }
            pending = out.retry;
        }
        log::info!(
            "fixed point after {} passes: {} committed, {} attempted, {} stale",
            total.passes,
            total.succeeded,
            total.attempted,
            total.stale
        );
        Ok(total)
    }

    fn pass(&self, items: Vec<WorkItem>) -> Result<PassOutput, MeshOpsError> {
        let n_items = items.len();
        let mut out = match self.execution {
            ExecutionPolicy::Serial => self.worker(0, None, &AtomicBool::new(false)).drain(items)?,
            ExecutionPolicy::Partitioned { threads } => self.partitioned(items, threads)?,
        };
        out.stats.passes = 1;
        out.retry = out
            .retry
            .into_iter()
            .unique_by(|i| (i.kind, i.tuple))
            .collect();
        log::info!(
            "pass over {n_items} items: {} attempted, {} committed, {} failed, {} retries queued",
            out.stats.attempted,
            out.stats.succeeded,
            out.stats.failures(),
            out.retry.len()
        );
        Ok(out)
    }

    #[cfg(feature = "rayon")]
    fn partitioned(&self, items: Vec<WorkItem>, threads: usize) -> Result<PassOutput, MeshOpsError> {
        parallel::run_partitioned(self, items, threads)
    }

    #[cfg(not(feature = "rayon"))]
    fn partitioned(&self, items: Vec<WorkItem>, threads: usize) -> Result<PassOutput, MeshOpsError> {
        log::warn!("partitioned execution on {threads} threads needs the `rayon` feature; running serially");
        self.worker(0, None, &AtomicBool::new(false)).drain(items)
    }

    pub(crate) fn worker<'p>(
        &'p self,
        owner: usize,
        locks: Option<&'p RingLocks>,
        stop: &'p AtomicBool,
    ) -> Worker<'p, 'a> {
        Worker {
            pass: self,
            owner,
            locks,
            stop,
        }
    }
}

/// One queue drained by one thread.
pub(crate) struct Worker<'p, 'a> {
    pass: &'p ExecutePass<'a>,
    owner: usize,
    locks: Option<&'p RingLocks>,
    stop: &'p AtomicBool,
}

impl Worker<'_, '_> {
    pub(crate) fn drain(&self, items: Vec<WorkItem>) -> Result<PassOutput, MeshOpsError> {
        let ctx = self.pass.context();
        let policy = self.pass.policy;
        let topo = ctx.mesh.topology();
        let interval = self.pass.config.stop_check_interval.max(1);
        let mut heap: BinaryHeap<WorkItem> = items.into();
        let mut out = PassOutput::default();

        while let Some(item) = heap.pop() {
            if self.stop.load(AtomicOrdering::Acquire) {
                break;
            }
            match policy.freshness(&ctx, &item) {
                Freshness::Fresh => {}
                Freshness::Drop => {
                    out.stats.stale += 1;
                    continue;
                }
                Freshness::Requeue(priority) => {
                    out.stats.requeued += 1;
                    heap.push(WorkItem { priority, ..item });
                    continue;
                }
            }
            let Some(seeds) = item.kind.operand_vertices(topo, &item.tuple) else {
                out.stats.stale += 1;
                continue;
            };
            let _region = match self.locks {
                Some(locks) => match locks.try_lock_region(topo, self.owner, &seeds) {
                    Some(guard) => Some(guard),
                    None => {
                        out.stats.lock_contention += 1;
                        out.retry.push(item);
                        continue;
                    }
                },
                None => None,
            };

            out.stats.attempted += 1;
            let operation = self.pass.operation(item.kind)?;
            match operation.attempt(&ctx, item.tuple, OperationCache::new(item.kind))? {
                Outcome::Committed(report) => {
                    out.stats.succeeded += 1;
                    heap.extend(prioritize(policy, &ctx, policy.renew(&ctx, &report)));
                    if out.stats.succeeded % interval == 0 && policy.should_stop(&ctx) {
                        log::info!("worker {}: stop requested by policy", self.owner);
                        self.stop.store(true, AtomicOrdering::Release);
                        out.stopped = true;
                        break;
                    }
                }
                Outcome::Rejected(Rejection::Stale) => out.stats.stale += 1,
                Outcome::Rejected(Rejection::Precondition(reason)) => {
                    log::debug!("[{}] {:?} rejected: {reason}", item.kind, item.tuple);
                    out.stats.precondition_rejections += 1;
                    out.retry.push(item);
                }
                Outcome::Rejected(Rejection::Rollback(reason)) => {
                    log::debug!("[{}] {:?} rolled back: {reason}", item.kind, item.tuple);
                    out.stats.rollbacks += 1;
                    out.retry.push(item);
                }
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::validation::NonManifoldHandling;

    fn single_tet() -> AttributedMesh {
        AttributedMesh::new(
            &[
                [0.0, 0.0, 0.0],
                [1.0, 0.0, 0.0],
                [0.0, 1.0, 0.0],
                [0.0, 0.0, 1.0],
            ],
            &[[0, 1, 2, 3]],
            NonManifoldHandling::Error,
        )
        .unwrap()
    }

    #[test]
    fn heap_pops_highest_priority_then_smallest_tuple() {
        let m = single_tet();
        let t0 = m.topology().tuple_from_vertices(0, 1).unwrap();
        let t1 = m.topology().tuple_from_vertices(2, 3).unwrap();
        let mut heap = BinaryHeap::new();
        for (tuple, priority) in [(t1, 1.0), (t0, 1.0), (t0, 5.0)] {
            heap.push(WorkItem {
                kind: OperationKind::Split,
                tuple,
                priority,
            });
        }
        let order: Vec<_> = std::iter::from_fn(|| heap.pop())
            .map(|i| (i.priority, i.tuple))
            .collect();
        let (lo, hi) = if t0 < t1 { (t0, t1) } else { (t1, t0) };
        assert_eq!(order, vec![(5.0, t0), (1.0, lo), (1.0, hi)]);
    }

    #[test]
    fn single_tet_collapse_converges_in_one_pass() {
        let m = single_tet();
        let before = m.snapshot();
        let oracles = Oracles::default();
        let config = RemeshConfig {
            target_edge_length: 10.0,
            ..RemeshConfig::default()
        };
        let policy = CollapsePolicy;
        let pass = ExecutePass::new(&m, &oracles, &config, &policy);
        let items = pass.initial_items();
        assert_eq!(items.len(), 6);
        let stats = pass.run_to_fixed_point(items).unwrap();
        assert_eq!(stats.passes, 1);
        assert_eq!(stats.succeeded, 0);
        assert_eq!(stats.attempted, 6);
        assert_eq!(m.snapshot(), before);
    }

    #[test]
    fn from_threads_maps_zero_to_serial() {
        assert_eq!(ExecutionPolicy::from_threads(0), ExecutionPolicy::Serial);
        assert_eq!(
            ExecutionPolicy::from_threads(3),
            ExecutionPolicy::Partitioned { threads: 3 }
        );
    }
}
