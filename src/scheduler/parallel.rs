//! Partitioned execution on a rayon pool.

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use rayon::prelude::*;

use crate::mesh_error::MeshOpsError;
use crate::partitioning::{PartitionConfig, assign_partition_ids, partition_vertices};
use crate::scheduler::locks::RingLocks;
use crate::scheduler::{ExecutePass, PassOutput, WorkItem};

/// Bucket `items` by the partition of their operand vertex and drain one
/// bucket per worker.
pub(crate) fn run_partitioned(
    pass: &ExecutePass<'_>,
    items: Vec<WorkItem>,
    threads: usize,
) -> Result<PassOutput, MeshOpsError> {
    let threads = threads.max(1);
    let cfg = PartitionConfig {
        n_parts: threads,
        ..pass.partition
    };
    let map = partition_vertices(pass.mesh, &cfg)?;
    assign_partition_ids(pass.mesh, &map);

    let mut buckets: Vec<Vec<WorkItem>> = vec![Vec::new(); threads];
    for item in items {
        let part = map.part_of(item.tuple.vid()).min(threads - 1);
        buckets[part].push(item);
    }
    log::debug!(
        "partitioned pass: {} workers, queue sizes {:?}",
        threads,
        buckets.iter().map(Vec::len).collect::<Vec<_>>()
    );

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .map_err(|e| MeshOpsError::InvalidConfig(format!("cannot build worker pool: {e}")))?;

    let locks = RingLocks::new();
    let stop = AtomicBool::new(false);
    let fatal: Mutex<Option<MeshOpsError>> = Mutex::new(None);

    let outputs: Vec<PassOutput> = pool.install(|| {
        buckets
            .into_par_iter()
            .enumerate()
            .map(|(owner, queue)| match pass.worker(owner, Some(&locks), &stop).drain(queue) {
                Ok(out) => out,
                Err(e) => {
                    stop.store(true, Ordering::Release);
                    let mut slot = fatal.lock();
                    if slot.is_none() {
                        *slot = Some(e);
                    }
                    PassOutput::default()
                }
            })
            .collect()
    });

    if let Some(e) = fatal.into_inner() {
        return Err(e);
    }
    debug_assert!(locks.is_empty(), "worker leaked vertex locks");
    Ok(outputs.into_iter().fold(PassOutput::default(), PassOutput::merge))
}
