//! Spatial partitioning of vertices for the parallel executor.
//!
//! Vertices are ordered along a Morton curve over their quantized positions
//! and cut into `n_parts` ranges of equal size. Each worker of a partitioned
//! pass owns the work items whose operand vertex falls in its range.

pub mod morton;

use hashbrown::HashMap;

use crate::data::mesh::AttributedMesh;
use crate::mesh_error::MeshOpsError;
use crate::partitioning::morton::{MAX_BITS, morton_code, quantize};

pub type PartitionId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct PartitionConfig {
    pub n_parts: usize,
    /// Bits per axis of the quantization grid.
    pub quantization: u32,
}

impl Default for PartitionConfig {
    fn default() -> Self {
        Self {
            n_parts: 2,
            quantization: 10,
        }
    }
}

impl PartitionConfig {
    pub fn validate(&self) -> Result<(), MeshOpsError> {
        if self.n_parts == 0 {
            return Err(MeshOpsError::InvalidConfig("n_parts must be at least 1".into()));
        }
        if self.quantization == 0 || self.quantization > MAX_BITS {
            return Err(MeshOpsError::InvalidConfig(format!(
                "quantization must be in 1..={MAX_BITS}, got {}",
                self.quantization
            )));
        }
        Ok(())
    }
}

/// Vertex id to partition id.
#[derive(Debug, Clone, Default)]
pub struct PartitionMap {
    parts: HashMap<usize, PartitionId>,
    n_parts: usize,
}

impl PartitionMap {
    pub fn with_capacity(cap: usize, n_parts: usize) -> Self {
        Self {
            parts: HashMap::with_capacity(cap),
            n_parts,
        }
    }

    pub fn insert(&mut self, v: usize, p: PartitionId) {
        self.parts.insert(v, p);
    }

    pub fn get(&self, v: &usize) -> Option<&PartitionId> {
        self.parts.get(v)
    }

    /// Partition of `v`; vertices created after partitioning fall in part 0.
    pub fn part_of(&self, v: usize) -> PartitionId {
        self.parts.get(&v).copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn n_parts(&self) -> usize {
        self.n_parts
    }

    pub fn iter(&self) -> impl Iterator<Item = (&usize, &PartitionId)> {
        self.parts.iter()
    }

    /// Number of vertices per part.
    pub fn part_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0; self.n_parts];
        for &p in self.parts.values() {
            if let Some(s) = sizes.get_mut(p) {
                *s += 1;
            }
        }
        sizes
    }
}

/// Partition the live vertices of `mesh` along a Morton curve.
pub fn partition_vertices(
    mesh: &AttributedMesh,
    config: &PartitionConfig,
) -> Result<PartitionMap, MeshOpsError> {
    config.validate()?;
    let live = mesh.topology().live_vertex_ids();
    let mut map = PartitionMap::with_capacity(live.len(), config.n_parts);
    let Some((lo, hi)) = mesh.bounding_box() else {
        return Ok(map);
    };

    let mut keyed: Vec<(u64, usize)> = live
        .into_iter()
        .map(|v| {
            let q = quantize(mesh.position(v), lo, hi, config.quantization);
            (morton_code(q), v)
        })
        .collect();
    keyed.sort_unstable();

    let n = keyed.len();
    for (rank, (_, v)) in keyed.into_iter().enumerate() {
        map.insert(v, rank * config.n_parts / n);
    }
    log::debug!(
        "Morton partition of {n} vertices into {} parts: {:?}",
        config.n_parts,
        map.part_sizes()
    );
    Ok(map)
}

/// Record the partition of every vertex in its attributes.
///
/// Setup step, not transactional; run it between passes only.
pub fn assign_partition_ids(mesh: &AttributedMesh, map: &PartitionMap) {
    for (&v, &p) in map.iter() {
        mesh.vertex_attrs().update(v, |a| a.partition_id = p);
    }
}

/// Number of mesh edges whose endpoints lie in different parts.
pub fn edge_cut(mesh: &AttributedMesh, map: &PartitionMap) -> usize {
    mesh.topology()
        .edges()
        .into_iter()
        .filter(|e| {
            let [a, b] = e.vertices();
            map.part_of(a) != map.part_of(b)
        })
        .count()
}
