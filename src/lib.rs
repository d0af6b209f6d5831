#![cfg_attr(docsrs, feature(doc_cfg))]
//! # mesh-localops
//!
//! mesh-localops is a local-operation editing engine for tetrahedral meshes.
//! It improves element quality and conforms a mesh to a target sizing through
//! edge collapses, edge splits, edge/face swaps and vertex smoothing, while
//! keeping the mesh valid, and it runs those edits in parallel over a shared
//! mesh.
//!
//! ## Layout
//! - [`topology`]: the slot-based connectivity store and the [`Tuple`](topology::Tuple)
//!   navigation handle
//! - [`data`]: attribute payloads, journaled attribute stores and the
//!   [`AttributedMesh`](data::mesh::AttributedMesh)
//! - [`geometry`]: tet quality measures and the pluggable oracles
//! - [`invariants`]: composable before/after checks (link condition, link
//!   counts, inversion, energy, envelopes)
//! - [`ops`]: collapse, split, smoothing and the swap family as a
//!   commit-or-rollback state machine
//! - [`scheduler`]: priority worklists, two-ring try-locks and the serial
//!   and partitioned executors
//! - [`partitioning`]: Morton-order vertex partitions
//! - [`adapt`]: the [`Engine`](adapt::Engine) driver and its configuration
//!
//! ## Features
//! - `rayon` (default): partitioned parallel execution
//! - `strict-invariants` / `check-invariants`: keep whole-mesh consistency
//!   checks in release builds
//!
//! ## Determinism
//!
//! Serial passes are deterministic: ties in the worklist are broken by the
//! handle. Partitioned passes are not, but every committed edit satisfies the
//! same invariants as in serial mode.
//!
//! ## Usage
//! ```rust
//! use mesh_localops::prelude::*;
//!
//! let mesh = AttributedMesh::new(
//!     &[[0.0, 0.0, 0.0], [2.0, 0.0, 0.0], [1.0, 0.8, 0.0], [1.0, 0.3, 0.75]],
//!     &[[0, 1, 2, 3]],
//!     NonManifoldHandling::Error,
//! )?;
//! mesh.mark_boundary_as_surface();
//! let engine = Engine::new(mesh, RemeshConfig::default())?;
//! let stats = engine.split_all_edges()?;
//! assert_eq!(stats.succeeded, 1);
//! engine.validate()?;
//! # Ok::<(), MeshOpsError>(())
//! ```

pub mod adapt;
pub mod data;
pub mod debug_invariants;
pub mod geometry;
pub mod invariants;
pub mod mesh_error;
pub mod ops;
pub mod partitioning;
pub mod scheduler;
pub mod topology;

pub use debug_invariants::DebugInvariants;

/// A convenient prelude to import the most-used traits & types:
pub mod prelude {
    pub use crate::adapt::config::RemeshConfig;
    pub use crate::adapt::{AdaptReport, Engine};
    pub use crate::data::attributes::{FaceAttributes, TetAttributes, VertexAttributes};
    pub use crate::data::mesh::{AttributedMesh, MeshExport, MeshSnapshot};
    pub use crate::debug_invariants::DebugInvariants;
    pub use crate::geometry::oracles::{
        BoxEnvelope, EnvelopeOracle, InversionTest, Oracles, QualityOracle,
    };
    pub use crate::invariants::{AndInvariants, Invariant, InvariantContext, OrInvariants};
    pub use crate::mesh_error::MeshOpsError;
    pub use crate::ops::{OpReport, Operation, OperationCache, OperationKind, Outcome, Rejection};
    pub use crate::partitioning::PartitionConfig;
    pub use crate::scheduler::policy::{Freshness, WorkPolicy};
    pub use crate::scheduler::{
        CollapsePolicy, ExecutePass, ExecutionPolicy, PassStats, SplitPolicy, SwapPolicy, WorkItem,
    };
    pub use crate::topology::validation::NonManifoldHandling;
    pub use crate::topology::{EdgeKey, FaceKey, SimplexKind, TetMesh, Tuple};
}
