//! MeshOpsError: Unified error type for mesh-localops public APIs
//!
//! Only *fatal* situations are errors. Rejected candidates, rolled-back
//! attempts, stale worklist items and lock contention are ordinary outcomes
//! reported through [`crate::ops::Outcome`] and [`crate::scheduler::PassStats`].

use thiserror::Error;

/// Unified error type for mesh-localops operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MeshOpsError {
    /// A tetrahedron references a vertex slot that does not exist.
    #[error("tetrahedron {tet} references vertex {vertex}, but only {n_vertices} vertices exist")]
    VertexOutOfRange {
        tet: usize,
        vertex: usize,
        n_vertices: usize,
    },
    /// A tetrahedron repeats one of its vertices.
    #[error("tetrahedron {0} is degenerate: repeated vertex id")]
    DegenerateTet(usize),
    /// Two tetrahedra share the same vertex set.
    #[error("tetrahedra {0} and {1} have the same vertex set")]
    DuplicateTet(usize, usize),
    /// A face is shared by more than two tetrahedra.
    #[error("non-manifold face {face:?} is shared by {count} tetrahedra")]
    NonManifoldFace { face: [usize; 3], count: usize },
    /// A handle no longer refers to a live simplex.
    #[error("stale handle: {0}")]
    StaleHandle(String),
    /// An attribute store is out of step with the connectivity it describes.
    #[error("attribute store `{store}` has no entry for slot {slot}")]
    MissingAttribute { store: &'static str, slot: usize },
    /// Configuration rejected at engine setup.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// A structural assumption of an operation does not hold. Continuing could
    /// corrupt the mesh, so the scheduler stops.
    #[error("contract violation in {op}: {detail}")]
    ContractViolation { op: &'static str, detail: String },
    /// A mesh-wide consistency check failed.
    #[error("mesh invariant violated: {0}")]
    InvariantViolation(String),
}
