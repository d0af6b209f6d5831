//! Top-level module for tetrahedral mesh topology.
//!
//! This module provides the connectivity store and the navigation handle:
//! - [`TetMesh`]: vertex and tetrahedron slots with free-list reuse and
//!   rollback-capable local editing
//! - [`Tuple`]: the copyable handle with `switch_*` navigation
//! - [`keys`]: canonical keys for the implicit edges and faces
//! - [`link`]: link condition and link-count bookkeeping
//! - [`validation`]: whole-mesh checks
//!
//! Most users will build a [`TetMesh`] through
//! [`AttributedMesh`](crate::data::mesh::AttributedMesh) and navigate it with tuples.

pub mod keys;
pub mod link;
pub mod local;
pub mod slots;
pub mod tet_mesh;
pub mod tuple;
pub mod validation;

pub use keys::{EdgeKey, FaceKey, SimplexKind, SlotKind};
pub use tet_mesh::{ConnectivityEdit, Consolidation, EdgeRing, TetMesh};
pub use tuple::Tuple;
