//! Data module: attribute payloads, stores and the attributed mesh.

pub mod attributes;
pub mod mesh;
pub mod storage;

pub use crate::debug_invariants::DebugInvariants;

pub use attributes::{BboxSides, FaceAttributes, TetAttributes, VertexAttributes};
pub use mesh::{AttributedMesh, MeshExport, MeshSnapshot, MeshTransaction};
pub use storage::{AttributeCollection, AttributeJournal, AttributeKey};
