//! Geometry utilities for mesh-localops.
//!
//! This module provides tetrahedron quality measures and the default
//! geometric collaborators (energy, inversion, envelope) used by invariants.

pub mod oracles;
pub mod quality;

pub use oracles::{
    AmipsEnergy, AspectRatio, BoxEnvelope, EnvelopeOracle, InversionTest, NoEnvelope, Oracles,
    OrientationTest, QualityOracle,
};
