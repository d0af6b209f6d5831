//! Geometric collaborators consulted by invariants and work policies.
//!
//! The engine never evaluates geometry on its own: it asks a
//! [`QualityOracle`] for element energies, an [`InversionTest`] for
//! orientation and an [`EnvelopeOracle`] for containment. The defaults here
//! are enough for meshes without an input surface to track.

use std::sync::Arc;

use crate::data::mesh::AttributedMesh;
use crate::geometry::quality::{amips_energy, edge_ratio, is_inverted};

/// Energy of a tetrahedron; lower is better. Must be deterministic.
pub trait QualityOracle: Send + Sync {
    fn tet_energy(&self, corners: &[[f64; 3]; 4]) -> f64;
}

/// Pure orientation predicate over corner positions.
pub trait InversionTest: Send + Sync {
    fn is_inverted(&self, corners: &[[f64; 3]; 4]) -> bool;
}

/// Containment test for tracked geometry.
pub trait EnvelopeOracle: Send + Sync {
    fn is_outside_point(&self, p: [f64; 3]) -> bool;

    fn is_outside_triangle(&self, tri: [[f64; 3]; 3]) -> bool {
        tri.into_iter().any(|p| self.is_outside_point(p))
    }
}

/// Tetrahedral AMIPS energy.
#[derive(Clone, Copy, Debug, Default)]
pub struct AmipsEnergy;

impl QualityOracle for AmipsEnergy {
    fn tet_energy(&self, corners: &[[f64; 3]; 4]) -> f64 {
        amips_energy(corners)
    }
}

/// Longest-over-shortest edge ratio; inverted elements score `+inf`.
#[derive(Clone, Copy, Debug, Default)]
pub struct AspectRatio;

impl QualityOracle for AspectRatio {
    fn tet_energy(&self, corners: &[[f64; 3]; 4]) -> f64 {
        if is_inverted(corners) {
            f64::INFINITY
        } else {
            edge_ratio(corners)
        }
    }
}

/// Signed-volume orientation test.
#[derive(Clone, Copy, Debug, Default)]
pub struct OrientationTest;

impl InversionTest for OrientationTest {
    fn is_inverted(&self, corners: &[[f64; 3]; 4]) -> bool {
        is_inverted(corners)
    }
}

/// Envelope that contains everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoEnvelope;

impl EnvelopeOracle for NoEnvelope {
    fn is_outside_point(&self, _p: [f64; 3]) -> bool {
        false
    }

    fn is_outside_triangle(&self, _tri: [[f64; 3]; 3]) -> bool {
        false
    }
}

/// Axis-aligned box grown by `tol` on every side.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoxEnvelope {
    pub lo: [f64; 3],
    pub hi: [f64; 3],
    pub tol: f64,
}

impl BoxEnvelope {
    pub fn new(lo: [f64; 3], hi: [f64; 3], tol: f64) -> Self {
        Self { lo, hi, tol }
    }

    /// Box around the current vertices of `mesh`.
    pub fn around(mesh: &AttributedMesh, tol: f64) -> Self {
        let (lo, hi) = mesh.bounding_box().unwrap_or(([0.0; 3], [0.0; 3]));
        Self { lo, hi, tol }
    }
}

impl EnvelopeOracle for BoxEnvelope {
    fn is_outside_point(&self, p: [f64; 3]) -> bool {
        (0..3).any(|k| p[k] < self.lo[k] - self.tol || p[k] > self.hi[k] + self.tol)
    }
}

/// The collaborator set handed to every operation attempt.
#[derive(Clone)]
pub struct Oracles {
    pub quality: Arc<dyn QualityOracle>,
    pub inversion: Arc<dyn InversionTest>,
    /// Envelope of the tracked surface.
    pub surface_envelope: Arc<dyn EnvelopeOracle>,
    /// Envelope of open-boundary curves.
    pub open_boundary_envelope: Arc<dyn EnvelopeOracle>,
}

impl Default for Oracles {
    fn default() -> Self {
        Self {
            quality: Arc::new(AmipsEnergy),
            inversion: Arc::new(OrientationTest),
            surface_envelope: Arc::new(NoEnvelope),
            open_boundary_envelope: Arc::new(NoEnvelope),
        }
    }
}

impl std::fmt::Debug for Oracles {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Oracles").finish_non_exhaustive()
    }
}

impl Oracles {
    pub fn with_quality(mut self, quality: impl QualityOracle + 'static) -> Self {
        self.quality = Arc::new(quality);
        self
    }

    pub fn with_surface_envelope(mut self, envelope: impl EnvelopeOracle + 'static) -> Self {
        self.surface_envelope = Arc::new(envelope);
        self
    }

    pub fn with_open_boundary_envelope(mut self, envelope: impl EnvelopeOracle + 'static) -> Self {
        self.open_boundary_envelope = Arc::new(envelope);
        self
    }

    /// Energy of the tetrahedron `vids`, `+inf` when inverted.
    pub fn energy_of(&self, mesh: &AttributedMesh, vids: [usize; 4]) -> f64 {
        self.energy_at(&mesh.corners(vids))
    }

    /// Energy of a tetrahedron given by corner positions, `+inf` when inverted.
    pub fn energy_at(&self, corners: &[[f64; 3]; 4]) -> f64 {
        if self.inversion.is_inverted(corners) {
            f64::INFINITY
        } else {
            self.quality.tet_energy(corners)
        }
    }

    pub fn is_inverted(&self, mesh: &AttributedMesh, vids: [usize; 4]) -> bool {
        self.inversion.is_inverted(&mesh.corners(vids))
    }
}
