//! Topology validation helpers.

use hashbrown::HashMap;

use crate::debug_invariants::DebugInvariants;
use crate::mesh_error::MeshOpsError;
use crate::topology::keys::FaceKey;
use crate::topology::local::LOCAL_FACES;
use crate::topology::tet_mesh::TetMesh;

/// Optional validation toggles for tetrahedral topology checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TopologyValidationOptions {
    /// Cross-check vertex incidence lists against tetrahedron records.
    pub check_incidence: bool,
    /// How to handle faces shared by more than two tetrahedra.
    pub non_manifold: NonManifoldHandling,
}

impl TopologyValidationOptions {
    /// Enable all topology validation checks.
    pub fn all() -> Self {
        Self {
            check_incidence: true,
            non_manifold: NonManifoldHandling::Error,
        }
    }
}

impl Default for TopologyValidationOptions {
    fn default() -> Self {
        Self {
            check_incidence: true,
            non_manifold: NonManifoldHandling::Warn,
        }
    }
}

/// Behavior for non-manifold detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum NonManifoldHandling {
    /// Skip non-manifold detection.
    Ignore,
    /// Log a warning on non-manifold entities.
    Warn,
    /// Return an error on non-manifold entities.
    Error,
}

/// Validate the connectivity store.
pub fn validate_tet_topology(
    mesh: &TetMesh,
    options: TopologyValidationOptions,
) -> Result<(), MeshOpsError> {
    if options.check_incidence {
        mesh.validate_invariants()?;
    }
    validate_non_manifold(mesh, options.non_manifold)
}

/// Detect faces shared by more than two tetrahedra.
fn validate_non_manifold(mesh: &TetMesh, handling: NonManifoldHandling) -> Result<(), MeshOpsError> {
    if handling == NonManifoldHandling::Ignore {
        return Ok(());
    }

    let mut incident: HashMap<FaceKey, usize> = HashMap::new();
    for t in mesh.live_tet_ids() {
        let Some(vids) = mesh.tet_vertices(t) else { continue };
        for lf in LOCAL_FACES {
            *incident
                .entry(FaceKey::from_array(lf.map(|j| vids[j])))
                .or_insert(0) += 1;
        }
    }

    let mut offending: Vec<(FaceKey, usize)> =
        incident.into_iter().filter(|&(_, count)| count > 2).collect();
    offending.sort_unstable();
    for (face, count) in offending {
        match handling {
            NonManifoldHandling::Warn => {
                log::warn!("Non-manifold face detected: face={face:?} incident_tets={count}");
            }
            NonManifoldHandling::Error => {
                return Err(MeshOpsError::NonManifoldFace {
                    face: face.vertices(),
                    count,
                });
            }
            NonManifoldHandling::Ignore => {}
        }
    }

    Ok(())
}

#[cfg(any(
    debug_assertions,
    feature = "strict-invariants",
    feature = "check-invariants"
))]
/// Debug-only topology validation (enabled in strict builds).
pub fn debug_validate_tet_topology(mesh: &TetMesh) -> Result<(), MeshOpsError> {
    validate_tet_topology(mesh, TopologyValidationOptions::all())
}

#[cfg(not(any(
    debug_assertions,
    feature = "strict-invariants",
    feature = "check-invariants"
)))]
/// No-op topology validation for release builds.
pub fn debug_validate_tet_topology(_mesh: &TetMesh) -> Result<(), MeshOpsError> {
    Ok(())
}
