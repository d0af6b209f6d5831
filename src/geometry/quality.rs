//! Tetrahedron quality utilities over explicit corner positions.
//!
//! # Orientation
//! A tetrahedron `[p0, p1, p2, p3]` is positively oriented when
//! `(p1 - p0) · ((p2 - p0) × (p3 - p0)) > 0`. Every routine here assumes the
//! vertex order of the connectivity store, which all committed edits keep
//! positive.
//!
//! # Examples
//! ```rust
//! use mesh_localops::geometry::quality::{amips_energy, signed_volume, tet_quality};
//!
//! let p = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];
//! assert!(signed_volume(p[0], p[1], p[2], p[3]) > 0.0);
//! assert!(amips_energy(&p) > 1.0);
//!
//! let q = tet_quality(&p)?;
//! assert!((q.aspect_ratio - 2f64.sqrt()).abs() < 1e-12);
//! # Ok::<(), mesh_localops::mesh_error::MeshOpsError>(())
//! ```

use std::f64::consts::PI;

use crate::mesh_error::MeshOpsError;
use crate::topology::local::{LOCAL_EDGES, LOCAL_FACES};

/// Volumes at or below this are treated as degenerate.
pub const EPS: f64 = 1e-12;

/// Basic quality metrics for a single tetrahedron.
#[derive(Clone, Copy, Debug)]
pub struct TetQuality {
    /// Ratio of the longest edge length to the shortest edge length.
    pub aspect_ratio: f64,
    /// Minimum corner angle (degrees) across all faces.
    pub min_angle_deg: f64,
    /// Signed volume. Negative values indicate inverted orientation; zero
    /// indicates degenerate geometry.
    pub signed_volume: f64,
}

/// Compute quality metrics from corner positions.
///
/// Returns an error on a zero-length edge.
pub fn tet_quality(corners: &[[f64; 3]; 4]) -> Result<TetQuality, MeshOpsError> {
    Ok(TetQuality {
        aspect_ratio: aspect_ratio(corners)?,
        min_angle_deg: min_angle(corners)?,
        signed_volume: signed_volume(corners[0], corners[1], corners[2], corners[3]),
    })
}

/// Validate that a tetrahedron is neither inverted nor degenerate.
pub fn validate_tet_geometry(
    tet: usize,
    corners: &[[f64; 3]; 4],
) -> Result<TetQuality, MeshOpsError> {
    let quality = tet_quality(corners).map_err(|e| {
        MeshOpsError::InvariantViolation(format!("tetrahedron {tet}: {e}"))
    })?;
    if !quality.signed_volume.is_finite() || quality.signed_volume <= EPS {
        return Err(MeshOpsError::InvariantViolation(format!(
            "tetrahedron {tet} is inverted or degenerate: volume = {}",
            quality.signed_volume
        )));
    }
    Ok(quality)
}

/// Whether the tetrahedron has non-positive volume.
#[inline]
pub fn is_inverted(corners: &[[f64; 3]; 4]) -> bool {
    signed_volume(corners[0], corners[1], corners[2], corners[3]) <= EPS
}

/// AMIPS conformal energy against the regular tetrahedron.
///
/// Equals 1 for a regular tetrahedron of any size, grows with distortion and
/// is `+inf` for degenerate or inverted elements.
pub fn amips_energy(corners: &[[f64; 3]; 4]) -> f64 {
    let [p0, p1, p2, p3] = *corners;
    let edges = [sub(p1, p0), sub(p2, p0), sub(p3, p0)];
    let j = mat_mul_columns(&edges, &REGULAR_INV);
    let det = det3(&j);
    if !det.is_finite() || det <= EPS {
        return f64::INFINITY;
    }
    let frob2: f64 = j.iter().flatten().map(|x| x * x).sum();
    let energy = frob2 / (3.0 * det.powf(2.0 / 3.0));
    if energy.is_finite() { energy } else { f64::INFINITY }
}

/// Longest over shortest edge length; `+inf` on a zero-length edge.
pub fn edge_ratio(corners: &[[f64; 3]; 4]) -> f64 {
    aspect_ratio(corners).unwrap_or(f64::INFINITY)
}

pub fn signed_volume(a: [f64; 3], b: [f64; 3], c: [f64; 3], d: [f64; 3]) -> f64 {
    let ab = sub(b, a);
    let ac = sub(c, a);
    let ad = sub(d, a);
    dot(ab, cross(ac, ad)) / 6.0
}

fn aspect_ratio(corners: &[[f64; 3]; 4]) -> Result<f64, MeshOpsError> {
    let mut min_len = f64::INFINITY;
    let mut max_len = 0.0f64;
    for [a, b] in LOCAL_EDGES {
        let len = norm(sub(corners[a], corners[b]));
        if len <= EPS {
            return Err(MeshOpsError::InvariantViolation(
                "zero-length edge detected".into(),
            ));
        }
        min_len = min_len.min(len);
        max_len = max_len.max(len);
    }
    Ok(max_len / min_len)
}

fn min_angle(corners: &[[f64; 3]; 4]) -> Result<f64, MeshOpsError> {
    let mut min_angle = f64::INFINITY;
    for face in LOCAL_FACES {
        for i in 0..3 {
            let prev = face[(i + 2) % 3];
            let curr = face[i];
            let next = face[(i + 1) % 3];
            let v1 = sub(corners[prev], corners[curr]);
            let v2 = sub(corners[next], corners[curr]);
            min_angle = min_angle.min(angle_deg(v1, v2)?);
        }
    }
    Ok(min_angle)
}

/// Inverse of the matrix whose columns are the edges `p1 - p0`, `p2 - p0`,
/// `p3 - p0` of the unit regular tetrahedron.
const REGULAR_INV: [[f64; 3]; 3] = [
    [1.0, -0.577_350_269_189_625_7, -0.408_248_290_463_863],
    [0.0, 1.154_700_538_379_251_5, -0.408_248_290_463_863],
    [0.0, 0.0, 1.224_744_871_391_589],
];

/// `E * M` where `E` is given by its three columns; result is row-major.
fn mat_mul_columns(cols: &[[f64; 3]; 3], m: &[[f64; 3]; 3]) -> [[f64; 3]; 3] {
    let mut out = [[0.0; 3]; 3];
    for (r, row) in out.iter_mut().enumerate() {
        for (c, cell) in row.iter_mut().enumerate() {
            *cell = (0..3).map(|k| cols[k][r] * m[k][c]).sum();
        }
    }
    out
}

fn det3(m: &[[f64; 3]; 3]) -> f64 {
    m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
        - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
        + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0])
}

pub(crate) fn sub(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

pub(crate) fn dot(a: [f64; 3], b: [f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

pub(crate) fn cross(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

pub(crate) fn norm(a: [f64; 3]) -> f64 {
    dot(a, a).sqrt()
}

fn angle_deg(a: [f64; 3], b: [f64; 3]) -> Result<f64, MeshOpsError> {
    let na = norm(a);
    let nb = norm(b);
    if na <= EPS || nb <= EPS {
        return Err(MeshOpsError::InvariantViolation(
            "zero-length edge detected".into(),
        ));
    }
    let cos = (dot(a, b) / (na * nb)).clamp(-1.0, 1.0);
    Ok(cos.acos() * 180.0 / PI)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn regular(scale: f64) -> [[f64; 3]; 4] {
        let s3 = 3f64.sqrt();
        [
            [0.0, 0.0, 0.0],
            [scale, 0.0, 0.0],
            [0.5 * scale, 0.5 * s3 * scale, 0.0],
            [0.5 * scale, s3 / 6.0 * scale, (2.0f64 / 3.0).sqrt() * scale],
        ]
    }

    #[test]
    fn regular_tet_has_unit_energy_at_any_scale() {
        for scale in [0.01, 1.0, 250.0] {
            let e = amips_energy(&regular(scale));
            assert!((e - 1.0).abs() < 1e-9, "scale {scale}: {e}");
        }
    }

    #[test]
    fn inverted_and_flat_tets_have_infinite_energy() {
        let mut p = regular(1.0);
        p.swap(0, 1);
        assert!(is_inverted(&p));
        assert_eq!(amips_energy(&p), f64::INFINITY);

        let flat = [[0.0; 3], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [1.0, 1.0, 0.0]];
        assert!(is_inverted(&flat));
        assert_eq!(amips_energy(&flat), f64::INFINITY);
    }

    #[test]
    fn distortion_raises_energy() {
        let mut p = regular(1.0);
        p[3][2] *= 0.2;
        assert!(amips_energy(&p) > 1.5);
        assert!(!is_inverted(&p));
    }

    #[test]
    fn regular_tet_metrics() {
        let q = tet_quality(&regular(2.0)).expect("well shaped");
        assert!((q.aspect_ratio - 1.0).abs() < 1e-12);
        assert!((q.min_angle_deg - 60.0).abs() < 1e-9);
        assert!(q.signed_volume > 0.0);
        assert!(validate_tet_geometry(0, &regular(2.0)).is_ok());
        let mut bad = regular(1.0);
        bad.swap(2, 3);
        assert!(validate_tet_geometry(0, &bad).is_err());
    }
}
