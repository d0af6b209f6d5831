//! Engine configuration.

use crate::mesh_error::MeshOpsError;
use crate::topology::validation::NonManifoldHandling;

/// Named options consumed at engine setup.
///
/// All fields have defaults, so a partial JSON document is enough:
/// ```rust
/// use mesh_localops::adapt::config::RemeshConfig;
///
/// let cfg: RemeshConfig = serde_json::from_str(r#"{ "target_edge_length": 0.25 }"#)?;
/// assert_eq!(cfg.target_edge_length, 0.25);
/// assert_eq!(cfg.max_passes, 64);
/// # Ok::<(), serde_json::Error>(())
/// ```
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct RemeshConfig {
    /// Target edge length `L`, scaled per edge by the endpoints' sizing.
    pub target_edge_length: f64,
    /// Split an edge while `len > split_ratio * L * sizing`.
    pub split_ratio: f64,
    /// Collapse an edge while `len < collapse_ratio * L * sizing`.
    pub collapse_ratio: f64,
    /// Swap passes stop touching elements whose energy is below this.
    pub stop_energy: f64,
    /// Check surface link counts before and after each edit.
    pub preserve_topology: bool,
    /// Check the combinatorial link condition before each collapse.
    pub check_link_condition: bool,
    /// Worker threads; `0` runs serially.
    pub num_threads: usize,
    /// Upper bound on retry passes in one fixed-point run.
    pub max_passes: usize,
    /// Successes between two `should_stop` checks.
    pub stop_check_interval: usize,
    pub non_manifold: NonManifoldHandling,
}

impl Default for RemeshConfig {
    fn default() -> Self {
        Self {
            target_edge_length: 1.0,
            split_ratio: 4.0 / 3.0,
            collapse_ratio: 4.0 / 5.0,
            stop_energy: 10.0,
            preserve_topology: true,
            check_link_condition: true,
            num_threads: 0,
            max_passes: 64,
            stop_check_interval: 1024,
            non_manifold: NonManifoldHandling::Warn,
        }
    }
}

impl RemeshConfig {
    pub fn validate(&self) -> Result<(), MeshOpsError> {
        let positive = [
            ("target_edge_length", self.target_edge_length),
            ("split_ratio", self.split_ratio),
            ("collapse_ratio", self.collapse_ratio),
            ("stop_energy", self.stop_energy),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(MeshOpsError::InvalidConfig(format!(
                    "{name} must be positive and finite, got {value}"
                )));
            }
        }
        if self.collapse_ratio >= self.split_ratio {
            return Err(MeshOpsError::InvalidConfig(format!(
                "collapse_ratio ({}) must be below split_ratio ({})",
                self.collapse_ratio, self.split_ratio
            )));
        }
        if self.max_passes == 0 {
            return Err(MeshOpsError::InvalidConfig("max_passes must be at least 1".into()));
        }
        if self.stop_check_interval == 0 {
            return Err(MeshOpsError::InvalidConfig(
                "stop_check_interval must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Squared split threshold for an edge with the given mean sizing.
    pub fn split_threshold2(&self, sizing: f64) -> f64 {
        let l = self.split_ratio * self.target_edge_length * sizing;
        l * l
    }

    /// Squared collapse threshold for an edge with the given mean sizing.
    pub fn collapse_threshold2(&self, sizing: f64) -> f64 {
        let l = self.collapse_ratio * self.target_edge_length * sizing;
        l * l
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        RemeshConfig::default().validate().expect("defaults are valid");
    }

    #[test]
    fn rejects_inverted_ratios_and_bad_lengths() {
        let cfg = RemeshConfig {
            collapse_ratio: 2.0,
            ..RemeshConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(MeshOpsError::InvalidConfig(_))));
        let cfg = RemeshConfig {
            target_edge_length: -1.0,
            ..RemeshConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn thresholds_scale_with_sizing() {
        let cfg = RemeshConfig {
            target_edge_length: 3.0,
            split_ratio: 1.0,
            ..RemeshConfig::default()
        };
        assert_eq!(cfg.split_threshold2(2.0), 36.0);
    }
}
