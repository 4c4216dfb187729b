//! Pipeline configuration
//!
//! Every tunable threshold of the pipeline lives in [`PipelineConfig`]. The
//! configuration can be built in code with the `with_*` methods or loaded from
//! a JSON file; missing fields fall back to the defaults.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// An isosurface extraction algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Table-driven marching cubes
    MarchingCubes,
    /// Marching tetrahedra over a six-tetrahedron cube split
    MarchingTetrahedra,
}

impl BackendKind {
    /// Human-readable name used in logs and errors
    pub fn name(&self) -> &'static str {
        match self {
            BackendKind::MarchingCubes => "marching_cubes",
            BackendKind::MarchingTetrahedra => "marching_tetrahedra",
        }
    }
}

/// Configuration for converting labels into printable meshes
///
/// # Example
///
/// ```
/// use labelmesh::PipelineConfig;
///
/// let config = PipelineConfig::new()
///     .with_min_voxels(200)
///     .with_smoothing(5, 0.4)
///     .with_target_size_mm(80.0);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Labels with fewer voxels are skipped as empty
    pub min_voxels: usize,
    /// Gaussian pre-smoothing sigma in voxels; 0 disables pre-smoothing
    pub gaussian_sigma: f64,
    /// Isovalue at which the surface is extracted
    pub iso_level: f64,
    /// Laplacian smoothing iterations during post-processing
    pub smoothing_iterations: usize,
    /// Laplacian blend factor in (0, 1]
    pub smoothing_lambda: f64,
    /// Relative volume error above which a warning is reported
    pub volume_tolerance: f64,
    /// Vertices closer than this are merged
    pub weld_epsilon: f64,
    /// Triangles with area at or below this are removed
    pub degenerate_area_epsilon: f64,
    /// Attempt hole filling when the mesh is open
    pub fill_holes: bool,
    /// Boundary loops longer than this are left open
    pub max_hole_edges: usize,
    /// Replace unrepairable meshes by their convex hull
    ///
    /// Off by default: the hull discards every concavity of the structure.
    pub allow_convex_hull: bool,
    /// Target size of the longest bounding-box dimension in millimetres
    pub target_size_mm: f64,
    /// Blend factor of the single smoothing pass during print optimization
    pub optimize_lambda: f64,
    /// Triangle count above which print optimization decimates
    pub decimate_threshold: usize,
    /// Upper bound on the decimation target
    pub decimate_cap: usize,
    /// Isosurface backends in preference order
    pub backends: Vec<BackendKind>,
    /// Process labels of one volume on the rayon thread pool
    pub parallel: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            min_voxels: 100,
            gaussian_sigma: 0.5,
            iso_level: 0.5,
            smoothing_iterations: 3,
            smoothing_lambda: 0.5,
            volume_tolerance: 0.05,
            weld_epsilon: 1e-6,
            degenerate_area_epsilon: 1e-12,
            fill_holes: true,
            max_hole_edges: 1000,
            allow_convex_hull: false,
            target_size_mm: 100.0,
            optimize_lambda: 0.3,
            decimate_threshold: 100_000,
            decimate_cap: 50_000,
            backends: vec![BackendKind::MarchingCubes, BackendKind::MarchingTetrahedra],
            parallel: true,
        }
    }
}

impl PipelineConfig {
    /// Create a configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a configuration from a JSON file
    ///
    /// Fields absent from the file keep their default values. The loaded
    /// configuration is validated before it is returned.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Set the minimum voxel count for a label to be meshed
    pub fn with_min_voxels(mut self, min_voxels: usize) -> Self {
        self.min_voxels = min_voxels;
        self
    }

    /// Set the Gaussian pre-smoothing sigma
    pub fn with_gaussian_sigma(mut self, sigma: f64) -> Self {
        self.gaussian_sigma = sigma;
        self
    }

    /// Set the smoothing iteration count and blend factor
    pub fn with_smoothing(mut self, iterations: usize, lambda: f64) -> Self {
        self.smoothing_iterations = iterations;
        self.smoothing_lambda = lambda;
        self
    }

    /// Set the target print size in millimetres
    pub fn with_target_size_mm(mut self, size: f64) -> Self {
        self.target_size_mm = size;
        self
    }

    /// Enable or disable the convex-hull repair fallback
    pub fn with_convex_hull_fallback(mut self, allow: bool) -> Self {
        self.allow_convex_hull = allow;
        self
    }

    /// Set the isosurface backends in preference order
    pub fn with_backends(mut self, backends: Vec<BackendKind>) -> Self {
        self.backends = backends;
        self
    }

    /// Set the decimation threshold and cap
    pub fn with_decimation(mut self, threshold: usize, cap: usize) -> Self {
        self.decimate_threshold = threshold;
        self.decimate_cap = cap;
        self
    }

    /// Enable or disable parallel label processing
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Check that every value is usable
    pub fn validate(&self) -> Result<()> {
        if !(self.gaussian_sigma >= 0.0 && self.gaussian_sigma.is_finite()) {
            return Err(Error::Config(format!(
                "gaussian_sigma must be a non-negative number, got {}",
                self.gaussian_sigma
            )));
        }
        if !self.iso_level.is_finite() {
            return Err(Error::Config("iso_level must be finite".to_string()));
        }
        for (name, value) in [
            ("smoothing_lambda", self.smoothing_lambda),
            ("optimize_lambda", self.optimize_lambda),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(Error::Config(format!(
                    "{} must be in (0, 1], got {}",
                    name, value
                )));
            }
        }
        if !(self.volume_tolerance > 0.0) {
            return Err(Error::Config(format!(
                "volume_tolerance must be positive, got {}",
                self.volume_tolerance
            )));
        }
        if !(self.target_size_mm > 0.0 && self.target_size_mm.is_finite()) {
            return Err(Error::Config(format!(
                "target_size_mm must be positive, got {}",
                self.target_size_mm
            )));
        }
        if self.weld_epsilon < 0.0 || self.degenerate_area_epsilon < 0.0 {
            return Err(Error::Config(
                "weld_epsilon and degenerate_area_epsilon must be non-negative".to_string(),
            ));
        }
        if self.max_hole_edges < 3 {
            return Err(Error::Config(format!(
                "max_hole_edges must be at least 3, got {}",
                self.max_hole_edges
            )));
        }
        if self.decimate_cap < 4 {
            return Err(Error::Config(format!(
                "decimate_cap must be at least 4, got {}",
                self.decimate_cap
            )));
        }
        if self.backends.is_empty() {
            return Err(Error::Config(
                "at least one isosurface backend is required".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.min_voxels, 100);
        assert_eq!(config.smoothing_iterations, 3);
        assert!(!config.allow_convex_hull);
        assert_eq!(config.backends[0], BackendKind::MarchingCubes);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(PipelineConfig::new().with_gaussian_sigma(-1.0).validate().is_err());
        assert!(PipelineConfig::new().with_smoothing(3, 0.0).validate().is_err());
        assert!(PipelineConfig::new().with_smoothing(3, 1.5).validate().is_err());
        assert!(PipelineConfig::new().with_target_size_mm(0.0).validate().is_err());
        assert!(PipelineConfig::new().with_backends(vec![]).validate().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"min_voxels": 200, "backends": ["marching_tetrahedra"], "allow_convex_hull": true}}"#
        )
        .unwrap();

        let config = PipelineConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.min_voxels, 200);
        assert_eq!(config.backends, vec![BackendKind::MarchingTetrahedra]);
        assert!(config.allow_convex_hull);
        assert_eq!(config.gaussian_sigma, 0.5);
    }

    #[test]
    fn test_invalid_json_file_reports_config_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"smoothing_lambda": 2.0}}"#).unwrap();
        let err = PipelineConfig::from_json_file(file.path()).unwrap_err();
        assert!(err.to_string().contains("[E2003]"));
    }
}
