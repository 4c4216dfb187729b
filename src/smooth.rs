//! Volume-preserving Laplacian smoothing
//!
//! Each iteration moves every vertex a fraction `lambda` of the way towards
//! the mean of its neighbours. Plain Laplacian smoothing shrinks closed
//! surfaces, so after every iteration the mesh is rescaled about its vertex
//! centroid by `(target / current)^(1/3)`, where the target is the volume of
//! the voxels the surface was extracted from.

use crate::config::PipelineConfig;
use crate::mesh_ops::{
    boundary_edges, calculate_vertex_normals, signed_volume, vertex_centroid, vertex_neighbors,
};
use crate::model::{Mesh, Vertex};
use nalgebra::Vector3;
use serde::Serialize;
use tracing::{debug, warn};

/// Smoothing parameters
#[derive(Debug, Clone, Copy)]
pub struct SmoothParams {
    /// Number of smoothing iterations
    pub iterations: usize,
    /// Blend factor towards the neighbour mean
    pub lambda: f64,
    /// Relative volume error above which the result is flagged
    pub volume_tolerance: f64,
}

impl Default for SmoothParams {
    fn default() -> Self {
        Self {
            iterations: 3,
            lambda: 0.5,
            volume_tolerance: 0.05,
        }
    }
}

impl From<&PipelineConfig> for SmoothParams {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            iterations: config.smoothing_iterations,
            lambda: config.smoothing_lambda,
            volume_tolerance: config.volume_tolerance,
        }
    }
}

/// Outcome of a smoothing run
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SmoothingReport {
    /// Iterations performed
    pub iterations: usize,
    /// Volume the correction aimed for
    pub target_volume: f64,
    /// Signed volume before smoothing
    pub initial_volume: f64,
    /// Signed volume after smoothing and correction
    pub final_volume: f64,
    /// `|final - target| / target`
    pub volume_error: f64,
    /// Whether the error is within the configured tolerance
    pub within_tolerance: bool,
}

/// Volume of `voxel_count` voxels of `voxel_volume` cubic millimetres each
pub fn target_volume_from_voxels(voxel_count: usize, voxel_volume: f64) -> f64 {
    voxel_count as f64 * voxel_volume
}

/// One uniform-weight Laplacian step; boundary vertices stay fixed
pub fn laplacian_pass(mesh: &mut Mesh, neighbors: &[Vec<usize>], fixed: &[bool], lambda: f64) {
    let updated: Vec<Vertex> = mesh
        .vertices
        .iter()
        .enumerate()
        .map(|(i, v)| {
            if fixed[i] || neighbors[i].is_empty() {
                return *v;
            }
            let mean: Vector3<f64> = neighbors[i]
                .iter()
                .map(|&j| mesh.vertices[j].to_vector())
                .sum::<Vector3<f64>>()
                / neighbors[i].len() as f64;
            let p = v.to_vector();
            Vertex::from(p + (mean - p) * lambda)
        })
        .collect();
    mesh.vertices = updated;
}

/// Rescale about the vertex centroid so the signed volume matches `target`
///
/// Returns the factor applied, or `None` when the current volume is not
/// positive and no meaningful correction exists.
pub fn correct_volume(mesh: &mut Mesh, target: f64) -> Option<f64> {
    let current = signed_volume(mesh);
    if !(current > 0.0 && target > 0.0 && current.is_finite()) {
        return None;
    }
    let factor = (target / current).cbrt();
    let center = vertex_centroid(&mesh.vertices);
    for v in &mut mesh.vertices {
        *v = Vertex::from(center + (v.to_vector() - center) * factor);
    }
    Some(factor)
}

/// Vertices lying on an open boundary
pub fn boundary_vertices(mesh: &Mesh) -> Vec<bool> {
    let mut fixed = vec![false; mesh.vertices.len()];
    for (a, b) in boundary_edges(mesh) {
        fixed[a] = true;
        fixed[b] = true;
    }
    fixed
}

/// Smooth with per-iteration volume correction towards `target_volume`
///
/// Never fails. A volume error above the tolerance is logged and flagged in
/// the report.
pub fn smooth_preserving_volume(
    mesh: &mut Mesh,
    target_volume: f64,
    params: &SmoothParams,
) -> SmoothingReport {
    let initial_volume = signed_volume(mesh);
    let neighbors = vertex_neighbors(mesh);
    let fixed = boundary_vertices(mesh);

    for iteration in 0..params.iterations {
        laplacian_pass(mesh, &neighbors, &fixed, params.lambda);
        let factor = correct_volume(mesh, target_volume);
        debug!(iteration, ?factor, "Smoothing iteration");
    }
    if params.iterations > 0 && !mesh.normals.is_empty() {
        mesh.normals = calculate_vertex_normals(mesh);
    }

    let final_volume = signed_volume(mesh);
    let volume_error = if target_volume > 0.0 {
        (final_volume - target_volume).abs() / target_volume
    } else {
        0.0
    };
    let within_tolerance = volume_error <= params.volume_tolerance;
    if !within_tolerance {
        warn!(
            target_volume,
            final_volume,
            volume_error,
            "Volume error after smoothing exceeds tolerance"
        );
    }

    SmoothingReport {
        iterations: params.iterations,
        target_volume,
        initial_volume,
        final_volume,
        volume_error,
        within_tolerance,
    }
}
