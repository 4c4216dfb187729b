//! Print preparation
//!
//! A [`PrintJob`] walks a mesh through the fixed sequence
//! `Raw -> Repaired -> Oriented -> Scaled -> Optimized -> Validated`.
//! Each step checks that the previous one ran, so a caller cannot scale a
//! mesh that was never oriented or validate one that was never optimized.

use crate::config::PipelineConfig;
use crate::decimate::decimate;
use crate::error::{Error, Result};
use crate::mesh_ops::{calculate_vertex_normals, compute_aabb, signed_volume, vertex_neighbors};
use crate::model::{Mesh, Vertex};
use crate::repair::{RepairParams, RepairReport, make_watertight};
use crate::smooth::{boundary_vertices, correct_volume, laplacian_pass};
use crate::validator::{ValidationReport, validate};
use serde::Serialize;
use std::fmt;
use tracing::{debug, info};

/// Stage a [`PrintJob`] has reached
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum PrintState {
    /// Nothing done yet
    Raw,
    /// Holes closed where possible
    Repaired,
    /// Longest axis on Z, resting on the build plate
    Oriented,
    /// Largest dimension equals the target size
    Scaled,
    /// Smoothed and, if needed, decimated
    Optimized,
    /// Validation report available
    Validated,
}

impl fmt::Display for PrintState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Triangle counts around a decimation step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DecimationSummary {
    /// Triangles before decimation
    pub before: usize,
    /// Triangles after decimation
    pub after: usize,
}

/// Everything [`prepare_for_print_detailed`] produces
#[derive(Debug, Clone)]
pub struct PrintPreparation {
    /// The print-ready mesh
    pub mesh: Mesh,
    /// Validation of the final mesh
    pub validation: ValidationReport,
    /// Factor applied by the scale step
    pub scale_factor: f64,
    /// Set when the mesh was decimated
    pub decimated: Option<DecimationSummary>,
    /// Outcome of the repair step
    pub repair: RepairReport,
}

/// Rotate the mesh so its longest extent lies along Z and rest it on the plate
///
/// The rotation is a cyclic permutation of the axes, so winding is
/// unchanged. When Z already ties for the longest extent nothing is
/// rotated, which makes orienting idempotent. X and Y are centred on 0 and
/// the lowest vertex is moved to `z = 0`.
pub fn orient_for_print(mesh: &mut Mesh) -> Result<()> {
    let bounds = compute_aabb(mesh)?;
    let extent = bounds.extent();
    let longest = if extent[2] >= extent[0] && extent[2] >= extent[1] {
        2
    } else if extent[0] >= extent[1] {
        0
    } else {
        1
    };

    if longest != 2 {
        // (x, y, z) -> (y, z, x) brings X up; (x, y, z) -> (z, x, y) brings Y up
        for v in &mut mesh.vertices {
            *v = match longest {
                0 => Vertex::new(v.y, v.z, v.x),
                _ => Vertex::new(v.z, v.x, v.y),
            };
        }
        debug!(axis = longest, "Rotated longest axis onto Z");
    }
    place_on_plate(mesh)
}

/// Centre X and Y on 0 and move the lowest vertex to `z = 0`
fn place_on_plate(mesh: &mut Mesh) -> Result<()> {
    let bounds = compute_aabb(mesh)?;
    let center = bounds.center();
    let offset = [center[0], center[1], bounds.min[2]];
    for v in &mut mesh.vertices {
        v.x -= offset[0];
        v.y -= offset[1];
        v.z -= offset[2];
    }
    Ok(())
}

/// Scale uniformly so the largest dimension equals `target_mm`
///
/// Scaling happens about the bounding-box centre and the mesh is put back
/// on the build plate. Returns the factor applied.
///
/// # Errors
/// [`Error::InvalidMesh`] when the mesh is empty, flat in every axis, or the
/// target is not positive.
pub fn scale_to_size(mesh: &mut Mesh, target_mm: f64) -> Result<f64> {
    if !(target_mm > 0.0 && target_mm.is_finite()) {
        return Err(Error::InvalidMesh(format!(
            "Target size must be positive, got {}",
            target_mm
        )));
    }
    let bounds = compute_aabb(mesh)?;
    let max_dim = bounds.max_dimension();
    if !(max_dim > 0.0) {
        return Err(Error::InvalidMesh(
            "Cannot scale a mesh with zero extent".to_string(),
        ));
    }

    let factor = target_mm / max_dim;
    let center = bounds.center();
    for v in &mut mesh.vertices {
        v.x = center[0] + (v.x - center[0]) * factor;
        v.y = center[1] + (v.y - center[1]) * factor;
        v.z = center[2] + (v.z - center[2]) * factor;
    }
    place_on_plate(mesh)?;
    Ok(factor)
}

/// Light smoothing and optional decimation ahead of slicing
///
/// One volume-corrected Laplacian pass with `optimize_lambda`, then a
/// re-fit to `target_mm`. Meshes above `decimate_threshold` triangles are
/// decimated to `min(count / 2, decimate_cap)` and re-fitted again.
pub fn optimize_for_print(
    mesh: &mut Mesh,
    target_mm: f64,
    config: &PipelineConfig,
) -> Result<Option<DecimationSummary>> {
    let volume = signed_volume(mesh);
    let neighbors = vertex_neighbors(mesh);
    let fixed = boundary_vertices(mesh);
    laplacian_pass(mesh, &neighbors, &fixed, config.optimize_lambda);
    correct_volume(mesh, volume);
    scale_to_size(mesh, target_mm)?;

    let mut summary = None;
    let count = mesh.triangle_count();
    if count > config.decimate_threshold {
        let target = (count / 2).min(config.decimate_cap);
        let result = decimate(mesh, target);
        summary = Some(DecimationSummary {
            before: result.original_triangles,
            after: result.final_triangles,
        });
        *mesh = result.mesh;
        scale_to_size(mesh, target_mm)?;
    }

    mesh.normals = calculate_vertex_normals(mesh);
    Ok(summary)
}

/// A mesh moving through the print preparation stages
#[derive(Debug, Clone)]
pub struct PrintJob {
    mesh: Mesh,
    state: PrintState,
    repair: Option<RepairReport>,
    scale_factor: Option<f64>,
    decimated: Option<DecimationSummary>,
    validation: Option<ValidationReport>,
}

impl PrintJob {
    /// Start a job in the `Raw` state
    pub fn new(mesh: Mesh) -> Self {
        Self {
            mesh,
            state: PrintState::Raw,
            repair: None,
            scale_factor: None,
            decimated: None,
            validation: None,
        }
    }

    /// Current stage
    pub fn state(&self) -> PrintState {
        self.state
    }

    /// The mesh in its current form
    pub fn mesh(&self) -> &Mesh {
        &self.mesh
    }

    fn require(&self, expected: PrintState, action: &'static str) -> Result<()> {
        if self.state != expected {
            return Err(Error::InvalidTransition {
                action,
                state: self.state.to_string(),
            });
        }
        Ok(())
    }

    /// Close holes; requires `Raw`
    pub fn repair(&mut self, params: &RepairParams) -> Result<&RepairReport> {
        self.require(PrintState::Raw, "repair")?;
        let report = make_watertight(&mut self.mesh, params);
        self.state = PrintState::Repaired;
        Ok(self.repair.insert(report))
    }

    /// Put the longest axis on Z; requires `Repaired`
    pub fn orient(&mut self) -> Result<()> {
        self.require(PrintState::Repaired, "orient")?;
        orient_for_print(&mut self.mesh)?;
        self.state = PrintState::Oriented;
        Ok(())
    }

    /// Fit the largest dimension to `target_mm`; requires `Oriented`
    pub fn scale(&mut self, target_mm: f64) -> Result<f64> {
        self.require(PrintState::Oriented, "scale")?;
        let factor = scale_to_size(&mut self.mesh, target_mm)?;
        self.scale_factor = Some(factor);
        self.state = PrintState::Scaled;
        Ok(factor)
    }

    /// Smooth and decimate; requires `Scaled`
    pub fn optimize(&mut self, target_mm: f64, config: &PipelineConfig) -> Result<()> {
        self.require(PrintState::Scaled, "optimize")?;
        self.decimated = optimize_for_print(&mut self.mesh, target_mm, config)?;
        self.state = PrintState::Optimized;
        Ok(())
    }

    /// Compute the validation report; requires `Optimized`
    pub fn validate(&mut self) -> Result<&ValidationReport> {
        self.require(PrintState::Optimized, "validate")?;
        let report = validate(&self.mesh);
        self.state = PrintState::Validated;
        Ok(self.validation.insert(report))
    }

    /// Consume a validated job
    pub fn finish(self) -> Result<PrintPreparation> {
        self.require(PrintState::Validated, "finish")?;
        match (self.validation, self.repair, self.scale_factor) {
            (Some(validation), Some(repair), Some(scale_factor)) => Ok(PrintPreparation {
                mesh: self.mesh,
                validation,
                scale_factor,
                decimated: self.decimated,
                repair,
            }),
            _ => Err(Error::InvalidTransition {
                action: "finish",
                state: self.state.to_string(),
            }),
        }
    }
}

/// Run every print preparation stage and return the full record
///
/// # Errors
/// [`Error::Config`] when `config` is invalid, and any error of the
/// individual stages.
pub fn prepare_for_print_detailed(
    mesh: Mesh,
    target_size_mm: f64,
    config: &PipelineConfig,
) -> Result<PrintPreparation> {
    config.validate()?;
    let mut job = PrintJob::new(mesh);
    job.repair(&RepairParams::from(config))?;
    job.orient()?;
    let factor = job.scale(target_size_mm)?;
    job.optimize(target_size_mm, config)?;
    let report = job.validate()?;
    info!(
        scale_factor = factor,
        score = report.printability_score,
        quality = %report.quality,
        triangles = report.triangle_count,
        "Prepared mesh for printing"
    );
    job.finish()
}

/// Run every print preparation stage
pub fn prepare_for_print(
    mesh: Mesh,
    target_size_mm: f64,
    config: &PipelineConfig,
) -> Result<(Mesh, ValidationReport)> {
    let prepared = prepare_for_print_detailed(mesh, target_size_mm, config)?;
    Ok((prepared.mesh, prepared.validation))
}
