//! Isosurface extraction backends
//!
//! An [`IsosurfaceBackend`] turns a [`ScalarField`] into a triangle mesh in
//! voxel-index coordinates. A [`BackendChain`] tries several backends in a
//! fixed preference order and stops at the first one that succeeds.

mod marching_cubes;
mod marching_tetrahedra;
mod tables;

pub use marching_cubes::MarchingCubes;
pub use marching_tetrahedra::MarchingTetrahedra;

use crate::config::BackendKind;
use crate::error::{Error, Result};
use crate::model::Mesh;
use crate::volume::ScalarField;
use tracing::{debug, warn};

/// An algorithm converting a sampled field into a triangle mesh
///
/// Implementations place the surface where the field equals `iso`, treat
/// samples at or above `iso` as inside, and wind triangles so that normals
/// point from inside to outside.
pub trait IsosurfaceBackend: Send + Sync {
    /// Name used in logs and errors
    fn name(&self) -> &'static str;

    /// Extract the level set of `field` at `iso`
    ///
    /// Returns an empty mesh when the field does not cross `iso`.
    fn extract(&self, field: &ScalarField, iso: f32) -> Result<Mesh>;
}

/// Create the backend for a configured kind
pub fn backend_for(kind: BackendKind) -> Box<dyn IsosurfaceBackend> {
    match kind {
        BackendKind::MarchingCubes => Box::new(MarchingCubes),
        BackendKind::MarchingTetrahedra => Box::new(MarchingTetrahedra),
    }
}

/// A successful extraction and the backend that produced it
#[derive(Debug)]
pub struct Extraction {
    /// The extracted mesh in voxel-index coordinates
    pub mesh: Mesh,
    /// Name of the backend that produced the mesh
    pub backend: &'static str,
}

/// Backends tried in preference order
pub struct BackendChain {
    backends: Vec<Box<dyn IsosurfaceBackend>>,
}

impl BackendChain {
    /// Create a chain from explicit backends
    pub fn new(backends: Vec<Box<dyn IsosurfaceBackend>>) -> Self {
        Self { backends }
    }

    /// Create a chain from configured backend kinds
    pub fn from_kinds(kinds: &[BackendKind]) -> Self {
        Self::new(kinds.iter().map(|&k| backend_for(k)).collect())
    }

    /// Names of the backends in the order they are tried
    pub fn names(&self) -> Vec<&'static str> {
        self.backends.iter().map(|b| b.name()).collect()
    }

    /// Run the chain
    ///
    /// Returns `Ok(None)` when no surface exists at `iso`: either the field
    /// has no crossing, or a backend completed and found nothing. A backend
    /// error moves on to the next backend; when every backend fails the last
    /// error is returned.
    pub fn extract(&self, field: &ScalarField, iso: f32) -> Result<Option<Extraction>> {
        if !field.has_crossing(iso) {
            debug!(iso, "Field does not cross the isovalue");
            return Ok(None);
        }

        let mut last_error = None;
        for backend in &self.backends {
            match backend.extract(field, iso) {
                Ok(mesh) if mesh.is_empty() => {
                    debug!(backend = backend.name(), "Backend found no surface");
                    return Ok(None);
                }
                Ok(mesh) => {
                    debug!(
                        backend = backend.name(),
                        vertices = mesh.vertex_count(),
                        triangles = mesh.triangle_count(),
                        "Extracted isosurface"
                    );
                    return Ok(Some(Extraction {
                        mesh,
                        backend: backend.name(),
                    }));
                }
                Err(err) => {
                    warn!(backend = backend.name(), error = %err, "Isosurface backend failed");
                    last_error = Some(err);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| Error::Backend {
            backend: "chain".to_string(),
            message: "no isosurface backend configured".to_string(),
        }))
    }
}
