//! Error types for the volume-to-mesh pipeline
//!
//! All errors carry an error code for categorization and enough context
//! (paths, label IDs, voxel counts) to diagnose a failed label without
//! re-running the batch.
//!
//! # Error Codes
//!
//! Error codes follow the pattern: `E<category><number>`
//!
//! Categories:
//! - **E1xxx**: I/O, archive and serialization errors
//! - **E2xxx**: Input loading and configuration errors
//! - **E3xxx**: Geometry and mesh-generation errors
//! - **E4xxx**: Output errors
//!
//! ## Common Error Codes
//!
//! - `E1001`: I/O error
//! - `E1002`: ZIP archive format error
//! - `E1003`: JSON error
//! - `E2001`: Volume could not be loaded
//! - `E2002`: Invalid label registry
//! - `E2003`: Invalid pipeline configuration
//! - `E3001`: No surface for a label
//! - `E3002`: Invalid mesh
//! - `E3003`: Singular affine transform
//! - `E3004`: Isosurface backend failure
//! - `E3005`: Print preparation step out of order
//! - `E4001`: Export failure

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while converting a labeled volume into meshes
#[derive(Error, Debug)]
pub enum Error {
    /// IO error occurred while reading or writing a file
    ///
    /// **Error Code**: E1001
    ///
    /// **Common Causes**:
    /// - File not found
    /// - Insufficient permissions
    /// - Disk read error
    #[error("[E1001] I/O error: {0}")]
    Io(#[from] io::Error),

    /// ZIP archive error
    ///
    /// **Error Code**: E1002
    ///
    /// **Common Causes**:
    /// - Corrupted or truncated inference result archive
    /// - Unsupported compression method
    #[error("[E1002] ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// JSON serialization or deserialization error
    ///
    /// **Error Code**: E1003
    ///
    /// **Common Causes**:
    /// - Malformed label registry or configuration file
    /// - Field with the wrong type (e.g. a string where an ID is expected)
    #[error("[E1003] JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The labeled volume could not be loaded
    ///
    /// **Error Code**: E2001
    ///
    /// **Common Causes**:
    /// - Not a NIfTI-1 file (bad magic or header size)
    /// - Zero-sized dimensions
    /// - Non-positive voxel spacing
    /// - Data block shorter than the header declares
    /// - Negative or fractional label values
    ///
    /// **Suggestions**:
    /// - Verify the segmentation export finished writing the file
    /// - Check that the volume holds integer labels, not intensities
    #[error("[E2001] Failed to load volume: {0}")]
    Load(String),

    /// The label registry is invalid
    ///
    /// **Error Code**: E2002
    ///
    /// **Common Causes**:
    /// - Duplicate label IDs
    /// - Label ID 0, which is reserved for background
    /// - Empty structure names
    #[error("[E2002] Invalid label registry: {0}")]
    Registry(String),

    /// The pipeline configuration is invalid
    ///
    /// **Error Code**: E2003
    ///
    /// **Common Causes**:
    /// - Negative Gaussian sigma
    /// - Smoothing factor outside (0, 1]
    /// - Non-positive target print size
    /// - No isosurface backend enabled
    #[error("[E2003] Invalid configuration: {0}")]
    Config(String),

    /// No surface could be extracted for a label
    ///
    /// **Error Code**: E3001
    ///
    /// This error is recoverable: batch processing skips the label and
    /// continues with the next one.
    ///
    /// **Common Causes**:
    /// - Label absent from the volume
    /// - Fewer voxels than the configured minimum
    /// - Mask fills the entire volume so no boundary exists
    #[error("[E3001] No surface for label {label_id} ({voxel_count} voxels)")]
    EmptyMesh {
        /// The label that produced no surface
        label_id: u32,
        /// Number of voxels carrying the label
        voxel_count: usize,
    },

    /// The mesh is unusable for the requested operation
    ///
    /// **Error Code**: E3002
    ///
    /// **Common Causes**:
    /// - Mesh has no vertices or triangles
    /// - Triangle references a vertex that does not exist
    /// - Mesh has zero extent along every axis
    #[error("[E3002] Invalid mesh: {0}")]
    InvalidMesh(String),

    /// Affine transform is not invertible
    ///
    /// **Error Code**: E3003
    ///
    /// **Suggestions**:
    /// - Check the sform/qform of the source volume
    #[error("[E3003] Affine transform is singular (determinant {determinant})")]
    InvalidAffine {
        /// Determinant of the upper-left 3x3 block
        determinant: f64,
    },

    /// An isosurface backend failed
    ///
    /// **Error Code**: E3004
    #[error("[E3004] Isosurface backend '{backend}' failed: {message}")]
    Backend {
        /// Name of the backend
        backend: String,
        /// Failure description
        message: String,
    },

    /// A print preparation step was called out of order
    ///
    /// **Error Code**: E3005
    ///
    /// **Suggestions**:
    /// - Run repair, orient, scale, optimize and validate in that order
    #[error("[E3005] Cannot {action} a mesh in state {state}")]
    InvalidTransition {
        /// The step that was requested
        action: &'static str,
        /// The state the job was in
        state: String,
    },

    /// A mesh could not be written
    ///
    /// **Error Code**: E4001
    ///
    /// Fatal for this output file only.
    ///
    /// **Common Causes**:
    /// - Output directory not writable
    /// - Disk full
    /// - Mesh has no triangles
    #[error("[E4001] Failed to export '{}': {message}", .path.display())]
    Export {
        /// Destination path
        path: PathBuf,
        /// Failure description
        message: String,
    },
}

impl Error {
    /// Create a Load error
    pub fn load(message: impl Into<String>) -> Self {
        Error::Load(message.into())
    }

    /// Create an Export error for a destination path
    ///
    /// # Arguments
    /// * `path` - The file that could not be written
    /// * `message` - Description of the failure
    pub fn export(path: &Path, message: impl std::fmt::Display) -> Self {
        Error::Export {
            path: path.to_path_buf(),
            message: message.to_string(),
        }
    }

    /// Returns true for failures that only affect the current label
    ///
    /// Batch processing uses this to decide whether a label is reported as
    /// skipped rather than failed.
    pub fn is_empty_mesh(&self) -> bool {
        matches!(self, Error::EmptyMesh { .. })
    }
}
