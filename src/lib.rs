//! # labelmesh
//!
//! Convert labeled volumetric segmentations into watertight, print-ready
//! triangle meshes.
//!
//! A labeled volume is a 3D grid where each voxel holds an integer
//! anatomical-structure ID. For each structure this crate isolates its
//! voxels, extracts an isosurface, maps it into world millimetres, cleans,
//! smooths and repairs it, and exports binary STL.
//!
//! ## Features
//!
//! - Pure Rust implementation with no unsafe code
//! - NIfTI-1 loading (`.nii`, `.nii.gz`, ZIP archives)
//! - Marching cubes with a marching tetrahedra fallback
//! - Volume-preserving Laplacian smoothing
//! - Hole filling, with an opt-in convex hull fallback
//! - Orientation, scaling and quadric decimation for printing
//! - Printability validation with a 0-10 score
//! - Parallel multi-label batches with per-label failure isolation
//!
//! ## Example
//!
//! ```no_run
//! use labelmesh::{PipelineConfig, export_mesh, extract_label_mesh, postprocess_mesh, prepare_for_print};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let volume = labelmesh::nifti::load("segmentation.nii.gz")?;
//! let config = PipelineConfig::default();
//!
//! let mesh = extract_label_mesh(volume.labels(), 1, volume.spacing(), volume.affine(), &config)?;
//! let voxels = volume.isolate(1).count();
//! let processed = postprocess_mesh(mesh, voxels as f64 * volume.voxel_volume(), &config)?;
//! let (printable, report) = prepare_for_print(processed.mesh, 100.0, &config)?;
//!
//! println!("Printability: {}/10 ({})", report.printability_score, report.quality);
//! export_mesh(&printable, "out/liver.stl")?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod batch;
pub mod clean;
pub mod config;
pub mod decimate;
pub mod error;
pub mod filter;
pub mod isosurface;
pub mod mesh_ops;
pub mod model;
pub mod nifti;
pub mod pipeline;
pub mod polygon_triangulation;
pub mod print;
pub mod registry;
pub mod repair;
pub mod smooth;
pub mod transform;
pub mod validator;
pub mod vista3d;
pub mod volume;
pub mod writer;

pub use batch::{BatchOptions, BatchSummary, LabelOutcome, export_volume, process_volume};
pub use config::{BackendKind, PipelineConfig};
pub use error::{Error, Result};
pub use model::{Mesh, Triangle, Vertex};
pub use pipeline::{PostProcessed, convert_label, extract_label_mesh, postprocess_mesh};
pub use print::{PrintJob, PrintPreparation, PrintState, prepare_for_print, prepare_for_print_detailed};
pub use registry::{LabelInfo, LabelRegistry};
pub use repair::{RepairMethod, RepairReport};
pub use smooth::SmoothingReport;
pub use validator::{QualityBand, ValidationReport};
pub use volume::{BinaryMask, LabeledVolume};
pub use writer::export_mesh;
