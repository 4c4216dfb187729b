//! Per-label conversion from voxels to a finished mesh
//!
//! [`extract_label_mesh`] isolates one label, pre-smooths the mask and runs
//! the isosurface backends; [`postprocess_mesh`] cleans, smooths and repairs
//! the result. [`convert_label`] chains both for one label of a
//! [`LabeledVolume`].

use crate::clean::{CleanParams, CleanReport, clean_mesh};
use crate::config::PipelineConfig;
use crate::error::{Error, Result};
use crate::filter::{gaussian_smooth, kernel_radius};
use crate::isosurface::BackendChain;
use crate::model::Mesh;
use crate::repair::{RepairParams, RepairReport, make_watertight};
use crate::smooth::{
    SmoothParams, SmoothingReport, smooth_preserving_volume, target_volume_from_voxels,
};
use crate::transform::{
    apply_affine_in_place, effective_affine, invert_affine, linear_determinant,
};
use crate::volume::{BinaryMask, LabeledVolume};
use nalgebra::Matrix4;
use ndarray::Array3;
use tracing::debug;

/// A freshly extracted surface with its provenance
#[derive(Debug, Clone)]
pub struct ExtractedSurface {
    /// Surface in world millimetres
    pub mesh: Mesh,
    /// Backend that produced the surface
    pub backend: &'static str,
    /// Voxels carrying the label
    pub voxel_count: usize,
}

/// A post-processed mesh with a report for every stage
#[derive(Debug, Clone)]
pub struct PostProcessed {
    /// The cleaned, smoothed and repaired mesh
    pub mesh: Mesh,
    /// What cleaning removed
    pub clean: CleanReport,
    /// Volume bookkeeping of the smoothing step
    pub smoothing: SmoothingReport,
    /// What repair did
    pub repair: RepairReport,
}

/// One label converted end to end
#[derive(Debug, Clone)]
pub struct LabelMesh {
    /// The converted label
    pub label_id: u32,
    /// Voxels carrying the label
    pub voxel_count: usize,
    /// Backend that produced the surface
    pub backend: &'static str,
    /// The mesh and its stage reports
    pub result: PostProcessed,
}

/// Extract a label's surface and report which backend produced it
///
/// See [`extract_label_mesh`].
pub fn extract_label_surface(
    labels: &Array3<u32>,
    label_id: u32,
    spacing: [f64; 3],
    affine: &Matrix4<f64>,
    config: &PipelineConfig,
) -> Result<ExtractedSurface> {
    config.validate()?;
    let world = effective_affine(affine, spacing);
    invert_affine(&world)?;

    let mask = BinaryMask::isolate(labels, label_id);
    let voxel_count = mask.count();
    let empty = Error::EmptyMesh {
        label_id,
        voxel_count,
    };
    if mask.is_empty() || mask.is_full() || voxel_count < config.min_voxels {
        debug!(
            label_id,
            voxel_count,
            min_voxels = config.min_voxels,
            "No surface for label"
        );
        return Err(empty);
    }

    let sigma = config.gaussian_sigma;
    let mut field = mask.to_padded_field(kernel_radius(sigma) + 1);
    field.values = gaussian_smooth(&field.values, sigma);

    let chain = BackendChain::from_kinds(&config.backends);
    let Some(extraction) = chain.extract(&field, config.iso_level as f32)? else {
        return Err(empty);
    };

    let mut mesh = extraction.mesh;
    apply_affine_in_place(&mut mesh, &world);
    debug!(
        label_id,
        voxel_count,
        backend = extraction.backend,
        vertices = mesh.vertex_count(),
        triangles = mesh.triangle_count(),
        "Extracted label surface"
    );
    Ok(ExtractedSurface {
        mesh,
        backend: extraction.backend,
        voxel_count,
    })
}

/// Extract the surface of one label in world millimetres
///
/// The mask is cropped to its occupied region, padded with zeros so the
/// surface closes at the volume border, Gaussian-smoothed with
/// `gaussian_sigma`, and meshed at `iso_level` by the configured backends.
/// An identity `affine` means index space with `spacing` millimetres per
/// voxel; any other affine already maps indices to millimetres.
///
/// # Errors
/// - [`Error::Config`] when `config` fails [`PipelineConfig::validate`]
/// - [`Error::EmptyMesh`] when the label is absent, fills the whole volume,
///   has fewer than `min_voxels` voxels, or yields no surface
/// - [`Error::InvalidAffine`] when the effective affine is singular
/// - [`Error::Backend`] when every backend fails
pub fn extract_label_mesh(
    labels: &Array3<u32>,
    label_id: u32,
    spacing: [f64; 3],
    affine: &Matrix4<f64>,
    config: &PipelineConfig,
) -> Result<Mesh> {
    extract_label_surface(labels, label_id, spacing, affine, config).map(|s| s.mesh)
}

/// Clean, smooth and repair an extracted mesh
///
/// `target_volume` is the volume smoothing preserves, normally the voxel
/// count times the voxel volume.
///
/// # Errors
/// [`Error::InvalidMesh`] when the mesh has no triangles or bad indices,
/// [`Error::Config`] when `config` is invalid. The stages themselves never
/// fail.
pub fn postprocess_mesh(
    mut mesh: Mesh,
    target_volume: f64,
    config: &PipelineConfig,
) -> Result<PostProcessed> {
    config.validate()?;
    if mesh.is_empty() {
        return Err(Error::InvalidMesh(
            "Cannot post-process an empty mesh".to_string(),
        ));
    }
    mesh.check_indices()?;

    let clean = clean_mesh(&mut mesh, &CleanParams::from(config));
    let smoothing =
        smooth_preserving_volume(&mut mesh, target_volume, &SmoothParams::from(config));
    let repair = make_watertight(&mut mesh, &RepairParams::from(config));
    Ok(PostProcessed {
        mesh,
        clean,
        smoothing,
        repair,
    })
}

/// Extract and post-process one label of a volume
///
/// The smoothing target is the voxel count times the volume of one voxel
/// in world space.
pub fn convert_label(
    volume: &LabeledVolume,
    label_id: u32,
    config: &PipelineConfig,
) -> Result<LabelMesh> {
    let surface = extract_label_surface(
        volume.labels(),
        label_id,
        volume.spacing(),
        volume.affine(),
        config,
    )?;
    let world = effective_affine(volume.affine(), volume.spacing());
    let voxel_volume = linear_determinant(&world).abs();
    let target = target_volume_from_voxels(surface.voxel_count, voxel_volume);
    let result = postprocess_mesh(surface.mesh, target, config)?;
    Ok(LabelMesh {
        label_id,
        voxel_count: surface.voxel_count,
        backend: surface.backend,
        result,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh_ops::{is_watertight, signed_volume};

    fn cube_labels(n: usize, lo: usize, hi: usize, label: u32) -> Array3<u32> {
        Array3::from_shape_fn((n, n, n), |(i, j, k)| {
            if (lo..hi).contains(&i) && (lo..hi).contains(&j) && (lo..hi).contains(&k) {
                label
            } else {
                0
            }
        })
    }

    #[test]
    fn test_empty_label() {
        let labels = cube_labels(10, 2, 7, 1);
        let err = extract_label_mesh(
            &labels,
            4,
            [1.0; 3],
            &Matrix4::identity(),
            &PipelineConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            Error::EmptyMesh {
                label_id: 4,
                voxel_count: 0
            }
        ));
    }

    #[test]
    fn test_below_min_voxels() {
        let labels = cube_labels(10, 2, 5, 1);
        let config = PipelineConfig::default();
        let err = extract_label_mesh(&labels, 1, [1.0; 3], &Matrix4::identity(), &config)
            .unwrap_err();
        assert!(matches!(err, Error::EmptyMesh { voxel_count: 27, .. }));

        let config = config.with_min_voxels(1);
        assert!(extract_label_mesh(&labels, 1, [1.0; 3], &Matrix4::identity(), &config).is_ok());
    }

    #[test]
    fn test_full_volume_is_empty() {
        let labels = Array3::from_elem((6, 6, 6), 2u32);
        let config = PipelineConfig::default().with_min_voxels(1);
        let err = extract_label_mesh(&labels, 2, [1.0; 3], &Matrix4::identity(), &config)
            .unwrap_err();
        assert!(err.is_empty_mesh());
    }

    #[test]
    fn test_spacing_scales_identity_affine() {
        let labels = cube_labels(16, 4, 12, 1);
        let config = PipelineConfig::default();
        let unit = extract_label_mesh(&labels, 1, [1.0; 3], &Matrix4::identity(), &config).unwrap();
        let scaled =
            extract_label_mesh(&labels, 1, [2.0, 1.0, 1.5], &Matrix4::identity(), &config).unwrap();
        let ratio = signed_volume(&scaled) / signed_volume(&unit);
        assert!((ratio - 3.0).abs() < 1e-9, "Ratio: {}", ratio);
        assert!(is_watertight(&unit));
    }

    #[test]
    fn test_singular_affine() {
        let labels = cube_labels(10, 2, 8, 1);
        let mut affine = Matrix4::identity();
        affine[(0, 0)] = 2.0;
        affine[(1, 1)] = 0.0;
        let err = extract_label_mesh(&labels, 1, [1.0; 3], &affine, &PipelineConfig::default())
            .unwrap_err();
        assert!(matches!(err, Error::InvalidAffine { .. }));
    }

    #[test]
    fn test_convert_label_preserves_volume() {
        let volume =
            LabeledVolume::with_spacing(cube_labels(20, 4, 16, 3), [0.8, 0.8, 1.5]).unwrap();
        let converted = convert_label(&volume, 3, &PipelineConfig::default()).unwrap();
        assert_eq!(converted.voxel_count, 12 * 12 * 12);
        assert_eq!(converted.backend, "marching_cubes");
        let expected = 1728.0 * 0.8 * 0.8 * 1.5;
        assert!((converted.result.smoothing.target_volume - expected).abs() < 1e-6);
        assert!(converted.result.smoothing.within_tolerance);
        assert!(converted.result.repair.finally_watertight);
    }

    #[test]
    fn test_invalid_config_rejected_before_extraction() {
        let volume = LabeledVolume::with_spacing(cube_labels(12, 2, 10, 1), [1.0; 3]).unwrap();
        for config in [
            PipelineConfig::default().with_gaussian_sigma(-0.5),
            PipelineConfig::default().with_smoothing(3, 1.5),
            PipelineConfig::default().with_backends(vec![]),
        ] {
            let err = convert_label(&volume, 1, &config).unwrap_err();
            assert!(matches!(err, Error::Config(_)), "Unexpected error {:?}", err);
        }

        let mesh = extract_label_mesh(
            volume.labels(),
            1,
            [1.0; 3],
            &Matrix4::identity(),
            &PipelineConfig::default(),
        )
        .unwrap();
        let err = postprocess_mesh(mesh, 512.0, &PipelineConfig::default().with_smoothing(3, 0.0))
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_postprocess_rejects_empty() {
        let err = postprocess_mesh(Mesh::new(), 1.0, &PipelineConfig::default()).unwrap_err();
        assert!(matches!(err, Error::InvalidMesh(_)));
    }
}
