//! Labeled volumes, binary masks and scalar fields

use crate::error::{Error, Result};
use nalgebra::Matrix4;
use ndarray::{Array3, Zip, s};
use rayon::prelude::*;
use std::collections::BTreeMap;

/// A dense 3D grid of integer structure labels with its spatial metadata
///
/// Indexed `[i, j, k]` along x, y, z. Label 0 is background.
#[derive(Debug, Clone)]
pub struct LabeledVolume {
    labels: Array3<u32>,
    spacing: [f64; 3],
    affine: Matrix4<f64>,
}

impl LabeledVolume {
    /// Create a volume, checking its metadata
    ///
    /// # Errors
    ///
    /// Returns [`Error::Load`] when a dimension is zero, a spacing value is not
    /// a positive finite number, or the affine is not invertible.
    pub fn new(labels: Array3<u32>, spacing: [f64; 3], affine: Matrix4<f64>) -> Result<Self> {
        let (nx, ny, nz) = labels.dim();
        if nx == 0 || ny == 0 || nz == 0 {
            return Err(Error::load(format!(
                "volume has a zero-sized dimension ({} x {} x {})",
                nx, ny, nz
            )));
        }
        if spacing.iter().any(|s| !(s.is_finite() && *s > 0.0)) {
            return Err(Error::load(format!(
                "voxel spacing must be positive, got {:?}",
                spacing
            )));
        }
        let det = affine.fixed_view::<3, 3>(0, 0).determinant();
        if !det.is_finite() || det.abs() < 1e-12 || affine.try_inverse().is_none() {
            return Err(Error::load(format!(
                "affine transform is not invertible (determinant {})",
                det
            )));
        }
        Ok(Self {
            labels,
            spacing,
            affine,
        })
    }

    /// Create a volume in index space scaled by `spacing`
    ///
    /// The affine is `diag(spacing, 1)`.
    pub fn with_spacing(labels: Array3<u32>, spacing: [f64; 3]) -> Result<Self> {
        let affine = Matrix4::new_nonuniform_scaling(&nalgebra::Vector3::from(spacing));
        Self::new(labels, spacing, affine)
    }

    /// Dimensions (x, y, z)
    pub fn dim(&self) -> (usize, usize, usize) {
        self.labels.dim()
    }

    /// The label grid
    pub fn labels(&self) -> &Array3<u32> {
        &self.labels
    }

    /// Voxel spacing in millimetres per axis
    pub fn spacing(&self) -> [f64; 3] {
        self.spacing
    }

    /// Voxel index to world transform
    pub fn affine(&self) -> &Matrix4<f64> {
        &self.affine
    }

    /// Volume of one voxel in cubic millimetres
    pub fn voxel_volume(&self) -> f64 {
        self.spacing.iter().product()
    }

    /// Produce the occupancy mask of one label
    ///
    /// `mask[i, j, k]` is true exactly where the volume holds `label_id`.
    pub fn isolate(&self, label_id: u32) -> BinaryMask {
        BinaryMask::isolate(&self.labels, label_id)
    }

    /// Number of voxels per label, background included
    pub fn label_counts(&self) -> BTreeMap<u32, usize> {
        self.labels
            .par_iter()
            .fold(BTreeMap::new, |mut acc, &label| {
                *acc.entry(label).or_insert(0) += 1;
                acc
            })
            .reduce(BTreeMap::new, |mut a, b| {
                for (label, count) in b {
                    *a.entry(label).or_insert(0) += count;
                }
                a
            })
    }

    /// Labels other than background present in the volume, ascending
    pub fn labels_present(&self) -> Vec<u32> {
        self.label_counts()
            .into_keys()
            .filter(|&label| label != 0)
            .collect()
    }
}

/// Inclusive index bounds of the occupied voxels of a mask
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaskBounds {
    /// Smallest occupied index per axis
    pub min: [usize; 3],
    /// Largest occupied index per axis
    pub max: [usize; 3],
}

/// Boolean occupancy of one label
#[derive(Debug, Clone)]
pub struct BinaryMask {
    data: Array3<bool>,
    count: usize,
}

impl BinaryMask {
    /// Wrap an occupancy grid
    pub fn from_array(data: Array3<bool>) -> Self {
        let count = data.iter().filter(|&&b| b).count();
        Self { data, count }
    }

    /// Occupancy of `label_id` in a label grid
    pub fn isolate(labels: &Array3<u32>, label_id: u32) -> Self {
        let data = Zip::from(labels).par_map_collect(|&v| v == label_id);
        let count = data.par_iter().filter(|&&b| b).count();
        Self { data, count }
    }

    /// The occupancy grid
    pub fn data(&self) -> &Array3<bool> {
        &self.data
    }

    /// Dimensions (x, y, z)
    pub fn dim(&self) -> (usize, usize, usize) {
        self.data.dim()
    }

    /// Number of occupied voxels
    pub fn count(&self) -> usize {
        self.count
    }

    /// True when no voxel is occupied
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// True when every voxel is occupied
    pub fn is_full(&self) -> bool {
        self.count == self.data.len()
    }

    /// Index bounds of the occupied voxels, or `None` for an empty mask
    pub fn bounds(&self) -> Option<MaskBounds> {
        if self.is_empty() {
            return None;
        }
        let mut min = [usize::MAX; 3];
        let mut max = [0usize; 3];
        for ((i, j, k), &occupied) in self.data.indexed_iter() {
            if occupied {
                for (a, idx) in [i, j, k].into_iter().enumerate() {
                    min[a] = min[a].min(idx);
                    max[a] = max[a].max(idx);
                }
            }
        }
        Some(MaskBounds { min, max })
    }

    /// Crop to the occupied region surrounded by `pad` zero voxels
    ///
    /// The returned field's origin records the index-space position of its
    /// first sample, which may be negative when the region touches the
    /// volume border.
    pub fn to_padded_field(&self, pad: usize) -> ScalarField {
        let Some(bounds) = self.bounds() else {
            return ScalarField {
                values: Array3::zeros((1, 1, 1)),
                origin: [0.0; 3],
            };
        };
        let shape = [0, 1, 2].map(|a| bounds.max[a] - bounds.min[a] + 1 + 2 * pad);
        let mut values = Array3::<f32>::zeros((shape[0], shape[1], shape[2]));

        let source = self.data.slice(s![
            bounds.min[0]..=bounds.max[0],
            bounds.min[1]..=bounds.max[1],
            bounds.min[2]..=bounds.max[2]
        ]);
        let mut target = values.slice_mut(s![
            pad..shape[0] - pad,
            pad..shape[1] - pad,
            pad..shape[2] - pad
        ]);
        Zip::from(&mut target)
            .and(&source)
            .for_each(|t, &m| *t = if m { 1.0 } else { 0.0 });

        ScalarField {
            values,
            origin: bounds.min.map(|m| m as f64 - pad as f64),
        }
    }
}

/// A sampled scalar field positioned in voxel-index space
#[derive(Debug, Clone)]
pub struct ScalarField {
    /// Samples indexed `[i, j, k]`
    pub values: Array3<f32>,
    /// Index-space coordinate of sample `[0, 0, 0]`
    pub origin: [f64; 3],
}

impl ScalarField {
    /// Wrap samples whose first element sits at the index-space origin
    pub fn new(values: Array3<f32>) -> Self {
        Self {
            values,
            origin: [0.0; 3],
        }
    }

    /// True when some samples lie below `iso` and others at or above it
    pub fn has_crossing(&self, iso: f32) -> bool {
        let mut below = false;
        let mut above = false;
        for &v in self.values.iter() {
            if v < iso {
                below = true;
            } else {
                above = true;
            }
            if below && above {
                return true;
            }
        }
        false
    }
}
