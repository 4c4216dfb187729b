//! Separable Gaussian pre-smoothing of occupancy fields
//!
//! Blurring the 0/1 mask slightly before isosurface extraction removes the
//! stair-step pattern of voxelized segmentations. Samples outside the grid
//! are treated as zero.

use ndarray::{Array3, ArrayView1, ArrayViewMut1, Axis, Zip};

/// Normalized 1D Gaussian kernel truncated at four standard deviations
///
/// The kernel has `2 * radius + 1` taps with `radius = floor(4 * sigma + 0.5)`.
pub fn gaussian_kernel(sigma: f64) -> Vec<f32> {
    let radius = (4.0 * sigma + 0.5) as i64;
    let weights: Vec<f64> = (-radius..=radius)
        .map(|x| (-0.5 * (x as f64 / sigma).powi(2)).exp())
        .collect();
    let total: f64 = weights.iter().sum();
    weights.into_iter().map(|w| (w / total) as f32).collect()
}

/// Kernel radius used for a given sigma
pub fn kernel_radius(sigma: f64) -> usize {
    if sigma > 0.0 {
        (4.0 * sigma + 0.5) as usize
    } else {
        0
    }
}

/// Smooth a field with an isotropic Gaussian of standard deviation `sigma` voxels
///
/// A non-positive sigma returns an unchanged copy. Each axis is convolved in
/// turn with lanes processed in parallel.
pub fn gaussian_smooth(field: &Array3<f32>, sigma: f64) -> Array3<f32> {
    if !(sigma > 0.0) {
        return field.clone();
    }
    let kernel = gaussian_kernel(sigma);

    let mut current = field.clone();
    for axis in 0..3 {
        let mut out = Array3::<f32>::zeros(current.raw_dim());
        Zip::from(out.lanes_mut(Axis(axis)))
            .and(current.lanes(Axis(axis)))
            .par_for_each(|output, input| convolve_lane(input, output, &kernel));
        current = out;
    }
    current
}

fn convolve_lane(input: ArrayView1<'_, f32>, mut output: ArrayViewMut1<'_, f32>, kernel: &[f32]) {
    let radius = (kernel.len() / 2) as isize;
    let len = input.len() as isize;
    for n in 0..len {
        let mut acc = 0.0f32;
        for (t, &w) in kernel.iter().enumerate() {
            let idx = n + t as isize - radius;
            if (0..len).contains(&idx) {
                acc += w * input[idx as usize];
            }
        }
        output[n as usize] = acc;
    }
}
