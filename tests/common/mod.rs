//! Shared fixtures for the integration tests
//!
//! Synthetic labeled volumes with analytically known shapes, plus a closed
//! box mesh for tests that do not need an extracted surface.

#![allow(dead_code)]

use labelmesh::{LabeledVolume, Mesh, Triangle, Vertex};
use ndarray::Array3;

/// Cubic volume of edge `n` holding a ball of `radius` voxels labeled `label`
///
/// The ball is centered on the volume; a voxel is inside when its center
/// lies within `radius` of the volume center.
pub fn sphere_labels(n: usize, radius: f64, label: u32) -> Array3<u32> {
    let c = (n as f64 - 1.0) / 2.0;
    Array3::from_shape_fn((n, n, n), |(i, j, k)| {
        let d2 = (i as f64 - c).powi(2) + (j as f64 - c).powi(2) + (k as f64 - c).powi(2);
        if d2 <= radius * radius { label } else { 0 }
    })
}

/// Isotropic 1mm volume holding one ball
pub fn sphere_volume(n: usize, radius: f64, label: u32) -> LabeledVolume {
    LabeledVolume::with_spacing(sphere_labels(n, radius, label), [1.0; 3])
        .expect("valid synthetic volume")
}

/// Cylinder along Z through the volume center, capped `margin` voxels from the ends
pub fn cylinder_labels(dim: (usize, usize, usize), radius: f64, margin: usize, label: u32) -> Array3<u32> {
    let cx = (dim.0 as f64 - 1.0) / 2.0;
    let cy = (dim.1 as f64 - 1.0) / 2.0;
    Array3::from_shape_fn(dim, |(i, j, k)| {
        let d2 = (i as f64 - cx).powi(2) + (j as f64 - cy).powi(2);
        if d2 <= radius * radius && k >= margin && k + margin < dim.2 {
            label
        } else {
            0
        }
    })
}

/// Half-open voxel block `[lo, hi)` on each axis
#[derive(Debug, Clone, Copy)]
pub struct Block {
    pub lo: [usize; 3],
    pub hi: [usize; 3],
}

impl Block {
    pub fn cube(lo: usize, hi: usize) -> Self {
        Self {
            lo: [lo; 3],
            hi: [hi; 3],
        }
    }

    pub fn contains(&self, (i, j, k): (usize, usize, usize)) -> bool {
        (self.lo[0]..self.hi[0]).contains(&i)
            && (self.lo[1]..self.hi[1]).contains(&j)
            && (self.lo[2]..self.hi[2]).contains(&k)
    }

    pub fn voxel_count(&self) -> usize {
        (0..3).map(|a| self.hi[a] - self.lo[a]).product()
    }

    /// Face area in voxel units
    pub fn surface_area(&self) -> f64 {
        let e: Vec<f64> = (0..3).map(|a| (self.hi[a] - self.lo[a]) as f64).collect();
        2.0 * (e[0] * e[1] + e[1] * e[2] + e[0] * e[2])
    }
}

/// Cubic volume of edge `n` with labeled, non-touching blocks
pub fn block_labels(n: usize, blocks: &[(Block, u32)]) -> Array3<u32> {
    Array3::from_shape_fn((n, n, n), |idx| {
        blocks
            .iter()
            .find(|(b, _)| b.contains(idx))
            .map(|(_, label)| *label)
            .unwrap_or(0)
    })
}

/// Two disjoint blocks: label 1 is 12 voxels on a side, label 2 is 20
pub fn two_structures() -> (Array3<u32>, Block, Block) {
    let small = Block::cube(6, 18);
    let large = Block::cube(30, 50);
    (block_labels(56, &[(small, 1), (large, 2)]), small, large)
}

/// Closed, outward-wound axis-aligned box
pub fn box_mesh(min: [f64; 3], max: [f64; 3]) -> Mesh {
    let mut mesh = Mesh::new();
    for &(x, y, z) in &[
        (min[0], min[1], min[2]),
        (max[0], min[1], min[2]),
        (max[0], max[1], min[2]),
        (min[0], max[1], min[2]),
        (min[0], min[1], max[2]),
        (max[0], min[1], max[2]),
        (max[0], max[1], max[2]),
        (min[0], max[1], max[2]),
    ] {
        mesh.vertices.push(Vertex::new(x, y, z));
    }
    for &(a, b, c) in &[
        (3, 2, 1),
        (1, 0, 3),
        (4, 5, 6),
        (6, 7, 4),
        (0, 1, 5),
        (5, 4, 0),
        (1, 2, 6),
        (6, 5, 1),
        (2, 3, 7),
        (7, 6, 2),
        (3, 0, 4),
        (4, 7, 3),
    ] {
        mesh.triangles.push(Triangle::new(a, b, c));
    }
    mesh
}
