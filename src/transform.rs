//! Voxel-index to world coordinate mapping
//!
//! Every vertex is mapped through the 4x4 affine in homogeneous coordinates:
//! `v_world = (A * [v, 1])[..3]`. Vertex order and triangle topology are kept;
//! when the affine mirrors space the winding is reversed so that normals
//! still face outward.

use crate::error::{Error, Result};
use crate::model::{Mesh, Vertex};
use nalgebra::{Matrix3, Matrix4, Point3};

/// Map one point through an affine
#[inline]
pub fn transform_point(affine: &Matrix4<f64>, p: [f64; 3]) -> [f64; 3] {
    let q = affine.transform_point(&Point3::new(p[0], p[1], p[2]));
    [q.x, q.y, q.z]
}

/// Determinant of the linear (upper-left 3x3) part
pub fn linear_determinant(affine: &Matrix4<f64>) -> f64 {
    let linear: Matrix3<f64> = affine.fixed_view::<3, 3>(0, 0).into_owned();
    linear.determinant()
}

/// True when the affine mirrors space
pub fn is_reflection(affine: &Matrix4<f64>) -> bool {
    linear_determinant(affine) < 0.0
}

/// Invert an affine
///
/// # Errors
/// Returns [`Error::InvalidAffine`] when the matrix is singular.
pub fn invert_affine(affine: &Matrix4<f64>) -> Result<Matrix4<f64>> {
    let determinant = linear_determinant(affine);
    if !determinant.is_finite() || determinant.abs() < 1e-12 {
        return Err(Error::InvalidAffine { determinant });
    }
    affine
        .try_inverse()
        .ok_or(Error::InvalidAffine { determinant })
}

/// Map a world point back to voxel-index space
pub fn inverse_transform_point(affine: &Matrix4<f64>, p: [f64; 3]) -> Result<[f64; 3]> {
    Ok(transform_point(&invert_affine(affine)?, p))
}

/// Map every vertex of a mesh through an affine
pub fn apply_affine(mesh: &Mesh, affine: &Matrix4<f64>) -> Mesh {
    let mut out = mesh.clone();
    apply_affine_in_place(&mut out, affine);
    out
}

/// Map every vertex of a mesh through an affine, in place
///
/// Stored normals are dropped since they no longer match the geometry.
pub fn apply_affine_in_place(mesh: &mut Mesh, affine: &Matrix4<f64>) {
    for v in &mut mesh.vertices {
        *v = Vertex::from(transform_point(affine, v.to_array()));
    }
    mesh.normals.clear();
    if is_reflection(affine) {
        mesh.flip_winding();
    }
}

/// The affine that places index-space geometry in millimetres
///
/// An identity affine carries no spacing, so it is replaced by
/// `diag(spacing, 1)`; any other affine already maps indices to millimetres.
pub fn effective_affine(affine: &Matrix4<f64>, spacing: [f64; 3]) -> Matrix4<f64> {
    if *affine == Matrix4::identity() {
        Matrix4::new_nonuniform_scaling(&nalgebra::Vector3::from(spacing))
    } else {
        *affine
    }
}
