//! Property-based tests for labelmesh
//!
//! These tests use proptest to generate random transforms, label volumes
//! and meshes and verify invariants hold across a wide range of inputs.

use labelmesh::clean::{CleanParams, clean_mesh};
use labelmesh::mesh_ops::{compute_aabb, edge_incidence};
use labelmesh::print::scale_to_size;
use labelmesh::transform::{inverse_transform_point, transform_point};
use labelmesh::writer::sanitize_filename;
use labelmesh::{BinaryMask, Mesh, Triangle, Vertex};
use nalgebra::{Matrix4, Rotation3, Vector3};
use ndarray::Array3;
use proptest::prelude::*;
use std::collections::HashSet;

// ============================================================================
// Generators
// ============================================================================

/// Rotation, positive spacing and translation, the shape of scanner affines
fn affine_strategy() -> impl Strategy<Value = Matrix4<f64>> {
    (
        (-3.2f64..3.2, -3.2f64..3.2, -3.2f64..3.2),
        (0.2f64..5.0, 0.2f64..5.0, 0.2f64..5.0),
        (-500.0f64..500.0, -500.0f64..500.0, -500.0f64..500.0),
        any::<bool>(),
    )
        .prop_map(|(angles, spacing, offset, flip)| {
            let rotation = Rotation3::from_euler_angles(angles.0, angles.1, angles.2);
            let sign = if flip { -1.0 } else { 1.0 };
            let scale = Matrix4::new_nonuniform_scaling(&Vector3::new(
                sign * spacing.0,
                spacing.1,
                spacing.2,
            ));
            let mut affine = rotation.to_homogeneous() * scale;
            affine[(0, 3)] = offset.0;
            affine[(1, 3)] = offset.1;
            affine[(2, 3)] = offset.2;
            affine
        })
}

fn point_strategy() -> impl Strategy<Value = [f64; 3]> {
    (-300.0f64..300.0, -300.0f64..300.0, -300.0f64..300.0).prop_map(|(x, y, z)| [x, y, z])
}

/// Small volume with labels 0..4
fn labels_strategy() -> impl Strategy<Value = Array3<u32>> {
    (1usize..8, 1usize..8, 1usize..8).prop_flat_map(|(nx, ny, nz)| {
        prop::collection::vec(0u32..4, nx * ny * nz).prop_map(move |values| {
            Array3::from_shape_vec((nx, ny, nz), values).expect("shape matches length")
        })
    })
}

/// Mesh with in-range indices, possibly degenerate, duplicated or non-manifold
fn messy_mesh_strategy() -> impl Strategy<Value = Mesh> {
    prop::collection::vec((-10i32..10, -10i32..10, -10i32..10), 3..40).prop_flat_map(|points| {
        let n = points.len();
        prop::collection::vec((0..n, 0..n, 0..n), 1..80).prop_map(move |faces| {
            let mut mesh = Mesh::new();
            // a coarse lattice makes coincident vertices likely
            mesh.vertices = points
                .iter()
                .map(|&(x, y, z)| Vertex::new(x as f64 * 0.5, y as f64 * 0.5, z as f64 * 0.5))
                .collect();
            mesh.triangles = faces
                .iter()
                .map(|&(a, b, c)| Triangle::new(a, b, c))
                .collect();
            mesh
        })
    })
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    /// Mapping a point to world space and back returns the same point
    #[test]
    fn test_affine_roundtrip(affine in affine_strategy(), p in point_strategy()) {
        let world = transform_point(&affine, p);
        let back = inverse_transform_point(&affine, world).unwrap();
        for axis in 0..3 {
            prop_assert!((back[axis] - p[axis]).abs() < 1e-6, "{:?} -> {:?}", p, back);
        }
    }

    /// Isolation marks exactly the voxels carrying the label
    #[test]
    fn test_isolation_matches_labels(labels in labels_strategy(), label_id in 0u32..5) {
        let mask = BinaryMask::isolate(&labels, label_id);
        prop_assert_eq!(mask.dim(), labels.dim());
        let expected = labels.iter().filter(|&&l| l == label_id).count();
        prop_assert_eq!(mask.count(), expected);
        for (inside, label) in mask.data().iter().zip(labels.iter()) {
            prop_assert_eq!(*inside, *label == label_id);
        }
        prop_assert_eq!(mask.is_empty(), expected == 0);
        prop_assert_eq!(mask.is_full(), expected == labels.len());
    }

    /// Cleaning leaves no degenerate, duplicate or orphaned elements and is idempotent
    #[test]
    fn test_clean_invariants(mut mesh in messy_mesh_strategy()) {
        clean_mesh(&mut mesh, &CleanParams::default());

        let mut used = vec![false; mesh.vertex_count()];
        let mut seen = HashSet::new();
        for t in &mesh.triangles {
            prop_assert!(!t.is_collapsed());
            let mut key = t.indices();
            key.sort_unstable();
            prop_assert!(seen.insert(key));
            for i in t.indices() {
                prop_assert!(i < mesh.vertex_count());
                used[i] = true;
            }
        }
        prop_assert!(used.iter().all(|&u| u));
        prop_assert!(edge_incidence(&mesh).values().all(|&n| n <= 2));

        let again = clean_mesh(&mut mesh, &CleanParams::default());
        prop_assert!(again.is_clean(), "{:?}", again);
    }

    /// Scaling always lands the largest dimension on the target
    #[test]
    fn test_scale_to_target(
        extent in (0.1f64..500.0, 0.1f64..500.0, 0.1f64..500.0),
        target in 1.0f64..400.0,
    ) {
        let mut mesh = Mesh::new();
        mesh.vertices.push(Vertex::new(0.0, 0.0, 0.0));
        mesh.vertices.push(Vertex::new(extent.0, 0.0, 0.0));
        mesh.vertices.push(Vertex::new(0.0, extent.1, 0.0));
        mesh.vertices.push(Vertex::new(0.0, 0.0, extent.2));
        mesh.triangles.push(Triangle::new(0, 2, 1));
        mesh.triangles.push(Triangle::new(0, 1, 3));
        mesh.triangles.push(Triangle::new(0, 3, 2));
        mesh.triangles.push(Triangle::new(1, 2, 3));

        scale_to_size(&mut mesh, target).unwrap();
        let bounds = compute_aabb(&mesh).unwrap();
        prop_assert!((bounds.max_dimension() - target).abs() < 1e-9 * target.max(1.0));
        prop_assert!(bounds.min[2].abs() < 1e-9 * target.max(1.0));
    }

    /// Sanitized names are non-empty and only hold safe characters
    #[test]
    fn test_sanitized_names_are_safe(name in ".{0,40}") {
        let stem = sanitize_filename(&name);
        prop_assert!(!stem.is_empty());
        prop_assert!(stem.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        prop_assert!(!stem.starts_with('_') && !stem.ends_with('_'));
    }
}
