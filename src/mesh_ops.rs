//! Geometric and topological measurements on triangle meshes
//!
//! This module provides the measurements the rest of the pipeline is built on:
//! - Signed volume (divergence theorem) and surface area
//! - Axis-aligned bounding box
//! - Face and area-weighted vertex normals
//! - Edge incidence and vertex adjacency
//!
//! None of these functions mutate the mesh.

use crate::error::{Error, Result};
use crate::model::{Mesh, Vertex};
use nalgebra::Vector3;
use std::collections::HashMap;

/// An undirected edge stored as (smaller index, larger index)
pub type EdgeKey = (usize, usize);

/// Build the canonical key for an undirected edge
#[inline]
pub fn edge_key(a: usize, b: usize) -> EdgeKey {
    if a < b { (a, b) } else { (b, a) }
}

/// An axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    /// Minimum corner
    pub min: [f64; 3],
    /// Maximum corner
    pub max: [f64; 3],
}

impl BoundingBox {
    /// Size along each axis
    pub fn extent(&self) -> [f64; 3] {
        [
            self.max[0] - self.min[0],
            self.max[1] - self.min[1],
            self.max[2] - self.min[2],
        ]
    }

    /// Largest size over the three axes
    pub fn max_dimension(&self) -> f64 {
        let e = self.extent();
        e[0].max(e[1]).max(e[2])
    }

    /// Centre point
    pub fn center(&self) -> [f64; 3] {
        [
            0.5 * (self.min[0] + self.max[0]),
            0.5 * (self.min[1] + self.max[1]),
            0.5 * (self.min[2] + self.max[2]),
        ]
    }

    /// True when the two boxes share any volume
    pub fn overlaps(&self, other: &BoundingBox) -> bool {
        (0..3).all(|a| self.min[a] < other.max[a] && other.min[a] < self.max[a])
    }
}

/// Compute the signed volume of a mesh using the divergence theorem
///
/// `V = (1/6) Σ v0 · (v1 × v2)` over all triangles. For a watertight mesh with
/// outward winding the volume is positive; negative volume indicates inverted
/// triangles. Triangles with invalid indices are skipped.
pub fn signed_volume(mesh: &Mesh) -> f64 {
    let n = mesh.vertices.len();
    let mut volume = 0.0_f64;
    for t in &mesh.triangles {
        if t.v1 >= n || t.v2 >= n || t.v3 >= n {
            continue;
        }
        let v1 = &mesh.vertices[t.v1];
        let v2 = &mesh.vertices[t.v2];
        let v3 = &mesh.vertices[t.v3];

        volume += v1.x * (v2.y * v3.z - v2.z * v3.y)
            + v2.x * (v3.y * v1.z - v3.z * v1.y)
            + v3.x * (v1.y * v2.z - v1.z * v2.y);
    }
    volume / 6.0
}

/// Total surface area of all triangles
pub fn surface_area(mesh: &Mesh) -> f64 {
    let n = mesh.vertices.len();
    mesh.triangles
        .iter()
        .filter(|t| t.v1 < n && t.v2 < n && t.v3 < n)
        .map(|t| {
            let [a, b, c] = mesh.corners(t);
            triangle_area(&a, &b, &c)
        })
        .sum()
}

/// Area of the triangle (a, b, c)
#[inline]
pub fn triangle_area(a: &Vector3<f64>, b: &Vector3<f64>, c: &Vector3<f64>) -> f64 {
    0.5 * (b - a).cross(&(c - a)).norm()
}

/// Compute the axis-aligned bounding box of a mesh's vertices
///
/// # Errors
/// Returns [`Error::InvalidMesh`] when the mesh has no vertices.
pub fn compute_aabb(mesh: &Mesh) -> Result<BoundingBox> {
    let first = mesh.vertices.first().ok_or_else(|| {
        Error::InvalidMesh("Cannot compute bounding box of empty mesh".to_string())
    })?;

    let mut bbox = BoundingBox {
        min: first.to_array(),
        max: first.to_array(),
    };
    for v in &mesh.vertices[1..] {
        let p = v.to_array();
        for a in 0..3 {
            bbox.min[a] = bbox.min[a].min(p[a]);
            bbox.max[a] = bbox.max[a].max(p[a]);
        }
    }
    Ok(bbox)
}

/// Arithmetic mean of the vertex positions
pub fn vertex_centroid(vertices: &[Vertex]) -> Vector3<f64> {
    if vertices.is_empty() {
        return Vector3::zeros();
    }
    let sum: Vector3<f64> = vertices.iter().map(|v| v.to_vector()).sum();
    sum / vertices.len() as f64
}

/// Calculate the unit normal of a single triangle face
///
/// Returns the zero vector for degenerate (zero area) triangles.
pub fn calculate_face_normal(v0: &Vertex, v1: &Vertex, v2: &Vertex) -> Vector3<f64> {
    let cross = (v1.to_vector() - v0.to_vector()).cross(&(v2.to_vector() - v0.to_vector()));
    let magnitude = cross.norm();
    if magnitude > 0.0 {
        cross / magnitude
    } else {
        Vector3::zeros()
    }
}

/// Calculate area-weighted vertex normals for an entire mesh
///
/// The unnormalized cross product of a face has magnitude 2 * area, so adding
/// it directly to each corner weights faces by their area. Vertices not
/// referenced by any valid triangle get a zero normal.
pub fn calculate_vertex_normals(mesh: &Mesh) -> Vec<[f64; 3]> {
    let n = mesh.vertices.len();
    let mut normals = vec![Vector3::<f64>::zeros(); n];

    for t in &mesh.triangles {
        if t.v1 >= n || t.v2 >= n || t.v3 >= n {
            continue;
        }
        let [a, b, c] = mesh.corners(t);
        let weighted = (b - a).cross(&(c - a));
        if weighted.norm() > 0.0 {
            normals[t.v1] += weighted;
            normals[t.v2] += weighted;
            normals[t.v3] += weighted;
        }
    }

    normals
        .into_iter()
        .map(|v| {
            let magnitude = v.norm();
            if magnitude > 0.0 {
                let u = v / magnitude;
                [u.x, u.y, u.z]
            } else {
                [0.0, 0.0, 0.0]
            }
        })
        .collect()
}

/// Count how many triangles use each undirected edge
pub fn edge_incidence(mesh: &Mesh) -> HashMap<EdgeKey, usize> {
    let mut counts: HashMap<EdgeKey, usize> = HashMap::with_capacity(mesh.triangles.len() * 2);
    for t in &mesh.triangles {
        for (a, b) in t.edges() {
            *counts.entry(edge_key(a, b)).or_insert(0) += 1;
        }
    }
    counts
}

/// Directed boundary edges in the winding order of their single triangle
///
/// An edge is on the boundary when exactly one triangle uses it.
pub fn boundary_edges(mesh: &Mesh) -> Vec<(usize, usize)> {
    let counts = edge_incidence(mesh);
    mesh.triangles
        .iter()
        .flat_map(|t| t.edges())
        .filter(|&(a, b)| counts.get(&edge_key(a, b)) == Some(&1))
        .collect()
}

/// True when every edge is shared by exactly two triangles
pub fn is_watertight(mesh: &Mesh) -> bool {
    !mesh.triangles.is_empty() && edge_incidence(mesh).values().all(|&c| c == 2)
}

/// Topological neighbours of every vertex, sorted and deduplicated
pub fn vertex_neighbors(mesh: &Mesh) -> Vec<Vec<usize>> {
    let mut neighbors: Vec<Vec<usize>> = vec![Vec::new(); mesh.vertices.len()];
    for t in &mesh.triangles {
        for (a, b) in t.edges() {
            neighbors[a].push(b);
            neighbors[b].push(a);
        }
    }
    for list in &mut neighbors {
        list.sort_unstable();
        list.dedup();
    }
    neighbors
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::model::Triangle;

    /// Unit cube with outward (counter-clockwise) winding
    pub(crate) fn unit_cube() -> Mesh {
        let mut mesh = Mesh::new();
        mesh.vertices.push(Vertex::new(0.0, 0.0, 0.0)); // 0
        mesh.vertices.push(Vertex::new(1.0, 0.0, 0.0)); // 1
        mesh.vertices.push(Vertex::new(1.0, 1.0, 0.0)); // 2
        mesh.vertices.push(Vertex::new(0.0, 1.0, 0.0)); // 3
        mesh.vertices.push(Vertex::new(0.0, 0.0, 1.0)); // 4
        mesh.vertices.push(Vertex::new(1.0, 0.0, 1.0)); // 5
        mesh.vertices.push(Vertex::new(1.0, 1.0, 1.0)); // 6
        mesh.vertices.push(Vertex::new(0.0, 1.0, 1.0)); // 7

        // Bottom face (z=0)
        mesh.triangles.push(Triangle::new(0, 2, 1));
        mesh.triangles.push(Triangle::new(0, 3, 2));
        // Top face (z=1)
        mesh.triangles.push(Triangle::new(4, 5, 6));
        mesh.triangles.push(Triangle::new(4, 6, 7));
        // Front face (y=0)
        mesh.triangles.push(Triangle::new(0, 1, 5));
        mesh.triangles.push(Triangle::new(0, 5, 4));
        // Back face (y=1)
        mesh.triangles.push(Triangle::new(3, 7, 6));
        mesh.triangles.push(Triangle::new(3, 6, 2));
        // Left face (x=0)
        mesh.triangles.push(Triangle::new(0, 4, 7));
        mesh.triangles.push(Triangle::new(0, 7, 3));
        // Right face (x=1)
        mesh.triangles.push(Triangle::new(1, 2, 6));
        mesh.triangles.push(Triangle::new(1, 6, 5));
        mesh
    }

    #[test]
    fn test_signed_volume_cube() {
        let mesh = unit_cube();
        let volume = signed_volume(&mesh);
        assert!((volume - 1.0).abs() < 1e-10, "Signed volume: {}", volume);
    }

    #[test]
    fn test_signed_volume_inverted() {
        let mut mesh = unit_cube();
        mesh.flip_winding();
        let volume = signed_volume(&mesh);
        assert!((volume + 1.0).abs() < 1e-10, "Signed volume: {}", volume);
    }

    #[test]
    fn test_signed_volume_skips_invalid_indices() {
        let mut mesh = unit_cube();
        mesh.triangles.push(Triangle::new(0, 1, 99));
        assert!((signed_volume(&mesh) - 1.0).abs() < 1e-10);
    }

    #[test]
    fn test_surface_area_cube() {
        let area = surface_area(&unit_cube());
        assert!((area - 6.0).abs() < 1e-10, "Area: {}", area);
    }

    #[test]
    fn test_compute_aabb() {
        let bbox = compute_aabb(&unit_cube()).unwrap();
        assert_eq!(bbox.min, [0.0, 0.0, 0.0]);
        assert_eq!(bbox.max, [1.0, 1.0, 1.0]);
        assert_eq!(bbox.max_dimension(), 1.0);
        assert_eq!(bbox.center(), [0.5, 0.5, 0.5]);
    }

    #[test]
    fn test_empty_mesh_aabb() {
        assert!(compute_aabb(&Mesh::new()).is_err());
    }

    #[test]
    fn test_bbox_overlap() {
        let a = BoundingBox {
            min: [0.0; 3],
            max: [1.0; 3],
        };
        let b = BoundingBox {
            min: [0.5; 3],
            max: [2.0; 3],
        };
        let c = BoundingBox {
            min: [3.0; 3],
            max: [4.0; 3],
        };
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
    }

    #[test]
    fn test_calculate_face_normal_simple() {
        let normal = calculate_face_normal(
            &Vertex::new(0.0, 0.0, 0.0),
            &Vertex::new(1.0, 0.0, 0.0),
            &Vertex::new(0.0, 1.0, 0.0),
        );
        assert!((normal.z - 1.0).abs() < 1e-10);
    }

    #[test]
    fn test_calculate_face_normal_degenerate() {
        let normal = calculate_face_normal(
            &Vertex::new(0.0, 0.0, 0.0),
            &Vertex::new(1.0, 0.0, 0.0),
            &Vertex::new(2.0, 0.0, 0.0),
        );
        assert_eq!(normal, Vector3::zeros());
    }

    #[test]
    fn test_vertex_normals_cube_point_outward() {
        let mesh = unit_cube();
        let normals = calculate_vertex_normals(&mesh);
        let center = Vector3::new(0.5, 0.5, 0.5);
        for (v, n) in mesh.vertices.iter().zip(&normals) {
            let outward = v.to_vector() - center;
            let n = Vector3::new(n[0], n[1], n[2]);
            assert!(n.dot(&outward) > 0.0, "Normal {:?} points inward at {:?}", n, v);
            assert!((n.norm() - 1.0).abs() < 1e-10);
        }
    }

    #[test]
    fn test_watertight_cube_and_open_cube() {
        let mut mesh = unit_cube();
        assert!(is_watertight(&mesh));
        assert!(boundary_edges(&mesh).is_empty());

        mesh.triangles.pop();
        assert!(!is_watertight(&mesh));
        assert_eq!(boundary_edges(&mesh).len(), 3);
    }

    #[test]
    fn test_vertex_neighbors() {
        let mesh = unit_cube();
        let neighbors = vertex_neighbors(&mesh);
        assert_eq!(neighbors.len(), 8);
        assert!(neighbors[0].contains(&1));
        assert!(neighbors[0].contains(&4));
        assert!(!neighbors[0].contains(&0));
        assert!(!neighbors[0].contains(&6));
    }
}
