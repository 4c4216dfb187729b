//! Mesh data structures shared by every pipeline stage

use crate::error::{Error, Result};
use nalgebra::Vector3;

/// A vertex in 3D space
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vertex {
    /// X coordinate
    pub x: f64,
    /// Y coordinate
    pub y: f64,
    /// Z coordinate
    pub z: f64,
}

impl Vertex {
    /// Create a new vertex
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Position as a nalgebra vector
    pub fn to_vector(self) -> Vector3<f64> {
        Vector3::new(self.x, self.y, self.z)
    }

    /// Position as an array indexed by axis
    pub fn to_array(self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }

    /// Coordinate along `axis` (0 = X, 1 = Y, 2 = Z)
    pub fn axis(&self, axis: usize) -> f64 {
        match axis {
            0 => self.x,
            1 => self.y,
            _ => self.z,
        }
    }
}

impl From<Vector3<f64>> for Vertex {
    fn from(v: Vector3<f64>) -> Self {
        Self::new(v.x, v.y, v.z)
    }
}

impl From<[f64; 3]> for Vertex {
    fn from(a: [f64; 3]) -> Self {
        Self::new(a[0], a[1], a[2])
    }
}

/// A triangle defined by three vertex indices
///
/// Counter-clockwise order seen from outside gives the outward normal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Triangle {
    /// Index of first vertex
    pub v1: usize,
    /// Index of second vertex
    pub v2: usize,
    /// Index of third vertex
    pub v3: usize,
}

impl Triangle {
    /// Create a new triangle
    pub fn new(v1: usize, v2: usize, v3: usize) -> Self {
        Self { v1, v2, v3 }
    }

    /// The three indices in winding order
    pub fn indices(&self) -> [usize; 3] {
        [self.v1, self.v2, self.v3]
    }

    /// The same triangle with opposite winding
    pub fn flipped(&self) -> Self {
        Self::new(self.v1, self.v3, self.v2)
    }

    /// The three directed edges in winding order
    pub fn edges(&self) -> [(usize, usize); 3] {
        [(self.v1, self.v2), (self.v2, self.v3), (self.v3, self.v1)]
    }

    /// True when two corners share a vertex index
    pub fn is_collapsed(&self) -> bool {
        self.v1 == self.v2 || self.v2 == self.v3 || self.v3 == self.v1
    }
}

/// A triangle mesh
///
/// Produced by isosurface extraction and transformed by every later stage.
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    /// List of vertices
    pub vertices: Vec<Vertex>,
    /// List of triangles
    pub triangles: Vec<Triangle>,
    /// Per-vertex unit normals; empty until computed by the clean step
    pub normals: Vec<[f64; 3]>,
}

impl Mesh {
    /// Create a new empty mesh
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new mesh with pre-allocated capacity
    pub fn with_capacity(vertices: usize, triangles: usize) -> Self {
        Self {
            vertices: Vec::with_capacity(vertices),
            triangles: Vec::with_capacity(triangles),
            normals: Vec::new(),
        }
    }

    /// Build a mesh from raw parts, checking every index
    pub fn from_parts(vertices: Vec<Vertex>, triangles: Vec<Triangle>) -> Result<Self> {
        let mesh = Self {
            vertices,
            triangles,
            normals: Vec::new(),
        };
        mesh.check_indices()?;
        Ok(mesh)
    }

    /// Number of vertices
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Number of triangles
    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    /// True when the mesh has no triangles
    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    /// Corner positions of a triangle
    ///
    /// Indices must be valid; see [`Mesh::check_indices`].
    pub fn corners(&self, triangle: &Triangle) -> [Vector3<f64>; 3] {
        [
            self.vertices[triangle.v1].to_vector(),
            self.vertices[triangle.v2].to_vector(),
            self.vertices[triangle.v3].to_vector(),
        ]
    }

    /// Verify that every triangle references an existing vertex
    pub fn check_indices(&self) -> Result<()> {
        let n = self.vertices.len();
        for (i, t) in self.triangles.iter().enumerate() {
            if t.v1 >= n || t.v2 >= n || t.v3 >= n {
                return Err(Error::InvalidMesh(format!(
                    "Triangle {} references vertex ({}, {}, {}) but mesh has {} vertices",
                    i, t.v1, t.v2, t.v3, n
                )));
            }
        }
        Ok(())
    }

    /// Reverse the winding of every triangle
    pub fn flip_winding(&mut self) {
        for t in &mut self.triangles {
            *t = t.flipped();
        }
        for n in &mut self.normals {
            *n = [-n[0], -n[1], -n[2]];
        }
    }
}
