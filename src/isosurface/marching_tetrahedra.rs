//! Marching tetrahedra
//!
//! Every cell is split into six tetrahedra around its main diagonal. The split
//! is the same in every cell, so shared faces are cut identically and the
//! output stays closed without any case table.

use super::IsosurfaceBackend;
use super::tables::CORNER_OFFSETS;
use crate::error::{Error, Result};
use crate::model::{Mesh, Triangle, Vertex};
use crate::volume::ScalarField;
use nalgebra::Vector3;
use std::collections::HashMap;

/// Corner indices of the six tetrahedra sharing the 0-7 diagonal
const TETRAHEDRA: [[usize; 4]; 6] = [
    [0, 1, 3, 7],
    [0, 1, 5, 7],
    [0, 2, 3, 7],
    [0, 2, 6, 7],
    [0, 4, 5, 7],
    [0, 4, 6, 7],
];

/// Marching tetrahedra over a six-tetrahedron cell split
#[derive(Debug, Clone, Copy, Default)]
pub struct MarchingTetrahedra;

struct Builder<'a> {
    field: &'a ScalarField,
    iso: f32,
    dims: (usize, usize, usize),
    mesh: Mesh,
    edge_vertex: HashMap<(usize, usize), usize>,
}

impl Builder<'_> {
    fn linear(&self, p: [usize; 3]) -> usize {
        (p[2] * self.dims.1 + p[1]) * self.dims.0 + p[0]
    }

    fn position(&self, p: [usize; 3]) -> Vector3<f64> {
        Vector3::new(
            self.field.origin[0] + p[0] as f64,
            self.field.origin[1] + p[1] as f64,
            self.field.origin[2] + p[2] as f64,
        )
    }

    fn value(&self, p: [usize; 3]) -> f32 {
        self.field.values[p]
    }

    /// Vertex on the crossing edge between grid points `a` and `b`
    fn edge_vertex(&mut self, a: [usize; 3], b: [usize; 3]) -> usize {
        let (la, lb) = (self.linear(a), self.linear(b));
        let key = if la < lb { (la, lb) } else { (lb, la) };
        if let Some(&index) = self.edge_vertex.get(&key) {
            return index;
        }
        // interpolate from the lower endpoint so both cells agree on the position
        let (a, b) = if la < lb { (a, b) } else { (b, a) };
        let (va, vb) = (self.value(a), self.value(b));
        let t = f64::from((self.iso - va) / (vb - va));
        let p = self.position(a) + (self.position(b) - self.position(a)) * t;
        let index = self.mesh.vertices.len();
        self.mesh.vertices.push(Vertex::from(p));
        self.edge_vertex.insert(key, index);
        index
    }

    /// Emit a triangle whose normal points along `outward`
    fn emit(&mut self, v: [usize; 3], outward: &Vector3<f64>) {
        let [a, b, c] = v.map(|i| self.mesh.vertices[i].to_vector());
        let normal = (b - a).cross(&(c - a));
        let triangle = Triangle::new(v[0], v[1], v[2]);
        if normal.dot(outward) < 0.0 {
            self.mesh.triangles.push(triangle.flipped());
        } else {
            self.mesh.triangles.push(triangle);
        }
    }

    fn polygonise(&mut self, corners: [[usize; 3]; 4]) {
        let (inside, outside): (Vec<[usize; 3]>, Vec<[usize; 3]>) = corners
            .into_iter()
            .partition(|&p| self.value(p) >= self.iso);
        if inside.is_empty() || outside.is_empty() {
            return;
        }

        let centroid = |points: &[[usize; 3]], b: &Self| -> Vector3<f64> {
            points.iter().map(|&p| b.position(p)).sum::<Vector3<f64>>() / points.len() as f64
        };
        let outward = centroid(&outside, self) - centroid(&inside, self);

        match (inside.len(), outside.len()) {
            (1, 3) => {
                let v = [
                    self.edge_vertex(inside[0], outside[0]),
                    self.edge_vertex(inside[0], outside[1]),
                    self.edge_vertex(inside[0], outside[2]),
                ];
                self.emit(v, &outward);
            }
            (3, 1) => {
                let v = [
                    self.edge_vertex(inside[0], outside[0]),
                    self.edge_vertex(inside[1], outside[0]),
                    self.edge_vertex(inside[2], outside[0]),
                ];
                self.emit(v, &outward);
            }
            _ => {
                // quad cycle: (i0,o0) (i0,o1) (i1,o1) (i1,o0)
                let q0 = self.edge_vertex(inside[0], outside[0]);
                let q1 = self.edge_vertex(inside[0], outside[1]);
                let q2 = self.edge_vertex(inside[1], outside[1]);
                let q3 = self.edge_vertex(inside[1], outside[0]);
                self.emit([q0, q1, q2], &outward);
                self.emit([q0, q2, q3], &outward);
            }
        }
    }
}

impl IsosurfaceBackend for MarchingTetrahedra {
    fn name(&self) -> &'static str {
        "marching_tetrahedra"
    }

    fn extract(&self, field: &ScalarField, iso: f32) -> Result<Mesh> {
        let dims = field.values.dim();
        let (nx, ny, nz) = dims;
        if nx < 2 || ny < 2 || nz < 2 {
            return Err(Error::Backend {
                backend: self.name().to_string(),
                message: format!("field of {} x {} x {} has no cells", nx, ny, nz),
            });
        }

        let mut builder = Builder {
            field,
            iso,
            dims,
            mesh: Mesh::new(),
            edge_vertex: HashMap::new(),
        };

        for z in 0..nz - 1 {
            for y in 0..ny - 1 {
                for x in 0..nx - 1 {
                    let cell = CORNER_OFFSETS.map(|o| [x + o[0], y + o[1], z + o[2]]);
                    let all_inside = cell.iter().all(|&p| builder.value(p) >= iso);
                    let all_outside = cell.iter().all(|&p| builder.value(p) < iso);
                    if all_inside || all_outside {
                        continue;
                    }
                    for tet in TETRAHEDRA {
                        builder.polygonise(tet.map(|c| cell[c]));
                    }
                }
            }
        }

        Ok(builder.mesh)
    }
}
