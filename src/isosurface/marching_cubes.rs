//! Table-driven marching cubes
//!
//! Vertices on cell edges are shared between neighbouring cells through
//! per-axis index grids, so a closed level set yields a closed mesh.

use super::IsosurfaceBackend;
use super::tables::{CORNER_OFFSETS, EDGE_CORNERS, case_triangles};
use crate::error::{Error, Result};
use crate::model::{Mesh, Triangle, Vertex};
use crate::volume::ScalarField;
use ndarray::Array3;

const NO_VERTEX: usize = usize::MAX;

/// Classic marching cubes over the 256-case table
#[derive(Debug, Clone, Copy, Default)]
pub struct MarchingCubes;

impl IsosurfaceBackend for MarchingCubes {
    fn name(&self) -> &'static str {
        "marching_cubes"
    }

    fn extract(&self, field: &ScalarField, iso: f32) -> Result<Mesh> {
        let values = &field.values;
        let (nx, ny, nz) = values.dim();
        if nx < 2 || ny < 2 || nz < 2 {
            return Err(Error::Backend {
                backend: self.name().to_string(),
                message: format!("field of {} x {} x {} has no cells", nx, ny, nz),
            });
        }

        let mut mesh = Mesh::new();
        // Vertex index of the crossing on the edge leaving each sample along X, Y and Z
        let mut edge_vertex = [
            Array3::from_elem((nx, ny, nz), NO_VERTEX),
            Array3::from_elem((nx, ny, nz), NO_VERTEX),
            Array3::from_elem((nx, ny, nz), NO_VERTEX),
        ];

        let mut corner_values = [0.0f32; 8];
        let mut cell_edges = [NO_VERTEX; 12];

        for z in 0..nz - 1 {
            for y in 0..ny - 1 {
                for x in 0..nx - 1 {
                    let mut config = 0u8;
                    for (c, offset) in CORNER_OFFSETS.iter().enumerate() {
                        let v = values[[x + offset[0], y + offset[1], z + offset[2]]];
                        corner_values[c] = v;
                        if v < iso {
                            config |= 1 << c;
                        }
                    }
                    if config == 0 || config == 255 {
                        continue;
                    }

                    for (edge, &(a, b)) in EDGE_CORNERS.iter().enumerate() {
                        let (va, vb) = (corner_values[a], corner_values[b]);
                        if (va < iso) == (vb < iso) {
                            cell_edges[edge] = NO_VERTEX;
                            continue;
                        }
                        let axis = edge / 4;
                        let o = CORNER_OFFSETS[a];
                        let key = [x + o[0], y + o[1], z + o[2]];
                        let slot = &mut edge_vertex[axis][key];
                        if *slot == NO_VERTEX {
                            let t = f64::from((iso - va) / (vb - va));
                            let mut p = [key[0] as f64, key[1] as f64, key[2] as f64];
                            p[axis] += t;
                            *slot = mesh.vertices.len();
                            mesh.vertices.push(Vertex::new(
                                field.origin[0] + p[0],
                                field.origin[1] + p[1],
                                field.origin[2] + p[2],
                            ));
                        }
                        cell_edges[edge] = *slot;
                    }

                    // The table winds towards the low side; flip so normals face outward
                    for [e0, e1, e2] in case_triangles(config) {
                        mesh.triangles.push(Triangle::new(
                            cell_edges[e0],
                            cell_edges[e2],
                            cell_edges[e1],
                        ));
                    }
                }
            }
        }

        Ok(mesh)
    }
}
