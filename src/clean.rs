//! Mesh cleaning
//!
//! Brings a raw mesh into the clean state every later stage relies on:
//! no duplicate vertices within tolerance, no zero-area or repeated
//! triangles, no edge used by more than two triangles, and no vertex that
//! no triangle references. Cleaning never fails; a badly broken input just
//! comes out smaller.

use crate::config::PipelineConfig;
use crate::mesh_ops::{calculate_vertex_normals, edge_key, triangle_area};
use crate::model::{Mesh, Triangle, Vertex};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Tolerances used by [`clean_mesh`]
#[derive(Debug, Clone, Copy)]
pub struct CleanParams {
    /// Vertices closer than this are merged; 0 merges exact duplicates only
    pub weld_epsilon: f64,
    /// Triangles with area at or below this are removed
    pub degenerate_area_epsilon: f64,
}

impl Default for CleanParams {
    fn default() -> Self {
        Self {
            weld_epsilon: 1e-6,
            degenerate_area_epsilon: 1e-12,
        }
    }
}

impl From<&PipelineConfig> for CleanParams {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            weld_epsilon: config.weld_epsilon,
            degenerate_area_epsilon: config.degenerate_area_epsilon,
        }
    }
}

/// What the clean step removed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanReport {
    /// Vertices merged into another vertex
    pub vertices_welded: usize,
    /// Triangles removed for zero area or repeated corners
    pub degenerate_removed: usize,
    /// Triangles removed as duplicates of an earlier triangle
    pub duplicates_removed: usize,
    /// Triangles removed to keep every edge at two or fewer triangles
    pub non_manifold_removed: usize,
    /// Vertices removed because no triangle used them
    pub unreferenced_removed: usize,
}

impl CleanReport {
    /// True when nothing had to be changed
    pub fn is_clean(&self) -> bool {
        *self == CleanReport::default()
    }
}

/// Run every cleaning pass and recompute vertex normals
pub fn clean_mesh(mesh: &mut Mesh, params: &CleanParams) -> CleanReport {
    let report = CleanReport {
        vertices_welded: weld_vertices(mesh, params.weld_epsilon),
        degenerate_removed: remove_degenerate_triangles(mesh, params.degenerate_area_epsilon),
        duplicates_removed: remove_duplicate_triangles(mesh),
        non_manifold_removed: remove_non_manifold_triangles(mesh),
        unreferenced_removed: remove_unreferenced_vertices(mesh),
    };
    mesh.normals = calculate_vertex_normals(mesh);

    debug!(
        welded = report.vertices_welded,
        degenerate = report.degenerate_removed,
        duplicates = report.duplicates_removed,
        non_manifold = report.non_manifold_removed,
        unreferenced = report.unreferenced_removed,
        vertices = mesh.vertex_count(),
        triangles = mesh.triangle_count(),
        "Cleaned mesh"
    );
    report
}

fn pos_to_cell(v: &Vertex, cell_size: f64) -> (i64, i64, i64) {
    (
        (v.x / cell_size).floor() as i64,
        (v.y / cell_size).floor() as i64,
        (v.z / cell_size).floor() as i64,
    )
}

/// Merge vertices within `epsilon` of an earlier vertex
///
/// Triangle indices are redirected to the surviving vertex; merged vertices
/// stay in the list until [`remove_unreferenced_vertices`] runs. Returns the
/// number of merged vertices.
pub fn weld_vertices(mesh: &mut Mesh, epsilon: f64) -> usize {
    let n = mesh.vertices.len();
    let mut remap: Vec<usize> = (0..n).collect();
    let mut merged = 0;

    if epsilon > 0.0 {
        let cell_size = epsilon * 2.0;
        let mut spatial_hash: HashMap<(i64, i64, i64), Vec<usize>> = HashMap::new();
        for (idx, v) in mesh.vertices.iter().enumerate() {
            spatial_hash
                .entry(pos_to_cell(v, cell_size))
                .or_default()
                .push(idx);
        }

        for idx in 0..n {
            if remap[idx] != idx {
                continue;
            }
            let p = mesh.vertices[idx].to_vector();
            let cell = pos_to_cell(&mesh.vertices[idx], cell_size);
            for dx in -1..=1 {
                for dy in -1..=1 {
                    for dz in -1..=1 {
                        let Some(candidates) =
                            spatial_hash.get(&(cell.0 + dx, cell.1 + dy, cell.2 + dz))
                        else {
                            continue;
                        };
                        for &other in candidates {
                            if other <= idx || remap[other] != other {
                                continue;
                            }
                            if (mesh.vertices[other].to_vector() - p).norm() < epsilon {
                                remap[other] = idx;
                                merged += 1;
                            }
                        }
                    }
                }
            }
        }
    } else {
        let mut first: HashMap<[u64; 3], usize> = HashMap::new();
        for (idx, v) in mesh.vertices.iter().enumerate() {
            let key = [v.x.to_bits(), v.y.to_bits(), v.z.to_bits()];
            let canonical = *first.entry(key).or_insert(idx);
            if canonical != idx {
                remap[idx] = canonical;
                merged += 1;
            }
        }
    }

    if merged > 0 {
        for t in &mut mesh.triangles {
            *t = Triangle::new(remap[t.v1], remap[t.v2], remap[t.v3]);
        }
    }
    merged
}

/// Remove triangles with repeated corners or area at or below `area_epsilon`
pub fn remove_degenerate_triangles(mesh: &mut Mesh, area_epsilon: f64) -> usize {
    let before = mesh.triangles.len();
    let vertices = &mesh.vertices;
    mesh.triangles.retain(|t| {
        if t.is_collapsed() {
            return false;
        }
        let area = triangle_area(
            &vertices[t.v1].to_vector(),
            &vertices[t.v2].to_vector(),
            &vertices[t.v3].to_vector(),
        );
        area > area_epsilon
    });
    before - mesh.triangles.len()
}

/// Remove triangles over the same three vertices as an earlier one, in either winding
pub fn remove_duplicate_triangles(mesh: &mut Mesh) -> usize {
    let before = mesh.triangles.len();
    let mut seen: HashSet<[usize; 3]> = HashSet::with_capacity(before);
    mesh.triangles.retain(|t| {
        let mut key = t.indices();
        key.sort_unstable();
        seen.insert(key)
    });
    before - mesh.triangles.len()
}

/// Drop triangles that would put a third triangle on an edge
///
/// Triangles are visited in order; the first two users of an edge are kept.
pub fn remove_non_manifold_triangles(mesh: &mut Mesh) -> usize {
    let before = mesh.triangles.len();
    let mut uses: HashMap<(usize, usize), u8> = HashMap::with_capacity(before * 2);
    mesh.triangles.retain(|t| {
        let keys = t.edges().map(|(a, b)| edge_key(a, b));
        if keys.iter().any(|k| uses.get(k).copied().unwrap_or(0) >= 2) {
            return false;
        }
        for k in keys {
            *uses.entry(k).or_insert(0) += 1;
        }
        true
    });
    before - mesh.triangles.len()
}

/// Drop vertices no triangle references and compact the indices
pub fn remove_unreferenced_vertices(mesh: &mut Mesh) -> usize {
    let before = mesh.vertices.len();
    let mut referenced = vec![false; before];
    for t in &mesh.triangles {
        for i in t.indices() {
            referenced[i] = true;
        }
    }
    if referenced.iter().all(|&r| r) {
        return 0;
    }

    let mut remap = vec![usize::MAX; before];
    let mut vertices = Vec::with_capacity(before);
    let mut normals = Vec::new();
    for (old, v) in mesh.vertices.iter().enumerate() {
        if referenced[old] {
            remap[old] = vertices.len();
            vertices.push(*v);
            if let Some(n) = mesh.normals.get(old) {
                normals.push(*n);
            }
        }
    }
    for t in &mut mesh.triangles {
        *t = Triangle::new(remap[t.v1], remap[t.v2], remap[t.v3]);
    }

    mesh.vertices = vertices;
    mesh.normals = if normals.len() == mesh.vertices.len() {
        normals
    } else {
        Vec::new()
    };
    before - mesh.vertices.len()
}
