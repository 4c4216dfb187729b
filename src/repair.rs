//! Watertightness repair
//!
//! Open boundaries are traced into closed loops and each loop is filled by
//! triangulating it in its best-fit plane. When holes remain and the caller
//! opted in, the mesh is replaced by its convex hull, which is always
//! reported because it discards concave detail.

use crate::config::PipelineConfig;
use crate::mesh_ops::{boundary_edges, calculate_vertex_normals, is_watertight};
use crate::model::{Mesh, Triangle};
use crate::polygon_triangulation::triangulate_loop;
use nalgebra::Vector3;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

/// How the mesh was made watertight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RepairMethod {
    /// Nothing was changed
    None,
    /// Boundary loops were triangulated
    HoleFilling,
    /// The mesh was replaced by its convex hull
    ConvexHull,
}

/// Outcome of [`make_watertight`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RepairReport {
    /// Whether the input was already closed
    pub initially_watertight: bool,
    /// Whether the output is closed
    pub finally_watertight: bool,
    /// The last method that modified the mesh
    pub method: RepairMethod,
    /// Boundary loops found in the input
    pub holes_found: usize,
    /// Boundary loops that were filled
    pub holes_filled: usize,
    /// Set when the repair changed the shape beyond closing holes
    pub note: Option<String>,
}

/// Options for [`make_watertight`]
#[derive(Debug, Clone, Copy)]
pub struct RepairParams {
    /// Fill boundary loops
    pub fill_holes: bool,
    /// Loops with more edges than this are left open
    pub max_hole_edges: usize,
    /// Fall back to the convex hull when holes remain
    pub allow_convex_hull: bool,
}

impl Default for RepairParams {
    fn default() -> Self {
        Self {
            fill_holes: true,
            max_hole_edges: 1000,
            allow_convex_hull: false,
        }
    }
}

impl From<&PipelineConfig> for RepairParams {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            fill_holes: config.fill_holes,
            max_hole_edges: config.max_hole_edges,
            allow_convex_hull: config.allow_convex_hull,
        }
    }
}

/// A closed chain of boundary edges
///
/// Vertices are listed in the direction the adjacent triangles traverse the
/// boundary, so the patch closing the hole must run the opposite way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundaryLoop {
    /// Vertex indices around the loop
    pub vertices: Vec<usize>,
}

impl BoundaryLoop {
    /// Number of edges in the loop
    pub fn edge_count(&self) -> usize {
        self.vertices.len()
    }
}

/// Trace all boundary edges into closed loops
///
/// Chains that cannot be closed, which only happens on non-manifold input,
/// are dropped.
pub fn detect_holes(mesh: &Mesh) -> Vec<BoundaryLoop> {
    let edges = boundary_edges(mesh);
    let mut outgoing: HashMap<usize, Vec<usize>> = HashMap::new();
    for &(a, b) in &edges {
        outgoing.entry(a).or_default().push(b);
    }

    let mut used: HashSet<(usize, usize)> = HashSet::with_capacity(edges.len());
    let mut loops = Vec::new();

    for &(start, first) in &edges {
        if used.contains(&(start, first)) {
            continue;
        }
        used.insert((start, first));
        let mut vertices = vec![start];
        let mut current = first;
        let mut closed = false;

        while vertices.len() <= edges.len() {
            if current == start {
                closed = true;
                break;
            }
            vertices.push(current);
            let next = outgoing
                .get(&current)
                .and_then(|targets| targets.iter().find(|&&t| !used.contains(&(current, t))))
                .copied();
            match next {
                Some(next) => {
                    used.insert((current, next));
                    current = next;
                }
                None => break,
            }
        }

        if closed && vertices.len() >= 3 {
            loops.push(BoundaryLoop { vertices });
        } else {
            debug!(length = vertices.len(), "Dropping open boundary chain");
        }
    }
    loops
}

/// Fill boundary loops of at most `max_edges` edges
///
/// Returns the number of loops filled.
pub fn fill_holes(mesh: &mut Mesh, loops: &[BoundaryLoop], max_edges: usize) -> usize {
    let mut filled = 0;
    for hole in loops {
        if hole.edge_count() > max_edges {
            warn!(
                "Skipping large hole with {} edges (max: {})",
                hole.edge_count(),
                max_edges
            );
            continue;
        }

        let patch: Vec<usize> = hole.vertices.iter().rev().copied().collect();
        let points: Vec<Vector3<f64>> = patch
            .iter()
            .map(|&i| mesh.vertices[i].to_vector())
            .collect();
        match triangulate_loop(&points) {
            Ok(triangles) => {
                for [a, b, c] in triangles {
                    mesh.triangles
                        .push(Triangle::new(patch[a], patch[b], patch[c]));
                }
                filled += 1;
            }
            Err(err) => {
                warn!(edges = hole.edge_count(), error = %err, "Could not fill hole");
            }
        }
    }
    if filled > 0 {
        info!("Filled {} holes", filled);
    }
    filled
}

/// Convex hull of the mesh vertices as a closed, outward-wound mesh
#[cfg(feature = "mesh-ops")]
pub fn convex_hull(mesh: &Mesh) -> Option<Mesh> {
    use crate::model::Vertex;
    use parry3d::math::Vector3;

    if mesh.vertices.len() < 4 {
        return None;
    }
    let points: Vec<Vector3> = mesh
        .vertices
        .iter()
        .map(|v| Vector3::new(v.x as f32, v.y as f32, v.z as f32))
        .collect();
    let (hull_points, hull_indices) = parry3d::transformation::convex_hull(&points);
    if hull_indices.len() < 4 {
        return None;
    }

    let vertices = hull_points
        .iter()
        .map(|p| Vertex::new(p.x as f64, p.y as f64, p.z as f64))
        .collect();
    let triangles = hull_indices
        .iter()
        .map(|t| Triangle::new(t[0] as usize, t[1] as usize, t[2] as usize))
        .collect();
    let mut hull = Mesh::from_parts(vertices, triangles).ok()?;
    if crate::mesh_ops::signed_volume(&hull) < 0.0 {
        hull.flip_winding();
    }
    Some(hull)
}

/// Convex hull support is compiled out
#[cfg(not(feature = "mesh-ops"))]
pub fn convex_hull(_mesh: &Mesh) -> Option<Mesh> {
    None
}

/// Close the mesh where possible and report what was done
///
/// Never fails; a mesh that cannot be closed is returned with
/// `finally_watertight == false`.
pub fn make_watertight(mesh: &mut Mesh, params: &RepairParams) -> RepairReport {
    let initially_watertight = is_watertight(mesh);
    let mut report = RepairReport {
        initially_watertight,
        finally_watertight: initially_watertight,
        method: RepairMethod::None,
        holes_found: 0,
        holes_filled: 0,
        note: None,
    };
    if initially_watertight || mesh.is_empty() {
        return report;
    }

    let holes = detect_holes(mesh);
    report.holes_found = holes.len();
    if params.fill_holes && !holes.is_empty() {
        report.holes_filled = fill_holes(mesh, &holes, params.max_hole_edges);
        if report.holes_filled > 0 {
            report.method = RepairMethod::HoleFilling;
        }
    }

    if !is_watertight(mesh) && params.allow_convex_hull {
        match convex_hull(mesh) {
            Some(hull) => {
                warn!(
                    vertices = hull.vertex_count(),
                    triangles = hull.triangle_count(),
                    "Replacing mesh with its convex hull"
                );
                *mesh = hull;
                report.method = RepairMethod::ConvexHull;
                report.note = Some(
                    "Mesh replaced by its convex hull; concave detail was discarded".to_string(),
                );
            }
            None => warn!("Convex hull fallback unavailable"),
        }
    }

    if report.method != RepairMethod::None {
        mesh.normals = calculate_vertex_normals(mesh);
    }
    report.finally_watertight = is_watertight(mesh);
    debug!(
        method = ?report.method,
        holes_found = report.holes_found,
        holes_filled = report.holes_filled,
        watertight = report.finally_watertight,
        "Repair finished"
    );
    report
}
