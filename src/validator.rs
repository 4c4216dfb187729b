//! Printability validation
//!
//! Validation never fails. It measures a mesh against the properties a
//! slicer relies on and condenses them into a 0-10 printability score:
//! - Watertight: every edge shared by exactly two triangles (+4)
//! - Orientable: no directed edge used twice, so windings agree (+2)
//! - Free of self-intersections (+2)
//! - Triangle count between 1 000 and 100 000 (+1)
//! - Positive enclosed volume (+1)

use crate::mesh_ops::{edge_incidence, signed_volume, surface_area};
use crate::model::Mesh;
use nalgebra::Vector3;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Fewest triangles considered printable without visible faceting
pub const MIN_PRINT_TRIANGLES: usize = 1_000;

/// Most triangles a typical slicer handles comfortably
pub const MAX_PRINT_TRIANGLES: usize = 100_000;

/// Coarse quality rating derived from the printability score
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum QualityBand {
    /// Score below 4
    Poor,
    /// Score 4 or 5
    Fair,
    /// Score 6 or 7
    Good,
    /// Score 8 or above
    Excellent,
}

impl QualityBand {
    /// Band for a printability score
    pub fn from_score(score: u8) -> Self {
        match score {
            8.. => QualityBand::Excellent,
            6..=7 => QualityBand::Good,
            4..=5 => QualityBand::Fair,
            _ => QualityBand::Poor,
        }
    }
}

impl fmt::Display for QualityBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            QualityBand::Poor => "Poor",
            QualityBand::Fair => "Fair",
            QualityBand::Good => "Good",
            QualityBand::Excellent => "Excellent",
        };
        f.write_str(name)
    }
}

/// Result of [`validate`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationReport {
    /// Every edge is shared by exactly two triangles
    pub is_watertight: bool,
    /// Adjacent triangles traverse shared edges in opposite directions
    pub is_orientable: bool,
    /// Two triangles without a common vertex intersect
    pub is_self_intersecting: bool,
    /// Number of vertices
    pub vertex_count: usize,
    /// Number of triangles
    pub triangle_count: usize,
    /// Edges used by a single triangle
    pub boundary_edge_count: usize,
    /// Edges used by more than two triangles
    pub non_manifold_edge_count: usize,
    /// Signed enclosed volume in cubic millimetres
    pub volume: f64,
    /// Total triangle area in square millimetres
    pub surface_area: f64,
    /// Printability score from 0 to 10
    pub printability_score: u8,
    /// Band the score falls into
    pub quality: QualityBand,
    /// One entry per failed criterion
    pub warnings: Vec<String>,
    /// Suggested fixes for the warnings
    pub recommendations: Vec<String>,
}

impl ValidationReport {
    /// True when the mesh can be sent to a slicer as is
    pub fn is_printable(&self) -> bool {
        self.is_watertight && self.is_orientable && !self.is_self_intersecting && self.volume > 0.0
    }
}

/// Check whether every undirected edge has a consistent pair of directions
///
/// In a consistently wound mesh each directed edge occurs at most once.
pub fn is_orientable(mesh: &Mesh) -> bool {
    let mut directed: HashSet<(usize, usize)> = HashSet::with_capacity(mesh.triangles.len() * 3);
    mesh.triangles
        .iter()
        .flat_map(|t| t.edges())
        .all(|edge| directed.insert(edge))
}

/// Möller-Trumbore segment-triangle test
///
/// True when the open segment `p0 -> p1` passes through the interior of the
/// triangle `(v0, v1, v2)`.
fn segment_hits_triangle(
    p0: &Vector3<f64>,
    p1: &Vector3<f64>,
    v0: &Vector3<f64>,
    v1: &Vector3<f64>,
    v2: &Vector3<f64>,
) -> bool {
    const EPSILON: f64 = 1e-12;

    let direction = p1 - p0;
    let edge1 = v1 - v0;
    let edge2 = v2 - v0;
    let h = direction.cross(&edge2);
    let a = edge1.dot(&h);
    // Segment is parallel to the triangle
    if a.abs() < EPSILON {
        return false;
    }

    let f = 1.0 / a;
    let s = p0 - v0;
    let u = f * s.dot(&h);
    if u <= EPSILON || u >= 1.0 - EPSILON {
        return false;
    }
    let q = s.cross(&edge1);
    let v = f * direction.dot(&q);
    if v <= EPSILON || u + v >= 1.0 - EPSILON {
        return false;
    }
    let t = f * edge2.dot(&q);
    t > EPSILON && t < 1.0 - EPSILON
}

fn triangles_intersect(a: &[Vector3<f64>; 3], b: &[Vector3<f64>; 3]) -> bool {
    let hits = |edges: &[Vector3<f64>; 3], tri: &[Vector3<f64>; 3]| {
        (0..3).any(|i| {
            segment_hits_triangle(&edges[i], &edges[(i + 1) % 3], &tri[0], &tri[1], &tri[2])
        })
    };
    hits(a, b) || hits(b, a)
}

fn triangle_bounds(corners: &[Vector3<f64>; 3]) -> ([f64; 3], [f64; 3]) {
    let mut min = [f64::INFINITY; 3];
    let mut max = [f64::NEG_INFINITY; 3];
    for c in corners {
        for axis in 0..3 {
            min[axis] = min[axis].min(c[axis]);
            max[axis] = max[axis].max(c[axis]);
        }
    }
    (min, max)
}

/// Detect intersections between triangles that share no vertex
///
/// Triangles are bucketed into a uniform grid sized from the mean triangle
/// extent, so only triangles in common cells are tested.
pub fn has_self_intersections(mesh: &Mesh) -> bool {
    let n = mesh.triangles.len();
    if n < 2 || mesh.check_indices().is_err() {
        return false;
    }

    let corners: Vec<[Vector3<f64>; 3]> = mesh.triangles.iter().map(|t| mesh.corners(t)).collect();
    let bounds: Vec<([f64; 3], [f64; 3])> = corners.iter().map(triangle_bounds).collect();

    let mut global_min = [f64::INFINITY; 3];
    let mut global_max = [f64::NEG_INFINITY; 3];
    let mut mean_extent = 0.0;
    for (min, max) in &bounds {
        for axis in 0..3 {
            global_min[axis] = global_min[axis].min(min[axis]);
            global_max[axis] = global_max[axis].max(max[axis]);
        }
        mean_extent += (0..3).map(|a| max[a] - min[a]).fold(0.0, f64::max);
    }
    mean_extent /= n as f64;
    let diagonal = (0..3)
        .map(|a| (global_max[a] - global_min[a]).powi(2))
        .sum::<f64>()
        .sqrt();
    let cell_size = mean_extent.max(diagonal / 128.0);
    if !(cell_size > 0.0 && cell_size.is_finite()) {
        return false;
    }

    let cell_of = |value: f64, axis: usize| ((value - global_min[axis]) / cell_size).floor() as i64;
    let mut grid: HashMap<(i64, i64, i64), Vec<usize>> = HashMap::new();
    for (idx, (min, max)) in bounds.iter().enumerate() {
        for x in cell_of(min[0], 0)..=cell_of(max[0], 0) {
            for y in cell_of(min[1], 1)..=cell_of(max[1], 1) {
                for z in cell_of(min[2], 2)..=cell_of(max[2], 2) {
                    grid.entry((x, y, z)).or_default().push(idx);
                }
            }
        }
    }

    let mut tested: HashSet<(usize, usize)> = HashSet::new();
    for members in grid.values() {
        for (pos, &i) in members.iter().enumerate() {
            for &j in &members[pos + 1..] {
                if !tested.insert((i.min(j), i.max(j))) {
                    continue;
                }
                let ti = mesh.triangles[i].indices();
                if mesh.triangles[j].indices().iter().any(|v| ti.contains(v)) {
                    continue;
                }
                let (min_i, max_i) = bounds[i];
                let (min_j, max_j) = bounds[j];
                if (0..3).any(|a| max_i[a] < min_j[a] || max_j[a] < min_i[a]) {
                    continue;
                }
                if triangles_intersect(&corners[i], &corners[j]) {
                    return true;
                }
            }
        }
    }
    false
}

/// Measure printability; never fails
pub fn validate(mesh: &Mesh) -> ValidationReport {
    let incidence = edge_incidence(mesh);
    let boundary_edge_count = incidence.values().filter(|&&c| c == 1).count();
    let non_manifold_edge_count = incidence.values().filter(|&&c| c > 2).count();
    let is_watertight = !mesh.is_empty() && boundary_edge_count == 0 && non_manifold_edge_count == 0;
    let is_orientable = !mesh.is_empty() && is_orientable(mesh);
    let is_self_intersecting = has_self_intersections(mesh);
    let triangle_count = mesh.triangle_count();
    let volume = signed_volume(mesh);

    let mut score = 0u8;
    let mut warnings = Vec::new();
    let mut recommendations = Vec::new();

    if is_watertight {
        score += 4;
    } else {
        warnings.push(format!(
            "Mesh is not watertight: {} boundary edges, {} non-manifold edges",
            boundary_edge_count, non_manifold_edge_count
        ));
        recommendations.push("Run hole filling or enable the convex hull fallback".to_string());
    }

    if is_orientable {
        score += 2;
    } else {
        warnings.push("Triangle windings are inconsistent".to_string());
        recommendations.push("Re-orient triangles so all normals face outward".to_string());
    }

    if !is_self_intersecting {
        score += 2;
    } else {
        warnings.push("Mesh intersects itself".to_string());
        recommendations
            .push("Reduce smoothing or re-extract with a larger Gaussian sigma".to_string());
    }

    if (MIN_PRINT_TRIANGLES..=MAX_PRINT_TRIANGLES).contains(&triangle_count) {
        score += 1;
    } else if triangle_count < MIN_PRINT_TRIANGLES {
        warnings.push(format!(
            "Triangle count {} is below {}",
            triangle_count, MIN_PRINT_TRIANGLES
        ));
        recommendations.push("Extract from a finer volume or skip decimation".to_string());
    } else {
        warnings.push(format!(
            "Triangle count {} exceeds {}",
            triangle_count, MAX_PRINT_TRIANGLES
        ));
        recommendations.push("Decimate the mesh before slicing".to_string());
    }

    if volume > 0.0 {
        score += 1;
    } else {
        warnings.push(format!("Enclosed volume {:.3} is not positive", volume));
        recommendations.push("Flip the triangle winding so normals face outward".to_string());
    }

    ValidationReport {
        is_watertight,
        is_orientable,
        is_self_intersecting,
        vertex_count: mesh.vertex_count(),
        triangle_count,
        boundary_edge_count,
        non_manifold_edge_count,
        volume,
        surface_area: surface_area(mesh),
        printability_score: score,
        quality: QualityBand::from_score(score),
        warnings,
        recommendations,
    }
}
