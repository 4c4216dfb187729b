//! Quadric error metric decimation
//!
//! Garland-Heckbert edge collapse. Every vertex accumulates the plane
//! quadrics of its incident triangles; an edge collapse moves the surviving
//! vertex to the point minimising the summed quadric. Candidates come from a
//! min-heap and stale entries are recognised by per-vertex version stamps.
//!
//! A collapse is rejected when it would break the manifold (link condition)
//! or flip a surviving triangle, so closed consistently wound input stays
//! closed and consistently wound.

use crate::model::{Mesh, Triangle, Vertex};
use nalgebra::{Matrix3, Vector3};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};
use tracing::{debug, info};

/// Symmetric 4x4 quadric stored as its 10 unique coefficients
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Quadric {
    m: [f64; 10],
}

impl Quadric {
    /// Quadric of the plane `ax + by + cz + d = 0`
    pub fn from_plane(a: f64, b: f64, c: f64, d: f64) -> Self {
        Self {
            m: [
                a * a,
                a * b,
                a * c,
                a * d,
                b * b,
                b * c,
                b * d,
                c * c,
                c * d,
                d * d,
            ],
        }
    }

    /// Squared distance sum at `p`
    pub fn evaluate(&self, p: &Vector3<f64>) -> f64 {
        let [a, b, c, d, e, f, g, h, i, j] = self.m;
        let (x, y, z) = (p.x, p.y, p.z);
        a * x * x + 2.0 * b * x * y + 2.0 * c * x * z + 2.0 * d * x
            + e * y * y
            + 2.0 * f * y * z
            + 2.0 * g * y
            + h * z * z
            + 2.0 * i * z
            + j
    }

    /// Point minimising the quadric, if the system is well conditioned
    pub fn optimal_point(&self) -> Option<Vector3<f64>> {
        let [a, b, c, d, e, f, g, h, i, _] = self.m;
        let system = Matrix3::new(a, b, c, b, e, f, c, f, h);
        if system.determinant().abs() < 1e-10 {
            return None;
        }
        let inverse = system.try_inverse()?;
        Some(-(inverse * Vector3::new(d, g, i)))
    }
}

impl std::ops::Add for Quadric {
    type Output = Quadric;

    fn add(self, other: Quadric) -> Quadric {
        let mut m = self.m;
        for (x, y) in m.iter_mut().zip(other.m) {
            *x += y;
        }
        Quadric { m }
    }
}

impl std::ops::AddAssign for Quadric {
    fn add_assign(&mut self, other: Quadric) {
        *self = *self + other;
    }
}

/// Decimation bounds
#[derive(Debug, Clone, Copy)]
pub struct DecimateOptions {
    /// Stop once the triangle count is at or below this
    pub target_triangles: usize,
    /// Upper bound on the number of collapses performed
    pub max_collapses: Option<usize>,
}

impl DecimateOptions {
    /// Decimate to `target_triangles` without a collapse bound
    pub fn new(target_triangles: usize) -> Self {
        Self {
            target_triangles,
            max_collapses: None,
        }
    }

    /// Bound the work spent
    pub fn with_max_collapses(mut self, max_collapses: usize) -> Self {
        self.max_collapses = Some(max_collapses);
        self
    }
}

/// Outcome of a decimation run
#[derive(Debug, Clone)]
pub struct DecimationResult {
    /// The simplified mesh
    pub mesh: Mesh,
    /// Triangle count before decimation
    pub original_triangles: usize,
    /// Triangle count after decimation
    pub final_triangles: usize,
    /// Edge collapses performed
    pub collapses: usize,
}

impl DecimationResult {
    /// Whether the target triangle count was reached
    pub fn reached(&self, target: usize) -> bool {
        self.final_triangles <= target
    }
}

#[derive(Debug)]
struct Candidate {
    cost: f64,
    a: usize,
    b: usize,
    target: Vector3<f64>,
    stamp_a: u32,
    stamp_b: u32,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    // reversed so BinaryHeap pops the cheapest collapse
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| other.a.cmp(&self.a))
            .then_with(|| other.b.cmp(&self.b))
    }
}

struct Decimator {
    positions: Vec<Vector3<f64>>,
    faces: Vec<[usize; 3]>,
    face_alive: Vec<bool>,
    vertex_faces: Vec<HashSet<usize>>,
    quadrics: Vec<Quadric>,
    stamps: Vec<u32>,
    vertex_alive: Vec<bool>,
    heap: BinaryHeap<Candidate>,
}

impl Decimator {
    fn new(mesh: &Mesh) -> Self {
        let positions: Vec<Vector3<f64>> = mesh.vertices.iter().map(|v| v.to_vector()).collect();
        let faces: Vec<[usize; 3]> = mesh.triangles.iter().map(|t| t.indices()).collect();
        let mut vertex_faces = vec![HashSet::new(); positions.len()];
        let mut quadrics = vec![Quadric::default(); positions.len()];

        for (fi, f) in faces.iter().enumerate() {
            for &v in f {
                vertex_faces[v].insert(fi);
            }
            let normal =
                (positions[f[1]] - positions[f[0]]).cross(&(positions[f[2]] - positions[f[0]]));
            let length = normal.norm();
            if length < 1e-12 {
                continue;
            }
            let n = normal / length;
            let plane = Quadric::from_plane(n.x, n.y, n.z, -n.dot(&positions[f[0]]));
            for &v in f {
                quadrics[v] += plane;
            }
        }

        let n = positions.len();
        let mut decimator = Self {
            positions,
            face_alive: vec![true; faces.len()],
            faces,
            vertex_faces,
            quadrics,
            stamps: vec![0; n],
            vertex_alive: vec![true; n],
            heap: BinaryHeap::new(),
        };

        let mut seen = HashSet::new();
        for fi in 0..decimator.faces.len() {
            let f = decimator.faces[fi];
            for k in 0..3 {
                let (a, b) = (f[k], f[(k + 1) % 3]);
                if seen.insert((a.min(b), a.max(b))) {
                    decimator.push(a, b);
                }
            }
        }
        decimator
    }

    fn push(&mut self, a: usize, b: usize) {
        let quadric = self.quadrics[a] + self.quadrics[b];
        let target = quadric
            .optimal_point()
            .unwrap_or_else(|| (self.positions[a] + self.positions[b]) * 0.5);
        self.heap.push(Candidate {
            cost: quadric.evaluate(&target),
            a,
            b,
            target,
            stamp_a: self.stamps[a],
            stamp_b: self.stamps[b],
        });
    }

    fn neighbors(&self, v: usize) -> HashSet<usize> {
        let mut out: HashSet<usize> = self.vertex_faces[v]
            .iter()
            .flat_map(|&fi| self.faces[fi])
            .collect();
        out.remove(&v);
        out
    }

    fn is_stale(&self, c: &Candidate) -> bool {
        !self.vertex_alive[c.a]
            || !self.vertex_alive[c.b]
            || self.stamps[c.a] != c.stamp_a
            || self.stamps[c.b] != c.stamp_b
    }

    /// Whether moving `a` and `b` to `target` keeps every other triangle facing the same way
    fn preserves_orientation(
        &self,
        a: usize,
        b: usize,
        shared: &HashSet<usize>,
        target: &Vector3<f64>,
    ) -> bool {
        let p = |x: usize| self.positions[x];
        [a, b].iter().all(|&v| {
            self.vertex_faces[v]
                .iter()
                .filter(|&&fi| !shared.contains(&fi))
                .all(|&fi| {
                    let f = self.faces[fi];
                    let old = (p(f[1]) - p(f[0])).cross(&(p(f[2]) - p(f[0])));
                    let moved = f.map(|x| if x == v { *target } else { p(x) });
                    let new = (moved[1] - moved[0]).cross(&(moved[2] - moved[0]));
                    new.norm() >= 1e-12 && old.dot(&new) > 0.0
                })
        })
    }

    /// Collapse `b` into `a`, returning the number of triangles removed
    fn try_collapse(&mut self, c: &Candidate) -> Option<usize> {
        let (a, b) = (c.a, c.b);
        let shared: HashSet<usize> = self.vertex_faces[a]
            .intersection(&self.vertex_faces[b])
            .copied()
            .collect();
        if shared.is_empty() {
            return None;
        }
        let common = self.neighbors(a).intersection(&self.neighbors(b)).count();
        if common != shared.len() {
            return None;
        }
        if !self.preserves_orientation(a, b, &shared, &c.target) {
            return None;
        }

        self.positions[a] = c.target;
        self.quadrics[a] = self.quadrics[a] + self.quadrics[b];
        let b_faces: Vec<usize> = self.vertex_faces[b].iter().copied().collect();
        for fi in b_faces {
            if shared.contains(&fi) {
                self.face_alive[fi] = false;
                for x in self.faces[fi] {
                    self.vertex_faces[x].remove(&fi);
                }
            } else {
                for x in self.faces[fi].iter_mut() {
                    if *x == b {
                        *x = a;
                    }
                }
                self.vertex_faces[a].insert(fi);
            }
        }
        self.vertex_faces[b].clear();
        self.vertex_alive[b] = false;
        self.stamps[a] += 1;
        for n in self.neighbors(a) {
            self.push(a, n);
        }
        Some(shared.len())
    }

    fn into_mesh(self) -> Mesh {
        let mut remap = vec![usize::MAX; self.positions.len()];
        let mut mesh = Mesh::new();
        for (i, p) in self.positions.iter().enumerate() {
            if self.vertex_alive[i] && !self.vertex_faces[i].is_empty() {
                remap[i] = mesh.vertices.len();
                mesh.vertices.push(Vertex::from(*p));
            }
        }
        mesh.triangles = self
            .faces
            .iter()
            .zip(&self.face_alive)
            .filter(|(_, alive)| **alive)
            .map(|(f, _)| Triangle::new(remap[f[0]], remap[f[1]], remap[f[2]]))
            .collect();
        mesh
    }
}

/// Simplify `mesh` towards `target_triangles`
pub fn decimate(mesh: &Mesh, target_triangles: usize) -> DecimationResult {
    decimate_with_options(mesh, &DecimateOptions::new(target_triangles))
}

/// Simplify `mesh` with explicit bounds
///
/// Stops at the target, at the collapse bound, or when no legal collapse
/// remains. The output has no normals.
pub fn decimate_with_options(mesh: &Mesh, options: &DecimateOptions) -> DecimationResult {
    let original_triangles = mesh.triangle_count();
    if original_triangles <= options.target_triangles || mesh.check_indices().is_err() {
        return DecimationResult {
            mesh: mesh.clone(),
            original_triangles,
            final_triangles: original_triangles,
            collapses: 0,
        };
    }

    let mut decimator = Decimator::new(mesh);
    let mut active = original_triangles;
    let mut collapses = 0;
    while active > options.target_triangles {
        if options.max_collapses.is_some_and(|max| collapses >= max) {
            debug!(collapses, "Collapse bound reached");
            break;
        }
        let Some(candidate) = decimator.heap.pop() else {
            debug!(active, "No legal collapse left");
            break;
        };
        if decimator.is_stale(&candidate) {
            continue;
        }
        if let Some(removed) = decimator.try_collapse(&candidate) {
            active -= removed;
            collapses += 1;
        }
    }

    let simplified = decimator.into_mesh();
    info!(
        before = original_triangles,
        after = simplified.triangle_count(),
        collapses,
        "Decimated mesh"
    );
    DecimationResult {
        final_triangles: simplified.triangle_count(),
        mesh: simplified,
        original_triangles,
        collapses,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh_ops::{is_watertight, signed_volume};
    use crate::validator::is_orientable;

    /// Closed, outward-wound UV sphere
    fn uv_sphere(radius: f64, rings: usize, segments: usize) -> Mesh {
        let mut mesh = Mesh::new();
        mesh.vertices.push(Vertex::new(0.0, 0.0, radius));
        for r in 1..rings {
            let theta = std::f64::consts::PI * r as f64 / rings as f64;
            for s in 0..segments {
                let phi = 2.0 * std::f64::consts::PI * s as f64 / segments as f64;
                mesh.vertices.push(Vertex::new(
                    radius * theta.sin() * phi.cos(),
                    radius * theta.sin() * phi.sin(),
                    radius * theta.cos(),
                ));
            }
        }
        let south = mesh.vertices.len();
        mesh.vertices.push(Vertex::new(0.0, 0.0, -radius));

        let ring = |r: usize, s: usize| 1 + (r - 1) * segments + s % segments;
        for s in 0..segments {
            mesh.triangles.push(Triangle::new(0, ring(1, s), ring(1, s + 1)));
            mesh.triangles
                .push(Triangle::new(south, ring(rings - 1, s + 1), ring(rings - 1, s)));
        }
        for r in 1..rings - 1 {
            for s in 0..segments {
                mesh.triangles
                    .push(Triangle::new(ring(r, s), ring(r + 1, s), ring(r + 1, s + 1)));
                mesh.triangles
                    .push(Triangle::new(ring(r, s), ring(r + 1, s + 1), ring(r, s + 1)));
            }
        }
        mesh
    }

    #[test]
    fn test_quadric_plane_distance() {
        let q = Quadric::from_plane(0.0, 0.0, 1.0, -2.0);
        assert!((q.evaluate(&Vector3::new(5.0, -3.0, 2.0))).abs() < 1e-12);
        assert!((q.evaluate(&Vector3::new(0.0, 0.0, 5.0)) - 9.0).abs() < 1e-12);
        // a single plane does not determine a point
        assert!(q.optimal_point().is_none());
    }

    #[test]
    fn test_quadric_corner_point() {
        let q = Quadric::from_plane(1.0, 0.0, 0.0, -1.0)
            + Quadric::from_plane(0.0, 1.0, 0.0, -2.0)
            + Quadric::from_plane(0.0, 0.0, 1.0, -3.0);
        let p = q.optimal_point().unwrap();
        assert!((p - Vector3::new(1.0, 2.0, 3.0)).norm() < 1e-9);
    }

    #[test]
    fn test_sphere_fixture_is_closed() {
        let mesh = uv_sphere(10.0, 24, 48);
        assert!(is_watertight(&mesh));
        assert!(signed_volume(&mesh) > 0.0);
    }

    #[test]
    fn test_decimate_keeps_sphere_closed() {
        let mesh = uv_sphere(10.0, 24, 48);
        let before = signed_volume(&mesh);
        let result = decimate(&mesh, 600);
        assert_eq!(result.original_triangles, mesh.triangle_count());
        assert!(result.reached(600), "Got {}", result.final_triangles);
        assert!(is_watertight(&result.mesh));
        assert!(is_orientable(&result.mesh));
        let after = signed_volume(&result.mesh);
        assert!((after - before).abs() / before < 0.05, "{} vs {}", after, before);
    }

    #[test]
    fn test_below_target_is_untouched() {
        let mesh = uv_sphere(1.0, 6, 8);
        let result = decimate(&mesh, 10_000);
        assert_eq!(result.collapses, 0);
        assert_eq!(result.mesh.triangles, mesh.triangles);
    }

    #[test]
    fn test_collapse_bound() {
        let mesh = uv_sphere(10.0, 24, 48);
        let result = decimate_with_options(&mesh, &DecimateOptions::new(0).with_max_collapses(10));
        assert_eq!(result.collapses, 10);
        assert_eq!(result.final_triangles, mesh.triangle_count() - 20);
    }
}
