//! Triangulation of closed boundary loops in 3D
//!
//! A loop is projected onto the plane orthogonal to its Newell normal and
//! triangulated in 2D with the earcut algorithm. Every output triangle is
//! wound so its normal agrees with the loop normal. When ear cutting is
//! unavailable or fails, a fan around the first vertex is used.

use nalgebra::Vector3;

/// Errors from polygon triangulation
#[derive(Debug, thiserror::Error)]
pub enum TriangulationError {
    /// Polygon has fewer than 3 vertices
    #[error("Polygon has too few vertices: {0} (minimum 3 required)")]
    TooFewVertices(usize),

    /// The polygon has no area in any projection
    #[error("Polygon is degenerate: {0}")]
    Degenerate(String),

    /// Earcut returned an error or no triangles
    #[error("Triangulation failed: {0}")]
    TriangulationFailed(String),
}

/// Newell normal of a closed polygon, not normalized
///
/// Its direction follows the polygon's winding by the right-hand rule and its
/// length is twice the projected area.
pub fn newell_normal(points: &[Vector3<f64>]) -> Vector3<f64> {
    let n = points.len();
    let mut normal = Vector3::zeros();
    for i in 0..n {
        let p = points[i];
        let q = points[(i + 1) % n];
        normal.x += (p.y - q.y) * (p.z + q.z);
        normal.y += (p.z - q.z) * (p.x + q.x);
        normal.z += (p.x - q.x) * (p.y + q.y);
    }
    normal
}

/// Project onto the plane orthogonal to `normal` as flat `[x0, y0, x1, y1, ...]`
fn project_to_plane(points: &[Vector3<f64>], normal: &Vector3<f64>) -> Vec<f64> {
    let helper = if normal.x.abs() < 0.9 {
        Vector3::x()
    } else {
        Vector3::y()
    };
    let u = normal.cross(&helper).normalize();
    let v = normal.cross(&u);
    let mut coords = Vec::with_capacity(points.len() * 2);
    for p in points {
        coords.push(p.dot(&u));
        coords.push(p.dot(&v));
    }
    coords
}

#[cfg(feature = "polygon-ops")]
fn earcut_indices(coords: &[f64]) -> Result<Vec<usize>, TriangulationError> {
    let hole_indices: Vec<usize> = Vec::new();
    let result = earcutr::earcut(coords, &hole_indices, 2)
        .map_err(|e| TriangulationError::TriangulationFailed(format!("Earcut error: {:?}", e)))?;
    if result.is_empty() {
        return Err(TriangulationError::TriangulationFailed(
            "Earcut returned no triangles".to_string(),
        ));
    }
    Ok(result)
}

#[cfg(not(feature = "polygon-ops"))]
fn earcut_indices(_coords: &[f64]) -> Result<Vec<usize>, TriangulationError> {
    Err(TriangulationError::TriangulationFailed(
        "polygon-ops feature disabled".to_string(),
    ))
}

/// Fan triangulation around the first vertex
pub fn triangulate_fan(n: usize) -> Vec<[usize; 3]> {
    (1..n.saturating_sub(1)).map(|i| [0, i, i + 1]).collect()
}

/// Triangulate a closed 3D loop, returning indices into `points`
///
/// Triangles are wound to agree with the loop's own winding.
pub fn triangulate_loop(points: &[Vector3<f64>]) -> Result<Vec<[usize; 3]>, TriangulationError> {
    if points.len() < 3 {
        return Err(TriangulationError::TooFewVertices(points.len()));
    }
    let normal = newell_normal(points);
    if normal.norm() <= f64::EPSILON {
        return Err(TriangulationError::Degenerate(format!(
            "loop of {} vertices has no projected area",
            points.len()
        )));
    }
    let normal = normal.normalize();
    if points.len() == 3 {
        return Ok(vec![[0, 1, 2]]);
    }

    let coords = project_to_plane(points, &normal);
    let triangles = match earcut_indices(&coords) {
        Ok(indices) => indices
            .chunks_exact(3)
            .map(|c| [c[0], c[1], c[2]])
            .collect(),
        Err(_) => triangulate_fan(points.len()),
    };

    Ok(triangles
        .into_iter()
        .map(|[a, b, c]| {
            let n = (points[b] - points[a]).cross(&(points[c] - points[a]));
            if n.dot(&normal) < 0.0 { [a, c, b] } else { [a, b, c] }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(z: f64) -> Vec<Vector3<f64>> {
        vec![
            Vector3::new(0.0, 0.0, z),
            Vector3::new(10.0, 0.0, z),
            Vector3::new(10.0, 10.0, z),
            Vector3::new(0.0, 10.0, z),
        ]
    }

    #[test]
    fn test_newell_normal_square() {
        let normal = newell_normal(&square(3.0));
        assert!((normal - Vector3::new(0.0, 0.0, 200.0)).norm() < 1e-9);
    }

    #[test]
    fn test_square_follows_winding() {
        let points = square(0.0);
        let triangles = triangulate_loop(&points).unwrap();
        assert_eq!(triangles.len(), 2);
        for [a, b, c] in triangles {
            let n = (points[b] - points[a]).cross(&(points[c] - points[a]));
            assert!(n.z > 0.0);
        }

        let mut reversed = points.clone();
        reversed.reverse();
        for [a, b, c] in triangulate_loop(&reversed).unwrap() {
            let n = (reversed[b] - reversed[a]).cross(&(reversed[c] - reversed[a]));
            assert!(n.z < 0.0);
        }
    }

    #[test]
    fn test_concave_loop_in_tilted_plane() {
        // L-shape in the plane x = y
        let l_shape = [
            (0.0, 0.0),
            (2.0, 0.0),
            (2.0, 1.0),
            (1.0, 1.0),
            (1.0, 2.0),
            (0.0, 2.0),
        ];
        let points: Vec<_> = l_shape
            .iter()
            .map(|&(s, t)| Vector3::new(s, s, t))
            .collect();
        let triangles = triangulate_loop(&points).unwrap();
        assert_eq!(triangles.len(), 4);

        let area: f64 = triangles
            .iter()
            .map(|&[a, b, c]| 0.5 * (points[b] - points[a]).cross(&(points[c] - points[a])).norm())
            .sum();
        assert!((area - 3.0 * 2f64.sqrt()).abs() < 1e-9, "Area: {}", area);
    }

    #[test]
    fn test_too_few_vertices() {
        let points = vec![Vector3::zeros(), Vector3::x()];
        assert!(matches!(
            triangulate_loop(&points),
            Err(TriangulationError::TooFewVertices(2))
        ));
    }

    #[test]
    fn test_collinear_loop_is_degenerate() {
        let points = vec![Vector3::zeros(), Vector3::x(), Vector3::x() * 2.0];
        assert!(matches!(
            triangulate_loop(&points),
            Err(TriangulationError::Degenerate(_))
        ));
    }

    #[test]
    fn test_fan() {
        assert_eq!(triangulate_fan(5), vec![[0, 1, 2], [0, 2, 3], [0, 3, 4]]);
        assert!(triangulate_fan(2).is_empty());
    }
}
