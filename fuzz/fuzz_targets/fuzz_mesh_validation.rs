#![no_main]

use libfuzzer_sys::fuzz_target;
use libfuzzer_sys::arbitrary::{Arbitrary, Result, Unstructured};

#[derive(Debug)]
struct FuzzMesh {
    vertices: Vec<(f64, f64, f64)>,
    triangles: Vec<(usize, usize, usize)>,
}

impl<'a> Arbitrary<'a> for FuzzMesh {
    fn arbitrary(u: &mut Unstructured<'a>) -> Result<Self> {
        let vertex_count = u.int_in_range(0..=100)?;
        let mut vertices = Vec::new();
        for _ in 0..vertex_count {
            vertices.push((u.arbitrary()?, u.arbitrary()?, u.arbitrary()?));
        }

        // Indices stay in range so the mesh operations see valid topology
        let triangle_count = u.int_in_range(0..=50)?;
        let mut triangles = Vec::new();
        if vertex_count > 0 {
            for _ in 0..triangle_count {
                let v1 = u.int_in_range(0..=(vertex_count - 1))?;
                let v2 = u.int_in_range(0..=(vertex_count - 1))?;
                let v3 = u.int_in_range(0..=(vertex_count - 1))?;
                triangles.push((v1, v2, v3));
            }
        }

        Ok(FuzzMesh { vertices, triangles })
    }
}

fuzz_target!(|mesh_data: FuzzMesh| {
    let mut mesh = labelmesh::Mesh::new();

    for (x, y, z) in mesh_data.vertices.iter() {
        // Skip NaN and infinite values
        if !x.is_finite() || !y.is_finite() || !z.is_finite() {
            continue;
        }
        mesh.vertices.push(labelmesh::Vertex::new(*x, *y, *z));
    }

    for (v1, v2, v3) in mesh_data.triangles.iter() {
        if *v1 < mesh.vertices.len() && *v2 < mesh.vertices.len() && *v3 < mesh.vertices.len() {
            mesh.triangles.push(labelmesh::Triangle::new(*v1, *v2, *v3));
        }
    }

    let _ = labelmesh::validator::validate(&mesh);
    let _ = labelmesh::mesh_ops::compute_aabb(&mesh);

    labelmesh::clean::clean_mesh(&mut mesh, &labelmesh::clean::CleanParams::default());
    let report = labelmesh::repair::make_watertight(
        &mut mesh,
        &labelmesh::repair::RepairParams::default(),
    );
    let _ = report.finally_watertight;
    let _ = labelmesh::decimate::decimate(&mesh, mesh.triangle_count() / 2);
});
