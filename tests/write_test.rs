//! Tests for STL export

mod common;

use common::{box_mesh, two_structures};
use labelmesh::writer::{export_named, read_stl};
use labelmesh::{
    BatchOptions, LabelInfo, LabelOutcome, LabelRegistry, LabeledVolume, Mesh, PipelineConfig,
    Triangle, Vertex, export_mesh, export_volume,
};
use tempfile::tempdir;

/// A single triangle survives export and re-import
#[test]
fn test_single_triangle_roundtrip() {
    let mut mesh = Mesh::new();
    mesh.vertices.push(Vertex::new(0.0, 0.0, 0.0));
    mesh.vertices.push(Vertex::new(12.5, 0.0, 1.0));
    mesh.vertices.push(Vertex::new(3.25, 7.75, -2.0));
    mesh.triangles.push(Triangle::new(0, 1, 2));

    let dir = tempdir().unwrap();
    let path = dir.path().join("triangle.stl");
    export_mesh(&mesh, &path).unwrap();

    assert_eq!(std::fs::metadata(&path).unwrap().len(), 84 + 50);

    let loaded = read_stl(&path).unwrap();
    assert_eq!(loaded.triangle_count(), 1);
    assert_eq!(loaded.vertex_count(), 3);
    let t = loaded.triangles[0];
    for (original, index) in mesh.vertices.iter().zip([t.v1, t.v2, t.v3]) {
        let read = loaded.vertices[index];
        assert!((original.x - read.x).abs() < 1e-5);
        assert!((original.y - read.y).abs() < 1e-5);
        assert!((original.z - read.z).abs() < 1e-5);
    }
}

#[test]
fn test_export_creates_parent_directories() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("nested").join("deeper").join("box.stl");
    export_mesh(&box_mesh([0.0; 3], [1.0, 2.0, 3.0]), &path).unwrap();
    assert!(path.exists());
}

#[test]
fn test_export_replaces_existing_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("box.stl");
    std::fs::write(&path, b"stale").unwrap();
    export_mesh(&box_mesh([0.0; 3], [1.0; 3]), &path).unwrap();
    assert_eq!(read_stl(&path).unwrap().triangle_count(), 12);
}

#[test]
fn test_named_export_sanitizes_names() {
    let dir = tempdir().unwrap();
    let meshes = vec![
        ("Left Kidney".to_string(), box_mesh([0.0; 3], [1.0; 3])),
        ("../escape".to_string(), box_mesh([0.0; 3], [2.0; 3])),
    ];
    let paths = export_named(&meshes, dir.path()).unwrap();
    assert_eq!(paths[0], dir.path().join("Left_Kidney.stl"));
    assert_eq!(paths[1], dir.path().join("escape.stl"));
}

#[test]
fn test_export_volume_writes_one_file_per_structure() {
    let (labels, _, _) = two_structures();
    let volume = LabeledVolume::with_spacing(labels, [1.0; 3]).unwrap();
    let registry = LabelRegistry::new(vec![
        LabelInfo::new(1, "liver", [255, 0, 0]),
        LabelInfo::new(2, "spleen", [0, 255, 0]),
    ])
    .unwrap();
    let options = BatchOptions {
        print_ready: false,
        combined_name: Some("all structures".to_string()),
    };

    let dir = tempdir().unwrap();
    let summary = export_volume(
        &volume,
        &registry,
        &PipelineConfig::default(),
        &options,
        dir.path(),
    )
    .unwrap();

    assert_eq!(summary.succeeded(), 2);
    assert_eq!(summary.exported_paths().len(), 2);
    for report in &summary.reports {
        match &report.outcome {
            LabelOutcome::Succeeded { triangles, path } => {
                let path = path.as_ref().unwrap();
                assert_eq!(read_stl(path).unwrap().triangle_count(), *triangles);
            }
            other => panic!("Unexpected outcome {:?}", other),
        }
    }

    let combined = read_stl(dir.path().join("all_structures.stl")).unwrap();
    let parts: usize = summary
        .reports
        .iter()
        .map(|r| match r.outcome {
            LabelOutcome::Succeeded { triangles, .. } => triangles,
            _ => 0,
        })
        .sum();
    assert_eq!(combined.triangle_count(), parts);
}
