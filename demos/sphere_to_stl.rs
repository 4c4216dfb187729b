//! Sphere to STL Example
//!
//! Builds a synthetic labeled volume holding one ball, converts it to a
//! print-ready mesh and writes it as binary STL.
//!
//! Usage:
//! ```bash
//! cargo run --example sphere_to_stl [output.stl]
//! ```

use labelmesh::mesh_ops::compute_aabb;
use labelmesh::{LabeledVolume, PipelineConfig, export_mesh, pipeline, prepare_for_print_detailed};
use ndarray::Array3;
use std::env;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();
    let output = if args.len() > 1 { &args[1] } else { "sphere.stl" };

    println!("=== Sphere to STL Example ===\n");

    // 64^3 volume, radius 20 voxels, 1mm isotropic spacing
    let n = 64;
    let radius = 20.0f64;
    let c = (n as f64 - 1.0) / 2.0;
    let labels = Array3::from_shape_fn((n, n, n), |(i, j, k)| {
        let d2 = (i as f64 - c).powi(2) + (j as f64 - c).powi(2) + (k as f64 - c).powi(2);
        u32::from(d2 <= radius * radius)
    });
    let volume = LabeledVolume::with_spacing(labels, [1.0; 3])?;
    println!("Volume: {:?} voxels", volume.dim());
    println!("Label 1 voxels: {}", volume.isolate(1).count());
    println!();

    let config = PipelineConfig::default();
    let converted = pipeline::convert_label(&volume, 1, &config)?;
    println!("Surface ({})", converted.backend);
    println!("  Vertices:  {}", converted.result.mesh.vertex_count());
    println!("  Triangles: {}", converted.result.mesh.triangle_count());
    println!(
        "  Volume:    {:.1} mm^3 (target {:.1}, error {:.2}%)",
        converted.result.smoothing.final_volume,
        converted.result.smoothing.target_volume,
        converted.result.smoothing.volume_error * 100.0
    );
    println!();

    let prepared = prepare_for_print_detailed(converted.result.mesh, 100.0, &config)?;
    let bounds = compute_aabb(&prepared.mesh)?;
    let extent = bounds.extent();
    println!("Print preparation");
    println!("  Scale factor: {:.4}", prepared.scale_factor);
    println!(
        "  Size:         {:.2} x {:.2} x {:.2} mm",
        extent[0], extent[1], extent[2]
    );
    println!(
        "  Score:        {}/10 ({})",
        prepared.validation.printability_score, prepared.validation.quality
    );
    for warning in &prepared.validation.warnings {
        println!("  Warning: {}", warning);
    }
    println!();

    export_mesh(&prepared.mesh, output)?;
    println!("Wrote {}", output);
    Ok(())
}
