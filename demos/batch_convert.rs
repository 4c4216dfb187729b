//! Batch Conversion Example
//!
//! Converts every labeled structure of a NIfTI segmentation into one STL
//! per structure, named after a JSON label registry.
//!
//! Usage:
//! ```bash
//! cargo run --example batch_convert -- segmentation.nii.gz labels.json out/
//! cargo run --example batch_convert -- segmentation.nii.gz - out/ --print-ready
//! ```
//!
//! Passing `-` as the registry converts every label present in the volume
//! and names files `label_<id>.stl`. A pipeline configuration can be given
//! with `--config <file.json>`.

use labelmesh::{BatchOptions, LabelRegistry, PipelineConfig, export_volume, nifti};
use std::env;
use std::process::ExitCode;

fn run() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();
    if args.len() < 4 {
        eprintln!(
            "Usage: {} <volume.nii[.gz]|archive.zip> <labels.json|-> <output_dir> [--print-ready] [--combined <name>] [--config <file.json>]",
            args[0]
        );
        return Ok(ExitCode::from(2));
    }

    let mut options = BatchOptions::default();
    let mut config = PipelineConfig::default();
    let mut rest = args[4..].iter();
    while let Some(flag) = rest.next() {
        match flag.as_str() {
            "--print-ready" => options.print_ready = true,
            "--combined" => options.combined_name = rest.next().cloned(),
            "--config" => {
                let path = rest.next().ok_or("--config needs a file")?;
                config = PipelineConfig::from_json_file(path)?;
            }
            other => return Err(format!("Unknown option {}", other).into()),
        }
    }

    println!("Loading: {}", args[1]);
    let volume = nifti::load(&args[1])?;
    println!(
        "  {:?} voxels, spacing {:?} mm, {} labels present",
        volume.dim(),
        volume.spacing(),
        volume.labels_present().len()
    );

    let registry = if args[2] == "-" {
        LabelRegistry::default()
    } else {
        LabelRegistry::from_json_file(&args[2])?
    };

    let summary = export_volume(&volume, &registry, &config, &options, &args[3])?;
    println!();
    println!("{}", summary);

    Ok(if summary.failed() > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {}", err);
            ExitCode::FAILURE
        }
    }
}
