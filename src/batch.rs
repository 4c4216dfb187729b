//! Multi-label batch conversion
//!
//! Every label of a volume is converted independently, in parallel when
//! `PipelineConfig::parallel` is set. A failing label never stops the
//! batch: its error is logged and recorded in the [`BatchSummary`].

use crate::config::PipelineConfig;
use crate::error::{Error, Result};
use crate::model::Mesh;
use crate::pipeline::{LabelMesh, convert_label};
use crate::print::{PrintPreparation, prepare_for_print_detailed};
use crate::registry::LabelRegistry;
use crate::volume::LabeledVolume;
use crate::writer::{combine_meshes, export_named};
use rayon::prelude::*;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// How one label ended
#[derive(Debug, Clone, PartialEq)]
pub enum LabelOutcome {
    /// A mesh was produced
    Succeeded {
        /// Triangles in the final mesh
        triangles: usize,
        /// Written STL, when the batch exported
        path: Option<PathBuf>,
    },
    /// The label had no usable surface
    SkippedEmpty,
    /// Conversion or export failed
    Failed {
        /// Rendered error
        error: String,
    },
}

/// Outcome of one label
#[derive(Debug, Clone, PartialEq)]
pub struct LabelReport {
    /// Label ID
    pub label_id: u32,
    /// Structure name
    pub name: String,
    /// Voxels carrying the label
    pub voxel_count: usize,
    /// What happened
    pub outcome: LabelOutcome,
}

/// Per-label outcomes of a batch, in label order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchSummary {
    /// One report per requested label
    pub reports: Vec<LabelReport>,
    /// Outcome of the combined export, when one was requested
    pub combined: Option<LabelOutcome>,
}

impl BatchSummary {
    fn count(&self, pred: impl Fn(&LabelOutcome) -> bool) -> usize {
        self.reports.iter().filter(|r| pred(&r.outcome)).count()
    }

    /// Labels that produced a mesh
    pub fn succeeded(&self) -> usize {
        self.count(|o| matches!(o, LabelOutcome::Succeeded { .. }))
    }

    /// Labels skipped for having no surface
    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, LabelOutcome::SkippedEmpty))
    }

    /// Labels that failed
    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, LabelOutcome::Failed { .. }))
    }

    /// Written STL files
    pub fn exported_paths(&self) -> Vec<&Path> {
        self.reports
            .iter()
            .filter_map(|r| match &r.outcome {
                LabelOutcome::Succeeded {
                    path: Some(path), ..
                } => Some(path.as_path()),
                _ => None,
            })
            .collect()
    }
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} succeeded, {} skipped (empty), {} failed",
            self.succeeded(),
            self.skipped(),
            self.failed()
        )?;
        for report in &self.reports {
            let status = match &report.outcome {
                LabelOutcome::Succeeded { triangles, .. } => {
                    format!("ok ({} triangles)", triangles)
                }
                LabelOutcome::SkippedEmpty => "skipped (empty)".to_string(),
                LabelOutcome::Failed { error } => format!("failed: {}", error),
            };
            writeln!(
                f,
                "  [{}] {} ({} voxels): {}",
                report.label_id, report.name, report.voxel_count, status
            )?;
        }
        match &self.combined {
            Some(LabelOutcome::Succeeded { triangles, .. }) => {
                writeln!(f, "  combined: ok ({} triangles)", triangles)?
            }
            Some(LabelOutcome::Failed { error }) => writeln!(f, "  combined: failed: {}", error)?,
            Some(LabelOutcome::SkippedEmpty) => writeln!(f, "  combined: skipped (empty)")?,
            None => {}
        }
        Ok(())
    }
}

/// A converted label ready for export
#[derive(Debug, Clone)]
pub struct NamedMesh {
    /// Label ID
    pub label_id: u32,
    /// Structure name
    pub name: String,
    /// Post-processed conversion result
    pub conversion: LabelMesh,
    /// Present when print preparation ran
    pub print: Option<PrintPreparation>,
}

impl NamedMesh {
    /// The final mesh: print-ready if prepared, post-processed otherwise
    pub fn mesh(&self) -> &Mesh {
        match &self.print {
            Some(prepared) => &prepared.mesh,
            None => &self.conversion.result.mesh,
        }
    }
}

/// Converted meshes plus the summary of the batch
#[derive(Debug, Clone, Default)]
pub struct BatchOutput {
    /// Successful conversions in label order
    pub meshes: Vec<NamedMesh>,
    /// Outcome of every requested label
    pub summary: BatchSummary,
}

/// Batch behaviour beyond the per-label pipeline
#[derive(Debug, Clone, Default)]
pub struct BatchOptions {
    /// Run print preparation on every mesh
    pub print_ready: bool,
    /// Also export all meshes combined under this name
    pub combined_name: Option<String>,
}

/// Labels a batch converts: the registry's labels, or every label present
/// when the registry is empty
fn requested_labels(volume: &LabeledVolume, registry: &LabelRegistry) -> Vec<(u32, String)> {
    if registry.is_empty() {
        volume
            .labels_present()
            .into_iter()
            .map(|id| (id, registry.name_or_default(id)))
            .collect()
    } else {
        registry.iter().map(|l| (l.id, l.name.clone())).collect()
    }
}

fn convert_one(
    volume: &LabeledVolume,
    label_id: u32,
    name: &str,
    voxel_count: usize,
    config: &PipelineConfig,
    print_ready: bool,
) -> std::result::Result<NamedMesh, LabelOutcome> {
    let outcome_for = |err: Error| {
        if err.is_empty_mesh() {
            info!(label_id, name, voxel_count, "Skipping label without surface");
            LabelOutcome::SkippedEmpty
        } else {
            warn!(label_id, name, voxel_count, error = %err, "Label conversion failed");
            LabelOutcome::Failed {
                error: err.to_string(),
            }
        }
    };

    let conversion = convert_label(volume, label_id, config).map_err(outcome_for)?;
    let print = if print_ready {
        let prepared = prepare_for_print_detailed(
            conversion.result.mesh.clone(),
            config.target_size_mm,
            config,
        )
        .map_err(outcome_for)?;
        Some(prepared)
    } else {
        None
    };

    info!(
        label_id,
        name,
        voxel_count,
        backend = conversion.backend,
        triangles = conversion.result.mesh.triangle_count(),
        "Converted label"
    );
    Ok(NamedMesh {
        label_id,
        name: name.to_string(),
        conversion,
        print,
    })
}

/// Convert every requested label of a volume
///
/// Per-label problems end up in the summary and never stop the batch.
///
/// # Errors
/// [`Error::Config`] when `config` is invalid; no label is attempted then.
pub fn process_volume(
    volume: &LabeledVolume,
    registry: &LabelRegistry,
    config: &PipelineConfig,
    options: &BatchOptions,
) -> Result<BatchOutput> {
    config.validate()?;
    let counts = volume.label_counts();
    let labels = requested_labels(volume, registry);
    let run = |(label_id, name): &(u32, String)| {
        let voxel_count = counts.get(label_id).copied().unwrap_or(0);
        let result = convert_one(
            volume,
            *label_id,
            name,
            voxel_count,
            config,
            options.print_ready,
        );
        (*label_id, name.clone(), voxel_count, result)
    };
    let results: Vec<_> = if config.parallel {
        labels.par_iter().map(run).collect()
    } else {
        labels.iter().map(run).collect()
    };

    let mut output = BatchOutput::default();
    for (label_id, name, voxel_count, result) in results {
        let outcome = match result {
            Ok(named) => {
                let outcome = LabelOutcome::Succeeded {
                    triangles: named.mesh().triangle_count(),
                    path: None,
                };
                output.meshes.push(named);
                outcome
            }
            Err(outcome) => outcome,
        };
        output.summary.reports.push(LabelReport {
            label_id,
            name,
            voxel_count,
            outcome,
        });
    }
    Ok(output)
}

/// Merge the world-space meshes of every converted label into one model
///
/// The meshes are combined before any print preparation so the structures
/// keep their relative placement; the combination is then prepared as a
/// single part when `print_ready` is set.
fn build_combined(
    meshes: &[NamedMesh],
    config: &PipelineConfig,
    print_ready: bool,
) -> Result<Option<Mesh>> {
    let world: Vec<Mesh> = meshes
        .iter()
        .map(|m| m.conversion.result.mesh.clone())
        .collect();
    if world.is_empty() {
        return Ok(None);
    }
    let combined = combine_meshes(&world);
    if print_ready {
        let prepared = prepare_for_print_detailed(combined, config.target_size_mm, config)?;
        Ok(Some(prepared.mesh))
    } else {
        Ok(Some(combined))
    }
}

/// Convert every requested label and write one STL per structure into `dir`
///
/// With `combined_name` set, the world-space meshes of all labels are also
/// merged and written as one file; its outcome is recorded in
/// [`BatchSummary::combined`].
///
/// # Errors
/// When `config` is invalid or `dir` cannot be created; per-label and
/// combined export failures are recorded in the summary.
pub fn export_volume<P: AsRef<Path>>(
    volume: &LabeledVolume,
    registry: &LabelRegistry,
    config: &PipelineConfig,
    options: &BatchOptions,
    dir: P,
) -> Result<BatchSummary> {
    config.validate()?;
    let dir = dir.as_ref();
    std::fs::create_dir_all(dir).map_err(|e| Error::export(dir, e))?;
    let mut output = process_volume(volume, registry, config, options)?;

    for named in &output.meshes {
        let written = export_named(&[(named.name.clone(), named.mesh().clone())], dir);
        let Some(report) = output
            .summary
            .reports
            .iter_mut()
            .find(|r| r.label_id == named.label_id)
        else {
            continue;
        };
        match written {
            Ok(paths) => {
                if let LabelOutcome::Succeeded { path, .. } = &mut report.outcome {
                    *path = paths.into_iter().next();
                }
            }
            Err(err) => {
                warn!(label_id = named.label_id, error = %err, "Export failed");
                report.outcome = LabelOutcome::Failed {
                    error: err.to_string(),
                };
            }
        }
    }

    if let Some(name) = &options.combined_name {
        let written = build_combined(&output.meshes, config, options.print_ready).and_then(
            |combined| match combined {
                Some(mesh) => {
                    let triangles = mesh.triangle_count();
                    let paths = export_named(&[(name.clone(), mesh)], dir)?;
                    Ok(LabelOutcome::Succeeded {
                        triangles,
                        path: paths.into_iter().next(),
                    })
                }
                None => Ok(LabelOutcome::SkippedEmpty),
            },
        );
        output.summary.combined = Some(written.unwrap_or_else(|err| {
            warn!(name = name.as_str(), error = %err, "Combined export failed");
            LabelOutcome::Failed {
                error: err.to_string(),
            }
        }));
    }

    info!(
        succeeded = output.summary.succeeded(),
        skipped = output.summary.skipped(),
        failed = output.summary.failed(),
        "Batch finished"
    );
    Ok(output.summary)
}
