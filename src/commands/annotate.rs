//! `annotate` subcommand

use crate::catalog::ActionCatalog;
use crate::commands::output::{percent, print_json, print_table};
use crate::processing::{annotate_directory, annotate_recording, BatchReport};
use anyhow::Context;
use chrono::Utc;
use std::path::Path;

/// Annotates a single input log, or every recording under a directory.
pub fn run(catalog_path: &Path, target: &Path, recursive: bool, json: bool) -> anyhow::Result<()> {
    let catalog =
        ActionCatalog::load(catalog_path).with_context(|| format!("loading {}", catalog_path.display()))?;

    let report = if target.is_file() {
        let started_at = Utc::now();
        let summary = annotate_recording(&catalog, target).with_context(|| format!("annotating {}", target.display()))?;
        BatchReport {
            started_at,
            finished_at: Utc::now(),
            annotated: vec![summary],
            failed: Vec::new(),
        }
    } else {
        annotate_directory(&catalog, target, recursive)
            .with_context(|| format!("annotating recordings in {}", target.display()))?
    };

    if json {
        return print_json(&report);
    }

    let rows: Vec<Vec<String>> = report
        .annotated
        .iter()
        .map(|summary| {
            vec![
                summary.inputs.display().to_string(),
                summary.total_frames.to_string(),
                format!("{}", summary.video_fps),
                summary.events.to_string(),
                format!(
                    "{} ({:.1}%)",
                    summary.active_frames,
                    percent(summary.active_frames as u64, summary.total_frames)
                ),
                summary.looking_frames.to_string(),
                summary.skipped_lines.to_string(),
            ]
        })
        .collect();
    print_table(
        &["RECORDING", "FRAMES", "FPS", "EVENTS", "ACTIVE", "LOOKING", "SKIPPED"],
        &rows,
    );

    for failed in &report.failed {
        println!("skipped {}: {}", failed.inputs.display(), failed.error);
    }
    println!(
        "\n{} annotated, {} skipped, {} frames labelled in {:.2}s",
        report.annotated.len(),
        report.failed.len(),
        report.total_frames(),
        (report.finished_at - report.started_at).num_milliseconds() as f64 / 1000.0
    );
    Ok(())
}
