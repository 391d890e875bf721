//! Recording sessions on disk
//!
//! A recording directory holds, per session, an `inputs_<stamp>.jsonl` event
//! log and a `metadata_<stamp>.json` with the video's frame count and rate.
//! Annotating a session writes `annotations_<stamp>.csv` next to them with one
//! label row per video frame. Unstamped `inputs.jsonl` / `metadata.json` pairs
//! are accepted too.

use crate::capture::input::{read_event_log, EventLog, EventLogError, InputEvent};
use crate::catalog::{ActionCatalog, ActionId};
use crate::processing::aligner::{AlignError, AlignmentStats, EventWindowAligner};
use crate::processing::resolver::{ActionResolver, FrameActionLabel};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_VIDEO_FPS: f64 = 30.0;

/// A day of video at 240 fps. Larger frame counts are rejected as corrupt.
pub const MAX_TOTAL_FRAMES: u64 = 24 * 60 * 60 * 240;

const CSV_HEADER: &str = "frame,timestamp_ms,action_id,all_actions";

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Missing annotation input: {path}")]
    MissingAnnotationFile { path: PathBuf },

    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid metadata {path}: {reason}")]
    Metadata { path: PathBuf, reason: String },

    #[error(transparent)]
    EventLog(#[from] EventLogError),

    #[error(transparent)]
    Align(#[from] AlignError),

    #[error("No input logs found under {0}")]
    NoRecordings(PathBuf),
}

pub type SessionResult<T> = Result<T, SessionError>;

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> SessionError + '_ {
    move |source| SessionError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Video facts the recorder stores next to each input log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingMetadata {
    #[serde(default)]
    pub total_frames: u64,
    #[serde(default = "default_video_fps")]
    pub video_fps: f64,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub input_statistics: Option<serde_json::Value>,
}

fn default_video_fps() -> f64 {
    DEFAULT_VIDEO_FPS
}

impl RecordingMetadata {
    pub fn load(path: &Path) -> SessionResult<Self> {
        let content = std::fs::read_to_string(path).map_err(io_error(path))?;
        let metadata: Self = serde_json::from_str(&content).map_err(|e| SessionError::Metadata {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        metadata.check().map_err(|reason| SessionError::Metadata {
            path: path.to_path_buf(),
            reason,
        })?;
        Ok(metadata)
    }

    /// Rejects values no real recording has.
    pub fn check(&self) -> Result<(), String> {
        if self.total_frames > MAX_TOTAL_FRAMES {
            return Err(format!(
                "total_frames {} exceeds the limit of {}",
                self.total_frames, MAX_TOTAL_FRAMES
            ));
        }
        if !(self.video_fps.is_finite() && self.video_fps > 0.0) {
            return Err(format!("video_fps must be positive, got {}", self.video_fps));
        }
        Ok(())
    }
}

/// The three files that make up one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingFiles {
    pub inputs: PathBuf,
    /// Preferred metadata path; `metadata.json` in the same directory is the fallback.
    pub metadata: PathBuf,
    pub annotations: PathBuf,
}

impl RecordingFiles {
    pub fn for_inputs(inputs: &Path) -> Self {
        let dir = inputs.parent().unwrap_or_else(|| Path::new(""));
        let file_name = inputs
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let stamp = file_name
            .strip_prefix("inputs")
            .and_then(|rest| rest.strip_suffix(".jsonl"))
            .unwrap_or("");

        Self {
            inputs: inputs.to_path_buf(),
            metadata: dir.join(format!("metadata{}.json", stamp)),
            annotations: dir.join(format!("annotations{}.csv", stamp)),
        }
    }

    /// First metadata file that exists, stamped before unstamped.
    pub fn resolve_metadata(&self) -> SessionResult<PathBuf> {
        if self.metadata.exists() {
            return Ok(self.metadata.clone());
        }
        let fallback = self
            .inputs
            .parent()
            .unwrap_or_else(|| Path::new(""))
            .join("metadata.json");
        if fallback.exists() {
            return Ok(fallback);
        }
        Err(SessionError::MissingAnnotationFile {
            path: self.metadata.clone(),
        })
    }
}

/// Outcome of annotating one session.
#[derive(Debug, Clone, Serialize)]
pub struct RecordingSummary {
    pub inputs: PathBuf,
    pub annotations: PathBuf,
    pub total_frames: u64,
    pub video_fps: f64,
    pub events: usize,
    pub skipped_lines: usize,
    pub active_frames: usize,
    pub looking_frames: usize,
    pub alignment: AlignmentStats,
    /// Frames per primary action id, idle frames excluded.
    pub primary_counts: BTreeMap<ActionId, usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailedRecording {
    pub inputs: PathBuf,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub annotated: Vec<RecordingSummary>,
    pub failed: Vec<FailedRecording>,
}

impl BatchReport {
    pub fn total_frames(&self) -> u64 {
        self.annotated.iter().map(|summary| summary.total_frames).sum()
    }
}

/// Aligns and resolves one session's events into per-frame labels.
pub fn label_events(
    catalog: &ActionCatalog,
    events: &[InputEvent],
    metadata: &RecordingMetadata,
) -> SessionResult<(Vec<FrameActionLabel>, AlignmentStats)> {
    let aligner = EventWindowAligner::new(metadata.video_fps, metadata.total_frames)?;
    let alignment = aligner.align(events);
    let labels = ActionResolver::new(catalog).resolve_all(&alignment.windows);
    Ok((labels, alignment.stats))
}

/// Reads one session's metadata and event log.
pub fn load_recording(inputs: &Path) -> SessionResult<(RecordingFiles, RecordingMetadata, EventLog)> {
    if !inputs.exists() {
        return Err(SessionError::MissingAnnotationFile {
            path: inputs.to_path_buf(),
        });
    }

    let files = RecordingFiles::for_inputs(inputs);
    let metadata_path = files.resolve_metadata()?;
    let metadata = RecordingMetadata::load(&metadata_path)?;
    if let Some(stats) = &metadata.input_statistics {
        tracing::debug!("Recorded input statistics: {}", stats);
    }

    let log = read_event_log(inputs)?;
    Ok((files, metadata, log))
}

/// Labels every frame of one session and writes the annotation CSV.
pub fn annotate_recording(catalog: &ActionCatalog, inputs: &Path) -> SessionResult<RecordingSummary> {
    let (files, metadata, log) = load_recording(inputs)?;

    tracing::info!(
        "Annotating {}: {} frames at {} fps",
        inputs.display(),
        metadata.total_frames,
        metadata.video_fps
    );

    let (labels, alignment) = label_events(catalog, &log.events, &metadata)?;

    write_labels_atomic(&files.annotations, &labels)?;

    let mut primary_counts = BTreeMap::new();
    for label in labels.iter().filter(|label| !label.is_idle()) {
        *primary_counts.entry(label.primary_action_id).or_insert(0) += 1;
    }
    let summary = RecordingSummary {
        inputs: inputs.to_path_buf(),
        annotations: files.annotations,
        total_frames: metadata.total_frames,
        video_fps: metadata.video_fps,
        events: log.events.len(),
        skipped_lines: log.skipped_lines,
        active_frames: labels.iter().filter(|label| !label.is_idle()).count(),
        looking_frames: labels.iter().filter(|label| label.looking).count(),
        alignment,
        primary_counts,
    };

    tracing::info!(
        "Wrote {} ({} of {} frames with actions)",
        summary.annotations.display(),
        summary.active_frames,
        summary.total_frames
    );
    Ok(summary)
}

/// Input logs directly inside `dir`: every `inputs_*.jsonl`, or `inputs.jsonl`
/// when there are none.
pub fn find_input_logs(dir: &Path) -> SessionResult<Vec<PathBuf>> {
    let mut stamped = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(io_error(dir))? {
        let path = entry.map_err(io_error(dir))?.path();
        if !path.is_file() {
            continue;
        }
        let is_stamped_log = path
            .file_name()
            .and_then(|name| name.to_str())
            .map(|name| name.starts_with("inputs_") && name.ends_with(".jsonl"))
            .unwrap_or(false);
        if is_stamped_log {
            stamped.push(path);
        }
    }

    if stamped.is_empty() {
        let plain = dir.join("inputs.jsonl");
        if plain.is_file() {
            stamped.push(plain);
        }
    }

    stamped.sort();
    Ok(stamped)
}

/// Like [`find_input_logs`] but also descends into subdirectories. Symlinked
/// directories are not followed, and unreadable subdirectories are skipped.
pub fn find_input_logs_recursive(dir: &Path) -> SessionResult<Vec<PathBuf>> {
    let mut found = find_input_logs(dir)?;
    for subdir in subdirectories(dir)? {
        collect_input_logs(&subdir, &mut found);
    }
    Ok(found)
}

fn subdirectories(dir: &Path) -> SessionResult<Vec<PathBuf>> {
    let mut subdirs = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(io_error(dir))? {
        let entry = entry.map_err(io_error(dir))?;
        if entry.file_type().map_err(io_error(dir))?.is_dir() {
            subdirs.push(entry.path());
        }
    }
    subdirs.sort();
    Ok(subdirs)
}

fn collect_input_logs(dir: &Path, found: &mut Vec<PathBuf>) {
    let listing = find_input_logs(dir).and_then(|logs| subdirectories(dir).map(|subdirs| (logs, subdirs)));
    match listing {
        Ok((logs, subdirs)) => {
            found.extend(logs);
            for subdir in subdirs {
                collect_input_logs(&subdir, found);
            }
        }
        Err(e) => tracing::warn!("Skipping unreadable directory {}: {}", dir.display(), e),
    }
}

/// Annotates every session under `dir`. A failing session is recorded in the
/// report and the rest still run.
pub fn annotate_directory(
    catalog: &ActionCatalog,
    dir: &Path,
    recursive: bool,
) -> SessionResult<BatchReport> {
    let started_at = Utc::now();
    let logs = if recursive {
        find_input_logs_recursive(dir)?
    } else {
        find_input_logs(dir)?
    };
    if logs.is_empty() {
        return Err(SessionError::NoRecordings(dir.to_path_buf()));
    }

    tracing::info!("Found {} recording(s) under {}", logs.len(), dir.display());

    let mut annotated = Vec::new();
    let mut failed = Vec::new();
    for inputs in logs {
        match annotate_recording(catalog, &inputs) {
            Ok(summary) => annotated.push(summary),
            Err(e) => {
                tracing::warn!("Skipping {}: {}", inputs.display(), e);
                failed.push(FailedRecording {
                    inputs,
                    error: e.to_string(),
                });
            }
        }
    }

    Ok(BatchReport {
        started_at,
        finished_at: Utc::now(),
        annotated,
        failed,
    })
}

/// Writes the label CSV: header plus one row per frame.
pub fn write_labels(mut writer: impl Write, labels: &[FrameActionLabel]) -> std::io::Result<()> {
    writeln!(writer, "{}", CSV_HEADER)?;
    for label in labels {
        let all_actions = label.all_actions_field();
        if all_actions.contains(',') {
            writeln!(
                writer,
                "{},{},{},\"{}\"",
                label.frame_index, label.timestamp_ms, label.primary_action_id, all_actions
            )?;
        } else {
            writeln!(
                writer,
                "{},{},{},{}",
                label.frame_index, label.timestamp_ms, label.primary_action_id, all_actions
            )?;
        }
    }
    writer.flush()
}

/// Writes through a temp file in the target directory, so a crash never leaves
/// a half-written CSV behind.
pub fn write_labels_atomic(path: &Path, labels: &[FrameActionLabel]) -> SessionResult<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut temp = tempfile::NamedTempFile::new_in(dir).map_err(io_error(dir))?;
    write_labels(BufWriter::new(temp.as_file_mut()), labels).map_err(io_error(path))?;
    temp.persist(path).map_err(|e| SessionError::Io {
        path: path.to_path_buf(),
        source: e.error,
    })?;
    Ok(())
}
