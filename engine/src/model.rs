//! Core data model for ingestion runs.
//!
//! This module defines the values that flow through the engine:
//! - FileEntry: one row of a source directory listing
//! - Destination: the user-chosen output folder for a batch
//! - DirectoryConfig: the three configured root directories
//! - PipelineRequest / PipelineResult: one batch in, one report per file out
//! - FileStage, FileOutcome: per-file progress and final status

use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Local, NaiveDate};
use uuid::Uuid;

use crate::error::{EngineError, FileError};
use crate::fs_ops::format_size;

/// Extension reported for files whose name has no suffix.
pub const NO_EXTENSION: &str = "NONE";

/// Metadata snapshot for a single regular file in a directory listing.
///
/// Recomputed on every listing; never cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// File name (unique within its directory)
    pub name: String,

    /// Last modification time
    pub modified_at: SystemTime,

    /// Size in bytes
    pub size_bytes: u64,

    /// Uppercased suffix after the last '.', or `NO_EXTENSION`
    pub extension: String,
}

impl FileEntry {
    /// Size formatted for display ("1.00 GB" / "12.34 MB").
    pub fn display_size(&self) -> String {
        format_size(self.size_bytes)
    }

    /// Modification time in local time, "YYYY-MM-DD HH:MM".
    pub fn display_modified(&self) -> String {
        let local: DateTime<Local> = self.modified_at.into();
        local.format("%Y-%m-%d %H:%M").to_string()
    }
}

/// The three root directories the engine works with.
///
/// Passed explicitly into every operation; the engine never reads them from
/// global state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryConfig {
    /// Folder where new files arrive
    pub source_dir: PathBuf,

    /// Root under which batch folders are created
    pub output_dir: PathBuf,

    /// Folder that receives originals after they were copied
    pub processed_dir: PathBuf,
}

/// Destination folder for one batch: `base_dir/label[/YYYY-MM-DD]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    pub base_dir: PathBuf,
    pub label: String,
    pub date: Option<NaiveDate>,
}

impl Destination {
    pub fn new(base_dir: impl Into<PathBuf>, label: impl Into<String>) -> Self {
        Destination {
            base_dir: base_dir.into(),
            label: label.into(),
            date: None,
        }
    }

    /// Append a date subfolder.
    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }

    /// Append today's local date as a subfolder.
    pub fn with_today(self) -> Self {
        self.with_date(Local::now().date_naive())
    }

    /// Combine base, label and optional date into the output directory.
    ///
    /// # Errors
    /// `EngineError::InvalidFolderName` if the label is blank or is not a
    /// plain relative path.
    pub fn resolve(&self) -> Result<PathBuf, EngineError> {
        let label = self.label.trim();
        if label.is_empty() {
            return Err(EngineError::InvalidFolderName {
                name: String::new(),
                reason: "empty",
            });
        }

        let label_path = Path::new(label);
        if !label_path
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
        {
            return Err(EngineError::InvalidFolderName {
                name: label.to_string(),
                reason: "must be a relative path without '..'",
            });
        }

        let mut path = self.base_dir.join(label_path);
        if let Some(date) = self.date {
            path.push(date.format("%Y-%m-%d").to_string());
        }
        Ok(path)
    }
}

/// One batch of work for the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineRequest {
    pub source_dir: PathBuf,
    pub destination_dir: PathBuf,
    pub processed_dir: PathBuf,

    /// Names of files in `source_dir`. Empty means "just create the folder".
    pub selected_files: Vec<String>,

    /// Extract .zip/.tar/.gz copies after they land in the destination
    pub extract: bool,
}

impl PipelineRequest {
    pub fn new(
        source_dir: impl Into<PathBuf>,
        destination_dir: impl Into<PathBuf>,
        processed_dir: impl Into<PathBuf>,
        selected_files: impl IntoIterator<Item = String>,
        extract: bool,
    ) -> Self {
        let mut seen = HashSet::new();
        let selected_files = selected_files
            .into_iter()
            .filter(|name| seen.insert(name.clone()))
            .collect();

        PipelineRequest {
            source_dir: source_dir.into(),
            destination_dir: destination_dir.into(),
            processed_dir: processed_dir.into(),
            selected_files,
            extract,
        }
    }

    /// Build a request from configured directories and a destination label.
    ///
    /// # Errors
    /// Returns `EngineError::InvalidFolderName` when the destination label is
    /// unusable; nothing on disk is touched in that case.
    pub fn from_config(
        config: &DirectoryConfig,
        destination: &Destination,
        selected_files: impl IntoIterator<Item = String>,
        extract: bool,
    ) -> Result<Self, EngineError> {
        let destination_dir = destination.resolve()?;
        Ok(PipelineRequest::new(
            &config.source_dir,
            destination_dir,
            &config.processed_dir,
            selected_files,
            extract,
        ))
    }
}

/// Per-file progress through the pipeline.
///
/// Transitions only move forward; a failed stage is terminal for the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStage {
    Pending,
    CopyAttempted,
    CopyFailed,
    Copied,
    MoveAttempted,
    Moved,
    MoveFailed,
    ExtractAttempted,
    Extracted,
    ExtractFailed,
    /// Extraction was not requested or the file is not an archive
    NotApplicable,
}

impl std::fmt::Display for FileStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            FileStage::Pending => "pending",
            FileStage::CopyAttempted => "copying",
            FileStage::CopyFailed => "copy failed",
            FileStage::Copied => "copied",
            FileStage::MoveAttempted => "moving",
            FileStage::Moved => "moved",
            FileStage::MoveFailed => "move failed",
            FileStage::ExtractAttempted => "extracting",
            FileStage::Extracted => "extracted",
            FileStage::ExtractFailed => "extract failed",
            FileStage::NotApplicable => "no extraction",
        };
        write!(f, "{}", label)
    }
}

/// Final status of one selected file.
#[derive(Debug)]
pub enum FileOutcome {
    /// Copied to the destination; the original was not archived
    Copied,
    /// Copied and the original moved to the processed directory
    Moved,
    /// Copied, archived and extracted
    Extracted,
    Failed(FileError),
}

impl FileOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, FileOutcome::Failed(_))
    }

    /// Short failure reason, e.g. "source missing".
    pub fn reason(&self) -> Option<String> {
        match self {
            FileOutcome::Failed(err) => Some(err.to_string()),
            _ => None,
        }
    }
}

impl std::fmt::Display for FileOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileOutcome::Copied => write!(f, "Copied"),
            FileOutcome::Moved => write!(f, "Moved"),
            FileOutcome::Extracted => write!(f, "Extracted"),
            FileOutcome::Failed(err) => write!(f, "Failed: {}", err),
        }
    }
}

/// What happened to one selected file.
#[derive(Debug)]
pub struct FileReport {
    pub name: String,
    pub outcome: FileOutcome,

    /// Copy in the destination directory, if the copy succeeded
    pub copied_to: Option<PathBuf>,

    /// Original's new location in the processed directory, if the move succeeded
    pub archived_to: Option<PathBuf>,

    /// Extraction subfolder, if extraction succeeded
    pub extracted_to: Option<PathBuf>,
}

impl FileReport {
    pub(crate) fn new(name: &str) -> Self {
        FileReport {
            name: name.to_string(),
            outcome: FileOutcome::Copied,
            copied_to: None,
            archived_to: None,
            extracted_to: None,
        }
    }
}

/// Result of one pipeline run.
#[derive(Debug)]
pub struct PipelineResult {
    /// Identifier attached to this run's log lines
    pub id: Uuid,

    pub destination_dir: PathBuf,

    /// One report per selected file, in the order processed
    pub reports: Vec<FileReport>,

    pub started_at: SystemTime,
    pub finished_at: SystemTime,
}

impl PipelineResult {
    /// Reports for files that made it through without a failure.
    pub fn succeeded(&self) -> impl Iterator<Item = &FileReport> {
        self.reports.iter().filter(|r| !r.outcome.is_failure())
    }

    /// Reports for files that failed at some stage.
    pub fn failed(&self) -> impl Iterator<Item = &FileReport> {
        self.reports.iter().filter(|r| r.outcome.is_failure())
    }

    /// Wall-clock time the run took.
    pub fn elapsed(&self) -> Duration {
        self.finished_at
            .duration_since(self.started_at)
            .unwrap_or_default()
    }

    pub fn has_failures(&self) -> bool {
        self.failed().next().is_some()
    }

    /// One-line summary for the user.
    ///
    /// "3 of 5 files processed; 2 failed: a.zip: archive corrupt: ..., b.txt: source missing"
    pub fn summary(&self) -> String {
        let total = self.reports.len();
        if total == 0 {
            return format!("Folder ready: {}", self.destination_dir.display());
        }

        let ok = self.succeeded().count();
        let failures: Vec<String> = self
            .failed()
            .filter_map(|r| r.outcome.reason().map(|reason| format!("{}: {}", r.name, reason)))
            .collect();

        if failures.is_empty() {
            format!("{} of {} files processed", ok, total)
        } else {
            format!(
                "{} of {} files processed; {} failed: {}",
                ok,
                total,
                failures.len(),
                failures.join(", ")
            )
        }
    }
}
