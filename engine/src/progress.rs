//! Progress reporting trait.
//!
//! This module defines the ProgressCallback trait, which keeps the pipeline
//! free of any UI dependency. The CLI prints to stderr; the GUI forwards
//! events to its event loop over a channel.

use crate::model::{FileReport, FileStage, PipelineRequest, PipelineResult};

/// Trait for receiving progress updates from a pipeline run.
///
/// All methods are called synchronously, on the thread running the pipeline.
pub trait ProgressCallback: Send {
    /// Called once the destination directory exists, before the first file.
    fn on_run_started(&self, request: &PipelineRequest);

    /// Called when a selected file is about to be processed.
    fn on_file_started(&self, file_index: usize, name: &str);

    /// Called at every stage transition of the current file.
    fn on_file_stage(&self, file_index: usize, name: &str, stage: FileStage);

    /// Called when a file reached its final outcome.
    fn on_file_completed(&self, file_index: usize, report: &FileReport);

    /// Called after every selected file has been processed.
    fn on_run_completed(&self, result: &PipelineResult);
}
