use crossbeam_channel::Sender;
use engine::{FileReport, FileStage, PipelineRequest, PipelineResult, ProgressCallback};

use crate::RunSummary;

#[derive(Debug, Clone)]
pub enum ProgressUpdate {
    RunStarted {
        total_files: usize,
    },
    FileStarted {
        name: String,
    },
    FileStage {
        name: String,
        stage: FileStage,
    },
    FileCompleted {
        name: String,
        failure: Option<String>,
    },
    /// Sent by the worker after the engine returned
    RunFinished(Result<RunSummary, String>),
}

/// A ProgressCallback implementation that sends updates to the GUI via a channel.
pub struct GuiProgressCallback {
    sender: Sender<ProgressUpdate>,
}

impl GuiProgressCallback {
    pub fn new(sender: Sender<ProgressUpdate>) -> Self {
        GuiProgressCallback { sender }
    }
}

// A closed receiver means the window is gone; the run still completes.
impl ProgressCallback for GuiProgressCallback {
    fn on_run_started(&self, request: &PipelineRequest) {
        let _ = self.sender.send(ProgressUpdate::RunStarted {
            total_files: request.selected_files.len(),
        });
    }

    fn on_file_started(&self, _file_index: usize, name: &str) {
        let _ = self.sender.send(ProgressUpdate::FileStarted {
            name: name.to_string(),
        });
    }

    fn on_file_stage(&self, _file_index: usize, name: &str, stage: FileStage) {
        let _ = self.sender.send(ProgressUpdate::FileStage {
            name: name.to_string(),
            stage,
        });
    }

    fn on_file_completed(&self, _file_index: usize, report: &FileReport) {
        let _ = self.sender.send(ProgressUpdate::FileCompleted {
            name: report.name.clone(),
            failure: report.outcome.reason(),
        });
    }

    fn on_run_completed(&self, _result: &PipelineResult) {
        // Completion is reported by the worker thread with the full summary
    }
}
