use std::path::{Path, PathBuf};

use engine::{list_files, Destination, FileEntry, FileStage, PipelineRequest, Settings};

use crate::desktop;
use crate::error::GuiError;
use crate::progress::ProgressUpdate;
use crate::RunSummary;

/// A listed file and whether it is ticked in the table.
#[derive(Debug, Clone)]
pub struct FileRow {
    pub entry: FileEntry,
    pub selected: bool,
}

/// Which directory a path field edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathField {
    Source,
    Output,
    Processed,
}

impl PathField {
    pub fn label(&self) -> &'static str {
        match self {
            PathField::Source => "Source",
            PathField::Output => "Output",
            PathField::Processed => "Processed",
        }
    }
}

/// Application state, holding all UI and run-related data.
#[derive(Debug)]
pub struct AppState {
    pub settings_path: PathBuf,
    pub settings: Settings,

    // File table
    pub files: Vec<FileRow>,

    // Input fields
    pub folder_name: String,
    pub use_date: bool,
    pub extract: bool,
    pub source_input: String,
    pub output_input: String,
    pub processed_input: String,

    // Run state
    pub is_running: bool,
    pub total_files: usize,
    pub completed_count: usize,
    pub failed_count: usize,
    pub current_file_name: String,
    pub current_stage: Option<FileStage>,

    // UI state
    pub error_message: Option<String>,
    pub last_run_summary: Option<RunSummary>,
}

impl AppState {
    pub fn new(settings_path: PathBuf, settings: Settings) -> Self {
        let mut state = AppState {
            source_input: display_path(&settings.source_dir),
            output_input: display_path(&settings.output_dir),
            processed_input: display_path(&settings.processed_dir),
            settings_path,
            settings,

            files: Vec::new(),

            folder_name: String::new(),
            use_date: false,
            extract: true,

            is_running: false,
            total_files: 0,
            completed_count: 0,
            failed_count: 0,
            current_file_name: String::new(),
            current_stage: None,

            error_message: None,
            last_run_summary: None,
        };
        state.refresh_files();
        state
    }

    /// Re-read the source directory. Selections survive for names still present.
    pub fn refresh_files(&mut self) {
        let source = &self.settings.source_dir;
        if source.as_os_str().is_empty() {
            self.files.clear();
            return;
        }

        let previously_selected: Vec<String> = self.selected_names();
        self.files = list_files(source)
            .into_iter()
            .map(|entry| FileRow {
                selected: previously_selected.contains(&entry.name),
                entry,
            })
            .collect();
    }

    pub fn selected_names(&self) -> Vec<String> {
        self.files
            .iter()
            .filter(|row| row.selected)
            .map(|row| row.entry.name.clone())
            .collect()
    }

    pub fn all_selected(&self) -> bool {
        !self.files.is_empty() && self.files.iter().all(|row| row.selected)
    }

    pub fn set_all_selected(&mut self, selected: bool) {
        for row in &mut self.files {
            row.selected = selected;
        }
    }

    pub fn path_input_mut(&mut self, field: PathField) -> &mut String {
        match field {
            PathField::Source => &mut self.source_input,
            PathField::Output => &mut self.output_input,
            PathField::Processed => &mut self.processed_input,
        }
    }

    /// Copy the edited path fields into the settings.
    pub fn apply_path_inputs(&mut self) {
        self.settings.source_dir = PathBuf::from(self.source_input.trim());
        self.settings.output_dir = PathBuf::from(self.output_input.trim());
        self.settings.processed_dir = PathBuf::from(self.processed_input.trim());
    }

    /// Validate the form and build the request for the worker.
    pub fn build_request(&self) -> Result<PipelineRequest, GuiError> {
        let dirs = self.settings.directories();
        let selected = self.selected_names();

        if dirs.output_dir.as_os_str().is_empty() {
            return Err(GuiError::DirectoryNotSet { which: "Output" });
        }
        if dirs.processed_dir.as_os_str().is_empty() {
            return Err(GuiError::DirectoryNotSet { which: "Processed" });
        }
        if !selected.is_empty() && !dirs.source_dir.is_dir() {
            return Err(GuiError::SourceMissing(display_path(&dirs.source_dir)));
        }

        let mut destination = Destination::new(&dirs.output_dir, self.folder_name.as_str());
        if self.use_date {
            destination = destination.with_today();
        }

        Ok(PipelineRequest::from_config(
            &dirs,
            &destination,
            selected,
            self.extract,
        )?)
    }

    /// Use a case number from the clipboard unless a name was already typed.
    pub fn prefill_folder_name(&mut self, clipboard: Option<&str>) {
        if !self.folder_name.trim().is_empty() {
            return;
        }
        if let Some(name) = clipboard.and_then(desktop::folder_name_from_clipboard) {
            self.folder_name = name;
        }
    }

    pub fn start_run(&mut self, total_files: usize) {
        self.is_running = true;
        self.total_files = total_files;
        self.completed_count = 0;
        self.failed_count = 0;
        self.current_file_name.clear();
        self.current_stage = None;
        self.error_message = None;
        self.last_run_summary = None;
    }

    pub fn handle_progress_update(&mut self, update: ProgressUpdate) {
        match update {
            ProgressUpdate::RunStarted { total_files } => {
                self.total_files = total_files;
                self.completed_count = 0;
                self.failed_count = 0;
            }
            ProgressUpdate::FileStarted { name } => {
                self.current_file_name = name;
                self.current_stage = None;
            }
            ProgressUpdate::FileStage { name, stage } => {
                self.current_file_name = name;
                self.current_stage = Some(stage);
            }
            ProgressUpdate::FileCompleted { failure, .. } => {
                self.completed_count += 1;
                if failure.is_some() {
                    self.failed_count += 1;
                }
            }
            ProgressUpdate::RunFinished(outcome) => {
                self.is_running = false;
                self.current_file_name.clear();
                self.current_stage = None;
                match outcome {
                    Ok(summary) => self.last_run_summary = Some(summary),
                    Err(err) => self.error_message = Some(err),
                }
                // Processed originals have left the source directory
                self.refresh_files();
            }
        }
    }
}

fn display_path(path: &Path) -> String {
    path.display().to_string()
}
