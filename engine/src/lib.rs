//! # Intake Engine - File Ingestion Library
//!
//! A headless engine for taking in newly arrived files.
//! Designed as the foundation for multiple UIs (CLI, GUI).
//!
//! ## Overview
//!
//! The engine lists a source directory, then for each file the user selects:
//! - copies it into a per-batch destination folder
//! - moves the original into a "processed" folder
//! - optionally extracts .zip, .tar and .gz copies (including gzip-wrapped tar)
//!
//! Failures are isolated per file and collected into the run result. Progress
//! is reported through a callback trait, decoupled from any UI technology.
//!
//! ## Basic Usage
//!
//! ```no_run
//! use engine::{list_files, run_pipeline, Destination, DirectoryConfig, PipelineRequest};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = DirectoryConfig {
//!     source_dir: "C:\\incoming".into(),
//!     output_dir: "D:\\cases".into(),
//!     processed_dir: "C:\\incoming\\processed".into(),
//! };
//!
//! // Pick files from the source directory
//! let selected: Vec<String> = list_files(&config.source_dir)
//!     .into_iter()
//!     .map(|entry| entry.name)
//!     .collect();
//!
//! // Copy, archive and extract them into D:\cases\6-000123\<today>
//! let destination = Destination::new(&config.output_dir, "6-000123").with_today();
//! let request = PipelineRequest::from_config(&config, &destination, selected, true)?;
//! let result = run_pipeline(&request, None)?;
//!
//! println!("{}", result.summary());
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - **model**: Core data structures (FileEntry, PipelineRequest, PipelineResult, enums)
//! - **error**: Run-level and per-file error types
//! - **fs_ops**: Directory listing and low-level filesystem operations
//! - **archive**: Archive detection and extraction
//! - **pipeline**: The copy / move / extract run
//! - **progress**: Progress callback trait
//! - **settings**: Settings file persistence

pub mod model;
pub mod error;
pub mod fs_ops;
pub mod archive;
pub mod pipeline;
pub mod progress;
pub mod settings;

// Re-export main types and functions
pub use model::{
    Destination, DirectoryConfig, FileEntry, FileOutcome, FileReport, FileStage, PipelineRequest,
    PipelineResult,
};
pub use error::{EngineError, ExtractError, FileError};
pub use fs_ops::{format_size, list_files};
pub use archive::ArchiveKind;
pub use pipeline::run_pipeline;
pub use progress::ProgressCallback;
pub use settings::{default_settings_path, load_settings, save_settings, Settings, Theme};
