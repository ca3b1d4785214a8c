//! Error types for the ingestion engine.
//!
//! There are two layers of errors:
//! - `EngineError` rejects a whole request before any file is touched
//!   (bad folder name, destination root that cannot be created, settings I/O).
//! - `FileError` describes why a single selected file failed. It is recorded in
//!   the file's report and never aborts the batch.

use std::error::Error;
use std::fmt::{self, Display};
use std::io;
use std::path::PathBuf;

/// Errors that prevent a request from running at all.
#[derive(Debug)]
pub enum EngineError {
    /// A configured root directory does not exist and cannot be created
    DirectoryUnavailable { path: PathBuf, source: io::Error },

    /// The user-entered destination label is empty or not a plain relative path
    InvalidFolderName { name: String, reason: &'static str },

    /// A path argument is unusable
    InvalidPath { path: PathBuf, reason: String },

    /// The settings file exists but could not be read
    SettingsReadFailed { path: PathBuf, source: io::Error },

    /// The settings file could not be written
    SettingsWriteFailed { path: PathBuf, source: io::Error },
}

impl Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DirectoryUnavailable { path, source } => {
                write!(f, "Directory unavailable: {} ({})", path.display(), source)
            }
            Self::InvalidFolderName { name, reason } => {
                if name.is_empty() {
                    write!(f, "Folder name cannot be empty")
                } else {
                    write!(f, "Invalid folder name '{}': {}", name, reason)
                }
            }
            Self::InvalidPath { path, reason } => {
                write!(f, "Invalid path: {} ({})", path.display(), reason)
            }
            Self::SettingsReadFailed { path, .. } => {
                write!(f, "Failed to read settings: {}", path.display())
            }
            Self::SettingsWriteFailed { path, .. } => {
                write!(f, "Failed to write settings: {}", path.display())
            }
        }
    }
}

impl Error for EngineError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::DirectoryUnavailable { source, .. }
            | Self::SettingsReadFailed { source, .. }
            | Self::SettingsWriteFailed { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Why a single selected file did not make it through the pipeline.
#[derive(Debug)]
pub enum FileError {
    /// The file is not present (or not a regular file) in the source directory
    SourceMissing { path: PathBuf },

    /// Writing the copy into the destination directory failed
    CopyFailed { path: PathBuf, source: io::Error },

    /// Moving the original into the processed directory failed.
    /// The destination copy is still in place.
    MoveFailed { path: PathBuf, source: io::Error },

    /// The destination copy could not be extracted
    ExtractFailed { path: PathBuf, source: ExtractError },
}

impl Display for FileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SourceMissing { .. } => write!(f, "source missing"),
            Self::CopyFailed { source, .. } => write!(f, "copy failed: {}", source),
            Self::MoveFailed { source, .. } => write!(f, "move failed: {}", source),
            Self::ExtractFailed { source, .. } => write!(f, "{}", source),
        }
    }
}

impl Error for FileError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::SourceMissing { .. } => None,
            Self::CopyFailed { source, .. } | Self::MoveFailed { source, .. } => Some(source),
            Self::ExtractFailed { source, .. } => Some(source),
        }
    }
}

/// Failures while unpacking an archive copy.
#[derive(Debug)]
pub enum ExtractError {
    /// An entry would be written outside the extraction subfolder
    UnsafePath { entry: String },

    /// The archive name leaves nothing to name the extracted output after
    InvalidName { name: String },

    /// The archive could not be decoded
    Corrupt { message: String },

    /// Reading the archive or writing its contents failed
    Io { source: io::Error },
}

impl Display for ExtractError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsafePath { .. } => write!(f, "unsafe path"),
            Self::InvalidName { name } => write!(f, "invalid archive name: {}", name),
            Self::Corrupt { message } => write!(f, "archive corrupt: {}", message),
            Self::Io { source } => write!(f, "extraction failed: {}", source),
        }
    }
}

impl Error for ExtractError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source } => Some(source),
            _ => None,
        }
    }
}

impl ExtractError {
    /// Wrap an error raised while decoding archive structure.
    pub(crate) fn corrupt(err: impl Display) -> Self {
        ExtractError::Corrupt {
            message: err.to_string(),
        }
    }
}

impl From<io::Error> for ExtractError {
    fn from(err: io::Error) -> Self {
        ExtractError::Io { source: err }
    }
}

impl From<zip::result::ZipError> for ExtractError {
    fn from(err: zip::result::ZipError) -> Self {
        match err {
            zip::result::ZipError::Io(source) => ExtractError::Io { source },
            other => ExtractError::corrupt(other),
        }
    }
}
