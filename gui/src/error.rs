use engine::EngineError;
use thiserror::Error;

/// Errors the window reports in its error line.
#[derive(Debug, Error)]
pub enum GuiError {
    #[error("{which} directory is not set; fill in Edit Paths and press Save")]
    DirectoryNotSet { which: &'static str },

    #[error("Source directory does not exist: {0}")]
    SourceMissing(String),

    #[error("Could not save settings: {0}")]
    SettingsSave(#[source] EngineError),

    #[error("Could not load settings: {0}")]
    SettingsLoad(#[source] EngineError),

    #[error("Could not open {path}: {source}")]
    OpenFolder {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Engine(#[from] EngineError),
}
