//! Hand-offs to the desktop environment.

use std::path::Path;
use std::process::Command;

use crate::error::GuiError;

/// Clipboard text containing this marker is taken as a case folder name.
pub const CASE_NUMBER_MARKER: &str = "6-000";

/// Show `path` in the system file browser.
pub fn open_folder(path: &Path) -> Result<(), GuiError> {
    open_folder_command(path)
        .spawn()
        .map(|_| ())
        .map_err(|source| GuiError::OpenFolder {
            path: path.display().to_string(),
            source,
        })
}

fn open_folder_command(path: &Path) -> Command {
    let program = if cfg!(target_os = "windows") {
        "explorer"
    } else if cfg!(target_os = "macos") {
        "open"
    } else {
        "xdg-open"
    };

    let mut command = Command::new(program);
    command.arg(path);
    command
}

/// Folder name suggested by the clipboard, if it holds a case number.
pub fn folder_name_from_clipboard(contents: &str) -> Option<String> {
    let candidate = contents.trim();
    (candidate.contains(CASE_NUMBER_MARKER) && !candidate.contains('\n'))
        .then(|| candidate.to_string())
}
