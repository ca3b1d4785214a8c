//! Settings persistence.
//!
//! Settings live in a small JSON file (by default `settings.json` next to the
//! executable) holding the three root directories and the display theme.
//! A missing or unreadable file is replaced by defaults on load.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::EngineError;
use crate::fs_ops;
use crate::model::DirectoryConfig;

pub const SETTINGS_FILE_NAME: &str = "settings.json";

/// Display theme preference.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    #[serde(alias = "arc")]
    Light,
    #[serde(alias = "equilux")]
    Dark,
}

impl Theme {
    pub fn toggled(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }
}

/// Accepts exactly the names the settings file accepts, lowercase only.
impl FromStr for Theme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "light" | "arc" => Ok(Theme::Light),
            "dark" | "equilux" => Ok(Theme::Dark),
            _ => Err(format!("Invalid theme '{}'. Must be 'light' or 'dark'", s)),
        }
    }
}

impl std::fmt::Display for Theme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Theme::Light => write!(f, "light"),
            Theme::Dark => write!(f, "dark"),
        }
    }
}

/// Persisted user settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub source_dir: PathBuf,
    #[serde(default)]
    pub output_dir: PathBuf,
    #[serde(default)]
    pub processed_dir: PathBuf,
    #[serde(default)]
    pub theme: Theme,
}

impl Settings {
    /// The configured directories as an explicit value for the engine.
    pub fn directories(&self) -> DirectoryConfig {
        DirectoryConfig {
            source_dir: self.source_dir.clone(),
            output_dir: self.output_dir.clone(),
            processed_dir: self.processed_dir.clone(),
        }
    }
}

/// `settings.json` in the directory of the running executable.
pub fn default_settings_path() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .unwrap_or_default()
        .join(SETTINGS_FILE_NAME)
}

/// Load settings from `path`.
///
/// If the file does not exist or does not parse, defaults are written to
/// `path` and returned.
///
/// # Errors
/// Returns EngineError if the file exists but cannot be read, or if the
/// defaults cannot be written.
pub fn load_settings(path: &Path) -> Result<Settings, EngineError> {
    match fs::read_to_string(path) {
        Ok(contents) => match serde_json::from_str::<Settings>(&contents) {
            Ok(settings) => return Ok(settings),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "settings file is invalid, resetting to defaults");
            }
        },
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            info!(path = %path.display(), "no settings file, writing defaults");
        }
        Err(e) => {
            return Err(EngineError::SettingsReadFailed {
                path: path.to_path_buf(),
                source: e,
            })
        }
    }

    let settings = Settings::default();
    save_settings(path, &settings)?;
    Ok(settings)
}

/// Write settings to `path` as pretty-printed JSON.
///
/// # Errors
/// Returns EngineError if the file or its parent directory cannot be written.
pub fn save_settings(path: &Path, settings: &Settings) -> Result<(), EngineError> {
    let write_err = |source: io::Error| EngineError::SettingsWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs_ops::ensure_dir(parent).map_err(write_err)?;
    }
    let json = serde_json::to_string_pretty(settings).map_err(|e| write_err(e.into()))?;
    fs::write(path, json).map_err(write_err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_writes_defaults() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = temp_dir.path().join("conf").join(SETTINGS_FILE_NAME);

        let settings = load_settings(&path).expect("Failed to load settings");

        assert_eq!(settings, Settings::default());
        assert!(path.exists());
        let written: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["theme"], "light");
        assert_eq!(written["source_dir"], "");
    }

    #[test]
    fn test_round_trip_through_file() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = temp_dir.path().join(SETTINGS_FILE_NAME);
        let settings = Settings {
            source_dir: PathBuf::from("/data/incoming"),
            output_dir: PathBuf::from("/data/out"),
            processed_dir: PathBuf::from("/data/processed"),
            theme: Theme::Dark,
        };

        save_settings(&path, &settings).expect("Failed to save");
        let loaded = load_settings(&path).expect("Failed to load");

        assert_eq!(loaded, settings);
        assert_eq!(loaded.directories().processed_dir, PathBuf::from("/data/processed"));
    }

    #[test]
    fn test_legacy_theme_names_and_missing_theme() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = temp_dir.path().join(SETTINGS_FILE_NAME);

        fs::write(
            &path,
            r#"{"source_dir": "in", "output_dir": "out", "processed_dir": "done", "theme": "equilux"}"#,
        )
        .unwrap();
        assert_eq!(load_settings(&path).unwrap().theme, Theme::Dark);

        fs::write(&path, r#"{"source_dir": "in", "output_dir": "out", "processed_dir": "done"}"#)
            .unwrap();
        let loaded = load_settings(&path).unwrap();
        assert_eq!(loaded.theme, Theme::Light);
        assert_eq!(loaded.source_dir, PathBuf::from("in"));
    }

    #[test]
    fn test_invalid_json_is_replaced() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = temp_dir.path().join(SETTINGS_FILE_NAME);
        fs::write(&path, "{ not json").unwrap();

        let settings = load_settings(&path).expect("Failed to load");

        assert_eq!(settings, Settings::default());
        let rewritten = fs::read_to_string(&path).unwrap();
        assert!(serde_json::from_str::<Settings>(&rewritten).is_ok());
    }

    #[test]
    fn test_theme_toggle_and_parse() {
        assert_eq!(Theme::Light.toggled(), Theme::Dark);
        assert_eq!(Theme::Dark.toggled(), Theme::Light);
        assert_eq!("arc".parse::<Theme>(), Ok(Theme::Light));
        assert_eq!("dark".parse::<Theme>(), Ok(Theme::Dark));
        assert!("neon".parse::<Theme>().is_err());
    }

    #[test]
    fn test_theme_parsing_matches_settings_file() {
        // same names, same case rule as the JSON field
        for name in ["light", "dark", "arc", "equilux", "Dark", "ARC"] {
            let from_json =
                serde_json::from_str::<Theme>(&format!("\"{}\"", name)).ok();
            assert_eq!(name.parse::<Theme>().ok(), from_json, "theme name {}", name);
        }
    }
}
