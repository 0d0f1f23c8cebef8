use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const STATE_DIR_ENV: &str = "LAUNCH_PROBE_HOME";
pub const SETTINGS_FILE: &str = "settings.json";
pub const HISTORY_FILE: &str = "history.json";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("cannot determine state directory (set LAUNCH_PROBE_HOME or HOME)")]
    NoStateDir,
    #[error("failed to read settings {path}: {reason}")]
    Read { path: PathBuf, reason: String },
    #[error("failed to parse settings {path}: {reason}")]
    Parse { path: PathBuf, reason: String },
    #[error("failed to write settings {path}: {reason}")]
    Write { path: PathBuf, reason: String },
}

/// Checks to run when `launch-probe startup` is invoked.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub launch_check_enabled: bool,
    pub launch_check_bundle_id: String,
    pub launch_check_file_enabled: bool,
    pub launch_check_file_path: String,
}

impl Settings {
    pub fn startup_bundle_id(&self) -> Option<&str> {
        (self.launch_check_enabled && !self.launch_check_bundle_id.is_empty())
            .then_some(self.launch_check_bundle_id.as_str())
    }

    pub fn startup_path(&self) -> Option<&str> {
        (self.launch_check_file_enabled && !self.launch_check_file_path.is_empty())
            .then_some(self.launch_check_file_path.as_str())
    }
}

/// `--state-dir`, then `$LAUNCH_PROBE_HOME`, then `$HOME/.launch-probe`.
pub fn resolve_state_dir(explicit: Option<&Path>) -> Result<PathBuf, SettingsError> {
    if let Some(dir) = explicit {
        return Ok(dir.to_path_buf());
    }
    if let Some(dir) = env::var_os(STATE_DIR_ENV).filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(dir));
    }
    match env::var_os("HOME").filter(|v| !v.is_empty()) {
        Some(home) => Ok(PathBuf::from(home).join(".launch-probe")),
        None => Err(SettingsError::NoStateDir),
    }
}

pub fn settings_path(state_dir: &Path) -> PathBuf {
    state_dir.join(SETTINGS_FILE)
}

pub fn history_path(state_dir: &Path) -> PathBuf {
    state_dir.join(HISTORY_FILE)
}

pub fn load_settings(path: &Path) -> Result<Settings, SettingsError> {
    if !path.exists() {
        return Ok(Settings::default());
    }
    let data = std::fs::read_to_string(path).map_err(|e| SettingsError::Read {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    serde_json::from_str(&data).map_err(|e| SettingsError::Parse {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

pub fn save_settings(path: &Path, settings: &Settings) -> Result<(), SettingsError> {
    let write_err = |reason: String| SettingsError::Write {
        path: path.to_path_buf(),
        reason,
    };
    let text = serde_json::to_string_pretty(settings).map_err(|e| write_err(e.to_string()))?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| write_err(e.to_string()))?;
    }
    std::fs::write(path, text).map_err(|e| write_err(e.to_string()))
}
