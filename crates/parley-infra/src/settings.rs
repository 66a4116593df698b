//! File-backed settings store.
//!
//! Reads and writes `settings.toml` in the data directory (`~/.parley/` in
//! production). Falls back to defaults when the file is missing or
//! malformed so a broken file never blocks startup.

use std::path::{Path, PathBuf};

use parley_core::settings::SettingsStore;
use parley_types::config::Settings;
use parley_types::error::SettingsError;

/// File name of the settings file inside the data directory.
pub const SETTINGS_FILE: &str = "settings.toml";

/// Resolve the data directory from environment or platform defaults.
///
/// Priority:
/// 1. `PARLEY_DATA_DIR` environment variable
/// 2. `~/.parley`
/// 3. `./.parley`
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("PARLEY_DATA_DIR") {
        return PathBuf::from(dir);
    }

    if let Some(home) = dirs::home_dir() {
        return home.join(".parley");
    }

    PathBuf::from(".parley")
}

/// [`SettingsStore`] backed by `{data_dir}/settings.toml`.
#[derive(Debug, Clone)]
pub struct FileSettingsStore {
    path: PathBuf,
}

impl FileSettingsStore {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join(SETTINGS_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SettingsStore for FileSettingsStore {
    /// - Missing file: defaults.
    /// - Unreadable or unparseable file: a warning, then defaults.
    async fn get_settings(&self) -> Result<Settings, SettingsError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No settings file at {}, using defaults", self.path.display());
                return Ok(Settings::default());
            }
            Err(err) => {
                tracing::warn!("Failed to read {}: {err}, using defaults", self.path.display());
                return Ok(Settings::default());
            }
        };

        match toml::from_str::<Settings>(&content) {
            Ok(settings) => Ok(settings),
            Err(err) => {
                tracing::warn!("Failed to parse {}: {err}, using defaults", self.path.display());
                Ok(Settings::default())
            }
        }
    }

    async fn save_settings(&self, settings: &Settings) -> Result<(), SettingsError> {
        let content =
            toml::to_string_pretty(settings).map_err(|e| SettingsError::Serialize(e.to_string()))?;

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| SettingsError::Io(format!("{}: {e}", parent.display())))?;
        }

        tokio::fs::write(&self.path, content)
            .await
            .map_err(|e| SettingsError::Io(format!("{}: {e}", self.path.display())))?;

        // The file holds an API key.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let permissions = std::fs::Permissions::from_mode(0o600);
            tokio::fs::set_permissions(&self.path, permissions)
                .await
                .map_err(|e| SettingsError::Io(format!("{}: {e}", self.path.display())))?;
        }

        tracing::debug!(path = %self.path.display(), "settings saved");
        Ok(())
    }
}
