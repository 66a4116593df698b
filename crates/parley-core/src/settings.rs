//! SettingsStore trait definition.
//!
//! Pure key-value persistence of the client's connection settings. The
//! session logic never touches it; the binary reads it to build a chat
//! service.

use parley_types::config::Settings;
use parley_types::error::SettingsError;

/// Persistence for [`Settings`].
///
/// Implementations live in parley-infra (e.g., `FileSettingsStore`).
pub trait SettingsStore: Send + Sync {
    /// Load the current settings, or defaults when nothing is stored.
    fn get_settings(
        &self,
    ) -> impl std::future::Future<Output = Result<Settings, SettingsError>> + Send;

    /// Persist `settings`, replacing whatever was stored.
    fn save_settings(
        &self,
        settings: &Settings,
    ) -> impl std::future::Future<Output = Result<(), SettingsError>> + Send;
}
