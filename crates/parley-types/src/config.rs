//! Client settings for Parley.
//!
//! `Settings` is the key-value record persisted by the settings store:
//! where the chat service lives, how to authenticate, and who the user is.

use serde::{Deserialize, Serialize};

use std::fmt;

/// Connection settings for the chat service.
///
/// Loaded from `~/.parley/settings.toml`. All fields have defaults so a
/// partially written file still parses.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default)]
    pub api_key: String,

    #[serde(default)]
    pub user_id: String,
}

fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

impl Settings {
    /// Whether enough is set to talk to a chat service.
    pub fn is_configured(&self) -> bool {
        !self.base_url.trim().is_empty() && !self.api_key.trim().is_empty()
    }

    /// Base URL without a trailing slash.
    pub fn normalized_base_url(&self) -> &str {
        self.base_url.trim().trim_end_matches('/')
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: String::new(),
            user_id: String::new(),
        }
    }
}

// The API key never appears in Debug output.
impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let key = if self.api_key.is_empty() { "<unset>" } else { "<redacted>" };
        f.debug_struct("Settings")
            .field("base_url", &self.base_url)
            .field("api_key", &key)
            .field("user_id", &self.user_id)
            .finish()
    }
}
