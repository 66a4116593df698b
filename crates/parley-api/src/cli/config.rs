//! Settings CLI commands: show, set.

use anyhow::{bail, Result};
use console::style;
use dialoguer::Password;

use parley_core::settings::SettingsStore;
use parley_infra::settings::FileSettingsStore;
use parley_types::config::Settings;

/// Mask an API key for display, keeping only a short prefix.
pub fn mask_key(key: &str) -> String {
    if key.is_empty() {
        return "(unset)".to_string();
    }
    let prefix: String = key.chars().take(4).collect();
    if key.chars().count() <= 8 {
        "****".to_string()
    } else {
        format!("{prefix}****")
    }
}

/// Apply the requested changes. Returns `false` when nothing was requested.
pub fn apply_changes(
    settings: &mut Settings,
    base_url: Option<String>,
    api_key: Option<String>,
    user_id: Option<String>,
) -> bool {
    let mut changed = false;
    if let Some(url) = base_url {
        settings.base_url = url.trim().to_string();
        changed = true;
    }
    if let Some(key) = api_key {
        settings.api_key = key.trim().to_string();
        changed = true;
    }
    if let Some(user) = user_id {
        settings.user_id = user.trim().to_string();
        changed = true;
    }
    changed
}

/// Print the stored settings.
pub async fn show_config(store: &FileSettingsStore, json: bool) -> Result<()> {
    let settings = store.get_settings().await?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "path": store.path().display().to_string(),
                "base_url": settings.base_url,
                "api_key": mask_key(&settings.api_key),
                "user_id": settings.user_id,
                "configured": settings.is_configured(),
            }))?
        );
        return Ok(());
    }

    println!();
    println!("  {}  {}", style("File:").bold(), style(store.path().display()).dim());
    println!("  {}  {}", style("Base URL:").bold(), settings.base_url);
    println!("  {}  {}", style("API key:").bold(), mask_key(&settings.api_key));
    println!(
        "  {}  {}",
        style("User ID:").bold(),
        if settings.user_id.is_empty() { "(unset)" } else { settings.user_id.as_str() }
    );
    if !settings.is_configured() {
        println!();
        println!(
            "  {} Not configured yet. Run: {}",
            style("i").blue().bold(),
            style("parley config set --base-url <url> --api-key").yellow()
        );
    }
    println!();
    Ok(())
}

/// Update settings from flags, prompting for the API key when requested.
///
/// # Examples
///
/// ```bash
/// # Secure prompt for the key
/// parley config set --base-url https://chat.example.com --api-key
///
/// # Script/automation mode
/// parley config set --api-key sk-... --user-id me
/// ```
pub async fn set_config(
    store: &FileSettingsStore,
    base_url: Option<String>,
    api_key: Option<Option<String>>,
    user_id: Option<String>,
    json: bool,
) -> Result<()> {
    let api_key = match api_key {
        Some(Some(key)) => Some(key),
        Some(None) => Some(
            Password::new()
                .with_prompt(format!("Enter {}", style("API key").bold()))
                .interact()?,
        ),
        None => None,
    };

    let mut settings = store.get_settings().await?;
    if !apply_changes(&mut settings, base_url, api_key, user_id) {
        bail!("nothing to set; pass --base-url, --api-key or --user-id");
    }
    store.save_settings(&settings).await?;
    tracing::info!(path = %store.path().display(), "settings updated");

    if json {
        println!(
            "{}",
            serde_json::json!({
                "saved": true,
                "base_url": settings.base_url,
                "api_key": mask_key(&settings.api_key),
                "user_id": settings.user_id,
            })
        );
    } else {
        println!(
            "  {} Settings saved to {}",
            style("✓").green().bold(),
            style(store.path().display()).dim()
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_mask_key() {
        assert_eq!(mask_key(""), "(unset)");
        assert_eq!(mask_key("short"), "****");
        assert_eq!(mask_key("sk-abcdef123456"), "sk-a****");
    }

    #[test]
    fn test_apply_changes_only_touches_given_fields() {
        let mut settings = Settings::default();
        let changed = apply_changes(&mut settings, None, Some(" sk-1 ".to_string()), None);

        assert!(changed);
        assert_eq!(settings.api_key, "sk-1");
        assert_eq!(settings.base_url, "http://localhost:8000");
    }

    #[test]
    fn test_apply_changes_nothing_requested() {
        let mut settings = Settings::default();
        assert!(!apply_changes(&mut settings, None, None, None));
        assert_eq!(settings, Settings::default());
    }

    #[tokio::test]
    async fn test_set_config_persists() {
        let tmp = TempDir::new().unwrap();
        let store = FileSettingsStore::new(tmp.path());

        set_config(
            &store,
            Some("https://chat.example.com".to_string()),
            Some(Some("sk-test-key".to_string())),
            Some("me".to_string()),
            true,
        )
        .await
        .unwrap();

        let saved = store.get_settings().await.unwrap();
        assert_eq!(saved.base_url, "https://chat.example.com");
        assert_eq!(saved.api_key, "sk-test-key");
        assert_eq!(saved.user_id, "me");
    }

    #[tokio::test]
    async fn test_set_config_without_changes_fails() {
        let tmp = TempDir::new().unwrap();
        let store = FileSettingsStore::new(tmp.path());

        assert!(set_config(&store, None, None, None, true).await.is_err());
        assert!(!store.path().exists());
    }
}
