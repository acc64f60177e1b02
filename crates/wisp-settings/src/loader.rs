//! Settings loading: file → deep merge over defaults → env overrides.

use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::errors::Result;
use crate::types::WispSettings;

/// The wisp config directory, `~/.wisp`.
///
/// Falls back to the current directory when no home directory is resolvable
/// (containers, stripped-down service environments).
pub fn config_dir() -> PathBuf {
    std::env::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".wisp")
}

/// Default settings file path, `~/.wisp/settings.json`.
pub fn settings_path() -> PathBuf {
    config_dir().join("settings.json")
}

/// Deep-merge `overlay` onto `base`.
///
/// Objects merge recursively; any other value in `overlay` (including
/// arrays) replaces the base value wholesale.
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base_map), Value::Object(overlay_map)) => {
            for (key, overlay_val) in overlay_map {
                let merged = match base_map.remove(&key) {
                    Some(base_val) => deep_merge(base_val, overlay_val),
                    None => overlay_val,
                };
                let _ = base_map.insert(key, merged);
            }
            Value::Object(base_map)
        }
        (_, overlay) => overlay,
    }
}

/// Load settings from the default path with env overrides applied.
pub fn load_settings() -> Result<WispSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific file path.
///
/// A missing file is not an error: defaults are used and env overrides still
/// apply. A present-but-invalid file is an error.
pub fn load_settings_from_path(path: &Path) -> Result<WispSettings> {
    let defaults = serde_json::to_value(WispSettings::default())?;

    let merged = if path.exists() {
        let raw = std::fs::read_to_string(path)?;
        let file_value: Value = serde_json::from_str(&raw)?;
        deep_merge(defaults, file_value)
    } else {
        tracing::debug!(?path, "no settings file, using defaults");
        defaults
    };

    let mut settings: WispSettings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings, |name| std::env::var(name).ok());
    settings.validate();
    Ok(settings)
}

/// Apply `WISP_*` environment overrides.
///
/// Takes the lookup as a closure so tests can inject values without touching
/// process env.
pub fn apply_env_overrides(
    settings: &mut WispSettings,
    env: impl Fn(&str) -> Option<String>,
) {
    if let Some(v) = env("WISP_CLIENT_ID") {
        settings.api.client_id = v;
    }
    if let Some(v) = env("WISP_CLIENT_SECRET") {
        settings.api.client_secret = v;
    }
    if let Some(v) = env("WISP_EVENTSUB_URL") {
        settings.api.eventsub_url = v;
    }
    if let Some(v) = env("WISP_HELIX_URL") {
        settings.api.helix_url = v;
    }
    if let Some(v) = env("WISP_TOKEN_URL") {
        settings.api.token_url = v;
    }
    if let Some(v) = env("WISP_BROADCASTER_ID") {
        settings.identity.broadcaster_id = v;
    }
    if let Some(v) = env("WISP_USER_ID") {
        settings.identity.user_id = v;
    }
    if let Some(v) = env("WISP_DB_PATH") {
        settings.storage.db_path = PathBuf::from(v);
    }
    if let Some(v) = env("WISP_CREDENTIALS_PATH") {
        settings.auth.credentials_path = PathBuf::from(v);
    }
    if let Some(v) = env("WISP_LOG_LEVEL") {
        settings.logging.level = v;
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
