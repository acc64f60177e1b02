//! # wisp-settings
//!
//! Layered configuration for the wisp client.
//!
//! A loaded [`WispSettings`] is the product of three sources, weakest first:
//! compiled defaults, `~/.wisp/settings.json` (deep-merged), and `WISP_*`
//! environment variables. The merged value is cached process-wide behind
//! [`get_settings`] and can be swapped at runtime with
//! [`reload_settings_from_path`].

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod logging;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{
    apply_env_overrides, config_dir, deep_merge, load_settings, load_settings_from_path,
    settings_path,
};
pub use logging::init_logging;
pub use types::*;

use std::path::Path;
use std::sync::{Arc, RwLock};

/// Process-wide settings cache. An `RwLock` over an `Option<Arc<..>>`
/// rather than a `OnceLock`, because reload replaces the value.
static CACHE: RwLock<Option<Arc<WispSettings>>> = RwLock::new(None);

fn cached() -> Option<Arc<WispSettings>> {
    CACHE
        .read()
        .expect("settings lock poisoned")
        .as_ref()
        .map(Arc::clone)
}

fn store(settings: WispSettings) -> Arc<WispSettings> {
    let shared = Arc::new(settings);
    *CACHE.write().expect("settings lock poisoned") = Some(Arc::clone(&shared));
    shared
}

/// The current settings snapshot.
///
/// Lazily loads from disk (plus env overrides) on first use; unreadable
/// settings degrade to compiled defaults with a warning. The returned `Arc`
/// stays internally consistent even if another thread reloads underneath.
pub fn get_settings() -> Arc<WispSettings> {
    if let Some(settings) = cached() {
        return settings;
    }

    let mut guard = CACHE.write().expect("settings lock poisoned");
    // A racing caller may have filled the cache between our two locks.
    if let Some(settings) = guard.as_ref() {
        return Arc::clone(settings);
    }
    let loaded = load_settings().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "settings unreadable, running on defaults");
        WispSettings::default()
    });
    let shared = Arc::new(loaded);
    *guard = Some(Arc::clone(&shared));
    shared
}

/// Install an already-assembled settings value as the cached snapshot.
pub fn init_settings(settings: WispSettings) {
    let _ = store(settings);
}

/// Re-read `path` and swap the cached snapshot.
///
/// Earlier snapshots handed out by [`get_settings`] are unaffected; only
/// later calls observe the new values.
pub fn reload_settings_from_path(path: &Path) {
    let loaded = load_settings_from_path(path).unwrap_or_else(|e| {
        tracing::warn!(error = %e, ?path, "settings reload failed, running on defaults");
        WispSettings::default()
    });
    let _ = store(loaded);
    tracing::info!(?path, "settings reloaded");
}

/// Drop the cached snapshot so the next read loads fresh (test-only).
#[cfg(test)]
pub(crate) fn reset_settings() {
    *CACHE.write().expect("settings lock poisoned") = None;
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
