//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase")]` and `#[serde(default)]`
//! so a partial settings file deep-merges over compiled defaults — missing
//! fields get their default value during deserialization.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::loader::config_dir;

/// Root settings type for the wisp client.
///
/// Loaded from `~/.wisp/settings.json` with defaults applied for missing
/// fields. `WISP_*` environment variables override specific values.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WispSettings {
    /// Settings schema version.
    pub version: String,
    /// Application name.
    pub name: String,
    /// Service endpoints and application identity.
    pub api: ApiSettings,
    /// Channel identities this client watches.
    pub identity: IdentitySettings,
    /// Desired subscriptions, by wire name (`channel.follow`, ...).
    pub subscriptions: Vec<String>,
    /// Credential lifecycle settings.
    pub auth: AuthSettings,
    /// Session timing and retry settings.
    pub session: SessionSettings,
    /// Persistence settings.
    pub storage: StorageSettings,
    /// Logging configuration.
    pub logging: LoggingSettings,
}

impl Default for WispSettings {
    fn default() -> Self {
        Self {
            version: "0.1.0".to_string(),
            name: "wisp".to_string(),
            api: ApiSettings::default(),
            identity: IdentitySettings::default(),
            subscriptions: Vec::new(),
            auth: AuthSettings::default(),
            session: SessionSettings::default(),
            storage: StorageSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

impl WispSettings {
    /// Clamp ratio fields and correct invalid invariants.
    ///
    /// Called automatically during loading. Out-of-range values are clamped
    /// with a warning rather than rejected.
    pub fn validate(&mut self) {
        let b = &mut self.session.reconnect;
        if b.jitter_factor < 0.0 || b.jitter_factor > 1.0 {
            let clamped = b.jitter_factor.clamp(0.0, 1.0);
            tracing::warn!(
                "jitter_factor out of range ({}), clamped to {clamped}",
                b.jitter_factor
            );
            b.jitter_factor = clamped;
        }
        if b.max_delay_ms < b.base_delay_ms {
            tracing::warn!(
                "reconnect max_delay_ms ({}) < base_delay_ms ({}), correcting",
                b.max_delay_ms,
                b.base_delay_ms
            );
            b.max_delay_ms = b.base_delay_ms;
        }
        if self.session.keepalive_grace_percent > 100 {
            tracing::warn!(
                "keepalive_grace_percent ({}) > 100, clamped",
                self.session.keepalive_grace_percent
            );
            self.session.keepalive_grace_percent = 100;
        }
    }
}

/// Service endpoints and application identity.
///
/// Endpoint URLs are overridable so tests can point the client at local
/// servers.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiSettings {
    /// OAuth application client id.
    pub client_id: String,
    /// OAuth application client secret. Usually supplied via
    /// `WISP_CLIENT_SECRET` rather than the settings file.
    pub client_secret: String,
    /// WebSocket endpoint for the notification socket.
    pub eventsub_url: String,
    /// REST base URL for subscription management.
    pub helix_url: String,
    /// OAuth token endpoint.
    pub token_url: String,
    /// OAuth authorization endpoint.
    pub authorize_url: String,
    /// Local port the authorization redirect points at.
    pub callback_port: u16,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            eventsub_url: "wss://eventsub.wss.twitch.tv/ws".to_string(),
            helix_url: "https://api.twitch.tv/helix".to_string(),
            token_url: "https://id.twitch.tv/oauth2/token".to_string(),
            authorize_url: "https://id.twitch.tv/oauth2/authorize".to_string(),
            callback_port: 3000,
        }
    }
}

/// Channel identities.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IdentitySettings {
    /// The watched channel's user id.
    pub broadcaster_id: String,
    /// The authorizing user's id (the broadcaster, or a bot account for
    /// delegable kinds).
    pub user_id: String,
}

/// Credential lifecycle settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AuthSettings {
    /// Where tokens are persisted between runs.
    pub credentials_path: PathBuf,
    /// A token within this margin of expiry is refreshed before use.
    pub expiry_margin_secs: u64,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            credentials_path: config_dir().join("credentials.json"),
            expiry_margin_secs: 60,
        }
    }
}

/// Session timing, dedup, and reconnect settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionSettings {
    /// How long to wait for the welcome frame after connecting.
    pub welcome_timeout_secs: u64,
    /// Grace added to the service's keepalive timeout, as a percentage.
    pub keepalive_grace_percent: u64,
    /// How long a seen message id is remembered for dedup.
    pub dedup_window_secs: u64,
    /// Reconnect backoff policy.
    pub reconnect: BackoffSettings,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            welcome_timeout_secs: 10,
            keepalive_grace_percent: 20,
            dedup_window_secs: 120,
            reconnect: BackoffSettings::default(),
        }
    }
}

/// Exponential backoff policy for reconnect attempts.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BackoffSettings {
    /// First retry delay in milliseconds.
    pub base_delay_ms: u64,
    /// Delay ceiling in milliseconds.
    pub max_delay_ms: u64,
    /// Consecutive failures tolerated before giving up.
    pub max_attempts: u32,
    /// Jitter factor (0.0–1.0) applied to each delay.
    pub jitter_factor: f64,
}

impl Default for BackoffSettings {
    fn default() -> Self {
        Self {
            base_delay_ms: 1_000,
            max_delay_ms: 30_000,
            max_attempts: 5,
            jitter_factor: 0.25,
        }
    }
}

/// Persistence settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StorageSettings {
    /// SQLite database path.
    pub db_path: PathBuf,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            db_path: config_dir().join("events.db"),
        }
    }
}

/// Logging configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Log filter (`error`, `warn`, `info`, `debug`, `trace`, or an
    /// `env_filter` directive string).
    pub level: String,
    /// Emit JSON-formatted log lines.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}
