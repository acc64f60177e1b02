//! The token manager.
//!
//! Owns the credential and keeps it usable: hands out clones that are valid
//! at hand-off time, refreshes ahead of expiry, and lets consumers force a
//! refresh after the service rejects a token the local clock still thought
//! was good.

use std::path::PathBuf;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

use crate::errors::AuthError;
use crate::oauth::{self, AuthConfig};
use crate::storage;
use crate::types::{Credential, now_ms};

/// Ceiling on one refresh round trip. The state mutex is held across the
/// refresh, so an unanswered request would otherwise stall every caller.
const REFRESH_TIMEOUT: Duration = Duration::from_secs(15);

struct TokenState {
    credential: Option<Credential>,
    invalidated: bool,
}

/// Single owner of the OAuth credential.
///
/// All credential state lives behind one async mutex, held across the
/// refresh network call. N concurrent [`TokenManager::acquire`] callers
/// therefore produce exactly one refresh round trip: the first caller
/// refreshes, the rest block on the lock and then observe the fresh token.
pub struct TokenManager {
    http: reqwest::Client,
    config: AuthConfig,
    expiry_margin: Duration,
    refresh_timeout: Duration,
    persist_path: Option<PathBuf>,
    state: Mutex<TokenState>,
}

impl TokenManager {
    /// Create a manager seeded with an in-memory credential.
    pub fn new(
        http: reqwest::Client,
        config: AuthConfig,
        expiry_margin: Duration,
        credential: Option<Credential>,
    ) -> Self {
        Self {
            http,
            config,
            expiry_margin,
            refresh_timeout: REFRESH_TIMEOUT,
            persist_path: None,
            state: Mutex::new(TokenState {
                credential,
                invalidated: false,
            }),
        }
    }

    /// Override the refresh round-trip ceiling.
    #[must_use]
    pub fn with_refresh_timeout(mut self, timeout: Duration) -> Self {
        self.refresh_timeout = timeout;
        self
    }

    /// Create a manager backed by an on-disk credential file.
    ///
    /// Loads the stored credential when present; refreshed credentials are
    /// written back to the same path.
    pub fn with_storage(
        http: reqwest::Client,
        config: AuthConfig,
        expiry_margin: Duration,
        path: PathBuf,
    ) -> Self {
        let credential = storage::load_credential(&path);
        if credential.is_some() {
            info!(?path, "loaded stored credential");
        }
        Self {
            persist_path: Some(path),
            ..Self::new(http, config, expiry_margin, credential)
        }
    }

    /// Seed or replace the credential (after a completed authorization flow).
    pub async fn install(&self, credential: Credential) -> Result<(), AuthError> {
        let mut state = self.state.lock().await;
        self.persist(&credential);
        state.credential = Some(credential);
        state.invalidated = false;
        Ok(())
    }

    /// Get a credential that is valid right now.
    ///
    /// Refreshes first when the token is within the expiry margin or was
    /// invalidated. A failed refresh surfaces as an error; the stale
    /// credential is never returned.
    #[instrument(skip(self))]
    pub async fn acquire(&self) -> Result<Credential, AuthError> {
        let mut state = self.state.lock().await;

        let current = state.credential.as_ref().ok_or(AuthError::NotConfigured)?;

        let margin_ms = i64::try_from(self.expiry_margin.as_millis()).unwrap_or(i64::MAX);
        if !state.invalidated && now_ms() + margin_ms < current.expires_at {
            return Ok(current.clone());
        }

        info!(
            invalidated = state.invalidated,
            "access token stale, refreshing"
        );
        let refreshed = tokio::time::timeout(
            self.refresh_timeout,
            oauth::refresh(&self.http, &self.config, &current.refresh_token),
        )
        .await
        .map_err(|_| AuthError::Timeout(self.refresh_timeout))??;
        self.persist(&refreshed);
        state.credential = Some(refreshed.clone());
        state.invalidated = false;
        Ok(refreshed)
    }

    /// Force the next [`TokenManager::acquire`] to refresh.
    ///
    /// Called after the service answers 401 to a token the local expiry
    /// check still considered valid.
    pub async fn invalidate(&self) {
        let mut state = self.state.lock().await;
        state.invalidated = true;
    }

    /// Drop the credential entirely, including its on-disk copy.
    pub async fn clear(&self) -> Result<(), AuthError> {
        let mut state = self.state.lock().await;
        state.credential = None;
        state.invalidated = false;
        if let Some(path) = &self.persist_path {
            storage::remove_credential(path)?;
        }
        Ok(())
    }

    /// Verify the current credential covers `required` scopes.
    pub async fn check_scopes(&self, required: &[&str]) -> Result<(), AuthError> {
        let state = self.state.lock().await;
        let current = state.credential.as_ref().ok_or(AuthError::NotConfigured)?;
        let missing = current.missing_scopes(required);
        if missing.is_empty() {
            Ok(())
        } else {
            Err(AuthError::MissingScopes(missing))
        }
    }

    fn persist(&self, credential: &Credential) {
        if let Some(path) = &self.persist_path {
            if let Err(e) = storage::save_credential(path, credential) {
                warn!(error = %e, ?path, "failed to persist refreshed credential");
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
