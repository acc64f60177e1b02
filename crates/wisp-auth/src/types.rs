//! Credential types.

use serde::{Deserialize, Serialize};

/// An OAuth credential pair with its expiry and granted scopes.
///
/// Only the [`crate::TokenManager`] mutates credentials; everything else
/// receives clones that were valid at hand-off time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// Bearer token for API calls.
    pub access_token: String,
    /// Long-lived token used to mint new access tokens.
    pub refresh_token: String,
    /// Unix epoch milliseconds when `access_token` expires.
    pub expires_at: i64,
    /// Scopes granted at authorization time.
    pub scopes: Vec<String>,
}

impl Credential {
    /// Whether every scope in `required` was granted.
    pub fn has_scopes<S: AsRef<str>>(&self, required: &[S]) -> bool {
        required
            .iter()
            .all(|s| self.scopes.iter().any(|granted| granted == s.as_ref()))
    }

    /// Scopes in `required` that were not granted.
    pub fn missing_scopes<S: AsRef<str>>(&self, required: &[S]) -> Vec<String> {
        required
            .iter()
            .filter(|s| !self.scopes.iter().any(|granted| granted == s.as_ref()))
            .map(|s| s.as_ref().to_string())
            .collect()
    }
}

/// Current unix time in milliseconds.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Convert a token endpoint's `expires_in` (seconds) to an absolute epoch-ms
/// deadline.
pub fn calculate_expires_at(expires_in_secs: i64) -> i64 {
    now_ms() + expires_in_secs * 1000
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
