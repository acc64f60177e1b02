//! Session-layer error taxonomy.
//!
//! Three severities, kept as distinct types because callers react
//! differently to each:
//!
//! - [`SessionError`] — the session itself. Most variants are transient and
//!   feed the reconnect loop; `Auth` and `Failed` are terminal.
//! - [`SubscriptionError`] — one subscription could not be registered. Never
//!   takes the session down; reported alongside the ones that succeeded.
//! - [`HelixError`] — a single REST call. Wrapped by `SubscriptionError`.
//!
//! Revocations are not errors at all: they flow through
//! [`wisp_core::EventSink::on_revocation`].

use std::collections::BTreeMap;
use std::time::Duration;

use wisp_auth::AuthError;
use wisp_core::EventKind;

/// Errors from the subscription REST API.
#[derive(Debug, thiserror::Error)]
pub enum HelixError {
    /// Transport failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The service rejected the request.
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response body.
        message: String,
    },

    /// The response body did not have the expected shape.
    #[error("malformed API response: {0}")]
    MalformedResponse(String),
}

impl HelixError {
    /// Whether this is a 401 — the token was rejected server-side.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, HelixError::Api { status: 401, .. })
    }
}

/// What went wrong while registering a subscription.
#[derive(Debug, thiserror::Error)]
pub enum SubscriptionFailure {
    /// Could not obtain a usable credential.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// The create call failed (after the one permitted 401 retry).
    #[error(transparent)]
    Api(#[from] HelixError),
}

/// A per-subscription registration failure.
///
/// Carries the identity of the failed subscription so callers can report or
/// retry it specifically.
#[derive(Debug, thiserror::Error)]
#[error("subscription {kind} ({condition:?}) failed: {source}")]
pub struct SubscriptionError {
    /// Kind that failed to register.
    pub kind: EventKind,
    /// Condition it was requested with.
    pub condition: BTreeMap<String, String>,
    /// Underlying cause.
    #[source]
    pub source: SubscriptionFailure,
}

/// Session lifecycle errors.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// WebSocket transport failure. Transient.
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// The peer closed the connection. Transient.
    #[error("connection closed by peer")]
    ConnectionClosed,

    /// No welcome frame arrived in time. Transient.
    #[error("no welcome frame within {0:?}")]
    WelcomeTimeout(Duration),

    /// The keepalive deadline passed with no traffic. Transient.
    #[error("keepalive deadline passed with no traffic")]
    KeepaliveTimeout,

    /// Credential refresh failed. Terminal: surfaced immediately, no retry.
    #[error("authentication failed: {0}")]
    Auth(#[from] AuthError),

    /// The reconnect budget is exhausted. Terminal: no further automatic
    /// retries; re-establishing the session is an explicit caller action.
    #[error("session failed after {attempts} consecutive connection failures")]
    Failed {
        /// Consecutive failures observed.
        attempts: u32,
    },
}

impl SessionError {
    /// Whether the reconnect loop may retry after this error.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SessionError::WebSocket(_)
                | SessionError::ConnectionClosed
                | SessionError::WelcomeTimeout(_)
                | SessionError::KeepaliveTimeout
        )
    }
}
