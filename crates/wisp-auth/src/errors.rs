//! Auth errors.

/// Errors from the credential lifecycle.
///
/// Any of these surfacing from [`crate::TokenManager::acquire`] is fatal to
/// the calling session: there is no silent fallback to a stale token.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// HTTP transport failure talking to the token endpoint.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parse failure.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// File I/O failure on the credential store.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The token endpoint rejected the request.
    #[error("OAuth error ({status}): {message}")]
    OAuth {
        /// HTTP status code.
        status: u16,
        /// Response body.
        message: String,
    },

    /// The token endpoint did not answer in time.
    #[error("token endpoint timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// No credential is available to refresh from.
    #[error("no credential configured; complete the authorization flow first")]
    NotConfigured,

    /// The stored credential lacks scopes the desired subscriptions need.
    #[error("stored credential is missing scopes: {0:?}")]
    MissingScopes(Vec<String>),
}
