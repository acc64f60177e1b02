//! OAuth wire operations: authorization-URL construction and token refresh.
//!
//! The browser redirect and the local callback listener live outside this
//! crate; callers hand the captured authorization code to
//! [`exchange_code`].

use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use serde::Deserialize;

use crate::errors::AuthError;
use crate::types::{Credential, calculate_expires_at};

/// Endpoint and application identity for the OAuth flows.
#[derive(Clone, Debug)]
pub struct AuthConfig {
    /// Authorization endpoint (browser redirect target).
    pub authorize_url: String,
    /// Token endpoint (code exchange and refresh).
    pub token_url: String,
    /// Application client id.
    pub client_id: String,
    /// Application client secret.
    pub client_secret: String,
    /// Redirect URI registered for the application.
    pub redirect_uri: String,
}

/// Random CSRF state for an authorization redirect.
pub fn csrf_state() -> String {
    let bytes: [u8; 16] = rand::random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Build the authorization URL for browser redirect.
pub fn authorization_url(config: &AuthConfig, scopes: &[&str], state: &str) -> String {
    format!(
        "{}?response_type=code&client_id={}&redirect_uri={}&scope={}&state={}",
        config.authorize_url,
        enc(&config.client_id),
        enc(&config.redirect_uri),
        enc(&scopes.join(" ")),
        enc(state),
    )
}

/// Exchange an authorization code for a credential.
#[tracing::instrument(skip_all)]
pub async fn exchange_code(
    client: &reqwest::Client,
    config: &AuthConfig,
    code: &str,
) -> Result<Credential, AuthError> {
    let form = [
        ("client_id", config.client_id.as_str()),
        ("client_secret", config.client_secret.as_str()),
        ("grant_type", "authorization_code"),
        ("code", code),
        ("redirect_uri", config.redirect_uri.as_str()),
    ];
    request_tokens(client, &config.token_url, &form).await
}

/// Mint a fresh credential from a refresh token.
#[tracing::instrument(skip_all)]
pub async fn refresh(
    client: &reqwest::Client,
    config: &AuthConfig,
    refresh_token: &str,
) -> Result<Credential, AuthError> {
    let form = [
        ("client_id", config.client_id.as_str()),
        ("client_secret", config.client_secret.as_str()),
        ("grant_type", "refresh_token"),
        ("refresh_token", refresh_token),
    ];
    request_tokens(client, &config.token_url, &form).await
}

async fn request_tokens(
    client: &reqwest::Client,
    token_url: &str,
    form: &[(&str, &str)],
) -> Result<Credential, AuthError> {
    let resp = client.post(token_url).form(form).send().await?;

    let status = resp.status().as_u16();
    if status != 200 {
        let message = resp.text().await.unwrap_or_default();
        return Err(AuthError::OAuth { status, message });
    }

    let data: TokenResponse = resp.json().await?;
    Ok(Credential {
        access_token: data.access_token,
        refresh_token: data.refresh_token,
        expires_at: calculate_expires_at(data.expires_in),
        scopes: data.scope.unwrap_or_default(),
    })
}

/// Token endpoint response.
#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    expires_in: i64,
    #[serde(default)]
    scope: Option<Vec<String>>,
}

fn enc(s: &str) -> String {
    utf8_percent_encode(s, NON_ALPHANUMERIC).to_string()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(token_url: String) -> AuthConfig {
        AuthConfig {
            authorize_url: "https://id.example/oauth2/authorize".into(),
            token_url,
            client_id: "cid".into(),
            client_secret: "secret".into(),
            redirect_uri: "http://localhost:3000".into(),
        }
    }

    #[test]
    fn authorization_url_contains_required_params() {
        let cfg = config("https://id.example/oauth2/token".into());
        let url = authorization_url(&cfg, &["bits:read", "channel:read:polls"], "st4te");
        assert!(url.starts_with("https://id.example/oauth2/authorize?response_type=code"));
        assert!(url.contains("client_id=cid"));
        assert!(url.contains("scope=bits%3Aread%20channel%3Aread%3Apolls"));
        assert!(url.contains("state=st4te"));
    }

    #[test]
    fn csrf_state_is_hex_and_unique() {
        let a = csrf_state();
        let b = csrf_state();
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn refresh_parses_token_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .and(body_string_contains("refresh_token=old-ref"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "new-acc",
                "refresh_token": "new-ref",
                "expires_in": 3600,
                "scope": ["bits:read"],
            })))
            .expect(1)
            .mount(&server)
            .await;

        let cfg = config(format!("{}/oauth2/token", server.uri()));
        let client = reqwest::Client::new();
        let cred = refresh(&client, &cfg, "old-ref").await.unwrap();
        assert_eq!(cred.access_token, "new-acc");
        assert_eq!(cred.refresh_token, "new-ref");
        assert_eq!(cred.scopes, vec!["bits:read".to_string()]);
    }

    #[tokio::test]
    async fn refresh_rejection_surfaces_status_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .respond_with(
                ResponseTemplate::new(400).set_body_string(r#"{"message":"Invalid refresh token"}"#),
            )
            .mount(&server)
            .await;

        let cfg = config(format!("{}/oauth2/token", server.uri()));
        let client = reqwest::Client::new();
        let err = refresh(&client, &cfg, "bad").await.unwrap_err();
        assert_matches!(err, AuthError::OAuth { status: 400, ref message } => {
            assert!(message.contains("Invalid refresh token"));
        });
    }

    #[tokio::test]
    async fn exchange_code_posts_authorization_code_grant() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .and(body_string_contains("grant_type=authorization_code"))
            .and(body_string_contains("code=the-code"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "acc",
                "refresh_token": "ref",
                "expires_in": 14400,
            })))
            .expect(1)
            .mount(&server)
            .await;

        let cfg = config(format!("{}/oauth2/token", server.uri()));
        let client = reqwest::Client::new();
        let cred = exchange_code(&client, &cfg, "the-code").await.unwrap();
        assert_eq!(cred.access_token, "acc");
        assert!(cred.scopes.is_empty());
    }
}
