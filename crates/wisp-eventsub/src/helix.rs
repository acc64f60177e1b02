//! REST subscription management.
//!
//! Subscriptions tied to a socket session are created over the REST API, not
//! the socket itself. [`SubscriptionApi`] is the seam the registry talks
//! through; [`HelixClient`] is the production implementation.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, instrument};

use wisp_auth::Credential;
use wisp_core::EventKind;

use crate::errors::HelixError;

/// What the service reported back for a freshly created subscription.
#[derive(Clone, Debug)]
pub struct CreatedSubscription {
    /// Service-assigned subscription id.
    pub id: String,
    /// Initial status, `enabled` on the happy path.
    pub status: String,
}

/// Creates socket-transport subscriptions.
#[async_trait]
pub trait SubscriptionApi: Send + Sync {
    /// Create one subscription bound to `session_id`.
    async fn create_subscription(
        &self,
        credential: &Credential,
        session_id: &str,
        kind: EventKind,
        condition: &BTreeMap<String, String>,
    ) -> Result<CreatedSubscription, HelixError>;
}

/// REST client for the subscription endpoint.
pub struct HelixClient {
    http: reqwest::Client,
    base_url: String,
    client_id: String,
}

#[derive(Deserialize)]
struct CreateResponse {
    data: Vec<CreateResponseEntry>,
}

#[derive(Deserialize)]
struct CreateResponseEntry {
    id: String,
    status: String,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: String,
}

impl HelixClient {
    /// A client against `base_url` identifying as `client_id`.
    pub fn new(base_url: impl Into<String>, client_id: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .unwrap_or_default();
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client_id: client_id.into(),
        }
    }
}

#[async_trait]
impl SubscriptionApi for HelixClient {
    #[instrument(skip(self, credential, condition), fields(kind = %kind))]
    async fn create_subscription(
        &self,
        credential: &Credential,
        session_id: &str,
        kind: EventKind,
        condition: &BTreeMap<String, String>,
    ) -> Result<CreatedSubscription, HelixError> {
        let body = json!({
            "type": kind.wire_name(),
            "version": kind.version(),
            "condition": condition,
            "transport": {
                "method": "websocket",
                "session_id": session_id,
            },
        });
        let response = self
            .http
            .post(format!("{}/eventsub/subscriptions", self.base_url))
            .header("Client-Id", &self.client_id)
            .bearer_auth(&credential.access_token)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = match response.json::<ApiErrorBody>().await {
                Ok(body) if !body.message.is_empty() => body.message,
                _ => status.to_string(),
            };
            return Err(HelixError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: CreateResponse = response
            .json()
            .await
            .map_err(|e| HelixError::MalformedResponse(e.to_string()))?;
        let Some(entry) = parsed.data.into_iter().next() else {
            return Err(HelixError::MalformedResponse(
                "empty data array".to_string(),
            ));
        };
        debug!(id = %entry.id, status = %entry.status, "subscription created");
        Ok(CreatedSubscription {
            id: entry.id,
            status: entry.status,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
