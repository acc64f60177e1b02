//! The socket wire format.
//!
//! Every frame is a JSON envelope: `metadata` (message id, type, timestamp)
//! plus a `payload` whose shape depends on the type. [`Frame::parse`] turns
//! raw text into the typed control/notification frames the session loop
//! consumes; notification event bodies stay as raw JSON here and are decoded
//! per kind by the dispatcher.

use serde::Deserialize;
use serde_json::Value;

use wisp_core::EventKind;

/// Frame envelope metadata.
#[derive(Clone, Debug, Deserialize)]
pub struct Metadata {
    /// Transport message id. Stable across redeliveries.
    pub message_id: String,
    /// Frame discriminator (`session_welcome`, `notification`, ...).
    pub message_type: String,
    /// Service-side send time (RFC 3339).
    pub message_timestamp: String,
}

/// Session descriptor from a welcome frame.
#[derive(Clone, Debug, Deserialize)]
pub struct SessionInfo {
    /// Session id, required by subscription requests.
    pub id: String,
    /// Seconds of allowed silence before the session is considered lost.
    #[serde(default = "default_keepalive")]
    pub keepalive_timeout_seconds: u64,
    /// Present when the service asks this connection to move.
    #[serde(default)]
    pub reconnect_url: Option<String>,
}

fn default_keepalive() -> u64 {
    10
}

/// A parsed inbound frame.
#[derive(Clone, Debug)]
pub enum Frame {
    /// First frame on every connection; carries the session descriptor.
    Welcome {
        /// Envelope metadata.
        metadata: Metadata,
        /// The session this connection now serves.
        session: SessionInfo,
    },
    /// Liveness signal, no payload.
    Keepalive {
        /// Envelope metadata.
        metadata: Metadata,
    },
    /// An event delivery.
    Notification {
        /// Envelope metadata.
        metadata: Metadata,
        /// Subscription that produced this event.
        subscription_id: String,
        /// Parsed kind, `None` when the wire name is unknown to this build.
        kind: Option<EventKind>,
        /// Wire name as sent.
        kind_raw: String,
        /// Undecoded event body.
        event: Value,
    },
    /// The service asks this connection to migrate.
    Reconnect {
        /// Envelope metadata.
        metadata: Metadata,
        /// Where to reconnect. The session falls back to its original
        /// endpoint when absent.
        reconnect_url: Option<String>,
    },
    /// The service terminated one subscription.
    Revocation {
        /// Envelope metadata.
        metadata: Metadata,
        /// The revoked subscription's id.
        subscription_id: String,
        /// Parsed kind, when known.
        kind: Option<EventKind>,
        /// Wire name as sent.
        kind_raw: String,
        /// Why (`authorization_revoked`, `user_removed`,
        /// `version_removed`).
        status: String,
    },
}

/// Wire parse errors.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    /// Not JSON, or missing the envelope.
    #[error("malformed frame: {0}")]
    Json(#[from] serde_json::Error),

    /// An envelope with a `message_type` this build does not know.
    #[error("unknown message type: {0}")]
    UnknownMessageType(String),
}

#[derive(Deserialize)]
struct RawFrame {
    metadata: Metadata,
    #[serde(default)]
    payload: Value,
}

#[derive(Deserialize)]
struct SessionPayload {
    session: SessionInfo,
}

#[derive(Deserialize)]
struct SubscriptionRef {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    status: Option<String>,
}

#[derive(Deserialize)]
struct NotificationPayload {
    subscription: SubscriptionRef,
    #[serde(default)]
    event: Value,
}

#[derive(Deserialize)]
struct RevocationPayload {
    subscription: SubscriptionRef,
}

impl Frame {
    /// Parse one text frame.
    pub fn parse(text: &str) -> Result<Frame, WireError> {
        let raw: RawFrame = serde_json::from_str(text)?;
        match raw.metadata.message_type.as_str() {
            "session_welcome" => {
                let payload: SessionPayload = serde_json::from_value(raw.payload)?;
                Ok(Frame::Welcome {
                    metadata: raw.metadata,
                    session: payload.session,
                })
            }
            "session_keepalive" => Ok(Frame::Keepalive {
                metadata: raw.metadata,
            }),
            "notification" => {
                let payload: NotificationPayload = serde_json::from_value(raw.payload)?;
                let kind = payload.subscription.kind.parse::<EventKind>().ok();
                Ok(Frame::Notification {
                    metadata: raw.metadata,
                    subscription_id: payload.subscription.id,
                    kind,
                    kind_raw: payload.subscription.kind,
                    event: payload.event,
                })
            }
            "session_reconnect" => {
                let payload: SessionPayload = serde_json::from_value(raw.payload)?;
                Ok(Frame::Reconnect {
                    metadata: raw.metadata,
                    reconnect_url: payload.session.reconnect_url,
                })
            }
            "revocation" => {
                let payload: RevocationPayload = serde_json::from_value(raw.payload)?;
                let kind = payload.subscription.kind.parse::<EventKind>().ok();
                Ok(Frame::Revocation {
                    metadata: raw.metadata,
                    subscription_id: payload.subscription.id,
                    kind,
                    kind_raw: payload.subscription.kind,
                    status: payload
                        .subscription
                        .status
                        .unwrap_or_else(|| "unknown".to_string()),
                })
            }
            other => Err(WireError::UnknownMessageType(other.to_string())),
        }
    }

    /// The envelope message id.
    pub fn message_id(&self) -> &str {
        match self {
            Frame::Welcome { metadata, .. }
            | Frame::Keepalive { metadata }
            | Frame::Notification { metadata, .. }
            | Frame::Reconnect { metadata, .. }
            | Frame::Revocation { metadata, .. } => &metadata.message_id,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
