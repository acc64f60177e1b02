//! Socket-transport event subscription client.
//!
//! Pairs a long-lived socket session with REST-managed subscriptions:
//! [`session::EventSubSession`] owns the connection lifecycle (welcome,
//! keepalive, service-directed migration, reconnect with backoff),
//! [`registry::SubscriptionRegistry`] reconciles the desired subscription
//! set after every welcome, and [`dispatch::EventDispatcher`] dedups,
//! persists, and fans events out to an
//! [`EventSink`](wisp_core::EventSink).

pub mod backoff;
pub mod dedup;
pub mod dispatch;
pub mod errors;
pub mod helix;
pub mod registry;
pub mod session;
pub mod wire;

pub use backoff::BackoffPolicy;
pub use dispatch::EventDispatcher;
pub use errors::{HelixError, SessionError, SubscriptionError};
pub use helix::{HelixClient, SubscriptionApi};
pub use registry::{Subscription, SubscriptionRegistry, SubscriptionStatus};
pub use session::{EventSubSession, SessionConfig, SessionStatus};
pub use wire::Frame;
