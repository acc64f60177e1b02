//! The socket session.
//!
//! [`EventSubSession::run`] owns one logical session across its whole life:
//! connect, wait for the welcome, create subscriptions, pump frames, migrate
//! when the service asks, and reconnect with backoff when the transport
//! drops. Callers watch progress through a [`SessionStatus`] channel and
//! stop the loop through its [`tokio_util::sync::CancellationToken`].

use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use wisp_auth::TokenManager;
use wisp_core::EventKind;

use crate::backoff::BackoffPolicy;
use crate::dispatch::EventDispatcher;
use crate::errors::SessionError;
use crate::registry::SubscriptionRegistry;
use crate::wire::{Frame, SessionInfo};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Observable session lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionStatus {
    /// Not yet started, or between reconnect attempts.
    Disconnected,
    /// TCP/TLS handshake in flight.
    Connecting,
    /// Connected, waiting for the welcome frame.
    AwaitingWelcome,
    /// Welcomed and subscribed; events are flowing.
    Active,
    /// Migrating to a service-designated replacement connection.
    Reconnecting,
    /// Stopped on request.
    Closed,
    /// Gave up after too many consecutive failures.
    Failed,
}

/// Static configuration for one session.
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Socket endpoint.
    pub url: String,
    /// Channel owner's user id, used in subscription conditions.
    pub broadcaster_id: String,
    /// Authenticated user's id, used in chat and follow conditions.
    pub user_id: String,
    /// Event kinds to subscribe to.
    pub kinds: Vec<EventKind>,
    /// How long to wait for the welcome frame.
    pub welcome_timeout: Duration,
    /// Grace added to the advertised keepalive timeout, as a percentage.
    pub keepalive_grace_percent: u64,
    /// Reconnect policy.
    pub backoff: BackoffPolicy,
}

impl SessionConfig {
    /// Build a config from loaded settings. Fails when the configured
    /// subscription list names a kind this build does not know.
    pub fn from_settings(
        settings: &wisp_settings::types::WispSettings,
    ) -> Result<Self, wisp_core::kinds::UnknownKind> {
        let kinds = settings
            .subscriptions
            .iter()
            .map(|name| name.parse())
            .collect::<Result<Vec<EventKind>, _>>()?;
        Ok(Self {
            url: settings.api.eventsub_url.clone(),
            broadcaster_id: settings.identity.broadcaster_id.clone(),
            user_id: settings.identity.user_id.clone(),
            kinds,
            welcome_timeout: Duration::from_secs(settings.session.welcome_timeout_secs),
            keepalive_grace_percent: settings.session.keepalive_grace_percent,
            backoff: BackoffPolicy::from(&settings.session.reconnect),
        })
    }
}

/// One long-lived socket session.
pub struct EventSubSession {
    config: SessionConfig,
    registry: SubscriptionRegistry,
    dispatcher: EventDispatcher,
    tokens: Arc<TokenManager>,
    status_tx: watch::Sender<SessionStatus>,
    cancel: CancellationToken,
}

/// Why `drive` returned.
enum DriveExit {
    /// Cancellation was requested; the socket was closed cleanly.
    Stopped,
    /// The transport or the keepalive contract failed.
    Lost(SessionError),
}

impl EventSubSession {
    /// A session that is not yet running.
    pub fn new(
        config: SessionConfig,
        tokens: Arc<TokenManager>,
        registry: SubscriptionRegistry,
        dispatcher: EventDispatcher,
    ) -> Self {
        let (status_tx, _) = watch::channel(SessionStatus::Disconnected);
        Self {
            config,
            registry,
            dispatcher,
            tokens,
            status_tx,
            cancel: CancellationToken::new(),
        }
    }

    /// A receiver that observes every status transition.
    pub fn status(&self) -> watch::Receiver<SessionStatus> {
        self.status_tx.subscribe()
    }

    /// A token that stops the running session when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Current view of every tracked subscription, with statuses.
    pub fn subscriptions(&self) -> Vec<crate::registry::Subscription> {
        self.registry.subscriptions()
    }

    /// Run the session until it is stopped or fails permanently.
    ///
    /// Transient losses reconnect with exponential backoff; the attempt
    /// counter resets whenever a connection reaches [`SessionStatus::Active`].
    /// Auth failures and exhausting the backoff budget are terminal.
    #[instrument(skip(self), fields(url = %self.config.url))]
    pub async fn run(&mut self) -> Result<(), SessionError> {
        let mut failures: u32 = 0;
        loop {
            if self.cancel.is_cancelled() {
                self.set_status(SessionStatus::Closed);
                return Ok(());
            }

            match self.connect_once().await {
                Ok(DriveExit::Stopped) => {
                    self.set_status(SessionStatus::Closed);
                    return Ok(());
                }
                Ok(DriveExit::Lost(e)) => {
                    // The connection was active at some point, so this is a
                    // fresh failure streak.
                    warn!(error = %e, "session lost");
                    failures = 1;
                }
                Err(e) if !e.is_transient() => {
                    error!(error = %e, "session failed");
                    self.set_status(SessionStatus::Failed);
                    return Err(e);
                }
                Err(e) => {
                    failures += 1;
                    warn!(error = %e, failures, "connection attempt failed");
                }
            }

            if failures >= self.config.backoff.max_attempts {
                self.set_status(SessionStatus::Failed);
                return Err(SessionError::Failed { attempts: failures });
            }

            self.set_status(SessionStatus::Disconnected);
            let delay = self.config.backoff.delay(failures);
            debug!(?delay, "backing off before reconnect");
            tokio::select! {
                () = self.cancel.cancelled() => {
                    self.set_status(SessionStatus::Closed);
                    return Ok(());
                }
                () = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// One connection lifetime: connect, welcome, subscribe, pump.
    async fn connect_once(&mut self) -> Result<DriveExit, SessionError> {
        self.set_status(SessionStatus::Connecting);
        let url = self.config.url.clone();
        let timeout = self.config.welcome_timeout;
        let deadline = Instant::now() + timeout;
        let ws = connect_transport(&url, deadline, timeout).await?;
        self.set_status(SessionStatus::AwaitingWelcome);
        let (ws, session) = await_welcome(ws, deadline, timeout).await?;
        info!(session_id = %session.id, "session established");

        // Resolving a credential up front makes broken auth terminal
        // instead of burning reconnect attempts on it.
        self.tokens.acquire().await?;
        // Subscriptions are bound to the session that created them, so
        // entries carried over from a previous connection are stale and get
        // re-issued before any configured kind that is not yet tracked.
        if let Err(failures) = self.registry.resubscribe_all(&session.id).await {
            self.dispatcher.dispatch_subscription_failures(&failures).await;
        }
        self.subscribe_all(&session.id).await;
        self.set_status(SessionStatus::Active);

        Ok(self.drive(ws, session).await)
    }

    /// Create every configured subscription for `session_id`.
    async fn subscribe_all(&mut self, session_id: &str) {
        for kind in self.config.kinds.clone() {
            let condition =
                kind.condition(&self.config.broadcaster_id, &self.config.user_id);
            if let Err(e) = self.registry.ensure(session_id, kind, condition).await {
                self.dispatcher
                    .dispatch_subscription_failures(std::slice::from_ref(&e))
                    .await;
            }
        }
    }

    /// Pump frames until the connection is lost, migrated out of, or stopped.
    async fn drive(&mut self, mut ws: WsStream, session: SessionInfo) -> DriveExit {
        let mut keepalive_window =
            self.keepalive_window(session.keepalive_timeout_seconds);
        let mut deadline = Instant::now() + keepalive_window;

        loop {
            let message = tokio::select! {
                () = self.cancel.cancelled() => {
                    self.close_quietly(&mut ws).await;
                    return DriveExit::Stopped;
                }
                () = tokio::time::sleep_until(deadline) => {
                    return DriveExit::Lost(SessionError::KeepaliveTimeout);
                }
                message = ws.next() => message,
            };

            // Any inbound traffic proves the connection is alive.
            deadline = Instant::now() + keepalive_window;

            let text = match message {
                Some(Ok(Message::Text(text))) => text,
                Some(Ok(Message::Ping(payload))) => {
                    let _ = ws.send(Message::Pong(payload)).await;
                    continue;
                }
                Some(Ok(Message::Close(_))) | None => {
                    return DriveExit::Lost(SessionError::ConnectionClosed);
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => return DriveExit::Lost(SessionError::WebSocket(e)),
            };

            let frame = match Frame::parse(&text) {
                Ok(frame) => frame,
                Err(e) => {
                    warn!(error = %e, "unparseable frame skipped");
                    continue;
                }
            };

            match frame {
                Frame::Keepalive { .. } | Frame::Welcome { .. } => {}
                Frame::Notification { .. } => {
                    self.dispatcher.dispatch(&frame).await;
                }
                Frame::Revocation {
                    subscription_id,
                    kind,
                    kind_raw,
                    status,
                    ..
                } => {
                    self.registry.mark_revoked(&subscription_id, &status);
                    self.dispatcher
                        .dispatch_revocation(kind, &kind_raw, &subscription_id, &status)
                        .await;
                }
                Frame::Reconnect { reconnect_url, .. } => {
                    match self.migrate(&mut ws, reconnect_url).await {
                        Ok(new_session) => {
                            keepalive_window = self
                                .keepalive_window(new_session.keepalive_timeout_seconds);
                            deadline = Instant::now() + keepalive_window;
                        }
                        Err(e) => return DriveExit::Lost(e),
                    }
                }
            }
        }
    }

    /// Graceful migration. The old connection keeps dispatching
    /// notifications until the replacement's welcome arrives, then the
    /// streams are swapped and every subscription is re-issued.
    async fn migrate(
        &mut self,
        ws: &mut WsStream,
        reconnect_url: Option<String>,
    ) -> Result<SessionInfo, SessionError> {
        let url = reconnect_url.unwrap_or_else(|| self.config.url.clone());
        info!(%url, "migrating to replacement connection");
        self.set_status(SessionStatus::Reconnecting);

        let mut welcome =
            Box::pin(connect_and_welcome(url, self.config.welcome_timeout));
        let mut old_alive = true;
        let (new_ws, session) = loop {
            if !old_alive {
                // The old connection died mid-migration; nothing left to
                // drain, just wait for the replacement handshake.
                break (&mut welcome).await?;
            }
            tokio::select! {
                result = &mut welcome => break result?,
                message = ws.next() => {
                    match message {
                        Some(Ok(Message::Text(text))) => {
                            match Frame::parse(&text) {
                                Ok(frame @ Frame::Notification { .. }) => {
                                    self.dispatcher.dispatch(&frame).await;
                                }
                                Ok(Frame::Revocation {
                                    subscription_id,
                                    kind,
                                    kind_raw,
                                    status,
                                    ..
                                }) => {
                                    self.registry.mark_revoked(&subscription_id, &status);
                                    self.dispatcher
                                        .dispatch_revocation(
                                            kind,
                                            &kind_raw,
                                            &subscription_id,
                                            &status,
                                        )
                                        .await;
                                }
                                Ok(_) | Err(_) => {}
                            }
                        }
                        Some(Ok(_)) => {}
                        Some(Err(_)) | None => old_alive = false,
                    }
                }
            }
        };

        let old = std::mem::replace(ws, new_ws);
        drop(old);
        info!(session_id = %session.id, "migration complete");

        self.tokens.acquire().await?;
        if let Err(failures) = self.registry.resubscribe_all(&session.id).await {
            self.dispatcher.dispatch_subscription_failures(&failures).await;
        }
        self.set_status(SessionStatus::Active);
        Ok(session)
    }

    fn keepalive_window(&self, advertised_secs: u64) -> Duration {
        keepalive_window(advertised_secs, self.config.keepalive_grace_percent)
    }

    async fn close_quietly(&self, ws: &mut WsStream) {
        let _ = ws
            .send(Message::Close(Some(CloseFrame {
                code: tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode::Normal,
                reason: "shutting down".into(),
            })))
            .await;
        // Drain briefly so the close handshake can complete.
        let drain = tokio::time::sleep(Duration::from_secs(5));
        tokio::pin!(drain);
        loop {
            tokio::select! {
                () = &mut drain => break,
                message = ws.next() => {
                    match message {
                        Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                        Some(Ok(_)) => {}
                    }
                }
            }
        }
    }

    fn set_status(&self, status: SessionStatus) {
        let _ = self.status_tx.send(status);
    }
}

/// The advertised keepalive timeout widened by the configured grace.
fn keepalive_window(advertised_secs: u64, grace_percent: u64) -> Duration {
    let scale = 100 + grace_percent;
    Duration::from_millis(advertised_secs.saturating_mul(10).saturating_mul(scale))
}

/// Open a connection to `url` and wait for its welcome frame.
///
/// Free function so a migration can run it while the caller still holds the
/// old stream mutably.
async fn connect_and_welcome(
    url: String,
    timeout: Duration,
) -> Result<(WsStream, SessionInfo), SessionError> {
    let deadline = Instant::now() + timeout;
    let ws = connect_transport(&url, deadline, timeout).await?;
    await_welcome(ws, deadline, timeout).await
}

/// Dial the socket endpoint, bounded by `deadline`.
async fn connect_transport(
    url: &str,
    deadline: Instant,
    timeout: Duration,
) -> Result<WsStream, SessionError> {
    let (ws, _) = tokio::time::timeout_at(deadline, connect_async(url))
        .await
        .map_err(|_| SessionError::WelcomeTimeout(timeout))??;
    Ok(ws)
}

/// Read frames until the welcome arrives, bounded by `deadline`.
async fn await_welcome(
    mut ws: WsStream,
    deadline: Instant,
    timeout: Duration,
) -> Result<(WsStream, SessionInfo), SessionError> {
    loop {
        let message = tokio::select! {
            () = tokio::time::sleep_until(deadline) => {
                return Err(SessionError::WelcomeTimeout(timeout));
            }
            message = ws.next() => message,
        };
        match message {
            Some(Ok(Message::Text(text))) => match Frame::parse(&text) {
                Ok(Frame::Welcome { session, .. }) => return Ok((ws, session)),
                Ok(_) => {
                    warn!("non-welcome frame before welcome, skipping");
                }
                Err(e) => {
                    warn!(error = %e, "unparseable frame before welcome, skipping");
                }
            },
            Some(Ok(Message::Ping(payload))) => {
                let _ = ws.send(Message::Pong(payload)).await;
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => return Err(SessionError::WebSocket(e)),
            None => return Err(SessionError::ConnectionClosed),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
