//! End-to-end session tests against an in-process socket server.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{WebSocketStream, accept_async};

use wisp_auth::{AuthConfig, Credential, TokenManager};
use wisp_core::records::ChatMessage;
use wisp_core::{EventKind, EventSink};
use wisp_eventsub::backoff::BackoffPolicy;
use wisp_eventsub::dispatch::EventDispatcher;
use wisp_eventsub::errors::HelixError;
use wisp_eventsub::helix::{CreatedSubscription, SubscriptionApi};
use wisp_eventsub::registry::{SubscriptionRegistry, SubscriptionStatus};
use wisp_eventsub::session::{EventSubSession, SessionConfig, SessionStatus};
use wisp_store::SqliteEventStore;

// ─────────────────────────────────────────────────────────────────────────────
// Scripted server pieces
// ─────────────────────────────────────────────────────────────────────────────

async fn ws_listener() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}/ws", listener.local_addr().unwrap());
    (listener, url)
}

async fn accept_ws(listener: &TcpListener) -> WebSocketStream<TcpStream> {
    let (stream, _) = listener.accept().await.unwrap();
    accept_async(stream).await.unwrap()
}

fn frame(message_id: &str, message_type: &str, payload: serde_json::Value) -> Message {
    Message::text(
        serde_json::json!({
            "metadata": {
                "message_id": message_id,
                "message_type": message_type,
                "message_timestamp": "2025-06-01T12:00:00Z",
            },
            "payload": payload,
        })
        .to_string(),
    )
}

fn welcome(session_id: &str, keepalive_secs: u64) -> Message {
    frame(
        &format!("welcome-{session_id}"),
        "session_welcome",
        serde_json::json!({
            "session": {
                "id": session_id,
                "status": "connected",
                "keepalive_timeout_seconds": keepalive_secs,
            }
        }),
    )
}

fn chat_notification(message_id: &str, text: &str) -> Message {
    frame(
        message_id,
        "notification",
        serde_json::json!({
            "subscription": { "id": "sub-1", "type": "channel.chat.message" },
            "event": {
                "broadcaster_user_id": "12",
                "chatter_user_id": "34",
                "chatter_user_login": "viewer",
                "chatter_user_name": "Viewer",
                "message_id": format!("chat-{message_id}"),
                "message": { "text": text },
            },
        }),
    )
}

fn reconnect(url: &str) -> Message {
    frame(
        "reconnect-1",
        "session_reconnect",
        serde_json::json!({
            "session": { "id": "sess-old", "reconnect_url": url }
        }),
    )
}

fn revocation(subscription_id: &str) -> Message {
    frame(
        "revocation-1",
        "revocation",
        serde_json::json!({
            "subscription": {
                "id": subscription_id,
                "type": "channel.chat.message",
                "status": "authorization_revoked",
            }
        }),
    )
}

// ─────────────────────────────────────────────────────────────────────────────
// Test doubles
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct RecordingApi {
    created: Mutex<Vec<(String, EventKind)>>,
    counter: AtomicU32,
}

#[async_trait]
impl SubscriptionApi for RecordingApi {
    async fn create_subscription(
        &self,
        _credential: &Credential,
        session_id: &str,
        kind: EventKind,
        _condition: &BTreeMap<String, String>,
    ) -> Result<CreatedSubscription, HelixError> {
        self.created.lock().push((session_id.to_string(), kind));
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        Ok(CreatedSubscription {
            id: format!("sub-{n}"),
            status: "enabled".to_string(),
        })
    }
}

struct FailingApi;

#[async_trait]
impl SubscriptionApi for FailingApi {
    async fn create_subscription(
        &self,
        _credential: &Credential,
        _session_id: &str,
        _kind: EventKind,
        _condition: &BTreeMap<String, String>,
    ) -> Result<CreatedSubscription, HelixError> {
        Err(HelixError::Api {
            status: 500,
            message: "subscription service unavailable".to_string(),
        })
    }
}

#[derive(Default)]
struct RecordingSink {
    chat_messages: Mutex<Vec<String>>,
    revocations: Mutex<Vec<(EventKind, String)>>,
    failures: Mutex<Vec<(EventKind, String)>>,
}

#[async_trait]
impl EventSink for RecordingSink {
    async fn on_chat_message(&self, event: &ChatMessage) {
        self.chat_messages.lock().push(event.message.text.clone());
    }

    async fn on_revocation(&self, kind: EventKind, subscription_id: &str, _status: &str) {
        self.revocations
            .lock()
            .push((kind, subscription_id.to_string()));
    }

    async fn on_subscription_failure(
        &self,
        kind: EventKind,
        _condition: &BTreeMap<String, String>,
        reason: &str,
    ) {
        self.failures.lock().push((kind, reason.to_string()));
    }
}

struct Harness {
    session: EventSubSession,
    api: Arc<RecordingApi>,
    sink: Arc<RecordingSink>,
    store: Arc<SqliteEventStore>,
}

fn token_manager() -> Arc<TokenManager> {
    Arc::new(TokenManager::new(
        reqwest::Client::new(),
        AuthConfig {
            authorize_url: "http://localhost/authorize".to_string(),
            token_url: "http://localhost/token".to_string(),
            client_id: "cid".to_string(),
            client_secret: "secret".to_string(),
            redirect_uri: "http://localhost:3000".to_string(),
        },
        Duration::from_secs(60),
        Some(Credential {
            access_token: "tok".to_string(),
            refresh_token: "ref".to_string(),
            expires_at: i64::MAX,
            scopes: vec!["user:read:chat".to_string()],
        }),
    ))
}

fn session_config(url: String, backoff: BackoffPolicy) -> SessionConfig {
    SessionConfig {
        url,
        broadcaster_id: "12".to_string(),
        user_id: "34".to_string(),
        kinds: vec![EventKind::ChatMessage],
        welcome_timeout: Duration::from_secs(2),
        keepalive_grace_percent: 20,
        backoff,
    }
}

fn harness(url: String, backoff: BackoffPolicy) -> Harness {
    let tokens = token_manager();
    let api = Arc::new(RecordingApi::default());
    let sink = Arc::new(RecordingSink::default());
    let store = Arc::new(SqliteEventStore::in_memory().unwrap());
    let registry = SubscriptionRegistry::new(api.clone(), tokens.clone());
    let dispatcher =
        EventDispatcher::new(Duration::from_secs(120), store.clone(), sink.clone());
    let session = EventSubSession::new(
        session_config(url, backoff),
        tokens,
        registry,
        dispatcher,
    );
    Harness {
        session,
        api,
        sink,
        store,
    }
}

async fn drain_until_closed(mut ws: WebSocketStream<TcpStream>) {
    while let Some(Ok(message)) = ws.next().await {
        if matches!(message, Message::Close(_)) {
            break;
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn delivers_subscribes_and_dedups() {
    let (listener, url) = ws_listener().await;
    let server = tokio::spawn(async move {
        let mut ws = accept_ws(&listener).await;
        ws.send(welcome("sess-a", 30)).await.unwrap();
        ws.send(chat_notification("abc", "hello")).await.unwrap();
        ws.send(chat_notification("abc", "hello")).await.unwrap();
        ws.send(chat_notification("def", "again")).await.unwrap();
        drain_until_closed(ws).await;
    });

    let Harness {
        mut session,
        api,
        sink,
        store,
    } = harness(url, BackoffPolicy::default());
    let cancel = session.cancellation_token();
    let mut status = session.status();
    let runner = tokio::spawn(async move { session.run().await });

    // Wait for the session to come up and deliveries to land.
    while *status.borrow() != SessionStatus::Active {
        status.changed().await.unwrap();
    }
    tokio::time::sleep(Duration::from_millis(300)).await;

    cancel.cancel();
    runner.await.unwrap().unwrap();
    server.await.unwrap();

    assert_eq!(
        api.created.lock().as_slice(),
        &[("sess-a".to_string(), EventKind::ChatMessage)]
    );
    // The duplicate "abc" delivery reaches neither the store nor the sink.
    assert_eq!(sink.chat_messages.lock().as_slice(), &["hello", "again"]);
    assert_eq!(store.count(EventKind::ChatMessage).unwrap(), 2);
}

#[tokio::test]
async fn migrates_on_reconnect_frame_and_resubscribes() {
    let (old_listener, old_url) = ws_listener().await;
    let (new_listener, new_url) = ws_listener().await;

    let reconnect_msg = reconnect(&new_url);
    let (stale_tx, stale_rx) = tokio::sync::oneshot::channel::<()>();
    let old_server = tokio::spawn(async move {
        let mut ws = accept_ws(&old_listener).await;
        ws.send(welcome("sess-old", 30)).await.unwrap();
        ws.send(reconnect_msg).await.unwrap();
        // Still delivering while the replacement handshake runs.
        ws.send(chat_notification("mid-flight", "during migration"))
            .await
            .unwrap();
        // After the test observes cut-over, push one more frame down the
        // superseded connection. The client has dropped it, so the send may
        // fail, and the frame must not be dispatched either way.
        let _ = stale_rx.await;
        let _ = ws.send(chat_notification("stale", "after cut-over")).await;
        drain_until_closed(ws).await;
    });

    let new_server = tokio::spawn(async move {
        let mut ws = accept_ws(&new_listener).await;
        // Delay the welcome so the old connection's tail gets drained.
        tokio::time::sleep(Duration::from_millis(200)).await;
        ws.send(welcome("sess-new", 30)).await.unwrap();
        ws.send(chat_notification("post-migration", "fresh session"))
            .await
            .unwrap();
        drain_until_closed(ws).await;
    });

    let Harness {
        mut session,
        api,
        sink,
        store,
    } = harness(old_url, BackoffPolicy::default());
    let cancel = session.cancellation_token();
    let mut status = session.status();
    let runner = tokio::spawn(async move { session.run().await });

    // Active on the old session, then Reconnecting, then Active again.
    let mut saw_reconnecting = false;
    let mut active_count = 0;
    while active_count < 2 {
        status.changed().await.unwrap();
        match *status.borrow() {
            SessionStatus::Reconnecting => saw_reconnecting = true,
            SessionStatus::Active => active_count += 1,
            _ => {}
        }
    }
    // Cut-over done; anything the old server sends now must be discarded.
    stale_tx.send(()).unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    cancel.cancel();
    runner.await.unwrap().unwrap();
    old_server.await.unwrap();
    new_server.await.unwrap();

    assert!(saw_reconnecting);
    let created = api.created.lock();
    assert_eq!(
        created.as_slice(),
        &[
            ("sess-old".to_string(), EventKind::ChatMessage),
            ("sess-new".to_string(), EventKind::ChatMessage),
        ]
    );
    // Both the mid-migration and the post-migration deliveries landed, and
    // the frame sent on the old connection after cut-over reached nothing.
    assert_eq!(
        sink.chat_messages.lock().as_slice(),
        &["during migration", "fresh session"]
    );
    assert_eq!(store.count(EventKind::ChatMessage).unwrap(), 2);
}

#[tokio::test]
async fn revocation_during_migration_updates_registry_and_sink() {
    let (old_listener, old_url) = ws_listener().await;
    let (new_listener, new_url) = ws_listener().await;

    let reconnect_msg = reconnect(&new_url);
    let old_server = tokio::spawn(async move {
        let mut ws = accept_ws(&old_listener).await;
        ws.send(welcome("sess-old", 30)).await.unwrap();
        ws.send(reconnect_msg).await.unwrap();
        // The recording API names its first subscription "sub-0".
        ws.send(revocation("sub-0")).await.unwrap();
        drain_until_closed(ws).await;
    });
    let new_server = tokio::spawn(async move {
        let mut ws = accept_ws(&new_listener).await;
        tokio::time::sleep(Duration::from_millis(200)).await;
        ws.send(welcome("sess-new", 30)).await.unwrap();
        drain_until_closed(ws).await;
    });

    let Harness {
        mut session,
        api,
        sink,
        ..
    } = harness(old_url, BackoffPolicy::default());
    let cancel = session.cancellation_token();
    let mut status = session.status();
    let runner = tokio::spawn(async move { session.run().await });

    let mut active_count = 0;
    while active_count < 2 {
        status.changed().await.unwrap();
        if *status.borrow() == SessionStatus::Active {
            active_count += 1;
        }
    }

    cancel.cancel();
    runner.await.unwrap().unwrap();
    old_server.await.unwrap();
    new_server.await.unwrap();

    assert_eq!(
        sink.revocations.lock().as_slice(),
        &[(EventKind::ChatMessage, "sub-0".to_string())]
    );
    // The revoked subscription is not re-issued against the new session.
    assert_eq!(
        api.created.lock().as_slice(),
        &[("sess-old".to_string(), EventKind::ChatMessage)]
    );
}

#[tokio::test]
async fn subscription_failures_are_reported_to_the_sink() {
    let (listener, url) = ws_listener().await;
    let server = tokio::spawn(async move {
        let mut ws = accept_ws(&listener).await;
        ws.send(welcome("sess-a", 30)).await.unwrap();
        drain_until_closed(ws).await;
    });

    let tokens = token_manager();
    let sink = Arc::new(RecordingSink::default());
    let store = Arc::new(SqliteEventStore::in_memory().unwrap());
    let registry = SubscriptionRegistry::new(Arc::new(FailingApi), tokens.clone());
    let dispatcher =
        EventDispatcher::new(Duration::from_secs(120), store, sink.clone());
    let mut session = EventSubSession::new(
        session_config(url, BackoffPolicy::default()),
        tokens,
        registry,
        dispatcher,
    );
    let cancel = session.cancellation_token();
    let mut status = session.status();
    let runner = tokio::spawn(async move {
        let result = session.run().await;
        (session, result)
    });

    // Failed registrations do not take the session down.
    while *status.borrow() != SessionStatus::Active {
        status.changed().await.unwrap();
    }
    cancel.cancel();
    let (session, result) = runner.await.unwrap();
    result.unwrap();
    server.await.unwrap();

    let failures = sink.failures.lock();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].0, EventKind::ChatMessage);
    assert!(failures[0].1.contains("subscription service unavailable"));

    // The failed entry stays visible, still pending.
    let subs = session.subscriptions();
    assert_eq!(subs.len(), 1);
    assert_eq!(subs[0].status, SubscriptionStatus::Pending);
    assert_eq!(subs[0].id, None);
}

#[tokio::test]
async fn connecting_is_observable_while_the_server_withholds_the_handshake() {
    let (listener, url) = ws_listener().await;
    let server = tokio::spawn(async move {
        // The TCP backlog accepts the client, but the upgrade response only
        // happens at accept time, so the client sits in its dial phase.
        tokio::time::sleep(Duration::from_millis(300)).await;
        let mut ws = accept_ws(&listener).await;
        ws.send(welcome("sess-a", 30)).await.unwrap();
        drain_until_closed(ws).await;
    });

    let Harness { mut session, .. } = harness(url, BackoffPolicy::default());
    let cancel = session.cancellation_token();
    let status = session.status();
    let runner = tokio::spawn(async move { session.run().await });

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(*status.borrow(), SessionStatus::Connecting);

    let mut status = status;
    while *status.borrow() != SessionStatus::Active {
        status.changed().await.unwrap();
    }
    cancel.cancel();
    runner.await.unwrap().unwrap();
    server.await.unwrap();
}

#[tokio::test]
async fn keepalive_silence_forces_a_reconnect() {
    let (listener, url) = ws_listener().await;
    let connections = Arc::new(AtomicU32::new(0));
    let server_connections = connections.clone();
    let server = tokio::spawn(async move {
        // First connection goes silent after the welcome.
        let mut ws = accept_ws(&listener).await;
        server_connections.fetch_add(1, Ordering::SeqCst);
        ws.send(welcome("sess-1", 1)).await.unwrap();

        // The client times out and dials again.
        let mut ws2 = accept_ws(&listener).await;
        server_connections.fetch_add(1, Ordering::SeqCst);
        ws2.send(welcome("sess-2", 30)).await.unwrap();
        drain_until_closed(ws2).await;
        drop(ws);
    });

    let backoff = BackoffPolicy::new(
        Duration::from_millis(50),
        Duration::from_millis(100),
        5,
        0.0,
    );
    let Harness {
        mut session, api, ..
    } = harness(url, backoff);
    let cancel = session.cancellation_token();
    let mut status = session.status();
    let runner = tokio::spawn(async move { session.run().await });

    // Welcome advertises 1s keepalive; with 20% grace the timeout fires at
    // 1.2s of silence and the session reconnects.
    let mut active_count = 0;
    while active_count < 2 {
        status.changed().await.unwrap();
        if *status.borrow() == SessionStatus::Active {
            active_count += 1;
        }
    }

    cancel.cancel();
    runner.await.unwrap().unwrap();
    server.await.unwrap();

    assert_eq!(connections.load(Ordering::SeqCst), 2);
    let created = api.created.lock();
    assert_eq!(created[0].0, "sess-1");
    assert_eq!(created[1].0, "sess-2");
}

#[tokio::test]
async fn revocation_marks_registry_and_notifies_sink() {
    let (listener, url) = ws_listener().await;
    let server = tokio::spawn(async move {
        let mut ws = accept_ws(&listener).await;
        ws.send(welcome("sess-a", 30)).await.unwrap();
        // The recording API names its first subscription "sub-0".
        ws.send(revocation("sub-0")).await.unwrap();
        drain_until_closed(ws).await;
    });

    let Harness {
        mut session, sink, ..
    } = harness(url, BackoffPolicy::default());
    let cancel = session.cancellation_token();
    let mut status = session.status();
    let runner = tokio::spawn(async move { session.run().await });

    while *status.borrow() != SessionStatus::Active {
        status.changed().await.unwrap();
    }
    tokio::time::sleep(Duration::from_millis(300)).await;

    cancel.cancel();
    runner.await.unwrap().unwrap();
    server.await.unwrap();

    assert_eq!(
        sink.revocations.lock().as_slice(),
        &[(EventKind::ChatMessage, "sub-0".to_string())]
    );
}

#[tokio::test]
async fn cancel_stops_a_running_session_cleanly() {
    let (listener, url) = ws_listener().await;
    let server = tokio::spawn(async move {
        let ws = {
            let mut ws = accept_ws(&listener).await;
            ws.send(welcome("sess-a", 30)).await.unwrap();
            ws
        };
        drain_until_closed(ws).await;
    });

    let Harness { mut session, .. } = harness(url, BackoffPolicy::default());
    let cancel = session.cancellation_token();
    let mut status = session.status();
    let runner = tokio::spawn(async move { session.run().await });

    while *status.borrow() != SessionStatus::Active {
        status.changed().await.unwrap();
    }
    cancel.cancel();
    runner.await.unwrap().unwrap();
    assert_eq!(*status.borrow(), SessionStatus::Closed);
    server.await.unwrap();
}

#[tokio::test]
async fn gives_up_after_exhausting_reconnect_attempts() {
    // Nothing listens on this address after the listener is dropped.
    let (listener, url) = ws_listener().await;
    drop(listener);

    let backoff = BackoffPolicy::new(
        Duration::from_millis(10),
        Duration::from_millis(20),
        3,
        0.0,
    );
    let Harness { mut session, .. } = harness(url, backoff);
    let mut status = session.status();
    let err = session.run().await.unwrap_err();

    assert!(matches!(
        err,
        wisp_eventsub::errors::SessionError::Failed { attempts: 3 }
    ));
    assert_eq!(*status.borrow(), SessionStatus::Failed);
}
