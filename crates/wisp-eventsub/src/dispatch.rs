//! Notification dispatch.
//!
//! One notification travels dedup → decode → persist → callback, in that
//! order. Persistence runs before the sink so a crash mid-callback never
//! loses a delivered event, and a failed write suppresses the callback
//! rather than handing the sink an event the store never saw.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, error, warn};

use wisp_core::{Event, EventKind, EventRecord, EventSink, EventWriter};

use crate::dedup::DedupCache;
use crate::wire::Frame;

/// Routes notification frames to persistence and the sink.
pub struct EventDispatcher {
    dedup: DedupCache,
    writer: Arc<dyn EventWriter>,
    sink: Arc<dyn EventSink>,
}

impl EventDispatcher {
    /// A dispatcher with a dedup window of `dedup_window`.
    pub fn new(
        dedup_window: Duration,
        writer: Arc<dyn EventWriter>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            dedup: DedupCache::new(dedup_window),
            writer,
            sink,
        }
    }

    /// Dispatch one notification frame. Non-notification frames are ignored.
    pub async fn dispatch(&mut self, frame: &Frame) {
        let Frame::Notification {
            metadata,
            kind,
            kind_raw,
            event,
            ..
        } = frame
        else {
            return;
        };

        if !self.dedup.observe(&metadata.message_id) {
            debug!(message_id = %metadata.message_id, "duplicate delivery ignored");
            return;
        }

        let Some(kind) = kind else {
            warn!(kind = %kind_raw, "notification for unrecognized kind ignored");
            return;
        };

        let decoded = match Event::decode(*kind, event.clone()) {
            Ok(decoded) => decoded,
            Err(e) => {
                warn!(kind = %kind, error = %e, "undecodable event payload ignored");
                return;
            }
        };

        let record = EventRecord {
            message_id: metadata.message_id.clone(),
            received_at: parse_timestamp(&metadata.message_timestamp),
            event: decoded,
        };

        if let Err(e) = self.writer.upsert(&record) {
            error!(kind = %kind, error = %e, "event write failed, callback suppressed");
            return;
        }

        self.sink.on_event(&record).await;
    }

    /// Report failed subscription registrations to the sink.
    pub async fn dispatch_subscription_failures(
        &self,
        errors: &[crate::errors::SubscriptionError],
    ) {
        for error in errors {
            warn!(kind = %error.kind, error = %error, "subscription not established");
            self.sink
                .on_subscription_failure(
                    error.kind,
                    &error.condition,
                    &error.source.to_string(),
                )
                .await;
        }
    }

    /// Forward a revocation to the sink.
    pub async fn dispatch_revocation(
        &self,
        kind: Option<EventKind>,
        kind_raw: &str,
        subscription_id: &str,
        status: &str,
    ) {
        match kind {
            Some(kind) => self.sink.on_revocation(kind, subscription_id, status).await,
            None => warn!(kind = %kind_raw, status, "revocation for unrecognized kind"),
        }
    }
}

fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};
    use wisp_core::records::ChatMessage;

    #[derive(Default)]
    struct RecordingSink {
        chat: AtomicU32,
        revoked: Mutex<Vec<(EventKind, String)>>,
    }

    #[async_trait]
    impl EventSink for RecordingSink {
        async fn on_chat_message(&self, _event: &ChatMessage) {
            self.chat.fetch_add(1, Ordering::SeqCst);
        }

        async fn on_revocation(&self, kind: EventKind, subscription_id: &str, _status: &str) {
            if let Ok(mut revoked) = self.revoked.lock() {
                revoked.push((kind, subscription_id.to_string()));
            }
        }
    }

    #[derive(Default)]
    struct CountingWriter {
        writes: AtomicU32,
        fail: bool,
    }

    impl EventWriter for CountingWriter {
        fn upsert(&self, _record: &EventRecord) -> Result<(), wisp_core::WriteError> {
            if self.fail {
                return Err(wisp_core::WriteError(Box::new(std::io::Error::other(
                    "disk full",
                ))));
            }
            self.writes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn chat_frame(message_id: &str) -> Frame {
        let text = serde_json::json!({
            "metadata": {
                "message_id": message_id,
                "message_type": "notification",
                "message_timestamp": "2025-06-01T12:00:00Z",
            },
            "payload": {
                "subscription": { "id": "sub-1", "type": "channel.chat.message" },
                "event": {
                    "broadcaster_user_id": "12",
                    "broadcaster_user_login": "moose",
                    "broadcaster_user_name": "Moose",
                    "chatter_user_id": "34",
                    "chatter_user_login": "viewer",
                    "chatter_user_name": "Viewer",
                    "message_id": "chat-1",
                    "message": { "text": "hello" },
                },
            },
        })
        .to_string();
        Frame::parse(&text).unwrap()
    }

    fn dispatcher(
        writer: Arc<CountingWriter>,
        sink: Arc<RecordingSink>,
    ) -> EventDispatcher {
        EventDispatcher::new(Duration::from_secs(120), writer, sink)
    }

    #[tokio::test]
    async fn delivers_once_per_message_id() {
        let writer = Arc::new(CountingWriter::default());
        let sink = Arc::new(RecordingSink::default());
        let mut dispatcher = dispatcher(writer.clone(), sink.clone());

        dispatcher.dispatch(&chat_frame("abc")).await;
        dispatcher.dispatch(&chat_frame("abc")).await;

        assert_eq!(writer.writes.load(Ordering::SeqCst), 1);
        assert_eq!(sink.chat.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn distinct_ids_both_deliver() {
        let writer = Arc::new(CountingWriter::default());
        let sink = Arc::new(RecordingSink::default());
        let mut dispatcher = dispatcher(writer.clone(), sink.clone());

        dispatcher.dispatch(&chat_frame("abc")).await;
        dispatcher.dispatch(&chat_frame("def")).await;

        assert_eq!(sink.chat.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn write_failure_suppresses_the_callback() {
        let writer = Arc::new(CountingWriter {
            writes: AtomicU32::new(0),
            fail: true,
        });
        let sink = Arc::new(RecordingSink::default());
        let mut dispatcher = dispatcher(writer, sink.clone());

        dispatcher.dispatch(&chat_frame("abc")).await;

        assert_eq!(sink.chat.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unknown_kind_is_skipped_without_write() {
        let text = serde_json::json!({
            "metadata": {
                "message_id": "m1",
                "message_type": "notification",
                "message_timestamp": "2025-06-01T12:00:00Z",
            },
            "payload": {
                "subscription": { "id": "sub-1", "type": "channel.future_thing" },
                "event": {},
            },
        })
        .to_string();
        let frame = Frame::parse(&text).unwrap();

        let writer = Arc::new(CountingWriter::default());
        let sink = Arc::new(RecordingSink::default());
        let mut dispatcher = dispatcher(writer.clone(), sink);

        dispatcher.dispatch(&frame).await;
        assert_eq!(writer.writes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn revocation_reaches_the_sink() {
        let writer = Arc::new(CountingWriter::default());
        let sink = Arc::new(RecordingSink::default());
        let dispatcher = dispatcher(writer, sink.clone());

        dispatcher
            .dispatch_revocation(Some(EventKind::Follow), "channel.follow", "sub-9", "user_removed")
            .await;

        let revoked = sink.revoked.lock().unwrap();
        assert_eq!(revoked.as_slice(), &[(EventKind::Follow, "sub-9".to_string())]);
    }
}
