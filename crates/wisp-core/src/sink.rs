//! The handler interface.
//!
//! Implementors override the callbacks they care about; every method has a
//! no-op default, so a sink that only reacts to chat messages implements one
//! method. The provided [`EventSink::on_event`] routes a decoded record to
//! the per-kind callback and does not normally need overriding.

use async_trait::async_trait;

use crate::kinds::EventKind;
use crate::records::{
    Ban, ChatMessage, Cheer, Event, EventRecord, Follow, Poll, Prediction, Raid,
    RewardRedemption, StreamOffline, StreamOnline, Subscribe, SubscriptionEnd, SubscriptionGift,
    SubscriptionMessage, Unban, VipChange,
};

/// User-defined reactions to incoming notifications.
///
/// Callbacks run on the session's dispatch path, one at a time, in arrival
/// order. A slow callback delays subsequent notifications; spawn work that
/// should not block delivery.
#[allow(unused_variables)]
#[async_trait]
pub trait EventSink: Send + Sync {
    /// A chat message arrived.
    async fn on_chat_message(&self, event: &ChatMessage) {}
    /// Someone followed.
    async fn on_follow(&self, event: &Follow) {}
    /// Someone subscribed.
    async fn on_subscribe(&self, event: &Subscribe) {}
    /// A subscription lapsed.
    async fn on_subscription_end(&self, event: &SubscriptionEnd) {}
    /// Someone gifted subscriptions.
    async fn on_subscription_gift(&self, event: &SubscriptionGift) {}
    /// A resub announcement.
    async fn on_subscription_message(&self, event: &SubscriptionMessage) {}
    /// An incoming raid.
    async fn on_raid(&self, event: &Raid) {}
    /// A viewer was banned or timed out.
    async fn on_ban(&self, event: &Ban) {}
    /// A ban was lifted.
    async fn on_unban(&self, event: &Unban) {}
    /// Bits were cheered.
    async fn on_cheer(&self, event: &Cheer) {}
    /// A channel-points reward was redeemed.
    async fn on_reward_redemption(&self, event: &RewardRedemption) {}
    /// A poll opened.
    async fn on_poll_begin(&self, event: &Poll) {}
    /// A poll closed.
    async fn on_poll_end(&self, event: &Poll) {}
    /// A prediction opened.
    async fn on_prediction_begin(&self, event: &Prediction) {}
    /// A prediction locked.
    async fn on_prediction_lock(&self, event: &Prediction) {}
    /// A prediction resolved or was canceled.
    async fn on_prediction_end(&self, event: &Prediction) {}
    /// A user became VIP.
    async fn on_vip_add(&self, event: &VipChange) {}
    /// A user lost VIP.
    async fn on_vip_remove(&self, event: &VipChange) {}
    /// The channel went live.
    async fn on_stream_online(&self, event: &StreamOnline) {}
    /// The channel went offline.
    async fn on_stream_offline(&self, event: &StreamOffline) {}

    /// The service revoked a subscription (authorization withdrawn, user
    /// gone, or the version was retired). Informational: the subscription is
    /// not recreated.
    async fn on_revocation(&self, kind: EventKind, subscription_id: &str, status: &str) {}

    /// Registering one subscription failed, after retries. The session stays
    /// up; the named kind simply produces no events until a later
    /// resubscription succeeds.
    async fn on_subscription_failure(
        &self,
        kind: EventKind,
        condition: &std::collections::BTreeMap<String, String>,
        reason: &str,
    ) {
    }

    /// Route a decoded record to its per-kind callback.
    async fn on_event(&self, record: &EventRecord) {
        match &record.event {
            Event::ChatMessage(e) => self.on_chat_message(e).await,
            Event::Follow(e) => self.on_follow(e).await,
            Event::Subscribe(e) => self.on_subscribe(e).await,
            Event::SubscriptionEnd(e) => self.on_subscription_end(e).await,
            Event::SubscriptionGift(e) => self.on_subscription_gift(e).await,
            Event::SubscriptionMessage(e) => self.on_subscription_message(e).await,
            Event::Raid(e) => self.on_raid(e).await,
            Event::Ban(e) => self.on_ban(e).await,
            Event::Unban(e) => self.on_unban(e).await,
            Event::Cheer(e) => self.on_cheer(e).await,
            Event::RewardRedemption(e) => self.on_reward_redemption(e).await,
            Event::PollBegin(e) => self.on_poll_begin(e).await,
            Event::PollEnd(e) => self.on_poll_end(e).await,
            Event::PredictionBegin(e) => self.on_prediction_begin(e).await,
            Event::PredictionLock(e) => self.on_prediction_lock(e).await,
            Event::PredictionEnd(e) => self.on_prediction_end(e).await,
            Event::VipAdd(e) => self.on_vip_add(e).await,
            Event::VipRemove(e) => self.on_vip_remove(e).await,
            Event::StreamOnline(e) => self.on_stream_online(e).await,
            Event::StreamOffline(e) => self.on_stream_offline(e).await,
        }
    }
}

/// A sink that ignores everything. Useful as a placeholder and in tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

#[async_trait]
impl EventSink for NullSink {}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::MessageText;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSink {
        chat: AtomicUsize,
        other: AtomicUsize,
    }

    #[async_trait]
    impl EventSink for CountingSink {
        async fn on_chat_message(&self, _event: &ChatMessage) {
            let _ = self.chat.fetch_add(1, Ordering::SeqCst);
        }
        async fn on_follow(&self, _event: &Follow) {
            let _ = self.other.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn chat_record() -> EventRecord {
        EventRecord {
            message_id: "m-1".into(),
            received_at: Utc::now(),
            event: Event::ChatMessage(ChatMessage {
                message_id: "chat-1".into(),
                broadcaster_user_id: "123".into(),
                chatter_user_id: "456".into(),
                chatter_user_login: "viewer".into(),
                chatter_user_name: "Viewer".into(),
                message: MessageText {
                    text: "hi".into(),
                },
                color: None,
            }),
        }
    }

    #[tokio::test]
    async fn on_event_routes_to_kind_callback() {
        let sink = CountingSink {
            chat: AtomicUsize::new(0),
            other: AtomicUsize::new(0),
        };
        sink.on_event(&chat_record()).await;
        assert_eq!(sink.chat.load(Ordering::SeqCst), 1);
        assert_eq!(sink.other.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn null_sink_accepts_anything() {
        NullSink.on_event(&chat_record()).await;
        NullSink
            .on_revocation(EventKind::Follow, "sub-1", "authorization_revoked")
            .await;
    }
}
