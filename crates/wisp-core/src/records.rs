//! Typed notification records.
//!
//! [`EventRecord`] is the immutable unit handed to the sink and the writer:
//! the transport message id (stable across redeliveries, so it doubles as the
//! dedup and idempotency key), the arrival timestamp, and one typed payload
//! variant per [`EventKind`].
//!
//! Payload field names match the service's wire JSON so the structs
//! deserialize straight out of a notification's `event` object. Fields the
//! service sometimes omits (anonymous cheers, unscheduled ban ends) are
//! `Option`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::kinds::EventKind;

/// An immutable, decoded notification.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Transport message id. Stable across redeliveries of the same
    /// notification.
    pub message_id: String,
    /// When this process received the frame.
    pub received_at: DateTime<Utc>,
    /// The decoded payload.
    pub event: Event,
}

/// One decoded payload per event kind.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    /// `channel.chat.message`
    #[serde(rename = "channel.chat.message")]
    ChatMessage(ChatMessage),
    /// `channel.follow`
    #[serde(rename = "channel.follow")]
    Follow(Follow),
    /// `channel.subscribe`
    #[serde(rename = "channel.subscribe")]
    Subscribe(Subscribe),
    /// `channel.subscription.end`
    #[serde(rename = "channel.subscription.end")]
    SubscriptionEnd(SubscriptionEnd),
    /// `channel.subscription.gift`
    #[serde(rename = "channel.subscription.gift")]
    SubscriptionGift(SubscriptionGift),
    /// `channel.subscription.message`
    #[serde(rename = "channel.subscription.message")]
    SubscriptionMessage(SubscriptionMessage),
    /// `channel.raid`
    #[serde(rename = "channel.raid")]
    Raid(Raid),
    /// `channel.ban`
    #[serde(rename = "channel.ban")]
    Ban(Ban),
    /// `channel.unban`
    #[serde(rename = "channel.unban")]
    Unban(Unban),
    /// `channel.cheer`
    #[serde(rename = "channel.cheer")]
    Cheer(Cheer),
    /// `channel.channel_points_custom_reward_redemption.add`
    #[serde(rename = "channel.channel_points_custom_reward_redemption.add")]
    RewardRedemption(RewardRedemption),
    /// `channel.poll.begin`
    #[serde(rename = "channel.poll.begin")]
    PollBegin(Poll),
    /// `channel.poll.end`
    #[serde(rename = "channel.poll.end")]
    PollEnd(Poll),
    /// `channel.prediction.begin`
    #[serde(rename = "channel.prediction.begin")]
    PredictionBegin(Prediction),
    /// `channel.prediction.lock`
    #[serde(rename = "channel.prediction.lock")]
    PredictionLock(Prediction),
    /// `channel.prediction.end`
    #[serde(rename = "channel.prediction.end")]
    PredictionEnd(Prediction),
    /// `channel.vip.add`
    #[serde(rename = "channel.vip.add")]
    VipAdd(VipChange),
    /// `channel.vip.remove`
    #[serde(rename = "channel.vip.remove")]
    VipRemove(VipChange),
    /// `stream.online`
    #[serde(rename = "stream.online")]
    StreamOnline(StreamOnline),
    /// `stream.offline`
    #[serde(rename = "stream.offline")]
    StreamOffline(StreamOffline),
}

impl Event {
    /// Decode a notification's `event` object for the given kind.
    pub fn decode(kind: EventKind, payload: Value) -> Result<Event, serde_json::Error> {
        Ok(match kind {
            EventKind::ChatMessage => Event::ChatMessage(serde_json::from_value(payload)?),
            EventKind::Follow => Event::Follow(serde_json::from_value(payload)?),
            EventKind::Subscribe => Event::Subscribe(serde_json::from_value(payload)?),
            EventKind::SubscriptionEnd => Event::SubscriptionEnd(serde_json::from_value(payload)?),
            EventKind::SubscriptionGift => {
                Event::SubscriptionGift(serde_json::from_value(payload)?)
            }
            EventKind::SubscriptionMessage => {
                Event::SubscriptionMessage(serde_json::from_value(payload)?)
            }
            EventKind::Raid => Event::Raid(serde_json::from_value(payload)?),
            EventKind::Ban => Event::Ban(serde_json::from_value(payload)?),
            EventKind::Unban => Event::Unban(serde_json::from_value(payload)?),
            EventKind::Cheer => Event::Cheer(serde_json::from_value(payload)?),
            EventKind::RewardRedemption => {
                Event::RewardRedemption(serde_json::from_value(payload)?)
            }
            EventKind::PollBegin => Event::PollBegin(serde_json::from_value(payload)?),
            EventKind::PollEnd => Event::PollEnd(serde_json::from_value(payload)?),
            EventKind::PredictionBegin => {
                Event::PredictionBegin(serde_json::from_value(payload)?)
            }
            EventKind::PredictionLock => Event::PredictionLock(serde_json::from_value(payload)?),
            EventKind::PredictionEnd => Event::PredictionEnd(serde_json::from_value(payload)?),
            EventKind::VipAdd => Event::VipAdd(serde_json::from_value(payload)?),
            EventKind::VipRemove => Event::VipRemove(serde_json::from_value(payload)?),
            EventKind::StreamOnline => Event::StreamOnline(serde_json::from_value(payload)?),
            EventKind::StreamOffline => Event::StreamOffline(serde_json::from_value(payload)?),
        })
    }

    /// The kind this payload belongs to.
    pub fn kind(&self) -> EventKind {
        match self {
            Event::ChatMessage(_) => EventKind::ChatMessage,
            Event::Follow(_) => EventKind::Follow,
            Event::Subscribe(_) => EventKind::Subscribe,
            Event::SubscriptionEnd(_) => EventKind::SubscriptionEnd,
            Event::SubscriptionGift(_) => EventKind::SubscriptionGift,
            Event::SubscriptionMessage(_) => EventKind::SubscriptionMessage,
            Event::Raid(_) => EventKind::Raid,
            Event::Ban(_) => EventKind::Ban,
            Event::Unban(_) => EventKind::Unban,
            Event::Cheer(_) => EventKind::Cheer,
            Event::RewardRedemption(_) => EventKind::RewardRedemption,
            Event::PollBegin(_) => EventKind::PollBegin,
            Event::PollEnd(_) => EventKind::PollEnd,
            Event::PredictionBegin(_) => EventKind::PredictionBegin,
            Event::PredictionLock(_) => EventKind::PredictionLock,
            Event::PredictionEnd(_) => EventKind::PredictionEnd,
            Event::VipAdd(_) => EventKind::VipAdd,
            Event::VipRemove(_) => EventKind::VipRemove,
            Event::StreamOnline(_) => EventKind::StreamOnline,
            Event::StreamOffline(_) => EventKind::StreamOffline,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Payloads
// ─────────────────────────────────────────────────────────────────────────────

/// Chat message text. The service nests the text under a `message` object;
/// fragments (emotes, mentions) are not modeled.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MessageText {
    /// Plain message text.
    pub text: String,
}

/// `channel.chat.message` payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Chat-level message id (distinct from the transport message id).
    pub message_id: String,
    /// Channel the message was sent in.
    pub broadcaster_user_id: String,
    /// Sender's user id.
    pub chatter_user_id: String,
    /// Sender's login name.
    pub chatter_user_login: String,
    /// Sender's display name.
    pub chatter_user_name: String,
    /// Message body.
    pub message: MessageText,
    /// Sender's name color, when set.
    #[serde(default)]
    pub color: Option<String>,
}

/// `channel.follow` payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Follow {
    /// Follower's user id.
    pub user_id: String,
    /// Follower's login name.
    pub user_login: String,
    /// Follower's display name.
    pub user_name: String,
    /// Channel that was followed.
    pub broadcaster_user_id: String,
    /// When the follow happened (RFC 3339).
    pub followed_at: String,
}

/// `channel.subscribe` payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Subscribe {
    /// Subscriber's user id.
    pub user_id: String,
    /// Subscriber's display name.
    pub user_name: String,
    /// Channel subscribed to.
    pub broadcaster_user_id: String,
    /// Subscription tier (`1000`, `2000`, `3000`).
    pub tier: String,
    /// Whether this subscription was a gift.
    pub is_gift: bool,
}

/// `channel.subscription.end` payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionEnd {
    /// User whose subscription ended.
    pub user_id: String,
    /// Their display name.
    pub user_name: String,
    /// Channel.
    pub broadcaster_user_id: String,
    /// Tier the lapsed subscription was at.
    pub tier: String,
    /// Whether it had been gifted.
    pub is_gift: bool,
}

/// `channel.subscription.gift` payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionGift {
    /// Gifter's user id. `None` for anonymous gifts.
    #[serde(default)]
    pub user_id: Option<String>,
    /// Gifter's display name. `None` for anonymous gifts.
    #[serde(default)]
    pub user_name: Option<String>,
    /// Channel.
    pub broadcaster_user_id: String,
    /// Number of subscriptions in this gift.
    pub total: i64,
    /// Tier gifted.
    pub tier: String,
    /// Gifter's lifetime gift count, when disclosed.
    #[serde(default)]
    pub cumulative_total: Option<i64>,
    /// Whether the gifter chose to stay anonymous.
    pub is_anonymous: bool,
}

/// `channel.subscription.message` (resub announcement) payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionMessage {
    /// Subscriber's user id.
    pub user_id: String,
    /// Subscriber's display name.
    pub user_name: String,
    /// Channel.
    pub broadcaster_user_id: String,
    /// Tier.
    pub tier: String,
    /// Attached chat message.
    pub message: MessageText,
    /// Total months subscribed.
    pub cumulative_months: i64,
    /// Current streak, if the user shares it.
    #[serde(default)]
    pub streak_months: Option<i64>,
    /// Months covered by this resub.
    pub duration_months: i64,
}

/// `channel.raid` payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Raid {
    /// Raiding channel's user id.
    pub from_broadcaster_user_id: String,
    /// Raiding channel's display name.
    pub from_broadcaster_user_name: String,
    /// Raided channel's user id.
    pub to_broadcaster_user_id: String,
    /// Viewers brought along.
    pub viewers: i64,
}

/// `channel.ban` payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Ban {
    /// Banned user's id.
    pub user_id: String,
    /// Banned user's display name.
    pub user_name: String,
    /// Channel.
    pub broadcaster_user_id: String,
    /// Moderator who issued the ban.
    pub moderator_user_id: String,
    /// Stated reason.
    pub reason: String,
    /// When the ban was issued (RFC 3339).
    pub banned_at: String,
    /// When a timeout expires. `None` for permanent bans.
    #[serde(default)]
    pub ends_at: Option<String>,
    /// Whether the ban is permanent.
    pub is_permanent: bool,
}

/// `channel.unban` payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Unban {
    /// Unbanned user's id.
    pub user_id: String,
    /// Unbanned user's display name.
    pub user_name: String,
    /// Channel.
    pub broadcaster_user_id: String,
    /// Moderator who lifted the ban.
    pub moderator_user_id: String,
}

/// `channel.cheer` payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Cheer {
    /// Whether the cheer was anonymous.
    pub is_anonymous: bool,
    /// Cheerer's user id. `None` when anonymous.
    #[serde(default)]
    pub user_id: Option<String>,
    /// Cheerer's display name. `None` when anonymous.
    #[serde(default)]
    pub user_name: Option<String>,
    /// Channel.
    pub broadcaster_user_id: String,
    /// Message sent with the cheer.
    pub message: String,
    /// Bits cheered.
    pub bits: i64,
}

/// The reward side of a redemption.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Reward {
    /// Reward id.
    pub id: String,
    /// Reward title.
    pub title: String,
    /// Point cost.
    pub cost: i64,
    /// Prompt shown to the redeemer.
    #[serde(default)]
    pub prompt: String,
}

/// `channel.channel_points_custom_reward_redemption.add` payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RewardRedemption {
    /// Redemption id.
    pub id: String,
    /// Redeemer's user id.
    pub user_id: String,
    /// Redeemer's display name.
    pub user_name: String,
    /// Channel.
    pub broadcaster_user_id: String,
    /// Text the redeemer entered, when the reward asks for input.
    #[serde(default)]
    pub user_input: String,
    /// Redemption status (`unfulfilled`, `fulfilled`, `canceled`).
    pub status: String,
    /// The redeemed reward.
    pub reward: Reward,
    /// When the redemption happened (RFC 3339).
    pub redeemed_at: String,
}

/// One poll choice. Vote counts are absent until the poll ends.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PollChoice {
    /// Choice id.
    pub id: String,
    /// Choice title.
    pub title: String,
    /// Votes cast, present on `channel.poll.end`.
    #[serde(default)]
    pub votes: Option<i64>,
}

/// `channel.poll.begin` / `channel.poll.end` payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Poll {
    /// Poll id.
    pub id: String,
    /// Channel.
    pub broadcaster_user_id: String,
    /// Poll title.
    pub title: String,
    /// Choices.
    pub choices: Vec<PollChoice>,
    /// When the poll started (RFC 3339).
    pub started_at: String,
    /// Scheduled end, present on begin.
    #[serde(default)]
    pub ends_at: Option<String>,
    /// Terminal status (`completed`, `archived`, `terminated`), present on end.
    #[serde(default)]
    pub status: Option<String>,
}

/// One prediction outcome. Participation totals are absent until lock.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PredictionOutcome {
    /// Outcome id.
    pub id: String,
    /// Outcome title.
    pub title: String,
    /// Outcome color.
    pub color: String,
    /// Participating users, present from lock onward.
    #[serde(default)]
    pub users: Option<i64>,
    /// Points wagered, present from lock onward.
    #[serde(default)]
    pub channel_points: Option<i64>,
}

/// `channel.prediction.begin` / `.lock` / `.end` payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Prediction id.
    pub id: String,
    /// Channel.
    pub broadcaster_user_id: String,
    /// Prediction title.
    pub title: String,
    /// Outcomes.
    pub outcomes: Vec<PredictionOutcome>,
    /// When the prediction opened (RFC 3339).
    pub started_at: String,
    /// Scheduled lock time, present on begin.
    #[serde(default)]
    pub locks_at: Option<String>,
    /// Winning outcome, present on end when resolved (absent when canceled).
    #[serde(default)]
    pub winning_outcome_id: Option<String>,
    /// Terminal status (`resolved`, `canceled`), present on end.
    #[serde(default)]
    pub status: Option<String>,
}

/// `channel.vip.add` / `channel.vip.remove` payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VipChange {
    /// Affected user's id.
    pub user_id: String,
    /// Affected user's display name.
    pub user_name: String,
    /// Channel.
    pub broadcaster_user_id: String,
}

/// `stream.online` payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StreamOnline {
    /// Stream id.
    pub id: String,
    /// Channel that went live.
    pub broadcaster_user_id: String,
    /// Stream type (`live`, `playlist`, ...).
    #[serde(rename = "type")]
    pub stream_type: String,
    /// When the stream started (RFC 3339).
    pub started_at: String,
}

/// `stream.offline` payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StreamOffline {
    /// Channel that went offline.
    pub broadcaster_user_id: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
