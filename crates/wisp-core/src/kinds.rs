//! The catalogue of subscribable event kinds.
//!
//! Each kind carries everything needed to register it with the service:
//! the wire name, the subscription version, the condition template (which
//! identity goes under which filter key), and the OAuth scopes the
//! authorizing user must have granted.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A subscribable event kind.
///
/// Serializes to the service's dotted wire name (`channel.follow`,
/// `stream.online`, ...).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// A chat message in the broadcaster's channel.
    #[serde(rename = "channel.chat.message")]
    ChatMessage,
    /// A user followed the channel.
    #[serde(rename = "channel.follow")]
    Follow,
    /// A user subscribed (paid or gifted, not a resub message).
    #[serde(rename = "channel.subscribe")]
    Subscribe,
    /// A subscription ended.
    #[serde(rename = "channel.subscription.end")]
    SubscriptionEnd,
    /// A user gifted one or more subscriptions.
    #[serde(rename = "channel.subscription.gift")]
    SubscriptionGift,
    /// A resubscription with an attached chat message.
    #[serde(rename = "channel.subscription.message")]
    SubscriptionMessage,
    /// Another channel raided the broadcaster.
    #[serde(rename = "channel.raid")]
    Raid,
    /// A viewer was banned.
    #[serde(rename = "channel.ban")]
    Ban,
    /// A viewer's ban was lifted.
    #[serde(rename = "channel.unban")]
    Unban,
    /// A user cheered bits.
    #[serde(rename = "channel.cheer")]
    Cheer,
    /// A channel-points custom reward was redeemed.
    #[serde(rename = "channel.channel_points_custom_reward_redemption.add")]
    RewardRedemption,
    /// A poll started.
    #[serde(rename = "channel.poll.begin")]
    PollBegin,
    /// A poll ended.
    #[serde(rename = "channel.poll.end")]
    PollEnd,
    /// A prediction started.
    #[serde(rename = "channel.prediction.begin")]
    PredictionBegin,
    /// A prediction locked (no further participation).
    #[serde(rename = "channel.prediction.lock")]
    PredictionLock,
    /// A prediction resolved.
    #[serde(rename = "channel.prediction.end")]
    PredictionEnd,
    /// A user was added as VIP.
    #[serde(rename = "channel.vip.add")]
    VipAdd,
    /// A user's VIP status was removed.
    #[serde(rename = "channel.vip.remove")]
    VipRemove,
    /// The broadcaster went live.
    #[serde(rename = "stream.online")]
    StreamOnline,
    /// The broadcaster went offline.
    #[serde(rename = "stream.offline")]
    StreamOffline,
}

impl EventKind {
    /// All kinds, in catalogue order.
    pub const ALL: [EventKind; 20] = [
        EventKind::ChatMessage,
        EventKind::Follow,
        EventKind::Subscribe,
        EventKind::SubscriptionEnd,
        EventKind::SubscriptionGift,
        EventKind::SubscriptionMessage,
        EventKind::Raid,
        EventKind::Ban,
        EventKind::Unban,
        EventKind::Cheer,
        EventKind::RewardRedemption,
        EventKind::PollBegin,
        EventKind::PollEnd,
        EventKind::PredictionBegin,
        EventKind::PredictionLock,
        EventKind::PredictionEnd,
        EventKind::VipAdd,
        EventKind::VipRemove,
        EventKind::StreamOnline,
        EventKind::StreamOffline,
    ];

    /// The dotted wire name used in subscription requests and notification
    /// metadata.
    pub fn wire_name(self) -> &'static str {
        match self {
            EventKind::ChatMessage => "channel.chat.message",
            EventKind::Follow => "channel.follow",
            EventKind::Subscribe => "channel.subscribe",
            EventKind::SubscriptionEnd => "channel.subscription.end",
            EventKind::SubscriptionGift => "channel.subscription.gift",
            EventKind::SubscriptionMessage => "channel.subscription.message",
            EventKind::Raid => "channel.raid",
            EventKind::Ban => "channel.ban",
            EventKind::Unban => "channel.unban",
            EventKind::Cheer => "channel.cheer",
            EventKind::RewardRedemption => {
                "channel.channel_points_custom_reward_redemption.add"
            }
            EventKind::PollBegin => "channel.poll.begin",
            EventKind::PollEnd => "channel.poll.end",
            EventKind::PredictionBegin => "channel.prediction.begin",
            EventKind::PredictionLock => "channel.prediction.lock",
            EventKind::PredictionEnd => "channel.prediction.end",
            EventKind::VipAdd => "channel.vip.add",
            EventKind::VipRemove => "channel.vip.remove",
            EventKind::StreamOnline => "stream.online",
            EventKind::StreamOffline => "stream.offline",
        }
    }

    /// The subscription version string the service expects for this kind.
    pub fn version(self) -> &'static str {
        match self {
            EventKind::Follow => "2",
            _ => "1",
        }
    }

    /// Build the condition map for this kind.
    ///
    /// `broadcaster_id` is the channel being watched; `user_id` is the
    /// authorizing user (the chat reader for [`EventKind::ChatMessage`], the
    /// moderator for [`EventKind::Follow`]). Keys are ordered, so two
    /// subscriptions to the same kind and identities compare equal.
    pub fn condition(self, broadcaster_id: &str, user_id: &str) -> BTreeMap<String, String> {
        let mut cond = BTreeMap::new();
        match self {
            EventKind::ChatMessage => {
                let _ = cond.insert("broadcaster_user_id".into(), broadcaster_id.into());
                let _ = cond.insert("user_id".into(), user_id.into());
            }
            EventKind::Follow => {
                let _ = cond.insert("broadcaster_user_id".into(), broadcaster_id.into());
                let _ = cond.insert("moderator_user_id".into(), user_id.into());
            }
            EventKind::Raid => {
                let _ = cond.insert("to_broadcaster_user_id".into(), broadcaster_id.into());
            }
            _ => {
                let _ = cond.insert("broadcaster_user_id".into(), broadcaster_id.into());
            }
        }
        cond
    }

    /// OAuth scopes the authorizing user must have granted for this kind.
    pub fn required_scopes(self) -> &'static [&'static str] {
        match self {
            EventKind::ChatMessage => &["user:read:chat"],
            EventKind::Follow => &["moderator:read:followers"],
            EventKind::Subscribe
            | EventKind::SubscriptionEnd
            | EventKind::SubscriptionGift
            | EventKind::SubscriptionMessage => &["channel:read:subscriptions"],
            EventKind::Raid | EventKind::StreamOnline | EventKind::StreamOffline => &[],
            EventKind::Ban | EventKind::Unban => &["channel:moderate"],
            EventKind::Cheer => &["bits:read"],
            EventKind::RewardRedemption => &["channel:read:redemptions"],
            EventKind::PollBegin | EventKind::PollEnd => &["channel:read:polls"],
            EventKind::PredictionBegin
            | EventKind::PredictionLock
            | EventKind::PredictionEnd => &["channel:read:predictions"],
            EventKind::VipAdd | EventKind::VipRemove => &["channel:read:vips"],
        }
    }

    /// Whether only the broadcaster's own authorization can create this
    /// subscription (the scope is not delegable to a bot account).
    pub fn broadcaster_only(self) -> bool {
        matches!(
            self,
            EventKind::Subscribe
                | EventKind::SubscriptionEnd
                | EventKind::SubscriptionGift
                | EventKind::SubscriptionMessage
                | EventKind::Ban
                | EventKind::Unban
                | EventKind::Cheer
                | EventKind::RewardRedemption
                | EventKind::PollBegin
                | EventKind::PollEnd
                | EventKind::PredictionBegin
                | EventKind::PredictionLock
                | EventKind::PredictionEnd
                | EventKind::VipAdd
                | EventKind::VipRemove
        )
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

/// Error returned when parsing an unknown wire name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown event kind: {0}")]
pub struct UnknownKind(pub String);

impl FromStr for EventKind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventKind::ALL
            .iter()
            .copied()
            .find(|k| k.wire_name() == s)
            .ok_or_else(|| UnknownKind(s.to_string()))
    }
}

/// Union of the scopes required by a set of kinds, deduplicated and sorted.
///
/// Used to build the authorization URL for a desired subscription list.
pub fn scopes_for(kinds: &[EventKind]) -> Vec<&'static str> {
    let mut scopes: Vec<&'static str> = kinds
        .iter()
        .flat_map(|k| k.required_scopes().iter().copied())
        .collect();
    scopes.sort_unstable();
    scopes.dedup();
    scopes
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_name_round_trips_through_from_str() {
        for kind in EventKind::ALL {
            let parsed: EventKind = kind.wire_name().parse().unwrap();
            assert_eq!(parsed, kind);
        }
    }

    #[test]
    fn serde_uses_wire_names() {
        let json = serde_json::to_string(&EventKind::RewardRedemption).unwrap();
        assert_eq!(
            json,
            "\"channel.channel_points_custom_reward_redemption.add\""
        );
        let back: EventKind = serde_json::from_str(&json).unwrap();
        assert_eq!(back, EventKind::RewardRedemption);
    }

    #[test]
    fn unknown_wire_name_fails_to_parse() {
        let err = "channel.nonsense".parse::<EventKind>().unwrap_err();
        assert_eq!(err.0, "channel.nonsense");
    }

    #[test]
    fn follow_uses_version_two() {
        assert_eq!(EventKind::Follow.version(), "2");
        assert_eq!(EventKind::ChatMessage.version(), "1");
    }

    #[test]
    fn chat_condition_carries_both_identities() {
        let cond = EventKind::ChatMessage.condition("123", "456");
        assert_eq!(cond.get("broadcaster_user_id").map(String::as_str), Some("123"));
        assert_eq!(cond.get("user_id").map(String::as_str), Some("456"));
    }

    #[test]
    fn follow_condition_uses_moderator_key() {
        let cond = EventKind::Follow.condition("123", "456");
        assert_eq!(cond.get("moderator_user_id").map(String::as_str), Some("456"));
        assert!(!cond.contains_key("user_id"));
    }

    #[test]
    fn raid_condition_targets_broadcaster() {
        let cond = EventKind::Raid.condition("123", "456");
        assert_eq!(
            cond.get("to_broadcaster_user_id").map(String::as_str),
            Some("123")
        );
        assert_eq!(cond.len(), 1);
    }

    #[test]
    fn scopes_for_dedupes_across_kinds() {
        let scopes = scopes_for(&[
            EventKind::Subscribe,
            EventKind::SubscriptionGift,
            EventKind::Follow,
            EventKind::Raid,
        ]);
        assert_eq!(scopes, vec!["channel:read:subscriptions", "moderator:read:followers"]);
    }

    #[test]
    fn stream_kinds_require_no_scopes() {
        assert!(EventKind::StreamOnline.required_scopes().is_empty());
        assert!(EventKind::StreamOffline.required_scopes().is_empty());
        assert!(!EventKind::StreamOnline.broadcaster_only());
    }
}
