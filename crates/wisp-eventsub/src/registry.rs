//! Subscription registry.
//!
//! Tracks the desired set of subscriptions keyed by kind plus condition, and
//! reconciles it against the service for the current session. Subscriptions
//! die with their session, so every new welcome triggers a full re-issue.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{info, instrument, warn};

use wisp_auth::TokenManager;
use wisp_core::EventKind;

use crate::errors::{SubscriptionError, SubscriptionFailure};
use crate::helix::SubscriptionApi;

/// Lifecycle of one tracked subscription.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubscriptionStatus {
    /// Desired but not yet confirmed for the current session.
    Pending,
    /// Confirmed live on the current session.
    Enabled,
    /// Terminated by the service. Not re-issued on reconnect.
    Revoked,
}

/// One tracked subscription.
#[derive(Clone, Debug)]
pub struct Subscription {
    /// Event kind.
    pub kind: EventKind,
    /// Condition fields sent at creation.
    pub condition: BTreeMap<String, String>,
    /// Service-assigned id, once created.
    pub id: Option<String>,
    /// Current lifecycle state.
    pub status: SubscriptionStatus,
}

type SubscriptionKey = (EventKind, BTreeMap<String, String>);

/// The desired subscription set and its reconciliation logic.
pub struct SubscriptionRegistry {
    api: Arc<dyn SubscriptionApi>,
    tokens: Arc<TokenManager>,
    entries: BTreeMap<SubscriptionKey, Subscription>,
}

impl SubscriptionRegistry {
    /// An empty registry creating subscriptions through `api`.
    pub fn new(api: Arc<dyn SubscriptionApi>, tokens: Arc<TokenManager>) -> Self {
        Self {
            api,
            tokens,
            entries: BTreeMap::new(),
        }
    }

    /// Ensure a subscription for `kind` + `condition` exists on the current
    /// session. Entries already enabled or pending are left untouched; an
    /// explicit ensure of a revoked entry re-creates it.
    #[instrument(skip(self, condition), fields(kind = %kind))]
    pub async fn ensure(
        &mut self,
        session_id: &str,
        kind: EventKind,
        condition: BTreeMap<String, String>,
    ) -> Result<(), SubscriptionError> {
        let key = (kind, condition.clone());
        if let Some(entry) = self.entries.get(&key) {
            if matches!(
                entry.status,
                SubscriptionStatus::Enabled | SubscriptionStatus::Pending
            ) {
                return Ok(());
            }
        }
        let _ = self.entries.insert(
            key.clone(),
            Subscription {
                kind,
                condition: condition.clone(),
                id: None,
                status: SubscriptionStatus::Pending,
            },
        );
        self.create(session_id, &key).await
    }

    /// Re-issue every non-revoked subscription against a fresh session.
    /// Collects per-subscription failures instead of stopping at the first.
    pub async fn resubscribe_all(
        &mut self,
        session_id: &str,
    ) -> Result<(), Vec<SubscriptionError>> {
        let keys: Vec<SubscriptionKey> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.status != SubscriptionStatus::Revoked)
            .map(|(key, _)| key.clone())
            .collect();
        let mut failures = Vec::new();
        for key in keys {
            if let Some(entry) = self.entries.get_mut(&key) {
                entry.id = None;
                entry.status = SubscriptionStatus::Pending;
            }
            if let Err(e) = self.create(session_id, &key).await {
                failures.push(e);
            }
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(failures)
        }
    }

    /// Mark the subscription with service id `subscription_id` as revoked.
    pub fn mark_revoked(&mut self, subscription_id: &str, status: &str) {
        for entry in self.entries.values_mut() {
            if entry.id.as_deref() == Some(subscription_id) {
                warn!(kind = %entry.kind, status, "subscription revoked");
                entry.status = SubscriptionStatus::Revoked;
                return;
            }
        }
        warn!(subscription_id, status, "revocation for untracked subscription");
    }

    /// Current view of every tracked subscription.
    pub fn subscriptions(&self) -> Vec<Subscription> {
        self.entries.values().cloned().collect()
    }

    async fn create(
        &mut self,
        session_id: &str,
        key: &SubscriptionKey,
    ) -> Result<(), SubscriptionError> {
        let (kind, condition) = key;
        let result = self.create_with_retry(session_id, *kind, condition).await;
        match result {
            Ok(created) => {
                info!(kind = %kind, id = %created.id, "subscribed");
                if let Some(entry) = self.entries.get_mut(key) {
                    entry.id = Some(created.id);
                    entry.status = if created.status == "enabled" {
                        SubscriptionStatus::Enabled
                    } else {
                        SubscriptionStatus::Pending
                    };
                }
                Ok(())
            }
            Err(source) => Err(SubscriptionError {
                kind: *kind,
                condition: condition.clone(),
                source,
            }),
        }
    }

    /// Create once; on a 401 invalidate the cached token and retry a single
    /// time with a fresh one.
    async fn create_with_retry(
        &self,
        session_id: &str,
        kind: EventKind,
        condition: &BTreeMap<String, String>,
    ) -> Result<crate::helix::CreatedSubscription, SubscriptionFailure> {
        let credential = self.tokens.acquire().await?;
        match self
            .api
            .create_subscription(&credential, session_id, kind, condition)
            .await
        {
            Ok(created) => Ok(created),
            Err(e) if e.is_unauthorized() => {
                warn!(kind = %kind, "unauthorized, refreshing token and retrying");
                self.tokens.invalidate().await;
                let credential = self.tokens.acquire().await?;
                Ok(self
                    .api
                    .create_subscription(&credential, session_id, kind, condition)
                    .await?)
            }
            Err(e) => Err(e.into()),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
