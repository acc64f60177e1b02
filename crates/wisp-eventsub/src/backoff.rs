//! Reconnect backoff policy.

use std::time::Duration;

use rand::Rng;

use wisp_settings::types::BackoffSettings;

/// Exponential backoff with jitter, capped at a ceiling.
#[derive(Clone, Debug)]
pub struct BackoffPolicy {
    base: Duration,
    max: Duration,
    /// Consecutive failures tolerated before the session gives up.
    pub max_attempts: u32,
    jitter: f64,
}

impl BackoffPolicy {
    /// Build a policy from its raw parameters.
    pub fn new(base: Duration, max: Duration, max_attempts: u32, jitter: f64) -> Self {
        Self {
            base,
            max: max.max(base),
            max_attempts,
            jitter: jitter.clamp(0.0, 1.0),
        }
    }

    /// Delay before retry number `attempt` (1-based), jittered.
    pub fn delay(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        let scaled = self
            .base
            .saturating_mul(2u32.saturating_pow(exp))
            .min(self.max);
        if self.jitter <= f64::EPSILON {
            return scaled;
        }
        let millis = scaled.as_millis() as f64;
        let spread = millis * self.jitter;
        let jittered = millis + rand::rng().random_range(-spread..=spread);
        Duration::from_millis(jittered.max(0.0) as u64)
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(30), 5, 0.25)
    }
}

impl From<&BackoffSettings> for BackoffPolicy {
    fn from(settings: &BackoffSettings) -> Self {
        Self::new(
            Duration::from_millis(settings.base_delay_ms),
            Duration::from_millis(settings.max_delay_ms),
            settings.max_attempts,
            settings.jitter_factor,
        )
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
