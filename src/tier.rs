//! Per-tier execution state, held by the loop driver across iterations
//!
//! Mirrors the teacher's pattern of keeping cooldown timestamps and bucket
//! state in a long-lived struct the loop owns, rather than in any collaborator.

use chrono::{DateTime, Utc};

use crate::metrics::TierGauges;
use crate::rate_limiter::TokenBucket;

/// The execution state for a single tier, persisted across iterations
#[derive(Debug, Clone)]
pub struct TierState {
    /// The last time a scale-up was actually issued for this tier
    pub last_scale_up_at: Option<DateTime<Utc>>,
    /// The last time a scale-down was actually issued for this tier
    pub last_scale_down_at: Option<DateTime<Utc>>,
    /// The scale-up token bucket
    pub scale_up_bucket: TokenBucket,
    /// The scale-down token bucket
    pub scale_down_bucket: TokenBucket,
    /// The most recently emitted gauges for this tier
    pub gauges: TierGauges,
}

impl TierState {
    /// Build a fresh tier state with full token buckets and no cooldown history
    ///
    /// # Arguments
    ///
    /// * `now` - The time to stamp the initial buckets with
    pub fn new(now: DateTime<Utc>) -> Self {
        TierState {
            last_scale_up_at: None,
            last_scale_down_at: None,
            scale_up_bucket: TokenBucket::full(now),
            scale_down_bucket: TokenBucket::full(now),
            gauges: TierGauges::default(),
        }
    }

    /// Whether the scale-up cooldown has elapsed
    ///
    /// # Arguments
    ///
    /// * `now` - The current time
    /// * `cooldown_ms` - The configured scale-up cooldown, in milliseconds
    pub fn scale_up_cooldown_elapsed(&self, now: DateTime<Utc>, cooldown_ms: i64) -> bool {
        match self.last_scale_up_at {
            None => true,
            Some(last) => (now - last).num_milliseconds() >= cooldown_ms,
        }
    }

    /// Whether the scale-down cooldown has elapsed
    ///
    /// # Arguments
    ///
    /// * `now` - The current time
    /// * `cooldown_ms` - The configured scale-down cooldown, in milliseconds
    pub fn scale_down_cooldown_elapsed(&self, now: DateTime<Utc>, cooldown_ms: i64) -> bool {
        match self.last_scale_down_at {
            None => true,
            Some(last) => (now - last).num_milliseconds() >= cooldown_ms,
        }
    }
}
