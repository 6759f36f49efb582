//! Per-tier, per-direction token buckets
//!
//! Kept as an immutable functional value per the design notes: `try_take`
//! consumes the bucket and returns the replacement, rather than mutating
//! through a shared reference. The caller (here, `TierState`) owns the single
//! mutable slot the functional value gets swapped into.

use chrono::{DateTime, Utc};

/// The default bucket capacity
pub const DEFAULT_CAPACITY: u64 = 50;
/// The default refill rate, in tokens per second
pub const DEFAULT_REFILL_PER_SECOND: f64 = 2.0;

/// A token bucket rate limiter
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TokenBucket {
    /// The maximum number of tokens this bucket can hold
    capacity: u64,
    /// How many tokens refill per second
    refill_per_second: f64,
    /// The tokens currently available, as of `last_refill`
    tokens: f64,
    /// The last time this bucket was refilled
    last_refill: DateTime<Utc>,
}

impl TokenBucket {
    /// Create a new, full token bucket
    ///
    /// # Arguments
    ///
    /// * `capacity` - The maximum number of tokens this bucket can hold
    /// * `refill_per_second` - How many tokens refill per second
    /// * `now` - The current time
    pub fn new(capacity: u64, refill_per_second: f64, now: DateTime<Utc>) -> Self {
        TokenBucket {
            capacity,
            refill_per_second,
            tokens: capacity as f64,
            last_refill: now,
        }
    }

    /// Build a full bucket using the spec's default capacity/refill rate
    ///
    /// # Arguments
    ///
    /// * `now` - The current time
    pub fn full(now: DateTime<Utc>) -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_REFILL_PER_SECOND, now)
    }

    /// How many whole tokens are currently available, after refilling to `now`
    pub fn available(&self, now: DateTime<Utc>) -> u64 {
        self.refilled(now).tokens as u64
    }

    /// Return a copy of this bucket refilled up to `now`
    fn refilled(&self, now: DateTime<Utc>) -> Self {
        let elapsed = (now - self.last_refill).num_milliseconds().max(0) as f64 / 1000.0;
        let refilled = (self.tokens + elapsed * self.refill_per_second).min(self.capacity as f64);
        TokenBucket {
            tokens: refilled,
            last_refill: now,
            ..*self
        }
    }

    /// Attempt to take between `min` and `max` tokens
    ///
    /// Returns `None` if fewer than `min` tokens are available. Otherwise
    /// returns the number of tokens granted (capped at `max` and at the
    /// available whole tokens) and the bucket with those tokens removed.
    ///
    /// # Arguments
    ///
    /// * `min` - The minimum number of tokens that must be available
    /// * `max` - The maximum number of tokens to take
    /// * `now` - The current time
    pub fn try_take(&self, min: u64, max: u64, now: DateTime<Utc>) -> Option<(u64, TokenBucket)> {
        let refilled = self.refilled(now);
        let available = refilled.tokens as u64;
        if available < min {
            return None;
        }
        let granted = available.min(max).max(min);
        let remaining = TokenBucket {
            tokens: refilled.tokens - granted as f64,
            ..refilled
        };
        Some((granted, remaining))
    }
}
