//! A time-windowed set of task ids already counted toward a prior scale-up
//!
//! Per the design notes, exact expiration is not required — this is an
//! approximate TTL set, purged opportunistically rather than on a background
//! timer, the same way the teacher's `BanSets::is_expired` is checked inline
//! on each scale loop rather than scheduled separately.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

/// How long a task id stays in the set once inserted
pub const TTL: Duration = Duration::minutes(10);

/// A TTL-windowed set of task ids
#[derive(Debug, Default)]
pub struct RecentlyScaledFor {
    /// The task ids currently tracked, with the time they were inserted
    entries: HashMap<Uuid, DateTime<Utc>>,
}

impl RecentlyScaledFor {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Purge any entries older than `TTL`
    ///
    /// # Arguments
    ///
    /// * `now` - The current time
    pub fn purge_expired(&mut self, now: DateTime<Utc>) {
        self.entries.retain(|_, inserted_at| now - *inserted_at < TTL);
    }

    /// Whether a task id is currently tracked (not yet expired)
    ///
    /// # Arguments
    ///
    /// * `task_id` - The task id to check
    /// * `now` - The current time
    pub fn contains(&self, task_id: &Uuid, now: DateTime<Utc>) -> bool {
        self.entries
            .get(task_id)
            .is_some_and(|inserted_at| now - *inserted_at < TTL)
    }

    /// Insert a task id, resetting its TTL if already present
    ///
    /// # Arguments
    ///
    /// * `task_id` - The task id to insert
    /// * `now` - The current time
    pub fn insert(&mut self, task_id: Uuid, now: DateTime<Utc>) {
        self.entries.insert(task_id, now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inserted_task_is_not_recounted_within_ttl() {
        let now = Utc::now();
        let mut set = RecentlyScaledFor::new();
        let task = Uuid::new_v4();
        set.insert(task, now);
        assert!(set.contains(&task, now + Duration::minutes(5)));
    }

    #[test]
    fn task_expires_after_ttl() {
        let now = Utc::now();
        let mut set = RecentlyScaledFor::new();
        let task = Uuid::new_v4();
        set.insert(task, now);
        let later = now + Duration::minutes(11);
        assert!(!set.contains(&task, later));
        set.purge_expired(later);
        assert!(set.entries.is_empty());
    }
}
