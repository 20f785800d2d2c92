//! Single-slot, time-bounded artifact cache.
//!
//! Exactly one entry exists per [`crate::board::Leaderboard`]. It is only
//! written by a completed fetch → transform → render cycle, replaced whole
//! (artifact and timestamp together), and never evicted except by the next
//! write. Under concurrent refreshes the entry left behind is the one from
//! the refresh that *finished* last, not the one that was *requested* last.

use crate::output::Artifact;
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// The cached artifact and the moment its page was fetched.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub artifact: Arc<Artifact>,
    pub fetched_at: DateTime<Utc>,
}

impl CacheEntry {
    /// True while the entry is younger than `ttl`.
    pub fn is_fresh(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        match (now - self.fetched_at).to_std() {
            Ok(age) => age < ttl,
            // Fetched "in the future" (clock step): treat as brand new.
            Err(_) => true,
        }
    }

    /// Human-readable age, see [`age_text`].
    pub fn age_text(&self, now: DateTime<Utc>) -> String {
        age_text(self.fetched_at, now)
    }
}

/// `"42s"` below a minute, whole minutes (`"3m"`) otherwise.
pub fn age_text(fetched_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = (now - fetched_at).num_seconds().max(0);
    if secs < 60 {
        format!("{secs}s")
    } else {
        format!("{}m", secs / 60)
    }
}

/// Holds at most one [`CacheEntry`].
#[derive(Debug, Default)]
pub struct ArtifactCache {
    slot: Mutex<Option<CacheEntry>>,
}

impl ArtifactCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// An entry exists and is younger than `ttl` right now.
    pub fn is_valid(&self, ttl: Duration) -> bool {
        self.is_valid_at(ttl, Utc::now())
    }

    pub fn is_valid_at(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        self.get_valid_at(ttl, now).is_some()
    }

    /// Current entry, fresh or not.
    pub fn get(&self) -> Option<CacheEntry> {
        self.lock().clone()
    }

    /// Current entry if it is still fresh at `now`; checked and read under one lock.
    pub fn get_valid_at(&self, ttl: Duration, now: DateTime<Utc>) -> Option<CacheEntry> {
        self.lock()
            .as_ref()
            .filter(|entry| entry.is_fresh(ttl, now))
            .cloned()
    }

    /// Replace the entry.
    pub fn set(&self, artifact: Arc<Artifact>, fetched_at: DateTime<Utc>) {
        *self.lock() = Some(CacheEntry {
            artifact,
            fetched_at,
        });
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<CacheEntry>> {
        // The slot is always a whole entry or nothing, so a poisoned lock
        // still guards consistent data.
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
