//! Single-use enforcement for login challenges.
//!
//! Challenges are stateless, so without this cache a captured
//! `{challenge, signature}` pair could be replayed until the challenge
//! expires. The cache remembers each consumed challenge MAC until that
//! challenge's own expiry, then lets it fall out.

use super::challenge::MAC_BYTES;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

/// Decoded challenge MAC, the replay cache key.
pub type ChallengeTag = [u8; MAC_BYTES];

/// Records consumed challenges.
pub trait ReplayCache: Send + Sync {
    /// Atomically record `tag` as used until `expires_at_ms`.
    ///
    /// Returns `false` if `tag` was already recorded and is still live at
    /// `now_ms` (a replay), or if it cannot be recorded. `true` otherwise.
    fn check_and_insert(&self, tag: &ChallengeTag, expires_at_ms: i64, now_ms: i64) -> bool;

    /// Drop entries whose expiry is before `now_ms`. Returns how many were removed.
    fn purge_expired(&self, now_ms: i64) -> usize;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-process replay cache backed by a sharded concurrent map.
///
/// Expired entries are ignored on lookup, so purging is only needed to
/// reclaim memory (see `cleanup::run_cleanup_loop`).
///
/// Memory is bounded by `max_entries`. When full, expired entries are purged
/// inline; if the cache is still full, new challenges are refused. Live
/// entries are never evicted, since an evicted challenge becomes replayable.
#[derive(Debug)]
pub struct ChallengeReplayCache {
    entries: DashMap<ChallengeTag, i64>,
    max_entries: usize,
}

impl ChallengeReplayCache {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: DashMap::with_capacity(max_entries.min(1024)),
            max_entries,
        }
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    /// Make room for one more entry. Returns `false` if the cache stays full.
    fn reserve(&self, now_ms: i64) -> bool {
        if self.entries.len() < self.max_entries {
            return true;
        }

        self.purge_expired(now_ms);
        if self.entries.len() < self.max_entries {
            return true;
        }

        tracing::warn!(
            action = "replay_cache_full",
            max_entries = self.max_entries,
            "Replay cache at capacity, refusing challenge"
        );
        false
    }
}

impl ReplayCache for ChallengeReplayCache {
    fn check_and_insert(&self, tag: &ChallengeTag, expires_at_ms: i64, now_ms: i64) -> bool {
        // Capacity is a soft bound: concurrent inserts may overshoot by a few.
        if !self.entries.contains_key(tag) && !self.reserve(now_ms) {
            return false;
        }

        // Entry API holds the shard lock across check and insert.
        match self.entries.entry(*tag) {
            Entry::Occupied(mut entry) => {
                if *entry.get() >= now_ms {
                    false
                } else {
                    entry.insert(expires_at_ms);
                    true
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(expires_at_ms);
                true
            }
        }
    }

    fn purge_expired(&self, now_ms: i64) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, expires_at| *expires_at >= now_ms);
        before.saturating_sub(self.entries.len())
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}
