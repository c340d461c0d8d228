//! Background purge of consumed challenges.
//!
//! The replay cache ignores expired entries on lookup, but it never forgets
//! them on its own. This job periodically drops entries whose challenge has
//! expired so memory stays bounded by the login rate times the challenge TTL.

use crate::auth::{unix_millis, ReplayCache};
use std::sync::Arc;
use std::time::Duration;

/// Run the cleanup loop.
///
/// Purges the replay cache every `interval`. Never returns.
pub async fn run_cleanup_loop(cache: Arc<dyn ReplayCache>, interval: Duration) {
    loop {
        tokio::time::sleep(interval).await;
        purge_once(cache.as_ref(), unix_millis());
    }
}

/// Purge expired entries as of `now_ms`. Returns the number removed.
pub fn purge_once(cache: &dyn ReplayCache, now_ms: i64) -> usize {
    let removed = cache.purge_expired(now_ms);

    if removed > 0 {
        tracing::debug!(
            removed = removed,
            remaining = cache.len(),
            "Replay cache purge completed"
        );
    }

    removed
}
