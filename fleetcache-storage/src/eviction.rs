//! Eviction tracker.
//!
//! Tombstones in the `evictions` namespace record that a server group was
//! confirmed gone. An on-demand entry captured before the tombstone must not
//! be trusted again.

use std::sync::Arc;
use std::time::Duration;

use fleetcache_core::{Clock, EvictionMarker, FleetCacheResult, Namespace, Timestamp};

use crate::store::Store;

#[derive(Clone)]
pub struct EvictionTracker {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl EvictionTracker {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self { store, clock, ttl }
    }

    /// Write a marker for `id` stamped with the current time.
    pub async fn record_eviction(&self, id: &str) -> FleetCacheResult<EvictionMarker> {
        let marker = EvictionMarker::new(id, self.clock.now());
        self.store
            .put(
                Namespace::Evictions,
                marker.clone().into_record(),
                Some(self.ttl),
            )
            .await?;
        tracing::debug!(id = %id, eviction_time = %marker.eviction_time, "Recorded eviction marker");
        Ok(marker)
    }

    pub async fn marker(&self, id: &str) -> FleetCacheResult<Option<EvictionMarker>> {
        let record = self.store.get(Namespace::Evictions, id).await?;
        Ok(record.and_then(typed))
    }

    /// True iff a marker exists for `id` with `eviction_time > since`.
    pub async fn has_been_evicted(&self, id: &str, since: Timestamp) -> FleetCacheResult<bool> {
        Ok(self
            .marker(id)
            .await?
            .map(|marker| marker.supersedes(since))
            .unwrap_or(false))
    }
}

fn typed(record: fleetcache_core::CacheRecord) -> Option<EvictionMarker> {
    let id = record.id.clone();
    EvictionMarker::try_from(record)
        .map_err(|e| tracing::warn!(id = %id, error = %e, "Ignoring unreadable eviction marker"))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryStore;
    use chrono::DateTime;
    use fleetcache_core::ManualClock;

    fn ts(millis: i64) -> Timestamp {
        DateTime::from_timestamp_millis(millis).expect("valid millis")
    }

    fn tracker(clock: Arc<ManualClock>) -> EvictionTracker {
        let store = Arc::new(InMemoryStore::with_clock(clock.clone()));
        EvictionTracker::new(store, clock, Duration::from_secs(600))
    }

    #[tokio::test]
    async fn test_no_marker_means_not_evicted() {
        let tracker = tracker(Arc::new(ManualClock::at_millis(0)));
        assert!(!tracker.has_been_evicted("sg", ts(0)).await.expect("check"));
    }

    #[tokio::test]
    async fn test_marker_newer_than_read_time() {
        let clock = Arc::new(ManualClock::at_millis(10));
        let tracker = tracker(clock);
        let marker = tracker.record_eviction("sg").await.expect("record");
        assert_eq!(marker.eviction_time, ts(10));

        assert!(tracker.has_been_evicted("sg", ts(5)).await.expect("check"));
        assert!(!tracker.has_been_evicted("sg", ts(10)).await.expect("check"));
        assert!(!tracker.has_been_evicted("sg", ts(11)).await.expect("check"));
    }

    #[tokio::test]
    async fn test_marker_expires() {
        let clock = Arc::new(ManualClock::at_millis(0));
        let tracker = tracker(clock.clone());
        tracker.record_eviction("sg").await.expect("record");

        clock.advance(Duration::from_secs(600));
        assert!(tracker.marker("sg").await.expect("marker").is_none());
    }
}
