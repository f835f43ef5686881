//! On-demand store adapter.
//!
//! Typed access to the `onDemand` namespace: single-server-group snapshots
//! keyed by server-group key, always written with the on-demand TTL.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use fleetcache_core::{CacheRecord, FleetCacheResult, Namespace, OnDemandEntry};

use crate::store::{BatchRead, Store};

/// Result of a batched on-demand lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OnDemandBatch {
    /// Readable entries keyed by server-group key.
    pub entries: BTreeMap<String, OnDemandEntry>,
    /// Ids whose stored value does not decode or is not an on-demand entry.
    pub unreadable: Vec<String>,
}

impl OnDemandBatch {
    pub fn get(&self, id: &str) -> Option<&OnDemandEntry> {
        self.entries.get(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Clone)]
pub struct OnDemandStore {
    store: Arc<dyn Store>,
    ttl: Duration,
}

impl OnDemandStore {
    pub fn new(store: Arc<dyn Store>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub async fn get(&self, id: &str) -> FleetCacheResult<Option<OnDemandEntry>> {
        let record = self.store.get(Namespace::OnDemand, id).await?;
        Ok(record.and_then(|record| typed(record).ok()))
    }

    /// Fetch the entries for `ids` in one store round trip.
    pub async fn get_many(&self, ids: &[String]) -> FleetCacheResult<OnDemandBatch> {
        if ids.is_empty() {
            return Ok(OnDemandBatch::default());
        }
        let read = self.store.get_all(Namespace::OnDemand, ids).await?;
        Ok(collect(read))
    }

    /// Every live entry in the namespace.
    pub async fn all(&self) -> FleetCacheResult<OnDemandBatch> {
        let ids = self.identifiers().await?;
        self.get_many(&ids).await
    }

    pub async fn identifiers(&self) -> FleetCacheResult<Vec<String>> {
        self.store.get_identifiers(Namespace::OnDemand).await
    }

    /// Write (or overwrite) `entry` with the on-demand TTL.
    pub async fn put(&self, entry: OnDemandEntry) -> FleetCacheResult<()> {
        self.store
            .put(Namespace::OnDemand, entry.into_record(), Some(self.ttl))
            .await
    }

    pub async fn evict(&self, ids: &[String]) -> FleetCacheResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        self.store.evict(Namespace::OnDemand, ids).await
    }
}

fn typed(record: CacheRecord) -> Result<OnDemandEntry, String> {
    let id = record.id.clone();
    OnDemandEntry::try_from(record).map_err(|e| {
        tracing::warn!(id = %id, error = %e, "Ignoring unreadable on-demand record");
        id
    })
}

fn collect(read: BatchRead) -> OnDemandBatch {
    let mut batch = OnDemandBatch {
        entries: BTreeMap::new(),
        unreadable: read.unreadable,
    };
    for record in read.records {
        match typed(record) {
            Ok(entry) => {
                batch.entries.insert(entry.id.clone(), entry);
            }
            Err(id) => batch.unreadable.push(id),
        }
    }
    batch
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryStore;
    use chrono::DateTime;
    use fleetcache_core::{EntityGraph, EvictionMarker, ManualClock, Timestamp};

    fn ts(millis: i64) -> Timestamp {
        DateTime::from_timestamp_millis(millis).expect("valid millis")
    }

    fn entry(id: &str, cache_time: i64) -> OnDemandEntry {
        OnDemandEntry::new(id, ts(cache_time), &EntityGraph::new()).expect("encode")
    }

    #[tokio::test]
    async fn test_put_get_roundtrip() {
        let adapter = OnDemandStore::new(Arc::new(InMemoryStore::new()), Duration::from_secs(600));
        adapter.put(entry("sg1", 1000)).await.expect("put");

        let found = adapter.get("sg1").await.expect("get");
        assert_eq!(found, Some(entry("sg1", 1000)));
        assert!(adapter.get("sg2").await.expect("get").is_none());
    }

    #[tokio::test]
    async fn test_get_many_separates_unreadable() {
        let store = Arc::new(InMemoryStore::new());
        let adapter = OnDemandStore::new(store.clone(), Duration::from_secs(600));
        adapter.put(entry("sg1", 1000)).await.expect("put");
        store
            .put(
                Namespace::OnDemand,
                EvictionMarker::new("sg2", ts(5)).into_record(),
                None,
            )
            .await
            .expect("put");

        let batch = adapter
            .get_many(&["sg1".to_string(), "sg2".to_string(), "sg3".to_string()])
            .await
            .expect("get_many");
        assert_eq!(batch.len(), 1);
        assert!(batch.get("sg1").is_some());
        assert_eq!(batch.unreadable, vec!["sg2".to_string()]);
    }

    #[tokio::test]
    async fn test_entries_expire_with_ttl() {
        let clock = Arc::new(ManualClock::at_millis(0));
        let adapter = OnDemandStore::new(
            Arc::new(InMemoryStore::with_clock(clock.clone())),
            Duration::from_secs(600),
        );
        adapter.put(entry("sg1", 1000)).await.expect("put");

        clock.advance(Duration::from_secs(601));
        assert!(adapter.get("sg1").await.expect("get").is_none());
        assert!(adapter.all().await.expect("all").is_empty());
    }

    #[tokio::test]
    async fn test_evict() {
        let adapter = OnDemandStore::new(Arc::new(InMemoryStore::new()), Duration::from_secs(600));
        adapter.put(entry("sg1", 1000)).await.expect("put");
        assert_eq!(adapter.evict(&["sg1".to_string()]).await.expect("evict"), 1);
        assert_eq!(adapter.evict(&[]).await.expect("evict"), 0);
        assert!(adapter.identifiers().await.expect("ids").is_empty());
    }
}
