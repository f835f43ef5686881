//! Store trait and statistics.
//!
//! A store holds [`CacheRecord`]s partitioned by [`Namespace`]. Single-key
//! reads and writes are atomic; there are no cross-key transactions. Entries
//! written with a TTL silently disappear once it elapses.

use async_trait::async_trait;
use fleetcache_core::{CacheRecord, FleetCacheResult, Namespace};
use std::time::Duration;

/// Namespaced key/value store for cache records.
///
/// Implementations must be thread-safe and tolerate concurrent writers on
/// different keys.
#[async_trait]
pub trait Store: Send + Sync {
    /// Get one record, or `None` if absent or expired.
    async fn get(&self, namespace: Namespace, id: &str) -> FleetCacheResult<Option<CacheRecord>>;

    /// Get every record among `ids` that is present and live.
    ///
    /// Missing ids are skipped. Ids whose stored value cannot be decoded are
    /// reported in [`BatchRead::unreadable`] instead of failing the batch.
    async fn get_all(&self, namespace: Namespace, ids: &[String]) -> FleetCacheResult<BatchRead>;

    /// Ids of every live record in `namespace`.
    async fn get_identifiers(&self, namespace: Namespace) -> FleetCacheResult<Vec<String>>;

    /// Write `record`, replacing any record with the same id.
    ///
    /// `ttl = None` keeps the record until it is evicted.
    async fn put(
        &self,
        namespace: Namespace,
        record: CacheRecord,
        ttl: Option<Duration>,
    ) -> FleetCacheResult<()>;

    /// Remove `ids` from `namespace`, returning how many were present.
    async fn evict(&self, namespace: Namespace, ids: &[String]) -> FleetCacheResult<u64>;

    async fn stats(&self) -> FleetCacheResult<StoreStats>;
}

/// Outcome of a batched read.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchRead {
    pub records: Vec<CacheRecord>,
    /// Ids present in the store whose value does not decode.
    pub unreadable: Vec<String>,
}

/// Statistics about store usage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Number of reads that found a live record.
    pub hits: u64,
    /// Number of reads that found nothing (or only an expired record).
    pub misses: u64,
    /// Number of live entries across all namespaces.
    pub entry_count: u64,
    /// Number of records removed through `evict`.
    pub evictions: u64,
    /// Number of records removed because their TTL elapsed.
    pub expirations: u64,
}

impl StoreStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
