//! In-memory store.
//!
//! Backs tests and single-process deployments. Expiry is evaluated lazily
//! against the injected clock on every read.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::TimeDelta;
use fleetcache_core::{
    CacheRecord, Clock, FleetCacheResult, Namespace, StoreError, SystemClock, Timestamp,
};

use crate::store::{BatchRead, Store, StoreStats};

#[derive(Debug, Clone)]
struct StoredRecord {
    record: CacheRecord,
    expires_at: Option<Timestamp>,
}

impl StoredRecord {
    fn is_live(&self, now: Timestamp) -> bool {
        self.expires_at.map(|at| at > now).unwrap_or(true)
    }
}

/// Store backed by a map per namespace.
#[derive(Debug)]
pub struct InMemoryStore {
    namespaces: RwLock<BTreeMap<Namespace, BTreeMap<String, StoredRecord>>>,
    stats: RwLock<StoreStats>,
    clock: Arc<dyn Clock>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            namespaces: RwLock::new(BTreeMap::new()),
            stats: RwLock::new(StoreStats::default()),
            clock,
        }
    }

    /// Drop every record whose TTL has elapsed, returning how many went.
    pub fn purge_expired(&self) -> FleetCacheResult<u64> {
        let now = self.clock.now();
        let mut namespaces = self
            .namespaces
            .write()
            .map_err(|_| StoreError::LockPoisoned)?;

        let mut purged = 0u64;
        for records in namespaces.values_mut() {
            let before = records.len();
            records.retain(|_, stored| stored.is_live(now));
            purged += (before - records.len()) as u64;
        }
        drop(namespaces);

        if purged > 0 {
            if let Ok(mut stats) = self.stats.write() {
                stats.expirations += purged;
            }
        }
        Ok(purged)
    }

    fn record_reads(&self, hits: u64, misses: u64) {
        if let Ok(mut stats) = self.stats.write() {
            stats.hits += hits;
            stats.misses += misses;
        }
    }

    fn expiry_for(&self, ttl: Option<Duration>) -> Option<Timestamp> {
        ttl.map(|ttl| {
            let delta = TimeDelta::from_std(ttl).unwrap_or(TimeDelta::MAX);
            self.clock
                .now()
                .checked_add_signed(delta)
                .unwrap_or(Timestamp::MAX_UTC)
        })
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn get(&self, namespace: Namespace, id: &str) -> FleetCacheResult<Option<CacheRecord>> {
        let now = self.clock.now();
        let found = {
            let namespaces = self
                .namespaces
                .read()
                .map_err(|_| StoreError::LockPoisoned)?;
            namespaces
                .get(&namespace)
                .and_then(|records| records.get(id))
                .filter(|stored| stored.is_live(now))
                .map(|stored| stored.record.clone())
        };

        match found {
            Some(_) => self.record_reads(1, 0),
            None => self.record_reads(0, 1),
        }
        Ok(found)
    }

    async fn get_all(&self, namespace: Namespace, ids: &[String]) -> FleetCacheResult<BatchRead> {
        let now = self.clock.now();
        let found: Vec<CacheRecord> = {
            let namespaces = self
                .namespaces
                .read()
                .map_err(|_| StoreError::LockPoisoned)?;
            match namespaces.get(&namespace) {
                Some(records) => ids
                    .iter()
                    .filter_map(|id| records.get(id))
                    .filter(|stored| stored.is_live(now))
                    .map(|stored| stored.record.clone())
                    .collect(),
                None => Vec::new(),
            }
        };

        let hits = found.len() as u64;
        self.record_reads(hits, (ids.len() as u64).saturating_sub(hits));
        Ok(BatchRead {
            records: found,
            unreadable: Vec::new(),
        })
    }

    async fn get_identifiers(&self, namespace: Namespace) -> FleetCacheResult<Vec<String>> {
        let now = self.clock.now();
        let namespaces = self
            .namespaces
            .read()
            .map_err(|_| StoreError::LockPoisoned)?;
        Ok(namespaces
            .get(&namespace)
            .map(|records| {
                records
                    .iter()
                    .filter(|(_, stored)| stored.is_live(now))
                    .map(|(id, _)| id.clone())
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn put(
        &self,
        namespace: Namespace,
        record: CacheRecord,
        ttl: Option<Duration>,
    ) -> FleetCacheResult<()> {
        let expires_at = self.expiry_for(ttl);
        let mut namespaces = self
            .namespaces
            .write()
            .map_err(|_| StoreError::LockPoisoned)?;
        namespaces
            .entry(namespace)
            .or_default()
            .insert(record.id.clone(), StoredRecord { record, expires_at });
        Ok(())
    }

    async fn evict(&self, namespace: Namespace, ids: &[String]) -> FleetCacheResult<u64> {
        let evicted = {
            let mut namespaces = self
                .namespaces
                .write()
                .map_err(|_| StoreError::LockPoisoned)?;
            match namespaces.get_mut(&namespace) {
                Some(records) => ids
                    .iter()
                    .filter(|id| records.remove(id.as_str()).is_some())
                    .count() as u64,
                None => 0,
            }
        };

        if evicted > 0 {
            if let Ok(mut stats) = self.stats.write() {
                stats.evictions += evicted;
            }
        }
        Ok(evicted)
    }

    async fn stats(&self) -> FleetCacheResult<StoreStats> {
        let now = self.clock.now();
        let entry_count = {
            let namespaces = self
                .namespaces
                .read()
                .map_err(|_| StoreError::LockPoisoned)?;
            namespaces
                .values()
                .flat_map(|records| records.values())
                .filter(|stored| stored.is_live(now))
                .count() as u64
        };
        let mut stats = self
            .stats
            .read()
            .map_err(|_| StoreError::LockPoisoned)?
            .clone();
        stats.entry_count = entry_count;
        Ok(stats)
    }
}
