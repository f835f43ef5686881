//! LMDB-backed durable store.
//!
//! Uses the heed crate (Rust bindings for LMDB) so on-demand entries and
//! eviction markers survive a process restart.
//!
//! # Layout
//!
//! Keys are [`NamespacedKey`] encodings. Values are
//! `[expires-at millis: 8 bytes LE][JSON CacheRecord]`, with `i64::MAX`
//! meaning the record never expires. Expired values are hidden from reads
//! and removed by [`LmdbStore::purge_expired`].

use std::path::Path;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use fleetcache_core::{
    CacheRecord, Clock, FleetCacheError, FleetCacheResult, Namespace, StoreError, SystemClock,
};
use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};

use crate::namespaced_key::NamespacedKey;
use crate::store::{BatchRead, Store, StoreStats};

/// Expiry sentinel for records written without a TTL.
const NO_EXPIRY: i64 = i64::MAX;

/// Length of the expiry header on every value.
const HEADER_LEN: usize = 8;

/// Error type for LMDB store operations.
#[derive(Debug, thiserror::Error)]
pub enum LmdbStoreError {
    /// Failed to open or create the LMDB environment.
    #[error("Failed to open LMDB environment: {0}")]
    EnvOpen(String),

    /// Failed to open the database within the environment.
    #[error("Failed to open database: {0}")]
    DbOpen(String),

    /// Transaction error.
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<LmdbStoreError> for FleetCacheError {
    fn from(e: LmdbStoreError) -> Self {
        FleetCacheError::Store(StoreError::Backend {
            reason: e.to_string(),
        })
    }
}

/// Decoded value: expiry plus the raw JSON body.
struct StoredValue<'a> {
    expires_at_millis: i64,
    body: &'a [u8],
}

impl<'a> StoredValue<'a> {
    fn parse(bytes: &'a [u8]) -> Option<Self> {
        if bytes.len() < HEADER_LEN {
            return None;
        }
        let header: [u8; HEADER_LEN] = bytes[0..HEADER_LEN].try_into().ok()?;
        Some(Self {
            expires_at_millis: i64::from_le_bytes(header),
            body: &bytes[HEADER_LEN..],
        })
    }

    fn is_live(&self, now_millis: i64) -> bool {
        self.expires_at_millis > now_millis
    }
}

/// LMDB-backed store.
///
/// # Example
///
/// ```ignore
/// use fleetcache_storage::LmdbStore;
///
/// let store = LmdbStore::new("/var/lib/fleetcache", 256)?;
/// store.put(Namespace::OnDemand, entry.into_record(), Some(ttl)).await?;
/// ```
pub struct LmdbStore {
    env: Env,
    db: Database<Bytes, Bytes>,
    stats: Arc<RwLock<StoreStats>>,
    clock: Arc<dyn Clock>,
}

impl LmdbStore {
    /// Open (or create) a store under `path`.
    ///
    /// # Arguments
    ///
    /// * `path` - Directory where LMDB files will be stored
    /// * `max_size_mb` - Maximum size of the database in megabytes
    pub fn new<P: AsRef<Path>>(path: P, max_size_mb: usize) -> Result<Self, LmdbStoreError> {
        Self::with_clock(path, max_size_mb, Arc::new(SystemClock))
    }

    pub fn with_clock<P: AsRef<Path>>(
        path: P,
        max_size_mb: usize,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, LmdbStoreError> {
        std::fs::create_dir_all(&path)?;

        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(max_size_mb * 1024 * 1024)
                .max_dbs(1)
                .open(path.as_ref())
        }
        .map_err(|e| LmdbStoreError::EnvOpen(e.to_string()))?;

        let mut wtxn = env
            .write_txn()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;

        let db: Database<Bytes, Bytes> = env
            .create_database(&mut wtxn, None)
            .map_err(|e| LmdbStoreError::DbOpen(e.to_string()))?;

        wtxn.commit()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;

        tracing::debug!(path = %path.as_ref().display(), max_size_mb, "Opened LMDB store");

        Ok(Self {
            env,
            db,
            stats: Arc::new(RwLock::new(StoreStats::default())),
            clock,
        })
    }

    /// Remove every record whose TTL has elapsed.
    pub fn purge_expired(&self) -> FleetCacheResult<u64> {
        let now_millis = self.clock.now().timestamp_millis();

        let expired: Vec<Vec<u8>> = {
            let rtxn = self
                .env
                .read_txn()
                .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;
            let iter = self
                .db
                .iter(&rtxn)
                .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;

            let mut expired = Vec::new();
            for result in iter {
                let Ok((key, value)) = result else { continue };
                let live = StoredValue::parse(value)
                    .map(|stored| stored.is_live(now_millis))
                    .unwrap_or(false);
                if !live {
                    expired.push(key.to_vec());
                }
            }
            expired
        };

        let purged = self.delete_keys(&expired)?;
        if purged > 0 {
            if let Ok(mut stats) = self.stats.write() {
                stats.expirations += purged;
            }
            tracing::debug!(purged, "Purged expired records");
        }
        Ok(purged)
    }

    fn delete_keys(&self, keys: &[Vec<u8>]) -> Result<u64, LmdbStoreError> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut wtxn = self
            .env
            .write_txn()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;

        let mut deleted = 0u64;
        for key in keys {
            if self
                .db
                .delete(&mut wtxn, key)
                .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?
            {
                deleted += 1;
            }
        }

        wtxn.commit()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;
        Ok(deleted)
    }

    fn record_reads(&self, hits: u64, misses: u64) {
        if let Ok(mut stats) = self.stats.write() {
            stats.hits += hits;
            stats.misses += misses;
        }
    }

    /// Decode a live value, or `None` if it has expired.
    fn decode_live(
        namespace: Namespace,
        bytes: &[u8],
        now_millis: i64,
    ) -> Result<Option<CacheRecord>, StoreError> {
        let stored = StoredValue::parse(bytes).ok_or_else(|| StoreError::CorruptRecord {
            namespace,
            reason: "value shorter than expiry header".to_string(),
        })?;
        if !stored.is_live(now_millis) {
            return Ok(None);
        }
        serde_json::from_slice(stored.body)
            .map(Some)
            .map_err(|e| StoreError::CorruptRecord {
                namespace,
                reason: e.to_string(),
            })
    }

    fn expiry_millis(&self, ttl: Option<Duration>) -> i64 {
        match ttl {
            Some(ttl) => {
                let ttl_millis = i64::try_from(ttl.as_millis()).unwrap_or(NO_EXPIRY);
                self.clock
                    .now()
                    .timestamp_millis()
                    .saturating_add(ttl_millis)
            }
            None => NO_EXPIRY,
        }
    }
}

#[async_trait]
impl Store for LmdbStore {
    async fn get(&self, namespace: Namespace, id: &str) -> FleetCacheResult<Option<CacheRecord>> {
        let key = NamespacedKey::new(namespace, id).encode();
        let now_millis = self.clock.now().timestamp_millis();

        let rtxn = self
            .env
            .read_txn()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;

        let found = match self.db.get(&rtxn, &key) {
            Ok(Some(bytes)) => Self::decode_live(namespace, bytes, now_millis)?,
            Ok(None) => None,
            Err(e) => {
                self.record_reads(0, 1);
                return Err(LmdbStoreError::Transaction(e.to_string()).into());
            }
        };

        match found {
            Some(_) => self.record_reads(1, 0),
            None => self.record_reads(0, 1),
        }
        Ok(found)
    }

    async fn get_all(&self, namespace: Namespace, ids: &[String]) -> FleetCacheResult<BatchRead> {
        let now_millis = self.clock.now().timestamp_millis();
        let rtxn = self
            .env
            .read_txn()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;

        let mut found = Vec::with_capacity(ids.len());
        let mut unreadable = Vec::new();
        for id in ids {
            let key = NamespacedKey::new(namespace, id.as_str()).encode();
            let bytes = self
                .db
                .get(&rtxn, &key)
                .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;
            let Some(bytes) = bytes else { continue };
            match Self::decode_live(namespace, bytes, now_millis) {
                Ok(Some(record)) => found.push(record),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(namespace = %namespace, id = %id, error = %e, "Corrupt record in batch read");
                    unreadable.push(id.clone());
                }
            }
        }

        let hits = found.len() as u64;
        self.record_reads(hits, (ids.len() as u64).saturating_sub(hits));
        Ok(BatchRead {
            records: found,
            unreadable,
        })
    }

    async fn get_identifiers(&self, namespace: Namespace) -> FleetCacheResult<Vec<String>> {
        let prefix = NamespacedKey::namespace_prefix(namespace);
        let now_millis = self.clock.now().timestamp_millis();

        let rtxn = self
            .env
            .read_txn()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;
        let iter = self
            .db
            .iter(&rtxn)
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;

        let mut ids = Vec::new();
        for result in iter {
            let Ok((key, value)) = result else { continue };
            if !key.starts_with(&prefix) {
                continue;
            }
            let live = StoredValue::parse(value)
                .map(|stored| stored.is_live(now_millis))
                .unwrap_or(false);
            if !live {
                continue;
            }
            if let Some(key) = NamespacedKey::decode(key) {
                ids.push(key.into_id());
            }
        }
        Ok(ids)
    }

    async fn put(
        &self,
        namespace: Namespace,
        record: CacheRecord,
        ttl: Option<Duration>,
    ) -> FleetCacheResult<()> {
        let key = NamespacedKey::new(namespace, record.id.as_str()).encode();

        let body =
            serde_json::to_vec(&record).map_err(|e| LmdbStoreError::Serialization(e.to_string()))?;
        let mut value = Vec::with_capacity(HEADER_LEN + body.len());
        value.extend_from_slice(&self.expiry_millis(ttl).to_le_bytes());
        value.extend_from_slice(&body);

        let mut wtxn = self
            .env
            .write_txn()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;

        self.db
            .put(&mut wtxn, &key, &value)
            .map_err(|e| StoreError::WriteFailed {
                namespace,
                id: record.id.clone(),
                reason: e.to_string(),
            })?;

        wtxn.commit()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;

        Ok(())
    }

    async fn evict(&self, namespace: Namespace, ids: &[String]) -> FleetCacheResult<u64> {
        let keys: Vec<Vec<u8>> = ids
            .iter()
            .map(|id| NamespacedKey::new(namespace, id.as_str()).encode())
            .collect();
        let evicted = self
            .delete_keys(&keys)
            .map_err(|e| StoreError::EvictionFailed {
                namespace,
                reason: e.to_string(),
            })?;

        if evicted > 0 {
            if let Ok(mut stats) = self.stats.write() {
                stats.evictions += evicted;
            }
        }
        Ok(evicted)
    }

    async fn stats(&self) -> FleetCacheResult<StoreStats> {
        let entry_count = {
            let rtxn = self
                .env
                .read_txn()
                .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;
            self.db
                .len(&rtxn)
                .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?
        };

        let mut stats = self
            .stats
            .read()
            .map(|s| s.clone())
            .unwrap_or_default();
        stats.entry_count = entry_count;
        Ok(stats)
    }
}
