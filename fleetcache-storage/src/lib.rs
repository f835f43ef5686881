//! FleetCache Storage - Store Trait and Backends
//!
//! Namespaced record storage with TTL, plus the typed adapters the caching
//! agent uses for on-demand snapshots and eviction markers.

pub mod eviction;
pub mod lmdb;
pub mod memory;
pub mod namespaced_key;
pub mod on_demand;
pub mod store;

pub use eviction::EvictionTracker;
pub use lmdb::{LmdbStore, LmdbStoreError};
pub use memory::InMemoryStore;
pub use namespaced_key::NamespacedKey;
pub use on_demand::{OnDemandBatch, OnDemandStore};
pub use store::{BatchRead, Store, StoreStats};
