//! FleetCache Core - Types and Pure Logic
//!
//! Data model, cache key derivation, the merge engine and the entity graph
//! builder. Nothing in this crate performs I/O; the store and the compute
//! provider are reached through traits implemented elsewhere.

use chrono::{DateTime, Utc};

pub mod builder;
pub mod clock;
pub mod compute;
pub mod config;
pub mod constants;
pub mod entries;
pub mod error;
pub mod graph;
pub mod keys;
pub mod merge;
pub mod model;
pub mod namespace;
pub mod naming;
pub mod record;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

pub use builder::build_server_group_graph;
pub use clock::{Clock, ManualClock, SystemClock};
pub use compute::ComputeClient;
pub use config::AgentConfig;
pub use entries::{EvictionMarker, OnDemandEntry, OnDemandType};
pub use error::{
    ComputeError, ConfigError, FleetCacheError, FleetCacheResult, SnapshotError, StoreError,
    ValidationError,
};
pub use graph::EntityGraph;
pub use keys::{KeyDetails, Keys};
pub use merge::merge;
pub use model::{AgentScope, Extensions, HealthState, InstanceDescription, ServerGroupDescription};
pub use namespace::Namespace;
pub use naming::{resource_group_for_application, resource_group_for_server_group, ServerGroupName};
pub use record::{
    ApplicationAttributes, CacheRecord, ClusterAttributes, EvictionAttributes, OnDemandAttributes,
    RecordAttributes, RecordIndex,
};
