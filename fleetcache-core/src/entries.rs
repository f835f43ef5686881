//! On-demand snapshots and eviction markers.
//!
//! Both live in the store as ordinary [`CacheRecord`]s; these types are the
//! typed view used by the agent and the store adapters.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{
    CacheRecord, EntityGraph, EvictionAttributes, OnDemandAttributes, RecordAttributes,
    SnapshotError, Timestamp, ValidationError,
};

// ============================================================================
// ON-DEMAND ENTRY
// ============================================================================

/// A captured single-server-group graph, keyed by the server-group key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnDemandEntry {
    pub id: String,
    /// `last_read_time` of the server group at capture.
    pub cache_time: Timestamp,
    pub serialized_graph: String,
    pub processed_count: u32,
    pub processed_time: Option<Timestamp>,
}

impl OnDemandEntry {
    /// Capture `graph` as a fresh, never-processed entry.
    pub fn new(
        id: impl Into<String>,
        cache_time: Timestamp,
        graph: &EntityGraph,
    ) -> Result<Self, SnapshotError> {
        Ok(Self {
            id: id.into(),
            cache_time,
            serialized_graph: graph.encode()?,
            processed_count: 0,
            processed_time: None,
        })
    }

    pub fn graph(&self) -> Result<EntityGraph, SnapshotError> {
        EntityGraph::decode(&self.serialized_graph)
    }

    /// Whether this entry is newer than the given read of the server group.
    pub fn is_newer_than(&self, last_read_time: Timestamp) -> bool {
        self.cache_time > last_read_time
    }

    /// Stamp one consumption by a reconciliation pass.
    pub fn mark_processed(&mut self, now: Timestamp) {
        self.processed_time = Some(now);
        self.processed_count = self.processed_count.saturating_add(1);
    }

    pub fn into_record(self) -> CacheRecord {
        CacheRecord::new(
            self.id,
            RecordAttributes::OnDemand(OnDemandAttributes {
                cache_time: self.cache_time,
                serialized_graph: self.serialized_graph,
                processed_count: self.processed_count,
                processed_time: self.processed_time,
            }),
        )
    }
}

impl TryFrom<CacheRecord> for OnDemandEntry {
    type Error = ValidationError;

    fn try_from(record: CacheRecord) -> Result<Self, Self::Error> {
        match record.attributes {
            RecordAttributes::OnDemand(attributes) => Ok(Self {
                id: record.id,
                cache_time: attributes.cache_time,
                serialized_graph: attributes.serialized_graph,
                processed_count: attributes.processed_count,
                processed_time: attributes.processed_time,
            }),
            other => Err(ValidationError::UnexpectedAttributes {
                id: record.id,
                expected: "onDemand".to_string(),
                found: other.kind().to_string(),
            }),
        }
    }
}

// ============================================================================
// EVICTION MARKER
// ============================================================================

/// Tombstone asserting a server group was confirmed gone at `eviction_time`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvictionMarker {
    pub id: String,
    pub eviction_time: Timestamp,
}

impl EvictionMarker {
    pub fn new(id: impl Into<String>, eviction_time: Timestamp) -> Self {
        Self {
            id: id.into(),
            eviction_time,
        }
    }

    /// True when this marker postdates `time`.
    pub fn supersedes(&self, time: Timestamp) -> bool {
        self.eviction_time > time
    }

    pub fn into_record(self) -> CacheRecord {
        CacheRecord::new(
            self.id,
            RecordAttributes::Eviction(EvictionAttributes {
                eviction_time: self.eviction_time,
            }),
        )
    }
}

impl TryFrom<CacheRecord> for EvictionMarker {
    type Error = ValidationError;

    fn try_from(record: CacheRecord) -> Result<Self, Self::Error> {
        match record.attributes {
            RecordAttributes::Eviction(attributes) => Ok(Self {
                id: record.id,
                eviction_time: attributes.eviction_time,
            }),
            other => Err(ValidationError::UnexpectedAttributes {
                id: record.id,
                expected: "eviction".to_string(),
                found: other.kind().to_string(),
            }),
        }
    }
}

// ============================================================================
// ON-DEMAND TYPE
// ============================================================================

/// Kind of resource an on-demand handler refreshes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OnDemandType {
    ServerGroup,
}

impl OnDemandType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OnDemandType::ServerGroup => "ServerGroup",
        }
    }
}

impl fmt::Display for OnDemandType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ApplicationAttributes, Namespace};
    use chrono::DateTime;

    fn ts(millis: i64) -> Timestamp {
        DateTime::from_timestamp_millis(millis).expect("valid millis")
    }

    fn graph() -> EntityGraph {
        let mut graph = EntityGraph::new();
        graph
            .index_mut(Namespace::Applications)
            .get_or_create("azure:applications:app", || {
                RecordAttributes::Application(ApplicationAttributes {
                    name: "app".to_string(),
                })
            });
        graph
    }

    #[test]
    fn test_new_entry_is_unprocessed() {
        let entry = OnDemandEntry::new("sg", ts(1000), &graph()).expect("encode");
        assert_eq!(entry.processed_count, 0);
        assert!(entry.processed_time.is_none());
        assert_eq!(entry.graph().expect("decode"), graph());
    }

    #[test]
    fn test_mark_processed() {
        let mut entry = OnDemandEntry::new("sg", ts(1000), &graph()).expect("encode");
        entry.mark_processed(ts(2000));
        entry.mark_processed(ts(3000));
        assert_eq!(entry.processed_count, 2);
        assert_eq!(entry.processed_time, Some(ts(3000)));
    }

    #[test]
    fn test_newer_than_is_strict() {
        let entry = OnDemandEntry::new("sg", ts(1000), &graph()).expect("encode");
        assert!(entry.is_newer_than(ts(999)));
        assert!(!entry.is_newer_than(ts(1000)));
    }

    #[test]
    fn test_entry_record_roundtrip() {
        let mut entry = OnDemandEntry::new("sg", ts(1000), &graph()).expect("encode");
        entry.mark_processed(ts(1500));
        let record = entry.clone().into_record();
        assert_eq!(OnDemandEntry::try_from(record).expect("typed"), entry);
    }

    #[test]
    fn test_marker_supersedes() {
        let marker = EvictionMarker::new("sg", ts(10));
        assert!(marker.supersedes(ts(5)));
        assert!(!marker.supersedes(ts(10)));
        let back = EvictionMarker::try_from(marker.clone().into_record()).expect("typed");
        assert_eq!(back, marker);
    }

    #[test]
    fn test_wrong_record_kind_is_rejected() {
        let marker = EvictionMarker::new("sg", ts(10)).into_record();
        let err = OnDemandEntry::try_from(marker).unwrap_err();
        assert!(matches!(err, ValidationError::UnexpectedAttributes { .. }));
    }

    #[test]
    fn test_on_demand_type_display() {
        assert_eq!(OnDemandType::ServerGroup.to_string(), "ServerGroup");
    }
}
