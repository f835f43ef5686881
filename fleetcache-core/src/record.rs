//! Cache records and the per-namespace record index.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::{InstanceDescription, Namespace, ServerGroupDescription, Timestamp};

// ============================================================================
// ATTRIBUTES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationAttributes {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterAttributes {
    pub name: String,
    pub account_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnDemandAttributes {
    /// `last_read_time` of the resource when the snapshot was captured.
    pub cache_time: Timestamp,
    /// JSON encoding of the captured [`crate::EntityGraph`].
    pub serialized_graph: String,
    pub processed_count: u32,
    pub processed_time: Option<Timestamp>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvictionAttributes {
    pub eviction_time: Timestamp,
}

/// Attributes of a cache record, one schema per record kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "camelCase")]
pub enum RecordAttributes {
    Application(ApplicationAttributes),
    Cluster(ClusterAttributes),
    ServerGroup(Box<ServerGroupDescription>),
    Instance(Box<InstanceDescription>),
    OnDemand(OnDemandAttributes),
    Eviction(EvictionAttributes),
}

impl RecordAttributes {
    pub fn kind(&self) -> &'static str {
        match self {
            RecordAttributes::Application(_) => "application",
            RecordAttributes::Cluster(_) => "cluster",
            RecordAttributes::ServerGroup(_) => "serverGroup",
            RecordAttributes::Instance(_) => "instance",
            RecordAttributes::OnDemand(_) => "onDemand",
            RecordAttributes::Eviction(_) => "eviction",
        }
    }
}

// ============================================================================
// RECORD
// ============================================================================

/// One logical entity in one namespace.
///
/// Two records with the same `id` describe the same entity and are merged,
/// never stored side by side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheRecord {
    pub id: String,
    pub attributes: RecordAttributes,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub relationships: BTreeMap<Namespace, BTreeSet<String>>,
}

impl CacheRecord {
    pub fn new(id: impl Into<String>, attributes: RecordAttributes) -> Self {
        Self {
            id: id.into(),
            attributes,
            relationships: BTreeMap::new(),
        }
    }

    /// Record a relationship to `id` in `namespace`.
    pub fn relate(&mut self, namespace: Namespace, id: impl Into<String>) -> &mut Self {
        self.relationships
            .entry(namespace)
            .or_default()
            .insert(id.into());
        self
    }

    pub fn related(&self, namespace: Namespace) -> Option<&BTreeSet<String>> {
        self.relationships.get(&namespace)
    }

    /// Whether this record points at `id` in `namespace`.
    pub fn is_related(&self, namespace: Namespace, id: &str) -> bool {
        self.related(namespace)
            .map(|ids| ids.contains(id))
            .unwrap_or(false)
    }

    pub fn relationship_count(&self) -> usize {
        self.relationships.values().map(BTreeSet::len).sum()
    }
}

// ============================================================================
// INDEX
// ============================================================================

/// Records of one namespace, keyed by id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordIndex {
    records: BTreeMap<String, CacheRecord>,
}

impl RecordIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&CacheRecord> {
        self.records.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.records.contains_key(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.records.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CacheRecord> {
        self.records.values()
    }

    /// Fetch the record for `id`, creating it with `attributes` if absent.
    ///
    /// Existing records keep their attributes; `attributes` is only
    /// evaluated on creation.
    pub fn get_or_create<F>(&mut self, id: &str, attributes: F) -> &mut CacheRecord
    where
        F: FnOnce() -> RecordAttributes,
    {
        self.records
            .entry(id.to_string())
            .or_insert_with(|| CacheRecord::new(id, attributes()))
    }

    pub fn into_records(self) -> Vec<CacheRecord> {
        self.records.into_values().collect()
    }

    pub(crate) fn slot(&mut self, id: &str) -> Option<&mut CacheRecord> {
        self.records.get_mut(id)
    }

    pub(crate) fn insert_new(&mut self, record: CacheRecord) {
        self.records.insert(record.id.clone(), record);
    }
}

impl FromIterator<CacheRecord> for RecordIndex {
    fn from_iter<I: IntoIterator<Item = CacheRecord>>(iter: I) -> Self {
        let mut index = RecordIndex::new();
        index.merge_all(iter);
        index
    }
}

impl IntoIterator for RecordIndex {
    type Item = CacheRecord;
    type IntoIter = std::collections::btree_map::IntoValues<String, CacheRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn application(name: &str) -> RecordAttributes {
        RecordAttributes::Application(ApplicationAttributes {
            name: name.to_string(),
        })
    }

    #[test]
    fn test_get_or_create_only_builds_once() {
        let mut index = RecordIndex::new();
        index
            .get_or_create("azure:applications:app", || application("app"))
            .relate(Namespace::Clusters, "c1");

        let mut called = false;
        let record = index.get_or_create("azure:applications:app", || {
            called = true;
            application("other")
        });
        assert!(!called);
        assert_eq!(record.attributes, application("app"));
        assert!(record.is_related(Namespace::Clusters, "c1"));
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_relate_is_set_like() {
        let mut record = CacheRecord::new("id", application("app"));
        record
            .relate(Namespace::ServerGroups, "sg")
            .relate(Namespace::ServerGroups, "sg");
        assert_eq!(record.relationship_count(), 1);
        assert!(record.related(Namespace::Instances).is_none());
    }

    #[test]
    fn test_record_serde_roundtrip() {
        let mut record = CacheRecord::new(
            "azure:clusters:app:app:acct",
            RecordAttributes::Cluster(ClusterAttributes {
                name: "app".to_string(),
                account_name: "acct".to_string(),
            }),
        );
        record.relate(Namespace::Applications, "azure:applications:app");

        let json = serde_json::to_string(&record).expect("serialize");
        assert!(json.contains("\"kind\":\"cluster\""));
        assert!(json.contains("accountName"));
        let back: CacheRecord = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, record);
    }
}
