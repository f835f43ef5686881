//! Multi-namespace entity graphs and their snapshot encoding.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::{CacheRecord, Namespace, RecordIndex, SnapshotError};

/// Records across namespaces, as produced for one or more server groups.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityGraph {
    namespaces: BTreeMap<Namespace, RecordIndex>,
}

impl EntityGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn index(&self, namespace: Namespace) -> Option<&RecordIndex> {
        self.namespaces.get(&namespace)
    }

    /// Mutable index for `namespace`, created empty if absent.
    pub fn index_mut(&mut self, namespace: Namespace) -> &mut RecordIndex {
        self.namespaces.entry(namespace).or_default()
    }

    pub fn get(&self, namespace: Namespace, id: &str) -> Option<&CacheRecord> {
        self.index(namespace).and_then(|index| index.get(id))
    }

    pub fn len(&self, namespace: Namespace) -> usize {
        self.index(namespace).map(RecordIndex::len).unwrap_or(0)
    }

    pub fn record_count(&self) -> usize {
        self.namespaces.values().map(RecordIndex::len).sum()
    }

    /// True when no namespace holds any record.
    pub fn is_empty(&self) -> bool {
        self.namespaces.values().all(RecordIndex::is_empty)
    }

    /// Merge every namespace of `other` into this graph.
    pub fn merge(&mut self, other: EntityGraph) {
        for (namespace, index) in other.namespaces {
            self.index_mut(namespace).merge_all(index);
        }
    }

    /// Split the graph into per-namespace record lists.
    ///
    /// The four graph namespaces are always present, possibly empty.
    pub fn into_namespaces(mut self) -> BTreeMap<Namespace, Vec<CacheRecord>> {
        for namespace in Namespace::GRAPH {
            self.index_mut(namespace);
        }
        self.namespaces
            .into_iter()
            .map(|(namespace, index)| (namespace, index.into_records()))
            .collect()
    }

    /// Encode for storage inside an on-demand entry.
    pub fn encode(&self) -> Result<String, SnapshotError> {
        serde_json::to_string(self).map_err(|e| SnapshotError::Encode {
            reason: e.to_string(),
        })
    }

    pub fn decode(encoded: &str) -> Result<Self, SnapshotError> {
        serde_json::from_str(encoded).map_err(|e| SnapshotError::Decode {
            reason: e.to_string(),
        })
    }
}
