//! Results handed back to the platform for publishing.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use fleetcache_core::{CacheRecord, EntityGraph, KeyDetails, Namespace, Timestamp};

// ============================================================================
// CACHE RESULT
// ============================================================================

/// Records per namespace plus ids to evict per namespace.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheResult {
    pub namespaces: BTreeMap<Namespace, Vec<CacheRecord>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub evictions: BTreeMap<Namespace, Vec<String>>,
}

impl CacheResult {
    /// A result holding the four graph namespaces of `graph`.
    pub fn from_graph(graph: EntityGraph) -> Self {
        Self {
            namespaces: graph.into_namespaces(),
            evictions: BTreeMap::new(),
        }
    }

    pub fn records(&self, namespace: Namespace) -> &[CacheRecord] {
        self.namespaces
            .get(&namespace)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn record(&self, namespace: Namespace, id: &str) -> Option<&CacheRecord> {
        self.records(namespace).iter().find(|record| record.id == id)
    }

    pub fn evictions_for(&self, namespace: Namespace) -> &[String] {
        self.evictions
            .get(&namespace)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn record_count(&self) -> usize {
        self.namespaces.values().map(Vec::len).sum()
    }

    /// True when no namespace holds a record.
    pub fn is_empty(&self) -> bool {
        self.namespaces.values().all(Vec::is_empty)
    }
}

// ============================================================================
// ON-DEMAND RESULT
// ============================================================================

/// Outcome of one targeted refresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnDemandResult {
    /// Agent type of the handler that produced this result.
    pub source_agent_type: String,
    pub cache_result: CacheResult,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub evictions: BTreeMap<Namespace, Vec<String>>,
}

impl OnDemandResult {
    /// A no-op result: nothing to write, nothing to evict.
    pub fn empty(source_agent_type: impl Into<String>) -> Self {
        Self {
            source_agent_type: source_agent_type.into(),
            cache_result: CacheResult::default(),
            evictions: BTreeMap::new(),
        }
    }

    pub fn evictions_for(&self, namespace: Namespace) -> &[String] {
        self.evictions
            .get(&namespace)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

// ============================================================================
// PENDING REQUESTS
// ============================================================================

/// An on-demand entry awaiting (or past) consumption by a reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingOnDemandRequest {
    pub id: String,
    pub details: KeyDetails,
    pub cache_time: Timestamp,
    pub processed_count: u32,
    pub processed_time: Option<Timestamp>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetcache_core::{ApplicationAttributes, RecordAttributes};

    #[test]
    fn test_from_graph_has_graph_namespaces() {
        let mut graph = EntityGraph::new();
        graph
            .index_mut(Namespace::Applications)
            .get_or_create("azure:applications:app", || {
                RecordAttributes::Application(ApplicationAttributes {
                    name: "app".to_string(),
                })
            });
        let result = CacheResult::from_graph(graph);
        for namespace in Namespace::GRAPH {
            assert!(result.namespaces.contains_key(&namespace));
        }
        assert_eq!(result.record_count(), 1);
        assert!(result.record(Namespace::Applications, "azure:applications:app").is_some());
        assert!(result.evictions_for(Namespace::OnDemand).is_empty());
        assert!(!result.is_empty());
    }

    #[test]
    fn test_empty_on_demand_result() {
        let result = OnDemandResult::empty("acct/eastus/ServerGroupCachingAgent");
        assert!(result.cache_result.is_empty());
        assert!(result.evictions.is_empty());
        let json = serde_json::to_string(&result).expect("serialize");
        assert!(json.contains("sourceAgentType"));
    }
}
