//! Applying results against a store.
//!
//! A reconciliation result is authoritative for the agent's scope: its graph
//! records replace the stored ones, and stored server groups and instances of
//! the scope that the pass did not produce are evicted. An on-demand result
//! covers a single server group, so its graph records are folded into the
//! stored ones instead of replacing them.
//!
//! `onDemand` records keep the on-demand TTL; graph records never expire.
//! Evictions are applied after every write so a record both written and
//! evicted in one result ends up evicted.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use fleetcache_core::{CacheRecord, FleetCacheResult, Namespace};
use fleetcache_storage::Store;

use crate::agent::ServerGroupCachingAgent;
use crate::result::{CacheResult, OnDemandResult};

/// Namespaces whose keys carry both account and region, so stored ids can be
/// attributed to a single agent scope.
const SCOPED_NAMESPACES: [Namespace; 2] = [Namespace::ServerGroups, Namespace::Instances];

/// Counts from one publish.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishSummary {
    pub written: u64,
    /// Records removed because the result listed them for eviction.
    pub evicted: u64,
    /// Stored records of the agent's scope that a full pass no longer produced.
    pub pruned: u64,
}

/// Write a reconciliation result for `agent`.
pub async fn publish_cache_result(
    store: &dyn Store,
    result: &CacheResult,
    agent: &ServerGroupCachingAgent,
) -> FleetCacheResult<PublishSummary> {
    let ttl = agent.config().on_demand_ttl;
    let mut written = 0u64;
    for (namespace, records) in &result.namespaces {
        for record in records {
            store
                .put(*namespace, record.clone(), ttl_for(*namespace, ttl))
                .await?;
            written += 1;
        }
    }

    let pruned = prune_unproduced(store, result, agent).await?;
    let evicted = apply_evictions(store, &result.evictions).await?;

    tracing::debug!(
        agent_type = %agent.agent_type(),
        written,
        pruned,
        evicted,
        "Published cache result"
    );
    Ok(PublishSummary {
        written,
        evicted,
        pruned,
    })
}

/// Write an on-demand result for `agent`.
///
/// The handler has already stored the snapshot or tombstone; this folds the
/// built graph into the authoritative namespaces and applies the handler's
/// evictions.
pub async fn publish_on_demand_result(
    store: &dyn Store,
    result: &OnDemandResult,
    agent: &ServerGroupCachingAgent,
) -> FleetCacheResult<PublishSummary> {
    let ttl = agent.config().on_demand_ttl;
    let mut written = 0u64;
    for (namespace, records) in &result.cache_result.namespaces {
        for record in records {
            if namespace.is_graph() {
                fold_into_store(store, *namespace, record.clone()).await?;
            } else {
                store
                    .put(*namespace, record.clone(), ttl_for(*namespace, ttl))
                    .await?;
            }
            written += 1;
        }
    }

    let mut evicted = apply_evictions(store, &result.cache_result.evictions).await?;
    evicted += apply_evictions(store, &result.evictions).await?;

    tracing::debug!(
        source_agent_type = %result.source_agent_type,
        written,
        evicted,
        "Published on-demand result"
    );
    Ok(PublishSummary {
        written,
        evicted,
        pruned: 0,
    })
}

fn ttl_for(namespace: Namespace, on_demand_ttl: Duration) -> Option<Duration> {
    match namespace {
        Namespace::OnDemand => Some(on_demand_ttl),
        _ => None,
    }
}

/// Merge `incoming` into the stored record with its id, if any.
async fn fold_into_store(
    store: &dyn Store,
    namespace: Namespace,
    incoming: CacheRecord,
) -> FleetCacheResult<()> {
    let record = match store.get(namespace, &incoming.id).await? {
        Some(mut existing) => {
            existing.absorb(incoming);
            existing
        }
        None => incoming,
    };
    store.put(namespace, record, None).await
}

/// Evict stored ids of the agent's scope that `result` did not produce.
///
/// Only namespaces present in `result` are considered.
async fn prune_unproduced(
    store: &dyn Store,
    result: &CacheResult,
    agent: &ServerGroupCachingAgent,
) -> FleetCacheResult<u64> {
    let mut pruned = 0u64;
    for namespace in SCOPED_NAMESPACES {
        let Some(records) = result.namespaces.get(&namespace) else {
            continue;
        };
        let produced: BTreeSet<&str> = records.iter().map(|record| record.id.as_str()).collect();
        let stale: Vec<String> = store
            .get_identifiers(namespace)
            .await?
            .into_iter()
            .filter(|id| !produced.contains(id.as_str()))
            .filter(|id| {
                agent
                    .keys()
                    .parse(id)
                    .map(|details| details.is_in(agent.scope()))
                    .unwrap_or(false)
            })
            .collect();
        if stale.is_empty() {
            continue;
        }
        tracing::debug!(namespace = %namespace, count = stale.len(), "Pruning records missing from pass");
        pruned += store.evict(namespace, &stale).await?;
    }
    Ok(pruned)
}

async fn apply_evictions(
    store: &dyn Store,
    evictions: &BTreeMap<Namespace, Vec<String>>,
) -> FleetCacheResult<u64> {
    let mut evicted = 0u64;
    for (namespace, ids) in evictions {
        if ids.is_empty() {
            continue;
        }
        evicted += store.evict(*namespace, ids).await?;
    }
    Ok(evicted)
}
