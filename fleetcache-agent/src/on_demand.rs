//! On-demand request handler.
//!
//! Services a targeted refresh of one server group: validate scope, fetch,
//! build the graph, then store either a fresh snapshot or a tombstone so the
//! next reconciliation pass resolves the race correctly.

use std::collections::BTreeMap;
use std::time::Instant;

use fleetcache_core::constants::{REQUEST_ACCOUNT, REQUEST_REGION, REQUEST_SERVER_GROUP_NAME};
use fleetcache_core::{
    build_server_group_graph, resource_group_for_server_group, EntityGraph, FleetCacheResult,
    Namespace, OnDemandEntry, OnDemandType,
};

use crate::agent::ServerGroupCachingAgent;
use crate::request::OnDemandRequest;
use crate::result::{CacheResult, OnDemandResult, PendingOnDemandRequest};

impl ServerGroupCachingAgent {
    /// The kind of resource this handler refreshes.
    pub fn on_demand_type(&self) -> OnDemandType {
        OnDemandType::ServerGroup
    }

    /// Whether this handler services `kind` requests for `provider`.
    pub fn handles(&self, kind: OnDemandType, provider: &str) -> bool {
        kind == self.on_demand_type() && provider == self.provider_id()
    }

    /// True iff the request names a server group in this agent's scope.
    pub fn valid_keys(&self, request: &OnDemandRequest) -> bool {
        let fields = (
            request.field(REQUEST_SERVER_GROUP_NAME),
            request.field(REQUEST_ACCOUNT),
            request.field(REQUEST_REGION),
        );
        match fields {
            (Some(_), Some(account), Some(region)) => self.scope().contains(account, region),
            _ => false,
        }
    }

    /// Refresh one server group.
    ///
    /// Returns `Ok(None)` when the request is out of scope or the provider
    /// could not be read; in both cases nothing was written. Store failures
    /// while recording the outcome are returned as errors.
    pub async fn handle(&self, request: &OnDemandRequest) -> FleetCacheResult<Option<OnDemandResult>> {
        if !self.valid_keys(request) {
            return Ok(None);
        }
        let Some(name) = request.field(REQUEST_SERVER_GROUP_NAME) else {
            return Ok(None);
        };
        let scope = self.scope();

        let Some(resource_group) =
            resource_group_for_server_group(&self.config.resource_group_prefix, name)
        else {
            tracing::debug!(server_group = %name, "No resource group derivable, nothing to refresh");
            return Ok(Some(OnDemandResult::empty(self.agent_type())));
        };

        let fetch_started = Instant::now();
        let fetched = match self.compute.get_server_group(&resource_group, name).await {
            Ok(Some(server_group)) => {
                match self.compute.list_instances(&resource_group, name).await {
                    Ok(instances) => Some((server_group, instances)),
                    Err(e) => {
                        tracing::warn!(
                            server_group = %name,
                            resource_group = %resource_group,
                            error = %e,
                            "Failed to list instances for on-demand refresh"
                        );
                        return Ok(None);
                    }
                }
            }
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(
                    server_group = %name,
                    resource_group = %resource_group,
                    error = %e,
                    "Failed to fetch server group for on-demand refresh"
                );
                return Ok(None);
            }
        };
        let fetch_ms = fetch_started.elapsed().as_millis() as u64;

        let transform_started = Instant::now();
        let graph = match &fetched {
            Some((server_group, instances)) => {
                build_server_group_graph(&self.keys, server_group, instances)
            }
            None => EntityGraph::new(),
        };
        let transform_ms = transform_started.elapsed().as_millis() as u64;

        let key = self
            .keys
            .server_group(name, &scope.region, &scope.account);
        let mut evictions = BTreeMap::new();

        match &fetched {
            Some((server_group, _)) if !graph.is_empty() => {
                let entry = OnDemandEntry::new(key.as_str(), server_group.last_read_time, &graph)?;
                self.on_demand.put(entry).await?;
            }
            _ => {
                self.on_demand.evict(std::slice::from_ref(&key)).await?;
                self.evictions.record_eviction(&key).await?;
                evictions.insert(Namespace::ServerGroups, vec![key.clone()]);
            }
        }

        tracing::info!(
            agent_type = %self.agent_type(),
            id = %key,
            found = fetched.is_some(),
            fetch_ms,
            transform_ms,
            "Handled on-demand refresh"
        );

        Ok(Some(OnDemandResult {
            source_agent_type: self.agent_type(),
            cache_result: CacheResult::from_graph(graph),
            evictions,
        }))
    }

    /// On-demand entries whose keys fall in this agent's scope.
    pub async fn pending_on_demand_requests(&self) -> FleetCacheResult<Vec<PendingOnDemandRequest>> {
        let batch = self.on_demand.all().await?;

        Ok(batch
            .entries
            .into_values()
            .filter_map(|entry| {
                let details = self.keys.parse(&entry.id)?;
                details.is_in(self.scope()).then(|| PendingOnDemandRequest {
                    id: entry.id,
                    details,
                    cache_time: entry.cache_time,
                    processed_count: entry.processed_count,
                    processed_time: entry.processed_time,
                })
            })
            .collect())
    }
}
