//! Reconciler: the periodic full scan.
//!
//! For every server group in scope the pass either trusts a recent on-demand
//! snapshot or rebuilds the graph from a fresh read, then merges everything
//! into one result. Nothing is written here; the caller publishes the result
//! as a whole once the pass has completed.

use std::collections::BTreeSet;
use std::time::Instant;

use futures_util::stream::{self, StreamExt, TryStreamExt};
use uuid::Uuid;

use fleetcache_core::{
    build_server_group_graph, resource_group_for_application, CacheRecord, EntityGraph,
    FleetCacheResult, Namespace, OnDemandEntry, ServerGroupDescription,
};

use crate::agent::ServerGroupCachingAgent;
use crate::result::CacheResult;

/// What a pass makes of the on-demand entry for one server group.
enum Snapshot {
    /// Newer than the scan and not superseded by an eviction.
    Trusted(EntityGraph),
    /// Absent, older than the scan, or evicted since capture.
    Unusable,
    /// Would have been trusted but does not decode.
    Corrupt,
}

impl ServerGroupCachingAgent {
    /// Run one reconciliation pass.
    pub async fn load_data(&self) -> FleetCacheResult<CacheResult> {
        self.load_data_with_evictions(&[]).await
    }

    /// Run one reconciliation pass, passing `flagged_on_demand` through as
    /// `onDemand` evictions.
    ///
    /// Flagged ids are decided by the caller and are not consumed or passed
    /// through as records. Undecodable snapshots are added to the same
    /// eviction list and their server groups are rebuilt from a fresh read.
    pub async fn load_data_with_evictions(
        &self,
        flagged_on_demand: &[String],
    ) -> FleetCacheResult<CacheResult> {
        let pass_id = Uuid::now_v7();
        let started = Instant::now();

        let server_groups = self.compute.list_server_groups(self.scope()).await?;
        let ids: Vec<String> = server_groups
            .iter()
            .map(|server_group| self.server_group_key(server_group))
            .collect();

        let batch = self.on_demand.get_many(&ids).await?;

        let mut graph = EntityGraph::new();
        let mut consumed = BTreeSet::new();
        let mut corrupt = batch.unreadable.clone();
        let mut fresh = Vec::new();

        for (server_group, id) in server_groups.iter().zip(&ids) {
            match self.snapshot_for(batch.get(id), server_group).await? {
                Snapshot::Trusted(snapshot) => {
                    graph.merge(snapshot);
                    consumed.insert(id.clone());
                }
                Snapshot::Corrupt => {
                    corrupt.push(id.clone());
                    fresh.push(server_group);
                }
                Snapshot::Unusable => fresh.push(server_group),
            }
        }

        let fresh_count = fresh.len();
        let built: Vec<EntityGraph> = match stream::iter(fresh)
            .map(|server_group| self.fresh_graph(server_group))
            .buffered(self.config.max_concurrent_fetches)
            .boxed()
            .try_collect()
            .await
        {
            Ok(built) => built,
            Err(e) => {
                tracing::error!(
                    pass_id = %pass_id,
                    agent_type = %self.agent_type(),
                    error = %e,
                    "Reconciliation pass aborted"
                );
                return Err(e);
            }
        };
        for snapshot in built {
            graph.merge(snapshot);
        }

        let mut on_demand_evictions: Vec<String> = flagged_on_demand.to_vec();
        for id in corrupt {
            if !on_demand_evictions.contains(&id) {
                on_demand_evictions.push(id);
            }
        }

        let mut result = CacheResult::from_graph(graph);

        // Consumed entries are stamped only once the rest of the result exists.
        let now = self.clock.now();
        let pass_through: Vec<CacheRecord> = batch
            .entries
            .into_values()
            .filter(|entry| !on_demand_evictions.contains(&entry.id))
            .map(|mut entry| {
                if consumed.contains(&entry.id) {
                    entry.mark_processed(now);
                }
                entry.into_record()
            })
            .collect();
        result.namespaces.insert(Namespace::OnDemand, pass_through);
        if !on_demand_evictions.is_empty() {
            result
                .evictions
                .insert(Namespace::OnDemand, on_demand_evictions);
        }

        tracing::info!(
            pass_id = %pass_id,
            agent_type = %self.agent_type(),
            server_groups = server_groups.len(),
            on_demand_consumed = consumed.len(),
            fresh_scanned = fresh_count,
            on_demand_evicted = result.evictions_for(Namespace::OnDemand).len(),
            records = result.record_count(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Reconciliation pass completed"
        );

        Ok(result)
    }

    pub(crate) fn server_group_key(&self, server_group: &ServerGroupDescription) -> String {
        self.keys.server_group(
            &server_group.name,
            &server_group.region,
            &server_group.account,
        )
    }

    async fn snapshot_for(
        &self,
        entry: Option<&OnDemandEntry>,
        server_group: &ServerGroupDescription,
    ) -> FleetCacheResult<Snapshot> {
        let Some(entry) = entry else {
            return Ok(Snapshot::Unusable);
        };
        if !entry.is_newer_than(server_group.last_read_time) {
            return Ok(Snapshot::Unusable);
        }
        if self
            .evictions
            .has_been_evicted(&entry.id, entry.cache_time)
            .await?
        {
            tracing::debug!(id = %entry.id, "On-demand entry predates an eviction, rescanning");
            return Ok(Snapshot::Unusable);
        }

        match entry.graph() {
            Ok(snapshot) => Ok(Snapshot::Trusted(snapshot)),
            Err(e) => {
                tracing::warn!(
                    id = %entry.id,
                    error = %e,
                    "Undecodable on-demand snapshot, falling back to fresh scan"
                );
                Ok(Snapshot::Corrupt)
            }
        }
    }

    async fn fresh_graph(
        &self,
        server_group: &ServerGroupDescription,
    ) -> FleetCacheResult<EntityGraph> {
        let resource_group = resource_group_for_application(
            &self.config.resource_group_prefix,
            &server_group.application,
        );
        let instances = self
            .compute
            .list_instances(&resource_group, &server_group.name)
            .await?;
        Ok(build_server_group_graph(&self.keys, server_group, &instances))
    }
}
