//! Shared wiring for agent integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use fleetcache_agent::ServerGroupCachingAgent;
use fleetcache_core::{
    EntityGraph, InstanceDescription, Namespace, OnDemandEntry, ServerGroupDescription,
};
use fleetcache_storage::{OnDemandStore, Store};
use fleetcache_test_utils::{
    fixtures, init_test_tracing, InMemoryStore, ManualClock, MockComputeClient,
};

pub struct Harness {
    pub clock: Arc<ManualClock>,
    pub store: Arc<InMemoryStore>,
    pub compute: Arc<MockComputeClient>,
    pub agent: ServerGroupCachingAgent,
}

impl Harness {
    /// Agent scoped to `my-acct`/`eastus` with the clock at `now_millis`.
    pub fn new(now_millis: i64) -> Self {
        init_test_tracing();
        let clock = Arc::new(ManualClock::at_millis(now_millis));
        let store = Arc::new(InMemoryStore::with_clock(clock.clone()));
        let compute = Arc::new(MockComputeClient::new());
        let agent = ServerGroupCachingAgent::with_clock(
            fixtures::test_config(),
            store.clone(),
            compute.clone(),
            clock.clone(),
        )
        .expect("test config is valid");
        Self {
            clock,
            store,
            compute,
            agent,
        }
    }

    /// Register `name` (read at `last_read_millis`) with the mock provider.
    pub fn add_server_group(
        &self,
        name: &str,
        last_read_millis: i64,
        instances: &[&str],
    ) -> ServerGroupDescription {
        let server_group = fixtures::server_group(name, last_read_millis);
        self.compute.add_server_group(
            format!("rg-{}", server_group.application),
            server_group.clone(),
            fixtures::instances(instances),
        );
        server_group
    }

    pub fn key(&self, name: &str) -> String {
        self.agent
            .keys()
            .server_group(name, fixtures::REGION, fixtures::ACCOUNT)
    }

    /// Store an on-demand snapshot of `server_group` captured at `cache_millis`.
    pub async fn seed_snapshot(
        &self,
        server_group: &ServerGroupDescription,
        instances: &[InstanceDescription],
        cache_millis: i64,
    ) -> OnDemandEntry {
        let graph = fleetcache_core::build_server_group_graph(
            self.agent.keys(),
            server_group,
            instances,
        );
        let entry = OnDemandEntry::new(
            self.key(&server_group.name),
            fixtures::ts(cache_millis),
            &graph,
        )
        .expect("graph encodes");
        self.on_demand_store()
            .put(entry.clone())
            .await
            .expect("seed snapshot");
        entry
    }

    /// Store an on-demand entry whose graph cannot be decoded.
    pub async fn seed_corrupt_snapshot(&self, name: &str, cache_millis: i64) {
        let mut entry = OnDemandEntry::new(
            self.key(name),
            fixtures::ts(cache_millis),
            &EntityGraph::new(),
        )
        .expect("graph encodes");
        entry.serialized_graph = "{\"serverGroups\": [".to_string();
        self.on_demand_store()
            .put(entry)
            .await
            .expect("seed corrupt snapshot");
    }

    pub async fn on_demand_entry(&self, id: &str) -> Option<OnDemandEntry> {
        self.on_demand_store().get(id).await.expect("read on-demand")
    }

    pub async fn stored_ids(&self, namespace: Namespace) -> Vec<String> {
        self.store
            .get_identifiers(namespace)
            .await
            .expect("read identifiers")
    }

    pub fn store_dyn(&self) -> Arc<dyn Store> {
        self.store.clone()
    }

    fn on_demand_store(&self) -> OnDemandStore {
        OnDemandStore::new(self.store.clone(), self.agent.config().on_demand_ttl)
    }
}
