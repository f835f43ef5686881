//! FleetCache Test Utilities
//!
//! Centralized test infrastructure for the FleetCache workspace:
//! - Mock compute client with call recording and fault injection
//! - Proptest generators for descriptions and entity graphs
//! - Test fixtures for common scenarios
//! - Tracing initialisation for test binaries

// Re-export the in-memory store from its source crate
pub use fleetcache_storage::InMemoryStore;

// Re-export core types for convenience
pub use fleetcache_core::{
    AgentConfig, AgentScope, CacheRecord, ComputeClient, ComputeError, EntityGraph,
    FleetCacheError, FleetCacheResult, HealthState, InstanceDescription, Keys, ManualClock,
    Namespace, ServerGroupDescription, Timestamp,
};

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Mutex, Once, RwLock};

// ============================================================================
// MOCK COMPUTE CLIENT
// ============================================================================

/// In-memory compute provider.
///
/// Server groups are keyed by `(resource_group, name)`. Every
/// `list_instances` call is recorded so tests can assert which server groups
/// took the fresh-read path.
#[derive(Debug, Default)]
pub struct MockComputeClient {
    server_groups: RwLock<BTreeMap<(String, String), ServerGroupDescription>>,
    instances: RwLock<BTreeMap<(String, String), Vec<InstanceDescription>>>,
    fail_get: RwLock<Option<ComputeError>>,
    fail_instances: RwLock<Option<ComputeError>>,
    instance_calls: Mutex<Vec<(String, String)>>,
}

impl MockComputeClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a server group and its instances under `resource_group`.
    pub fn add_server_group(
        &self,
        resource_group: impl Into<String>,
        server_group: ServerGroupDescription,
        instances: Vec<InstanceDescription>,
    ) {
        let key = (resource_group.into(), server_group.name.clone());
        if let Ok(mut map) = self.instances.write() {
            map.insert(key.clone(), instances);
        }
        if let Ok(mut map) = self.server_groups.write() {
            map.insert(key, server_group);
        }
    }

    pub fn remove_server_group(&self, resource_group: &str, name: &str) {
        let key = (resource_group.to_string(), name.to_string());
        if let Ok(mut map) = self.server_groups.write() {
            map.remove(&key);
        }
        if let Ok(mut map) = self.instances.write() {
            map.remove(&key);
        }
    }

    /// Make every `get_server_group` call fail with `error`.
    pub fn fail_get_with(&self, error: ComputeError) {
        if let Ok(mut slot) = self.fail_get.write() {
            *slot = Some(error);
        }
    }

    /// Make every `list_instances` call fail with `error`.
    pub fn fail_instances_with(&self, error: ComputeError) {
        if let Ok(mut slot) = self.fail_instances.write() {
            *slot = Some(error);
        }
    }

    /// `(resource_group, server_group)` of every `list_instances` call so far.
    pub fn instance_calls(&self) -> Vec<(String, String)> {
        self.instance_calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    pub fn instance_calls_for(&self, server_group: &str) -> usize {
        self.instance_calls()
            .iter()
            .filter(|(_, name)| name == server_group)
            .count()
    }
}

#[async_trait]
impl ComputeClient for MockComputeClient {
    async fn list_server_groups(
        &self,
        scope: &AgentScope,
    ) -> FleetCacheResult<Vec<ServerGroupDescription>> {
        let map = self
            .server_groups
            .read()
            .map_err(|_| poisoned("list_server_groups"))?;
        Ok(map
            .values()
            .filter(|sg| scope.contains(&sg.account, &sg.region))
            .cloned()
            .collect())
    }

    async fn get_server_group(
        &self,
        resource_group: &str,
        name: &str,
    ) -> FleetCacheResult<Option<ServerGroupDescription>> {
        if let Some(error) = self.fail_get.read().ok().and_then(|slot| slot.clone()) {
            return Err(error.into());
        }
        let map = self
            .server_groups
            .read()
            .map_err(|_| poisoned("get_server_group"))?;
        Ok(map
            .get(&(resource_group.to_string(), name.to_string()))
            .cloned())
    }

    async fn list_instances(
        &self,
        resource_group: &str,
        server_group: &str,
    ) -> FleetCacheResult<Vec<InstanceDescription>> {
        if let Ok(mut calls) = self.instance_calls.lock() {
            calls.push((resource_group.to_string(), server_group.to_string()));
        }
        if let Some(error) = self.fail_instances.read().ok().and_then(|slot| slot.clone()) {
            return Err(error.into());
        }
        let map = self
            .instances
            .read()
            .map_err(|_| poisoned("list_instances"))?;
        Ok(map
            .get(&(resource_group.to_string(), server_group.to_string()))
            .cloned()
            .unwrap_or_default())
    }
}

fn poisoned(operation: &str) -> FleetCacheError {
    ComputeError::RequestFailed {
        operation: operation.to_string(),
        reason: "mock state lock poisoned".to_string(),
    }
    .into()
}

// ============================================================================
// TRACING
// ============================================================================

static TRACING: Once = Once::new();

/// Install a test-friendly tracing subscriber once per test binary.
///
/// Honors `RUST_LOG`; defaults to `warn`.
pub fn init_test_tracing() {
    TRACING.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for FleetCache types.

    use super::*;
    use fleetcache_core::build_server_group_graph;
    use proptest::prelude::*;

    /// Generate a Timestamp with millisecond precision (2020-2030).
    pub fn arb_timestamp() -> impl Strategy<Value = Timestamp> {
        (1_577_836_800_000i64..1_893_456_000_000i64).prop_map(fixtures::ts)
    }

    pub fn arb_health_state() -> impl Strategy<Value = HealthState> {
        prop_oneof![
            Just(HealthState::Up),
            Just(HealthState::Down),
            Just(HealthState::Starting),
            Just(HealthState::OutOfService),
            Just(HealthState::Unknown),
        ]
    }

    /// Extension values limited to JSON types that round-trip exactly.
    pub fn arb_extension_value() -> impl Strategy<Value = serde_json::Value> {
        prop_oneof![
            any::<i64>().prop_map(serde_json::Value::from),
            "[a-zA-Z0-9_ ]{0,12}".prop_map(serde_json::Value::from),
            any::<bool>().prop_map(serde_json::Value::from),
            proptest::collection::vec("[a-z0-9]{1,4}", 0..3).prop_map(serde_json::Value::from),
        ]
    }

    pub fn arb_instance() -> impl Strategy<Value = InstanceDescription> {
        (
            "vm-[0-9]{1,3}",
            arb_health_state(),
            proptest::option::of("[0-9]{1}"),
            proptest::collection::btree_map("[a-z]{1,6}", arb_extension_value(), 0..3),
        )
            .prop_map(|(name, health, zone, extensions)| {
                let mut instance = InstanceDescription::new(name, health);
                instance.zone = zone;
                instance.extensions = extensions;
                instance
            })
    }

    /// A server group in `account`/`region` following the naming convention.
    pub fn arb_server_group(
        account: &'static str,
        region: &'static str,
    ) -> impl Strategy<Value = ServerGroupDescription> {
        (
            "[a-z]{1,6}",
            proptest::option::of("[a-z]{1,4}"),
            1u32..1000,
            proptest::option::of("[a-z]{1,6}-lb"),
            arb_timestamp(),
            proptest::collection::btree_map("[a-z]{1,6}", arb_extension_value(), 0..3),
        )
            .prop_map(move |(application, stack, sequence, load_balancer, read, extensions)| {
                let cluster = match &stack {
                    Some(stack) => format!("{}-{}", application, stack),
                    None => application.clone(),
                };
                ServerGroupDescription {
                    name: format!("{}-v{:03}", cluster, sequence),
                    account: account.to_string(),
                    region: region.to_string(),
                    application,
                    cluster,
                    load_balancer,
                    last_read_time: read,
                    extensions,
                }
            })
    }

    /// A merged graph of up to four server groups.
    pub fn arb_entity_graph() -> impl Strategy<Value = EntityGraph> {
        proptest::collection::vec(
            (
                arb_server_group("my-acct", "eastus"),
                proptest::collection::vec(arb_instance(), 0..4),
            ),
            0..4,
        )
        .prop_map(|groups| {
            let keys = Keys::new("azure");
            let mut graph = EntityGraph::new();
            for (server_group, instances) in &groups {
                graph.merge(build_server_group_graph(&keys, server_group, instances));
            }
            graph
        })
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built test fixtures for common testing scenarios.

    use super::*;
    use chrono::DateTime;
    use std::time::Duration;

    pub const ACCOUNT: &str = "my-acct";
    pub const REGION: &str = "eastus";

    /// Timestamp from epoch milliseconds.
    pub fn ts(millis: i64) -> Timestamp {
        DateTime::from_timestamp_millis(millis).unwrap_or_default()
    }

    /// Agent config scoped to `my-acct`/`eastus` with default TTL.
    pub fn test_config() -> AgentConfig {
        AgentConfig::new(ACCOUNT, REGION).with_scan_interval(Duration::from_secs(1))
    }

    /// `name` must follow `app[-stack[-detail]]-vNNN`; the application is
    /// taken from its first segment.
    pub fn server_group(name: &str, last_read_millis: i64) -> ServerGroupDescription {
        let cluster = name
            .rsplit_once("-v")
            .map(|(cluster, _)| cluster)
            .unwrap_or(name);
        let application = cluster.split('-').next().unwrap_or(cluster);
        ServerGroupDescription {
            name: name.to_string(),
            account: ACCOUNT.to_string(),
            region: REGION.to_string(),
            application: application.to_string(),
            cluster: cluster.to_string(),
            load_balancer: Some(format!("{}-lb", application)),
            last_read_time: ts(last_read_millis),
            extensions: Default::default(),
        }
    }

    pub fn instances(names: &[&str]) -> Vec<InstanceDescription> {
        names
            .iter()
            .map(|name| InstanceDescription::new(*name, HealthState::Up))
            .collect()
    }

    pub fn keys() -> Keys {
        Keys::new("azure")
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions for FleetCache-specific validation.

    use super::*;

    /// Assert that a FleetCacheResult is Ok.
    #[track_caller]
    pub fn assert_ok<T: std::fmt::Debug>(result: &FleetCacheResult<T>) {
        assert!(result.is_ok(), "Expected Ok, got Err: {:?}", result);
    }

    /// Assert that `record` points at `id` in `namespace`.
    #[track_caller]
    pub fn assert_related(record: &CacheRecord, namespace: Namespace, id: &str) {
        assert!(
            record.is_related(namespace, id),
            "Expected {} to relate to {} in {}, relationships: {:?}",
            record.id,
            id,
            namespace,
            record.relationships
        );
    }
}
