//! The server-group caching agent.
//!
//! One agent owns one account + region. It exposes the periodic entry point
//! (`load_data`, see [`crate::reconciler`]) and the event entry point
//! (`handle`, see [`crate::on_demand`]). Both paths share the key builder,
//! the on-demand store adapter and the eviction tracker; they never share
//! in-process locks.

use std::sync::Arc;

use fleetcache_core::constants::AGENT_TYPE_SUFFIX;
use fleetcache_core::{
    AgentConfig, AgentScope, Clock, ComputeClient, FleetCacheResult, Keys, SystemClock,
};
use fleetcache_storage::{EvictionTracker, OnDemandStore, Store};

pub struct ServerGroupCachingAgent {
    pub(crate) config: AgentConfig,
    pub(crate) keys: Keys,
    pub(crate) compute: Arc<dyn ComputeClient>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) on_demand: OnDemandStore,
    pub(crate) evictions: EvictionTracker,
}

impl ServerGroupCachingAgent {
    /// Create an agent reading the wall clock.
    ///
    /// Fails if `config` does not validate.
    pub fn new(
        config: AgentConfig,
        store: Arc<dyn Store>,
        compute: Arc<dyn ComputeClient>,
    ) -> FleetCacheResult<Self> {
        Self::with_clock(config, store, compute, Arc::new(SystemClock))
    }

    pub fn with_clock(
        config: AgentConfig,
        store: Arc<dyn Store>,
        compute: Arc<dyn ComputeClient>,
        clock: Arc<dyn Clock>,
    ) -> FleetCacheResult<Self> {
        config.validate()?;

        let keys = Keys::new(config.provider_id.clone());
        let on_demand = OnDemandStore::new(store.clone(), config.on_demand_ttl);
        let evictions = EvictionTracker::new(store, clock.clone(), config.on_demand_ttl);

        Ok(Self {
            config,
            keys,
            compute,
            clock,
            on_demand,
            evictions,
        })
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn keys(&self) -> &Keys {
        &self.keys
    }

    pub fn scope(&self) -> &AgentScope {
        &self.config.scope
    }

    /// Identity tag attached to on-demand results.
    pub fn agent_type(&self) -> String {
        format!(
            "{}/{}/{}",
            self.config.scope.account, self.config.scope.region, AGENT_TYPE_SUFFIX
        )
    }

    pub fn provider_id(&self) -> &str {
        self.keys.provider()
    }
}

impl std::fmt::Debug for ServerGroupCachingAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerGroupCachingAgent")
            .field("agent_type", &self.agent_type())
            .field("provider_id", &self.provider_id())
            .finish()
    }
}
