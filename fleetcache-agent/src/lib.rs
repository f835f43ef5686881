//! FleetCache Agent - Server-Group Caching Agent
//!
//! Reconciles a compute provider's server groups into the cache. Two writers
//! feed it: the periodic full scan ([`ServerGroupCachingAgent::load_data`])
//! and targeted on-demand refreshes ([`ServerGroupCachingAgent::handle`]).
//! They never lock each other out; timestamps on on-demand entries and
//! eviction markers decide which one wins.

pub mod agent;
pub mod on_demand;
pub mod publish;
pub mod reconciler;
pub mod request;
pub mod result;
pub mod scheduler;

pub use agent::ServerGroupCachingAgent;
pub use publish::{publish_cache_result, publish_on_demand_result, PublishSummary};
pub use request::OnDemandRequest;
pub use result::{CacheResult, OnDemandResult, PendingOnDemandRequest};
pub use scheduler::{caching_agent_task, run_pass, AgentMetrics, AgentMetricsSnapshot};
