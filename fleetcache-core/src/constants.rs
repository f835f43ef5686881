//! Constants for FleetCache
//!
//! Defaults shared by configuration, the caching agent and the stores.

// ============================================================================
// AGENT
// ============================================================================

/// Lifetime of on-demand entries and eviction markers in seconds (10 minutes)
pub const DEFAULT_ON_DEMAND_TTL_SECS: u64 = 600;

/// Provider id used as the first segment of every cache key
pub const DEFAULT_PROVIDER_ID: &str = "azure";

/// Prefix joined to an application name to form its resource group
pub const DEFAULT_RESOURCE_GROUP_PREFIX: &str = "rg-";

/// Interval between reconciliation passes in seconds
pub const DEFAULT_SCAN_INTERVAL_SECS: u64 = 60;

/// Maximum number of per-server-group instance fetches in flight
pub const DEFAULT_MAX_CONCURRENT_FETCHES: usize = 8;

/// Suffix of the agent type tag attached to on-demand results
pub const AGENT_TYPE_SUFFIX: &str = "ServerGroupCachingAgent";

// ============================================================================
// ON-DEMAND REQUESTS
// ============================================================================

/// Request field naming the server group to refresh
pub const REQUEST_SERVER_GROUP_NAME: &str = "serverGroupName";

/// Request field naming the account
pub const REQUEST_ACCOUNT: &str = "account";

/// Request field naming the region
pub const REQUEST_REGION: &str = "region";

// ============================================================================
// ENVIRONMENT
// ============================================================================

pub const ENV_ACCOUNT: &str = "FLEETCACHE_ACCOUNT";
pub const ENV_REGION: &str = "FLEETCACHE_REGION";
pub const ENV_PROVIDER_ID: &str = "FLEETCACHE_PROVIDER_ID";
pub const ENV_ON_DEMAND_TTL_SECS: &str = "FLEETCACHE_ON_DEMAND_TTL_SECS";
pub const ENV_RESOURCE_GROUP_PREFIX: &str = "FLEETCACHE_RESOURCE_GROUP_PREFIX";
pub const ENV_SCAN_INTERVAL_SECS: &str = "FLEETCACHE_SCAN_INTERVAL_SECS";
pub const ENV_MAX_CONCURRENT_FETCHES: &str = "FLEETCACHE_MAX_CONCURRENT_FETCHES";
