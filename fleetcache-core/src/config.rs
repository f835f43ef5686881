//! Caching agent configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::constants::{
    DEFAULT_MAX_CONCURRENT_FETCHES, DEFAULT_ON_DEMAND_TTL_SECS, DEFAULT_PROVIDER_ID,
    DEFAULT_RESOURCE_GROUP_PREFIX, DEFAULT_SCAN_INTERVAL_SECS, ENV_ACCOUNT,
    ENV_MAX_CONCURRENT_FETCHES, ENV_ON_DEMAND_TTL_SECS, ENV_PROVIDER_ID, ENV_REGION,
    ENV_RESOURCE_GROUP_PREFIX, ENV_SCAN_INTERVAL_SECS,
};
use crate::{AgentScope, ConfigError};

/// Configuration for one server-group caching agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Account + region this agent reconciles and accepts requests for
    pub scope: AgentScope,

    /// First segment of every cache key (default: "azure")
    pub provider_id: String,

    /// Lifetime of on-demand entries and eviction markers (default: 10 minutes)
    pub on_demand_ttl: Duration,

    /// Prefix used to derive a resource group from an application (default: "rg-")
    pub resource_group_prefix: String,

    /// Time between reconciliation passes (default: 60 seconds)
    pub scan_interval: Duration,

    /// Upper bound on concurrent instance fetches during a pass (default: 8)
    pub max_concurrent_fetches: usize,
}

impl AgentConfig {
    pub fn new(account: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            scope: AgentScope::new(account, region),
            provider_id: DEFAULT_PROVIDER_ID.to_string(),
            on_demand_ttl: Duration::from_secs(DEFAULT_ON_DEMAND_TTL_SECS),
            resource_group_prefix: DEFAULT_RESOURCE_GROUP_PREFIX.to_string(),
            scan_interval: Duration::from_secs(DEFAULT_SCAN_INTERVAL_SECS),
            max_concurrent_fetches: DEFAULT_MAX_CONCURRENT_FETCHES,
        }
    }

    pub fn with_provider_id(mut self, provider_id: impl Into<String>) -> Self {
        self.provider_id = provider_id.into();
        self
    }

    pub fn with_on_demand_ttl(mut self, ttl: Duration) -> Self {
        self.on_demand_ttl = ttl;
        self
    }

    pub fn with_resource_group_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.resource_group_prefix = prefix.into();
        self
    }

    pub fn with_scan_interval(mut self, interval: Duration) -> Self {
        self.scan_interval = interval;
        self
    }

    pub fn with_max_concurrent_fetches(mut self, max: usize) -> Self {
        self.max_concurrent_fetches = max;
        self
    }

    /// Create AgentConfig from environment variables.
    ///
    /// # Environment Variables
    /// - `FLEETCACHE_ACCOUNT`: Account to reconcile (required)
    /// - `FLEETCACHE_REGION`: Region to reconcile (required)
    /// - `FLEETCACHE_PROVIDER_ID`: Key provider segment (default: azure)
    /// - `FLEETCACHE_ON_DEMAND_TTL_SECS`: On-demand entry lifetime (default: 600)
    /// - `FLEETCACHE_RESOURCE_GROUP_PREFIX`: Resource group prefix (default: rg-)
    /// - `FLEETCACHE_SCAN_INTERVAL_SECS`: Pass interval (default: 60)
    /// - `FLEETCACHE_MAX_CONCURRENT_FETCHES`: Fetch concurrency (default: 8)
    ///
    /// The returned config is validated.
    pub fn from_env() -> Result<Self, ConfigError> {
        let account = required_var(ENV_ACCOUNT)?;
        let region = required_var(ENV_REGION)?;

        let provider_id =
            std::env::var(ENV_PROVIDER_ID).unwrap_or_else(|_| DEFAULT_PROVIDER_ID.to_string());

        let on_demand_ttl = Duration::from_secs(parsed_var(
            ENV_ON_DEMAND_TTL_SECS,
            DEFAULT_ON_DEMAND_TTL_SECS,
        )?);

        let resource_group_prefix = std::env::var(ENV_RESOURCE_GROUP_PREFIX)
            .unwrap_or_else(|_| DEFAULT_RESOURCE_GROUP_PREFIX.to_string());

        let scan_interval = Duration::from_secs(parsed_var(
            ENV_SCAN_INTERVAL_SECS,
            DEFAULT_SCAN_INTERVAL_SECS,
        )?);

        let max_concurrent_fetches =
            parsed_var(ENV_MAX_CONCURRENT_FETCHES, DEFAULT_MAX_CONCURRENT_FETCHES)?;

        let config = Self {
            scope: AgentScope::new(account, region),
            provider_id,
            on_demand_ttl,
            resource_group_prefix,
            scan_interval,
            max_concurrent_fetches,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scope.account.trim().is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "account".to_string(),
            });
        }
        if self.scope.region.trim().is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "region".to_string(),
            });
        }
        if self.provider_id.is_empty() || self.provider_id.contains(':') {
            return Err(ConfigError::InvalidValue {
                field: "provider_id".to_string(),
                value: self.provider_id.clone(),
                reason: "must be non-empty and contain no ':'".to_string(),
            });
        }
        if self.on_demand_ttl.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "on_demand_ttl".to_string(),
                value: "0".to_string(),
                reason: "must be positive".to_string(),
            });
        }
        if self.scan_interval.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "scan_interval".to_string(),
                value: "0".to_string(),
                reason: "must be positive".to_string(),
            });
        }
        if self.max_concurrent_fetches == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_concurrent_fetches".to_string(),
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

fn required_var(name: &str) -> Result<String, ConfigError> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::MissingRequired {
            field: name.to_string(),
        }),
    }
}

fn parsed_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T, ConfigError> {
    match std::env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
            field: name.to_string(),
            value: raw.clone(),
            reason: "not a valid number".to_string(),
        }),
        Err(_) => Ok(default),
    }
}
