//! Resource descriptions as returned by the compute provider.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::Timestamp;

/// Provider-specific fields that have no schema of their own.
pub type Extensions = BTreeMap<String, serde_json::Value>;

/// The account + region pair a caching agent is responsible for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AgentScope {
    pub account: String,
    pub region: String,
}

impl AgentScope {
    pub fn new(account: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            region: region.into(),
        }
    }

    pub fn contains(&self, account: &str, region: &str) -> bool {
        self.account == account && self.region == region
    }
}

/// A server group (scale set) as read from the compute provider.
///
/// Immutable once read: a re-read produces a new value with a newer
/// `last_read_time`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerGroupDescription {
    pub name: String,
    pub account: String,
    pub region: String,
    pub application: String,
    pub cluster: String,
    pub load_balancer: Option<String>,
    /// Set by the compute client at fetch time; monotonic per server group.
    pub last_read_time: Timestamp,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extensions: Extensions,
}

/// Health of a single instance as last reported by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HealthState {
    Up,
    Down,
    Starting,
    OutOfService,
    Unknown,
}

/// One instance (VM) belonging to a server group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceDescription {
    pub name: String,
    pub instance_id: Option<String>,
    pub zone: Option<String>,
    pub health_state: HealthState,
    pub launch_time: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extensions: Extensions,
}

impl InstanceDescription {
    pub fn new(name: impl Into<String>, health_state: HealthState) -> Self {
        Self {
            name: name.into(),
            instance_id: None,
            zone: None,
            health_state,
            launch_time: None,
            extensions: Extensions::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;

    #[test]
    fn test_scope_contains() {
        let scope = AgentScope::new("my-acct", "eastus");
        assert!(scope.contains("my-acct", "eastus"));
        assert!(!scope.contains("other-acct", "eastus"));
        assert!(!scope.contains("my-acct", "westus"));
    }

    #[test]
    fn test_server_group_serde_preserves_extensions() {
        let mut extensions = Extensions::new();
        extensions.insert("sku".to_string(), serde_json::json!({"name": "Standard_B1s"}));
        let description = ServerGroupDescription {
            name: "app-v001".to_string(),
            account: "my-acct".to_string(),
            region: "eastus".to_string(),
            application: "app".to_string(),
            cluster: "app".to_string(),
            load_balancer: Some("app-lb".to_string()),
            last_read_time: DateTime::from_timestamp_millis(1000).expect("valid millis"),
            extensions,
        };

        let json = serde_json::to_string(&description).expect("serialize");
        assert!(json.contains("lastReadTime"));
        let back: ServerGroupDescription = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, description);
    }
}
