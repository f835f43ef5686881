//! Store namespaces.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::ValidationError;

/// Logical partition of the store holding one category of entity.
///
/// The string form doubles as the namespace segment of derived keys
/// (`azure:serverGroups:...`), so it must never change for an existing
/// variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Namespace {
    Applications,
    Clusters,
    ServerGroups,
    Instances,
    LoadBalancers,
    OnDemand,
    Evictions,
}

impl Namespace {
    /// Every namespace, in declaration order.
    pub const ALL: [Namespace; 7] = [
        Namespace::Applications,
        Namespace::Clusters,
        Namespace::ServerGroups,
        Namespace::Instances,
        Namespace::LoadBalancers,
        Namespace::OnDemand,
        Namespace::Evictions,
    ];

    /// The namespaces populated by the entity graph builder.
    pub const GRAPH: [Namespace; 4] = [
        Namespace::Applications,
        Namespace::Clusters,
        Namespace::ServerGroups,
        Namespace::Instances,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Namespace::Applications => "applications",
            Namespace::Clusters => "clusters",
            Namespace::ServerGroups => "serverGroups",
            Namespace::Instances => "instances",
            Namespace::LoadBalancers => "loadBalancers",
            Namespace::OnDemand => "onDemand",
            Namespace::Evictions => "evictions",
        }
    }

    /// Returns true for namespaces the entity graph builder writes.
    pub fn is_graph(&self) -> bool {
        Self::GRAPH.contains(self)
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Namespace {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Namespace::ALL
            .iter()
            .copied()
            .find(|ns| ns.as_str() == s)
            .ok_or_else(|| ValidationError::InvalidValue {
                field: "namespace".to_string(),
                reason: format!("unknown namespace '{}'", s),
            })
    }
}
