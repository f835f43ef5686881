//! Deterministic cache key derivation and parsing.
//!
//! Keys are `{provider}:{namespace}:{segments...}`. The same identity tuple
//! always yields the same key.

use serde::{Deserialize, Serialize};

use crate::naming::ServerGroupName;
use crate::{AgentScope, Namespace};

const SEPARATOR: char = ':';

/// Key builder bound to a cloud provider id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Keys {
    provider: String,
}

impl Keys {
    pub fn new(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
        }
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    fn join(&self, namespace: Namespace, segments: &[&str]) -> String {
        let mut key = format!("{}{}{}", self.provider, SEPARATOR, namespace.as_str());
        for segment in segments {
            key.push(SEPARATOR);
            key.push_str(segment);
        }
        key
    }

    /// Application names are case-insensitive.
    pub fn application(&self, application: &str) -> String {
        self.join(Namespace::Applications, &[&application.to_lowercase()])
    }

    pub fn cluster(&self, application: &str, cluster: &str, account: &str) -> String {
        self.join(
            Namespace::Clusters,
            &[&application.to_lowercase(), cluster, account],
        )
    }

    pub fn server_group(&self, server_group: &str, region: &str, account: &str) -> String {
        self.join(Namespace::ServerGroups, &[server_group, region, account])
    }

    pub fn instance(
        &self,
        server_group: &str,
        instance: &str,
        region: &str,
        account: &str,
    ) -> String {
        self.join(
            Namespace::Instances,
            &[server_group, instance, region, account],
        )
    }

    pub fn load_balancer(
        &self,
        application: &str,
        load_balancer: &str,
        region: &str,
        account: &str,
    ) -> String {
        self.join(
            Namespace::LoadBalancers,
            &[&application.to_lowercase(), load_balancer, region, account],
        )
    }

    /// Decompose a key produced by this builder back into its fields.
    ///
    /// Returns `None` for keys of another provider, unknown namespaces, the
    /// wrong number of segments, or server-group names that do not parse.
    pub fn parse(&self, key: &str) -> Option<KeyDetails> {
        let parts: Vec<&str> = key.split(SEPARATOR).collect();
        let (provider, namespace, rest) = match parts.as_slice() {
            [provider, namespace, rest @ ..] => (*provider, *namespace, rest),
            _ => return None,
        };
        if provider != self.provider {
            return None;
        }
        let provider = provider.to_string();

        match (namespace.parse::<Namespace>().ok()?, rest) {
            (Namespace::Applications, [application]) => Some(KeyDetails::Application {
                provider,
                application: application.to_string(),
            }),
            (Namespace::Clusters, [application, cluster, account]) => Some(KeyDetails::Cluster {
                provider,
                application: application.to_string(),
                cluster: cluster.to_string(),
                account: account.to_string(),
            }),
            (Namespace::ServerGroups, [server_group, region, account]) => {
                let name = ServerGroupName::parse(server_group)?;
                Some(KeyDetails::ServerGroup {
                    provider,
                    application: name.application,
                    cluster: name.cluster,
                    stack: name.stack,
                    detail: name.detail,
                    sequence: name.sequence,
                    server_group: server_group.to_string(),
                    region: region.to_string(),
                    account: account.to_string(),
                })
            }
            (Namespace::Instances, [server_group, instance, region, account]) => {
                Some(KeyDetails::Instance {
                    provider,
                    server_group: server_group.to_string(),
                    instance: instance.to_string(),
                    region: region.to_string(),
                    account: account.to_string(),
                })
            }
            (Namespace::LoadBalancers, [application, load_balancer, region, account]) => {
                Some(KeyDetails::LoadBalancer {
                    provider,
                    application: application.to_string(),
                    load_balancer: load_balancer.to_string(),
                    region: region.to_string(),
                    account: account.to_string(),
                })
            }
            _ => None,
        }
    }
}

/// Structured fields recovered from a cache key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum KeyDetails {
    Application {
        provider: String,
        application: String,
    },
    Cluster {
        provider: String,
        application: String,
        cluster: String,
        account: String,
    },
    #[serde(rename_all = "camelCase")]
    ServerGroup {
        provider: String,
        application: String,
        cluster: String,
        stack: Option<String>,
        detail: Option<String>,
        sequence: Option<u32>,
        server_group: String,
        region: String,
        account: String,
    },
    #[serde(rename_all = "camelCase")]
    Instance {
        provider: String,
        server_group: String,
        instance: String,
        region: String,
        account: String,
    },
    #[serde(rename_all = "camelCase")]
    LoadBalancer {
        provider: String,
        application: String,
        load_balancer: String,
        region: String,
        account: String,
    },
}

impl KeyDetails {
    pub fn namespace(&self) -> Namespace {
        match self {
            KeyDetails::Application { .. } => Namespace::Applications,
            KeyDetails::Cluster { .. } => Namespace::Clusters,
            KeyDetails::ServerGroup { .. } => Namespace::ServerGroups,
            KeyDetails::Instance { .. } => Namespace::Instances,
            KeyDetails::LoadBalancer { .. } => Namespace::LoadBalancers,
        }
    }

    pub fn account(&self) -> Option<&str> {
        match self {
            KeyDetails::Application { .. } => None,
            KeyDetails::Cluster { account, .. }
            | KeyDetails::ServerGroup { account, .. }
            | KeyDetails::Instance { account, .. }
            | KeyDetails::LoadBalancer { account, .. } => Some(account),
        }
    }

    pub fn region(&self) -> Option<&str> {
        match self {
            KeyDetails::Application { .. } | KeyDetails::Cluster { .. } => None,
            KeyDetails::ServerGroup { region, .. }
            | KeyDetails::Instance { region, .. }
            | KeyDetails::LoadBalancer { region, .. } => Some(region),
        }
    }

    /// True iff the key carries both account and region and they match `scope`.
    ///
    /// Application and cluster keys have no region and never match.
    pub fn is_in(&self, scope: &AgentScope) -> bool {
        self.account() == Some(scope.account.as_str())
            && self.region() == Some(scope.region.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys() -> Keys {
        Keys::new("azure")
    }

    #[test]
    fn test_server_group_key_format() {
        assert_eq!(
            keys().server_group("app-v001", "eastus", "my-acct"),
            "azure:serverGroups:app-v001:eastus:my-acct"
        );
    }

    #[test]
    fn test_application_key_is_lowercased() {
        assert_eq!(keys().application("MyApp"), "azure:applications:myapp");
        assert_eq!(
            keys().cluster("MyApp", "MyApp-prod", "my-acct"),
            "azure:clusters:myapp:MyApp-prod:my-acct"
        );
    }

    #[test]
    fn test_parse_server_group_key() {
        let key = keys().server_group("web-prod-v003", "westus", "acct");
        let details = keys().parse(&key).expect("parseable");
        assert_eq!(details.namespace(), Namespace::ServerGroups);
        assert_eq!(details.account(), Some("acct"));
        assert_eq!(details.region(), Some("westus"));
        match details {
            KeyDetails::ServerGroup {
                application,
                cluster,
                stack,
                sequence,
                ..
            } => {
                assert_eq!(application, "web");
                assert_eq!(cluster, "web-prod");
                assert_eq!(stack.as_deref(), Some("prod"));
                assert_eq!(sequence, Some(3));
            }
            other => panic!("unexpected details {:?}", other),
        }
    }

    #[test]
    fn test_parse_each_kind() {
        let k = keys();
        let cases = [
            (k.application("app"), Namespace::Applications),
            (k.cluster("app", "app-prod", "acct"), Namespace::Clusters),
            (k.instance("app-v001", "vm-0", "eastus", "acct"), Namespace::Instances),
            (k.load_balancer("app", "app-lb", "eastus", "acct"), Namespace::LoadBalancers),
        ];
        for (key, namespace) in cases {
            let details = k.parse(&key).expect("parseable");
            assert_eq!(details.namespace(), namespace, "key {}", key);
        }
    }

    #[test]
    fn test_parse_rejects_foreign_and_malformed_keys() {
        let k = keys();
        assert!(k.parse("aws:serverGroups:app-v001:us-east-1:acct").is_none());
        assert!(k.parse("azure:serverGroups:app-v001:eastus").is_none());
        assert!(k.parse("azure:securityGroups:x").is_none());
        assert!(k.parse("azure").is_none());
        assert!(k.parse("azure:onDemand:app-v001").is_none());
    }

    #[test]
    fn test_is_in_scope() {
        let k = keys();
        let scope = AgentScope::new("my-acct", "eastus");
        let in_scope = [
            k.server_group("app-v001", "eastus", "my-acct"),
            k.instance("app-v001", "vm-0", "eastus", "my-acct"),
        ];
        for key in in_scope {
            assert!(k.parse(&key).expect("parseable").is_in(&scope), "key {}", key);
        }
        let out_of_scope = [
            k.server_group("app-v001", "westus", "my-acct"),
            k.instance("app-v001", "vm-0", "eastus", "other-acct"),
            k.cluster("app", "app", "my-acct"),
            k.application("app"),
        ];
        for key in out_of_scope {
            assert!(!k.parse(&key).expect("parseable").is_in(&scope), "key {}", key);
        }
    }

    #[test]
    fn test_details_serialize_tagged() {
        let details = keys()
            .parse("azure:serverGroups:app-v001:eastus:my-acct")
            .expect("parseable");
        let json = serde_json::to_value(&details).expect("serialize");
        assert_eq!(json["type"], "serverGroup");
        assert_eq!(json["serverGroup"], "app-v001");
        assert_eq!(json["account"], "my-acct");
    }
}
