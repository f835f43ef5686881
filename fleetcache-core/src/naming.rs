//! Server-group naming conventions.
//!
//! Server groups are named `app[-stack[-detail]][-vNNN]`. The application
//! segment drives cluster membership and resource-group derivation.

use once_cell::sync::Lazy;
use regex::Regex;

/// Trailing `-vNNN` push sequence (3 to 6 digits).
static PUSH_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.+)-v([0-9]{3,6})$").expect("Invalid push regex"));

/// `app[-stack[-detail]]`, where detail may itself contain dashes.
static CLUSTER_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([a-zA-Z0-9._]+)(?:-([a-zA-Z0-9._]*)(?:-([a-zA-Z0-9._~^\-]*))?)?$")
        .expect("Invalid cluster regex")
});

/// A parsed server-group name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerGroupName {
    pub application: String,
    pub stack: Option<String>,
    pub detail: Option<String>,
    pub cluster: String,
    pub sequence: Option<u32>,
}

impl ServerGroupName {
    /// Parse a server-group name. Returns `None` when the name does not
    /// follow the naming convention.
    pub fn parse(name: &str) -> Option<Self> {
        let (cluster, sequence) = match PUSH_PATTERN.captures(name) {
            Some(caps) => {
                let cluster = caps.get(1)?.as_str();
                let sequence = caps.get(2)?.as_str().parse::<u32>().ok()?;
                (cluster, Some(sequence))
            }
            None => (name, None),
        };

        let caps = CLUSTER_PATTERN.captures(cluster)?;
        let non_empty = |idx: usize| {
            caps.get(idx)
                .map(|m| m.as_str())
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        Some(Self {
            application: caps.get(1)?.as_str().to_string(),
            stack: non_empty(2),
            detail: non_empty(3),
            cluster: cluster.to_string(),
            sequence,
        })
    }
}

/// Resource group owning every server group of an application.
pub fn resource_group_for_application(prefix: &str, application: &str) -> String {
    format!("{}{}", prefix, application)
}

/// Derive the resource group from a server-group name.
///
/// Returns `None` when the application cannot be parsed out of the name.
pub fn resource_group_for_server_group(prefix: &str, server_group_name: &str) -> Option<String> {
    ServerGroupName::parse(server_group_name)
        .map(|parsed| resource_group_for_application(prefix, &parsed.application))
}
