//! On-demand refresh requests.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Loosely-typed request map as delivered by the platform.
///
/// Expected fields are `serverGroupName`, `account` and `region`; anything
/// else is carried but ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OnDemandRequest(BTreeMap<String, serde_json::Value>);

impl OnDemandRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// String value of `key`, if present and a string.
    pub fn field(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(serde_json::Value::as_str)
    }
}

impl<K, V> FromIterator<(K, V)> for OnDemandRequest
where
    K: Into<String>,
    V: Into<serde_json::Value>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}
