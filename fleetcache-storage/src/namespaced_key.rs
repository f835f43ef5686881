//! Binary key layout for the durable store.
//!
//! Format: `[namespace: 1 byte][separator 0xFF: 1 byte][id: UTF-8 bytes]`.
//! Keys sort by namespace first, so a namespace is a contiguous key range.

use fleetcache_core::Namespace;

/// Separator byte between the namespace discriminant and the id.
const SEPARATOR: u8 = 0xFF;

/// A record key qualified by its namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NamespacedKey {
    namespace: Namespace,
    id: String,
}

impl NamespacedKey {
    pub fn new(namespace: Namespace, id: impl Into<String>) -> Self {
        Self {
            namespace,
            id: id.into(),
        }
    }

    pub fn namespace(&self) -> Namespace {
        self.namespace
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn into_id(self) -> String {
        self.id
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(2 + self.id.len());
        bytes.extend_from_slice(&Self::namespace_prefix(self.namespace));
        bytes.extend_from_slice(self.id.as_bytes());
        bytes
    }

    /// Decode a key from bytes.
    ///
    /// Returns `None` if the key is shorter than the prefix, the separator is
    /// wrong, the namespace byte is unknown or the id is not UTF-8.
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < 2 || bytes[1] != SEPARATOR {
            return None;
        }
        let namespace = byte_to_namespace(bytes[0])?;
        let id = std::str::from_utf8(&bytes[2..]).ok()?;
        Some(Self::new(namespace, id))
    }

    /// Prefix shared by every key in `namespace`.
    pub fn namespace_prefix(namespace: Namespace) -> [u8; 2] {
        [namespace_to_byte(namespace), SEPARATOR]
    }
}

fn namespace_to_byte(namespace: Namespace) -> u8 {
    match namespace {
        Namespace::Applications => 0,
        Namespace::Clusters => 1,
        Namespace::ServerGroups => 2,
        Namespace::Instances => 3,
        Namespace::LoadBalancers => 4,
        Namespace::OnDemand => 5,
        Namespace::Evictions => 6,
    }
}

fn byte_to_namespace(byte: u8) -> Option<Namespace> {
    match byte {
        0 => Some(Namespace::Applications),
        1 => Some(Namespace::Clusters),
        2 => Some(Namespace::ServerGroups),
        3 => Some(Namespace::Instances),
        4 => Some(Namespace::LoadBalancers),
        5 => Some(Namespace::OnDemand),
        6 => Some(Namespace::Evictions),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_layout() {
        let key = NamespacedKey::new(Namespace::OnDemand, "azure:serverGroups:a-v001:eastus:acct");
        let bytes = key.encode();
        assert_eq!(bytes[0], 5);
        assert_eq!(bytes[1], SEPARATOR);
        assert_eq!(&bytes[2..], b"azure:serverGroups:a-v001:eastus:acct");
    }

    #[test]
    fn test_decode_rejects_bad_input() {
        assert!(NamespacedKey::decode(&[]).is_none());
        assert!(NamespacedKey::decode(&[0]).is_none());
        assert!(NamespacedKey::decode(&[0, 0, b'a']).is_none());
        assert!(NamespacedKey::decode(&[42, SEPARATOR, b'a']).is_none());
        assert!(NamespacedKey::decode(&[0, SEPARATOR, 0xC3]).is_none());
    }

    #[test]
    fn test_every_namespace_roundtrips() {
        for namespace in Namespace::ALL {
            let key = NamespacedKey::new(namespace, "id");
            assert_eq!(NamespacedKey::decode(&key.encode()), Some(key));
        }
    }

    #[test]
    fn test_same_id_different_namespaces_differ() {
        let a = NamespacedKey::new(Namespace::OnDemand, "k").encode();
        let b = NamespacedKey::new(Namespace::Evictions, "k").encode();
        assert_ne!(a, b);
    }
}
