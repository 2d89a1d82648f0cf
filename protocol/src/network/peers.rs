//! # Peer Registry
//!
//! The node's directory of everyone it has met. Each peer is a triple of
//! identity (uuid), base URL, and Ed25519 public key. The registry feeds
//! two consumers with different needs:
//!
//! - the auth boundary resolves `origin-id` to a public key, and
//! - the gossip broadcaster walks the address list in the order peers
//!   were learned, so two floods visit destinations consistently.
//!
//! Identity is the primary key. Registering a known identity again is a
//! rejected no-op, even with a new address; the original network never
//! supported re-keying or re-addressing a peer and neither do we.

use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};

use crate::crypto::keys::EmberPublicKey;
use crate::network::wire::PeerDescriptor;

#[derive(Debug, Clone)]
struct PeerEntry {
    address: String,
    public_key: EmberPublicKey,
}

#[derive(Debug, Default)]
struct RegistryInner {
    by_id: HashMap<String, PeerEntry>,
    // Insertion order of identities. Kept separate because HashMap
    // iteration order is arbitrary and flood order should not be.
    order: Vec<String>,
}

/// Thread-safe peer directory.
///
/// All methods take `&self`; interior mutability via `RwLock` lets the
/// registry be shared between the HTTP handlers and the gossip tasks
/// without ceremony.
#[derive(Debug, Default)]
pub struct PeerRegistry {
    inner: RwLock<RegistryInner>,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a peer. Returns `false` without mutating anything when the
    /// identity is already known.
    pub fn add(&self, node_id: &str, address: &str, public_key: EmberPublicKey) -> bool {
        let mut inner = self.inner.write();
        if inner.by_id.contains_key(node_id) {
            return false;
        }
        inner.by_id.insert(
            node_id.to_string(),
            PeerEntry {
                address: address.to_string(),
                public_key,
            },
        );
        inner.order.push(node_id.to_string());
        true
    }

    /// Public key for an identity, if registered.
    pub fn public_key_of(&self, node_id: &str) -> Option<EmberPublicKey> {
        self.inner
            .read()
            .by_id
            .get(node_id)
            .map(|entry| entry.public_key.clone())
    }

    /// Address for an identity, if registered.
    pub fn address_of(&self, node_id: &str) -> Option<String> {
        self.inner
            .read()
            .by_id
            .get(node_id)
            .map(|entry| entry.address.clone())
    }

    /// All peer addresses in the order the peers were learned.
    pub fn addresses(&self) -> Vec<String> {
        let inner = self.inner.read();
        inner
            .order
            .iter()
            .filter_map(|id| inner.by_id.get(id).map(|entry| entry.address.clone()))
            .collect()
    }

    /// All known identities in the order the peers were learned.
    pub fn node_ids(&self) -> Vec<String> {
        self.inner.read().order.clone()
    }

    /// Number of known peers.
    pub fn len(&self) -> usize {
        self.inner.read().by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().by_id.is_empty()
    }

    /// Wire-shaped snapshot of the whole directory, keyed by identity.
    ///
    /// `BTreeMap` so the serialized form is canonical without extra work.
    pub fn directory(&self) -> BTreeMap<String, PeerDescriptor> {
        self.inner
            .read()
            .by_id
            .iter()
            .map(|(id, entry)| {
                (
                    id.clone(),
                    PeerDescriptor {
                        address: entry.address.clone(),
                        pub_key: entry.public_key.to_hex(),
                    },
                )
            })
            .collect()
    }

    /// Merge a remote directory. Returns the addresses actually added;
    /// already-known identities are skipped, never overwritten.
    ///
    /// `local_id` is the merging node's own identity and is always
    /// skipped. A handshake peer's directory normally contains the
    /// receiving node itself; merging that entry would put the node in
    /// its own fan-out list and every flood would loop straight back.
    pub fn merge(&self, directory: &BTreeMap<String, PeerDescriptor>, local_id: &str) -> Vec<String> {
        let mut added = Vec::new();
        for (id, descriptor) in directory {
            if id == local_id {
                continue;
            }
            let Ok(public_key) = EmberPublicKey::from_hex(&descriptor.pub_key) else {
                tracing::warn!(peer = %id, "skipping peer with malformed public key");
                continue;
            };
            if self.add(id, &descriptor.address, public_key) {
                added.push(descriptor.address.clone());
            }
        }
        added
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keys::EmberKeypair;

    fn key() -> EmberPublicKey {
        EmberKeypair::generate().public_key()
    }

    #[test]
    fn test_add_and_lookup() {
        let registry = PeerRegistry::new();
        let pk = key();
        assert!(registry.add("node-a", "http://10.0.0.1:5000", pk.clone()));
        assert_eq!(registry.public_key_of("node-a"), Some(pk));
        assert_eq!(
            registry.address_of("node-a").as_deref(),
            Some("http://10.0.0.1:5000")
        );
    }

    #[test]
    fn test_duplicate_identity_is_rejected() {
        let registry = PeerRegistry::new();
        let first = key();
        assert!(registry.add("node-a", "http://10.0.0.1:5000", first.clone()));
        // Same identity, different address and key: nothing changes.
        assert!(!registry.add("node-a", "http://10.0.0.9:5000", key()));
        assert_eq!(registry.public_key_of("node-a"), Some(first));
        assert_eq!(
            registry.address_of("node-a").as_deref(),
            Some("http://10.0.0.1:5000")
        );
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_addresses_preserve_insertion_order() {
        let registry = PeerRegistry::new();
        registry.add("c", "http://c", key());
        registry.add("a", "http://a", key());
        registry.add("b", "http://b", key());
        assert_eq!(registry.addresses(), vec!["http://c", "http://a", "http://b"]);
    }

    #[test]
    fn test_unknown_identity_lookups_fail() {
        let registry = PeerRegistry::new();
        assert!(registry.public_key_of("ghost").is_none());
        assert!(registry.address_of("ghost").is_none());
    }

    #[test]
    fn test_directory_roundtrip_through_merge() {
        let source = PeerRegistry::new();
        source.add("a", "http://a", key());
        source.add("b", "http://b", key());

        let target = PeerRegistry::new();
        target.add("a", "http://a-old", key());
        let added = target.merge(&source.directory(), "me");

        assert_eq!(added, vec!["http://b".to_string()]);
        assert_eq!(target.len(), 2);
        // Known identity untouched by the merge.
        assert_eq!(target.address_of("a").as_deref(), Some("http://a-old"));
    }

    #[test]
    fn test_merge_never_adds_own_identity() {
        // A handshake peer's directory includes the receiving node; the
        // merge must drop that entry or the node floods itself forever.
        let registry = PeerRegistry::new();
        let mut directory = BTreeMap::new();
        directory.insert(
            "me".to_string(),
            PeerDescriptor {
                address: "http://self:5000".into(),
                pub_key: key().to_hex(),
            },
        );
        directory.insert(
            "other".to_string(),
            PeerDescriptor {
                address: "http://other".into(),
                pub_key: key().to_hex(),
            },
        );

        let added = registry.merge(&directory, "me");

        assert_eq!(added, vec!["http://other".to_string()]);
        assert!(registry.public_key_of("me").is_none());
        assert_eq!(registry.addresses(), vec!["http://other"]);
    }

    #[test]
    fn test_merge_skips_malformed_keys() {
        let registry = PeerRegistry::new();
        let mut directory = BTreeMap::new();
        directory.insert(
            "broken".to_string(),
            PeerDescriptor {
                address: "http://x".into(),
                pub_key: "not-hex".into(),
            },
        );
        assert!(registry.merge(&directory, "me").is_empty());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_node_ids_follow_insertion_order() {
        let registry = PeerRegistry::new();
        registry.add("c", "http://c", key());
        registry.add("a", "http://a", key());
        assert_eq!(registry.node_ids(), vec!["c", "a"]);
    }
}
