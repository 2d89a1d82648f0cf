//! # Hashing & Canonical Serialization
//!
//! SHA-256 is the consensus digest of the network. Block hashes, the
//! proof-of-work predicate, and every signed gossip payload all go through
//! the two functions in this module, so a change here is a hard fork.
//!
//! ## Canonical JSON
//!
//! Signatures and block hashes must be computed over byte-identical input
//! on every node, so both go through [`canonical_json`]: serialize to a
//! `serde_json::Value`, then render it. `serde_json`'s `Map` is backed by
//! a `BTreeMap`, which means object keys come out sorted — the canonical
//! form falls out of the default configuration. Do NOT enable the
//! `preserve_order` feature on `serde_json`; it would silently change the
//! canonical form and fork the network.

use serde::Serialize;
use sha2::{Digest, Sha256};

/// Compute the SHA-256 hash of the input and return it hex-encoded.
///
/// Everything consensus-relevant in Ember compares digests as lowercase
/// hex strings (the proof-of-work predicate literally inspects trailing
/// characters), so the hex form is the primary one.
///
/// # Example
///
/// ```
/// use ember_protocol::crypto::sha256_hex;
///
/// let digest = sha256_hex(b"ember");
/// assert_eq!(digest.len(), 64);
/// ```
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Serialize a value to its canonical JSON form.
///
/// Object keys are sorted, no insignificant whitespace. The output is what
/// gets hashed for block identity and what gets signed for gossip, so both
/// sides of every exchange must agree on it byte for byte.
///
/// Serialization of the protocol's own types cannot fail; the `Result` is
/// for caller-supplied values that might contain non-string map keys.
pub fn canonical_json<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let value = serde_json::to_value(value)?;
    serde_json::to_string(&value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sha256_hex_known_vector() {
        // NIST test vector for "abc".
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_sha256_hex_empty_input() {
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn canonical_json_sorts_keys() {
        let scrambled = json!({"zulu": 1, "alpha": 2, "mike": {"z": 1, "a": 2}});
        let rendered = canonical_json(&scrambled).unwrap();
        assert_eq!(rendered, r#"{"alpha":2,"mike":{"a":2,"z":1},"zulu":1}"#);
    }

    #[test]
    fn canonical_json_is_deterministic() {
        let value = json!({"b": [1, 2, 3], "a": "x"});
        assert_eq!(
            canonical_json(&value).unwrap(),
            canonical_json(&value).unwrap()
        );
    }

    #[test]
    fn canonical_json_equal_values_equal_bytes() {
        // Two structurally equal values must canonicalize identically even
        // if they were built with different key insertion orders.
        let a = json!({"x": 1, "y": 2});
        let b = json!({"y": 2, "x": 1});
        assert_eq!(canonical_json(&a).unwrap(), canonical_json(&b).unwrap());
    }

    #[test]
    fn canonical_hash_stable_for_struct() {
        #[derive(serde::Serialize)]
        struct Probe {
            beta: u64,
            alpha: &'static str,
        }
        let probe = Probe {
            beta: 7,
            alpha: "hi",
        };
        // Field declaration order must not matter.
        let rendered = canonical_json(&probe).unwrap();
        assert_eq!(rendered, r#"{"alpha":"hi","beta":7}"#);
        assert_eq!(
            sha256_hex(rendered.as_bytes()),
            sha256_hex(canonical_json(&probe).unwrap().as_bytes())
        );
    }
}
