//! # Key Management
//!
//! Ed25519 keypair generation and serialization for Ember node identities.
//!
//! Every node in the network has exactly one keypair. The public half is
//! announced during registration; the private half signs every gossip
//! payload the node floods to its peers.
//!
//! ## Why Ed25519?
//!
//! - Deterministic signatures (no k-value footguns like ECDSA).
//! - 128-bit security level in 32+32 bytes. Compact and sufficient.
//! - Fast verification — important when every inbound gossip request
//!   carries a signature that must be checked before parsing goes further.
//!
//! ## Security considerations
//!
//! - We use OS-level RNG (`OsRng`) for key generation. If your OS RNG
//!   is broken, you have bigger problems than Ember.
//! - Key bytes are never logged. If you add logging to this module,
//!   you will be asked to leave.

use ed25519_dalek::{
    Signature as DalekSignature, Signer, SigningKey, Verifier, VerifyingKey, SECRET_KEY_LENGTH,
};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use thiserror::Error;

/// Errors that can occur during key operations.
///
/// These are intentionally vague about *why* something failed — leaking
/// details about key material through error messages is a classic footgun.
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("invalid secret key bytes: wrong length or not a valid scalar")]
    InvalidSecretKey,

    #[error("invalid public key bytes: not a valid Ed25519 point")]
    InvalidPublicKey,
}

/// An Ember node keypair wrapping Ed25519 signing and verification keys.
///
/// The signing key never leaves this process except through the explicit
/// `secret_key_bytes` escape hatch. `EmberKeypair` intentionally does NOT
/// implement `Serialize`/`Deserialize`; serializing private keys should be
/// a deliberate act, not something that happens because someone shoved a
/// keypair into a JSON response.
///
/// # Examples
///
/// ```
/// use ember_protocol::crypto::keys::EmberKeypair;
///
/// let kp = EmberKeypair::generate();
/// let sig = kp.sign(b"send 2 ember to alice");
/// assert!(kp.public_key().verify(b"send 2 ember to alice", &sig));
/// ```
pub struct EmberKeypair {
    signing_key: SigningKey,
}

/// The public half of a node identity, safe to share with the world.
///
/// This is what a node announces during registration so peers can verify
/// its gossip signatures. Stored hex-encoded on the wire.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmberPublicKey {
    bytes: [u8; 32],
}

/// An Ed25519 signature over a message.
///
/// 64 bytes, deterministic for a given (key, message) pair. Stored as
/// `Vec<u8>` for serde compatibility, but always exactly 64 bytes. If
/// someone hands you an `EmberSignature` that isn't 64 bytes, verification
/// simply returns `false` — no panics, no undefined behavior.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmberSignature {
    bytes: Vec<u8>,
}

impl EmberKeypair {
    /// Generate a fresh keypair using the OS cryptographic RNG.
    pub fn generate() -> Self {
        let signing_key = SigningKey::generate(&mut OsRng);
        Self { signing_key }
    }

    /// Constructs a keypair deterministically from a 32-byte seed.
    ///
    /// In Ed25519, the 32-byte secret key *is* the seed. Used by tests
    /// that need stable identities across runs.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        let signing_key = SigningKey::from_bytes(seed);
        Self { signing_key }
    }

    /// Reconstruct a keypair from a hex-encoded secret key.
    ///
    /// Convenience for loading a persistent identity from the environment.
    pub fn from_hex(hex_str: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(hex_str).map_err(|_| KeyError::InvalidSecretKey)?;
        let arr: [u8; SECRET_KEY_LENGTH] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| KeyError::InvalidSecretKey)?;
        Ok(Self::from_seed(&arr))
    }

    /// Returns the public key associated with this keypair.
    pub fn public_key(&self) -> EmberPublicKey {
        EmberPublicKey {
            bytes: self.signing_key.verifying_key().to_bytes(),
        }
    }

    /// Get the public key as a hex string. This is the form announced to
    /// peers during registration.
    pub fn public_key_hex(&self) -> String {
        hex::encode(self.signing_key.verifying_key().to_bytes())
    }

    /// Sign a message and return an `EmberSignature`.
    ///
    /// Ed25519 signatures are deterministic — the same (key, message) pair
    /// always produces the same signature. No nonce management needed.
    pub fn sign(&self, message: &[u8]) -> EmberSignature {
        let sig = self.signing_key.sign(message);
        EmberSignature {
            bytes: sig.to_bytes().to_vec(),
        }
    }

    /// Exports the raw 32-byte secret key material.
    ///
    /// **Handle with extreme care.** Don't log it. Don't send it over the
    /// network. Don't store it in a text file called "my_keys.txt".
    pub fn secret_key_bytes(&self) -> [u8; 32] {
        self.signing_key.to_bytes()
    }
}

impl Clone for EmberKeypair {
    /// Cloning a keypair is allowed but should make you uncomfortable.
    /// Every copy of a private key is another thing to protect.
    fn clone(&self) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(&self.signing_key.to_bytes()),
        }
    }
}

impl fmt::Debug for EmberKeypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print secret key material in debug output. Not even "partially."
        write!(f, "EmberKeypair(pub={})", self.public_key().to_hex())
    }
}

// ---------------------------------------------------------------------------
// EmberPublicKey
// ---------------------------------------------------------------------------

impl EmberPublicKey {
    /// Try to create an `EmberPublicKey` from a byte slice.
    ///
    /// Validates the length and that the bytes represent a valid Ed25519
    /// point. We don't just accept any 32 bytes — some values aren't valid
    /// points on the curve.
    pub fn try_from_slice(slice: &[u8]) -> Result<Self, KeyError> {
        let bytes: [u8; 32] = slice.try_into().map_err(|_| KeyError::InvalidPublicKey)?;
        VerifyingKey::from_bytes(&bytes).map_err(|_| KeyError::InvalidPublicKey)?;
        Ok(Self { bytes })
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.bytes
    }

    /// Verify a signature against this public key.
    ///
    /// Returns `true` if the signature is valid, `false` otherwise. A
    /// boolean (rather than `Result`) because callers at the auth boundary
    /// only want a yes/no answer.
    pub fn verify(&self, message: &[u8], signature: &EmberSignature) -> bool {
        let Ok(verifying_key) = VerifyingKey::from_bytes(&self.bytes) else {
            return false;
        };
        let sig_bytes: [u8; 64] = match signature.bytes.as_slice().try_into() {
            Ok(b) => b,
            Err(_) => return false,
        };
        let dalek_sig = DalekSignature::from_bytes(&sig_bytes);
        verifying_key.verify(message, &dalek_sig).is_ok()
    }

    /// Hex-encoded representation. 64 characters for 32 bytes.
    pub fn to_hex(&self) -> String {
        hex::encode(self.bytes)
    }

    /// Parse a hex-encoded public key string.
    pub fn from_hex(s: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(s).map_err(|_| KeyError::InvalidPublicKey)?;
        Self::try_from_slice(&bytes)
    }
}

impl Hash for EmberPublicKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.bytes.hash(state);
    }
}

impl fmt::Display for EmberPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for EmberPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EmberPublicKey({})", &self.to_hex()[..16])
    }
}

// ---------------------------------------------------------------------------
// EmberSignature
// ---------------------------------------------------------------------------

impl EmberSignature {
    /// Returns the raw signature bytes (always 64 bytes for valid signatures).
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Returns the hex-encoded signature string. 128 characters for a valid sig.
    /// This is the form carried in the `signature` header.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.bytes)
    }

    /// Parse a hex-encoded signature.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(s)?;
        if bytes.len() != 64 {
            return Err(hex::FromHexError::InvalidStringLength);
        }
        Ok(Self { bytes })
    }
}

impl fmt::Display for EmberSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for EmberSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex_str = self.to_hex();
        if hex_str.len() >= 128 {
            write!(f, "EmberSignature({}...{})", &hex_str[..8], &hex_str[120..])
        } else {
            write!(f, "EmberSignature({})", hex_str)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keypair_sign_verify_roundtrip() {
        let kp = EmberKeypair::generate();
        let msg = b"transfer 2 ember";
        let sig = kp.sign(msg);
        assert!(kp.public_key().verify(msg, &sig));
    }

    #[test]
    fn wrong_message_fails_verification() {
        let kp = EmberKeypair::generate();
        let sig = kp.sign(b"correct message");
        assert!(!kp.public_key().verify(b"wrong message", &sig));
    }

    #[test]
    fn wrong_key_fails_verification() {
        let kp1 = EmberKeypair::generate();
        let kp2 = EmberKeypair::generate();
        let sig = kp1.sign(b"message");
        assert!(!kp2.public_key().verify(b"message", &sig));
    }

    #[test]
    fn test_roundtrip_hex() {
        let kp = EmberKeypair::generate();
        let hex_str = hex::encode(kp.secret_key_bytes());
        let restored = EmberKeypair::from_hex(&hex_str).unwrap();
        assert_eq!(kp.public_key(), restored.public_key());
    }

    #[test]
    fn test_invalid_hex_rejected() {
        // Too short
        assert!(EmberKeypair::from_hex("deadbeef").is_err());
        // Not hex at all
        assert!(EmberKeypair::from_hex("not-hex-at-all").is_err());
    }

    #[test]
    fn public_key_hex_roundtrip() {
        let kp = EmberKeypair::generate();
        let pk = kp.public_key();
        let recovered = EmberPublicKey::from_hex(&pk.to_hex()).unwrap();
        assert_eq!(pk, recovered);
    }

    #[test]
    fn test_public_key_rejects_wrong_length() {
        let short = [0u8; 16];
        assert!(EmberPublicKey::try_from_slice(&short).is_err());
    }

    #[test]
    fn test_two_generated_keypairs_are_different() {
        // If this fails, your RNG is broken and you should panic (the emotion,
        // not the macro). Well, actually, both.
        let kp1 = EmberKeypair::generate();
        let kp2 = EmberKeypair::generate();
        assert_ne!(kp1.public_key(), kp2.public_key());
    }

    #[test]
    fn deterministic_from_seed() {
        let seed = [42u8; 32];
        let kp1 = EmberKeypair::from_seed(&seed);
        let kp2 = EmberKeypair::from_seed(&seed);
        assert_eq!(kp1.public_key(), kp2.public_key());
    }

    #[test]
    fn test_deterministic_signatures() {
        // Ed25519 is deterministic — same key + same message = same signature.
        let kp = EmberKeypair::generate();
        let msg = b"determinism is underrated";
        assert_eq!(kp.sign(msg).as_bytes(), kp.sign(msg).as_bytes());
    }

    #[test]
    fn test_signature_hex_roundtrip() {
        let kp = EmberKeypair::generate();
        let sig = kp.sign(b"test");
        let recovered = EmberSignature::from_hex(&sig.to_hex()).unwrap();
        assert_eq!(sig, recovered);
    }

    #[test]
    fn test_signature_hex_wrong_length_rejected() {
        assert!(EmberSignature::from_hex("deadbeef").is_err());
    }

    #[test]
    fn debug_does_not_leak_secret() {
        let kp = EmberKeypair::generate();
        let debug_str = format!("{:?}", kp);
        assert!(debug_str.starts_with("EmberKeypair(pub="));
        assert!(!debug_str.contains("signing_key"));
    }
}
