//! # Cryptographic Primitives for Ember
//!
//! Every signing operation and every consensus hash flows through here.
//!
//! We deliberately chose boring, well-audited cryptography:
//!
//! - **Ed25519** for signatures — fast, deterministic, and nobody has broken it.
//! - **SHA-256** for hashing — the consensus digest every peer must agree on.
//!
//! ## A note on "rolling your own crypto"
//!
//! We don't. Everything here is a thin, type-safe wrapper around audited
//! implementations. If you're tempted to optimize these functions, please
//! reconsider. Then reconsider again. Then go read about timing attacks
//! and come back when you've lost the urge.

pub mod hash;
pub mod keys;

// Re-export the things people actually need so they don't have to memorize
// our module hierarchy.
pub use hash::{canonical_json, sha256_hex};
pub use keys::{EmberKeypair, EmberPublicKey, EmberSignature, KeyError};
