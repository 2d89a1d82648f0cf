//! # Inbound Authentication
//!
//! Every mutating endpoint sits behind one of two verification policies:
//!
//! - **foreign-signed** — the request must carry `origin-id` naming a
//!   registered peer and a `signature` over the canonical form of the
//!   body, verifiable with that peer's public key. Gossip traffic.
//! - **local-signed** — same mechanics, but the signature must verify
//!   against the node's OWN public key. Spend requests: only the holder
//!   of the node's key may move its funds.
//!
//! The signature covers the canonical JSON of the parsed body, not the
//! raw request bytes. Whitespace and key order on the wire are therefore
//! irrelevant; what is authenticated is the meaning of the payload.
//!
//! This module is transport-agnostic on purpose. The HTTP layer hands in
//! plain header strings and body bytes, and maps the error variants to
//! status codes; nothing here knows axum exists.

use serde_json::Value;
use thiserror::Error;

use crate::crypto::hash::canonical_json;
use crate::crypto::keys::{EmberPublicKey, EmberSignature};
use crate::network::peers::PeerRegistry;

/// Why an inbound request failed verification.
///
/// The split matters at the HTTP layer: [`MissingCredentials`] is the
/// caller's request being malformed (400), the other two are a policy
/// refusal (403).
///
/// [`MissingCredentials`]: AuthError::MissingCredentials
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("request is missing signature or origin credentials")]
    MissingCredentials,

    #[error("origin `{0}` is not a registered peer")]
    UnknownOrigin(String),

    #[error("signature verification failed")]
    BadSignature,
}

/// Canonicalize a parsed body and check a hex signature against a key.
fn verify_payload(
    public_key: &EmberPublicKey,
    signature_hex: &str,
    body: &Value,
) -> Result<(), AuthError> {
    let signature =
        EmberSignature::from_hex(signature_hex).map_err(|_| AuthError::BadSignature)?;
    let canonical = canonical_json(body).map_err(|_| AuthError::BadSignature)?;
    if public_key.verify(canonical.as_bytes(), &signature) {
        Ok(())
    } else {
        Err(AuthError::BadSignature)
    }
}

/// Foreign-signed policy: resolve the origin in the registry and verify.
///
/// Returns the origin identity so handlers can attribute the request.
pub fn verify_foreign(
    registry: &PeerRegistry,
    signature_hex: Option<&str>,
    origin_id: Option<&str>,
    body: &Value,
) -> Result<String, AuthError> {
    let (signature_hex, origin_id) = match (signature_hex, origin_id) {
        (Some(sig), Some(origin)) => (sig, origin),
        _ => return Err(AuthError::MissingCredentials),
    };
    let public_key = registry
        .public_key_of(origin_id)
        .ok_or_else(|| AuthError::UnknownOrigin(origin_id.to_string()))?;
    verify_payload(&public_key, signature_hex, body)?;
    Ok(origin_id.to_string())
}

/// Local-signed policy: the signature must verify against the node's own
/// public key. No origin header is consulted; identity is the key itself.
pub fn verify_local(
    own_key: &EmberPublicKey,
    signature_hex: Option<&str>,
    body: &Value,
) -> Result<(), AuthError> {
    let signature_hex = signature_hex.ok_or(AuthError::MissingCredentials)?;
    verify_payload(own_key, signature_hex, body)
}
