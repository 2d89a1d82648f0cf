//! # Gossip Broadcaster
//!
//! Outbound side of the protocol: flooding signed payloads to every known
//! peer, and the two-phase handshake that introduces nodes to each other.
//!
//! ## Flooding
//!
//! A flood is best-effort by design. Each destination gets its own
//! detached task; a dead peer costs a warning in the log and nothing
//! else. No retries, no acknowledgements, no back-pressure. Consistency
//! comes from the chain-replacement rules, not from delivery guarantees.
//!
//! ## The handshake
//!
//! Registration is symmetric but must not recurse. When node A registers
//! with node B, B runs the same registration back against A so both ends
//! know each other. The reverse leg carries the
//! [`REGISTRATION_RESP_HEADER`] tag; a tagged register request never
//! triggers another reverse leg, which is the only thing standing between
//! two fresh nodes and an infinite introduction loop.

use reqwest::StatusCode;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

use crate::config::{ORIGIN_ID_HEADER, REGISTRATION_RESP_HEADER, SIGNATURE_HEADER};
use crate::crypto::hash::canonical_json;
use crate::crypto::keys::EmberKeypair;
use crate::network::wire::{RegisterRequest, StateUpdate, UpdateResponse};

/// Errors from the request/response legs of the handshake.
///
/// Flood failures never surface as errors; they are logged and dropped.
#[derive(Debug, Error)]
pub enum GossipError {
    #[error("transport error talking to peer")]
    Transport(#[from] reqwest::Error),

    #[error("payload could not be serialized")]
    Encoding(#[from] serde_json::Error),

    #[error("peer rejected the request with status {status}")]
    Rejected { status: u16 },
}

/// Outbound gossip client. One per node, shared behind an `Arc`.
pub struct Gossip {
    client: reqwest::Client,
    keypair: Arc<EmberKeypair>,
    node_id: String,
}

impl Gossip {
    pub fn new(keypair: Arc<EmberKeypair>, node_id: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            keypair,
            node_id: node_id.into(),
        }
    }

    /// Canonicalize and sign a payload, returning the exact body bytes to
    /// send and the hex signature over them. The receiver re-canonicalizes
    /// what it parses, so body and signature must come from the same
    /// canonical rendering.
    fn sign_payload<T: Serialize>(&self, payload: &T) -> Result<(String, String), GossipError> {
        let body = canonical_json(payload)?;
        let signature = self.keypair.sign(body.as_bytes()).to_hex();
        Ok((body, signature))
    }

    /// Flood a signed payload to every address except the excluded ones.
    ///
    /// Returns as soon as the delivery tasks are spawned. Failures are
    /// logged per destination and never propagated; one dead peer must not
    /// stall the miner that called us.
    pub fn flood<T: Serialize>(
        &self,
        path: &str,
        payload: &T,
        addresses: &[String],
        excluded: &[String],
    ) {
        let (body, signature) = match self.sign_payload(payload) {
            Ok(signed) => signed,
            Err(error) => {
                tracing::error!(%path, %error, "refusing to flood unserializable payload");
                return;
            }
        };
        for address in addresses {
            if excluded.contains(address) {
                continue;
            }
            let url = format!("{}{}", address.trim_end_matches('/'), path);
            let request = self
                .client
                .post(&url)
                .header("content-type", "application/json")
                .header(SIGNATURE_HEADER, signature.clone())
                .header(ORIGIN_ID_HEADER, self.node_id.clone())
                .body(body.clone());
            tokio::spawn(async move {
                match request.send().await {
                    Ok(response) if response.status().is_success() => {
                        tracing::debug!(%url, "gossip delivered");
                    }
                    Ok(response) => {
                        tracing::warn!(%url, status = %response.status(), "gossip rejected");
                    }
                    Err(error) => {
                        tracing::warn!(%url, %error, "gossip delivery failed");
                    }
                }
            });
        }
    }

    /// Bootstrap introduction: POST our descriptor to a peer's register
    /// endpoint, untagged, so the peer runs the full reverse handshake.
    ///
    /// Used once at startup against the configured bootstrap peer.
    pub async fn introduce(
        &self,
        peer_url: &str,
        descriptor: &RegisterRequest,
    ) -> Result<(), GossipError> {
        let url = format!("{}/nodes/register", peer_url.trim_end_matches('/'));
        let response = self.client.post(&url).json(descriptor).send().await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(GossipError::Rejected {
                status: response.status().as_u16(),
            })
        }
    }

    /// The reverse handshake a node runs after accepting a registration.
    ///
    /// Phase 1 registers our descriptor with the new peer, tagged with the
    /// loop breaker so the peer does not handshake back. A 409 means the
    /// peer already knows us, which ends the exchange successfully.
    ///
    /// Phase 2 pushes our full state so the newcomer starts life with our
    /// chain and directory. Returns `true` when the peer reported adopting
    /// the chain.
    pub async fn register_with_peer(
        &self,
        peer_url: &str,
        descriptor: &RegisterRequest,
        state: &StateUpdate,
    ) -> Result<bool, GossipError> {
        let base = peer_url.trim_end_matches('/');

        let register_url = format!("{base}/nodes/register");
        let response = self
            .client
            .post(&register_url)
            .header(REGISTRATION_RESP_HEADER, "true")
            .json(descriptor)
            .send()
            .await?;
        match response.status() {
            status if status.is_success() => {}
            StatusCode::CONFLICT => {
                tracing::debug!(peer = %peer_url, "peer already knew us, skipping state push");
                return Ok(false);
            }
            status => {
                return Err(GossipError::Rejected {
                    status: status.as_u16(),
                })
            }
        }

        let (body, signature) = self.sign_payload(state)?;
        let update_url = format!("{base}/update");
        let response = self
            .client
            .post(&update_url)
            .header("content-type", "application/json")
            .header(SIGNATURE_HEADER, signature)
            .header(ORIGIN_ID_HEADER, self.node_id.clone())
            .body(body)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(GossipError::Rejected {
                status: response.status().as_u16(),
            });
        }
        let outcome: UpdateResponse = response.json().await?;
        Ok(outcome.updated)
    }
}
