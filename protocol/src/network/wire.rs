//! # Wire Types
//!
//! The JSON shapes exchanged between nodes and with clients. These are
//! deliberately separate from the internal ledger types: the engine's
//! structures can grow fields freely without changing what goes over the
//! wire, and inbound payloads get a parsing boundary before they touch
//! consensus state.
//!
//! Nothing in here has behavior. Keep it that way.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::ledger::block::Block;

/// Body of `POST /transactions/new`: a locally signed spend request.
/// The sender is implicit (the local node).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NewTransactionRequest {
    pub recipient: String,
    pub amount: i64,
}

/// Body of `POST /transactions/process`: a fully specified transaction
/// relayed by a registered peer.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProcessTransactionRequest {
    pub sender: String,
    pub recipient: String,
    pub amount: i64,
}

/// One peer as it appears in a shared directory.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerDescriptor {
    pub address: String,
    pub pub_key: String,
}

/// Body of `POST /nodes/register`: a node introducing itself.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub address: String,
    pub node_id: String,
    pub pub_key: String,
}

/// Body of `POST /update`: a peer's full view of the world.
///
/// Chain and directory travel together so one exchange can reconcile both.
/// The directory is a `BTreeMap` keyed by identity; sorted keys keep the
/// signed canonical form stable.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StateUpdate {
    pub chain: Vec<Block>,
    pub peers: BTreeMap<String, PeerDescriptor>,
}

/// Response to `POST /update`: what the receiving node did with it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UpdateResponse {
    /// Whether the receiver replaced its chain.
    pub updated: bool,
    /// Addresses the receiver learned from the update.
    pub new_peers: Vec<String>,
}

/// Response to `GET /chain`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChainResponse {
    pub chain: Vec<Block>,
    pub length: usize,
}

/// Response to `GET /balance`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BalanceResponse {
    pub balance: i64,
}

/// Response to `GET /node_id`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeIdResponse {
    pub node_id: String,
}
