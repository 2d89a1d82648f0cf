//! # Network Module
//!
//! Peer-to-peer layer for Ember. Peer directory, signed gossip fan-out,
//! inbound request authentication, and the wire types shared by all of it.
//!
//! ## Architecture
//!
//! ```text
//! peers.rs   — Identity/address/key directory with ordered fan-out list
//! gossip.rs  — Signed best-effort flooding and the registration handshake
//! auth.rs    — Foreign-signed and local-signed verification policies
//! wire.rs    — JSON request/response shapes
//! ```
//!
//! ## Design Decisions
//!
//! - The registry is `parking_lot::RwLock`-guarded rather than a concurrent
//!   map because flood order must follow insertion order, and reads vastly
//!   outnumber writes anyway.
//! - Gossip is plain HTTP POST fan-out with no delivery guarantees. The
//!   chain replacement rules absorb missed messages; retries would only
//!   add traffic, not consistency.
//! - The wire layer defines types only — actual HTTP serving happens in
//!   the node binary via axum. The protocol crate stays transport-agnostic.

pub mod auth;
pub mod gossip;
pub mod peers;
pub mod wire;

pub use auth::{verify_foreign, verify_local, AuthError};
pub use gossip::{Gossip, GossipError};
pub use peers::PeerRegistry;
pub use wire::{
    BalanceResponse, ChainResponse, NewTransactionRequest, NodeIdResponse, PeerDescriptor,
    ProcessTransactionRequest, RegisterRequest, StateUpdate, UpdateResponse,
};
