// Copyright (c) 2026 Ember Labs. MIT License.
// See LICENSE for details.

//! # Ember — Core Library
//!
//! Ember is a proof-of-work gossip ledger: a small network of equal nodes
//! that mine blocks over batched transactions and reconcile competing
//! histories by flooding full chains at each other. No committees, no
//! finality gadgets — the longest valid chain wins, and ties go to the
//! tip that was sealed first.
//!
//! ## Architecture
//!
//! The crate is split into modules that mirror the actual concerns of a
//! node:
//!
//! - **crypto** — SHA-256, canonical JSON, and Ed25519 identity keys.
//! - **ledger** — Blocks, proof of work, the chain, and the consensus
//!   engine with its mining coordinator.
//! - **network** — Peer directory, signed gossip flooding, and the
//!   inbound authentication policies.
//! - **config** — Protocol constants. The consensus rules in number form.
//!
//! The HTTP surface lives in the `ember-node` binary crate; everything
//! here is transport-agnostic.
//!
//! ## Design Philosophy
//!
//! 1. Correctness over performance (but we're still fast).
//! 2. One lock around consensus state, so every decision is atomic.
//! 3. Gossip is best-effort; the replacement rules do the real work.
//! 4. If it touches money, it has tests. Plural.

pub mod config;
pub mod crypto;
pub mod ledger;
pub mod network;
