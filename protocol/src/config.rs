//! # Protocol Configuration & Constants
//!
//! Every magic number in Ember lives here. If you're hardcoding a constant
//! somewhere else, you're doing it wrong and you owe the team coffee.
//!
//! These values define the consensus rules of the network. Two nodes that
//! disagree on any of them will happily fork away from each other, so treat
//! this file as part of the wire protocol.

use std::time::Duration;

// ---------------------------------------------------------------------------
// Proof of Work
// ---------------------------------------------------------------------------

/// Number of trailing zero hex characters a proof digest must carry.
/// Four zeros keeps a solve in the tens-of-milliseconds range on commodity
/// hardware, which is exactly what a gossip testbed wants.
pub const DIFFICULTY: usize = 4;

/// How many candidate proofs the search tries between cancellation checks.
/// Small enough that an aborted round dies quickly, large enough that the
/// atomic load doesn't show up in profiles.
pub const POW_CANCEL_POLL_INTERVAL: u64 = 1024;

// ---------------------------------------------------------------------------
// Rewards
// ---------------------------------------------------------------------------

/// Synthetic sender identity for newly minted coins. Not a real peer; the
/// registry will never contain it and no signature ever covers it.
pub const MINT_SENDER: &str = "mint";

/// Coins minted to the local node for each block it seals.
pub const MINING_BOUNTY: i64 = 2;

/// One-off grant minted to the node that creates the genesis block.
pub const FOUNDER_BOUNTY: i64 = 200;

// ---------------------------------------------------------------------------
// Genesis
// ---------------------------------------------------------------------------

/// Seed value fed to the proof search when there is no previous block.
/// Arbitrary, but fixed network-wide so independent genesis blocks at least
/// agree on their proof lineage.
pub const GENESIS_SEED_PROOF: u64 = 100;

/// Sentinel `previous_hash` for the genesis block. Not a digest of anything.
pub const GENESIS_PREVIOUS_HASH: &str = "1";

// ---------------------------------------------------------------------------
// Timing
// ---------------------------------------------------------------------------

/// Default accumulation window. After the first transaction of a batch
/// arrives the miner waits this long for stragglers before sealing.
pub const DEFAULT_ACCUMULATION_WINDOW: Duration = Duration::from_secs(3);

// ---------------------------------------------------------------------------
// Wire Headers
// ---------------------------------------------------------------------------

/// Header carrying the hex-encoded signature over the canonical request body.
pub const SIGNATURE_HEADER: &str = "signature";

/// Header naming the peer identity that produced the signature.
pub const ORIGIN_ID_HEADER: &str = "origin-id";

/// Loop-breaker header for the registration handshake. A register request
/// tagged with this header must not trigger a reverse handshake, otherwise
/// two fresh nodes would introduce each other forever.
pub const REGISTRATION_RESP_HEADER: &str = "Registration-Resp";

// ---------------------------------------------------------------------------
// Network Defaults
// ---------------------------------------------------------------------------

/// Default HTTP API port.
pub const DEFAULT_API_PORT: u16 = 5000;

/// Default metrics (Prometheus) port.
pub const DEFAULT_METRICS_PORT: u16 = 5090;
