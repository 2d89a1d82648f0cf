//! # Proof of Work
//!
//! The work predicate is deliberately simple: hash the previous block's
//! proof concatenated with a candidate, and require the hex digest to end
//! in [`DIFFICULTY`] zero characters. Each block's proof is chained to its
//! predecessor's, so a forged block forces a redo of all work after it.
//!
//! Two search entry points exist. [`proof_of_work`] runs to completion and
//! is what validation-side tests use. [`proof_of_work_cancellable`] is the
//! miner's version: it checks a [`CancellationToken`] every
//! [`POW_CANCEL_POLL_INTERVAL`] candidates so a chain replacement can abort
//! a round that is already lost. The search runs on a blocking thread; the
//! token is the only way the async side can reach in.

use tokio_util::sync::CancellationToken;

use crate::config::{DIFFICULTY, POW_CANCEL_POLL_INTERVAL};
use crate::crypto::hash::sha256_hex;

/// Check whether `proof` satisfies the difficulty predicate against
/// `last_proof`.
///
/// The preimage is the decimal rendering of both numbers, concatenated.
/// That format is part of the consensus rules; changing it invalidates
/// every existing chain.
pub fn valid_proof(last_proof: u64, proof: u64) -> bool {
    let digest = sha256_hex(format!("{last_proof}{proof}").as_bytes());
    digest.ends_with(&"0".repeat(DIFFICULTY))
}

/// Exhaustively search for the smallest proof valid against `last_proof`.
///
/// Deterministic: every node searching from the same `last_proof` finds
/// the same answer. At difficulty 4 this takes on the order of 65k hashes
/// on average.
pub fn proof_of_work(last_proof: u64) -> u64 {
    let mut proof = 0u64;
    while !valid_proof(last_proof, proof) {
        proof += 1;
    }
    proof
}

/// Like [`proof_of_work`], but abortable.
///
/// Returns `None` if `cancel` fires before a proof is found. The token is
/// polled between candidates, not per candidate, so cancellation lands
/// within [`POW_CANCEL_POLL_INTERVAL`] hashes of the request.
pub fn proof_of_work_cancellable(last_proof: u64, cancel: &CancellationToken) -> Option<u64> {
    let mut proof = 0u64;
    loop {
        if proof % POW_CANCEL_POLL_INTERVAL == 0 && cancel.is_cancelled() {
            return None;
        }
        if valid_proof(last_proof, proof) {
            return Some(proof);
        }
        proof += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_found_proof_is_valid() {
        let proof = proof_of_work(100);
        assert!(valid_proof(100, proof));
    }

    #[test]
    fn test_search_is_deterministic() {
        assert_eq!(proof_of_work(100), proof_of_work(100));
    }

    #[test]
    fn test_minimality() {
        // The search returns the smallest valid proof; everything below it
        // must fail the predicate.
        let proof = proof_of_work(7);
        for candidate in 0..proof {
            assert!(!valid_proof(7, candidate));
        }
    }

    #[test]
    fn test_proof_is_chained_to_predecessor() {
        // The predicate takes both numbers; a proof is only meaningful
        // relative to the proof it was mined against.
        let p100 = proof_of_work(100);
        let p101 = proof_of_work(101);
        assert!(valid_proof(100, p100));
        assert!(valid_proof(101, p101));
    }

    #[test]
    fn test_cancellable_finds_same_proof() {
        let token = CancellationToken::new();
        assert_eq!(
            proof_of_work_cancellable(100, &token),
            Some(proof_of_work(100))
        );
    }

    #[test]
    fn test_pre_cancelled_token_aborts_immediately() {
        let token = CancellationToken::new();
        token.cancel();
        assert_eq!(proof_of_work_cancellable(100, &token), None);
    }
}
