//! # The Ledger
//!
//! An append-only chain of blocks plus the rules for judging a competing
//! chain. The `Ledger` owns no locks; the consensus engine wraps it in one
//! so chain inspection and replacement are atomic with the rest of the
//! engine state.
//!
//! ## Replacement Rules
//!
//! A candidate chain replaces the local one only when all of these hold:
//!
//! 1. It is structurally valid ([`valid_chain`](Ledger::valid_chain)).
//! 2. Its genesis matches the local genesis, when a local chain exists.
//!    A node that hasn't bootstrapped yet adopts any valid candidate.
//! 3. It is strictly longer, or equal in length with a strictly older
//!    final timestamp. Equal chains never replace each other, so a
//!    re-delivered update is a no-op.
//!
//! The equal-length tie-break prefers the chain whose tip was sealed
//! first. Under unsynchronized clocks this is a known non-determinism
//! source; it is intentionally the network's rule rather than this
//! implementation's invention.

use crate::ledger::block::Block;
use crate::ledger::pow::valid_proof;

/// The local node's view of the chain.
#[derive(Clone, Debug, Default)]
pub struct Ledger {
    blocks: Vec<Block>,
}

impl Ledger {
    /// An empty ledger with no genesis. A node in this state cannot mine.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of blocks in the chain.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// True when the chain has no blocks (not even genesis).
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// The most recent block, if any.
    pub fn last_block(&self) -> Option<&Block> {
        self.blocks.last()
    }

    /// All blocks, genesis first.
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Append a block without validation.
    ///
    /// Callers are responsible for having built the block against the
    /// current tip; the engine does this under its state lock.
    pub fn append(&mut self, block: Block) {
        self.blocks.push(block);
    }

    /// Structural validity of an arbitrary chain slice.
    ///
    /// Each adjacent pair must satisfy hash linkage and the proof-of-work
    /// predicate. The genesis block is exempt from both checks, so a
    /// single-block chain is vacuously valid. An empty chain is valid too;
    /// it simply never wins a replacement contest.
    pub fn valid_chain(chain: &[Block]) -> bool {
        chain.windows(2).all(|pair| {
            let (prev, next) = (&pair[0], &pair[1]);
            next.previous_hash == prev.hash() && valid_proof(prev.proof, next.proof)
        })
    }

    /// Decide whether `candidate` should replace the local chain.
    ///
    /// Pure decision, no mutation. See the module docs for the rules.
    pub fn would_replace(&self, candidate: &[Block]) -> bool {
        if candidate.is_empty() || !Self::valid_chain(candidate) {
            return false;
        }
        if let (Some(local_genesis), Some(remote_genesis)) =
            (self.blocks.first(), candidate.first())
        {
            if local_genesis.hash() != remote_genesis.hash() {
                return false;
            }
        }
        match candidate.len().cmp(&self.blocks.len()) {
            std::cmp::Ordering::Greater => true,
            std::cmp::Ordering::Equal => match (self.blocks.last(), candidate.last()) {
                (Some(local_tip), Some(remote_tip)) => {
                    remote_tip.timestamp < local_tip.timestamp
                }
                _ => false,
            },
            std::cmp::Ordering::Less => false,
        }
    }

    /// Replace the local chain if the candidate wins.
    ///
    /// Returns `true` when a replacement happened.
    pub fn replace_if_better(&mut self, candidate: Vec<Block>) -> bool {
        if self.would_replace(&candidate) {
            self.blocks = candidate;
            true
        } else {
            false
        }
    }

    /// Net balance of `identity`: credits minus debits over every
    /// transaction in the chain.
    pub fn balance(&self, identity: &str) -> i64 {
        self.blocks
            .iter()
            .flat_map(|block| &block.transactions)
            .map(|tx| {
                let mut net = 0i64;
                if tx.recipient == identity {
                    net += tx.amount;
                }
                if tx.sender == identity {
                    net -= tx.amount;
                }
                net
            })
            .sum()
    }
}
