//! # Ledger
//!
//! The consensus core: block and transaction structures, the proof-of-work
//! predicate, the chain with its replacement rules, and the engine that
//! coordinates mining against concurrent gossip.

pub mod block;
pub mod chain;
pub mod engine;
pub mod pow;

pub use block::{Block, Transaction};
pub use chain::Ledger;
pub use engine::{ConsensusEngine, EngineConfig, EngineError};
pub use pow::{proof_of_work, valid_proof};
