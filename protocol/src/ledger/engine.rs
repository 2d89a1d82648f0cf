//! # Consensus Engine & Mining Coordinator
//!
//! The `ConsensusEngine` ties the ledger, the mempool, and the gossip
//! broadcaster into one shared object. HTTP handlers call into it from
//! many tasks at once; the mining coordinator is a single long-lived task
//! started via [`run_miner`](ConsensusEngine::run_miner).
//!
//! ## The coordinator state machine
//!
//! ```text
//!   Idle ──(transaction arrives)──▶ Accumulating ──(window expires)──▶ Mining
//!    ▲                                                                  │
//!    │          ┌──(proof found, chain unchanged)── seal + flood ───────┤
//!    └──────────┴──(cancelled or chain replaced)─── Reconciling ────────┘
//! ```
//!
//! Idle waits on a [`Notify`] so an empty node costs nothing. Accumulating
//! is a plain sleep: the first transaction of a batch opens a window for
//! stragglers. Mining moves the mempool to an in-flight set and runs the
//! proof search on a blocking thread. Reconciling returns orphaned
//! in-flight transactions to the mempool, minus any that the winning chain
//! already carries.
//!
//! ## The seal race
//!
//! A chain replacement can land while the proof search is off on its
//! blocking thread. [`update_chain`](ConsensusEngine::update_chain) sets a
//! replaced flag and cancels the search while holding the state lock;
//! sealing re-checks that flag under the same lock before appending.
//! A stale proof therefore has exactly zero ways to reach the new chain.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{watch, Notify};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{
    DEFAULT_ACCUMULATION_WINDOW, FOUNDER_BOUNTY, GENESIS_PREVIOUS_HASH, GENESIS_SEED_PROOF,
    MINING_BOUNTY, MINT_SENDER,
};
use crate::ledger::block::{Block, Transaction};
use crate::ledger::chain::Ledger;
use crate::ledger::pow::{proof_of_work, proof_of_work_cancellable};
use crate::network::gossip::Gossip;
use crate::network::peers::PeerRegistry;
use crate::network::wire::StateUpdate;

// ---------------------------------------------------------------------------
// Configuration & Errors
// ---------------------------------------------------------------------------

/// Tunables for the mining coordinator.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// How long the coordinator waits after the first transaction of a
    /// batch before sealing. Longer windows make fuller blocks; shorter
    /// windows make snappier confirmation.
    pub accumulation_window: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            accumulation_window: DEFAULT_ACCUMULATION_WINDOW,
        }
    }
}

/// Errors surfaced by engine operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("ledger already has a genesis block")]
    AlreadyBootstrapped,
}

// ---------------------------------------------------------------------------
// Engine state
// ---------------------------------------------------------------------------

/// Everything the state lock guards. Chain, mempool, and in-flight set
/// live under ONE mutex so every decision about them is atomic.
#[derive(Debug, Default)]
struct EngineState {
    ledger: Ledger,
    mempool: Vec<Transaction>,
    in_flight: Vec<Transaction>,
}

/// Shared consensus state for one node.
pub struct ConsensusEngine {
    node_id: String,
    state: Mutex<EngineState>,
    /// Single-slot wake signal for the coordinator. `Notify` stores at
    /// most one permit, so a burst of submissions collapses into one wake.
    wake: Notify,
    /// Cancellation handle for the proof search currently in flight, if any.
    mining_cancel: Mutex<Option<CancellationToken>>,
    /// Set when a chain replacement lands; consumed at seal time.
    chain_replaced: AtomicBool,
    peers: Arc<PeerRegistry>,
    gossip: Arc<Gossip>,
}

impl ConsensusEngine {
    pub fn new(node_id: impl Into<String>, peers: Arc<PeerRegistry>, gossip: Arc<Gossip>) -> Self {
        Self {
            node_id: node_id.into(),
            state: Mutex::new(EngineState::default()),
            wake: Notify::new(),
            mining_cancel: Mutex::new(None),
            chain_replaced: AtomicBool::new(false),
            peers,
            gossip,
        }
    }

    /// This node's identity.
    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    /// The peer registry this engine shares with the HTTP layer.
    pub fn peers(&self) -> &PeerRegistry {
        &self.peers
    }

    // -----------------------------------------------------------------------
    // Bootstrap
    // -----------------------------------------------------------------------

    /// Mine the genesis block and credit the founder grant to this node.
    ///
    /// Runs the full (non-cancellable) proof search against the network's
    /// fixed seed, so every founder's genesis carries the same proof and
    /// differs only in identity and timestamp.
    pub fn append_genesis(&self) -> Result<Block, EngineError> {
        let proof = proof_of_work(GENESIS_SEED_PROOF);
        let mut state = self.state.lock();
        if !state.ledger.is_empty() {
            return Err(EngineError::AlreadyBootstrapped);
        }
        let grant = Transaction::new(MINT_SENDER, self.node_id.clone(), FOUNDER_BOUNTY);
        let genesis = Block::new(0, vec![grant], proof, GENESIS_PREVIOUS_HASH.to_string());
        state.ledger.append(genesis.clone());
        info!(hash = %genesis.hash(), "genesis block created");
        Ok(genesis)
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// A copy of the full chain, genesis first.
    pub fn chain_snapshot(&self) -> Vec<Block> {
        self.state.lock().ledger.blocks().to_vec()
    }

    /// Chain length in blocks.
    pub fn chain_len(&self) -> usize {
        self.state.lock().ledger.len()
    }

    /// Number of transactions waiting to be mined (excludes in-flight).
    pub fn mempool_len(&self) -> usize {
        self.state.lock().mempool.len()
    }

    /// Net balance of an identity over the whole chain.
    pub fn balance(&self, identity: &str) -> i64 {
        self.state.lock().ledger.balance(identity)
    }

    /// The node's full shareable state: chain plus peer directory.
    pub fn current_state(&self) -> StateUpdate {
        StateUpdate {
            chain: self.chain_snapshot(),
            peers: self.peers.directory(),
        }
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    /// Queue a transaction and wake the coordinator.
    pub fn submit_transaction(&self, transaction: Transaction) {
        {
            let mut state = self.state.lock();
            state.mempool.push(transaction);
        }
        self.wake.notify_one();
    }

    /// Offer a candidate chain. Returns `true` if it replaced ours.
    ///
    /// On replacement the in-progress proof search (if any) is cancelled
    /// and the replaced flag is raised, both while the state lock is still
    /// held. That ordering is what makes a stale seal impossible.
    pub fn update_chain(&self, candidate: Vec<Block>) -> bool {
        let state = &mut *self.state.lock();
        let replaced = state.ledger.replace_if_better(candidate);
        if replaced {
            self.chain_replaced.store(true, Ordering::SeqCst);
            if let Some(token) = self.mining_cancel.lock().as_ref() {
                token.cancel();
            }
            info!(height = state.ledger.len(), "adopted replacement chain");
        }
        replaced
    }

    // -----------------------------------------------------------------------
    // Mining coordinator
    // -----------------------------------------------------------------------

    /// Run the mining coordinator until shutdown.
    ///
    /// One instance per node. See the module docs for the state machine.
    pub async fn run_miner(
        self: Arc<Self>,
        config: EngineConfig,
        mut shutdown: watch::Receiver<bool>,
    ) {
        info!("mining coordinator starting");
        loop {
            // Idle: park until there is work AND a chain to extend.
            loop {
                if *shutdown.borrow() {
                    info!("mining coordinator shutting down");
                    return;
                }
                {
                    let state = self.state.lock();
                    if !state.mempool.is_empty() {
                        if state.ledger.is_empty() {
                            warn!("transactions queued but no genesis block; staying idle");
                        } else {
                            break;
                        }
                    }
                }
                tokio::select! {
                    _ = self.wake.notified() => {}
                    _ = shutdown.changed() => {}
                }
            }

            // Accumulating: let stragglers join the batch.
            debug!(window = ?config.accumulation_window, "accumulating batch");
            tokio::select! {
                _ = tokio::time::sleep(config.accumulation_window) => {}
                _ = shutdown.changed() => {
                    info!("mining coordinator shutting down during accumulation");
                    return;
                }
            }

            let Some(last_proof) = self.take_batch() else {
                continue;
            };

            // Mining: proof search on a blocking thread, cancellable.
            let token = CancellationToken::new();
            *self.mining_cancel.lock() = Some(token.clone());
            let search_token = token.clone();
            let search = tokio::task::spawn_blocking(move || {
                proof_of_work_cancellable(last_proof, &search_token)
            });

            let outcome = tokio::select! {
                result = search => result,
                _ = shutdown.changed() => {
                    token.cancel();
                    info!("mining coordinator shutting down during proof search");
                    return;
                }
            };
            *self.mining_cancel.lock() = None;

            match outcome {
                Ok(Some(proof)) => match self.try_seal(proof) {
                    Some(block) => {
                        info!(
                            index = block.index,
                            txs = block.transactions.len(),
                            "block sealed"
                        );
                        self.gossip.flood(
                            "/update",
                            &self.current_state(),
                            &self.peers.addresses(),
                            &[],
                        );
                    }
                    None => {
                        debug!("chain replaced under us, discarding proof");
                        self.reconcile();
                    }
                },
                Ok(None) => {
                    debug!("proof search cancelled");
                    self.reconcile();
                }
                Err(error) => {
                    warn!(%error, "proof search task failed");
                    self.reconcile();
                }
            }
        }
    }

    /// Move the mempool into the in-flight set and return the proof the
    /// search must build on. `None` when there is nothing to mine.
    ///
    /// Clears the replaced flag under the same lock: the search starts
    /// from this tip, so only replacements landing after this snapshot
    /// make the resulting proof stale.
    fn take_batch(&self) -> Option<u64> {
        let mut state = self.state.lock();
        if state.mempool.is_empty() {
            return None;
        }
        let last_proof = state.ledger.last_block()?.proof;
        self.chain_replaced.store(false, Ordering::SeqCst);
        let batch = std::mem::take(&mut state.mempool);
        state.in_flight.extend(batch);
        Some(last_proof)
    }

    /// Seal the in-flight batch into a block, unless the chain moved.
    ///
    /// Consumes the replaced flag under the state lock. Returns the sealed
    /// block, or `None` when the proof is stale and the caller must
    /// reconcile instead.
    fn try_seal(&self, proof: u64) -> Option<Block> {
        let mut state = self.state.lock();
        if self.chain_replaced.swap(false, Ordering::SeqCst) {
            return None;
        }
        let tip = state.ledger.last_block()?;
        let (next_index, previous_hash) = (tip.index + 1, tip.hash());

        let mut transactions = std::mem::take(&mut state.in_flight);
        transactions.push(Transaction::new(
            MINT_SENDER,
            self.node_id.clone(),
            MINING_BOUNTY,
        ));
        let block = Block::new(next_index, transactions, proof, previous_hash);
        state.ledger.append(block.clone());
        Some(block)
    }

    /// Return orphaned in-flight transactions to the mempool.
    ///
    /// Transactions whose id already appears in the adopted chain's latest
    /// block were mined by whoever beat us and must not run twice. The
    /// replaced flag is cleared here for the cancellation path, where
    /// `try_seal` never ran to consume it.
    fn reconcile(&self) {
        let mut state = self.state.lock();
        self.chain_replaced.store(false, Ordering::SeqCst);
        let mined_ids: Vec<String> = state
            .ledger
            .last_block()
            .map(|block| block.transactions.iter().map(|tx| tx.id.clone()).collect())
            .unwrap_or_default();
        let in_flight = std::mem::take(&mut state.in_flight);
        let before = in_flight.len();
        let orphans: Vec<Transaction> = in_flight
            .into_iter()
            .filter(|tx| !mined_ids.contains(&tx.id))
            .collect();
        debug!(
            requeued = orphans.len(),
            dropped = before - orphans.len(),
            "reconciled in-flight transactions"
        );
        state.mempool.extend(orphans);
        let requeue = !state.mempool.is_empty();
        drop(state);
        if requeue {
            self.wake.notify_one();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keys::EmberKeypair;
    use crate::ledger::pow::valid_proof;

    fn engine(node_id: &str) -> Arc<ConsensusEngine> {
        let keypair = Arc::new(EmberKeypair::generate());
        let peers = Arc::new(PeerRegistry::new());
        let gossip = Arc::new(Gossip::new(keypair, node_id.to_string()));
        Arc::new(ConsensusEngine::new(node_id, peers, gossip))
    }

    fn successor(prev: &Block, timestamp: u64) -> Block {
        Block {
            index: prev.index + 1,
            timestamp,
            transactions: vec![],
            proof: proof_of_work(prev.proof),
            previous_hash: prev.hash(),
        }
    }

    // -----------------------------------------------------------------------
    // Bootstrap
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn test_genesis_grants_founder_bounty() {
        let engine = engine("founder");
        let genesis = engine.append_genesis().unwrap();
        assert_eq!(genesis.index, 0);
        assert_eq!(genesis.previous_hash, GENESIS_PREVIOUS_HASH);
        assert!(valid_proof(GENESIS_SEED_PROOF, genesis.proof));
        assert_eq!(engine.balance("founder"), FOUNDER_BOUNTY);
    }

    #[tokio::test]
    async fn test_second_genesis_is_rejected() {
        let engine = engine("founder");
        engine.append_genesis().unwrap();
        assert_eq!(
            engine.append_genesis(),
            Err(EngineError::AlreadyBootstrapped)
        );
        assert_eq!(engine.chain_len(), 1);
    }

    // -----------------------------------------------------------------------
    // Batching & sealing
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn test_take_batch_moves_mempool_to_in_flight() {
        let engine = engine("n");
        engine.append_genesis().unwrap();
        engine.submit_transaction(Transaction::new("a", "b", 1));
        engine.submit_transaction(Transaction::new("b", "c", 2));

        let last_proof = engine.take_batch().unwrap();
        assert!(valid_proof(GENESIS_SEED_PROOF, last_proof));
        assert_eq!(engine.mempool_len(), 0);
        assert_eq!(engine.state.lock().in_flight.len(), 2);
    }

    #[tokio::test]
    async fn test_take_batch_empty_mempool_is_none() {
        let engine = engine("n");
        engine.append_genesis().unwrap();
        assert!(engine.take_batch().is_none());
    }

    #[tokio::test]
    async fn test_seal_appends_batch_plus_reward() {
        let engine = engine("miner");
        let genesis = engine.append_genesis().unwrap();
        let tx = Transaction::new("miner", "bob", 3);
        engine.submit_transaction(tx.clone());
        let last_proof = engine.take_batch().unwrap();

        let proof = proof_of_work(last_proof);
        let block = engine.try_seal(proof).unwrap();

        assert_eq!(block.index, 1);
        assert_eq!(block.previous_hash, genesis.hash());
        assert_eq!(block.transactions.len(), 2);
        assert!(block.transactions.contains(&tx));
        let reward = block.transactions.last().unwrap();
        assert_eq!(reward.sender, MINT_SENDER);
        assert_eq!(reward.recipient, "miner");
        assert_eq!(reward.amount, MINING_BOUNTY);
        assert!(Ledger::valid_chain(&engine.chain_snapshot()));
    }

    // -----------------------------------------------------------------------
    // Chain replacement & reconciliation
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn test_update_chain_adopts_longer_chain() {
        let engine = engine("n");
        let genesis = engine.append_genesis().unwrap();
        let candidate = vec![genesis.clone(), successor(&genesis, genesis.timestamp + 1)];
        assert!(engine.update_chain(candidate));
        assert_eq!(engine.chain_len(), 2);
    }

    #[tokio::test]
    async fn test_update_chain_rejects_equal_chain() {
        let engine = engine("n");
        engine.append_genesis().unwrap();
        let snapshot = engine.chain_snapshot();
        assert!(!engine.update_chain(snapshot));
    }

    #[tokio::test]
    async fn test_replacement_during_mining_suppresses_seal() {
        let engine = engine("n");
        let genesis = engine.append_genesis().unwrap();
        let tx = Transaction::new("a", "b", 1);
        engine.submit_transaction(tx.clone());
        let last_proof = engine.take_batch().unwrap();
        let proof = proof_of_work(last_proof);

        // A rival chain lands while our proof is "in flight".
        let rival = vec![genesis.clone(), successor(&genesis, genesis.timestamp + 1)];
        assert!(engine.update_chain(rival));

        // The stale proof must not seal; reconciliation requeues the batch.
        assert!(engine.try_seal(proof).is_none());
        engine.reconcile();
        assert_eq!(engine.mempool_len(), 1);
        assert_eq!(engine.chain_len(), 2);
    }

    #[tokio::test]
    async fn test_reconcile_drops_transactions_already_mined() {
        let engine = engine("n");
        let genesis = engine.append_genesis().unwrap();
        let tx = Transaction::new("a", "b", 1);
        engine.submit_transaction(tx.clone());
        engine.take_batch().unwrap();

        // The rival block carries our transaction.
        let mut rival_tip = successor(&genesis, genesis.timestamp + 1);
        rival_tip.transactions.push(tx.clone());
        assert!(engine.update_chain(vec![genesis, rival_tip]));

        engine.reconcile();
        assert_eq!(engine.mempool_len(), 0);
    }

    #[tokio::test]
    async fn test_idle_time_update_does_not_suppress_next_seal() {
        // A chain adopted while the miner is idle is the tip the next
        // batch mines against; that proof is fresh, not stale.
        let engine = engine("n");
        let genesis = engine.append_genesis().unwrap();
        assert!(engine.update_chain(vec![
            genesis.clone(),
            successor(&genesis, genesis.timestamp + 1)
        ]));

        engine.submit_transaction(Transaction::new("a", "b", 1));
        let last_proof = engine.take_batch().unwrap();
        let sealed = engine.try_seal(proof_of_work(last_proof));

        assert!(sealed.is_some());
        assert_eq!(engine.chain_len(), 3);
        assert!(Ledger::valid_chain(&engine.chain_snapshot()));
    }

    #[tokio::test]
    async fn test_update_chain_cancels_active_search() {
        let engine = engine("n");
        let genesis = engine.append_genesis().unwrap();
        let token = CancellationToken::new();
        *engine.mining_cancel.lock() = Some(token.clone());

        assert!(engine.update_chain(vec![
            genesis.clone(),
            successor(&genesis, genesis.timestamp + 1)
        ]));
        assert!(token.is_cancelled());
    }

    // -----------------------------------------------------------------------
    // End to end
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn test_miner_seals_submitted_transaction() {
        let engine = engine("miner");
        engine.append_genesis().unwrap();

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let config = EngineConfig {
            accumulation_window: Duration::from_millis(20),
        };
        let miner = tokio::spawn(engine.clone().run_miner(config, shutdown_rx));

        let tx = Transaction::new("miner", "bob", 1);
        engine.submit_transaction(tx.clone());

        let deadline = tokio::time::Instant::now() + Duration::from_secs(30);
        while engine.chain_len() < 2 {
            assert!(
                tokio::time::Instant::now() < deadline,
                "miner did not seal a block in time"
            );
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        let chain = engine.chain_snapshot();
        assert!(Ledger::valid_chain(&chain));
        let sealed = chain.last().unwrap();
        assert!(sealed.transactions.contains(&tx));
        assert_eq!(engine.balance("miner"), FOUNDER_BOUNTY - 1 + MINING_BOUNTY);
        assert_eq!(engine.balance("bob"), 1);

        shutdown_tx.send(true).ok();
        let _ = miner.await;
    }

    #[tokio::test]
    async fn test_miner_stays_idle_without_genesis() {
        let engine = engine("n");
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let config = EngineConfig {
            accumulation_window: Duration::from_millis(10),
        };
        let miner = tokio::spawn(engine.clone().run_miner(config, shutdown_rx));

        engine.submit_transaction(Transaction::new("a", "b", 1));
        tokio::time::sleep(Duration::from_millis(100)).await;

        // No chain to extend, so nothing was mined and nothing was lost.
        assert_eq!(engine.chain_len(), 0);
        assert_eq!(engine.mempool_len(), 1);

        shutdown_tx.send(true).ok();
        let _ = miner.await;
    }
}
