//! # CLI Interface
//!
//! Defines the command-line argument structure for `ember-node` using
//! `clap` derive. The binary has exactly one job, so there are no
//! subcommands — every flag configures the single long-running node.

use clap::Parser;

/// Ember proof-of-work ledger node.
///
/// Runs the consensus engine, the mining coordinator, the gossip
/// broadcaster, and the HTTP API in one process.
#[derive(Parser, Debug)]
#[command(name = "ember-node", about = "Ember proof-of-work ledger node", version)]
pub struct EmberNodeCli {
    /// Port for the HTTP API.
    #[arg(long, short = 'p', env = "EMBER_PORT", default_value_t = 5000)]
    pub port: u16,

    /// Mine the genesis block at startup and collect the founder grant.
    /// Exactly one node per network should pass this.
    #[arg(long, short = 'G')]
    pub genesis: bool,

    /// Accumulation window in seconds: how long the miner waits after the
    /// first transaction of a batch before sealing.
    #[arg(long, short = 'a', env = "EMBER_ACCUMULATION", default_value_t = 3)]
    pub accumulation: u64,

    /// Bootstrap peer URL. When set, the node registers with this peer at
    /// startup and adopts its chain and directory.
    #[arg(long, env = "EMBER_PEER")]
    pub peer: Option<String>,

    /// Address other nodes should use to reach this one.
    ///
    /// Defaults to `http://127.0.0.1:<port>`, which only works on a single
    /// host. Set it explicitly for anything resembling a real network.
    #[arg(long, env = "EMBER_ADVERTISE")]
    pub advertise: Option<String>,

    /// Port for the Prometheus metrics endpoint.
    #[arg(long, env = "EMBER_METRICS_PORT", default_value_t = 5090)]
    pub metrics_port: u16,

    /// Hex-encoded Ed25519 private key for the node identity.
    ///
    /// If not provided, a fresh keypair is generated. **Never pass this
    /// flag on a shared command line** — use the environment variable.
    #[arg(long, env = "EMBER_NODE_KEY")]
    pub key: Option<String>,

    /// Log output format: "pretty" or "json".
    #[arg(long, env = "EMBER_LOG_FORMAT", default_value = "pretty")]
    pub log_format: String,
}

impl EmberNodeCli {
    /// The address peers should dial, honoring `--advertise` when set.
    pub fn advertised_address(&self) -> String {
        self.advertise
            .clone()
            .unwrap_or_else(|| format!("http://127.0.0.1:{}", self.port))
    }
}
