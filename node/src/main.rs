// Copyright (c) 2026 Ember Labs. MIT License.
// See LICENSE for details.

//! # Ember Node
//!
//! Entry point for the `ember-node` binary. Parses CLI arguments,
//! initializes logging and metrics, starts the mining coordinator, and
//! serves the HTTP API.
//!
//! One process runs everything: the consensus engine, the miner task, the
//! gossip client, the API server, and the metrics endpoint.

mod api;
mod cli;
mod logging;
mod metrics;

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::watch;

use ember_protocol::crypto::keys::EmberKeypair;
use ember_protocol::ledger::engine::{ConsensusEngine, EngineConfig};
use ember_protocol::network::gossip::Gossip;
use ember_protocol::network::peers::PeerRegistry;
use ember_protocol::network::wire::RegisterRequest;

use cli::EmberNodeCli;
use logging::LogFormat;
use metrics::NodeMetrics;

#[tokio::main]
async fn main() -> Result<()> {
    let args = EmberNodeCli::parse();

    logging::init_logging(
        "ember_node=info,ember_protocol=info,tower_http=info",
        LogFormat::from_str_lossy(&args.log_format),
    );

    // --- Identity ---
    let keypair = match &args.key {
        Some(hex_key) => Arc::new(
            EmberKeypair::from_hex(hex_key).context("failed to parse EMBER_NODE_KEY")?,
        ),
        None => Arc::new(EmberKeypair::generate()),
    };
    let node_id = uuid::Uuid::new_v4().simple().to_string();

    tracing::info!(
        %node_id,
        public_key = %keypair.public_key_hex(),
        port = args.port,
        metrics_port = args.metrics_port,
        advertise = %args.advertised_address(),
        "starting ember-node"
    );

    // --- Engine ---
    let peers = Arc::new(PeerRegistry::new());
    let gossip = Arc::new(Gossip::new(keypair.clone(), &node_id));
    let engine = Arc::new(ConsensusEngine::new(&node_id, peers, gossip.clone()));

    if args.genesis {
        engine
            .append_genesis()
            .context("failed to mine the genesis block")?;
        tracing::info!("genesis block sealed, founder grant collected");
    }

    // --- Metrics ---
    let node_metrics = Arc::new(NodeMetrics::new());
    node_metrics.chain_height.set(engine.chain_len() as i64);

    // --- Mining coordinator ---
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let miner = tokio::spawn(engine.clone().run_miner(
        EngineConfig {
            accumulation_window: Duration::from_secs(args.accumulation),
        },
        shutdown_rx,
    ));

    // --- Bootstrap ---
    if let Some(peer_url) = &args.peer {
        let descriptor = RegisterRequest {
            address: args.advertised_address(),
            node_id: node_id.clone(),
            pub_key: keypair.public_key_hex(),
        };
        match gossip.introduce(peer_url, &descriptor).await {
            Ok(()) => tracing::info!(peer = %peer_url, "introduced to bootstrap peer"),
            Err(error) => {
                tracing::warn!(peer = %peer_url, %error, "bootstrap introduction failed")
            }
        }
    }

    // --- Application state ---
    let app_state = api::AppState {
        engine: engine.clone(),
        keypair,
        gossip,
        local_address: args.advertised_address(),
        metrics: Arc::clone(&node_metrics),
    };

    // --- API server ---
    let api_router = api::create_router(app_state);
    let api_addr = format!("0.0.0.0:{}", args.port);
    let api_listener = tokio::net::TcpListener::bind(&api_addr)
        .await
        .with_context(|| format!("failed to bind API listener on {}", api_addr))?;
    tracing::info!("API server listening on {}", api_addr);

    // --- Metrics server ---
    let metrics_router = axum::Router::new()
        .route("/metrics", axum::routing::get(metrics::metrics_handler))
        .with_state(Arc::clone(&node_metrics));
    let metrics_addr = format!("0.0.0.0:{}", args.metrics_port);
    let metrics_listener = tokio::net::TcpListener::bind(&metrics_addr)
        .await
        .with_context(|| format!("failed to bind metrics listener on {}", metrics_addr))?;
    tracing::info!("Metrics server listening on {}", metrics_addr);

    // --- Serve ---
    tokio::select! {
        res = axum::serve(api_listener, api_router) => {
            if let Err(e) = res {
                tracing::error!("API server error: {}", e);
            }
        }
        res = axum::serve(metrics_listener, metrics_router) => {
            if let Err(e) = res {
                tracing::error!("Metrics server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received, stopping miner");
        }
    }

    let _ = shutdown_tx.send(true);
    let _ = miner.await;
    tracing::info!("ember-node stopped");
    Ok(())
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
///
/// On non-Unix platforms, only Ctrl+C is supported.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
