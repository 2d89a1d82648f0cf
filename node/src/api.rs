//! # HTTP API
//!
//! Builds the axum router that exposes the node's HTTP interface. All
//! endpoints share application state through axum's `State` extractor.
//!
//! ## Endpoints
//!
//! | Method | Path                     | Auth           | Description                          |
//! |--------|--------------------------|----------------|--------------------------------------|
//! | GET    | `/health`                | none           | Liveness probe                       |
//! | GET    | `/node_id`               | none           | This node's identity                 |
//! | GET    | `/chain`                 | none           | Full chain snapshot                  |
//! | GET    | `/peers`                 | none           | Known peer identities                |
//! | GET    | `/balance`               | none           | Local node's net balance             |
//! | POST   | `/transactions/new`      | local-signed   | Spend from this node's identity      |
//! | POST   | `/transactions/process`  | foreign-signed | Transaction relayed by a peer        |
//! | POST   | `/nodes/register`        | none           | Peer introduction (handshake entry)  |
//! | POST   | `/update`                | foreign-signed | Full-state gossip exchange           |
//!
//! ## Signed request handling
//!
//! Signed endpoints take the raw body, parse it to JSON, and verify the
//! signature over the canonical rendering of what was parsed. Parse
//! failures and missing credentials are the caller's fault (400); a known
//! request from the wrong signer is a policy refusal (403). The
//! distinction comes straight from [`AuthError`].

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use ember_protocol::config::{ORIGIN_ID_HEADER, REGISTRATION_RESP_HEADER, SIGNATURE_HEADER};
use ember_protocol::crypto::keys::{EmberKeypair, EmberPublicKey};
use ember_protocol::ledger::{ConsensusEngine, Transaction};
use ember_protocol::network::auth::{verify_foreign, verify_local, AuthError};
use ember_protocol::network::gossip::Gossip;
use ember_protocol::network::wire::{
    BalanceResponse, ChainResponse, NewTransactionRequest, NodeIdResponse,
    ProcessTransactionRequest, RegisterRequest, StateUpdate, UpdateResponse,
};

use crate::metrics::SharedMetrics;

// ---------------------------------------------------------------------------
// Application State
// ---------------------------------------------------------------------------

/// Shared application state available to all request handlers.
///
/// Cheap to clone — everything behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// The consensus engine: chain, mempool, and coordinator wake-up.
    pub engine: Arc<ConsensusEngine>,
    /// The node's identity keypair, for local-signed verification and for
    /// signing outbound gossip.
    pub keypair: Arc<EmberKeypair>,
    /// Outbound gossip client shared with the engine.
    pub gossip: Arc<Gossip>,
    /// The address this node advertises to peers.
    pub local_address: String,
    /// Reference to Prometheus metrics for in-handler recording.
    pub metrics: SharedMetrics,
}

impl AppState {
    /// Sync the point-in-time gauges with engine state. Called after any
    /// mutation so scrapes see fresh numbers without touching the engine.
    fn refresh_gauges(&self) {
        self.metrics
            .chain_height
            .set(self.engine.chain_len() as i64);
        self.metrics
            .transactions_in_mempool
            .set(self.engine.mempool_len() as i64);
        self.metrics
            .known_peers
            .set(self.engine.peers().len() as i64);
    }

    /// This node's descriptor as peers should see it.
    fn own_descriptor(&self) -> RegisterRequest {
        RegisterRequest {
            address: self.local_address.clone(),
            node_id: self.engine.node_id().to_string(),
            pub_key: self.keypair.public_key_hex(),
        }
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Handler-level failures, mapped onto HTTP status codes.
#[derive(Debug)]
pub enum ApiError {
    /// Malformed body or missing credentials.
    BadRequest(String),
    /// Valid request, refused by policy (bad signature, unknown origin).
    Forbidden(String),
    /// The registration target already exists.
    Conflict(String),
}

impl From<AuthError> for ApiError {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::MissingCredentials => ApiError::BadRequest("Invalid request".into()),
            AuthError::UnknownOrigin(origin) => {
                ApiError::Forbidden(format!("unknown origin: {origin}"))
            }
            AuthError::BadSignature => ApiError::Forbidden("signature verification failed".into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::Forbidden(message) => (StatusCode::FORBIDDEN, message),
            ApiError::Conflict(message) => (StatusCode::CONFLICT, message),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

// ---------------------------------------------------------------------------
// Router Construction
// ---------------------------------------------------------------------------

/// Builds the full axum [`Router`] with all API routes, CORS, and tracing.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/node_id", get(node_id_handler))
        .route("/chain", get(chain_handler))
        .route("/peers", get(peers_handler))
        .route("/balance", get(balance_handler))
        .route("/transactions/new", post(new_transaction_handler))
        .route("/transactions/process", post(process_transaction_handler))
        .route("/nodes/register", post(register_handler))
        .route("/update", post(update_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

/// Parse a raw body into JSON. A body that isn't JSON is a 400 before any
/// signature check happens; there is nothing meaningful to verify.
fn parse_body(body: &Bytes) -> Result<Value, ApiError> {
    serde_json::from_slice(body).map_err(|_| ApiError::BadRequest("Invalid request".into()))
}

/// Narrow a verified JSON value into its expected wire shape.
fn decode<T: serde::de::DeserializeOwned>(value: Value) -> Result<T, ApiError> {
    serde_json::from_value(value).map_err(|_| ApiError::BadRequest("Invalid request".into()))
}

// ---------------------------------------------------------------------------
// Read-only Handlers
// ---------------------------------------------------------------------------

/// `GET /health` — returns 200 if the node is alive.
///
/// The liveness probe for orchestrators. It intentionally checks nothing
/// beyond "the HTTP task is serving".
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({ "status": "ok" })))
}

/// `GET /node_id` — this node's identity, so operators can wire networks
/// together without grepping logs.
async fn node_id_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(NodeIdResponse {
        node_id: state.engine.node_id().to_string(),
    })
}

/// `GET /chain` — the full chain, genesis first.
async fn chain_handler(State(state): State<AppState>) -> impl IntoResponse {
    let chain = state.engine.chain_snapshot();
    let length = chain.len();
    Json(ChainResponse { chain, length })
}

/// `GET /peers` — the identities of every known peer.
///
/// Identities only. The full keyed directory travels exclusively inside
/// signed `/update` exchanges between registered peers.
async fn peers_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.engine.peers().node_ids())
}

/// `GET /balance` — the local identity's net balance over the chain.
async fn balance_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(BalanceResponse {
        balance: state.engine.balance(state.engine.node_id()),
    })
}

// ---------------------------------------------------------------------------
// Mutating Handlers
// ---------------------------------------------------------------------------

/// `POST /transactions/new` — local-signed spend from this node.
///
/// The transaction enters the local mempool and is relayed to every peer
/// via `/transactions/process`. Returns 201 with the assigned id.
async fn new_transaction_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let value = parse_body(&body)?;
    verify_local(
        &state.keypair.public_key(),
        header_str(&headers, SIGNATURE_HEADER),
        &value,
    )?;
    let request: NewTransactionRequest = decode(value)?;

    let transaction = Transaction::new(
        state.engine.node_id(),
        request.recipient.clone(),
        request.amount,
    );
    let id = transaction.id.clone();
    state.engine.submit_transaction(transaction);
    state.metrics.transactions_submitted_total.inc();
    state.refresh_gauges();

    let relay = ProcessTransactionRequest {
        sender: state.engine.node_id().to_string(),
        recipient: request.recipient,
        amount: request.amount,
    };
    state.gossip.flood(
        "/transactions/process",
        &relay,
        &state.engine.peers().addresses(),
        &[],
    );

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "transaction accepted", "id": id })),
    ))
}

/// `POST /transactions/process` — foreign-signed transaction relay.
///
/// The relayed transaction joins the local mempool and will be included
/// in this node's next mined block.
async fn process_transaction_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let value = parse_body(&body)?;
    let origin = verify_foreign(
        state.engine.peers(),
        header_str(&headers, SIGNATURE_HEADER),
        header_str(&headers, ORIGIN_ID_HEADER),
        &value,
    )?;
    let request: ProcessTransactionRequest = decode(value)?;

    tracing::debug!(%origin, "accepted relayed transaction");
    state.engine.submit_transaction(Transaction::new(
        request.sender,
        request.recipient,
        request.amount,
    ));
    state.metrics.transactions_submitted_total.inc();
    state.refresh_gauges();

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "transaction accepted" })),
    ))
}

/// `POST /nodes/register` — peer introduction.
///
/// Unsigned: a brand-new node has no registered key to verify against.
/// Accepting a registration has side effects unless the request carries
/// the loop-breaker tag: the node handshakes back at the newcomer (so
/// both directories agree) and then floods its state to the old peers,
/// excluding the newcomer, who is getting the state through the
/// handshake already.
async fn register_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let request: RegisterRequest =
        serde_json::from_slice(&body).map_err(|_| ApiError::BadRequest("Invalid request".into()))?;
    let public_key = EmberPublicKey::from_hex(&request.pub_key)
        .map_err(|_| ApiError::BadRequest("Invalid request".into()))?;

    if !state
        .engine
        .peers()
        .add(&request.node_id, &request.address, public_key)
    {
        return Err(ApiError::Conflict("node already registered".into()));
    }
    tracing::info!(peer = %request.node_id, address = %request.address, "peer registered");
    state.metrics.peers_registered_total.inc();
    state.refresh_gauges();

    if !headers.contains_key(REGISTRATION_RESP_HEADER) {
        let gossip = state.gossip.clone();
        let engine = state.engine.clone();
        let descriptor = state.own_descriptor();
        let newcomer = request.address.clone();
        tokio::spawn(complete_registration(gossip, engine, descriptor, newcomer));
    }

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "registration accepted",
            "node_id": state.engine.node_id(),
        })),
    ))
}

/// Second half of accepting a registration: reverse-handshake at the
/// newcomer, then announce it to the old peers.
///
/// The announcement only goes out when the handshake succeeded; a peer we
/// could not reach back is not introduced to the rest of the network.
/// Returns whether the announcement was made.
async fn complete_registration(
    gossip: Arc<Gossip>,
    engine: Arc<ConsensusEngine>,
    descriptor: RegisterRequest,
    newcomer: String,
) -> bool {
    match gossip
        .register_with_peer(&newcomer, &descriptor, &engine.current_state())
        .await
    {
        Ok(adopted) => {
            tracing::debug!(peer = %newcomer, adopted, "reverse handshake complete");
            gossip.flood(
                "/update",
                &engine.current_state(),
                &engine.peers().addresses(),
                std::slice::from_ref(&newcomer),
            );
            true
        }
        Err(error) => {
            tracing::warn!(peer = %newcomer, %error, "reverse handshake failed, peer not announced");
            false
        }
    }
}

/// `POST /update` — foreign-signed full-state exchange.
///
/// Applies the chain replacement rules to the offered chain and merges
/// the offered directory, then reports what actually changed.
async fn update_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let value = parse_body(&body)?;
    let origin = verify_foreign(
        state.engine.peers(),
        header_str(&headers, SIGNATURE_HEADER),
        header_str(&headers, ORIGIN_ID_HEADER),
        &value,
    )?;
    let update: StateUpdate = decode(value)?;

    let updated = state.engine.update_chain(update.chain);
    if updated {
        state.metrics.chain_updates_applied_total.inc();
    }
    let new_peers = state
        .engine
        .peers()
        .merge(&update.peers, state.engine.node_id());
    tracing::debug!(%origin, updated, added = new_peers.len(), "state update processed");
    state.refresh_gauges();

    Ok(Json(UpdateResponse { updated, new_peers }))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
