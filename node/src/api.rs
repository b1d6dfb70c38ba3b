//! # REST API
//!
//! Builds the axum router that exposes the ledger over HTTP. All endpoints
//! share application state through axum's `State` extractor.
//!
//! ## Endpoints
//!
//! | Method | Path                              | Description                      |
//! |--------|-----------------------------------|----------------------------------|
//! | GET    | `/health`                         | Liveness check                   |
//! | POST   | `/address`                        | Create a bearer account          |
//! | GET    | `/address/:address/balance`       | Latest balance, currency, limits |
//! | GET    | `/address/:address/transactions`  | Account chain, newest first      |
//! | POST   | `/currency`                       | Issue a currency                 |
//! | GET    | `/currency/:code`                 | Currency metadata                |
//! | POST   | `/transaction`                    | Submit a transfer request        |
//! | GET    | `/transaction/:hash`              | A persisted transfer request     |
//!
//! Every response body is `{ "data": ..., "error": { "name", "message" } }`
//! with exactly one of the two set. `name` is the ledger's error code.

use std::time::Instant;

use axum::{
    body::Body,
    extract::{rejection::JsonRejection, Path, Request, State},
    http::{HeaderName, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use tally_protocol::storage::LedgerStore;
use tally_protocol::{Envelope, Ledger, LedgerError, LedgerResult};

use crate::metrics::SharedMetrics;

/// Header carrying the per-request id, accepted from clients or generated.
pub const REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

// ---------------------------------------------------------------------------
// Application State
// ---------------------------------------------------------------------------

/// Shared application state available to all request handlers.
///
/// Cheap to clone — everything behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// The ledger, over whichever store the node was started with.
    pub ledger: Ledger<dyn LedgerStore>,
    /// Reference to Prometheus metrics for in-handler recording.
    pub metrics: SharedMetrics,
    /// The node's reported version string.
    pub version: String,
}

// ---------------------------------------------------------------------------
// Router Construction
// ---------------------------------------------------------------------------

/// Builds the full axum [`Router`] with all API routes, CORS, request ids
/// and tracing.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
        .expose_headers([REQUEST_ID]);

    let trace = TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
        let request_id = request
            .headers()
            .get(&REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("-");
        tracing::info_span!(
            "http",
            method = %request.method(),
            uri = %request.uri(),
            request_id = %request_id,
        )
    });

    Router::new()
        .route("/health", get(health_handler))
        .route("/address", post(create_address_handler))
        .route("/address/:address/balance", get(balance_handler))
        .route("/address/:address/transactions", get(history_handler))
        .route("/currency", post(create_currency_handler))
        .route("/currency/:code", get(currency_handler))
        .route("/transaction", post(create_transaction_handler))
        .route("/transaction/:hash", get(transaction_handler))
        .layer(cors)
        .layer(trace)
        .layer(middleware::from_fn(request_id))
        .with_state(state)
}

/// Tags the request with an id (the client's, or a fresh v4 uuid) before
/// tracing sees it, and echoes it on the response.
async fn request_id(mut request: Request, next: Next) -> Response {
    let id = match request.headers().get(&REQUEST_ID) {
        Some(value) => value.clone(),
        None => HeaderValue::from_str(&Uuid::new_v4().to_string())
            .expect("uuid is a valid header value"),
    };
    request.headers_mut().insert(REQUEST_ID, id.clone());

    let mut response = next.run(request).await;
    response.headers_mut().insert(REQUEST_ID, id);
    response
}

// ---------------------------------------------------------------------------
// Response Types
// ---------------------------------------------------------------------------

/// Body of every API response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub data: Option<T>,
    pub error: Option<ApiError>,
}

/// Error half of [`ApiResponse`].
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    /// Machine-readable error code.
    pub name: String,
    /// Human-readable description.
    pub message: String,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            data: Some(data),
            error: None,
        }
    }
}

impl ApiResponse<()> {
    fn error(name: &str, message: String) -> Self {
        Self {
            data: None,
            error: Some(ApiError {
                name: name.to_string(),
                message,
            }),
        }
    }
}

/// HTTP status for a ledger error.
pub fn status_for(err: &LedgerError) -> StatusCode {
    match err {
        LedgerError::AddressNotFound(_)
        | LedgerError::CurrencyNotFound(_)
        | LedgerError::NotFound(_) => StatusCode::NOT_FOUND,
        LedgerError::AlreadyExists(_)
        | LedgerError::IouClearedBefore(_)
        | LedgerError::RaceConditionFound(_)
        | LedgerError::PartiallySettled { .. } => StatusCode::CONFLICT,
        LedgerError::Store(_) | LedgerError::CorruptedRecord(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
        _ => StatusCode::BAD_REQUEST,
    }
}

/// Render a ledger result and count it.
fn respond<T: Serialize>(
    state: &AppState,
    operation: &str,
    success: StatusCode,
    result: LedgerResult<T>,
) -> Response {
    match result {
        Ok(data) => {
            state.metrics.observe_outcome(operation, None);
            (success, Json(ApiResponse::ok(data))).into_response()
        }
        Err(err) => {
            state.metrics.observe_outcome(operation, Some(err.code()));
            let status = status_for(&err);
            if status.is_server_error() || status == StatusCode::CONFLICT {
                tracing::warn!(operation, code = err.code(), error = %err, "request failed");
            } else {
                tracing::debug!(operation, code = err.code(), error = %err, "request rejected");
            }
            (status, Json(ApiResponse::error(err.code(), err.to_string()))).into_response()
        }
    }
}

/// A body that isn't a JSON envelope never reaches the ledger.
fn reject_body(state: &AppState, operation: &str, rejection: JsonRejection) -> Response {
    let err = LedgerError::MalformedPayload(rejection.body_text());
    state.metrics.observe_outcome(operation, Some(err.code()));
    (
        StatusCode::BAD_REQUEST,
        Json(ApiResponse::error(err.code(), err.to_string())),
    )
        .into_response()
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `GET /health` — returns 200 if the node is alive.
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(serde_json::json!({ "status": "ok", "version": state.version })),
    )
}

/// `POST /address` — create a bearer account from a signed account envelope.
async fn create_address_handler(
    State(state): State<AppState>,
    body: Result<Json<Envelope>, JsonRejection>,
) -> Response {
    let Json(envelope) = match body {
        Ok(body) => body,
        Err(rejection) => return reject_body(&state, "create_address", rejection),
    };
    let result = state.ledger.create_address(envelope).await;
    if result.is_ok() {
        state.metrics.accounts_created_total.inc();
    }
    respond(&state, "create_address", StatusCode::CREATED, result)
}

/// `POST /currency` — create an issuer account and its currency.
async fn create_currency_handler(
    State(state): State<AppState>,
    body: Result<Json<Envelope>, JsonRejection>,
) -> Response {
    let Json(envelope) = match body {
        Ok(body) => body,
        Err(rejection) => return reject_body(&state, "create_currency", rejection),
    };
    let result = state.ledger.create_currency(envelope).await;
    if result.is_ok() {
        state.metrics.accounts_created_total.inc();
        state.metrics.currencies_issued_total.inc();
    }
    respond(&state, "create_currency", StatusCode::CREATED, result)
}

/// `POST /transaction` — authorize and clear a transfer request.
async fn create_transaction_handler(
    State(state): State<AppState>,
    body: Result<Json<Envelope>, JsonRejection>,
) -> Response {
    let Json(envelope) = match body {
        Ok(body) => body,
        Err(rejection) => return reject_body(&state, "transfer", rejection),
    };
    let started = Instant::now();
    let result = state.ledger.request_transfer(envelope).await;
    state
        .metrics
        .transfer_latency_seconds
        .observe(started.elapsed().as_secs_f64());
    if result.is_ok() {
        state.metrics.transfers_cleared_total.inc();
    }
    respond(&state, "transfer", StatusCode::OK, result)
}

/// `GET /address/:address/balance`
async fn balance_handler(
    Path(address): Path<String>,
    State(state): State<AppState>,
) -> Response {
    let result = state.ledger.read_address_balance(&address).await;
    respond(&state, "read_balance", StatusCode::OK, result)
}

/// `GET /address/:address/transactions` — the full chain, newest first.
async fn history_handler(
    Path(address): Path<String>,
    State(state): State<AppState>,
) -> Response {
    let result = state.ledger.read_transaction_history(&address).await;
    respond(&state, "read_history", StatusCode::OK, result)
}

/// `GET /currency/:code`
async fn currency_handler(Path(code): Path<String>, State(state): State<AppState>) -> Response {
    let result = state.ledger.read_currency(&code).await;
    respond(&state, "read_currency", StatusCode::OK, result)
}

/// `GET /transaction/:hash` — the transfer request as it was accepted.
async fn transaction_handler(
    Path(hash): Path<String>,
    State(state): State<AppState>,
) -> Response {
    let result = state.ledger.read_transaction_request(&hash).await;
    respond(&state, "read_transaction", StatusCode::OK, result)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
