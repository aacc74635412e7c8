//! # Shipsync HTTP Service
//!
//! HTTP surface of the order-status synchronization pipeline:
//! - courier webhook ingress that stages payloads in the durable buffer and
//!   returns fast,
//! - internal worker endpoint that applies one buffered payload,
//! - retry sweeper that re-dispatches everything still buffered,
//! - bulk sync trigger that pulls the courier's status API,
//! - health and readiness probes.
//!
//! Each entry point authenticates against its own trust domain before any
//! side effect takes place.

pub mod config;
pub mod dispatch;
pub mod errors;
pub mod responses;

use axum::{
    extract::{DefaultBodyLimit, State},
    http::{header, HeaderMap, StatusCode},
    response::Json,
    routing::{get, post},
    Router,
};
use bytes::Bytes;
use chrono::Utc;
use shipsync_core::buffer::{BufferedPayload, PayloadBuffer};
use shipsync_core::bulk_sync::BulkSyncJob;
use shipsync_core::courier::{self, CourierEvent};
use shipsync_core::credentials::{self, CredentialSet, TrustDomain};
use shipsync_core::reconciler::Reconciler;
use shipsync_core::{OrderStoreError, Waybill};
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer,
};
use tracing::{info, instrument, warn};

use config::ServiceConfig;
use dispatch::{Dispatcher, WorkerOutcome};
use errors::{ApiError, ServiceError};
use responses::{
    HealthResponse, ReadinessResponse, RetryResponse, SyncRequest, SyncResponse, WebhookResponse,
    WorkerRequest, WorkerResponse,
};

// ============================================================================
// Application State
// ============================================================================

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Configuration for the service
    pub config: Arc<ServiceConfig>,

    /// Durable buffer for staged courier payloads
    pub buffer: Arc<dyn PayloadBuffer>,

    /// Reconciler shared by the worker and bulk sync paths
    pub reconciler: Arc<Reconciler>,

    /// Pull-based bulk sync job
    pub bulk_sync: Arc<BulkSyncJob>,

    /// Per-trust-domain credentials
    pub credentials: Arc<CredentialSet>,

    /// Worker dispatch routine
    pub dispatcher: Arc<Dispatcher>,
}

impl AppState {
    /// Create new application state
    pub fn new(
        config: Arc<ServiceConfig>,
        buffer: Arc<dyn PayloadBuffer>,
        reconciler: Arc<Reconciler>,
        bulk_sync: Arc<BulkSyncJob>,
        credentials: Arc<CredentialSet>,
    ) -> Self {
        let dispatcher = Arc::new(Dispatcher::new(
            Arc::clone(&buffer),
            Arc::clone(&reconciler),
            config.buffer.max_attempts,
        ));

        Self {
            config,
            buffer,
            reconciler,
            bulk_sync,
            credentials,
            dispatcher,
        }
    }
}

// ============================================================================
// HTTP Server
// ============================================================================

/// Create HTTP router with all endpoints
pub fn create_router(state: AppState) -> Router {
    let max_body_size = state.config.server.max_body_size;
    let request_timeout = std::time::Duration::from_secs(state.config.server.timeout_seconds);

    Router::new()
        .route("/webhook/courier-scans", post(handle_webhook))
        .route("/worker/process", post(handle_worker_process))
        .route("/worker/retry", post(handle_worker_retry))
        .route("/sync", post(handle_sync))
        .route("/health", get(handle_health_check))
        .route("/ready", get(handle_readiness_check))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::new(request_timeout))
                .layer(CompressionLayer::new())
                .layer(CorsLayer::permissive())
                .layer(DefaultBodyLimit::max(max_body_size))
                .into_inner(),
        )
        .with_state(state)
}

/// Start HTTP server with graceful shutdown
pub async fn start_server(state: AppState) -> Result<(), ServiceError> {
    let server = &state.config.server;
    let shutdown_timeout = std::time::Duration::from_secs(server.shutdown_timeout_seconds);

    let addr: SocketAddr = format!("{}:{}", server.host, server.port)
        .parse()
        .map_err(|e| ServiceError::BindFailed {
            address: format!("{}:{}", server.host, server.port),
            message: format!("Invalid listen address: {}", e),
        })?;

    let app = create_router(state);

    let listener =
        tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| ServiceError::BindFailed {
                address: addr.to_string(),
                message: e.to_string(),
            })?;

    info!("Starting HTTP server on {}", addr);

    let shutdown_signal = async move {
        let ctrl_c = async {
            tokio::signal::ctrl_c()
                .await
                .expect("Failed to install Ctrl+C signal handler");
        };

        #[cfg(unix)]
        let terminate = async {
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("Failed to install SIGTERM signal handler")
                .recv()
                .await;
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                info!("Received SIGINT (Ctrl+C), initiating graceful shutdown with {}s timeout", shutdown_timeout.as_secs());
            },
            _ = terminate => {
                info!("Received SIGTERM, initiating graceful shutdown with {}s timeout", shutdown_timeout.as_secs());
            },
        }
    };

    // In-flight requests complete before shutdown; new connections are
    // refused as soon as the signal arrives.
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await
        .map_err(|e| ServiceError::ServerFailed {
            message: e.to_string(),
        })?;

    info!("HTTP server shutdown complete");
    Ok(())
}

// ============================================================================
// Authentication
// ============================================================================

/// Verify a `Bearer` token for the given trust domain; fails closed.
fn authorize_bearer(
    state: &AppState,
    headers: &HeaderMap,
    domain: TrustDomain,
) -> Result<(), ApiError> {
    let presented = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(credentials::bearer_token);

    match presented {
        Some(token) if state.credentials.verify(domain, token) => Ok(()),
        _ => {
            warn!(domain = %domain, "Rejected request with invalid credentials");
            Err(ApiError::Unauthorized)
        }
    }
}

/// Verify the raw `x-cron-token` header used by the scheduled sweeper.
fn authorize_cron_header(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let presented = headers.get("x-cron-token").and_then(|v| v.to_str().ok());

    match presented {
        Some(token) if state.credentials.verify(TrustDomain::CronSweeper, token) => Ok(()),
        _ => {
            warn!(domain = %TrustDomain::CronSweeper, "Rejected request with invalid credentials");
            Err(ApiError::Unauthorized)
        }
    }
}

// ============================================================================
// Webhook Ingress
// ============================================================================

/// Handle courier shipment-scan webhooks.
///
/// Fast path: authenticate, structural pre-check, one buffer write, spawn
/// the in-process dispatch, respond. The ledger is never touched here, so
/// the courier gets its acknowledgement well inside its delivery timeout.
#[instrument(skip(state, headers, body))]
async fn handle_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookResponse>, ApiError> {
    authorize_bearer(&state, &headers, TrustDomain::CourierWebhook)?;

    let value: serde_json::Value =
        serde_json::from_slice(&body).map_err(|e| ApiError::MalformedPayload {
            message: format!("Body is not valid JSON: {}", e),
        })?;

    let event: CourierEvent =
        serde_json::from_value(value.clone()).map_err(|e| ApiError::MalformedPayload {
            message: format!("Body is not a courier event: {}", e),
        })?;

    // Permanently unprocessable payloads are rejected before staging.
    if !courier::has_required_shape(&event) {
        return Err(ApiError::MalformedPayload {
            message: "Payload is missing Shipment, AWB, or Status".to_string(),
        });
    }

    let payload = BufferedPayload::new(value);
    let payload_id = payload.payload_id;
    state.buffer.put(&payload).await?;

    state.dispatcher.spawn(payload_id);

    info!(payload_id = %payload_id, "Staged courier payload");

    Ok(Json(WebhookResponse {
        message: "OK".to_string(),
        payload_id,
    }))
}

// ============================================================================
// Worker
// ============================================================================

/// Process one buffered payload synchronously.
///
/// The body is read raw and parsed only after authentication, so an
/// unauthenticated caller learns nothing from parse errors and every
/// rejection carries the standard error body.
#[instrument(skip(state, headers, body))]
async fn handle_worker_process(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WorkerResponse>, ApiError> {
    authorize_bearer(&state, &headers, TrustDomain::InternalWorker)?;

    let request: WorkerRequest =
        serde_json::from_slice(&body).map_err(|e| ApiError::MalformedPayload {
            message: format!("Body is not a worker request: {}", e),
        })?;

    let outcome = state.dispatcher.process(&request.payload_id).await?;

    match outcome {
        WorkerOutcome::Applied(order) => {
            let waybill = order.waybill.clone().ok_or_else(|| ApiError::Internal {
                message: "Applied order lost its waybill".to_string(),
            })?;

            Ok(Json(WorkerResponse {
                message: "Processed".to_string(),
                order_id: order.id,
                waybill,
            }))
        }
        WorkerOutcome::Malformed { reason } => {
            Err(ApiError::MalformedPayload { message: reason })
        }
        WorkerOutcome::Duplicate { waybill } => Err(ApiError::DuplicateWaybill { waybill }),
        WorkerOutcome::Retained { attempts, kind } => Err(ApiError::Internal {
            message: format!(
                "Attempt {} failed ({:?}); payload retained for retry",
                attempts, kind
            ),
        }),
        WorkerOutcome::Dropped { attempts, kind } => Err(ApiError::Internal {
            message: format!(
                "Payload dropped after {} attempts (last failure {:?})",
                attempts, kind
            ),
        }),
    }
}

/// Re-dispatch every payload still in the buffer.
///
/// Fire-and-forget per key: the response counts keys attempted, not
/// individual outcomes, which the spawned dispatches log themselves.
#[instrument(skip(state))]
async fn handle_worker_retry(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<RetryResponse>, ApiError> {
    authorize_cron_header(&state, &headers)?;

    let ids = state.buffer.list_ids().await?;
    let redispatched = ids.len();

    for id in ids {
        state.dispatcher.spawn(id);
    }

    info!(redispatched, "Sweeper re-dispatched buffered payloads");

    Ok(Json(RetryResponse {
        message: format!("Retried {} payloads", redispatched),
        redispatched,
    }))
}

// ============================================================================
// Bulk Sync
// ============================================================================

/// Run the pull-based bulk sync, optionally for a single waybill.
///
/// An empty body means "sync everything"; parsing happens after
/// authentication, as in the other mutating handlers.
#[instrument(skip(state, headers, body))]
async fn handle_sync(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<SyncResponse>, ApiError> {
    authorize_bearer(&state, &headers, TrustDomain::CronSweeper)?;

    let request: SyncRequest = if body.is_empty() {
        SyncRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| ApiError::MalformedPayload {
            message: format!("Body is not a sync request: {}", e),
        })?
    };

    let waybill = request
        .waybill
        .map(|raw| {
            Waybill::new(raw).map_err(|e| ApiError::MalformedPayload {
                message: e.to_string(),
            })
        })
        .transpose()?;

    let report = state
        .bulk_sync
        .run(waybill)
        .await
        .map_err(|e| match &e {
            OrderStoreError::Unavailable { .. } => ApiError::UpstreamUnavailable {
                message: e.to_string(),
            },
            _ => ApiError::Internal {
                message: e.to_string(),
            },
        })?;

    Ok(Json(SyncResponse {
        message: "Sync complete".to_string(),
        attempted: report.attempted,
        updated: report.updated,
        failed: report.failed,
    }))
}

// ============================================================================
// Health
// ============================================================================

/// Basic liveness check
async fn handle_health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: Utc::now(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Readiness check: the service is ready once the buffer responds
#[instrument(skip(state))]
async fn handle_readiness_check(
    State(state): State<AppState>,
) -> Result<Json<ReadinessResponse>, StatusCode> {
    match state.buffer.list_ids().await {
        Ok(_) => Ok(Json(ReadinessResponse {
            ready: true,
            timestamp: Utc::now(),
        })),
        Err(e) => {
            warn!(error = %e, "Readiness check failed");
            Err(StatusCode::SERVICE_UNAVAILABLE)
        }
    }
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
