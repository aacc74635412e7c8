//! # Handler and Service Errors
//!
//! Every handler failure is translated at the HTTP boundary into a
//! `{"message": ...}` body and a status code; nothing crosses the interface
//! unformatted. Authentication failures are reported before any side effect
//! takes place.

use crate::config::ConfigError;
use crate::dispatch::DispatchError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use shipsync_core::buffer::BufferError;
use shipsync_core::{PayloadId, Waybill};
use tracing::error;

// ============================================================================
// Handler Errors
// ============================================================================

/// Handler errors with HTTP status code mapping
///
/// - `401 Unauthorized`: credential mismatch for the endpoint's trust domain
/// - `400 Bad Request`: permanently unprocessable input; the staged payload
///   (if any) has already been discarded
/// - `404 Not Found`: worker invoked for an absent payload id
/// - `500 Internal Server Error`: processing failed; a retryable payload
///   stays buffered for the sweeper
/// - `503 Service Unavailable`: an upstream dependency refused or timed out
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Presented token does not match the endpoint's trust domain
    #[error("Unauthorized")]
    Unauthorized,

    /// Payload cannot be normalized, now or ever
    #[error("Malformed payload: {message}")]
    MalformedPayload { message: String },

    /// Waybill uniqueness violation reported by the ledger
    #[error("Duplicate waybill: {waybill}")]
    DuplicateWaybill { waybill: Waybill },

    /// No buffered payload under the given id
    #[error("No buffered payload: {payload_id}")]
    PayloadNotFound { payload_id: PayloadId },

    /// Processing failed; details stay server-side
    #[error("Processing failed: {message}")]
    Internal { message: String },

    /// Courier or storage dependency unavailable
    #[error("Upstream unavailable: {message}")]
    UpstreamUnavailable { message: String },
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::MalformedPayload { .. } => StatusCode::BAD_REQUEST,
            Self::DuplicateWaybill { .. } => StatusCode::BAD_REQUEST,
            Self::PayloadNotFound { .. } => StatusCode::NOT_FOUND,
            Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::UpstreamUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Message safe to return to the caller
    fn client_message(&self) -> String {
        match self {
            // Internal details are logged, not disclosed.
            Self::Internal { message } => {
                error!(error = %message, "Request processing failed");
                "Processing failed".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl From<BufferError> for ApiError {
    fn from(e: BufferError) -> Self {
        if e.is_transient() {
            Self::UpstreamUnavailable {
                message: e.to_string(),
            }
        } else {
            Self::Internal {
                message: e.to_string(),
            }
        }
    }
}

impl From<DispatchError> for ApiError {
    fn from(e: DispatchError) -> Self {
        match e {
            DispatchError::PayloadNotFound { payload_id } => Self::PayloadNotFound { payload_id },
            DispatchError::Buffer(buffer_error) => buffer_error.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = serde_json::json!({ "message": self.client_message() });
        (status, Json(body)).into_response()
    }
}

// ============================================================================
// Service Errors
// ============================================================================

/// Server startup and shutdown errors
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Failed to bind to address {address}: {message}")]
    BindFailed { address: String, message: String },

    #[error("Server failed: {message}")]
    ServerFailed { message: String },

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),
}
