//! Response bodies for the HTTP surface.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shipsync_core::{OrderId, PayloadId, Waybill};

/// Webhook ingress response, returned once the payload is staged
#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub message: String,
    pub payload_id: PayloadId,
}

/// Worker response for a successfully applied payload
#[derive(Debug, Serialize)]
pub struct WorkerResponse {
    pub message: String,
    pub order_id: OrderId,
    pub waybill: Waybill,
}

/// Retry sweeper response
#[derive(Debug, Serialize)]
pub struct RetryResponse {
    pub message: String,
    pub redispatched: usize,
}

/// Bulk sync response
#[derive(Debug, Serialize)]
pub struct SyncResponse {
    pub message: String,
    pub attempted: usize,
    pub updated: usize,
    pub failed: usize,
}

/// Bulk sync request body
#[derive(Debug, Default, Deserialize)]
pub struct SyncRequest {
    /// Restrict the run to a single waybill
    pub waybill: Option<String>,
}

/// Worker request body
#[derive(Debug, Deserialize)]
pub struct WorkerRequest {
    pub payload_id: PayloadId,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub version: String,
}

/// Readiness check response
#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    pub timestamp: DateTime<Utc>,
}
