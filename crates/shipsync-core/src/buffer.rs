//! # Durable Payload Buffer
//!
//! Staging area between webhook receipt and ledger application. A buffered
//! payload survives a processing crash: the webhook ingress writes it and
//! returns fast, the worker reads and deletes it, and the retry sweeper
//! re-dispatches any key still present.
//!
//! Deletion is always the worker's responsibility (at-most-one deleter);
//! enumeration never mutates. Each entry carries an attempt counter and the
//! kind of its last failure so the sweeper-visible state distinguishes
//! "never attempted" from "attempted and failed transiently".

use crate::PayloadId;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Core Types
// ============================================================================

/// Failure classification written back to a kept buffer entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Structurally invalid payload; never written back — the entry is
    /// deleted instead
    Malformed,
    /// Waybill uniqueness race; permanent for this delivery
    DuplicateWaybill,
    /// No order owns the waybill yet; retryable until one appears
    OrderMissing,
    /// Ledger briefly unavailable; retryable
    StoreUnavailable,
    /// Unexpected processing failure; retryable
    Internal,
}

impl FailureKind {
    /// Whether a payload that failed this way should stay buffered for the
    /// sweeper
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Malformed => false,
            Self::DuplicateWaybill => false,
            Self::OrderMissing => true,
            Self::StoreUnavailable => true,
            Self::Internal => true,
        }
    }
}

/// A staged, not-yet-applied shipment event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BufferedPayload {
    pub payload_id: PayloadId,

    /// Raw courier event payload as received
    pub body: serde_json::Value,

    pub buffered_at: DateTime<Utc>,

    /// Number of completed processing attempts
    #[serde(default)]
    pub attempts: u32,

    /// Failure kind of the most recent attempt, if any
    #[serde(default)]
    pub last_failure: Option<FailureKind>,
}

impl BufferedPayload {
    /// Stage a freshly received payload
    pub fn new(body: serde_json::Value) -> Self {
        Self {
            payload_id: PayloadId::new(),
            body,
            buffered_at: Utc::now(),
            attempts: 0,
            last_failure: None,
        }
    }

    /// Record a failed attempt for write-back
    pub fn with_failure(mut self, kind: FailureKind) -> Self {
        self.attempts += 1;
        self.last_failure = Some(kind);
        self
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Errors from buffer operations
#[derive(Debug, thiserror::Error)]
pub enum BufferError {
    #[error("Buffer operation failed: {message}")]
    OperationFailed { message: String },

    #[error("Buffer not available: {message}")]
    Unavailable { message: String },

    #[error("Buffered payload could not be decoded: {message}")]
    Corrupt { message: String },
}

impl BufferError {
    /// Check if the buffer error is transient
    pub fn is_transient(&self) -> bool {
        match self {
            Self::OperationFailed { .. } => true,
            Self::Unavailable { .. } => true,
            Self::Corrupt { .. } => false,
        }
    }
}

// ============================================================================
// Contract
// ============================================================================

/// Staging store for pending shipment events, keyed by payload id
///
/// Shared across concurrently-invocable handlers; `delete` of an absent id
/// is not an error, so racing deleters stay harmless.
#[async_trait]
pub trait PayloadBuffer: Send + Sync {
    /// Store (or overwrite) a buffered payload under its id
    async fn put(&self, payload: &BufferedPayload) -> Result<(), BufferError>;

    /// Fetch a buffered payload by id; `None` when absent
    async fn get(&self, id: &PayloadId) -> Result<Option<BufferedPayload>, BufferError>;

    /// Remove a buffered payload; idempotent
    async fn delete(&self, id: &PayloadId) -> Result<(), BufferError>;

    /// Enumerate the ids of every payload still buffered
    ///
    /// Read-only; the sweeper uses this and never deletes.
    async fn list_ids(&self) -> Result<Vec<PayloadId>, BufferError>;
}

#[cfg(test)]
#[path = "buffer_tests.rs"]
mod tests;
