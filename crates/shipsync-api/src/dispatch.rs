//! # Worker Dispatch
//!
//! The single processing routine behind every consumption path: the HTTP
//! worker endpoint, the post-webhook in-process dispatch, and the sweeper's
//! re-dispatches all run [`Dispatcher::process`].
//!
//! Buffer lifecycle per outcome:
//! - applied, malformed, or duplicate-waybill: the entry is deleted,
//! - retryable failure below `max_attempts`: the entry is written back with
//!   an incremented attempt counter and the failure kind,
//! - retryable failure at `max_attempts`: the entry is deleted so a poison
//!   payload cannot circulate forever.

use shipsync_core::buffer::{BufferError, FailureKind, PayloadBuffer};
use shipsync_core::courier::{self, CourierEvent};
use shipsync_core::order::{Order, OrderStoreError};
use shipsync_core::reconciler::{ReconcileError, Reconciler};
use shipsync_core::{PayloadId, Waybill};
use std::sync::Arc;
use tracing::{info, instrument, warn};

// ============================================================================
// Outcomes
// ============================================================================

/// Result of processing one buffered payload
#[derive(Debug)]
pub enum WorkerOutcome {
    /// Event applied to the ledger; entry deleted
    Applied(Order),

    /// Payload can never be applied; entry deleted
    Malformed { reason: String },

    /// Waybill uniqueness race reported by the ledger; entry deleted
    Duplicate { waybill: Waybill },

    /// Retryable failure; entry written back for the sweeper
    Retained { attempts: u32, kind: FailureKind },

    /// Retryable failure at the attempt limit; entry deleted as poison
    Dropped { attempts: u32, kind: FailureKind },
}

/// Errors that prevent reaching an outcome at all
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("No buffered payload: {payload_id}")]
    PayloadNotFound { payload_id: PayloadId },

    #[error("Buffer failure: {0}")]
    Buffer(#[from] BufferError),
}

// ============================================================================
// Dispatcher
// ============================================================================

/// Shared worker routine over the buffer and the reconciler
pub struct Dispatcher {
    buffer: Arc<dyn PayloadBuffer>,
    reconciler: Arc<Reconciler>,
    max_attempts: u32,
}

impl Dispatcher {
    /// Create a dispatcher with injected collaborators
    pub fn new(
        buffer: Arc<dyn PayloadBuffer>,
        reconciler: Arc<Reconciler>,
        max_attempts: u32,
    ) -> Self {
        Self {
            buffer,
            reconciler,
            max_attempts,
        }
    }

    /// Process one buffered payload to completion.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::PayloadNotFound`] when no entry exists under
    /// the id and [`DispatchError::Buffer`] when the buffer itself fails;
    /// every reconciliation result, including failure, is a [`WorkerOutcome`].
    #[instrument(skip(self), fields(payload_id = %payload_id))]
    pub async fn process(&self, payload_id: &PayloadId) -> Result<WorkerOutcome, DispatchError> {
        let payload =
            self.buffer
                .get(payload_id)
                .await?
                .ok_or(DispatchError::PayloadNotFound {
                    payload_id: *payload_id,
                })?;

        let event: CourierEvent = match serde_json::from_value(payload.body.clone()) {
            Ok(event) => event,
            Err(e) => {
                self.buffer.delete(payload_id).await?;
                return Ok(WorkerOutcome::Malformed {
                    reason: format!("Payload is not a courier event: {}", e),
                });
            }
        };

        if !courier::has_required_shape(&event) {
            self.buffer.delete(payload_id).await?;
            return Ok(WorkerOutcome::Malformed {
                reason: "Payload is missing Shipment, AWB, or Status".to_string(),
            });
        }

        match self.reconciler.apply(&event).await {
            Ok(order) => {
                self.buffer.delete(payload_id).await?;
                info!(order_id = %order.id, "Payload applied and removed from buffer");
                Ok(WorkerOutcome::Applied(order))
            }
            Err(ReconcileError::Normalize(e)) => {
                self.buffer.delete(payload_id).await?;
                Ok(WorkerOutcome::Malformed {
                    reason: e.to_string(),
                })
            }
            Err(ReconcileError::Store(OrderStoreError::DuplicateWaybill { waybill })) => {
                self.buffer.delete(payload_id).await?;
                Ok(WorkerOutcome::Duplicate { waybill })
            }
            Err(ReconcileError::Store(store_error)) => {
                let kind = match store_error {
                    OrderStoreError::NotFound { .. } => FailureKind::OrderMissing,
                    OrderStoreError::Unavailable { .. } => FailureKind::StoreUnavailable,
                    _ => FailureKind::Internal,
                };

                let failed = payload.with_failure(kind);
                if failed.attempts >= self.max_attempts {
                    self.buffer.delete(payload_id).await?;
                    warn!(
                        attempts = failed.attempts,
                        kind = ?kind,
                        "Payload exhausted its attempts and was dropped"
                    );
                    Ok(WorkerOutcome::Dropped {
                        attempts: failed.attempts,
                        kind,
                    })
                } else {
                    self.buffer.put(&failed).await?;
                    warn!(
                        attempts = failed.attempts,
                        kind = ?kind,
                        "Payload retained for retry"
                    );
                    Ok(WorkerOutcome::Retained {
                        attempts: failed.attempts,
                        kind,
                    })
                }
            }
        }
    }

    /// Fire-and-forget dispatch used after webhook staging and by the
    /// sweeper; the outcome is logged only.
    pub fn spawn(self: &Arc<Self>, payload_id: PayloadId) {
        let dispatcher = Arc::clone(self);
        tokio::spawn(async move {
            match dispatcher.process(&payload_id).await {
                Ok(outcome) => {
                    info!(payload_id = %payload_id, outcome = ?outcome_label(&outcome), "Dispatch complete");
                }
                Err(e) => {
                    warn!(payload_id = %payload_id, error = %e, "Dispatch failed");
                }
            }
        });
    }
}

fn outcome_label(outcome: &WorkerOutcome) -> &'static str {
    match outcome {
        WorkerOutcome::Applied(_) => "applied",
        WorkerOutcome::Malformed { .. } => "malformed",
        WorkerOutcome::Duplicate { .. } => "duplicate",
        WorkerOutcome::Retained { .. } => "retained",
        WorkerOutcome::Dropped { .. } => "dropped",
    }
}

#[cfg(test)]
#[path = "dispatch_tests.rs"]
mod tests;
