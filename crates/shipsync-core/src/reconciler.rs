//! # Order Tracking Reconciler
//!
//! Applies a courier event to the order ledger: normalize, then a single
//! atomic upsert through the [`OrderStore`]. Both ingestion paths — the
//! buffered webhook pipeline and the pull-based bulk sync — go through this
//! type so status updates cannot diverge between them.

use crate::courier::{self, CourierEvent, NormalizeError};
use crate::order::{Order, OrderStore, OrderStoreError, UpsertPolicy};
use std::sync::Arc;
use tracing::{info, instrument};

/// Errors from one reconcile attempt
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("Payload normalization failed: {0}")]
    Normalize(#[from] NormalizeError),

    #[error("Order store failure: {0}")]
    Store(#[from] OrderStoreError),
}

impl ReconcileError {
    /// Check if the failure is transient and worth retrying via the sweeper
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Normalize(_) => false,
            Self::Store(e) => e.is_transient(),
        }
    }
}

/// Reconciler with injected store and waybill-creation policy
pub struct Reconciler {
    store: Arc<dyn OrderStore>,
    policy: UpsertPolicy,
}

impl Reconciler {
    /// Create a new reconciler
    pub fn new(store: Arc<dyn OrderStore>, policy: UpsertPolicy) -> Self {
        Self { store, policy }
    }

    /// Access the underlying order store
    pub fn store(&self) -> &Arc<dyn OrderStore> {
        &self.store
    }

    /// Normalize and durably apply one courier event.
    ///
    /// Normalization failures short-circuit before any persistence attempt.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileError::Normalize`] for structurally invalid
    /// payloads and [`ReconcileError::Store`] for ledger failures, including
    /// the concurrent [`OrderStoreError::DuplicateWaybill`] race, which is
    /// reported to the caller rather than retried here.
    #[instrument(skip(self, event))]
    pub async fn apply(&self, event: &CourierEvent) -> Result<Order, ReconcileError> {
        let normalized = courier::normalize(event)?;

        let order = self
            .store
            .apply_tracking(
                &normalized.waybill,
                normalized.event,
                normalized.updates,
                self.policy,
            )
            .await?;

        info!(
            waybill = %normalized.waybill,
            order_id = %order.id,
            courier_status = order.courier_status.as_deref().unwrap_or("-"),
            tracking_len = order.tracking.len(),
            "Applied tracking event"
        );

        Ok(order)
    }
}

#[cfg(test)]
#[path = "reconciler_tests.rs"]
mod tests;
