//! # Bulk Sync Job
//!
//! Pull-based catch-up reconciliation: instead of waiting for pushed scans,
//! query the courier's status API for a batch of orders and apply the results
//! through the same [`Reconciler`] as the webhook pipeline.
//!
//! Individual failures are logged and counted; one bad waybill never aborts
//! the batch.

use crate::courier::client::CourierClient;
use crate::reconciler::Reconciler;
use crate::{OrderStoreError, Waybill};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Outcome counts of one bulk sync run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Waybills the job attempted to sync
    pub attempted: usize,
    /// Orders updated through the reconciler
    pub updated: usize,
    /// Waybills that failed (courier error or reconcile failure)
    pub failed: usize,
}

/// Pull-based reconciliation over the courier query API
pub struct BulkSyncJob {
    courier: Arc<dyn CourierClient>,
    reconciler: Arc<Reconciler>,
}

impl BulkSyncJob {
    /// Create a new job with injected collaborators
    pub fn new(courier: Arc<dyn CourierClient>, reconciler: Arc<Reconciler>) -> Self {
        Self {
            courier,
            reconciler,
        }
    }

    /// Sync one specific waybill, or every non-terminal order with one.
    ///
    /// # Errors
    ///
    /// Returns [`OrderStoreError`] only when the active-waybill listing
    /// itself fails; per-waybill errors are absorbed into the report.
    #[instrument(skip(self))]
    pub async fn run(&self, waybill: Option<Waybill>) -> Result<SyncReport, OrderStoreError> {
        let targets = match waybill {
            Some(wb) => vec![wb],
            None => self.reconciler.store().list_active_waybills().await?,
        };

        let mut report = SyncReport {
            attempted: targets.len(),
            ..SyncReport::default()
        };

        for wb in targets {
            match self.sync_one(&wb).await {
                Ok(()) => report.updated += 1,
                Err(message) => {
                    warn!(waybill = %wb, error = %message, "Bulk sync failed for waybill");
                    report.failed += 1;
                }
            }
        }

        info!(
            attempted = report.attempted,
            updated = report.updated,
            failed = report.failed,
            "Bulk sync run complete"
        );

        Ok(report)
    }

    async fn sync_one(&self, waybill: &Waybill) -> Result<(), String> {
        let event = self
            .courier
            .track(waybill)
            .await
            .map_err(|e| e.to_string())?;

        self.reconciler
            .apply(&event)
            .await
            .map(|_| ())
            .map_err(|e| e.to_string())
    }
}

#[cfg(test)]
#[path = "bulk_sync_tests.rs"]
mod tests;
