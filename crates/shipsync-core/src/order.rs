//! # Order Ledger Module
//!
//! The order record mutated by the reconciliation pipeline and the storage
//! contract for applying tracking events atomically.
//!
//! Only the fields this subsystem touches are modeled in full; the rest of
//! the back-office order document (items, payment, addresses) lives outside
//! this crate and is not needed for reconciliation.

use crate::courier::{DELIVERED_STATUS, TERMINAL_FAILURE_STATUSES};
use crate::{OrderId, OrderStatus, Waybill};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Core Types
// ============================================================================

/// A single courier-reported status change
///
/// Ordering within an order's tracking history is by `status_date_time` (the
/// authoritative event timestamp), never by receipt time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingEvent {
    pub status: String,
    pub status_date_time: DateTime<Utc>,
    pub status_type: String,
    pub status_location: String,
    #[serde(default)]
    pub instructions: String,
}

impl TrackingEvent {
    /// Composite identity used for duplicate suppression on insert
    pub fn dedup_key(&self) -> (&str, DateTime<Utc>, &str) {
        (&self.status, self.status_date_time, &self.status_location)
    }
}

/// Shipment metadata reported alongside the first scans
///
/// Each field is applied set-if-absent: the courier repeats these on later
/// events and the first reported value wins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipmentMeta {
    pub pickup_date: Option<String>,
    pub nsl_code: Option<String>,
    pub sortcode: Option<String>,
    pub reference_no: Option<String>,
}

impl ShipmentMeta {
    /// Merge another metadata set, keeping existing values
    pub fn merge_absent(&mut self, other: &ShipmentMeta) {
        if self.pickup_date.is_none() {
            self.pickup_date = other.pickup_date.clone();
        }
        if self.nsl_code.is_none() {
            self.nsl_code = other.nsl_code.clone();
        }
        if self.sortcode.is_none() {
            self.sortcode = other.sortcode.clone();
        }
        if self.reference_no.is_none() {
            self.reference_no = other.reference_no.clone();
        }
    }
}

/// Top-level order field updates carried with a tracking append
#[derive(Debug, Clone)]
pub struct FieldUpdates {
    /// Waybill identity; always set, allowing the store to create the
    /// waybill linkage when the order did not have one yet
    pub waybill: Waybill,
    /// Delivered timestamp, present only for "Delivered" scans
    pub delivered_at: Option<DateTime<Utc>>,
    /// Shipment metadata applied set-if-absent
    pub meta: ShipmentMeta,
}

/// Order record as seen by the reconciliation subsystem
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,

    /// Courier shipment identity; unique among present values
    pub waybill: Option<Waybill>,

    /// Internal status, authoritative when no courier status exists
    pub order_status: OrderStatus,

    /// Latest courier-reported state; takes precedence over `order_status`
    /// for display when present. Always equals the status of the tracking
    /// event with the greatest `status_date_time`.
    pub courier_status: Option<String>,

    /// Tracking history, sorted descending by `status_date_time`
    pub tracking: Vec<TrackingEvent>,

    /// Set once by the first "Delivered" scan; never regressed
    pub delivered_at: Option<DateTime<Utc>>,

    pub shipment_meta: ShipmentMeta,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Create an empty order-tracking shell for an unknown waybill
    ///
    /// Produced by the upsert path when a webhook arrives before internal
    /// order creation completes.
    pub fn shell(waybill: Waybill) -> Self {
        let now = Utc::now();
        Self {
            id: OrderId::new(),
            waybill: Some(waybill),
            order_status: OrderStatus::default(),
            courier_status: None,
            tracking: Vec::new(),
            delivered_at: None,
            shipment_meta: ShipmentMeta::default(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the shipment has reached a terminal state
    ///
    /// Terminal means delivered, or a courier-reported terminal failure
    /// (RTO/Lost). Terminal orders are skipped by the bulk sync job.
    pub fn is_terminal(&self) -> bool {
        if self.delivered_at.is_some() {
            return true;
        }
        match self.courier_status.as_deref() {
            Some(status) => {
                status == DELIVERED_STATUS || TERMINAL_FAILURE_STATUSES.contains(&status)
            }
            None => false,
        }
    }

    /// Apply one tracking event and its field updates in place.
    ///
    /// This is the single mutation the reconciliation pipeline performs:
    /// duplicate-suppressed append, full descending re-sort, derived current
    /// status, monotonic delivered-at, and set-if-absent metadata. Store
    /// implementations call it while holding their own write synchronization
    /// so the whole step is atomic per order.
    pub fn apply_tracking(&mut self, event: TrackingEvent, updates: &FieldUpdates) {
        self.waybill = Some(updates.waybill.clone());

        let duplicate = self
            .tracking
            .iter()
            .any(|existing| existing.dedup_key() == event.dedup_key());

        if !duplicate {
            self.tracking.push(event);
            // Append + full re-sort, latest first; never insert-at-position.
            self.tracking
                .sort_by(|a, b| b.status_date_time.cmp(&a.status_date_time));
        }

        if let Some(head) = self.tracking.first() {
            self.courier_status = Some(head.status.clone());
        }

        // delivered_at is write-once; later scans must not regress it.
        if self.delivered_at.is_none() {
            self.delivered_at = updates.delivered_at;
        }

        self.shipment_meta.merge_absent(&updates.meta);
        self.updated_at = Utc::now();
    }
}

// ============================================================================
// Store Contract
// ============================================================================

/// Policy for events whose waybill matches no existing order
///
/// The source system silently fabricated a near-empty order record in this
/// case; whether that is intended recovery behavior or a data-integrity gap
/// is a product question, so the choice is configuration rather than code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UpsertPolicy {
    /// Create a new order-tracking shell for the unknown waybill
    CreateMissing,
    /// Fail with [`OrderStoreError::NotFound`], leaving the event buffered
    /// until a matching order appears
    RejectMissing,
}

impl Default for UpsertPolicy {
    fn default() -> Self {
        Self::CreateMissing
    }
}

/// Errors from order store operations
#[derive(Debug, thiserror::Error)]
pub enum OrderStoreError {
    /// Concurrent creation race on the waybill uniqueness constraint;
    /// reported to the caller, never retried internally
    #[error("Duplicate waybill: {waybill}")]
    DuplicateWaybill { waybill: Waybill },

    /// No order matches the waybill and the policy forbids creation
    #[error("No order found for waybill: {waybill}")]
    NotFound { waybill: Waybill },

    /// Persistence layer briefly unavailable; eligible for external retry
    #[error("Order store unavailable: {message}")]
    Unavailable { message: String },

    #[error("Order store internal error: {message}")]
    Internal { message: String },
}

impl OrderStoreError {
    /// Check if the error is transient and worth a later retry
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Unavailable { .. } => true,
            Self::Internal { .. } => true,
            Self::DuplicateWaybill { .. } => false,
            Self::NotFound { .. } => false,
        }
    }
}

/// Storage contract for the order ledger
///
/// `apply_tracking` must execute find-or-create-by-waybill, the tracking
/// append + re-sort, and the field updates as one atomic step against the
/// matched order; concurrent calls for the same waybill must not interleave.
/// Correctness of the pipeline relies on this, not on any lock held by the
/// handlers.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Atomically apply a tracking event to the order owning `waybill`
    async fn apply_tracking(
        &self,
        waybill: &Waybill,
        event: TrackingEvent,
        updates: FieldUpdates,
        policy: UpsertPolicy,
    ) -> Result<Order, OrderStoreError>;

    /// Look up an order by waybill
    async fn find_by_waybill(&self, waybill: &Waybill) -> Result<Option<Order>, OrderStoreError>;

    /// Waybills of all orders that have one and are not yet terminal
    ///
    /// Input set for the pull-based bulk sync job.
    async fn list_active_waybills(&self) -> Result<Vec<Waybill>, OrderStoreError>;

    /// Insert an order created outside this subsystem
    ///
    /// # Errors
    ///
    /// Returns [`OrderStoreError::DuplicateWaybill`] when the order carries a
    /// waybill that another order already owns.
    async fn insert(&self, order: Order) -> Result<(), OrderStoreError>;
}

#[cfg(test)]
#[path = "order_tests.rs"]
mod tests;
