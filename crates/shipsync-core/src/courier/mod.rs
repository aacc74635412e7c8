//! # Courier Payload Module
//!
//! Wire-format model for courier shipment-scan events and the status
//! normalizer that converts them into the canonical tracking-record shape.
//!
//! The courier pushes one scan per webhook call and answers pull queries with
//! the same `Shipment` structure, so both ingestion paths normalize through
//! [`normalize`].

use crate::order::{FieldUpdates, ShipmentMeta, TrackingEvent};
use crate::{ValidationError, Waybill};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod client;

// ============================================================================
// Wire Types
// ============================================================================

/// Top-level courier event payload as received on the webhook
///
/// Field names follow the courier's PascalCase wire format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourierEvent {
    #[serde(rename = "Shipment", skip_serializing_if = "Option::is_none")]
    pub shipment: Option<Shipment>,
}

/// Shipment section of a courier event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Shipment {
    #[serde(rename = "AWB", default)]
    pub awb: String,

    #[serde(rename = "Status", skip_serializing_if = "Option::is_none")]
    pub status: Option<ShipmentStatus>,

    #[serde(rename = "PickUpDate", skip_serializing_if = "Option::is_none")]
    pub pickup_date: Option<String>,

    #[serde(rename = "NSLCode", skip_serializing_if = "Option::is_none")]
    pub nsl_code: Option<String>,

    #[serde(rename = "Sortcode", skip_serializing_if = "Option::is_none")]
    pub sortcode: Option<String>,

    #[serde(rename = "ReferenceNo", skip_serializing_if = "Option::is_none")]
    pub reference_no: Option<String>,
}

/// Status sub-structure of a shipment scan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShipmentStatus {
    #[serde(rename = "Status", default)]
    pub status: String,

    #[serde(rename = "StatusDateTime", default)]
    pub status_date_time: String,

    #[serde(rename = "StatusType", default)]
    pub status_type: String,

    #[serde(rename = "StatusLocation", default)]
    pub status_location: String,

    #[serde(rename = "Instructions", skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

/// Courier status literal that marks a shipment as delivered.
///
/// The comparison is case-sensitive and exact; the courier's vocabulary is
/// free text everywhere else.
pub const DELIVERED_STATUS: &str = "Delivered";

/// Courier statuses that end a shipment without delivery
pub const TERMINAL_FAILURE_STATUSES: &[&str] = &["RTO", "Lost"];

// ============================================================================
// Normalizer
// ============================================================================

/// Result of normalizing one courier event
#[derive(Debug, Clone)]
pub struct NormalizedUpdate {
    /// Waybill the event belongs to
    pub waybill: Waybill,
    /// Canonical tracking record to append
    pub event: TrackingEvent,
    /// Top-level order field updates to apply alongside the append
    pub updates: FieldUpdates,
}

/// Errors during courier event normalization
#[derive(Debug, thiserror::Error)]
pub enum NormalizeError {
    #[error("Missing required field: {field}")]
    MissingRequiredField { field: String },

    #[error("Invalid timestamp '{value}' in field {field}")]
    InvalidTimestamp { field: String, value: String },

    #[error("Invalid waybill: {0}")]
    InvalidWaybill(#[from] ValidationError),
}

/// Convert a courier shipment-scan event into the canonical tracking shape.
///
/// Fails before any persistence attempt when `Shipment`, `Shipment.AWB`, or
/// `Shipment.Status` is absent. `Instructions` defaults to the empty string.
/// `delivered_at` is carried in the field updates only when the scan reports
/// the exact [`DELIVERED_STATUS`] literal.
///
/// # Errors
///
/// Returns [`NormalizeError::MissingRequiredField`] for structural gaps and
/// [`NormalizeError::InvalidTimestamp`] when `StatusDateTime` cannot be
/// parsed.
pub fn normalize(event: &CourierEvent) -> Result<NormalizedUpdate, NormalizeError> {
    let shipment = event
        .shipment
        .as_ref()
        .ok_or_else(|| NormalizeError::MissingRequiredField {
            field: "Shipment".to_string(),
        })?;

    if shipment.awb.is_empty() {
        return Err(NormalizeError::MissingRequiredField {
            field: "Shipment.AWB".to_string(),
        });
    }

    let status = shipment
        .status
        .as_ref()
        .ok_or_else(|| NormalizeError::MissingRequiredField {
            field: "Shipment.Status".to_string(),
        })?;

    let waybill = Waybill::new(&shipment.awb)?;

    let status_date_time = parse_status_datetime(&status.status_date_time).ok_or_else(|| {
        NormalizeError::InvalidTimestamp {
            field: "Shipment.Status.StatusDateTime".to_string(),
            value: status.status_date_time.clone(),
        }
    })?;

    let tracking = TrackingEvent {
        status: status.status.clone(),
        status_date_time,
        status_type: status.status_type.clone(),
        status_location: status.status_location.clone(),
        instructions: status.instructions.clone().unwrap_or_default(),
    };

    let delivered_at = if status.status == DELIVERED_STATUS {
        Some(status_date_time)
    } else {
        None
    };

    let updates = FieldUpdates {
        waybill: waybill.clone(),
        delivered_at,
        meta: ShipmentMeta {
            pickup_date: shipment.pickup_date.clone(),
            nsl_code: shipment.nsl_code.clone(),
            sortcode: shipment.sortcode.clone(),
            reference_no: shipment.reference_no.clone(),
        },
    };

    Ok(NormalizedUpdate {
        waybill,
        event: tracking,
        updates,
    })
}

/// Structural pre-check used by the webhook ingress before buffering.
///
/// Mirrors the mandatory-field checks of [`normalize`] without touching the
/// timestamp, so permanently malformed payloads are rejected synchronously
/// instead of being staged and retried.
pub fn has_required_shape(event: &CourierEvent) -> bool {
    matches!(
        event.shipment.as_ref(),
        Some(shipment) if !shipment.awb.is_empty() && shipment.status.is_some()
    )
}

/// Parse the courier's timestamp string into a timezone-aware instant.
///
/// Accepts RFC3339 first; falls back to the courier's occasional naive
/// `YYYY-MM-DD HH:MM:SS` form, interpreted as UTC.
fn parse_status_datetime(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }

    NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
