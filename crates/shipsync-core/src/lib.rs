//! # Shipsync Core
//!
//! Core business logic for the Shipsync order-status synchronization service.
//!
//! This crate contains the domain logic for reconciling courier shipment-scan
//! events against the local order ledger: payload normalization, idempotent
//! tracking upserts, the durable staging buffer, the courier pull client, and
//! the bulk sync job.
//!
//! ## Architecture
//!
//! The core follows clean architecture principles:
//! - Business logic depends only on trait abstractions
//! - Infrastructure implementations are injected at runtime
//! - External collaborators (courier API, buffer, order store) sit behind traits
//!
//! ## Usage
//!
//! ```rust
//! use shipsync_core::{PayloadId, Waybill};
//!
//! let payload_id = PayloadId::new();
//! let waybill: Waybill = "WB100".parse().unwrap();
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// Re-export commonly used types
pub use ulid::Ulid;
pub use uuid::Uuid;

// ============================================================================
// Domain Identifier Types
// ============================================================================

/// Courier-assigned shipment tracking identifier (AWB).
///
/// Unique among orders that have one; an order without a shipment has none.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Waybill(String);

impl Waybill {
    /// Create new waybill with validation
    ///
    /// # Validation Rules
    /// - Must be 1-64 characters
    /// - Must contain only printable ASCII without whitespace
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into();

        if value.is_empty() {
            return Err(ValidationError::Required {
                field: "waybill".to_string(),
            });
        }

        if value.len() > 64 {
            return Err(ValidationError::TooLong {
                field: "waybill".to_string(),
                max_length: 64,
            });
        }

        if !value.chars().all(|c| c.is_ascii_graphic()) {
            return Err(ValidationError::InvalidCharacters {
                field: "waybill".to_string(),
                invalid_chars: "non-ASCII or whitespace".to_string(),
            });
        }

        Ok(Self(value))
    }

    /// Get string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Waybill {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Waybill {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Internal order identifier, assigned at order creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderId(Uuid);

impl OrderId {
    /// Generate a new unique order ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for OrderId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for OrderId {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let uuid = s.parse::<Uuid>().map_err(|_| ParseError::InvalidFormat {
            expected: "UUID format".to_string(),
            actual: s.to_string(),
        })?;
        Ok(Self(uuid))
    }
}

/// Identifier for a staged shipment-event payload in the durable buffer
///
/// Uses ULID for lexicographic sorting and global uniqueness. Distinct from
/// both order and waybill identities: a payload id names one delivery of one
/// event, nothing more.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PayloadId(Ulid);

impl PayloadId {
    /// Generate a new unique payload ID
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for PayloadId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PayloadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PayloadId {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let ulid = s.parse::<Ulid>().map_err(|_| ParseError::InvalidFormat {
            expected: "ULID format".to_string(),
            actual: s.to_string(),
        })?;
        Ok(Self(ulid))
    }
}

// ============================================================================
// Order Status
// ============================================================================

/// Internal order lifecycle status
///
/// Authoritative only while no courier status has been reported; once the
/// courier starts pushing scans, the mirrored courier status takes precedence
/// for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    Processing,
    Shipped,
    Delivered,
}

impl OrderStatus {
    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Processing => "Processing",
            Self::Shipped => "Shipped",
            Self::Delivered => "Delivered",
        }
    }
}

impl Default for OrderStatus {
    fn default() -> Self {
        Self::Processing
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Processing" => Ok(Self::Processing),
            "Shipped" => Ok(Self::Shipped),
            "Delivered" => Ok(Self::Delivered),
            _ => Err(ParseError::InvalidFormat {
                expected: "Processing, Shipped, or Delivered".to_string(),
                actual: s.to_string(),
            }),
        }
    }
}

// ============================================================================
// Error Types
// ============================================================================

/// Error type for input validation failures
#[derive(Debug, Clone, thiserror::Error, Serialize, Deserialize)]
pub enum ValidationError {
    #[error("Field '{field}' is required")]
    Required { field: String },

    #[error("Field '{field}' has invalid format: {message}")]
    InvalidFormat { field: String, message: String },

    #[error("Field '{field}' exceeds maximum length of {max_length}")]
    TooLong { field: String, max_length: usize },

    #[error("Field '{field}' contains invalid characters: {invalid_chars}")]
    InvalidCharacters {
        field: String,
        invalid_chars: String,
    },
}

/// Error type for string parsing failures
#[derive(Debug, Clone, thiserror::Error)]
pub enum ParseError {
    #[error("Invalid format: expected {expected}, got '{actual}'")]
    InvalidFormat { expected: String, actual: String },
}

// ============================================================================
// Module declarations
// ============================================================================

/// Courier payload model, status normalizer, and pull-API client
pub mod courier;

/// Order ledger types and the tracking reconciliation store contract
pub mod order;

/// Reconciler applying normalized events through the order store
pub mod reconciler;

/// Durable staging buffer for not-yet-applied shipment events
pub mod buffer;

/// Infrastructure adapters (in-memory and filesystem)
pub mod adapters;

/// Capability-typed bearer credentials for the three trust domains
pub mod credentials;

/// Pull-based batch reconciliation against the courier API
pub mod bulk_sync;

// Re-export key types for convenience
pub use buffer::{BufferError, BufferedPayload, FailureKind, PayloadBuffer};
pub use bulk_sync::{BulkSyncJob, SyncReport};
pub use courier::client::{CourierClient, CourierError, HttpCourierClient};
pub use courier::{
    normalize, CourierEvent, NormalizeError, NormalizedUpdate, Shipment, ShipmentStatus,
};
pub use credentials::{CredentialSet, Secret, TrustDomain};
pub use order::{
    FieldUpdates, Order, OrderStore, OrderStoreError, ShipmentMeta, TrackingEvent, UpsertPolicy,
};
pub use reconciler::{ReconcileError, Reconciler};

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
