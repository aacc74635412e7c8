//! # Courier Pull-API Client
//!
//! Authenticated client for the courier's shipment-status query API, used by
//! the bulk sync job. Every call carries an explicit bounded timeout;
//! unavailability is a retryable failure surfaced to the caller, never
//! retried in-process.

use crate::courier::{CourierEvent, Shipment};
use crate::credentials::Secret;
use crate::Waybill;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument};

/// Default bound on courier API calls
pub const DEFAULT_COURIER_TIMEOUT: Duration = Duration::from_secs(10);

// ============================================================================
// Errors
// ============================================================================

/// Errors from courier pull-API calls
#[derive(Debug, thiserror::Error)]
pub enum CourierError {
    /// Timeout or connection failure; eligible for external retry
    #[error("Courier API unavailable: {message}")]
    Unavailable { message: String },

    /// Non-success HTTP status from the courier
    #[error("Courier API returned status {status}")]
    BadStatus { status: u16 },

    /// Successful response with no shipment data for the waybill
    #[error("No shipment data for waybill {waybill}")]
    NoShipmentData { waybill: Waybill },

    /// Response body did not match the expected shape
    #[error("Malformed courier response: {message}")]
    MalformedResponse { message: String },
}

impl CourierError {
    /// Check if the error is transient
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Unavailable { .. } => true,
            Self::BadStatus { status } => *status >= 500,
            Self::NoShipmentData { .. } => false,
            Self::MalformedResponse { .. } => false,
        }
    }
}

// ============================================================================
// Contract
// ============================================================================

/// Client for the courier's per-waybill status query API
#[async_trait]
pub trait CourierClient: Send + Sync {
    /// Fetch the current shipment status for one waybill
    async fn track(&self, waybill: &Waybill) -> Result<CourierEvent, CourierError>;
}

// ============================================================================
// HTTP Implementation
// ============================================================================

/// Wire shape of the courier's tracking query response
#[derive(Debug, Deserialize)]
struct TrackResponse {
    #[serde(rename = "ShipmentData", default)]
    shipment_data: Vec<TrackEntry>,
}

#[derive(Debug, Deserialize)]
struct TrackEntry {
    #[serde(rename = "Shipment")]
    shipment: Shipment,
}

/// Reqwest-backed [`CourierClient`]
///
/// Constructed once per process and injected into the bulk sync job; the
/// underlying `reqwest::Client` pools connections internally.
pub struct HttpCourierClient {
    http: reqwest::Client,
    base_url: String,
    api_token: Secret,
}

impl HttpCourierClient {
    /// Create a new client with the default 10 s timeout
    ///
    /// # Errors
    ///
    /// Returns [`CourierError::Unavailable`] when the HTTP client cannot be
    /// constructed.
    pub fn new(base_url: impl Into<String>, api_token: Secret) -> Result<Self, CourierError> {
        Self::with_timeout(base_url, api_token, DEFAULT_COURIER_TIMEOUT)
    }

    /// Create a new client with an explicit call timeout
    pub fn with_timeout(
        base_url: impl Into<String>,
        api_token: Secret,
        timeout: Duration,
    ) -> Result<Self, CourierError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CourierError::Unavailable {
                message: format!("Failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_token,
        })
    }
}

impl std::fmt::Debug for HttpCourierClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpCourierClient")
            .field("base_url", &self.base_url)
            .field("api_token", &"<REDACTED>")
            .finish()
    }
}

#[async_trait]
impl CourierClient for HttpCourierClient {
    #[instrument(skip(self), fields(waybill = %waybill))]
    async fn track(&self, waybill: &Waybill) -> Result<CourierEvent, CourierError> {
        let url = format!("{}/api/v1/packages/json/", self.base_url);

        let response = self
            .http
            .get(&url)
            .query(&[("waybill", waybill.as_str())])
            .header(
                "Authorization",
                format!("Token {}", self.api_token.expose()),
            )
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| CourierError::Unavailable {
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(CourierError::BadStatus {
                status: status.as_u16(),
            });
        }

        let body: TrackResponse =
            response
                .json()
                .await
                .map_err(|e| CourierError::MalformedResponse {
                    message: e.to_string(),
                })?;

        debug!(
            entries = body.shipment_data.len(),
            "Courier track query returned"
        );

        let entry = body
            .shipment_data
            .into_iter()
            .next()
            .ok_or_else(|| CourierError::NoShipmentData {
                waybill: waybill.clone(),
            })?;

        Ok(CourierEvent {
            shipment: Some(entry.shipment),
        })
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
