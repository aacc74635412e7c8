//! Common test utilities for the pipeline integration tests
//!
//! This module provides:
//! - Mock implementations of trait collaborators (order store, courier)
//! - A harness that assembles the full router over injected adapters
//! - Request builders and response helpers

use async_trait::async_trait;
use axum::body::Body;
use axum::http::Request;
use axum::Router;
use http_body_util::BodyExt;
use shipsync_api::config::ServiceConfig;
use shipsync_api::{create_router, AppState};
use shipsync_core::adapters::{InMemoryOrderStore, InMemoryPayloadBuffer};
use shipsync_core::buffer::PayloadBuffer;
use shipsync_core::bulk_sync::BulkSyncJob;
use shipsync_core::courier::client::{CourierClient, CourierError};
use shipsync_core::courier::{CourierEvent, Shipment, ShipmentStatus};
use shipsync_core::credentials::Secret;
use shipsync_core::order::{
    FieldUpdates, Order, OrderStore, OrderStoreError, TrackingEvent, UpsertPolicy,
};
use shipsync_core::reconciler::Reconciler;
use shipsync_core::Waybill;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::time::{sleep, Duration};

pub const WEBHOOK_TOKEN: &str = "webhook-secret";
pub const INTERNAL_TOKEN: &str = "internal-secret";
pub const CRON_TOKEN: &str = "cron-secret";

// ============================================================================
// Mock Order Store
// ============================================================================

/// Order store that fails a configured number of apply calls before
/// delegating to a real in-memory store.
#[allow(dead_code)]
pub struct FlakyOrderStore {
    inner: InMemoryOrderStore,
    failures_remaining: AtomicU32,
}

impl FlakyOrderStore {
    #[allow(dead_code)]
    pub fn failing(times: u32) -> Self {
        Self {
            inner: InMemoryOrderStore::new(),
            failures_remaining: AtomicU32::new(times),
        }
    }
}

#[async_trait]
impl OrderStore for FlakyOrderStore {
    async fn apply_tracking(
        &self,
        waybill: &Waybill,
        event: TrackingEvent,
        updates: FieldUpdates,
        policy: UpsertPolicy,
    ) -> Result<Order, OrderStoreError> {
        let remaining = self.failures_remaining.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures_remaining.store(remaining - 1, Ordering::SeqCst);
            return Err(OrderStoreError::Unavailable {
                message: "simulated outage".to_string(),
            });
        }
        self.inner.apply_tracking(waybill, event, updates, policy).await
    }

    async fn find_by_waybill(&self, waybill: &Waybill) -> Result<Option<Order>, OrderStoreError> {
        self.inner.find_by_waybill(waybill).await
    }

    async fn list_active_waybills(&self) -> Result<Vec<Waybill>, OrderStoreError> {
        self.inner.list_active_waybills().await
    }

    async fn insert(&self, order: Order) -> Result<(), OrderStoreError> {
        self.inner.insert(order).await
    }
}

// ============================================================================
// Mock Courier
// ============================================================================

/// Courier stub that reports a fixed status for every waybill and records
/// how many times it was queried.
#[allow(dead_code)]
pub struct ScriptedCourier {
    status: String,
    calls: AtomicU32,
}

impl ScriptedCourier {
    #[allow(dead_code)]
    pub fn reporting(status: &str) -> Self {
        Self {
            status: status.to_string(),
            calls: AtomicU32::new(0),
        }
    }

    #[allow(dead_code)]
    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CourierClient for ScriptedCourier {
    async fn track(&self, waybill: &Waybill) -> Result<CourierEvent, CourierError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(CourierEvent {
            shipment: Some(Shipment {
                awb: waybill.to_string(),
                status: Some(ShipmentStatus {
                    status: self.status.clone(),
                    status_date_time: "2024-01-01T10:00:00Z".to_string(),
                    status_type: "UD".to_string(),
                    status_location: "Hub A".to_string(),
                    instructions: None,
                }),
                pickup_date: None,
                nsl_code: None,
                sortcode: None,
                reference_no: None,
            }),
        })
    }
}

// ============================================================================
// Test Harness
// ============================================================================

#[allow(dead_code)]
pub struct TestApp {
    pub app: Router,
    pub buffer: Arc<dyn PayloadBuffer>,
    pub store: Arc<dyn OrderStore>,
}

/// Assemble the full router over in-memory adapters
#[allow(dead_code)]
pub fn test_app() -> TestApp {
    test_app_with(
        Arc::new(InMemoryOrderStore::new()),
        Arc::new(ScriptedCourier::reporting("In Transit")),
        UpsertPolicy::CreateMissing,
    )
}

/// Assemble the router over injected store and courier collaborators
#[allow(dead_code)]
pub fn test_app_with(
    store: Arc<dyn OrderStore>,
    courier: Arc<dyn CourierClient>,
    policy: UpsertPolicy,
) -> TestApp {
    let mut config = ServiceConfig::default();
    config.credentials.webhook_token = Secret::new(WEBHOOK_TOKEN);
    config.credentials.internal_token = Secret::new(INTERNAL_TOKEN);
    config.credentials.cron_token = Secret::new(CRON_TOKEN);

    let buffer: Arc<dyn PayloadBuffer> = Arc::new(InMemoryPayloadBuffer::new());
    let reconciler = Arc::new(Reconciler::new(Arc::clone(&store), policy));
    let bulk_sync = Arc::new(BulkSyncJob::new(courier, Arc::clone(&reconciler)));
    let credentials = Arc::new(config.credentials.credential_set());

    let state = AppState::new(
        Arc::new(config),
        Arc::clone(&buffer),
        reconciler,
        bulk_sync,
        credentials,
    );

    TestApp {
        app: create_router(state),
        buffer,
        store,
    }
}

// ============================================================================
// Request Builders
// ============================================================================

/// Courier scan payload in the courier's PascalCase wire form
#[allow(dead_code)]
pub fn scan_json(awb: &str, status: &str, status_date_time: &str) -> serde_json::Value {
    serde_json::json!({
        "Shipment": {
            "AWB": awb,
            "Status": {
                "Status": status,
                "StatusDateTime": status_date_time,
                "StatusType": "UD",
                "StatusLocation": "Hub A"
            }
        }
    })
}

#[allow(dead_code)]
pub fn webhook_request(token: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/webhook/courier-scans")
        .header("authorization", format!("Bearer {}", token))
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[allow(dead_code)]
pub fn retry_request(token: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/worker/retry")
        .header("x-cron-token", token)
        .body(Body::empty())
        .unwrap()
}

#[allow(dead_code)]
pub fn sync_request(token: &str, body: Option<serde_json::Value>) -> Request<Body> {
    let builder = Request::builder()
        .method("POST")
        .uri("/sync")
        .header("authorization", format!("Bearer {}", token));

    match body {
        Some(value) => builder
            .header("content-type", "application/json")
            .body(Body::from(value.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// Collect and decode a JSON response body
#[allow(dead_code)]
pub async fn response_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Poll until the order for `awb` carries at least `min_events` tracking
/// entries; the webhook path applies payloads on a spawned task.
#[allow(dead_code)]
pub async fn wait_for_tracking(store: &Arc<dyn OrderStore>, awb: &str, min_events: usize) -> Order {
    let waybill = Waybill::new(awb).unwrap();
    for _ in 0..200 {
        if let Some(order) = store.find_by_waybill(&waybill).await.unwrap() {
            if order.tracking.len() >= min_events {
                return order;
            }
        }
        sleep(Duration::from_millis(10)).await;
    }
    panic!(
        "order for {} never reached {} tracking entries",
        awb, min_events
    );
}

/// Poll until some buffered entry records `attempts` completed attempts,
/// returning it. The failure write-back happens on a spawned task, so the
/// entry can be visible before its attempt counter is.
#[allow(dead_code)]
pub async fn wait_for_attempts(
    buffer: &Arc<dyn PayloadBuffer>,
    attempts: u32,
) -> shipsync_core::buffer::BufferedPayload {
    for _ in 0..200 {
        for id in buffer.list_ids().await.unwrap() {
            if let Some(entry) = buffer.get(&id).await.unwrap() {
                if entry.attempts == attempts {
                    return entry;
                }
            }
        }
        sleep(Duration::from_millis(10)).await;
    }
    panic!("no buffered entry reached {} attempts", attempts);
}

/// Poll until the buffer holds exactly `count` entries
#[allow(dead_code)]
pub async fn wait_for_buffer_len(buffer: &Arc<dyn PayloadBuffer>, count: usize) {
    for _ in 0..200 {
        if buffer.list_ids().await.unwrap().len() == count {
            return;
        }
        sleep(Duration::from_millis(10)).await;
    }
    panic!("buffer never reached {} entries", count);
}
