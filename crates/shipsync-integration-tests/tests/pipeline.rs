//! End-to-end pipeline tests: webhook intake through buffer, worker,
//! reconciler, and ledger.

mod common;

use axum::http::StatusCode;
use common::*;
use shipsync_core::order::{Order, OrderStore, UpsertPolicy};
use shipsync_core::Waybill;
use std::sync::Arc;
use tower::ServiceExt;

#[tokio::test]
async fn test_scans_accumulate_into_order_history() {
    let harness = test_app();

    let scan = scan_json("WB100", "In Transit", "2024-01-01T10:00:00Z");
    let response = harness
        .app
        .clone()
        .oneshot(webhook_request(WEBHOOK_TOKEN, scan))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let scan = scan_json("WB100", "Delivered", "2024-01-02T09:00:00Z");
    let response = harness
        .app
        .clone()
        .oneshot(webhook_request(WEBHOOK_TOKEN, scan))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let order = wait_for_tracking(&harness.store, "WB100", 2).await;
    assert_eq!(order.tracking.len(), 2);
    assert_eq!(order.tracking[0].status, "Delivered");
    assert_eq!(order.tracking[1].status, "In Transit");
    assert_eq!(order.courier_status.as_deref(), Some("Delivered"));
    assert_eq!(
        order.delivered_at.map(|t| t.to_rfc3339()),
        Some("2024-01-02T09:00:00+00:00".to_string())
    );

    wait_for_buffer_len(&harness.buffer, 0).await;
}

#[tokio::test]
async fn test_out_of_order_delivery_converges_on_latest_status() {
    let harness = test_app();

    // Delivered scan arrives before the transit scan it supersedes
    let scan = scan_json("WB200", "Delivered", "2024-01-02T09:00:00Z");
    harness
        .app
        .clone()
        .oneshot(webhook_request(WEBHOOK_TOKEN, scan))
        .await
        .unwrap();
    wait_for_tracking(&harness.store, "WB200", 1).await;

    let scan = scan_json("WB200", "In Transit", "2024-01-01T10:00:00Z");
    harness
        .app
        .clone()
        .oneshot(webhook_request(WEBHOOK_TOKEN, scan))
        .await
        .unwrap();

    let order = wait_for_tracking(&harness.store, "WB200", 2).await;
    assert_eq!(order.courier_status.as_deref(), Some("Delivered"));
    assert_eq!(
        order.delivered_at.map(|t| t.to_rfc3339()),
        Some("2024-01-02T09:00:00+00:00".to_string())
    );
}

#[tokio::test]
async fn test_redelivered_scan_does_not_duplicate_history() {
    let harness = test_app();

    let scan = scan_json("WB300", "In Transit", "2024-01-01T10:00:00Z");
    for _ in 0..2 {
        let response = harness
            .app
            .clone()
            .oneshot(webhook_request(WEBHOOK_TOKEN, scan.clone()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    wait_for_buffer_len(&harness.buffer, 0).await;
    let order = wait_for_tracking(&harness.store, "WB300", 1).await;
    assert_eq!(order.tracking.len(), 1);
}

#[tokio::test]
async fn test_retry_sweep_recovers_payload_after_store_outage() {
    let store = Arc::new(FlakyOrderStore::failing(1));
    let courier = Arc::new(ScriptedCourier::reporting("In Transit"));
    let harness = test_app_with(store, courier, UpsertPolicy::CreateMissing);

    let scan = scan_json("WB400", "In Transit", "2024-01-01T10:00:00Z");
    let response = harness
        .app
        .clone()
        .oneshot(webhook_request(WEBHOOK_TOKEN, scan))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // First apply hits the outage, so the payload stays buffered with the
    // failure recorded
    let entry = wait_for_attempts(&harness.buffer, 1).await;
    assert_eq!(entry.attempts, 1);

    let waybill = Waybill::new("WB400").unwrap();
    assert!(harness
        .store
        .find_by_waybill(&waybill)
        .await
        .unwrap()
        .is_none());

    // The sweep re-dispatches the entry; the store has recovered
    let response = harness
        .app
        .clone()
        .oneshot(retry_request(CRON_TOKEN))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["redispatched"], 1);

    wait_for_buffer_len(&harness.buffer, 0).await;
    let order = wait_for_tracking(&harness.store, "WB400", 1).await;
    assert_eq!(order.courier_status.as_deref(), Some("In Transit"));
}

#[tokio::test]
async fn test_reject_missing_policy_waits_for_order_to_appear() {
    let store = Arc::new(shipsync_core::adapters::InMemoryOrderStore::new());
    let courier = Arc::new(ScriptedCourier::reporting("In Transit"));
    let harness = test_app_with(store.clone(), courier, UpsertPolicy::RejectMissing);

    let scan = scan_json("WB500", "In Transit", "2024-01-01T10:00:00Z");
    harness
        .app
        .clone()
        .oneshot(webhook_request(WEBHOOK_TOKEN, scan))
        .await
        .unwrap();

    // No order owns the waybill yet, so the scan stays buffered with its
    // failed attempt recorded
    wait_for_attempts(&harness.buffer, 1).await;

    let waybill = Waybill::new("WB500").unwrap();
    store.insert(Order::shell(waybill)).await.unwrap();

    let response = harness
        .app
        .clone()
        .oneshot(retry_request(CRON_TOKEN))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    wait_for_buffer_len(&harness.buffer, 0).await;
    let order = wait_for_tracking(&harness.store, "WB500", 1).await;
    assert_eq!(order.courier_status.as_deref(), Some("In Transit"));
}
