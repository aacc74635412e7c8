//! Tests for the in-memory order store

use super::*;
use crate::order::ShipmentMeta;
use chrono::{TimeZone, Utc};

fn waybill(value: &str) -> Waybill {
    Waybill::new(value).unwrap()
}

fn event(status: &str, hour: u32) -> TrackingEvent {
    TrackingEvent {
        status: status.to_string(),
        status_date_time: Utc.with_ymd_and_hms(2024, 1, 1, hour, 0, 0).unwrap(),
        status_type: "UD".to_string(),
        status_location: "Hub A".to_string(),
        instructions: String::new(),
    }
}

fn updates_for(wb: &Waybill) -> FieldUpdates {
    FieldUpdates {
        waybill: wb.clone(),
        delivered_at: None,
        meta: ShipmentMeta::default(),
    }
}

#[tokio::test]
async fn test_apply_tracking_creates_shell_for_unknown_waybill() {
    let store = InMemoryOrderStore::new();
    let wb = waybill("WB100");

    let order = store
        .apply_tracking(
            &wb,
            event("In Transit", 10),
            updates_for(&wb),
            UpsertPolicy::CreateMissing,
        )
        .await
        .unwrap();

    assert_eq!(order.waybill, Some(wb.clone()));
    assert_eq!(order.tracking.len(), 1);
    assert_eq!(order.courier_status.as_deref(), Some("In Transit"));

    let found = store.find_by_waybill(&wb).await.unwrap().unwrap();
    assert_eq!(found.id, order.id);
}

#[tokio::test]
async fn test_apply_tracking_reject_missing_leaves_store_empty() {
    let store = InMemoryOrderStore::new();
    let wb = waybill("WB100");

    let err = store
        .apply_tracking(
            &wb,
            event("In Transit", 10),
            updates_for(&wb),
            UpsertPolicy::RejectMissing,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, OrderStoreError::NotFound { .. }));
    assert!(store.find_by_waybill(&wb).await.unwrap().is_none());
}

#[tokio::test]
async fn test_apply_tracking_updates_existing_order() {
    let store = InMemoryOrderStore::new();
    let wb = waybill("WB100");
    let shell = Order::shell(wb.clone());
    let original_id = shell.id;
    store.insert(shell).await.unwrap();

    let order = store
        .apply_tracking(
            &wb,
            event("Shipped", 8),
            updates_for(&wb),
            UpsertPolicy::RejectMissing,
        )
        .await
        .unwrap();

    assert_eq!(order.id, original_id);
    assert_eq!(order.tracking.len(), 1);
}

#[tokio::test]
async fn test_insert_rejects_duplicate_waybill() {
    let store = InMemoryOrderStore::new();
    let wb = waybill("WB100");

    store.insert(Order::shell(wb.clone())).await.unwrap();
    let err = store.insert(Order::shell(wb.clone())).await.unwrap_err();

    assert!(matches!(
        err,
        OrderStoreError::DuplicateWaybill { waybill } if waybill == wb
    ));
}

#[tokio::test]
async fn test_list_active_waybills_excludes_terminal_orders() {
    let store = InMemoryOrderStore::new();

    store.insert(Order::shell(waybill("WB1"))).await.unwrap();

    let mut delivered = Order::shell(waybill("WB2"));
    delivered.delivered_at = Some(Utc.with_ymd_and_hms(2024, 1, 2, 9, 0, 0).unwrap());
    store.insert(delivered).await.unwrap();

    let mut returned = Order::shell(waybill("WB3"));
    returned.courier_status = Some("RTO".to_string());
    store.insert(returned).await.unwrap();

    let active = store.list_active_waybills().await.unwrap();

    assert_eq!(active, vec![waybill("WB1")]);
}

#[tokio::test]
async fn test_concurrent_apply_tracking_creates_one_order() {
    use std::sync::Arc;

    let store = Arc::new(InMemoryOrderStore::new());
    let wb = waybill("WB100");

    let mut handles = Vec::new();
    for hour in 1..=8 {
        let store = store.clone();
        let wb = wb.clone();
        handles.push(tokio::spawn(async move {
            store
                .apply_tracking(
                    &wb,
                    event("In Transit", hour),
                    updates_for(&wb),
                    UpsertPolicy::CreateMissing,
                )
                .await
        }));
    }

    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    // All writers converged on a single order holding every event.
    let order = store.find_by_waybill(&wb).await.unwrap().unwrap();
    assert_eq!(order.tracking.len(), 8);
    let active = store.list_active_waybills().await.unwrap();
    assert_eq!(active.len(), 1);
}
