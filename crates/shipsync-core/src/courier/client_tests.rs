//! Tests for the HTTP courier client using wiremock

use super::*;
use std::time::Duration;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn waybill(value: &str) -> Waybill {
    Waybill::new(value).unwrap()
}

fn client_for(server: &MockServer) -> HttpCourierClient {
    HttpCourierClient::with_timeout(
        server.uri(),
        Secret::new("courier-token"),
        Duration::from_millis(500),
    )
    .unwrap()
}

#[tokio::test]
async fn test_track_maps_shipment_data() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/packages/json/"))
        .and(query_param("waybill", "WB100"))
        .and(header("Authorization", "Token courier-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "ShipmentData": [{
                "Shipment": {
                    "AWB": "WB100",
                    "Status": {
                        "Status": "In Transit",
                        "StatusDateTime": "2024-01-01T10:00:00Z",
                        "StatusType": "UD",
                        "StatusLocation": "Hub A"
                    }
                }
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let event = client_for(&server).track(&waybill("WB100")).await.unwrap();

    let shipment = event.shipment.unwrap();
    assert_eq!(shipment.awb, "WB100");
    assert_eq!(shipment.status.unwrap().status, "In Transit");
}

#[tokio::test]
async fn test_track_empty_shipment_data_is_no_data() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"ShipmentData": []})),
        )
        .mount(&server)
        .await;

    let err = client_for(&server)
        .track(&waybill("WB404"))
        .await
        .unwrap_err();

    assert!(matches!(err, CourierError::NoShipmentData { .. }));
    assert!(!err.is_transient());
}

#[tokio::test]
async fn test_track_server_error_is_transient() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .track(&waybill("WB100"))
        .await
        .unwrap_err();

    assert!(matches!(err, CourierError::BadStatus { status: 503 }));
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_track_client_error_is_permanent() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .track(&waybill("WB100"))
        .await
        .unwrap_err();

    assert!(matches!(err, CourierError::BadStatus { status: 401 }));
    assert!(!err.is_transient());
}

#[tokio::test]
async fn test_track_timeout_is_unavailable() {
    let server = MockServer::start().await;

    // Response delayed beyond the client's 500ms timeout.
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_secs(2))
                .set_body_json(serde_json::json!({"ShipmentData": []})),
        )
        .mount(&server)
        .await;

    let err = client_for(&server)
        .track(&waybill("WB100"))
        .await
        .unwrap_err();

    assert!(matches!(err, CourierError::Unavailable { .. }));
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_track_malformed_body_rejected() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .track(&waybill("WB100"))
        .await
        .unwrap_err();

    assert!(matches!(err, CourierError::MalformedResponse { .. }));
}
