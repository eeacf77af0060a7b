//! HTTP-level behavior of the remote backend against a mock record store.

use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use binwatch_core::model::{Bin, BinEvent, BinId, Status, UserId, UserRole};
use binwatch_core::ports::{AuthPort, BinStore, Credentials, StoreError, TeamStore};
use binwatch_backend_remote::{RemoteAuth, RemoteBinStore, RemoteOptions, RemoteTeamStore};

fn options(server: &MockServer) -> RemoteOptions {
    // Long poll interval: only the immediate startup poll ever fires.
    RemoteOptions::new(server.uri(), "test-key").with_poll_interval(Duration::from_secs(3600))
}

fn domain_bin(id: &str) -> Bin {
    Bin {
        id: BinId(id.to_owned()),
        location_name: format!("Site {id}"),
        address: String::from("1 Test Lane"),
        latitude: 48.1,
        longitude: 11.5,
        status: Status::Normal,
        enabled: true,
        last_emptied: chrono::Utc::now(),
        assigned_operator_id: None,
        local_body_email: String::from("ward@city.example"),
        compartments: Vec::new(),
    }
}

fn bin_row(id: &str, fills: &[i64]) -> serde_json::Value {
    let compartments: Vec<serde_json::Value> = fills
        .iter()
        .enumerate()
        .map(|(index, fill)| {
            json!({
                "id": format!("c{}", index + 1),
                "name": format!("Slot {}", index + 1),
                "fill_level": fill,
            })
        })
        .collect();
    json!({
        "id": id,
        "location_name": format!("Site {id}"),
        "address": "1 Test Lane",
        "latitude": 48.1,
        "longitude": 11.5,
        "status": null,
        "enabled": true,
        "last_emptied": "2024-03-25T10:00:00Z",
        "assigned_operator_id": "op-1",
        "local_body_email": "ward@city.example",
        "compartments": compartments,
    })
}

#[tokio::test]
async fn list_requests_ascending_order_and_normalizes_rows() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/bins"))
        .and(query_param("order", "id.asc"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([bin_row("BIN-001", &[250, -5])])),
        )
        .mount(&server)
        .await;

    let store = RemoteBinStore::new(reqwest::Client::new(), &options(&server));
    let bins = store.list().await.unwrap();

    assert_eq!(bins.len(), 1);
    // Out-of-range readings are clamped at the boundary, nowhere else.
    assert_eq!(bins[0].compartments[0].fill_level, 100);
    assert_eq!(bins[0].compartments[1].fill_level, 0);
    // Missing status column falls back to the derived value.
    assert_eq!(bins[0].status, Status::Full);
    assert_eq!(bins[0].assigned_operator_id, Some(UserId(String::from("op-1"))));
}

#[tokio::test]
async fn operator_listing_sends_exact_match_filters() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/bins"))
        .and(query_param("assigned_operator_id", "eq.op-1"))
        .and(query_param("enabled", "eq.true"))
        .and(query_param("order", "id.asc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([bin_row("BIN-002", &[10])])))
        .expect(1)
        .mount(&server)
        .await;

    let store = RemoteBinStore::new(reqwest::Client::new(), &options(&server));
    let bins = store
        .list_for_operator(&UserId(String::from("op-1")))
        .await
        .unwrap();
    assert_eq!(bins[0].id, BinId(String::from("BIN-002")));
}

#[tokio::test]
async fn reads_retry_transient_server_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/bins"))
        .and(query_param("order", "id.asc"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/bins"))
        .and(query_param("order", "id.asc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([bin_row("BIN-003", &[5])])))
        .expect(1)
        .mount(&server)
        .await;

    let store = RemoteBinStore::new(reqwest::Client::new(), &options(&server));
    let bins = store.list().await.unwrap();
    assert_eq!(bins[0].id, BinId(String::from("BIN-003")));
}

#[tokio::test]
async fn missing_bin_maps_to_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/bins"))
        .and(query_param("id", "eq.BIN-404"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let store = RemoteBinStore::new(reqwest::Client::new(), &options(&server));
    let err = store.get(&BinId(String::from("BIN-404"))).await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound(id) if id == "BIN-404"));
}

#[tokio::test]
async fn insert_conflict_maps_to_duplicate_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/bins"))
        .respond_with(ResponseTemplate::new(409))
        .mount(&server)
        .await;

    let store = RemoteBinStore::new(reqwest::Client::new(), &options(&server));
    let err = store.insert(domain_bin("BIN-001")).await.unwrap_err();
    assert!(matches!(err, StoreError::DuplicateId(id) if id == "BIN-001"));
}

#[tokio::test]
async fn update_with_empty_representation_maps_to_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/bins"))
        .and(query_param("id", "eq.BIN-009"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let store = RemoteBinStore::new(reqwest::Client::new(), &options(&server));
    let err = store.update(domain_bin("BIN-009")).await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound(id) if id == "BIN-009"));
}

#[tokio::test]
async fn change_feed_emits_insert_on_new_rows() {
    let server = MockServer::start().await;
    // First poll primes an empty snapshot, later polls see one row.
    Mock::given(method("GET"))
        .and(path("/rest/v1/bins"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/bins"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([bin_row("BIN-007", &[40])])))
        .mount(&server)
        .await;

    let opts = RemoteOptions::new(server.uri(), "test-key")
        .with_poll_interval(Duration::from_millis(200));
    let store = RemoteBinStore::new(reqwest::Client::new(), &opts);
    let mut changes = store.changes();

    let event = tokio::time::timeout(Duration::from_secs(5), changes.recv())
        .await
        .expect("poller should emit within the window")
        .unwrap();
    assert_eq!(event, BinEvent::Inserted(BinId(String::from("BIN-007"))));
}

#[tokio::test]
async fn change_feed_emits_delete_on_vanished_rows() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/bins"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([bin_row("BIN-008", &[40])])))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/bins"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let opts = RemoteOptions::new(server.uri(), "test-key")
        .with_poll_interval(Duration::from_millis(200));
    let store = RemoteBinStore::new(reqwest::Client::new(), &opts);
    let mut changes = store.changes();

    let event = tokio::time::timeout(Duration::from_secs(5), changes.recv())
        .await
        .expect("poller should emit within the window")
        .unwrap();
    assert_eq!(event, BinEvent::Deleted(BinId(String::from("BIN-008"))));
}

#[tokio::test]
async fn team_image_patch_sends_only_the_portrait_field() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/team_members"))
        .and(query_param("id", "eq.2"))
        .and(body_json(json!({ "image_url": "https://cdn.example/new.png" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "id": 2,
            "name": "Ravi Deshmukh",
            "role": "Backend",
            "linkedin": "https://www.linkedin.com/in/binwatch-2/",
            "image_url": "https://cdn.example/new.png",
            "is_professor": false,
        }])))
        .expect(1)
        .mount(&server)
        .await;

    let store = RemoteTeamStore::new(reqwest::Client::new(), &options(&server));
    let member = store
        .update_image(2, "https://cdn.example/new.png")
        .await
        .unwrap();
    assert_eq!(member.image_url, "https://cdn.example/new.png");
}

#[tokio::test]
async fn sign_in_normalizes_the_raw_role() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .and(query_param("grant_type", "password"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "jwt-123",
            "user": {
                "id": "u-9",
                "email": "operator9@city.example",
                "role": "operator",
                "user_metadata": { "name": "Operator Nine" },
            },
        })))
        .mount(&server)
        .await;

    let auth = RemoteAuth::new(reqwest::Client::new(), &options(&server));
    let session = auth
        .sign_in(&Credentials::new("operator9@city.example", "secret"))
        .await
        .unwrap();

    assert_eq!(session.access_token, "jwt-123");
    assert_eq!(session.user.role, UserRole::Operator);
    assert_eq!(session.user.name, "Operator Nine");
}

#[tokio::test]
async fn rejected_credentials_map_to_unauthorized() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
        })))
        .mount(&server)
        .await;

    let auth = RemoteAuth::new(reqwest::Client::new(), &options(&server));
    let err = auth
        .sign_in(&Credentials::new("nobody@city.example", "nope"))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Unauthorized));
}
