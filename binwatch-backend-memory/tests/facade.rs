//! Service facade behavior exercised against the in-memory backend.

use std::sync::Arc;
use std::time::Duration;

use binwatch_core::model::{Bin, BinEvent, BinId, Compartment, NewBin, Status, UserId};
use binwatch_core::ports::StoreError;
use binwatch_core::service::BinService;
use chrono::Utc;
use tokio::sync::mpsc;

use binwatch_backend_memory::{backend, backend_with_bins, fixture_bins};

fn service() -> BinService {
    BinService::new(Arc::new(backend()))
}

fn plain_bin(id: &str, fills: &[u8]) -> Bin {
    let compartments = fills
        .iter()
        .enumerate()
        .map(|(index, fill)| Compartment {
            id: format!("c{}", index + 1),
            name: format!("Slot {}", index + 1),
            fill_level: *fill,
        })
        .collect::<Vec<_>>();
    Bin {
        id: BinId(id.to_owned()),
        location_name: format!("Site {id}"),
        address: String::from("1 Test Lane"),
        latitude: 0.0,
        longitude: 0.0,
        status: Status::derive(&compartments),
        enabled: true,
        last_emptied: Utc::now(),
        assigned_operator_id: None,
        local_body_email: String::from("ward@city.example"),
        compartments,
    }
}

fn new_bin_input(id: &str) -> NewBin {
    NewBin {
        id: id.to_owned(),
        location_name: String::from("Harbor Square"),
        address: String::from("1 Pier Rd"),
        latitude: 53.55,
        longitude: 9.99,
        local_body_email: String::from("ward7@city.example"),
        assigned_operator_id: Some(UserId(String::from("op-1"))),
    }
}

#[tokio::test]
async fn listing_recomputes_status_from_compartments() {
    // Seed a bin whose cached status disagrees with its readings.
    let mut stale = plain_bin("BIN-900", &[95, 10]);
    stale.status = Status::Normal;
    let service = BinService::new(Arc::new(backend_with_bins(vec![stale])));

    let bins = service.list_bins().await.unwrap();
    assert_eq!(bins[0].status, Status::Full);
}

#[tokio::test]
async fn operator_view_never_contains_a_disabled_bin() {
    let service = service();

    for operator in ["op-1", "op-2", "op-unknown"] {
        let bins = service
            .operator_bins(&UserId(String::from(operator)))
            .await
            .unwrap();
        assert!(
            bins.iter().all(|bin| bin.enabled),
            "disabled bin leaked into {operator}'s view"
        );
    }
}

#[tokio::test]
async fn stats_average_is_the_rounded_mean_over_enabled_bins() {
    let bins = vec![plain_bin("A-1", &[10, 20, 30]), plain_bin("A-2", &[90, 90, 90])];
    let service = BinService::new(Arc::new(backend_with_bins(bins)));

    let stats = service.stats().await.unwrap();
    assert_eq!(stats.total_bins, 2);
    assert_eq!(stats.full_bins, 1);
    assert_eq!(stats.avg_fill_percentage, 55);
    assert_eq!(stats.active_alerts, 1);
}

#[tokio::test]
async fn stats_ignore_disabled_bins_and_handle_no_readings() {
    let mut disabled = plain_bin("B-1", &[100, 100]);
    disabled.enabled = false;
    let empty = plain_bin("B-2", &[]);
    let service = BinService::new(Arc::new(backend_with_bins(vec![disabled, empty])));

    let stats = service.stats().await.unwrap();
    assert_eq!(stats.total_bins, 1);
    assert_eq!(stats.full_bins, 0);
    assert_eq!(stats.avg_fill_percentage, 0);
    assert_eq!(stats.active_alerts, 0);
}

#[tokio::test]
async fn emptying_a_bin_is_idempotent_apart_from_the_timestamp() {
    let service = service();
    let id = BinId(String::from("BIN-002"));

    let first = service.empty_bin(&id).await.unwrap();
    let second = service.empty_bin(&id).await.unwrap();

    for emptied in [&first, &second] {
        assert_eq!(emptied.status, Status::Normal);
        assert!(
            emptied
                .compartments
                .iter()
                .all(|compartment| compartment.fill_level == 0)
        );
    }
    assert!(second.last_emptied >= first.last_emptied);
}

#[tokio::test]
async fn emptying_an_unknown_bin_reports_not_found() {
    let err = service()
        .empty_bin(&BinId(String::from("BIN-404")))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound(id) if id == "BIN-404"));
}

#[tokio::test]
async fn registration_initializes_three_empty_compartments() {
    let service = service();

    let bin = service.add_bin(new_bin_input("BIN-100")).await.unwrap();
    assert_eq!(bin.status, Status::Normal);
    let names: Vec<&str> = bin
        .compartments
        .iter()
        .map(|compartment| compartment.name.as_str())
        .collect();
    assert_eq!(names, vec!["Organic", "Plastic", "Metal"]);
    assert!(bin.compartments.iter().all(|compartment| compartment.fill_level == 0));
    assert!(bin.enabled);
}

#[tokio::test]
async fn rejected_registration_persists_nothing() {
    let service = service();
    let before = service.list_bins().await.unwrap().len();

    let mut input = new_bin_input("BIN-101");
    input.local_body_email = String::from("not-an-email");
    let err = service.add_bin(input).await.unwrap_err();

    assert!(
        matches!(&err, StoreError::Validation { fields } if fields == &vec![String::from("local_body_email")])
    );
    assert_eq!(service.list_bins().await.unwrap().len(), before);
}

#[tokio::test]
async fn registration_with_a_taken_id_reports_the_conflict() {
    let err = service()
        .add_bin(new_bin_input("BIN-001"))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::DuplicateId(id) if id == "BIN-001"));
}

#[tokio::test]
async fn watcher_receives_events_until_the_guard_drops() {
    let service = service();
    let (tx, mut rx) = mpsc::unbounded_channel();

    let listener = service.watch_bins(move |event| {
        let _ = tx.send(event);
    });

    service.add_bin(new_bin_input("BIN-200")).await.unwrap();
    let event = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("event should arrive")
        .expect("channel open");
    assert_eq!(event, BinEvent::Inserted(BinId(String::from("BIN-200"))));

    listener.stop();
    tokio::time::sleep(Duration::from_millis(50)).await;

    service.add_bin(new_bin_input("BIN-201")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(rx.try_recv().is_err(), "listener kept running after release");
}

#[tokio::test]
async fn fixtures_cover_all_three_status_bands() {
    let statuses: Vec<Status> = fixture_bins()
        .iter()
        .map(|bin| Status::derive(&bin.compartments))
        .collect();
    assert!(statuses.contains(&Status::Normal));
    assert!(statuses.contains(&Status::Warning));
    assert!(statuses.contains(&Status::Full));
}
