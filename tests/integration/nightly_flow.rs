use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use studyhall_analytics_lib::db::store::SqliteStore;
use studyhall_analytics_lib::db::DbPool;
use studyhall_analytics_lib::models::attendance::AttendanceRecord;
use studyhall_analytics_lib::models::nightly::StepStatus;
use studyhall_analytics_lib::models::occupancy::Building;
use studyhall_analytics_lib::models::settings::EngineSettings;
use studyhall_analytics_lib::ports::memory::{MemoryFacility, MemoryNotifier, MemoryRecordStore};
use studyhall_analytics_lib::ports::{FacilityControl, RecordStore};
use studyhall_analytics_lib::services::auto_close_service::AutoCloseService;
use studyhall_analytics_lib::services::imputation_service::ImputationService;
use studyhall_analytics_lib::services::nightly_orchestrator::NightlyOrchestrator;
use studyhall_analytics_lib::services::settings_service::SettingsService;
use tempfile::tempdir;

fn date(raw: &str) -> NaiveDate {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").expect("date")
}

fn time(raw: &str) -> NaiveTime {
    NaiveTime::parse_from_str(raw, "%H:%M").expect("time")
}

fn at(raw: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M").expect("timestamp")
}

fn orchestrator(
    store: Arc<dyn RecordStore>,
    facility: Arc<dyn FacilityControl>,
) -> NightlyOrchestrator {
    let settings = Arc::new(SettingsService::new(EngineSettings::default()).expect("settings"));
    let imputation = Arc::new(ImputationService::new(
        store,
        Arc::new(MemoryNotifier::new()),
        Arc::clone(&settings),
    ));
    NightlyOrchestrator::new(
        AutoCloseService::new(facility, Arc::clone(&settings)),
        imputation,
        settings,
    )
}

#[tokio::test]
async fn nightly_run_closes_and_imputes_then_is_a_noop() {
    let dir = tempdir().expect("temp dir");
    let pool = DbPool::new(dir.path().join("nightly.sqlite")).expect("db pool");
    let store = Arc::new(SqliteStore::new(pool));
    let today = date("2025-03-10");

    store
        .set_building_open(Building::A, true, at("2025-03-10 07:00"))
        .expect("open building");
    store
        .insert_record(&AttendanceRecord::open("S1", today, time("18:00")))
        .expect("open visit");

    let nightly = orchestrator(store.clone(), store.clone());

    let first = nightly.run_at(at("2025-03-10 23:05")).await;
    assert!(first.ok);
    assert_eq!(first.date, today);
    let closed = first.auto_close.result().expect("auto-close completed");
    assert!(closed.closed);
    assert_eq!(closed.building, Building::A);
    let imputed = first.imputation.result().expect("imputation completed");
    assert_eq!(imputed.filled, 1);
    assert_eq!(imputed.details[0].imputed_exit_time, time("20:00"));
    assert!(first.summary.contains("closed building A"));
    assert!(first.summary.contains("filled 1"));
    assert!(!store.is_open(Building::A).expect("facility status"));

    let second = nightly.run_at(at("2025-03-10 23:30")).await;
    assert!(second.ok);
    assert_ne!(second.run_id, first.run_id);
    let noop = second.auto_close.result().expect("auto-close completed");
    assert!(!noop.closed);
    assert_eq!(noop.reason, "already closed");
    assert_eq!(second.imputation.result().map(|report| report.filled), Some(0));
}

#[tokio::test]
async fn auto_close_failure_still_runs_imputation() {
    let today = date("2025-03-10");
    let store = Arc::new(MemoryRecordStore::with_data(
        Vec::new(),
        vec![AttendanceRecord::open("S1", today, time("12:00"))],
    ));
    let facility = Arc::new(MemoryFacility::with_open(&[Building::A]));
    facility.set_unavailable(true);

    let report = orchestrator(store.clone(), facility)
        .run_at(at("2025-03-10 23:15"))
        .await;

    assert!(report.ok);
    match &report.auto_close {
        StepStatus::Failed { error } => assert!(error.contains("autoClose")),
        other => panic!("expected failed auto-close, got {other:?}"),
    }
    assert_eq!(report.imputation.result().map(|r| r.filled), Some(1));
    assert!(report.summary.contains("autoClose: failed"));
    assert!(report.summary.contains("filled 1"));
    assert!(store.open_records_on(today).expect("open records").is_empty());
}

#[tokio::test]
async fn before_cutoff_leaves_building_open() {
    let facility = Arc::new(MemoryFacility::with_open(&[Building::A]));
    let report = orchestrator(Arc::new(MemoryRecordStore::new()), facility.clone())
        .run_at(at("2025-03-10 21:00"))
        .await;

    let outcome = report.auto_close.result().expect("auto-close completed");
    assert!(!outcome.closed);
    assert_eq!(outcome.reason, "before cutoff 23:00");
    assert!(facility.close_log().is_empty());
    assert!(facility.is_open(Building::A).expect("facility status"));
}

#[tokio::test]
async fn both_steps_failing_yields_report_not_error() {
    let store = Arc::new(MemoryRecordStore::new());
    store.set_unavailable(true);
    let facility = Arc::new(MemoryFacility::with_open(&[Building::A]));
    facility.set_unavailable(true);

    let report = orchestrator(store, facility)
        .run_at(at("2025-03-10 23:15"))
        .await;

    assert!(!report.ok);
    assert!(!report.auto_close.is_completed());
    assert!(!report.imputation.is_completed());
    assert!(report.summary.contains("imputation: failed"));
}

#[tokio::test]
async fn report_serializes_with_step_status_tags() {
    let report = orchestrator(
        Arc::new(MemoryRecordStore::new()),
        Arc::new(MemoryFacility::with_open(&[Building::A])),
    )
    .run_at(at("2025-03-10 23:15"))
    .await;

    let json = serde_json::to_value(&report).expect("serialize report");
    assert_eq!(json["ok"], true);
    assert_eq!(json["date"], "2025-03-10");
    assert_eq!(json["autoClose"]["status"], "completed");
    assert_eq!(json["autoClose"]["result"]["closed"], true);
    assert_eq!(json["imputation"]["result"]["filled"], 0);
    assert_eq!(
        json["runId"].as_str().map(str::len),
        Some(36),
        "run id is a hyphenated uuid"
    );
}
