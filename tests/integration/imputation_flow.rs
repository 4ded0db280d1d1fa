use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime};
use studyhall_analytics_lib::db::store::SqliteStore;
use studyhall_analytics_lib::db::DbPool;
use studyhall_analytics_lib::error::{AppError, AppResult};
use studyhall_analytics_lib::models::attendance::{AttendanceRecord, RecordKey};
use studyhall_analytics_lib::models::occupancy::OccupancySnapshot;
use studyhall_analytics_lib::models::settings::EngineSettings;
use studyhall_analytics_lib::ports::memory::{MemoryNotifier, MemoryRecordStore};
use studyhall_analytics_lib::ports::RecordStore;
use studyhall_analytics_lib::services::imputation_service::ImputationService;
use studyhall_analytics_lib::services::settings_service::SettingsService;
use tempfile::tempdir;

fn date(raw: &str) -> NaiveDate {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").expect("date")
}

fn time(raw: &str) -> NaiveTime {
    NaiveTime::parse_from_str(raw, "%H:%M").expect("time")
}

fn settings() -> Arc<SettingsService> {
    Arc::new(SettingsService::new(EngineSettings::default()).expect("settings"))
}

/// Memory store whose n-th history read fails once.
struct FlakyHistoryStore {
    inner: MemoryRecordStore,
    history_reads: AtomicUsize,
    fail_on: usize,
}

impl RecordStore for FlakyHistoryStore {
    fn occupancy_between(&self, from: NaiveDate, to: NaiveDate) -> AppResult<Vec<OccupancySnapshot>> {
        self.inner.occupancy_between(from, to)
    }

    fn attendance_between(&self, from: NaiveDate, to: NaiveDate) -> AppResult<Vec<AttendanceRecord>> {
        self.inner.attendance_between(from, to)
    }

    fn open_records_on(&self, date: NaiveDate) -> AppResult<Vec<AttendanceRecord>> {
        self.inner.open_records_on(date)
    }

    fn student_history(
        &self,
        student_id: &str,
        before: NaiveDate,
        days: u32,
    ) -> AppResult<Vec<AttendanceRecord>> {
        let read = self.history_reads.fetch_add(1, Ordering::SeqCst) + 1;
        if read == self.fail_on {
            return Err(AppError::store_unavailable("history read failed"));
        }
        self.inner.student_history(student_id, before, days)
    }

    fn write_imputed_exit(&self, key: &RecordKey, exit_time: NaiveTime) -> AppResult<bool> {
        self.inner.write_imputed_exit(key, exit_time)
    }
}

/// Sessions of 60, 90 and 75 minutes in the week before Monday 2025-03-10.
fn prior_week(student_id: &str) -> Vec<AttendanceRecord> {
    vec![
        AttendanceRecord::completed(student_id, date("2025-03-04"), time("10:00"), time("11:00")),
        AttendanceRecord::completed(student_id, date("2025-03-06"), time("13:00"), time("14:30")),
        AttendanceRecord::completed(student_id, date("2025-03-08"), time("09:00"), time("10:15")),
    ]
}

#[tokio::test]
async fn open_visit_gets_mean_of_recent_sessions() {
    let today = date("2025-03-10");
    let mut records = prior_week("S1");
    records.push(AttendanceRecord::open("S1", today, time("14:00")));
    let store = Arc::new(MemoryRecordStore::with_data(Vec::new(), records));
    let notifier = Arc::new(MemoryNotifier::new());
    let service = ImputationService::new(store.clone(), notifier.clone(), settings());

    let report = service.run(today).await.expect("imputation");

    assert_eq!(report.filled, 1);
    assert_eq!(report.notified, 1);
    assert_eq!(report.notification_failures, 0);
    assert_eq!(report.details.len(), 1);
    let detail = &report.details[0];
    assert_eq!(detail.student_id, "S1");
    assert_eq!(detail.imputed_exit_time, time("15:15"));
    assert_eq!(detail.basis_samples, 3);
    assert!(!detail.clamped);

    let stored = store.attendance_between(today, today).expect("read back");
    assert_eq!(stored[0].exit_time, Some(time("15:15")));
    assert!(stored[0].is_imputed());

    let sent = notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, "S1");
    assert!(sent[0].1.contains("15:15"));
}

#[tokio::test]
async fn second_run_for_same_date_fills_nothing() {
    let today = date("2025-03-10");
    let mut records = prior_week("S1");
    records.push(AttendanceRecord::open("S1", today, time("14:00")));
    records.push(AttendanceRecord::open("S2", today, time("10:00")));
    records.push(AttendanceRecord::completed("S3", today, time("09:00"), time("12:00")));
    let store = Arc::new(MemoryRecordStore::with_data(Vec::new(), records));
    let notifier = Arc::new(MemoryNotifier::new());
    let service = ImputationService::new(store.clone(), notifier.clone(), settings());

    let first = service.run(today).await.expect("first run");
    assert_eq!(first.filled, 2);

    let second = service.run(today).await.expect("second run");
    assert_eq!(second.filled, 0);
    assert_eq!(second.notified, 0);
    assert!(second.details.is_empty());
    assert_eq!(notifier.sent().len(), 2);

    let organic = store
        .attendance_between(today, today)
        .expect("read back")
        .into_iter()
        .find(|record| record.student_id == "S3")
        .expect("organic record");
    assert_eq!(organic.exit_time, Some(time("12:00")));
    assert!(!organic.is_imputed());
}

#[tokio::test]
async fn imputed_exit_never_passes_closing_time() {
    let today = date("2025-03-10");
    let closing = EngineSettings::default().closing_time(today);
    let records = vec![
        AttendanceRecord::completed("late", date("2025-03-07"), time("08:00"), time("13:00")),
        AttendanceRecord::open("late", today, time("20:00")),
        AttendanceRecord::completed("wrap", date("2025-03-07"), time("07:00"), time("21:00")),
        AttendanceRecord::open("wrap", today, time("21:30")),
        AttendanceRecord::open("after", today, time("22:30")),
    ];
    let store = Arc::new(MemoryRecordStore::with_data(Vec::new(), records));
    let service = ImputationService::new(store.clone(), Arc::new(MemoryNotifier::new()), settings());

    let report = service.run(today).await.expect("imputation");

    assert_eq!(report.filled, 2);
    assert_eq!(report.skipped, 1);
    assert!(report
        .details
        .iter()
        .all(|detail| detail.clamped && detail.imputed_exit_time == closing));

    let still_open = store.open_records_on(today).expect("open records");
    assert_eq!(still_open.len(), 1);
    assert_eq!(still_open[0].student_id, "after");
}

#[tokio::test]
async fn students_without_history_use_fallback_duration() {
    let today = date("2025-03-15");
    let store = Arc::new(MemoryRecordStore::with_data(
        Vec::new(),
        vec![AttendanceRecord::open("new", today, time("09:30"))],
    ));
    let service = ImputationService::new(store, Arc::new(MemoryNotifier::new()), settings());

    let report = service.run(today).await.expect("imputation");

    assert_eq!(report.details[0].basis_samples, 0);
    assert_eq!(report.details[0].imputed_exit_time, time("11:30"));
}

#[tokio::test]
async fn failed_notification_does_not_stop_other_students() {
    let today = date("2025-03-10");
    let records = vec![
        AttendanceRecord::open("S1", today, time("10:00")),
        AttendanceRecord::open("S2", today, time("11:00")),
        AttendanceRecord::open("S3", today, time("12:00")),
    ];
    let store = Arc::new(MemoryRecordStore::with_data(Vec::new(), records));
    let notifier = Arc::new(MemoryNotifier::failing_for(["S2"]));
    let service = ImputationService::new(store.clone(), notifier.clone(), settings());

    let report = service.run(today).await.expect("imputation");

    assert_eq!(report.filled, 3);
    assert_eq!(report.notified, 2);
    assert_eq!(report.notification_failures, 1);
    assert!(store.open_records_on(today).expect("open records").is_empty());

    let recipients: Vec<String> = notifier.sent().into_iter().map(|(id, _)| id).collect();
    assert_eq!(recipients, vec!["S1".to_string(), "S3".to_string()]);
}

#[tokio::test]
async fn one_notice_per_student_with_several_open_visits() {
    let today = date("2025-03-10");
    let records = vec![
        AttendanceRecord::open("S1", today, time("09:00")),
        AttendanceRecord::open("S1", today, time("15:00")),
    ];
    let store = Arc::new(MemoryRecordStore::with_data(Vec::new(), records));
    let notifier = Arc::new(MemoryNotifier::new());
    let service = ImputationService::new(store, notifier.clone(), settings());

    let report = service.run(today).await.expect("imputation");

    assert_eq!(report.filled, 2);
    assert_eq!(report.notified, 1);
    let sent = notifier.sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].1.contains("11:00") && sent[0].1.contains("17:00"));
}

#[tokio::test]
async fn sqlite_store_imputes_once() {
    let dir = tempdir().expect("temp dir");
    let pool = DbPool::new(dir.path().join("attendance.sqlite")).expect("db pool");
    let store = Arc::new(SqliteStore::new(pool));
    let today = date("2025-03-10");

    for record in prior_week("S1") {
        store.insert_record(&record).expect("insert history");
    }
    store
        .insert_record(&AttendanceRecord::open("S1", today, time("14:00")))
        .expect("insert open visit");

    let service = ImputationService::new(store.clone(), Arc::new(MemoryNotifier::new()), settings());

    let first = service.run(today).await.expect("first run");
    assert_eq!(first.filled, 1);
    assert_eq!(first.details[0].imputed_exit_time, time("15:15"));

    let second = service.run(today).await.expect("second run");
    assert_eq!(second.filled, 0);

    let stored = store.attendance_between(today, today).expect("read back");
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].exit_time, Some(time("15:15")));
    assert!(stored[0].is_imputed());
}

#[tokio::test]
async fn store_failure_mid_run_still_notifies_written_students() {
    let today = date("2025-03-10");
    let store = Arc::new(FlakyHistoryStore {
        inner: MemoryRecordStore::with_data(
            Vec::new(),
            vec![
                AttendanceRecord::open("S1", today, time("10:00")),
                AttendanceRecord::open("S2", today, time("11:00")),
            ],
        ),
        history_reads: AtomicUsize::new(0),
        fail_on: 2,
    });
    let notifier = Arc::new(MemoryNotifier::new());
    let service = ImputationService::new(store.clone(), notifier.clone(), settings());

    let error = service.run(today).await.expect_err("second history read fails");
    assert!(matches!(error, AppError::StoreUnavailable { .. }));

    // S1 was written before the failure and has already been told.
    let recipients: Vec<String> = notifier.sent().into_iter().map(|(id, _)| id).collect();
    assert_eq!(recipients, vec!["S1".to_string()]);
    let open = store.open_records_on(today).expect("open records");
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].student_id, "S2");

    let retry = service.run(today).await.expect("retry");
    assert_eq!(retry.filled, 1);
    assert_eq!(retry.details[0].student_id, "S2");

    let recipients: Vec<String> = notifier.sent().into_iter().map(|(id, _)| id).collect();
    assert_eq!(recipients, vec!["S1".to_string(), "S2".to_string()]);
    assert!(store.open_records_on(today).expect("open records").is_empty());
}
