//! Narrow capability interfaces for the engine's collaborators.
//!
//! Services only ever see these traits, so they run equally against the
//! SQLite adapter in [`crate::db::store`] or the fakes in [`memory`].

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use tracing::info;

use crate::error::AppResult;
use crate::models::attendance::{AttendanceRecord, RecordKey};
use crate::models::occupancy::{Building, OccupancySnapshot};
use crate::models::student::Student;

pub mod memory;

pub trait RecordStore: Send + Sync {
    /// Snapshots with `from <= date <= to`.
    fn occupancy_between(&self, from: NaiveDate, to: NaiveDate)
        -> AppResult<Vec<OccupancySnapshot>>;

    /// Attendance rows with `from <= date <= to`, open or completed.
    fn attendance_between(&self, from: NaiveDate, to: NaiveDate)
        -> AppResult<Vec<AttendanceRecord>>;

    /// Rows on `date` that have an entry but no exit.
    fn open_records_on(&self, date: NaiveDate) -> AppResult<Vec<AttendanceRecord>>;

    /// Completed rows of one student dated in `[before - days, before)`.
    fn student_history(
        &self,
        student_id: &str,
        before: NaiveDate,
        days: u32,
    ) -> AppResult<Vec<AttendanceRecord>>;

    /// Sets an imputed exit only if the exit is still absent. Returns
    /// `false` when another writer got there first or the row is gone.
    fn write_imputed_exit(&self, key: &RecordKey, exit_time: NaiveTime) -> AppResult<bool>;
}

pub trait StudentRegistry: Send + Sync {
    fn find(&self, student_id: &str) -> AppResult<Option<Student>>;

    fn list(&self) -> AppResult<Vec<Student>>;
}

pub trait FacilityControl: Send + Sync {
    fn is_open(&self, building: Building) -> AppResult<bool>;

    /// Closes the building if it is open. Returns `false` if it was
    /// already closed.
    fn close(&self, building: Building, at: NaiveDateTime) -> AppResult<bool>;
}

#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn push(&self, student_id: &str, message: &str) -> AppResult<()>;
}

/// Notifier that only writes to the log.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait::async_trait]
impl Notifier for LogNotifier {
    async fn push(&self, student_id: &str, message: &str) -> AppResult<()> {
        info!(target: "app::notify", %student_id, %message, "notification");
        Ok(())
    }
}
