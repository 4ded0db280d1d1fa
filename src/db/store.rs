//! SQLite-backed implementations of the engine's ports.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use tracing::debug;

use crate::db::repositories::attendance_repository::AttendanceRepository;
use crate::db::repositories::facility_repository::FacilityRepository;
use crate::db::repositories::occupancy_repository::OccupancyRepository;
use crate::db::repositories::student_repository::StudentRepository;
use crate::db::DbPool;
use crate::error::AppResult;
use crate::models::attendance::{AttendanceRecord, RecordKey};
use crate::models::occupancy::{Building, OccupancySnapshot};
use crate::models::student::Student;
use crate::ports::{FacilityControl, RecordStore, StudentRegistry};

#[derive(Clone, Debug)]
pub struct SqliteStore {
    db: DbPool,
}

impl SqliteStore {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    pub fn db(&self) -> &DbPool {
        &self.db
    }

    pub fn insert_snapshot(&self, snapshot: &OccupancySnapshot) -> AppResult<()> {
        self.db
            .with_connection(|conn| OccupancyRepository::insert(conn, snapshot))
    }

    pub fn insert_record(&self, record: &AttendanceRecord) -> AppResult<()> {
        self.db
            .with_connection(|conn| AttendanceRepository::insert(conn, record))
    }

    pub fn upsert_student(&self, student: &Student) -> AppResult<()> {
        self.db
            .with_connection(|conn| StudentRepository::upsert(conn, student))
    }

    pub fn set_building_open(
        &self,
        building: Building,
        is_open: bool,
        at: NaiveDateTime,
    ) -> AppResult<()> {
        self.db
            .with_connection(|conn| FacilityRepository::set_open(conn, building, is_open, at))
    }
}

impl RecordStore for SqliteStore {
    fn occupancy_between(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> AppResult<Vec<OccupancySnapshot>> {
        self.db
            .with_connection(|conn| OccupancyRepository::list_between(conn, from, to))
    }

    fn attendance_between(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> AppResult<Vec<AttendanceRecord>> {
        self.db
            .with_connection(|conn| AttendanceRepository::list_between(conn, from, to))
    }

    fn open_records_on(&self, date: NaiveDate) -> AppResult<Vec<AttendanceRecord>> {
        self.db
            .with_connection(|conn| AttendanceRepository::list_open_on(conn, date))
    }

    fn student_history(
        &self,
        student_id: &str,
        before: NaiveDate,
        days: u32,
    ) -> AppResult<Vec<AttendanceRecord>> {
        self.db.with_connection(|conn| {
            AttendanceRepository::list_history(conn, student_id, before, days)
        })
    }

    fn write_imputed_exit(&self, key: &RecordKey, exit_time: NaiveTime) -> AppResult<bool> {
        let written = self
            .db
            .with_connection(|conn| AttendanceRepository::set_imputed_exit(conn, key, exit_time))?;
        if !written {
            debug!(
                target: "app::db",
                student_id = %key.student_id,
                date = %key.date,
                "imputed exit not written, exit already present"
            );
        }
        Ok(written)
    }
}

impl StudentRegistry for SqliteStore {
    fn find(&self, student_id: &str) -> AppResult<Option<Student>> {
        self.db
            .with_connection(|conn| StudentRepository::find(conn, student_id))
    }

    fn list(&self) -> AppResult<Vec<Student>> {
        self.db.with_connection(StudentRepository::list_all)
    }
}

impl FacilityControl for SqliteStore {
    fn is_open(&self, building: Building) -> AppResult<bool> {
        self.db
            .with_connection(|conn| FacilityRepository::is_open(conn, building))
    }

    fn close(&self, building: Building, at: NaiveDateTime) -> AppResult<bool> {
        self.db
            .with_connection(|conn| FacilityRepository::close_if_open(conn, building, at))
    }
}
