use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, RwLock};

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use crate::error::{AppError, AppResult};
use crate::models::attendance::{AttendanceRecord, ExitSource, RecordKey};
use crate::models::occupancy::{Building, OccupancySnapshot};
use crate::models::student::Student;
use crate::ports::{FacilityControl, Notifier, RecordStore, StudentRegistry};
use crate::utils::calendar::days_before;

#[derive(Default)]
pub struct MemoryRecordStore {
    snapshots: RwLock<Vec<OccupancySnapshot>>,
    records: RwLock<Vec<AttendanceRecord>>,
    unavailable: AtomicBool,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_data(snapshots: Vec<OccupancySnapshot>, records: Vec<AttendanceRecord>) -> Self {
        Self {
            snapshots: RwLock::new(snapshots),
            records: RwLock::new(records),
            unavailable: AtomicBool::new(false),
        }
    }

    pub fn insert_snapshot(&self, snapshot: OccupancySnapshot) -> AppResult<()> {
        self.snapshots
            .write()
            .map_err(|_| AppError::store_unavailable("snapshot lock poisoned"))?
            .push(snapshot);
        Ok(())
    }

    pub fn insert_record(&self, record: AttendanceRecord) -> AppResult<()> {
        self.records
            .write()
            .map_err(|_| AppError::store_unavailable("record lock poisoned"))?
            .push(record);
        Ok(())
    }

    /// Makes every subsequent call fail with `StoreUnavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn records(&self) -> AppResult<Vec<AttendanceRecord>> {
        self.ensure_available()?;
        Ok(self.read_records()?.clone())
    }

    fn ensure_available(&self) -> AppResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(AppError::store_unavailable("memory store marked unavailable"));
        }
        Ok(())
    }

    fn read_records(&self) -> AppResult<std::sync::RwLockReadGuard<'_, Vec<AttendanceRecord>>> {
        self.records
            .read()
            .map_err(|_| AppError::store_unavailable("record lock poisoned"))
    }
}

impl RecordStore for MemoryRecordStore {
    fn occupancy_between(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> AppResult<Vec<OccupancySnapshot>> {
        self.ensure_available()?;
        let guard = self
            .snapshots
            .read()
            .map_err(|_| AppError::store_unavailable("snapshot lock poisoned"))?;
        Ok(guard
            .iter()
            .filter(|snapshot| snapshot.date >= from && snapshot.date <= to)
            .cloned()
            .collect())
    }

    fn attendance_between(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> AppResult<Vec<AttendanceRecord>> {
        self.ensure_available()?;
        Ok(self
            .read_records()?
            .iter()
            .filter(|record| record.date >= from && record.date <= to)
            .cloned()
            .collect())
    }

    fn open_records_on(&self, date: NaiveDate) -> AppResult<Vec<AttendanceRecord>> {
        self.ensure_available()?;
        Ok(self
            .read_records()?
            .iter()
            .filter(|record| record.date == date && record.is_open())
            .cloned()
            .collect())
    }

    fn student_history(
        &self,
        student_id: &str,
        before: NaiveDate,
        days: u32,
    ) -> AppResult<Vec<AttendanceRecord>> {
        self.ensure_available()?;
        let start = days_before(before, days)?;
        Ok(self
            .read_records()?
            .iter()
            .filter(|record| {
                record.student_id == student_id
                    && record.date >= start
                    && record.date < before
                    && !record.is_open()
            })
            .cloned()
            .collect())
    }

    fn write_imputed_exit(&self, key: &RecordKey, exit_time: NaiveTime) -> AppResult<bool> {
        self.ensure_available()?;
        let mut guard = self
            .records
            .write()
            .map_err(|_| AppError::store_unavailable("record lock poisoned"))?;

        let target = guard.iter_mut().find(|record| {
            record.student_id == key.student_id
                && record.date == key.date
                && record.entry_time == key.entry_time
        });

        match target {
            Some(record) if record.exit_time.is_none() => {
                record.exit_time = Some(exit_time);
                record.exit_source = Some(ExitSource::Imputed);
                Ok(true)
            }
            Some(_) | None => Ok(false),
        }
    }
}

#[derive(Default)]
pub struct MemoryStudentRegistry {
    students: RwLock<HashMap<String, Student>>,
}

impl MemoryStudentRegistry {
    pub fn new(students: Vec<Student>) -> Self {
        Self {
            students: RwLock::new(
                students
                    .into_iter()
                    .map(|student| (student.id.clone(), student))
                    .collect(),
            ),
        }
    }
}

impl StudentRegistry for MemoryStudentRegistry {
    fn find(&self, student_id: &str) -> AppResult<Option<Student>> {
        let guard = self
            .students
            .read()
            .map_err(|_| AppError::store_unavailable("registry lock poisoned"))?;
        Ok(guard.get(student_id).cloned())
    }

    fn list(&self) -> AppResult<Vec<Student>> {
        let guard = self
            .students
            .read()
            .map_err(|_| AppError::store_unavailable("registry lock poisoned"))?;
        let mut students: Vec<Student> = guard.values().cloned().collect();
        students.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(students)
    }
}

#[derive(Default)]
pub struct MemoryFacility {
    open: RwLock<HashMap<Building, bool>>,
    closed_at: RwLock<Vec<(Building, NaiveDateTime)>>,
    unavailable: AtomicBool,
}

impl MemoryFacility {
    pub fn with_open(buildings: &[Building]) -> Self {
        Self {
            open: RwLock::new(buildings.iter().map(|b| (*b, true)).collect()),
            closed_at: RwLock::new(Vec::new()),
            unavailable: AtomicBool::new(false),
        }
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn close_log(&self) -> Vec<(Building, NaiveDateTime)> {
        self.closed_at
            .read()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    fn ensure_available(&self) -> AppResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(AppError::store_unavailable("facility control unavailable"));
        }
        Ok(())
    }
}

impl FacilityControl for MemoryFacility {
    fn is_open(&self, building: Building) -> AppResult<bool> {
        self.ensure_available()?;
        let guard = self
            .open
            .read()
            .map_err(|_| AppError::store_unavailable("facility lock poisoned"))?;
        Ok(guard.get(&building).copied().unwrap_or(false))
    }

    fn close(&self, building: Building, at: NaiveDateTime) -> AppResult<bool> {
        self.ensure_available()?;
        let mut guard = self
            .open
            .write()
            .map_err(|_| AppError::store_unavailable("facility lock poisoned"))?;
        let was_open = guard.insert(building, false).unwrap_or(false);
        if was_open {
            if let Ok(mut log) = self.closed_at.write() {
                log.push((building, at));
            }
        }
        Ok(was_open)
    }
}

/// Records every message; pushes to students in `failing` return an error.
#[derive(Default)]
pub struct MemoryNotifier {
    sent: Mutex<Vec<(String, String)>>,
    failing: HashSet<String>,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_for<I, S>(student_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            sent: Mutex::new(Vec::new()),
            failing: student_ids.into_iter().map(Into::into).collect(),
        }
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl Notifier for MemoryNotifier {
    async fn push(&self, student_id: &str, message: &str) -> AppResult<()> {
        if self.failing.contains(student_id) {
            return Err(AppError::notification(student_id, "recipient unreachable"));
        }
        self.sent
            .lock()
            .map_err(|_| AppError::other("notifier lock poisoned"))?
            .push((student_id.to_string(), message.to_string()));
        Ok(())
    }
}
