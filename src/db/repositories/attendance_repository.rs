use std::convert::TryFrom;

use chrono::{NaiveDate, NaiveTime};
use rusqlite::{named_params, Connection, Row};
use tracing::warn;

use crate::error::{AppError, AppResult};
use crate::models::attendance::{AttendanceRecord, ExitSource, RecordKey};
use crate::utils::calendar::days_before;

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M:%S";

#[derive(Debug, Clone)]
pub struct AttendanceRow {
    pub student_id: String,
    pub date: String,
    pub entry_time: String,
    pub exit_time: Option<String>,
    pub exit_source: Option<String>,
}

impl AttendanceRow {
    pub fn from_record(record: &AttendanceRecord) -> Self {
        Self {
            student_id: record.student_id.clone(),
            date: record.date.format(DATE_FORMAT).to_string(),
            entry_time: record.entry_time.format(TIME_FORMAT).to_string(),
            exit_time: record
                .exit_time
                .map(|time| time.format(TIME_FORMAT).to_string()),
            exit_source: record.exit_source.map(|source| source.as_str().to_string()),
        }
    }

    pub fn into_record(self) -> AppResult<AttendanceRecord> {
        let date = NaiveDate::parse_from_str(&self.date, DATE_FORMAT)
            .map_err(|_| AppError::validation(format!("bad attendance date `{}`", self.date)))?;
        let entry_time = parse_time(&self.entry_time)?;
        let exit_time = self.exit_time.as_deref().map(parse_time).transpose()?;
        let exit_source = match (&exit_time, self.exit_source.as_deref()) {
            (None, _) => None,
            (Some(_), None) => Some(ExitSource::Logged),
            (Some(_), Some(raw)) => Some(ExitSource::parse(raw).ok_or_else(|| {
                AppError::validation(format!("bad exit source `{raw}`"))
            })?),
        };

        Ok(AttendanceRecord {
            student_id: self.student_id,
            date,
            entry_time,
            exit_time,
            exit_source,
        })
    }
}

impl TryFrom<&Row<'_>> for AttendanceRow {
    type Error = rusqlite::Error;

    fn try_from(row: &Row<'_>) -> Result<Self, Self::Error> {
        Ok(Self {
            student_id: row.get("student_id")?,
            date: row.get("date")?,
            entry_time: row.get("entry_time")?,
            exit_time: row.get("exit_time")?,
            exit_source: row.get("exit_source")?,
        })
    }
}

pub struct AttendanceRepository;

impl AttendanceRepository {
    pub fn insert(conn: &Connection, record: &AttendanceRecord) -> AppResult<()> {
        let row = AttendanceRow::from_record(record);
        conn.execute(
            r#"
                INSERT INTO attendance_records (
                    student_id,
                    date,
                    entry_time,
                    exit_time,
                    exit_source
                ) VALUES (
                    :student_id,
                    :date,
                    :entry_time,
                    :exit_time,
                    :exit_source
                )
            "#,
            named_params! {
                ":student_id": &row.student_id,
                ":date": &row.date,
                ":entry_time": &row.entry_time,
                ":exit_time": &row.exit_time,
                ":exit_source": &row.exit_source,
            },
        )?;
        Ok(())
    }

    pub fn list_between(
        conn: &Connection,
        from: NaiveDate,
        to: NaiveDate,
    ) -> AppResult<Vec<AttendanceRecord>> {
        Self::query(
            conn,
            r#"
                SELECT student_id, date, entry_time, exit_time, exit_source
                FROM attendance_records
                WHERE date >= :from AND date <= :to
                ORDER BY date, student_id, entry_time
            "#,
            named_params! {
                ":from": from.format(DATE_FORMAT).to_string(),
                ":to": to.format(DATE_FORMAT).to_string(),
            },
        )
    }

    pub fn list_open_on(conn: &Connection, date: NaiveDate) -> AppResult<Vec<AttendanceRecord>> {
        Self::query(
            conn,
            r#"
                SELECT student_id, date, entry_time, exit_time, exit_source
                FROM attendance_records
                WHERE date = :date AND exit_time IS NULL
                ORDER BY student_id, entry_time
            "#,
            named_params! {":date": date.format(DATE_FORMAT).to_string()},
        )
    }

    pub fn list_history(
        conn: &Connection,
        student_id: &str,
        before: NaiveDate,
        days: u32,
    ) -> AppResult<Vec<AttendanceRecord>> {
        let start = days_before(before, days)?;
        Self::query(
            conn,
            r#"
                SELECT student_id, date, entry_time, exit_time, exit_source
                FROM attendance_records
                WHERE student_id = :student_id
                  AND date >= :start
                  AND date < :before
                  AND exit_time IS NOT NULL
                ORDER BY date, entry_time
            "#,
            named_params! {
                ":student_id": student_id,
                ":start": start.format(DATE_FORMAT).to_string(),
                ":before": before.format(DATE_FORMAT).to_string(),
            },
        )
    }

    /// Conditional write: only rows whose exit is still NULL are updated.
    /// Entry times are compared through `time()` so rows stored as `HH:MM`
    /// match the canonical `HH:MM:SS` key.
    pub fn set_imputed_exit(
        conn: &Connection,
        key: &RecordKey,
        exit_time: NaiveTime,
    ) -> AppResult<bool> {
        let updated = conn.execute(
            r#"
                UPDATE attendance_records
                SET exit_time = :exit_time,
                    exit_source = :exit_source
                WHERE student_id = :student_id
                  AND date = :date
                  AND time(entry_time) = :entry_time
                  AND exit_time IS NULL
            "#,
            named_params! {
                ":exit_time": exit_time.format(TIME_FORMAT).to_string(),
                ":exit_source": ExitSource::Imputed.as_str(),
                ":student_id": &key.student_id,
                ":date": key.date.format(DATE_FORMAT).to_string(),
                ":entry_time": key.entry_time.format(TIME_FORMAT).to_string(),
            },
        )?;
        Ok(updated == 1)
    }

    fn query(
        conn: &Connection,
        sql: &str,
        params: &[(&str, &dyn rusqlite::ToSql)],
    ) -> AppResult<Vec<AttendanceRecord>> {
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt
            .query_map(params, |row| AttendanceRow::try_from(row))?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows
            .into_iter()
            .filter_map(|row| match row.into_record() {
                Ok(record) => Some(record),
                Err(err) => {
                    warn!(target: "app::db", error = %err, "skipping unparseable attendance row");
                    None
                }
            })
            .collect())
    }
}

fn parse_time(raw: &str) -> AppResult<NaiveTime> {
    NaiveTime::parse_from_str(raw, TIME_FORMAT)
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
        .map_err(|_| AppError::validation(format!("bad time `{raw}`")))
}
