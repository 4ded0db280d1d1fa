use std::convert::TryFrom;

use chrono::{NaiveDate, NaiveDateTime, Weekday};
use rusqlite::{named_params, Connection, Row};
use tracing::warn;

use crate::error::{AppError, AppResult};
use crate::models::occupancy::{BuildingCounts, OccupancySnapshot};

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

#[derive(Debug, Clone)]
pub struct OccupancyRow {
    pub timestamp: String,
    pub date: String,
    pub weekday: String,
    pub hour: i64,
    pub minute: i64,
    pub count_a: i64,
    pub count_b: i64,
    pub total: i64,
}

impl OccupancyRow {
    pub fn from_snapshot(snapshot: &OccupancySnapshot) -> Self {
        Self {
            timestamp: snapshot.timestamp.format(TIMESTAMP_FORMAT).to_string(),
            date: snapshot.date.format(DATE_FORMAT).to_string(),
            weekday: snapshot.weekday.to_string(),
            hour: snapshot.hour as i64,
            minute: snapshot.minute as i64,
            count_a: snapshot.building_counts.a,
            count_b: snapshot.building_counts.b,
            total: snapshot.total,
        }
    }

    /// Clock fields are carried over as stored; range checks belong to the
    /// aggregator so that anomalies are counted rather than hidden.
    pub fn into_snapshot(self) -> AppResult<OccupancySnapshot> {
        let timestamp = NaiveDateTime::parse_from_str(&self.timestamp, TIMESTAMP_FORMAT)
            .map_err(|_| AppError::validation(format!("bad snapshot timestamp `{}`", self.timestamp)))?;
        let date = NaiveDate::parse_from_str(&self.date, DATE_FORMAT)
            .map_err(|_| AppError::validation(format!("bad snapshot date `{}`", self.date)))?;
        let weekday = self
            .weekday
            .parse::<Weekday>()
            .map_err(|_| AppError::validation(format!("bad weekday `{}`", self.weekday)))?;
        let hour = u32::try_from(self.hour)
            .map_err(|_| AppError::validation(format!("bad hour {}", self.hour)))?;
        let minute = u32::try_from(self.minute)
            .map_err(|_| AppError::validation(format!("bad minute {}", self.minute)))?;

        Ok(OccupancySnapshot {
            timestamp,
            date,
            weekday,
            hour,
            minute,
            building_counts: BuildingCounts {
                a: self.count_a,
                b: self.count_b,
            },
            total: self.total,
        })
    }
}

impl TryFrom<&Row<'_>> for OccupancyRow {
    type Error = rusqlite::Error;

    fn try_from(row: &Row<'_>) -> Result<Self, Self::Error> {
        Ok(Self {
            timestamp: row.get("timestamp")?,
            date: row.get("date")?,
            weekday: row.get("weekday")?,
            hour: row.get("hour")?,
            minute: row.get("minute")?,
            count_a: row.get("count_a")?,
            count_b: row.get("count_b")?,
            total: row.get("total")?,
        })
    }
}

pub struct OccupancyRepository;

impl OccupancyRepository {
    pub fn insert(conn: &Connection, snapshot: &OccupancySnapshot) -> AppResult<()> {
        let row = OccupancyRow::from_snapshot(snapshot);
        conn.execute(
            r#"
                INSERT INTO occupancy_snapshots (
                    timestamp, date, weekday, hour, minute, count_a, count_b, total
                ) VALUES (
                    :timestamp, :date, :weekday, :hour, :minute, :count_a, :count_b, :total
                )
                ON CONFLICT(timestamp) DO UPDATE SET
                    count_a = excluded.count_a,
                    count_b = excluded.count_b,
                    total = excluded.total
            "#,
            named_params! {
                ":timestamp": &row.timestamp,
                ":date": &row.date,
                ":weekday": &row.weekday,
                ":hour": row.hour,
                ":minute": row.minute,
                ":count_a": row.count_a,
                ":count_b": row.count_b,
                ":total": row.total,
            },
        )?;
        Ok(())
    }

    pub fn list_between(
        conn: &Connection,
        from: NaiveDate,
        to: NaiveDate,
    ) -> AppResult<Vec<OccupancySnapshot>> {
        let mut stmt = conn.prepare(
            r#"
                SELECT timestamp, date, weekday, hour, minute, count_a, count_b, total
                FROM occupancy_snapshots
                WHERE date >= :from AND date <= :to
                ORDER BY timestamp
            "#,
        )?;

        let rows = stmt
            .query_map(
                named_params! {
                    ":from": from.format(DATE_FORMAT).to_string(),
                    ":to": to.format(DATE_FORMAT).to_string(),
                },
                |row| OccupancyRow::try_from(row),
            )?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows
            .into_iter()
            .filter_map(|row| match row.into_snapshot() {
                Ok(snapshot) => Some(snapshot),
                Err(err) => {
                    warn!(target: "app::db", error = %err, "skipping unparseable occupancy row");
                    None
                }
            })
            .collect())
    }
}
