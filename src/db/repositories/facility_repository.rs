use chrono::NaiveDateTime;
use rusqlite::{named_params, Connection, OptionalExtension};

use crate::error::AppResult;
use crate::models::occupancy::Building;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

pub struct FacilityRepository;

impl FacilityRepository {
    pub fn set_open(
        conn: &Connection,
        building: Building,
        is_open: bool,
        at: NaiveDateTime,
    ) -> AppResult<()> {
        conn.execute(
            r#"
                INSERT INTO facility_status (building, is_open, updated_at)
                VALUES (:building, :is_open, :updated_at)
                ON CONFLICT(building) DO UPDATE SET
                    is_open = excluded.is_open,
                    updated_at = excluded.updated_at
            "#,
            named_params! {
                ":building": building.as_str(),
                ":is_open": is_open,
                ":updated_at": at.format(TIMESTAMP_FORMAT).to_string(),
            },
        )?;
        Ok(())
    }

    /// A building with no status row counts as closed.
    pub fn is_open(conn: &Connection, building: Building) -> AppResult<bool> {
        let value: Option<bool> = conn
            .query_row(
                "SELECT is_open FROM facility_status WHERE building = :building",
                named_params! {":building": building.as_str()},
                |row| row.get(0),
            )
            .optional()?;
        Ok(value.unwrap_or(false))
    }

    pub fn close_if_open(
        conn: &Connection,
        building: Building,
        at: NaiveDateTime,
    ) -> AppResult<bool> {
        let updated = conn.execute(
            r#"
                UPDATE facility_status
                SET is_open = 0, updated_at = :updated_at
                WHERE building = :building AND is_open = 1
            "#,
            named_params! {
                ":building": building.as_str(),
                ":updated_at": at.format(TIMESTAMP_FORMAT).to_string(),
            },
        )?;
        Ok(updated == 1)
    }
}
