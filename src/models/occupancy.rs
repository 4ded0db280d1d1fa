use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike, Weekday};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Building {
    #[serde(rename = "A")]
    A,
    #[serde(rename = "B")]
    B,
}

impl Building {
    pub fn as_str(&self) -> &'static str {
        match self {
            Building::A => "A",
            Building::B => "B",
        }
    }
}

impl Default for Building {
    fn default() -> Self {
        Building::A
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BuildingCounts {
    #[serde(rename = "A")]
    pub a: i64,
    #[serde(rename = "B")]
    pub b: i64,
}

/// A 15-minute occupancy reading. Produced outside the engine and never
/// mutated by it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OccupancySnapshot {
    pub timestamp: NaiveDateTime,
    pub date: NaiveDate,
    pub weekday: Weekday,
    pub hour: u32,
    pub minute: u32,
    pub building_counts: BuildingCounts,
    pub total: i64,
}

impl OccupancySnapshot {
    /// Builds a snapshot whose calendar fields are derived from `timestamp`.
    pub fn at(timestamp: NaiveDateTime, a: i64, b: i64) -> Self {
        Self {
            timestamp,
            date: timestamp.date(),
            weekday: timestamp.weekday(),
            hour: timestamp.hour(),
            minute: timestamp.minute(),
            building_counts: BuildingCounts { a, b },
            total: a + b,
        }
    }

    pub fn fractional_hour(&self) -> f64 {
        self.hour as f64 + self.minute as f64 / 60.0
    }

    pub fn is_weekend(&self) -> bool {
        matches!(self.weekday, Weekday::Sat | Weekday::Sun)
    }

    /// Rows with impossible clock fields or negative counts are anomalies.
    pub fn is_well_formed(&self) -> bool {
        self.hour < 24
            && self.minute < 60
            && self.total >= 0
            && self.building_counts.a >= 0
            && self.building_counts.b >= 0
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HeatmapResult {
    /// Rows are Monday..Sunday, columns follow `hour_labels`.
    pub matrix: Vec<Vec<f64>>,
    pub weekday_labels: Vec<String>,
    pub hour_labels: Vec<String>,
    pub max_value: f64,
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub sample_count: usize,
    pub skipped_rows: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TrendPoint {
    /// Time of day as a fractional hour, e.g. 10.25 for 10:15.
    pub time: f64,
    pub mean: f64,
    pub p10: f64,
    pub p25: f64,
    pub p75: f64,
    pub p90: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TrendResult {
    pub weekday_mean: Vec<TrendPoint>,
    pub weekend_mean: Vec<TrendPoint>,
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub weekday_samples: usize,
    pub weekend_samples: usize,
    pub skipped_rows: usize,
}
