use chrono::{Datelike, NaiveDate, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

use crate::models::occupancy::Building;
use crate::models::student::Cohort;

pub const MINUTES_PER_DAY: u32 = 24 * 60;
pub const MAX_LOOKBACK_DAYS: u32 = 366;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OperatingWindow {
    pub open_hour: u32,
    pub close_hour: u32,
}

impl OperatingWindow {
    pub fn hours(&self) -> std::ops::Range<u32> {
        self.open_hour..self.close_hour
    }

    pub fn contains(&self, fractional_hour: f64) -> bool {
        fractional_hour >= self.open_hour as f64 && fractional_hour < self.close_hour as f64
    }
}

impl Default for OperatingWindow {
    fn default() -> Self {
        Self {
            open_hour: 7,
            close_hour: 23,
        }
    }
}

/// Half-open `[start_minute, end_minute)` band in minutes after midnight.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MinuteBand {
    pub start_minute: u32,
    pub end_minute: u32,
}

impl MinuteBand {
    pub const fn new(start_minute: u32, end_minute: u32) -> Self {
        Self {
            start_minute,
            end_minute,
        }
    }

    pub fn contains(&self, minute_of_day: u32) -> bool {
        minute_of_day >= self.start_minute && minute_of_day < self.end_minute
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct ImputationSettings {
    pub lookback_days: u32,
    pub fallback_duration_minutes: u32,
}

impl Default for ImputationSettings {
    fn default() -> Self {
        Self {
            lookback_days: 7,
            fallback_duration_minutes: 120,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct AutoCloseSettings {
    pub building: Building,
    pub cutoff_minute: u32,
}

impl Default for AutoCloseSettings {
    fn default() -> Self {
        Self {
            building: Building::A,
            cutoff_minute: 23 * 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct CohortRules {
    pub exam_track_statuses: Vec<String>,
    pub excluded_statuses: Vec<String>,
}

impl CohortRules {
    /// `None` means the student is not eligible for rankings at all.
    pub fn classify(&self, status: &str) -> Option<Cohort> {
        let status = status.trim();
        if self
            .excluded_statuses
            .iter()
            .any(|value| value.eq_ignore_ascii_case(status))
        {
            return None;
        }

        if self
            .exam_track_statuses
            .iter()
            .any(|value| value.eq_ignore_ascii_case(status))
        {
            Some(Cohort::ExamTrack)
        } else {
            Some(Cohort::General)
        }
    }
}

impl Default for CohortRules {
    fn default() -> Self {
        Self {
            exam_track_statuses: vec!["exam".to_string()],
            excluded_statuses: vec!["withdrawn".to_string()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineSettings {
    pub timezone: String,
    pub operating_window: OperatingWindow,
    pub weekday_closing_minute: u32,
    pub weekend_closing_minute: u32,
    pub early_bird_band: MinuteBand,
    pub night_owl_band: MinuteBand,
    pub imputation: ImputationSettings,
    pub auto_close: AutoCloseSettings,
    pub cohorts: CohortRules,
}

impl EngineSettings {
    /// Closing time for `date`; a closing minute of 1440 reads as 23:59.
    pub fn closing_time(&self, date: NaiveDate) -> NaiveTime {
        let minute = match date.weekday() {
            Weekday::Sat | Weekday::Sun => self.weekend_closing_minute,
            _ => self.weekday_closing_minute,
        };
        minute_to_time(minute)
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            timezone: "Asia/Tokyo".to_string(),
            operating_window: OperatingWindow::default(),
            weekday_closing_minute: 22 * 60,
            weekend_closing_minute: 18 * 60,
            early_bird_band: MinuteBand::new(4 * 60, 9 * 60),
            night_owl_band: MinuteBand::new(20 * 60, MINUTES_PER_DAY),
            imputation: ImputationSettings::default(),
            auto_close: AutoCloseSettings::default(),
            cohorts: CohortRules::default(),
        }
    }
}

pub fn minute_to_time(minute: u32) -> NaiveTime {
    let minute = minute.min(MINUTES_PER_DAY - 1);
    NaiveTime::from_hms_opt(minute / 60, minute % 60, 0).unwrap_or(NaiveTime::MIN)
}
