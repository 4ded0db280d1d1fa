use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ExitSource {
    Logged,
    Imputed,
}

impl ExitSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExitSource::Logged => "logged",
            ExitSource::Imputed => "imputed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "logged" => Some(ExitSource::Logged),
            "imputed" => Some(ExitSource::Imputed),
            _ => None,
        }
    }
}

/// Identifies one visit: a student may enter more than once on a date.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordKey {
    pub student_id: String,
    pub date: NaiveDate,
    pub entry_time: NaiveTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub student_id: String,
    pub date: NaiveDate,
    pub entry_time: NaiveTime,
    #[serde(default)]
    pub exit_time: Option<NaiveTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_source: Option<ExitSource>,
}

impl AttendanceRecord {
    pub fn open(student_id: impl Into<String>, date: NaiveDate, entry_time: NaiveTime) -> Self {
        Self {
            student_id: student_id.into(),
            date,
            entry_time,
            exit_time: None,
            exit_source: None,
        }
    }

    pub fn completed(
        student_id: impl Into<String>,
        date: NaiveDate,
        entry_time: NaiveTime,
        exit_time: NaiveTime,
    ) -> Self {
        Self {
            student_id: student_id.into(),
            date,
            entry_time,
            exit_time: Some(exit_time),
            exit_source: Some(ExitSource::Logged),
        }
    }

    pub fn key(&self) -> RecordKey {
        RecordKey {
            student_id: self.student_id.clone(),
            date: self.date,
            entry_time: self.entry_time,
        }
    }

    pub fn is_open(&self) -> bool {
        self.exit_time.is_none()
    }

    pub fn is_imputed(&self) -> bool {
        matches!(self.exit_source, Some(ExitSource::Imputed))
    }

    /// Session length in whole minutes. `None` for open records and for
    /// rows whose exit precedes the entry.
    pub fn duration_minutes(&self) -> Option<i64> {
        let exit = self.exit_time?;
        let minutes = (exit - self.entry_time).num_minutes();
        if minutes < 0 {
            None
        } else {
            Some(minutes)
        }
    }
}
