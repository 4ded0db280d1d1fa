use chrono::{NaiveDate, NaiveTime};
use serde::Serialize;
use uuid::Uuid;

use crate::models::occupancy::Building;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ImputationDetail {
    pub student_id: String,
    pub date: NaiveDate,
    pub entry_time: NaiveTime,
    pub imputed_exit_time: NaiveTime,
    /// Number of completed sessions the mean was taken from; 0 means the
    /// configured fallback duration was used.
    pub basis_samples: usize,
    pub clamped: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ImputationReport {
    pub date: NaiveDate,
    pub filled: usize,
    pub notified: usize,
    pub notification_failures: usize,
    pub skipped: usize,
    pub details: Vec<ImputationDetail>,
}

impl ImputationReport {
    pub fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            filled: 0,
            notified: 0,
            notification_failures: 0,
            skipped: 0,
            details: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AutoCloseOutcome {
    pub building: Building,
    pub closed: bool,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum StepStatus<T> {
    Completed { result: T },
    Failed { error: String },
}

impl<T> StepStatus<T> {
    pub fn is_completed(&self) -> bool {
        matches!(self, StepStatus::Completed { .. })
    }

    pub fn result(&self) -> Option<&T> {
        match self {
            StepStatus::Completed { result } => Some(result),
            StepStatus::Failed { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NightlyReport {
    pub run_id: Uuid,
    pub date: NaiveDate,
    pub ok: bool,
    pub auto_close: StepStatus<AutoCloseOutcome>,
    pub imputation: StepStatus<ImputationReport>,
    pub summary: String,
}
