use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{Duration, NaiveDate, NaiveTime};
use tracing::{debug, info, warn};

use crate::error::AppResult;
use crate::models::attendance::AttendanceRecord;
use crate::models::nightly::{ImputationDetail, ImputationReport};
use crate::models::settings::EngineSettings;
use crate::ports::{Notifier, RecordStore};
use crate::services::settings_service::SettingsService;

/// Exit time chosen for one open record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitPlan {
    pub exit_time: NaiveTime,
    pub basis_samples: usize,
    pub clamped: bool,
}

/// Fills missing exit timestamps from each student's recent mean session
/// length. Safe to re-run for the same date: only rows whose exit is still
/// absent at write time are touched.
pub struct ImputationService {
    store: Arc<dyn RecordStore>,
    notifier: Arc<dyn Notifier>,
    settings: Arc<SettingsService>,
}

impl ImputationService {
    pub fn new(
        store: Arc<dyn RecordStore>,
        notifier: Arc<dyn Notifier>,
        settings: Arc<SettingsService>,
    ) -> Self {
        Self {
            store,
            notifier,
            settings,
        }
    }

    /// Rows are processed student by student and each student is notified
    /// as soon as their rows are written. A store failure aborts the run,
    /// but students whose rows were already written still get their notice.
    pub async fn run(&self, date: NaiveDate) -> AppResult<ImputationReport> {
        let settings = self.settings.get()?;
        let mut report = ImputationReport::empty(date);

        let open = self.store.open_records_on(date)?;
        if open.is_empty() {
            debug!(target: "app::imputation", %date, "no open records");
            return Ok(report);
        }

        let mut by_student: BTreeMap<String, Vec<AttendanceRecord>> = BTreeMap::new();
        for record in open {
            by_student
                .entry(record.student_id.clone())
                .or_default()
                .push(record);
        }

        for (student_id, mut records) in by_student {
            records.sort_by_key(|record| record.entry_time);
            let mut exits = Vec::new();
            let outcome =
                self.fill_student(&student_id, records, &settings, &mut exits, &mut report);

            if !exits.is_empty() {
                self.notify(&student_id, date, &exits, &mut report).await;
            }

            if let Err(err) = outcome {
                warn!(
                    target: "app::imputation",
                    %date,
                    %student_id,
                    filled = report.filled,
                    notified = report.notified,
                    error = %err,
                    "imputation aborted"
                );
                return Err(err);
            }
        }

        info!(
            target: "app::imputation",
            %date,
            filled = report.filled,
            notified = report.notified,
            notification_failures = report.notification_failures,
            skipped = report.skipped,
            "imputation finished"
        );
        Ok(report)
    }

    /// Writes imputed exits for one student's open rows. `exits` collects
    /// every exit actually written, even when a later row fails.
    fn fill_student(
        &self,
        student_id: &str,
        records: Vec<AttendanceRecord>,
        settings: &EngineSettings,
        exits: &mut Vec<NaiveTime>,
        report: &mut ImputationReport,
    ) -> AppResult<()> {
        let date = report.date;
        let closing = settings.closing_time(date);
        let mut eligible = Vec::with_capacity(records.len());
        for record in records {
            if record.entry_time >= closing {
                warn!(
                    target: "app::imputation",
                    %student_id,
                    %date,
                    entry = %record.entry_time,
                    %closing,
                    "entry at or after closing time; left open"
                );
                report.skipped += 1;
            } else {
                eligible.push(record);
            }
        }
        if eligible.is_empty() {
            return Ok(());
        }

        let history = self.store.student_history(
            student_id,
            date,
            settings.imputation.lookback_days,
        )?;
        let durations = completed_durations(&history);

        for record in eligible {
            let plan = plan_exit(
                record.entry_time,
                &durations,
                settings.imputation.fallback_duration_minutes,
                closing,
            );
            if !self.store.write_imputed_exit(&record.key(), plan.exit_time)? {
                debug!(
                    target: "app::imputation",
                    %student_id,
                    %date,
                    entry = %record.entry_time,
                    "row no longer open at write time"
                );
                continue;
            }

            report.filled += 1;
            exits.push(plan.exit_time);
            report.details.push(ImputationDetail {
                student_id: record.student_id,
                date,
                entry_time: record.entry_time,
                imputed_exit_time: plan.exit_time,
                basis_samples: plan.basis_samples,
                clamped: plan.clamped,
            });
        }
        Ok(())
    }

    async fn notify(
        &self,
        student_id: &str,
        date: NaiveDate,
        exits: &[NaiveTime],
        report: &mut ImputationReport,
    ) {
        let message = notification_message(date, exits);
        match self.notifier.push(student_id, &message).await {
            Ok(()) => report.notified += 1,
            Err(err) => {
                warn!(
                    target: "app::imputation",
                    %student_id,
                    error = %err,
                    "imputation notice not delivered"
                );
                report.notification_failures += 1;
            }
        }
    }
}

/// Mean of the history when there is any, else the fallback; never past
/// `closing`.
pub fn plan_exit(
    entry: NaiveTime,
    history_minutes: &[i64],
    fallback_minutes: u32,
    closing: NaiveTime,
) -> ExitPlan {
    let basis_samples = history_minutes.len();
    let minutes = if basis_samples == 0 {
        fallback_minutes as i64
    } else {
        let total: i64 = history_minutes.iter().sum();
        (total as f64 / basis_samples as f64).round() as i64
    };

    let (candidate, wrapped_secs) = entry.overflowing_add_signed(Duration::minutes(minutes));
    if wrapped_secs != 0 || candidate > closing {
        ExitPlan {
            exit_time: closing,
            basis_samples,
            clamped: true,
        }
    } else {
        ExitPlan {
            exit_time: candidate,
            basis_samples,
            clamped: false,
        }
    }
}

fn completed_durations(history: &[AttendanceRecord]) -> Vec<i64> {
    history
        .iter()
        .filter_map(AttendanceRecord::duration_minutes)
        .collect()
}

fn notification_message(date: NaiveDate, exits: &[NaiveTime]) -> String {
    let times: Vec<String> = exits
        .iter()
        .map(|time| time.format("%H:%M").to_string())
        .collect();
    format!(
        "No exit was recorded for your visit on {date}. It has been set to {} based on your recent visits. Please let staff know if this is wrong.",
        times.join(", ")
    )
}
