use std::sync::Arc;

use chrono::{NaiveDateTime, Utc};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::nightly::{AutoCloseOutcome, ImputationReport, NightlyReport, StepStatus};
use crate::services::auto_close_service::AutoCloseService;
use crate::services::imputation_service::ImputationService;
use crate::services::settings_service::SettingsService;

const STEP_AUTO_CLOSE: &str = "autoClose";
const STEP_IMPUTATION: &str = "imputation";

/// Runs auto-close and then imputation, in that order, and folds both
/// outcomes into one report. Never returns an error.
pub struct NightlyOrchestrator {
    auto_close: AutoCloseService,
    imputation: Arc<ImputationService>,
    settings: Arc<SettingsService>,
}

impl NightlyOrchestrator {
    pub fn new(
        auto_close: AutoCloseService,
        imputation: Arc<ImputationService>,
        settings: Arc<SettingsService>,
    ) -> Self {
        Self {
            auto_close,
            imputation,
            settings,
        }
    }

    /// Runs for the current wall-clock time in the facility timezone.
    pub async fn run(&self) -> NightlyReport {
        let now = match self.settings.timezone() {
            Ok(tz) => Utc::now().with_timezone(&tz).naive_local(),
            Err(err) => {
                error!(
                    target: "app::nightly",
                    error = %err,
                    "facility timezone unavailable, falling back to UTC"
                );
                Utc::now().naive_utc()
            }
        };
        self.run_at(now).await
    }

    pub async fn run_at(&self, now: NaiveDateTime) -> NightlyReport {
        let run_id = Uuid::new_v4();
        let date = now.date();
        info!(target: "app::nightly", %run_id, %date, "nightly batch started");

        let auto_close: StepStatus<AutoCloseOutcome> = match self.auto_close.run(now) {
            Ok(result) => StepStatus::Completed { result },
            Err(err) => step_failed(STEP_AUTO_CLOSE, &err),
        };

        let imputation: StepStatus<ImputationReport> = match self.imputation.run(date).await {
            Ok(result) => StepStatus::Completed { result },
            Err(err) => step_failed(STEP_IMPUTATION, &err),
        };

        let ok = auto_close.is_completed() || imputation.is_completed();
        let summary = summarize(&auto_close, &imputation);
        if ok {
            let filled = imputation.result().map(|report| report.filled);
            info!(target: "app::nightly", %run_id, ?filled, %summary, "nightly batch finished");
        } else {
            warn!(target: "app::nightly", %run_id, %summary, "nightly batch failed");
        }

        NightlyReport {
            run_id,
            date,
            ok,
            auto_close,
            imputation,
            summary,
        }
    }
}

fn step_failed<T>(step: &str, cause: &AppError) -> StepStatus<T> {
    StepStatus::Failed {
        error: AppError::partial_step_failure(step, cause).to_string(),
    }
}

fn summarize(
    auto_close: &StepStatus<AutoCloseOutcome>,
    imputation: &StepStatus<ImputationReport>,
) -> String {
    let auto_close_line = match auto_close {
        StepStatus::Completed { result } if result.closed => {
            format!("{STEP_AUTO_CLOSE}: closed building {}", result.building.as_str())
        }
        StepStatus::Completed { result } => format!(
            "{STEP_AUTO_CLOSE}: no change for building {} ({})",
            result.building.as_str(),
            result.reason
        ),
        StepStatus::Failed { error } => format!("{STEP_AUTO_CLOSE}: failed ({error})"),
    };

    let imputation_line = match imputation {
        StepStatus::Completed { result } => format!(
            "{STEP_IMPUTATION}: filled {}, notified {}, notification failures {}, skipped {}",
            result.filled, result.notified, result.notification_failures, result.skipped
        ),
        StepStatus::Failed { error } => format!("{STEP_IMPUTATION}: failed ({error})"),
    };

    format!("{auto_close_line}; {imputation_line}")
}
