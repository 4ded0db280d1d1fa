use std::sync::Arc;

use chrono::NaiveDateTime;
use tracing::info;

use crate::error::AppResult;
use crate::models::nightly::AutoCloseOutcome;
use crate::models::settings::minute_to_time;
use crate::ports::FacilityControl;
use crate::services::settings_service::SettingsService;

/// Closes the configured building once the cutoff has passed. Closing an
/// already-closed building is a no-op reported as `closed: false`.
pub struct AutoCloseService {
    facility: Arc<dyn FacilityControl>,
    settings: Arc<SettingsService>,
}

impl AutoCloseService {
    pub fn new(facility: Arc<dyn FacilityControl>, settings: Arc<SettingsService>) -> Self {
        Self { facility, settings }
    }

    pub fn run(&self, now: NaiveDateTime) -> AppResult<AutoCloseOutcome> {
        let config = self.settings.get()?.auto_close;
        let building = config.building;
        let cutoff = minute_to_time(config.cutoff_minute);

        if now.time() < cutoff {
            return Ok(AutoCloseOutcome {
                building,
                closed: false,
                reason: format!("before cutoff {}", cutoff.format("%H:%M")),
            });
        }

        if !self.facility.is_open(building)? || !self.facility.close(building, now)? {
            return Ok(AutoCloseOutcome {
                building,
                closed: false,
                reason: "already closed".to_string(),
            });
        }

        info!(
            target: "app::nightly",
            building = building.as_str(),
            at = %now,
            "building auto-closed"
        );
        Ok(AutoCloseOutcome {
            building,
            closed: true,
            reason: format!("closed after cutoff {}", cutoff.format("%H:%M")),
        })
    }
}
