use std::path::Path;
use std::sync::RwLock;

use chrono_tz::Tz;
use serde_json::json;
use tracing::{debug, info};

use crate::error::{AppError, AppResult};
use crate::models::settings::{
    AutoCloseSettings, CohortRules, EngineSettings, ImputationSettings, MinuteBand,
    OperatingWindow, MAX_LOOKBACK_DAYS, MINUTES_PER_DAY,
};

#[derive(Debug, Default, Clone)]
pub struct SettingsUpdateInput {
    pub timezone: Option<String>,
    pub operating_window: Option<OperatingWindow>,
    pub weekday_closing_minute: Option<u32>,
    pub weekend_closing_minute: Option<u32>,
    pub early_bird_band: Option<MinuteBand>,
    pub night_owl_band: Option<MinuteBand>,
    pub imputation: Option<ImputationSettings>,
    pub auto_close: Option<AutoCloseSettings>,
    pub cohorts: Option<CohortRules>,
}

#[derive(Debug)]
pub struct SettingsService {
    current: RwLock<EngineSettings>,
}

impl SettingsService {
    pub fn new(settings: EngineSettings) -> AppResult<Self> {
        validate(&settings)?;
        Ok(Self {
            current: RwLock::new(settings),
        })
    }

    /// Parses YAML; omitted keys keep their defaults.
    pub fn from_yaml_str(raw: &str) -> AppResult<Self> {
        let settings: EngineSettings = serde_yaml::from_str(raw)?;
        Self::new(settings)
    }

    pub fn load(path: &Path) -> AppResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        info!(target: "app::settings", path = %path.display(), "loading engine settings");
        Self::from_yaml_str(&raw)
    }

    pub fn get(&self) -> AppResult<EngineSettings> {
        self.current
            .read()
            .map(|guard| guard.clone())
            .map_err(|_| AppError::other("settings lock poisoned"))
    }

    pub fn timezone(&self) -> AppResult<Tz> {
        parse_timezone(&self.get()?.timezone)
    }

    pub fn update(&self, input: SettingsUpdateInput) -> AppResult<EngineSettings> {
        let mut next = self.get()?;

        if let Some(timezone) = input.timezone {
            next.timezone = timezone.trim().to_string();
        }
        if let Some(window) = input.operating_window {
            next.operating_window = window;
        }
        if let Some(minute) = input.weekday_closing_minute {
            next.weekday_closing_minute = minute;
        }
        if let Some(minute) = input.weekend_closing_minute {
            next.weekend_closing_minute = minute;
        }
        if let Some(band) = input.early_bird_band {
            next.early_bird_band = band;
        }
        if let Some(band) = input.night_owl_band {
            next.night_owl_band = band;
        }
        if let Some(imputation) = input.imputation {
            next.imputation = imputation;
        }
        if let Some(auto_close) = input.auto_close {
            next.auto_close = auto_close;
        }
        if let Some(cohorts) = input.cohorts {
            next.cohorts = cohorts;
        }

        validate(&next)?;

        let mut guard = self
            .current
            .write()
            .map_err(|_| AppError::other("settings lock poisoned"))?;
        *guard = next.clone();
        debug!(target: "app::settings", "engine settings updated");
        Ok(next)
    }
}

fn validate(settings: &EngineSettings) -> AppResult<()> {
    parse_timezone(&settings.timezone)?;

    let window = settings.operating_window;
    if window.close_hour > 24 || window.open_hour >= window.close_hour {
        return Err(AppError::validation_with_details(
            "operating window must satisfy open < close <= 24",
            json!({"openHour": window.open_hour, "closeHour": window.close_hour}),
        ));
    }

    ensure_valid_minute("weekdayClosingMinute", settings.weekday_closing_minute)?;
    ensure_valid_minute("weekendClosingMinute", settings.weekend_closing_minute)?;
    ensure_valid_minute("autoClose.cutoffMinute", settings.auto_close.cutoff_minute)?;
    ensure_valid_band("earlyBirdBand", settings.early_bird_band)?;
    ensure_valid_band("nightOwlBand", settings.night_owl_band)?;

    let lookback_days = settings.imputation.lookback_days;
    if !(1..=MAX_LOOKBACK_DAYS).contains(&lookback_days) {
        return Err(AppError::validation_with_details(
            "imputation lookback out of range",
            json!({"lookbackDays": lookback_days, "min": 1, "max": MAX_LOOKBACK_DAYS}),
        ));
    }
    if settings.imputation.fallback_duration_minutes == 0 {
        return Err(AppError::validation(
            "imputation fallback duration must be positive",
        ));
    }

    Ok(())
}

fn parse_timezone(raw: &str) -> AppResult<Tz> {
    raw.parse::<Tz>().map_err(|_| {
        AppError::validation_with_details("unknown timezone", json!({"timezone": raw}))
    })
}

fn ensure_valid_minute(field: &str, minute: u32) -> AppResult<()> {
    if minute > MINUTES_PER_DAY {
        return Err(AppError::validation_with_details(
            "minute of day out of range",
            json!({"field": field, "value": minute}),
        ));
    }
    Ok(())
}

fn ensure_valid_band(field: &str, band: MinuteBand) -> AppResult<()> {
    ensure_valid_minute(field, band.start_minute)?;
    ensure_valid_minute(field, band.end_minute)?;
    if band.start_minute >= band.end_minute {
        return Err(AppError::validation_with_details(
            "band start must be before its end",
            json!({"field": field, "start": band.start_minute, "end": band.end_minute}),
        ));
    }
    Ok(())
}
