use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::{error, warn};

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("invalid range: {message}")]
    InvalidRange { message: String },

    #[error("unknown student referenced by record: {student_id}")]
    MissingReferenceData { student_id: String },

    #[error("record store unavailable: {message}")]
    StoreUnavailable { message: String },

    #[error("step `{step}` failed: {message}")]
    PartialStepFailure { step: String, message: String },

    #[error("validation failed: {message}")]
    Validation {
        message: String,
        details: Option<JsonValue>,
    },

    #[error("record not found")]
    NotFound,

    #[error("notification to {student_id} failed: {message}")]
    Notification { student_id: String, message: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("config error: {0}")]
    Config(#[from] serde_yaml::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl AppError {
    pub fn invalid_range(message: impl Into<String>) -> Self {
        let message = message.into();
        warn!(target: "app::validation", %message, "invalid range");
        AppError::InvalidRange { message }
    }

    pub fn missing_reference(student_id: impl Into<String>) -> Self {
        let student_id = student_id.into();
        warn!(target: "app::registry", %student_id, "record references unknown student");
        AppError::MissingReferenceData { student_id }
    }

    pub fn store_unavailable(message: impl Into<String>) -> Self {
        let message = message.into();
        error!(target: "app::store", %message, "record store unavailable");
        AppError::StoreUnavailable { message }
    }

    /// Wraps a sub-step error for the nightly report. Never returned from
    /// the orchestrator itself.
    pub fn partial_step_failure(step: impl Into<String>, cause: &AppError) -> Self {
        let step = step.into();
        let message = cause.to_string();
        warn!(target: "app::nightly", %step, %message, "nightly step failed");
        AppError::PartialStepFailure { step, message }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        let message = message.into();
        warn!(target: "app::validation", %message, "validation error");
        AppError::Validation {
            message,
            details: None,
        }
    }

    pub fn validation_with_details(message: impl Into<String>, details: JsonValue) -> Self {
        let message = message.into();
        warn!(target: "app::validation", %message, details = %details, "validation error with details");
        AppError::Validation {
            message,
            details: Some(details),
        }
    }

    pub fn not_found() -> Self {
        warn!(target: "app::store", "resource not found");
        AppError::NotFound
    }

    pub fn notification(student_id: impl Into<String>, message: impl Into<String>) -> Self {
        let student_id = student_id.into();
        let message = message.into();
        warn!(target: "app::notify", %student_id, %message, "notification dispatch failed");
        AppError::Notification {
            student_id,
            message,
        }
    }

    pub fn other(message: impl Into<String>) -> Self {
        let message = message.into();
        error!(target: "app::other", %message, "other error");
        AppError::Other(message)
    }

    pub fn validation_details(&self) -> Option<&JsonValue> {
        match self {
            AppError::Validation { details, .. } => details.as_ref(),
            _ => None,
        }
    }

    /// Fatal errors abort the current request. Everything else is either a
    /// caller mistake or a per-record anomaly.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            AppError::StoreUnavailable { .. } | AppError::Io(_) | AppError::Other(_)
        )
    }
}

impl From<rusqlite::Error> for AppError {
    fn from(error: rusqlite::Error) -> Self {
        use rusqlite::Error::QueryReturnedNoRows;

        match &error {
            QueryReturnedNoRows => AppError::not_found(),
            _ => AppError::store_unavailable(format!("sqlite: {error}")),
        }
    }
}
