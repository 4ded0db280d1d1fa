pub mod auto_close_service;
pub mod badge_ranking_service;
pub mod cohort_index;
pub mod imputation_service;
pub mod monthly_ranking_service;
pub mod nightly_orchestrator;
pub mod ranking_utils;
pub mod settings_service;
pub mod time_series_aggregator;
