pub mod calendar;
pub mod logger;
pub mod stats;
