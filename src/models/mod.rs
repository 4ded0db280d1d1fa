pub mod attendance;
pub mod badge;
pub mod nightly;
pub mod occupancy;
pub mod ranking;
pub mod settings;
pub mod student;
