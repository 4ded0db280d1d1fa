pub mod db;
pub mod error;
pub mod models;
pub mod ports;
pub mod services;
pub mod utils;

pub use error::{AppError, AppResult};
