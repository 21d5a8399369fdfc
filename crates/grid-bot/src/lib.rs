//! Grid ladder bot application.
//!
//! Wires the engine to the paper venue, a replayed price feed and the
//! status server.

pub mod app;
pub mod config;
pub mod error;
pub mod replay;
pub mod status;

pub use app::Application;
pub use config::AppConfig;
pub use error::{AppError, AppResult};
