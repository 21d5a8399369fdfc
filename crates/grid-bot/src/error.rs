//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Engine error: {0}")]
    Engine(#[from] grid_engine::EngineError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] grid_telemetry::TelemetryError),

    #[error("Price replay error: {0}")]
    Replay(String),

    #[error("Task error: {0}")]
    Task(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type AppResult<T> = Result<T, AppError>;
