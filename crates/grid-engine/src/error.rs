//! Engine error types.

use grid_core::{CoreError, PositionId};
use grid_venue::VenueError;
use thiserror::Error;

/// How a reconciliation failure is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Venue hiccup: the step is abandoned and retried next tick.
    Transient,
    /// Unusable input or venue data: no action this tick.
    Data,
    /// Broken position structure: logged as fatal for the position.
    Invariant,
}

impl ErrorKind {
    /// Metric label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Transient => "transient",
            Self::Data => "data",
            Self::Invariant => "invariant",
        }
    }
}

/// Engine errors.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Venue error: {0}")]
    Venue(#[from] VenueError),

    #[error("Core error: {0}")]
    Core(#[from] CoreError),

    #[error("Data error: {0}")]
    Data(String),

    #[error("Invariant violation on position {position}: {detail}")]
    InvariantViolation { position: PositionId, detail: String },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Venue(e) if e.is_transient() => ErrorKind::Transient,
            Self::Venue(_) => ErrorKind::Data,
            Self::Core(CoreError::EmptyHistory(_)) => ErrorKind::Invariant,
            Self::Core(_) => ErrorKind::Data,
            Self::Data(_) | Self::Config(_) => ErrorKind::Data,
            Self::InvariantViolation { .. } => ErrorKind::Invariant,
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
