//! Error types for grid-core.

use thiserror::Error;

use crate::order::OrderSide;

/// Core error types.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Empty history: {0} leg has never been entered")]
    EmptyHistory(OrderSide),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
