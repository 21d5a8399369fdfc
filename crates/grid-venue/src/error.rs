//! Venue error types.

use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum VenueError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Transaction rejected: {0}")]
    Rejected(String),

    #[error("Insufficient balance: required {required}, available {available}")]
    InsufficientBalance { required: Decimal, available: Decimal },

    #[error("Malformed venue response: {0}")]
    MalformedResponse(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl VenueError {
    /// Transient failures leave remote state unchanged and are retried on
    /// the next tick. The rest are data errors.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Network(_)
                | Self::Timeout(_)
                | Self::Rejected(_)
                | Self::InsufficientBalance { .. }
        )
    }
}

pub type VenueResult<T> = Result<T, VenueError>;
