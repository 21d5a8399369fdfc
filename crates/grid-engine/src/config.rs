//! Grid ladder configuration.

use std::time::Duration;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

/// Ladder tuning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GridConfig {
    /// Multiplier applied to two standard deviations (as a percent of
    /// price) to get the reprice threshold and the rung spacing.
    #[serde(default = "default_price_interval_percent")]
    pub price_interval_percent: Decimal,

    /// Percent of the counter balance committed to each new rung.
    #[serde(default = "default_trading_capital_percent")]
    pub trading_capital_percent: Decimal,

    /// Reconciliation tick interval in milliseconds.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Decimal places for submitted prices and amounts.
    #[serde(default = "default_price_precision")]
    pub price_precision: u32,

    /// Move rungs with both legs settled to the archive after each tick.
    #[serde(default)]
    pub archive_completed: bool,
}

fn default_price_interval_percent() -> Decimal {
    Decimal::ONE
}

fn default_trading_capital_percent() -> Decimal {
    Decimal::ONE
}

fn default_tick_interval_ms() -> u64 {
    1000
}

fn default_price_precision() -> u32 {
    7
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            price_interval_percent: default_price_interval_percent(),
            trading_capital_percent: default_trading_capital_percent(),
            tick_interval_ms: default_tick_interval_ms(),
            price_precision: default_price_precision(),
            archive_completed: false,
        }
    }
}

impl GridConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Reject settings the ladder cannot run with.
    pub fn validate(&self) -> EngineResult<()> {
        if self.price_interval_percent <= Decimal::ZERO {
            return Err(EngineError::Config(format!(
                "price_interval_percent must be positive, got {}",
                self.price_interval_percent
            )));
        }
        if self.trading_capital_percent <= Decimal::ZERO
            || self.trading_capital_percent > Decimal::ONE_HUNDRED
        {
            return Err(EngineError::Config(format!(
                "trading_capital_percent must be in (0, 100], got {}",
                self.trading_capital_percent
            )));
        }
        if self.tick_interval_ms == 0 {
            return Err(EngineError::Config(
                "tick_interval_ms must be non-zero".to_string(),
            ));
        }
        if self.price_precision > 18 {
            return Err(EngineError::Config(format!(
                "price_precision too large: {}",
                self.price_precision
            )));
        }
        Ok(())
    }
}
