//! Per-tick price statistics.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::decimal::Price;

/// Latest price statistics read once per tick from the price feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceSignal {
    pub current_price: Price,
    /// Rolling mean of recent trade prices.
    pub mean_price: Price,
    /// Rolling standard deviation of recent trade prices.
    pub price_std_dev: Decimal,
}

impl PriceSignal {
    pub fn new(current_price: Price, mean_price: Price, price_std_dev: Decimal) -> Self {
        Self {
            current_price,
            mean_price,
            price_std_dev,
        }
    }

    /// A signal the engine can act on: positive price, non-negative deviation.
    pub fn is_usable(&self) -> bool {
        self.current_price.is_positive() && !self.price_std_dev.is_sign_negative()
    }
}
