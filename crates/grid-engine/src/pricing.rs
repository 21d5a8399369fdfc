//! Ladder price calculation.
//!
//! Pure functions over the per-tick price signal. Every computed limit
//! price is rounded to the venue precision before it leaves this module.

use grid_core::{Price, PriceSignal, Size};
use rust_decimal::Decimal;

/// Reprice threshold and rung spacing for one tick:
/// `interval_percent * (2 * std_dev / 100)`.
pub fn reprice_threshold(std_dev: Decimal, interval_percent: Decimal) -> Price {
    Price::new(interval_percent * (Decimal::TWO * std_dev / Decimal::ONE_HUNDRED))
}

/// Counter units committed to a new rung.
pub fn rung_capital(counter_balance: Decimal, capital_percent: Decimal) -> Decimal {
    counter_balance * capital_percent / Decimal::ONE_HUNDRED
}

/// Base amount a rung buys at `price`, rounded toward zero.
///
/// `None` when the price or the resulting amount is not positive.
pub fn rung_base_amount(capital: Decimal, price: Price, precision: u32) -> Option<Size> {
    Size::from_notional(capital, price)
        .map(|size| size.round_dp(precision))
        .filter(Size::is_positive)
}

/// Prices for one tick of the ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LadderPricing {
    current: Price,
    threshold: Price,
    precision: u32,
}

impl LadderPricing {
    pub fn new(signal: &PriceSignal, interval_percent: Decimal, precision: u32) -> Self {
        Self {
            current: signal.current_price,
            threshold: reprice_threshold(signal.price_std_dev, interval_percent),
            precision,
        }
    }

    pub fn current(&self) -> Price {
        self.current
    }

    pub fn threshold(&self) -> Price {
        self.threshold
    }

    /// Whether the threshold vanishes at the venue precision. Rung prices
    /// would then collapse onto the market and onto each other.
    pub fn is_degenerate(&self) -> bool {
        !self.round(self.threshold).is_positive()
    }

    fn round(&self, price: Price) -> Price {
        price.round_dp(self.precision)
    }

    /// Amount rounded to the venue precision.
    pub fn round_amount(&self, amount: Size) -> Size {
        amount.round_dp(self.precision)
    }

    /// Buy price one threshold under the market. Used for the first rung
    /// and for repricing a resting buy.
    pub fn entry_buy(&self) -> Price {
        self.round(self.current - self.threshold)
    }

    /// Whether a resting buy has drifted strictly further than the threshold.
    pub fn needs_reprice(&self, resting: Price) -> bool {
        self.current.distance(resting) > self.threshold
    }

    /// Sell price for a settled buy: above both the fill and the market.
    pub fn exit_sell(&self, buy_fill: Price) -> Price {
        self.round(buy_fill.max(self.current) + self.threshold)
    }

    /// Next rung after a buy fill: below both the fill and the market.
    pub fn next_buy_after_buy(&self, buy_fill: Price) -> Price {
        self.round(buy_fill.min(self.current) - self.threshold)
    }

    /// Next rung after a sell fill.
    pub fn next_buy_after_sell(&self, sell_fill: Price) -> Price {
        self.round(sell_fill - self.threshold)
    }
}
