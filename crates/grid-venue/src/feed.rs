//! Price feed capability.

use std::collections::VecDeque;

use grid_core::{Price, PriceSignal};
use parking_lot::Mutex;
use rust_decimal::prelude::MathematicalOps;
use rust_decimal::Decimal;

/// Source of the per-tick price signal.
pub trait PriceFeed: Send + Sync {
    /// Latest statistics, or `None` until enough data has arrived.
    fn latest(&self) -> Option<PriceSignal>;
}

/// Rolling window over pushed trade prices.
///
/// Reports the newest price as current, with the arithmetic mean and the
/// population standard deviation of the window.
#[derive(Debug)]
pub struct RollingPriceFeed {
    window: usize,
    min_samples: usize,
    prices: Mutex<VecDeque<Price>>,
}

impl RollingPriceFeed {
    pub fn new(window: usize) -> Self {
        let window = window.max(1);
        Self {
            window,
            min_samples: 1,
            prices: Mutex::new(VecDeque::with_capacity(window)),
        }
    }

    /// Withhold the signal until `min_samples` prices have been pushed
    /// (clamped to the window size).
    pub fn with_min_samples(mut self, min_samples: usize) -> Self {
        self.min_samples = min_samples.clamp(1, self.window);
        self
    }

    /// Record a trade price, evicting the oldest sample when full.
    pub fn push(&self, price: Price) {
        let mut prices = self.prices.lock();
        if prices.len() >= self.window {
            prices.pop_front();
        }
        prices.push_back(price);
    }

    pub fn len(&self) -> usize {
        self.prices.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.lock().is_empty()
    }
}

impl PriceFeed for RollingPriceFeed {
    fn latest(&self) -> Option<PriceSignal> {
        let prices = self.prices.lock();
        if prices.len() < self.min_samples {
            return None;
        }
        let current = *prices.back()?;
        let n = Decimal::from(prices.len() as u64);

        let mean = prices.iter().map(Price::inner).sum::<Decimal>() / n;
        let variance = prices
            .iter()
            .map(|p| {
                let d = p.inner() - mean;
                d * d
            })
            .sum::<Decimal>()
            / n;
        let std_dev = variance.sqrt()?;

        Some(PriceSignal::new(current, Price::new(mean), std_dev))
    }
}
