//! Replayed market prices for paper trading.

use std::path::Path;
use std::str::FromStr;

use grid_core::Price;

use crate::error::{AppError, AppResult};

/// Cycles through a fixed list of prices.
#[derive(Debug, Clone)]
pub struct PriceReplay {
    prices: Vec<Price>,
    cursor: usize,
}

impl PriceReplay {
    pub fn new(prices: Vec<Price>) -> AppResult<Self> {
        if prices.is_empty() {
            return Err(AppError::Replay("no prices to replay".to_string()));
        }
        if let Some(bad) = prices.iter().find(|p| !p.is_positive()) {
            return Err(AppError::Replay(format!("non-positive price {bad}")));
        }
        Ok(Self { prices, cursor: 0 })
    }

    /// Parse one price per line. Blank lines and `#` comments are skipped.
    pub fn parse(content: &str) -> AppResult<Self> {
        let prices = content
            .lines()
            .enumerate()
            .map(|(n, line)| (n + 1, line.trim()))
            .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
            .map(|(n, line)| {
                Price::from_str(line)
                    .map_err(|e| AppError::Replay(format!("line {n}: {e}")))
            })
            .collect::<AppResult<Vec<_>>>()?;
        Self::new(prices)
    }

    pub fn from_file(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            AppError::Replay(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::parse(&content)
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    /// Next price, wrapping to the start after the last one.
    pub fn next_price(&mut self) -> Price {
        let price = self.prices[self.cursor];
        self.cursor = (self.cursor + 1) % self.prices.len();
        price
    }
}
