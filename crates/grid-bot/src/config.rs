//! Application configuration.

use std::fmt;
use std::time::Duration;

use grid_engine::GridConfig;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

/// Top-level configuration, loaded from TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Ladder tuning.
    #[serde(default)]
    pub grid: GridConfig,

    /// Traded pair.
    #[serde(default)]
    pub pair: PairConfig,

    /// Paper venue and market replay.
    #[serde(default)]
    pub paper: PaperConfig,

    /// Price statistics window.
    #[serde(default)]
    pub feed: FeedConfig,

    /// HTTP status server.
    #[serde(default)]
    pub status: StatusConfig,
}

/// Base/counter asset codes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PairConfig {
    /// Asset the ladder buys and sells.
    #[serde(default = "default_base_asset")]
    pub base_asset: String,
    /// Asset prices are quoted in and rungs are funded from.
    #[serde(default = "default_counter_asset")]
    pub counter_asset: String,
}

fn default_base_asset() -> String {
    "XLM".to_string()
}

fn default_counter_asset() -> String {
    "USDC".to_string()
}

impl Default for PairConfig {
    fn default() -> Self {
        Self {
            base_asset: default_base_asset(),
            counter_asset: default_counter_asset(),
        }
    }
}

impl fmt::Display for PairConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base_asset, self.counter_asset)
    }
}

/// Paper venue settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaperConfig {
    /// Initial base asset balance.
    #[serde(default)]
    pub base_balance: Decimal,

    /// Initial counter asset balance.
    #[serde(default = "default_counter_balance")]
    pub counter_balance: Decimal,

    /// Price file replayed as the market, one price per line.
    #[serde(default = "default_price_path")]
    pub price_path: String,

    /// Delay between replayed prices in milliseconds.
    #[serde(default = "default_price_interval_ms")]
    pub price_interval_ms: u64,
}

fn default_counter_balance() -> Decimal {
    Decimal::from(10_000)
}

fn default_price_path() -> String {
    "config/prices.txt".to_string()
}

fn default_price_interval_ms() -> u64 {
    500
}

impl Default for PaperConfig {
    fn default() -> Self {
        Self {
            base_balance: Decimal::ZERO,
            counter_balance: default_counter_balance(),
            price_path: default_price_path(),
            price_interval_ms: default_price_interval_ms(),
        }
    }
}

impl PaperConfig {
    pub fn price_interval(&self) -> Duration {
        Duration::from_millis(self.price_interval_ms)
    }
}

/// Rolling price window settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FeedConfig {
    /// Prices kept for the mean and standard deviation.
    #[serde(default = "default_window")]
    pub window: usize,

    /// Prices required before the first tick runs.
    #[serde(default = "default_min_samples")]
    pub min_samples: usize,
}

fn default_window() -> usize {
    20
}

fn default_min_samples() -> usize {
    5
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            window: default_window(),
            min_samples: default_min_samples(),
        }
    }
}

/// Status server settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_true() -> bool {
    true
}

fn default_port() -> u16 {
    8080
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            port: default_port(),
        }
    }
}

impl AppConfig {
    /// Load and validate a TOML file.
    pub fn from_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read config: {e}")))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> AppResult<()> {
        self.grid.validate()?;

        if self.pair.base_asset.is_empty() || self.pair.counter_asset.is_empty() {
            return Err(AppError::Config("asset codes must not be empty".to_string()));
        }
        if self.pair.base_asset == self.pair.counter_asset {
            return Err(AppError::Config(format!(
                "base and counter asset are both {}",
                self.pair.base_asset
            )));
        }
        if self.paper.base_balance < Decimal::ZERO || self.paper.counter_balance < Decimal::ZERO {
            return Err(AppError::Config(
                "paper balances must not be negative".to_string(),
            ));
        }
        if self.paper.price_interval_ms == 0 {
            return Err(AppError::Config(
                "paper.price_interval_ms must be non-zero".to_string(),
            ));
        }
        if self.feed.window < 2 {
            return Err(AppError::Config(format!(
                "feed.window must be at least 2, got {}",
                self.feed.window
            )));
        }
        if self.feed.min_samples == 0 || self.feed.min_samples > self.feed.window {
            return Err(AppError::Config(format!(
                "feed.min_samples must be in 1..={}, got {}",
                self.feed.window, self.feed.min_samples
            )));
        }
        Ok(())
    }
}
