//! Core domain types for the grid ladder bot.
//!
//! This crate provides the data model the reconciliation engine owns:
//! - `Price`, `Size`: Precision-safe numeric types
//! - `Order`, `HistoryRecord`: One leg of a rung with its append-only status history
//! - `Position`: A buy/sell order pair sharing a base amount (one rung of the ladder)
//! - `PriceSignal`: Per-tick price statistics supplied by the price feed

pub mod decimal;
pub mod error;
pub mod order;
pub mod position;
pub mod signal;

pub use decimal::{Price, Size};
pub use error::{CoreError, Result};
pub use order::{HistoryRecord, LedgerRef, LegState, Order, OrderId, OrderSide, OrderStatus};
pub use position::{Position, PositionId};
pub use signal::PriceSignal;
