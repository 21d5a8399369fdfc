//! Order-related types and identifiers.
//!
//! An `Order` is one leg of a rung. Its status lives entirely in an
//! append-only history; the last record is authoritative.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::decimal::{Price, Size};
use crate::error::{CoreError, Result};

/// Order side: buy or sell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    /// Lowercase label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Buy => "buy",
            Self::Sell => "sell",
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status carried by a history record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    /// Resting on the venue, unfilled.
    Open,
    /// Filled.
    Executed,
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Executed => write!(f, "executed"),
        }
    }
}

/// Ledger (sequence) number of the venue event that produced a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LedgerRef(pub u64);

impl LedgerRef {
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for LedgerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Remote order identifier assigned by the venue.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(String);

impl OrderId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One entry in an order's status history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRecord {
    /// Ledger that placed, repriced, or settled the order.
    pub ledger: LedgerRef,
    /// Placement time for `open`, ledger settlement time for `executed`.
    pub timestamp: DateTime<Utc>,
    /// Limit price at the time of the record.
    pub price: Price,
    pub status: OrderStatus,
}

/// Reconciliation state of a single leg, derived from its history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LegState {
    /// Never placed (empty history).
    Unentered,
    /// Last record is `open`.
    Resting,
    /// Last record is `executed`.
    Settled,
}

/// One side (buy or sell) of a position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    side: OrderSide,
    base_amount: Size,
    order_id: Option<OrderId>,
    history: Vec<HistoryRecord>,
}

impl Order {
    /// Create an unplaced order with no history.
    pub fn new(side: OrderSide, base_amount: Size) -> Self {
        Self {
            side,
            base_amount,
            order_id: None,
            history: Vec::new(),
        }
    }

    pub fn side(&self) -> OrderSide {
        self.side
    }

    pub fn base_amount(&self) -> Size {
        self.base_amount
    }

    /// Remote order id, `None` until the venue has assigned one.
    pub fn order_id(&self) -> Option<&OrderId> {
        self.order_id.as_ref()
    }

    pub fn set_order_id(&mut self, order_id: Option<OrderId>) {
        self.order_id = order_id;
    }

    pub fn history(&self) -> &[HistoryRecord] {
        &self.history
    }

    /// Append a history record.
    ///
    /// No validation is performed: the caller is trusted to pass a
    /// non-decreasing ledger reference.
    pub fn append(
        &mut self,
        ledger: LedgerRef,
        timestamp: DateTime<Utc>,
        price: Price,
        status: OrderStatus,
    ) {
        self.history.push(HistoryRecord {
            ledger,
            timestamp,
            price,
            status,
        });
    }

    /// Whether this leg has been placed at least once.
    pub fn is_entered(&self) -> bool {
        !self.history.is_empty()
    }

    /// Most recent history record.
    pub fn last_record(&self) -> Result<&HistoryRecord> {
        self.history
            .last()
            .ok_or(CoreError::EmptyHistory(self.side))
    }

    pub fn last_status(&self) -> Result<OrderStatus> {
        self.last_record().map(|r| r.status)
    }

    pub fn last_price(&self) -> Result<Price> {
        self.last_record().map(|r| r.price)
    }

    pub fn state(&self) -> LegState {
        match self.history.last() {
            None => LegState::Unentered,
            Some(r) if r.status == OrderStatus::Open => LegState::Resting,
            Some(_) => LegState::Settled,
        }
    }
}
