//! Read-only ladder snapshot types.
//!
//! Serialized as JSON by the status server.

use chrono::{DateTime, Utc};
use grid_core::{Order, OrderSide, OrderStatus, Position, PositionId, Price, Size};
use serde::Serialize;

/// Latest record of one leg.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LegSnapshot {
    pub price: Price,
    pub status: OrderStatus,
    /// Settlement time for executed legs, placement time for resting ones.
    pub timestamp: DateTime<Utc>,
    pub ledger: u64,
}

impl LegSnapshot {
    /// `None` when the leg was never entered.
    pub fn of(order: &Order) -> Option<Self> {
        order.last_record().ok().map(|r| Self {
            price: r.price,
            status: r.status,
            timestamp: r.timestamp,
            ledger: r.ledger.value(),
        })
    }
}

/// One rung of the ladder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PositionSnapshot {
    pub id: PositionId,
    pub base_amount: Size,
    pub side: OrderSide,
    pub buy: Option<LegSnapshot>,
    pub sell: Option<LegSnapshot>,
    /// Both legs settled and moved out of the reconciled list.
    pub archived: bool,
}

impl PositionSnapshot {
    pub fn of(position: &Position, archived: bool) -> Self {
        Self {
            id: position.id(),
            base_amount: position.base_amount(),
            side: position.side(),
            buy: LegSnapshot::of(position.buy_order()),
            sell: LegSnapshot::of(position.sell_order()),
            archived,
        }
    }
}

/// Full ladder state after a tick.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LadderSnapshot {
    /// Ticks completed by the engine.
    pub tick: u64,
    /// When the snapshot was taken.
    pub taken_at: Option<DateTime<Utc>>,
    /// Market price seen on the last tick.
    pub current_price: Option<Price>,
    /// Reprice threshold computed on the last tick.
    pub threshold: Option<Price>,
    /// Positions in creation order, archived ones included.
    pub positions: Vec<PositionSnapshot>,
    /// Rungs waiting for a placement retry.
    pub pending_rungs: usize,
}

impl LadderSnapshot {
    pub fn resting_count(&self) -> usize {
        self.positions
            .iter()
            .filter(|p| {
                let leg = match p.side {
                    OrderSide::Buy => &p.buy,
                    OrderSide::Sell => &p.sell,
                };
                leg.as_ref()
                    .is_some_and(|l| l.status == OrderStatus::Open)
            })
            .count()
    }
}
