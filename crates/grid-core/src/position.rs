//! Position (one rung of the ladder).
//!
//! A position pairs a buy order with a sell order over the same base
//! amount. Exactly one leg is in play at a time: the buy leg until it
//! settles, then the sell leg.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::decimal::{Price, Size};
use crate::order::{LedgerRef, LegState, Order, OrderSide, OrderStatus};

/// Position identifier, assigned in creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PositionId(pub u64);

impl fmt::Display for PositionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A buy/sell order pair sharing a base amount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    id: PositionId,
    base_amount: Size,
    buy: Order,
    sell: Order,
    side: OrderSide,
}

impl Position {
    /// Create a new position with the buy leg in play and both legs empty.
    pub fn new(id: PositionId, base_amount: Size) -> Self {
        Self {
            id,
            base_amount,
            buy: Order::new(OrderSide::Buy, base_amount),
            sell: Order::new(OrderSide::Sell, base_amount),
            side: OrderSide::Buy,
        }
    }

    pub fn id(&self) -> PositionId {
        self.id
    }

    pub fn base_amount(&self) -> Size {
        self.base_amount
    }

    /// Side currently in play.
    pub fn side(&self) -> OrderSide {
        self.side
    }

    /// Mark `side` as the leg in play.
    pub fn set_side(&mut self, side: OrderSide) {
        self.side = side;
    }

    pub fn buy_order(&self) -> &Order {
        &self.buy
    }

    pub fn sell_order(&self) -> &Order {
        &self.sell
    }

    pub fn leg(&self, side: OrderSide) -> &Order {
        match side {
            OrderSide::Buy => &self.buy,
            OrderSide::Sell => &self.sell,
        }
    }

    pub fn leg_mut(&mut self, side: OrderSide) -> &mut Order {
        match side {
            OrderSide::Buy => &mut self.buy,
            OrderSide::Sell => &mut self.sell,
        }
    }

    /// The order on the side in play.
    pub fn in_play(&self) -> &Order {
        self.leg(self.side)
    }

    /// Append a history record to the leg addressed by `side`.
    pub fn append(
        &mut self,
        side: OrderSide,
        ledger: LedgerRef,
        timestamp: DateTime<Utc>,
        price: Price,
        status: OrderStatus,
    ) {
        self.leg_mut(side).append(ledger, timestamp, price, status);
    }

    /// Both legs settled: nothing left to reconcile on this rung.
    pub fn is_complete(&self) -> bool {
        self.side == OrderSide::Sell && self.sell.state() == LegState::Settled
    }

    /// Describe the first broken structural invariant, if any.
    ///
    /// - the leg in play must have been entered
    /// - while buying, the sell leg must be empty
    /// - while selling, the buy leg must be settled
    pub fn invariant_violation(&self) -> Option<String> {
        if self.in_play().state() == LegState::Unentered {
            return Some(format!("{} leg in play but never entered", self.side));
        }
        match self.side {
            OrderSide::Buy if self.sell.is_entered() => {
                Some("sell leg entered while buy leg is in play".to_string())
            }
            OrderSide::Sell if self.buy.state() != LegState::Settled => Some(format!(
                "sell leg in play while buy leg is {:?}",
                self.buy.state()
            )),
            _ => None,
        }
    }
}
