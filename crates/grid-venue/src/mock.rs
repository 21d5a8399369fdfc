//! Mock venue client for testing.
//!
//! Records every call and lets tests script fills, failures and
//! immediately-crossing submissions.

use std::collections::{HashMap, HashSet, VecDeque};

use chrono::{DateTime, Duration, Utc};
use grid_core::{LedgerRef, OrderId, OrderSide, Price, Size};
use parking_lot::Mutex;
use rust_decimal::Decimal;

use crate::client::{BoxFuture, OrderReceipt, VenueClient};
use crate::error::{VenueError, VenueResult};

/// Seconds between consecutive mock ledgers.
const LEDGER_CLOSE_SECS: i64 = 5;

/// Venue operation kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VenueOp {
    Place,
    Reprice,
    IsOpen,
    SettlementTime,
    Balance,
}

/// A recorded venue call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VenueCall {
    Place {
        amount: Size,
        price: Price,
        side: OrderSide,
    },
    Reprice {
        order_id: OrderId,
        amount: Size,
        new_price: Price,
    },
    IsOpen(OrderId),
    SettlementTime(LedgerRef),
    Balance,
}

impl VenueCall {
    pub fn op(&self) -> VenueOp {
        match self {
            Self::Place { .. } => VenueOp::Place,
            Self::Reprice { .. } => VenueOp::Reprice,
            Self::IsOpen(_) => VenueOp::IsOpen,
            Self::SettlementTime(_) => VenueOp::SettlementTime,
            Self::Balance => VenueOp::Balance,
        }
    }
}

#[derive(Debug)]
struct MockState {
    next_ledger: u64,
    next_order: u64,
    open_orders: HashSet<OrderId>,
    balance: Decimal,
    calls: Vec<VenueCall>,
    failures: HashMap<VenueOp, VecDeque<VenueError>>,
    failing_orders: HashMap<OrderId, VenueError>,
    cross_next: u32,
}

impl MockState {
    fn take_failure(&mut self, op: VenueOp) -> Option<VenueError> {
        self.failures.get_mut(&op).and_then(VecDeque::pop_front)
    }

    fn next_ledger(&mut self) -> LedgerRef {
        self.next_ledger += 1;
        LedgerRef(self.next_ledger)
    }

    fn take_cross(&mut self) -> bool {
        if self.cross_next > 0 {
            self.cross_next -= 1;
            true
        } else {
            false
        }
    }
}

/// Mock venue client.
#[derive(Debug)]
pub struct MockVenueClient {
    state: Mutex<MockState>,
    epoch: DateTime<Utc>,
}

impl Default for MockVenueClient {
    fn default() -> Self {
        Self::new(Decimal::from(1000))
    }
}

impl MockVenueClient {
    /// Create a mock with the given counter-asset balance.
    pub fn new(balance: Decimal) -> Self {
        Self {
            state: Mutex::new(MockState {
                next_ledger: 0,
                next_order: 0,
                open_orders: HashSet::new(),
                balance,
                calls: Vec::new(),
                failures: HashMap::new(),
                failing_orders: HashMap::new(),
                cross_next: 0,
            }),
            epoch: DateTime::from_timestamp(1_700_000_000, 0).unwrap_or_default(),
        }
    }

    /// Close time the mock reports for `ledger`.
    pub fn ledger_time(&self, ledger: LedgerRef) -> DateTime<Utc> {
        self.epoch + Duration::seconds(ledger.value() as i64 * LEDGER_CLOSE_SECS)
    }

    /// Remove the order from the book. Returns false if it was not resting.
    pub fn fill(&self, order_id: &OrderId) -> bool {
        self.state.lock().open_orders.remove(order_id)
    }

    /// Resting order ids, sorted.
    pub fn open_orders(&self) -> Vec<OrderId> {
        let mut ids: Vec<_> = self.state.lock().open_orders.iter().cloned().collect();
        ids.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        ids
    }

    /// Queue an error for the next call of `op`.
    pub fn fail_next(&self, op: VenueOp, error: VenueError) {
        self.state
            .lock()
            .failures
            .entry(op)
            .or_default()
            .push_back(error);
    }

    /// Make every `is_order_open` query for `order_id` fail until cleared.
    pub fn fail_order(&self, order_id: OrderId, error: VenueError) {
        self.state.lock().failing_orders.insert(order_id, error);
    }

    pub fn clear_order_failure(&self, order_id: &OrderId) {
        self.state.lock().failing_orders.remove(order_id);
    }

    /// The next `n` placements or reprices execute on submission.
    pub fn cross_next(&self, n: u32) {
        self.state.lock().cross_next = n;
    }

    /// Recorded calls, oldest first.
    pub fn calls(&self) -> Vec<VenueCall> {
        self.state.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    pub fn count(&self, op: VenueOp) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|c| c.op() == op)
            .count()
    }

    /// Number of calls that change remote state (placements and reprices).
    pub fn mutating_calls(&self) -> usize {
        self.count(VenueOp::Place) + self.count(VenueOp::Reprice)
    }

    fn do_place(&self, amount: Size, price: Price, side: OrderSide) -> VenueResult<OrderReceipt> {
        let mut state = self.state.lock();
        state.calls.push(VenueCall::Place {
            amount,
            price,
            side,
        });
        if let Some(err) = state.take_failure(VenueOp::Place) {
            return Err(err);
        }

        let ledger = state.next_ledger();
        let order_id = if state.take_cross() {
            None
        } else {
            state.next_order += 1;
            let id = OrderId::new(format!("offer-{}", state.next_order));
            state.open_orders.insert(id.clone());
            Some(id)
        };
        Ok(OrderReceipt {
            ledger,
            timestamp: self.ledger_time(ledger),
            order_id,
        })
    }

    fn do_reprice(
        &self,
        order_id: &OrderId,
        amount: Size,
        new_price: Price,
    ) -> VenueResult<OrderReceipt> {
        let mut state = self.state.lock();
        state.calls.push(VenueCall::Reprice {
            order_id: order_id.clone(),
            amount,
            new_price,
        });
        if let Some(err) = state.take_failure(VenueOp::Reprice) {
            return Err(err);
        }
        if !state.open_orders.contains(order_id) {
            return Err(VenueError::NotFound(format!("order {order_id}")));
        }

        let ledger = state.next_ledger();
        let resting = if state.take_cross() {
            state.open_orders.remove(order_id);
            None
        } else {
            Some(order_id.clone())
        };
        Ok(OrderReceipt {
            ledger,
            timestamp: self.ledger_time(ledger),
            order_id: resting,
        })
    }

    fn do_is_open(&self, order_id: &OrderId) -> VenueResult<bool> {
        let mut state = self.state.lock();
        state.calls.push(VenueCall::IsOpen(order_id.clone()));
        if let Some(err) = state.failing_orders.get(order_id) {
            return Err(err.clone());
        }
        if let Some(err) = state.take_failure(VenueOp::IsOpen) {
            return Err(err);
        }
        Ok(state.open_orders.contains(order_id))
    }

    fn do_settlement_time(&self, ledger: LedgerRef) -> VenueResult<DateTime<Utc>> {
        let mut state = self.state.lock();
        state.calls.push(VenueCall::SettlementTime(ledger));
        if let Some(err) = state.take_failure(VenueOp::SettlementTime) {
            return Err(err);
        }
        Ok(self.ledger_time(ledger))
    }

    fn do_balance(&self) -> VenueResult<Decimal> {
        let mut state = self.state.lock();
        state.calls.push(VenueCall::Balance);
        if let Some(err) = state.take_failure(VenueOp::Balance) {
            return Err(err);
        }
        Ok(state.balance)
    }
}

impl VenueClient for MockVenueClient {
    fn place_order(
        &self,
        amount: Size,
        price: Price,
        side: OrderSide,
    ) -> BoxFuture<'_, VenueResult<OrderReceipt>> {
        Box::pin(async move { self.do_place(amount, price, side) })
    }

    fn reprice_order<'a>(
        &'a self,
        order_id: &'a OrderId,
        amount: Size,
        new_price: Price,
    ) -> BoxFuture<'a, VenueResult<OrderReceipt>> {
        Box::pin(async move { self.do_reprice(order_id, amount, new_price) })
    }

    fn is_order_open<'a>(&'a self, order_id: &'a OrderId) -> BoxFuture<'a, VenueResult<bool>> {
        Box::pin(async move { self.do_is_open(order_id) })
    }

    fn settlement_time(&self, ledger: LedgerRef) -> BoxFuture<'_, VenueResult<DateTime<Utc>>> {
        Box::pin(async move { self.do_settlement_time(ledger) })
    }

    fn counter_balance(&self) -> BoxFuture<'_, VenueResult<Decimal>> {
        Box::pin(async move { self.do_balance() })
    }
}
