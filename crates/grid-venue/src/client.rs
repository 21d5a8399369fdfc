//! Venue client capability.
//!
//! Trait-based abstraction over the venue the ladder trades on. Signing,
//! submission, retries and timeouts belong to implementations; the engine
//! only sees the operations below.

use std::pin::Pin;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use grid_core::{LedgerRef, OrderId, OrderSide, Price, Size};
use rust_decimal::Decimal;

use crate::error::VenueResult;

/// Boxed future for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

/// Venue acknowledgement of a placement or reprice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderReceipt {
    /// Ledger that included the transaction.
    pub ledger: LedgerRef,
    /// Submission time reported by the venue.
    pub timestamp: DateTime<Utc>,
    /// Resting order id, or `None` when no order rests after the
    /// transaction (it crossed and executed immediately).
    pub order_id: Option<OrderId>,
}

impl OrderReceipt {
    /// Whether the order executed on submission.
    #[must_use]
    pub fn crossed(&self) -> bool {
        self.order_id.is_none()
    }
}

/// Operations the reconciliation engine requires from a venue.
pub trait VenueClient: Send + Sync {
    /// Submit a limit order for `amount` base units at `price`.
    fn place_order(
        &self,
        amount: Size,
        price: Price,
        side: OrderSide,
    ) -> BoxFuture<'_, VenueResult<OrderReceipt>>;

    /// Modify a resting order's limit price in place.
    fn reprice_order<'a>(
        &'a self,
        order_id: &'a OrderId,
        amount: Size,
        new_price: Price,
    ) -> BoxFuture<'a, VenueResult<OrderReceipt>>;

    /// Whether the order is still resting on the venue.
    ///
    /// An order that is no longer present is reported as not open, and the
    /// engine treats that as filled. A cancelled order is indistinguishable
    /// from a filled one here; an adapter that can query fill history should
    /// only report `false` once it has seen the fill.
    fn is_order_open<'a>(&'a self, order_id: &'a OrderId) -> BoxFuture<'a, VenueResult<bool>>;

    /// Close time of the given ledger.
    fn settlement_time(&self, ledger: LedgerRef) -> BoxFuture<'_, VenueResult<DateTime<Utc>>>;

    /// Available balance of the counter asset.
    fn counter_balance(&self) -> BoxFuture<'_, VenueResult<Decimal>>;
}

/// Arc wrapper for VenueClient trait objects.
pub type DynVenueClient = Arc<dyn VenueClient>;
