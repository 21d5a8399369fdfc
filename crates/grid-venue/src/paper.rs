//! In-memory paper venue.
//!
//! Simulates a single-pair order book well enough to drive the ladder
//! without a network: a ledger counter, a two-asset balance book with
//! reservations for resting offers, and fill-on-cross against a mark price
//! pushed by the caller.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use grid_core::{LedgerRef, OrderId, OrderSide, Price, Size};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use tracing::{debug, info};

use crate::client::{BoxFuture, OrderReceipt, VenueClient};
use crate::error::{VenueError, VenueResult};

#[derive(Debug, Clone)]
struct PaperOffer {
    side: OrderSide,
    amount: Size,
    price: Price,
}

impl PaperOffer {
    fn crosses(&self, mark: Price) -> bool {
        match self.side {
            OrderSide::Buy => mark <= self.price,
            OrderSide::Sell => mark >= self.price,
        }
    }

    /// Asset amount held while the offer rests: counter for buys, base for sells.
    fn reserved(&self) -> Decimal {
        match self.side {
            OrderSide::Buy => self.amount.notional(self.price),
            OrderSide::Sell => self.amount.inner(),
        }
    }
}

#[derive(Debug)]
struct PaperBook {
    ledger: u64,
    ledger_times: HashMap<u64, DateTime<Utc>>,
    next_offer: u64,
    offers: BTreeMap<u64, PaperOffer>,
    base_balance: Decimal,
    counter_balance: Decimal,
    mark: Option<Price>,
}

impl PaperBook {
    fn close_ledger(&mut self) -> (LedgerRef, DateTime<Utc>) {
        self.ledger += 1;
        let now = Utc::now();
        self.ledger_times.insert(self.ledger, now);
        (LedgerRef(self.ledger), now)
    }

    fn reserve(&mut self, offer: &PaperOffer) -> VenueResult<()> {
        let required = offer.reserved();
        let available = match offer.side {
            OrderSide::Buy => &mut self.counter_balance,
            OrderSide::Sell => &mut self.base_balance,
        };
        if *available < required {
            return Err(VenueError::InsufficientBalance {
                required,
                available: *available,
            });
        }
        *available -= required;
        Ok(())
    }

    fn release(&mut self, offer: &PaperOffer) {
        match offer.side {
            OrderSide::Buy => self.counter_balance += offer.reserved(),
            OrderSide::Sell => self.base_balance += offer.reserved(),
        }
    }

    /// Credit the proceeds of a filled offer (its reservation is consumed).
    fn settle(&mut self, offer: &PaperOffer) {
        match offer.side {
            OrderSide::Buy => self.base_balance += offer.amount.inner(),
            OrderSide::Sell => self.counter_balance += offer.amount.notional(offer.price),
        }
    }

    fn parse_id(order_id: &OrderId) -> VenueResult<u64> {
        order_id
            .as_str()
            .parse()
            .map_err(|_| VenueError::MalformedResponse(format!("bad order id {order_id}")))
    }
}

/// Simulated venue for paper trading.
#[derive(Debug)]
pub struct PaperVenue {
    book: Mutex<PaperBook>,
}

impl PaperVenue {
    /// Create a venue holding the given base and counter balances.
    pub fn new(base_balance: Decimal, counter_balance: Decimal) -> Self {
        Self {
            book: Mutex::new(PaperBook {
                ledger: 0,
                ledger_times: HashMap::new(),
                next_offer: 0,
                offers: BTreeMap::new(),
                base_balance,
                counter_balance,
                mark: None,
            }),
        }
    }

    /// Update the mark price and fill every resting offer it crosses.
    ///
    /// Returns the ids of the filled offers.
    pub fn mark_price(&self, mark: Price) -> Vec<OrderId> {
        let mut book = self.book.lock();
        book.mark = Some(mark);

        let crossed: Vec<u64> = book
            .offers
            .iter()
            .filter(|(_, offer)| offer.crosses(mark))
            .map(|(id, _)| *id)
            .collect();

        let mut filled = Vec::with_capacity(crossed.len());
        for id in crossed {
            if let Some(offer) = book.offers.remove(&id) {
                book.settle(&offer);
                info!(
                    offer_id = id,
                    side = %offer.side,
                    price = %offer.price,
                    amount = %offer.amount,
                    "Paper offer filled"
                );
                filled.push(OrderId::new(id.to_string()));
            }
        }
        filled
    }

    /// (base, counter) balances not reserved by resting offers.
    pub fn balances(&self) -> (Decimal, Decimal) {
        let book = self.book.lock();
        (book.base_balance, book.counter_balance)
    }

    pub fn open_offer_count(&self) -> usize {
        self.book.lock().offers.len()
    }

    fn do_place(&self, amount: Size, price: Price, side: OrderSide) -> VenueResult<OrderReceipt> {
        if !amount.is_positive() || !price.is_positive() {
            return Err(VenueError::Rejected(format!(
                "non-positive order: amount={amount} price={price}"
            )));
        }
        let mut book = self.book.lock();
        let offer = PaperOffer {
            side,
            amount,
            price,
        };
        book.reserve(&offer)?;
        let (ledger, timestamp) = book.close_ledger();

        if book.mark.is_some_and(|mark| offer.crosses(mark)) {
            book.settle(&offer);
            debug!(side = %side, price = %price, ledger = %ledger, "Paper offer crossed on placement");
            return Ok(OrderReceipt {
                ledger,
                timestamp,
                order_id: None,
            });
        }

        book.next_offer += 1;
        let id = book.next_offer;
        book.offers.insert(id, offer);
        Ok(OrderReceipt {
            ledger,
            timestamp,
            order_id: Some(OrderId::new(id.to_string())),
        })
    }

    fn do_reprice(
        &self,
        order_id: &OrderId,
        amount: Size,
        new_price: Price,
    ) -> VenueResult<OrderReceipt> {
        let id = PaperBook::parse_id(order_id)?;
        let mut book = self.book.lock();
        let old = book
            .offers
            .get(&id)
            .cloned()
            .ok_or_else(|| VenueError::NotFound(format!("offer {order_id}")))?;

        let updated = PaperOffer {
            side: old.side,
            amount,
            price: new_price,
        };
        book.release(&old);
        if let Err(e) = book.reserve(&updated) {
            book.reserve(&old)?;
            return Err(e);
        }
        let (ledger, timestamp) = book.close_ledger();

        if book.mark.is_some_and(|mark| updated.crosses(mark)) {
            book.offers.remove(&id);
            book.settle(&updated);
            return Ok(OrderReceipt {
                ledger,
                timestamp,
                order_id: None,
            });
        }

        book.offers.insert(id, updated);
        Ok(OrderReceipt {
            ledger,
            timestamp,
            order_id: Some(order_id.clone()),
        })
    }

    fn do_is_open(&self, order_id: &OrderId) -> VenueResult<bool> {
        let id = PaperBook::parse_id(order_id)?;
        Ok(self.book.lock().offers.contains_key(&id))
    }

    fn do_settlement_time(&self, ledger: LedgerRef) -> VenueResult<DateTime<Utc>> {
        self.book
            .lock()
            .ledger_times
            .get(&ledger.value())
            .copied()
            .ok_or_else(|| VenueError::NotFound(format!("ledger {ledger}")))
    }
}

impl VenueClient for PaperVenue {
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
        Box::pin(async move { Ok(self.book.lock().counter_balance) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_buy_rests_then_fills_on_mark() {
        let venue = PaperVenue::new(dec!(0), dec!(100));
        venue.mark_price(Price::new(dec!(1.0)));

        let receipt = venue
            .place_order(Size::new(dec!(10)), Price::new(dec!(0.999)), OrderSide::Buy)
            .await
            .unwrap();
        let id = receipt.order_id.clone().unwrap();
        assert!(venue.is_order_open(&id).await.unwrap());
        assert_eq!(venue.balances(), (dec!(0), dec!(90.01)));

        let filled = venue.mark_price(Price::new(dec!(0.998)));
        assert_eq!(filled, vec![id.clone()]);
        assert!(!venue.is_order_open(&id).await.unwrap());
        assert_eq!(venue.balances(), (dec!(10), dec!(90.01)));

        let settled = venue.settlement_time(receipt.ledger).await.unwrap();
        assert_eq!(settled, receipt.timestamp);
    }

    #[tokio::test]
    async fn test_crossing_placement_executes_immediately() {
        let venue = PaperVenue::new(dec!(0), dec!(100));
        venue.mark_price(Price::new(dec!(1.0)));

        let receipt = venue
            .place_order(Size::new(dec!(10)), Price::new(dec!(1.01)), OrderSide::Buy)
            .await
            .unwrap();
        assert!(receipt.crossed());
        assert_eq!(venue.open_offer_count(), 0);
        assert_eq!(venue.balances().0, dec!(10));
    }

    #[tokio::test]
    async fn test_insufficient_balance_rejected() {
        let venue = PaperVenue::new(dec!(0), dec!(1));
        let result = venue
            .place_order(Size::new(dec!(10)), Price::new(dec!(0.5)), OrderSide::Buy)
            .await;
        assert!(matches!(
            result,
            Err(VenueError::InsufficientBalance { .. })
        ));

        let sell = venue
            .place_order(Size::new(dec!(1)), Price::new(dec!(2)), OrderSide::Sell)
            .await;
        assert!(sell.is_err());
    }

    #[tokio::test]
    async fn test_reprice_moves_reservation() {
        let venue = PaperVenue::new(dec!(0), dec!(100));
        venue.mark_price(Price::new(dec!(1.0)));
        let receipt = venue
            .place_order(Size::new(dec!(10)), Price::new(dec!(0.9)), OrderSide::Buy)
            .await
            .unwrap();
        let id = receipt.order_id.unwrap();
        assert_eq!(venue.balances().1, dec!(91));

        let repriced = venue
            .reprice_order(&id, Size::new(dec!(10)), Price::new(dec!(0.95)))
            .await
            .unwrap();
        assert_eq!(repriced.order_id, Some(id));
        assert!(repriced.ledger > receipt.ledger);
        assert_eq!(venue.balances().1, dec!(90.5));
    }

    #[tokio::test]
    async fn test_sell_fills_when_mark_rises() {
        let venue = PaperVenue::new(dec!(10), dec!(0));
        venue.mark_price(Price::new(dec!(1.0)));
        let receipt = venue
            .place_order(Size::new(dec!(10)), Price::new(dec!(1.001)), OrderSide::Sell)
            .await
            .unwrap();
        assert!(!receipt.crossed());

        venue.mark_price(Price::new(dec!(1.002)));
        assert_eq!(venue.balances(), (dec!(0), dec!(10.01)));
        assert_eq!(venue.counter_balance().await.unwrap(), dec!(10.01));
    }

    #[tokio::test]
    async fn test_unknown_ledger_not_found() {
        let venue = PaperVenue::new(dec!(0), dec!(0));
        let result = venue.settlement_time(LedgerRef(42)).await;
        assert!(matches!(result, Err(VenueError::NotFound(_))));
    }
}
