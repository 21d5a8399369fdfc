//! Ladder reconciliation engine.
//!
//! Owns the position list and walks every rung once per tick:
//!
//! - Buy resting: detect the fill, or reprice when the market drifted past
//!   the threshold
//! - Buy settled: place the sell leg and open the next rung below
//! - Sell resting: detect the fill and open the next rung below it
//! - Sell settled: terminal
//!
//! A failing rung is logged and skipped; the rest of the ladder still runs.

use std::collections::VecDeque;
use std::time::Instant;

use chrono::Utc;
use grid_core::{
    LegState, OrderId, OrderSide, OrderStatus, Position, PositionId, Price, PriceSignal,
};
use grid_telemetry::Metrics;
use grid_venue::{DynVenueClient, OrderReceipt, VenueClient};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tracing::{debug, error, info, warn};

use crate::config::GridConfig;
use crate::error::{EngineError, EngineResult, ErrorKind};
use crate::pricing::{rung_base_amount, rung_capital, LadderPricing};
use crate::snapshot::{LadderSnapshot, PositionSnapshot};

/// Counts of what one tick did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Positions walked (spawned rungs are not walked until the next tick).
    pub positions_evaluated: usize,
    /// Whether the first rung was opened this tick.
    pub bootstrapped: bool,
    /// New orders submitted (buys and sells).
    pub orders_placed: usize,
    pub reprices: usize,
    /// Fills detected, including orders that crossed on submission.
    pub fills: usize,
    /// New positions added to the ladder.
    pub rungs_opened: usize,
    /// Rungs left waiting for a retry.
    pub rungs_pending: usize,
    /// Positions whose step failed.
    pub errors: usize,
    pub invariant_violations: usize,
    /// Positions with nothing to do.
    pub unchanged: usize,
    /// Reprice threshold used.
    pub threshold: Price,
}

/// A rung whose opening buy could not be placed yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PendingRung {
    price: Price,
    /// Position whose fill produced this rung.
    origin: PositionId,
    attempts: u32,
}

/// Result of walking one position.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Step {
    Unchanged,
    BuyFilled,
    Repriced { crossed: bool },
    SellPlaced { crossed: bool, spawn: Vec<Price> },
    SellFilled { spawn: Price },
}

/// Inputs shared by every step of one tick.
#[derive(Debug, Clone, Copy)]
struct TickContext {
    pricing: LadderPricing,
    capital: Decimal,
}

/// Grid ladder engine.
pub struct GridEngine {
    config: GridConfig,
    venue: DynVenueClient,
    positions: Vec<Position>,
    archive: Vec<Position>,
    pending: VecDeque<PendingRung>,
    next_id: u64,
    ticks: u64,
    last_pricing: Option<LadderPricing>,
}

impl GridEngine {
    pub fn new(config: GridConfig, venue: DynVenueClient) -> Self {
        Self {
            config,
            venue,
            positions: Vec::new(),
            archive: Vec::new(),
            pending: VecDeque::new(),
            next_id: 1,
            ticks: 0,
            last_pricing: None,
        }
    }

    pub fn config(&self) -> &GridConfig {
        &self.config
    }

    pub fn venue(&self) -> &DynVenueClient {
        &self.venue
    }

    /// Positions still reconciled each tick, in creation order.
    pub fn positions(&self) -> &[Position] {
        &self.positions
    }

    /// Completed positions moved out of the reconciled list.
    pub fn archived(&self) -> &[Position] {
        &self.archive
    }

    pub fn pending_rungs(&self) -> usize {
        self.pending.len()
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Read-only view of the whole ladder.
    pub fn snapshot(&self) -> LadderSnapshot {
        let mut positions: Vec<PositionSnapshot> = self
            .archive
            .iter()
            .map(|p| PositionSnapshot::of(p, true))
            .chain(self.positions.iter().map(|p| PositionSnapshot::of(p, false)))
            .collect();
        positions.sort_by_key(|p| p.id);

        LadderSnapshot {
            tick: self.ticks,
            taken_at: Some(Utc::now()),
            current_price: self.last_pricing.map(|p| p.current()),
            threshold: self.last_pricing.map(|p| p.threshold()),
            positions,
            pending_rungs: self.pending.len(),
        }
    }

    /// Run one reconciliation pass.
    ///
    /// Fails only when the tick inputs are unusable, which includes a
    /// threshold too small to separate rungs at the venue precision.
    /// Per-position failures are counted in the report.
    pub async fn tick(
        &mut self,
        signal: &PriceSignal,
        counter_balance: Decimal,
    ) -> EngineResult<TickReport> {
        if !signal.is_usable() {
            return Err(EngineError::Data(format!(
                "unusable price signal: current={} std_dev={}",
                signal.current_price, signal.price_std_dev
            )));
        }

        let start = Instant::now();
        let pricing = LadderPricing::new(
            signal,
            self.config.price_interval_percent,
            self.config.price_precision,
        );
        if pricing.is_degenerate() {
            return Err(EngineError::Data(format!(
                "reprice threshold {} rounds to zero at {} dp (std_dev={})",
                pricing.threshold(),
                self.config.price_precision,
                signal.price_std_dev
            )));
        }
        let ctx = TickContext {
            pricing,
            capital: rung_capital(counter_balance, self.config.trading_capital_percent),
        };
        self.last_pricing = Some(pricing);
        Metrics::reprice_threshold(pricing.threshold().inner().to_f64().unwrap_or(0.0));

        let mut report = TickReport {
            threshold: pricing.threshold(),
            ..Default::default()
        };

        // Only rungs that existed when the tick started are walked.
        let walked = self.positions.len();

        if walked == 0 && self.pending.is_empty() {
            self.bootstrap(&ctx, &mut report).await;
        } else {
            self.retry_pending(&ctx, &mut report).await;
        }

        for idx in 0..walked {
            report.positions_evaluated += 1;
            let position = &mut self.positions[idx];
            let id = position.id();
            let step = reconcile_position(self.venue.as_ref(), position, &ctx).await;

            match step {
                Ok(step) => self.apply_step(id, step, &ctx, &mut report).await,
                Err(e) => record_failure(id, &e, &mut report),
            }
        }

        if self.config.archive_completed {
            self.archive_completed();
        }

        self.ticks += 1;
        report.rungs_pending = self.pending.len();
        Metrics::ladder_size(self.positions.len() + self.archive.len(), self.pending.len());
        Metrics::tick_duration(start.elapsed().as_secs_f64() * 1000.0);

        debug!(
            tick = self.ticks,
            current = %pricing.current(),
            threshold = %pricing.threshold(),
            evaluated = report.positions_evaluated,
            placed = report.orders_placed,
            reprices = report.reprices,
            fills = report.fills,
            opened = report.rungs_opened,
            errors = report.errors,
            "Tick complete"
        );

        Ok(report)
    }

    async fn bootstrap(&mut self, ctx: &TickContext, report: &mut TickReport) {
        let price = ctx.pricing.entry_buy();
        match self.open_rung(price, ctx, report).await {
            Ok(id) => {
                report.bootstrapped = true;
                info!(position = %id, price = %price, "Ladder bootstrapped");
            }
            Err(e) => {
                report.errors += 1;
                Metrics::reconcile_error(e.kind().as_str());
                warn!(price = %price, error = %e, "Bootstrap failed, retrying next tick");
            }
        }
    }

    async fn retry_pending(&mut self, ctx: &TickContext, report: &mut TickReport) {
        let queued = self.pending.len();
        for _ in 0..queued {
            let Some(mut rung) = self.pending.pop_front() else {
                break;
            };
            rung.attempts += 1;
            match self.open_rung(rung.price, ctx, report).await {
                Ok(id) => {
                    info!(
                        position = %id,
                        origin = %rung.origin,
                        price = %rung.price,
                        attempts = rung.attempts,
                        "Pending rung opened"
                    );
                }
                Err(e) => {
                    report.errors += 1;
                    Metrics::reconcile_error(e.kind().as_str());
                    warn!(
                        origin = %rung.origin,
                        price = %rung.price,
                        attempts = rung.attempts,
                        error = %e,
                        "Pending rung still failing"
                    );
                    self.pending.push_back(rung);
                }
            }
        }
    }

    async fn apply_step(
        &mut self,
        id: PositionId,
        step: Step,
        ctx: &TickContext,
        report: &mut TickReport,
    ) {
        match step {
            Step::Unchanged => report.unchanged += 1,
            Step::BuyFilled => {
                report.fills += 1;
                Metrics::fill(OrderSide::Buy.as_str());
            }
            Step::Repriced { crossed } => {
                report.reprices += 1;
                Metrics::order_repriced();
                if crossed {
                    report.fills += 1;
                    Metrics::fill(OrderSide::Buy.as_str());
                }
            }
            Step::SellPlaced { crossed, spawn } => {
                report.orders_placed += 1;
                Metrics::order_placed(OrderSide::Sell.as_str());
                if crossed {
                    report.fills += 1;
                    Metrics::fill(OrderSide::Sell.as_str());
                }
                for price in spawn {
                    self.spawn_rung(id, price, ctx, report).await;
                }
            }
            Step::SellFilled { spawn } => {
                report.fills += 1;
                Metrics::fill(OrderSide::Sell.as_str());
                self.spawn_rung(id, spawn, ctx, report).await;
            }
        }
    }

    /// Open the rung a fill produced, queueing it when placement fails.
    ///
    /// A non-positive target can never be placed and is dropped instead.
    async fn spawn_rung(
        &mut self,
        origin: PositionId,
        price: Price,
        ctx: &TickContext,
        report: &mut TickReport,
    ) {
        if !price.is_positive() {
            report.errors += 1;
            Metrics::reconcile_error(ErrorKind::Data.as_str());
            warn!(origin = %origin, price = %price, "Rung below zero, dropped");
            return;
        }
        match self.open_rung(price, ctx, report).await {
            Ok(id) => {
                info!(position = %id, origin = %origin, price = %price, "Rung opened");
            }
            Err(e) => {
                report.errors += 1;
                Metrics::reconcile_error(e.kind().as_str());
                warn!(
                    origin = %origin,
                    price = %price,
                    error = %e,
                    "Rung placement failed, queued for retry"
                );
                self.pending.push_back(PendingRung {
                    price,
                    origin,
                    attempts: 1,
                });
            }
        }
    }

    /// Place a new buy and append the position to the ladder.
    async fn open_rung(
        &mut self,
        price: Price,
        ctx: &TickContext,
        report: &mut TickReport,
    ) -> EngineResult<PositionId> {
        if !price.is_positive() {
            return Err(EngineError::Data(format!("non-positive rung price {price}")));
        }
        let amount = rung_base_amount(ctx.capital, price, self.config.price_precision)
            .ok_or_else(|| {
                EngineError::Data(format!(
                    "no base amount for rung at {price} with capital {}",
                    ctx.capital
                ))
            })?;

        let receipt = self.venue.place_order(amount, price, OrderSide::Buy).await?;

        let id = PositionId(self.next_id);
        self.next_id += 1;
        let mut position = Position::new(id, amount);
        let crossed = record_receipt(
            self.venue.as_ref(),
            &mut position,
            OrderSide::Buy,
            receipt,
            price,
        )
        .await;
        self.positions.push(position);

        report.orders_placed += 1;
        report.rungs_opened += 1;
        Metrics::order_placed(OrderSide::Buy.as_str());
        Metrics::rung_opened();
        if crossed {
            report.fills += 1;
            Metrics::fill(OrderSide::Buy.as_str());
        }
        Ok(id)
    }

    fn archive_completed(&mut self) {
        let (done, hot): (Vec<_>, Vec<_>) = std::mem::take(&mut self.positions)
            .into_iter()
            .partition(Position::is_complete);
        self.positions = hot;
        for position in done {
            debug!(position = %position.id(), "Position archived");
            self.archive.push(position);
        }
    }
}

fn record_failure(id: PositionId, e: &EngineError, report: &mut TickReport) {
    report.errors += 1;
    let kind = e.kind();
    Metrics::reconcile_error(kind.as_str());
    match kind {
        ErrorKind::Invariant => {
            report.invariant_violations += 1;
            error!(position = %id, error = %e, "Position invariant violated");
        }
        ErrorKind::Transient => {
            warn!(position = %id, error = %e, "Transient venue failure, retrying next tick");
        }
        ErrorKind::Data => {
            warn!(position = %id, error = %e, "Skipping position this tick");
        }
    }
}

/// Walk one position through the state machine.
async fn reconcile_position(
    venue: &dyn VenueClient,
    position: &mut Position,
    ctx: &TickContext,
) -> EngineResult<Step> {
    if let Some(detail) = position.invariant_violation() {
        return Err(EngineError::InvariantViolation {
            position: position.id(),
            detail,
        });
    }

    match (position.side(), position.in_play().state()) {
        (OrderSide::Buy, LegState::Resting) => reconcile_resting_buy(venue, position, ctx).await,
        (OrderSide::Buy, LegState::Settled) => place_sell(venue, position, ctx).await,
        (OrderSide::Sell, LegState::Resting) => reconcile_resting_sell(venue, position, ctx).await,
        (OrderSide::Sell, LegState::Settled) => Ok(Step::Unchanged),
        (side, LegState::Unentered) => Err(EngineError::InvariantViolation {
            position: position.id(),
            detail: format!("{side} leg in play but never entered"),
        }),
    }
}

async fn reconcile_resting_buy(
    venue: &dyn VenueClient,
    position: &mut Position,
    ctx: &TickContext,
) -> EngineResult<Step> {
    let order_id = resting_order_id(position, OrderSide::Buy)?;

    if !venue.is_order_open(&order_id).await? {
        mark_executed(venue, position, OrderSide::Buy).await?;
        return Ok(Step::BuyFilled);
    }

    let resting = position.buy_order().last_price()?;
    if !ctx.pricing.needs_reprice(resting) {
        return Ok(Step::Unchanged);
    }

    let new_price = ctx.pricing.entry_buy();
    if !new_price.is_positive() {
        return Err(EngineError::Data(format!(
            "reprice target {new_price} is not positive"
        )));
    }
    if new_price == resting {
        return Ok(Step::Unchanged);
    }

    let amount = ctx.pricing.round_amount(position.base_amount());
    let receipt = venue.reprice_order(&order_id, amount, new_price).await?;
    debug!(
        position = %position.id(),
        order_id = %order_id,
        from = %resting,
        to = %new_price,
        current = %ctx.pricing.current(),
        "Buy repriced"
    );
    let crossed = record_receipt(venue, position, OrderSide::Buy, receipt, new_price).await;
    Ok(Step::Repriced { crossed })
}

async fn place_sell(
    venue: &dyn VenueClient,
    position: &mut Position,
    ctx: &TickContext,
) -> EngineResult<Step> {
    let fill = position.buy_order().last_price()?;
    let sell_price = ctx.pricing.exit_sell(fill);
    let amount = ctx.pricing.round_amount(position.base_amount());
    if !amount.is_positive() {
        return Err(EngineError::Data(format!("non-positive sell amount {amount}")));
    }

    let receipt = venue.place_order(amount, sell_price, OrderSide::Sell).await?;
    position.set_side(OrderSide::Sell);
    let crossed = record_receipt(venue, position, OrderSide::Sell, receipt, sell_price).await;

    info!(
        position = %position.id(),
        buy_fill = %fill,
        sell_price = %sell_price,
        current = %ctx.pricing.current(),
        crossed,
        "Sell placed"
    );

    let mut spawn = vec![ctx.pricing.next_buy_after_buy(fill)];
    if crossed {
        // The sell settled on submission, so its own rung is due now.
        spawn.push(ctx.pricing.next_buy_after_sell(sell_price));
    }
    Ok(Step::SellPlaced { crossed, spawn })
}

async fn reconcile_resting_sell(
    venue: &dyn VenueClient,
    position: &mut Position,
    ctx: &TickContext,
) -> EngineResult<Step> {
    let order_id = resting_order_id(position, OrderSide::Sell)?;

    if venue.is_order_open(&order_id).await? {
        return Ok(Step::Unchanged);
    }

    let fill = mark_executed(venue, position, OrderSide::Sell).await?;
    info!(position = %position.id(), sell_fill = %fill, "Sell filled");
    Ok(Step::SellFilled {
        spawn: ctx.pricing.next_buy_after_sell(fill),
    })
}

fn resting_order_id(position: &Position, side: OrderSide) -> EngineResult<OrderId> {
    position
        .leg(side)
        .order_id()
        .cloned()
        .ok_or_else(|| EngineError::InvariantViolation {
            position: position.id(),
            detail: format!("resting {side} leg has no order id"),
        })
}

/// Append an `executed` record at the resting price, stamped with the
/// settlement time of the resting record's ledger. Returns the fill price.
async fn mark_executed(
    venue: &dyn VenueClient,
    position: &mut Position,
    side: OrderSide,
) -> EngineResult<Price> {
    let last = position.leg(side).last_record()?.clone();
    let settled_at = venue.settlement_time(last.ledger).await?;
    position.append(side, last.ledger, settled_at, last.price, OrderStatus::Executed);
    debug!(
        position = %position.id(),
        side = %side,
        price = %last.price,
        ledger = %last.ledger,
        "Fill detected"
    );
    Ok(last.price)
}

/// Record a placement or reprice on `side`. Returns true when the order
/// crossed on submission and was recorded as executed.
async fn record_receipt(
    venue: &dyn VenueClient,
    position: &mut Position,
    side: OrderSide,
    receipt: OrderReceipt,
    price: Price,
) -> bool {
    match receipt.order_id {
        Some(order_id) => {
            position.leg_mut(side).set_order_id(Some(order_id));
            position.append(side, receipt.ledger, receipt.timestamp, price, OrderStatus::Open);
            false
        }
        None => {
            // The order is already on the venue, so a lookup failure must
            // not lose it: fall back to the submission time.
            let settled_at = match venue.settlement_time(receipt.ledger).await {
                Ok(t) => t,
                Err(e) => {
                    warn!(
                        position = %position.id(),
                        ledger = %receipt.ledger,
                        error = %e,
                        "Settlement time unavailable, using submission time"
                    );
                    receipt.timestamp
                }
            };
            position.append(side, receipt.ledger, settled_at, price, OrderStatus::Executed);
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grid_venue::{MockVenueClient, VenueCall, VenueError, VenueOp};
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    fn signal(current: Decimal) -> PriceSignal {
        PriceSignal::new(Price::new(current), Price::new(current), dec!(0.05))
    }

    fn setup() -> (GridEngine, Arc<MockVenueClient>) {
        let venue = Arc::new(MockVenueClient::new(dec!(1000)));
        let engine = GridEngine::new(GridConfig::default(), venue.clone());
        (engine, venue)
    }

    fn buy_id(engine: &GridEngine, idx: usize) -> OrderId {
        engine.positions()[idx].buy_order().order_id().cloned().unwrap()
    }

    fn sell_id(engine: &GridEngine, idx: usize) -> OrderId {
        engine.positions()[idx].sell_order().order_id().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_bootstrap_opens_first_rung() {
        let (mut engine, venue) = setup();

        let report = engine.tick(&signal(dec!(1.00)), dec!(1000)).await.unwrap();

        assert!(report.bootstrapped);
        assert_eq!(report.threshold, Price::new(dec!(0.001)));
        assert_eq!(report.positions_evaluated, 0);
        assert_eq!(engine.positions().len(), 1);

        let position = &engine.positions()[0];
        assert_eq!(position.id(), PositionId(1));
        assert_eq!(position.side(), OrderSide::Buy);
        assert_eq!(position.buy_order().last_price().unwrap(), Price::new(dec!(0.999)));
        assert_eq!(position.buy_order().last_status().unwrap(), OrderStatus::Open);
        // 1000 * 1% / 0.999
        assert_eq!(position.base_amount().inner(), dec!(10.0100100));
        assert_eq!(
            venue.calls(),
            vec![VenueCall::Place {
                amount: position.base_amount(),
                price: Price::new(dec!(0.999)),
                side: OrderSide::Buy,
            }]
        );
    }

    #[tokio::test]
    async fn test_no_remote_change_is_idempotent() {
        let (mut engine, venue) = setup();
        engine.tick(&signal(dec!(1.00)), dec!(1000)).await.unwrap();
        venue.clear_calls();
        let before = engine.positions().to_vec();

        let report = engine.tick(&signal(dec!(0.9995)), dec!(1000)).await.unwrap();

        assert_eq!(report.unchanged, 1);
        assert_eq!(engine.positions(), before.as_slice());
        assert_eq!(venue.mutating_calls(), 0);
        assert_eq!(venue.count(VenueOp::IsOpen), 1);
    }

    #[tokio::test]
    async fn test_resting_buy_repriced_when_market_runs_away() {
        let (mut engine, venue) = setup();
        engine.tick(&signal(dec!(1.00)), dec!(1000)).await.unwrap();
        let id = buy_id(&engine, 0);

        let report = engine.tick(&signal(dec!(1.003)), dec!(1000)).await.unwrap();

        assert_eq!(report.reprices, 1);
        let buy = engine.positions()[0].buy_order();
        assert_eq!(buy.history().len(), 2);
        assert_eq!(buy.last_price().unwrap(), Price::new(dec!(1.002)));
        assert_eq!(buy.last_status().unwrap(), OrderStatus::Open);
        assert_eq!(buy.order_id(), Some(&id));
        assert_eq!(venue.count(VenueOp::Reprice), 1);
    }

    #[tokio::test]
    async fn test_buy_fill_then_sell_and_next_rung() {
        let (mut engine, venue) = setup();
        engine.tick(&signal(dec!(1.00)), dec!(1000)).await.unwrap();
        let id = buy_id(&engine, 0);
        assert!(venue.fill(&id));

        // Tick N: fill detected at the resting price with the ledger close time.
        let report = engine.tick(&signal(dec!(0.998)), dec!(1000)).await.unwrap();
        assert_eq!(report.fills, 1);
        assert_eq!(report.orders_placed, 0);
        let buy = engine.positions()[0].buy_order();
        let executed = buy.last_record().unwrap();
        assert_eq!(executed.status, OrderStatus::Executed);
        assert_eq!(executed.price, Price::new(dec!(0.999)));
        assert_eq!(executed.timestamp, venue.ledger_time(executed.ledger));
        assert_eq!(engine.positions().len(), 1);

        // Tick N+1: sell above max(fill, cur), new buy below min(fill, cur).
        let report = engine.tick(&signal(dec!(0.998)), dec!(1000)).await.unwrap();
        assert_eq!(report.orders_placed, 2);
        assert_eq!(report.rungs_opened, 1);
        assert_eq!(engine.positions().len(), 2);

        let first = &engine.positions()[0];
        assert_eq!(first.side(), OrderSide::Sell);
        assert_eq!(first.sell_order().last_price().unwrap(), Price::new(dec!(1.000)));
        assert_eq!(first.sell_order().base_amount(), first.base_amount());

        let second = &engine.positions()[1];
        assert_eq!(second.id(), PositionId(2));
        assert_eq!(second.buy_order().last_price().unwrap(), Price::new(dec!(0.997)));
    }

    #[tokio::test]
    async fn test_sell_fill_spawns_rung_below_sell_price() {
        let (mut engine, venue) = setup();
        engine.tick(&signal(dec!(1.00)), dec!(1000)).await.unwrap();
        venue.fill(&buy_id(&engine, 0));
        engine.tick(&signal(dec!(1.00)), dec!(1000)).await.unwrap();
        engine.tick(&signal(dec!(1.00)), dec!(1000)).await.unwrap();
        assert_eq!(engine.positions().len(), 2);

        venue.fill(&sell_id(&engine, 0));
        let report = engine.tick(&signal(dec!(1.00)), dec!(1000)).await.unwrap();

        assert_eq!(report.fills, 1);
        assert_eq!(report.rungs_opened, 1);
        assert_eq!(engine.positions().len(), 3);
        let first = &engine.positions()[0];
        assert!(first.is_complete());
        // sell at 1.000, next rung at 0.999
        assert_eq!(
            engine.positions()[2].buy_order().last_price().unwrap(),
            Price::new(dec!(0.999))
        );

        // Terminal: no more venue traffic for the completed rung.
        venue.clear_calls();
        let report = engine.tick(&signal(dec!(1.00)), dec!(1000)).await.unwrap();
        assert_eq!(report.positions_evaluated, 3);
        assert_eq!(venue.count(VenueOp::IsOpen), 2);
    }

    #[tokio::test]
    async fn test_sell_legs_are_never_repriced() {
        let (mut engine, venue) = setup();
        engine.tick(&signal(dec!(1.00)), dec!(1000)).await.unwrap();
        venue.fill(&buy_id(&engine, 0));
        engine.tick(&signal(dec!(1.00)), dec!(1000)).await.unwrap();
        engine.tick(&signal(dec!(1.00)), dec!(1000)).await.unwrap();
        venue.clear_calls();

        engine.tick(&signal(dec!(0.90)), dec!(1000)).await.unwrap();

        for call in venue.calls() {
            if let VenueCall::Reprice { order_id, .. } = call {
                assert_ne!(order_id, sell_id(&engine, 0));
            }
        }
        assert_eq!(engine.positions()[0].sell_order().history().len(), 1);
    }

    #[tokio::test]
    async fn test_failure_isolated_to_one_position() {
        let (mut engine, venue) = setup();
        engine.tick(&signal(dec!(1.00)), dec!(1000)).await.unwrap();
        venue.fill(&buy_id(&engine, 0));
        engine.tick(&signal(dec!(1.00)), dec!(1000)).await.unwrap();
        engine.tick(&signal(dec!(1.00)), dec!(1000)).await.unwrap();
        assert_eq!(engine.positions().len(), 2);

        // Position 1 cannot be polled, position 2 has filled.
        let first_sell = sell_id(&engine, 0);
        venue.fail_order(first_sell.clone(), VenueError::Network("reset".into()));
        venue.fill(&buy_id(&engine, 1));

        let report = engine.tick(&signal(dec!(1.00)), dec!(1000)).await.unwrap();
        assert_eq!(report.errors, 1);
        assert_eq!(report.fills, 1);
        assert_eq!(
            engine.positions()[1].buy_order().last_status().unwrap(),
            OrderStatus::Executed
        );
        assert_eq!(engine.positions()[0].sell_order().history().len(), 1);

        // Recovers next tick.
        venue.clear_order_failure(&first_sell);
        venue.fill(&first_sell);
        let report = engine.tick(&signal(dec!(1.00)), dec!(1000)).await.unwrap();
        assert_eq!(report.errors, 0);
        assert!(engine.positions()[0].is_complete());
    }

    #[tokio::test]
    async fn test_spawn_failure_queues_pending_rung() {
        let (mut engine, venue) = setup();
        engine.tick(&signal(dec!(1.00)), dec!(1000)).await.unwrap();
        venue.fill(&buy_id(&engine, 0));
        engine.tick(&signal(dec!(1.00)), dec!(1000)).await.unwrap();

        // Balance lookup is outside the engine; zero capital makes the
        // spawned rung unfundable while the sell still goes out.
        let report = engine.tick(&signal(dec!(1.00)), dec!(0)).await.unwrap();
        assert_eq!(report.orders_placed, 1);
        assert_eq!(report.rungs_pending, 1);
        assert_eq!(report.errors, 1);
        assert_eq!(engine.positions().len(), 1);
        assert_eq!(engine.pending_rungs(), 1);

        // A retry that fails again is counted and keeps the rung queued.
        let report = engine.tick(&signal(dec!(1.00)), dec!(0)).await.unwrap();
        assert_eq!(report.errors, 1);
        assert_eq!(report.rungs_opened, 0);
        assert_eq!(engine.pending_rungs(), 1);

        // Bootstrap must not run while a rung is pending, and the retry
        // keeps the original target price.
        let report = engine.tick(&signal(dec!(1.05)), dec!(1000)).await.unwrap();
        assert!(!report.bootstrapped);
        assert_eq!(report.rungs_opened, 1);
        assert_eq!(engine.pending_rungs(), 0);
        assert_eq!(engine.positions().len(), 2);
        assert_eq!(
            engine.positions()[1].buy_order().last_price().unwrap(),
            Price::new(dec!(0.998))
        );
    }

    #[tokio::test]
    async fn test_rung_below_zero_dropped_not_queued() {
        let (mut engine, venue) = setup();
        engine.tick(&signal(dec!(1.00)), dec!(1000)).await.unwrap();
        venue.fill(&buy_id(&engine, 0));
        engine.tick(&signal(dec!(1.00)), dec!(1000)).await.unwrap();

        // threshold 2: sell at 3.000, next rung at -1.001
        let wide = PriceSignal::new(Price::ONE, Price::ONE, dec!(100));
        let report = engine.tick(&wide, dec!(1000)).await.unwrap();
        assert_eq!(report.orders_placed, 1);
        assert_eq!(report.errors, 1);
        assert_eq!(report.rungs_pending, 0);
        assert_eq!(engine.pending_rungs(), 0);
        assert_eq!(engine.positions().len(), 1);
        assert_eq!(
            engine.positions()[0].sell_order().last_price().unwrap(),
            Price::new(dec!(3.000))
        );
        assert_eq!(venue.count(VenueOp::Place), 2);
    }

    #[tokio::test]
    async fn test_sell_placement_failure_retried_without_spawn() {
        let (mut engine, venue) = setup();
        engine.tick(&signal(dec!(1.00)), dec!(1000)).await.unwrap();
        venue.fill(&buy_id(&engine, 0));
        engine.tick(&signal(dec!(1.00)), dec!(1000)).await.unwrap();

        venue.fail_next(VenueOp::Place, VenueError::Timeout("slow".into()));
        let report = engine.tick(&signal(dec!(1.00)), dec!(1000)).await.unwrap();
        assert_eq!(report.errors, 1);
        assert_eq!(engine.positions().len(), 1);
        assert_eq!(engine.positions()[0].side(), OrderSide::Buy);
        assert!(!engine.positions()[0].sell_order().is_entered());

        let report = engine.tick(&signal(dec!(1.00)), dec!(1000)).await.unwrap();
        assert_eq!(report.errors, 0);
        assert_eq!(engine.positions()[0].side(), OrderSide::Sell);
        assert_eq!(engine.positions().len(), 2);
    }

    #[tokio::test]
    async fn test_bootstrap_failure_retried_next_tick() {
        let (mut engine, venue) = setup();
        venue.fail_next(VenueOp::Place, VenueError::Network("down".into()));

        let report = engine.tick(&signal(dec!(1.00)), dec!(1000)).await.unwrap();
        assert!(!report.bootstrapped);
        assert_eq!(report.errors, 1);
        assert!(engine.positions().is_empty());
        assert_eq!(engine.pending_rungs(), 0);

        let report = engine.tick(&signal(dec!(1.01)), dec!(1000)).await.unwrap();
        assert!(report.bootstrapped);
        assert_eq!(
            engine.positions()[0].buy_order().last_price().unwrap(),
            Price::new(dec!(1.009))
        );
    }

    #[tokio::test]
    async fn test_crossed_placement_recorded_as_executed() {
        let (mut engine, venue) = setup();
        venue.cross_next(1);

        let report = engine.tick(&signal(dec!(1.00)), dec!(1000)).await.unwrap();
        assert_eq!(report.fills, 1);

        let buy = engine.positions()[0].buy_order();
        assert_eq!(buy.order_id(), None);
        let record = buy.last_record().unwrap();
        assert_eq!(record.status, OrderStatus::Executed);
        assert_eq!(record.timestamp, venue.ledger_time(record.ledger));
        assert_eq!(venue.count(VenueOp::SettlementTime), 1);

        // Next tick goes straight to the sell.
        let report = engine.tick(&signal(dec!(1.00)), dec!(1000)).await.unwrap();
        assert_eq!(engine.positions()[0].side(), OrderSide::Sell);
        assert_eq!(report.rungs_opened, 1);
    }

    #[tokio::test]
    async fn test_crossed_sell_spawns_both_rungs() {
        let (mut engine, venue) = setup();
        engine.tick(&signal(dec!(1.00)), dec!(1000)).await.unwrap();
        venue.fill(&buy_id(&engine, 0));
        engine.tick(&signal(dec!(1.00)), dec!(1000)).await.unwrap();

        venue.cross_next(1);
        let report = engine.tick(&signal(dec!(1.00)), dec!(1000)).await.unwrap();

        assert!(engine.positions()[0].is_complete());
        assert_eq!(report.rungs_opened, 2);
        let prices: Vec<Price> = engine.positions()[1..]
            .iter()
            .map(|p| p.buy_order().last_price().unwrap())
            .collect();
        assert_eq!(prices, vec![Price::new(dec!(0.998)), Price::new(dec!(0.999))]);
    }

    #[tokio::test]
    async fn test_crossed_reprice_settles_buy() {
        let (mut engine, venue) = setup();
        engine.tick(&signal(dec!(1.00)), dec!(1000)).await.unwrap();
        venue.cross_next(1);

        let report = engine.tick(&signal(dec!(1.01)), dec!(1000)).await.unwrap();
        assert_eq!(report.reprices, 1);
        assert_eq!(report.fills, 1);
        assert_eq!(
            engine.positions()[0].buy_order().state(),
            LegState::Settled
        );
    }

    #[tokio::test]
    async fn test_transient_poll_failure_leaves_state() {
        let (mut engine, venue) = setup();
        engine.tick(&signal(dec!(1.00)), dec!(1000)).await.unwrap();
        let before = engine.positions().to_vec();
        venue.fail_next(VenueOp::IsOpen, VenueError::Timeout("slow".into()));

        let report = engine.tick(&signal(dec!(1.05)), dec!(1000)).await.unwrap();
        assert_eq!(report.errors, 1);
        assert_eq!(report.reprices, 0);
        assert_eq!(engine.positions(), before.as_slice());
    }

    #[tokio::test]
    async fn test_settlement_lookup_failure_defers_fill() {
        let (mut engine, venue) = setup();
        engine.tick(&signal(dec!(1.00)), dec!(1000)).await.unwrap();
        venue.fill(&buy_id(&engine, 0));
        venue.fail_next(
            VenueOp::SettlementTime,
            VenueError::MalformedResponse("no close time".into()),
        );

        let report = engine.tick(&signal(dec!(1.00)), dec!(1000)).await.unwrap();
        assert_eq!(report.errors, 1);
        assert_eq!(engine.positions()[0].buy_order().state(), LegState::Resting);

        let report = engine.tick(&signal(dec!(1.00)), dec!(1000)).await.unwrap();
        assert_eq!(report.fills, 1);
        assert_eq!(engine.positions()[0].buy_order().state(), LegState::Settled);
    }

    #[tokio::test]
    async fn test_unusable_signal_rejected() {
        let (mut engine, venue) = setup();
        let bad = PriceSignal::new(Price::ZERO, Price::ONE, dec!(0.05));

        let result = engine.tick(&bad, dec!(1000)).await;
        assert!(matches!(result, Err(EngineError::Data(_))));
        assert!(venue.calls().is_empty());
        assert_eq!(engine.ticks(), 0);
    }

    #[tokio::test]
    async fn test_vanishing_threshold_skips_tick() {
        let (mut engine, venue) = setup();

        let flat = PriceSignal::new(Price::ONE, Price::ONE, dec!(0));
        let result = engine.tick(&flat, dec!(1000)).await;
        assert!(matches!(result, Err(EngineError::Data(_))));

        // 0.00000000002 is below the 7 dp price precision
        let tiny = PriceSignal::new(Price::ONE, Price::ONE, dec!(0.000000001));
        let result = engine.tick(&tiny, dec!(1000)).await;
        assert!(matches!(result, Err(EngineError::Data(_))));

        assert!(venue.calls().is_empty());
        assert!(engine.positions().is_empty());
        assert_eq!(engine.ticks(), 0);
    }

    #[tokio::test]
    async fn test_vanishing_threshold_leaves_ladder_untouched() {
        let (mut engine, venue) = setup();
        engine.tick(&signal(dec!(1.00)), dec!(1000)).await.unwrap();
        venue.fill(&buy_id(&engine, 0));
        venue.clear_calls();
        let before = engine.positions().to_vec();

        // A settled buy would otherwise sell at the market and open a rung
        // at the fill price on every tick.
        let flat = PriceSignal::new(Price::ONE, Price::ONE, dec!(0));
        for _ in 0..5 {
            assert!(engine.tick(&flat, dec!(1000)).await.is_err());
        }
        assert_eq!(engine.positions(), before.as_slice());
        assert!(venue.calls().is_empty());
        assert_eq!(engine.pending_rungs(), 0);
    }

    #[tokio::test]
    async fn test_non_positive_buy_price_is_skipped() {
        let (mut engine, venue) = setup();
        // threshold 0.2 above a price of 0.1
        let signal = PriceSignal::new(Price::new(dec!(0.1)), Price::ONE, dec!(10));

        let report = engine.tick(&signal, dec!(1000)).await.unwrap();
        assert_eq!(report.errors, 1);
        assert!(engine.positions().is_empty());
        assert_eq!(venue.count(VenueOp::Place), 0);
    }

    #[tokio::test]
    async fn test_archive_completed_positions() {
        let venue = Arc::new(MockVenueClient::new(dec!(1000)));
        let config = GridConfig {
            archive_completed: true,
            ..Default::default()
        };
        let mut engine = GridEngine::new(config, venue.clone());
        engine.tick(&signal(dec!(1.00)), dec!(1000)).await.unwrap();
        venue.fill(&buy_id(&engine, 0));
        engine.tick(&signal(dec!(1.00)), dec!(1000)).await.unwrap();
        engine.tick(&signal(dec!(1.00)), dec!(1000)).await.unwrap();
        venue.fill(&sell_id(&engine, 0));
        engine.tick(&signal(dec!(1.00)), dec!(1000)).await.unwrap();

        assert_eq!(engine.archived().len(), 1);
        assert_eq!(engine.archived()[0].id(), PositionId(1));
        assert_eq!(engine.positions().len(), 2);

        let snapshot = engine.snapshot();
        assert_eq!(snapshot.positions.len(), 3);
        assert!(snapshot.positions[0].archived);
        assert_eq!(snapshot.positions[0].id, PositionId(1));
        assert_eq!(snapshot.tick, 4);
    }

    #[tokio::test]
    async fn test_invariant_violation_isolated() {
        let (mut engine, venue) = setup();
        engine.tick(&signal(dec!(1.00)), dec!(1000)).await.unwrap();

        // Corrupt the rung: selling while the buy still rests.
        engine.positions[0].set_side(OrderSide::Sell);
        engine.positions[0].append(
            OrderSide::Sell,
            grid_core::LedgerRef(99),
            Utc::now(),
            Price::new(dec!(1.001)),
            OrderStatus::Open,
        );
        venue.clear_calls();

        let report = engine.tick(&signal(dec!(1.00)), dec!(1000)).await.unwrap();
        assert_eq!(report.invariant_violations, 1);
        assert_eq!(report.errors, 1);
        assert!(venue.calls().is_empty());
    }
}
