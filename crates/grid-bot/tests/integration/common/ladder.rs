//! Shared ladder helpers.

use grid_core::{LegState, OrderSide, OrderStatus, Price, PriceSignal};
use grid_engine::GridEngine;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Signal with a fixed 0.05 std dev: threshold 0.001 at the default interval.
pub fn signal(current: Decimal) -> PriceSignal {
    PriceSignal::new(Price::new(current), Price::new(current), dec!(0.05))
}

/// Deterministic oscillating market around 1.0.
pub fn wave_price(step: u32) -> Price {
    let x = f64::from(step);
    let raw = 1.0 + 0.02 * (x / 5.0).sin() + 0.004 * (x / 1.7).sin();
    let value = Decimal::from_f64(raw).unwrap_or(Decimal::ONE).round_dp(4);
    Price::new(value)
}

/// Structural checks that must hold after every tick.
///
/// With no pending rungs, the ladder is the bootstrap rung plus one rung
/// per sell placed plus one per sell filled.
pub fn assert_ladder_consistent(engine: &GridEngine) {
    let positions = engine.positions();
    for position in positions {
        assert_eq!(
            position.invariant_violation(),
            None,
            "position {} broken",
            position.id()
        );

        let resting = [position.buy_order(), position.sell_order()]
            .iter()
            .filter(|leg| leg.state() == LegState::Resting)
            .count();
        assert!(resting <= 1, "position {} has two resting legs", position.id());

        let sell_opens = position
            .sell_order()
            .history()
            .iter()
            .filter(|r| r.status == OrderStatus::Open)
            .count();
        assert!(sell_opens <= 1, "sell leg of {} was repriced", position.id());
    }

    if engine.pending_rungs() == 0 && !positions.is_empty() {
        let selling = positions
            .iter()
            .filter(|p| p.side() == OrderSide::Sell)
            .count();
        let complete = positions.iter().filter(|p| p.is_complete()).count();
        assert_eq!(positions.len(), 1 + selling + complete);
    }
}

/// Counter units still locked in resting buys.
pub fn reserved_counter(engine: &GridEngine) -> Decimal {
    engine
        .positions()
        .iter()
        .filter(|p| p.side() == OrderSide::Buy && p.buy_order().state() == LegState::Resting)
        .filter_map(|p| {
            p.buy_order()
                .last_price()
                .ok()
                .map(|price| p.base_amount().notional(price))
        })
        .sum()
}
