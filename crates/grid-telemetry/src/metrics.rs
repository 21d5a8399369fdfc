//! Prometheus metrics for the grid ladder bot.
//!
//! # Panics
//!
//! Metric registration uses `unwrap()` intentionally. A registration failure
//! means duplicate metric names, a fatal configuration error that should
//! crash at startup. These panics only occur during static initialization.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_gauge, register_histogram, register_int_counter,
    register_int_gauge, CounterVec, Encoder, Gauge, Histogram, IntCounter, IntGauge, TextEncoder,
};

use crate::error::TelemetryResult;

/// Orders submitted to the venue.
/// Labels: side (buy/sell)
pub static ORDERS_PLACED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "grid_orders_placed_total",
        "Total orders submitted to the venue",
        &["side"]
    )
    .unwrap()
});

/// Resting buy orders repriced.
pub static REPRICES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!("grid_reprices_total", "Total resting buy orders repriced").unwrap()
});

/// Fills detected (including orders that crossed on submission).
/// Labels: side (buy/sell)
pub static FILLS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!("grid_fills_total", "Total order fills detected", &["side"]).unwrap()
});

/// New rungs opened on the ladder.
pub static RUNGS_OPENED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!("grid_rungs_opened_total", "Total positions opened").unwrap()
});

/// Per-position reconciliation failures.
/// Labels: kind (transient/data/invariant)
pub static RECONCILE_ERRORS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "grid_reconcile_errors_total",
        "Total per-position reconciliation failures",
        &["kind"]
    )
    .unwrap()
});

/// Tick duration in milliseconds.
pub static TICK_DURATION_MS: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "grid_tick_duration_ms",
        "Reconciliation tick duration in milliseconds",
        vec![1.0, 5.0, 10.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 5000.0]
    )
    .unwrap()
});

/// Positions on the ladder (hot list plus archive).
pub static LADDER_SIZE: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!("grid_ladder_size", "Positions on the ladder").unwrap()
});

/// Rungs waiting for a placement retry.
pub static PENDING_RUNGS: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!("grid_pending_rungs", "Rungs waiting for a placement retry").unwrap()
});

/// Reprice threshold computed on the last tick.
pub static REPRICE_THRESHOLD: Lazy<Gauge> = Lazy::new(|| {
    register_gauge!(
        "grid_reprice_threshold",
        "Reprice threshold computed on the last tick"
    )
    .unwrap()
});

/// Metrics facade.
pub struct Metrics;

impl Metrics {
    /// Record an order submission.
    pub fn order_placed(side: &str) {
        ORDERS_PLACED_TOTAL.with_label_values(&[side]).inc();
    }

    pub fn order_repriced() {
        REPRICES_TOTAL.inc();
    }

    /// Record a detected fill.
    pub fn fill(side: &str) {
        FILLS_TOTAL.with_label_values(&[side]).inc();
    }

    pub fn rung_opened() {
        RUNGS_OPENED_TOTAL.inc();
    }

    /// Record a reconciliation failure by kind.
    pub fn reconcile_error(kind: &str) {
        RECONCILE_ERRORS_TOTAL.with_label_values(&[kind]).inc();
    }

    pub fn tick_duration(duration_ms: f64) {
        TICK_DURATION_MS.observe(duration_ms);
    }

    pub fn ladder_size(positions: usize, pending: usize) {
        LADDER_SIZE.set(positions as i64);
        PENDING_RUNGS.set(pending as i64);
    }

    pub fn reprice_threshold(threshold: f64) {
        REPRICE_THRESHOLD.set(threshold);
    }

    /// Encode all registered metrics in the Prometheus text format.
    pub fn render() -> TelemetryResult<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&prometheus::gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}
