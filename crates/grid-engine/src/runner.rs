//! Fixed-interval driver for the engine.

use std::sync::Arc;
use std::time::Duration;

use grid_telemetry::Metrics;
use grid_venue::PriceFeed;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::engine::{GridEngine, TickReport};
use crate::error::EngineError;
use crate::snapshot::LadderSnapshot;

/// Runs one engine tick per interval until cancelled.
///
/// Reads the price signal and counter balance once per tick and publishes
/// the ladder snapshot after every tick.
pub struct EngineRunner {
    engine: GridEngine,
    feed: Arc<dyn PriceFeed>,
    interval: Duration,
    snapshot_tx: watch::Sender<LadderSnapshot>,
    shutdown_token: CancellationToken,
}

impl EngineRunner {
    pub fn new(
        engine: GridEngine,
        feed: Arc<dyn PriceFeed>,
    ) -> (Self, watch::Receiver<LadderSnapshot>) {
        let (snapshot_tx, snapshot_rx) = watch::channel(engine.snapshot());
        let interval = engine.config().tick_interval();
        let runner = Self {
            engine,
            feed,
            interval,
            snapshot_tx,
            shutdown_token: CancellationToken::new(),
        };
        (runner, snapshot_rx)
    }

    /// Token that stops the loop at the top of the next tick.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    pub fn engine(&self) -> &GridEngine {
        &self.engine
    }

    /// Run a single tick. Returns `None` when the tick was skipped.
    pub async fn run_once(&mut self) -> Option<TickReport> {
        let report = self.step().await;
        self.snapshot_tx.send_replace(self.engine.snapshot());
        report
    }

    async fn step(&mut self) -> Option<TickReport> {
        let Some(signal) = self.feed.latest() else {
            debug!("No price signal yet, skipping tick");
            return None;
        };

        let balance = match self.engine.venue().counter_balance().await {
            Ok(balance) => balance,
            Err(e) => {
                let e = EngineError::from(e);
                Metrics::reconcile_error(e.kind().as_str());
                warn!(error = %e, "Balance unavailable, skipping tick");
                return None;
            }
        };

        match self.engine.tick(&signal, balance).await {
            Ok(report) => Some(report),
            Err(e) => {
                Metrics::reconcile_error(e.kind().as_str());
                warn!(error = %e, "Tick skipped");
                None
            }
        }
    }

    /// Loop until the shutdown token is cancelled, then hand the engine back.
    ///
    /// A tick in progress always completes before the loop exits.
    pub async fn run(mut self) -> GridEngine {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(interval_ms = self.interval.as_millis() as u64, "Engine runner started");

        loop {
            tokio::select! {
                biased;
                () = self.shutdown_token.cancelled() => break,
                _ = ticker.tick() => {
                    if self.shutdown_token.is_cancelled() {
                        break;
                    }
                    self.run_once().await;
                }
            }
        }

        info!(ticks = self.engine.ticks(), "Engine runner stopped");
        self.engine
    }
}
