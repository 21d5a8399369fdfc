//! Main application orchestration.
//!
//! Runs three tasks until ctrl-c:
//! - market replay: pushes the next price into the feed and marks the
//!   paper venue, filling any crossed offers
//! - engine runner: one reconciliation tick per interval
//! - status server (optional)

use std::sync::Arc;
use std::time::Duration;

use grid_engine::{EngineRunner, GridEngine};
use grid_venue::{PaperVenue, RollingPriceFeed};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::config::AppConfig;
use crate::error::{AppError, AppResult};
use crate::replay::PriceReplay;
use crate::status;

/// Main application.
pub struct Application {
    config: AppConfig,
    replay: PriceReplay,
}

impl Application {
    /// Validate the configuration and load the price replay.
    pub fn new(config: AppConfig) -> AppResult<Self> {
        config.validate()?;
        let replay = PriceReplay::from_file(&config.paper.price_path)?;
        info!(
            path = %config.paper.price_path,
            prices = replay.len(),
            "Price replay loaded"
        );
        Ok(Self { config, replay })
    }

    pub async fn run(self) -> AppResult<()> {
        let Self { config, replay } = self;

        let venue = Arc::new(PaperVenue::new(
            config.paper.base_balance,
            config.paper.counter_balance,
        ));
        let feed = Arc::new(
            RollingPriceFeed::new(config.feed.window).with_min_samples(config.feed.min_samples),
        );

        let engine = GridEngine::new(config.grid.clone(), venue.clone());
        let (runner, snapshot_rx) = EngineRunner::new(engine, feed.clone());
        let shutdown_token = runner.shutdown_token();

        info!(
            pair = %config.pair,
            base_balance = %config.paper.base_balance,
            counter_balance = %config.paper.counter_balance,
            tick_interval_ms = config.grid.tick_interval_ms,
            "Paper trading started"
        );

        let market = tokio::spawn(run_market(
            replay,
            feed,
            venue.clone(),
            config.paper.price_interval(),
            shutdown_token.clone(),
        ));

        let status: Option<JoinHandle<()>> = if config.status.enabled {
            let port = config.status.port;
            let token = shutdown_token.clone();
            Some(tokio::spawn(async move {
                if let Err(e) = status::run_server(port, snapshot_rx, token).await {
                    error!(port, error = %e, "Status server failed");
                }
            }))
        } else {
            None
        };

        let runner = tokio::spawn(runner.run());

        tokio::signal::ctrl_c().await?;
        info!("Shutdown signal received");
        shutdown_token.cancel();

        let engine = runner
            .await
            .map_err(|e| AppError::Task(format!("engine runner: {e}")))?;
        market
            .await
            .map_err(|e| AppError::Task(format!("market replay: {e}")))?;
        if let Some(status) = status {
            status
                .await
                .map_err(|e| AppError::Task(format!("status server: {e}")))?;
        }

        let snapshot = engine.snapshot();
        let (base, counter) = venue.balances();
        info!(
            ticks = engine.ticks(),
            positions = snapshot.positions.len(),
            resting = snapshot.resting_count(),
            pending_rungs = snapshot.pending_rungs,
            base_balance = %base,
            counter_balance = %counter,
            "Shutting down"
        );

        Ok(())
    }
}

/// Replay prices into the feed and the paper venue until cancelled.
async fn run_market(
    mut replay: PriceReplay,
    feed: Arc<RollingPriceFeed>,
    venue: Arc<PaperVenue>,
    interval: Duration,
    shutdown_token: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            () = shutdown_token.cancelled() => break,
            _ = ticker.tick() => {
                let price = replay.next_price();
                feed.push(price);
                let filled = venue.mark_price(price);
                debug!(price = %price, filled = filled.len(), "Market price replayed");
            }
        }
    }
}
