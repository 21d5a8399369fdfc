//! Grid ladder reconciliation engine.
//!
//! Keeps a ladder of buy/sell rungs in step with a venue: each tick it
//! polls resting orders, reprices buys that the market has left behind,
//! places sells for filled buys and opens a new rung for every fill.
//!
//! # Key Components
//!
//! - [`GridEngine`]: position list and per-tick state machine
//! - [`LadderPricing`]: threshold and rung prices for one tick
//! - [`EngineRunner`]: fixed-interval loop with snapshot publishing
//! - [`GridConfig`]: ladder tuning

pub mod config;
pub mod engine;
pub mod error;
pub mod pricing;
pub mod runner;
pub mod snapshot;

pub use config::GridConfig;
pub use engine::{GridEngine, TickReport};
pub use error::{EngineError, EngineResult, ErrorKind};
pub use pricing::{reprice_threshold, LadderPricing};
pub use runner::EngineRunner;
pub use snapshot::{LadderSnapshot, LegSnapshot, PositionSnapshot};
