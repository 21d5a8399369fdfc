//! Venue client and price feed capabilities for the grid ladder bot.
//!
//! The reconciliation engine never talks to a venue directly. It calls
//! into the [`VenueClient`] and [`PriceFeed`] traits defined here.
//!
//! # Key Components
//!
//! - [`VenueClient`]: place / reprice / poll orders, resolve ledger settlement times
//! - [`MockVenueClient`]: scriptable test double that records every call
//! - [`PaperVenue`]: in-memory simulated venue for paper trading
//! - [`RollingPriceFeed`]: rolling window of pushed trade prices

pub mod client;
pub mod error;
pub mod feed;
pub mod mock;
pub mod paper;

pub use client::{BoxFuture, DynVenueClient, OrderReceipt, VenueClient};
pub use error::{VenueError, VenueResult};
pub use feed::{PriceFeed, RollingPriceFeed};
pub use mock::{MockVenueClient, VenueCall, VenueOp};
pub use paper::PaperVenue;
