//! Integration tests for grid-bot.
//!
//! These tests drive the engine through full ladder cycles against the
//! paper and mock venues.

pub mod common;
