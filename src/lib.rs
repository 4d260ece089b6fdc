//! Payout Sentinel: payout acquisition and asset switching engine.
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod types;
pub mod surface;
pub mod engine;
pub mod control;
