//! Spot-price driven relay controller.
//!
//! Periodically fetches a remote on/off schedule for a single relay channel,
//! actuates the channel at each scheduled transition, and serves a read-only
//! status view joined with day-ahead spot prices.

#[cfg(feature = "api")]
pub mod api;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod fetch;
pub mod io;
/// Control schedule model and timeline projection.
pub mod schedule;
