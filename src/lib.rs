//! Environment core for a multi-exchange trading framework: composes
//! exchange sessions, reconciles trade history, seeds indicators from
//! historical candles, wires the streaming event fabric, and routes
//! notifications. See `SPEC_FULL.md` for the full component breakdown.

pub mod config;
pub mod environment;
pub mod error;
pub mod market_data;
pub mod market_metadata;
pub mod notification;
pub mod persistence;
pub mod ports;
pub mod session;
pub mod testing;
pub mod trade_sync;
pub mod types;

pub use environment::Environment;
pub use error::{EnvironmentError, Result};
