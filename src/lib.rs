//! # Martingale Grid Bot
//!
//! Automated trading decision engines for crypto margin exchanges.
//! Converts a stream of best bid/ask observations into market order
//! actions while tracking open exposure and risk limits.
//!
//! ## Architecture
//!
//! - `config`: Configuration management and validation
//! - `market`: Exchange gateway (REST client, paper trading, test mock)
//! - `strategy`: The two decision engines and the tick driver
//!   - Martingale: single short position, doubled on each stop-loss crossing
//!   - Ladder: bounded grid of price levels with LIFO take-profit and
//!     FIFO stop-loss eviction
//! - `error`: Error taxonomy shared across the crate

pub mod config;
pub mod error;
pub mod market;
pub mod strategy;

pub use config::Config;
pub use error::{EngineError, Result};
