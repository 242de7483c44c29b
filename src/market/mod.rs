//! Exchange gateway for the trading engines.
//!
//! The engines only ever see the [`MarketGateway`] trait: read best
//! bid/ask, open a long or short at market, read the account balance.
//! Three implementations are provided:
//! - `BinanceFuturesClient`: live REST gateway (USDT-M futures)
//! - `PaperMarket`: live prices, simulated fills
//! - `MockMarket`: fully scripted, for unit tests

mod client;
pub mod mock;
mod paper;
mod traits;
mod types;

pub use client::BinanceFuturesClient;
pub use mock::MockMarket;
pub use paper::{PaperFill, PaperMarket};
pub use traits::MarketGateway;
pub use types::*;
