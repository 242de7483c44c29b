//! Venue-agnostic gateway trait consumed by the decision engines.
//!
//! Keeps the engines independent of any one exchange API: everything a
//! strategy needs is a price snapshot, two market-order entry points and
//! a balance read. Order calls are awaited to completion before the
//! engine proceeds to its next decision step within a tick.

use async_trait::async_trait;
use rust_decimal::Decimal;

use super::types::{Balance, BestPrices, Fill};
use crate::error::Result;

/// Gateway to a margin exchange.
///
/// Errors map onto the engine taxonomy: reads fail with
/// `MarketUnavailable`, executions with `OrderRejected`.
#[async_trait]
pub trait MarketGateway: Send + Sync {
    /// Best bid/ask snapshot for a symbol.
    async fn best_prices(&self, symbol: &str) -> Result<BestPrices>;

    /// Open a long (buy) at market for `size`.
    async fn open_long(&self, symbol: &str, size: Decimal) -> Result<Fill>;

    /// Open a short (sell) at market for `size`.
    async fn open_short(&self, symbol: &str, size: Decimal) -> Result<Fill>;

    /// Equity and available balance for one asset.
    async fn balance(&self, asset: &str) -> Result<Balance>;
}
