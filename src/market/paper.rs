//! Paper trading gateway: live prices, simulated fills.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

use super::traits::MarketGateway;
use super::types::{Balance, BestPrices, Fill, OrderSide};
use crate::error::Result;

/// One simulated execution.
#[derive(Debug, Clone)]
pub struct PaperFill {
    pub time: DateTime<Utc>,
    pub symbol: String,
    pub side: OrderSide,
    pub size: Decimal,
    pub avg_price: Decimal,
}

#[derive(Debug)]
struct PaperState {
    balance: Decimal,
    fills: Vec<PaperFill>,
}

/// Gateway that reads prices from a real venue but fills orders
/// instantly at the top of book against a simulated balance.
pub struct PaperMarket<G> {
    feed: G,
    state: Arc<RwLock<PaperState>>,
}

impl<G: MarketGateway> PaperMarket<G> {
    pub fn new(feed: G, initial_balance: Decimal) -> Self {
        Self {
            feed,
            state: Arc::new(RwLock::new(PaperState {
                balance: initial_balance,
                fills: Vec::new(),
            })),
        }
    }

    /// All simulated fills so far, oldest first.
    pub async fn fills(&self) -> Vec<PaperFill> {
        self.state.read().await.fills.clone()
    }

    async fn simulate_fill(&self, symbol: &str, side: OrderSide, size: Decimal) -> Result<Fill> {
        let book = self.feed.best_prices(symbol).await?;
        let avg_price = match side {
            OrderSide::Buy => book.ask,
            OrderSide::Sell => book.bid,
        };

        let fill = PaperFill {
            time: Utc::now(),
            symbol: symbol.to_string(),
            side,
            size,
            avg_price,
        };

        let mut state = self.state.write().await;
        state.fills.push(fill);

        info!(
            %symbol,
            ?side,
            %size,
            %avg_price,
            fills = state.fills.len(),
            "Paper fill"
        );

        Ok(Fill {
            avg_price,
            filled_size: size,
        })
    }
}

#[async_trait]
impl<G: MarketGateway> MarketGateway for PaperMarket<G> {
    async fn best_prices(&self, symbol: &str) -> Result<BestPrices> {
        self.feed.best_prices(symbol).await
    }

    async fn open_long(&self, symbol: &str, size: Decimal) -> Result<Fill> {
        self.simulate_fill(symbol, OrderSide::Buy, size).await
    }

    async fn open_short(&self, symbol: &str, size: Decimal) -> Result<Fill> {
        self.simulate_fill(symbol, OrderSide::Sell, size).await
    }

    async fn balance(&self, _asset: &str) -> Result<Balance> {
        let state = self.state.read().await;
        Ok(Balance {
            equity: state.balance,
            available: state.balance,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::MockMarket;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_paper_fills_use_feed_prices() {
        let feed = MockMarket::new();
        feed.set_book("BTCUSDT", dec!(49990), dec!(50010)).await;

        let paper = PaperMarket::new(feed, dec!(10000));
        let fill = paper.open_short("BTCUSDT", dec!(1)).await.unwrap();
        assert_eq!(fill.avg_price, dec!(49990));

        let fills = paper.fills().await;
        assert_eq!(fills.len(), 1);
        assert_eq!(fills[0].side, OrderSide::Sell);
    }
}
