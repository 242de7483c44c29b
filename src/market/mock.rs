//! Scripted gateway for unit tests.
//!
//! Fills every order at the current top of book, records an order
//! journal for assertions, and supports per-call failure injection to
//! exercise the partial-failure paths of the engines.

use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use super::traits::MarketGateway;
use super::types::{Balance, BestPrices, Fill, OrderSide};
use crate::error::{EngineError, Result};

/// One recorded order execution.
#[derive(Debug, Clone)]
pub struct MockOrder {
    pub symbol: String,
    pub side: OrderSide,
    pub size: Decimal,
    pub avg_price: Decimal,
}

#[derive(Debug, Default)]
struct MockState {
    books: HashMap<String, BestPrices>,
    orders: Vec<MockOrder>,
    /// Countdown to the next injected order failure. `Some(1)` fails the
    /// next order, `Some(2)` the one after, etc.
    fail_order_in: Option<u32>,
    fail_prices: bool,
    fail_balance: bool,
    balance: Decimal,
}

/// Scripted market gateway.
#[derive(Clone)]
pub struct MockMarket {
    state: Arc<RwLock<MockState>>,
}

impl MockMarket {
    pub fn new() -> Self {
        let state = MockState {
            balance: dec!(10000),
            ..MockState::default()
        };
        Self {
            state: Arc::new(RwLock::new(state)),
        }
    }

    /// Set the book for a symbol.
    pub async fn set_book(&self, symbol: &str, bid: Decimal, ask: Decimal) {
        self.state
            .write()
            .await
            .books
            .insert(symbol.to_string(), BestPrices { bid, ask });
    }

    /// Make the nth upcoming order fail (1 = the very next order).
    pub async fn fail_nth_order(&self, n: u32) {
        self.state.write().await.fail_order_in = Some(n);
    }

    /// Make price reads fail until cleared.
    pub async fn fail_prices(&self, fail: bool) {
        self.state.write().await.fail_prices = fail;
    }

    /// Make balance reads fail until cleared.
    pub async fn fail_balance(&self, fail: bool) {
        self.state.write().await.fail_balance = fail;
    }

    /// All orders executed so far, oldest first.
    pub async fn orders(&self) -> Vec<MockOrder> {
        self.state.read().await.orders.clone()
    }

    /// Number of orders executed so far.
    pub async fn order_count(&self) -> usize {
        self.state.read().await.orders.len()
    }

    async fn execute(&self, symbol: &str, side: OrderSide, size: Decimal) -> Result<Fill> {
        let mut state = self.state.write().await;

        if let Some(countdown) = state.fail_order_in {
            if countdown <= 1 {
                state.fail_order_in = None;
                return Err(EngineError::OrderRejected("injected failure".into()));
            }
            state.fail_order_in = Some(countdown - 1);
        }

        let book = state.books.get(symbol).copied().ok_or_else(|| {
            EngineError::OrderRejected(format!("no book for symbol {}", symbol))
        })?;

        // Market buys lift the ask, market sells hit the bid.
        let avg_price = match side {
            OrderSide::Buy => book.ask,
            OrderSide::Sell => book.bid,
        };

        state.orders.push(MockOrder {
            symbol: symbol.to_string(),
            side,
            size,
            avg_price,
        });

        debug!(%symbol, ?side, %size, %avg_price, "Mock fill");

        Ok(Fill {
            avg_price,
            filled_size: size,
        })
    }
}

impl Default for MockMarket {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MarketGateway for MockMarket {
    async fn best_prices(&self, symbol: &str) -> Result<BestPrices> {
        let state = self.state.read().await;
        if state.fail_prices {
            return Err(EngineError::MarketUnavailable("injected failure".into()));
        }
        state.books.get(symbol).copied().ok_or_else(|| {
            EngineError::MarketUnavailable(format!("no book for symbol {}", symbol))
        })
    }

    async fn open_long(&self, symbol: &str, size: Decimal) -> Result<Fill> {
        self.execute(symbol, OrderSide::Buy, size).await
    }

    async fn open_short(&self, symbol: &str, size: Decimal) -> Result<Fill> {
        self.execute(symbol, OrderSide::Sell, size).await
    }

    async fn balance(&self, _asset: &str) -> Result<Balance> {
        let state = self.state.read().await;
        if state.fail_balance {
            return Err(EngineError::MarketUnavailable("injected failure".into()));
        }
        Ok(Balance {
            equity: state.balance,
            available: state.balance,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fills_at_top_of_book() {
        let market = MockMarket::new();
        market.set_book("BTCUSDT", dec!(999), dec!(1001)).await;

        let buy = market.open_long("BTCUSDT", dec!(2)).await.unwrap();
        assert_eq!(buy.avg_price, dec!(1001));
        assert_eq!(buy.filled_size, dec!(2));

        let sell = market.open_short("BTCUSDT", dec!(1)).await.unwrap();
        assert_eq!(sell.avg_price, dec!(999));

        assert_eq!(market.order_count().await, 2);
    }

    #[tokio::test]
    async fn test_nth_order_failure_is_one_shot() {
        let market = MockMarket::new();
        market.set_book("BTCUSDT", dec!(999), dec!(1001)).await;
        market.fail_nth_order(2).await;

        assert!(market.open_long("BTCUSDT", dec!(1)).await.is_ok());
        assert!(market.open_long("BTCUSDT", dec!(1)).await.is_err());
        assert!(market.open_long("BTCUSDT", dec!(1)).await.is_ok());
    }
}
