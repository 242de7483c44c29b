//! Martingale engine: a single short position, doubled on each
//! stop-loss crossing.
//!
//! The engine is short-biased: it opens a short of `first_amount` when
//! flat, takes profit when the ask rises `stop_win` above the entry, and
//! on a `stop_loss` crossing flattens the old lot and re-shorts double
//! the size. `max_gear` bounds the number of doublings; once reached the
//! position is held with take-profit as the only remaining exit.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::Strategy;
use crate::config::MartingaleConfig;
use crate::error::Result;
use crate::market::MarketGateway;

/// Net open short exposure. `size == 0` means flat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub entry_price: Decimal,
    pub size: Decimal,
}

impl Position {
    pub fn is_flat(&self) -> bool {
        self.size.is_zero()
    }
}

/// The martingale decision engine.
pub struct MartingaleEngine {
    config: MartingaleConfig,
    currency: String,
    market: Arc<dyn MarketGateway>,
    position: Position,
    /// Doublings since the position was last flat. Reset to 0 on flat.
    gear: u32,
}

impl MartingaleEngine {
    /// Build an engine over a validated configuration. Parameter
    /// violations are fatal: the engine never starts.
    pub fn new(
        config: MartingaleConfig,
        currency: String,
        market: Arc<dyn MarketGateway>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            currency,
            market,
            position: Position::default(),
            gear: 0,
        })
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn gear(&self) -> u32 {
        self.gear
    }

    /// Open the initial short from a flat book.
    async fn open_first(&mut self) -> Result<()> {
        let fill = self
            .market
            .open_short(&self.config.symbol, self.config.first_amount)
            .await?;
        self.position = Position {
            entry_price: fill.avg_price,
            size: fill.filled_size,
        };
        info!(
            symbol = %self.config.symbol,
            entry = %self.position.entry_price,
            size = %self.position.size,
            "Opened initial short"
        );
        Ok(())
    }

    /// Buy back the whole position at market and reset to flat.
    async fn take_profit(&mut self, ask: Decimal) -> Result<()> {
        let fill = self
            .market
            .open_long(&self.config.symbol, self.position.size)
            .await?;
        info!(
            symbol = %self.config.symbol,
            entry = %self.position.entry_price,
            %ask,
            cover = %fill.avg_price,
            size = %fill.filled_size,
            gear = self.gear,
            "Take profit: position closed"
        );
        self.position = Position::default();
        self.gear = 0;
        Ok(())
    }

    /// Flatten the current lot, then re-short double the size.
    ///
    /// If the buy-back fails the step aborts before the new short. If the
    /// buy-back succeeds but the new short fails, the exchange is flat
    /// while `position` still carries the old lot; the stale fields are
    /// not reconciled and the next tick decides from them as-is.
    async fn double_down(&mut self) -> Result<()> {
        self.market
            .open_long(&self.config.symbol, self.position.size)
            .await?;

        let doubled = self.position.size * dec!(2);
        let fill = match self.market.open_short(&self.config.symbol, doubled).await {
            Ok(fill) => fill,
            Err(e) => {
                warn!(
                    symbol = %self.config.symbol,
                    stale_entry = %self.position.entry_price,
                    stale_size = %self.position.size,
                    "Re-short after buy-back failed; position fields are stale"
                );
                return Err(e);
            }
        };

        self.position = Position {
            entry_price: fill.avg_price,
            size: fill.filled_size,
        };
        self.gear += 1;
        info!(
            symbol = %self.config.symbol,
            entry = %self.position.entry_price,
            size = %self.position.size,
            gear = self.gear,
            "Doubled down"
        );
        Ok(())
    }
}

#[async_trait::async_trait]
impl Strategy for MartingaleEngine {
    async fn initialize(&mut self) -> Result<()> {
        info!(
            symbol = %self.config.symbol,
            stop_win = %self.config.stop_win,
            stop_loss = %self.config.stop_loss,
            first_amount = %self.config.first_amount,
            max_gear = self.config.max_gear,
            "Martingale engine initialized"
        );

        match self.market.balance(&self.currency).await {
            Ok(balance) => info!(
                currency = %self.currency,
                equity = %balance.equity,
                available = %balance.available,
                "Starting balance"
            ),
            Err(e) => warn!(currency = %self.currency, error = %e, "Balance query failed"),
        }

        Ok(())
    }

    async fn on_tick(&mut self) -> Result<()> {
        let prices = self.market.best_prices(&self.config.symbol).await?;

        if self.position.is_flat() {
            self.open_first().await?;
        } else if prices.ask > self.position.entry_price + self.config.stop_win {
            // Take-profit wins over double-down when both could fire.
            self.take_profit(prices.ask).await?;
        } else if prices.ask < self.position.entry_price - self.config.stop_loss
            && self.gear < self.config.max_gear
        {
            self.double_down().await?;
        }

        debug!(
            gear = self.gear,
            entry = %self.position.entry_price,
            size = %self.position.size,
            bid = %prices.bid,
            ask = %prices.ask,
            "Tick complete"
        );
        Ok(())
    }

    async fn shutdown(&mut self) -> Result<()> {
        info!(
            symbol = %self.config.symbol,
            gear = self.gear,
            size = %self.position.size,
            "Martingale engine stopped"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::{MockMarket, OrderSide};

    const SYMBOL: &str = "BTCUSD";

    fn test_config() -> MartingaleConfig {
        MartingaleConfig {
            symbol: SYMBOL.to_string(),
            stop_win: dec!(5),
            stop_loss: dec!(5),
            first_amount: dec!(1),
            max_gear: 8,
        }
    }

    fn engine_with(market: &MockMarket) -> MartingaleEngine {
        MartingaleEngine::new(test_config(), "BTC".to_string(), Arc::new(market.clone()))
            .unwrap()
    }

    fn holding(engine: &mut MartingaleEngine, entry: Decimal, size: Decimal, gear: u32) {
        engine.position = Position {
            entry_price: entry,
            size,
        };
        engine.gear = gear;
    }

    #[tokio::test]
    async fn test_flat_tick_opens_first_short() {
        let market = MockMarket::new();
        market.set_book(SYMBOL, dec!(100), dec!(101)).await;
        let mut engine = engine_with(&market);

        engine.on_tick().await.unwrap();

        let orders = market.orders().await;
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].side, OrderSide::Sell);
        assert_eq!(orders[0].size, dec!(1));
        // Short fills at the bid.
        assert_eq!(engine.position(), Position { entry_price: dec!(100), size: dec!(1) });
        assert_eq!(engine.gear(), 0);
    }

    #[tokio::test]
    async fn test_take_profit_closes_and_resets_gear() {
        let market = MockMarket::new();
        market.set_book(SYMBOL, dec!(105), dec!(106)).await;
        let mut engine = engine_with(&market);
        holding(&mut engine, dec!(100), dec!(1), 3);

        engine.on_tick().await.unwrap();

        let orders = market.orders().await;
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].side, OrderSide::Buy);
        assert_eq!(orders[0].size, dec!(1));
        assert!(engine.position().is_flat());
        assert_eq!(engine.gear(), 0);
    }

    #[tokio::test]
    async fn test_double_down_buys_back_and_reshorts_double() {
        let market = MockMarket::new();
        market.set_book(SYMBOL, dec!(93), dec!(94)).await;
        let mut engine = engine_with(&market);
        holding(&mut engine, dec!(100), dec!(1), 0);

        engine.on_tick().await.unwrap();

        let orders = market.orders().await;
        assert_eq!(orders.len(), 2);
        assert_eq!(orders[0].side, OrderSide::Buy);
        assert_eq!(orders[0].size, dec!(1));
        assert_eq!(orders[1].side, OrderSide::Sell);
        assert_eq!(orders[1].size, dec!(2));
        assert_eq!(engine.gear(), 1);
        assert_eq!(engine.position().size, dec!(2));
        assert_eq!(engine.position().entry_price, dec!(93));
    }

    #[tokio::test]
    async fn test_max_gear_halts_doubling() {
        let market = MockMarket::new();
        market.set_book(SYMBOL, dec!(93), dec!(94)).await;
        let mut engine = engine_with(&market);
        holding(&mut engine, dec!(100), dec!(8), 8);

        engine.on_tick().await.unwrap();

        // Held: no orders, no state change, only take-profit could exit.
        assert_eq!(market.order_count().await, 0);
        assert_eq!(engine.gear(), 8);
        assert_eq!(engine.position().size, dec!(8));
    }

    #[tokio::test]
    async fn test_tick_is_idempotent_between_thresholds() {
        let market = MockMarket::new();
        market.set_book(SYMBOL, dec!(101), dec!(102)).await;
        let mut engine = engine_with(&market);
        holding(&mut engine, dec!(100), dec!(2), 1);

        engine.on_tick().await.unwrap();
        engine.on_tick().await.unwrap();

        assert_eq!(market.order_count().await, 0);
        assert_eq!(engine.position(), Position { entry_price: dec!(100), size: dec!(2) });
        assert_eq!(engine.gear(), 1);
    }

    #[tokio::test]
    async fn test_price_read_failure_is_a_noop() {
        let market = MockMarket::new();
        market.set_book(SYMBOL, dec!(100), dec!(101)).await;
        market.fail_prices(true).await;
        let mut engine = engine_with(&market);
        holding(&mut engine, dec!(100), dec!(1), 2);

        assert!(engine.on_tick().await.is_err());
        assert_eq!(market.order_count().await, 0);
        assert_eq!(engine.position().size, dec!(1));
        assert_eq!(engine.gear(), 2);
    }

    #[tokio::test]
    async fn test_failed_take_profit_leaves_state_for_retry() {
        let market = MockMarket::new();
        market.set_book(SYMBOL, dec!(105), dec!(106)).await;
        market.fail_nth_order(1).await;
        let mut engine = engine_with(&market);
        holding(&mut engine, dec!(100), dec!(1), 2);

        assert!(engine.on_tick().await.is_err());
        assert_eq!(engine.position().size, dec!(1));
        assert_eq!(engine.gear(), 2);

        // Next tick retries the same decision and succeeds.
        engine.on_tick().await.unwrap();
        assert!(engine.position().is_flat());
        assert_eq!(engine.gear(), 0);
    }

    #[tokio::test]
    async fn test_failed_buy_back_aborts_before_reshort() {
        let market = MockMarket::new();
        market.set_book(SYMBOL, dec!(93), dec!(94)).await;
        market.fail_nth_order(1).await;
        let mut engine = engine_with(&market);
        holding(&mut engine, dec!(100), dec!(1), 0);

        assert!(engine.on_tick().await.is_err());
        // No second leg was attempted.
        assert_eq!(market.order_count().await, 0);
        assert_eq!(engine.position(), Position { entry_price: dec!(100), size: dec!(1) });
        assert_eq!(engine.gear(), 0);
    }

    #[tokio::test]
    async fn test_failed_reshort_leaves_stale_position() {
        let market = MockMarket::new();
        market.set_book(SYMBOL, dec!(93), dec!(94)).await;
        market.fail_nth_order(2).await;
        let mut engine = engine_with(&market);
        holding(&mut engine, dec!(100), dec!(1), 0);

        assert!(engine.on_tick().await.is_err());

        // The buy-back went through, so the exchange is flat, but the
        // engine still carries the old lot and an un-incremented gear.
        // This stale window exists only immediately after the failure.
        let orders = market.orders().await;
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].side, OrderSide::Buy);
        assert_eq!(engine.position(), Position { entry_price: dec!(100), size: dec!(1) });
        assert_eq!(engine.gear(), 0);
    }

    #[tokio::test]
    async fn test_flat_implies_zero_gear_after_any_successful_tick() {
        let market = MockMarket::new();
        market.set_book(SYMBOL, dec!(105), dec!(106)).await;
        let mut engine = engine_with(&market);
        holding(&mut engine, dec!(100), dec!(4), 5);

        engine.on_tick().await.unwrap();
        if engine.position().is_flat() {
            assert_eq!(engine.gear(), 0);
        }
    }

    #[tokio::test]
    async fn test_initialize_survives_balance_failure() {
        let market = MockMarket::new();
        market.fail_balance(true).await;
        let mut engine = engine_with(&market);
        assert!(engine.initialize().await.is_ok());
    }

    #[tokio::test]
    async fn test_bad_config_never_starts() {
        let market = MockMarket::new();
        let mut config = test_config();
        config.stop_win = Decimal::ZERO;
        let result = MartingaleEngine::new(config, "BTC".to_string(), Arc::new(market.clone()));
        assert!(result.is_err());
    }
}
