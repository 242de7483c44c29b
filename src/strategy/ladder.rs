//! Ladder engine: a bounded grid of price levels grown in the trend
//! direction.
//!
//! Rungs are appended at the tail as price trends away, take-profit
//! closes the tail (most recent rung, LIFO) on a favorable reversion,
//! and when the ladder overflows `grid_num` the head (oldest rung, FIFO)
//! is evicted at a loss. Take-profit and eviction are mutually exclusive
//! within one tick; growth can co-occur with either.

use rust_decimal::Decimal;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{Direction, Strategy};
use crate::config::LadderConfig;
use crate::error::{EngineError, Result};
use crate::market::{BestPrices, Fill, MarketGateway};

/// One rung of the price ladder: a still-open lot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Level {
    /// Nominal ladder price assigned when the rung was created.
    pub open_price: Decimal,
    /// Actual fill price of the opening order. Zero if the order failed.
    pub hold_price: Decimal,
    /// Actual filled size of the opening order. Zero if the order failed.
    pub hold_size: Decimal,
    /// Price at which this rung is taken profit.
    pub cover_price: Decimal,
}

/// Ordered rung collection: grown at the tail, profit-closed at the
/// tail, loss-closed at the head. Order of unremoved rungs is preserved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ladder {
    levels: VecDeque<Level>,
}

impl Ladder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn head(&self) -> Option<&Level> {
        self.levels.front()
    }

    pub fn tail(&self) -> Option<&Level> {
        self.levels.back()
    }

    pub fn tail_mut(&mut self) -> Option<&mut Level> {
        self.levels.back_mut()
    }

    pub fn push_tail(&mut self, level: Level) {
        self.levels.push_back(level);
    }

    pub fn pop_tail(&mut self) -> Option<Level> {
        self.levels.pop_back()
    }

    pub fn pop_head(&mut self) -> Option<Level> {
        self.levels.pop_front()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Level> {
        self.levels.iter()
    }
}

/// The grid decision engine.
pub struct LadderEngine {
    config: LadderConfig,
    direction: Direction,
    currency: String,
    market: Arc<dyn MarketGateway>,
    ladder: Ladder,
    stop_win_count: u64,
    stop_loss_count: u64,
}

impl LadderEngine {
    /// Build an engine over a validated configuration. Parameter
    /// violations are fatal: the engine never starts.
    pub fn new(
        config: LadderConfig,
        currency: String,
        market: Arc<dyn MarketGateway>,
    ) -> Result<Self> {
        config.validate()?;
        let direction = Direction::from_sign(config.direction).ok_or_else(|| {
            EngineError::InvalidConfig("direction must be 1 (up) or -1 (down)".into())
        })?;
        Ok(Self {
            config,
            direction,
            currency,
            market,
            ladder: Ladder::new(),
            stop_win_count: 0,
            stop_loss_count: 0,
        })
    }

    pub fn ladder(&self) -> &Ladder {
        &self.ladder
    }

    pub fn stop_win_count(&self) -> u64 {
        self.stop_win_count
    }

    pub fn stop_loss_count(&self) -> u64 {
        self.stop_loss_count
    }

    /// Price the ladder trends against: bid when opening shorts into a
    /// rising market, ask when opening longs into a falling one.
    fn reference_price(&self, prices: BestPrices) -> Decimal {
        match self.direction {
            Direction::Up => prices.bid,
            Direction::Down => prices.ask,
        }
    }

    fn should_grow(&self, prices: BestPrices) -> bool {
        match self.ladder.tail() {
            None => true,
            Some(tail) => match self.direction {
                Direction::Up => prices.bid - tail.open_price > self.config.cover_distance,
                Direction::Down => tail.open_price - prices.ask > self.config.cover_distance,
            },
        }
    }

    /// Open a rung in the trend direction: short for `Up`, long for `Down`.
    async fn open_rung(&self, size: Decimal) -> Result<Fill> {
        match self.direction {
            Direction::Up => self.market.open_short(&self.config.symbol, size).await,
            Direction::Down => self.market.open_long(&self.config.symbol, size).await,
        }
    }

    /// Close a rung with the opposite order.
    async fn close_rung(&self, size: Decimal) -> Result<Fill> {
        match self.direction {
            Direction::Up => self.market.open_long(&self.config.symbol, size).await,
            Direction::Down => self.market.open_short(&self.config.symbol, size).await,
        }
    }

    /// Append a rung at the tail and place its opening order.
    ///
    /// The rung is appended before the order goes out; if the order
    /// fails the rung stays in the ladder with zero hold fields and the
    /// rest of the tick is skipped.
    async fn grow(&mut self, prices: BestPrices) -> Result<()> {
        let reference = self.reference_price(prices);
        let sign = self.direction.sign();

        let (open_price, cover_price) = match self.ladder.tail() {
            None => (reference, reference - sign * self.config.cover_distance),
            Some(tail) => (
                tail.open_price + self.config.point_spacing * sign,
                // Cover spacing scales with cover_distance after the
                // first rung, unlike the absolute offset used above.
                tail.open_price + self.config.point_spacing * sign * self.config.cover_distance,
            ),
        };

        self.ladder.push_tail(Level {
            open_price,
            hold_price: Decimal::ZERO,
            hold_size: Decimal::ZERO,
            cover_price,
        });

        let fill = match self.open_rung(self.config.point_amount).await {
            Ok(fill) => fill,
            Err(e) => {
                warn!(
                    symbol = %self.config.symbol,
                    %open_price,
                    "Rung opening order failed; rung left with zero hold fields"
                );
                return Err(e);
            }
        };

        if let Some(tail) = self.ladder.tail_mut() {
            tail.hold_price = fill.avg_price;
            tail.hold_size = fill.filled_size;
        }

        info!(
            symbol = %self.config.symbol,
            %open_price,
            %cover_price,
            hold_price = %fill.avg_price,
            hold_size = %fill.filled_size,
            rungs = self.ladder.len(),
            "Rung opened"
        );
        Ok(())
    }

    fn tail_covers(&self, prices: BestPrices) -> bool {
        match self.ladder.tail() {
            None => false,
            Some(tail) => match self.direction {
                Direction::Up => prices.ask < tail.cover_price,
                Direction::Down => prices.bid > tail.cover_price,
            },
        }
    }

    /// Close the most recent rung for profit (LIFO).
    async fn take_profit(&mut self) -> Result<()> {
        let size = match self.ladder.tail() {
            Some(tail) => tail.hold_size,
            None => return Ok(()),
        };
        let fill = self.close_rung(size).await?;
        let closed = self.ladder.pop_tail();
        self.stop_win_count += 1;
        info!(
            symbol = %self.config.symbol,
            open_price = %closed.map(|l| l.open_price).unwrap_or_default(),
            cover = %fill.avg_price,
            %size,
            rungs = self.ladder.len(),
            stop_wins = self.stop_win_count,
            "Rung taken profit"
        );
        Ok(())
    }

    /// Evict the oldest rung at a loss (FIFO) when the ladder overflows.
    async fn evict_head(&mut self) -> Result<()> {
        let size = match self.ladder.head() {
            Some(head) => head.hold_size,
            None => return Ok(()),
        };
        let fill = self.close_rung(size).await?;
        let closed = self.ladder.pop_head();
        self.stop_loss_count += 1;
        info!(
            symbol = %self.config.symbol,
            open_price = %closed.map(|l| l.open_price).unwrap_or_default(),
            cover = %fill.avg_price,
            %size,
            rungs = self.ladder.len(),
            stop_losses = self.stop_loss_count,
            "Rung evicted on overflow"
        );
        Ok(())
    }

    /// One pass of the grid rules over a price snapshot.
    async fn update(&mut self, prices: BestPrices) -> Result<()> {
        if self.should_grow(prices) {
            self.grow(prices).await?;
        }

        // Take-profit is checked against the current tail, which may be
        // the rung appended just above. Eviction runs only when the
        // take-profit condition is false.
        if self.tail_covers(prices) {
            self.take_profit().await?;
        } else if self.ladder.len() > self.config.grid_num {
            self.evict_head().await?;
        }

        debug!(
            rungs = self.ladder.len(),
            stop_wins = self.stop_win_count,
            stop_losses = self.stop_loss_count,
            bid = %prices.bid,
            ask = %prices.ask,
            "Tick complete"
        );
        Ok(())
    }
}

#[async_trait::async_trait]
impl Strategy for LadderEngine {
    async fn initialize(&mut self) -> Result<()> {
        info!(
            symbol = %self.config.symbol,
            direction = ?self.direction,
            grid_num = self.config.grid_num,
            point_amount = %self.config.point_amount,
            point_spacing = %self.config.point_spacing,
            cover_distance = %self.config.cover_distance,
            "Ladder engine initialized"
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
        self.update(prices).await
    }

    async fn shutdown(&mut self) -> Result<()> {
        info!(
            symbol = %self.config.symbol,
            rungs = self.ladder.len(),
            stop_wins = self.stop_win_count,
            stop_losses = self.stop_loss_count,
            "Ladder engine stopped"
        );
        Ok(())
    }
}
