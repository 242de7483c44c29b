//! Configuration management for the trading engines.
//!
//! Loads settings from environment variables and config files.

use anyhow::Context;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Which decision engine to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    Martingale,
    Ladder,
}

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Exchange API credentials
    #[serde(default)]
    pub exchange: ExchangeConfig,
    /// Engine selection and tick scheduling
    #[serde(default)]
    pub engine: EngineConfig,
    /// Martingale strategy parameters
    #[serde(default)]
    pub martingale: MartingaleConfig,
    /// Ladder (grid) strategy parameters
    #[serde(default)]
    pub ladder: LadderConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExchangeConfig {
    /// API key for authentication
    #[serde(default)]
    pub api_key: String,
    /// Secret key for signing requests
    #[serde(default)]
    pub secret_key: String,
    /// Use testnet instead of production
    #[serde(default)]
    pub testnet: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Which strategy to run
    #[serde(default = "default_strategy")]
    pub strategy: StrategyKind,
    /// Interval between decision ticks in milliseconds
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    /// Asset used for the diagnostic balance query at startup
    #[serde(default = "default_currency")]
    pub currency: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MartingaleConfig {
    /// Traded instrument
    #[serde(default = "default_symbol")]
    pub symbol: String,
    /// Take-profit distance above the short entry price
    #[serde(default = "default_stop_win")]
    pub stop_win: Decimal,
    /// Stop-loss distance below the short entry price
    #[serde(default = "default_stop_loss")]
    pub stop_loss: Decimal,
    /// Size of the initial short
    #[serde(default = "default_first_amount")]
    pub first_amount: Decimal,
    /// Maximum number of doublings before the position is held
    #[serde(default = "default_max_gear")]
    pub max_gear: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LadderConfig {
    /// Traded instrument
    #[serde(default = "default_symbol")]
    pub symbol: String,
    /// Ladder direction: +1 opens shorts as price rises, -1 opens longs
    /// as price falls
    #[serde(default = "default_direction")]
    pub direction: i8,
    /// Rung count above which the oldest rung is evicted
    #[serde(default = "default_grid_num")]
    pub grid_num: usize,
    /// Order size per rung
    #[serde(default = "default_point_amount")]
    pub point_amount: Decimal,
    /// Price spacing between consecutive rungs
    #[serde(default = "default_point_spacing")]
    pub point_spacing: Decimal,
    /// Reversion distance at which a rung is covered
    #[serde(default = "default_cover_distance")]
    pub cover_distance: Decimal,
}

// Default value functions

fn default_strategy() -> StrategyKind {
    StrategyKind::Martingale
}

fn default_tick_interval_ms() -> u64 {
    500
}

fn default_currency() -> String {
    "USDT".to_string()
}

fn default_symbol() -> String {
    "BTCUSDT".to_string()
}

fn default_stop_win() -> Decimal {
    Decimal::new(500, 0)
}

fn default_stop_loss() -> Decimal {
    Decimal::new(500, 0)
}

fn default_first_amount() -> Decimal {
    Decimal::ONE
}

fn default_max_gear() -> u32 {
    8
}

fn default_direction() -> i8 {
    1
}

fn default_grid_num() -> usize {
    10
}

fn default_point_amount() -> Decimal {
    Decimal::ONE
}

fn default_point_spacing() -> Decimal {
    Decimal::new(20, 0)
}

fn default_cover_distance() -> Decimal {
    Decimal::new(50, 0)
}

impl Config {
    /// Load configuration from environment variables and config files.
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(config::File::with_name("config").required(false))
            .add_source(config::Environment::default().separator("__").prefix("MGB"))
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Validate configuration values.
    ///
    /// A violation is fatal at initialization: the engine must not start.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.engine.tick_interval_ms == 0 {
            return Err(EngineError::InvalidConfig(
                "tick_interval_ms must be positive".into(),
            ));
        }
        match self.engine.strategy {
            StrategyKind::Martingale => self.martingale.validate(),
            StrategyKind::Ladder => self.ladder.validate(),
        }
    }
}

impl MartingaleConfig {
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.symbol.is_empty() {
            return Err(EngineError::InvalidConfig("symbol must not be empty".into()));
        }
        if self.stop_win <= Decimal::ZERO {
            return Err(EngineError::InvalidConfig("stop_win must be positive".into()));
        }
        if self.stop_loss <= Decimal::ZERO {
            return Err(EngineError::InvalidConfig("stop_loss must be positive".into()));
        }
        if self.first_amount <= Decimal::ZERO {
            return Err(EngineError::InvalidConfig(
                "first_amount must be positive".into(),
            ));
        }
        Ok(())
    }
}

impl LadderConfig {
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.symbol.is_empty() {
            return Err(EngineError::InvalidConfig("symbol must not be empty".into()));
        }
        if self.direction != 1 && self.direction != -1 {
            return Err(EngineError::InvalidConfig(
                "direction must be 1 (up) or -1 (down)".into(),
            ));
        }
        if self.grid_num == 0 {
            return Err(EngineError::InvalidConfig("grid_num must be positive".into()));
        }
        if self.point_amount <= Decimal::ZERO {
            return Err(EngineError::InvalidConfig(
                "point_amount must be positive".into(),
            ));
        }
        if self.point_spacing <= Decimal::ZERO {
            return Err(EngineError::InvalidConfig(
                "point_spacing must be positive".into(),
            ));
        }
        if self.cover_distance <= Decimal::ZERO {
            return Err(EngineError::InvalidConfig(
                "cover_distance must be positive".into(),
            ));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            strategy: default_strategy(),
            tick_interval_ms: default_tick_interval_ms(),
            currency: default_currency(),
        }
    }
}

impl Default for MartingaleConfig {
    fn default() -> Self {
        Self {
            symbol: default_symbol(),
            stop_win: default_stop_win(),
            stop_loss: default_stop_loss(),
            first_amount: default_first_amount(),
            max_gear: default_max_gear(),
        }
    }
}

impl Default for LadderConfig {
    fn default() -> Self {
        Self {
            symbol: default_symbol(),
            direction: default_direction(),
            grid_num: default_grid_num(),
            point_amount: default_point_amount(),
            point_spacing: default_point_spacing(),
            cover_distance: default_cover_distance(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            exchange: ExchangeConfig::default(),
            engine: EngineConfig::default(),
            martingale: MartingaleConfig::default(),
            ladder: LadderConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_nonpositive_stop_win_is_rejected() {
        let mut config = Config::default();
        config.martingale.stop_win = Decimal::ZERO;
        let err = config.validate().unwrap_err();
        assert!(matches!(err, EngineError::InvalidConfig(_)));
    }

    #[test]
    fn test_bad_direction_is_rejected() {
        let mut config = Config::default();
        config.engine.strategy = StrategyKind::Ladder;
        config.ladder.direction = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_max_gear_is_allowed() {
        let mut config = Config::default();
        config.martingale.max_gear = 0;
        config.martingale.first_amount = dec!(0.5);
        assert!(config.validate().is_ok());
    }
}
