//! The decision engines and the tick driver.
//!
//! Each engine is an explicit struct owned by one caller; state is
//! mutated only inside `on_tick`, which the driver invokes serially.

mod driver;
mod ladder;
mod martingale;

pub use driver::TickDriver;
pub use ladder::{Ladder, LadderEngine, Level};
pub use martingale::{MartingaleEngine, Position};

use async_trait::async_trait;

use crate::error::Result;

/// Lifecycle surface exposed to a host.
///
/// `on_tick` is the per-tick decision step; it must be called serially.
/// A returned error means the tick's remaining decision steps were
/// skipped; the driver's next invocation is the only retry.
#[async_trait]
pub trait Strategy: Send {
    /// Log parameters and query the starting balance for diagnostics.
    /// A failed balance read is surfaced in the log, not fatal.
    async fn initialize(&mut self) -> Result<()>;

    /// One decision step over current market state.
    async fn on_tick(&mut self) -> Result<()>;

    /// Lifecycle hook; no mandatory cleanup.
    async fn shutdown(&mut self) -> Result<()>;
}

/// Ladder direction sign convention: `Up` opens short rungs as price
/// rises (profits from downward reversion), `Down` opens long rungs as
/// price falls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    /// Build from the configuration integer (+1 or -1).
    pub fn from_sign(sign: i8) -> Option<Self> {
        match sign {
            1 => Some(Direction::Up),
            -1 => Some(Direction::Down),
            _ => None,
        }
    }

    /// The sign as a decimal, for the ladder price arithmetic.
    pub fn sign(self) -> rust_decimal::Decimal {
        match self {
            Direction::Up => rust_decimal::Decimal::ONE,
            Direction::Down => rust_decimal::Decimal::NEGATIVE_ONE,
        }
    }
}
