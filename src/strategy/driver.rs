//! Serial tick loop driving a strategy engine.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use super::Strategy;
use crate::error::Result;

/// Invokes `on_tick` at a fixed interval until the shutdown flag is set.
///
/// Ticks run strictly one at a time; a transient tick error is logged
/// and the periodic re-invocation is the only retry mechanism. The
/// retried decision starts from current engine state, not from the
/// failed sub-step. A non-transient error (invalid configuration)
/// stops the loop.
pub struct TickDriver {
    interval: Duration,
    shutdown: Arc<AtomicBool>,
}

impl TickDriver {
    pub fn new(interval: Duration, shutdown: Arc<AtomicBool>) -> Self {
        Self { interval, shutdown }
    }

    /// Run the engine lifecycle: initialize, tick until shutdown, then
    /// the shutdown hook.
    pub async fn run(&self, engine: &mut dyn Strategy) -> Result<()> {
        engine.initialize().await?;

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        let mut tick_count: u64 = 0;
        let mut error_count: u64 = 0;

        while !self.shutdown.load(Ordering::SeqCst) {
            ticker.tick().await;
            tick_count += 1;

            if let Err(e) = engine.on_tick().await {
                error_count += 1;
                error!(tick = tick_count, errors = error_count, error = %e, "Tick failed");

                // Only transient errors are worth re-ticking; a
                // configuration error can never succeed on retry.
                if !e.is_transient() {
                    engine.shutdown().await.ok();
                    return Err(e);
                }
            }
        }

        info!(ticks = tick_count, errors = error_count, "Tick loop stopped");
        engine.shutdown().await
    }
}
