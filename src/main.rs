//! Martingale Grid Bot - Main Entry Point
//!
//! Hosts one decision engine against one instrument: loads and validates
//! configuration, wires up the market gateway (live or paper), and runs
//! the serial tick loop until ctrl-c.

use anyhow::Result;
use clap::Parser;
use martingale_grid_bot::config::{Config, StrategyKind};
use martingale_grid_bot::market::{BinanceFuturesClient, MarketGateway, PaperMarket};
use martingale_grid_bot::strategy::{LadderEngine, MartingaleEngine, Strategy, TickDriver};
use rust_decimal_macros::dec;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn, Level};
use tracing_subscriber::EnvFilter;

/// Martingale Grid Bot CLI
#[derive(Parser)]
#[command(name = "martingale-grid-bot")]
#[command(version, about = "Martingale and grid ladder strategies on crypto margin exchanges")]
struct Cli {
    /// Simulate fills against live prices instead of placing real orders
    #[arg(long)]
    paper: bool,

    /// Override the configured strategy
    #[arg(long, value_enum)]
    strategy: Option<StrategyArg>,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum StrategyArg {
    Martingale,
    Ladder,
}

impl From<StrategyArg> for StrategyKind {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Martingale => StrategyKind::Martingale,
            StrategyArg::Ladder => StrategyKind::Ladder,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging()?;

    info!(
        "Martingale Grid Bot v{} starting",
        env!("CARGO_PKG_VERSION")
    );

    // Load and validate configuration; a bad parameter is fatal here.
    let mut config = Config::load()?;
    if let Some(strategy) = cli.strategy {
        config.engine.strategy = strategy.into();
    }
    config.validate()?;
    log_config(&config);

    if cli.paper {
        info!("Paper trading mode: fills are simulated at top of book");
    } else {
        warn!("LIVE TRADING MODE - real orders will be placed");
    }

    let client = BinanceFuturesClient::new(&config.exchange)?;
    let market: Arc<dyn MarketGateway> = if cli.paper {
        Arc::new(PaperMarket::new(client, dec!(10000)))
    } else {
        Arc::new(client)
    };

    let currency = config.engine.currency.clone();
    let mut engine: Box<dyn Strategy> = match config.engine.strategy {
        StrategyKind::Martingale => Box::new(MartingaleEngine::new(
            config.martingale.clone(),
            currency,
            market,
        )?),
        StrategyKind::Ladder => {
            Box::new(LadderEngine::new(config.ladder.clone(), currency, market)?)
        }
    };

    // Shutdown signal
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Shutdown signal received");
        shutdown_clone.store(true, Ordering::SeqCst);
    });

    let driver = TickDriver::new(
        Duration::from_millis(config.engine.tick_interval_ms),
        shutdown,
    );
    driver.run(engine.as_mut()).await?;

    Ok(())
}

fn log_config(config: &Config) {
    info!("Configuration:");
    info!("   Strategy: {:?}", config.engine.strategy);
    info!("   Tick interval: {}ms", config.engine.tick_interval_ms);
    info!("   Currency: {}", config.engine.currency);
    match config.engine.strategy {
        StrategyKind::Martingale => {
            let m = &config.martingale;
            info!("   Symbol: {}", m.symbol);
            info!("   Stop win: {}", m.stop_win);
            info!("   Stop loss: {}", m.stop_loss);
            info!("   First amount: {}", m.first_amount);
            info!("   Max gear: {}", m.max_gear);
        }
        StrategyKind::Ladder => {
            let l = &config.ladder;
            info!("   Symbol: {}", l.symbol);
            info!("   Direction: {}", l.direction);
            info!("   Grid num: {}", l.grid_num);
            info!("   Point amount: {}", l.point_amount);
            info!("   Point spacing: {}", l.point_spacing);
            info!("   Cover distance: {}", l.cover_distance);
        }
    }
}

fn init_logging() -> Result<()> {
    use tracing_subscriber::fmt::writer::MakeWriterExt;

    // Create logs directory
    std::fs::create_dir_all("logs")?;

    // File appender for detailed logs
    let file_appender = tracing_appender::rolling::hourly("logs", "martingale-grid-bot.log");
    let (file_writer, _guard) = tracing_appender::non_blocking(file_appender);

    // Leak the guard to keep it alive for the program duration
    Box::leak(Box::new(_guard));

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("martingale_grid_bot=debug".parse()?)
                .add_directive(Level::INFO.into()),
        )
        .with_writer(std::io::stdout.and(file_writer))
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(true)
        .init();

    Ok(())
}
