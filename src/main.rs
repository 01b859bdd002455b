//! COINWATCH: crypto portfolio and market monitor
//!
//! Entry point. Loads configuration, initialises structured logging,
//! restores running totals from disk, and runs the portfolio and market
//! loops side by side until Ctrl+C.

use anyhow::Result;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};

use coinwatch::config;
use coinwatch::data::coinmarketcap::CoinMarketCapClient;
use coinwatch::data::fear_greed::FearGreedClient;
use coinwatch::engine::market::{MarketSnapshotBuilder, SentimentFetcher};
use coinwatch::engine::monitor::{MarketMonitor, PortfolioMonitor};
use coinwatch::engine::scheduler::{MonitorJob, Scheduler};
use coinwatch::notify::telegram::TelegramNotifier;
use coinwatch::notify::{AlertPolicy, Notifier};
use coinwatch::scraper::webdriver::ChromeLauncher;
use coinwatch::scraper::SnapshotExtractor;
use coinwatch::watchlist::Watchlist;

const BANNER: &str = r#"
  ___  ___  ___ _  _ __      __ _ _____  ___  _  _
 / __|/ _ \|_ _| \| |\ \    / // \_   _|/ __|| || |
| (__| (_) || || .` | \ \/\/ // _ \| | | (__ | __ |
 \___|\___/|___|_|\_|  \_/\_//_/ \_\_|  \___||_||_|

  Crypto portfolio and market monitor
  v0.1.0
"#;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let cfg = config::AppConfig::load("config.toml")?;

    init_logging();

    println!("{BANNER}");
    info!(
        portfolio_interval_secs = cfg.monitor.portfolio_interval_secs,
        market_interval_secs = cfg.monitor.market_interval_secs,
        "COINWATCH starting up"
    );

    // -- Secrets ---------------------------------------------------------

    let bot_token = config::AppConfig::resolve_secret(&cfg.telegram.bot_token_env)?;
    let chat_id = config::AppConfig::resolve_env(&cfg.telegram.chat_id_env)?;
    let cmc_key = config::AppConfig::resolve_secret(&cfg.market_data.api_key_env)?;

    // -- Components ------------------------------------------------------

    let notifier: Arc<dyn Notifier> = Arc::new(TelegramNotifier::new(bot_token, chat_id)?);
    let watchlist = Watchlist::new(&cfg.watchlist.tickers_file, &cfg.watchlist.portfolios_file);

    let extractor = SnapshotExtractor::from_config(
        Arc::new(ChromeLauncher::from_config(&cfg.extractor)),
        &cfg.extractor,
    );
    let alert_policy = AlertPolicy {
        repeats: cfg.monitor.alert_repeats,
        spacing: cfg.monitor.alert_spacing(),
    };
    let mut portfolio_monitor =
        PortfolioMonitor::new(watchlist.clone(), extractor, notifier.clone(), alert_policy)
            .with_persistence(cfg.storage.state_file.clone())?;

    let market_source = CoinMarketCapClient::new(
        cfg.market_data.base_url.clone(),
        cmc_key,
        cfg.market_data.convert.clone(),
    )?;
    let mut market_monitor = MarketMonitor::new(
        watchlist,
        MarketSnapshotBuilder::new(Arc::new(market_source), cfg.market_data.listings_limit),
        SentimentFetcher::new(Arc::new(FearGreedClient::new(cfg.sentiment.url.clone())?)),
        notifier,
    );

    // -- Run -------------------------------------------------------------

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let portfolio_scheduler = Scheduler::new(
        cfg.monitor.portfolio_interval(),
        cfg.monitor.countdown_step(),
        shutdown_rx.clone(),
    );
    let market_scheduler = Scheduler::new(
        cfg.monitor.market_interval(),
        cfg.monitor.countdown_step(),
        shutdown_rx,
    );

    let portfolio_task = tokio::spawn(async move {
        portfolio_scheduler.run(&mut portfolio_monitor as &mut dyn MonitorJob).await
    });
    let market_task = tokio::spawn(async move {
        market_scheduler.run(&mut market_monitor as &mut dyn MonitorJob).await
    });

    info!("Monitors running. Press Ctrl+C to stop.");

    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received."),
        Err(e) => error!(error = %e, "Failed to listen for Ctrl+C, shutting down"),
    }
    // receivers may already be gone if both tasks ended
    let _ = shutdown_tx.send(true);

    let (portfolio_cycles, market_cycles) = tokio::join!(portfolio_task, market_task);
    info!(
        portfolio_cycles = portfolio_cycles.unwrap_or_default(),
        market_cycles = market_cycles.unwrap_or_default(),
        "COINWATCH shut down cleanly."
    );

    Ok(())
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("coinwatch=info"));

    let json_logging = std::env::var("COINWATCH_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
