//! The two monitoring loops.
//!
//! [`PortfolioMonitor`] reads every configured portfolio page, tracks value
//! changes, and fires threshold alerts. [`MarketMonitor`] builds the market
//! snapshot and reports price and dominance moves. Each monitor exclusively
//! owns its cycle state; the two share nothing mutable.

use anyhow::Result;
use async_trait::async_trait;
use chrono::Local;
use std::sync::Arc;
use tracing::{error, info, warn};

use super::delta::{DeltaError, MarketCycleState, PortfolioLedger};
use super::market::{MarketSnapshotBuilder, SentimentFetcher};
use super::scheduler::MonitorJob;
use crate::notify::format::{render_market_update, render_portfolio_alert, render_portfolio_update};
use crate::notify::{notify, send_alert_burst, AlertPolicy, Notifier};
use crate::scraper::SnapshotExtractor;
use crate::storage::{self, MonitorState};
use crate::types::{PortfolioConfig, PortfolioSnapshot};
use crate::watchlist::Watchlist;

// ---------------------------------------------------------------------------
// Portfolio loop
// ---------------------------------------------------------------------------

/// What happened for one portfolio in one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PortfolioReport {
    pub update_delivered: bool,
    pub alerted: bool,
    pub alerts_delivered: u32,
}

pub struct PortfolioMonitor {
    watchlist: Watchlist,
    extractor: SnapshotExtractor,
    notifier: Arc<dyn Notifier>,
    alert_policy: AlertPolicy,
    ledger: PortfolioLedger,
    state_file: Option<String>,
}

impl PortfolioMonitor {
    pub fn new(
        watchlist: Watchlist,
        extractor: SnapshotExtractor,
        notifier: Arc<dyn Notifier>,
        alert_policy: AlertPolicy,
    ) -> Self {
        Self {
            watchlist,
            extractor,
            notifier,
            alert_policy,
            ledger: PortfolioLedger::default(),
            state_file: None,
        }
    }

    /// Restore running totals from `state_file` and save them back after
    /// every cycle.
    pub fn with_persistence(mut self, state_file: impl Into<String>) -> Result<Self> {
        let path = state_file.into();
        if let Some(saved) = storage::load_state(Some(&path))? {
            self.ledger = PortfolioLedger::with_accumulators(saved.accumulators);
        }
        self.state_file = Some(path);
        Ok(self)
    }

    pub fn ledger(&self) -> &PortfolioLedger {
        &self.ledger
    }

    /// Apply a fresh snapshot, send the update, and alert if the value is at
    /// or above the portfolio's threshold.
    pub async fn process_snapshot(
        &mut self,
        portfolio: &PortfolioConfig,
        snapshot: PortfolioSnapshot,
    ) -> Result<PortfolioReport, DeltaError> {
        let update = self
            .ledger
            .state_mut(&portfolio.name, portfolio.cumulative)
            .apply(snapshot)?;

        info!(
            portfolio = %portfolio.name,
            owner = %update.snapshot.owner,
            total = %update.snapshot.total_value,
            delta = ?update.value_delta,
            cumulative = %update.cumulative,
            "Portfolio updated"
        );

        let sent_at = Local::now().time();
        let mut report = PortfolioReport {
            update_delivered: notify(
                self.notifier.as_ref(),
                &render_portfolio_update(&update, portfolio, sent_at),
            )
            .await,
            ..PortfolioReport::default()
        };

        if update.snapshot.total_value >= portfolio.threshold {
            warn!(
                portfolio = %portfolio.name,
                total = %update.snapshot.total_value,
                threshold = %portfolio.threshold,
                "Threshold crossed, sending alert"
            );
            report.alerted = true;
            report.alerts_delivered = send_alert_burst(
                self.notifier.as_ref(),
                &render_portfolio_alert(&update, portfolio, sent_at),
                self.alert_policy,
            )
            .await;
        }

        Ok(report)
    }

    fn persist(&self) {
        let Some(path) = &self.state_file else { return };
        let state = MonitorState {
            accumulators: self
                .ledger
                .accumulators()
                .map(|(name, total)| (name.to_string(), total))
                .collect(),
            saved_at: None,
        };
        if let Err(e) = storage::save_state(&state, Some(path)) {
            error!(error = %e, "Failed to save state");
        }
    }
}

#[async_trait]
impl MonitorJob for PortfolioMonitor {
    fn name(&self) -> &str {
        "portfolio"
    }

    async fn run_cycle(&mut self) {
        let portfolios = match self.watchlist.load_portfolios() {
            Ok(p) => p,
            // keep every running total until the file reads cleanly again
            Err(e) => {
                error!(error = %e, "Failed to load portfolios, skipping cycle");
                return;
            }
        };

        let dropped = self.ledger.retain_names(portfolios.iter().map(|p| p.name.as_str()));
        if !dropped.is_empty() {
            info!(?dropped, "Forgetting removed portfolios");
        }
        if portfolios.is_empty() {
            info!("No portfolios configured");
            self.persist();
            return;
        }

        for portfolio in &portfolios {
            let snapshot = match self.extractor.extract(&portfolio.url).await {
                Ok(s) => s,
                Err(e) => {
                    warn!(portfolio = %portfolio.name, error = %e, "Skipping portfolio this cycle");
                    continue;
                }
            };
            if let Err(e) = self.process_snapshot(portfolio, snapshot).await {
                warn!(portfolio = %portfolio.name, error = %e, "Snapshot not applied");
            }
        }

        self.persist();
    }
}

// ---------------------------------------------------------------------------
// Market loop
// ---------------------------------------------------------------------------

pub struct MarketMonitor {
    watchlist: Watchlist,
    builder: MarketSnapshotBuilder,
    sentiment: SentimentFetcher,
    notifier: Arc<dyn Notifier>,
    state: MarketCycleState,
}

impl MarketMonitor {
    pub fn new(
        watchlist: Watchlist,
        builder: MarketSnapshotBuilder,
        sentiment: SentimentFetcher,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            watchlist,
            builder,
            sentiment,
            notifier,
            state: MarketCycleState::default(),
        }
    }

    pub fn state(&self) -> &MarketCycleState {
        &self.state
    }

    /// One market pass. `true` if an update was delivered.
    pub async fn poll(&mut self) -> bool {
        let symbols = self.watchlist.tickers_or_empty();
        let (snapshot, sentiment) = tokio::join!(self.builder.build(&symbols), self.sentiment.fetch());

        let Some(snapshot) = snapshot else {
            warn!("No market data this cycle, skipping update");
            return false;
        };

        let update = match self.state.apply(snapshot) {
            Ok(u) => u,
            Err(e) => {
                warn!(error = %e, "Market snapshot not applied");
                return false;
            }
        };

        info!(
            coins = update.coins.len(),
            btc_dominance = update.snapshot.btc_dominance,
            btc_delta = ?update.btc_dominance_delta,
            sentiment = ?sentiment.as_ref().map(|s| s.value),
            "Market updated"
        );

        let message = render_market_update(&update, sentiment.as_ref(), Local::now().time());
        notify(self.notifier.as_ref(), &message).await
    }
}

#[async_trait]
impl MonitorJob for MarketMonitor {
    fn name(&self) -> &str {
        "market"
    }

    async fn run_cycle(&mut self) {
        self.poll().await;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
