//! Market snapshot builder and sentiment fetcher.
//!
//! Merges the global-metrics and ranked-listings reads into one
//! [`MarketSnapshot`]. Either read failing aborts the whole build; partial
//! snapshots are never produced.

use chrono::Utc;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::data::{GlobalMetrics, Listing, MarketDataSource, SentimentSource};
use crate::types::{CoinQuote, MarketSnapshot, Sentiment, Ticker, TopMover};

/// Default ranked-listing depth.
pub const DEFAULT_LISTINGS_LIMIT: u32 = 3500;

pub struct MarketSnapshotBuilder {
    source: Arc<dyn MarketDataSource>,
    listings_limit: u32,
}

impl MarketSnapshotBuilder {
    pub fn new(source: Arc<dyn MarketDataSource>, listings_limit: u32) -> Self {
        Self { source, listings_limit }
    }

    /// Build a snapshot for `symbols`, or `None` if either read fails.
    pub async fn build(&self, symbols: &[Ticker]) -> Option<MarketSnapshot> {
        let (metrics, listings) = tokio::join!(
            self.source.global_metrics(),
            self.source.listings(self.listings_limit),
        );

        let metrics = match metrics {
            Ok(m) => m,
            Err(e) => {
                error!(error = %e, "Failed to fetch global market metrics");
                return None;
            }
        };
        let listings = match listings {
            Ok(l) => l,
            Err(e) => {
                error!(error = %e, "Failed to fetch market listings");
                return None;
            }
        };

        let snapshot = assemble(&metrics, &listings, symbols);
        info!(
            requested = symbols.len(),
            matched = snapshot.coins.len(),
            listings = listings.len(),
            "Market snapshot built"
        );
        Some(snapshot)
    }
}

/// Pure merge of the two reads.
pub fn assemble(metrics: &GlobalMetrics, listings: &[Listing], symbols: &[Ticker]) -> MarketSnapshot {
    let coins = symbols
        .iter()
        .filter_map(|symbol| {
            let mut matches = listings.iter().filter(|l| l.symbol == symbol.as_str());
            let listing = matches.next()?;
            let others = matches.count();
            if others > 0 {
                warn!(
                    symbol = %symbol,
                    picked = %listing.name,
                    others,
                    "Ticker is ambiguous, using the highest-ranked listing"
                );
            }
            Some(CoinQuote {
                symbol: symbol.clone(),
                name: listing.name.clone(),
                slug: listing.slug.clone(),
                price: listing.price,
                change_24h: listing.change_24h,
            })
        })
        .collect();

    MarketSnapshot {
        id: Uuid::new_v4(),
        coins,
        top_gainer: top_mover(listings, |candidate, best| candidate > best),
        top_loser: top_mover(listings, |candidate, best| candidate < best),
        total_market_cap: metrics.total_market_cap,
        btc_dominance: metrics.btc_dominance,
        eth_dominance: metrics.eth_dominance,
        alt_dominance: 100.0 - metrics.btc_dominance - metrics.eth_dominance,
        captured_at: Utc::now(),
    }
}

/// The listing whose 24h change beats every earlier one under `beats`.
/// A strict comparison keeps the first of several equal extremes.
fn top_mover(listings: &[Listing], beats: impl Fn(f64, f64) -> bool) -> Option<TopMover> {
    listings
        .iter()
        .filter_map(|l| l.change_24h.map(|c| (l, c)))
        .fold(None, |best: Option<(&Listing, f64)>, (listing, change)| match best {
            Some((_, best_change)) if !beats(change, best_change) => best,
            _ => Some((listing, change)),
        })
        .map(|(l, change)| TopMover {
            name: l.name.clone(),
            symbol: l.symbol.clone(),
            slug: l.slug.clone(),
            change_24h: change,
        })
}

/// Wraps a [`SentimentSource`]; failures degrade to `None`.
pub struct SentimentFetcher {
    source: Arc<dyn SentimentSource>,
}

impl SentimentFetcher {
    pub fn new(source: Arc<dyn SentimentSource>) -> Self {
        Self { source }
    }

    pub async fn fetch(&self) -> Option<Sentiment> {
        match self.source.fetch_sentiment().await {
            Ok(s) => Some(s),
            Err(e) => {
                error!(error = %e, "Failed to fetch Fear & Greed Index");
                None
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
