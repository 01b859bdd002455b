//! Upstream market data providers.
//!
//! Defines the `MarketDataSource` and `SentimentSource` traits the engine
//! reads through, plus the CoinMarketCap and alternative.me clients.

pub mod coinmarketcap;
pub mod fear_greed;

use anyhow::Result;
use async_trait::async_trait;

use crate::types::Sentiment;

/// Market-wide aggregates.
#[derive(Debug, Clone, PartialEq)]
pub struct GlobalMetrics {
    pub total_market_cap: f64,
    pub btc_dominance: f64,
    pub eth_dominance: f64,
}

/// One row of the ranked listing, in provider order.
#[derive(Debug, Clone, PartialEq)]
pub struct Listing {
    pub name: String,
    pub symbol: String,
    pub slug: Option<String>,
    pub price: Option<f64>,
    pub change_24h: Option<f64>,
}

/// Source of global metrics and ranked listings.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    async fn global_metrics(&self) -> Result<GlobalMetrics>;

    /// Up to `limit` listings ranked by market cap.
    async fn listings(&self, limit: u32) -> Result<Vec<Listing>>;
}

/// Source of the market sentiment index.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SentimentSource: Send + Sync {
    async fn fetch_sentiment(&self) -> Result<Sentiment>;
}
