//! CoinMarketCap Pro API client.
//!
//! API: `https://pro-api.coinmarketcap.com/v1/`
//! Auth: `X-CMC_PRO_API_KEY` header.
//! Endpoints: `global-metrics/quotes/latest`, `cryptocurrency/listings/latest`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::debug;

use super::{GlobalMetrics, Listing, MarketDataSource};

const GLOBAL_METRICS_PATH: &str = "/v1/global-metrics/quotes/latest";
const LISTINGS_PATH: &str = "/v1/cryptocurrency/listings/latest";

// ---------------------------------------------------------------------------
// API response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct GlobalData {
    btc_dominance: f64,
    eth_dominance: f64,
    /// Keyed by convert currency.
    quote: HashMap<String, GlobalQuote>,
}

#[derive(Debug, Deserialize)]
struct GlobalQuote {
    total_market_cap: f64,
}

#[derive(Debug, Deserialize)]
struct CmcListing {
    name: String,
    symbol: String,
    #[serde(default)]
    slug: Option<String>,
    quote: HashMap<String, CmcQuote>,
}

#[derive(Debug, Deserialize)]
struct CmcQuote {
    #[serde(default)]
    price: Option<f64>,
    #[serde(default)]
    percent_change_24h: Option<f64>,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct CoinMarketCapClient {
    http: Client,
    base_url: String,
    api_key: SecretString,
    convert: String,
}

impl CoinMarketCapClient {
    pub fn new(base_url: impl Into<String>, api_key: SecretString, convert: impl Into<String>) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(15))
            .user_agent("COINWATCH/0.1.0")
            .build()
            .context("Failed to build CoinMarketCap HTTP client")?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            convert: convert.into(),
        })
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        let url = format!("{}{path}", self.base_url);
        let resp = self
            .http
            .get(&url)
            .header("Accept", "application/json")
            .header("X-CMC_PRO_API_KEY", self.api_key.expose_secret())
            .query(query)
            .send()
            .await
            .context(format!("CoinMarketCap request failed for {path}"))?;

        if !resp.status().is_success() {
            let status = resp.status();
            anyhow::bail!("CoinMarketCap API error for {path}: {status}");
        }

        resp.json()
            .await
            .context(format!("Failed to parse CoinMarketCap response for {path}"))
    }

    fn global_from(&self, data: GlobalData) -> Result<GlobalMetrics> {
        let quote = data
            .quote
            .get(&self.convert)
            .with_context(|| format!("Global metrics missing {} quote", self.convert))?;
        Ok(GlobalMetrics {
            total_market_cap: quote.total_market_cap,
            btc_dominance: data.btc_dominance,
            eth_dominance: data.eth_dominance,
        })
    }

    fn listings_from(&self, rows: Vec<CmcListing>) -> Result<Vec<Listing>> {
        rows.into_iter()
            .map(|row| {
                let quote = row
                    .quote
                    .get(&self.convert)
                    .with_context(|| format!("Listing {} missing {} quote", row.symbol, self.convert))?;
                Ok(Listing {
                    price: quote.price,
                    change_24h: quote.percent_change_24h,
                    name: row.name,
                    symbol: row.symbol,
                    slug: row.slug,
                })
            })
            .collect()
    }
}

#[async_trait]
impl MarketDataSource for CoinMarketCapClient {
    async fn global_metrics(&self) -> Result<GlobalMetrics> {
        let env: Envelope<GlobalData> = self.get(GLOBAL_METRICS_PATH, &[]).await?;
        let metrics = self.global_from(env.data)?;
        debug!(
            cap = metrics.total_market_cap,
            btc = metrics.btc_dominance,
            eth = metrics.eth_dominance,
            "Global metrics fetched"
        );
        Ok(metrics)
    }

    async fn listings(&self, limit: u32) -> Result<Vec<Listing>> {
        let query = [
            ("start", "1".to_string()),
            ("limit", limit.to_string()),
            ("convert", self.convert.clone()),
        ];
        let env: Envelope<Vec<CmcListing>> = self.get(LISTINGS_PATH, &query).await?;
        let listings = self.listings_from(env.data)?;
        debug!(count = listings.len(), "Listings fetched");
        Ok(listings)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
