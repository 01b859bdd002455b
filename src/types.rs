//! Shared types for the COINWATCH monitor.
//!
//! Snapshots are produced by the extractor and the market builder, consumed
//! by the delta engine, and rendered by the notifier. They are immutable once
//! built; only the per-entity cycle state moves between polls.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Watchlist entries
// ---------------------------------------------------------------------------

/// A watched ticker symbol, trimmed and uppercased.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Ticker(String);

impl Ticker {
    pub fn new(raw: &str) -> Result<Self, TickerError> {
        let normalised = raw.trim().to_uppercase();
        if normalised.is_empty() {
            return Err(TickerError::Empty);
        }
        if normalised.chars().any(char::is_whitespace) {
            return Err(TickerError::Whitespace(normalised));
        }
        Ok(Self(normalised))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Ticker {
    type Error = TickerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Ticker::new(&value)
    }
}

impl From<Ticker> for String {
    fn from(t: Ticker) -> Self {
        t.0
    }
}

impl fmt::Display for Ticker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TickerError {
    #[error("ticker is empty")]
    Empty,
    #[error("ticker contains whitespace: {0:?}")]
    Whitespace(String),
}

/// A monitored portfolio as configured by the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioConfig {
    /// Unique key for cycle state and persisted totals.
    pub name: String,
    pub url: String,
    /// Alert whenever the total value is at or above this amount.
    pub threshold: Decimal,
    /// Starting value of the running gain/loss total.
    #[serde(
        default,
        rename = "totalLostOrGainedSinceTheStartOfTheScript",
        alias = "cumulative"
    )]
    pub cumulative: Decimal,
}

// ---------------------------------------------------------------------------
// Snapshots
// ---------------------------------------------------------------------------

/// Point-in-time reading of one portfolio page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioSnapshot {
    pub id: Uuid,
    pub owner: String,
    pub total_value: Decimal,
    pub change_pct_24h: Decimal,
    pub change_value_24h: Decimal,
    pub captured_at: DateTime<Utc>,
}

impl PortfolioSnapshot {
    pub fn new(
        owner: impl Into<String>,
        total_value: Decimal,
        change_pct_24h: Decimal,
        change_value_24h: Decimal,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner: owner.into(),
            total_value,
            change_pct_24h,
            change_value_24h,
            captured_at: Utc::now(),
        }
    }
}

/// Quote for one watched symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoinQuote {
    pub symbol: Ticker,
    pub name: String,
    pub slug: Option<String>,
    pub price: Option<f64>,
    pub change_24h: Option<f64>,
}

/// Best or worst 24h performer across the whole listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopMover {
    pub name: String,
    pub symbol: String,
    pub slug: Option<String>,
    pub change_24h: f64,
}

/// Market-wide view assembled once per market cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub id: Uuid,
    /// Watched symbols in watchlist order; unmatched symbols are absent.
    pub coins: Vec<CoinQuote>,
    pub top_gainer: Option<TopMover>,
    pub top_loser: Option<TopMover>,
    pub total_market_cap: f64,
    pub btc_dominance: f64,
    pub eth_dominance: f64,
    /// `100 - btc - eth`, never clamped.
    pub alt_dominance: f64,
    pub captured_at: DateTime<Utc>,
}

/// Fear & Greed reading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sentiment {
    pub value: u8,
    pub label: String,
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.value, self.label)
    }
}

// ---------------------------------------------------------------------------
// Annotations
// ---------------------------------------------------------------------------

/// Direction of a change between two readings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Up,
    Down,
    Unchanged,
}

impl Direction {
    pub fn of_decimal(delta: Decimal) -> Self {
        if delta > Decimal::ZERO {
            Direction::Up
        } else if delta < Decimal::ZERO {
            Direction::Down
        } else {
            Direction::Unchanged
        }
    }

    pub fn of_f64(delta: f64) -> Self {
        if delta > 0.0 {
            Direction::Up
        } else if delta < 0.0 {
            Direction::Down
        } else {
            Direction::Unchanged
        }
    }

    pub fn emoji(self) -> &'static str {
        match self {
            Direction::Up => "📈",
            Direction::Down => "📉",
            Direction::Unchanged => "➖",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Up => write!(f, "UP"),
            Direction::Down => write!(f, "DOWN"),
            Direction::Unchanged => write!(f, "UNCHANGED"),
        }
    }
}

/// Portfolio snapshot plus everything derived from the previous cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotatedPortfolio {
    pub snapshot: PortfolioSnapshot,
    /// `None` on the first observation.
    pub value_delta: Option<Decimal>,
    /// Running gain/loss after this snapshot was applied.
    pub cumulative: Decimal,
    /// Sign of the page-reported 24h change, not of `value_delta`.
    pub direction: Direction,
}

/// Price move of a single symbol since the previous market cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceMove {
    pub direction: Direction,
    pub delta: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnnotatedCoin {
    pub quote: CoinQuote,
    /// `None` on first observation or when the price is missing.
    pub price_move: Option<PriceMove>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnnotatedMarket {
    pub snapshot: MarketSnapshot,
    pub coins: Vec<AnnotatedCoin>,
    pub btc_dominance_delta: Option<f64>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
