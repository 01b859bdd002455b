//! Read-only access to the user-edited watchlist files.
//!
//! `tickers.json` holds a JSON array of ticker strings and `portfolios.json`
//! a JSON array of portfolio records. Both are edited by the chat bot while
//! the monitor runs, so each monitoring cycle reloads them.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, error, warn};

use crate::types::{PortfolioConfig, Ticker};

#[derive(Debug, Clone)]
pub struct Watchlist {
    tickers_path: PathBuf,
    portfolios_path: PathBuf,
}

impl Watchlist {
    pub fn new(tickers_path: impl Into<PathBuf>, portfolios_path: impl Into<PathBuf>) -> Self {
        Self {
            tickers_path: tickers_path.into(),
            portfolios_path: portfolios_path.into(),
        }
    }

    /// Watched tickers, deduplicated in file order. Invalid entries are
    /// skipped individually.
    pub fn load_tickers(&self) -> Result<Vec<Ticker>> {
        let raw: Vec<String> = read_json_array(&self.tickers_path)?;
        let mut seen = HashSet::new();
        Ok(raw
            .into_iter()
            .filter_map(|entry| match Ticker::new(&entry) {
                Ok(t) => Some(t),
                Err(e) => {
                    warn!(entry = %entry, error = %e, "Skipping invalid ticker");
                    None
                }
            })
            .filter(|t| seen.insert(t.clone()))
            .collect())
    }

    /// Configured portfolios; a repeated name keeps its first record.
    pub fn load_portfolios(&self) -> Result<Vec<PortfolioConfig>> {
        let raw: Vec<PortfolioConfig> = read_json_array(&self.portfolios_path)?;
        let mut seen = HashSet::new();
        Ok(raw.into_iter().filter(|p| seen.insert(p.name.clone())).collect())
    }

    /// Like [`load_tickers`](Self::load_tickers) but logs and yields an
    /// empty list on error, so a half-written file never stops a cycle.
    pub fn tickers_or_empty(&self) -> Vec<Ticker> {
        self.load_tickers().unwrap_or_else(|e| {
            error!(path = %self.tickers_path.display(), error = %e, "Failed to load tickers");
            Vec::new()
        })
    }
}

/// Missing file reads as an empty list.
fn read_json_array<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    if !path.exists() {
        debug!(path = %path.display(), "Watchlist file not found, treating as empty");
        return Ok(Vec::new());
    }
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&json).with_context(|| format!("Failed to parse {}", path.display()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn temp_file(contents: &str) -> PathBuf {
        let mut p = std::env::temp_dir();
        p.push(format!("coinwatch_watchlist_{}.json", uuid::Uuid::new_v4()));
        std::fs::write(&p, contents).unwrap();
        p
    }

    fn missing() -> PathBuf {
        std::env::temp_dir().join(format!("coinwatch_missing_{}.json", uuid::Uuid::new_v4()))
    }

    #[test]
    fn test_tickers_uppercased_and_deduplicated() {
        let path = temp_file(r#"["btc", "ETH", "BTC", "sol"]"#);
        let wl = Watchlist::new(&path, missing());
        let tickers = wl.load_tickers().unwrap();
        let names: Vec<&str> = tickers.iter().map(Ticker::as_str).collect();
        assert_eq!(names, vec!["BTC", "ETH", "SOL"]);
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn test_invalid_ticker_entries_skipped() {
        let path = temp_file(r#"["BTC", "ETH", "", "  ", "sh ib"]"#);
        let wl = Watchlist::new(&path, missing());
        let names: Vec<String> = wl.tickers_or_empty().iter().map(|t| t.to_string()).collect();
        assert_eq!(names, vec!["BTC", "ETH"]);
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn test_missing_files_are_empty() {
        let wl = Watchlist::new(missing(), missing());
        assert!(wl.load_tickers().unwrap().is_empty());
        assert!(wl.load_portfolios().unwrap().is_empty());
    }

    #[test]
    fn test_malformed_file_errors_but_fallback_is_empty() {
        let path = temp_file("[\"BTC\", ");
        let wl = Watchlist::new(&path, missing());
        assert!(wl.load_tickers().is_err());
        assert!(wl.tickers_or_empty().is_empty());
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn test_portfolios_first_name_wins() {
        let path = temp_file(
            r#"[
                {"name": "main", "url": "https://a", "threshold": 100},
                {"name": "main", "url": "https://b", "threshold": 200},
                {"name": "alt", "url": "https://c", "threshold": 5.5,
                 "totalLostOrGainedSinceTheStartOfTheScript": 3}
            ]"#,
        );
        let wl = Watchlist::new(missing(), &path);
        let portfolios = wl.load_portfolios().unwrap();
        assert_eq!(portfolios.len(), 2);
        assert_eq!(portfolios[0].url, "https://a");
        assert_eq!(portfolios[1].threshold, dec!(5.5));
        assert_eq!(portfolios[1].cumulative, dec!(3));
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn test_reload_sees_edits() {
        let path = temp_file(r#"["BTC"]"#);
        let wl = Watchlist::new(&path, missing());
        assert_eq!(wl.load_tickers().unwrap().len(), 1);
        std::fs::write(&path, r#"["BTC", "ADA"]"#).unwrap();
        assert_eq!(wl.load_tickers().unwrap().len(), 2);
        std::fs::remove_file(path).unwrap();
    }
}
