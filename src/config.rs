//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Secrets (bot token, chat id, API keys) are referenced by env-var name in
//! the config and resolved at runtime via `std::env::var`.

use anyhow::{Context, Result};
use secrecy::SecretString;
use serde::Deserialize;
use std::fs;
use std::time::Duration;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub extractor: ExtractorConfig,
    pub market_data: MarketDataConfig,
    #[serde(default)]
    pub sentiment: SentimentConfig,
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub watchlist: WatchlistConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MonitorConfig {
    #[serde(default = "default_portfolio_interval")]
    pub portfolio_interval_secs: u64,
    #[serde(default = "default_market_interval")]
    pub market_interval_secs: u64,
    #[serde(default = "default_countdown_step")]
    pub countdown_step_secs: u64,
    #[serde(default = "default_alert_repeats")]
    pub alert_repeats: u32,
    #[serde(default = "default_alert_spacing")]
    pub alert_spacing_secs: u64,
}

fn default_portfolio_interval() -> u64 { 600 }
fn default_market_interval() -> u64 { 1800 }
fn default_countdown_step() -> u64 { 10 }
fn default_alert_repeats() -> u32 { 3 }
fn default_alert_spacing() -> u64 { 1 }

impl MonitorConfig {
    pub fn portfolio_interval(&self) -> Duration {
        Duration::from_secs(self.portfolio_interval_secs)
    }

    pub fn market_interval(&self) -> Duration {
        Duration::from_secs(self.market_interval_secs)
    }

    pub fn countdown_step(&self) -> Duration {
        Duration::from_secs(self.countdown_step_secs.max(1))
    }

    pub fn alert_spacing(&self) -> Duration {
        Duration::from_secs(self.alert_spacing_secs)
    }
}

/// Headless browser settings for the portfolio page extractor.
#[derive(Debug, Deserialize, Clone)]
pub struct ExtractorConfig {
    /// chromedriver (or any W3C WebDriver) endpoint.
    #[serde(default = "default_webdriver_url")]
    pub webdriver_url: String,
    #[serde(default = "default_settle_delay")]
    pub settle_delay_secs: u64,
    #[serde(default = "default_element_timeout")]
    pub element_timeout_secs: u64,
    /// Optional path to the Chrome binary.
    #[serde(default)]
    pub chrome_binary: Option<String>,
    #[serde(default)]
    pub selectors: SelectorConfig,
}

fn default_webdriver_url() -> String { "http://localhost:9515".to_string() }
fn default_settle_delay() -> u64 { 5 }
fn default_element_timeout() -> u64 { 15 }

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            webdriver_url: default_webdriver_url(),
            settle_delay_secs: default_settle_delay(),
            element_timeout_secs: default_element_timeout(),
            chrome_binary: None,
            selectors: SelectorConfig::default(),
        }
    }
}

impl ExtractorConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_secs(self.settle_delay_secs)
    }

    pub fn element_timeout(&self) -> Duration {
        Duration::from_secs(self.element_timeout_secs)
    }
}

/// Ordered CSS selector chains, one per extracted field.
/// An empty list falls back to the built-in chain for that field.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct SelectorConfig {
    #[serde(default)]
    pub name: Vec<String>,
    #[serde(default)]
    pub total_value: Vec<String>,
    #[serde(default)]
    pub change_pct: Vec<String>,
    #[serde(default)]
    pub change_value: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MarketDataConfig {
    pub api_key_env: String,
    #[serde(default = "default_cmc_base_url")]
    pub base_url: String,
    #[serde(default = "default_listings_limit")]
    pub listings_limit: u32,
    #[serde(default = "default_convert")]
    pub convert: String,
}

fn default_cmc_base_url() -> String { "https://pro-api.coinmarketcap.com".to_string() }
fn default_listings_limit() -> u32 { 3500 }
fn default_convert() -> String { "USD".to_string() }

#[derive(Debug, Deserialize, Clone)]
pub struct SentimentConfig {
    #[serde(default = "default_fng_url")]
    pub url: String,
}

fn default_fng_url() -> String { "https://api.alternative.me/fng/".to_string() }

impl Default for SentimentConfig {
    fn default() -> Self {
        Self { url: default_fng_url() }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct TelegramConfig {
    pub bot_token_env: String,
    pub chat_id_env: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WatchlistConfig {
    #[serde(default = "default_tickers_file")]
    pub tickers_file: String,
    #[serde(default = "default_portfolios_file")]
    pub portfolios_file: String,
}

fn default_tickers_file() -> String { "tickers.json".to_string() }
fn default_portfolios_file() -> String { "portfolios.json".to_string() }

impl Default for WatchlistConfig {
    fn default() -> Self {
        Self {
            tickers_file: default_tickers_file(),
            portfolios_file: default_portfolios_file(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default = "default_state_file")]
    pub state_file: String,
}

fn default_state_file() -> String { "coinwatch_state.json".to_string() }

impl Default for StorageConfig {
    fn default() -> Self {
        Self { state_file: default_state_file() }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::parse(&contents).with_context(|| format!("Failed to parse config file: {path}"))
    }

    pub fn parse(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        Ok(config)
    }

    /// Resolve an environment variable name to its value.
    pub fn resolve_env(env_name: &str) -> Result<String> {
        std::env::var(env_name)
            .with_context(|| format!("Environment variable not set: {env_name}"))
    }

    /// Same as [`resolve_env`](Self::resolve_env), wrapped for secrets.
    pub fn resolve_secret(env_name: &str) -> Result<SecretString> {
        Self::resolve_env(env_name).map(SecretString::new)
    }
}
