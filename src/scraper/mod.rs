//! Portfolio page extraction.
//!
//! The portfolio page is rendered client-side and its CSS-module class names
//! drift between deploys, so every field is read through an ordered chain of
//! selectors. The first selector that yields a usable value wins.
//!
//! The browser itself sits behind [`BrowserLauncher`] / [`PageSession`];
//! [`webdriver`] provides the headless Chrome implementation.

pub mod webdriver;

use anyhow::Result;
use async_trait::async_trait;
use futures::FutureExt;
use rust_decimal::Decimal;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::config::{ExtractorConfig, SelectorConfig};
use crate::types::PortfolioSnapshot;

/// Substituted when no selector locates the owner name.
pub const UNKNOWN_OWNER: &str = "Unknown";

// ---------------------------------------------------------------------------
// Default selector chains
// ---------------------------------------------------------------------------

const NAME_SELECTORS: &[&str] = &[
    ".UserInfoMenuItemWithTitleAndDesc_user-data-with-title-and-desc__c2iGU h1",
    ".UserInfoMenuItemWithTitleAndDesc_user-data-with-title-and-desc__c2iGU span",
    "[class*='UserInfoMenuItemWithTitleAndDesc_user-data-with-title-and-desc'] h1",
];

const TOTAL_VALUE_SELECTORS: &[&str] = &[
    ".PortfolioPriceInfo_PT-price-info_price__xjt40",
    "[class*='PortfolioPriceInfo_PT-price-info_price']",
];

const CHANGE_PCT_SELECTORS: &[&str] = &[
    ".PortfolioProfitInfo_percentText__3NKUK",
    "[class*='PortfolioProfitInfo_percentText']",
];

const CHANGE_VALUE_SELECTORS: &[&str] = &[
    ".PortfolioProfitInfo_PTProfitInfoPrice__79_kR",
    "[class*='PortfolioProfitInfo_PTProfitInfoPrice']",
];

// ---------------------------------------------------------------------------
// Browser seam
// ---------------------------------------------------------------------------

/// What a located element exposes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementValue {
    pub title: Option<String>,
    pub text: String,
}

impl ElementValue {
    /// The `title` attribute when present and non-blank, else the trimmed text.
    pub fn resolve(&self) -> Option<String> {
        let title = self.title.as_deref().map(str::trim).filter(|t| !t.is_empty());
        let value = title.unwrap_or_else(|| self.text.trim());
        (!value.is_empty()).then(|| value.to_string())
    }
}

/// One open, isolated browser page.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PageSession: Send {
    async fn navigate(&mut self, url: &str) -> Result<()>;

    /// Wait up to `timeout` for `selector`. `Ok(None)` means not present.
    async fn find(&mut self, selector: &str, timeout: Duration) -> Result<Option<ElementValue>>;

    /// Tear the session down. Called exactly once per launched session.
    async fn close(&mut self) -> Result<()>;
}

/// Opens fresh browser sessions.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self) -> Result<Box<dyn PageSession>>;
}

// ---------------------------------------------------------------------------
// Strategy chains
// ---------------------------------------------------------------------------

/// The four fields read from a portfolio page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Name,
    TotalValue,
    ChangePct,
    ChangeValue,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Name => write!(f, "name"),
            Field::TotalValue => write!(f, "total value"),
            Field::ChangePct => write!(f, "24h percent change"),
            Field::ChangeValue => write!(f, "24h value change"),
        }
    }
}

/// Outcome of running a selector chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup<T> {
    Found(T),
    NotFound,
}

/// Ordered selectors for one field.
#[derive(Debug, Clone)]
pub struct FieldChain {
    field: Field,
    selectors: Vec<String>,
}

impl FieldChain {
    pub fn new(field: Field, selectors: Vec<String>) -> Self {
        Self { field, selectors }
    }

    fn with_defaults(field: Field, configured: &[String], defaults: &[&str]) -> Self {
        let selectors = if configured.is_empty() {
            defaults.iter().map(|s| s.to_string()).collect()
        } else {
            configured.to_vec()
        };
        Self::new(field, selectors)
    }

    pub fn field(&self) -> Field {
        self.field
    }

    /// Try each selector in order; `accept` turns a raw value into `T` or
    /// rejects it, in which case the next selector is tried.
    pub async fn first_match<T, F>(
        &self,
        session: &mut dyn PageSession,
        timeout: Duration,
        mut accept: F,
    ) -> Lookup<T>
    where
        F: FnMut(&str) -> Option<T> + Send,
        T: Send,
    {
        for (attempt, selector) in self.selectors.iter().enumerate() {
            let raw = match session.find(selector, timeout).await {
                Ok(Some(element)) => element.resolve(),
                Ok(None) => None,
                Err(e) => {
                    warn!(field = %self.field, selector, error = %e, "Selector lookup errored");
                    None
                }
            };

            let Some(raw) = raw else {
                warn!(field = %self.field, attempt = attempt + 1, selector, "Selector found nothing");
                continue;
            };

            match accept(&raw) {
                Some(value) => {
                    debug!(field = %self.field, selector, raw, "Field located");
                    return Lookup::Found(value);
                }
                None => warn!(field = %self.field, selector, raw, "Located value rejected"),
            }
        }
        Lookup::NotFound
    }
}

/// The full set of chains used by the extractor.
#[derive(Debug, Clone)]
pub struct FieldChains {
    pub name: FieldChain,
    pub total_value: FieldChain,
    pub change_pct: FieldChain,
    pub change_value: FieldChain,
}

impl FieldChains {
    pub fn from_config(cfg: &SelectorConfig) -> Self {
        Self {
            name: FieldChain::with_defaults(Field::Name, &cfg.name, NAME_SELECTORS),
            total_value: FieldChain::with_defaults(
                Field::TotalValue,
                &cfg.total_value,
                TOTAL_VALUE_SELECTORS,
            ),
            change_pct: FieldChain::with_defaults(Field::ChangePct, &cfg.change_pct, CHANGE_PCT_SELECTORS),
            change_value: FieldChain::with_defaults(
                Field::ChangeValue,
                &cfg.change_value,
                CHANGE_VALUE_SELECTORS,
            ),
        }
    }
}

impl Default for FieldChains {
    fn default() -> Self {
        Self::from_config(&SelectorConfig::default())
    }
}

// ---------------------------------------------------------------------------
// Numeric parsing
// ---------------------------------------------------------------------------

/// Parse a displayed amount such as `$12,345.67`, `-4.2%` or `−$3.10`.
pub fn parse_amount(raw: &str) -> Option<Decimal> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !matches!(c, '$' | '%' | ',' | '+') && !c.is_whitespace())
        .map(|c| if c == '\u{2212}' { '-' } else { c })
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    Decimal::from_str(&cleaned).ok()
}

// ---------------------------------------------------------------------------
// Extractor
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    #[error("browser session could not be opened: {0}")]
    Browser(String),

    #[error("navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },

    #[error("no selector located the {0} field")]
    FieldExhausted(Field),

    #[error("could not parse {field} from {raw:?}")]
    Parse { field: Field, raw: String },

    #[error("extraction aborted by a panic")]
    Panicked,
}

/// Reads a [`PortfolioSnapshot`] from a portfolio page.
pub struct SnapshotExtractor {
    launcher: Arc<dyn BrowserLauncher>,
    chains: FieldChains,
    settle_delay: Duration,
    element_timeout: Duration,
}

impl SnapshotExtractor {
    pub fn new(
        launcher: Arc<dyn BrowserLauncher>,
        chains: FieldChains,
        settle_delay: Duration,
        element_timeout: Duration,
    ) -> Self {
        Self { launcher, chains, settle_delay, element_timeout }
    }

    pub fn from_config(launcher: Arc<dyn BrowserLauncher>, cfg: &ExtractorConfig) -> Self {
        Self::new(
            launcher,
            FieldChains::from_config(&cfg.selectors),
            cfg.settle_delay(),
            cfg.element_timeout(),
        )
    }

    /// Open a session, read the page, and always close the session again.
    pub async fn extract(&self, url: &str) -> Result<PortfolioSnapshot, ExtractionError> {
        let mut session = match self.launcher.launch().await {
            Ok(s) => s,
            Err(e) => {
                error!(url, error = %e, "Failed to launch browser session");
                return Err(ExtractionError::Browser(format!("{e:#}")));
            }
        };

        let outcome = AssertUnwindSafe(self.read_page(session.as_mut(), url))
            .catch_unwind()
            .await;

        if let Err(e) = session.close().await {
            warn!(url, error = %e, "Failed to close browser session");
        }

        let result = outcome.unwrap_or(Err(ExtractionError::Panicked));
        match &result {
            Ok(snapshot) => info!(
                url,
                owner = %snapshot.owner,
                total = %snapshot.total_value,
                "Portfolio snapshot extracted"
            ),
            Err(e) => error!(url, error = %e, "Failed to fetch portfolio data"),
        }
        result
    }

    async fn read_page(
        &self,
        session: &mut dyn PageSession,
        url: &str,
    ) -> Result<PortfolioSnapshot, ExtractionError> {
        session.navigate(url).await.map_err(|e| ExtractionError::Navigation {
            url: url.to_string(),
            message: format!("{e:#}"),
        })?;

        tokio::time::sleep(self.settle_delay).await;

        let owner = match self
            .chains
            .name
            .first_match(session, self.element_timeout, |raw| Some(raw.to_string()))
            .await
        {
            Lookup::Found(name) => name,
            Lookup::NotFound => {
                error!(url, "Failed to locate owner name using all known selectors, using '{UNKNOWN_OWNER}'");
                UNKNOWN_OWNER.to_string()
            }
        };

        let total_value = self.read_amount(session, &self.chains.total_value).await?;
        let change_pct = self.read_amount(session, &self.chains.change_pct).await?;
        let change_value = self.read_amount(session, &self.chains.change_value).await?;

        Ok(PortfolioSnapshot::new(owner, total_value, change_pct, change_value))
    }

    async fn read_amount(
        &self,
        session: &mut dyn PageSession,
        chain: &FieldChain,
    ) -> Result<Decimal, ExtractionError> {
        let mut rejected: Option<String> = None;
        let lookup = chain
            .first_match(session, self.element_timeout, |raw| {
                let parsed = parse_amount(raw);
                if parsed.is_none() {
                    rejected = Some(raw.to_string());
                }
                parsed
            })
            .await;

        match lookup {
            Lookup::Found(value) => Ok(value),
            Lookup::NotFound => Err(match rejected {
                Some(raw) => ExtractionError::Parse { field: chain.field(), raw },
                None => ExtractionError::FieldExhausted(chain.field()),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
