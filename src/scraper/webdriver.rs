//! Headless Chrome over WebDriver.
//!
//! Each launch opens a brand-new chromedriver session (fresh incognito
//! profile, no GPU, no sandbox), so nothing leaks between portfolio reads.
//! Requires a reachable chromedriver, by default `http://localhost:9515`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use fantoccini::error::CmdError;
use fantoccini::{Client, ClientBuilder, Locator};
use serde_json::json;
use std::time::Duration;
use tracing::debug;

use super::{BrowserLauncher, ElementValue, PageSession};
use crate::config::ExtractorConfig;

const CHROME_ARGS: &[&str] = &[
    "--headless=new",
    "--disable-gpu",
    "--no-sandbox",
    "--disable-dev-shm-usage",
    "--incognito",
    "--window-size=1920,1080",
];

pub struct ChromeLauncher {
    webdriver_url: String,
    chrome_binary: Option<String>,
}

impl ChromeLauncher {
    pub fn new(webdriver_url: impl Into<String>, chrome_binary: Option<String>) -> Self {
        Self {
            webdriver_url: webdriver_url.into(),
            chrome_binary,
        }
    }

    pub fn from_config(cfg: &ExtractorConfig) -> Self {
        Self::new(cfg.webdriver_url.clone(), cfg.chrome_binary.clone())
    }

    fn capabilities(&self) -> serde_json::Map<String, serde_json::Value> {
        let mut chrome_options = json!({ "args": CHROME_ARGS });
        if let Some(binary) = &self.chrome_binary {
            chrome_options["binary"] = json!(binary);
        }
        let mut caps = serde_json::Map::new();
        caps.insert("browserName".to_string(), json!("chrome"));
        caps.insert("goog:chromeOptions".to_string(), chrome_options);
        caps
    }
}

#[async_trait]
impl BrowserLauncher for ChromeLauncher {
    async fn launch(&self) -> Result<Box<dyn PageSession>> {
        let mut builder = ClientBuilder::native();
        builder.capabilities(self.capabilities());
        let client = builder
            .connect(&self.webdriver_url)
            .await
            .with_context(|| format!("Failed to start WebDriver session at {}", self.webdriver_url))?;
        debug!(webdriver = %self.webdriver_url, "Browser session opened");
        Ok(Box::new(ChromeSession { client }))
    }
}

pub struct ChromeSession {
    client: Client,
}

#[async_trait]
impl PageSession for ChromeSession {
    async fn navigate(&mut self, url: &str) -> Result<()> {
        self.client
            .goto(url)
            .await
            .with_context(|| format!("Failed to load {url}"))
    }

    async fn find(&mut self, selector: &str, timeout: Duration) -> Result<Option<ElementValue>> {
        let found = self
            .client
            .wait()
            .at_most(timeout)
            .for_element(Locator::Css(selector))
            .await;

        let element = match found {
            Ok(el) => el,
            Err(CmdError::WaitTimeout) => return Ok(None),
            Err(e) if e.is_no_such_element() => return Ok(None),
            Err(e) => return Err(e).with_context(|| format!("Lookup of {selector} failed")),
        };

        let title = element.attr("title").await.context("Failed to read title attribute")?;
        let text = element.text().await.context("Failed to read element text")?;
        Ok(Some(ElementValue { title, text }))
    }

    async fn close(&mut self) -> Result<()> {
        self.client
            .clone()
            .close()
            .await
            .context("Failed to close WebDriver session")?;
        debug!("Browser session closed");
        Ok(())
    }
}
