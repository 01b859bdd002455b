//! Crypto Fear & Greed Index from alternative.me.
//!
//! API: `https://api.alternative.me/fng/`
//! Auth: None required.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use super::SentimentSource;
use crate::types::Sentiment;

#[derive(Debug, Deserialize)]
struct FngResponse {
    data: Vec<FngData>,
}

#[derive(Debug, Deserialize)]
struct FngData {
    /// Served as a string, e.g. `"27"`.
    value: String,
    value_classification: String,
}

pub struct FearGreedClient {
    http: Client,
    url: String,
}

impl FearGreedClient {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(15))
            .user_agent("COINWATCH/0.1.0")
            .build()
            .context("Failed to build Fear & Greed HTTP client")?;
        Ok(Self { http, url: url.into() })
    }

    fn parse(body: FngResponse) -> Result<Sentiment> {
        let first = body.data.into_iter().next().context("No sentiment data in response")?;
        let value: u8 = first
            .value
            .trim()
            .parse()
            .with_context(|| format!("Invalid sentiment value {:?}", first.value))?;
        anyhow::ensure!(value <= 100, "Sentiment value out of range: {value}");
        Ok(Sentiment {
            value,
            label: first.value_classification,
        })
    }
}

#[async_trait]
impl SentimentSource for FearGreedClient {
    async fn fetch_sentiment(&self) -> Result<Sentiment> {
        let resp = self
            .http
            .get(&self.url)
            .send()
            .await
            .context("Fear & Greed request failed")?;

        if !resp.status().is_success() {
            anyhow::bail!("Fear & Greed API returned status: {}", resp.status());
        }

        let body: FngResponse = resp.json().await.context("Failed to parse Fear & Greed response")?;
        let sentiment = Self::parse(body)?;
        debug!(value = sentiment.value, label = %sentiment.label, "Sentiment fetched");
        Ok(sentiment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(json: &str) -> FngResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_parse_first_entry() {
        let b = body(
            r#"{"name": "Fear and Greed Index", "data": [
                {"value": "27", "value_classification": "Fear", "timestamp": "1700000000"},
                {"value": "60", "value_classification": "Greed", "timestamp": "1699913600"}
            ]}"#,
        );
        let s = FearGreedClient::parse(b).unwrap();
        assert_eq!(s.value, 27);
        assert_eq!(s.label, "Fear");
    }

    #[test]
    fn test_parse_empty_data_is_error() {
        assert!(FearGreedClient::parse(body(r#"{"data": []}"#)).is_err());
    }

    #[test]
    fn test_parse_rejects_out_of_range() {
        let b = body(r#"{"data": [{"value": "140", "value_classification": "Greed"}]}"#);
        assert!(FearGreedClient::parse(b).is_err());
        let b = body(r#"{"data": [{"value": "abc", "value_classification": "Greed"}]}"#);
        assert!(FearGreedClient::parse(b).is_err());
    }
}
