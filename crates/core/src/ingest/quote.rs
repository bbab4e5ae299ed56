use crate::domain::prediction::round2;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://query1.finance.yahoo.com";
const DEFAULT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_RETRIES: u32 = 1;
const DEFAULT_BACKOFF: Duration = Duration::from_secs(1);
const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 13_0) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/113.0.0.0 Safari/537.36";

/// Latest-close lookup. Failures are logged and reported as `None`, so a
/// caller only ever has to decide what "no price" means for one ticker.
#[async_trait::async_trait]
pub trait QuoteLookup: Send + Sync {
    fn provider_name(&self) -> &'static str;

    async fn latest_close(&self, ticker: &str) -> Option<f64>;
}

#[derive(Debug, Clone)]
pub struct YahooQuoteProvider {
    http: reqwest::Client,
    base_url: String,
    retries: u32,
    backoff: Duration,
}

impl YahooQuoteProvider {
    pub fn from_env() -> Result<Self> {
        let base_url = std::env::var("QUOTE_BASE_URL")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let timeout_secs = std::env::var("QUOTE_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let retries = std::env::var("QUOTE_RETRIES")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(DEFAULT_RETRIES);

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(BROWSER_USER_AGENT)
            .build()
            .context("failed to build quote http client")?;

        Ok(Self {
            http,
            base_url,
            retries,
            backoff: DEFAULT_BACKOFF,
        })
    }

    fn url(&self, ticker: &str) -> String {
        format!(
            "{}/v8/finance/chart/{ticker}",
            self.base_url.trim_end_matches('/')
        )
    }

    async fn fetch_once(&self, ticker: &str) -> Result<f64> {
        let res = self
            .http
            .get(self.url(ticker))
            .query(&[("range", "1d"), ("interval", "1d")])
            .send()
            .await
            .context("quote request failed")?;

        let status = res.status();
        let text = res.text().await.context("failed to read quote response")?;
        if !status.is_success() {
            anyhow::bail!("quote provider HTTP {status} for {ticker}");
        }

        let parsed = serde_json::from_str::<ChartResponse>(&text)
            .with_context(|| format!("quote response is not a chart payload: {text}"))?;
        parse_chart_price(parsed, ticker)
    }
}

#[async_trait::async_trait]
impl QuoteLookup for YahooQuoteProvider {
    fn provider_name(&self) -> &'static str {
        "yahoo_chart"
    }

    async fn latest_close(&self, ticker: &str) -> Option<f64> {
        if !is_plausible_ticker(ticker) {
            tracing::warn!(ticker, "skipping quote lookup for malformed ticker");
            return None;
        }

        match with_retries(self.retries, self.backoff, move |_| self.fetch_once(ticker)).await {
            Ok(price) => Some(price),
            Err(err) => {
                tracing::warn!(ticker, attempts = self.retries + 1, error = %err, "quote lookup failed");
                None
            }
        }
    }
}

/// Runs `op` once, then up to `retries` more times with doubling backoff.
async fn with_retries<T, F, Fut>(retries: u32, backoff: Duration, mut op: F) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let mut attempt: u32 = 0;
    loop {
        match op(attempt).await {
            Ok(v) => return Ok(v),
            Err(err) if attempt < retries => {
                let wait = backoff.saturating_mul(2u32.saturating_pow(attempt));
                tracing::debug!(attempt, ?wait, error = %err, "retrying");
                tokio::time::sleep(wait).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

fn is_plausible_ticker(ticker: &str) -> bool {
    !ticker.is_empty()
        && ticker.len() <= 12
        && ticker
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '^' | '='))
}

fn parse_chart_price(resp: ChartResponse, ticker: &str) -> Result<f64> {
    if let Some(err) = resp.chart.error {
        anyhow::bail!("chart error for {ticker}: {err}");
    }

    let data = resp
        .chart
        .result
        .and_then(|r| r.into_iter().next())
        .with_context(|| format!("empty chart result for {ticker}"))?;

    let from_quotes = data
        .indicators
        .and_then(|i| i.quote.into_iter().next())
        .and_then(|q| q.close.into_iter().flatten().last());

    let price = data
        .meta
        .regular_market_price
        .or(from_quotes)
        .with_context(|| format!("no price for {ticker}"))?;

    anyhow::ensure!(
        price.is_finite() && price > 0.0,
        "invalid price for {ticker}: {price}"
    );
    Ok(round2(price))
}

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    meta: ChartMeta,
    #[serde(default)]
    indicators: Option<ChartIndicators>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    #[serde(default)]
    regular_market_price: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ChartIndicators {
    #[serde(default)]
    quote: Vec<ChartQuote>,
}

#[derive(Debug, Deserialize)]
struct ChartQuote {
    #[serde(default)]
    close: Vec<Option<f64>>,
}
