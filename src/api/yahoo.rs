use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use governor::{Quota, RateLimiter};
use reqwest::Client;
use serde::Deserialize;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use crate::backfill::DateRange;
use crate::models::DailyRecord;

pub const YAHOO_API_BASE: &str = "https://query1.finance.yahoo.com";
const RATE_LIMIT_RPM: u32 = 60;
const MAX_RETRIES: u32 = 3;
const USER_AGENT: &str = "Mozilla/5.0 (compatible; dca-backtest/0.1)";

type YahooRateLimiter = RateLimiter<
    governor::state::direct::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Yahoo Finance chart API client with rate limiting
///
/// Cloneable; all clones share the same rate limiter.
#[derive(Clone)]
pub struct YahooClient {
    client: Client,
    base_url: String,
    rate_limiter: Arc<YahooRateLimiter>,
    backoff_unit: Duration,
}

/// Response from /v8/finance/chart/{ticker}
#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartBody,
}

#[derive(Debug, Deserialize)]
struct ChartBody {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<QuoteSeries>,
    #[serde(default)]
    adjclose: Vec<AdjCloseSeries>,
}

#[derive(Debug, Deserialize, Default)]
struct QuoteSeries {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct AdjCloseSeries {
    #[serde(default)]
    adjclose: Vec<Option<f64>>,
}

impl YahooClient {
    pub fn new() -> Result<Self> {
        Self::with_base_url(YAHOO_API_BASE)
    }

    /// Client pointed at another host (a mirror or a mock server)
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to build HTTP client")?;

        let quota = Quota::per_minute(NonZeroU32::new(RATE_LIMIT_RPM).unwrap_or(NonZeroU32::MIN));

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            rate_limiter: Arc::new(RateLimiter::direct(quota)),
            backoff_unit: Duration::from_secs(1),
        })
    }

    /// Scale the retry wait, `unit * 2^attempt`
    pub fn with_backoff_unit(mut self, unit: Duration) -> Self {
        self.backoff_unit = unit;
        self
    }

    fn backoff(&self, attempt: u32) -> Duration {
        self.backoff_unit * 2u32.pow(attempt)
    }

    /// Make a rate-limited API request with retry logic
    async fn make_request(&self, url: &str) -> Result<reqwest::Response> {
        for attempt in 1..=MAX_RETRIES {
            self.rate_limiter.until_ready().await;

            match self.client.get(url).send().await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        return Ok(response);
                    }

                    let retryable = status.as_u16() == 429 || status.is_server_error();

                    if retryable && attempt < MAX_RETRIES {
                        let backoff = self.backoff(attempt);
                        tracing::warn!(
                            "Yahoo returned {}, retrying in {:?} (attempt {}/{})",
                            status,
                            backoff,
                            attempt,
                            MAX_RETRIES
                        );
                        tokio::time::sleep(backoff).await;
                        continue;
                    }

                    if retryable {
                        anyhow::bail!(
                            "Yahoo Finance API error ({}) after {} attempts",
                            status,
                            MAX_RETRIES
                        );
                    }

                    // Other errors (4xx) - don't retry
                    let error_text = response
                        .text()
                        .await
                        .unwrap_or_else(|_| "Unknown error".to_string());
                    anyhow::bail!("Yahoo Finance API error ({}): {}", status, error_text);
                }
                Err(e) if attempt < MAX_RETRIES => {
                    let backoff = self.backoff(attempt);
                    tracing::warn!(
                        "Network error: {}, retrying in {:?} (attempt {}/{})",
                        e,
                        backoff,
                        attempt,
                        MAX_RETRIES
                    );
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => anyhow::bail!("Network error after {} retries: {}", MAX_RETRIES, e),
            }
        }

        anyhow::bail!("Failed after {} retries", MAX_RETRIES)
    }

    /// Daily bars for `ticker` from `range.start` up to, not including, `range.end`
    pub async fn get_daily_history(
        &self,
        ticker: &str,
        range: &DateRange,
    ) -> Result<Vec<DailyRecord>> {
        let url = format!(
            "{}/v8/finance/chart/{}?period1={}&period2={}&interval=1d&events=div%2Csplits",
            self.base_url,
            ticker.to_uppercase(),
            midnight_timestamp(range.start),
            midnight_timestamp(range.end)
        );

        tracing::info!(
            "Fetching {} daily history {} to {} from Yahoo Finance",
            ticker.to_uppercase(),
            range.start,
            range.end
        );

        let response = self.make_request(&url).await?;
        let chart: ChartResponse = response
            .json()
            .await
            .context("Failed to parse chart response")?;

        if let Some(err) = chart.chart.error {
            anyhow::bail!("Yahoo Finance error {}: {}", err.code, err.description);
        }

        let result = chart
            .chart
            .result
            .and_then(|mut results| results.pop())
            .with_context(|| format!("No chart data returned for {}", ticker))?;

        let records = convert_chart(result);
        tracing::debug!("Converted {} daily bars for {}", records.len(), ticker);

        Ok(records)
    }
}

fn midnight_timestamp(date: NaiveDate) -> i64 {
    date.and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc().timestamp())
        .unwrap_or_default()
}

/// Turn column arrays into ordered records, dropping bars without a close
fn convert_chart(result: ChartResult) -> Vec<DailyRecord> {
    let quote = result.indicators.quote.into_iter().next().unwrap_or_default();
    let adjclose = result
        .indicators
        .adjclose
        .into_iter()
        .next()
        .map(|a| a.adjclose)
        .unwrap_or_default();

    let at = |values: &[Option<f64>], i: usize| values.get(i).copied().flatten();

    let mut records: Vec<DailyRecord> = Vec::with_capacity(result.timestamp.len());

    for (i, &ts) in result.timestamp.iter().enumerate() {
        let Some(close) = at(&quote.close, i) else {
            tracing::debug!("Skipping bar at {} with no close", ts);
            continue;
        };

        records.push(DailyRecord {
            sequence_index: records.len(),
            date: DateTime::<Utc>::from_timestamp(ts, 0).map(|dt| dt.date_naive()),
            open: at(&quote.open, i).unwrap_or(close),
            high: at(&quote.high, i).unwrap_or(close),
            low: at(&quote.low, i).unwrap_or(close),
            close,
            adj_close: at(&adjclose, i).unwrap_or(close),
            volume: at(&quote.volume, i).unwrap_or(0.0),
        });
    }

    records
}
