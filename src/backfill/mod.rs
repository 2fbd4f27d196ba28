pub mod loader;
pub mod validator;

use chrono::{Duration, NaiveDate, Utc};
use std::path::{Path, PathBuf};

use crate::api::YahooClient;
use crate::models::DailyRecord;
use crate::Result;

pub use loader::{load_series, parse_series, write_series};
pub use validator::SeriesValidator;

pub const DATE_FORMAT: &str = "%Y-%m-%d";
const DEFAULT_LOOKBACK_DAYS: i64 = 365;

/// Parse a `YYYY-MM-DD` date
pub fn parse_date(date_string: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(date_string.trim(), DATE_FORMAT).map_err(|_| {
        format!(
            "Invalid date '{}': expected format YYYY-MM-DD",
            date_string
        )
        .into()
    })
}

/// Yesterday in UTC
pub fn yesterday() -> NaiveDate {
    Utc::now().date_naive() - Duration::days(1)
}

/// Inclusive start, exclusive end, as the provider treats them
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Resolve user-supplied bounds against today's date
    pub fn resolve(start: Option<&str>, end: Option<&str>) -> Result<Self> {
        Self::resolve_relative_to(start, end, yesterday())
    }

    /// Resolve bounds given what "yesterday" is
    ///
    /// - no start: a trailing year ending yesterday
    /// - no end: yesterday
    /// - an end after yesterday is pulled back to yesterday
    /// - a start after the end is swapped with it
    pub fn resolve_relative_to(
        start: Option<&str>,
        end: Option<&str>,
        yesterday: NaiveDate,
    ) -> Result<Self> {
        let start = match start {
            Some(s) => parse_date(s)?,
            None => yesterday - Duration::days(DEFAULT_LOOKBACK_DAYS),
        };
        let mut end = match end {
            Some(s) => parse_date(s)?,
            None => yesterday,
        };

        if end > yesterday {
            tracing::warn!(
                "The end date cannot be later than yesterday. Changed {} to {}",
                end,
                yesterday
            );
            end = yesterday;
        }

        if start > end {
            tracing::warn!(
                "Start date {} was after end date {}. Swapping",
                start,
                end
            );
            return Ok(Self {
                start: end,
                end: start,
            });
        }

        Ok(Self { start, end })
    }
}

/// `SPY_2003-01-01_to_2023-04-20.tsv`
pub fn cache_file_name(ticker: &str, range: &DateRange) -> String {
    format!(
        "{}_{}_to_{}.tsv",
        ticker.to_uppercase(),
        range.start.format(DATE_FORMAT),
        range.end.format(DATE_FORMAT)
    )
}

pub fn cache_path(data_dir: &Path, ticker: &str, range: &DateRange) -> PathBuf {
    data_dir.join(cache_file_name(ticker, range))
}

/// Load history from the cache file, fetching and caching it on a miss
pub async fn load_or_fetch(
    ticker: &str,
    range: &DateRange,
    data_dir: &Path,
    client: &YahooClient,
) -> Result<Vec<DailyRecord>> {
    let path = cache_path(data_dir, ticker, range);

    if path.is_file() {
        let records = load_series(&path)?;
        tracing::info!(
            "Read {} days of {} from cache file {}",
            records.len(),
            ticker.to_uppercase(),
            path.display()
        );
        return Ok(records);
    }

    if !data_dir.is_dir() {
        std::fs::create_dir_all(data_dir)?;
    }

    let records = client.get_daily_history(ticker, range).await?;
    if records.is_empty() {
        return Err(format!(
            "No price history returned for {} between {} and {}",
            ticker, range.start, range.end
        )
        .into());
    }

    write_series(&path, &records)?;
    tracing::info!(
        "Wrote {} days of {} into cache file {}",
        records.len(),
        ticker.to_uppercase(),
        path.display()
    );

    Ok(records)
}
