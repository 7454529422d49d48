use crate::config::Settings;
use crate::domain::series::PricePoint;
use crate::ingest::types::ChartResponse;
use crate::time::window::FetchWindow;
use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate};
use reqwest::StatusCode;
use std::collections::BTreeMap;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_RETRIES: u32 = 3;
const MAX_BACKOFF_EXPONENT: u32 = 6;
const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) etfdash/0.1";

/// Source of daily closes for one ticker.
#[async_trait::async_trait]
pub trait PriceProvider: Send + Sync {
    fn provider_name(&self) -> &'static str;

    /// Closes in `window`, ascending by date. An empty vec is a valid answer.
    async fn fetch_daily_closes(&self, ticker: &str, window: FetchWindow) -> Result<Vec<PricePoint>>;
}

#[derive(Debug, Clone)]
pub struct YahooChartProvider {
    http: reqwest::Client,
    base_url: String,
    retries: u32,
}

impl YahooChartProvider {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let base_url = settings
            .price_provider_base_url
            .clone()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let timeout_secs = std::env::var("PRICE_PROVIDER_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let retries = std::env::var("PRICE_PROVIDER_RETRIES")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(DEFAULT_RETRIES)
            .max(1);

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .context("failed to build price provider http client")?;

        Ok(Self {
            http,
            base_url,
            retries,
        })
    }

    fn url(&self, ticker: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), ticker)
    }

    async fn fetch_once(&self, ticker: &str, window: FetchWindow) -> Result<Attempt> {
        let (period1, period2) = window.unix_bounds()?;

        let res = self
            .http
            .get(self.url(ticker))
            .query(&[
                ("period1", period1.to_string()),
                ("period2", period2.to_string()),
                ("interval", "1d".to_string()),
                ("events", "history".to_string()),
            ])
            .send()
            .await;

        let res = match res {
            Ok(r) => r,
            Err(err) => {
                return Ok(Attempt::Retry(
                    anyhow::Error::new(err).context("price provider request failed"),
                ))
            }
        };

        let status = res.status();
        let text = res
            .text()
            .await
            .context("failed to read price provider response")?;

        if !status.is_success() {
            let err = anyhow::anyhow!("price provider HTTP {status} for {ticker}: {text}");
            let retryable = status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error();
            return Ok(if retryable {
                Attempt::Retry(err)
            } else {
                Attempt::Fatal(err)
            });
        }

        match parse_chart(&text, window) {
            Ok(points) => Ok(Attempt::Done(points)),
            Err(err) => Ok(Attempt::Fatal(err)),
        }
    }
}

enum Attempt {
    Done(Vec<PricePoint>),
    Retry(anyhow::Error),
    Fatal(anyhow::Error),
}

#[async_trait::async_trait]
impl PriceProvider for YahooChartProvider {
    fn provider_name(&self) -> &'static str {
        "yahoo_chart"
    }

    async fn fetch_daily_closes(&self, ticker: &str, window: FetchWindow) -> Result<Vec<PricePoint>> {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match self.fetch_once(ticker, window).await? {
                Attempt::Done(points) => return Ok(points),
                Attempt::Fatal(err) => return Err(err),
                Attempt::Retry(err) => {
                    if attempt >= self.retries {
                        return Err(err);
                    }
                    let backoff = retry_backoff(attempt);
                    tracing::warn!(attempt, ?backoff, ticker, error = %err, "price fetch failed; retrying");
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }
}

/// Exponential backoff after the given (1-based) failed attempt, capped at 64s.
fn retry_backoff(attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(MAX_BACKOFF_EXPONENT);
    Duration::from_secs(1u64 << exponent)
}

/// Turn a chart response into ascending daily closes inside `window`.
///
/// Null or non-positive closes are dropped. Timestamps are shifted by the exchange's
/// `gmtoffset` before taking the calendar date; a repeated date keeps the last row.
pub fn parse_chart(text: &str, window: FetchWindow) -> Result<Vec<PricePoint>> {
    let resp = serde_json::from_str::<ChartResponse>(text)
        .with_context(|| format!("price provider response is not a chart payload: {text}"))?;

    if let Some(err) = resp.chart.error {
        anyhow::bail!("price provider error [{}]: {}", err.code, err.description);
    }

    let Some(result) = resp.chart.result.and_then(|r| r.into_iter().next()) else {
        return Ok(Vec::new());
    };

    let offset = result.meta.as_ref().map(|m| m.gmtoffset).unwrap_or(0);
    let closes = result
        .indicators
        .quote
        .first()
        .map(|q| q.close.as_slice())
        .unwrap_or(&[]);

    let mut by_date = BTreeMap::<NaiveDate, f64>::new();
    for (ts, close) in result.timestamp.iter().zip(closes) {
        let Some(close) = (*close).filter(|c| c.is_finite() && *c > 0.0) else {
            continue;
        };
        let Some(date) = ts
            .checked_add(offset)
            .and_then(|local| DateTime::from_timestamp(local, 0))
            .map(|dt| dt.date_naive())
        else {
            continue;
        };
        if window.contains(date) {
            by_date.insert(date, close);
        }
    }

    Ok(by_date
        .into_iter()
        .map(|(date, close)| PricePoint::new(date, close))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn window() -> FetchWindow {
        FetchWindow {
            from: NaiveDate::from_ymd_opt(2025, 8, 10).unwrap(),
            to: NaiveDate::from_ymd_opt(2025, 8, 31).unwrap(),
        }
    }

    #[test]
    fn parses_closes_in_exchange_time() {
        // 13:30 UTC on 2025-08-20/21/22; the -4h offset keeps each on its UTC day.
        let v = json!({
            "chart": {
                "result": [{
                    "meta": {"symbol": "NVDA", "gmtoffset": -14400},
                    "timestamp": [1755696600, 1755783000, 1755869400],
                    "indicators": {"quote": [{"close": [175.4, null, 177.99]}]}
                }],
                "error": null
            }
        });

        let points = parse_chart(&v.to_string(), window()).unwrap();
        assert_eq!(
            points,
            vec![
                PricePoint::new(NaiveDate::from_ymd_opt(2025, 8, 20).unwrap(), 175.4),
                PricePoint::new(NaiveDate::from_ymd_opt(2025, 8, 22).unwrap(), 177.99),
            ]
        );
    }

    #[test]
    fn drops_rows_outside_window_and_bad_closes() {
        let v = json!({
            "chart": {
                "result": [{
                    "meta": {"gmtoffset": 0},
                    // 2025-08-01, 2025-08-20, 2025-08-21
                    "timestamp": [1754006400, 1755648000, 1755734400],
                    "indicators": {"quote": [{"close": [10.0, 0.0, 12.5]}]}
                }],
                "error": null
            }
        });

        let points = parse_chart(&v.to_string(), window()).unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].close, 12.5);
    }

    #[test]
    fn skips_rows_with_overflowing_timestamps() {
        let v = json!({
            "chart": {
                "result": [{
                    "meta": {"gmtoffset": 3600},
                    // i64::MAX, then 2025-08-21 00:00 UTC
                    "timestamp": [9223372036854775807i64, 1755734400],
                    "indicators": {"quote": [{"close": [99.0, 12.5]}]}
                }],
                "error": null
            }
        });

        let points = parse_chart(&v.to_string(), window()).unwrap();
        assert_eq!(
            points,
            vec![PricePoint::new(NaiveDate::from_ymd_opt(2025, 8, 21).unwrap(), 12.5)]
        );
    }

    #[test]
    fn backoff_is_capped() {
        assert_eq!(retry_backoff(1), Duration::from_secs(1));
        assert_eq!(retry_backoff(3), Duration::from_secs(4));
        assert_eq!(retry_backoff(7), Duration::from_secs(64));
        assert_eq!(retry_backoff(65), Duration::from_secs(64));
        assert_eq!(retry_backoff(u32::MAX), Duration::from_secs(64));
    }

    #[test]
    fn surfaces_api_error() {
        let v = json!({
            "chart": {
                "result": null,
                "error": {"code": "Not Found", "description": "No data found, symbol may be delisted"}
            }
        });
        let err = parse_chart(&v.to_string(), window()).unwrap_err();
        assert!(err.to_string().contains("delisted"));
    }

    #[test]
    fn empty_result_is_empty_series() {
        let v = json!({"chart": {"result": [], "error": null}});
        assert!(parse_chart(&v.to_string(), window()).unwrap().is_empty());
        assert!(parse_chart("not json", window()).is_err());
    }
}
