use crate::domain::holding::Universe;
use crate::domain::series::PriceSeries;
use crate::ingest::provider::PriceProvider;
use crate::time::window::FetchWindow;
use std::sync::Arc;
use tokio::task::JoinSet;

/// Fetch every ticker of the universe concurrently.
///
/// A ticker whose fetch fails (or whose task panics) is logged and recorded as an
/// empty series; it never fails the whole fetch. Every universe ticker has an entry.
pub async fn fetch_universe(
    provider: Arc<dyn PriceProvider>,
    universe: &Universe,
    window: FetchWindow,
) -> PriceSeries {
    let mut tasks = JoinSet::new();
    for ticker in universe.tickers() {
        let provider = Arc::clone(&provider);
        let ticker = ticker.to_string();
        tasks.spawn(async move {
            let res = provider.fetch_daily_closes(&ticker, window).await;
            (ticker, res)
        });
    }

    let mut series: PriceSeries = universe
        .tickers()
        .map(|t| (t.to_string(), Vec::new()))
        .collect();
    let mut failures: usize = 0;

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((ticker, Ok(points))) => {
                tracing::debug!(ticker = %ticker, points = points.len(), "fetched daily closes");
                series.insert(ticker, points);
            }
            Ok((ticker, Err(err))) => {
                failures += 1;
                tracing::warn!(
                    ticker = %ticker,
                    provider = provider.provider_name(),
                    error = %err,
                    "price fetch failed; using empty series"
                );
            }
            Err(err) => {
                failures += 1;
                tracing::error!(error = %err, "price fetch task aborted; using empty series");
            }
        }
    }

    tracing::info!(
        tickers = universe.len(),
        failures,
        from = %window.from,
        to = %window.to,
        "fetched universe closes"
    );

    series
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::domain::holding::Holding;
    use crate::domain::series::PricePoint;
    use anyhow::Result;
    use chrono::NaiveDate;
    use std::collections::HashMap;

    /// In-memory provider; tickers without an entry fail.
    pub(crate) struct StubProvider {
        pub closes: HashMap<String, Vec<PricePoint>>,
        pub panic_on: Option<String>,
    }

    #[async_trait::async_trait]
    impl PriceProvider for StubProvider {
        fn provider_name(&self) -> &'static str {
            "stub"
        }

        async fn fetch_daily_closes(&self, ticker: &str, window: FetchWindow) -> Result<Vec<PricePoint>> {
            if self.panic_on.as_deref() == Some(ticker) {
                panic!("stub provider panic for {ticker}");
            }
            let points = self
                .closes
                .get(ticker)
                .ok_or_else(|| anyhow::anyhow!("unknown ticker {ticker}"))?;
            Ok(points.iter().copied().filter(|p| window.contains(p.date)).collect())
        }
    }

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 8, day).unwrap()
    }

    fn universe() -> Universe {
        Universe::try_new(
            ["A", "B", "C"]
                .iter()
                .map(|t| Holding {
                    ticker: t.to_string(),
                    sector: "S".into(),
                    weight: 1.0,
                })
                .collect(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn failed_ticker_degrades_to_empty_series() {
        let mut closes = HashMap::new();
        closes.insert("A".to_string(), vec![PricePoint::new(d(20), 1.0)]);
        closes.insert("C".to_string(), vec![PricePoint::new(d(20), 3.0)]);
        let provider = Arc::new(StubProvider {
            closes,
            panic_on: None,
        });

        let window = FetchWindow::for_start(d(20), d(25)).unwrap();
        let series = fetch_universe(provider, &universe(), window).await;

        assert_eq!(series.len(), 3);
        assert_eq!(series["A"], vec![PricePoint::new(d(20), 1.0)]);
        assert!(series["B"].is_empty());
        assert_eq!(series["C"].len(), 1);
    }

    #[tokio::test]
    async fn panicking_task_does_not_fail_the_join() {
        let mut closes = HashMap::new();
        for t in ["A", "B", "C"] {
            closes.insert(t.to_string(), vec![PricePoint::new(d(21), 2.0)]);
        }
        let provider = Arc::new(StubProvider {
            closes,
            panic_on: Some("B".into()),
        });

        let window = FetchWindow::for_start(d(20), d(25)).unwrap();
        let series = fetch_universe(provider, &universe(), window).await;

        assert!(series["B"].is_empty());
        assert_eq!(series["A"].len(), 1);
        assert_eq!(series["C"].len(), 1);
    }
}
