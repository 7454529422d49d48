use crate::domain::holding::Universe;
use crate::domain::series::{IndexPoint, LatestReturn, PricePoint, PriceSeries};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const BASE_LEVEL: f64 = 100.0;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexSnapshot {
    pub index: Vec<IndexPoint>,
    pub latest: BTreeMap<String, LatestReturn>,
}

/// Rebase every ticker to its first close on/after `start` and blend them by normalized
/// weight into one level series, plus each ticker's latest daily return.
///
/// Only dates on which every ticker of the universe has a close are emitted. Series
/// entries for tickers outside the universe are ignored.
pub fn aggregate(series: &PriceSeries, start: NaiveDate, universe: &Universe) -> IndexSnapshot {
    let empty: &[PricePoint] = &[];
    let series_of = |ticker: &str| series.get(ticker).map(Vec::as_slice).unwrap_or(empty);

    let weights = universe.normalized_weights();

    // A ticker without any close has no base; it also never has a close on any date,
    // so the intersection below is empty and the base is never consulted.
    let mut bases = Vec::with_capacity(weights.len());
    for (ticker, weight) in &weights {
        match base_price(series_of(*ticker), start) {
            Some(base) => bases.push((*ticker, *weight, base)),
            None => {
                tracing::debug!(ticker, "no closes; index will have no eligible dates");
            }
        }
    }

    let mut by_date: BTreeMap<NaiveDate, BTreeMap<&str, f64>> = BTreeMap::new();
    for (ticker, _) in &weights {
        for p in series_of(*ticker).iter().filter(|p| p.date >= start) {
            by_date.entry(p.date).or_default().insert(*ticker, p.close);
        }
    }

    let mut index = Vec::new();
    if bases.len() == weights.len() {
        for (date, closes) in &by_date {
            if closes.len() != weights.len() {
                continue;
            }
            let level: f64 = bases
                .iter()
                .map(|(ticker, weight, base)| weight * closes[ticker] / base)
                .sum();
            index.push(IndexPoint {
                date: *date,
                value: round_to(BASE_LEVEL * level, 4),
            });
        }
    }

    let latest = universe
        .tickers()
        .filter_map(|t| latest_return(t, series_of(t)).map(|r| (t.to_string(), r)))
        .collect();

    IndexSnapshot { index, latest }
}

/// First close on/after `start`, else the latest close, else `None`.
pub fn base_price(points: &[PricePoint], start: NaiveDate) -> Option<f64> {
    points
        .iter()
        .find(|p| p.date >= start)
        .or_else(|| points.last())
        .map(|p| p.close)
}

/// Change between the ticker's own two most recent closes, in percent (3 dp).
pub fn latest_return(ticker: &str, points: &[PricePoint]) -> Option<LatestReturn> {
    let (last, prev) = match points {
        [] => return None,
        [only] => (only, None),
        [.., prev, last] => (last, Some(prev)),
    };

    let pct = match prev {
        Some(prev) if prev.close != 0.0 => {
            round_to((last.close - prev.close) / prev.close * 100.0, 3)
        }
        _ => 0.0,
    };

    Some(LatestReturn {
        ticker: ticker.to_string(),
        pct,
        close: last.close,
    })
}

pub fn round_to(v: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (v * scale).round() / scale
}
