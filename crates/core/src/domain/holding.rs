use anyhow::{ensure, Context};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

/// Index inception date: every ticker is rebased to 100 on the first close on/after it.
pub const DEFAULT_START_DATE: (i32, u32, u32) = (2025, 8, 20);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    pub ticker: String,
    pub sector: String,
    pub weight: f64,
}

impl Holding {
    fn new(ticker: &str, sector: &str, weight: f64) -> Self {
        Self {
            ticker: ticker.to_string(),
            sector: sector.to_string(),
            weight,
        }
    }
}

/// The ordered, validated set of holdings covered by the index.
///
/// Weights are raw and need not sum to 100; [`Universe::normalized_weights`] divides
/// them by their total at use time.
#[derive(Debug, Clone, PartialEq)]
pub struct Universe {
    holdings: Vec<Holding>,
    total_weight: f64,
}

pub fn default_start_date() -> NaiveDate {
    let (y, m, d) = DEFAULT_START_DATE;
    NaiveDate::from_ymd_opt(y, m, d).unwrap_or(NaiveDate::MIN)
}

impl Universe {
    pub fn try_new(holdings: Vec<Holding>) -> anyhow::Result<Self> {
        ensure!(!holdings.is_empty(), "universe must contain at least one holding");

        let mut seen = HashSet::<&str>::new();
        for h in &holdings {
            ensure!(!h.ticker.trim().is_empty(), "ticker must be non-empty");
            ensure!(
                !h.sector.trim().is_empty(),
                "sector must be non-empty (ticker={})",
                h.ticker
            );
            ensure!(
                h.weight.is_finite() && h.weight > 0.0,
                "weight must be a positive number (ticker={}, weight={})",
                h.ticker,
                h.weight
            );
            ensure!(seen.insert(h.ticker.as_str()), "duplicate ticker: {}", h.ticker);
        }

        let total_weight = holdings.iter().map(|h| h.weight).sum();
        Ok(Self {
            holdings,
            total_weight,
        })
    }

    /// Built-in holdings table.
    pub fn default_universe() -> Self {
        let holdings = vec![
            Holding::new("NVDA", "Technology", 24.7),
            Holding::new("PLTR", "Technology", 12.3),
            Holding::new("AVGO", "Technology", 7.9),
            Holding::new("GOOGL", "Technology", 4.3),
            Holding::new("TSLA", "Technology", 9.0),
            Holding::new("HOOD", "Financials", 9.8),
            Holding::new("JPM", "Financials", 8.9),
            Holding::new("COIN", "Financials", 4.0),
            Holding::new("STT", "Financials", 2.2),
            Holding::new("GEV", "Industrials", 3.2),
            Holding::new("UBER", "Industrials", 2.7),
            Holding::new("RKLB", "Industrials", 2.3),
            Holding::new("KO", "Consumer Defensive", 8.7),
        ];
        let total_weight = holdings.iter().map(|h| h.weight).sum();
        Self {
            holdings,
            total_weight,
        }
    }

    pub fn from_json_str(json: &str) -> anyhow::Result<Self> {
        let holdings = serde_json::from_str::<Vec<Holding>>(json)
            .context("universe file must be a JSON array of {ticker, sector, weight}")?;
        Self::try_new(holdings)
    }

    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read universe file {}", path.display()))?;
        Self::from_json_str(&text).with_context(|| format!("invalid universe file {}", path.display()))
    }

    pub fn holdings(&self) -> &[Holding] {
        &self.holdings
    }

    pub fn len(&self) -> usize {
        self.holdings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.holdings.is_empty()
    }

    pub fn tickers(&self) -> impl Iterator<Item = &str> {
        self.holdings.iter().map(|h| h.ticker.as_str())
    }

    pub fn get(&self, ticker: &str) -> Option<&Holding> {
        self.holdings.iter().find(|h| h.ticker == ticker)
    }

    pub fn sector_of(&self, ticker: &str) -> Option<&str> {
        self.get(ticker).map(|h| h.sector.as_str())
    }

    pub fn normalized_weight(&self, ticker: &str) -> Option<f64> {
        self.get(ticker).map(|h| h.weight / self.total_weight)
    }

    /// `(ticker, weight / Σ weights)` in universe order.
    pub fn normalized_weights(&self) -> Vec<(&str, f64)> {
        self.holdings
            .iter()
            .map(|h| (h.ticker.as_str(), h.weight / self.total_weight))
            .collect()
    }

    /// Distinct sectors in order of first appearance.
    pub fn sectors(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for h in &self.holdings {
            if !out.contains(&h.sector.as_str()) {
                out.push(h.sector.as_str());
            }
        }
        out
    }

    pub fn members_of<'a>(&'a self, sector: &'a str) -> impl Iterator<Item = &'a Holding> + 'a {
        self.holdings.iter().filter(move |h| h.sector == sector)
    }

    pub fn sector_map(&self) -> BTreeMap<String, String> {
        self.holdings
            .iter()
            .map(|h| (h.ticker.clone(), h.sector.clone()))
            .collect()
    }

    pub fn raw_weights(&self) -> BTreeMap<String, f64> {
        self.holdings
            .iter()
            .map(|h| (h.ticker.clone(), h.weight))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalized_weights_sum_to_one() {
        let universe = Universe::default_universe();
        let sum: f64 = universe.normalized_weights().iter().map(|(_, w)| w).sum();
        assert!((sum - 1.0).abs() < 1e-12, "sum={sum}");

        let custom = Universe::try_new(vec![
            Holding::new("A", "S1", 3.0),
            Holding::new("B", "S1", 0.5),
            Holding::new("C", "S2", 1234.5),
        ])
        .unwrap();
        let sum: f64 = custom.normalized_weights().iter().map(|(_, w)| w).sum();
        assert!((sum - 1.0).abs() < 1e-12, "sum={sum}");
    }

    #[test]
    fn default_universe_passes_validation() {
        let universe = Universe::default_universe();
        let revalidated = Universe::try_new(universe.holdings().to_vec()).unwrap();
        assert_eq!(revalidated, universe);
        assert_eq!(universe.len(), 13);
        assert_eq!(default_start_date(), NaiveDate::from_ymd_opt(2025, 8, 20).unwrap());
    }

    #[test]
    fn sectors_keep_first_appearance_order() {
        let universe = Universe::default_universe();
        assert_eq!(
            universe.sectors(),
            vec!["Technology", "Financials", "Industrials", "Consumer Defensive"]
        );
        assert_eq!(universe.members_of("Industrials").count(), 3);
        assert_eq!(universe.sector_of("KO"), Some("Consumer Defensive"));
    }

    #[test]
    fn rejects_invalid_holdings() {
        assert!(Universe::try_new(vec![]).is_err());
        assert!(Universe::try_new(vec![Holding::new("A", "S", 0.0)]).is_err());
        assert!(Universe::try_new(vec![Holding::new("A", "S", f64::NAN)]).is_err());
        assert!(Universe::try_new(vec![Holding::new(" ", "S", 1.0)]).is_err());
        assert!(Universe::try_new(vec![Holding::new("A", "", 1.0)]).is_err());
        assert!(Universe::try_new(vec![
            Holding::new("A", "S", 1.0),
            Holding::new("A", "T", 2.0),
        ])
        .is_err());
    }

    #[test]
    fn example_table_matches_built_in_universe() {
        let example = Universe::from_json_str(include_str!(
            "../../../../config/universe.example.json"
        ))
        .unwrap();
        assert_eq!(example, Universe::default_universe());
    }

    #[test]
    fn parses_json_table() {
        let json = r#"[
            {"ticker": "T1", "sector": "S1", "weight": 60},
            {"ticker": "T2", "sector": "S1", "weight": 40}
        ]"#;
        let universe = Universe::from_json_str(json).unwrap();
        assert_eq!(universe.tickers().collect::<Vec<_>>(), vec!["T1", "T2"]);
        assert_eq!(universe.normalized_weight("T1"), Some(0.6));
        assert_eq!(universe.raw_weights().get("T2").copied(), Some(40.0));

        assert!(Universe::from_json_str(r#"{"ticker": "T1"}"#).is_err());
    }
}
