use crate::domain::holding::Universe;
use crate::domain::series::{IndexPoint, LatestReturn};
use crate::index::{aggregate, round_to, BASE_LEVEL};
use crate::ingest::{fetch_universe, PriceProvider};
use crate::layout::color::{color_for_pct, Rgb};
use crate::layout::nested::{nested_layout, NestedLayout};
use crate::layout::{KeyedRect, LayoutError, Rect};
use crate::time::window::FetchWindow;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Payload served to the dashboard front end.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EtfSnapshot {
    pub base: f64,
    pub start_date: NaiveDate,
    pub index: Vec<IndexPoint>,
    pub latest: BTreeMap<String, LatestReturn>,
    pub sectors: BTreeMap<String, String>,
    pub weights: BTreeMap<String, f64>,
}

impl EtfSnapshot {
    /// Tickers of the universe with no latest close (their fetch failed or was empty).
    pub fn missing_tickers(&self) -> Vec<&str> {
        self.sectors
            .keys()
            .filter(|t| !self.latest.contains_key(*t))
            .map(String::as_str)
            .collect()
    }

    pub fn summary(&self) -> IndexSummary {
        IndexSummary::from_index(&self.index)
    }
}

/// Headline numbers: the latest level and its change versus the previous eligible date.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexSummary {
    pub level: f64,
    pub previous: f64,
    pub daily_change_pct: f64,
}

impl IndexSummary {
    pub fn from_index(index: &[IndexPoint]) -> Self {
        let level = index.last().map(|p| p.value).unwrap_or(BASE_LEVEL);
        let previous = index
            .len()
            .checked_sub(2)
            .and_then(|i| index.get(i))
            .map(|p| p.value)
            .unwrap_or(BASE_LEVEL);
        let daily_change_pct = if previous != 0.0 {
            round_to((level - previous) / previous * 100.0, 2)
        } else {
            0.0
        };
        Self {
            level,
            previous,
            daily_change_pct,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeatmapTile {
    pub ticker: String,
    pub sector: String,
    #[serde(flatten)]
    pub rect: Rect,
    pub pct: f64,
    pub color: Rgb,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Heatmap {
    pub canvas: Rect,
    pub sectors: Vec<KeyedRect>,
    pub tiles: Vec<HeatmapTile>,
}

/// Color every tile of the nested layout by its ticker's latest return (0 when unknown).
pub fn heatmap(
    layout: NestedLayout,
    canvas: Rect,
    latest: &BTreeMap<String, LatestReturn>,
) -> Heatmap {
    let tiles = layout
        .tiles
        .into_iter()
        .map(|tile| {
            let pct = latest.get(&tile.rect.key).map(|r| r.pct).unwrap_or(0.0);
            HeatmapTile {
                ticker: tile.rect.key,
                sector: tile.sector,
                rect: tile.rect.rect,
                pct,
                color: color_for_pct(pct),
            }
        })
        .collect();

    Heatmap {
        canvas,
        sectors: layout.sectors,
        tiles,
    }
}

pub fn build_heatmap(
    universe: &Universe,
    canvas: Rect,
    snapshot: &EtfSnapshot,
) -> Result<Heatmap, LayoutError> {
    let layout = nested_layout(universe, canvas)?;
    Ok(heatmap(layout, canvas, &snapshot.latest))
}

/// Fetch closes for the universe and compute the dashboard payload.
pub async fn build_snapshot(
    provider: Arc<dyn PriceProvider>,
    universe: &Universe,
    start: NaiveDate,
    today: NaiveDate,
) -> anyhow::Result<EtfSnapshot> {
    let window = FetchWindow::for_start(start, today)?;
    let series = fetch_universe(provider, universe, window).await;
    let computed = aggregate(&series, start, universe);

    tracing::info!(
        %start,
        eligible_dates = computed.index.len(),
        latest = computed.latest.len(),
        "computed index snapshot"
    );

    Ok(EtfSnapshot {
        base: BASE_LEVEL,
        start_date: start,
        index: computed.index,
        latest: computed.latest,
        sectors: universe.sector_map(),
        weights: universe.raw_weights(),
    })
}
