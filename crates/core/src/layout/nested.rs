use crate::domain::holding::Universe;
use crate::layout::treemap::{binary_treemap, KeyedRect, Rect, WeightedItem};
use crate::layout::LayoutError;
use serde::{Deserialize, Serialize};

/// Default heatmap canvas (100 x 60 user units).
pub const DEFAULT_CANVAS: Rect = Rect::new(0.0, 0.0, 100.0, 60.0);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickerTile {
    pub sector: String,
    #[serde(flatten)]
    pub rect: KeyedRect,
}

/// Sector rectangles partition the canvas; ticker tiles partition their sector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NestedLayout {
    pub sectors: Vec<KeyedRect>,
    pub tiles: Vec<TickerTile>,
}

pub fn nested_layout(universe: &Universe, canvas: Rect) -> Result<NestedLayout, LayoutError> {
    let sector_items: Vec<WeightedItem> = universe
        .sectors()
        .into_iter()
        .map(|sector| {
            let value = universe
                .members_of(sector)
                .filter_map(|h| universe.normalized_weight(&h.ticker))
                .sum::<f64>();
            WeightedItem::new(sector, value)
        })
        .collect();

    let sectors = binary_treemap(&sector_items, canvas)?;

    let mut tiles = Vec::with_capacity(universe.len());
    for sector in &sectors {
        let members: Vec<WeightedItem> = universe
            .members_of(&sector.key)
            .filter_map(|h| {
                universe
                    .normalized_weight(&h.ticker)
                    .map(|w| WeightedItem::new(h.ticker.as_str(), w))
            })
            .collect();

        for rect in binary_treemap(&members, sector.rect)? {
            tiles.push(TickerTile {
                sector: sector.key.clone(),
                rect,
            });
        }
    }

    tracing::debug!(
        sectors = sectors.len(),
        tiles = tiles.len(),
        "computed nested treemap layout"
    );

    Ok(NestedLayout { sectors, tiles })
}
