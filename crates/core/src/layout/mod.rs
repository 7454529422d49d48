pub mod color;
pub mod error;
pub mod nested;
pub mod treemap;

pub use error::LayoutError;
pub use treemap::{binary_treemap, KeyedRect, Rect, WeightedItem};
