pub mod fanout;
pub mod provider;
pub mod types;

pub use fanout::fetch_universe;
pub use provider::{PriceProvider, YahooChartProvider};
