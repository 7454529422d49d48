pub mod domain;
pub mod index;
pub mod ingest;
pub mod layout;
pub mod snapshot;
pub mod time;

pub mod config {
    use crate::domain::holding::{default_start_date, Universe};
    use crate::time::window::resolve_start_date;
    use anyhow::Context;
    use chrono::NaiveDate;

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub sentry_dsn: Option<String>,
        pub universe_path: Option<String>,
        pub start_date: Option<String>,
        pub price_provider_base_url: Option<String>,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            Ok(Self {
                sentry_dsn: std::env::var("SENTRY_DSN").ok(),
                universe_path: std::env::var("ETF_UNIVERSE_PATH").ok(),
                start_date: std::env::var("ETF_START_DATE").ok(),
                price_provider_base_url: std::env::var("PRICE_PROVIDER_BASE_URL").ok(),
            })
        }

        /// Configured index start date, or the built-in inception date.
        pub fn start_date(&self) -> anyhow::Result<NaiveDate> {
            resolve_start_date(self.start_date.as_deref(), default_start_date())
                .context("invalid ETF_START_DATE")
        }

        /// Holdings from `ETF_UNIVERSE_PATH`, or the built-in table.
        pub fn load_universe(&self) -> anyhow::Result<Universe> {
            match self.universe_path.as_deref().filter(|p| !p.trim().is_empty()) {
                Some(path) => Universe::load(path).context("ETF_UNIVERSE_PATH"),
                None => Ok(Universe::default_universe()),
            }
        }
    }

}
