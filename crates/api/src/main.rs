use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use etfdash_core::domain::holding::Universe;
use etfdash_core::ingest::{PriceProvider, YahooChartProvider};
use etfdash_core::layout::nested::DEFAULT_CANVAS;
use etfdash_core::layout::Rect;
use etfdash_core::snapshot::{build_heatmap, build_snapshot, EtfSnapshot, Heatmap, IndexSummary};
use etfdash_core::time::window::{resolve_start_date, today_utc};

mod error;

use error::ApiError;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = etfdash_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let universe = settings.load_universe()?;
    let default_start = settings.start_date()?;
    let provider = YahooChartProvider::from_settings(&settings)?;

    tracing::info!(
        tickers = universe.len(),
        %default_start,
        provider = provider.provider_name(),
        "loaded index configuration"
    );

    let state = AppState {
        provider: Arc::new(provider),
        universe: Arc::new(universe),
        default_start,
    };

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/api/etf", get(get_etf))
        .route("/api/heatmap", get(get_heatmap))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3000);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!(%addr, "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Clone)]
struct AppState {
    provider: Arc<dyn PriceProvider>,
    universe: Arc<Universe>,
    default_start: NaiveDate,
}

impl AppState {
    fn start_date(&self, start: Option<&str>) -> Result<NaiveDate, ApiError> {
        resolve_start_date(start, self.default_start).map_err(|e| ApiError::BadRequest(format!("{e:#}")))
    }

    async fn snapshot(&self, start: NaiveDate) -> Result<EtfSnapshot, ApiError> {
        let today = today_utc(chrono::Utc::now());
        Ok(build_snapshot(Arc::clone(&self.provider), &self.universe, start, today).await?)
    }
}

#[derive(Debug, Deserialize)]
struct EtfQuery {
    start: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HeatmapQuery {
    start: Option<String>,
    width: Option<f64>,
    height: Option<f64>,
}

#[derive(Debug, Serialize)]
struct HeatmapResponse {
    summary: IndexSummary,
    heatmap: Heatmap,
}

async fn get_etf(
    State(state): State<AppState>,
    Query(query): Query<EtfQuery>,
) -> Result<Json<EtfSnapshot>, ApiError> {
    let start = state.start_date(query.start.as_deref())?;
    Ok(Json(state.snapshot(start).await?))
}

async fn get_heatmap(
    State(state): State<AppState>,
    Query(query): Query<HeatmapQuery>,
) -> Result<Json<HeatmapResponse>, ApiError> {
    let start = state.start_date(query.start.as_deref())?;
    let canvas = canvas_from_query(query.width, query.height)?;

    let snapshot = state.snapshot(start).await?;
    let heatmap = build_heatmap(&state.universe, canvas, &snapshot)?;

    Ok(Json(HeatmapResponse {
        summary: snapshot.summary(),
        heatmap,
    }))
}

fn canvas_from_query(width: Option<f64>, height: Option<f64>) -> Result<Rect, ApiError> {
    let w = width.unwrap_or(DEFAULT_CANVAS.w);
    let h = height.unwrap_or(DEFAULT_CANVAS.h);
    if !(w.is_finite() && h.is_finite() && w > 0.0 && h > 0.0) {
        return Err(ApiError::BadRequest(format!(
            "canvas width and height must be positive (got {w}x{h})"
        )));
    }
    Ok(Rect::new(0.0, 0.0, w, h))
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn init_sentry(settings: &etfdash_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> AppState {
        let settings = etfdash_core::config::Settings {
            sentry_dsn: None,
            universe_path: None,
            start_date: None,
            price_provider_base_url: None,
        };
        AppState {
            provider: Arc::new(YahooChartProvider::from_settings(&settings).unwrap()),
            universe: Arc::new(Universe::default_universe()),
            default_start: settings.start_date().unwrap(),
        }
    }

    #[test]
    fn out_of_range_start_is_bad_request() {
        let state = state();
        for start in ["-262143-01-01", "262142-12-31", "2025-02-30"] {
            assert!(
                matches!(state.start_date(Some(start)), Err(ApiError::BadRequest(_))),
                "{start}"
            );
        }
        assert_eq!(state.start_date(None).unwrap(), state.default_start);
    }

    #[test]
    fn canvas_defaults_and_validation() {
        assert_eq!(canvas_from_query(None, None).unwrap(), DEFAULT_CANVAS);
        assert_eq!(
            canvas_from_query(Some(320.0), Some(200.0)).unwrap(),
            Rect::new(0.0, 0.0, 320.0, 200.0)
        );
        assert!(canvas_from_query(Some(0.0), None).is_err());
        assert!(canvas_from_query(None, Some(f64::NAN)).is_err());
    }
}
