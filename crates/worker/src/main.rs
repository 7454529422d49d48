use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use etfdash_core::domain::holding::Universe;
use etfdash_core::ingest::YahooChartProvider;
use etfdash_core::layout::nested::DEFAULT_CANVAS;
use etfdash_core::layout::Rect;
use etfdash_core::snapshot::{build_heatmap, build_snapshot};
use etfdash_core::time::window::{resolve_start_date, today_utc};

#[derive(Debug, Parser)]
#[command(name = "etfdash_worker")]
struct Args {
    /// Index start date (YYYY-MM-DD). Defaults to ETF_START_DATE or the built-in date.
    #[arg(long)]
    start: Option<String>,

    /// JSON holdings table to use instead of ETF_UNIVERSE_PATH / the built-in table.
    #[arg(long)]
    universe: Option<String>,

    /// Print the colored heatmap layout instead of the index snapshot.
    #[arg(long)]
    heatmap: bool,

    /// Heatmap canvas width.
    #[arg(long, default_value_t = DEFAULT_CANVAS.w)]
    width: f64,

    /// Heatmap canvas height.
    #[arg(long, default_value_t = DEFAULT_CANVAS.h)]
    height: f64,

    /// Pretty-print JSON output.
    #[arg(long)]
    pretty: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = etfdash_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();

    let res = run(&settings, &args).await;
    if let Err(err) = &res {
        sentry_anyhow::capture_anyhow(err);
        tracing::error!(error = %err, "worker run failed");
    }
    res
}

async fn run(settings: &etfdash_core::config::Settings, args: &Args) -> anyhow::Result<()> {
    let universe = match args.universe.as_deref() {
        Some(path) => Universe::load(path)?,
        None => settings.load_universe()?,
    };
    let start = resolve_start_date(args.start.as_deref(), settings.start_date()?)?;
    let provider = Arc::new(YahooChartProvider::from_settings(settings)?);

    let snapshot = build_snapshot(provider, &universe, start, today_utc(chrono::Utc::now())).await?;

    let summary = snapshot.summary();
    tracing::info!(
        %start,
        eligible_dates = snapshot.index.len(),
        latest_level = summary.level,
        daily_change_pct = summary.daily_change_pct,
        missing_tickers = ?snapshot.missing_tickers(),
        "index snapshot ready"
    );

    let value = if args.heatmap {
        anyhow::ensure!(
            args.width > 0.0 && args.height > 0.0,
            "canvas width and height must be positive (got {}x{})",
            args.width,
            args.height
        );
        let canvas = Rect::new(0.0, 0.0, args.width, args.height);
        let heatmap = build_heatmap(&universe, canvas, &snapshot).context("heatmap layout failed")?;
        serde_json::json!({ "summary": summary, "heatmap": heatmap })
    } else {
        serde_json::to_value(&snapshot)?
    };

    let out = if args.pretty {
        serde_json::to_string_pretty(&value)?
    } else {
        serde_json::to_string(&value)?
    };
    println!("{out}");
    Ok(())
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
