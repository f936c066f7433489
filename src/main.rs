//! Application entry point for the `fieldsense` backend service.
//!
//! This binary orchestrates the full startup sequence for the farm dashboard
//! API, including:
//! - Loading configuration from environment variables or `.env`
//! - Initializing structured logging/tracing
//! - Establishing a PostgreSQL connection pool
//! - Creating the sensor schema if it does not exist
//! - Building the weather-service client
//! - Mounting all API routes via the `routes` gateway
//! - Binding the Axum HTTP server and serving requests
//!
//! # Environment Variables
//! - `DATABASE_URL` (**required**) – PostgreSQL connection string
//! - `DB_POOL_MAX`, `LISTEN_PORT`, `WEATHER_*`, `READING_LOOKBACK_DAYS`,
//!   `GRAPH_HOURS` (optional) – see [`config`]
//! - `APP_LOG_LEVEL` (optional) – log verbosity (default: `debug`)
//! - `APP_SPAN_EVENTS` (optional) – span event mode for tracing
use std::{env, net::SocketAddr};

use axum::Router;
use dotenvy::dotenv;
use is_terminal::IsTerminal;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

use anyhow::Result;

mod aggregate;
mod catalogue;
mod config;
mod finance;
mod geo;
mod locale;
mod models;
mod routes;
mod schema;
mod weather;
mod windows;

pub use config::Config;

// Re-exported for routes/*.rs, so handlers only know their parent module
// and not the layout of the domain modules.
pub use aggregate::{build_views, FarmContext, SensorDataByLocation};
pub use catalogue::{build_catalogue, Catalogue, CatalogueEntry, CatalogueFilter, CropWithoutPlan};
pub use finance::{revenue_report, RangeSelection, RevenueType, Sale};
pub use geo::Point;
pub use locale::{Language, Locale};
pub use models::{
    NewReading, NewSensor, Sensor, SensorPoint, SensorReadingPoint, SummaryRequest,
    VisualizationData, VisualizationRequest,
};
pub use weather::OpenWeatherClient;
pub use windows::TimeWindows;

// ---

#[tokio::main]
async fn main() -> Result<()> {
    // ---
    init_tracing();
    dotenv().ok();

    let cfg = config::load_from_env()?;
    cfg.log_config();

    let pool = PgPoolOptions::new()
        .max_connections(cfg.db_pool_max)
        .connect(&cfg.db_url)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to connect to database: {}", e))?;

    tracing::info!("Successfully connected to database");

    schema::create_schema(&pool).await?;

    let weather = OpenWeatherClient::new(cfg.weather_api_urls.clone(), cfg.weather_timeout_secs)
        .map_err(|e| anyhow::anyhow!("Failed to build weather client: {}", e))?;

    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.listen_port));

    let app: Router = routes::router(pool.clone(), cfg, weather);

    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ---

/// Initialize the global tracing subscriber for structured logging.
///
/// - Color output follows `FORCE_COLOR` (`1|true|yes` on, `0|false|no` off),
///   otherwise TTY detection
/// - Span events follow `APP_SPAN_EVENTS`: `full`, `enter_exit`, or close-only
/// - Level comes from `RUST_LOG` if set, else `APP_LOG_LEVEL` (default `debug`)
///
/// Call once at startup, before any logging macro runs.
fn init_tracing() {
    // ---
    let span_events = match env::var("APP_SPAN_EVENTS").as_deref() {
        Ok("full") => FmtSpan::FULL,
        Ok("enter_exit") => FmtSpan::ENTER | FmtSpan::EXIT,
        _ => FmtSpan::CLOSE,
    };

    let use_color = match env::var("FORCE_COLOR").as_deref() {
        Ok("1") | Ok("true") | Ok("yes") => true,
        Ok("0") | Ok("false") | Ok("no") => false,
        _ => std::io::stdout().is_terminal(),
    };

    let env_filter = if env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = match env::var("APP_LOG_LEVEL").ok().as_deref() {
            Some("trace") => "trace",
            Some("debug") => "debug",
            Some("info") => "info",
            Some("warn") => "warn",
            Some("error") => "error",
            _ => "debug",
        };
        EnvFilter::new(format!("{level},sqlx::query=warn,hyper=info,reqwest=info"))
    };

    tracing_subscriber::fmt()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(span_events)
        .with_env_filter(env_filter)
        .with_ansi(use_color)
        .compact()
        .init();
}
