//! Configuration loader for the `fieldsense` backend service.
//!
//! This module centralizes all runtime configuration values and their defaults,
//! loading from environment variables (with optional `.env` file support
//! provided by the caller). Handlers only ever see the loaded [`Config`].
use std::env;

use anyhow::{anyhow, Result};

use crate::windows::AllowedHours;

/// OpenWeather endpoints queried for temperature views, in the order
/// current weather, history, hourly forecast.
const DEFAULT_WEATHER_URLS: &str = "https://api.openweathermap.org/data/2.5/weather,\
https://history.openweathermap.org/data/2.5/history/city,\
https://pro.openweathermap.org/data/2.5/forecast/hourly";

const DEFAULT_GRAPH_HOURS: &str = "0,3,6,9,12,15,18,21";

/// Parse an optional integer environment variable with a default value.
macro_rules! parse_env_u32 {
    ($var_name:expr, $default:expr) => {
        env::var($var_name)
            .ok()
            .map(|v| v.parse::<u32>())
            .transpose()
            .map_err(|e| anyhow!("Invalid {}: {}", $var_name, e))?
            .unwrap_or($default)
    };
}

/// Parse a required string environment variable.
macro_rules! require_env {
    ($var_name:expr) => {
        env::var($var_name)
            .map_err(|_| anyhow!("{} must be set in .env or environment", $var_name))?
    };
}

/// Strongly typed application configuration.
///
/// All fields are immutable after loading, ensuring a consistent configuration
/// snapshot for the lifetime of the application.
#[derive(Debug, Clone)]
pub struct Config {
    // ---
    /// PostgreSQL connection string.
    pub db_url: String,

    /// Maximum number of database connections in the pool.
    pub db_pool_max: u32,

    /// TCP port the HTTP server binds to.
    pub listen_port: u16,

    /// API key sent as `appid` to the weather service.
    pub weather_api_key: String,

    /// Weather endpoints, the first one being the current-weather endpoint.
    pub weather_api_urls: Vec<String>,

    /// Per-request timeout for weather calls, in seconds.
    pub weather_timeout_secs: u32,

    /// How many days before `endDate` readings are served for.
    pub reading_lookback_days: u32,

    /// Hour-of-day buckets shown on sensor graphs.
    pub graph_hours: AllowedHours,
}

/// Load configuration from environment variables with defaults.
///
/// Required:
/// - `DATABASE_URL` – PostgreSQL connection string
///
/// Optional:
/// - `DB_POOL_MAX` – max DB connections (default: 5)
/// - `LISTEN_PORT` – HTTP port (default: 8080)
/// - `WEATHER_API_KEY` – weather service key (default: empty)
/// - `WEATHER_API_URLS` – comma separated endpoints (default: OpenWeather)
/// - `WEATHER_TIMEOUT_SECS` – weather request timeout (default: 30)
/// - `READING_LOOKBACK_DAYS` – reading history served (default: 5)
/// - `GRAPH_HOURS` – comma separated graph hours (default: `0,3,...,21`)
///
/// Returns an error if any required variable is missing or invalid.
pub fn load_from_env() -> Result<Config> {
    // ---
    let db_url = require_env!("DATABASE_URL");
    let db_pool_max = parse_env_u32!("DB_POOL_MAX", 5);
    let listen_port = parse_env_u32!("LISTEN_PORT", 8080);
    let listen_port =
        u16::try_from(listen_port).map_err(|_| anyhow!("Invalid LISTEN_PORT: {}", listen_port))?;

    let weather_api_key = env::var("WEATHER_API_KEY").unwrap_or_default();
    let weather_api_urls = parse_list(
        &env::var("WEATHER_API_URLS").unwrap_or_else(|_| DEFAULT_WEATHER_URLS.to_string()),
    );
    if weather_api_urls.is_empty() {
        return Err(anyhow!("WEATHER_API_URLS must name at least one endpoint"));
    }
    let weather_timeout_secs = parse_env_u32!("WEATHER_TIMEOUT_SECS", 30);
    let reading_lookback_days = parse_env_u32!("READING_LOOKBACK_DAYS", 5);

    let graph_hours = parse_graph_hours(
        &env::var("GRAPH_HOURS").unwrap_or_else(|_| DEFAULT_GRAPH_HOURS.to_string()),
    )?;

    Ok(Config {
        db_url,
        db_pool_max,
        listen_port,
        weather_api_key,
        weather_api_urls,
        weather_timeout_secs,
        reading_lookback_days,
        graph_hours,
    })
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn parse_graph_hours(raw: &str) -> Result<AllowedHours> {
    // ---
    let hours = parse_list(raw)
        .iter()
        .map(|h| h.parse::<u32>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| anyhow!("Invalid GRAPH_HOURS: {}", e))?;

    AllowedHours::new(hours).map_err(|e| anyhow!("Invalid GRAPH_HOURS: {}", e))
}

impl Config {
    /// Log the loaded configuration for debugging purposes.
    ///
    /// Masks the database password and the weather API key.
    pub fn log_config(&self) {
        // ---
        let masked_db_url = if let Some(at_pos) = self.db_url.rfind('@') {
            if let Some(colon_pos) = self.db_url[..at_pos].rfind(':') {
                format!(
                    "{}:****{}",
                    &self.db_url[..colon_pos],
                    &self.db_url[at_pos..]
                )
            } else {
                self.db_url.clone()
            }
        } else {
            self.db_url.clone()
        };

        let key_state = if self.weather_api_key.is_empty() {
            "<unset>"
        } else {
            "****"
        };

        tracing::info!("Configuration loaded:");
        tracing::info!("  DATABASE_URL          : {}", masked_db_url);
        tracing::info!("  DB_POOL_MAX           : {}", self.db_pool_max);
        tracing::info!("  LISTEN_PORT           : {}", self.listen_port);
        tracing::info!("  WEATHER_API_KEY       : {}", key_state);
        tracing::info!("  WEATHER_API_URLS      : {:?}", self.weather_api_urls);
        tracing::info!("  WEATHER_TIMEOUT_SECS  : {}", self.weather_timeout_secs);
        tracing::info!("  READING_LOOKBACK_DAYS : {}", self.reading_lookback_days);
        tracing::info!("  GRAPH_HOURS           : {:?}", self.graph_hours.hours());

        if self.weather_api_key.is_empty() {
            tracing::warn!("WEATHER_API_KEY is not set, temperature views will likely fail");
        }
    }
}
