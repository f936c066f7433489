use axum::Router;
use sqlx::PgPool;

use crate::{Config, OpenWeatherClient};

mod catalogue;
mod finance;
mod health;
mod readings;
mod sensors;

// ---

/// Shared, read-only state handed to every handler.
#[derive(Debug, Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
    pub weather: OpenWeatherClient,
}

pub fn router(pool: PgPool, config: Config, weather: OpenWeatherClient) -> Router {
    // ---
    Router::new()
        .merge(sensors::router())
        .merge(readings::router())
        .merge(finance::router())
        .merge(catalogue::router())
        .merge(health::router())
        .with_state(AppState {
            pool,
            config,
            weather,
        })
}
