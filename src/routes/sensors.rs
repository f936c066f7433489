use axum::{
    extract::Query, extract::State, http::StatusCode, response::IntoResponse, routing::post,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use sqlx::PgPool;
use tracing::{error, info};
use uuid::Uuid;

use super::AppState;
use crate::{NewSensor, Sensor};

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new().route("/sensor", post(register).get(list))
}

/// Query parameters for listing sensors
#[derive(Debug, Deserialize)]
struct SensorsQuery {
    farm_id: String,
}

/// Handle `POST /sensor`: register a sensor under a fresh id.
async fn register(State(state): State<AppState>, Json(new): Json<NewSensor>) -> impl IntoResponse {
    // ---
    info!("POST /sensor - farm {} name {}", new.farm_id, new.name);

    let sensor = new.into_sensor(Uuid::new_v4());
    match store_sensor(&state.pool, &sensor).await {
        Ok(()) => (StatusCode::CREATED, Json(sensor)).into_response(),
        Err(e) => {
            error!("Failed to store sensor {}: {}", sensor.name, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "status": "failed" })),
            )
                .into_response()
        }
    }
}

/// Handle `GET /sensor?farm_id=...`.
async fn list(
    Query(params): Query<SensorsQuery>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    // ---
    info!("GET /sensor - farm {}", params.farm_id);

    let result = sqlx::query_as::<_, Sensor>(
        r#"
        SELECT sensor_id, farm_id, name, latitude, longitude, type,
               external_id, depth, elevation
        FROM sensors
        WHERE farm_id = $1
        ORDER BY name
        "#,
    )
    .bind(&params.farm_id)
    .fetch_all(&state.pool)
    .await;

    match result {
        Ok(sensors) => (StatusCode::OK, Json(sensors)).into_response(),
        Err(e) => {
            error!("Failed to list sensors for farm {}: {}", params.farm_id, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "status": "failed" })),
            )
                .into_response()
        }
    }
}

async fn store_sensor(pool: &PgPool, sensor: &Sensor) -> Result<(), sqlx::Error> {
    // ---
    sqlx::query(
        r#"
        INSERT INTO sensors (
            sensor_id, farm_id, name, latitude, longitude,
            type, external_id, depth, elevation
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        "#,
    )
    .bind(sensor.sensor_id)
    .bind(&sensor.farm_id)
    .bind(&sensor.name)
    .bind(sensor.latitude)
    .bind(sensor.longitude)
    .bind(sensor.sensor_type)
    .bind(&sensor.external_id)
    .bind(sensor.depth)
    .bind(sensor.elevation)
    .execute(pool)
    .await?;

    Ok(())
}
