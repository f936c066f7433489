use std::collections::BTreeMap;

use axum::{
    extract::State, http::StatusCode, response::IntoResponse, routing::post, Json, Router,
};
use chrono::{DateTime, Days, FixedOffset, NaiveDate, NaiveTime, Utc};
use serde_json::json;
use sqlx::PgPool;
use tracing::{debug, error, info};
use uuid::Uuid;

use super::AppState;
use crate::{
    build_views, FarmContext, Language, Locale, NewReading, Point, SensorPoint,
    SensorReadingPoint, SummaryRequest, TimeWindows, VisualizationData, VisualizationRequest,
};

/// `endDate` wire format.
const END_DATE_FORMAT: &str = "%m-%d-%Y";

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new()
        .route("/sensor/reading", post(ingest))
        .route("/sensor/reading/visualization", post(visualization))
        .route("/sensor/reading/visualization/summary", post(summary))
}

/// Handle `POST /sensor/reading`: store a batch of readings.
///
/// Readings that fail to store are logged and counted as rejected; the rest
/// of the batch still goes in. A batch with nothing stored answers 500.
async fn ingest(
    State(state): State<AppState>,
    Json(readings): Json<Vec<NewReading>>,
) -> impl IntoResponse {
    // ---
    info!("POST /sensor/reading - {} readings", readings.len());

    let mut stored = 0;
    for reading in &readings {
        if let Err(e) = store_reading(&state.pool, reading).await {
            error!("Failed to store reading for sensor {}: {}", reading.sensor_id, e);
            continue;
        }
        stored += 1;
    }

    let rejected = readings.len() - stored;
    info!("Stored {} readings, rejected {}", stored, rejected);
    (
        ingest_status(readings.len(), stored),
        Json(json!({ "stored": stored, "rejected": rejected })),
    )
        .into_response()
}

/// 201 unless a non-empty batch stored nothing at all.
fn ingest_status(received: usize, stored: usize) -> StatusCode {
    if received > 0 && stored == 0 {
        StatusCode::INTERNAL_SERVER_ERROR
    } else {
        StatusCode::CREATED
    }
}

/// Handle `POST /sensor/reading/visualization`: sensor points and raw readings.
async fn visualization(
    State(state): State<AppState>,
    Json(req): Json<VisualizationRequest>,
) -> impl IntoResponse {
    // ---
    info!(
        "POST /sensor/reading/visualization - farm {} user {}",
        req.farm_id, req.user_id
    );

    let end_date = match NaiveDate::parse_from_str(&req.end_date, END_DATE_FORMAT) {
        Ok(date) => date,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": format!("Invalid endDate '{}': {}", req.end_date, e) })),
            )
                .into_response();
        }
    };

    let (from, to) = reading_range(end_date, state.config.reading_lookback_days);
    match load_visualization_data(
        &state.pool,
        &req.farm_id,
        &req.location_ids,
        &req.reading_types,
        from,
        to,
    )
    .await
    {
        Ok(data) => (StatusCode::OK, Json(data)).into_response(),
        Err(e) => {
            error!("Failed to load sensor readings: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "status": "failed" })),
            )
                .into_response()
        }
    }
}

/// Handle `POST /sensor/reading/visualization/summary`: graph view models.
///
/// Any failure, including a single failed weather request, answers with a
/// generic failed status.
async fn summary(
    State(state): State<AppState>,
    Json(req): Json<SummaryRequest>,
) -> impl IntoResponse {
    // ---
    info!(
        "POST /sensor/reading/visualization/summary - farm {} user {}",
        req.farm_id, req.user_id
    );

    let Some(offset) = req
        .utc_offset_minutes
        .checked_mul(60)
        .and_then(FixedOffset::east_opt)
    else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": format!("Invalid utcOffsetMinutes: {}", req.utc_offset_minutes) })),
        )
            .into_response();
    };

    let farm = FarmContext {
        now: Utc::now().with_timezone(&offset),
        locale: Locale::new(Language::from_code(&req.language), req.measurement),
        grid_point: req.grid_point,
    };

    match build_summary(&state, &req, &farm).await {
        Ok(views) => {
            info!("Built views for {} locations", views.len());
            (
                StatusCode::OK,
                Json(json!({ "sensorDataByLocationIds": views })),
            )
                .into_response()
        }
        Err(e) => {
            error!("Failed to build sensor views: {:#}", e);
            (StatusCode::BAD_GATEWAY, Json(json!({ "status": "failed" }))).into_response()
        }
    }
}

async fn build_summary(
    state: &AppState,
    req: &SummaryRequest,
    farm: &FarmContext<FixedOffset>,
) -> anyhow::Result<crate::SensorDataByLocation> {
    // ---
    let windows = TimeWindows::around(&farm.now)?;

    let (from, to) = window_range(&windows)
        .ok_or_else(|| anyhow::anyhow!("Graph windows out of range: {:?}", windows))?;
    debug!("summary - Step 1: load readings in [{}, {})", from, to);
    let data = load_visualization_data(
        &state.pool,
        &req.farm_id,
        &req.location_ids,
        &req.reading_types,
        from,
        to,
    )
    .await?;

    debug!("summary - Step 2: aggregate");
    let location_ids: Vec<String> = req.location_ids.iter().map(Uuid::to_string).collect();
    let views = build_views(
        &data,
        &location_ids,
        &req.reading_types,
        farm,
        &state.config.graph_hours,
        &state.weather,
        &state.config.weather_api_key,
    )
    .await?;

    Ok(views)
}

/// `[end_date - lookback_days, end_date + 1 day)` as UTC instants.
fn reading_range(end_date: NaiveDate, lookback_days: u32) -> (DateTime<Utc>, DateTime<Utc>) {
    // ---
    let start = end_date - Days::new(u64::from(lookback_days));
    let end = end_date + Days::new(1);
    (
        start.and_time(NaiveTime::MIN).and_utc(),
        end.and_time(NaiveTime::MIN).and_utc(),
    )
}

/// The graph windows as a UTC range. Local midnights of farms east of UTC
/// fall on the previous UTC day, so calendar-day bounds would miss them.
fn window_range(windows: &TimeWindows) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    // ---
    let from = DateTime::from_timestamp(windows.historical_start, 0)?;
    let to = DateTime::from_timestamp(windows.predicted_end, 0)?;
    Some((from, to))
}

async fn load_visualization_data(
    pool: &PgPool,
    farm_id: &str,
    location_ids: &[Uuid],
    reading_types: &[String],
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> Result<VisualizationData, sqlx::Error> {
    // ---
    let sensors_points = sqlx::query_as::<_, (String, f64, f64)>(
        r#"
        SELECT name, latitude, longitude
        FROM sensors
        WHERE farm_id = $1 AND sensor_id = ANY($2)
        ORDER BY name
        "#,
    )
    .bind(farm_id)
    .bind(location_ids)
    .fetch_all(pool)
    .await?
    .into_iter()
    .map(|(name, lat, lng)| SensorPoint {
        name,
        point: Point { lat, lng },
    })
    .collect();

    let mut sensor_reading = BTreeMap::new();
    for reading_type in reading_types {
        // read_time is snapped to the UTC hour; actual_read_time keeps the raw instant
        let readings = sqlx::query_as::<_, SensorReadingPoint>(
            r#"
            SELECT
                s.name,
                r.value,
                date_trunc('hour', r.read_time AT TIME ZONE 'UTC') AT TIME ZONE 'UTC' AS read_time,
                r.read_time AS actual_read_time
            FROM sensor_readings r
            JOIN sensors s ON s.sensor_id = r.sensor_id
            WHERE s.farm_id = $1
              AND s.sensor_id = ANY($2)
              AND r.reading_type = $3
              AND r.valid
              AND r.read_time >= $4
              AND r.read_time < $5
            ORDER BY r.read_time
            "#,
        )
        .bind(farm_id)
        .bind(location_ids)
        .bind(reading_type)
        .bind(from)
        .bind(to)
        .fetch_all(pool)
        .await?;

        debug!("Loaded {} {} readings", readings.len(), reading_type);
        sensor_reading.insert(reading_type.clone(), readings);
    }

    Ok(VisualizationData {
        sensors_points,
        sensor_reading,
    })
}

async fn store_reading(pool: &PgPool, reading: &NewReading) -> Result<(), sqlx::Error> {
    // ---
    sqlx::query(
        r#"
        INSERT INTO sensor_readings (
            read_time, transmit_time, sensor_id,
            reading_type, value, unit, valid
        ) VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(reading.read_time)
    .bind(reading.transmit_time.unwrap_or_else(Utc::now))
    .bind(reading.sensor_id)
    .bind(&reading.reading_type)
    .bind(reading.value)
    .bind(&reading.unit)
    .bind(reading.valid.unwrap_or(true))
    .execute(pool)
    .await?;

    Ok(())
}
