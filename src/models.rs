//! Data models for sensors, readings and their wire formats.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geo::Point;
use crate::locale::Measurement;

// ---

/// Body of `POST /sensor`.
#[derive(Debug, Deserialize)]
pub struct NewSensor {
    // ---
    pub farm_id: String,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(rename = "type")]
    pub sensor_type: i32,
    pub external_id: Option<String>,
    pub depth: Option<f64>,
    pub elevation: Option<f64>,
}

/// A stored sensor.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Sensor {
    // ---
    pub sensor_id: Uuid,
    pub farm_id: String,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub sensor_type: i32,
    pub external_id: Option<String>,
    pub depth: Option<f64>,
    pub elevation: Option<f64>,
}

impl NewSensor {
    // ---
    pub fn into_sensor(self, sensor_id: Uuid) -> Sensor {
        Sensor {
            sensor_id,
            farm_id: self.farm_id,
            name: self.name,
            latitude: self.latitude,
            longitude: self.longitude,
            sensor_type: self.sensor_type,
            external_id: self.external_id,
            depth: self.depth,
            elevation: self.elevation,
        }
    }
}

/// One reading in the body of `POST /sensor/reading`.
#[derive(Debug, Deserialize)]
pub struct NewReading {
    // ---
    pub sensor_id: Uuid,
    pub reading_type: String,
    pub value: f64,
    pub unit: String,
    pub read_time: DateTime<Utc>,
    pub transmit_time: Option<DateTime<Utc>>,
    pub valid: Option<bool>,
}

/// Body of `POST /sensor/reading/visualization`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisualizationRequest {
    // ---
    #[serde(rename = "farm_id")]
    pub farm_id: String,
    #[serde(rename = "user_id")]
    pub user_id: String,
    #[serde(default)]
    pub location_ids: Vec<Uuid>,
    #[serde(default)]
    pub reading_types: Vec<String>,
    /// Last day served, formatted `MM-DD-YYYY`.
    pub end_date: String,
}

/// Sensor name with its position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorPoint {
    pub name: String,
    pub point: Point,
}

/// A reading as served to graphs: `read_time` is on the hour, `actual_read_time`
/// is when the sensor really measured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct SensorReadingPoint {
    // ---
    pub name: String,
    pub value: Option<f64>,
    pub read_time: DateTime<Utc>,
    pub actual_read_time: DateTime<Utc>,
}

/// Response of `POST /sensor/reading/visualization`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisualizationData {
    // ---
    #[serde(default)]
    pub sensors_points: Vec<SensorPoint>,
    /// Readings grouped by reading type.
    #[serde(default)]
    pub sensor_reading: BTreeMap<String, Vec<SensorReadingPoint>>,
}

/// Body of `POST /sensor/reading/visualization/summary`: which graphs to
/// build, plus the farm settings the view model depends on. The served date
/// range follows from the graph windows, so there is no `endDate`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryRequest {
    // ---
    #[serde(rename = "farm_id")]
    pub farm_id: String,
    #[serde(rename = "user_id")]
    pub user_id: String,
    #[serde(default)]
    pub location_ids: Vec<Uuid>,
    #[serde(default)]
    pub reading_types: Vec<String>,
    #[serde(default)]
    pub measurement: Measurement,
    /// Language preference such as `en` or `pt-BR`.
    #[serde(default)]
    pub language: String,
    /// Farm coordinate used when no sensor has a position.
    pub grid_point: Point,
    #[serde(default)]
    pub utc_offset_minutes: i32,
}
