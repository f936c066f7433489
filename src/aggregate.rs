//! Sensor-reading aggregation for graph views.
//!
//! Raw readings are folded into buckets keyed by unix timestamp, one bucket
//! per allowed graph hour inside the graph windows. Temperature views are
//! additionally overlaid with weather-station temperatures, which only ever
//! fill buckets that sensors already produced.

use std::collections::BTreeMap;
use std::fmt::Display;

use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::geo::{find_center, Point};
use crate::locale::{Locale, Measurement};
use crate::models::{SensorReadingPoint, VisualizationData};
use crate::weather::{fetch_all, WeatherError, WeatherQuery, WeatherSample, WeatherSource};
use crate::windows::{bucket_label, predicted_axis_label, AllowedHours, TimeWindows, WindowError};

pub const TEMPERATURE: &str = "temperature";
pub const SOIL_WATER_POTENTIAL: &str = "soil_water_potential";

const KPA_TO_PSI: f64 = 0.145038;

#[derive(Debug, Error)]
pub enum AggregationError {
    #[error(transparent)]
    Window(#[from] WindowError),
    #[error("weather lookup failed: {0}")]
    Weather(#[from] WeatherError),
}

/// A graph value: a number, or a placeholder text when there is none.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ReadingValue {
    Number(f64),
    Text(String),
}

/// All values shown at one graph timestamp, keyed by sensor or station name.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregatedReadingBucket {
    #[serde(rename = "currentDateTime")]
    pub current_date_time: String,
    #[serde(flatten)]
    pub values: BTreeMap<String, ReadingValue>,
}

pub type Buckets = BTreeMap<i64, AggregatedReadingBucket>;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TemperatureRange {
    pub temp_min: Option<f64>,
    pub temp_max: Option<f64>,
}

/// Everything a graph needs for one location and reading type.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadingsView {
    // ---
    pub selected_sensor_name: Option<String>,
    pub last_updated_readings_time: Option<DateTime<Utc>>,
    pub predicted_x_axis_label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x_axis_label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub station_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_temperature_readings: Option<TemperatureRange>,
    pub sensor_reading_data: Vec<AggregatedReadingBucket>,
}

/// Views keyed by location id, then reading type.
pub type SensorDataByLocation = BTreeMap<String, BTreeMap<String, ReadingsView>>;

/// Farm settings and clock a view is built against.
#[derive(Debug, Clone)]
pub struct FarmContext<Tz: TimeZone> {
    pub now: DateTime<Tz>,
    pub locale: Locale,
    /// Fallback weather location when no sensor has a position.
    pub grid_point: Point,
}

/// Convert a stored value into the farm's unit system, rounded to two decimals.
///
/// Returns `None` when there is no value or the result is not a finite number.
pub fn convert_value(reading_type: &str, value: Option<f64>, measurement: Measurement) -> Option<f64> {
    // ---
    let value = value?;
    let converted = match (reading_type, measurement) {
        (TEMPERATURE, Measurement::Imperial) => value * 9.0 / 5.0 + 32.0,
        (SOIL_WATER_POTENTIAL, Measurement::Imperial) => value * KPA_TO_PSI,
        _ => value,
    };

    converted
        .is_finite()
        .then(|| (converted * 100.0).round() / 100.0)
}

/// [`convert_value`], with the locale's "no data" text in place of failures.
pub fn display_value(reading_type: &str, value: Option<f64>, locale: &Locale) -> ReadingValue {
    match convert_value(reading_type, value, locale.measurement) {
        Some(v) => ReadingValue::Number(v),
        None => ReadingValue::Text(locale.no_data().to_string()),
    }
}

/// Fold readings into graph buckets.
///
/// Readings not exactly on an allowed hour (in `tz`) or outside the open
/// window interval are dropped.
pub fn aggregate_readings<Tz>(
    readings: &[SensorReadingPoint],
    reading_type: &str,
    windows: &TimeWindows,
    hours: &AllowedHours,
    tz: &Tz,
    locale: &Locale,
) -> Buckets
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    // ---
    let mut buckets = Buckets::new();

    for reading in readings {
        let unix = reading.read_time.timestamp();
        let local = reading.read_time.with_timezone(tz);

        if !hours.matches(&local) || !windows.contains(unix) {
            continue;
        }

        let bucket = buckets
            .entry(unix)
            .or_insert_with(|| AggregatedReadingBucket {
                current_date_time: bucket_label(&local),
                values: BTreeMap::new(),
            });
        bucket.values.insert(
            reading.name.clone(),
            display_value(reading_type, reading.value, locale),
        );
    }

    buckets
}

/// Write station temperatures into buckets that already exist.
///
/// Returns the number of samples merged. Samples at timestamps no sensor
/// reported, or without a temperature, are skipped.
pub fn merge_weather<'a, I>(buckets: &mut Buckets, station: &str, samples: I) -> usize
where
    I: IntoIterator<Item = &'a WeatherSample>,
{
    // ---
    let mut merged = 0;
    for sample in samples {
        let (Some(bucket), Some(temp)) = (buckets.get_mut(&sample.dt), sample.main.temp) else {
            continue;
        };
        bucket
            .values
            .insert(station.to_string(), ReadingValue::Number(temp));
        merged += 1;
    }
    merged
}

/// Build the view of every requested location and reading type.
///
/// All locations share the same readings. Weather is fetched at most once
/// per call; any weather failure fails the whole call.
pub async fn build_views<Tz, W>(
    data: &VisualizationData,
    location_ids: &[String],
    reading_types: &[String],
    farm: &FarmContext<Tz>,
    hours: &AllowedHours,
    weather: &W,
    weather_api_key: &str,
) -> Result<SensorDataByLocation, AggregationError>
where
    Tz: TimeZone,
    Tz::Offset: Display,
    W: WeatherSource + Sync,
{
    // ---
    let windows = TimeWindows::around(&farm.now)?;
    tracing::debug!(
        "Graph windows: {} < now {} < {}",
        windows.historical_start,
        windows.current,
        windows.predicted_end
    );

    let mut by_type = BTreeMap::new();
    for reading_type in reading_types {
        let view = build_view(data, reading_type, &windows, farm, hours, weather, weather_api_key).await?;
        by_type.insert(reading_type.clone(), view);
    }

    Ok(location_ids
        .iter()
        .map(|id| (id.clone(), by_type.clone()))
        .collect())
}

async fn build_view<Tz, W>(
    data: &VisualizationData,
    reading_type: &str,
    windows: &TimeWindows,
    farm: &FarmContext<Tz>,
    hours: &AllowedHours,
    weather: &W,
    weather_api_key: &str,
) -> Result<ReadingsView, AggregationError>
where
    Tz: TimeZone,
    Tz::Offset: Display,
    W: WeatherSource + Sync,
{
    // ---
    let tz = farm.now.timezone();
    let readings = data
        .sensor_reading
        .get(reading_type)
        .map(Vec::as_slice)
        .unwrap_or_default();

    let mut buckets = aggregate_readings(readings, reading_type, windows, hours, &tz, &farm.locale);
    tracing::debug!(
        "{}: {} readings folded into {} buckets",
        reading_type,
        readings.len(),
        buckets.len()
    );

    let mut view = ReadingsView {
        selected_sensor_name: data.sensors_points.first().map(|s| s.name.clone()),
        last_updated_readings_time: readings
            .iter()
            .filter(|r| r.value.is_some())
            .map(|r| r.actual_read_time)
            .max(),
        predicted_x_axis_label: predicted_axis_label(&farm.now, hours),
        x_axis_label: None,
        station_name: None,
        latest_temperature_readings: None,
        sensor_reading_data: Vec::new(),
    };

    if reading_type == TEMPERATURE {
        let points: Vec<Point> = data.sensors_points.iter().map(|s| s.point).collect();
        let center = find_center(&points).unwrap_or(farm.grid_point);
        let query = WeatherQuery::new(weather_api_key, &farm.locale, windows, center);

        let responses = fetch_all(weather, &query).await?;

        if let Some(current) = responses.first() {
            view.station_name = current.name.clone();
            view.latest_temperature_readings = Some(TemperatureRange {
                temp_min: current.main.as_ref().and_then(|m| m.temp_min),
                temp_max: current.main.as_ref().and_then(|m| m.temp_max),
            });
        }

        let station = view
            .station_name
            .clone()
            .unwrap_or_else(|| farm.locale.weather_station().to_string());
        // Samples come from the history and forecast endpoints only
        let merged = merge_weather(
            &mut buckets,
            &station,
            responses.iter().skip(1).flat_map(|r| r.list.iter()),
        );
        tracing::debug!("Merged {} weather samples from {}", merged, station);
    }

    view.x_axis_label = axis_range_label(&buckets, &tz, &farm.locale);
    view.sensor_reading_data = buckets.into_values().collect();
    Ok(view)
}

/// `"<first> - <last>"` short dates of the bucket range, if there are buckets.
fn axis_range_label<Tz>(buckets: &Buckets, tz: &Tz, locale: &Locale) -> Option<String>
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    // ---
    let first = buckets.keys().next()?;
    let last = buckets.keys().next_back()?;
    let start = DateTime::from_timestamp(*first, 0)?.with_timezone(tz);
    let end = DateTime::from_timestamp(*last, 0)?.with_timezone(tz);

    Some(format!(
        "{} - {}",
        locale.short_date(&start),
        locale.short_date(&end)
    ))
}

#[cfg(test)]
mod tests {
    // ---
    use std::collections::HashMap;

    use chrono::FixedOffset;

    use super::*;
    use crate::locale::Language;
    use crate::models::SensorPoint;
    use crate::weather::tests::FakeWeather;
    use crate::weather::{MainReadings, WeatherResponse};

    fn hours() -> AllowedHours {
        AllowedHours::new(vec![0, 3, 6, 9, 12, 15, 18, 21]).unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 10, 14, 20, 0).unwrap()
    }

    fn reading(name: &str, value: Option<f64>, y: i32, m: u32, d: u32, h: u32, min: u32) -> SensorReadingPoint {
        // ---
        let read_time = Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap();
        SensorReadingPoint {
            name: name.to_string(),
            value,
            read_time,
            actual_read_time: read_time,
        }
    }

    fn sample(dt: i64, temp: f64) -> WeatherSample {
        WeatherSample {
            dt,
            main: MainReadings {
                temp: Some(temp),
                ..Default::default()
            },
        }
    }

    fn farm() -> FarmContext<Utc> {
        FarmContext {
            now: now(),
            locale: Locale::default(),
            grid_point: Point { lat: 10.0, lng: 20.0 },
        }
    }

    #[test]
    fn test_temperature_conversion() {
        // ---
        assert_eq!(convert_value(TEMPERATURE, Some(20.0), Measurement::Metric), Some(20.0));
        assert_eq!(convert_value(TEMPERATURE, Some(20.0), Measurement::Imperial), Some(68.0));
        assert_eq!(convert_value(TEMPERATURE, Some(22.4), Measurement::Imperial), Some(72.32));
    }

    #[test]
    fn test_soil_water_potential_conversion() {
        // ---
        assert_eq!(
            convert_value(SOIL_WATER_POTENTIAL, Some(-100.0), Measurement::Metric),
            Some(-100.0)
        );
        assert_eq!(
            convert_value(SOIL_WATER_POTENTIAL, Some(-100.0), Measurement::Imperial),
            Some(-14.5)
        );
        assert_eq!(convert_value("humidity", Some(55.123), Measurement::Imperial), Some(55.12));
    }

    #[test]
    fn test_non_numeric_value_becomes_no_data() {
        // ---
        let es = Locale::new(Language::Es, Measurement::Metric);
        assert_eq!(
            display_value(TEMPERATURE, None, &es),
            ReadingValue::Text("Sin datos".to_string())
        );
        assert_eq!(
            display_value(TEMPERATURE, Some(f64::NAN), &Locale::default()),
            ReadingValue::Text("No data".to_string())
        );
    }

    #[test]
    fn test_only_graph_hours_are_kept() {
        // ---
        let windows = TimeWindows::around(&now()).unwrap();
        let readings = vec![
            reading("a", Some(1.0), 2024, 3, 9, 12, 0),
            reading("a", Some(2.0), 2024, 3, 9, 13, 0),
            reading("a", Some(3.0), 2024, 3, 9, 15, 30),
        ];

        let buckets = aggregate_readings(&readings, "moisture", &windows, &hours(), &Utc, &Locale::default());

        assert_eq!(buckets.len(), 1);
        let bucket = buckets.values().next().unwrap();
        assert_eq!(bucket.current_date_time, "Sat Mar 09 2024 12:00");
        assert_eq!(bucket.values["a"], ReadingValue::Number(1.0));
    }

    #[test]
    fn test_graph_hours_are_matched_in_local_time() {
        // ---
        let tz = FixedOffset::west_opt(8 * 3600).unwrap();
        let now = tz.with_ymd_and_hms(2024, 3, 10, 14, 20, 0).unwrap();
        let windows = TimeWindows::around(&now).unwrap();
        let readings = vec![
            // 06:00 local
            reading("a", Some(1.0), 2024, 3, 9, 14, 0),
            // 12:00 UTC is 04:00 local
            reading("a", Some(2.0), 2024, 3, 9, 12, 0),
            // 21:00 local on Mar 06, before the local historical midnight
            reading("a", Some(3.0), 2024, 3, 7, 5, 0),
        ];

        let buckets = aggregate_readings(&readings, "moisture", &windows, &hours(), &tz, &Locale::default());

        assert_eq!(buckets.len(), 1);
        let bucket = &buckets[&readings[0].read_time.timestamp()];
        assert_eq!(bucket.current_date_time, "Sat Mar 09 2024 06:00");
        assert_eq!(bucket.values["a"], ReadingValue::Number(1.0));
    }

    #[test]
    fn test_view_labels_follow_farm_offset() {
        // ---
        let tz = FixedOffset::west_opt(8 * 3600).unwrap();
        let farm = FarmContext {
            now: tz.with_ymd_and_hms(2024, 3, 10, 1, 30, 0).unwrap(),
            locale: Locale::default(),
            grid_point: Point { lat: 10.0, lng: 20.0 },
        };
        let data = VisualizationData {
            sensors_points: Vec::new(),
            // 21:00 local on Mar 09
            sensor_reading: BTreeMap::from([(
                "moisture".to_string(),
                vec![reading("north", Some(5.0), 2024, 3, 10, 5, 0)],
            )]),
        };
        let weather = FakeWeather {
            endpoints: Vec::new(),
            responses: HashMap::new(),
        };

        let views = tokio_test::block_on(build_views(
            &data,
            &["loc-1".to_string()],
            &["moisture".to_string()],
            &farm,
            &hours(),
            &weather,
            "key",
        ))
        .unwrap();

        let view = &views["loc-1"]["moisture"];
        assert_eq!(view.predicted_x_axis_label, "Sun Mar 10 2024 00:00");
        assert_eq!(view.sensor_reading_data[0].current_date_time, "Sat Mar 09 2024 21:00");
        assert_eq!(view.x_axis_label.as_deref(), Some("Mar 09 - Mar 09"));
    }

    #[test]
    fn test_readings_outside_windows_are_dropped() {
        // ---
        let windows = TimeWindows::around(&now()).unwrap();
        let readings = vec![
            // Exactly on the historical bound: excluded
            reading("a", Some(1.0), 2024, 3, 7, 0, 0),
            reading("a", Some(2.0), 2024, 3, 7, 3, 0),
            reading("a", Some(3.0), 2024, 3, 11, 21, 0),
            // Exactly on the predicted bound: excluded
            reading("a", Some(4.0), 2024, 3, 12, 0, 0),
            reading("a", Some(5.0), 2024, 3, 1, 12, 0),
        ];

        let buckets = aggregate_readings(&readings, "moisture", &windows, &hours(), &Utc, &Locale::default());

        let kept: Vec<_> = buckets.values().map(|b| b.values["a"].clone()).collect();
        assert_eq!(kept, vec![ReadingValue::Number(2.0), ReadingValue::Number(3.0)]);
    }

    #[test]
    fn test_sensors_share_a_bucket() {
        // ---
        let windows = TimeWindows::around(&now()).unwrap();
        let readings = vec![
            reading("north", Some(1.0), 2024, 3, 9, 6, 0),
            reading("south", None, 2024, 3, 9, 6, 0),
        ];

        let buckets = aggregate_readings(&readings, "moisture", &windows, &hours(), &Utc, &Locale::default());

        assert_eq!(buckets.len(), 1);
        let bucket = buckets.values().next().unwrap();
        assert_eq!(bucket.values["north"], ReadingValue::Number(1.0));
        assert_eq!(bucket.values["south"], ReadingValue::Text("No data".to_string()));
    }

    #[test]
    fn test_bucket_serializes_flat() {
        // ---
        let bucket = AggregatedReadingBucket {
            current_date_time: "Sat Mar 09 2024 12:00".to_string(),
            values: BTreeMap::from([
                ("north".to_string(), ReadingValue::Number(1.5)),
                ("south".to_string(), ReadingValue::Text("No data".to_string())),
            ]),
        };
        let json = serde_json::to_value(&bucket).unwrap();

        assert_eq!(json["currentDateTime"], "Sat Mar 09 2024 12:00");
        assert_eq!(json["north"], 1.5);
        assert_eq!(json["south"], "No data");
    }

    #[test]
    fn test_weather_merge_never_creates_buckets() {
        // ---
        let windows = TimeWindows::around(&now()).unwrap();
        let readings = vec![reading("north", Some(1.0), 2024, 3, 9, 6, 0)];
        let mut buckets = aggregate_readings(&readings, TEMPERATURE, &windows, &hours(), &Utc, &Locale::default());
        let existing = readings[0].read_time.timestamp();

        let samples = vec![sample(existing, 4.5), sample(existing + 3 * 3600, 7.0)];
        let merged = merge_weather(&mut buckets, "Vancouver", &samples);

        assert_eq!(merged, 1);
        assert_eq!(buckets.len(), 1);
        assert_eq!(buckets[&existing].values["Vancouver"], ReadingValue::Number(4.5));
    }

    #[test]
    fn test_temperature_view_overlays_weather() {
        // ---
        let existing = Utc.with_ymd_and_hms(2024, 3, 9, 6, 0, 0).unwrap();
        let data = VisualizationData {
            sensors_points: vec![SensorPoint {
                name: "north".to_string(),
                point: Point { lat: 1.0, lng: 2.0 },
            }],
            sensor_reading: BTreeMap::from([(
                TEMPERATURE.to_string(),
                vec![reading("north", Some(3.0), 2024, 3, 9, 6, 0)],
            )]),
        };
        let weather = FakeWeather {
            endpoints: vec!["current".into(), "history".into(), "forecast".into()],
            responses: HashMap::from([
                (
                    "current".to_string(),
                    WeatherResponse {
                        name: Some("Vancouver".to_string()),
                        main: Some(MainReadings {
                            temp: Some(8.0),
                            temp_min: Some(2.0),
                            temp_max: Some(11.0),
                        }),
                        list: Vec::new(),
                    },
                ),
                (
                    "history".to_string(),
                    WeatherResponse {
                        list: vec![sample(existing.timestamp(), 4.0)],
                        ..Default::default()
                    },
                ),
                (
                    "forecast".to_string(),
                    WeatherResponse {
                        list: vec![sample(existing.timestamp() + 86_400, 9.0)],
                        ..Default::default()
                    },
                ),
            ]),
        };

        let views = tokio_test::block_on(build_views(
            &data,
            &["loc-1".to_string(), "loc-2".to_string()],
            &[TEMPERATURE.to_string()],
            &farm(),
            &hours(),
            &weather,
            "key",
        ))
        .unwrap();

        assert_eq!(views.len(), 2);
        let view = &views["loc-1"][TEMPERATURE];
        assert_eq!(view.station_name.as_deref(), Some("Vancouver"));
        assert_eq!(
            view.latest_temperature_readings,
            Some(TemperatureRange {
                temp_min: Some(2.0),
                temp_max: Some(11.0)
            })
        );
        assert_eq!(view.selected_sensor_name.as_deref(), Some("north"));
        assert_eq!(view.predicted_x_axis_label, "Sun Mar 10 2024 12:00");
        assert_eq!(view.x_axis_label.as_deref(), Some("Mar 09 - Mar 09"));
        assert_eq!(view.sensor_reading_data.len(), 1);
        assert_eq!(
            view.sensor_reading_data[0].values["Vancouver"],
            ReadingValue::Number(4.0)
        );
        assert_eq!(views["loc-1"], views["loc-2"]);
    }

    #[test]
    fn test_current_weather_list_is_not_merged() {
        // ---
        let existing = Utc.with_ymd_and_hms(2024, 3, 9, 6, 0, 0).unwrap();
        let data = VisualizationData {
            sensors_points: Vec::new(),
            sensor_reading: BTreeMap::from([(
                TEMPERATURE.to_string(),
                vec![reading("north", Some(3.0), 2024, 3, 9, 6, 0)],
            )]),
        };
        let weather = FakeWeather {
            endpoints: vec!["current".into(), "history".into()],
            responses: HashMap::from([
                (
                    "current".to_string(),
                    WeatherResponse {
                        name: Some("Vancouver".to_string()),
                        list: vec![sample(existing.timestamp(), 99.0)],
                        ..Default::default()
                    },
                ),
                ("history".to_string(), WeatherResponse::default()),
            ]),
        };

        let views = tokio_test::block_on(build_views(
            &data,
            &["loc-1".to_string()],
            &[TEMPERATURE.to_string()],
            &farm(),
            &hours(),
            &weather,
            "key",
        ))
        .unwrap();

        let bucket = &views["loc-1"][TEMPERATURE].sensor_reading_data[0];
        assert_eq!(bucket.values.len(), 1);
        assert!(!bucket.values.contains_key("Vancouver"));
    }

    #[test]
    fn test_weather_failure_fails_the_view() {
        // ---
        let data = VisualizationData::default();
        let weather = FakeWeather {
            endpoints: vec!["current".into(), "history".into()],
            responses: HashMap::from([("current".to_string(), WeatherResponse::default())]),
        };

        let result = tokio_test::block_on(build_views(
            &data,
            &["loc-1".to_string()],
            &[TEMPERATURE.to_string()],
            &farm(),
            &hours(),
            &weather,
            "key",
        ));

        assert!(matches!(result, Err(AggregationError::Weather(_))));
    }

    #[test]
    fn test_other_types_skip_weather() {
        // ---
        let data = VisualizationData {
            sensors_points: Vec::new(),
            sensor_reading: BTreeMap::from([(
                SOIL_WATER_POTENTIAL.to_string(),
                vec![
                    reading("north", Some(-50.0), 2024, 3, 8, 9, 0),
                    reading("north", None, 2024, 3, 10, 9, 0),
                ],
            )]),
        };
        // No endpoints answer, so any weather call would fail
        let weather = FakeWeather {
            endpoints: vec!["current".into()],
            responses: HashMap::new(),
        };

        let views = tokio_test::block_on(build_views(
            &data,
            &["loc-1".to_string()],
            &[SOIL_WATER_POTENTIAL.to_string()],
            &farm(),
            &hours(),
            &weather,
            "key",
        ))
        .unwrap();

        let view = &views["loc-1"][SOIL_WATER_POTENTIAL];
        assert_eq!(view.station_name, None);
        assert_eq!(view.selected_sensor_name, None);
        assert_eq!(view.sensor_reading_data.len(), 2);
        assert_eq!(
            view.last_updated_readings_time,
            Some(Utc.with_ymd_and_hms(2024, 3, 8, 9, 0, 0).unwrap())
        );
        assert_eq!(view.x_axis_label.as_deref(), Some("Mar 08 - Mar 10"));
    }
}
