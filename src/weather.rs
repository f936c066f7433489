//! Weather-service client used to overlay station temperatures on sensor graphs.
//!
//! Every configured endpoint is queried with the same parameters. The first
//! endpoint answers with current conditions (station name, min/max); the
//! others answer with hourly `list` samples for history and forecast.

use std::future::Future;
use std::time::Duration;

use futures::future::try_join_all;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geo::Point;
use crate::locale::Locale;
use crate::windows::TimeWindows;

/// Sample granularity requested from the history endpoint.
const HOURLY: &str = "hour";

#[derive(Debug, Error)]
pub enum WeatherError {
    #[error("weather request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("weather service at {url} returned {status}")]
    Status { url: String, status: StatusCode },
    #[error("unreadable weather response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

/// Response body shared by all weather endpoints; absent fields default.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct WeatherResponse {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub main: Option<MainReadings>,
    #[serde(default)]
    pub list: Vec<WeatherSample>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MainReadings {
    pub temp: Option<f64>,
    pub temp_min: Option<f64>,
    pub temp_max: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WeatherSample {
    /// Unix time of the sample.
    pub dt: i64,
    #[serde(default)]
    pub main: MainReadings,
}

/// Query string sent to every weather endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeatherQuery {
    pub appid: String,
    pub lang: &'static str,
    pub units: &'static str,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub start: i64,
    pub end: i64,
    pub lat: f64,
    pub lon: f64,
}

impl WeatherQuery {
    // ---
    pub fn new(api_key: &str, locale: &Locale, windows: &TimeWindows, center: Point) -> Self {
        Self {
            appid: api_key.to_string(),
            lang: locale.language.code(),
            units: locale.measurement.as_str(),
            kind: HOURLY,
            start: windows.historical_start,
            end: windows.predicted_end,
            lat: center.lat,
            lon: center.lng,
        }
    }
}

/// Anything that can answer weather queries for a list of endpoints.
pub trait WeatherSource {
    /// Endpoints to query, current-weather endpoint first.
    fn endpoints(&self) -> &[String];

    fn fetch(
        &self,
        endpoint: &str,
        query: &WeatherQuery,
    ) -> impl Future<Output = Result<WeatherResponse, WeatherError>> + Send;
}

/// Query every endpoint concurrently and wait for all of them.
///
/// All-or-nothing: the first failure is returned and the remaining
/// responses are discarded. Responses come back in endpoint order.
pub async fn fetch_all<W>(source: &W, query: &WeatherQuery) -> Result<Vec<WeatherResponse>, WeatherError>
where
    W: WeatherSource + Sync,
{
    // ---
    let requests = source
        .endpoints()
        .iter()
        .map(|endpoint| source.fetch(endpoint, query));

    try_join_all(requests).await
}

/// HTTP client for OpenWeather-compatible endpoints.
#[derive(Debug, Clone)]
pub struct OpenWeatherClient {
    client: Client,
    endpoints: Vec<String>,
}

impl OpenWeatherClient {
    // ---
    /// Build a client with a per-request timeout.
    pub fn new(endpoints: Vec<String>, timeout_secs: u32) -> Result<Self, reqwest::Error> {
        // ---
        let client = Client::builder()
            .timeout(Duration::from_secs(u64::from(timeout_secs)))
            .build()?;

        Ok(Self { client, endpoints })
    }
}

impl WeatherSource for OpenWeatherClient {
    // ---
    fn endpoints(&self) -> &[String] {
        &self.endpoints
    }

    async fn fetch(&self, endpoint: &str, query: &WeatherQuery) -> Result<WeatherResponse, WeatherError> {
        // ---
        tracing::debug!("Fetching weather from {} at ({}, {})", endpoint, query.lat, query.lon);

        let response = self
            .client
            .get(endpoint)
            .query(query)
            .send()
            .await
            .map_err(|source| WeatherError::Request {
                url: endpoint.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(WeatherError::Status {
                url: endpoint.to_string(),
                status,
            });
        }

        response
            .json::<WeatherResponse>()
            .await
            .map_err(|source| WeatherError::Decode {
                url: endpoint.to_string(),
                source,
            })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    // ---
    use std::collections::HashMap;

    use super::*;
    use crate::locale::{Language, Measurement};

    /// In-memory weather source keyed by endpoint; endpoints without a
    /// response answer 503.
    pub(crate) struct FakeWeather {
        pub endpoints: Vec<String>,
        pub responses: HashMap<String, WeatherResponse>,
    }

    impl WeatherSource for FakeWeather {
        fn endpoints(&self) -> &[String] {
            &self.endpoints
        }

        async fn fetch(&self, endpoint: &str, _query: &WeatherQuery) -> Result<WeatherResponse, WeatherError> {
            self.responses
                .get(endpoint)
                .cloned()
                .ok_or_else(|| WeatherError::Status {
                    url: endpoint.to_string(),
                    status: StatusCode::SERVICE_UNAVAILABLE,
                })
        }
    }

    fn query() -> WeatherQuery {
        WeatherQuery {
            appid: "key".to_string(),
            lang: "en",
            units: "metric",
            kind: HOURLY,
            start: 0,
            end: 10,
            lat: 1.0,
            lon: 2.0,
        }
    }

    fn named(name: &str) -> WeatherResponse {
        WeatherResponse {
            name: Some(name.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_fetch_all_keeps_endpoint_order() {
        // ---
        let fake = FakeWeather {
            endpoints: vec!["a".into(), "b".into(), "c".into()],
            responses: HashMap::from([
                ("a".to_string(), named("A")),
                ("b".to_string(), named("B")),
                ("c".to_string(), named("C")),
            ]),
        };

        let responses = tokio_test::block_on(fetch_all(&fake, &query())).unwrap();
        let names: Vec<_> = responses.iter().filter_map(|r| r.name.as_deref()).collect();
        assert_eq!(names, vec!["A", "B", "C"]);
    }

    #[test]
    fn test_fetch_all_fails_when_any_request_fails() {
        // ---
        let fake = FakeWeather {
            endpoints: vec!["a".into(), "b".into()],
            responses: HashMap::from([("a".to_string(), named("A"))]),
        };

        let result = tokio_test::block_on(fetch_all(&fake, &query()));
        assert!(matches!(result, Err(WeatherError::Status { url, .. }) if url == "b"));
    }

    #[test]
    fn test_query_carries_locale_and_windows() {
        // ---
        let locale = Locale::new(Language::Fr, Measurement::Imperial);
        let windows = TimeWindows {
            historical_start: 100,
            current: 200,
            predicted_end: 300,
        };
        let q = WeatherQuery::new("k", &locale, &windows, Point { lat: 3.0, lng: 4.0 });

        assert_eq!(q.lang, "fr");
        assert_eq!(q.units, "imperial");
        assert_eq!((q.start, q.end), (100, 300));
        assert_eq!((q.lat, q.lon), (3.0, 4.0));
    }

    #[test]
    fn test_response_tolerates_missing_fields() {
        // ---
        let body = r#"{"list":[{"dt":1700000000,"main":{"temp":4.5}},{"dt":1700010800}]}"#;
        let response: WeatherResponse = serde_json::from_str(body).unwrap();

        assert_eq!(response.name, None);
        assert_eq!(response.list.len(), 2);
        assert_eq!(response.list[0].main.temp, Some(4.5));
        assert_eq!(response.list[1].main.temp, None);
    }
}
