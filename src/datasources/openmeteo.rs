use super::WeatherFetcher;
use crate::config::ProviderConfig;
use crate::error::{Result, TransportError};
use crate::models::{Coordinates, CurrentConditions, DailySeries, HourlySeries, WeatherSnapshot};
use chrono::{NaiveDate, NaiveDateTime};
use reqwest::Url;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

const CURRENT_FIELDS: &str =
    "temperature_2m,relative_humidity_2m,apparent_temperature,wind_speed_10m";
const HOURLY_FIELDS: &str =
    "temperature_2m,relative_humidity_2m,uv_index,wind_speed_10m,cloud_cover,soil_temperature_6cm";
const DAILY_FIELDS: &str = "precipitation_sum,sunshine_duration,weather_code";

/// Longest error body kept in a `TransportError::Status`
const MAX_ERROR_BODY: usize = 512;

pub struct OpenMeteoClient {
    client: reqwest::Client,
    config: ProviderConfig,
}

// Open-Meteo API response structures
#[derive(Debug, Deserialize)]
struct OpenMeteoResponse {
    latitude: f64,
    longitude: f64,
    #[serde(default)]
    timezone: String,
    #[serde(default)]
    elevation: Option<f64>,
    current: OmCurrent,
    hourly: OmHourly,
    #[serde(default)]
    hourly_units: HashMap<String, String>,
    daily: OmDaily,
}

#[derive(Debug, Deserialize)]
struct OmCurrent {
    time: String,
    temperature_2m: f64,
    relative_humidity_2m: f64,
    apparent_temperature: f64,
    wind_speed_10m: f64,
}

#[derive(Debug, Deserialize)]
struct OmHourly {
    time: Vec<String>,
    temperature_2m: Vec<Option<f64>>,
    relative_humidity_2m: Vec<Option<f64>>,
    uv_index: Vec<Option<f64>>,
    wind_speed_10m: Vec<Option<f64>>,
    cloud_cover: Vec<Option<f64>>,
    soil_temperature_6cm: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct OmDaily {
    time: Vec<String>,
    precipitation_sum: Vec<Option<f64>>,
    sunshine_duration: Vec<Option<f64>>,
    weather_code: Vec<Option<f64>>,
}

impl OpenMeteoClient {
    pub fn new(config: ProviderConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { client, config })
    }

    fn forecast_url(&self, coordinates: Coordinates) -> std::result::Result<Url, TransportError> {
        let base = format!("{}/v1/forecast", self.config.base_url.trim_end_matches('/'));
        let params = [
            ("latitude", coordinates.latitude.to_string()),
            ("longitude", coordinates.longitude.to_string()),
            ("current", CURRENT_FIELDS.to_string()),
            ("hourly", HOURLY_FIELDS.to_string()),
            ("daily", DAILY_FIELDS.to_string()),
            ("timezone", self.config.timezone.clone()),
            ("past_days", self.config.past_days.to_string()),
            ("forecast_days", self.config.forecast_days.to_string()),
        ];

        Url::parse_with_params(&base, &params)
            .map_err(|e| TransportError::Network(format!("invalid provider URL {}: {}", base, e)))
    }

    /// Fetch current, hourly and daily weather for a location.
    pub async fn fetch_snapshot(
        &self,
        coordinates: Coordinates,
    ) -> std::result::Result<WeatherSnapshot, TransportError> {
        let url = self.forecast_url(coordinates)?;
        tracing::debug!(%coordinates, "Requesting Open-Meteo forecast");

        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let mut body = response.text().await.unwrap_or_default();
            body.truncate(
                body.char_indices()
                    .nth(MAX_ERROR_BODY)
                    .map(|(i, _)| i)
                    .unwrap_or(body.len()),
            );
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await?;
        let raw: OpenMeteoResponse = serde_json::from_str(&body)
            .map_err(|e| TransportError::Malformed(format!("Open-Meteo response: {}", e)))?;

        convert_response(raw)
    }

    /// Test connection to the Open-Meteo API
    pub async fn test_connection(&self, coordinates: Coordinates) -> bool {
        match self.fetch_snapshot(coordinates).await {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!("Open-Meteo connection test failed: {}", e);
                false
            }
        }
    }
}

impl WeatherFetcher for OpenMeteoClient {
    async fn fetch(
        &self,
        coordinates: Coordinates,
    ) -> std::result::Result<WeatherSnapshot, TransportError> {
        self.fetch_snapshot(coordinates).await
    }
}

fn parse_hour(s: &str) -> std::result::Result<NaiveDateTime, TransportError> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S"))
        .map_err(|e| TransportError::Malformed(format!("bad timestamp '{}': {}", s, e)))
}

fn parse_day(s: &str) -> std::result::Result<NaiveDate, TransportError> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|e| TransportError::Malformed(format!("bad date '{}': {}", s, e)))
}

fn convert_response(
    raw: OpenMeteoResponse,
) -> std::result::Result<WeatherSnapshot, TransportError> {
    let current = CurrentConditions {
        time: parse_hour(&raw.current.time)?,
        temperature_2m: raw.current.temperature_2m,
        relative_humidity_2m: raw.current.relative_humidity_2m,
        apparent_temperature: raw.current.apparent_temperature,
        wind_speed_10m: raw.current.wind_speed_10m,
    };

    let hourly = HourlySeries {
        time: raw
            .hourly
            .time
            .iter()
            .map(|t| parse_hour(t))
            .collect::<std::result::Result<_, _>>()?,
        temperature_2m: raw.hourly.temperature_2m,
        relative_humidity_2m: raw.hourly.relative_humidity_2m,
        uv_index: raw.hourly.uv_index,
        wind_speed_10m: raw.hourly.wind_speed_10m,
        cloud_cover: raw.hourly.cloud_cover,
        soil_temperature_6cm: raw.hourly.soil_temperature_6cm,
    };

    let daily = DailySeries {
        time: raw
            .daily
            .time
            .iter()
            .map(|d| parse_day(d))
            .collect::<std::result::Result<_, _>>()?,
        precipitation_sum: raw.daily.precipitation_sum,
        sunshine_duration: raw.daily.sunshine_duration,
        weather_code: raw
            .daily
            .weather_code
            .into_iter()
            .map(|c| c.filter(|c| (0.0..=255.0).contains(c)).map(|c| c as u8))
            .collect(),
    };

    let snapshot = WeatherSnapshot {
        latitude: raw.latitude,
        longitude: raw.longitude,
        timezone: raw.timezone,
        elevation: raw.elevation,
        current,
        hourly,
        daily,
        units: raw.hourly_units,
    };

    snapshot
        .validate()
        .map_err(|e| TransportError::Malformed(e.to_string()))?;

    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer) -> ProviderConfig {
        ProviderConfig {
            base_url: server.uri(),
            timeout_secs: 2,
            ..ProviderConfig::default()
        }
    }

    fn sample_body() -> serde_json::Value {
        serde_json::json!({
            "latitude": -1.375,
            "longitude": -80.625,
            "generationtime_ms": 0.1,
            "utc_offset_seconds": -18000,
            "timezone": "America/Guayaquil",
            "timezone_abbreviation": "GMT-5",
            "elevation": 263.0,
            "current_units": {"time": "iso8601", "temperature_2m": "°C"},
            "current": {
                "time": "2025-03-10T10:15",
                "interval": 900,
                "temperature_2m": 26.4,
                "relative_humidity_2m": 84,
                "apparent_temperature": 30.1,
                "wind_speed_10m": 9.7
            },
            "hourly_units": {"time": "iso8601", "temperature_2m": "°C", "wind_speed_10m": "km/h"},
            "hourly": {
                "time": ["2025-03-10T09:00", "2025-03-10T10:00", "2025-03-10T11:00"],
                "temperature_2m": [25.1, 26.0, 27.2],
                "relative_humidity_2m": [88, 85, 80],
                "uv_index": [2.5, 4.1, 6.3],
                "wind_speed_10m": [7.2, 9.0, 11.5],
                "cloud_cover": [80, 65, 50],
                "soil_temperature_6cm": [24.8, null, 25.6]
            },
            "daily_units": {"time": "iso8601"},
            "daily": {
                "time": ["2025-03-10"],
                "precipitation_sum": [5.4],
                "sunshine_duration": [17280.5],
                "weather_code": [61]
            }
        })
    }

    #[tokio::test]
    async fn fetches_and_normalizes_snapshot() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/forecast"))
            .and(query_param("latitude", "-1.3486"))
            .and(query_param("longitude", "-80.5786"))
            .and(query_param("hourly", HOURLY_FIELDS))
            .and(query_param("daily", DAILY_FIELDS))
            .and(query_param("current", CURRENT_FIELDS))
            .and(query_param("timezone", "America/Guayaquil"))
            .respond_with(ResponseTemplate::new(200).set_body_json(sample_body()))
            .expect(1)
            .mount(&server)
            .await;

        let client = OpenMeteoClient::new(config_for(&server)).unwrap();
        let snapshot = client
            .fetch(Coordinates::new(-1.3486, -80.5786))
            .await
            .unwrap();

        assert_eq!(snapshot.hourly.time.len(), 3);
        assert_eq!(snapshot.daily.time.len(), 1);
        assert_eq!(snapshot.current.temperature_2m, 26.4);
        assert_eq!(snapshot.hourly.soil_temperature_6cm[1], None);
        assert_eq!(snapshot.daily.weather_code[0], Some(61));
        assert_eq!(snapshot.unit("wind_speed_10m"), "km/h");
        assert_eq!(snapshot.current_hour_index(), Some(1));
    }

    #[tokio::test]
    async fn non_success_status_is_transport_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/forecast"))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_json(serde_json::json!({"error": true, "reason": "Latitude must be in range"})),
            )
            .mount(&server)
            .await;

        let client = OpenMeteoClient::new(config_for(&server)).unwrap();
        let err = client
            .fetch(Coordinates::new(-1.0, -80.0))
            .await
            .unwrap_err();

        match err {
            TransportError::Status { status, body } => {
                assert_eq!(status, 400);
                assert!(body.contains("Latitude"));
            }
            other => panic!("expected status error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn server_error_is_transient() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = OpenMeteoClient::new(config_for(&server)).unwrap();
        let err = client
            .fetch(Coordinates::new(-1.0, -80.0))
            .await
            .unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn invalid_json_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let client = OpenMeteoClient::new(config_for(&server)).unwrap();
        let err = client
            .fetch(Coordinates::new(-1.0, -80.0))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Malformed(_)));
    }

    #[tokio::test]
    async fn misaligned_arrays_are_malformed() {
        let mut body = sample_body();
        body["hourly"]["uv_index"] = serde_json::json!([1.0]);

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;

        let client = OpenMeteoClient::new(config_for(&server)).unwrap();
        let err = client
            .fetch(Coordinates::new(-1.0, -80.0))
            .await
            .unwrap_err();
        match err {
            TransportError::Malformed(msg) => assert!(msg.contains("uv_index")),
            other => panic!("expected malformed error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn slow_provider_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(sample_body())
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let config = ProviderConfig {
            timeout_secs: 1,
            ..config_for(&server)
        };
        let client = OpenMeteoClient::new(config).unwrap();
        let err = client
            .fetch(Coordinates::new(-1.0, -80.0))
            .await
            .unwrap_err();
        assert_eq!(err, TransportError::Timeout);
    }

    #[tokio::test]
    async fn unreachable_host_is_network_error() {
        let config = ProviderConfig {
            base_url: "http://127.0.0.1:9".into(),
            timeout_secs: 2,
            ..ProviderConfig::default()
        };
        let client = OpenMeteoClient::new(config).unwrap();
        let err = client
            .fetch(Coordinates::new(-1.0, -80.0))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Network(_)));
    }
}
