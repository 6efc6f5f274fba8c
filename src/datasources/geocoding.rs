use crate::config::GeocodingConfig;
use crate::error::{CacaoWatchError, Result};
use crate::models::{Coordinates, Zone};
use reqwest::Url;
use serde::Deserialize;
use std::time::Duration;

/// Resolves a place name to coordinates via the Google Geocoding API.
pub struct GeocodingClient {
    client: reqwest::Client,
    config: GeocodingConfig,
}

/// Shortest free-text query sent to the geocoder
pub const MIN_QUERY_LEN: usize = 3;

#[derive(Debug, Clone, PartialEq)]
pub struct GeocodedPlace {
    pub name: String,
    pub coordinates: Coordinates,
}

impl GeocodedPlace {
    /// Cache key derived from the formatted address:
    /// "Quevedo, Los Ríos, Ecuador" becomes "quevedo,los-ríos,ecuador".
    pub fn key(&self) -> String {
        self.name
            .split(',')
            .map(|part| {
                part.split_whitespace()
                    .map(|word| {
                        word.chars()
                            .filter(|c| c.is_alphanumeric() || *c == '-')
                            .collect::<String>()
                            .to_lowercase()
                    })
                    .filter(|word| !word.is_empty())
                    .collect::<Vec<_>>()
                    .join("-")
            })
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(",")
    }

    pub fn to_zone(&self) -> Zone {
        Zone::new(self.key(), self.name.clone(), self.coordinates)
    }
}

// Google Geocoding API response structures
#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    status: String,
    #[serde(default)]
    results: Vec<GeocodeResult>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResult {
    formatted_address: String,
    geometry: GeocodeGeometry,
}

#[derive(Debug, Deserialize)]
struct GeocodeGeometry {
    location: GeocodeLocation,
}

#[derive(Debug, Deserialize)]
struct GeocodeLocation {
    lat: f64,
    lng: f64,
}

impl GeocodingClient {
    pub fn new(config: GeocodingConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self { client, config })
    }

    /// First match for an address built from a configured zone.
    pub async fn resolve(&self, address: &str) -> Result<GeocodedPlace> {
        self.lookup(address)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| CacaoWatchError::NotFound(format!("No location found for '{}'", address)))
    }

    /// Free-text place search. Queries shorter than [`MIN_QUERY_LEN`]
    /// characters are rejected without a request.
    pub async fn search(&self, query: &str) -> Result<Vec<GeocodedPlace>> {
        let query = query.trim();
        if query.chars().count() < MIN_QUERY_LEN {
            return Err(CacaoWatchError::InvalidData(format!(
                "search needs at least {} characters",
                MIN_QUERY_LEN
            )));
        }
        self.lookup(query).await
    }

    async fn lookup(&self, address: &str) -> Result<Vec<GeocodedPlace>> {
        let base = format!("{}/geocode/json", self.config.base_url.trim_end_matches('/'));
        let url = Url::parse_with_params(
            &base,
            &[("address", address), ("key", self.config.api_key.as_str())],
        )
        .map_err(|e| CacaoWatchError::Config(format!("Invalid geocoding URL: {}", e)))?;

        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(CacaoWatchError::NotFound(format!(
                "Geocoding returned {} for '{}'",
                response.status(),
                address
            )));
        }

        let body: GeocodeResponse = response.json().await?;
        match body.status.as_str() {
            "OK" => {}
            "ZERO_RESULTS" => return Ok(Vec::new()),
            other => {
                return Err(CacaoWatchError::NotFound(format!(
                    "No location found for '{}' ({})",
                    address, other
                )))
            }
        }

        tracing::debug!(address, results = body.results.len(), "Geocoding lookup");

        Ok(body
            .results
            .into_iter()
            .map(|r| GeocodedPlace {
                name: r.formatted_address,
                coordinates: Coordinates::new(r.geometry.location.lat, r.geometry.location.lng),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> GeocodingClient {
        GeocodingClient::new(GeocodingConfig {
            api_key: "test_key".into(),
            base_url: server.uri(),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn resolves_first_result() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/geocode/json"))
            .and(query_param("address", "jipijapa, manabi, Ecuador"))
            .and(query_param("key", "test_key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "OK",
                "results": [{
                    "formatted_address": "Jipijapa, Ecuador",
                    "geometry": {"location": {"lat": -1.3486, "lng": -80.5786}}
                }]
            })))
            .mount(&server)
            .await;

        let place = client_for(&server)
            .resolve("jipijapa, manabi, Ecuador")
            .await
            .unwrap();
        assert_eq!(place.name, "Jipijapa, Ecuador");
        assert_eq!(place.coordinates, Coordinates::new(-1.3486, -80.5786));
    }

    #[tokio::test]
    async fn zero_results_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "ZERO_RESULTS",
                "results": []
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client.resolve("atlantis").await.unwrap_err();
        assert!(matches!(err, CacaoWatchError::NotFound(_)));
        assert!(client.search("atlantis").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn denied_status_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "REQUEST_DENIED",
                "results": []
            })))
            .mount(&server)
            .await;

        let err = client_for(&server).search("quevedo").await.unwrap_err();
        assert!(matches!(err, CacaoWatchError::NotFound(_)));
    }

    #[tokio::test]
    async fn short_search_is_rejected_without_a_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let client = client_for(&server);
        for query in ["", "qu", "  ab  ", "Ró"] {
            let err = client.search(query).await.unwrap_err();
            assert!(matches!(err, CacaoWatchError::InvalidData(_)), "{query:?}");
        }
    }

    #[tokio::test]
    async fn search_returns_every_match() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/geocode/json"))
            .and(query_param("address", "quevedo"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "OK",
                "results": [
                    {
                        "formatted_address": "Quevedo, Los Ríos, Ecuador",
                        "geometry": {"location": {"lat": -1.0225, "lng": -79.4631}}
                    },
                    {
                        "formatted_address": "Quevedo, Santander, Colombia",
                        "geometry": {"location": {"lat": 7.05, "lng": -73.1}}
                    }
                ]
            })))
            .mount(&server)
            .await;

        let places = client_for(&server).search(" quevedo ").await.unwrap();
        assert_eq!(places.len(), 2);
        assert_eq!(places[0].key(), "quevedo,los-ríos,ecuador");
        assert_eq!(places[1].name, "Quevedo, Santander, Colombia");
    }

    #[test]
    fn place_key_comes_from_formatted_address() {
        let place = GeocodedPlace {
            name: "El Empalme (Velasco Ibarra), Guayas, Ecuador".into(),
            coordinates: Coordinates::new(-1.05, -79.63),
        };
        assert_eq!(place.key(), "el-empalme-velasco-ibarra,guayas,ecuador");

        let zone = place.to_zone();
        assert_eq!(zone.key, place.key());
        assert_eq!(zone.name, place.name);
        assert_eq!(zone.variety, None);
    }
}
