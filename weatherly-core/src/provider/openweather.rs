use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::time::Duration;
use tracing::debug;

use crate::{
    error::FetchError,
    location::Location,
    model::{AirQuality, Alert, CurrentWeather, Forecast, GeoPlace, OneCallAlerts, Units, UvIndex},
};

use super::WeatherProvider;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Base URLs of the three OpenWeather API families.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    /// `/weather`, `/forecast`, `/air_pollution` and `/uvi` live here.
    pub data_url: String,
    /// `/direct` and `/reverse` geocoding.
    pub geo_url: String,
    pub onecall_url: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            data_url: "https://api.openweathermap.org/data/2.5".to_string(),
            geo_url: "https://api.openweathermap.org/geo/1.0".to_string(),
            onecall_url: "https://api.openweathermap.org/data/3.0/onecall".to_string(),
        }
    }
}

impl Endpoints {
    /// All three families under one root, e.g. a mock server.
    pub fn rooted_at(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            data_url: format!("{base}/data/2.5"),
            geo_url: format!("{base}/geo/1.0"),
            onecall_url: format!("{base}/data/3.0/onecall"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct OpenWeatherProvider {
    api_key: Option<String>,
    endpoints: Endpoints,
    http: Client,
}

impl OpenWeatherProvider {
    pub fn new(api_key: Option<String>, endpoints: Endpoints) -> Self {
        let http = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .unwrap_or_else(|err| {
                debug!("falling back to default HTTP client: {err}");
                Client::new()
            });

        Self { api_key: api_key.filter(|k| !k.trim().is_empty()), endpoints, http }
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        what: &str,
        url: &str,
        mut params: Vec<(&'static str, String)>,
    ) -> Result<T, FetchError> {
        let api_key = self.api_key.as_deref().ok_or(FetchError::MissingApiKey)?;
        params.push(("appid", api_key.to_string()));

        debug!(url, "requesting {what}");

        let res = self.http.get(url).query(&params).send().await?;

        let status = res.status();
        let body = res.text().await?;

        if !status.is_success() {
            debug!(url, %status, "{what} request failed: {}", truncate_body(&body));
            return Err(FetchError::Http {
                status: status.as_u16(),
                message: error_detail(&body),
            });
        }

        serde_json::from_str(&body).map_err(|err| {
            FetchError::Unexpected(format!("Failed to parse OpenWeather {what} JSON: {err}"))
        })
    }

    fn location_params(
        location: &Location,
        units: Units,
    ) -> Result<Vec<(&'static str, String)>, FetchError> {
        let mut params = location.query_params()?;
        params.push(("units", units.as_str().to_string()));
        Ok(params)
    }

    fn coordinate_params(lat: f64, lon: f64) -> Vec<(&'static str, String)> {
        vec![("lat", lat.to_string()), ("lon", lon.to_string())]
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

/// The `message` field OpenWeather puts in error bodies, when there is one.
fn error_detail(body: &str) -> Option<String> {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.message)
        .filter(|m| !m.is_empty())
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

#[async_trait]
impl WeatherProvider for OpenWeatherProvider {
    fn has_credentials(&self) -> bool {
        self.api_key.is_some()
    }

    async fn current_weather(
        &self,
        location: &Location,
        units: Units,
    ) -> Result<CurrentWeather, FetchError> {
        let url = format!("{}/weather", self.endpoints.data_url);
        self.get_json("current weather", &url, Self::location_params(location, units)?).await
    }

    async fn forecast(&self, location: &Location, units: Units) -> Result<Forecast, FetchError> {
        let url = format!("{}/forecast", self.endpoints.data_url);
        self.get_json("5-day forecast", &url, Self::location_params(location, units)?).await
    }

    async fn air_pollution(&self, lat: f64, lon: f64) -> Result<AirQuality, FetchError> {
        let url = format!("{}/air_pollution", self.endpoints.data_url);
        self.get_json("air pollution", &url, Self::coordinate_params(lat, lon)).await
    }

    async fn uv_index(&self, lat: f64, lon: f64) -> Result<UvIndex, FetchError> {
        let url = format!("{}/uvi", self.endpoints.data_url);
        self.get_json("UV index", &url, Self::coordinate_params(lat, lon)).await
    }

    async fn alerts(&self, lat: f64, lon: f64) -> Result<Vec<Alert>, FetchError> {
        let mut params = Self::coordinate_params(lat, lon);
        params.push(("exclude", "current,minutely,hourly,daily".to_string()));

        let parsed: OneCallAlerts =
            self.get_json("one-call alerts", &self.endpoints.onecall_url, params).await?;
        Ok(parsed.alerts)
    }

    async fn geocode(&self, query: &str, limit: u8) -> Result<Vec<GeoPlace>, FetchError> {
        let url = format!("{}/direct", self.endpoints.geo_url);
        let params = vec![("q", query.to_string()), ("limit", limit.to_string())];
        self.get_json("geocoding", &url, params).await
    }

    async fn reverse_geocode(
        &self,
        lat: f64,
        lon: f64,
        limit: u8,
    ) -> Result<Vec<GeoPlace>, FetchError> {
        let url = format!("{}/reverse", self.endpoints.geo_url);
        let mut params = Self::coordinate_params(lat, lon);
        params.push(("limit", limit.to_string()));
        self.get_json("reverse geocoding", &url, params).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn current_body(name: &str) -> serde_json::Value {
        serde_json::json!({
            "coord": { "lon": 2.35, "lat": 48.85 },
            "weather": [{ "id": 500, "main": "Rain", "description": "light rain", "icon": "10d" }],
            "main": { "temp": 12.3, "feels_like": 11.0, "humidity": 81 },
            "wind": { "speed": 4.1, "deg": 200 },
            "dt": 1_700_000_000,
            "timezone": 3600,
            "name": name
        })
    }

    async fn provider_for(server: &MockServer) -> OpenWeatherProvider {
        OpenWeatherProvider::new(Some("KEY".into()), Endpoints::rooted_at(&server.uri()))
    }

    #[tokio::test]
    async fn current_weather_sends_city_units_and_key() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/data/2.5/weather"))
            .and(query_param("q", "Paris, FR"))
            .and(query_param("units", "metric"))
            .and(query_param("appid", "KEY"))
            .respond_with(ResponseTemplate::new(200).set_body_json(current_body("Paris")))
            .expect(1)
            .mount(&server)
            .await;

        let provider = provider_for(&server).await;
        let current = provider
            .current_weather(&Location::city("Paris, FR"), Units::Metric)
            .await
            .unwrap();

        assert_eq!(current.name, "Paris");
        assert_eq!(current.main.humidity, 81);
    }

    #[tokio::test]
    async fn coordinates_are_sent_as_lat_lon() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/data/2.5/weather"))
            .and(query_param("lat", "48.85"))
            .and(query_param("lon", "2.35"))
            .and(query_param("units", "imperial"))
            .respond_with(ResponseTemplate::new(200).set_body_json(current_body("Paris")))
            .expect(1)
            .mount(&server)
            .await;

        let provider = provider_for(&server).await;
        let result = provider
            .current_weather(&Location::coordinates(48.85, 2.35), Units::Imperial)
            .await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn error_status_keeps_status_and_message() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/data/2.5/forecast"))
            .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
                "cod": "404",
                "message": "city not found"
            })))
            .mount(&server)
            .await;

        let provider = provider_for(&server).await;
        let err = provider.forecast(&Location::city("Atlantis"), Units::Metric).await.unwrap_err();

        assert_eq!(
            err,
            FetchError::Http { status: 404, message: Some("city not found".to_string()) }
        );
    }

    #[tokio::test]
    async fn malformed_body_is_unexpected() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/data/2.5/uvi"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let provider = provider_for(&server).await;
        let err = provider.uv_index(10.0, 20.0).await.unwrap_err();

        assert!(matches!(err, FetchError::Unexpected(msg) if msg.contains("UV index")));
    }

    #[tokio::test]
    async fn alerts_exclude_everything_else() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/data/3.0/onecall"))
            .and(query_param("exclude", "current,minutely,hourly,daily"))
            .and(query_param("lat", "35.68"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "lat": 35.68,
                "lon": 139.76,
                "alerts": [{
                    "sender_name": "JMA",
                    "event": "Heavy rain warning",
                    "start": 1_700_000_000,
                    "end": 1_700_050_000,
                    "description": "Heavy rain expected",
                    "tags": ["Rain"]
                }]
            })))
            .mount(&server)
            .await;

        let provider = provider_for(&server).await;
        let alerts = provider.alerts(35.68, 139.76).await.unwrap();

        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].event, "Heavy rain warning");
    }

    #[tokio::test]
    async fn geocode_returns_candidates() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/geo/1.0/direct"))
            .and(query_param("q", "Tokyo"))
            .and(query_param("limit", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                { "name": "Tokyo", "country": "JP", "lat": 35.68, "lon": 139.76 }
            ])))
            .mount(&server)
            .await;

        let provider = provider_for(&server).await;
        let places = provider.geocode("Tokyo", 1).await.unwrap();

        assert_eq!(places.len(), 1);
        assert_eq!(places[0].label(), "Tokyo, JP");
    }

    #[tokio::test]
    async fn unreachable_server_is_network_error() {
        let provider =
            OpenWeatherProvider::new(Some("KEY".into()), Endpoints::rooted_at("http://127.0.0.1:9"));

        let err = provider.air_pollution(1.0, 2.0).await.unwrap_err();

        assert!(matches!(err, FetchError::Network(_)));
    }

    #[test]
    fn blank_key_counts_as_missing() {
        let provider = OpenWeatherProvider::new(Some("  ".into()), Endpoints::default());
        assert!(!provider.has_credentials());
    }

    #[test]
    fn error_detail_reads_message_field() {
        assert_eq!(error_detail(r#"{"cod":401,"message":"Invalid API key"}"#).as_deref(), Some("Invalid API key"));
        assert_eq!(error_detail("Bad Gateway"), None);
    }
}
