use async_trait::async_trait;
use std::fmt::Debug;

use crate::{
    error::FetchError,
    location::Location,
    model::{AirQuality, Alert, CurrentWeather, Forecast, GeoPlace, Units, UvIndex},
};

pub mod openweather;

pub use openweather::{Endpoints, OpenWeatherProvider};

/// The remote weather API as seen by the fetchers. One call per method, no
/// retry and no caching at this level.
#[async_trait]
pub trait WeatherProvider: Send + Sync + Debug {
    /// Whether a credential is available at all. Fetchers check this before
    /// touching the network.
    fn has_credentials(&self) -> bool;

    async fn current_weather(
        &self,
        location: &Location,
        units: Units,
    ) -> Result<CurrentWeather, FetchError>;

    async fn forecast(&self, location: &Location, units: Units) -> Result<Forecast, FetchError>;

    async fn air_pollution(&self, lat: f64, lon: f64) -> Result<AirQuality, FetchError>;

    async fn uv_index(&self, lat: f64, lon: f64) -> Result<UvIndex, FetchError>;

    /// Active government alerts; an absent list means none.
    async fn alerts(&self, lat: f64, lon: f64) -> Result<Vec<Alert>, FetchError>;

    /// Forward geocoding, at most `limit` candidates.
    async fn geocode(&self, query: &str, limit: u8) -> Result<Vec<GeoPlace>, FetchError>;

    async fn reverse_geocode(
        &self,
        lat: f64,
        lon: f64,
        limit: u8,
    ) -> Result<Vec<GeoPlace>, FetchError>;
}
