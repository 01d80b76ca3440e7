//! Location values and their translation into API parameters and cache keys.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    context::FetchContext,
    error::FetchError,
    model::{GeoPlace, Units},
};

/// What the user asked for: a free-text place or a coordinate pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Location {
    City(String),
    Coordinates {
        lat: f64,
        lon: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        display_name: Option<String>,
    },
}

impl Location {
    pub fn city(name: impl Into<String>) -> Self {
        Location::City(name.into())
    }

    pub fn coordinates(lat: f64, lon: f64) -> Self {
        Location::Coordinates { lat, lon, display_name: None }
    }

    pub fn with_display_name(self, name: impl Into<String>) -> Self {
        match self {
            Location::Coordinates { lat, lon, .. } => {
                Location::Coordinates { lat, lon, display_name: Some(name.into()) }
            }
            city => city,
        }
    }

    /// Parse search-box input. `"lat,lon"` with in-range numbers becomes a
    /// coordinate pair; other non-blank text is a city; blank is no location.
    pub fn parse(input: &str) -> Option<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return None;
        }

        if let Some((lat, lon)) = trimmed.split_once(',') {
            if let (Ok(lat), Ok(lon)) = (lat.trim().parse::<f64>(), lon.trim().parse::<f64>()) {
                if (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lon) {
                    return Some(Location::coordinates(lat, lon));
                }
            }
        }

        Some(Location::City(trimmed.to_string()))
    }

    /// An empty city name stands for "no location selected".
    pub fn is_empty(&self) -> bool {
        matches!(self, Location::City(name) if name.trim().is_empty())
    }

    /// Portion of the cache key identifying this location, or `None` when the
    /// value cannot address anything. Zero coordinates are rejected along with
    /// non-finite ones.
    pub fn key_fragment(&self) -> Option<String> {
        match self {
            Location::City(name) if !name.trim().is_empty() => Some(name.clone()),
            Location::City(_) => None,
            Location::Coordinates { lat, lon, .. } => {
                usable_coordinate(*lat, *lon).then(|| format!("{lat}_{lon}"))
            }
        }
    }

    /// Location part of a weather/forecast query: `q` or `lat` + `lon`.
    pub fn query_params(&self) -> Result<Vec<(&'static str, String)>, FetchError> {
        match self {
            Location::City(name) if !name.trim().is_empty() => Ok(vec![("q", name.clone())]),
            Location::Coordinates { lat, lon, .. } if usable_coordinate(*lat, *lon) => {
                Ok(vec![("lat", lat.to_string()), ("lon", lon.to_string())])
            }
            _ => Err(FetchError::InvalidLocation),
        }
    }

    pub fn display_name(&self) -> String {
        match self {
            Location::City(name) => name.clone(),
            Location::Coordinates { display_name: Some(name), .. } => name.clone(),
            Location::Coordinates { lat, lon, display_name: None } => {
                format!("{lat:.4}, {lon:.4}")
            }
        }
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.display_name())
    }
}

fn usable_coordinate(lat: f64, lon: f64) -> bool {
    lat.is_finite() && lon.is_finite() && lat != 0.0 && lon != 0.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Weather,
    AirQuality,
    UvIndex,
    Alerts,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Weather => "weather",
            ResourceKind::AirQuality => "air_quality",
            ResourceKind::UvIndex => "uv_index",
            ResourceKind::Alerts => "alerts",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Deterministic cache key. Only weather data depends on the unit system.
pub fn cache_key(kind: ResourceKind, location: &Location, units: Units) -> Option<String> {
    let fragment = location.key_fragment()?;
    Some(match kind {
        ResourceKind::Weather => format!("{kind}_{fragment}_{units}"),
        _ => format!("{kind}_{fragment}"),
    })
}

/// Coordinates for endpoints that accept nothing else. Cities are geocoded
/// once, without retries (first candidate wins); an empty candidate list is
/// `LocationNotFound`.
pub async fn resolve_coordinates(
    ctx: &FetchContext,
    location: &Location,
) -> Result<(f64, f64), FetchError> {
    match location {
        Location::Coordinates { lat, lon, .. } if usable_coordinate(*lat, *lon) => {
            Ok((*lat, *lon))
        }
        Location::City(name) if !name.trim().is_empty() => {
            let places = ctx.provider.geocode(name, 1).await?;
            let place = places.into_iter().next().ok_or(FetchError::LocationNotFound)?;
            debug!(city = %name, lat = place.lat, lon = place.lon, "geocoded");
            Ok((place.lat, place.lon))
        }
        _ => Err(FetchError::InvalidLocation),
    }
}

/// Reverse-geocode a coordinate pair to `"Name, CC"` in a single attempt. Any
/// failure yields `None`; the caller shows raw coordinates instead.
pub async fn describe_place(ctx: &FetchContext, lat: f64, lon: f64) -> Option<String> {
    if !ctx.provider.has_credentials() {
        return None;
    }

    match ctx.provider.reverse_geocode(lat, lon, 1).await {
        Ok(places) => {
            let label = places.first().map(|p| p.label());
            match &label {
                Some(label) => info!("reverse geocoded to: {label}"),
                None => debug!(lat, lon, "reverse geocoding returned no data"),
            }
            label
        }
        Err(err) => {
            debug!(lat, lon, "reverse geocoding failed: {err}");
            None
        }
    }
}

pub const SUGGESTION_LIMIT: u8 = 5;

/// Up to [`SUGGESTION_LIMIT`] place names matching `query`, formatted as
/// `"Name[, State], CC"`.
pub async fn city_suggestions(
    ctx: &FetchContext,
    query: &str,
) -> Result<Vec<String>, FetchError> {
    let query = query.trim();
    if query.is_empty() {
        return Ok(Vec::new());
    }
    if !ctx.provider.has_credentials() {
        return Err(FetchError::MissingApiKey);
    }

    let places = ctx.provider.geocode(query, SUGGESTION_LIMIT).await?;
    Ok(places.iter().map(GeoPlace::suggestion).collect())
}

/// Turn search input into the location to show. A city is looked up once and
/// replaced by its `"Name, CC"` label so different spellings share cache
/// entries; on a miss or any error the trimmed input is kept as is.
pub async fn canonical_location(ctx: &FetchContext, input: &str) -> Option<Location> {
    let location = Location::parse(input)?;
    let Location::City(name) = &location else {
        return Some(location);
    };
    if !ctx.provider.has_credentials() {
        return Some(location);
    }

    match ctx.provider.geocode(name, 1).await {
        Ok(places) => match places.first() {
            Some(place) => {
                debug!(query = %name, label = %place.label(), "normalized city name");
                Some(Location::City(place.label()))
            }
            None => Some(location),
        },
        Err(err) => {
            debug!(query = %name, "city lookup failed, keeping input: {err}");
            Some(location)
        }
    }
}
