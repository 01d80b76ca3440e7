//! Drives the four fetchers from one location input.

use std::sync::{Arc, Mutex};
use tracing::{debug, info};

use crate::{
    cache::{Cache, KeyValueStore},
    config::Config,
    context::FetchContext,
    fetcher::{
        AirQualityFetcher, AirQualityResource, AlertsFetcher, AlertsResource, FetchState,
        Fetcher, UvIndexFetcher, UvIndexResource, WeatherFetcher, WeatherResource,
    },
    error::FetchError,
    location::{Location, canonical_location, city_suggestions, describe_place},
    model::{AirQuality, Alert, Units, UvIndex, WeatherBundle},
    provider::OpenWeatherProvider,
};

#[derive(Debug, Clone, PartialEq)]
pub struct DashboardSnapshot {
    pub location: Option<Location>,
    pub units: Units,
    pub weather: FetchState<WeatherBundle>,
    pub air_quality: FetchState<AirQuality>,
    pub uv_index: FetchState<UvIndex>,
    pub alerts: FetchState<Vec<Alert>>,
}

#[derive(Debug, Default)]
struct Inputs {
    location: Option<Location>,
    units: Units,
    primed: bool,
}

#[derive(Debug)]
pub struct Dashboard {
    ctx: FetchContext,
    inputs: Mutex<Inputs>,
    pub weather: WeatherFetcher,
    pub air_quality: AirQualityFetcher,
    pub uv_index: UvIndexFetcher,
    pub alerts: AlertsFetcher,
}

impl Dashboard {
    pub fn new(ctx: FetchContext) -> Self {
        Self {
            weather: Fetcher::new(WeatherResource, ctx.clone()),
            air_quality: Fetcher::new(AirQualityResource, ctx.clone()),
            uv_index: Fetcher::new(UvIndexResource, ctx.clone()),
            alerts: Fetcher::new(AlertsResource, ctx.clone()),
            inputs: Mutex::default(),
            ctx,
        }
    }

    /// Wire the OpenWeather provider, the cache over `store`, and the retry
    /// settings from `config`.
    pub fn from_config(config: &Config, store: Arc<dyn KeyValueStore>) -> Self {
        let provider =
            OpenWeatherProvider::new(config.resolved_api_key(), config.endpoints.clone());
        let cache = Cache::new(store).with_ttl(config.cache.ttl());
        let ctx = FetchContext::new(Arc::new(provider), cache)
            .with_retry_policy(config.retry.policy());
        Self::new(ctx)
    }

    pub fn context(&self) -> &FetchContext {
        &self.ctx
    }

    /// Apply a new location and/or unit system. Weather reacts to both;
    /// the other resources only to a location change. Fetchers whose inputs
    /// did not change are left alone. Affected fetchers run concurrently.
    pub async fn update(&self, location: Option<Location>, units: Units) {
        let (location_changed, units_changed) = {
            let mut inputs = self.inputs.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            let location_changed = !inputs.primed || inputs.location != location;
            let units_changed = !inputs.primed || inputs.units != units;
            inputs.location = location.clone();
            inputs.units = units;
            inputs.primed = true;
            (location_changed, units_changed)
        };

        if !location_changed && !units_changed {
            debug!("dashboard inputs unchanged");
            return;
        }

        if let Some(location) = &location {
            info!(%location, %units, "refreshing dashboard");
        }

        let location = location.as_ref();
        let refresh_weather = self.weather.refresh(location, units);
        let refresh_rest = async {
            if location_changed {
                tokio::join!(
                    self.air_quality.refresh(location, units),
                    self.uv_index.refresh(location, units),
                    self.alerts.refresh(location, units),
                );
            }
        };

        tokio::join!(refresh_weather, refresh_rest);
    }

    /// Refresh every resource for the current inputs, changed or not.
    pub async fn reload(&self) {
        let (location, units) = {
            let inputs = self.inputs.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            (inputs.location.clone(), inputs.units)
        };
        let location = location.as_ref();

        tokio::join!(
            self.weather.refresh(location, units),
            self.air_quality.refresh(location, units),
            self.uv_index.refresh(location, units),
            self.alerts.refresh(location, units),
        );
    }

    /// Coordinates from the device, labelled through reverse geocoding when
    /// possible.
    pub async fn locate(&self, lat: f64, lon: f64) -> Location {
        let location = Location::coordinates(lat, lon);
        match describe_place(&self.ctx, lat, lon).await {
            Some(name) => location.with_display_name(name),
            None => location,
        }
    }

    /// Search-box input to a location, with city names normalized through a
    /// single geocoding lookup. `None` for blank input.
    pub async fn resolve_input(&self, input: &str) -> Option<Location> {
        canonical_location(&self.ctx, input).await
    }

    pub async fn suggest(&self, query: &str) -> Result<Vec<String>, FetchError> {
        city_suggestions(&self.ctx, query).await
    }

    pub fn snapshot(&self) -> DashboardSnapshot {
        let inputs = self.inputs.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        DashboardSnapshot {
            location: inputs.location.clone(),
            units: inputs.units,
            weather: self.weather.snapshot(),
            air_quality: self.air_quality.snapshot(),
            uv_index: self.uv_index.snapshot(),
            alerts: self.alerts.snapshot(),
        }
    }

    pub fn clear_cache(&self) {
        self.ctx.cache.clear();
    }
}
