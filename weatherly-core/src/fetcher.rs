//! Per-resource fetch state machines.
//!
//! A [`Fetcher`] serves cached data immediately, refreshes it over the network
//! through the retry policy, and publishes every transition on a
//! `tokio::sync::watch` channel for whoever renders it.

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use std::{
    fmt::Debug,
    sync::atomic::{AtomicU64, Ordering},
};
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::{
    context::FetchContext,
    error::FetchError,
    location::{Location, ResourceKind, cache_key, resolve_coordinates},
    model::{AirQuality, Alert, Units, UvIndex, WeatherBundle},
};

pub const ALERTS_ERROR: &str = "Failed to fetch weather alerts.";

/// What a consumer sees for one resource.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchState<T> {
    pub data: Option<T>,
    pub loading: bool,
    /// Empty when there is nothing to report.
    pub error: String,
}

impl<T> Default for FetchState<T> {
    fn default() -> Self {
        Self { data: None, loading: false, error: String::new() }
    }
}

impl<T> FetchState<T> {
    pub fn has_error(&self) -> bool {
        !self.error.is_empty()
    }
}

/// One remote resource: how to load it and how to word its failures.
#[async_trait]
pub trait Resource: Send + Sync + Debug + 'static {
    type Data: Clone + Debug + Serialize + DeserializeOwned + Send + Sync + 'static;

    const KIND: ResourceKind;

    async fn load(
        &self,
        ctx: &FetchContext,
        location: &Location,
        units: Units,
    ) -> Result<Self::Data, FetchError>;

    fn error_message(&self, err: &FetchError) -> String {
        err.user_message()
    }
}

/// Current conditions followed by the 5-day forecast. Both must succeed.
#[derive(Debug, Clone, Copy, Default)]
pub struct WeatherResource;

#[async_trait]
impl Resource for WeatherResource {
    type Data = WeatherBundle;
    const KIND: ResourceKind = ResourceKind::Weather;

    async fn load(
        &self,
        ctx: &FetchContext,
        location: &Location,
        units: Units,
    ) -> Result<WeatherBundle, FetchError> {
        let current = ctx.retry(|| ctx.provider.current_weather(location, units)).await?;
        let forecast = ctx.retry(|| ctx.provider.forecast(location, units)).await?;
        Ok(WeatherBundle { current, forecast })
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AirQualityResource;

#[async_trait]
impl Resource for AirQualityResource {
    type Data = AirQuality;
    const KIND: ResourceKind = ResourceKind::AirQuality;

    async fn load(
        &self,
        ctx: &FetchContext,
        location: &Location,
        _units: Units,
    ) -> Result<AirQuality, FetchError> {
        let (lat, lon) = resolve_coordinates(ctx, location).await?;
        ctx.retry(|| ctx.provider.air_pollution(lat, lon)).await
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct UvIndexResource;

#[async_trait]
impl Resource for UvIndexResource {
    type Data = UvIndex;
    const KIND: ResourceKind = ResourceKind::UvIndex;

    async fn load(
        &self,
        ctx: &FetchContext,
        location: &Location,
        _units: Units,
    ) -> Result<UvIndex, FetchError> {
        let (lat, lon) = resolve_coordinates(ctx, location).await?;
        ctx.retry(|| ctx.provider.uv_index(lat, lon)).await
    }
}

/// Alerts come from the one-call endpoint, which only takes coordinates.
/// Neither the geocoding step nor the one-call request is retried.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlertsResource;

#[async_trait]
impl Resource for AlertsResource {
    type Data = Vec<Alert>;
    const KIND: ResourceKind = ResourceKind::Alerts;

    async fn load(
        &self,
        ctx: &FetchContext,
        location: &Location,
        _units: Units,
    ) -> Result<Vec<Alert>, FetchError> {
        let (lat, lon) = resolve_coordinates(ctx, location).await?;
        ctx.provider.alerts(lat, lon).await
    }

    fn error_message(&self, _err: &FetchError) -> String {
        ALERTS_ERROR.to_string()
    }
}

#[derive(Debug)]
pub struct Fetcher<R: Resource> {
    resource: R,
    ctx: FetchContext,
    state: watch::Sender<FetchState<R::Data>>,
    generation: AtomicU64,
}

impl<R: Resource> Fetcher<R> {
    pub fn new(resource: R, ctx: FetchContext) -> Self {
        let (state, _) = watch::channel(FetchState::default());
        Self { resource, ctx, state, generation: AtomicU64::new(0) }
    }

    pub fn kind(&self) -> ResourceKind {
        R::KIND
    }

    pub fn snapshot(&self) -> FetchState<R::Data> {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<FetchState<R::Data>> {
        self.state.subscribe()
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    /// Run one refresh for `location`. Completes once the network round trip
    /// is over; a newer `refresh` started meanwhile wins and this one's result
    /// is only written to the cache.
    pub async fn refresh(&self, location: Option<&Location>, units: Units) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let kind = R::KIND;

        let Some(location) = location.filter(|l| !l.is_empty()) else {
            self.state.send_replace(FetchState::default());
            return;
        };

        if !self.ctx.provider.has_credentials() {
            self.fail_fast(FetchError::MissingApiKey);
            return;
        }

        let Some(key) = cache_key(kind, location, units) else {
            self.fail_fast(FetchError::InvalidLocation);
            return;
        };

        let cached = self.ctx.cache.read::<R::Data>(&key);
        self.state.send_modify(|state| {
            if let Some(cached) = cached {
                state.data = Some(cached);
            }
            state.loading = true;
            state.error.clear();
        });

        let result = self.resource.load(&self.ctx, location, units).await;

        if let Ok(data) = &result {
            self.ctx.cache.write(&key, data);
        }

        if !self.is_current(generation) {
            debug!(%kind, %location, "dropping response for superseded location");
            return;
        }

        match result {
            Ok(data) => self.state.send_modify(|state| {
                state.data = Some(data);
                state.error.clear();
                state.loading = false;
            }),
            Err(err) => {
                warn!(%kind, %location, "fetch failed: {err}");
                let message = self.resource.error_message(&err);
                self.state.send_modify(|state| {
                    state.error = message;
                    state.loading = false;
                });
            }
        }
    }

    fn fail_fast(&self, err: FetchError) {
        let message = err.to_string();
        self.state.send_modify(|state| {
            state.error = message;
            state.loading = false;
        });
    }
}

pub type WeatherFetcher = Fetcher<WeatherResource>;
pub type AirQualityFetcher = Fetcher<AirQualityResource>;
pub type UvIndexFetcher = Fetcher<UvIndexResource>;
pub type AlertsFetcher = Fetcher<AlertsResource>;
