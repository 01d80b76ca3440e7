//! In-memory doubles shared by the unit tests.

use async_trait::async_trait;
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};
use tokio::sync::Notify;

use crate::{
    cache::{Cache, MemoryStore, tests::ManualClock},
    context::FetchContext,
    error::FetchError,
    location::Location,
    model::*,
    provider::WeatherProvider,
    retry::tests::RecordingSleeper,
};

pub(crate) fn sample_current(name: &str) -> CurrentWeather {
    CurrentWeather {
        coord: Coord { lat: 48.85, lon: 2.35 },
        weather: vec![Condition {
            id: 803,
            main: "Clouds".into(),
            description: "broken clouds".into(),
            icon: "04d".into(),
        }],
        main: MainReadings {
            temp: 18.2,
            feels_like: 17.6,
            temp_min: 16.0,
            temp_max: 19.5,
            pressure: 1012,
            humidity: 64,
        },
        visibility: Some(10_000),
        wind: Wind { speed: 5.1, deg: 250.0, gust: None },
        clouds: Clouds { all: 75 },
        dt: 1_700_000_000,
        sys: SysInfo { country: Some("FR".into()), sunrise: None, sunset: None },
        timezone: 3600,
        name: name.to_string(),
    }
}

pub(crate) fn forecast_entry(dt: i64, temp: f64, main: &str) -> ForecastEntry {
    ForecastEntry {
        dt,
        main: MainReadings {
            temp,
            feels_like: temp,
            temp_min: temp,
            temp_max: temp,
            pressure: 1010,
            humidity: 70,
        },
        weather: vec![Condition {
            id: 800,
            main: main.to_string(),
            description: main.to_lowercase(),
            icon: String::new(),
        }],
        wind: Wind::default(),
        pop: 0.0,
        dt_txt: String::new(),
    }
}

pub(crate) fn sample_forecast(name: &str) -> Forecast {
    Forecast {
        list: vec![
            forecast_entry(1_700_000_000, 17.0, "Clouds"),
            forecast_entry(1_700_010_800, 15.5, "Rain"),
        ],
        city: ForecastCity {
            name: name.to_string(),
            country: "FR".into(),
            timezone: 3600,
            coord: None,
        },
    }
}

pub(crate) fn sample_bundle(name: &str) -> WeatherBundle {
    WeatherBundle { current: sample_current(name), forecast: sample_forecast(name) }
}

pub(crate) fn sample_air_quality() -> AirQuality {
    AirQuality {
        coord: None,
        list: vec![AirQualitySample {
            main: AqiMain { aqi: 4 },
            components: Pollutants { pm2_5: 61.2, pm10: 88.0, ..Pollutants::default() },
            dt: 1_700_000_000,
        }],
    }
}

pub(crate) fn sample_alert() -> Alert {
    Alert {
        sender_name: "JMA".into(),
        event: "Heavy rain warning".into(),
        start: 1_700_000_000,
        end: 1_700_050_000,
        description: "Heavy rain expected".into(),
        tags: vec!["Rain".into()],
    }
}

/// Scripted provider: canned payloads, per-method failures, call counting,
/// and an optional gate that holds `current_weather` for one city.
#[derive(Debug)]
pub(crate) struct FakeProvider {
    credentials: bool,
    geocode_results: bool,
    failures: Mutex<HashMap<&'static str, FetchError>>,
    calls: Mutex<HashMap<&'static str, usize>>,
    gate: Option<(String, Arc<Notify>)>,
}

impl FakeProvider {
    pub(crate) fn new() -> Self {
        Self {
            credentials: true,
            geocode_results: true,
            failures: Mutex::default(),
            calls: Mutex::default(),
            gate: None,
        }
    }

    pub(crate) fn without_credentials(mut self) -> Self {
        self.credentials = false;
        self
    }

    pub(crate) fn with_no_geocode_results(mut self) -> Self {
        self.geocode_results = false;
        self
    }

    pub(crate) fn failing(self, method: &'static str, err: FetchError) -> Self {
        self.fail(method, err);
        self
    }

    pub(crate) fn gated(mut self, city: &str, gate: Arc<Notify>) -> Self {
        self.gate = Some((city.to_string(), gate));
        self
    }

    pub(crate) fn fail(&self, method: &'static str, err: FetchError) {
        self.failures.lock().unwrap().insert(method, err);
    }

    pub(crate) fn calls(&self, method: &str) -> usize {
        self.calls.lock().unwrap().get(method).copied().unwrap_or(0)
    }

    pub(crate) fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }

    fn record(&self, method: &'static str) -> Result<(), FetchError> {
        *self.calls.lock().unwrap().entry(method).or_default() += 1;
        match self.failures.lock().unwrap().get(method) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl WeatherProvider for FakeProvider {
    fn has_credentials(&self) -> bool {
        self.credentials
    }

    async fn current_weather(
        &self,
        location: &Location,
        _units: Units,
    ) -> Result<CurrentWeather, FetchError> {
        if let Some((city, gate)) = &self.gate {
            if location == &Location::city(city.as_str()) {
                gate.notified().await;
            }
        }
        self.record("current_weather")?;
        Ok(sample_current(&location.display_name()))
    }

    async fn forecast(&self, location: &Location, _units: Units) -> Result<Forecast, FetchError> {
        self.record("forecast")?;
        Ok(sample_forecast(&location.display_name()))
    }

    async fn air_pollution(&self, _lat: f64, _lon: f64) -> Result<AirQuality, FetchError> {
        self.record("air_pollution")?;
        Ok(sample_air_quality())
    }

    async fn uv_index(&self, lat: f64, lon: f64) -> Result<UvIndex, FetchError> {
        self.record("uv_index")?;
        Ok(UvIndex { lat, lon, date: 1_700_000_000, value: 6.4 })
    }

    async fn alerts(&self, _lat: f64, _lon: f64) -> Result<Vec<Alert>, FetchError> {
        self.record("alerts")?;
        Ok(vec![sample_alert()])
    }

    async fn geocode(&self, query: &str, _limit: u8) -> Result<Vec<GeoPlace>, FetchError> {
        self.record("geocode")?;
        if !self.geocode_results {
            return Ok(Vec::new());
        }
        Ok(vec![GeoPlace {
            name: query.to_string(),
            state: None,
            country: "FR".into(),
            lat: 48.85,
            lon: 2.35,
        }])
    }

    async fn reverse_geocode(
        &self,
        lat: f64,
        lon: f64,
        _limit: u8,
    ) -> Result<Vec<GeoPlace>, FetchError> {
        self.record("reverse_geocode")?;
        if !self.geocode_results {
            return Ok(Vec::new());
        }
        Ok(vec![GeoPlace { name: "Paris".into(), state: None, country: "FR".into(), lat, lon }])
    }
}

/// Context over `provider` with an empty memory cache, a fixed clock and a
/// sleeper that never waits.
pub(crate) fn context_with(provider: Arc<FakeProvider>) -> FetchContext {
    let cache = Cache::new(Arc::new(MemoryStore::new())).with_clock(ManualClock::at(1_000_000));
    FetchContext::new(provider, cache).with_sleeper(Arc::new(RecordingSleeper::default()))
}
