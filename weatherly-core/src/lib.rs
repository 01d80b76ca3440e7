//! Core library for the `weatherly` dashboard.
//!
//! This crate defines:
//! - Location values and their mapping to OpenWeather query parameters
//! - The OpenWeather provider behind the `WeatherProvider` trait
//! - Bounded exponential-backoff retry and a best-effort TTL cache
//! - One fetcher per resource (weather + forecast, air quality, UV index,
//!   alerts) publishing `{data, loading, error}` states
//! - Configuration and small persisted preferences
//!
//! It is used by `weatherly-cli`, but any front end can drive a [`Dashboard`]
//! and subscribe to its fetchers.

pub mod cache;
pub mod config;
pub mod context;
pub mod dashboard;
pub mod error;
pub mod fetcher;
pub mod insight;
pub mod location;
pub mod model;
pub mod preferences;
pub mod provider;
pub mod retry;

#[cfg(test)]
mod testing;

pub use cache::{Cache, FileStore, KeyValueStore, MemoryStore};
pub use config::Config;
pub use context::FetchContext;
pub use dashboard::{Dashboard, DashboardSnapshot};
pub use error::{CacheError, FetchError};
pub use fetcher::{FetchState, Fetcher};
pub use location::Location;
pub use model::{Units, WeatherBundle};
pub use preferences::Preferences;
pub use provider::{OpenWeatherProvider, WeatherProvider};
pub use retry::RetryPolicy;
