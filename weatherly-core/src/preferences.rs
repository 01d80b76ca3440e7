//! Small user settings kept next to the response cache, without expiry.

use serde::{Serialize, de::DeserializeOwned};
use std::sync::Arc;
use tracing::warn;

use crate::{cache::KeyValueStore, error::CacheError, location::Location, model::Units};

pub const MAX_RECENT_CITIES: usize = 5;

const UNITS_KEY: &str = "pref_units";
const RECENT_CITIES_KEY: &str = "pref_recent_cities";
const LAST_LOCATION_KEY: &str = "pref_last_location";

#[derive(Debug, Clone)]
pub struct Preferences {
    store: Arc<dyn KeyValueStore>,
}

impl Preferences {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    fn load<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.store.get(key) {
            Ok(Some(raw)) => serde_json::from_str(&raw)
                .map_err(|err| warn!(key, "ignoring unreadable preference: {err}"))
                .ok(),
            Ok(None) => None,
            Err(err) => {
                warn!(key, "error reading preference: {err}");
                None
            }
        }
    }

    fn save<T: Serialize>(&self, key: &str, value: &T) {
        let result = serde_json::to_string(value)
            .map_err(CacheError::from)
            .and_then(|raw| self.store.set(key, raw));
        if let Err(err) = result {
            warn!(key, "error saving preference: {err}");
        }
    }

    /// Stored unit system, or `fallback` when none was saved.
    pub fn units_or(&self, fallback: Units) -> Units {
        self.load(UNITS_KEY).unwrap_or(fallback)
    }

    pub fn set_units(&self, units: Units) {
        self.save(UNITS_KEY, &units);
    }

    /// Most recent first.
    pub fn recent_cities(&self) -> Vec<String> {
        self.load(RECENT_CITIES_KEY).unwrap_or_default()
    }

    /// Put `city` at the front unless it is already listed; keep at most
    /// [`MAX_RECENT_CITIES`].
    pub fn remember_city(&self, city: &str) {
        let city = city.trim();
        if city.is_empty() {
            return;
        }

        let mut recent = self.recent_cities();
        if recent.iter().any(|c| c == city) {
            return;
        }

        recent.insert(0, city.to_string());
        recent.truncate(MAX_RECENT_CITIES);
        self.save(RECENT_CITIES_KEY, &recent);
    }

    /// Drop `city` from the recent list. Returns whether it was listed.
    pub fn forget_city(&self, city: &str) -> bool {
        let city = city.trim();
        let mut recent = self.recent_cities();
        let before = recent.len();
        recent.retain(|c| c != city);
        if recent.len() == before {
            return false;
        }

        self.save(RECENT_CITIES_KEY, &recent);
        true
    }

    pub fn last_location(&self) -> Option<Location> {
        self.load(LAST_LOCATION_KEY)
    }

    pub fn set_last_location(&self, location: Option<&Location>) {
        match location {
            Some(location) => self.save(LAST_LOCATION_KEY, location),
            None => {
                if let Err(err) = self.store.remove(LAST_LOCATION_KEY) {
                    warn!("error clearing last location: {err}");
                }
            }
        }
    }
}
