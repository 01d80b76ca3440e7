use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use inquire::{Select, Text};
use std::sync::Arc;
use weatherly_core::{
    Config, Dashboard, Location, Preferences, Units,
    cache::{KeyValueStore, open_store},
};

use crate::render;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weatherly", version, about = "Weather dashboard in your terminal")]
pub struct Cli {
    /// Log fetch, cache and retry activity to stderr.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Store the OpenWeather API key and preferred units.
    Configure,

    /// Show the dashboard for a city or a "lat,lon" pair.
    Show {
        /// City name (e.g. "Paris, FR") or coordinates (e.g. "48.85,2.35").
        location: String,

        /// metric, imperial or standard. Defaults to the last one used.
        #[arg(long)]
        units: Option<String>,
    },

    /// Show the dashboard for the device's coordinates.
    Here {
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,

        #[arg(long, allow_hyphen_values = true)]
        lon: f64,

        #[arg(long)]
        units: Option<String>,
    },

    /// Show the dashboard for the last location viewed.
    Last {
        #[arg(long)]
        units: Option<String>,
    },

    /// Suggest up to five places matching a partial name.
    Search {
        query: String,
    },

    /// List recently searched cities.
    Recent {
        #[command(subcommand)]
        action: Option<RecentAction>,
    },

    /// Manage the response cache.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Debug, Subcommand)]
pub enum RecentAction {
    /// Remove a city from the list.
    Remove { city: String },
}

#[derive(Debug, Subcommand)]
pub enum CacheAction {
    /// Drop every cached response.
    Clear,
}

/// Stores and settings shared by the commands.
struct Session {
    config: Config,
    cache_store: Arc<dyn KeyValueStore>,
    prefs: Preferences,
}

impl Session {
    fn open() -> Result<Self> {
        let config = Config::load()?;
        let cache_path = config.cache_file_path()?;
        let prefs_path = Config::preferences_file_path()?;
        tracing::debug!(cache = %cache_path.display(), prefs = %prefs_path.display(), "opening stores");

        let cache_store = open_store(&cache_path, config.cache.capacity_bytes);
        let prefs_store = open_store(&prefs_path, config.cache.capacity_bytes);

        Ok(Self::with_stores(config, cache_store, prefs_store))
    }

    fn with_stores(
        config: Config,
        cache_store: Arc<dyn KeyValueStore>,
        prefs_store: Arc<dyn KeyValueStore>,
    ) -> Self {
        Self { config, cache_store, prefs: Preferences::new(prefs_store) }
    }

    fn units(&self, flag: Option<&str>) -> Result<Units> {
        match flag {
            Some(value) => {
                let units = Units::try_from(value)?;
                self.prefs.set_units(units);
                Ok(units)
            }
            None => Ok(self.prefs.units_or(self.config.units)),
        }
    }

    fn dashboard(&self) -> Dashboard {
        Dashboard::from_config(&self.config, self.cache_store.clone())
    }

    /// Resolve search input and units for `show`. The input is checked first
    /// so a rejected location leaves the stored units alone.
    async fn prepare_show(
        &self,
        dashboard: &Dashboard,
        input: &str,
        units: Option<&str>,
    ) -> Result<(Location, Units)> {
        if Location::parse(input).is_none() {
            bail!("Please enter a city name or coordinates.");
        }
        let units = self.units(units)?;
        let Some(location) = dashboard.resolve_input(input).await else {
            bail!("Please enter a city name or coordinates.");
        };
        Ok((location, units))
    }

    async fn show(&self, location: Location, units: Units) -> Result<()> {
        let dashboard = self.dashboard();
        dashboard.update(Some(location.clone()), units).await;

        let snapshot = dashboard.snapshot();
        print!("{}", render::dashboard(&snapshot));

        self.prefs.set_last_location(Some(&location));
        if let Location::City(name) = &location {
            self.prefs.remember_city(name);
        }

        Ok(())
    }
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        match self.command {
            Command::Configure => configure(),
            Command::Show { location, units } => {
                let session = Session::open()?;
                let (location, units) =
                    session.prepare_show(&session.dashboard(), &location, units.as_deref()).await?;
                session.show(location, units).await
            }
            Command::Here { lat, lon, units } => {
                let session = Session::open()?;
                let units = session.units(units.as_deref())?;
                let location = session.dashboard().locate(lat, lon).await;
                session.show(location, units).await
            }
            Command::Last { units } => {
                let session = Session::open()?;
                let units = session.units(units.as_deref())?;
                let Some(location) = session.prefs.last_location() else {
                    bail!("No location viewed yet. Hint: run `weatherly show <city>` first.");
                };
                session.show(location, units).await
            }
            Command::Search { query } => {
                let session = Session::open()?;
                let suggestions = match session.dashboard().suggest(&query).await {
                    Ok(suggestions) => suggestions,
                    Err(err) => bail!(err.user_message()),
                };
                if suggestions.is_empty() {
                    println!("No matching places.");
                }
                for place in suggestions {
                    println!("{place}");
                }
                Ok(())
            }
            Command::Recent { action: Some(RecentAction::Remove { city }) } => {
                let session = Session::open()?;
                if !session.prefs.forget_city(&city) {
                    bail!("{city} is not in the recent list.");
                }
                println!("Removed {city}.");
                Ok(())
            }
            Command::Recent { action: None } => {
                let session = Session::open()?;
                let recent = session.prefs.recent_cities();
                if recent.is_empty() {
                    println!("No recent cities.");
                }
                for city in recent {
                    println!("{city}");
                }
                Ok(())
            }
            Command::Cache { action: CacheAction::Clear } => {
                let session = Session::open()?;
                session.dashboard().clear_cache();
                println!("Cache cleared.");
                Ok(())
            }
        }
    }
}

fn configure() -> Result<()> {
    let mut config = Config::load()?;

    let api_key = Text::new("OpenWeather API key:")
        .with_help_message("Leave empty to keep the current key")
        .prompt()
        .context("Failed to read API key")?;
    if !api_key.trim().is_empty() {
        config.set_api_key(api_key);
    }

    let choices: Vec<&str> = Units::all().iter().map(Units::as_str).collect();
    let current = Units::all().iter().position(|u| *u == config.units).unwrap_or(0);
    let units = Select::new("Units:", choices)
        .with_starting_cursor(current)
        .prompt()
        .context("Failed to read units")?;
    config.units = Units::try_from(units)?;

    config.save()?;

    if !config.has_api_key() {
        println!("Warning: no API key stored; requests will fail until one is configured.");
    }
    println!("Configuration saved to {}", Config::config_file_path()?.display());
    Ok(())
}
