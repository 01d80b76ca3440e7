//! Derived, presentation-ready readings computed from raw API payloads.

use chrono::{DateTime, NaiveDate};
use std::collections::{BTreeMap, HashMap};

use crate::model::{Forecast, ForecastEntry};

/// Days shown in the forecast strip.
pub const FORECAST_DAYS: usize = 5;

/// OpenWeather's 1..=5 air quality index.
pub fn aqi_description(aqi: u8) -> &'static str {
    match aqi {
        1 => "Good",
        2 => "Fair",
        3 => "Moderate",
        4 => "Poor",
        5 => "Very Poor",
        _ => "Unknown",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UvCategory {
    Low,
    Moderate,
    High,
    VeryHigh,
    Extreme,
}

impl UvCategory {
    pub fn from_index(uvi: f64) -> Self {
        if uvi <= 2.0 {
            UvCategory::Low
        } else if uvi <= 5.0 {
            UvCategory::Moderate
        } else if uvi <= 7.0 {
            UvCategory::High
        } else if uvi <= 10.0 {
            UvCategory::VeryHigh
        } else {
            UvCategory::Extreme
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            UvCategory::Low => "Low",
            UvCategory::Moderate => "Moderate",
            UvCategory::High => "High",
            UvCategory::VeryHigh => "Very High",
            UvCategory::Extreme => "Extreme",
        }
    }
}

const COMPASS: [&str; 16] = [
    "N", "NNE", "NE", "ENE", "E", "ESE", "SE", "SSE", "S", "SSW", "SW", "WSW", "W", "WNW", "NW",
    "NNW",
];

/// 16-point compass name for a wind direction in degrees.
pub fn cardinal_direction(degrees: f64) -> &'static str {
    let normalized = degrees.rem_euclid(360.0);
    let index = (normalized / 22.5).round() as usize % COMPASS.len();
    COMPASS[index]
}

#[derive(Debug, Clone, PartialEq)]
pub struct DailySummary {
    pub date: NaiveDate,
    pub temp_min: f64,
    pub temp_max: f64,
    /// Most frequent `main` condition of the day; earliest wins ties.
    pub condition: String,
    pub max_pop: f64,
}

/// Group 3-hour steps into calendar days in the city's own timezone.
pub fn daily_summaries(forecast: &Forecast) -> Vec<DailySummary> {
    let offset = forecast.city.timezone;
    let mut days: BTreeMap<NaiveDate, Vec<&ForecastEntry>> = BTreeMap::new();

    for entry in &forecast.list {
        let Some(local) = DateTime::from_timestamp(entry.dt + offset, 0) else {
            continue;
        };
        days.entry(local.date_naive()).or_default().push(entry);
    }

    days.into_iter()
        .take(FORECAST_DAYS)
        .map(|(date, entries)| summarize(date, &entries))
        .collect()
}

fn summarize(date: NaiveDate, entries: &[&ForecastEntry]) -> DailySummary {
    let temp_min =
        entries.iter().map(|e| e.main.temp_min.min(e.main.temp)).fold(f64::INFINITY, f64::min);
    let temp_max =
        entries.iter().map(|e| e.main.temp_max.max(e.main.temp)).fold(f64::NEG_INFINITY, f64::max);
    let max_pop = entries.iter().map(|e| e.pop).fold(0.0, f64::max);

    let mut counts: HashMap<&str, usize> = HashMap::new();
    let mut order: Vec<&str> = Vec::new();
    for main in entries.iter().filter_map(|e| e.weather.first()).map(|c| c.main.as_str()) {
        let count = counts.entry(main).or_insert(0);
        if *count == 0 {
            order.push(main);
        }
        *count += 1;
    }

    let condition = order
        .iter()
        .copied()
        .fold(None::<(&str, usize)>, |best, main| {
            let count = counts[main];
            match best {
                Some((_, best_count)) if best_count >= count => best,
                _ => Some((main, count)),
            }
        })
        .map(|(main, _)| main.to_string())
        .unwrap_or_else(|| "Unknown".to_string());

    DailySummary { date, temp_min, temp_max, condition, max_pop }
}
