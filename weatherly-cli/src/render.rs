//! Plain-text rendering of a dashboard snapshot.

use chrono::{DateTime, FixedOffset};
use std::fmt::Write;
use weatherly_core::{
    DashboardSnapshot, FetchState, Units, WeatherBundle,
    insight::{UvCategory, aqi_description, cardinal_direction, daily_summaries},
    model::{AirQuality, Alert, UvIndex},
};

pub fn dashboard(snapshot: &DashboardSnapshot) -> String {
    let mut out = String::new();

    let title = snapshot
        .location
        .as_ref()
        .map(|l| l.display_name())
        .unwrap_or_else(|| "No location".to_string());
    let _ = writeln!(out, "== {title} ==");

    section(&mut out, "Alerts", &snapshot.alerts, |out, alerts| alerts_panel(out, alerts));
    section(&mut out, "Current conditions", &snapshot.weather, |out, bundle| {
        weather_panel(out, bundle, snapshot.units)
    });
    section(&mut out, "Air quality", &snapshot.air_quality, air_quality_panel);
    section(&mut out, "UV index", &snapshot.uv_index, uv_panel);

    out
}

/// Error line first, then whatever data is still around.
fn section<T>(
    out: &mut String,
    title: &str,
    state: &FetchState<T>,
    body: impl FnOnce(&mut String, &T),
) {
    let _ = writeln!(out, "\n[{title}]");
    if state.has_error() {
        let _ = writeln!(out, "  ! {}", state.error);
    }
    match &state.data {
        Some(data) => body(out, data),
        None if state.loading => {
            let _ = writeln!(out, "  loading...");
        }
        None if !state.has_error() => {
            let _ = writeln!(out, "  no data");
        }
        None => {}
    }
}

fn local_time(ts: i64, offset_secs: i64, format: &str) -> String {
    let offset = i32::try_from(offset_secs).ok().and_then(FixedOffset::east_opt);
    match (DateTime::from_timestamp(ts, 0), offset) {
        (Some(dt), Some(offset)) => dt.with_timezone(&offset).format(format).to_string(),
        (Some(dt), None) => dt.format(format).to_string(),
        (None, _) => "--".to_string(),
    }
}

fn weather_panel(out: &mut String, bundle: &WeatherBundle, units: Units) {
    let current = &bundle.current;
    let temp = units.temperature_symbol();
    let description =
        current.condition().map(|c| c.description.as_str()).unwrap_or("unknown conditions");

    let _ = writeln!(
        out,
        "  {:.0}{temp}, {description} (feels like {:.0}{temp})",
        current.main.temp, current.main.feels_like
    );
    let _ = writeln!(
        out,
        "  humidity {}%  wind {:.1} {} {}  pressure {} hPa",
        current.main.humidity,
        current.wind.speed,
        units.speed_symbol(),
        cardinal_direction(current.wind.deg),
        current.main.pressure,
    );
    if let Some(visibility) = current.visibility {
        let _ = writeln!(out, "  visibility {:.1} km", f64::from(visibility) / 1000.0);
    }
    if let (Some(rise), Some(set)) = (current.sys.sunrise, current.sys.sunset) {
        let _ = writeln!(
            out,
            "  sunrise {}  sunset {}",
            local_time(rise, current.timezone, "%H:%M"),
            local_time(set, current.timezone, "%H:%M"),
        );
    }

    let days = daily_summaries(&bundle.forecast);
    if !days.is_empty() {
        let _ = writeln!(out, "\n[5-day forecast]");
    }
    for day in days {
        let _ = writeln!(
            out,
            "  {}  {:>4.0}{temp} / {:>4.0}{temp}  {:<12} rain {:>3.0}%",
            day.date.format("%a %d %b"),
            day.temp_max,
            day.temp_min,
            day.condition,
            day.max_pop * 100.0,
        );
    }
}

fn air_quality_panel(out: &mut String, air: &AirQuality) {
    let Some(sample) = air.latest() else {
        let _ = writeln!(out, "  no data");
        return;
    };
    let c = &sample.components;
    let _ = writeln!(out, "  AQI {} ({})", sample.main.aqi, aqi_description(sample.main.aqi));
    let _ = writeln!(
        out,
        "  PM2.5 {:.1}  PM10 {:.1}  CO {:.1}  NO2 {:.1}  O3 {:.1}  SO2 {:.1} µg/m³",
        c.pm2_5, c.pm10, c.co, c.no2, c.o3, c.so2
    );
}

fn uv_panel(out: &mut String, uv: &UvIndex) {
    let _ = writeln!(out, "  {:.1} - {}", uv.value, UvCategory::from_index(uv.value).label());
}

fn alerts_panel(out: &mut String, alerts: &[Alert]) {
    if alerts.is_empty() {
        let _ = writeln!(out, "  none");
    }
    for alert in alerts {
        let _ = writeln!(
            out,
            "  {} ({}) {} -> {}",
            alert.event,
            alert.sender_name,
            local_time(alert.start, 0, "%Y-%m-%d %H:%M UTC"),
            local_time(alert.end, 0, "%Y-%m-%d %H:%M UTC"),
        );
        if !alert.description.is_empty() {
            let _ = writeln!(out, "    {}", alert.description.trim());
        }
    }
}
