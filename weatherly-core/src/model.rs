use serde::{Deserialize, Serialize};

/// Unit system passed to the API as the `units` query parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Units {
    #[default]
    Metric,
    Imperial,
    Standard,
}

impl Units {
    pub fn as_str(&self) -> &'static str {
        match self {
            Units::Metric => "metric",
            Units::Imperial => "imperial",
            Units::Standard => "standard",
        }
    }

    pub const fn all() -> &'static [Units] {
        &[Units::Metric, Units::Imperial, Units::Standard]
    }

    pub fn temperature_symbol(&self) -> &'static str {
        match self {
            Units::Metric => "°C",
            Units::Imperial => "°F",
            Units::Standard => "K",
        }
    }

    pub fn speed_symbol(&self) -> &'static str {
        match self {
            Units::Imperial => "mph",
            Units::Metric | Units::Standard => "m/s",
        }
    }
}

impl std::fmt::Display for Units {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for Units {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.to_lowercase().as_str() {
            "metric" | "c" | "celsius" => Ok(Units::Metric),
            "imperial" | "f" | "fahrenheit" => Ok(Units::Imperial),
            "standard" | "k" | "kelvin" => Ok(Units::Standard),
            _ => Err(anyhow::anyhow!(
                "Unknown unit system '{value}'. Supported: metric, imperial, standard."
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coord {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    #[serde(default)]
    pub id: u32,
    pub main: String,
    pub description: String,
    #[serde(default)]
    pub icon: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MainReadings {
    pub temp: f64,
    pub feels_like: f64,
    #[serde(default)]
    pub temp_min: f64,
    #[serde(default)]
    pub temp_max: f64,
    #[serde(default)]
    pub pressure: u32,
    pub humidity: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Wind {
    pub speed: f64,
    #[serde(default)]
    pub deg: f64,
    #[serde(default)]
    pub gust: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Clouds {
    #[serde(default)]
    pub all: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SysInfo {
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub sunrise: Option<i64>,
    #[serde(default)]
    pub sunset: Option<i64>,
}

/// `GET /data/2.5/weather`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentWeather {
    pub coord: Coord,
    pub weather: Vec<Condition>,
    pub main: MainReadings,
    #[serde(default)]
    pub visibility: Option<u32>,
    #[serde(default)]
    pub wind: Wind,
    #[serde(default)]
    pub clouds: Clouds,
    pub dt: i64,
    #[serde(default)]
    pub sys: SysInfo,
    /// Shift in seconds from UTC.
    #[serde(default)]
    pub timezone: i64,
    pub name: String,
}

impl CurrentWeather {
    pub fn condition(&self) -> Option<&Condition> {
        self.weather.first()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastEntry {
    pub dt: i64,
    pub main: MainReadings,
    pub weather: Vec<Condition>,
    #[serde(default)]
    pub wind: Wind,
    /// Probability of precipitation, 0..=1.
    #[serde(default)]
    pub pop: f64,
    #[serde(default)]
    pub dt_txt: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastCity {
    pub name: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub timezone: i64,
    #[serde(default)]
    pub coord: Option<Coord>,
}

/// `GET /data/2.5/forecast` (5 days, 3-hour steps)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    pub list: Vec<ForecastEntry>,
    pub city: ForecastCity,
}

/// Current conditions and forecast, fetched and cached together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherBundle {
    pub current: CurrentWeather,
    pub forecast: Forecast,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AqiMain {
    pub aqi: u8,
}

/// Pollutant concentrations in µg/m³.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Pollutants {
    #[serde(default)]
    pub co: f64,
    #[serde(default)]
    pub no: f64,
    #[serde(default)]
    pub no2: f64,
    #[serde(default)]
    pub o3: f64,
    #[serde(default)]
    pub so2: f64,
    #[serde(default)]
    pub pm2_5: f64,
    #[serde(default)]
    pub pm10: f64,
    #[serde(default)]
    pub nh3: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AirQualitySample {
    pub main: AqiMain,
    #[serde(default)]
    pub components: Pollutants,
    #[serde(default)]
    pub dt: i64,
}

/// `GET /data/2.5/air_pollution`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AirQuality {
    #[serde(default)]
    pub coord: Option<Coord>,
    pub list: Vec<AirQualitySample>,
}

impl AirQuality {
    pub fn latest(&self) -> Option<&AirQualitySample> {
        self.list.first()
    }
}

/// `GET /data/2.5/uvi`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UvIndex {
    pub lat: f64,
    pub lon: f64,
    #[serde(default)]
    pub date: i64,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub sender_name: String,
    pub event: String,
    pub start: i64,
    pub end: i64,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// The subset of the one-call response the alerts fetcher reads.
#[derive(Debug, Clone, Deserialize)]
pub struct OneCallAlerts {
    #[serde(default)]
    pub alerts: Vec<Alert>,
}

/// One candidate of `GET /geo/1.0/direct` or `/geo/1.0/reverse`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoPlace {
    pub name: String,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub country: String,
    pub lat: f64,
    pub lon: f64,
}

impl GeoPlace {
    /// `"Name, CC"`, or just the name when the country is missing.
    pub fn label(&self) -> String {
        if self.country.is_empty() {
            self.name.clone()
        } else {
            format!("{}, {}", self.name, self.country)
        }
    }

    /// `"Name, State, CC"` when a state is known, otherwise [`GeoPlace::label`].
    pub fn suggestion(&self) -> String {
        match self.state.as_deref().filter(|s| !s.is_empty()) {
            Some(state) if !self.country.is_empty() => {
                format!("{}, {state}, {}", self.name, self.country)
            }
            Some(state) => format!("{}, {state}", self.name),
            None => self.label(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn units_as_str_roundtrip() {
        for units in Units::all() {
            let parsed = Units::try_from(units.as_str()).expect("roundtrip should succeed");
            assert_eq!(*units, parsed);
        }
    }

    #[test]
    fn unknown_units_error() {
        let err = Units::try_from("furlongs").unwrap_err();
        assert!(err.to_string().contains("Unknown unit system"));
    }

    #[test]
    fn parses_current_weather_payload() {
        let body = serde_json::json!({
            "coord": { "lon": 2.3488, "lat": 48.8534 },
            "weather": [{ "id": 800, "main": "Clear", "description": "clear sky", "icon": "01d" }],
            "main": { "temp": 21.5, "feels_like": 21.0, "temp_min": 20.0, "temp_max": 23.0,
                      "pressure": 1015, "humidity": 48 },
            "visibility": 10000,
            "wind": { "speed": 3.6, "deg": 240 },
            "clouds": { "all": 0 },
            "dt": 1_700_000_000,
            "sys": { "country": "FR", "sunrise": 1_699_990_000, "sunset": 1_700_030_000 },
            "timezone": 3600,
            "name": "Paris"
        });

        let current: CurrentWeather = serde_json::from_value(body).expect("valid payload");
        assert_eq!(current.name, "Paris");
        assert_eq!(current.condition().map(|c| c.main.as_str()), Some("Clear"));
        assert_eq!(current.sys.country.as_deref(), Some("FR"));
        assert_eq!(current.wind.gust, None);
    }

    #[test]
    fn one_call_without_alerts_is_empty() {
        let parsed: OneCallAlerts =
            serde_json::from_str(r#"{"lat": 1.0, "lon": 2.0, "timezone": "UTC"}"#)
                .expect("valid payload");
        assert!(parsed.alerts.is_empty());
    }

    #[test]
    fn geo_place_label() {
        let place = GeoPlace {
            name: "Tokyo".into(),
            state: None,
            country: "JP".into(),
            lat: 35.68,
            lon: 139.76,
        };
        assert_eq!(place.label(), "Tokyo, JP");
        assert_eq!(place.suggestion(), "Tokyo, JP");
    }

    #[test]
    fn suggestion_includes_state() {
        let place = GeoPlace {
            name: "Portland".into(),
            state: Some("Oregon".into()),
            country: "US".into(),
            lat: 45.52,
            lon: -122.68,
        };
        assert_eq!(place.suggestion(), "Portland, Oregon, US");
        assert_eq!(place.label(), "Portland, US");
    }
}
