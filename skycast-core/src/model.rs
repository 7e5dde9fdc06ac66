use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::provider::ProviderId;

pub const MAX_HOURLY: usize = 24;
pub const MAX_DAILY: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Cache key for these coordinates. Values are not snapped to a grid, so
    /// `37.3382` and `37.33820001` produce different keys.
    pub fn cache_key(&self) -> String {
        format!("{}_{}", self.latitude, self.longitude)
    }

    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.latitude) && (-180.0..=180.0).contains(&self.longitude)
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4}, {:.4}", self.latitude, self.longitude)
    }
}

/// Coarse weather category driving icon selection and theming.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WeatherCategory {
    Sunny,
    #[default]
    Cloudy,
    Rainy,
    Snow,
    Stormy,
    Foggy,
}

impl WeatherCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            WeatherCategory::Sunny => "SUNNY",
            WeatherCategory::Cloudy => "CLOUDY",
            WeatherCategory::Rainy => "RAINY",
            WeatherCategory::Snow => "SNOW",
            WeatherCategory::Stormy => "STORMY",
            WeatherCategory::Foggy => "FOGGY",
        }
    }
}

impl fmt::Display for WeatherCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WeatherCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "SUNNY" => Ok(WeatherCategory::Sunny),
            "CLOUDY" => Ok(WeatherCategory::Cloudy),
            "RAINY" => Ok(WeatherCategory::Rainy),
            "SNOW" => Ok(WeatherCategory::Snow),
            "STORMY" => Ok(WeatherCategory::Stormy),
            "FOGGY" => Ok(WeatherCategory::Foggy),
            other => Err(format!("unknown weather category '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationInfo {
    pub latitude: f64,
    pub longitude: f64,
    pub city_name: String,
    pub country: String,
    pub is_current_location: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentConditions {
    pub temperature: i32,
    pub condition_text: String,
    pub condition_code: i32,
    pub high_temp: i32,
    pub low_temp: i32,
    pub feels_like: i32,
    /// Relative humidity in percent.
    pub humidity: i32,
    pub wind_speed_kmh: f64,
    pub icon: String,
    pub category: WeatherCategory,
    pub description: String,
    pub visibility_km: Option<f64>,
    pub uv_index: Option<i32>,
    /// Surface pressure in hPa.
    pub pressure: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlyForecast {
    /// "Now" for the first entry, otherwise e.g. "1PM".
    pub time_label: String,
    pub temperature: i32,
    pub condition_code: i32,
    pub icon: String,
    pub humidity: i32,
    pub wind_speed_kmh: f64,
    pub timestamp_ms: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyForecast {
    /// ISO calendar date, `YYYY-MM-DD`.
    pub date: String,
    /// "Today", a weekday abbreviation, or "Day N".
    pub day_name: String,
    pub high_temp: i32,
    pub low_temp: i32,
    pub condition_code: i32,
    pub icon: String,
    pub condition_text: String,
    pub humidity: Option<i32>,
    pub wind_speed_kmh: Option<f64>,
}

/// The single normalized representation every provider maps into.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalWeather {
    pub location: LocationInfo,
    pub current: CurrentConditions,
    pub hourly: Vec<HourlyForecast>,
    pub daily: Vec<DailyForecast>,
    pub last_updated_epoch_ms: i64,
    pub provider: ProviderId,
}

impl CanonicalWeather {
    pub fn coordinates(&self) -> Coordinates {
        Coordinates::new(self.location.latitude, self.location.longitude)
    }
}

/// A place the user keeps in their list, persisted independently of the weather cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedLocation {
    pub id: i64,
    pub latitude: f64,
    pub longitude: f64,
    pub city_name: String,
    pub country: String,
    pub is_current_location: bool,
    pub order: i32,
}

impl SavedLocation {
    pub fn coordinates(&self) -> Coordinates {
        Coordinates::new(self.latitude, self.longitude)
    }

    pub fn display_name(&self) -> String {
        if self.country.is_empty() {
            self.city_name.clone()
        } else {
            format!("{}, {}", self.city_name, self.country)
        }
    }
}

/// A geocoding match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    pub latitude: f64,
    pub longitude: f64,
    pub city_name: String,
    pub country: String,
}
