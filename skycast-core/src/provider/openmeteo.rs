use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDateTime, Timelike, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::instrument;

use crate::{
    condition::{self, TimeOfDay},
    error::WeatherError,
    model::{
        CanonicalWeather, Coordinates, CurrentConditions, DailyForecast, HourlyForecast,
        LocationInfo, MAX_DAILY, MAX_HOURLY,
    },
    normalize::{
        cap_series, day_label, first_index_from, hourly_label, local_to_epoch_ms,
        offset_from_secs, parse_local_datetime, truncate_temp, truncate_to_hour,
    },
};

use super::{ProviderId, WeatherProvider, get_json, http_client};

const DEFAULT_BASE_URL: &str = "https://api.open-meteo.com/v1";

const CURRENT_FIELDS: &str = "temperature_2m,relative_humidity_2m,apparent_temperature,\
    weather_code,wind_speed_10m,surface_pressure,visibility,uv_index,is_day";
const HOURLY_FIELDS: &str = "temperature_2m,weather_code,relative_humidity_2m,wind_speed_10m";
const DAILY_FIELDS: &str = "weather_code,temperature_2m_max,temperature_2m_min,\
    relative_humidity_2m_mean,wind_speed_10m_max";

/// Open-Meteo: free, no API key.
#[derive(Debug, Clone)]
pub struct OpenMeteoProvider {
    base_url: String,
    http: Client,
}

impl OpenMeteoProvider {
    pub fn new(timeout: Duration) -> Result<Self, WeatherError> {
        Ok(Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            http: http_client(timeout)?,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OmResponse {
    #[serde(default)]
    utc_offset_seconds: i32,
    current: Option<OmCurrent>,
    #[serde(default)]
    hourly: OmHourly,
    #[serde(default)]
    daily: OmDaily,
}

#[derive(Debug, Clone, Deserialize)]
struct OmCurrent {
    time: String,
    temperature_2m: f64,
    relative_humidity_2m: f64,
    apparent_temperature: f64,
    weather_code: i32,
    wind_speed_10m: f64,
    surface_pressure: Option<f64>,
    /// Metres.
    visibility: Option<f64>,
    uv_index: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct OmHourly {
    #[serde(default)]
    time: Vec<String>,
    #[serde(default)]
    temperature_2m: Vec<Option<f64>>,
    #[serde(default)]
    weather_code: Vec<Option<i32>>,
    #[serde(default)]
    relative_humidity_2m: Vec<Option<f64>>,
    #[serde(default)]
    wind_speed_10m: Vec<Option<f64>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct OmDaily {
    #[serde(default)]
    time: Vec<String>,
    #[serde(default)]
    weather_code: Vec<Option<i32>>,
    #[serde(default)]
    temperature_2m_max: Vec<Option<f64>>,
    #[serde(default)]
    temperature_2m_min: Vec<Option<f64>>,
    #[serde(default)]
    relative_humidity_2m_mean: Vec<Option<f64>>,
    #[serde(default)]
    wind_speed_10m_max: Vec<Option<f64>>,
}

fn at<T: Copy>(values: &[Option<T>], i: usize) -> Option<T> {
    values.get(i).copied().flatten()
}

fn hourly_series(
    hourly: &OmHourly,
    now_local: Option<NaiveDateTime>,
    offset: FixedOffset,
    fetched_at: DateTime<Utc>,
) -> Vec<HourlyForecast> {
    let start = first_index_from(&hourly.time, now_local.map(truncate_to_hour), |t| {
        parse_local_datetime(t)
    });

    hourly
        .time
        .iter()
        .enumerate()
        .skip(start)
        .take(MAX_HOURLY)
        .enumerate()
        .map(|(n, (i, time))| {
            let local = parse_local_datetime(time);
            let code = at(&hourly.weather_code, i).unwrap_or(-1);
            HourlyForecast {
                time_label: hourly_label(n, local),
                temperature: truncate_temp(at(&hourly.temperature_2m, i).unwrap_or_default()),
                condition_code: code,
                icon: condition::open_meteo(code).icon.to_string(),
                humidity: truncate_temp(at(&hourly.relative_humidity_2m, i).unwrap_or_default()),
                wind_speed_kmh: at(&hourly.wind_speed_10m, i).unwrap_or_default(),
                timestamp_ms: local
                    .and_then(|l| local_to_epoch_ms(l, offset))
                    .unwrap_or_else(|| fetched_at.timestamp_millis()),
            }
        })
        .collect()
}

fn daily_series(daily: &OmDaily) -> Vec<DailyForecast> {
    daily
        .time
        .iter()
        .take(MAX_DAILY)
        .enumerate()
        .map(|(i, date)| {
            let code = at(&daily.weather_code, i).unwrap_or(-1);
            let cond = condition::open_meteo(code);
            DailyForecast {
                date: date.clone(),
                day_name: day_label(i, date),
                high_temp: truncate_temp(at(&daily.temperature_2m_max, i).unwrap_or_default()),
                low_temp: truncate_temp(at(&daily.temperature_2m_min, i).unwrap_or_default()),
                condition_code: code,
                icon: cond.icon.to_string(),
                condition_text: cond.text.to_string(),
                humidity: at(&daily.relative_humidity_2m_mean, i).map(truncate_temp),
                wind_speed_kmh: at(&daily.wind_speed_10m_max, i),
            }
        })
        .collect()
}

#[async_trait]
impl WeatherProvider for OpenMeteoProvider {
    type Raw = OmResponse;

    fn id(&self) -> ProviderId {
        ProviderId::OpenMeteo
    }

    #[instrument(skip(self), fields(provider = "openmeteo"))]
    async fn fetch(&self, coords: Coordinates) -> Result<OmResponse, WeatherError> {
        let url = format!("{}/forecast", self.base_url);
        let request = self.http.get(url).query(&[
            ("latitude", coords.latitude.to_string().as_str()),
            ("longitude", coords.longitude.to_string().as_str()),
            ("current", CURRENT_FIELDS),
            ("hourly", HOURLY_FIELDS),
            ("daily", DAILY_FIELDS),
            ("forecast_days", "10"),
            ("timezone", "auto"),
            ("temperature_unit", "celsius"),
            ("wind_speed_unit", "kmh"),
        ]);

        get_json(request, "Open-Meteo forecast").await
    }

    fn normalize(
        &self,
        raw: &OmResponse,
        coords: Coordinates,
        fetched_at: DateTime<Utc>,
    ) -> CanonicalWeather {
        let offset = offset_from_secs(raw.utc_offset_seconds);
        let now_local = raw.current.as_ref().and_then(|c| parse_local_datetime(&c.time));
        let local_hour = now_local
            .map(|t| t.hour())
            .unwrap_or_else(|| fetched_at.with_timezone(&offset).hour());

        let mut hourly = hourly_series(&raw.hourly, now_local, offset, fetched_at);
        let mut daily = daily_series(&raw.daily);
        cap_series(&mut hourly, &mut daily);

        let current = match &raw.current {
            Some(c) => {
                let cond = condition::open_meteo(c.weather_code);
                let temperature = truncate_temp(c.temperature_2m);
                CurrentConditions {
                    temperature,
                    condition_text: cond.text.to_string(),
                    condition_code: c.weather_code,
                    high_temp: daily.first().map_or(temperature, |d| d.high_temp),
                    low_temp: daily.first().map_or(temperature, |d| d.low_temp),
                    feels_like: truncate_temp(c.apparent_temperature),
                    humidity: truncate_temp(c.relative_humidity_2m),
                    wind_speed_kmh: c.wind_speed_10m,
                    icon: cond.icon.to_string(),
                    category: cond.category,
                    description: condition::describe(
                        cond.category,
                        temperature,
                        c.wind_speed_10m,
                        TimeOfDay::from_hour(local_hour),
                    ),
                    visibility_km: c.visibility.map(|m| m / 1000.0),
                    uv_index: c.uv_index.map(truncate_temp),
                    pressure: c.surface_pressure,
                }
            }
            None => current_from_series(&hourly, &daily, local_hour),
        };

        CanonicalWeather {
            location: LocationInfo {
                latitude: coords.latitude,
                longitude: coords.longitude,
                city_name: String::new(),
                country: String::new(),
                is_current_location: false,
            },
            current,
            hourly,
            daily,
            last_updated_epoch_ms: fetched_at.timestamp_millis(),
            provider: ProviderId::OpenMeteo,
        }
    }
}

/// Best effort when the response carries no `current` block.
fn current_from_series(
    hourly: &[HourlyForecast],
    daily: &[DailyForecast],
    local_hour: u32,
) -> CurrentConditions {
    let code = hourly.first().map_or(-1, |h| h.condition_code);
    let cond = condition::open_meteo(code);
    let temperature = hourly.first().map_or(0, |h| h.temperature);
    let wind = hourly.first().map_or(0.0, |h| h.wind_speed_kmh);

    CurrentConditions {
        temperature,
        condition_text: cond.text.to_string(),
        condition_code: code,
        high_temp: daily.first().map_or(temperature, |d| d.high_temp),
        low_temp: daily.first().map_or(temperature, |d| d.low_temp),
        feels_like: temperature,
        humidity: hourly.first().map_or(0, |h| h.humidity),
        wind_speed_kmh: wind,
        icon: cond.icon.to_string(),
        category: cond.category,
        description: condition::describe(cond.category, temperature, wind, TimeOfDay::from_hour(local_hour)),
        visibility_km: None,
        uv_index: None,
        pressure: None,
    }
}
