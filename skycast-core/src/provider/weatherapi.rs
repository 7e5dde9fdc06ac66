use async_trait::async_trait;
use chrono::{DateTime, Timelike, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::instrument;

use crate::{
    condition::{self, TimeOfDay},
    error::{ApiError, WeatherError},
    model::{
        CanonicalWeather, Coordinates, CurrentConditions, DailyForecast, HourlyForecast,
        LocationInfo, MAX_DAILY, MAX_HOURLY,
    },
    normalize::{
        cap_series, day_label, first_index_from, hourly_label, parse_local_datetime,
        truncate_temp, truncate_to_hour,
    },
};

use super::{ProviderId, WeatherProvider, get_json, http_client};

const DEFAULT_BASE_URL: &str = "https://api.weatherapi.com/v1";

/// WeatherAPI.com: limited free tier, requires an API key.
#[derive(Debug, Clone)]
pub struct WeatherApiProvider {
    api_key: String,
    base_url: String,
    http: Client,
}

impl WeatherApiProvider {
    pub fn new(api_key: String, timeout: Duration) -> Result<Self, WeatherError> {
        Ok(Self {
            api_key,
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
struct WaCondition {
    code: i32,
}

#[derive(Debug, Clone, Deserialize)]
struct WaLocation {
    #[serde(default)]
    name: String,
    #[serde(default)]
    country: String,
    /// Local wall-clock time, `2024-01-15 13:45`.
    localtime: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct WaCurrent {
    temp_c: f64,
    feelslike_c: f64,
    humidity: f64,
    wind_kph: f64,
    pressure_mb: Option<f64>,
    vis_km: Option<f64>,
    uv: Option<f64>,
    condition: WaCondition,
}

#[derive(Debug, Clone, Deserialize)]
struct WaHour {
    time_epoch: Option<i64>,
    #[serde(default)]
    time: String,
    temp_c: f64,
    humidity: f64,
    wind_kph: f64,
    condition: WaCondition,
}

#[derive(Debug, Clone, Deserialize)]
struct WaDay {
    maxtemp_c: f64,
    mintemp_c: f64,
    avghumidity: Option<f64>,
    maxwind_kph: Option<f64>,
    condition: WaCondition,
}

#[derive(Debug, Clone, Deserialize)]
struct WaForecastDay {
    date: String,
    day: WaDay,
    #[serde(default)]
    hour: Vec<WaHour>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct WaForecast {
    #[serde(default)]
    forecastday: Vec<WaForecastDay>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WaResponse {
    location: WaLocation,
    current: WaCurrent,
    #[serde(default)]
    forecast: WaForecast,
}

impl WaResponse {
    fn local_now(&self) -> Option<chrono::NaiveDateTime> {
        self.location.localtime.as_deref().and_then(parse_local_datetime)
    }
}

fn hourly_series(raw: &WaResponse, fetched_at: DateTime<Utc>) -> Vec<HourlyForecast> {
    let hours: Vec<&WaHour> = raw.forecast.forecastday.iter().flat_map(|d| d.hour.iter()).collect();
    let start = first_index_from(&hours, raw.local_now().map(truncate_to_hour), |h| {
        parse_local_datetime(&h.time)
    });

    hours
        .iter()
        .skip(start)
        .take(MAX_HOURLY)
        .enumerate()
        .map(|(n, h)| {
            let local = parse_local_datetime(&h.time);
            HourlyForecast {
                time_label: hourly_label(n, local),
                temperature: truncate_temp(h.temp_c),
                condition_code: h.condition.code,
                icon: condition::weather_api(h.condition.code).icon.to_string(),
                humidity: truncate_temp(h.humidity),
                wind_speed_kmh: h.wind_kph,
                timestamp_ms: h
                    .time_epoch
                    .map(|s| s * 1000)
                    .unwrap_or_else(|| fetched_at.timestamp_millis()),
            }
        })
        .collect()
}

fn daily_series(raw: &WaResponse) -> Vec<DailyForecast> {
    raw.forecast
        .forecastday
        .iter()
        .take(MAX_DAILY)
        .enumerate()
        .map(|(i, fd)| {
            let cond = condition::weather_api(fd.day.condition.code);
            DailyForecast {
                date: fd.date.clone(),
                day_name: day_label(i, &fd.date),
                high_temp: truncate_temp(fd.day.maxtemp_c),
                low_temp: truncate_temp(fd.day.mintemp_c),
                condition_code: fd.day.condition.code,
                icon: cond.icon.to_string(),
                condition_text: cond.text.to_string(),
                humidity: fd.day.avghumidity.map(truncate_temp),
                wind_speed_kmh: fd.day.maxwind_kph,
            }
        })
        .collect()
}

#[async_trait]
impl WeatherProvider for WeatherApiProvider {
    type Raw = WaResponse;

    fn id(&self) -> ProviderId {
        ProviderId::WeatherApi
    }

    fn is_configured(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    #[instrument(skip(self), fields(provider = "weatherapi"))]
    async fn fetch(&self, coords: Coordinates) -> Result<WaResponse, WeatherError> {
        if !WeatherProvider::is_configured(self) {
            return Err(ApiError::NotConfigured(ProviderId::WeatherApi).into());
        }

        let url = format!("{}/forecast.json", self.base_url);
        let q = format!("{},{}", coords.latitude, coords.longitude);
        let request = self.http.get(url).query(&[
            ("key", self.api_key.as_str()),
            ("q", q.as_str()),
            ("days", "10"),
            ("aqi", "yes"),
            ("alerts", "yes"),
        ]);

        get_json(request, "WeatherAPI forecast").await
    }

    fn normalize(
        &self,
        raw: &WaResponse,
        coords: Coordinates,
        fetched_at: DateTime<Utc>,
    ) -> CanonicalWeather {
        let mut hourly = hourly_series(raw, fetched_at);
        let mut daily = daily_series(raw);
        cap_series(&mut hourly, &mut daily);

        // No UTC offset in the payload, so only the local wall clock is trusted.
        let local_hour = raw
            .local_now()
            .map_or_else(|| fetched_at.hour(), |t| t.hour());

        let c = &raw.current;
        let cond = condition::weather_api(c.condition.code);
        let temperature = truncate_temp(c.temp_c);

        CanonicalWeather {
            location: LocationInfo {
                latitude: coords.latitude,
                longitude: coords.longitude,
                city_name: raw.location.name.clone(),
                country: raw.location.country.clone(),
                is_current_location: false,
            },
            current: CurrentConditions {
                temperature,
                condition_text: cond.text.to_string(),
                condition_code: c.condition.code,
                high_temp: daily.first().map_or(temperature, |d| d.high_temp),
                low_temp: daily.first().map_or(temperature, |d| d.low_temp),
                feels_like: truncate_temp(c.feelslike_c),
                humidity: truncate_temp(c.humidity),
                wind_speed_kmh: c.wind_kph,
                icon: cond.icon.to_string(),
                category: cond.category,
                description: condition::describe(
                    cond.category,
                    temperature,
                    c.wind_kph,
                    TimeOfDay::from_hour(local_hour),
                ),
                visibility_km: c.vis_km,
                uv_index: c.uv.map(truncate_temp),
                pressure: c.pressure_mb,
            },
            hourly,
            daily,
            last_updated_epoch_ms: fetched_at.timestamp_millis(),
            provider: ProviderId::WeatherApi,
        }
    }
}
