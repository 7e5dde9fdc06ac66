use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Timelike, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::{collections::BTreeMap, time::Duration};
use tracing::instrument;

use crate::{
    condition::{self, TimeOfDay},
    error::{ApiError, WeatherError},
    model::{
        CanonicalWeather, Coordinates, CurrentConditions, DailyForecast, HourlyForecast,
        LocationInfo, MAX_DAILY, MAX_HOURLY,
    },
    normalize::{
        cap_series, day_label, epoch_secs_to_local, hourly_label, ms_to_kmh, offset_from_secs,
        parse_local_datetime, truncate_temp,
    },
};

use super::{ProviderId, WeatherProvider, get_json, http_client};

const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org/data/2.5";

/// OpenWeatherMap: last-resort fallback, requires an API key.
#[derive(Debug, Clone)]
pub struct OpenWeatherProvider {
    api_key: String,
    base_url: String,
    http: Client,
}

impl OpenWeatherProvider {
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

    async fn get<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &str,
        coords: Coordinates,
    ) -> Result<T, WeatherError> {
        let url = format!("{}/{endpoint}", self.base_url);
        let request = self.http.get(url).query(&[
            ("lat", coords.latitude.to_string().as_str()),
            ("lon", coords.longitude.to_string().as_str()),
            ("appid", self.api_key.as_str()),
            ("units", "metric"),
        ]);

        get_json(request, &format!("OpenWeather {endpoint}")).await
    }
}

#[derive(Debug, Clone, Deserialize)]
struct OwMain {
    temp: f64,
    feels_like: f64,
    temp_min: f64,
    temp_max: f64,
    pressure: Option<f64>,
    humidity: f64,
}

#[derive(Debug, Clone, Deserialize)]
struct OwWeather {
    id: i32,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct OwWind {
    /// Metres per second with `units=metric`.
    #[serde(default)]
    speed: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct OwSys {
    #[serde(default)]
    country: String,
}

#[derive(Debug, Clone, Deserialize)]
struct OwCurrentResponse {
    #[serde(default)]
    name: String,
    dt: i64,
    /// Shift from UTC in seconds.
    #[serde(default)]
    timezone: i32,
    main: OwMain,
    #[serde(default)]
    weather: Vec<OwWeather>,
    #[serde(default)]
    wind: OwWind,
    /// Metres.
    visibility: Option<f64>,
    #[serde(default)]
    sys: OwSys,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct OwCity {
    #[serde(default)]
    name: String,
    #[serde(default)]
    country: String,
    #[serde(default)]
    timezone: i32,
}

#[derive(Debug, Clone, Deserialize)]
struct OwForecastEntry {
    dt: i64,
    main: OwMain,
    #[serde(default)]
    weather: Vec<OwWeather>,
    #[serde(default)]
    wind: OwWind,
    /// UTC, `2024-01-15 12:00:00`.
    #[serde(default)]
    dt_txt: String,
}

#[derive(Debug, Clone, Deserialize)]
struct OwForecastResponse {
    #[serde(default)]
    city: OwCity,
    #[serde(default)]
    list: Vec<OwForecastEntry>,
}

/// The two OpenWeather endpoints fetched together.
#[derive(Debug, Clone)]
pub struct OwBundle {
    current: OwCurrentResponse,
    forecast: OwForecastResponse,
}

fn code_of(weather: &[OwWeather]) -> i32 {
    weather.first().map_or(-1, |w| w.id)
}

impl OwForecastEntry {
    fn local_date(&self, offset: FixedOffset) -> Option<String> {
        epoch_secs_to_local(self.dt, offset)
            .or_else(|| parse_local_datetime(&self.dt_txt))
            .map(|t| t.format("%Y-%m-%d").to_string())
    }
}

fn hourly_series(forecast: &OwForecastResponse, offset: FixedOffset, fetched_at: DateTime<Utc>) -> Vec<HourlyForecast> {
    let mut entries: Vec<&OwForecastEntry> = forecast.list.iter().collect();
    entries.sort_by_key(|e| e.dt);

    entries
        .into_iter()
        .take(MAX_HOURLY)
        .enumerate()
        .map(|(n, e)| {
            let code = code_of(&e.weather);
            let timestamp_ms = DateTime::<Utc>::from_timestamp(e.dt, 0)
                .map_or_else(|| fetched_at.timestamp_millis(), |t| t.timestamp_millis());
            HourlyForecast {
                time_label: hourly_label(n, epoch_secs_to_local(e.dt, offset)),
                temperature: truncate_temp(e.main.temp),
                condition_code: code,
                icon: condition::open_weather(code).icon.to_string(),
                humidity: truncate_temp(e.main.humidity),
                wind_speed_kmh: ms_to_kmh(e.wind.speed),
                timestamp_ms,
            }
        })
        .collect()
}

/// Groups the 3-hourly list by local calendar date. The first item of a group supplies the
/// condition, humidity and wind; high/low are the group's extremes.
fn daily_series(forecast: &OwForecastResponse, offset: FixedOffset) -> Vec<DailyForecast> {
    let mut groups: BTreeMap<String, Vec<&OwForecastEntry>> = BTreeMap::new();
    for entry in &forecast.list {
        if let Some(date) = entry.local_date(offset) {
            groups.entry(date).or_default().push(entry);
        }
    }

    groups
        .into_iter()
        .take(MAX_DAILY)
        .enumerate()
        .filter_map(|(i, (date, items))| {
            let first = items.iter().min_by_key(|e| e.dt)?;
            let high = items.iter().map(|e| e.main.temp_max).fold(f64::MIN, f64::max);
            let low = items.iter().map(|e| e.main.temp_min).fold(f64::MAX, f64::min);
            let code = code_of(&first.weather);
            let cond = condition::open_weather(code);

            Some(DailyForecast {
                day_name: day_label(i, &date),
                date,
                high_temp: truncate_temp(high),
                low_temp: truncate_temp(low),
                condition_code: code,
                icon: cond.icon.to_string(),
                condition_text: cond.text.to_string(),
                humidity: Some(truncate_temp(first.main.humidity)),
                wind_speed_kmh: Some(ms_to_kmh(first.wind.speed)),
            })
        })
        .collect()
}

#[async_trait]
impl WeatherProvider for OpenWeatherProvider {
    type Raw = OwBundle;

    fn id(&self) -> ProviderId {
        ProviderId::OpenWeather
    }

    fn is_configured(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    #[instrument(skip(self), fields(provider = "openweather"))]
    async fn fetch(&self, coords: Coordinates) -> Result<OwBundle, WeatherError> {
        if !WeatherProvider::is_configured(self) {
            return Err(ApiError::NotConfigured(ProviderId::OpenWeather).into());
        }

        let (current, forecast) =
            tokio::try_join!(self.get("weather", coords), self.get("forecast", coords))?;

        Ok(OwBundle { current, forecast })
    }

    fn normalize(
        &self,
        raw: &OwBundle,
        coords: Coordinates,
        fetched_at: DateTime<Utc>,
    ) -> CanonicalWeather {
        let c = &raw.current;
        let tz = if c.timezone != 0 { c.timezone } else { raw.forecast.city.timezone };
        let offset = offset_from_secs(tz);

        let mut hourly = hourly_series(&raw.forecast, offset, fetched_at);
        let mut daily = daily_series(&raw.forecast, offset);
        cap_series(&mut hourly, &mut daily);

        let local_hour = epoch_secs_to_local(c.dt, offset)
            .map_or_else(|| fetched_at.with_timezone(&offset).hour(), |t| t.hour());

        let code = code_of(&c.weather);
        let cond = condition::open_weather(code);
        let temperature = truncate_temp(c.main.temp);
        let wind_speed_kmh = ms_to_kmh(c.wind.speed);

        let today = epoch_secs_to_local(c.dt, offset).map(|t| t.format("%Y-%m-%d").to_string());
        let today_forecast = daily.first().filter(|d| Some(&d.date) == today.as_ref());

        let city_name = if c.name.is_empty() { raw.forecast.city.name.clone() } else { c.name.clone() };
        let country = if c.sys.country.is_empty() {
            raw.forecast.city.country.clone()
        } else {
            c.sys.country.clone()
        };

        CanonicalWeather {
            location: LocationInfo {
                latitude: coords.latitude,
                longitude: coords.longitude,
                city_name,
                country,
                is_current_location: false,
            },
            current: CurrentConditions {
                temperature,
                condition_text: cond.text.to_string(),
                condition_code: code,
                high_temp: today_forecast
                    .map_or(truncate_temp(c.main.temp_max), |d| d.high_temp.max(temperature)),
                low_temp: today_forecast
                    .map_or(truncate_temp(c.main.temp_min), |d| d.low_temp.min(temperature)),
                feels_like: truncate_temp(c.main.feels_like),
                humidity: truncate_temp(c.main.humidity),
                wind_speed_kmh,
                icon: cond.icon.to_string(),
                category: cond.category,
                description: condition::describe(
                    cond.category,
                    temperature,
                    wind_speed_kmh,
                    TimeOfDay::from_hour(local_hour),
                ),
                visibility_km: c.visibility.map(|m| m / 1000.0),
                uv_index: None,
                pressure: c.main.pressure,
            },
            hourly,
            daily,
            last_updated_epoch_ms: fetched_at.timestamp_millis(),
            provider: ProviderId::OpenWeather,
        }
    }
}
