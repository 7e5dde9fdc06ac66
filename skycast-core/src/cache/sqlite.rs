use async_trait::async_trait;
use sqlx::SqlitePool;
use tracing::debug;

use crate::{
    error::CacheError,
    model::{CanonicalWeather, CurrentConditions, LocationInfo, WeatherCategory},
    provider::ProviderId,
};

use super::CacheStore;

/// Cache rows in the `weather_cache` table. Scalar fields are flattened into columns; the
/// hourly and daily series are stored as JSON text.
#[derive(Debug, Clone)]
pub struct SqliteCacheStore {
    pool: SqlitePool,
}

impl SqliteCacheStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CacheRow {
    latitude: f64,
    longitude: f64,
    city_name: String,
    country: String,
    is_current_location: bool,
    temperature: i32,
    condition_text: String,
    condition_code: i32,
    high_temp: i32,
    low_temp: i32,
    feels_like: i32,
    humidity: i32,
    wind_speed_kmh: f64,
    icon: String,
    category: String,
    description: String,
    visibility_km: Option<f64>,
    uv_index: Option<i32>,
    pressure: Option<f64>,
    hourly_json: String,
    daily_json: String,
    provider: String,
    last_updated: i64,
}

impl TryFrom<CacheRow> for CanonicalWeather {
    type Error = CacheError;

    fn try_from(row: CacheRow) -> Result<Self, Self::Error> {
        let category: WeatherCategory = row.category.parse().map_err(CacheError::Corrupted)?;
        let provider = ProviderId::try_from(row.provider.as_str())
            .map_err(|e| CacheError::Corrupted(e.to_string()))?;
        let hourly = serde_json::from_str(&row.hourly_json)
            .map_err(|e| CacheError::Corrupted(format!("hourly: {e}")))?;
        let daily = serde_json::from_str(&row.daily_json)
            .map_err(|e| CacheError::Corrupted(format!("daily: {e}")))?;

        Ok(CanonicalWeather {
            location: LocationInfo {
                latitude: row.latitude,
                longitude: row.longitude,
                city_name: row.city_name,
                country: row.country,
                is_current_location: row.is_current_location,
            },
            current: CurrentConditions {
                temperature: row.temperature,
                condition_text: row.condition_text,
                condition_code: row.condition_code,
                high_temp: row.high_temp,
                low_temp: row.low_temp,
                feels_like: row.feels_like,
                humidity: row.humidity,
                wind_speed_kmh: row.wind_speed_kmh,
                icon: row.icon,
                category,
                description: row.description,
                visibility_km: row.visibility_km,
                uv_index: row.uv_index,
                pressure: row.pressure,
            },
            hourly,
            daily,
            last_updated_epoch_ms: row.last_updated,
            provider,
        })
    }
}

#[async_trait]
impl CacheStore for SqliteCacheStore {
    async fn get(&self, key: &str) -> Result<Option<CanonicalWeather>, CacheError> {
        let row = sqlx::query_as::<_, CacheRow>("SELECT * FROM weather_cache WHERE cache_key = $1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        row.map(CanonicalWeather::try_from).transpose()
    }

    async fn upsert(&self, key: &str, weather: &CanonicalWeather) -> Result<(), CacheError> {
        let hourly_json = serde_json::to_string(&weather.hourly)
            .map_err(|e| CacheError::Storage(e.to_string()))?;
        let daily_json = serde_json::to_string(&weather.daily)
            .map_err(|e| CacheError::Storage(e.to_string()))?;
        let loc = &weather.location;
        let cur = &weather.current;

        sqlx::query(
            r#"
            INSERT OR REPLACE INTO weather_cache (
                cache_key, latitude, longitude, city_name, country, is_current_location,
                temperature, condition_text, condition_code, high_temp, low_temp, feels_like,
                humidity, wind_speed_kmh, icon, category, description, visibility_km, uv_index,
                pressure, hourly_json, daily_json, provider, last_updated
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12,
                    $13, $14, $15, $16, $17, $18, $19, $20, $21, $22, $23, $24)
            "#,
        )
        .bind(key)
        .bind(loc.latitude)
        .bind(loc.longitude)
        .bind(&loc.city_name)
        .bind(&loc.country)
        .bind(loc.is_current_location)
        .bind(cur.temperature)
        .bind(&cur.condition_text)
        .bind(cur.condition_code)
        .bind(cur.high_temp)
        .bind(cur.low_temp)
        .bind(cur.feels_like)
        .bind(cur.humidity)
        .bind(cur.wind_speed_kmh)
        .bind(&cur.icon)
        .bind(cur.category.as_str())
        .bind(&cur.description)
        .bind(cur.visibility_km)
        .bind(cur.uv_index)
        .bind(cur.pressure)
        .bind(hourly_json)
        .bind(daily_json)
        .bind(weather.provider.as_str())
        .bind(weather.last_updated_epoch_ms)
        .execute(&self.pool)
        .await?;

        debug!(key, "cache entry written");
        Ok(())
    }

    async fn delete_older_than(&self, cutoff_epoch_ms: i64) -> Result<u64, CacheError> {
        let result = sqlx::query("DELETE FROM weather_cache WHERE last_updated < $1")
            .bind(cutoff_epoch_ms)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn clear(&self) -> Result<(), CacheError> {
        sqlx::query("DELETE FROM weather_cache").execute(&self.pool).await?;
        Ok(())
    }
}
