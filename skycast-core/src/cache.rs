//! Local weather cache: one snapshot per coordinate key, replaced wholesale on every write.

use async_trait::async_trait;
use std::{collections::HashMap, fmt::Debug, sync::Arc};
use tokio::sync::RwLock;

use crate::{error::CacheError, model::CanonicalWeather};

pub mod sqlite;

pub use sqlite::SqliteCacheStore;

#[async_trait]
pub trait CacheStore: Send + Sync + Debug {
    async fn get(&self, key: &str) -> Result<Option<CanonicalWeather>, CacheError>;

    /// Replace-on-conflict: the previous snapshot for `key` is discarded entirely.
    async fn upsert(&self, key: &str, weather: &CanonicalWeather) -> Result<(), CacheError>;

    /// Delete entries whose `last_updated_epoch_ms` is before `cutoff_epoch_ms`.
    /// Returns the number of removed entries.
    async fn delete_older_than(&self, cutoff_epoch_ms: i64) -> Result<u64, CacheError>;

    async fn clear(&self) -> Result<(), CacheError>;
}

/// In-process cache, used for tests and when no database path is available.
#[derive(Debug, Clone, Default)]
pub struct MemoryCacheStore {
    entries: Arc<RwLock<HashMap<String, CanonicalWeather>>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, key: &str) -> Result<Option<CanonicalWeather>, CacheError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn upsert(&self, key: &str, weather: &CanonicalWeather) -> Result<(), CacheError> {
        self.entries.write().await.insert(key.to_string(), weather.clone());
        Ok(())
    }

    async fn delete_older_than(&self, cutoff_epoch_ms: i64) -> Result<u64, CacheError> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, w| w.last_updated_epoch_ms >= cutoff_epoch_ms);
        Ok((before - entries.len()) as u64)
    }

    async fn clear(&self) -> Result<(), CacheError> {
        self.entries.write().await.clear();
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::{
        model::{
            CanonicalWeather, CurrentConditions, DailyForecast, HourlyForecast, LocationInfo,
            WeatherCategory,
        },
        provider::ProviderId,
    };

    /// A small but fully populated snapshot.
    pub fn snapshot(latitude: f64, longitude: f64, last_updated_epoch_ms: i64) -> CanonicalWeather {
        CanonicalWeather {
            location: LocationInfo {
                latitude,
                longitude,
                city_name: "San Jose".to_string(),
                country: "US".to_string(),
                is_current_location: true,
            },
            current: CurrentConditions {
                temperature: 18,
                condition_text: "Clear sky".to_string(),
                condition_code: 0,
                high_temp: 21,
                low_temp: 9,
                feels_like: 17,
                humidity: 40,
                wind_speed_kmh: 3.2,
                icon: "☀️".to_string(),
                category: WeatherCategory::Sunny,
                description: "Sunny conditions this afternoon with temperatures around 18°C."
                    .to_string(),
                visibility_km: Some(24.0),
                uv_index: None,
                pressure: Some(1016.4),
            },
            hourly: vec![HourlyForecast {
                time_label: "Now".to_string(),
                temperature: 18,
                condition_code: 0,
                icon: "☀️".to_string(),
                humidity: 40,
                wind_speed_kmh: 3.2,
                timestamp_ms: last_updated_epoch_ms,
            }],
            daily: vec![DailyForecast {
                date: "2024-01-15".to_string(),
                day_name: "Today".to_string(),
                high_temp: 21,
                low_temp: 9,
                condition_code: 0,
                icon: "☀️".to_string(),
                condition_text: "Clear sky".to_string(),
                humidity: Some(45),
                wind_speed_kmh: None,
            }],
            last_updated_epoch_ms,
            provider: ProviderId::OpenMeteo,
        }
    }
}
