//! Core library for the `skycast` CLI.
//!
//! This crate defines:
//! - Provider clients for Open-Meteo, WeatherAPI and OpenWeather, each normalizing into
//!   [`CanonicalWeather`]
//! - The retrieval pipeline ([`WeatherService`]): cache first, providers in priority order,
//!   stale cache as a last resort
//! - SQLite persistence for the weather cache and saved locations
//! - Geocoding, per-location view state and background refresh
//! - Configuration & credentials handling
//!
//! It is used by `skycast-cli`, but can also be reused by other binaries or services.

pub mod cache;
pub mod condition;
pub mod config;
pub mod database;
pub mod error;
pub mod location;
pub mod locations;
pub mod model;
pub mod normalize;
pub mod presentation;
pub mod provider;
pub mod refresh;
pub mod service;

pub use cache::{CacheStore, MemoryCacheStore, SqliteCacheStore};
pub use config::{Config, DeviceConfig, ProviderConfig};
pub use database::Database;
pub use error::{ApiError, CacheError, ErrorAction, LocationError, NetworkError, WeatherError};
pub use location::{GeocodingLocationService, LocationService};
pub use locations::SavedLocationStore;
pub use model::{
    CanonicalWeather, Coordinates, CurrentConditions, DailyForecast, HourlyForecast,
    LocationInfo, Place, SavedLocation, WeatherCategory,
};
pub use presentation::{Dashboard, LocationView, WeatherUiState};
pub use provider::{ProviderId, WeatherProvider, WeatherSource, sources_from_config};
pub use refresh::{BackgroundRefresh, RefreshSummary};
pub use service::{Origin, RetrievalPolicy, Retrieved, WeatherService};
