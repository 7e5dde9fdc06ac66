//! Where the user is and what places are called.
//!
//! Forward search goes to Open-Meteo's geocoding API and reverse lookups to Nominatim
//! (OpenStreetMap); neither needs a key. The "device position" comes from the `[device]`
//! configuration section.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::{fmt::Debug, time::Duration};
use tracing::{debug, instrument};

use crate::{
    config::DeviceConfig,
    error::{LocationError, WeatherError},
    model::{Coordinates, Place},
    provider::{get_json, http_client},
};

/// Searches shorter than this are not sent.
pub const MIN_QUERY_LEN: usize = 3;
pub const MAX_SEARCH_RESULTS: usize = 10;

const GEOCODING_BASE_URL: &str = "https://geocoding-api.open-meteo.com/v1";
const NOMINATIM_BASE_URL: &str = "https://nominatim.openstreetmap.org";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[async_trait]
pub trait LocationService: Send + Sync + Debug {
    async fn current_coordinates(&self) -> Result<Coordinates, WeatherError>;

    async fn reverse_geocode(&self, coords: Coordinates) -> Result<Place, WeatherError>;

    /// Empty for queries shorter than [`MIN_QUERY_LEN`]; at most [`MAX_SEARCH_RESULTS`] matches.
    async fn search_by_name(&self, query: &str) -> Result<Vec<Place>, WeatherError>;

    fn has_permission(&self) -> bool;
}

#[derive(Debug, Clone)]
pub struct GeocodingLocationService {
    device: DeviceConfig,
    search_base_url: String,
    reverse_base_url: String,
    http: Client,
}

impl GeocodingLocationService {
    pub fn new(device: DeviceConfig) -> Result<Self, WeatherError> {
        Ok(Self {
            device,
            search_base_url: GEOCODING_BASE_URL.to_string(),
            reverse_base_url: NOMINATIM_BASE_URL.to_string(),
            http: http_client(REQUEST_TIMEOUT)?,
        })
    }

    pub fn with_base_urls(
        mut self,
        search_base_url: impl Into<String>,
        reverse_base_url: impl Into<String>,
    ) -> Self {
        self.search_base_url = search_base_url.into();
        self.reverse_base_url = reverse_base_url.into();
        self
    }
}

fn geocoding_failed(err: WeatherError) -> WeatherError {
    LocationError::GeocodingFailed(err.to_string()).into()
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    name: String,
    latitude: f64,
    longitude: f64,
    country: Option<String>,
}

impl From<SearchResult> for Place {
    fn from(r: SearchResult) -> Self {
        Place {
            latitude: r.latitude,
            longitude: r.longitude,
            city_name: r.name,
            country: r.country.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ReverseResponse {
    address: Option<ReverseAddress>,
}

#[derive(Debug, Deserialize)]
struct ReverseAddress {
    city: Option<String>,
    town: Option<String>,
    village: Option<String>,
    municipality: Option<String>,
    county: Option<String>,
    state: Option<String>,
    country: Option<String>,
}

impl ReverseAddress {
    /// Most specific settlement name available.
    fn place_name(self) -> Option<String> {
        self.city
            .or(self.town)
            .or(self.village)
            .or(self.municipality)
            .or(self.county)
            .or(self.state)
    }
}

#[async_trait]
impl LocationService for GeocodingLocationService {
    async fn current_coordinates(&self) -> Result<Coordinates, WeatherError> {
        if !self.has_permission() {
            return Err(LocationError::PermissionDenied.into());
        }

        self.device
            .coordinates()
            .filter(Coordinates::is_valid)
            .ok_or_else(|| LocationError::Unavailable.into())
    }

    #[instrument(skip(self), fields(coords = %coords))]
    async fn reverse_geocode(&self, coords: Coordinates) -> Result<Place, WeatherError> {
        let url = format!("{}/reverse", self.reverse_base_url);
        let request = self.http.get(url).query(&[
            ("lat", coords.latitude.to_string()),
            ("lon", coords.longitude.to_string()),
            ("format", "json".to_string()),
            ("addressdetails", "1".to_string()),
            ("zoom", "10".to_string()),
        ]);

        let body: ReverseResponse =
            get_json(request, "reverse geocode").await.map_err(geocoding_failed)?;

        let address = body
            .address
            .ok_or_else(|| LocationError::GeocodingFailed("no address for coordinates".into()))?;
        let country = address.country.clone().unwrap_or_default();
        let city_name = address
            .place_name()
            .ok_or_else(|| LocationError::GeocodingFailed("no place name in address".into()))?;

        debug!(%city_name, %country, "reverse geocoded");

        Ok(Place { latitude: coords.latitude, longitude: coords.longitude, city_name, country })
    }

    #[instrument(skip(self))]
    async fn search_by_name(&self, query: &str) -> Result<Vec<Place>, WeatherError> {
        let query = query.trim();
        if query.chars().count() < MIN_QUERY_LEN {
            return Ok(Vec::new());
        }

        let url = format!("{}/search", self.search_base_url);
        let request = self.http.get(url).query(&[
            ("name", query.to_string()),
            ("count", MAX_SEARCH_RESULTS.to_string()),
            ("language", "en".to_string()),
            ("format", "json".to_string()),
        ]);

        let body: SearchResponse =
            get_json(request, "location search").await.map_err(geocoding_failed)?;

        Ok(body.results.into_iter().take(MAX_SEARCH_RESULTS).map(Place::from).collect())
    }

    fn has_permission(&self) -> bool {
        self.device.allow_location
    }
}
