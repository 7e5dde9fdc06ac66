//! Per-location view state and the saved-location dashboard.

use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::{
    error::{ErrorAction, WeatherError},
    locations::SavedLocationStore,
    location::LocationService,
    model::{CanonicalWeather, Place, SavedLocation},
    service::{Origin, Retrieved, WeatherService},
};

#[derive(Debug, Clone, PartialEq)]
pub enum WeatherUiState {
    Loading,
    Success { weather: CanonicalWeather, origin: Origin },
    Error { error: WeatherError, action: ErrorAction },
}

impl WeatherUiState {
    pub fn from_result(result: Result<Retrieved, WeatherError>) -> Self {
        match result {
            Ok(retrieved) => WeatherUiState::Success {
                weather: retrieved.weather,
                origin: retrieved.origin,
            },
            Err(error) => Self::from_error(error),
        }
    }

    pub fn from_error(error: WeatherError) -> Self {
        let action = error.user_action();
        WeatherUiState::Error { error, action }
    }

    pub fn weather(&self) -> Option<&CanonicalWeather> {
        match self {
            WeatherUiState::Success { weather, .. } => Some(weather),
            _ => None,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, WeatherUiState::Loading)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LocationView {
    pub location: SavedLocation,
    pub state: WeatherUiState,
}

/// Saved locations and the weather state of each.
#[derive(Debug, Clone)]
pub struct Dashboard {
    service: WeatherService,
    locations: SavedLocationStore,
    location_service: Arc<dyn LocationService>,
    views: Vec<LocationView>,
}

impl Dashboard {
    pub fn new(
        service: WeatherService,
        locations: SavedLocationStore,
        location_service: Arc<dyn LocationService>,
    ) -> Self {
        Self { service, locations, location_service, views: Vec::new() }
    }

    pub fn views(&self) -> &[LocationView] {
        &self.views
    }

    /// Reload the saved list and put every location into `Loading`.
    pub async fn reload_locations(&mut self) -> Result<(), WeatherError> {
        let saved = self.locations.list().await?;
        self.views = saved
            .into_iter()
            .map(|location| LocationView { location, state: WeatherUiState::Loading })
            .collect();
        Ok(())
    }

    /// One orchestrator call per saved location, all in flight at once.
    pub async fn refresh_all(&mut self, force: bool) -> Result<&[LocationView], WeatherError> {
        self.reload_locations().await?;

        let service = &self.service;
        let results = join_all(
            self.views.iter().map(|view| service.retrieve(view.location.coordinates(), force)),
        )
        .await;

        for (view, result) in self.views.iter_mut().zip(results) {
            if let Err(e) = &result {
                warn!(location = %view.location.display_name(), error = %e, "refresh failed");
            }
            view.state = WeatherUiState::from_result(result);
        }

        Ok(&self.views)
    }

    /// Resolve the device position, name it, store it as the current location and load its
    /// weather. Location failures come back as an error state with a grant-permission action.
    pub async fn load_current_location(&mut self, force: bool) -> LocationView {
        match self.resolve_current_location().await {
            Ok(location) => {
                let result = self.service.retrieve(location.coordinates(), force).await;
                let view = LocationView { location, state: WeatherUiState::from_result(result) };
                self.upsert_view(view.clone());
                view
            }
            Err(error) => LocationView {
                location: SavedLocation {
                    id: 0,
                    latitude: 0.0,
                    longitude: 0.0,
                    city_name: String::new(),
                    country: String::new(),
                    is_current_location: true,
                    order: 0,
                },
                state: WeatherUiState::from_error(error),
            },
        }
    }

    async fn resolve_current_location(&self) -> Result<SavedLocation, WeatherError> {
        let coords = self.location_service.current_coordinates().await?;

        let place = match self.location_service.reverse_geocode(coords).await {
            Ok(place) => place,
            Err(e) => {
                debug!(error = %e, "reverse geocoding failed, using coordinates as the name");
                Place {
                    latitude: coords.latitude,
                    longitude: coords.longitude,
                    city_name: coords.to_string(),
                    country: String::new(),
                }
            }
        };

        Ok(self.locations.set_current_location(&place).await?)
    }

    fn upsert_view(&mut self, view: LocationView) {
        match self.views.iter_mut().find(|v| v.location.id == view.location.id) {
            Some(existing) => *existing = view,
            None => self.views.push(view),
        }
    }
}
