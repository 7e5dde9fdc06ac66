//! Error taxonomy shared by the whole retrieval pipeline.
//!
//! Every foreign error (`reqwest`, `serde_json`, `sqlx`, HTTP status codes) is turned into a
//! [`WeatherError`] here and nowhere else.

use reqwest::StatusCode;
use thiserror::Error;

use crate::provider::ProviderId;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NetworkError {
    #[error("No network connection: {0}")]
    NoConnection(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Server error (HTTP {0})")]
    ServerError(u16),

    #[error("Network error: {0}")]
    Unknown(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("Invalid API key")]
    InvalidApiKey,

    #[error("Rate limit exceeded")]
    RateLimited,

    #[error("Location not found")]
    LocationNotFound,

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Provider '{0}' is not configured (missing API key)")]
    NotConfigured(ProviderId),

    #[error("All weather sources are unavailable")]
    AllProvidersFailed,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LocationError {
    #[error("Location permission denied")]
    PermissionDenied,

    #[error("Location services are disabled")]
    Disabled,

    #[error("Current location is unavailable")]
    Unavailable,

    #[error("Geocoding failed: {0}")]
    GeocodingFailed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    #[error("Cached data has expired")]
    Expired,

    #[error("Cached data is corrupted: {0}")]
    Corrupted(String),

    #[error("Cache storage error: {0}")]
    Storage(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WeatherError {
    #[error(transparent)]
    Network(#[from] NetworkError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Location(#[from] LocationError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error("Unexpected error: {0}")]
    Unknown(String),
}

/// What the user can do about an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorAction {
    Retry,
    GrantPermission,
    None,
}

impl WeatherError {
    /// Map a non-success HTTP status into the taxonomy.
    pub fn from_status(status: StatusCode) -> Self {
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ApiError::InvalidApiKey.into(),
            StatusCode::TOO_MANY_REQUESTS => ApiError::RateLimited.into(),
            StatusCode::NOT_FOUND | StatusCode::BAD_REQUEST => ApiError::LocationNotFound.into(),
            s if s.is_server_error() => NetworkError::ServerError(s.as_u16()).into(),
            s => NetworkError::Unknown(format!("unexpected HTTP status {s}")).into(),
        }
    }

    /// Timeouts, server errors, lost connectivity and rate limiting are worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            WeatherError::Network(
                NetworkError::Timeout | NetworkError::ServerError(_) | NetworkError::NoConnection(_)
            ) | WeatherError::Api(ApiError::RateLimited | ApiError::AllProvidersFailed)
        )
    }

    pub fn user_action(&self) -> ErrorAction {
        match self {
            WeatherError::Location(LocationError::PermissionDenied | LocationError::Disabled) => {
                ErrorAction::GrantPermission
            }
            e if e.is_retryable() => ErrorAction::Retry,
            _ => ErrorAction::None,
        }
    }
}

impl From<reqwest::Error> for WeatherError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            NetworkError::Timeout.into()
        } else if err.is_connect() {
            NetworkError::NoConnection(err.to_string()).into()
        } else if err.is_decode() {
            ApiError::InvalidResponse(err.to_string()).into()
        } else if let Some(status) = err.status() {
            WeatherError::from_status(status)
        } else {
            NetworkError::Unknown(err.to_string()).into()
        }
    }
}

impl From<serde_json::Error> for WeatherError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::InvalidResponse(err.to_string()).into()
    }
}

impl From<sqlx::Error> for CacheError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
                CacheError::Corrupted(err.to_string())
            }
            other => CacheError::Storage(other.to_string()),
        }
    }
}

impl From<sqlx::Error> for WeatherError {
    fn from(err: sqlx::Error) -> Self {
        CacheError::from(err).into()
    }
}
