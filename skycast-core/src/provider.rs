use crate::{
    Config,
    error::{ApiError, WeatherError},
    model::{CanonicalWeather, Coordinates},
    provider::{
        openmeteo::OpenMeteoProvider, openweather::OpenWeatherProvider,
        weatherapi::WeatherApiProvider,
    },
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::{convert::TryFrom, fmt::Debug, sync::Arc, time::Duration};
use tracing::debug;

pub mod openmeteo;
pub mod openweather;
pub mod weatherapi;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    OpenMeteo,
    WeatherApi,
    OpenWeather,
}

impl ProviderId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::OpenMeteo => "openmeteo",
            ProviderId::WeatherApi => "weatherapi",
            ProviderId::OpenWeather => "openweather",
        }
    }

    /// Fallback order: free and unlimited first, then the keyed tiers.
    pub const fn all() -> &'static [ProviderId] {
        &[ProviderId::OpenMeteo, ProviderId::WeatherApi, ProviderId::OpenWeather]
    }

    pub fn requires_api_key(&self) -> bool {
        !matches!(self, ProviderId::OpenMeteo)
    }

    /// Per-request HTTP timeout. The fallback chain as a whole has no deadline.
    pub fn default_timeout(&self) -> Duration {
        match self {
            ProviderId::OpenMeteo => Duration::from_secs(15),
            ProviderId::WeatherApi | ProviderId::OpenWeather => Duration::from_secs(10),
        }
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for ProviderId {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let lower = value.to_lowercase();

        match lower.as_str() {
            "openmeteo" | "open-meteo" => Ok(ProviderId::OpenMeteo),
            "weatherapi" => Ok(ProviderId::WeatherApi),
            "openweather" => Ok(ProviderId::OpenWeather),
            _ => Err(anyhow::anyhow!(
                "Unknown provider '{value}'. Supported providers: openmeteo, weatherapi, openweather."
            )),
        }
    }
}

/// A weather vendor: fetches its own response shape and maps it to [`CanonicalWeather`].
#[async_trait]
pub trait WeatherProvider: Send + Sync + Debug {
    type Raw: Send + Sync;

    fn id(&self) -> ProviderId;

    /// False when the provider needs a key and none is set.
    fn is_configured(&self) -> bool {
        true
    }

    async fn fetch(&self, coords: Coordinates) -> Result<Self::Raw, WeatherError>;

    /// Pure mapping. `fetched_at` stamps the snapshot and replaces unparseable timestamps.
    fn normalize(
        &self,
        raw: &Self::Raw,
        coords: Coordinates,
        fetched_at: DateTime<Utc>,
    ) -> CanonicalWeather;
}

/// Object-safe view of a provider, used by the orchestrator's fallback chain.
#[async_trait]
pub trait WeatherSource: Send + Sync + Debug {
    fn id(&self) -> ProviderId;

    fn is_configured(&self) -> bool;

    async fn get_weather(&self, coords: Coordinates) -> Result<CanonicalWeather, WeatherError>;
}

#[async_trait]
impl<P: WeatherProvider> WeatherSource for P {
    fn id(&self) -> ProviderId {
        WeatherProvider::id(self)
    }

    fn is_configured(&self) -> bool {
        WeatherProvider::is_configured(self)
    }

    async fn get_weather(&self, coords: Coordinates) -> Result<CanonicalWeather, WeatherError> {
        let raw = self.fetch(coords).await?;
        Ok(self.normalize(&raw, coords, Utc::now()))
    }
}

/// Skip policy for the fallback chain: `Some(error)` means do not call the provider.
pub fn skip_reason(source: &dyn WeatherSource) -> Option<WeatherError> {
    if source.is_configured() {
        None
    } else {
        Some(ApiError::NotConfigured(source.id()).into())
    }
}

pub(crate) fn http_client(timeout: Duration) -> Result<Client, WeatherError> {
    Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout)
        .user_agent(concat!("skycast/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(WeatherError::from)
}

/// Send a request and decode a JSON body, mapping failures into the error taxonomy.
pub(crate) async fn get_json<T: DeserializeOwned>(
    request: RequestBuilder,
    what: &str,
) -> Result<T, WeatherError> {
    let res = request.send().await?;

    let status = res.status();
    let body = res.text().await?;

    if !status.is_success() {
        debug!(%status, body = %truncate_body(&body), "{what} request failed");
        return Err(WeatherError::from_status(status));
    }

    serde_json::from_str(&body)
        .map_err(|e| WeatherError::from(ApiError::InvalidResponse(format!("{what}: {e}"))))
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

/// Build the fallback chain from configuration, in priority order.
///
/// Providers without a key are still included; the orchestrator skips them.
pub fn sources_from_config(config: &Config) -> Result<Vec<Arc<dyn WeatherSource>>, WeatherError> {
    let mut sources: Vec<Arc<dyn WeatherSource>> = Vec::with_capacity(ProviderId::all().len());

    for id in ProviderId::all() {
        let timeout = config.request_timeout(*id);
        let source: Arc<dyn WeatherSource> = match id {
            ProviderId::OpenMeteo => Arc::new(OpenMeteoProvider::new(timeout)?),
            ProviderId::WeatherApi => {
                Arc::new(WeatherApiProvider::new(config.effective_api_key(*id), timeout)?)
            }
            ProviderId::OpenWeather => {
                Arc::new(OpenWeatherProvider::new(config.effective_api_key(*id), timeout)?)
            }
        };
        sources.push(source);
    }

    Ok(sources)
}
