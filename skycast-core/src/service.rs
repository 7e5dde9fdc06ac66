//! Weather retrieval: fresh cache, then providers in priority order, then stale cache.

use chrono::{DateTime, Duration, Utc};
use futures::FutureExt;
use std::{panic::AssertUnwindSafe, sync::Arc};
use tracing::{debug, info, instrument, warn};

use crate::{
    cache::CacheStore,
    error::{ApiError, CacheError, WeatherError},
    model::{CanonicalWeather, Coordinates},
    provider::{ProviderId, WeatherSource, skip_reason},
};

/// How long cached data counts as fresh, and how long it is kept at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrievalPolicy {
    pub cache_ttl: Duration,
    pub retention: Duration,
}

impl Default for RetrievalPolicy {
    fn default() -> Self {
        Self { cache_ttl: Duration::minutes(30), retention: Duration::days(7) }
    }
}

impl RetrievalPolicy {
    pub fn is_fresh(&self, weather: &CanonicalWeather, now: DateTime<Utc>) -> bool {
        now.timestamp_millis() - weather.last_updated_epoch_ms < self.cache_ttl.num_milliseconds()
    }

    /// Entries last updated before this instant are swept.
    pub fn retention_cutoff(&self, now: DateTime<Utc>) -> i64 {
        (now - self.retention).timestamp_millis()
    }
}

/// Where a returned snapshot came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    FreshCache,
    Provider(ProviderId),
    /// Every provider failed; this is the last snapshot we had.
    StaleCache,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Retrieved {
    pub weather: CanonicalWeather,
    pub origin: Origin,
}

#[derive(Debug, Clone)]
pub struct WeatherService {
    sources: Vec<Arc<dyn WeatherSource>>,
    cache: Arc<dyn CacheStore>,
    policy: RetrievalPolicy,
}

impl WeatherService {
    /// `sources` are tried in the order given.
    pub fn new(sources: Vec<Arc<dyn WeatherSource>>, cache: Arc<dyn CacheStore>) -> Self {
        Self { sources, cache, policy: RetrievalPolicy::default() }
    }

    pub fn with_policy(mut self, policy: RetrievalPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> RetrievalPolicy {
        self.policy
    }

    pub async fn get_weather(
        &self,
        coords: Coordinates,
        force_refresh: bool,
    ) -> Result<CanonicalWeather, WeatherError> {
        self.retrieve(coords, force_refresh).await.map(|r| r.weather)
    }

    pub async fn retrieve(
        &self,
        coords: Coordinates,
        force_refresh: bool,
    ) -> Result<Retrieved, WeatherError> {
        self.retrieve_at(coords, force_refresh, Utc::now()).await
    }

    /// Same as [`retrieve`](Self::retrieve) with an explicit clock for the freshness check.
    #[instrument(skip(self, now), fields(coords = %coords))]
    pub async fn retrieve_at(
        &self,
        coords: Coordinates,
        force_refresh: bool,
        now: DateTime<Utc>,
    ) -> Result<Retrieved, WeatherError> {
        let key = coords.cache_key();

        let attempt = AssertUnwindSafe(self.fresh_or_fetched(&key, coords, force_refresh, now))
            .catch_unwind()
            .await;

        match attempt {
            Ok(Some(retrieved)) => Ok(retrieved),
            Ok(None) => self.stale_or_fail(&key).await,
            Err(_) => {
                warn!("retrieval panicked");
                self.stale_or_fail(&key).await
            }
        }
    }

    /// A fresh cache entry, or the first provider success (written back to the cache).
    async fn fresh_or_fetched(
        &self,
        key: &str,
        coords: Coordinates,
        force_refresh: bool,
        now: DateTime<Utc>,
    ) -> Option<Retrieved> {
        if !force_refresh {
            if let Some(weather) = self.cached(key).await {
                if self.policy.is_fresh(&weather, now) {
                    debug!("serving fresh cache entry");
                    return Some(Retrieved { weather, origin: Origin::FreshCache });
                }
            }
        }

        let (weather, provider) = self.fetch_from_providers(coords).await?;
        if let Err(e) = self.cache.upsert(key, &weather).await {
            warn!(error = %e, "failed to write cache entry");
        }
        Some(Retrieved { weather, origin: Origin::Provider(provider) })
    }

    /// First provider to succeed wins; failures are logged and the next provider is tried.
    async fn fetch_from_providers(
        &self,
        coords: Coordinates,
    ) -> Option<(CanonicalWeather, ProviderId)> {
        for source in &self.sources {
            let id = source.id();

            if let Some(reason) = skip_reason(source.as_ref()) {
                debug!(provider = %id, %reason, "skipping provider");
                continue;
            }

            match source.get_weather(coords).await {
                Ok(weather) => {
                    info!(provider = %id, "fetched weather");
                    return Some((weather, id));
                }
                Err(e) => warn!(provider = %id, error = %e, "provider failed"),
            }
        }

        None
    }

    async fn stale_or_fail(&self, key: &str) -> Result<Retrieved, WeatherError> {
        match self.cached(key).await {
            Some(weather) => {
                info!("all providers failed, serving stale cache entry");
                Ok(Retrieved { weather, origin: Origin::StaleCache })
            }
            None => Err(ApiError::AllProvidersFailed.into()),
        }
    }

    /// Cache read failures count as a miss.
    async fn cached(&self, key: &str) -> Option<CanonicalWeather> {
        match self.cache.get(key).await {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "cache read failed");
                None
            }
        }
    }

    /// Delete cache entries older than the retention window. Returns the number removed.
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<u64, CacheError> {
        let removed = self.cache.delete_older_than(self.policy.retention_cutoff(now)).await?;
        if removed > 0 {
            info!(removed, "swept expired cache entries");
        }
        Ok(removed)
    }

    pub async fn clear_cache(&self) -> Result<(), CacheError> {
        self.cache.clear().await
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use async_trait::async_trait;
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    use crate::{
        cache::fixtures::snapshot,
        error::{NetworkError, WeatherError},
        model::{CanonicalWeather, Coordinates},
        provider::{ProviderId, WeatherSource},
    };

    #[derive(Debug, Clone, Copy)]
    pub enum Behavior {
        Succeed,
        Fail,
        Panic,
        Unconfigured,
    }

    /// Scripted provider that counts its calls.
    #[derive(Debug)]
    pub struct FakeSource {
        pub id: ProviderId,
        pub behavior: Behavior,
        pub calls: AtomicUsize,
    }

    impl FakeSource {
        pub fn new(id: ProviderId, behavior: Behavior) -> Arc<Self> {
            Arc::new(Self { id, behavior, calls: AtomicUsize::new(0) })
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl WeatherSource for FakeSource {
        fn id(&self) -> ProviderId {
            self.id
        }

        fn is_configured(&self) -> bool {
            !matches!(self.behavior, Behavior::Unconfigured)
        }

        async fn get_weather(&self, coords: Coordinates) -> Result<CanonicalWeather, WeatherError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.behavior {
                Behavior::Succeed | Behavior::Unconfigured => {
                    let now = chrono::Utc::now().timestamp_millis();
                    let mut weather = snapshot(coords.latitude, coords.longitude, now);
                    weather.provider = self.id;
                    Ok(weather)
                }
                Behavior::Fail => Err(NetworkError::ServerError(503).into()),
                Behavior::Panic => panic!("provider blew up"),
            }
        }
    }
}
