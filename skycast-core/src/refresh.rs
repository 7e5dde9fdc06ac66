//! Periodic refresh of every saved location, independent of any interactive caller.

use chrono::Utc;
use futures::future::join_all;
use std::{future::Future, time::Duration};
use tokio::time::{MissedTickBehavior, interval};
use tracing::{info, warn};

use crate::{error::WeatherError, locations::SavedLocationStore, service::WeatherService};

/// Outcome of one refresh pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshSummary {
    pub refreshed: usize,
    pub failed: usize,
    pub swept: u64,
}

#[derive(Debug, Clone)]
pub struct BackgroundRefresh {
    service: WeatherService,
    locations: SavedLocationStore,
}

impl BackgroundRefresh {
    pub fn new(service: WeatherService, locations: SavedLocationStore) -> Self {
        Self { service, locations }
    }

    /// Force-refresh every saved location concurrently, then sweep expired cache rows.
    pub async fn run_once(&self) -> Result<RefreshSummary, WeatherError> {
        let saved = self.locations.list().await?;

        let results = join_all(
            saved.iter().map(|location| self.service.retrieve(location.coordinates(), true)),
        )
        .await;

        let mut summary = RefreshSummary::default();
        for (location, result) in saved.iter().zip(results) {
            match result {
                Ok(_) => summary.refreshed += 1,
                Err(e) => {
                    warn!(location = %location.display_name(), error = %e, "background refresh failed");
                    summary.failed += 1;
                }
            }
        }

        summary.swept = match self.service.sweep_expired(Utc::now()).await {
            Ok(removed) => removed,
            Err(e) => {
                warn!(error = %e, "cache sweep failed");
                0
            }
        };

        info!(
            refreshed = summary.refreshed,
            failed = summary.failed,
            swept = summary.swept,
            "background refresh finished"
        );
        Ok(summary)
    }

    /// Run [`run_once`](Self::run_once) every `period` until `shutdown` resolves. The first pass
    /// runs immediately.
    pub async fn run_periodic<F>(&self, period: Duration, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("background refresh stopped");
                    return;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.run_once().await {
                        warn!(error = %e, "background refresh pass aborted");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        cache::{CacheStore, MemoryCacheStore, fixtures::snapshot},
        database::Database,
        model::Place,
        provider::{ProviderId, WeatherSource},
        service::testing::{Behavior, FakeSource},
    };
    use std::sync::Arc;

    async fn setup(
        behavior: Behavior,
    ) -> (Database, Arc<FakeSource>, Arc<MemoryCacheStore>, BackgroundRefresh) {
        let db = Database::in_memory().await.unwrap();
        let source = FakeSource::new(ProviderId::OpenMeteo, behavior);
        let cache = Arc::new(MemoryCacheStore::new());
        let service = WeatherService::new(
            vec![source.clone() as Arc<dyn WeatherSource>],
            cache.clone(),
        );
        let job = BackgroundRefresh::new(service, db.location_store());
        (db, source, cache, job)
    }

    fn place(latitude: f64) -> Place {
        Place { latitude, longitude: 0.0, city_name: format!("P{latitude}"), country: String::new() }
    }

    #[tokio::test]
    async fn run_once_refreshes_every_location_and_sweeps() {
        let (db, source, cache, job) = setup(Behavior::Succeed).await;
        db.location_store().add(&place(1.0)).await.unwrap();
        db.location_store().add(&place(2.0)).await.unwrap();
        // far older than the retention window
        cache.upsert("ancient", &snapshot(9.0, 9.0, 0)).await.unwrap();

        let summary = job.run_once().await.unwrap();

        assert_eq!(summary, RefreshSummary { refreshed: 2, failed: 0, swept: 1 });
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn failures_are_counted() {
        let (db, _source, _cache, job) = setup(Behavior::Fail).await;
        db.location_store().add(&place(1.0)).await.unwrap();

        let summary = job.run_once().await.unwrap();

        assert_eq!(summary.failed, 1);
        assert_eq!(summary.refreshed, 0);
    }

    #[tokio::test]
    async fn periodic_runs_until_shutdown() {
        let (db, source, _cache, job) = setup(Behavior::Succeed).await;
        db.location_store().add(&place(1.0)).await.unwrap();

        job.run_periodic(Duration::from_millis(20), tokio::time::sleep(Duration::from_millis(70)))
            .await;

        assert!(source.calls() >= 2);
    }
}
