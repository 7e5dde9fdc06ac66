use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};
use std::path::Path;
use tracing::debug;

use crate::{cache::SqliteCacheStore, error::CacheError, locations::SavedLocationStore};

/// SQLite database holding the weather cache and the saved-location list.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (or create) the database file at `path` and make sure the tables exist.
    pub async fn open(path: &Path) -> Result<Self, CacheError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| CacheError::Storage(e.to_string()))?;
        }

        let options = SqliteConnectOptions::new().filename(path).create_if_missing(true);
        let pool = SqlitePoolOptions::new().max_connections(4).connect_with(options).await?;

        debug!(path = %path.display(), "opened weather database");

        let db = Self::new(pool);
        db.init_tables().await?;
        Ok(db)
    }

    /// A private in-memory database. A single connection keeps every query on the same database.
    pub async fn in_memory() -> Result<Self, CacheError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        let db = Self::new(pool);
        db.init_tables().await?;
        Ok(db)
    }

    pub async fn init_tables(&self) -> Result<(), CacheError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS weather_cache (
                cache_key TEXT PRIMARY KEY,
                latitude REAL NOT NULL,
                longitude REAL NOT NULL,
                city_name TEXT NOT NULL,
                country TEXT NOT NULL,
                is_current_location INTEGER NOT NULL,
                temperature INTEGER NOT NULL,
                condition_text TEXT NOT NULL,
                condition_code INTEGER NOT NULL,
                high_temp INTEGER NOT NULL,
                low_temp INTEGER NOT NULL,
                feels_like INTEGER NOT NULL,
                humidity INTEGER NOT NULL,
                wind_speed_kmh REAL NOT NULL,
                icon TEXT NOT NULL,
                category TEXT NOT NULL,
                description TEXT NOT NULL,
                visibility_km REAL,
                uv_index INTEGER,
                pressure REAL,
                hourly_json TEXT NOT NULL,
                daily_json TEXT NOT NULL,
                provider TEXT NOT NULL,
                last_updated INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_weather_cache_last_updated ON weather_cache(last_updated)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS saved_locations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                latitude REAL NOT NULL,
                longitude REAL NOT NULL,
                city_name TEXT NOT NULL,
                country TEXT NOT NULL,
                is_current_location INTEGER NOT NULL DEFAULT 0,
                sort_order INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn cache_store(&self) -> SqliteCacheStore {
        SqliteCacheStore::new(self.pool.clone())
    }

    pub fn location_store(&self) -> SavedLocationStore {
        SavedLocationStore::new(self.pool.clone())
    }

    pub async fn health_check(&self) -> Result<(), CacheError> {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await?;
        Ok(())
    }
}
