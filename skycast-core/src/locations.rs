use sqlx::SqlitePool;

use crate::{
    error::CacheError,
    model::{Place, SavedLocation},
};

/// The user's saved places, ordered by an explicit `sort_order` column.
#[derive(Debug, Clone)]
pub struct SavedLocationStore {
    pool: SqlitePool,
}

#[derive(Debug, sqlx::FromRow)]
struct LocationRow {
    id: i64,
    latitude: f64,
    longitude: f64,
    city_name: String,
    country: String,
    is_current_location: bool,
    sort_order: i32,
}

impl From<LocationRow> for SavedLocation {
    fn from(row: LocationRow) -> Self {
        SavedLocation {
            id: row.id,
            latitude: row.latitude,
            longitude: row.longitude,
            city_name: row.city_name,
            country: row.country,
            is_current_location: row.is_current_location,
            order: row.sort_order,
        }
    }
}

impl SavedLocationStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn list(&self) -> Result<Vec<SavedLocation>, CacheError> {
        let rows = sqlx::query_as::<_, LocationRow>(
            "SELECT * FROM saved_locations ORDER BY sort_order ASC, id ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(SavedLocation::from).collect())
    }

    /// Append a place to the end of the list.
    pub async fn add(&self, place: &Place) -> Result<SavedLocation, CacheError> {
        self.insert(place, false).await
    }

    async fn insert(&self, place: &Place, is_current: bool) -> Result<SavedLocation, CacheError> {
        let row = sqlx::query_as::<_, LocationRow>(
            r#"
            INSERT INTO saved_locations (
                latitude, longitude, city_name, country, is_current_location, sort_order
            )
            VALUES ($1, $2, $3, $4, $5,
                    (SELECT COALESCE(MAX(sort_order) + 1, 0) FROM saved_locations))
            RETURNING *
            "#,
        )
        .bind(place.latitude)
        .bind(place.longitude)
        .bind(&place.city_name)
        .bind(&place.country)
        .bind(is_current)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    /// Returns whether a row was removed.
    pub async fn remove(&self, id: i64) -> Result<bool, CacheError> {
        let result = sqlx::query("DELETE FROM saved_locations WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Rewrite `sort_order` so that `ids` appear in the given order. Ids not listed keep
    /// their relative order after the listed ones.
    pub async fn reorder(&self, ids: &[i64]) -> Result<(), CacheError> {
        let current = self.list().await?;
        let mut ordered: Vec<i64> = ids
            .iter()
            .copied()
            .filter(|id| current.iter().any(|l| l.id == *id))
            .collect();
        ordered.extend(current.iter().map(|l| l.id).filter(|id| !ids.contains(id)));

        let mut tx = self.pool.begin().await?;
        for (order, id) in ordered.iter().enumerate() {
            sqlx::query("UPDATE saved_locations SET sort_order = $1 WHERE id = $2")
                .bind(order as i32)
                .bind(*id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        Ok(())
    }

    /// Replace the single current-location row, keeping its position in the list.
    pub async fn set_current_location(&self, place: &Place) -> Result<SavedLocation, CacheError> {
        let existing = sqlx::query_as::<_, LocationRow>(
            "SELECT * FROM saved_locations WHERE is_current_location = 1 LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        match existing {
            Some(row) => {
                let updated = sqlx::query_as::<_, LocationRow>(
                    r#"
                    UPDATE saved_locations
                    SET latitude = $1, longitude = $2, city_name = $3, country = $4
                    WHERE id = $5
                    RETURNING *
                    "#,
                )
                .bind(place.latitude)
                .bind(place.longitude)
                .bind(&place.city_name)
                .bind(&place.country)
                .bind(row.id)
                .fetch_one(&self.pool)
                .await?;

                Ok(updated.into())
            }
            None => self.insert(place, true).await,
        }
    }
}
