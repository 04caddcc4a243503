//! Driver availability.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use soko_core::UserId;

use super::PgStore;
use crate::db::{DriverStore, RepositoryError};
use crate::models::DriverAvailability;

#[derive(Debug, sqlx::FromRow)]
struct DriverRow {
    id: UserId,
    online: bool,
    verified: bool,
    subscription_expiry: Option<NaiveDate>,
    updated_at: DateTime<Utc>,
}

impl From<DriverRow> for DriverAvailability {
    fn from(row: DriverRow) -> Self {
        Self {
            driver_id: row.id,
            online: row.online,
            verified: row.verified,
            subscription_expiry: row.subscription_expiry,
            updated_at: row.updated_at,
        }
    }
}

#[async_trait]
impl DriverStore for PgStore {
    async fn upsert_driver(
        &self,
        driver: &DriverAvailability,
    ) -> Result<DriverAvailability, RepositoryError> {
        let row = sqlx::query_as::<_, DriverRow>(
            r"
            INSERT INTO soko.driver (id, online, verified, subscription_expiry, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO UPDATE
            SET verified = EXCLUDED.verified,
                subscription_expiry = EXCLUDED.subscription_expiry,
                updated_at = EXCLUDED.updated_at
            RETURNING id, online, verified, subscription_expiry, updated_at
            ",
        )
        .bind(driver.driver_id)
        .bind(driver.online)
        .bind(driver.verified)
        .bind(driver.subscription_expiry)
        .bind(driver.updated_at)
        .fetch_one(self.pool())
        .await?;

        Ok(row.into())
    }

    async fn get_driver(&self, id: UserId) -> Result<Option<DriverAvailability>, RepositoryError> {
        let row = sqlx::query_as::<_, DriverRow>(
            r"
            SELECT id, online, verified, subscription_expiry, updated_at
            FROM soko.driver
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await?;

        Ok(row.map(Into::into))
    }

    async fn set_driver_online(
        &self,
        id: UserId,
        online: bool,
        at: DateTime<Utc>,
    ) -> Result<Option<DriverAvailability>, RepositoryError> {
        let row = sqlx::query_as::<_, DriverRow>(
            r"
            UPDATE soko.driver
            SET online = $2, updated_at = $3
            WHERE id = $1
            RETURNING id, online, verified, subscription_expiry, updated_at
            ",
        )
        .bind(id)
        .bind(online)
        .bind(at)
        .fetch_optional(self.pool())
        .await?;

        Ok(row.map(Into::into))
    }

    async fn count_eligible_drivers(&self, today: NaiveDate) -> Result<i64, RepositoryError> {
        let count: i64 = sqlx::query_scalar(
            r"
            SELECT COUNT(*)
            FROM soko.driver
            WHERE online AND verified AND subscription_expiry > $1
            ",
        )
        .bind(today)
        .fetch_one(self.pool())
        .await?;

        Ok(count)
    }
}
