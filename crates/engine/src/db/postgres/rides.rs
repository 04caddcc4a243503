//! Rides and ride completion.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use soko_core::{CarCategory, PaymentId, RideId, RideStatus, UserId};

use super::{PgStore, status_names};
use crate::db::{RepositoryError, RideActor, RideStore};
use crate::models::{Payment, Ride};

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct RideRow {
    id: RideId,
    customer_id: UserId,
    driver_id: Option<UserId>,
    pickup: String,
    destination: String,
    distance_km: Decimal,
    price: Decimal,
    car_category: CarCategory,
    status: RideStatus,
    created_at: DateTime<Utc>,
    confirmed_at: Option<DateTime<Utc>>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
}

impl From<RideRow> for Ride {
    fn from(row: RideRow) -> Self {
        Self {
            id: row.id,
            customer_id: row.customer_id,
            driver_id: row.driver_id,
            pickup: row.pickup,
            destination: row.destination,
            distance_km: row.distance_km,
            price: row.price,
            category: row.car_category,
            status: row.status,
            created_at: row.created_at,
            confirmed_at: row.confirmed_at,
            started_at: row.started_at,
            completed_at: row.completed_at,
            cancelled_at: row.cancelled_at,
        }
    }
}

const RIDE_COLUMNS: &str = "id, customer_id, driver_id, pickup, destination, distance_km, price, \
     car_category, status, created_at, confirmed_at, started_at, completed_at, cancelled_at";

/// Column stamped when a ride enters `status`.
const fn timestamp_column(status: RideStatus) -> Option<&'static str> {
    match status {
        RideStatus::Pending => None,
        RideStatus::Confirmed => Some("confirmed_at"),
        RideStatus::InProgress => Some("started_at"),
        RideStatus::Completed => Some("completed_at"),
        RideStatus::Cancelled => Some("cancelled_at"),
    }
}

// =============================================================================
// Repository
// =============================================================================

#[async_trait]
impl RideStore for PgStore {
    async fn insert_ride(&self, ride: &Ride) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO soko.ride
                (id, customer_id, driver_id, pickup, destination, distance_km, price,
                 car_category, status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ",
        )
        .bind(ride.id)
        .bind(ride.customer_id)
        .bind(ride.driver_id)
        .bind(&ride.pickup)
        .bind(&ride.destination)
        .bind(ride.distance_km)
        .bind(ride.price)
        .bind(ride.category)
        .bind(ride.status)
        .bind(ride.created_at)
        .execute(self.pool())
        .await
        .map_err(|e| RepositoryError::from_insert(e, "ride"))?;

        Ok(())
    }

    async fn get_ride(&self, id: RideId) -> Result<Option<Ride>, RepositoryError> {
        let sql = format!("SELECT {RIDE_COLUMNS} FROM soko.ride WHERE id = $1");
        let row = sqlx::query_as::<_, RideRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool())
            .await?;

        Ok(row.map(Into::into))
    }

    async fn accept_ride(
        &self,
        id: RideId,
        driver_id: UserId,
        at: DateTime<Utc>,
    ) -> Result<Option<Ride>, RepositoryError> {
        // Concurrent accepts block on the row lock; losers re-check
        // `status = 'pending'` against the winner's version and match nothing.
        let sql = format!(
            r"
            UPDATE soko.ride
            SET driver_id = $2, status = 'confirmed', confirmed_at = $3
            WHERE id = $1 AND status = 'pending'
            RETURNING {RIDE_COLUMNS}
            "
        );
        let row = sqlx::query_as::<_, RideRow>(&sql)
            .bind(id)
            .bind(driver_id)
            .bind(at)
            .fetch_optional(self.pool())
            .await?;

        Ok(row.map(Into::into))
    }

    async fn transition_ride(
        &self,
        id: RideId,
        actor: RideActor,
        from: &[RideStatus],
        to: RideStatus,
        at: DateTime<Utc>,
    ) -> Result<Option<Ride>, RepositoryError> {
        let Some(stamp) = timestamp_column(to) else {
            return Ok(None);
        };
        let (actor_column, actor_id) = match actor {
            RideActor::Driver(id) => ("driver_id", id),
            RideActor::Customer(id) => ("customer_id", id),
        };
        let sql = format!(
            r"
            UPDATE soko.ride
            SET status = $4, {stamp} = $5
            WHERE id = $1 AND {actor_column} = $2 AND status::text = ANY($3)
            RETURNING {RIDE_COLUMNS}
            "
        );
        let row = sqlx::query_as::<_, RideRow>(&sql)
            .bind(id)
            .bind(actor_id)
            .bind(status_names(from, RideStatus::as_str))
            .bind(to)
            .bind(at)
            .fetch_optional(self.pool())
            .await?;

        Ok(row.map(Into::into))
    }

    async fn complete_ride(
        &self,
        id: RideId,
        driver_id: UserId,
        payment_id: PaymentId,
        at: DateTime<Utc>,
    ) -> Result<Option<(Ride, Payment)>, RepositoryError> {
        let mut tx = self.pool().begin().await?;

        let sql = format!(
            r"
            UPDATE soko.ride
            SET status = 'completed', completed_at = $3
            WHERE id = $1 AND driver_id = $2 AND status::text = ANY($4)
            RETURNING {RIDE_COLUMNS}
            "
        );
        let row = sqlx::query_as::<_, RideRow>(&sql)
            .bind(id)
            .bind(driver_id)
            .bind(at)
            .bind(status_names(
                RideStatus::sources_for(RideStatus::Completed),
                RideStatus::as_str,
            ))
            .fetch_optional(&mut *tx)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let ride = Ride::from(row);
        let payment = Payment::for_completed_ride(payment_id, &ride, at);

        sqlx::query(
            r"
            INSERT INTO soko.payment
                (id, payer_id, amount, method, purpose, status, reference, created_at, verified_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ",
        )
        .bind(payment.id)
        .bind(payment.payer_id)
        .bind(payment.amount)
        .bind(payment.method)
        .bind(payment.purpose)
        .bind(payment.status)
        .bind(&payment.reference)
        .bind(payment.created_at)
        .bind(payment.verified_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| RepositoryError::from_insert(e, "payment"))?;

        tx.commit().await?;
        Ok(Some((ride, payment)))
    }

    async fn list_pending_rides(&self, limit: i64) -> Result<Vec<Ride>, RepositoryError> {
        let sql = format!(
            r"
            SELECT {RIDE_COLUMNS}
            FROM soko.ride
            WHERE status = 'pending'
            ORDER BY created_at DESC
            LIMIT $1
            "
        );
        let rows = sqlx::query_as::<_, RideRow>(&sql)
            .bind(limit)
            .fetch_all(self.pool())
            .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn list_customer_rides(&self, customer_id: UserId) -> Result<Vec<Ride>, RepositoryError> {
        let sql = format!(
            "SELECT {RIDE_COLUMNS} FROM soko.ride WHERE customer_id = $1 ORDER BY created_at DESC"
        );
        let rows = sqlx::query_as::<_, RideRow>(&sql)
            .bind(customer_id)
            .fetch_all(self.pool())
            .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn list_driver_rides(&self, driver_id: UserId) -> Result<Vec<Ride>, RepositoryError> {
        let sql = format!(
            "SELECT {RIDE_COLUMNS} FROM soko.ride WHERE driver_id = $1 ORDER BY created_at DESC"
        );
        let rows = sqlx::query_as::<_, RideRow>(&sql)
            .bind(driver_id)
            .fetch_all(self.pool())
            .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}
