//! Inventory ledger: the only code path that takes stock away from a product
//! or gives it back.

use chrono::{DateTime, Utc};
use tracing::instrument;

use soko_core::{ProductId, ReservationId};

use crate::db::InventoryStore;
use crate::error::{BookingError, Result};
use crate::models::{ReserveOutcome, StockReservation};
use crate::state::Engine;

/// Atomic reserve and release of product stock.
#[derive(Clone, Copy)]
pub struct InventoryLedger<'a> {
    engine: &'a Engine,
}

impl<'a> InventoryLedger<'a> {
    #[must_use]
    pub const fn new(engine: &'a Engine) -> Self {
        Self { engine }
    }

    /// Take `quantity` units of a product, or nothing.
    ///
    /// The check and the decrement are one conditional write in the store;
    /// concurrent reservations never take more than the stock on hand.
    ///
    /// # Errors
    ///
    /// - `InvalidInput` if `quantity` is not positive
    /// - `ProductNotFound` if the product does not exist or is inactive
    /// - `InsufficientStock` if fewer than `quantity` units remain
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn reserve(&self, product_id: ProductId, quantity: i32) -> Result<StockReservation> {
        if quantity <= 0 {
            return Err(BookingError::InvalidInput(format!(
                "quantity must be positive, got {quantity}"
            )));
        }

        let outcome = self
            .engine
            .store()
            .reserve_stock(ReservationId::new(), product_id, quantity)
            .await?;

        match outcome {
            ReserveOutcome::Reserved(reservation) => {
                tracing::debug!(reservation_id = %reservation.id, quantity, "stock reserved");
                Ok(reservation)
            }
            ReserveOutcome::Insufficient { available } => {
                tracing::debug!(quantity, available, "insufficient stock");
                Err(BookingError::InsufficientStock {
                    product_id,
                    requested: quantity,
                    available,
                })
            }
            ReserveOutcome::Inactive | ReserveOutcome::Missing => {
                Err(BookingError::ProductNotFound(product_id))
            }
        }
    }

    /// Give a held reservation's stock back.
    ///
    /// Idempotent: releasing an unknown, already released or committed
    /// reservation returns `false` and changes nothing.
    ///
    /// # Errors
    ///
    /// Returns `BookingError::Store` if the store call fails.
    #[instrument(skip(self), fields(reservation_id = %id))]
    pub async fn release(&self, id: ReservationId) -> Result<bool> {
        let released = self.engine.store().release_reservation(id).await?;
        if released {
            tracing::debug!("reservation released");
        }
        Ok(released)
    }

    /// Release reservations left `held` for longer than the configured TTL,
    /// typically by a process that died mid-checkout.
    ///
    /// # Errors
    ///
    /// Returns `BookingError::Store` if the store call fails.
    #[instrument(skip(self))]
    pub async fn sweep_stale(&self, now: DateTime<Utc>) -> Result<u64> {
        let ttl = chrono::Duration::from_std(self.engine.settings().reservation_ttl)
            .map_err(|e| BookingError::Internal(format!("reservation ttl out of range: {e}")))?;
        let cutoff = now - ttl;

        let released = self
            .engine
            .store()
            .release_stale_reservations(cutoff)
            .await?;
        if released > 0 {
            tracing::info!(released, %cutoff, "released stale reservations");
        }
        Ok(released)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use chrono::Duration;
    use rust_decimal::Decimal;

    use soko_core::{ReservationStatus, Role};

    use super::*;
    use crate::models::NewProduct;
    use crate::services::testing;

    async fn product(engine: &Engine, stock: i32) -> ProductId {
        let seller = testing::subscribed(Role::Seller);
        engine
            .catalog()
            .create_product(
                &seller,
                NewProduct {
                    title: "Sukuma wiki".to_owned(),
                    price: Decimal::from(50),
                    stock,
                },
            )
            .await
            .unwrap()
            .id
    }

    async fn stock_of(engine: &Engine, id: ProductId) -> i32 {
        engine.store().get_product(id).await.unwrap().unwrap().stock
    }

    #[tokio::test]
    async fn test_reserve_decrements_and_release_restores() {
        let (engine, _rx) = testing::engine();
        let id = product(&engine, 5).await;

        let reservation = engine.inventory().reserve(id, 3).await.unwrap();
        assert_eq!(reservation.unit_price, Decimal::from(50));
        assert_eq!(stock_of(&engine, id).await, 2);

        assert!(engine.inventory().release(reservation.id).await.unwrap());
        assert_eq!(stock_of(&engine, id).await, 5);

        // Second release is a no-op.
        assert!(!engine.inventory().release(reservation.id).await.unwrap());
        assert_eq!(stock_of(&engine, id).await, 5);
    }

    #[tokio::test]
    async fn test_reserve_more_than_stock_fails_without_change() {
        let (engine, _rx) = testing::engine();
        let id = product(&engine, 2).await;

        let err = engine.inventory().reserve(id, 3).await.unwrap_err();
        assert!(matches!(
            err,
            BookingError::InsufficientStock { requested: 3, available: 2, .. }
        ));
        assert_eq!(stock_of(&engine, id).await, 2);
    }

    #[tokio::test]
    async fn test_reserve_exact_stock_leaves_zero() {
        let (engine, _rx) = testing::engine();
        let id = product(&engine, 4).await;

        engine.inventory().reserve(id, 4).await.unwrap();
        assert_eq!(stock_of(&engine, id).await, 0);
        assert!(engine.inventory().reserve(id, 1).await.is_err());
    }

    #[tokio::test]
    async fn test_unknown_product() {
        let (engine, _rx) = testing::engine();
        let err = engine
            .inventory()
            .reserve(ProductId::new(), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::ProductNotFound(_)));
    }

    #[tokio::test]
    async fn test_non_positive_quantity() {
        let (engine, _rx) = testing::engine();
        let id = product(&engine, 4).await;
        assert!(matches!(
            engine.inventory().reserve(id, 0).await,
            Err(BookingError::InvalidInput(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_reserves_never_oversell() {
        let (engine, _rx) = testing::engine();
        let id = product(&engine, 10).await;
        let engine = Arc::new(engine);

        let handles: Vec<_> = (0..32)
            .map(|_| {
                let engine = Arc::clone(&engine);
                tokio::spawn(async move { engine.inventory().reserve(id, 1).await.is_ok() })
            })
            .collect();

        let mut won = 0;
        for handle in handles {
            if handle.await.unwrap() {
                won += 1;
            }
        }
        assert_eq!(won, 10);
        assert_eq!(stock_of(&engine, id).await, 0);
    }

    #[tokio::test]
    async fn test_sweep_releases_only_expired_holds() {
        let (engine, _rx) = testing::engine();
        let id = product(&engine, 10).await;
        let old = engine.inventory().reserve(id, 4).await.unwrap();

        // Nothing is older than the TTL yet.
        assert_eq!(engine.inventory().sweep_stale(Utc::now()).await.unwrap(), 0);

        let later = Utc::now() + Duration::hours(1);
        assert_eq!(engine.inventory().sweep_stale(later).await.unwrap(), 1);
        assert_eq!(stock_of(&engine, id).await, 10);

        let swept = engine.store().get_reservation(old.id).await.unwrap().unwrap();
        assert_eq!(swept.status, ReservationStatus::Released);
    }
}
