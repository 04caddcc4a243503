//! Products and the stock ledger.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use soko_core::{ProductId, ReservationId, ReservationStatus, UserId};

use super::PgStore;
use crate::db::{InventoryStore, RepositoryError};
use crate::models::{Product, ReserveOutcome, StockReservation};

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: ProductId,
    seller_id: UserId,
    title: String,
    price: Decimal,
    stock: i32,
    active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Self {
            id: row.id,
            seller_id: row.seller_id,
            title: row.title,
            price: row.price,
            stock: row.stock,
            active: row.active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ReservationRow {
    id: ReservationId,
    product_id: ProductId,
    seller_id: UserId,
    quantity: i32,
    unit_price: Decimal,
    status: ReservationStatus,
    created_at: DateTime<Utc>,
}

impl From<ReservationRow> for StockReservation {
    fn from(row: ReservationRow) -> Self {
        Self {
            id: row.id,
            product_id: row.product_id,
            seller_id: row.seller_id,
            quantity: row.quantity,
            unit_price: row.unit_price,
            status: row.status,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct StockRow {
    stock: i32,
    active: bool,
}

// =============================================================================
// Repository
// =============================================================================

#[async_trait]
impl InventoryStore for PgStore {
    async fn insert_product(&self, product: &Product) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO soko.product (id, seller_id, title, price, stock, active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ",
        )
        .bind(product.id)
        .bind(product.seller_id)
        .bind(&product.title)
        .bind(product.price)
        .bind(product.stock)
        .bind(product.active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(self.pool())
        .await
        .map_err(|e| RepositoryError::from_insert(e, "product"))?;

        Ok(())
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(
            r"
            SELECT id, seller_id, title, price, stock, active, created_at, updated_at
            FROM soko.product
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await?;

        Ok(row.map(Into::into))
    }

    async fn list_seller_products(
        &self,
        seller_id: UserId,
    ) -> Result<Vec<Product>, RepositoryError> {
        let rows = sqlx::query_as::<_, ProductRow>(
            r"
            SELECT id, seller_id, title, price, stock, active, created_at, updated_at
            FROM soko.product
            WHERE seller_id = $1
            ORDER BY created_at DESC
            ",
        )
        .bind(seller_id)
        .fetch_all(self.pool())
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn update_price(
        &self,
        id: ProductId,
        seller_id: UserId,
        price: Decimal,
    ) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(
            r"
            UPDATE soko.product
            SET price = $3, updated_at = NOW()
            WHERE id = $1 AND seller_id = $2
            RETURNING id, seller_id, title, price, stock, active, created_at, updated_at
            ",
        )
        .bind(id)
        .bind(seller_id)
        .bind(price)
        .fetch_optional(self.pool())
        .await?;

        Ok(row.map(Into::into))
    }

    async fn set_active(
        &self,
        id: ProductId,
        seller_id: UserId,
        active: bool,
    ) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(
            r"
            UPDATE soko.product
            SET active = $3, updated_at = NOW()
            WHERE id = $1 AND seller_id = $2
            RETURNING id, seller_id, title, price, stock, active, created_at, updated_at
            ",
        )
        .bind(id)
        .bind(seller_id)
        .bind(active)
        .fetch_optional(self.pool())
        .await?;

        Ok(row.map(Into::into))
    }

    async fn restock(
        &self,
        id: ProductId,
        seller_id: UserId,
        quantity: i32,
    ) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(
            r"
            UPDATE soko.product
            SET stock = stock + $3, updated_at = NOW()
            WHERE id = $1 AND seller_id = $2
            RETURNING id, seller_id, title, price, stock, active, created_at, updated_at
            ",
        )
        .bind(id)
        .bind(seller_id)
        .bind(quantity)
        .fetch_optional(self.pool())
        .await
        .map_err(|e| RepositoryError::from_update(e, "stock"))?;

        Ok(row.map(Into::into))
    }

    async fn reserve_stock(
        &self,
        reservation_id: ReservationId,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<ReserveOutcome, RepositoryError> {
        // Row lock on the product serializes concurrent decrements; the
        // `stock >= $3` predicate is re-evaluated against the latest version.
        let reserved = sqlx::query_as::<_, ReservationRow>(
            r"
            WITH taken AS (
                UPDATE soko.product
                SET stock = stock - $3, updated_at = NOW()
                WHERE id = $2 AND active AND stock >= $3
                RETURNING id, seller_id, price
            )
            INSERT INTO soko.stock_reservation (id, product_id, seller_id, quantity, unit_price)
            SELECT $1, taken.id, taken.seller_id, $3, taken.price
            FROM taken
            RETURNING id, product_id, seller_id, quantity, unit_price, status, created_at
            ",
        )
        .bind(reservation_id)
        .bind(product_id)
        .bind(quantity)
        .fetch_optional(self.pool())
        .await?;

        if let Some(row) = reserved {
            return Ok(ReserveOutcome::Reserved(row.into()));
        }

        // Nothing was written; read only to explain why.
        let current = sqlx::query_as::<_, StockRow>(
            r"SELECT stock, active FROM soko.product WHERE id = $1",
        )
        .bind(product_id)
        .fetch_optional(self.pool())
        .await?;

        Ok(match current {
            None => ReserveOutcome::Missing,
            Some(row) if !row.active => ReserveOutcome::Inactive,
            Some(row) => ReserveOutcome::Insufficient {
                available: row.stock,
            },
        })
    }

    async fn release_reservation(&self, id: ReservationId) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            WITH released AS (
                UPDATE soko.stock_reservation
                SET status = 'released', resolved_at = NOW()
                WHERE id = $1 AND status = 'held'
                RETURNING product_id, quantity
            )
            UPDATE soko.product p
            SET stock = p.stock + released.quantity, updated_at = NOW()
            FROM released
            WHERE p.id = released.product_id
            ",
        )
        .bind(id)
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn get_reservation(
        &self,
        id: ReservationId,
    ) -> Result<Option<StockReservation>, RepositoryError> {
        let row = sqlx::query_as::<_, ReservationRow>(
            r"
            SELECT id, product_id, seller_id, quantity, unit_price, status, created_at
            FROM soko.stock_reservation
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await?;

        Ok(row.map(Into::into))
    }

    async fn release_stale_reservations(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, RepositoryError> {
        let released: i64 = sqlx::query_scalar(
            r"
            WITH released AS (
                UPDATE soko.stock_reservation
                SET status = 'released', resolved_at = NOW()
                WHERE status = 'held' AND created_at < $1
                RETURNING product_id, quantity
            ),
            totals AS (
                SELECT product_id, SUM(quantity)::INTEGER AS quantity
                FROM released
                GROUP BY product_id
            ),
            restocked AS (
                UPDATE soko.product p
                SET stock = p.stock + totals.quantity, updated_at = NOW()
                FROM totals
                WHERE p.id = totals.product_id
                RETURNING p.id
            )
            SELECT COUNT(*) FROM released
            ",
        )
        .bind(cutoff)
        .fetch_one(self.pool())
        .await?;

        u64::try_from(released)
            .map_err(|_| RepositoryError::DataCorruption(format!("negative count: {released}")))
    }
}
