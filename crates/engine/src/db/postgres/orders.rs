//! Orders and the checkout commit.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;

use soko_core::{OrderId, OrderStatus, PaymentMethod, ReservationId, UserId};

use super::{PgStore, status_names};
use crate::db::{OrderStore, RepositoryError};
use crate::models::{Order, OrderLine, Payment};

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: OrderId,
    customer_id: UserId,
    seller_id: UserId,
    line_items: Json<Vec<OrderLine>>,
    total_amount: Decimal,
    payment_method: PaymentMethod,
    delivery_address: String,
    status: OrderStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<OrderRow> for Order {
    fn from(row: OrderRow) -> Self {
        Self {
            id: row.id,
            customer_id: row.customer_id,
            seller_id: row.seller_id,
            line_items: row.line_items.0,
            total_amount: row.total_amount,
            payment_method: row.payment_method,
            delivery_address: row.delivery_address,
            status: row.status,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

// =============================================================================
// Repository
// =============================================================================

#[async_trait]
impl OrderStore for PgStore {
    async fn place_orders(
        &self,
        orders: &[Order],
        payment: &Payment,
        reservations: &[ReservationId],
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool().begin().await?;

        let reservation_ids: Vec<_> = reservations.iter().map(|id| id.as_uuid()).collect();
        let committed = sqlx::query(
            r"
            UPDATE soko.stock_reservation
            SET status = 'committed', resolved_at = NOW()
            WHERE id = ANY($1) AND status = 'held'
            ",
        )
        .bind(&reservation_ids)
        .execute(&mut *tx)
        .await?;

        if committed.rows_affected() != reservations.len() as u64 {
            // Dropping the transaction rolls it back.
            return Err(RepositoryError::Conflict(
                "reservation no longer held".to_owned(),
            ));
        }

        for order in orders {
            sqlx::query(
                r#"
                INSERT INTO soko."order"
                    (id, customer_id, seller_id, line_items, total_amount, payment_method,
                     delivery_address, status, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                "#,
            )
            .bind(order.id)
            .bind(order.customer_id)
            .bind(order.seller_id)
            .bind(Json(&order.line_items))
            .bind(order.total_amount)
            .bind(order.payment_method)
            .bind(&order.delivery_address)
            .bind(order.status)
            .bind(order.created_at)
            .bind(order.updated_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| RepositoryError::from_insert(e, "order"))?;
        }

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
        Ok(())
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(
            r#"
            SELECT id, customer_id, seller_id, line_items, total_amount, payment_method,
                   delivery_address, status, created_at, updated_at
            FROM soko."order"
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await?;

        Ok(row.map(Into::into))
    }

    async fn list_customer_orders(
        &self,
        customer_id: UserId,
    ) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(
            r#"
            SELECT id, customer_id, seller_id, line_items, total_amount, payment_method,
                   delivery_address, status, created_at, updated_at
            FROM soko."order"
            WHERE customer_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(customer_id)
        .fetch_all(self.pool())
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn list_seller_orders(&self, seller_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(
            r#"
            SELECT id, customer_id, seller_id, line_items, total_amount, payment_method,
                   delivery_address, status, created_at, updated_at
            FROM soko."order"
            WHERE seller_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(seller_id)
        .fetch_all(self.pool())
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn advance_order(
        &self,
        id: OrderId,
        seller_id: UserId,
        from: &[OrderStatus],
        to: OrderStatus,
        at: DateTime<Utc>,
    ) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(
            r#"
            UPDATE soko."order"
            SET status = $4, updated_at = $5
            WHERE id = $1 AND seller_id = $2 AND status::text = ANY($3)
            RETURNING id, customer_id, seller_id, line_items, total_amount, payment_method,
                      delivery_address, status, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(seller_id)
        .bind(status_names(from, OrderStatus::as_str))
        .bind(to)
        .bind(at)
        .fetch_optional(self.pool())
        .await?;

        Ok(row.map(Into::into))
    }

    async fn cancel_order(
        &self,
        id: OrderId,
        seller_id: UserId,
        from: &[OrderStatus],
        at: DateTime<Utc>,
    ) -> Result<Option<Order>, RepositoryError> {
        let mut tx = self.pool().begin().await?;

        let row = sqlx::query_as::<_, OrderRow>(
            r#"
            UPDATE soko."order"
            SET status = 'cancelled', updated_at = $4
            WHERE id = $1 AND seller_id = $2 AND status::text = ANY($3)
            RETURNING id, customer_id, seller_id, line_items, total_amount, payment_method,
                      delivery_address, status, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(seller_id)
        .bind(status_names(from, OrderStatus::as_str))
        .bind(at)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let order = Order::from(row);

        for line in &order.line_items {
            sqlx::query(
                r"
                UPDATE soko.product
                SET stock = stock + $2, updated_at = NOW()
                WHERE id = $1
                ",
            )
            .bind(line.product_id)
            .bind(line.quantity)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(Some(order))
    }
}
