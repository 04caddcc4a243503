//! Payment rows.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use soko_core::{PaymentId, PaymentMethod, PaymentPurpose, PaymentStatus, UserId};

use super::PgStore;
use crate::db::{PaymentStore, RepositoryError};
use crate::models::Payment;

#[derive(Debug, sqlx::FromRow)]
struct PaymentRow {
    id: PaymentId,
    payer_id: UserId,
    amount: Decimal,
    method: PaymentMethod,
    purpose: PaymentPurpose,
    status: PaymentStatus,
    reference: String,
    created_at: DateTime<Utc>,
    verified_at: Option<DateTime<Utc>>,
}

impl From<PaymentRow> for Payment {
    fn from(row: PaymentRow) -> Self {
        Self {
            id: row.id,
            payer_id: row.payer_id,
            amount: row.amount,
            method: row.method,
            purpose: row.purpose,
            status: row.status,
            reference: row.reference,
            created_at: row.created_at,
            verified_at: row.verified_at,
        }
    }
}

#[async_trait]
impl PaymentStore for PgStore {
    async fn get_payment(&self, id: PaymentId) -> Result<Option<Payment>, RepositoryError> {
        let row = sqlx::query_as::<_, PaymentRow>(
            r"
            SELECT id, payer_id, amount, method, purpose, status, reference, created_at, verified_at
            FROM soko.payment
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await?;

        Ok(row.map(Into::into))
    }

    async fn find_payment_by_reference(
        &self,
        reference: &str,
    ) -> Result<Option<Payment>, RepositoryError> {
        let row = sqlx::query_as::<_, PaymentRow>(
            r"
            SELECT id, payer_id, amount, method, purpose, status, reference, created_at, verified_at
            FROM soko.payment
            WHERE reference = $1
            ",
        )
        .bind(reference)
        .fetch_optional(self.pool())
        .await?;

        Ok(row.map(Into::into))
    }

    async fn list_payer_payments(&self, payer_id: UserId) -> Result<Vec<Payment>, RepositoryError> {
        let rows = sqlx::query_as::<_, PaymentRow>(
            r"
            SELECT id, payer_id, amount, method, purpose, status, reference, created_at, verified_at
            FROM soko.payment
            WHERE payer_id = $1
            ORDER BY created_at DESC
            ",
        )
        .bind(payer_id)
        .fetch_all(self.pool())
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn settle_payment(
        &self,
        id: PaymentId,
        status: PaymentStatus,
        at: DateTime<Utc>,
    ) -> Result<Option<Payment>, RepositoryError> {
        let row = sqlx::query_as::<_, PaymentRow>(
            r"
            UPDATE soko.payment
            SET status = $2,
                verified_at = CASE WHEN $2 = 'verified'::soko.payment_status THEN $3 ELSE verified_at END
            WHERE id = $1 AND status = 'pending'
            RETURNING id, payer_id, amount, method, purpose, status, reference, created_at, verified_at
            ",
        )
        .bind(id)
        .bind(status)
        .bind(at)
        .fetch_optional(self.pool())
        .await?;

        Ok(row.map(Into::into))
    }
}
