//! Payment records.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use soko_core::{OrderId, PaymentId, PaymentMethod, PaymentPurpose, PaymentStatus, UserId};

use super::Ride;

/// A payment written by the core. Confirmation happens outside.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub payer_id: UserId,
    pub amount: Decimal,
    pub method: PaymentMethod,
    pub purpose: PaymentPurpose,
    pub status: PaymentStatus,
    /// External reference, unique across payments.
    pub reference: String,
    pub created_at: DateTime<Utc>,
    pub verified_at: Option<DateTime<Utc>>,
}

impl Payment {
    /// The single pending payment of a checkout, referencing its first order.
    #[must_use]
    pub fn for_checkout(
        payer_id: UserId,
        amount: Decimal,
        method: PaymentMethod,
        first_order: OrderId,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: PaymentId::new(),
            payer_id,
            amount,
            method,
            purpose: PaymentPurpose::Order,
            status: PaymentStatus::Pending,
            reference: format!("ORDER_{first_order}"),
            created_at: at,
            verified_at: None,
        }
    }

    /// The verified cash settlement of a completed ride, paid by its customer.
    #[must_use]
    pub fn for_completed_ride(id: PaymentId, ride: &Ride, at: DateTime<Utc>) -> Self {
        Self {
            id,
            payer_id: ride.customer_id,
            amount: ride.price,
            method: PaymentMethod::Cash,
            purpose: PaymentPurpose::Ride,
            status: PaymentStatus::Verified,
            reference: format!("RIDE_{}", ride.id),
            created_at: at,
            verified_at: Some(at),
        }
    }
}
