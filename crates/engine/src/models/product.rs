//! Catalog products and stock reservations.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use soko_core::{ProductId, ReservationId, ReservationStatus, UserId};

/// A sellable product and its stock count.
///
/// `stock` never goes negative and is only changed through the inventory
/// ledger. Products are never deleted; `active = false` is a soft removal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub seller_id: UserId,
    pub title: String,
    pub price: Decimal,
    pub stock: i32,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for listing a new product.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProduct {
    pub title: String,
    pub price: Decimal,
    pub stock: i32,
}

/// A committed, reversible stock decrement taken by one checkout attempt.
///
/// The unit price and seller are snapshotted when the stock is taken, so the
/// resulting order is insulated from later price changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockReservation {
    pub id: ReservationId,
    pub product_id: ProductId,
    pub seller_id: UserId,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub status: ReservationStatus,
    pub created_at: DateTime<Utc>,
}

impl StockReservation {
    /// `unit_price * quantity`, or `None` if it overflows.
    #[must_use]
    pub fn line_total(&self) -> Option<Decimal> {
        self.unit_price.checked_mul(Decimal::from(self.quantity))
    }
}

/// Result of a conditional stock decrement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReserveOutcome {
    /// Stock was decremented and the reservation recorded.
    Reserved(StockReservation),
    /// Not enough stock; nothing changed.
    Insufficient { available: i32 },
    /// The product exists but has been soft-removed.
    Inactive,
    /// No such product.
    Missing,
}
