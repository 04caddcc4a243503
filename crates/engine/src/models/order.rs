//! Orders produced by checkout.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use soko_core::{OrderId, OrderStatus, PaymentMethod, ProductId, UserId};

/// One requested line of a cart. Carts are not persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub product_id: ProductId,
    pub quantity: i32,
}

impl CartItem {
    #[must_use]
    pub const fn new(product_id: ProductId, quantity: i32) -> Self {
        Self {
            product_id,
            quantity,
        }
    }
}

/// A line item with its price snapshotted at reservation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_id: ProductId,
    pub unit_price: Decimal,
    pub quantity: i32,
    pub line_total: Decimal,
}

/// An order addressed to exactly one seller.
///
/// `total_amount` equals the sum of `line_items[*].line_total` at creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub customer_id: UserId,
    pub seller_id: UserId,
    pub line_items: Vec<OrderLine>,
    pub total_amount: Decimal,
    pub payment_method: PaymentMethod,
    pub delivery_address: String,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Build a pending order, deriving the total from its lines.
    ///
    /// Returns `None` if the total overflows.
    #[must_use]
    pub fn pending(
        customer_id: UserId,
        seller_id: UserId,
        line_items: Vec<OrderLine>,
        payment_method: PaymentMethod,
        delivery_address: String,
        at: DateTime<Utc>,
    ) -> Option<Self> {
        let total_amount = line_items
            .iter()
            .try_fold(Decimal::ZERO, |total, line| total.checked_add(line.line_total))?;
        Some(Self {
            id: OrderId::new(),
            customer_id,
            seller_id,
            line_items,
            total_amount,
            payment_method,
            delivery_address,
            status: OrderStatus::Pending,
            created_at: at,
            updated_at: at,
        })
    }
}
