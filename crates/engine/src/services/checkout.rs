//! Checkout: a cart becomes per-seller orders plus one payment record, or
//! nothing at all.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use soko_core::{Caller, PaymentMethod, ProductId, Role, UserId};

use super::require_role;
use crate::db::OrderStore;
use crate::error::{BookingError, Result};
use crate::events::DomainEvent;
use crate::models::{CartItem, MAX_AMOUNT, Order, OrderLine, Payment, StockReservation};
use crate::state::Engine;

/// A customer's cart at the moment of checkout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutRequest {
    pub items: Vec<CartItem>,
    /// `cash`, `mpesa_paybill` or `card`.
    pub payment_method: String,
    pub delivery_address: String,
}

/// Everything a successful checkout created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutReceipt {
    /// One order per seller, in order of first appearance in the cart.
    pub orders: Vec<Order>,
    pub payment: Payment,
    pub total_amount: Decimal,
    /// Whether the payment awaits external confirmation (every method but cash).
    pub requires_payment: bool,
}

/// Validated checkout input.
#[derive(Debug)]
struct Cart {
    customer_id: UserId,
    items: Vec<CartItem>,
    method: PaymentMethod,
    delivery_address: String,
}

/// Runs checkouts.
#[derive(Clone, Copy)]
pub struct CheckoutService<'a> {
    engine: &'a Engine,
}

impl<'a> CheckoutService<'a> {
    #[must_use]
    pub const fn new(engine: &'a Engine) -> Self {
        Self { engine }
    }

    /// Reserve every cart item, split the cart by seller, and persist the
    /// orders together with one pending payment.
    ///
    /// All-or-nothing: on any failure every reservation taken by this
    /// checkout is released before the error is returned. The sequence runs
    /// on its own task, so dropping the returned future does not interrupt
    /// compensation.
    ///
    /// # Errors
    ///
    /// - `Forbidden` unless the caller is a customer
    /// - `InvalidInput` for an empty cart, a non-positive quantity or a
    ///   blank delivery address
    /// - `InvalidPaymentMethod`
    /// - `ProductNotFound`, `InsufficientStock`
    /// - `Store` if persisting failed (stock already compensated)
    #[instrument(skip(self, caller, request), fields(customer_id = %caller.id, items = request.items.len()))]
    pub async fn checkout(
        &self,
        caller: &Caller,
        request: CheckoutRequest,
    ) -> Result<CheckoutReceipt> {
        require_role(caller, Role::Customer, "check out")?;
        let cart = validate(caller, request)?;

        let engine = self.engine.clone();
        tokio::spawn(async move { place(&engine, cart).await })
            .await
            .map_err(|e| BookingError::Internal(format!("checkout task failed: {e}")))?
    }
}

fn validate(caller: &Caller, request: CheckoutRequest) -> Result<Cart> {
    if request.items.is_empty() {
        return Err(BookingError::InvalidInput("cart is empty".to_owned()));
    }
    let method: PaymentMethod = request.payment_method.parse()?;
    let delivery_address = request.delivery_address.trim();
    if delivery_address.is_empty() {
        return Err(BookingError::InvalidInput(
            "delivery address is required".to_owned(),
        ));
    }

    // Repeated products collapse into one line.
    let mut items: Vec<CartItem> = Vec::with_capacity(request.items.len());
    let mut index: HashMap<ProductId, usize> = HashMap::new();
    for item in request.items {
        if item.quantity <= 0 {
            return Err(BookingError::InvalidInput(format!(
                "quantity for product {} must be positive",
                item.product_id
            )));
        }
        if let Some(existing) = index.get(&item.product_id).and_then(|&i| items.get_mut(i)) {
            existing.quantity = existing.quantity.checked_add(item.quantity).ok_or_else(|| {
                BookingError::InvalidInput(format!(
                    "quantity for product {} is too large",
                    item.product_id
                ))
            })?;
        } else {
            index.insert(item.product_id, items.len());
            items.push(item);
        }
    }

    Ok(Cart {
        customer_id: caller.id,
        items,
        method,
        delivery_address: delivery_address.to_owned(),
    })
}

async fn place(engine: &Engine, cart: Cart) -> Result<CheckoutReceipt> {
    let ledger = engine.inventory();

    let mut held: Vec<StockReservation> = Vec::with_capacity(cart.items.len());
    for item in &cart.items {
        match ledger.reserve(item.product_id, item.quantity).await {
            Ok(reservation) => held.push(reservation),
            Err(e) => {
                tracing::warn!(product_id = %item.product_id, error = %e, "checkout rejected");
                release_all(engine, &held).await;
                return Err(e);
            }
        }
    }

    let (orders, total_amount) = match build_orders(&cart, &held, engine.now()) {
        Ok(built) => built,
        Err(e) => {
            tracing::warn!(error = %e, "checkout rejected");
            release_all(engine, &held).await;
            return Err(e);
        }
    };
    let Some(first) = orders.first() else {
        release_all(engine, &held).await;
        return Err(BookingError::Internal("checkout produced no orders".to_owned()));
    };
    let payment = Payment::for_checkout(
        cart.customer_id,
        total_amount,
        cart.method,
        first.id,
        first.created_at,
    );
    let reservation_ids: Vec<_> = held.iter().map(|r| r.id).collect();

    if let Err(e) = engine
        .store()
        .place_orders(&orders, &payment, &reservation_ids)
        .await
    {
        tracing::warn!(error = %e, "placing orders failed, releasing stock");
        // Release only touches reservations still held, so this is safe even
        // if the store applied the write before reporting the failure.
        release_all(engine, &held).await;
        return Err(e.into());
    }

    let requires_payment = cart.method.requires_confirmation();
    tracing::info!(
        orders = orders.len(),
        payment_id = %payment.id,
        %total_amount,
        "checkout placed"
    );
    engine.events().publish(DomainEvent::OrdersPlaced {
        customer_id: cart.customer_id,
        order_ids: orders.iter().map(|o| o.id).collect(),
        payment_id: payment.id,
        total_amount,
        requires_payment,
    });

    Ok(CheckoutReceipt {
        orders,
        payment,
        total_amount,
        requires_payment,
    })
}

/// One pending order per seller and the grand total of the checkout.
fn build_orders(
    cart: &Cart,
    held: &[StockReservation],
    at: DateTime<Utc>,
) -> Result<(Vec<Order>, Decimal)> {
    let too_large = || BookingError::InvalidInput(format!("order total exceeds {MAX_AMOUNT}"));

    let mut orders = Vec::new();
    let mut total_amount = Decimal::ZERO;
    for (seller_id, lines) in split_by_seller(held).ok_or_else(too_large)? {
        let order = Order::pending(
            cart.customer_id,
            seller_id,
            lines,
            cart.method,
            cart.delivery_address.clone(),
            at,
        )
        .ok_or_else(too_large)?;
        total_amount = total_amount
            .checked_add(order.total_amount)
            .filter(|total| *total <= MAX_AMOUNT)
            .ok_or_else(too_large)?;
        orders.push(order);
    }
    Ok((orders, total_amount))
}

/// Group reserved lines by seller, keeping first-appearance order.
///
/// Returns `None` if a line total overflows.
fn split_by_seller(held: &[StockReservation]) -> Option<Vec<(UserId, Vec<OrderLine>)>> {
    let mut groups: Vec<(UserId, Vec<OrderLine>)> = Vec::new();
    for reservation in held {
        let line = OrderLine {
            product_id: reservation.product_id,
            unit_price: reservation.unit_price,
            quantity: reservation.quantity,
            line_total: reservation.line_total()?,
        };
        match groups.iter_mut().find(|(seller, _)| *seller == reservation.seller_id) {
            Some((_, lines)) => lines.push(line),
            None => groups.push((reservation.seller_id, vec![line])),
        }
    }
    Some(groups)
}

async fn release_all(engine: &Engine, held: &[StockReservation]) {
    let ledger = engine.inventory();
    for reservation in held {
        if let Err(e) = ledger.release(reservation.id).await {
            // Left held; the stale-reservation sweep will return it.
            tracing::error!(
                reservation_id = %reservation.id,
                product_id = %reservation.product_id,
                error = %e,
                "failed to release reservation"
            );
        }
    }
}
