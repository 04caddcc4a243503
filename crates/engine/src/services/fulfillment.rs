//! Seller-driven order fulfillment.
//!
//! `pending -> confirmed -> dispatched -> delivered`, and `cancelled` from any
//! non-terminal state. Cancelling gives the order's stock back in the same
//! unit as the status change.

use tracing::instrument;

use soko_core::{Caller, OrderId, OrderStatus, Role};

use super::require_role;
use crate::db::OrderStore;
use crate::error::{BookingError, Result};
use crate::events::DomainEvent;
use crate::models::Order;
use crate::state::Engine;

/// Order status transitions and order queries.
#[derive(Clone, Copy)]
pub struct FulfillmentService<'a> {
    engine: &'a Engine,
}

impl<'a> FulfillmentService<'a> {
    #[must_use]
    pub const fn new(engine: &'a Engine) -> Self {
        Self { engine }
    }

    /// Move an order of the calling seller to `target`.
    ///
    /// # Errors
    ///
    /// `Forbidden` unless the caller is a seller, `OrderNotFound`, `NotOwner`,
    /// or `InvalidTransition` (including any attempt to target `pending`).
    #[instrument(skip(self, caller), fields(seller_id = %caller.id, order_id = %order_id))]
    pub async fn update_status(
        &self,
        caller: &Caller,
        order_id: OrderId,
        target: OrderStatus,
    ) -> Result<Order> {
        require_role(caller, Role::Seller, "update orders")?;

        let from = OrderStatus::sources_for(target);
        if from.is_empty() {
            return Err(self.explain_miss(caller, order_id, target).await);
        }

        let now = self.engine.now();
        let store = self.engine.store();
        let updated = if target == OrderStatus::Cancelled {
            store.cancel_order(order_id, caller.id, from, now).await?
        } else {
            store.advance_order(order_id, caller.id, from, target, now).await?
        };

        let Some(order) = updated else {
            return Err(self.explain_miss(caller, order_id, target).await);
        };

        tracing::info!(status = %order.status, "order status changed");
        self.engine.events().publish(DomainEvent::OrderStatusChanged {
            order_id,
            customer_id: order.customer_id,
            status: order.status,
        });
        Ok(order)
    }

    /// Cancel an order and return its stock.
    ///
    /// # Errors
    ///
    /// Same as [`FulfillmentService::update_status`].
    pub async fn cancel(&self, caller: &Caller, order_id: OrderId) -> Result<Order> {
        self.update_status(caller, order_id, OrderStatus::Cancelled).await
    }

    /// Orders placed by the calling customer, newest first.
    ///
    /// # Errors
    ///
    /// `Forbidden` unless the caller is a customer.
    pub async fn list_my_orders(&self, caller: &Caller) -> Result<Vec<Order>> {
        require_role(caller, Role::Customer, "list own orders")?;
        Ok(self.engine.store().list_customer_orders(caller.id).await?)
    }

    /// Orders addressed to the calling seller, newest first.
    ///
    /// # Errors
    ///
    /// `Forbidden` unless the caller is a seller.
    pub async fn list_seller_orders(&self, caller: &Caller) -> Result<Vec<Order>> {
        require_role(caller, Role::Seller, "list seller orders")?;
        Ok(self.engine.store().list_seller_orders(caller.id).await?)
    }

    /// An order, visible to its customer, its seller and admins.
    ///
    /// # Errors
    ///
    /// `OrderNotFound` or `NotOwner`.
    pub async fn get_order(&self, caller: &Caller, order_id: OrderId) -> Result<Order> {
        let order = self
            .engine
            .store()
            .get_order(order_id)
            .await?
            .ok_or(BookingError::OrderNotFound(order_id))?;

        if caller.is(Role::Admin) || order.customer_id == caller.id || order.seller_id == caller.id
        {
            Ok(order)
        } else {
            Err(BookingError::NotOwner("order"))
        }
    }

    async fn explain_miss(
        &self,
        caller: &Caller,
        order_id: OrderId,
        target: OrderStatus,
    ) -> BookingError {
        match self.engine.store().get_order(order_id).await {
            Ok(None) => BookingError::OrderNotFound(order_id),
            Ok(Some(order)) if order.seller_id != caller.id => BookingError::NotOwner("order"),
            Ok(Some(order)) => {
                tracing::warn!(status = %order.status, %target, "rejected order transition");
                BookingError::invalid_transition("order", order.status, target)
            }
            Err(e) => e.into(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;

    use soko_core::ProductId;

    use super::*;
    use crate::db::InventoryStore;
    use crate::models::{CartItem, NewProduct};
    use crate::services::{CheckoutRequest, testing};

    struct Placed {
        engine: Engine,
        seller: Caller,
        customer: Caller,
        product: ProductId,
        order: Order,
    }

    async fn placed_order() -> Placed {
        let (engine, _rx) = testing::engine();
        let seller = testing::subscribed(Role::Seller);
        let customer = testing::customer();
        let product = engine
            .catalog()
            .create_product(
                &seller,
                NewProduct {
                    title: "Jiko".to_owned(),
                    price: Decimal::from(1200),
                    stock: 4,
                },
            )
            .await
            .unwrap()
            .id;
        let receipt = engine
            .checkout()
            .checkout(
                &customer,
                CheckoutRequest {
                    items: vec![CartItem::new(product, 3)],
                    payment_method: "card".to_owned(),
                    delivery_address: "Kisumu".to_owned(),
                },
            )
            .await
            .unwrap();
        let order = receipt.orders.into_iter().next().unwrap();
        Placed {
            engine,
            seller,
            customer,
            product,
            order,
        }
    }

    #[tokio::test]
    async fn test_happy_path() {
        let p = placed_order().await;
        let service = p.engine.fulfillment();

        for target in [
            OrderStatus::Confirmed,
            OrderStatus::Dispatched,
            OrderStatus::Delivered,
        ] {
            let order = service.update_status(&p.seller, p.order.id, target).await.unwrap();
            assert_eq!(order.status, target);
        }

        let err = service.cancel(&p.seller, p.order.id).await.unwrap_err();
        assert!(matches!(err, BookingError::InvalidTransition { entity: "order", .. }));
    }

    #[tokio::test]
    async fn test_cannot_skip_states() {
        let p = placed_order().await;
        let err = p
            .engine
            .fulfillment()
            .update_status(&p.seller, p.order.id, OrderStatus::Delivered)
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::InvalidTransition { .. }));

        let err = p
            .engine
            .fulfillment()
            .update_status(&p.seller, p.order.id, OrderStatus::Pending)
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn test_only_owning_seller() {
        let p = placed_order().await;
        let other = testing::subscribed(Role::Seller);

        assert!(matches!(
            p.engine
                .fulfillment()
                .update_status(&other, p.order.id, OrderStatus::Confirmed)
                .await,
            Err(BookingError::NotOwner("order"))
        ));
        assert!(matches!(
            p.engine
                .fulfillment()
                .update_status(&p.customer, p.order.id, OrderStatus::Confirmed)
                .await,
            Err(BookingError::Forbidden { .. })
        ));
        assert!(matches!(
            p.engine
                .fulfillment()
                .update_status(&p.seller, OrderId::new(), OrderStatus::Confirmed)
                .await,
            Err(BookingError::OrderNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_cancel_restocks() {
        let p = placed_order().await;
        let stock = |engine: &Engine| {
            let engine = engine.clone();
            let id = p.product;
            async move { engine.store().get_product(id).await.unwrap().unwrap().stock }
        };
        assert_eq!(stock(&p.engine).await, 1);

        p.engine
            .fulfillment()
            .update_status(&p.seller, p.order.id, OrderStatus::Confirmed)
            .await
            .unwrap();
        let cancelled = p.engine.fulfillment().cancel(&p.seller, p.order.id).await.unwrap();
        assert_eq!(cancelled.status, OrderStatus::Cancelled);
        assert_eq!(stock(&p.engine).await, 4);

        // Cancelling twice does not restock twice.
        assert!(p.engine.fulfillment().cancel(&p.seller, p.order.id).await.is_err());
        assert_eq!(stock(&p.engine).await, 4);
    }

    #[tokio::test]
    async fn test_queries_and_visibility() {
        let p = placed_order().await;
        let service = p.engine.fulfillment();

        assert_eq!(service.list_my_orders(&p.customer).await.unwrap().len(), 1);
        assert_eq!(service.list_seller_orders(&p.seller).await.unwrap().len(), 1);
        assert!(service.get_order(&p.customer, p.order.id).await.is_ok());
        assert!(service.get_order(&p.seller, p.order.id).await.is_ok());
        assert!(service.get_order(&testing::admin(), p.order.id).await.is_ok());
        assert!(matches!(
            service.get_order(&testing::customer(), p.order.id).await,
            Err(BookingError::NotOwner("order"))
        ));
    }
}
