//! In-process store for tests and demos.
//!
//! Stock and rides live in `DashMap`s; every conditional write happens while
//! holding the entry's shard lock, which serializes writers per key the same
//! way a row lock does in `PostgreSQL`. Orders and payments share one
//! `parking_lot::RwLock` so multi-row units (placing a checkout, completing a
//! ride, cancelling an order) are atomic to readers of the ledger.
//!
//! Lock order: the ledger lock before any map entry. No code path holds two
//! map entries at the same time.

use std::collections::HashMap;
#[cfg(feature = "test-util")]
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use rust_decimal::Decimal;

use soko_core::{
    OrderId, OrderStatus, PaymentId, PaymentStatus, ProductId, ReservationId, ReservationStatus,
    RideId, RideStatus, UserId,
};

use super::{
    DriverStore, InventoryStore, OrderStore, PaymentStore, RepositoryError, RideActor, RideStore,
};
use crate::models::{
    DriverAvailability, Order, Payment, Product, ReserveOutcome, Ride, StockReservation,
};

#[derive(Debug, Default)]
struct Ledger {
    orders: HashMap<OrderId, Order>,
    payments: HashMap<PaymentId, Payment>,
    references: HashMap<String, PaymentId>,
}

impl Ledger {
    fn insert_payment(&mut self, payment: Payment) -> Result<(), RepositoryError> {
        if self.references.contains_key(&payment.reference) {
            return Err(RepositoryError::Conflict("payment already exists".to_owned()));
        }
        self.references.insert(payment.reference.clone(), payment.id);
        self.payments.insert(payment.id, payment);
        Ok(())
    }
}

/// Store that keeps everything in process memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    products: DashMap<ProductId, Product>,
    reservations: DashMap<ReservationId, StockReservation>,
    rides: DashMap<RideId, Ride>,
    drivers: DashMap<UserId, DriverAvailability>,
    ledger: RwLock<Ledger>,
    #[cfg(feature = "test-util")]
    fail_next_place_orders: AtomicBool,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `place_orders` call fail with a transient error
    /// without writing anything.
    #[cfg(feature = "test-util")]
    pub fn fail_next_place_orders(&self) {
        self.fail_next_place_orders.store(true, Ordering::SeqCst);
    }

    #[cfg(feature = "test-util")]
    fn take_injected_failure(&self) -> bool {
        self.fail_next_place_orders.swap(false, Ordering::SeqCst)
    }

    #[cfg(not(feature = "test-util"))]
    #[allow(clippy::unused_self)]
    const fn take_injected_failure(&self) -> bool {
        false
    }

    /// Flip a reservation out of `held`, returning its product and quantity.
    fn resolve_held(
        &self,
        id: ReservationId,
        to: ReservationStatus,
    ) -> Option<(ProductId, i32)> {
        let mut reservation = self.reservations.get_mut(&id)?;
        if reservation.status != ReservationStatus::Held {
            return None;
        }
        reservation.status = to;
        Some((reservation.product_id, reservation.quantity))
    }

    /// Return units taken earlier. Saturates at `i32::MAX`.
    fn add_stock(&self, product_id: ProductId, quantity: i32) {
        if let Some(mut product) = self.products.get_mut(&product_id) {
            product.stock = product.stock.checked_add(quantity).unwrap_or_else(|| {
                tracing::warn!(%product_id, quantity, "returned stock saturated");
                i32::MAX
            });
            product.updated_at = Utc::now();
        }
    }

    fn update_owned_product(
        &self,
        id: ProductId,
        seller_id: UserId,
        apply: impl FnOnce(&mut Product) -> Result<(), RepositoryError>,
    ) -> Result<Option<Product>, RepositoryError> {
        let Some(mut product) = self.products.get_mut(&id) else {
            return Ok(None);
        };
        if product.seller_id != seller_id {
            return Ok(None);
        }
        apply(&mut product)?;
        product.updated_at = Utc::now();
        Ok(Some(product.clone()))
    }
}

fn newest_first<T>(mut items: Vec<T>, created_at: impl Fn(&T) -> DateTime<Utc>) -> Vec<T> {
    items.sort_by_key(|item| std::cmp::Reverse(created_at(item)));
    items
}

// =============================================================================
// Inventory
// =============================================================================

#[async_trait]
impl InventoryStore for MemoryStore {
    async fn insert_product(&self, product: &Product) -> Result<(), RepositoryError> {
        if self.products.contains_key(&product.id) {
            return Err(RepositoryError::Conflict("product already exists".to_owned()));
        }
        self.products.insert(product.id, product.clone());
        Ok(())
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        Ok(self.products.get(&id).map(|p| p.clone()))
    }

    async fn list_seller_products(
        &self,
        seller_id: UserId,
    ) -> Result<Vec<Product>, RepositoryError> {
        let products = self
            .products
            .iter()
            .filter(|p| p.seller_id == seller_id)
            .map(|p| p.clone())
            .collect();
        Ok(newest_first(products, |p| p.created_at))
    }

    async fn update_price(
        &self,
        id: ProductId,
        seller_id: UserId,
        price: Decimal,
    ) -> Result<Option<Product>, RepositoryError> {
        self.update_owned_product(id, seller_id, |p| {
            p.price = price;
            Ok(())
        })
    }

    async fn set_active(
        &self,
        id: ProductId,
        seller_id: UserId,
        active: bool,
    ) -> Result<Option<Product>, RepositoryError> {
        self.update_owned_product(id, seller_id, |p| {
            p.active = active;
            Ok(())
        })
    }

    async fn restock(
        &self,
        id: ProductId,
        seller_id: UserId,
        quantity: i32,
    ) -> Result<Option<Product>, RepositoryError> {
        self.update_owned_product(id, seller_id, |p| {
            p.stock = p
                .stock
                .checked_add(quantity)
                .ok_or_else(|| RepositoryError::OutOfRange("stock".to_owned()))?;
            Ok(())
        })
    }

    async fn reserve_stock(
        &self,
        reservation_id: ReservationId,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<ReserveOutcome, RepositoryError> {
        let reservation = {
            let Some(mut product) = self.products.get_mut(&product_id) else {
                return Ok(ReserveOutcome::Missing);
            };
            if !product.active {
                return Ok(ReserveOutcome::Inactive);
            }
            if product.stock < quantity {
                return Ok(ReserveOutcome::Insufficient {
                    available: product.stock,
                });
            }
            product.stock -= quantity;
            product.updated_at = Utc::now();

            StockReservation {
                id: reservation_id,
                product_id,
                seller_id: product.seller_id,
                quantity,
                unit_price: product.price,
                status: ReservationStatus::Held,
                created_at: Utc::now(),
            }
        };

        self.reservations.insert(reservation_id, reservation.clone());
        Ok(ReserveOutcome::Reserved(reservation))
    }

    async fn release_reservation(&self, id: ReservationId) -> Result<bool, RepositoryError> {
        let Some((product_id, quantity)) = self.resolve_held(id, ReservationStatus::Released)
        else {
            return Ok(false);
        };
        self.add_stock(product_id, quantity);
        Ok(true)
    }

    async fn get_reservation(
        &self,
        id: ReservationId,
    ) -> Result<Option<StockReservation>, RepositoryError> {
        Ok(self.reservations.get(&id).map(|r| r.clone()))
    }

    async fn release_stale_reservations(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, RepositoryError> {
        let stale: Vec<ReservationId> = self
            .reservations
            .iter()
            .filter(|r| r.status == ReservationStatus::Held && r.created_at < cutoff)
            .map(|r| r.id)
            .collect();

        let mut released = 0;
        for id in stale {
            if self.release_reservation(id).await? {
                released += 1;
            }
        }
        Ok(released)
    }
}

// =============================================================================
// Orders
// =============================================================================

#[async_trait]
impl OrderStore for MemoryStore {
    async fn place_orders(
        &self,
        orders: &[Order],
        payment: &Payment,
        reservations: &[ReservationId],
    ) -> Result<(), RepositoryError> {
        if self.take_injected_failure() {
            return Err(RepositoryError::Unavailable(
                "injected place_orders failure".to_owned(),
            ));
        }

        let mut ledger = self.ledger.write();

        if ledger.references.contains_key(&payment.reference)
            || orders.iter().any(|o| ledger.orders.contains_key(&o.id))
        {
            return Err(RepositoryError::Conflict("checkout already placed".to_owned()));
        }

        let mut committed = Vec::with_capacity(reservations.len());
        for id in reservations {
            if self.resolve_held(*id, ReservationStatus::Committed).is_some() {
                committed.push(*id);
            } else {
                // Undo the flips made so far; nothing else was written yet.
                for done in committed {
                    if let Some(mut reservation) = self.reservations.get_mut(&done) {
                        reservation.status = ReservationStatus::Held;
                    }
                }
                return Err(RepositoryError::Conflict(
                    "reservation no longer held".to_owned(),
                ));
            }
        }

        for order in orders {
            ledger.orders.insert(order.id, order.clone());
        }
        ledger.insert_payment(payment.clone())
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        Ok(self.ledger.read().orders.get(&id).cloned())
    }

    async fn list_customer_orders(
        &self,
        customer_id: UserId,
    ) -> Result<Vec<Order>, RepositoryError> {
        let orders = self
            .ledger
            .read()
            .orders
            .values()
            .filter(|o| o.customer_id == customer_id)
            .cloned()
            .collect();
        Ok(newest_first(orders, |o| o.created_at))
    }

    async fn list_seller_orders(&self, seller_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        let orders = self
            .ledger
            .read()
            .orders
            .values()
            .filter(|o| o.seller_id == seller_id)
            .cloned()
            .collect();
        Ok(newest_first(orders, |o| o.created_at))
    }

    async fn advance_order(
        &self,
        id: OrderId,
        seller_id: UserId,
        from: &[OrderStatus],
        to: OrderStatus,
        at: DateTime<Utc>,
    ) -> Result<Option<Order>, RepositoryError> {
        let mut ledger = self.ledger.write();
        let Some(order) = ledger.orders.get_mut(&id) else {
            return Ok(None);
        };
        if order.seller_id != seller_id || !from.contains(&order.status) {
            return Ok(None);
        }
        order.status = to;
        order.updated_at = at;
        Ok(Some(order.clone()))
    }

    async fn cancel_order(
        &self,
        id: OrderId,
        seller_id: UserId,
        from: &[OrderStatus],
        at: DateTime<Utc>,
    ) -> Result<Option<Order>, RepositoryError> {
        let mut ledger = self.ledger.write();
        let Some(order) = ledger.orders.get_mut(&id) else {
            return Ok(None);
        };
        if order.seller_id != seller_id || !from.contains(&order.status) {
            return Ok(None);
        }
        order.status = OrderStatus::Cancelled;
        order.updated_at = at;
        let order = order.clone();

        for line in &order.line_items {
            self.add_stock(line.product_id, line.quantity);
        }
        Ok(Some(order))
    }
}

// =============================================================================
// Rides
// =============================================================================

#[async_trait]
impl RideStore for MemoryStore {
    async fn insert_ride(&self, ride: &Ride) -> Result<(), RepositoryError> {
        if self.rides.contains_key(&ride.id) {
            return Err(RepositoryError::Conflict("ride already exists".to_owned()));
        }
        self.rides.insert(ride.id, ride.clone());
        Ok(())
    }

    async fn get_ride(&self, id: RideId) -> Result<Option<Ride>, RepositoryError> {
        Ok(self.rides.get(&id).map(|r| r.clone()))
    }

    async fn accept_ride(
        &self,
        id: RideId,
        driver_id: UserId,
        at: DateTime<Utc>,
    ) -> Result<Option<Ride>, RepositoryError> {
        let Some(mut ride) = self.rides.get_mut(&id) else {
            return Ok(None);
        };
        if ride.status != RideStatus::Pending {
            return Ok(None);
        }
        ride.driver_id = Some(driver_id);
        ride.mark(RideStatus::Confirmed, at);
        Ok(Some(ride.clone()))
    }

    async fn transition_ride(
        &self,
        id: RideId,
        actor: RideActor,
        from: &[RideStatus],
        to: RideStatus,
        at: DateTime<Utc>,
    ) -> Result<Option<Ride>, RepositoryError> {
        let Some(mut ride) = self.rides.get_mut(&id) else {
            return Ok(None);
        };
        let owned = match actor {
            RideActor::Driver(driver_id) => ride.driver_id == Some(driver_id),
            RideActor::Customer(customer_id) => ride.customer_id == customer_id,
        };
        if !owned || !from.contains(&ride.status) {
            return Ok(None);
        }
        ride.mark(to, at);
        Ok(Some(ride.clone()))
    }

    async fn complete_ride(
        &self,
        id: RideId,
        driver_id: UserId,
        payment_id: PaymentId,
        at: DateTime<Utc>,
    ) -> Result<Option<(Ride, Payment)>, RepositoryError> {
        let mut ledger = self.ledger.write();

        let ride = {
            let Some(mut ride) = self.rides.get_mut(&id) else {
                return Ok(None);
            };
            if ride.driver_id != Some(driver_id)
                || !ride.status.can_transition_to(RideStatus::Completed)
            {
                return Ok(None);
            }
            ride.mark(RideStatus::Completed, at);
            ride.clone()
        };

        let payment = Payment::for_completed_ride(payment_id, &ride, at);
        ledger.insert_payment(payment.clone())?;
        Ok(Some((ride, payment)))
    }

    async fn list_pending_rides(&self, limit: i64) -> Result<Vec<Ride>, RepositoryError> {
        let pending = self
            .rides
            .iter()
            .filter(|r| r.status == RideStatus::Pending)
            .map(|r| r.clone())
            .collect();
        let mut rides = newest_first(pending, |r| r.created_at);
        rides.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(rides)
    }

    async fn list_customer_rides(&self, customer_id: UserId) -> Result<Vec<Ride>, RepositoryError> {
        let rides = self
            .rides
            .iter()
            .filter(|r| r.customer_id == customer_id)
            .map(|r| r.clone())
            .collect();
        Ok(newest_first(rides, |r| r.created_at))
    }

    async fn list_driver_rides(&self, driver_id: UserId) -> Result<Vec<Ride>, RepositoryError> {
        let rides = self
            .rides
            .iter()
            .filter(|r| r.driver_id == Some(driver_id))
            .map(|r| r.clone())
            .collect();
        Ok(newest_first(rides, |r| r.created_at))
    }
}

// =============================================================================
// Payments
// =============================================================================

#[async_trait]
impl PaymentStore for MemoryStore {
    async fn get_payment(&self, id: PaymentId) -> Result<Option<Payment>, RepositoryError> {
        Ok(self.ledger.read().payments.get(&id).cloned())
    }

    async fn find_payment_by_reference(
        &self,
        reference: &str,
    ) -> Result<Option<Payment>, RepositoryError> {
        let ledger = self.ledger.read();
        Ok(ledger
            .references
            .get(reference)
            .and_then(|id| ledger.payments.get(id))
            .cloned())
    }

    async fn list_payer_payments(&self, payer_id: UserId) -> Result<Vec<Payment>, RepositoryError> {
        let payments = self
            .ledger
            .read()
            .payments
            .values()
            .filter(|p| p.payer_id == payer_id)
            .cloned()
            .collect();
        Ok(newest_first(payments, |p| p.created_at))
    }

    async fn settle_payment(
        &self,
        id: PaymentId,
        status: PaymentStatus,
        at: DateTime<Utc>,
    ) -> Result<Option<Payment>, RepositoryError> {
        let mut ledger = self.ledger.write();
        let Some(payment) = ledger.payments.get_mut(&id) else {
            return Ok(None);
        };
        if payment.status != PaymentStatus::Pending {
            return Ok(None);
        }
        payment.status = status;
        if status == PaymentStatus::Verified {
            payment.verified_at = Some(at);
        }
        Ok(Some(payment.clone()))
    }
}

// =============================================================================
// Drivers
// =============================================================================

#[async_trait]
impl DriverStore for MemoryStore {
    async fn upsert_driver(
        &self,
        driver: &DriverAvailability,
    ) -> Result<DriverAvailability, RepositoryError> {
        let record = self
            .drivers
            .entry(driver.driver_id)
            .and_modify(|existing| {
                existing.verified = driver.verified;
                existing.subscription_expiry = driver.subscription_expiry;
                existing.updated_at = driver.updated_at;
            })
            .or_insert_with(|| driver.clone());
        Ok(record.clone())
    }

    async fn get_driver(&self, id: UserId) -> Result<Option<DriverAvailability>, RepositoryError> {
        Ok(self.drivers.get(&id).map(|d| d.clone()))
    }

    async fn set_driver_online(
        &self,
        id: UserId,
        online: bool,
        at: DateTime<Utc>,
    ) -> Result<Option<DriverAvailability>, RepositoryError> {
        let Some(mut driver) = self.drivers.get_mut(&id) else {
            return Ok(None);
        };
        driver.online = online;
        driver.updated_at = at;
        Ok(Some(driver.clone()))
    }

    async fn count_eligible_drivers(&self, today: NaiveDate) -> Result<i64, RepositoryError> {
        let count = self.drivers.iter().filter(|d| d.is_eligible(today)).count();
        i64::try_from(count).map_err(|e| RepositoryError::DataCorruption(e.to_string()))
    }
}
