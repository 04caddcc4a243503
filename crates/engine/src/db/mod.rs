//! Store access for the booking and fulfillment core.
//!
//! # Database: `soko` schema
//!
//! The store is the single source of truth for stock, rides, orders and
//! payments. Nothing in the engine caches a writable copy of that state across
//! calls; every check-and-mutate is expressed as one conditional write that
//! the store evaluates.
//!
//! ## Tables
//!
//! - `product` - Catalog rows and their stock counts
//! - `stock_reservation` - Stock decrements taken by in-flight checkouts
//! - `order` - Per-seller orders with snapshotted line items (JSONB)
//! - `payment` - Payment records for orders and rides
//! - `ride` - Ride requests and their lifecycle
//! - `driver` - Driver availability, synced from the identity service
//!
//! # Implementations
//!
//! - [`PgStore`] - `PostgreSQL` via sqlx, used in production
//! - [`MemoryStore`] - In-process maps with per-key locking, used by tests and demos
//!
//! # Migrations
//!
//! Migrations are stored in `crates/engine/migrations/` and run via:
//! ```bash
//! cargo run -p soko-cli -- migrate
//! ```

pub mod memory;
pub mod postgres;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use thiserror::Error;

use soko_core::{
    OrderId, OrderStatus, PaymentId, PaymentStatus, ProductId, ReservationId, RideId, RideStatus,
    UserId,
};

use crate::models::{
    DriverAvailability, Order, Payment, Product, ReserveOutcome, Ride, StockReservation,
};

pub use memory::MemoryStore;
pub use postgres::{PgStore, create_pool};

/// SQLSTATE codes that signal a retryable condition rather than a bad request.
const TRANSIENT_SQLSTATES: &[&str] = &[
    "40001", // serialization_failure
    "40P01", // deadlock_detected
    "55P03", // lock_not_available
    "57014", // query_canceled (statement_timeout)
    "57P01", // admin_shutdown
];

/// SQLSTATE `numeric_value_out_of_range`.
const NUMERIC_VALUE_OUT_OF_RANGE: &str = "22003";

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., duplicate payment reference).
    #[error("constraint violation: {0}")]
    Conflict(String),

    /// A write would push a value outside its column's range.
    #[error("value out of range: {0}")]
    OutOfRange(String),

    /// The store could not be reached or did not answer in time.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl RepositoryError {
    /// Whether retrying the same call may succeed.
    ///
    /// Only meaningful for single-statement or single-transaction operations;
    /// those either applied completely or not at all.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Unavailable(_) => true,
            Self::Database(err) => match err {
                sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => true,
                sqlx::Error::Database(db_err) => db_err
                    .code()
                    .is_some_and(|code| TRANSIENT_SQLSTATES.contains(&code.as_ref())),
                _ => false,
            },
            Self::DataCorruption(_) | Self::NotFound | Self::Conflict(_) | Self::OutOfRange(_) => {
                false
            }
        }
    }

    /// Map a sqlx error, turning numeric overflow (`22003`) into `OutOfRange`.
    pub(crate) fn from_update(err: sqlx::Error, what: &str) -> Self {
        if let sqlx::Error::Database(ref db_err) = err
            && db_err.code().as_deref() == Some(NUMERIC_VALUE_OUT_OF_RANGE)
        {
            return Self::OutOfRange(what.to_owned());
        }
        Self::Database(err)
    }

    /// Map a sqlx error, turning unique violations into `Conflict`.
    pub(crate) fn from_insert(err: sqlx::Error, what: &str) -> Self {
        if let sqlx::Error::Database(ref db_err) = err
            && db_err.is_unique_violation()
        {
            return Self::Conflict(format!("{what} already exists"));
        }
        Self::Database(err)
    }
}

/// Who is asking a ride to move, used to scope the conditional update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RideActor {
    /// Only matches rides bound to this driver.
    Driver(UserId),
    /// Only matches rides requested by this customer.
    Customer(UserId),
}

/// Product rows and the stock ledger.
#[async_trait]
pub trait InventoryStore: Send + Sync {
    /// Insert a new product.
    async fn insert_product(&self, product: &Product) -> Result<(), RepositoryError>;

    /// Get a product by ID, active or not.
    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError>;

    /// All products owned by a seller, newest first.
    async fn list_seller_products(&self, seller_id: UserId)
    -> Result<Vec<Product>, RepositoryError>;

    /// Change the list price of a product owned by `seller_id`.
    ///
    /// Returns `None` when no product with that ID belongs to the seller.
    async fn update_price(
        &self,
        id: ProductId,
        seller_id: UserId,
        price: Decimal,
    ) -> Result<Option<Product>, RepositoryError>;

    /// Toggle the soft-removal flag of a product owned by `seller_id`.
    async fn set_active(
        &self,
        id: ProductId,
        seller_id: UserId,
        active: bool,
    ) -> Result<Option<Product>, RepositoryError>;

    /// Add `quantity` units to the stock of a product owned by `seller_id`.
    ///
    /// Fails with `RepositoryError::OutOfRange`, changing nothing, if the new
    /// stock would not fit a 32-bit count.
    async fn restock(
        &self,
        id: ProductId,
        seller_id: UserId,
        quantity: i32,
    ) -> Result<Option<Product>, RepositoryError>;

    /// Decrement stock by `quantity` if and only if at least that much remains
    /// and the product is active, recording a `held` reservation.
    ///
    /// The check and the decrement are one indivisible step with respect to
    /// every other reservation on the same product.
    async fn reserve_stock(
        &self,
        reservation_id: ReservationId,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<ReserveOutcome, RepositoryError>;

    /// Give a `held` reservation's stock back and mark it `released`.
    ///
    /// Returns `false` (and changes nothing) if the reservation is unknown or
    /// no longer held, which makes release idempotent.
    async fn release_reservation(&self, id: ReservationId) -> Result<bool, RepositoryError>;

    /// Get a reservation by ID.
    async fn get_reservation(
        &self,
        id: ReservationId,
    ) -> Result<Option<StockReservation>, RepositoryError>;

    /// Release every reservation still `held` that was taken before `cutoff`.
    ///
    /// Returns the number of reservations released.
    async fn release_stale_reservations(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, RepositoryError>;
}

/// Orders and the checkout commit.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Persist a checkout in one atomic unit: insert all orders and the
    /// payment, and flip every listed reservation from `held` to `committed`.
    ///
    /// If any reservation is no longer held, nothing is written and
    /// `RepositoryError::Conflict` is returned.
    async fn place_orders(
        &self,
        orders: &[Order],
        payment: &Payment,
        reservations: &[ReservationId],
    ) -> Result<(), RepositoryError>;

    /// Get an order by ID.
    async fn get_order(&self, id: OrderId) -> Result<Option<Order>, RepositoryError>;

    /// Orders placed by a customer, newest first.
    async fn list_customer_orders(&self, customer_id: UserId)
    -> Result<Vec<Order>, RepositoryError>;

    /// Orders addressed to a seller, newest first.
    async fn list_seller_orders(&self, seller_id: UserId) -> Result<Vec<Order>, RepositoryError>;

    /// Move an order owned by `seller_id` to `to` if its status is one of `from`.
    async fn advance_order(
        &self,
        id: OrderId,
        seller_id: UserId,
        from: &[OrderStatus],
        to: OrderStatus,
        at: DateTime<Utc>,
    ) -> Result<Option<Order>, RepositoryError>;

    /// Cancel an order owned by `seller_id` whose status is one of `from`,
    /// returning its line quantities to stock in the same atomic unit.
    async fn cancel_order(
        &self,
        id: OrderId,
        seller_id: UserId,
        from: &[OrderStatus],
        at: DateTime<Utc>,
    ) -> Result<Option<Order>, RepositoryError>;
}

/// Ride rows and their lifecycle writes.
#[async_trait]
pub trait RideStore: Send + Sync {
    /// Insert a new ride.
    async fn insert_ride(&self, ride: &Ride) -> Result<(), RepositoryError>;

    /// Get a ride by ID.
    async fn get_ride(&self, id: RideId) -> Result<Option<Ride>, RepositoryError>;

    /// Bind `driver_id` and move `pending -> confirmed`, only if the ride is
    /// still pending at the moment of commit.
    ///
    /// Of any number of concurrent calls for one ride, at most one returns `Some`.
    async fn accept_ride(
        &self,
        id: RideId,
        driver_id: UserId,
        at: DateTime<Utc>,
    ) -> Result<Option<Ride>, RepositoryError>;

    /// Move a ride matching `actor` from one of `from` to `to`, stamping the
    /// timestamp that belongs to `to`.
    async fn transition_ride(
        &self,
        id: RideId,
        actor: RideActor,
        from: &[RideStatus],
        to: RideStatus,
        at: DateTime<Utc>,
    ) -> Result<Option<Ride>, RepositoryError>;

    /// Complete a ride bound to `driver_id` and record its verified cash
    /// payment in one atomic unit.
    async fn complete_ride(
        &self,
        id: RideId,
        driver_id: UserId,
        payment_id: PaymentId,
        at: DateTime<Utc>,
    ) -> Result<Option<(Ride, Payment)>, RepositoryError>;

    /// Newest pending rides, at most `limit`.
    async fn list_pending_rides(&self, limit: i64) -> Result<Vec<Ride>, RepositoryError>;

    /// Rides requested by a customer, newest first.
    async fn list_customer_rides(&self, customer_id: UserId) -> Result<Vec<Ride>, RepositoryError>;

    /// Rides bound to a driver, newest first.
    async fn list_driver_rides(&self, driver_id: UserId) -> Result<Vec<Ride>, RepositoryError>;
}

/// Payment rows.
#[async_trait]
pub trait PaymentStore: Send + Sync {
    /// Get a payment by ID.
    async fn get_payment(&self, id: PaymentId) -> Result<Option<Payment>, RepositoryError>;

    /// Get a payment by its external reference (`ORDER_<id>`, `RIDE_<id>`).
    async fn find_payment_by_reference(
        &self,
        reference: &str,
    ) -> Result<Option<Payment>, RepositoryError>;

    /// Payments made by a payer, newest first.
    async fn list_payer_payments(&self, payer_id: UserId) -> Result<Vec<Payment>, RepositoryError>;

    /// Move a `pending` payment to `status`. Returns `None` if the payment is
    /// unknown or already settled.
    async fn settle_payment(
        &self,
        id: PaymentId,
        status: PaymentStatus,
        at: DateTime<Utc>,
    ) -> Result<Option<Payment>, RepositoryError>;
}

/// Driver availability records.
#[async_trait]
pub trait DriverStore: Send + Sync {
    /// Insert or replace the verification and subscription data of a driver,
    /// keeping the current online flag of an existing record.
    async fn upsert_driver(&self, driver: &DriverAvailability)
    -> Result<DriverAvailability, RepositoryError>;

    /// Get a driver's availability record.
    async fn get_driver(&self, id: UserId) -> Result<Option<DriverAvailability>, RepositoryError>;

    /// Set a driver's online flag. Returns `None` if the driver is unknown.
    async fn set_driver_online(
        &self,
        id: UserId,
        online: bool,
        at: DateTime<Utc>,
    ) -> Result<Option<DriverAvailability>, RepositoryError>;

    /// Number of drivers that are online, verified, and subscribed past `today`.
    async fn count_eligible_drivers(&self, today: NaiveDate) -> Result<i64, RepositoryError>;
}

/// Everything the engine needs from its store.
pub trait Store: InventoryStore + OrderStore + RideStore + PaymentStore + DriverStore {}

impl<T> Store for T where T: InventoryStore + OrderStore + RideStore + PaymentStore + DriverStore {}

/// Store handle shared by every service.
pub type SharedStore = Arc<dyn Store>;
