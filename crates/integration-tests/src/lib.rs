//! Integration tests for the Soko booking and fulfillment core.
//!
//! # Running Tests
//!
//! ```bash
//! # In-memory store only
//! cargo test -p soko-integration-tests
//!
//! # Also against PostgreSQL (migrations are applied on first connect)
//! SOKO_TEST_DATABASE_URL=postgres://localhost/soko_test cargo test -p soko-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `concurrency` - Racing accepts and reservations
//! - `checkout` - All-or-nothing checkout and compensation
//! - `lifecycle` - Ride and order state machines end to end
//! - `postgres` - The same guarantees against a real database

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::sync::Arc;

use chrono::{Days, NaiveDate, Utc};
use rust_decimal::Decimal;

use soko_core::{Caller, Role, UserId};
use soko_engine::models::{NewProduct, Product};
use soko_engine::{
    BookingError, DatabaseConfig, Engine, EngineSettings, MemoryStore, PgStore, create_pool,
};

/// Environment variable naming the database used by the `postgres` tests.
pub const TEST_DATABASE_URL: &str = "SOKO_TEST_DATABASE_URL";

/// An engine over an in-memory store, with a concrete handle to the store for
/// failure injection.
pub struct TestContext {
    pub engine: Engine,
    pub store: Arc<MemoryStore>,
}

impl TestContext {
    #[must_use]
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let engine = Engine::new(store.clone(), EngineSettings::default());
        Self { engine, store }
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

/// An engine over `PostgreSQL`, or `None` when no test database is configured.
///
/// # Errors
///
/// Returns an error if the database is configured but unreachable or the
/// migrations fail.
pub async fn pg_engine() -> Result<Option<Engine>, Box<dyn std::error::Error>> {
    let Ok(url) = std::env::var(TEST_DATABASE_URL) else {
        return Ok(None);
    };

    let config = DatabaseConfig::with_url(url);
    let pool = create_pool(&config).await?;
    sqlx::migrate!("../engine/migrations").run(&pool).await?;

    let engine = Engine::new(Arc::new(PgStore::new(pool)), EngineSettings::default());
    Ok(Some(engine))
}

/// A date comfortably after today.
#[must_use]
pub fn next_year() -> NaiveDate {
    Utc::now()
        .date_naive()
        .checked_add_days(Days::new(365))
        .unwrap_or(NaiveDate::MAX)
}

#[must_use]
pub fn customer() -> Caller {
    Caller::new(UserId::new(), Role::Customer)
}

#[must_use]
pub fn admin() -> Caller {
    Caller::new(UserId::new(), Role::Admin)
}

/// A verified seller with a year of subscription left.
#[must_use]
pub fn seller() -> Caller {
    Caller::new(UserId::new(), Role::Seller)
        .verified()
        .with_subscription(next_year())
}

/// A verified, subscribed driver who has registered and gone online.
///
/// # Errors
///
/// Propagates any service error.
pub async fn online_driver(engine: &Engine) -> Result<Caller, BookingError> {
    let driver = Caller::new(UserId::new(), Role::Driver)
        .verified()
        .with_subscription(next_year());
    engine.rides().register_driver(&driver).await?;
    engine.rides().set_online(&driver, true).await?;
    Ok(driver)
}

/// List a product for `seller`.
///
/// # Errors
///
/// Propagates any service error.
pub async fn list_product(
    engine: &Engine,
    seller: &Caller,
    price: Decimal,
    stock: i32,
) -> Result<Product, BookingError> {
    engine
        .catalog()
        .create_product(
            seller,
            NewProduct {
                title: "Sukuma wiki bunch".to_owned(),
                price,
                stock,
            },
        )
        .await
}

/// Current stock of a product, as its owner sees it.
///
/// # Errors
///
/// Propagates any service error.
pub async fn stock_of(
    engine: &Engine,
    seller: &Caller,
    product: &Product,
) -> Result<i32, BookingError> {
    Ok(engine.catalog().get_product(seller, product.id).await?.stock)
}
