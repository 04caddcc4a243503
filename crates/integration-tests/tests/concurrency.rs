//! Racing writers against the in-memory store.
//!
//! Every test here drives many tasks at one piece of shared state and checks
//! that exactly the expected number of them won.

#![allow(clippy::unwrap_used)]

use rust_decimal::Decimal;
use tokio::task::JoinSet;

use soko_core::{RideStatus, UserId};
use soko_engine::BookingError;
use soko_engine::models::{CartItem, RideRequest};
use soko_engine::services::CheckoutRequest;
use soko_integration_tests::{TestContext, customer, list_product, online_driver, seller, stock_of};

fn ride_request() -> RideRequest {
    RideRequest {
        pickup: "Westlands".to_owned(),
        destination: "Kilimani".to_owned(),
        distance_km: Decimal::from(9),
        category: soko_core::CarCategory::Medium,
    }
}

fn cart(product_id: soko_core::ProductId, quantity: i32) -> CheckoutRequest {
    CheckoutRequest {
        items: vec![CartItem::new(product_id, quantity)],
        payment_method: "cash".to_owned(),
        delivery_address: "Ngong Road, Nairobi".to_owned(),
    }
}

// =============================================================================
// Ride Assignment
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_exactly_one_driver_wins_a_ride() {
    let ctx = TestContext::new();
    let rider = customer();
    let ride = ctx.engine.rides().request(&rider, ride_request()).await.unwrap().ride;

    let mut drivers = Vec::new();
    for _ in 0..24 {
        drivers.push(online_driver(&ctx.engine).await.unwrap());
    }

    let mut tasks = JoinSet::new();
    for driver in drivers {
        let engine = ctx.engine.clone();
        tasks.spawn(async move {
            engine
                .rides()
                .accept(&driver, ride.id)
                .await
                .map(|accepted| (driver.id, accepted))
        });
    }

    let mut winners: Vec<UserId> = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined.unwrap() {
            Ok((driver_id, accepted)) => {
                assert_eq!(accepted.driver_id, Some(driver_id));
                winners.push(driver_id);
            }
            Err(BookingError::RideUnavailable(id)) => assert_eq!(id, ride.id),
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert_eq!(winners.len(), 1);

    let stored = ctx.engine.rides().get_ride(&rider, ride.id).await.unwrap();
    assert_eq!(stored.status, RideStatus::Confirmed);
    assert_eq!(stored.driver_id, winners.first().copied());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_driver_accepts_many_rides_independently() {
    let ctx = TestContext::new();
    let driver = online_driver(&ctx.engine).await.unwrap();

    let mut rides = Vec::new();
    for _ in 0..8 {
        let ride = ctx.engine.rides().request(&customer(), ride_request()).await.unwrap();
        rides.push(ride.ride.id);
    }

    let mut tasks = JoinSet::new();
    for ride_id in rides {
        let engine = ctx.engine.clone();
        let driver = driver.clone();
        tasks.spawn(async move { engine.rides().accept(&driver, ride_id).await });
    }
    while let Some(joined) = tasks.join_next().await {
        assert_eq!(joined.unwrap().unwrap().status, RideStatus::Confirmed);
    }
}

// =============================================================================
// Stock Reservation
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_checkouts_never_oversell() {
    let ctx = TestContext::new();
    let owner = seller();
    let product = list_product(&ctx.engine, &owner, Decimal::from(50), 10).await.unwrap();

    let mut tasks = JoinSet::new();
    for _ in 0..30 {
        let engine = ctx.engine.clone();
        let buyer = customer();
        tasks.spawn(async move { engine.checkout().checkout(&buyer, cart(product.id, 1)).await });
    }

    let mut placed = 0;
    let mut refused = 0;
    while let Some(joined) = tasks.join_next().await {
        match joined.unwrap() {
            Ok(receipt) => {
                assert_eq!(receipt.orders.len(), 1);
                placed += 1;
            }
            Err(BookingError::InsufficientStock { available, .. }) => {
                assert_eq!(available, 0);
                refused += 1;
            }
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(placed, 10);
    assert_eq!(refused, 20);
    assert_eq!(stock_of(&ctx.engine, &owner, &product).await.unwrap(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_reservations_sum_to_initial_stock() {
    let ctx = TestContext::new();
    let owner = seller();
    let product = list_product(&ctx.engine, &owner, Decimal::from(5), 100).await.unwrap();

    let mut tasks = JoinSet::new();
    for quantity in 1..=20 {
        let engine = ctx.engine.clone();
        tasks.spawn(async move { engine.inventory().reserve(product.id, quantity).await });
    }

    let mut reserved = 0;
    while let Some(joined) = tasks.join_next().await {
        if let Ok(reservation) = joined.unwrap() {
            reserved += reservation.quantity;
        }
    }

    let remaining = stock_of(&ctx.engine, &owner, &product).await.unwrap();
    assert!(remaining >= 0);
    assert_eq!(reserved + remaining, 100);
}
