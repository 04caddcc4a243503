//! Checkout is all-or-nothing: either every order and the payment exist and
//! stock is decremented, or nothing changed.

#![allow(clippy::unwrap_used)]

use rust_decimal::Decimal;

use soko_core::{OrderStatus, PaymentMethod, PaymentStatus};
use soko_engine::models::CartItem;
use soko_engine::services::CheckoutRequest;
use soko_engine::{BookingError, ErrorKind};
use soko_integration_tests::{TestContext, admin, customer, list_product, seller, stock_of};

fn request(items: Vec<CartItem>, method: &str) -> CheckoutRequest {
    CheckoutRequest {
        items,
        payment_method: method.to_owned(),
        delivery_address: "Moi Avenue, Mombasa".to_owned(),
    }
}

#[tokio::test]
async fn test_multi_seller_cart_splits_into_orders_with_one_payment() {
    let ctx = TestContext::new();
    let (alice, bob) = (seller(), seller());
    let flour = list_product(&ctx.engine, &alice, Decimal::new(18_000, 2), 10).await.unwrap();
    let oil = list_product(&ctx.engine, &alice, Decimal::new(32_000, 2), 10).await.unwrap();
    let jiko = list_product(&ctx.engine, &bob, Decimal::from(1200), 2).await.unwrap();

    let buyer = customer();
    let receipt = ctx
        .engine
        .checkout()
        .checkout(
            &buyer,
            request(
                vec![
                    CartItem::new(flour.id, 2),
                    CartItem::new(jiko.id, 1),
                    CartItem::new(oil.id, 1),
                ],
                "mpesa_paybill",
            ),
        )
        .await
        .unwrap();

    assert_eq!(receipt.orders.len(), 2);
    let first = receipt.orders.first().unwrap();
    assert_eq!(first.seller_id, alice.id);
    assert_eq!(first.line_items.len(), 2);
    assert_eq!(first.total_amount, Decimal::from(680));
    assert_eq!(receipt.total_amount, Decimal::from(1880));
    assert!(receipt.requires_payment);

    assert_eq!(receipt.payment.method, PaymentMethod::MpesaPaybill);
    assert_eq!(receipt.payment.status, PaymentStatus::Pending);
    assert_eq!(receipt.payment.amount, receipt.total_amount);
    assert_eq!(receipt.payment.reference, format!("ORDER_{}", first.id));

    assert_eq!(stock_of(&ctx.engine, &alice, &flour).await.unwrap(), 8);
    assert_eq!(stock_of(&ctx.engine, &bob, &jiko).await.unwrap(), 1);
    assert_eq!(ctx.engine.fulfillment().list_my_orders(&buyer).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_short_item_releases_earlier_reservations() {
    let ctx = TestContext::new();
    let owner = seller();
    let plenty = list_product(&ctx.engine, &owner, Decimal::from(10), 5).await.unwrap();
    let scarce = list_product(&ctx.engine, &owner, Decimal::from(10), 1).await.unwrap();

    let buyer = customer();
    let err = ctx
        .engine
        .checkout()
        .checkout(
            &buyer,
            request(vec![CartItem::new(plenty.id, 3), CartItem::new(scarce.id, 2)], "cash"),
        )
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        BookingError::InsufficientStock { requested: 2, available: 1, .. }
    ));
    assert_eq!(stock_of(&ctx.engine, &owner, &plenty).await.unwrap(), 5);
    assert_eq!(stock_of(&ctx.engine, &owner, &scarce).await.unwrap(), 1);
    assert!(ctx.engine.fulfillment().list_my_orders(&buyer).await.unwrap().is_empty());
    assert!(ctx.engine.payments().list_my_payments(&buyer).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_failed_persist_restores_stock() {
    let ctx = TestContext::new();
    let owner = seller();
    let product = list_product(&ctx.engine, &owner, Decimal::from(75), 4).await.unwrap();

    ctx.store.fail_next_place_orders();

    let buyer = customer();
    let err = ctx
        .engine
        .checkout()
        .checkout(&buyer, request(vec![CartItem::new(product.id, 3)], "card"))
        .await
        .unwrap_err();

    assert!(matches!(err, BookingError::Store(_)));
    assert_eq!(stock_of(&ctx.engine, &owner, &product).await.unwrap(), 4);
    assert!(ctx.engine.fulfillment().list_my_orders(&buyer).await.unwrap().is_empty());

    // The injected failure is one-shot.
    let receipt = ctx
        .engine
        .checkout()
        .checkout(&buyer, request(vec![CartItem::new(product.id, 3)], "card"))
        .await
        .unwrap();
    assert_eq!(receipt.orders.len(), 1);
    assert_eq!(stock_of(&ctx.engine, &owner, &product).await.unwrap(), 1);
}

#[tokio::test]
async fn test_inactive_product_blocks_checkout() {
    let ctx = TestContext::new();
    let owner = seller();
    let product = list_product(&ctx.engine, &owner, Decimal::from(20), 9).await.unwrap();
    ctx.engine.catalog().deactivate(&owner, product.id).await.unwrap();

    let err = ctx
        .engine
        .checkout()
        .checkout(&customer(), request(vec![CartItem::new(product.id, 1)], "cash"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(stock_of(&ctx.engine, &owner, &product).await.unwrap(), 9);
}

#[tokio::test]
async fn test_rejected_before_any_reservation() {
    let ctx = TestContext::new();
    let owner = seller();
    let product = list_product(&ctx.engine, &owner, Decimal::from(20), 9).await.unwrap();

    let bad_method = ctx
        .engine
        .checkout()
        .checkout(&customer(), request(vec![CartItem::new(product.id, 1)], "bitcoin"))
        .await
        .unwrap_err();
    assert!(matches!(bad_method, BookingError::InvalidPaymentMethod(_)));

    let not_customer = ctx
        .engine
        .checkout()
        .checkout(&admin(), request(vec![CartItem::new(product.id, 1)], "cash"))
        .await
        .unwrap_err();
    assert!(matches!(not_customer, BookingError::Forbidden { .. }));

    assert_eq!(stock_of(&ctx.engine, &owner, &product).await.unwrap(), 9);
}

#[tokio::test]
async fn test_confirming_order_payment_leaves_orders_pending() {
    let ctx = TestContext::new();
    let owner = seller();
    let product = list_product(&ctx.engine, &owner, Decimal::from(20), 9).await.unwrap();
    let buyer = customer();
    let receipt = ctx
        .engine
        .checkout()
        .checkout(&buyer, request(vec![CartItem::new(product.id, 1)], "card"))
        .await
        .unwrap();

    let settled = ctx
        .engine
        .payments()
        .confirm_payment(&admin(), receipt.payment.id, PaymentStatus::Verified)
        .await
        .unwrap();
    assert_eq!(settled.status, PaymentStatus::Verified);
    assert!(settled.verified_at.is_some());

    let order = receipt.orders.first().unwrap();
    let stored = ctx.engine.fulfillment().get_order(&buyer, order.id).await.unwrap();
    assert_eq!(stored.status, OrderStatus::Pending);
}
