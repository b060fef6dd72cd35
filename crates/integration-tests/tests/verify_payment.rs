//! Browser-side payment verification against a running storefront.
//!
//! These tests require:
//! - A migrated `PostgreSQL` database
//! - The storefront running with `RAZORPAY_KEY_ID`, `RAZORPAY_KEY_SECRET`
//!   and `RAZORPAY_WEBHOOK_SECRET` set to the same values as this process

use ayurmart_core::OrderId;
use ayurmart_integration_tests::{
    add_to_cart, base_url, client, lock_for_order, locks_held, order_state, payment_event,
    payment_id, pending_online_order, pool, post_webhook, register_customer, seed_product,
    sign_payment, sign_webhook, stock_of, user_id_of,
};
use reqwest::{Client, Response, StatusCode};
use rust_decimal::Decimal;
use serde_json::{Value, json};

async fn verify(
    client: &Client,
    order_id: OrderId,
    razorpay_order_id: &str,
    razorpay_payment_id: &str,
    signature: &str,
) -> Response {
    client
        .post(format!("{}/api/checkout/verify-payment", base_url()))
        .json(&json!({
            "orderId": order_id,
            "razorpay_order_id": razorpay_order_id,
            "razorpay_payment_id": razorpay_payment_id,
            "razorpay_signature": signature,
        }))
        .send()
        .await
        .expect("Failed to verify payment")
}

async fn cart_count(client: &Client) -> u64 {
    let cart: Value = client
        .get(format!("{}/api/cart", base_url()))
        .send()
        .await
        .expect("Failed to load cart")
        .json()
        .await
        .expect("Invalid cart");
    cart["itemCount"].as_u64().expect("cart has itemCount")
}

#[tokio::test]
#[ignore = "Requires running storefront and database"]
async fn test_bad_signature_is_rejected() {
    let db = pool().await;
    let product = seed_product(&db, "Trikatu Churna", Decimal::from(240), 10).await;
    let client = client();
    let customer = user_id_of(&register_customer(&client).await);
    let (order_id, razorpay_order_id) = pending_online_order(&db, customer, product, 1).await;

    let resp = verify(&client, order_id, &razorpay_order_id, &payment_id(), "deadbeef").await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(order_state(&db, order_id).await, ("pending".to_string(), "pending".to_string()));
    assert_eq!(stock_of(&db, product).await, 10);
}

#[tokio::test]
#[ignore = "Requires running storefront and database"]
async fn test_verified_payment_finalizes_once_with_webhook() {
    let db = pool().await;
    let product = seed_product(&db, "Dashmool Kwath", Decimal::from(240), 12).await;
    let client = client();
    let customer = user_id_of(&register_customer(&client).await);
    add_to_cart(&client, product, 2).await;

    let (order_id, razorpay_order_id) = pending_online_order(&db, customer, product, 2).await;
    lock_for_order(&db, customer, product, order_id, 2).await;
    let paid_with = payment_id();

    let resp = verify(
        &client,
        order_id,
        &razorpay_order_id,
        &paid_with,
        &sign_payment(&razorpay_order_id, &paid_with),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.expect("Invalid verify response");
    assert!(body["orderNumber"].as_str().is_some_and(|n| n.starts_with("ORD-")));

    assert_eq!(order_state(&db, order_id).await, ("processing".to_string(), "paid".to_string()));
    assert_eq!(stock_of(&db, product).await, 10);
    assert_eq!(locks_held(&db, order_id).await, 0);
    assert_eq!(cart_count(&client).await, 0);

    // The gateway's own notification arrives afterwards
    let captured = payment_event("payment.captured", &paid_with, &razorpay_order_id);
    assert_eq!(post_webhook(&captured, Some(&sign_webhook(&captured))).await, StatusCode::OK);
    assert_eq!(stock_of(&db, product).await, 10);
}

#[tokio::test]
#[ignore = "Requires running storefront and database"]
async fn test_other_customers_order_is_not_found() {
    let db = pool().await;
    let product = seed_product(&db, "Arjuna Capsules", Decimal::from(240), 10).await;
    let owner = client();
    let owner_id = user_id_of(&register_customer(&owner).await);
    let (order_id, razorpay_order_id) = pending_online_order(&db, owner_id, product, 1).await;

    let stranger = client();
    register_customer(&stranger).await;
    let paid_with = payment_id();
    let resp = verify(
        &stranger,
        order_id,
        &razorpay_order_id,
        &paid_with,
        &sign_payment(&razorpay_order_id, &paid_with),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(order_state(&db, order_id).await, ("pending".to_string(), "pending".to_string()));
}

#[tokio::test]
#[ignore = "Requires running storefront and database"]
async fn test_payment_on_cancelled_order_is_a_conflict() {
    let db = pool().await;
    let product = seed_product(&db, "Guduchi Ghan Vati", Decimal::from(240), 6).await;
    let client = client();
    let customer = user_id_of(&register_customer(&client).await);
    let (order_id, razorpay_order_id) = pending_online_order(&db, customer, product, 1).await;

    sqlx::query("UPDATE shop.orders SET status = 'cancelled' WHERE id = $1")
        .bind(order_id)
        .execute(&db)
        .await
        .expect("Failed to cancel order");

    let paid_with = payment_id();
    let resp = verify(
        &client,
        order_id,
        &razorpay_order_id,
        &paid_with,
        &sign_payment(&razorpay_order_id, &paid_with),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    assert_eq!(order_state(&db, order_id).await, ("cancelled".to_string(), "pending".to_string()));
    assert_eq!(stock_of(&db, product).await, 6);
}
