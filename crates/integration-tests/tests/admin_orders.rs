//! Admin order handling against a running storefront.
//!
//! These tests require:
//! - A migrated `PostgreSQL` database
//! - The storefront running against it

use ayurmart_core::OrderId;
use ayurmart_integration_tests::{
    base_url, client, insert_customer, lock_for_order, locks_held, order_state,
    pending_online_order, pool, register_admin, register_customer, seed_product,
};
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use serde_json::json;

async fn set_status(client: &Client, order_id: OrderId, status: &str) -> StatusCode {
    client
        .patch(format!("{}/api/admin/orders/{order_id}/status", base_url()))
        .json(&json!({ "status": status }))
        .send()
        .await
        .expect("Failed to update status")
        .status()
}

#[tokio::test]
#[ignore = "Requires running storefront and database"]
async fn test_customer_cannot_change_status() {
    let db = pool().await;
    let product = seed_product(&db, "Kumkumadi Oil", Decimal::from(240), 5).await;
    let customer = insert_customer(&db).await;
    let (order_id, _) = pending_online_order(&db, customer, product, 1).await;

    let client = client();
    register_customer(&client).await;
    assert_eq!(set_status(&client, order_id, "cancelled").await, StatusCode::FORBIDDEN);
}

#[tokio::test]
#[ignore = "Requires running storefront and database"]
async fn test_admin_cannot_mark_unpaid_order_processing() {
    let db = pool().await;
    let product = seed_product(&db, "Mahanarayan Oil", Decimal::from(240), 5).await;
    let customer = insert_customer(&db).await;
    let (order_id, _) = pending_online_order(&db, customer, product, 5).await;
    lock_for_order(&db, customer, product, order_id, 5).await;

    let admin = client();
    register_admin(&admin, &db).await;

    assert_eq!(set_status(&admin, order_id, "processing").await, StatusCode::BAD_REQUEST);
    assert_eq!(order_state(&db, order_id).await, ("pending".to_string(), "pending".to_string()));
    assert_eq!(locks_held(&db, order_id).await, 1);
}

#[tokio::test]
#[ignore = "Requires running storefront and database"]
async fn test_admin_cancel_releases_reservations() {
    let db = pool().await;
    let product = seed_product(&db, "Chandanadi Vati", Decimal::from(240), 5).await;
    let customer = insert_customer(&db).await;
    let (order_id, _) = pending_online_order(&db, customer, product, 2).await;
    lock_for_order(&db, customer, product, order_id, 2).await;

    let admin = client();
    register_admin(&admin, &db).await;

    assert_eq!(set_status(&admin, order_id, "cancelled").await, StatusCode::OK);
    assert_eq!(order_state(&db, order_id).await, ("cancelled".to_string(), "pending".to_string()));
    assert_eq!(locks_held(&db, order_id).await, 0);

    // Terminal
    assert_eq!(set_status(&admin, order_id, "shipped").await, StatusCode::BAD_REQUEST);
}
