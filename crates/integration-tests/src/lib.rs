//! Integration test helpers for AyurMart.
//!
//! The tests talk to a running storefront over HTTP and read the same
//! database to seed products and check side effects.
//!
//! # Running Tests
//!
//! ```bash
//! am-cli migrate
//! RAZORPAY_WEBHOOK_SECRET=whsec_test cargo run -p ayurmart-storefront &
//! cargo test -p ayurmart-integration-tests -- --ignored
//! ```
//!
//! # Environment
//!
//! - `STOREFRONT_URL` - Storefront base URL (default `http://localhost:3000`)
//! - `STOREFRONT_DATABASE_URL` - Same database the server uses
//! - `RAZORPAY_WEBHOOK_SECRET` - Same webhook secret the server uses
//! - `RAZORPAY_KEY_SECRET` - Same key secret the server uses (payment
//!   verification tests)

#![allow(clippy::expect_used, clippy::missing_panics_doc)]

use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use secrecy::SecretString;
use serde_json::{Value, json};
use sqlx::PgPool;
use uuid::Uuid;

use ayurmart_core::{
    Email, OrderId, OrderTotals, PaymentMethod, PricingRules, ProductId, UserId, generate_slug,
};
use ayurmart_storefront::db::orders::{self, NewOrder};
use ayurmart_storefront::models::{CartLine, ShippingAddress};
use ayurmart_storefront::payments::signature;

/// Storefront base URL.
#[must_use]
pub fn base_url() -> String {
    std::env::var("STOREFRONT_URL").unwrap_or_else(|_| "http://localhost:3000".to_string())
}

/// HTTP client that keeps the session cookie.
#[must_use]
pub fn client() -> Client {
    Client::builder()
        .cookie_store(true)
        .build()
        .expect("Failed to create HTTP client")
}

/// Connect to the storefront database.
pub async fn pool() -> PgPool {
    let url = std::env::var("STOREFRONT_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .expect("STOREFRONT_DATABASE_URL must be set");
    PgPool::connect(&url).await.expect("Failed to connect to database")
}

/// An email address no other test run uses.
#[must_use]
pub fn unique_email(prefix: &str) -> String {
    format!("{prefix}-{}@test.ayurmart.in", Uuid::new_v4().simple())
}

/// Register a fresh customer; the client is logged in afterwards.
pub async fn register_customer(client: &Client) -> Value {
    let resp = client
        .post(format!("{}/api/auth/register", base_url()))
        .json(&json!({
            "email": unique_email("customer"),
            "password": "triphala-2026",
        }))
        .send()
        .await
        .expect("Failed to register");
    assert_eq!(resp.status(), StatusCode::CREATED);
    resp.json().await.expect("Invalid register response")
}

/// Id of the user returned by register or login.
#[must_use]
pub fn user_id_of(user: &Value) -> UserId {
    user["id"]
        .as_str()
        .and_then(|id| id.parse().ok())
        .expect("user response carries an id")
}

/// Register a customer and promote them to admin in the database.
pub async fn register_admin(client: &Client, db: &PgPool) -> UserId {
    let user_id = user_id_of(&register_customer(client).await);
    sqlx::query("UPDATE shop.users SET role = 'admin' WHERE id = $1")
        .bind(user_id)
        .execute(db)
        .await
        .expect("Failed to promote user");
    user_id
}

/// Insert a customer directly, without a session.
pub async fn insert_customer(db: &PgPool) -> UserId {
    let user_id = UserId::generate();
    sqlx::query("INSERT INTO shop.users (id, email, password_hash) VALUES ($1, $2, 'x')")
        .bind(user_id)
        .bind(unique_email("customer"))
        .execute(db)
        .await
        .expect("Failed to insert user");
    user_id
}

/// Insert an active product directly.
pub async fn seed_product(pool: &PgPool, name: &str, price: Decimal, stock: i32) -> ProductId {
    let id = ProductId::generate();
    let slug = format!("{}-{}", generate_slug(name), Uuid::new_v4().simple());
    sqlx::query(
        r"
        INSERT INTO shop.products (id, name, slug, description, price, stock_quantity, is_active)
        VALUES ($1, $2, $3, '', $4, $5, TRUE)
        ",
    )
    .bind(id)
    .bind(name)
    .bind(slug)
    .bind(price)
    .bind(stock)
    .execute(pool)
    .await
    .expect("Failed to seed product");
    id
}

/// Current stock of a product.
pub async fn stock_of(pool: &PgPool, product_id: ProductId) -> i32 {
    sqlx::query_scalar("SELECT stock_quantity FROM shop.products WHERE id = $1")
        .bind(product_id)
        .fetch_one(pool)
        .await
        .expect("Failed to read stock")
}

/// Add a product to the logged-in client's cart.
pub async fn add_to_cart(client: &Client, product_id: ProductId, quantity: u32) {
    let resp = client
        .post(format!("{}/api/cart/items", base_url()))
        .json(&json!({ "productId": product_id, "quantity": quantity }))
        .send()
        .await
        .expect("Failed to add to cart");
    assert_eq!(resp.status(), StatusCode::OK);
}

/// Insert an online order awaiting payment for `quantity` of a product at
/// ₹240 each. Returns the order id and its gateway order id.
pub async fn pending_online_order(
    db: &PgPool,
    user_id: UserId,
    product_id: ProductId,
    quantity: u32,
) -> (OrderId, String) {
    let line = CartLine {
        product_id,
        name: "Brahmi Vati".to_string(),
        slug: "brahmi-vati".to_string(),
        image_url: None,
        unit_price: Decimal::from(240),
        quantity,
        stock_quantity: 100,
        is_active: true,
    };
    let razorpay_order_id = format!("order_{}", Uuid::new_v4().simple());
    let new_order = NewOrder {
        order_number: format!("ORD-TEST-{}", Uuid::new_v4().simple()),
        user_id,
        contact_name: "Arjun Nair".to_string(),
        contact_email: Email::parse("arjun@test.ayurmart.in").expect("valid email"),
        contact_phone: "9447001122".to_string(),
        totals: OrderTotals::compute([(line.unit_price, quantity)], &PricingRules::default()),
        payment_method: PaymentMethod::Razorpay,
        razorpay_order_id: Some(razorpay_order_id.clone()),
        shipping_address: ShippingAddress {
            full_name: "Arjun Nair".to_string(),
            phone: "9447001122".to_string(),
            email: None,
            address_line1: "4 Backwater Road".to_string(),
            address_line2: None,
            city: "Kochi".to_string(),
            state: "Kerala".to_string(),
            postal_code: "682001".to_string(),
            country: "India".to_string(),
        },
    };

    let mut conn = db.acquire().await.expect("Failed to acquire connection");
    let order = orders::insert_with_items(&mut *conn, &new_order, &[line])
        .await
        .expect("Failed to insert order");
    (order.id, razorpay_order_id)
}

/// Hold `quantity` of a product for an order, as checkout does.
pub async fn lock_for_order(
    db: &PgPool,
    user_id: UserId,
    product_id: ProductId,
    order_id: OrderId,
    quantity: i32,
) {
    sqlx::query(
        r"
        INSERT INTO shop.inventory_locks (product_id, user_id, order_id, quantity)
        VALUES ($1, $2, $3, $4)
        ",
    )
    .bind(product_id)
    .bind(user_id)
    .bind(order_id)
    .bind(quantity)
    .execute(db)
    .await
    .expect("Failed to insert lock");
}

/// Number of reservations held for an order.
pub async fn locks_held(db: &PgPool, order_id: OrderId) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM shop.inventory_locks WHERE order_id = $1")
        .bind(order_id)
        .fetch_one(db)
        .await
        .expect("Failed to count locks")
}

/// `(status, payment_status)` of an order.
pub async fn order_state(db: &PgPool, id: OrderId) -> (String, String) {
    sqlx::query_as("SELECT status::text, payment_status::text FROM shop.orders WHERE id = $1")
        .bind(id)
        .fetch_one(db)
        .await
        .expect("Failed to read order")
}

/// A complete shipping address.
#[must_use]
pub fn shipping_address() -> Value {
    json!({
        "fullName": "Meera Iyer",
        "phone": "9845012345",
        "addressLine1": "12 Temple Street",
        "city": "Udupi",
        "state": "Karnataka",
        "postalCode": "576101"
    })
}

/// Post a webhook body, signed or not.
pub async fn post_webhook(body: &[u8], signature: Option<&str>) -> StatusCode {
    let mut request = client()
        .post(format!("{}/api/webhooks/razorpay", base_url()))
        .header("content-type", "application/json")
        .body(body.to_vec());
    if let Some(signature) = signature {
        request = request.header("x-razorpay-signature", signature);
    }
    request.send().await.expect("Failed to post webhook").status()
}

/// A `payment.*` webhook body.
#[must_use]
pub fn payment_event(event: &str, payment_id: &str, razorpay_order_id: &str) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "entity": "event",
        "event": event,
        "payload": { "payment": { "entity": {
            "id": payment_id,
            "order_id": razorpay_order_id,
            "amount": 77_760,
            "status": event.trim_start_matches("payment."),
            "error_description": "Payment declined by bank"
        }}}
    }))
    .expect("Failed to encode webhook")
}

/// A fresh gateway payment id.
#[must_use]
pub fn payment_id() -> String {
    format!("pay_{}", Uuid::new_v4().simple())
}

/// Sign `order_id|payment_id` with the gateway key secret, as the checkout
/// widget hands it back to the browser.
#[must_use]
pub fn sign_payment(razorpay_order_id: &str, razorpay_payment_id: &str) -> String {
    let secret =
        std::env::var("RAZORPAY_KEY_SECRET").expect("RAZORPAY_KEY_SECRET must be set");
    let message = format!("{razorpay_order_id}|{razorpay_payment_id}");
    signature::sign(&SecretString::from(secret), message.as_bytes())
        .expect("HMAC accepts any key length")
}

/// Sign a webhook body the way Razorpay does.
#[must_use]
pub fn sign_webhook(body: &[u8]) -> String {
    let secret = std::env::var("RAZORPAY_WEBHOOK_SECRET")
        .expect("RAZORPAY_WEBHOOK_SECRET must be set");
    signature::sign(&SecretString::from(secret), body).expect("HMAC accepts any key length")
}
