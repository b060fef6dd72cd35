//! HTTP route handlers for the storefront.
//!
//! # Route Structure
//!
//! ```text
//! # Auth
//! POST   /api/auth/register            - Create account and log in
//! POST   /api/auth/login               - Log in
//! POST   /api/auth/logout              - Log out
//! GET    /api/auth/me                  - Current user
//!
//! # Catalog
//! GET    /api/products?category=slug   - Active products
//! GET    /api/products/{slug}          - Product detail
//! GET    /api/categories               - Active categories
//!
//! # Cart (requires auth)
//! GET    /api/cart                     - Cart with totals
//! DELETE /api/cart                     - Empty the cart
//! POST   /api/cart/items               - Add a product
//! PATCH  /api/cart/items/{product_id}  - Set quantity (0 removes)
//! DELETE /api/cart/items/{product_id}  - Remove a line
//!
//! # Checkout (requires auth)
//! POST   /api/checkout/create-order    - Reserve stock and create the order
//! POST   /api/checkout/verify-payment  - Confirm an online payment
//!
//! # Payments
//! POST   /api/webhooks/razorpay        - Gateway webhook
//! GET    /api/payment/config           - Public key id for the widget
//!
//! # Account (requires auth)
//! GET    /api/account/orders           - Own orders
//! GET    /api/account/orders/{id}      - Own order with items and refunds
//!
//! # Admin (requires admin role)
//! POST   /api/admin/settings/payment   - Store gateway credentials
//! GET    /api/admin/orders             - All orders, filterable by status
//! PATCH  /api/admin/orders/{id}/status - Advance an order
//! POST   /api/admin/orders/{id}/refund - Refund a paid order
//! POST   /api/admin/products           - Create a product
//! PATCH  /api/admin/products/{id}      - Update a product
//! POST   /api/admin/categories         - Create a category
//!
//! # SEO
//! GET    /robots.txt
//! GET    /sitemap.xml
//! ```

pub mod account;
pub mod admin;
pub mod auth;
pub mod cart;
pub mod checkout;
pub mod payment;
pub mod products;
pub mod seo;
pub mod webhooks;

use axum::{
    Router,
    extract::{FromRequest, FromRequestParts},
    routing::{get, patch, post},
};

use crate::error::AppError;
use crate::middleware::{auth_rate_limiter, checkout_rate_limiter};
use crate::state::AppState;

/// JSON body extractor whose rejections use the JSON error body.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

/// Path extractor whose rejections use the JSON error body.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct ApiPath<T>(pub T);

/// Query extractor whose rejections use the JSON error body.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct ApiQuery<T>(pub T);

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    let credential_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .layer(auth_rate_limiter());

    Router::new()
        .merge(credential_routes)
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me))
}

/// Create the catalog routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/products", get(products::index))
        .route("/products/{slug}", get(products::show))
        .route("/categories", get(products::categories))
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show).delete(cart::clear))
        .route("/items", post(cart::add))
        .route(
            "/items/{product_id}",
            patch(cart::update).delete(cart::remove),
        )
}

/// Create the checkout routes router.
pub fn checkout_routes() -> Router<AppState> {
    Router::new()
        .route("/create-order", post(checkout::create_order))
        .route("/verify-payment", post(checkout::verify_payment))
        .layer(checkout_rate_limiter())
}

/// Create the account routes router.
pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route("/orders", get(account::orders))
        .route("/orders/{id}", get(account::order))
}

/// Create the admin routes router.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/settings/payment", post(admin::update_payment_settings))
        .route("/orders", get(admin::list_orders))
        .route("/orders/{id}/status", patch(admin::update_order_status))
        .route("/orders/{id}/refund", post(admin::refund_order))
        .route("/products", post(admin::create_product))
        .route("/products/{id}", patch(admin::update_product))
        .route("/categories", post(admin::create_category))
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .nest("/api/auth", auth_routes())
        .nest("/api", product_routes())
        .nest("/api/cart", cart_routes())
        .nest("/api/checkout", checkout_routes())
        .route("/api/webhooks/razorpay", post(webhooks::razorpay))
        .route("/api/payment/config", get(payment::config))
        .nest("/api/account", account_routes())
        .nest("/api/admin", admin_routes())
        .route("/robots.txt", get(seo::robots))
        .route("/sitemap.xml", get(seo::sitemap))
}
