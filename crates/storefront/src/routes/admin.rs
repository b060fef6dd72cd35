//! Admin API: payment settings, orders, catalog.
//!
//! Every handler takes [`RequireAdmin`], which re-reads the role from the
//! database on each request.

use std::collections::BTreeMap;

use axum::{Json, extract::State, http::StatusCode};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use ayurmart_core::{
    CategoryId, CurrencyCode, OrderId, OrderStatus, PaymentMethod, PaymentStatus, Price,
    ProductId, generate_slug,
};

use super::{ApiJson, ApiPath, ApiQuery};
use crate::db::{RepositoryError, categories, inventory};
use crate::db::orders::{self, OrderRepository};
use crate::db::products::{NewProduct, ProductChanges, ProductRepository};
use crate::db::refunds;
use crate::db::settings::{self, keys};
use crate::error::{AppError, Result};
use crate::middleware::RequireAdmin;
use crate::models::{Category, Order, Product, Refund};
use crate::payments::RazorpayClient;
use crate::state::AppState;

/// Default page size of the order list.
const DEFAULT_ORDER_LIMIT: i64 = 50;
/// Largest page size of the order list.
const MAX_ORDER_LIMIT: i64 = 200;

// =============================================================================
// Payment settings
// =============================================================================

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentSettingsRequest {
    pub key_id: String,
    pub key_secret: String,
    #[serde(default)]
    pub encrypt: bool,
    #[serde(default)]
    pub webhook_secret: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentSettingsSaved {
    pub key_id: String,
    pub encrypted: bool,
    pub webhook_secret_saved: bool,
}

/// Store gateway credentials, optionally encrypted at rest.
#[instrument(skip_all, fields(admin_id = %admin.id, encrypt = request.encrypt))]
pub async fn update_payment_settings(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiJson(request): ApiJson<PaymentSettingsRequest>,
) -> Result<Json<PaymentSettingsSaved>> {
    let key_id = request.key_id.trim();
    let key_secret = request.key_secret.trim();
    if key_id.is_empty() || key_secret.is_empty() {
        return Err(AppError::BadRequest(
            "keyId and keySecret are required".to_string(),
        ));
    }
    let webhook_secret = request
        .webhook_secret
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());

    let protect = |value: &str| -> Result<String> {
        if request.encrypt {
            state
                .cipher()
                .encrypt(value)
                .map_err(|e| AppError::Internal(e.to_string()))
        } else {
            Ok(value.to_string())
        }
    };
    let stored_secret = protect(key_secret)?;
    let stored_webhook_secret = webhook_secret.map(protect).transpose()?;

    let mut values = vec![
        (keys::RAZORPAY_KEY_ID, key_id),
        (keys::RAZORPAY_KEY_SECRET, stored_secret.as_str()),
    ];
    if let Some(secret) = stored_webhook_secret.as_deref() {
        values.push((keys::RAZORPAY_WEBHOOK_SECRET, secret));
    }
    settings::set_settings(state.pool(), &values).await?;

    if state.config().razorpay.credentials().is_some() {
        tracing::warn!("payment settings saved but environment credentials take precedence");
    }
    tracing::info!("payment settings updated");

    Ok(Json(PaymentSettingsSaved {
        key_id: key_id.to_string(),
        encrypted: request.encrypt,
        webhook_secret_saved: webhook_secret.is_some(),
    }))
}

// =============================================================================
// Orders
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct OrderListQuery {
    pub status: Option<OrderStatus>,
    pub limit: Option<i64>,
}

/// All orders, newest first.
pub async fn list_orders(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    ApiQuery(query): ApiQuery<OrderListQuery>,
) -> Result<Json<Vec<Order>>> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_ORDER_LIMIT)
        .clamp(1, MAX_ORDER_LIMIT);
    let orders = OrderRepository::new(state.pool())
        .list_all(query.status, limit)
        .await?;
    Ok(Json(orders))
}

#[derive(Debug, Deserialize)]
pub struct StatusChange {
    pub status: OrderStatus,
}

/// Advance an order along the status machine.
///
/// Orders only reach `processing` through payment finalization. Cancelling a
/// pending order releases its stock reservations.
#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn update_order_status(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiPath(id): ApiPath<OrderId>,
    ApiJson(change): ApiJson<StatusChange>,
) -> Result<Json<Order>> {
    let order = OrderRepository::new(state.pool())
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Order not found".to_string()))?;

    let (from, to) = (order.status, change.status);
    if !from.admin_can_transition_to(to) {
        return Err(AppError::BadRequest(format!(
            "Cannot change order status from {from} to {to}"
        )));
    }

    let mut tx = state.pool().begin().await.map_err(RepositoryError::from)?;
    let updated = orders::transition_status(&mut *tx, id, from, to)
        .await?
        .ok_or_else(|| AppError::BadRequest("Order status changed, reload and retry".to_string()))?;
    if from == OrderStatus::Pending && to == OrderStatus::Cancelled {
        inventory::release_for_order(&mut *tx, id).await?;
    }
    tx.commit().await.map_err(RepositoryError::from)?;

    tracing::info!(order_number = %updated.order_number, %from, %to, "order status changed");
    Ok(Json(updated))
}

#[derive(Debug, Default, Deserialize)]
pub struct RefundRequest {
    /// Rupees; the whole order when omitted.
    pub amount: Option<Decimal>,
}

/// Check an order can be refunded and return its payment id and amount.
fn refundable(order: &Order, requested: Option<Decimal>) -> Result<(String, Decimal)> {
    let payment_id = match (
        order.payment_method,
        order.payment_status,
        &order.razorpay_payment_id,
    ) {
        (PaymentMethod::Razorpay, PaymentStatus::Paid, Some(payment_id)) => payment_id.clone(),
        _ => {
            return Err(AppError::BadRequest(
                "Only paid online orders can be refunded".to_string(),
            ));
        }
    };

    let amount = requested.unwrap_or(order.totals.total);
    if amount <= Decimal::ZERO || amount > order.totals.total {
        return Err(AppError::BadRequest(format!(
            "Refund amount must be between 0 and {}",
            order.totals.total
        )));
    }
    Ok((payment_id, amount))
}

/// Refund a paid order through the gateway.
///
/// The refund is recorded `pending`; the `refund.processed` webhook
/// completes it.
#[instrument(skip(state, admin, request), fields(admin_id = %admin.id))]
pub async fn refund_order(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiPath(id): ApiPath<OrderId>,
    ApiJson(request): ApiJson<RefundRequest>,
) -> Result<(StatusCode, Json<Refund>)> {
    let order = OrderRepository::new(state.pool())
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Order not found".to_string()))?;
    let (payment_id, amount) = refundable(&order, request.amount)?;
    let paise = Price::inr(amount)
        .to_minor_units()
        .ok_or_else(|| AppError::BadRequest("Invalid refund amount".to_string()))?;

    let config = state.payment_config().get_config().await?;
    let client = RazorpayClient::new(
        state.http().clone(),
        &state.config().razorpay.api_base,
        config,
    );
    let notes = BTreeMap::from([("order_number".to_string(), order.order_number.clone())]);
    let gateway_refund = client.refund(&payment_id, Some(paise), &notes).await?;

    let refund = refunds::insert_pending(
        state.pool(),
        order.id,
        &gateway_refund.id,
        Price::from_minor_units(gateway_refund.amount, CurrencyCode::INR).amount,
    )
    .await?;
    tracing::info!(order_number = %order.order_number, refund_id = %refund.razorpay_refund_id, "refund requested");

    Ok((StatusCode::CREATED, Json(refund)))
}

// =============================================================================
// Catalog
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductRequest {
    pub category_id: Option<CategoryId>,
    pub name: String,
    pub slug: Option<String>,
    #[serde(default)]
    pub description: String,
    pub price: Decimal,
    pub image_url: Option<String>,
    #[serde(default)]
    pub stock_quantity: u32,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

const fn default_true() -> bool {
    true
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductUpdateRequest {
    pub category_id: Option<CategoryId>,
    pub name: Option<String>,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub image_url: Option<String>,
    pub stock_quantity: Option<u32>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryRequest {
    pub name: String,
    pub slug: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

/// Use the given slug, or derive one from the name.
fn slug_for(name: &str, slug: Option<&str>) -> Result<String> {
    let slug = slug
        .map(generate_slug)
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| generate_slug(name));
    if slug.is_empty() {
        return Err(AppError::BadRequest(
            "Name must contain letters or digits".to_string(),
        ));
    }
    Ok(slug)
}

fn check_price(price: Decimal) -> Result<()> {
    if price.is_sign_negative() {
        return Err(AppError::BadRequest("Price cannot be negative".to_string()));
    }
    Ok(())
}

async fn check_category(state: &AppState, id: Option<CategoryId>) -> Result<()> {
    if let Some(id) = id
        && categories::get_by_id(state.pool(), id).await?.is_none()
    {
        return Err(AppError::BadRequest("Unknown category".to_string()));
    }
    Ok(())
}

/// Create a product.
#[instrument(skip_all, fields(admin_id = %admin.id, name = %request.name))]
pub async fn create_product(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiJson(request): ApiJson<ProductRequest>,
) -> Result<(StatusCode, Json<Product>)> {
    let name = request.name.trim().to_string();
    let slug = slug_for(&name, request.slug.as_deref())?;
    check_price(request.price)?;
    check_category(&state, request.category_id).await?;

    let product = ProductRepository::new(state.pool())
        .create(&NewProduct {
            category_id: request.category_id,
            name,
            slug,
            description: request.description,
            price: request.price,
            image_url: request.image_url,
            stock_quantity: request.stock_quantity,
            is_active: request.is_active,
        })
        .await?;
    tracing::info!(product_id = %product.id, "product created");

    Ok((StatusCode::CREATED, Json(product)))
}

/// Update a product; omitted fields are unchanged.
#[instrument(skip_all, fields(admin_id = %admin.id, product_id = %id))]
pub async fn update_product(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiPath(id): ApiPath<ProductId>,
    ApiJson(request): ApiJson<ProductUpdateRequest>,
) -> Result<Json<Product>> {
    if let Some(price) = request.price {
        check_price(price)?;
    }
    check_category(&state, request.category_id).await?;
    let slug = match request.slug.as_deref() {
        Some(slug) => Some(slug_for(request.name.as_deref().unwrap_or_default(), Some(slug))?),
        None => None,
    };

    let product = ProductRepository::new(state.pool())
        .update(
            id,
            &ProductChanges {
                category_id: request.category_id,
                name: request.name.map(|n| n.trim().to_string()),
                slug,
                description: request.description,
                price: request.price,
                image_url: request.image_url,
                stock_quantity: request.stock_quantity,
                is_active: request.is_active,
            },
        )
        .await?;
    Ok(Json(product))
}

/// Create a category.
#[instrument(skip_all, fields(admin_id = %admin.id, name = %request.name))]
pub async fn create_category(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiJson(request): ApiJson<CategoryRequest>,
) -> Result<(StatusCode, Json<Category>)> {
    let name = request.name.trim();
    let slug = slug_for(name, request.slug.as_deref())?;
    let category = categories::create(state.pool(), name, &slug, request.is_active).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use ayurmart_core::{Email, OrderTotals, PricingRules, UserId};
    use chrono::Utc;

    use crate::models::ShippingAddress;

    fn paid_order() -> Order {
        Order {
            id: OrderId::generate(),
            order_number: "ORD-0LOYW3V28-ZZ01".to_string(),
            user_id: UserId::generate(),
            contact_name: "Kavya Rao".to_string(),
            contact_email: Email::parse("kavya@example.in").unwrap(),
            contact_phone: "9900112233".to_string(),
            totals: OrderTotals::compute([(Decimal::from(299), 2)], &PricingRules::default()),
            status: OrderStatus::Processing,
            payment_method: PaymentMethod::Razorpay,
            payment_status: PaymentStatus::Paid,
            razorpay_order_id: Some("order_Q1".to_string()),
            razorpay_payment_id: Some("pay_Q1".to_string()),
            shipping_address: ShippingAddress {
                full_name: "Kavya Rao".to_string(),
                phone: "9900112233".to_string(),
                email: None,
                address_line1: "7 Lake View".to_string(),
                address_line2: None,
                city: "Mysuru".to_string(),
                state: "Karnataka".to_string(),
                postal_code: "570001".to_string(),
                country: "India".to_string(),
            },
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_full_refund_by_default() {
        let (payment_id, amount) = refundable(&paid_order(), None).unwrap();
        assert_eq!(payment_id, "pay_Q1");
        assert_eq!(amount, Decimal::new(64584, 2));
    }

    #[test]
    fn test_partial_refund_bounds() {
        let order = paid_order();
        assert!(refundable(&order, Some(Decimal::from(100))).is_ok());
        assert!(refundable(&order, Some(Decimal::ZERO)).is_err());
        assert!(refundable(&order, Some(Decimal::from(1000))).is_err());
    }

    #[test]
    fn test_unpaid_or_cod_orders_are_not_refundable() {
        let mut order = paid_order();
        order.payment_status = PaymentStatus::Pending;
        assert!(refundable(&order, None).is_err());

        let mut order = paid_order();
        order.payment_method = PaymentMethod::Cod;
        assert!(refundable(&order, None).is_err());

        let mut order = paid_order();
        order.payment_status = PaymentStatus::Refunded;
        assert!(refundable(&order, None).is_err());
    }

    #[test]
    fn test_slug_for() {
        assert_eq!(slug_for("Brahmi Ghrita 200g", None).unwrap(), "brahmi-ghrita-200g");
        assert_eq!(slug_for("ignored", Some("Custom Slug")).unwrap(), "custom-slug");
        assert_eq!(slug_for("Neem Tablets", Some("!!!")).unwrap(), "neem-tablets");
        assert!(slug_for("@@@", None).is_err());
    }
}
