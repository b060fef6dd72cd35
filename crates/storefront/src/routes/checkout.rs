//! Checkout endpoints.

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};

use ayurmart_core::PaymentMethod;

use super::ApiJson;
use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::models::ShippingAddress;
use crate::services::checkout::{CreatedOrder, PaymentConfirmation};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifiedPayment {
    pub order_number: String,
}

/// Turn the cart into an order.
pub async fn create_order(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiJson(request): ApiJson<CreateOrderRequest>,
) -> Result<Json<CreatedOrder>> {
    request
        .shipping_address
        .validate()
        .map_err(|field| AppError::BadRequest(format!("Shipping address {field} is required")))?;

    let created = state
        .checkout()
        .create_order(&user, request.shipping_address, request.payment_method)
        .await?;
    Ok(Json(created))
}

/// Confirm an online payment from the browser callback.
pub async fn verify_payment(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiJson(confirmation): ApiJson<PaymentConfirmation>,
) -> Result<Json<VerifiedPayment>> {
    let order_number = state.checkout().verify_payment(&user, &confirmation).await?;
    Ok(Json(VerifiedPayment { order_number }))
}
