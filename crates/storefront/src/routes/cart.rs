//! Cart handlers.
//!
//! The cart lives in `shop.cart_items`, one row per product. Stock is not
//! reserved here; checkout reserves it.

use axum::{Json, extract::State};
use serde::Deserialize;
use tracing::instrument;

use ayurmart_core::ProductId;

use super::{ApiJson, ApiPath};
use crate::db::cart::{CartRepository, MAX_LINE_QUANTITY};
use crate::db::products::ProductRepository;
use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::models::{CartView, CurrentUser};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddItem {
    pub product_id: ProductId,
    pub quantity: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateItem {
    pub quantity: i64,
}

/// Check a requested quantity; `allow_zero` permits the remove-by-zero form.
fn checked_quantity(quantity: i64, allow_zero: bool) -> Result<u32> {
    let minimum = i64::from(!allow_zero);
    if quantity < minimum {
        return Err(AppError::BadRequest(format!(
            "Quantity must be at least {minimum}"
        )));
    }
    if quantity > i64::from(MAX_LINE_QUANTITY) {
        return Err(AppError::BadRequest(format!(
            "Quantity must be at most {MAX_LINE_QUANTITY}"
        )));
    }
    u32::try_from(quantity).map_err(|_| AppError::BadRequest("Invalid quantity".to_string()))
}

async fn view(state: &AppState, user: &CurrentUser) -> Result<Json<CartView>> {
    let lines = CartRepository::new(state.pool()).lines(user.id).await?;
    Ok(Json(CartView::new(lines, &state.config().pricing)))
}

/// Cart lines with totals.
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<CartView>> {
    view(&state, &user).await
}

/// Add a product, incrementing an existing line.
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn add(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiJson(item): ApiJson<AddItem>,
) -> Result<Json<CartView>> {
    let quantity = checked_quantity(item.quantity.unwrap_or(1), false)?;

    let product = ProductRepository::new(state.pool())
        .get_by_id(item.product_id)
        .await?
        .filter(|p| p.is_active)
        .ok_or_else(|| AppError::NotFound("Product not found".to_string()))?;

    CartRepository::new(state.pool())
        .add(user.id, product.id, quantity)
        .await?;
    view(&state, &user).await
}

/// Set a line's quantity; 0 removes it.
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn update(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiPath(product_id): ApiPath<ProductId>,
    ApiJson(item): ApiJson<UpdateItem>,
) -> Result<Json<CartView>> {
    let quantity = checked_quantity(item.quantity, true)?;
    let found = CartRepository::new(state.pool())
        .set_quantity(user.id, product_id, quantity)
        .await?;
    if !found {
        return Err(AppError::NotFound("Item not in cart".to_string()));
    }
    view(&state, &user).await
}

/// Remove a line.
pub async fn remove(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiPath(product_id): ApiPath<ProductId>,
) -> Result<Json<CartView>> {
    let removed = CartRepository::new(state.pool())
        .remove(user.id, product_id)
        .await?;
    if !removed {
        return Err(AppError::NotFound("Item not in cart".to_string()));
    }
    view(&state, &user).await
}

/// Empty the cart.
pub async fn clear(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<CartView>> {
    CartRepository::new(state.pool()).clear(user.id).await?;
    view(&state, &user).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checked_quantity() {
        assert!(matches!(checked_quantity(1, false), Ok(1)));
        assert!(matches!(checked_quantity(0, true), Ok(0)));
        assert!(matches!(checked_quantity(0, false), Err(AppError::BadRequest(_))));
        assert!(matches!(checked_quantity(-1, true), Err(AppError::BadRequest(_))));
        assert!(matches!(checked_quantity(100, true), Err(AppError::BadRequest(_))));
    }
}
