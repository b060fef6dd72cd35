//! Customer order history.

use axum::{Json, extract::State};
use serde::Serialize;

use ayurmart_core::OrderId;

use super::ApiPath;
use crate::db::orders::OrderRepository;
use crate::db::refunds;
use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::models::{Order, OrderItem, Refund};
use crate::state::AppState;

/// An order with its lines and refunds.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
    pub refunds: Vec<Refund>,
}

/// The caller's orders, newest first.
pub async fn orders(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<Vec<Order>>> {
    let orders = OrderRepository::new(state.pool())
        .list_for_user(user.id)
        .await?;
    Ok(Json(orders))
}

/// One of the caller's orders. Other users' orders are reported as missing.
pub async fn order(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiPath(id): ApiPath<OrderId>,
) -> Result<Json<OrderDetail>> {
    let repo = OrderRepository::new(state.pool());
    let order = repo
        .get_for_user(id, user.id)
        .await?
        .ok_or_else(|| AppError::NotFound("Order not found".to_string()))?;
    let items = repo.items(order.id).await?;
    let refunds = refunds::list_for_order(state.pool(), order.id).await?;

    Ok(Json(OrderDetail {
        order,
        items,
        refunds,
    }))
}
