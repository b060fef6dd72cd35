//! Public catalog.

use axum::{Json, extract::State};
use serde::Deserialize;

use super::{ApiPath, ApiQuery};
use crate::db::categories;
use crate::db::products::ProductRepository;
use crate::error::{AppError, Result};
use crate::models::{Category, Product};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ProductQuery {
    /// Category slug filter.
    pub category: Option<String>,
}

/// Active products, newest first.
pub async fn index(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ProductQuery>,
) -> Result<Json<Vec<Product>>> {
    let category = query.category.as_deref().filter(|c| !c.is_empty());
    let products = ProductRepository::new(state.pool())
        .list_active(category)
        .await?;
    Ok(Json(products))
}

/// One active product.
pub async fn show(
    State(state): State<AppState>,
    ApiPath(slug): ApiPath<String>,
) -> Result<Json<Product>> {
    ProductRepository::new(state.pool())
        .get_active_by_slug(&slug)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Product not found".to_string()))
}

/// Active categories.
pub async fn categories(State(state): State<AppState>) -> Result<Json<Vec<Category>>> {
    Ok(Json(categories::list_active(state.pool()).await?))
}
