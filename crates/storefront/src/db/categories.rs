//! Category repository.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use ayurmart_core::CategoryId;

use super::{RepositoryError, conflict_on_unique};
use crate::models::Category;

const CATEGORY_COLUMNS: &str = "id, name, slug, is_active, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct CategoryRow {
    id: CategoryId,
    name: String,
    slug: String,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CategoryRow> for Category {
    fn from(row: CategoryRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            slug: row.slug,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Active categories ordered by name.
///
/// # Errors
///
/// Returns an error if the query fails.
pub async fn list_active(pool: &PgPool) -> Result<Vec<Category>, RepositoryError> {
    let rows: Vec<CategoryRow> = sqlx::query_as(&format!(
        "SELECT {CATEGORY_COLUMNS} FROM shop.categories WHERE is_active ORDER BY name"
    ))
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(Category::from).collect())
}

/// Look up a category by id.
///
/// # Errors
///
/// Returns an error if the query fails.
pub async fn get_by_id(pool: &PgPool, id: CategoryId) -> Result<Option<Category>, RepositoryError> {
    let row: Option<CategoryRow> = sqlx::query_as(&format!(
        "SELECT {CATEGORY_COLUMNS} FROM shop.categories WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(Category::from))
}

/// Insert a category.
///
/// # Errors
///
/// Returns `RepositoryError::Conflict` if the slug is taken.
pub async fn create(
    pool: &PgPool,
    name: &str,
    slug: &str,
    is_active: bool,
) -> Result<Category, RepositoryError> {
    let row: CategoryRow = sqlx::query_as(&format!(
        r"
        INSERT INTO shop.categories (id, name, slug, is_active)
        VALUES ($1, $2, $3, $4)
        RETURNING {CATEGORY_COLUMNS}
        "
    ))
    .bind(CategoryId::generate())
    .bind(name)
    .bind(slug)
    .bind(is_active)
    .fetch_one(pool)
    .await
    .map_err(|e| conflict_on_unique(e, "category slug"))?;
    Ok(row.into())
}
