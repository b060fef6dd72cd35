//! Product repository.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use ayurmart_core::{CategoryId, ProductId};

use super::{RepositoryError, conflict_on_unique, non_negative};
use crate::models::Product;

const PRODUCT_COLUMNS: &str = "p.id, p.category_id, p.name, p.slug, p.description, p.price, \
     p.image_url, p.stock_quantity, p.is_active, p.created_at, p.updated_at";

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: ProductId,
    category_id: Option<CategoryId>,
    name: String,
    slug: String,
    description: String,
    price: Decimal,
    image_url: Option<String>,
    stock_quantity: i32,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ProductRow> for Product {
    type Error = RepositoryError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        if row.price.is_sign_negative() {
            return Err(RepositoryError::DataCorruption(format!(
                "negative price for product {}",
                row.id
            )));
        }
        Ok(Self {
            id: row.id,
            category_id: row.category_id,
            name: row.name,
            slug: row.slug,
            description: row.description,
            price: row.price,
            image_url: row.image_url,
            stock_quantity: non_negative(row.stock_quantity, "stock_quantity")?,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn convert(rows: Vec<ProductRow>) -> Result<Vec<Product>, RepositoryError> {
    rows.into_iter().map(Product::try_from).collect()
}

/// Fields for creating a product.
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub category_id: Option<CategoryId>,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub price: Decimal,
    pub image_url: Option<String>,
    pub stock_quantity: u32,
    pub is_active: bool,
}

/// Partial product update; `None` leaves the column unchanged.
#[derive(Debug, Clone, Default)]
pub struct ProductChanges {
    pub category_id: Option<CategoryId>,
    pub name: Option<String>,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub image_url: Option<String>,
    pub stock_quantity: Option<u32>,
    pub is_active: Option<bool>,
}

/// Repository for product database operations.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Active products, newest first, optionally limited to one active category.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a row is invalid.
    pub async fn list_active(
        &self,
        category_slug: Option<&str>,
    ) -> Result<Vec<Product>, RepositoryError> {
        let rows: Vec<ProductRow> = sqlx::query_as(&format!(
            r"
            SELECT {PRODUCT_COLUMNS}
            FROM shop.products p
            LEFT JOIN shop.categories c ON c.id = p.category_id
            WHERE p.is_active
              AND ($1::text IS NULL OR (c.slug = $1 AND c.is_active))
            ORDER BY p.created_at DESC
            "
        ))
        .bind(category_slug)
        .fetch_all(self.pool)
        .await?;
        convert(rows)
    }

    /// An active product by slug.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or the row is invalid.
    pub async fn get_active_by_slug(&self, slug: &str) -> Result<Option<Product>, RepositoryError> {
        let row: Option<ProductRow> = sqlx::query_as(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM shop.products p WHERE p.slug = $1 AND p.is_active"
        ))
        .bind(slug)
        .fetch_optional(self.pool)
        .await?;
        row.map(Product::try_from).transpose()
    }

    /// Any product by id, active or not.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or the row is invalid.
    pub async fn get_by_id(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let row: Option<ProductRow> = sqlx::query_as(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM shop.products p WHERE p.id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        row.map(Product::try_from).transpose()
    }

    /// Insert a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the slug is taken.
    pub async fn create(&self, product: &NewProduct) -> Result<Product, RepositoryError> {
        let row: ProductRow = sqlx::query_as(&format!(
            r"
            INSERT INTO shop.products AS p
                (id, category_id, name, slug, description, price, image_url, stock_quantity, is_active)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {PRODUCT_COLUMNS}
            "
        ))
        .bind(ProductId::generate())
        .bind(product.category_id)
        .bind(&product.name)
        .bind(&product.slug)
        .bind(&product.description)
        .bind(product.price)
        .bind(&product.image_url)
        .bind(stock_to_db(product.stock_quantity)?)
        .bind(product.is_active)
        .fetch_one(self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "product slug"))?;
        row.try_into()
    }

    /// Apply a partial update.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist and
    /// `RepositoryError::Conflict` if the new slug is taken.
    pub async fn update(
        &self,
        id: ProductId,
        changes: &ProductChanges,
    ) -> Result<Product, RepositoryError> {
        let stock = changes.stock_quantity.map(stock_to_db).transpose()?;
        let row: Option<ProductRow> = sqlx::query_as(&format!(
            r"
            UPDATE shop.products AS p SET
                category_id = COALESCE($2, p.category_id),
                name = COALESCE($3, p.name),
                slug = COALESCE($4, p.slug),
                description = COALESCE($5, p.description),
                price = COALESCE($6, p.price),
                image_url = COALESCE($7, p.image_url),
                stock_quantity = COALESCE($8, p.stock_quantity),
                is_active = COALESCE($9, p.is_active),
                updated_at = NOW()
            WHERE p.id = $1
            RETURNING {PRODUCT_COLUMNS}
            "
        ))
        .bind(id)
        .bind(changes.category_id)
        .bind(&changes.name)
        .bind(&changes.slug)
        .bind(&changes.description)
        .bind(changes.price)
        .bind(&changes.image_url)
        .bind(stock)
        .bind(changes.is_active)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "product slug"))?;

        row.ok_or(RepositoryError::NotFound)?.try_into()
    }
}

fn stock_to_db(stock: u32) -> Result<i32, RepositoryError> {
    i32::try_from(stock)
        .map_err(|_| RepositoryError::Conflict(format!("stock quantity {stock} is too large")))
}
