//! Cart repository.
//!
//! One row per (user, product). Quantities are always at least 1; setting a
//! quantity of 0 deletes the row.

use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};

use ayurmart_core::{ProductId, UserId};

use super::{RepositoryError, non_negative};
use crate::models::CartLine;

/// Largest quantity of one product in a cart.
pub const MAX_LINE_QUANTITY: u32 = 99;

#[derive(sqlx::FromRow)]
struct CartLineRow {
    product_id: ProductId,
    name: String,
    slug: String,
    image_url: Option<String>,
    price: Decimal,
    quantity: i32,
    stock_quantity: i32,
    is_active: bool,
}

impl TryFrom<CartLineRow> for CartLine {
    type Error = RepositoryError;

    fn try_from(row: CartLineRow) -> Result<Self, Self::Error> {
        let quantity = non_negative(row.quantity, "cart quantity")?;
        if quantity == 0 {
            return Err(RepositoryError::DataCorruption(format!(
                "zero-quantity cart line for product {}",
                row.product_id
            )));
        }
        Ok(Self {
            product_id: row.product_id,
            name: row.name,
            slug: row.slug,
            image_url: row.image_url,
            unit_price: row.price,
            quantity,
            stock_quantity: non_negative(row.stock_quantity, "stock_quantity")?,
            is_active: row.is_active,
        })
    }
}

/// Repository for cart operations.
pub struct CartRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CartRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Cart lines joined with current product data, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a row is invalid.
    pub async fn lines(&self, user_id: UserId) -> Result<Vec<CartLine>, RepositoryError> {
        let rows: Vec<CartLineRow> = sqlx::query_as(
            r"
            SELECT ci.product_id, p.name, p.slug, p.image_url, p.price,
                   ci.quantity, p.stock_quantity, p.is_active
            FROM shop.cart_items ci
            JOIN shop.products p ON p.id = ci.product_id
            WHERE ci.user_id = $1
            ORDER BY ci.created_at, ci.product_id
            ",
        )
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(CartLine::try_from).collect()
    }

    /// Add `quantity` of a product, incrementing an existing line.
    ///
    /// The resulting line is capped at [`MAX_LINE_QUANTITY`].
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub async fn add(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO shop.cart_items (user_id, product_id, quantity)
            VALUES ($1, $2, LEAST($3, $4))
            ON CONFLICT (user_id, product_id)
            DO UPDATE SET quantity = LEAST(shop.cart_items.quantity + EXCLUDED.quantity, $4),
                          updated_at = NOW()
            ",
        )
        .bind(user_id)
        .bind(product_id)
        .bind(quantity_to_db(quantity)?)
        .bind(quantity_to_db(MAX_LINE_QUANTITY)?)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Set a line's quantity; 0 removes it.
    ///
    /// Returns `false` if there was no such line.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub async fn set_quantity(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<bool, RepositoryError> {
        if quantity == 0 {
            return self.remove(user_id, product_id).await;
        }

        let result = sqlx::query(
            r"
            UPDATE shop.cart_items SET quantity = $3, updated_at = NOW()
            WHERE user_id = $1 AND product_id = $2
            ",
        )
        .bind(user_id)
        .bind(product_id)
        .bind(quantity_to_db(quantity)?)
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Remove one line. Returns `false` if there was no such line.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub async fn remove(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<bool, RepositoryError> {
        let result =
            sqlx::query("DELETE FROM shop.cart_items WHERE user_id = $1 AND product_id = $2")
                .bind(user_id)
                .bind(product_id)
                .execute(self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Empty the cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub async fn clear(&self, user_id: UserId) -> Result<(), RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        clear(&mut *conn, user_id).await
    }
}

/// Empty a user's cart on an existing connection or transaction.
///
/// # Errors
///
/// Returns an error if the delete fails.
pub async fn clear(conn: &mut PgConnection, user_id: UserId) -> Result<(), RepositoryError> {
    sqlx::query("DELETE FROM shop.cart_items WHERE user_id = $1")
        .bind(user_id)
        .execute(conn)
        .await?;
    Ok(())
}

fn quantity_to_db(quantity: u32) -> Result<i32, RepositoryError> {
    i32::try_from(quantity)
        .map_err(|_| RepositoryError::Conflict(format!("quantity {quantity} is too large")))
}
