//! Inventory reservation.
//!
//! Reservations are rows in `shop.inventory_locks` created by the stored
//! procedure `shop.check_and_lock_inventory`, which locks the product row and
//! compares stock against active reservations. A checkout reserves all of its
//! lines in one transaction so it never holds a partial reservation.

use sqlx::{PgConnection, PgPool};
use tracing::instrument;

use ayurmart_core::{InventoryLockId, OrderId, ProductId, UserId};

use super::RepositoryError;
use crate::models::CartLine;

/// Result of trying to reserve stock for a whole cart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reservation {
    /// Every line was reserved; one lock per line.
    Reserved(Vec<InventoryLockId>),
    /// A line could not be reserved; nothing was kept.
    InsufficientStock {
        product_id: ProductId,
        product_name: String,
    },
}

/// Reserve every cart line, or none of them.
///
/// # Errors
///
/// Returns an error if a query fails; the transaction is rolled back.
#[instrument(skip(pool, lines), fields(lines = lines.len()))]
pub async fn reserve_all(
    pool: &PgPool,
    user_id: UserId,
    lines: &[CartLine],
) -> Result<Reservation, RepositoryError> {
    let mut tx = pool.begin().await?;
    let mut lock_ids = Vec::with_capacity(lines.len());

    for line in lines {
        let quantity = i32::try_from(line.quantity).map_err(|_| {
            RepositoryError::Conflict(format!("quantity {} is too large", line.quantity))
        })?;
        let lock: Option<InventoryLockId> =
            sqlx::query_scalar("SELECT shop.check_and_lock_inventory($1, $2, $3)")
                .bind(line.product_id)
                .bind(quantity)
                .bind(user_id)
                .fetch_one(&mut *tx)
                .await?;

        match lock {
            Some(id) => lock_ids.push(id),
            None => {
                tx.rollback().await?;
                tracing::info!(product_id = %line.product_id, "reservation failed, insufficient stock");
                return Ok(Reservation::InsufficientStock {
                    product_id: line.product_id,
                    product_name: line.name.clone(),
                });
            }
        }
    }

    tx.commit().await?;
    Ok(Reservation::Reserved(lock_ids))
}

/// Attach reservations to the order created for them.
///
/// # Errors
///
/// Returns an error if the update fails.
pub async fn attach_to_order(
    conn: &mut PgConnection,
    lock_ids: &[InventoryLockId],
    order_id: OrderId,
) -> Result<(), RepositoryError> {
    sqlx::query("UPDATE shop.inventory_locks SET order_id = $1 WHERE id = ANY($2)")
        .bind(order_id)
        .bind(lock_ids)
        .execute(conn)
        .await?;
    Ok(())
}

/// Drop reservations that were never attached to an order.
///
/// # Errors
///
/// Returns an error if the delete fails.
pub async fn release_unattached(
    pool: &PgPool,
    lock_ids: &[InventoryLockId],
) -> Result<u64, RepositoryError> {
    let result =
        sqlx::query("DELETE FROM shop.inventory_locks WHERE id = ANY($1) AND order_id IS NULL")
            .bind(lock_ids)
            .execute(pool)
            .await?;
    Ok(result.rows_affected())
}

/// Release all reservations held by an order.
///
/// # Errors
///
/// Returns an error if the procedure call fails.
pub async fn release_for_order(
    conn: &mut PgConnection,
    order_id: OrderId,
) -> Result<(), RepositoryError> {
    sqlx::query("SELECT shop.release_inventory_lock($1)")
        .bind(order_id)
        .execute(conn)
        .await?;
    Ok(())
}

/// Deduct stock for a paid order and consume its reservations.
///
/// # Errors
///
/// Returns an error if the procedure call fails.
pub async fn process_order_payment(
    conn: &mut PgConnection,
    order_id: OrderId,
) -> Result<(), RepositoryError> {
    sqlx::query("SELECT shop.process_order_payment($1)")
        .bind(order_id)
        .execute(conn)
        .await?;
    Ok(())
}

/// Counts from an expired-reservation sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExpiredSweep {
    /// Unattached reservations deleted.
    pub released_locks: u64,
    /// Unpaid orders cancelled because their reservations lapsed.
    pub cancelled_orders: u64,
}

/// Release lapsed reservations and cancel unpaid orders that held them.
///
/// # Errors
///
/// Returns an error if any statement fails; the sweep is rolled back.
#[instrument(skip(pool))]
pub async fn release_expired(pool: &PgPool) -> Result<ExpiredSweep, RepositoryError> {
    let mut tx = pool.begin().await?;

    let released = sqlx::query(
        "DELETE FROM shop.inventory_locks WHERE order_id IS NULL AND expires_at <= NOW()",
    )
    .execute(&mut *tx)
    .await?
    .rows_affected();

    let cancelled: Vec<OrderId> = sqlx::query_scalar(
        r"
        UPDATE shop.orders o
        SET status = 'cancelled', updated_at = NOW()
        WHERE o.status = 'pending'
          AND o.payment_status = 'pending'
          AND EXISTS (
              SELECT 1 FROM shop.inventory_locks l
              WHERE l.order_id = o.id AND l.expires_at <= NOW()
          )
        RETURNING o.id
        ",
    )
    .fetch_all(&mut *tx)
    .await?;

    for order_id in &cancelled {
        release_for_order(&mut *tx, *order_id).await?;
    }

    tx.commit().await?;

    Ok(ExpiredSweep {
        released_locks: released,
        cancelled_orders: cancelled.len() as u64,
    })
}
