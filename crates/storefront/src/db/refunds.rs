//! Refund records.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};

use ayurmart_core::{OrderId, RefundId, RefundStatus};

use super::RepositoryError;
use crate::models::Refund;

const REFUND_COLUMNS: &str =
    "id, order_id, razorpay_refund_id, amount, status, created_at, processed_at";

#[derive(sqlx::FromRow)]
struct RefundRow {
    id: RefundId,
    order_id: OrderId,
    razorpay_refund_id: String,
    amount: Decimal,
    status: RefundStatus,
    created_at: DateTime<Utc>,
    processed_at: Option<DateTime<Utc>>,
}

impl From<RefundRow> for Refund {
    fn from(row: RefundRow) -> Self {
        Self {
            id: row.id,
            order_id: row.order_id,
            razorpay_refund_id: row.razorpay_refund_id,
            amount: row.amount,
            status: row.status,
            created_at: row.created_at,
            processed_at: row.processed_at,
        }
    }
}

/// Record a processed refund, inserting it or promoting a pending row.
///
/// Returns `true` only when this call moved the refund to `processed`; a
/// redelivered event for an already processed refund returns `false`.
///
/// # Errors
///
/// Returns an error if the upsert fails.
pub async fn upsert_processed(
    conn: &mut PgConnection,
    order_id: OrderId,
    razorpay_refund_id: &str,
    amount: Decimal,
) -> Result<bool, RepositoryError> {
    let transitioned: Option<RefundId> = sqlx::query_scalar(
        r"
        INSERT INTO shop.refunds (id, order_id, razorpay_refund_id, amount, status, processed_at)
        VALUES ($1, $2, $3, $4, 'processed', NOW())
        ON CONFLICT (razorpay_refund_id) DO UPDATE
            SET status = 'processed', processed_at = NOW()
            WHERE shop.refunds.status <> 'processed'
        RETURNING id
        ",
    )
    .bind(RefundId::generate())
    .bind(order_id)
    .bind(razorpay_refund_id)
    .bind(amount)
    .fetch_optional(conn)
    .await?;
    Ok(transitioned.is_some())
}

/// Record a refund the gateway accepted but has not processed yet.
///
/// Idempotent on the gateway refund id.
///
/// # Errors
///
/// Returns an error if a query fails.
pub async fn insert_pending(
    pool: &PgPool,
    order_id: OrderId,
    razorpay_refund_id: &str,
    amount: Decimal,
) -> Result<Refund, RepositoryError> {
    sqlx::query(
        r"
        INSERT INTO shop.refunds (id, order_id, razorpay_refund_id, amount, status)
        VALUES ($1, $2, $3, $4, 'pending')
        ON CONFLICT (razorpay_refund_id) DO NOTHING
        ",
    )
    .bind(RefundId::generate())
    .bind(order_id)
    .bind(razorpay_refund_id)
    .bind(amount)
    .execute(pool)
    .await?;

    let row: RefundRow = sqlx::query_as(&format!(
        "SELECT {REFUND_COLUMNS} FROM shop.refunds WHERE razorpay_refund_id = $1"
    ))
    .bind(razorpay_refund_id)
    .fetch_one(pool)
    .await?;
    Ok(row.into())
}

/// Refunds for an order, oldest first.
///
/// # Errors
///
/// Returns an error if the query fails.
pub async fn list_for_order(
    pool: &PgPool,
    order_id: OrderId,
) -> Result<Vec<Refund>, RepositoryError> {
    let rows: Vec<RefundRow> = sqlx::query_as(&format!(
        "SELECT {REFUND_COLUMNS} FROM shop.refunds WHERE order_id = $1 ORDER BY created_at"
    ))
    .bind(order_id)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(Refund::from).collect())
}
