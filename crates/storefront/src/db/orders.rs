//! Order repository.
//!
//! Finalization claims an order with a conditional `UPDATE ... RETURNING`:
//! whichever caller gets the row back owns the transition, every other caller
//! sees `None`.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};
use tracing::instrument;

use ayurmart_core::{
    Email, OrderId, OrderItemId, OrderStatus, OrderTotals, PaymentMethod, PaymentStatus,
    ProductId, UserId,
};

use super::{RepositoryError, non_negative};
use crate::models::{CartLine, Order, OrderItem, ShippingAddress};

const ORDER_COLUMNS: &str = "id, order_number, user_id, contact_name, contact_email, \
     contact_phone, subtotal, tax, shipping, total, status, payment_method, payment_status, \
     razorpay_order_id, razorpay_payment_id, shipping_address, created_at, updated_at";

const ITEM_COLUMNS: &str =
    "id, order_id, product_id, product_name, product_image, quantity, unit_price, subtotal";

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: OrderId,
    order_number: String,
    user_id: UserId,
    contact_name: String,
    contact_email: String,
    contact_phone: String,
    subtotal: Decimal,
    tax: Decimal,
    shipping: Decimal,
    total: Decimal,
    status: OrderStatus,
    payment_method: PaymentMethod,
    payment_status: PaymentStatus,
    razorpay_order_id: Option<String>,
    razorpay_payment_id: Option<String>,
    shipping_address: Json<ShippingAddress>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = RepositoryError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let contact_email = Email::parse(&row.contact_email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email on order {}: {e}", row.id))
        })?;
        let totals = OrderTotals {
            subtotal: row.subtotal,
            tax: row.tax,
            shipping: row.shipping,
            total: row.total,
        };
        if !totals.is_consistent() {
            return Err(RepositoryError::DataCorruption(format!(
                "order {} total does not match its parts",
                row.order_number
            )));
        }

        Ok(Self {
            id: row.id,
            order_number: row.order_number,
            user_id: row.user_id,
            contact_name: row.contact_name,
            contact_email,
            contact_phone: row.contact_phone,
            totals,
            status: row.status,
            payment_method: row.payment_method,
            payment_status: row.payment_status,
            razorpay_order_id: row.razorpay_order_id,
            razorpay_payment_id: row.razorpay_payment_id,
            shipping_address: row.shipping_address.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct OrderItemRow {
    id: OrderItemId,
    order_id: OrderId,
    product_id: Option<ProductId>,
    product_name: String,
    product_image: Option<String>,
    quantity: i32,
    unit_price: Decimal,
    subtotal: Decimal,
}

impl TryFrom<OrderItemRow> for OrderItem {
    type Error = RepositoryError;

    fn try_from(row: OrderItemRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            order_id: row.order_id,
            product_id: row.product_id,
            product_name: row.product_name,
            product_image: row.product_image,
            quantity: non_negative(row.quantity, "order item quantity")?,
            unit_price: row.unit_price,
            subtotal: row.subtotal,
        })
    }
}

fn one(row: Option<OrderRow>) -> Result<Option<Order>, RepositoryError> {
    row.map(Order::try_from).transpose()
}

fn many(rows: Vec<OrderRow>) -> Result<Vec<Order>, RepositoryError> {
    rows.into_iter().map(Order::try_from).collect()
}

/// Fields of an order about to be created.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub order_number: String,
    pub user_id: UserId,
    pub contact_name: String,
    pub contact_email: Email,
    pub contact_phone: String,
    pub totals: OrderTotals,
    pub payment_method: PaymentMethod,
    pub razorpay_order_id: Option<String>,
    pub shipping_address: ShippingAddress,
}

/// Insert an order (`pending`/`pending`) and its item snapshots.
///
/// # Errors
///
/// Returns an error if any insert fails.
#[instrument(skip_all, fields(order_number = %order.order_number))]
pub async fn insert_with_items(
    conn: &mut PgConnection,
    order: &NewOrder,
    lines: &[CartLine],
) -> Result<Order, RepositoryError> {
    let row: OrderRow = sqlx::query_as(&format!(
        r"
        INSERT INTO shop.orders (
            id, order_number, user_id, contact_name, contact_email, contact_phone,
            subtotal, tax, shipping, total, status, payment_method, payment_status,
            razorpay_order_id, shipping_address
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, 'pending', $11, 'pending', $12, $13)
        RETURNING {ORDER_COLUMNS}
        "
    ))
    .bind(OrderId::generate())
    .bind(&order.order_number)
    .bind(order.user_id)
    .bind(&order.contact_name)
    .bind(order.contact_email.as_str())
    .bind(&order.contact_phone)
    .bind(order.totals.subtotal)
    .bind(order.totals.tax)
    .bind(order.totals.shipping)
    .bind(order.totals.total)
    .bind(order.payment_method)
    .bind(&order.razorpay_order_id)
    .bind(Json(&order.shipping_address))
    .fetch_one(&mut *conn)
    .await?;
    let created = Order::try_from(row)?;

    for line in lines {
        let quantity = i32::try_from(line.quantity).map_err(|_| {
            RepositoryError::Conflict(format!("quantity {} is too large", line.quantity))
        })?;
        sqlx::query(
            r"
            INSERT INTO shop.order_items
                (id, order_id, product_id, product_name, product_image, quantity, unit_price, subtotal)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ",
        )
        .bind(OrderItemId::generate())
        .bind(created.id)
        .bind(line.product_id)
        .bind(&line.name)
        .bind(&line.image_url)
        .bind(quantity)
        .bind(line.unit_price)
        .bind(line.line_total())
        .execute(&mut *conn)
        .await?;
    }

    Ok(created)
}

/// Claim an online-paid order: record the payment and move it to
/// `processing`. Returns `None` if it was already paid or is no longer
/// pending.
///
/// # Errors
///
/// Returns an error if the update fails.
pub async fn claim_online_payment(
    conn: &mut PgConnection,
    order_id: OrderId,
    razorpay_payment_id: &str,
) -> Result<Option<Order>, RepositoryError> {
    let row: Option<OrderRow> = sqlx::query_as(&format!(
        r"
        UPDATE shop.orders
        SET razorpay_payment_id = $2,
            payment_status = 'paid',
            status = 'processing',
            updated_at = NOW()
        WHERE id = $1
          AND status = 'pending'
          AND payment_status IN ('pending', 'failed')
        RETURNING {ORDER_COLUMNS}
        "
    ))
    .bind(order_id)
    .bind(razorpay_payment_id)
    .fetch_optional(conn)
    .await?;
    one(row)
}

/// Attach a payment that arrived after the order was cancelled.
///
/// The order stays cancelled and unpaid; the stored payment id is what
/// staff refund from the gateway. Returns `None` unless the order is
/// cancelled, unpaid, and has no other payment recorded.
///
/// # Errors
///
/// Returns an error if the update fails.
pub async fn record_late_payment(
    conn: &mut PgConnection,
    order_id: OrderId,
    razorpay_payment_id: &str,
) -> Result<Option<Order>, RepositoryError> {
    let row: Option<OrderRow> = sqlx::query_as(&format!(
        r"
        UPDATE shop.orders
        SET razorpay_payment_id = $2, updated_at = NOW()
        WHERE id = $1
          AND status = 'cancelled'
          AND payment_status IN ('pending', 'failed')
          AND (razorpay_payment_id IS NULL OR razorpay_payment_id = $2)
        RETURNING {ORDER_COLUMNS}
        "
    ))
    .bind(order_id)
    .bind(razorpay_payment_id)
    .fetch_optional(conn)
    .await?;
    one(row)
}

/// Claim a cash-on-delivery order still in `pending`.
///
/// # Errors
///
/// Returns an error if the update fails.
pub async fn claim_cash_on_delivery(
    conn: &mut PgConnection,
    order_id: OrderId,
) -> Result<Option<Order>, RepositoryError> {
    let row: Option<OrderRow> = sqlx::query_as(&format!(
        r"
        UPDATE shop.orders
        SET status = 'processing', updated_at = NOW()
        WHERE id = $1 AND status = 'pending' AND payment_method = 'cod'
        RETURNING {ORDER_COLUMNS}
        "
    ))
    .bind(order_id)
    .fetch_optional(conn)
    .await?;
    one(row)
}

/// Mark an unpaid pending order as failed and cancelled.
///
/// Returns `false` when the order was already paid or no longer pending.
///
/// # Errors
///
/// Returns an error if the update fails.
pub async fn mark_payment_failed(
    conn: &mut PgConnection,
    order_id: OrderId,
) -> Result<bool, RepositoryError> {
    let result = sqlx::query(
        r"
        UPDATE shop.orders
        SET status = 'cancelled', payment_status = 'failed', updated_at = NOW()
        WHERE id = $1 AND status = 'pending' AND payment_status = 'pending'
        ",
    )
    .bind(order_id)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Set the payment status to `refunded`.
///
/// # Errors
///
/// Returns an error if the update fails.
pub async fn mark_refunded(
    conn: &mut PgConnection,
    order_id: OrderId,
) -> Result<(), RepositoryError> {
    sqlx::query(
        "UPDATE shop.orders SET payment_status = 'refunded', updated_at = NOW() WHERE id = $1",
    )
    .bind(order_id)
    .execute(conn)
    .await?;
    Ok(())
}

/// Move an order from `from` to `to`, only if it is still in `from`.
///
/// # Errors
///
/// Returns an error if the update fails.
pub async fn transition_status(
    conn: &mut PgConnection,
    order_id: OrderId,
    from: OrderStatus,
    to: OrderStatus,
) -> Result<Option<Order>, RepositoryError> {
    let row: Option<OrderRow> = sqlx::query_as(&format!(
        r"
        UPDATE shop.orders SET status = $3, updated_at = NOW()
        WHERE id = $1 AND status = $2
        RETURNING {ORDER_COLUMNS}
        "
    ))
    .bind(order_id)
    .bind(from)
    .bind(to)
    .fetch_optional(conn)
    .await?;
    one(row)
}

/// Repository for order reads.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Any order by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or the row is invalid.
    pub async fn get(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let row: Option<OrderRow> =
            sqlx::query_as(&format!("SELECT {ORDER_COLUMNS} FROM shop.orders WHERE id = $1"))
                .bind(id)
                .fetch_optional(self.pool)
                .await?;
        one(row)
    }

    /// An order owned by `user_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or the row is invalid.
    pub async fn get_for_user(
        &self,
        id: OrderId,
        user_id: UserId,
    ) -> Result<Option<Order>, RepositoryError> {
        let row: Option<OrderRow> = sqlx::query_as(&format!(
            "SELECT {ORDER_COLUMNS} FROM shop.orders WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?;
        one(row)
    }

    /// An order by its gateway order id.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or the row is invalid.
    pub async fn get_by_razorpay_order_id(
        &self,
        razorpay_order_id: &str,
    ) -> Result<Option<Order>, RepositoryError> {
        let row: Option<OrderRow> = sqlx::query_as(&format!(
            "SELECT {ORDER_COLUMNS} FROM shop.orders WHERE razorpay_order_id = $1"
        ))
        .bind(razorpay_order_id)
        .fetch_optional(self.pool)
        .await?;
        one(row)
    }

    /// An order by its gateway payment id.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or the row is invalid.
    pub async fn get_by_razorpay_payment_id(
        &self,
        razorpay_payment_id: &str,
    ) -> Result<Option<Order>, RepositoryError> {
        let row: Option<OrderRow> = sqlx::query_as(&format!(
            "SELECT {ORDER_COLUMNS} FROM shop.orders WHERE razorpay_payment_id = $1"
        ))
        .bind(razorpay_payment_id)
        .fetch_optional(self.pool)
        .await?;
        one(row)
    }

    /// A user's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a row is invalid.
    pub async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        let rows: Vec<OrderRow> = sqlx::query_as(&format!(
            "SELECT {ORDER_COLUMNS} FROM shop.orders WHERE user_id = $1 ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;
        many(rows)
    }

    /// All orders, newest first, optionally filtered by status.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a row is invalid.
    pub async fn list_all(
        &self,
        status: Option<OrderStatus>,
        limit: i64,
    ) -> Result<Vec<Order>, RepositoryError> {
        let rows: Vec<OrderRow> = sqlx::query_as(&format!(
            r"
            SELECT {ORDER_COLUMNS} FROM shop.orders
            WHERE $1::shop.order_status IS NULL OR status = $1
            ORDER BY created_at DESC
            LIMIT $2
            "
        ))
        .bind(status)
        .bind(limit)
        .fetch_all(self.pool)
        .await?;
        many(rows)
    }

    /// Item snapshots of an order.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a row is invalid.
    pub async fn items(&self, order_id: OrderId) -> Result<Vec<OrderItem>, RepositoryError> {
        let rows: Vec<OrderItemRow> = sqlx::query_as(&format!(
            "SELECT {ITEM_COLUMNS} FROM shop.order_items WHERE order_id = $1 ORDER BY product_name"
        ))
        .bind(order_id)
        .fetch_all(self.pool)
        .await?;
        rows.into_iter().map(OrderItem::try_from).collect()
    }
}
