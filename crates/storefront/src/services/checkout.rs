//! Checkout: order creation, payment verification and finalization.
//!
//! # Flow
//!
//! 1. `create_order` reserves stock for the whole cart, opens a gateway order
//!    for online payments and persists the order with its item snapshots.
//! 2. The customer pays on the gateway widget.
//! 3. `verify_payment` (browser callback) and the `payment.captured` webhook
//!    both end in `finalize_order`.
//!
//! `finalize_order` claims the order with a conditional update inside the
//! transaction that deducts stock and clears the cart, so it runs at most
//! once per order no matter how many callers race.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use thiserror::Error;
use tracing::instrument;

use ayurmart_core::{
    Email, InventoryLockId, OrderId, OrderTotals, PaymentMethod, Price, PricingRules,
    generate_order_number,
};

use crate::config::RazorpayEnv;
use crate::crypto::SecretCipher;
use crate::db::RepositoryError;
use crate::db::cart::{self, CartRepository};
use crate::db::inventory::{self, Reservation};
use crate::db::orders::{self, NewOrder, OrderRepository};
use crate::models::{CartLine, CurrentUser, Order, ShippingAddress};
use crate::payments::signature::verify_payment_signature;
use crate::payments::{PaymentConfigResolver, PaymentError, RazorpayClient, RazorpayOrder};
use crate::services::email::EmailService;

/// Currency of every order.
const CURRENCY: &str = "INR";

/// Errors from the checkout flow.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("cart is empty")]
    EmptyCart,

    /// A cart line points at a deactivated product.
    #[error("product unavailable: {0}")]
    ProductUnavailable(String),

    #[error("insufficient stock for {0}")]
    InsufficientStock(String),

    #[error("invalid payment signature")]
    InvalidSignature,

    #[error("order not found")]
    OrderNotFound,

    /// Payment arrived for an order that was already cancelled.
    #[error("order was cancelled before payment completed")]
    OrderCancelled,

    /// The order total cannot be expressed in paise.
    #[error("order total out of range")]
    InvalidAmount,

    #[error(transparent)]
    Payment(#[from] PaymentError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<sqlx::Error> for CheckoutError {
    fn from(err: sqlx::Error) -> Self {
        Self::Repository(err.into())
    }
}

/// How an order is being settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settlement {
    /// Paid on the gateway with this payment id.
    Online { payment_id: String },
    /// Collected by the courier.
    CashOnDelivery,
}

/// Result of a finalization attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalizeOutcome {
    /// This call moved the order into fulfilment.
    Finalized,
    /// Another caller already did; nothing was changed.
    AlreadyFinalized,
    /// The order was cancelled first. The payment id was recorded for a
    /// refund and the order stays cancelled.
    PaidAfterCancellation,
}

/// Response of a successful order creation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedOrder {
    pub order_id: OrderId,
    pub order_number: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub razorpay_order: Option<RazorpayOrder>,
}

/// Gateway callback fields posted by the browser after payment.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentConfirmation {
    pub order_id: OrderId,
    #[serde(rename = "razorpay_order_id")]
    pub razorpay_order_id: String,
    #[serde(rename = "razorpay_payment_id")]
    pub razorpay_payment_id: String,
    #[serde(rename = "razorpay_signature")]
    pub razorpay_signature: String,
}

/// Checkout service.
pub struct CheckoutService<'a> {
    pool: &'a PgPool,
    http: &'a reqwest::Client,
    razorpay: &'a RazorpayEnv,
    cipher: &'a SecretCipher,
    pricing: &'a PricingRules,
    email: Option<&'a EmailService>,
}

impl<'a> CheckoutService<'a> {
    #[must_use]
    pub const fn new(
        pool: &'a PgPool,
        http: &'a reqwest::Client,
        razorpay: &'a RazorpayEnv,
        cipher: &'a SecretCipher,
        pricing: &'a PricingRules,
    ) -> Self {
        Self {
            pool,
            http,
            razorpay,
            cipher,
            pricing,
            email: None,
        }
    }

    /// Send confirmations through `email` when present.
    #[must_use]
    pub const fn with_email(mut self, email: Option<&'a EmailService>) -> Self {
        self.email = email;
        self
    }

    fn resolver(&self) -> PaymentConfigResolver<'a> {
        PaymentConfigResolver::new(self.pool, self.razorpay, self.cipher)
    }

    /// Turn the caller's cart into an order.
    ///
    /// Cash-on-delivery orders are finalized before returning; online orders
    /// come back with the gateway order the widget needs.
    ///
    /// # Errors
    ///
    /// Returns `EmptyCart`, `ProductUnavailable` or `InsufficientStock` for
    /// carts that cannot be ordered, `Payment` when the gateway is not
    /// configured or rejects the order, and `Repository` on database
    /// failures. No reservation survives a failed call.
    #[instrument(skip(self, user, address), fields(user_id = %user.id, order_number))]
    pub async fn create_order(
        &self,
        user: &CurrentUser,
        address: ShippingAddress,
        payment_method: PaymentMethod,
    ) -> Result<CreatedOrder, CheckoutError> {
        let lines = CartRepository::new(self.pool).lines(user.id).await?;
        if lines.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }
        if let Some(line) = lines.iter().find(|l| !l.is_active) {
            return Err(CheckoutError::ProductUnavailable(line.name.clone()));
        }

        let totals = OrderTotals::compute(lines.iter().map(|l| (l.unit_price, l.quantity)), self.pricing);

        let lock_ids = match inventory::reserve_all(self.pool, user.id, &lines).await? {
            Reservation::Reserved(ids) => ids,
            Reservation::InsufficientStock { product_name, .. } => {
                return Err(CheckoutError::InsufficientStock(product_name));
            }
        };

        let order_number = generate_order_number();
        tracing::Span::current().record("order_number", order_number.as_str());

        let opened = self
            .open_order(user, address, payment_method, &lines, totals, &order_number, &lock_ids)
            .await;
        let (order, razorpay_order) = match opened {
            Ok(opened) => opened,
            Err(err) => {
                match inventory::release_unattached(self.pool, &lock_ids).await {
                    Ok(released) => tracing::info!(released, "released reservations after failed checkout"),
                    Err(release_err) => tracing::error!(
                        error = %release_err,
                        "failed to release reservations after failed checkout"
                    ),
                }
                return Err(err);
            }
        };

        if payment_method == PaymentMethod::Cod {
            self.finalize_order(order.id, Settlement::CashOnDelivery).await?;
        }

        tracing::info!(order_id = %order.id, method = ?payment_method, total = %order.totals.total, "order created");

        Ok(CreatedOrder {
            order_id: order.id,
            order_number: order.order_number,
            razorpay_order,
        })
    }

    /// Open the gateway order (online payments) and persist the order.
    #[allow(clippy::too_many_arguments)]
    async fn open_order(
        &self,
        user: &CurrentUser,
        address: ShippingAddress,
        payment_method: PaymentMethod,
        lines: &[CartLine],
        totals: OrderTotals,
        order_number: &str,
        lock_ids: &[InventoryLockId],
    ) -> Result<(Order, Option<RazorpayOrder>), CheckoutError> {
        let razorpay_order = match payment_method {
            PaymentMethod::Razorpay => {
                let config = self.resolver().get_config().await?;
                let client = RazorpayClient::new(self.http.clone(), &self.razorpay.api_base, config);
                let order = client
                    .create_order(
                        amount_in_paise(totals.total)?,
                        CURRENCY,
                        order_number,
                        &gateway_notes(order_number, user),
                    )
                    .await?;
                Some(order)
            }
            PaymentMethod::Cod => None,
        };

        let new_order = NewOrder {
            order_number: order_number.to_string(),
            user_id: user.id,
            contact_name: address.full_name.clone(),
            contact_email: contact_email(&address, user),
            contact_phone: address.phone.clone(),
            totals,
            payment_method,
            razorpay_order_id: razorpay_order.as_ref().map(|o| o.id.clone()),
            shipping_address: address,
        };

        let mut tx = self.pool.begin().await?;
        let order = orders::insert_with_items(&mut *tx, &new_order, lines).await?;
        inventory::attach_to_order(&mut *tx, lock_ids, order.id).await?;
        tx.commit().await?;

        Ok((order, razorpay_order))
    }

    /// Check the gateway signature and finalize the caller's order.
    ///
    /// Succeeds whether this call or a concurrent webhook finalized it.
    ///
    /// # Errors
    ///
    /// Returns `InvalidSignature` when the signature does not match,
    /// `OrderNotFound` when the order is not the caller's or carries another
    /// gateway order, `OrderCancelled` when the order was cancelled before
    /// the payment landed, and `Payment` when credentials are missing.
    #[instrument(skip(self, user, confirmation), fields(user_id = %user.id, order_id = %confirmation.order_id))]
    pub async fn verify_payment(
        &self,
        user: &CurrentUser,
        confirmation: &PaymentConfirmation,
    ) -> Result<String, CheckoutError> {
        let config = self.resolver().get_config().await?;
        if !verify_payment_signature(
            &config.key_secret,
            &confirmation.razorpay_order_id,
            &confirmation.razorpay_payment_id,
            &confirmation.razorpay_signature,
        ) {
            tracing::warn!("payment signature mismatch");
            return Err(CheckoutError::InvalidSignature);
        }

        let order = OrderRepository::new(self.pool)
            .get_for_user(confirmation.order_id, user.id)
            .await?
            .filter(|o| o.razorpay_order_id.as_deref() == Some(confirmation.razorpay_order_id.as_str()))
            .ok_or(CheckoutError::OrderNotFound)?;

        let outcome = self
            .finalize_order(
                order.id,
                Settlement::Online {
                    payment_id: confirmation.razorpay_payment_id.clone(),
                },
            )
            .await?;
        tracing::info!(?outcome, order_number = %order.order_number, "payment verified");
        if outcome == FinalizeOutcome::PaidAfterCancellation {
            return Err(CheckoutError::OrderCancelled);
        }

        Ok(order.order_number)
    }

    /// Move an order into fulfilment exactly once.
    ///
    /// Claims the order, deducts stock, consumes its reservations and clears
    /// the owner's cart in one transaction, then sends the confirmation.
    /// Cancelled orders are never reopened; an online payment for one is
    /// recorded on the order and reported as `PaidAfterCancellation`.
    ///
    /// # Errors
    ///
    /// Returns `Repository` if any statement fails; the transaction is then
    /// rolled back and the order stays claimable.
    #[instrument(skip(self, settlement), fields(order_id = %order_id))]
    pub async fn finalize_order(
        &self,
        order_id: OrderId,
        settlement: Settlement,
    ) -> Result<FinalizeOutcome, CheckoutError> {
        let mut tx = self.pool.begin().await?;

        let claimed = match &settlement {
            Settlement::Online { payment_id } => {
                orders::claim_online_payment(&mut *tx, order_id, payment_id).await?
            }
            Settlement::CashOnDelivery => orders::claim_cash_on_delivery(&mut *tx, order_id).await?,
        };
        let Some(order) = claimed else {
            if let Settlement::Online { payment_id } = &settlement {
                let late = orders::record_late_payment(&mut *tx, order_id, payment_id).await?;
                if let Some(order) = late {
                    tx.commit().await?;
                    tracing::error!(
                        order_number = %order.order_number,
                        %payment_id,
                        "payment received for cancelled order, refund required"
                    );
                    return Ok(FinalizeOutcome::PaidAfterCancellation);
                }
            }
            tx.rollback().await?;
            tracing::info!("order already finalized");
            return Ok(FinalizeOutcome::AlreadyFinalized);
        };

        inventory::process_order_payment(&mut *tx, order.id).await?;
        cart::clear(&mut *tx, order.user_id).await?;
        tx.commit().await?;

        tracing::info!(order_number = %order.order_number, "order finalized");
        self.send_confirmation(&order).await;

        Ok(FinalizeOutcome::Finalized)
    }

    async fn send_confirmation(&self, order: &Order) {
        let Some(email) = self.email else {
            tracing::debug!(order_number = %order.order_number, "email disabled, skipping confirmation");
            return;
        };

        let items = match OrderRepository::new(self.pool).items(order.id).await {
            Ok(items) => items,
            Err(e) => {
                tracing::warn!(error = %e, "could not load items for confirmation email");
                return;
            }
        };
        if let Err(e) = email.send_order_confirmation(order, &items).await {
            tracing::warn!(error = %e, order_number = %order.order_number, "order confirmation email failed");
        }
    }

    /// Tell the customer a refund was processed. Failures are logged.
    pub async fn send_refund_notice(&self, order: &Order, amount: Decimal) {
        let Some(email) = self.email else {
            return;
        };
        if let Err(e) = email.send_refund_processed(order, amount).await {
            tracing::warn!(error = %e, order_number = %order.order_number, "refund email failed");
        }
    }
}

fn amount_in_paise(total: Decimal) -> Result<i64, CheckoutError> {
    Price::inr(total)
        .to_minor_units()
        .filter(|paise| *paise > 0)
        .ok_or(CheckoutError::InvalidAmount)
}

fn gateway_notes(order_number: &str, user: &CurrentUser) -> BTreeMap<String, String> {
    BTreeMap::from([
        ("order_number".to_string(), order_number.to_string()),
        ("user_id".to_string(), user.id.to_string()),
    ])
}

/// The address email when given, else the account email.
fn contact_email(address: &ShippingAddress, user: &CurrentUser) -> Email {
    address
        .email
        .as_deref()
        .and_then(|e| Email::parse(e).ok())
        .unwrap_or_else(|| user.email.clone())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use ayurmart_core::{UserId, UserRole};

    fn user() -> CurrentUser {
        CurrentUser {
            id: UserId::generate(),
            email: Email::parse("arjun@example.in").unwrap(),
            role: UserRole::Customer,
        }
    }

    fn address(email: Option<&str>) -> ShippingAddress {
        ShippingAddress {
            full_name: "Arjun Nair".to_string(),
            phone: "9847012345".to_string(),
            email: email.map(String::from),
            address_line1: "4 Beach Road".to_string(),
            address_line2: None,
            city: "Alappuzha".to_string(),
            state: "Kerala".to_string(),
            postal_code: "688001".to_string(),
            country: "India".to_string(),
        }
    }

    #[test]
    fn test_amount_in_paise() {
        assert_eq!(amount_in_paise(Decimal::new(64584, 2)).unwrap(), 64584);
        assert!(matches!(
            amount_in_paise(Decimal::ZERO),
            Err(CheckoutError::InvalidAmount)
        ));
    }

    #[test]
    fn test_gateway_notes() {
        let user = user();
        let notes = gateway_notes("ORD-0LOYW3V28-AB12", &user);
        assert_eq!(notes["order_number"], "ORD-0LOYW3V28-AB12");
        assert_eq!(notes["user_id"], user.id.to_string());
    }

    #[test]
    fn test_contact_email_prefers_address() {
        let user = user();
        assert_eq!(
            contact_email(&address(Some("Gift@Example.IN")), &user).as_str(),
            "gift@example.in"
        );
        assert_eq!(contact_email(&address(None), &user), user.email);
        assert_eq!(contact_email(&address(Some("not an email")), &user), user.email);
    }

    #[test]
    fn test_created_order_omits_missing_gateway_order() {
        let created = CreatedOrder {
            order_id: OrderId::generate(),
            order_number: "ORD-0LOYW3V28-AB12".to_string(),
            razorpay_order: None,
        };
        let json = serde_json::to_value(&created).unwrap();
        assert_eq!(json["orderNumber"], "ORD-0LOYW3V28-AB12");
        assert!(json.get("razorpayOrder").is_none());
    }

    #[test]
    fn test_payment_confirmation_field_names() {
        let order_id = OrderId::generate();
        let confirmation: PaymentConfirmation = serde_json::from_value(serde_json::json!({
            "orderId": order_id,
            "razorpay_order_id": "order_Abc",
            "razorpay_payment_id": "pay_Xyz",
            "razorpay_signature": "deadbeef"
        }))
        .unwrap();
        assert_eq!(confirmation.order_id, order_id);
        assert_eq!(confirmation.razorpay_payment_id, "pay_Xyz");
    }
}
