//! Razorpay webhook reconciliation.
//!
//! The webhook is the gateway's copy of what happened to a payment. It
//! finalizes orders whose browser callback never arrived, cancels orders
//! whose payment failed and records processed refunds. Every handler is
//! safe to run more than once for the same event.

use rust_decimal::Decimal;
use sqlx::PgPool;
use thiserror::Error;
use tracing::instrument;

use crate::db::RepositoryError;
use crate::db::inventory;
use crate::db::orders::{self, OrderRepository};
use crate::db::refunds;
use crate::models::Order;
use crate::payments::signature::verify_webhook_signature;
use crate::payments::webhook::{PaymentEntity, RefundEntity, WebhookEvent};
use crate::payments::{PaymentConfigResolver, PaymentError};
use crate::services::checkout::{CheckoutError, CheckoutService, Settlement};

/// Header carrying the hex HMAC of the raw body.
pub const SIGNATURE_HEADER: &str = "x-razorpay-signature";

/// Errors from webhook processing.
#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("missing webhook signature")]
    MissingSignature,

    #[error("invalid webhook signature")]
    InvalidSignature,

    #[error("{0}")]
    MalformedPayload(String),

    #[error(transparent)]
    Payment(#[from] PaymentError),

    #[error(transparent)]
    Checkout(#[from] CheckoutError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<sqlx::Error> for WebhookError {
    fn from(err: sqlx::Error) -> Self {
        Self::Repository(err.into())
    }
}

/// Verifies and applies webhook deliveries.
pub struct WebhookProcessor<'a> {
    pool: &'a PgPool,
    resolver: PaymentConfigResolver<'a>,
    checkout: CheckoutService<'a>,
}

impl<'a> WebhookProcessor<'a> {
    #[must_use]
    pub const fn new(
        pool: &'a PgPool,
        resolver: PaymentConfigResolver<'a>,
        checkout: CheckoutService<'a>,
    ) -> Self {
        Self {
            pool,
            resolver,
            checkout,
        }
    }

    /// Verify the signature over `body` and apply the event.
    ///
    /// Events that reference unknown orders are logged and acknowledged,
    /// since a redelivery cannot succeed either.
    ///
    /// # Errors
    ///
    /// Returns `MissingSignature`, `InvalidSignature` or `MalformedPayload`
    /// for deliveries that must not be retried as-is, and `Payment`,
    /// `Checkout` or `Repository` when processing failed and the gateway
    /// should retry.
    pub async fn process(&self, signature: Option<&str>, body: &[u8]) -> Result<(), WebhookError> {
        let signature = signature
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or(WebhookError::MissingSignature)?;

        let secret = self.resolver.webhook_secret().await?;
        if !verify_webhook_signature(&secret, body, signature) {
            tracing::warn!("webhook signature mismatch");
            return Err(WebhookError::InvalidSignature);
        }

        let event = WebhookEvent::parse(body).map_err(WebhookError::MalformedPayload)?;
        self.apply(event).await
    }

    #[instrument(skip_all, fields(event = %event.name()))]
    async fn apply(&self, event: WebhookEvent) -> Result<(), WebhookError> {
        match event {
            WebhookEvent::PaymentAuthorized(payment) | WebhookEvent::PaymentCaptured(payment) => {
                self.payment_succeeded(payment).await
            }
            WebhookEvent::PaymentFailed(payment) => self.payment_failed(payment).await,
            WebhookEvent::RefundProcessed(refund) => self.refund_processed(refund).await,
            WebhookEvent::Unhandled(name) => {
                tracing::info!(event = %name, "ignoring unhandled webhook event");
                Ok(())
            }
        }
    }

    async fn order_for_payment(
        &self,
        payment: &PaymentEntity,
    ) -> Result<Option<Order>, WebhookError> {
        let Some(razorpay_order_id) = payment.order_id.as_deref() else {
            tracing::warn!(payment_id = %payment.id, "payment event without order id");
            return Ok(None);
        };
        let order = OrderRepository::new(self.pool)
            .get_by_razorpay_order_id(razorpay_order_id)
            .await?;
        if order.is_none() {
            tracing::warn!(%razorpay_order_id, "no order for webhook payment");
        }
        Ok(order)
    }

    async fn payment_succeeded(&self, payment: PaymentEntity) -> Result<(), WebhookError> {
        let Some(order) = self.order_for_payment(&payment).await? else {
            return Ok(());
        };

        let outcome = self
            .checkout
            .finalize_order(order.id, Settlement::Online { payment_id: payment.id })
            .await?;
        tracing::info!(order_number = %order.order_number, ?outcome, "webhook payment reconciled");
        Ok(())
    }

    async fn payment_failed(&self, payment: PaymentEntity) -> Result<(), WebhookError> {
        let Some(order) = self.order_for_payment(&payment).await? else {
            return Ok(());
        };

        let mut tx = self.pool.begin().await?;
        let cancelled = orders::mark_payment_failed(&mut *tx, order.id).await?;
        if cancelled {
            inventory::release_for_order(&mut *tx, order.id).await?;
        }
        tx.commit().await?;

        if cancelled {
            tracing::info!(
                order_number = %order.order_number,
                reason = payment.error_description.as_deref().unwrap_or("unknown"),
                "order cancelled after failed payment"
            );
        } else {
            tracing::info!(order_number = %order.order_number, "failed payment ignored, order already settled");
        }
        Ok(())
    }

    async fn refund_processed(&self, refund: RefundEntity) -> Result<(), WebhookError> {
        let Some(order) = OrderRepository::new(self.pool)
            .get_by_razorpay_payment_id(&refund.payment_id)
            .await?
        else {
            tracing::warn!(payment_id = %refund.payment_id, "no order for refunded payment");
            return Ok(());
        };
        let amount = Decimal::new(refund.amount, 2);

        let mut tx = self.pool.begin().await?;
        let transitioned =
            refunds::upsert_processed(&mut *tx, order.id, &refund.id, amount).await?;
        orders::mark_refunded(&mut *tx, order.id).await?;
        tx.commit().await?;

        if transitioned {
            tracing::info!(order_number = %order.order_number, refund_id = %refund.id, %amount, "refund processed");
            self.checkout.send_refund_notice(&order, amount).await;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use ayurmart_core::PricingRules;
    use secrecy::SecretString;
    use sqlx::postgres::PgPoolOptions;

    use crate::config::RazorpayEnv;
    use crate::crypto::SecretCipher;
    use crate::payments::signature::sign;

    const WEBHOOK_SECRET: &str = "whsec_9f8e7d6c5b4a3f2e1d0c";

    struct Fixture {
        pool: PgPool,
        http: reqwest::Client,
        env: RazorpayEnv,
        cipher: SecretCipher,
        pricing: PricingRules,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                pool: PgPoolOptions::new()
                    .connect_lazy("postgres://localhost/ayurmart_unreachable")
                    .unwrap(),
                http: reqwest::Client::new(),
                env: RazorpayEnv {
                    webhook_secret: Some(SecretString::from(WEBHOOK_SECRET)),
                    ..RazorpayEnv::default()
                },
                cipher: SecretCipher::new(None).unwrap(),
                pricing: PricingRules::default(),
            }
        }

        fn processor(&self) -> WebhookProcessor<'_> {
            WebhookProcessor::new(
                &self.pool,
                PaymentConfigResolver::new(&self.pool, &self.env, &self.cipher),
                CheckoutService::new(&self.pool, &self.http, &self.env, &self.cipher, &self.pricing),
            )
        }
    }

    fn signed(body: &[u8]) -> String {
        sign(&SecretString::from(WEBHOOK_SECRET), body).unwrap()
    }

    #[tokio::test]
    async fn test_missing_signature() {
        let fixture = Fixture::new();
        let result = fixture.processor().process(None, b"{}").await;
        assert!(matches!(result, Err(WebhookError::MissingSignature)));

        let result = fixture.processor().process(Some("  "), b"{}").await;
        assert!(matches!(result, Err(WebhookError::MissingSignature)));
    }

    #[tokio::test]
    async fn test_invalid_signature() {
        let fixture = Fixture::new();
        let body = br#"{"event":"payment.captured"}"#;
        let result = fixture.processor().process(Some("00ff"), body).await;
        assert!(matches!(result, Err(WebhookError::InvalidSignature)));
    }

    #[tokio::test]
    async fn test_signature_over_different_body_is_rejected() {
        let fixture = Fixture::new();
        let signature = signed(br#"{"event":"payment.failed"}"#);
        let result = fixture
            .processor()
            .process(Some(&signature), br#"{"event":"payment.captured"}"#)
            .await;
        assert!(matches!(result, Err(WebhookError::InvalidSignature)));
    }

    #[tokio::test]
    async fn test_unhandled_event_is_acknowledged() {
        let fixture = Fixture::new();
        let body = br#"{"event":"order.paid","payload":{}}"#;
        let result = fixture.processor().process(Some(&signed(body)), body).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_malformed_payload() {
        let fixture = Fixture::new();
        let body = b"not json";
        let result = fixture.processor().process(Some(&signed(body)), body).await;
        assert!(matches!(result, Err(WebhookError::MalformedPayload(_))));
    }

    #[tokio::test]
    async fn test_payment_without_order_id_is_acknowledged() {
        let fixture = Fixture::new();
        let body = br#"{"event":"payment.captured","payload":{"payment":{"entity":{"id":"pay_123"}}}}"#;
        let result = fixture.processor().process(Some(&signed(body)), body).await;
        assert!(result.is_ok());
    }
}
