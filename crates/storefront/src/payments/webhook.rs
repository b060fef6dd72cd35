//! Razorpay webhook payloads.
//!
//! Only the fields reconciliation needs are parsed; everything else in the
//! payload is ignored.

use serde::Deserialize;

/// Payment entity carried by `payment.*` events.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentEntity {
    pub id: String,
    #[serde(default)]
    pub order_id: Option<String>,
    #[serde(default)]
    pub amount: Option<i64>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
}

/// Refund entity carried by `refund.*` events.
#[derive(Debug, Clone, Deserialize)]
pub struct RefundEntity {
    pub id: String,
    pub payment_id: String,
    /// Amount in paise.
    pub amount: i64,
}

/// A webhook event reconciliation acts on.
#[derive(Debug, Clone)]
pub enum WebhookEvent {
    PaymentAuthorized(PaymentEntity),
    PaymentCaptured(PaymentEntity),
    PaymentFailed(PaymentEntity),
    RefundProcessed(RefundEntity),
    /// Any event this store does not handle; acknowledged without action.
    Unhandled(String),
}

impl WebhookEvent {
    /// The Razorpay event name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::PaymentAuthorized(_) => "payment.authorized",
            Self::PaymentCaptured(_) => "payment.captured",
            Self::PaymentFailed(_) => "payment.failed",
            Self::RefundProcessed(_) => "refund.processed",
            Self::Unhandled(name) => name,
        }
    }

    /// Parse a raw webhook body.
    ///
    /// # Errors
    ///
    /// Returns a message when the body is not JSON or a handled event lacks
    /// its entity.
    pub fn parse(body: &[u8]) -> Result<Self, String> {
        let envelope: Envelope =
            serde_json::from_slice(body).map_err(|e| format!("invalid webhook payload: {e}"))?;

        let payment = || {
            envelope
                .payload
                .payment
                .clone()
                .map(|w| w.entity)
                .ok_or_else(|| format!("{} event without payment entity", envelope.event))
        };

        Ok(match envelope.event.as_str() {
            "payment.authorized" => Self::PaymentAuthorized(payment()?),
            "payment.captured" => Self::PaymentCaptured(payment()?),
            "payment.failed" => Self::PaymentFailed(payment()?),
            "refund.processed" => Self::RefundProcessed(
                envelope
                    .payload
                    .refund
                    .clone()
                    .map(|w| w.entity)
                    .ok_or_else(|| "refund.processed event without refund entity".to_string())?,
            ),
            _ => Self::Unhandled(envelope.event.clone()),
        })
    }
}

#[derive(Debug, Deserialize)]
struct Envelope {
    event: String,
    #[serde(default)]
    payload: Payload,
}

#[derive(Debug, Default, Deserialize)]
struct Payload {
    #[serde(default)]
    payment: Option<Wrapped<PaymentEntity>>,
    #[serde(default)]
    refund: Option<Wrapped<RefundEntity>>,
}

#[derive(Debug, Clone, Deserialize)]
struct Wrapped<T> {
    entity: T,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_payment_captured() {
        let body = br#"{
            "entity": "event",
            "event": "payment.captured",
            "payload": {"payment": {"entity": {
                "id": "pay_N5gr9", "order_id": "order_N5gq1", "amount": 64584,
                "currency": "INR", "status": "captured"
            }}}
        }"#;
        let event = WebhookEvent::parse(body).unwrap();
        assert_eq!(event.name(), "payment.captured");
        let WebhookEvent::PaymentCaptured(payment) = event else {
            panic!("expected payment.captured");
        };
        assert_eq!(payment.id, "pay_N5gr9");
        assert_eq!(payment.order_id.as_deref(), Some("order_N5gq1"));
    }

    #[test]
    fn test_parse_refund_processed() {
        let body = br#"{"event":"refund.processed","payload":{
            "refund":{"entity":{"id":"rfnd_1","payment_id":"pay_N5gr9","amount":29900}},
            "payment":{"entity":{"id":"pay_N5gr9"}}}}"#;
        let WebhookEvent::RefundProcessed(refund) = WebhookEvent::parse(body).unwrap() else {
            panic!("expected refund.processed");
        };
        assert_eq!(refund.payment_id, "pay_N5gr9");
        assert_eq!(refund.amount, 29900);
    }

    #[test]
    fn test_unknown_event_is_unhandled() {
        let event = WebhookEvent::parse(br#"{"event":"order.paid","payload":{}}"#).unwrap();
        assert!(matches!(event, WebhookEvent::Unhandled(ref name) if name == "order.paid"));
    }

    #[test]
    fn test_handled_event_without_entity_is_error() {
        assert!(WebhookEvent::parse(br#"{"event":"payment.failed","payload":{}}"#).is_err());
        assert!(WebhookEvent::parse(b"not json").is_err());
    }
}
