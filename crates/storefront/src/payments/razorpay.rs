//! Razorpay REST client.
//!
//! A client is built per request from freshly resolved credentials and the
//! shared `reqwest::Client`, so credential changes apply immediately and no
//! global gateway instance exists.

use std::collections::BTreeMap;

use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::{PaymentConfig, PaymentError};

/// Razorpay API client bound to one set of credentials.
#[derive(Clone)]
pub struct RazorpayClient {
    http: reqwest::Client,
    api_base: String,
    config: PaymentConfig,
}

/// Request body for `POST /orders`.
#[derive(Debug, Serialize)]
struct CreateOrderRequest<'a> {
    /// Amount in paise.
    amount: i64,
    currency: &'a str,
    receipt: &'a str,
    notes: &'a BTreeMap<String, String>,
}

/// A gateway order, returned to the browser to open the checkout widget.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RazorpayOrder {
    pub id: String,
    /// Amount in paise.
    pub amount: i64,
    pub currency: String,
    #[serde(default)]
    pub receipt: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Serialize)]
struct RefundRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    amount: Option<i64>,
    notes: &'a BTreeMap<String, String>,
}

/// A refund created through the API.
#[derive(Debug, Clone, Deserialize)]
pub struct RazorpayRefund {
    pub id: String,
    pub payment_id: String,
    /// Amount in paise.
    pub amount: i64,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

impl RazorpayClient {
    /// Bind a shared HTTP client to resolved credentials.
    #[must_use]
    pub fn new(http: reqwest::Client, api_base: &str, config: PaymentConfig) -> Self {
        Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            config,
        }
    }

    /// Create a gateway order for `amount_paise`.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::Http` on transport failure and
    /// `PaymentError::Api` when the gateway rejects the request.
    #[instrument(skip(self, notes), fields(receipt = %receipt))]
    pub async fn create_order(
        &self,
        amount_paise: i64,
        currency: &str,
        receipt: &str,
        notes: &BTreeMap<String, String>,
    ) -> Result<RazorpayOrder, PaymentError> {
        let body = CreateOrderRequest {
            amount: amount_paise,
            currency,
            receipt,
            notes,
        };

        let response = self
            .http
            .post(format!("{}/orders", self.api_base))
            .basic_auth(&self.config.key_id, Some(self.config.key_secret.expose_secret()))
            .json(&body)
            .send()
            .await?;

        let order: RazorpayOrder = Self::parse(response).await?;
        tracing::info!(razorpay_order_id = %order.id, amount = order.amount, "Razorpay order created");
        Ok(order)
    }

    /// Refund a captured payment, fully when `amount_paise` is `None`.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::Http` on transport failure and
    /// `PaymentError::Api` when the gateway rejects the refund.
    #[instrument(skip(self, notes))]
    pub async fn refund(
        &self,
        payment_id: &str,
        amount_paise: Option<i64>,
        notes: &BTreeMap<String, String>,
    ) -> Result<RazorpayRefund, PaymentError> {
        let response = self
            .http
            .post(format!("{}/payments/{payment_id}/refund", self.api_base))
            .basic_auth(&self.config.key_id, Some(self.config.key_secret.expose_secret()))
            .json(&RefundRequest {
                amount: amount_paise,
                notes,
            })
            .send()
            .await?;

        let refund: RazorpayRefund = Self::parse(response).await?;
        tracing::info!(refund_id = %refund.id, amount = refund.amount, "Razorpay refund requested");
        Ok(refund)
    }

    async fn parse<T: for<'de> Deserialize<'de>>(
        response: reqwest::Response,
    ) -> Result<T, PaymentError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }

        let text = response.text().await.unwrap_or_default();
        Err(PaymentError::Api {
            status: status.as_u16(),
            message: api_error_message(&text),
        })
    }
}

/// Extract `code: description` from a gateway error body, or fall back to the raw text.
fn api_error_message(body: &str) -> String {
    match serde_json::from_str::<ApiErrorBody>(body) {
        Ok(ApiErrorBody { error }) => match (error.code, error.description) {
            (Some(code), Some(description)) => format!("{code}: {description}"),
            (None, Some(description)) => description,
            (Some(code), None) => code,
            (None, None) => body.to_string(),
        },
        Err(_) => body.to_string(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_create_order_request_shape() {
        let mut notes = BTreeMap::new();
        notes.insert("orderNumber".to_string(), "ORD-0LOYW3V28-7F3Z".to_string());
        let body = CreateOrderRequest {
            amount: 64584,
            currency: "INR",
            receipt: "ORD-0LOYW3V28-7F3Z",
            notes: &notes,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["amount"], 64584);
        assert_eq!(json["currency"], "INR");
        assert_eq!(json["receipt"], "ORD-0LOYW3V28-7F3Z");
        assert_eq!(json["notes"]["orderNumber"], "ORD-0LOYW3V28-7F3Z");
    }

    #[test]
    fn test_full_refund_omits_amount() {
        let notes = BTreeMap::new();
        let json = serde_json::to_value(RefundRequest { amount: None, notes: &notes }).unwrap();
        assert!(json.get("amount").is_none());
    }

    #[test]
    fn test_order_response_parses() {
        let order: RazorpayOrder = serde_json::from_str(
            r#"{"id":"order_N5gq1","entity":"order","amount":64584,"amount_paid":0,
                "currency":"INR","receipt":"ORD-0LOYW3V28-7F3Z","status":"created","attempts":0}"#,
        )
        .unwrap();
        assert_eq!(order.id, "order_N5gq1");
        assert_eq!(order.amount, 64584);
    }

    #[test]
    fn test_api_error_message() {
        let body = r#"{"error":{"code":"BAD_REQUEST_ERROR","description":"Authentication failed"}}"#;
        assert_eq!(api_error_message(body), "BAD_REQUEST_ERROR: Authentication failed");
        assert_eq!(api_error_message("gateway timeout"), "gateway timeout");
    }
}
