//! Razorpay payment integration.
//!
//! - [`config`] resolves gateway credentials (environment, then admin settings)
//! - [`razorpay`] is the REST client used for orders and refunds
//! - [`signature`] verifies checkout and webhook HMAC signatures
//! - [`webhook`] parses webhook event payloads

pub mod config;
pub mod razorpay;
pub mod signature;
pub mod webhook;

use thiserror::Error;

use crate::db::RepositoryError;

pub use config::{PaymentConfig, PaymentConfigResolver};
pub use razorpay::{RazorpayClient, RazorpayOrder, RazorpayRefund};

/// Errors from payment configuration and the gateway.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// Neither the environment nor the settings table has gateway keys.
    #[error(
        "Razorpay is not configured. Add the key id and secret under Admin > Settings > Payment, \
         or set RAZORPAY_KEY_ID and RAZORPAY_KEY_SECRET."
    )]
    NotConfigured,

    /// No webhook signing secret is available.
    #[error(
        "Razorpay webhook secret is not configured. Set RAZORPAY_WEBHOOK_SECRET or save it under \
         Admin > Settings > Payment."
    )]
    WebhookSecretMissing,

    /// HTTP request to the gateway failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Gateway returned an error response.
    #[error("Razorpay API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Reading settings failed.
    #[error("settings lookup failed: {0}")]
    Settings(#[from] RepositoryError),
}
