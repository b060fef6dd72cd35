//! HMAC-SHA256 signature checks for Razorpay callbacks.
//!
//! Checkout signature: `hex(HMAC(key_secret, "{order_id}|{payment_id}"))`.
//! Webhook signature: `hex(HMAC(webhook_secret, raw_body))` in the
//! `X-Razorpay-Signature` header.

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Hex-encoded HMAC-SHA256 of `message` under `secret`.
#[must_use]
pub fn sign(secret: &SecretString, message: &[u8]) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(secret.expose_secret().as_bytes()).ok()?;
    mac.update(message);
    Some(hex::encode(mac.finalize().into_bytes()))
}

/// Verify the signature returned to the browser after a successful payment.
#[must_use]
pub fn verify_payment_signature(
    secret: &SecretString,
    razorpay_order_id: &str,
    razorpay_payment_id: &str,
    signature: &str,
) -> bool {
    let payload = format!("{razorpay_order_id}|{razorpay_payment_id}");
    sign(secret, payload.as_bytes()).is_some_and(|expected| constant_time_compare(&expected, signature))
}

/// Verify a webhook body against its `X-Razorpay-Signature` header.
#[must_use]
pub fn verify_webhook_signature(secret: &SecretString, body: &[u8], signature: &str) -> bool {
    sign(secret, body).is_some_and(|expected| constant_time_compare(&expected, signature))
}

/// Constant-time string comparison to prevent timing attacks.
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result: u8 = 0;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }

    result == 0
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn secret() -> SecretString {
        SecretString::from("Rzp7kT2mQ9xW4vL8")
    }

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare("abc123", "abc123"));
        assert!(constant_time_compare("", ""));
        assert!(!constant_time_compare("abc123", "abc124"));
        assert!(!constant_time_compare("abc123", "abc12"));
    }

    #[test]
    fn test_sign_known_vector() {
        // RFC 4231 test case 2
        let key = SecretString::from("Jefe");
        let sig = sign(&key, b"what do ya want for nothing?").unwrap();
        assert_eq!(
            sig,
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn test_payment_signature_valid() {
        let sig = sign(&secret(), b"order_N5gq1|pay_N5gr9").unwrap();
        assert!(verify_payment_signature(&secret(), "order_N5gq1", "pay_N5gr9", &sig));
    }

    #[test]
    fn test_payment_signature_rejects_swapped_ids() {
        let sig = sign(&secret(), b"order_N5gq1|pay_N5gr9").unwrap();
        assert!(!verify_payment_signature(&secret(), "pay_N5gr9", "order_N5gq1", &sig));
    }

    #[test]
    fn test_payment_signature_rejects_case_change() {
        let sig = sign(&secret(), b"order_N5gq1|pay_N5gr9").unwrap().to_uppercase();
        assert!(!verify_payment_signature(&secret(), "order_N5gq1", "pay_N5gr9", &sig));
    }

    #[test]
    fn test_webhook_signature() {
        let body = br#"{"event":"payment.captured"}"#;
        let sig = sign(&secret(), body).unwrap();
        assert!(verify_webhook_signature(&secret(), body, &sig));
        assert!(!verify_webhook_signature(&secret(), br#"{"event":"payment.failed"}"#, &sig));
        assert!(!verify_webhook_signature(&SecretString::from("other"), body, &sig));
    }
}
