//! Gateway credential resolution.
//!
//! Credentials come from the environment when both `RAZORPAY_KEY_ID` and
//! `RAZORPAY_KEY_SECRET` are set; otherwise from the settings table, where the
//! secret may be stored encrypted. Nothing is cached, so a key rotated from
//! the admin API takes effect on the next request.

use secrecy::SecretString;
use sqlx::PgPool;
use tracing::instrument;

use super::PaymentError;
use crate::config::RazorpayEnv;
use crate::crypto::SecretCipher;
use crate::db::settings::{self, keys};

/// Resolved gateway credentials.
#[derive(Clone)]
pub struct PaymentConfig {
    pub key_id: String,
    pub key_secret: SecretString,
}

impl std::fmt::Debug for PaymentConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentConfig")
            .field("key_id", &self.key_id)
            .field("key_secret", &"[REDACTED]")
            .finish()
    }
}

/// Resolves [`PaymentConfig`] and the webhook secret on each call.
pub struct PaymentConfigResolver<'a> {
    pool: &'a PgPool,
    env: &'a RazorpayEnv,
    cipher: &'a SecretCipher,
}

impl<'a> PaymentConfigResolver<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool, env: &'a RazorpayEnv, cipher: &'a SecretCipher) -> Self {
        Self { pool, env, cipher }
    }

    /// Resolve the key id and secret.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::NotConfigured` when neither source has both
    /// values, or `PaymentError::Settings` if the settings query fails.
    #[instrument(skip(self))]
    pub async fn get_config(&self) -> Result<PaymentConfig, PaymentError> {
        if let Some((key_id, key_secret)) = self.env.credentials() {
            return Ok(PaymentConfig {
                key_id: key_id.to_string(),
                key_secret: key_secret.clone(),
            });
        }

        let key_id = settings::get_setting(self.pool, keys::RAZORPAY_KEY_ID).await?;
        let key_secret = settings::get_setting(self.pool, keys::RAZORPAY_KEY_SECRET).await?;
        resolve_stored(key_id, key_secret, self.cipher)
    }

    /// Resolve the webhook signing secret.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::WebhookSecretMissing` when no secret is
    /// configured.
    #[instrument(skip(self))]
    pub async fn webhook_secret(&self) -> Result<SecretString, PaymentError> {
        if let Some(secret) = &self.env.webhook_secret {
            return Ok(secret.clone());
        }

        settings::get_setting(self.pool, keys::RAZORPAY_WEBHOOK_SECRET)
            .await?
            .filter(|v| !v.is_empty())
            .map(|stored| SecretString::from(reveal(&stored, self.cipher, "webhook secret")))
            .ok_or(PaymentError::WebhookSecretMissing)
    }

    /// Only the public key id, for the checkout widget.
    ///
    /// # Errors
    ///
    /// Same as [`Self::get_config`].
    pub async fn public_key_id(&self) -> Result<String, PaymentError> {
        self.get_config().await.map(|c| c.key_id)
    }
}

/// Build a config from stored settings values.
fn resolve_stored(
    key_id: Option<String>,
    key_secret: Option<String>,
    cipher: &SecretCipher,
) -> Result<PaymentConfig, PaymentError> {
    let (Some(key_id), Some(stored_secret)) = (
        key_id.filter(|v| !v.is_empty()),
        key_secret.filter(|v| !v.is_empty()),
    ) else {
        return Err(PaymentError::NotConfigured);
    };

    Ok(PaymentConfig {
        key_id,
        key_secret: SecretString::from(reveal(&stored_secret, cipher, "key secret")),
    })
}

/// Decrypt a stored secret when it looks encrypted, otherwise use it as-is.
fn reveal(stored: &str, cipher: &SecretCipher, what: &str) -> String {
    if !SecretCipher::is_encrypted(stored) {
        return stored.to_string();
    }

    let decrypted = cipher.decrypt(stored);
    if decrypted == stored {
        tracing::warn!(
            "stored Razorpay {what} looks encrypted but could not be decrypted; using stored value"
        );
    }
    decrypted
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    fn cipher() -> SecretCipher {
        SecretCipher::new(Some(&SecretString::from("resolver-test-key"))).unwrap()
    }

    #[test]
    fn test_missing_values_are_not_configured() {
        let cipher = cipher();
        assert!(matches!(
            resolve_stored(None, Some("s".into()), &cipher),
            Err(PaymentError::NotConfigured)
        ));
        assert!(matches!(
            resolve_stored(Some("rzp_test_1".into()), None, &cipher),
            Err(PaymentError::NotConfigured)
        ));
        assert!(matches!(
            resolve_stored(Some(String::new()), Some("s".into()), &cipher),
            Err(PaymentError::NotConfigured)
        ));
    }

    #[test]
    fn test_plaintext_secret_used_as_is() {
        let config =
            resolve_stored(Some("rzp_test_1".into()), Some("plainSecret".into()), &cipher()).unwrap();
        assert_eq!(config.key_id, "rzp_test_1");
        assert_eq!(config.key_secret.expose_secret(), "plainSecret");
    }

    #[test]
    fn test_encrypted_secret_is_decrypted() {
        let cipher = cipher();
        let stored = cipher.encrypt("liveSecret42").unwrap();
        let config = resolve_stored(Some("rzp_live_1".into()), Some(stored), &cipher).unwrap();
        assert_eq!(config.key_secret.expose_secret(), "liveSecret42");
    }

    #[test]
    fn test_undecryptable_secret_falls_back_to_stored_value() {
        let config =
            resolve_stored(Some("rzp_live_1".into()), Some("abc:def".into()), &cipher()).unwrap();
        assert_eq!(config.key_secret.expose_secret(), "abc:def");
    }

    #[test]
    fn test_debug_redacts_secret() {
        let config = PaymentConfig {
            key_id: "rzp_test_visible".into(),
            key_secret: SecretString::from("hidden_value"),
        };
        let out = format!("{config:?}");
        assert!(out.contains("rzp_test_visible"));
        assert!(!out.contains("hidden_value"));
    }
}
