//! Encrypt values for the settings table.
//!
//! Output has the same `iv:ciphertext` form the admin API stores, so it can
//! be inserted directly into `shop.settings`.

use ayurmart_storefront::crypto::{CipherError, SecretCipher};
use secrecy::SecretString;

/// Encrypt `value` with `ENCRYPTION_KEY` and print it.
pub fn encrypt(value: &str) -> Result<(), CipherError> {
    let passphrase = std::env::var("ENCRYPTION_KEY")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(SecretString::from);
    if passphrase.is_none() {
        tracing::warn!("ENCRYPTION_KEY not set, using the built-in fallback key");
    }

    let cipher = SecretCipher::new(passphrase.as_ref())?;
    let encrypted = cipher.encrypt(value)?;

    #[allow(clippy::print_stdout)]
    {
        println!("{encrypted}");
    }
    Ok(())
}
