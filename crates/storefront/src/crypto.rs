//! Symmetric encryption for secrets stored in the settings table.
//!
//! Values are AES-256-CBC encrypted with a random IV and stored as
//! `hex(iv):hex(ciphertext)`. The key is derived once with scrypt from the
//! `ENCRYPTION_KEY` passphrase.

use aes::Aes256;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit, block_padding::Pkcs7};
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

/// Passphrase used when `ENCRYPTION_KEY` is not configured.
const FALLBACK_PASSPHRASE: &str = "ayurmart-default-encryption-key";

/// Fixed scrypt salt. Existing ciphertexts depend on it.
const KEY_SALT: &[u8] = b"salt";

/// scrypt cost parameters: N = 2^14, r = 8, p = 1.
const SCRYPT_LOG_N: u8 = 14;
const SCRYPT_R: u32 = 8;
const SCRYPT_P: u32 = 1;

const KEY_LEN: usize = 32;
const IV_LEN: usize = 16;

/// Errors from the secret cipher.
#[derive(Debug, Error)]
pub enum CipherError {
    /// The scrypt parameters or output length were rejected.
    #[error("key derivation failed")]
    KeyDerivation,

    /// Encryption could not be performed.
    #[error("encryption failed")]
    EncryptionFailed,
}

/// AES-256-CBC cipher with a key derived at construction time.
#[derive(Clone)]
pub struct SecretCipher {
    key: [u8; KEY_LEN],
}

impl std::fmt::Debug for SecretCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretCipher")
            .field("key", &"[REDACTED]")
            .finish()
    }
}

impl SecretCipher {
    /// Derive the cipher key from `passphrase`, or from the built-in fallback
    /// when no passphrase is configured.
    ///
    /// # Errors
    ///
    /// Returns `CipherError::KeyDerivation` if scrypt rejects its parameters.
    pub fn new(passphrase: Option<&SecretString>) -> Result<Self, CipherError> {
        let passphrase = passphrase.map_or_else(
            || {
                tracing::warn!(
                    "ENCRYPTION_KEY is not set; stored secrets are encrypted with the built-in fallback key"
                );
                FALLBACK_PASSPHRASE
            },
            |p| p.expose_secret(),
        );

        let params = scrypt::Params::new(SCRYPT_LOG_N, SCRYPT_R, SCRYPT_P, KEY_LEN)
            .map_err(|_| CipherError::KeyDerivation)?;
        let mut key = [0_u8; KEY_LEN];
        scrypt::scrypt(passphrase.as_bytes(), KEY_SALT, &params, &mut key)
            .map_err(|_| CipherError::KeyDerivation)?;

        Ok(Self { key })
    }

    /// Encrypt `plaintext` into `ivHex:cipherHex`.
    ///
    /// # Errors
    ///
    /// Returns `CipherError::EncryptionFailed` if the cipher cannot be
    /// initialized.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, CipherError> {
        let iv: [u8; IV_LEN] = rand::random();
        let ciphertext = Aes256CbcEnc::new_from_slices(&self.key, &iv)
            .map_err(|_| CipherError::EncryptionFailed)?
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes());

        Ok(format!("{}:{}", hex::encode(iv), hex::encode(ciphertext)))
    }

    /// Decrypt an `ivHex:cipherHex` value.
    ///
    /// Any failure returns the input unchanged, so plaintext values written
    /// before encryption was enabled keep working.
    #[must_use]
    pub fn decrypt(&self, text: &str) -> String {
        self.try_decrypt(text).unwrap_or_else(|| text.to_string())
    }

    fn try_decrypt(&self, text: &str) -> Option<String> {
        let (iv_hex, data_hex) = text.split_once(':')?;
        let iv = hex::decode(iv_hex).ok()?;
        let data = hex::decode(data_hex).ok()?;
        let plaintext = Aes256CbcDec::new_from_slices(&self.key, &iv)
            .ok()?
            .decrypt_padded_vec_mut::<Pkcs7>(&data)
            .ok()?;
        String::from_utf8(plaintext).ok()
    }

    /// Whether `text` looks like a value produced by [`Self::encrypt`].
    ///
    /// Only checks for exactly two colon-separated parts.
    #[must_use]
    pub fn is_encrypted(text: &str) -> bool {
        text.split(':').count() == 2
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::LazyLock;

    static CIPHER: LazyLock<SecretCipher> = LazyLock::new(|| {
        SecretCipher::new(Some(&SecretString::from("unit-test-passphrase"))).unwrap()
    });

    #[test]
    fn test_roundtrip() {
        let encrypted = CIPHER.encrypt("rzp_secret_9fK2mQ").unwrap();
        assert!(SecretCipher::is_encrypted(&encrypted));
        assert_eq!(CIPHER.decrypt(&encrypted), "rzp_secret_9fK2mQ");
    }

    #[test]
    fn test_output_format() {
        let encrypted = CIPHER.encrypt("x").unwrap();
        let (iv, data) = encrypted.split_once(':').unwrap();
        assert_eq!(iv.len(), IV_LEN * 2);
        // one block of PKCS#7-padded ciphertext
        assert_eq!(data.len(), 32);
        assert!(encrypted.chars().all(|c| c == ':' || c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_random_iv() {
        let a = CIPHER.encrypt("same input").unwrap();
        let b = CIPHER.encrypt("same input").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_decrypt_plaintext_passthrough() {
        assert_eq!(CIPHER.decrypt("plain-secret"), "plain-secret");
        assert_eq!(CIPHER.decrypt("zz:not-hex"), "zz:not-hex");
        assert_eq!(CIPHER.decrypt("00112233445566778899aabbccddeeff:00"), "00112233445566778899aabbccddeeff:00");
    }

    #[test]
    fn test_decrypt_with_other_key_returns_input() {
        let other = SecretCipher::new(Some(&SecretString::from("another-passphrase"))).unwrap();
        let encrypted = CIPHER.encrypt("rzp_secret_9fK2mQ").unwrap();
        let decrypted = other.decrypt(&encrypted);
        assert_ne!(decrypted, "rzp_secret_9fK2mQ");
    }

    #[test]
    fn test_same_passphrase_same_key() {
        let again = SecretCipher::new(Some(&SecretString::from("unit-test-passphrase"))).unwrap();
        let encrypted = CIPHER.encrypt("shared").unwrap();
        assert_eq!(again.decrypt(&encrypted), "shared");
    }

    #[test]
    fn test_is_encrypted() {
        assert!(SecretCipher::is_encrypted("ab:cd"));
        assert!(!SecretCipher::is_encrypted("abcd"));
        assert!(!SecretCipher::is_encrypted("a:b:c"));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_roundtrip(plaintext in ".{1,80}") {
            let encrypted = CIPHER.encrypt(&plaintext).unwrap();
            prop_assert_eq!(CIPHER.decrypt(&encrypted), plaintext);
        }
    }
}
