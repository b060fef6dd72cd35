//! Errors from registration, login and role changes.

use thiserror::Error;

use crate::db::RepositoryError;

#[derive(Debug, Error)]
pub enum AuthError {
    /// The email did not parse.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] ayurmart_core::EmailError),

    /// Unknown email or wrong password; the two are not distinguished.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Registration with an email that already has an account.
    #[error("account already exists")]
    UserAlreadyExists,

    /// Password outside the accepted length range.
    #[error("password rejected: {0}")]
    WeakPassword(String),

    #[error("account lookup failed: {0}")]
    Repository(#[from] RepositoryError),

    /// argon2 failed to hash, or a stored hash is unreadable.
    #[error("password hashing failed")]
    PasswordHash,
}
