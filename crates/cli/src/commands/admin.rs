//! Admin account commands.
//!
//! The storefront has no self-service way to become an admin; the first
//! admin is created here.

use ayurmart_core::UserRole;
use ayurmart_storefront::services::auth::{AuthError, AuthService};
use thiserror::Error;

use super::{ConnectError, connect};

#[derive(Debug, Error)]
pub enum AdminError {
    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error(transparent)]
    Auth(#[from] AuthError),
}

/// Create a new admin account.
pub async fn create(email: &str, password: &str) -> Result<(), AdminError> {
    let pool = connect().await?;

    let user = AuthService::new(&pool)
        .register(email, password, UserRole::Admin)
        .await?;

    tracing::info!(user_id = %user.id, email = %user.email, "Admin account created");
    Ok(())
}

/// Give an existing account the admin role.
pub async fn promote(email: &str) -> Result<(), AdminError> {
    let pool = connect().await?;

    let user = AuthService::new(&pool)
        .set_role(email, UserRole::Admin)
        .await?;

    tracing::info!(user_id = %user.id, email = %user.email, "Account promoted to admin");
    Ok(())
}
