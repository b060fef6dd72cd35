//! Authentication extractors.
//!
//! The session holds a [`CurrentUser`] snapshot written at login. Customer
//! routes trust the snapshot; admin routes re-read the role from the
//! database so a revoked admin loses access immediately.

use axum::{extract::FromRequestParts, http::request::Parts};
use tower_sessions::Session;

use crate::db::users::UserRepository;
use crate::error::{AppError, set_sentry_user};
use crate::models::{CurrentUser, User, session_keys};
use crate::state::AppState;

/// Extractor that requires a logged-in user.
///
/// Rejects with a JSON 401 when there is no session user.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(RequireAuth(user): RequireAuth) -> impl IntoResponse {
///     format!("Hello, {}!", user.email)
/// }
/// ```
pub struct RequireAuth(pub CurrentUser);

async fn session_user(parts: &Parts) -> Option<CurrentUser> {
    let session = parts.extensions.get::<Session>()?;
    session
        .get::<CurrentUser>(session_keys::CURRENT_USER)
        .await
        .ok()
        .flatten()
}

impl<S> FromRequestParts<S> for RequireAuth
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user = session_user(parts)
            .await
            .ok_or_else(|| AppError::Unauthorized("Authentication required".to_string()))?;
        set_sentry_user(&user.id, None);
        Ok(Self(user))
    }
}

/// Extractor that requires a logged-in admin, checked against the database.
///
/// No session user is a 401; a user whose current role is not admin is a 403.
pub struct RequireAdmin(pub User);

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let current = session_user(parts)
            .await
            .ok_or_else(|| AppError::Unauthorized("Authentication required".to_string()))?;

        let user = UserRepository::new(state.pool())
            .get_by_id(current.id)
            .await?
            .ok_or_else(|| AppError::Unauthorized("Authentication required".to_string()))?;

        if !user.is_admin() {
            tracing::warn!(user_id = %user.id, "non-admin attempted admin access");
            return Err(AppError::Forbidden("Admin access required".to_string()));
        }

        set_sentry_user(&user.id, None);
        Ok(Self(user))
    }
}

/// Store the logged-in user in the session.
///
/// The session id is cycled first so a pre-login session id cannot be reused.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_current_user(
    session: &Session,
    user: &CurrentUser,
) -> Result<(), tower_sessions::session::Error> {
    session.cycle_id().await?;
    session.insert(session_keys::CURRENT_USER, user).await
}

/// Remove the user from the session (logout).
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn clear_current_user(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session.flush().await
}
