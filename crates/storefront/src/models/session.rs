//! What the session remembers about the logged-in account.

use serde::{Deserialize, Serialize};

use ayurmart_core::{Email, UserId, UserRole};

use super::User;

/// Identity stored in the session cookie's server-side record.
///
/// `role` is copied at login. Admin routes do not trust it and reload the
/// account instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentUser {
    pub id: UserId,
    pub email: Email,
    pub role: UserRole,
}

impl From<&User> for CurrentUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            role: user.role,
        }
    }
}

/// Session map keys.
pub mod keys {
    pub const CURRENT_USER: &str = "current_user";
}
