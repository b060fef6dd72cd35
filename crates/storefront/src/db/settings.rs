//! Key/value settings.
//!
//! Values are plain text; secrets are stored encrypted by the caller.

use sqlx::PgPool;

use super::RepositoryError;

/// Well-known setting keys.
pub mod keys {
    pub const RAZORPAY_KEY_ID: &str = "razorpay_key_id";
    pub const RAZORPAY_KEY_SECRET: &str = "razorpay_key_secret";
    pub const RAZORPAY_WEBHOOK_SECRET: &str = "razorpay_webhook_secret";
}

/// Get a setting value.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub async fn get_setting(pool: &PgPool, key: &str) -> Result<Option<String>, RepositoryError> {
    let value = sqlx::query_scalar::<_, String>("SELECT value FROM shop.settings WHERE key = $1")
        .bind(key)
        .fetch_optional(pool)
        .await?;
    Ok(value)
}

/// Upsert several settings atomically.
///
/// # Errors
///
/// Returns an error if any write fails; nothing is written in that case.
pub async fn set_settings(pool: &PgPool, values: &[(&str, &str)]) -> Result<(), RepositoryError> {
    let mut tx = pool.begin().await?;
    for (key, value) in values {
        sqlx::query(
            r"
            INSERT INTO shop.settings (key, value)
            VALUES ($1, $2)
            ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, updated_at = NOW()
            ",
        )
        .bind(*key)
        .bind(*value)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;
    Ok(())
}
