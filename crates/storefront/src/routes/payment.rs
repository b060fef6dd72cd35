//! Public payment configuration.

use axum::{Json, extract::State};
use serde::Serialize;

use crate::error::Result;
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicPaymentConfig {
    pub key_id: String,
}

/// The key id the checkout widget needs. Never the secret.
pub async fn config(State(state): State<AppState>) -> Result<Json<PublicPaymentConfig>> {
    let key_id = state.payment_config().public_key_id().await?;
    Ok(Json(PublicPaymentConfig { key_id }))
}
