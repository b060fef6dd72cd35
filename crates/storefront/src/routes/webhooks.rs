//! Razorpay webhook endpoint.
//!
//! The body is taken as raw bytes: the signature covers the exact bytes the
//! gateway sent.

use axum::{Json, body::Bytes, extract::State, http::HeaderMap};
use serde_json::{Value, json};

use crate::error::Result;
use crate::services::reconciliation::SIGNATURE_HEADER;
use crate::state::AppState;

/// Verify and apply a webhook delivery.
///
/// Any error other than a bad signature or payload is a 500, which makes the
/// gateway redeliver.
pub async fn razorpay(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());

    state.webhooks().process(signature, &body).await?;
    Ok(Json(json!({ "received": true })))
}
