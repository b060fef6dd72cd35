//! Inventory maintenance.
//!
//! Meant to run on a schedule (every few minutes) so abandoned checkouts
//! return their stock.

use ayurmart_storefront::db::{RepositoryError, inventory};
use thiserror::Error;

use super::{ConnectError, connect};

#[derive(Debug, Error)]
pub enum InventoryError {
    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Release lapsed reservations.
pub async fn release_expired() -> Result<(), InventoryError> {
    let pool = connect().await?;

    let sweep = inventory::release_expired(&pool).await?;
    tracing::info!(
        released_locks = sweep.released_locks,
        cancelled_orders = sweep.cancelled_orders,
        "Expired reservations released"
    );
    Ok(())
}
