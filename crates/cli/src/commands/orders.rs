//! Operator order edits.
//!
//! Goes through the same state machine as the admin API, so a CLI edit can
//! never do anything the storefront would refuse.

use streetmerch_core::{CurrencyCode, OrderId, OrderStatus};
use streetmerch_storefront::config::PricePolicy;
use streetmerch_storefront::db::{self, Repositories};
use streetmerch_storefront::models::StatusUpdate;
use streetmerch_storefront::services::OrderEngine;

use super::{CommandError, database_url};

/// Move order `id` to `status`.
///
/// # Errors
///
/// Returns `CommandError::Invalid` for a malformed id, and the storefront's
/// error if the order is missing or the transition is not allowed.
pub async fn set_status(
    id: &str,
    status: OrderStatus,
    tracking_number: Option<String>,
    admin_note: Option<String>,
) -> Result<(), CommandError> {
    let id: OrderId = id
        .parse()
        .map_err(|_| CommandError::Invalid(format!("Not an order id: {id}")))?;

    let pool = db::create_pool(&database_url()?).await?;
    let repos = Repositories::postgres(pool);
    // Pricing settings only matter at checkout.
    let engine = OrderEngine::new(&repos, PricePolicy::default(), CurrencyCode::default());

    let order = engine
        .update_status(
            id,
            StatusUpdate {
                status,
                tracking_number,
                admin_note,
            },
        )
        .await?;

    tracing::info!(
        order_id = %order.id,
        short_id = %order.short_id(),
        status = %order.status,
        "Order updated"
    );
    Ok(())
}
