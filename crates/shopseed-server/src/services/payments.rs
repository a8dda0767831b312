use chrono::Utc;
use shopseed_store::{OrderStatus, PaymentRow};
use tracing::{info, warn};

use crate::error::ApiError;
use crate::state::AppState;

/// Placeholder payment-intent id for seeded payments.
pub fn intent_id(order_id: i64, millis: i64) -> String {
    format!("FAKE_INTENT_{order_id}_{millis}")
}

/// One payment per order without one. Orders that cannot be paid are
/// logged and skipped.
pub async fn generate_payments(state: &AppState) -> Result<Vec<PaymentRow>, ApiError> {
    let orders = state.store.orders_without_payments().await?;
    let mut created = Vec::with_capacity(orders.len());

    for order in &orders {
        let status = match order.status.parse::<OrderStatus>() {
            Ok(status) => status.payment_status(),
            Err(reason) => {
                warn!(event = "payment_skipped", order_id = order.id, reason = %reason);
                continue;
            }
        };
        let intent = intent_id(order.id, Utc::now().timestamp_millis());
        match state
            .store
            .insert_payment(order.id, order.total, status, &intent)
            .await
        {
            Ok(row) => created.push(row),
            Err(err) => warn!(event = "payment_skipped", order_id = order.id, error = %err),
        }
    }

    info!(
        event = "payments_generated",
        orders = orders.len(),
        stored = created.len()
    );
    Ok(created)
}
