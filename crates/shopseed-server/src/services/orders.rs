use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};
use shopseed_store::{OrderRow, OrderStatus, UserAddresses};
use tracing::info;

use crate::error::ApiError;
use crate::state::AppState;

/// Order to insert for one user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannedOrder {
    pub user_id: i64,
    pub status: OrderStatus,
    pub shipping_address_id: i64,
    pub billing_address_id: i64,
}

/// One order per status for every user that has an address, shipping and
/// billing to randomly chosen addresses of that user.
pub fn plan_orders<R: Rng + ?Sized>(users: &[UserAddresses], rng: &mut R) -> Vec<PlannedOrder> {
    let mut planned = Vec::with_capacity(users.len() * OrderStatus::ALL.len());
    for user in users {
        for status in OrderStatus::ALL {
            let (Some(shipping), Some(billing)) =
                (user.address_ids.choose(rng), user.address_ids.choose(rng))
            else {
                break;
            };
            planned.push(PlannedOrder {
                user_id: user.user_id,
                status,
                shipping_address_id: *shipping,
                billing_address_id: *billing,
            });
        }
    }
    planned
}

pub async fn generate_orders(state: &AppState) -> Result<Vec<OrderRow>, ApiError> {
    let users = state.store.users_with_addresses().await?;
    let planned = plan_orders(&users, &mut StdRng::from_os_rng());

    let mut created = Vec::with_capacity(planned.len());
    for order in planned {
        let row = state
            .store
            .insert_order(
                order.user_id,
                order.status,
                order.shipping_address_id,
                order.billing_address_id,
            )
            .await
            .map_err(|err| ApiError::interrupted(created.len(), err))?;
        created.push(row);
    }
    info!(event = "orders_generated", users = users.len(), stored = created.len());
    Ok(created)
}
