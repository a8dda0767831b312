use std::ops::RangeInclusive;

use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};
use shopseed_store::{NewOrderItem, OrderRow, PricedProduct};
use tracing::{info, warn};

use crate::error::ApiError;
use crate::state::AppState;

pub const ITEMS_PER_ORDER: RangeInclusive<usize> = 3..=36;
pub const QUANTITY_PER_ITEM: RangeInclusive<i32> = 1..=4;

/// Random order lines drawn from `products`, priced at the product price.
pub fn plan_items<R: Rng + ?Sized>(products: &[PricedProduct], rng: &mut R) -> Vec<NewOrderItem> {
    if products.is_empty() {
        return Vec::new();
    }
    let count = rng.random_range(ITEMS_PER_ORDER);
    let mut lines = Vec::with_capacity(count);
    for _ in 0..count {
        let Some(product) = products.choose(rng) else {
            break;
        };
        lines.push(NewOrderItem {
            product_id: product.id,
            quantity: rng.random_range(QUANTITY_PER_ITEM),
            price: product.price,
        });
    }
    lines
}

/// Fill every order that has no items and update its total.
pub async fn generate_missing_order_items(state: &AppState) -> Result<Vec<OrderRow>, ApiError> {
    let orders = state.store.orders_without_items().await?;
    if orders.is_empty() {
        info!(event = "order_items_up_to_date");
        return Ok(Vec::new());
    }
    let products = state.store.priced_products().await?;
    if products.is_empty() {
        return Err(ApiError::BadRequest(
            "no products available to fill orders".to_string(),
        ));
    }

    let mut rng = StdRng::from_os_rng();
    let mut updated = Vec::with_capacity(orders.len());
    let mut items = 0usize;
    for order in orders {
        let lines = plan_items(&products, &mut rng);
        if lines.is_empty() {
            warn!(event = "order_left_empty", order_id = order.id);
            continue;
        }
        let row = state
            .store
            .add_order_items(order.id, &lines)
            .await
            .map_err(|err| ApiError::interrupted(updated.len(), err))?;
        items += lines.len();
        updated.push(row);
    }
    info!(event = "order_items_generated", orders = updated.len(), items);
    Ok(updated)
}

#[cfg(test)]
mod tests {
    use rand_chacha::ChaCha8Rng;

    use super::*;

    #[test]
    fn lines_stay_within_bounds_and_copy_prices() {
        let products = vec![
            PricedProduct { id: 1, price: 9.5 },
            PricedProduct { id: 2, price: 20.0 },
        ];
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        for _ in 0..50 {
            let lines = plan_items(&products, &mut rng);
            assert!(ITEMS_PER_ORDER.contains(&lines.len()));
            for line in &lines {
                assert!(QUANTITY_PER_ITEM.contains(&line.quantity));
                let product = products.iter().find(|p| p.id == line.product_id).unwrap();
                assert_eq!(line.price, product.price);
            }
        }
    }

    #[test]
    fn no_products_means_no_lines() {
        assert!(plan_items(&[], &mut ChaCha8Rng::seed_from_u64(1)).is_empty());
    }
}
