use shopseed_generate::entities::{ReviewEntity, ReviewTarget};
use shopseed_store::{ProductSummary, ReviewRow, ReviewSink};
use tracing::{info, warn};

use super::generator;
use crate::error::ApiError;
use crate::state::AppState;

/// Write reviews for every user that has none yet.
///
/// Each user reviews up to `reviews_per_user` random products in a single
/// batch. A user whose batch fails is skipped.
pub async fn generate_reviews(state: &AppState) -> Result<Vec<ReviewRow>, ApiError> {
    let users = state.store.users_without_reviews().await?;
    let pause = state.config.generation.review_pause();
    let mut created = Vec::new();
    let mut skipped = 0usize;

    for (position, user_id) in users.iter().copied().enumerate() {
        if position > 0 {
            state.sleeper.sleep(pause).await;
        }
        match review_for_user(state, user_id).await {
            Ok(rows) => created.extend(rows),
            Err(err) => {
                skipped += 1;
                warn!(event = "user_reviews_skipped", user_id, error = %err);
            }
        }
    }

    info!(
        event = "reviews_generated",
        users = users.len(),
        skipped,
        stored = created.len()
    );
    Ok(created)
}

async fn review_for_user(state: &AppState, user_id: i64) -> Result<Vec<ReviewRow>, ApiError> {
    let limit = i64::try_from(state.config.generation.reviews_per_user).unwrap_or(i64::MAX);
    let products = state.store.random_products(limit).await?;
    if products.is_empty() {
        return Ok(Vec::new());
    }

    let targets = review_targets(products);
    let count = targets.len();
    let generator = generator(
        state,
        ReviewEntity::new(user_id, targets),
        state.config.llm.max_tokens.reviews,
    );
    let mut sink = ReviewSink::new(state.store.clone());
    let result = generator.generate(count, count, &mut sink).await;
    match result {
        Ok(_) => Ok(sink.inserted),
        Err(failure) => Err(ApiError::interrupted(sink.inserted.len(), failure.error)),
    }
}

fn review_targets(products: Vec<ProductSummary>) -> Vec<ReviewTarget> {
    products
        .into_iter()
        .map(|product| ReviewTarget {
            product_id: product.id,
            name: product.name,
            description: product.description,
        })
        .collect()
}
